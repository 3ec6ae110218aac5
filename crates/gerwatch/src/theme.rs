use gerwatch_core::event::ChangeStatus;
use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::White)
    .add_modifier(Modifier::BOLD);
pub const BODY_STYLE: Style = Style::new().fg(Color::White);
pub const SUMMARY_STYLE: Style = Style::new().fg(Color::Gray);

pub fn status_style(status: ChangeStatus) -> Style {
    match status {
        ChangeStatus::Merged | ChangeStatus::Approved | ChangeStatus::Succeeded => {
            Style::new().fg(Color::LightGreen)
        }
        ChangeStatus::Rejected | ChangeStatus::Failed => Style::new().fg(Color::LightRed),
    }
}
