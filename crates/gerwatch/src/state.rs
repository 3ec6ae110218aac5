use gerwatch_core::{
    event::{self, ChangeMerged, ChangeStatus, CommentAdded, EventKind, PatchsetCreated},
    text,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

pub const MAX_LIST_LEN: usize = 50;

/// One visible dashboard line: the latest known state of a change, keyed by
/// its review URL. Created only by a patchset-created event, mutated in
/// place by later comment/merge events, destroyed only by eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRow {
    pub username: String,
    pub topic: String,
    pub url: String,
    pub project: String,
    pub subject: String,
    pub created_on: String,
    pub status: Option<ChangeStatus>,
    pub comment: String,
}

pub struct App {
    events: UnboundedReceiver<Value>,
    pub rows: Vec<ChangeRow>,
    counters: BTreeMap<EventKind, u64>,
    pub summary: String,
}

impl App {
    pub fn new(events: UnboundedReceiver<Value>) -> Self {
        Self {
            events,
            rows: Vec::new(),
            counters: BTreeMap::new(),
            summary: String::new(),
        }
    }

    /// One driver tick: drain at most one queued event, feed it through the
    /// classifier, refresh the summary line. A single event per tick keeps
    /// tick latency flat; the queue absorbs bursts above two events per
    /// second instead.
    pub fn on_tick(&mut self) {
        if let Ok(event) = self.events.try_recv() {
            if let Err(err) = self.process_event(&event) {
                warn!(event = "event_processing_failed", error = %err);
            }
        }
        self.summary = format!(
            "{}, {} events received",
            text::now_stamp(),
            self.total_events()
        );
    }

    pub fn total_events(&self) -> u64 {
        self.counters.values().sum()
    }

    /// Classifies one raw record and applies its row mutation. Unknown and
    /// malformed records fall through untouched; recognized kinds count
    /// exactly once, before their handler runs.
    fn process_event(&mut self, event: &Value) -> Result<(), event::EventError> {
        let Some(kind) = event::classify(event) else {
            return Ok(());
        };
        *self.counters.entry(kind).or_insert(0) += 1;
        match kind {
            EventKind::PatchsetCreated => {
                let payload: PatchsetCreated = event::payload(kind, event)?;
                self.on_patchset_created(payload);
            }
            EventKind::CommentAdded => {
                let payload: CommentAdded = event::payload(kind, event)?;
                self.on_comment_added(payload);
            }
            EventKind::ChangeMerged => {
                let payload: ChangeMerged = event::payload(kind, event)?;
                self.on_change_merged(payload);
            }
        }
        Ok(())
    }

    fn on_patchset_created(&mut self, payload: PatchsetCreated) {
        let row = ChangeRow {
            username: payload.uploader.username,
            topic: payload.change.topic,
            url: payload.change.url,
            project: payload.change.project,
            subject: text::trunc(&payload.change.subject),
            created_on: payload
                .patch_set
                .created_on
                .as_ref()
                .map(text::format_epoch)
                .unwrap_or_default(),
            status: None,
            comment: String::new(),
        };
        // At capacity the current tail makes room, so the oldest rows stay
        // pinned at the top of the table.
        if self.rows.len() >= MAX_LIST_LEN {
            self.rows.pop();
        }
        self.rows.push(row);
    }

    fn on_change_merged(&mut self, payload: ChangeMerged) {
        if let Some(row) = self.find_row_mut(&payload.change.url) {
            row.status = Some(ChangeStatus::Merged);
        }
    }

    fn on_comment_added(&mut self, payload: CommentAdded) {
        let status = event::status_from_approvals(&payload.approvals);
        let comment = text::trunc(&payload.comment);
        let Some(row) = self.find_row_mut(&payload.change.url) else {
            return;
        };
        if !comment.is_empty() {
            row.comment = comment;
        }
        if status.is_some() {
            row.status = status;
        }
    }

    /// First match wins; URL uniqueness is assumed, not enforced.
    fn find_row_mut(&mut self, url: &str) -> Option<&mut ChangeRow> {
        self.rows.iter_mut().find(|row| row.url == url)
    }
}
