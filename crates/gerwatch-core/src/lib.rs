pub mod backoff;
pub mod event;
pub mod text;
