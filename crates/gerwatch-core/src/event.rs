use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const CATEGORY_VERIFIED: &str = "VRIF";
pub const CATEGORY_CODE_REVIEW: &str = "CRVW";

/// Recognized kinds on the Gerrit event stream. Anything else is dropped
/// before it reaches a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    PatchsetCreated,
    CommentAdded,
    ChangeMerged,
}

impl EventKind {
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "patchset-created" => Some(Self::PatchsetCreated),
            "comment-added" => Some(Self::CommentAdded),
            "change-merged" => Some(Self::ChangeMerged),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PatchsetCreated => "patchset-created",
            Self::CommentAdded => "comment-added",
            Self::ChangeMerged => "change-merged",
        }
    }
}

/// Classifies a raw event record by its declared `type`. Records that are
/// not JSON objects, or that carry a missing, non-string, or unknown type,
/// classify as `None`.
pub fn classify(event: &Value) -> Option<EventKind> {
    let kind = event.as_object()?.get("type")?.as_str()?;
    EventKind::from_type(kind)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("{kind} payload rejected: {detail}")]
    Payload { kind: &'static str, detail: String },
}

/// Extracts the typed payload for an already-classified record. Field-level
/// problems (a missing `change`, an approval without a value) surface here,
/// after the record has been counted.
pub fn payload<T: DeserializeOwned>(kind: EventKind, event: &Value) -> Result<T, EventError> {
    serde_json::from_value(event.clone()).map_err(|err| EventError::Payload {
        kind: kind.as_str(),
        detail: err.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChangeRef {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatchSetRef {
    /// Epoch seconds; the stream emits this both as a number and as a
    /// string depending on server version.
    #[serde(default, rename = "createdOn")]
    pub created_on: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AccountRef {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Approval {
    #[serde(rename = "type")]
    pub category: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchsetCreated {
    pub change: ChangeRef,
    #[serde(rename = "patchSet")]
    pub patch_set: PatchSetRef,
    pub uploader: AccountRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentAdded {
    pub change: ChangeRef,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeMerged {
    pub change: ChangeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Failed,
    Succeeded,
    Rejected,
    Approved,
    Merged,
}

impl ChangeStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Failed => "Failed",
            Self::Succeeded => "Succeeded",
            Self::Rejected => "Rejected",
            Self::Approved => "Approved",
            Self::Merged => "Merged",
        }
    }
}

/// Derives a display status from a vote list. Every entry is inspected and
/// the last matching vote wins; a list with no matching votes yields `None`.
pub fn status_from_approvals(approvals: &[Approval]) -> Option<ChangeStatus> {
    let mut status = None;
    for approval in approvals {
        let matched = match (approval.category.as_str(), approval.value.as_str()) {
            (CATEGORY_VERIFIED, "-2") => Some(ChangeStatus::Failed),
            (CATEGORY_VERIFIED, "2") => Some(ChangeStatus::Succeeded),
            (CATEGORY_CODE_REVIEW, "-2") => Some(ChangeStatus::Rejected),
            (CATEGORY_CODE_REVIEW, "2") => Some(ChangeStatus::Approved),
            _ => None,
        };
        if matched.is_some() {
            status = matched;
        }
    }
    status
}
