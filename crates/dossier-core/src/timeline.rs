//! Owner timelines for the audit surface, derived from document rows,
//! never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{Document, DocumentStatus, DocumentType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEventKind {
  Uploaded,
  Activated,
  Approved,
  Rejected,
  /// Reviewed before being superseded; the outcome is no longer on the row.
  Reviewed,
  Superseded { by: Option<Uuid> },
  /// Lost the active slot without being superseded.
  Deactivated,
  Deleted,
}

impl TimelineEventKind {
  /// Tie-breaker for events sharing a timestamp.
  fn rank(&self) -> u8 {
    match self {
      Self::Uploaded => 0,
      Self::Activated => 1,
      Self::Approved | Self::Rejected | Self::Reviewed => 2,
      Self::Superseded { .. } | Self::Deactivated => 3,
      Self::Deleted => 4,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
  pub at:             DateTime<Utc>,
  pub document_id:    Uuid,
  pub document_type:  DocumentType,
  pub version_number: u32,
  #[serde(flatten)]
  pub kind:           TimelineEventKind,
}

fn events_for(doc: &Document) -> Vec<TimelineEvent> {
  let event = |at, kind| TimelineEvent {
    at,
    document_id: doc.document_id,
    document_type: doc.document_type,
    version_number: doc.version_number,
    kind,
  };

  let mut out = vec![event(doc.created_at, TimelineEventKind::Uploaded)];

  if doc.was_activated() && let Some(from) = doc.valid_from {
    out.push(event(from, TimelineEventKind::Activated));
  }

  if let Some(at) = doc.reviewed_at {
    let kind = match doc.status {
      DocumentStatus::Approved => TimelineEventKind::Approved,
      DocumentStatus::Rejected => TimelineEventKind::Rejected,
      DocumentStatus::Pending | DocumentStatus::Superseded => {
        TimelineEventKind::Reviewed
      }
    };
    out.push(event(at, kind));
  }

  if doc.status == DocumentStatus::Superseded {
    out.push(event(
      doc.valid_to.unwrap_or(doc.updated_at),
      TimelineEventKind::Superseded { by: doc.superseded_by_id },
    ));
  } else if !doc.is_active && let Some(to) = doc.valid_to {
    out.push(event(to, TimelineEventKind::Deactivated));
  }

  if let Some(at) = doc.deleted_at {
    out.push(event(at, TimelineEventKind::Deleted));
  }

  out
}

/// Flatten every document's lifecycle into one chronologically ordered list.
pub fn build_timeline(docs: &[Document]) -> Vec<TimelineEvent> {
  let mut events: Vec<TimelineEvent> = docs.iter().flat_map(events_for).collect();
  events.sort_by(|a, b| {
    (a.at, a.version_number, a.kind.rank())
      .cmp(&(b.at, b.version_number, b.kind.rank()))
  });
  events
}
