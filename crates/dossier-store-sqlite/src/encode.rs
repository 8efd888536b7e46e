//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that SQL string comparison orders them
//! chronologically. Enums are stored as their snake_case tags. UUIDs are
//! stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use dossier_core::{
  document::{Document, FileDescriptor},
  entity::EntityRef,
  relation::DocumentableRelation,
};
use rusqlite::Row;
use thiserror::Error;
use uuid::Uuid;

/// A column value that does not decode into its domain type.
#[derive(Debug, Error)]
#[error("cannot decode {column}: {message}")]
pub struct DecodeError {
  pub column:  &'static str,
  pub message: String,
}

impl DecodeError {
  fn new(column: &'static str, message: impl ToString) -> Self {
    Self { column, message: message.to_string() }
  }
}

type DecodeResult<T> = Result<T, DecodeError>;

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(column: &'static str, s: &str) -> DecodeResult<Uuid> {
  Uuid::parse_str(s).map_err(|e| DecodeError::new(column, e))
}

fn decode_opt_uuid(
  column: &'static str,
  s: Option<String>,
) -> DecodeResult<Option<Uuid>> {
  s.as_deref().map(|s| decode_uuid(column, s)).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The store's clock. Truncated to the precision the columns keep, so values
/// handed back to callers compare equal to what a later read returns.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(column: &'static str, s: &str) -> DecodeResult<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| DecodeError::new(column, e))
}

fn decode_opt_dt(
  column: &'static str,
  s: Option<String>,
) -> DecodeResult<Option<DateTime<Utc>>> {
  s.as_deref().map(|s| decode_dt(column, s)).transpose()
}

// ─── Enum tags ───────────────────────────────────────────────────────────────

pub fn decode_tag<T: FromStr>(column: &'static str, s: &str) -> DecodeResult<T> {
  T::from_str(s).map_err(|_| DecodeError::new(column, format!("unknown tag {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list for `documents` selected through the alias `d`. Every document
/// query selects exactly these, in this order, for [`RawDocument::from_row`].
pub const DOCUMENT_COLUMNS: &str = "
  d.document_id, d.tenant_id, d.owner_type, d.owner_id, d.document_type,
  d.category, d.file_name, d.file_path, d.mime_type, d.size_bytes, d.checksum,
  d.status, d.is_active, d.valid_from, d.valid_to, d.superseded_by_id,
  d.previous_version_id, d.version_number, d.replacement_reason,
  d.replacement_authorized_by, d.uploaded_by, d.reviewed_by, d.reviewed_at,
  d.review_notes, d.created_at, d.updated_at, d.deleted_at";

/// Raw values read directly from a `documents` row.
pub struct RawDocument {
  pub document_id:               String,
  pub tenant_id:                 String,
  pub owner_type:                String,
  pub owner_id:                  String,
  pub document_type:             String,
  pub category:                  String,
  pub file_name:                 String,
  pub file_path:                 String,
  pub mime_type:                 String,
  pub size_bytes:                i64,
  pub checksum:                  String,
  pub status:                    String,
  pub is_active:                 bool,
  pub valid_from:                Option<String>,
  pub valid_to:                  Option<String>,
  pub superseded_by_id:          Option<String>,
  pub previous_version_id:       Option<String>,
  pub version_number:            i64,
  pub replacement_reason:        Option<String>,
  pub replacement_authorized_by: Option<String>,
  pub uploaded_by:               Option<String>,
  pub reviewed_by:               Option<String>,
  pub reviewed_at:               Option<String>,
  pub review_notes:              Option<String>,
  pub created_at:                String,
  pub updated_at:                String,
  pub deleted_at:                Option<String>,
}

impl RawDocument {
  /// Read a row selected with [`DOCUMENT_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:               row.get(0)?,
      tenant_id:                 row.get(1)?,
      owner_type:                row.get(2)?,
      owner_id:                  row.get(3)?,
      document_type:             row.get(4)?,
      category:                  row.get(5)?,
      file_name:                 row.get(6)?,
      file_path:                 row.get(7)?,
      mime_type:                 row.get(8)?,
      size_bytes:                row.get(9)?,
      checksum:                  row.get(10)?,
      status:                    row.get(11)?,
      is_active:                 row.get(12)?,
      valid_from:                row.get(13)?,
      valid_to:                  row.get(14)?,
      superseded_by_id:          row.get(15)?,
      previous_version_id:       row.get(16)?,
      version_number:            row.get(17)?,
      replacement_reason:        row.get(18)?,
      replacement_authorized_by: row.get(19)?,
      uploaded_by:               row.get(20)?,
      reviewed_by:               row.get(21)?,
      reviewed_at:               row.get(22)?,
      review_notes:              row.get(23)?,
      created_at:                row.get(24)?,
      updated_at:                row.get(25)?,
      deleted_at:                row.get(26)?,
    })
  }

  pub fn into_document(self) -> DecodeResult<Document> {
    let owner = EntityRef {
      kind: decode_tag("owner_type", &self.owner_type)?,
      id:   decode_uuid("owner_id", &self.owner_id)?,
    };

    let version_number = u32::try_from(self.version_number)
      .map_err(|e| DecodeError::new("version_number", e))?;
    let size_bytes = u64::try_from(self.size_bytes)
      .map_err(|e| DecodeError::new("size_bytes", e))?;

    Ok(Document {
      document_id: decode_uuid("document_id", &self.document_id)?,
      tenant_id: decode_uuid("tenant_id", &self.tenant_id)?,
      owner,
      document_type: decode_tag("document_type", &self.document_type)?,
      category: decode_tag("category", &self.category)?,
      file: FileDescriptor {
        name: self.file_name,
        path: self.file_path,
        mime_type: self.mime_type,
        size_bytes,
        checksum: self.checksum,
      },
      status: decode_tag("status", &self.status)?,
      is_active: self.is_active,
      valid_from: decode_opt_dt("valid_from", self.valid_from)?,
      valid_to: decode_opt_dt("valid_to", self.valid_to)?,
      superseded_by_id: decode_opt_uuid(
        "superseded_by_id",
        self.superseded_by_id,
      )?,
      previous_version_id: decode_opt_uuid(
        "previous_version_id",
        self.previous_version_id,
      )?,
      version_number,
      replacement_reason: self.replacement_reason,
      replacement_authorized_by: decode_opt_uuid(
        "replacement_authorized_by",
        self.replacement_authorized_by,
      )?,
      uploaded_by: decode_opt_uuid("uploaded_by", self.uploaded_by)?,
      reviewed_by: decode_opt_uuid("reviewed_by", self.reviewed_by)?,
      reviewed_at: decode_opt_dt("reviewed_at", self.reviewed_at)?,
      review_notes: self.review_notes,
      created_at: decode_dt("created_at", &self.created_at)?,
      updated_at: decode_dt("updated_at", &self.updated_at)?,
      deleted_at: decode_opt_dt("deleted_at", self.deleted_at)?,
    })
  }
}

/// Column list for `documentable_relations` through the alias `r`.
pub const RELATION_COLUMNS: &str = "
  r.relation_id, r.tenant_id, r.document_id, r.relatable_type,
  r.relatable_id, r.relation_context, r.notes, r.created_at, r.deleted_at";

/// Raw values read directly from a `documentable_relations` row.
pub struct RawRelation {
  pub relation_id:      String,
  pub tenant_id:        String,
  pub document_id:      String,
  pub relatable_type:   String,
  pub relatable_id:     String,
  pub relation_context: String,
  pub notes:            Option<String>,
  pub created_at:       String,
  pub deleted_at:       Option<String>,
}

impl RawRelation {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relation_id:      row.get(0)?,
      tenant_id:        row.get(1)?,
      document_id:      row.get(2)?,
      relatable_type:   row.get(3)?,
      relatable_id:     row.get(4)?,
      relation_context: row.get(5)?,
      notes:            row.get(6)?,
      created_at:       row.get(7)?,
      deleted_at:       row.get(8)?,
    })
  }

  pub fn into_relation(self) -> DecodeResult<DocumentableRelation> {
    Ok(DocumentableRelation {
      relation_id: decode_uuid("relation_id", &self.relation_id)?,
      tenant_id:   decode_uuid("tenant_id", &self.tenant_id)?,
      document_id: decode_uuid("document_id", &self.document_id)?,
      relatable:   EntityRef {
        kind: decode_tag("relatable_type", &self.relatable_type)?,
        id:   decode_uuid("relatable_id", &self.relatable_id)?,
      },
      context:     decode_tag("relation_context", &self.relation_context)?,
      notes:       self.notes,
      created_at:  decode_dt("created_at", &self.created_at)?,
      deleted_at:  decode_opt_dt("deleted_at", self.deleted_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 9).unwrap();
    let b = a + chrono::Duration::milliseconds(500);
    let c = a + chrono::Duration::seconds(1);
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec, "{ea} {eb} {ec}");
    assert_eq!(ea.len(), ec.len());
  }

  #[test]
  fn timestamps_roundtrip_at_stored_precision() {
    let t = now();
    assert_eq!(decode_dt("t", &encode_dt(t)).unwrap(), t);
  }

  #[test]
  fn unknown_tag_is_a_decode_error() {
    let err = decode_tag::<dossier_core::document::DocumentType>(
      "document_type",
      "passport_scan",
    )
    .unwrap_err();
    assert_eq!(err.column, "document_type");
  }
}
