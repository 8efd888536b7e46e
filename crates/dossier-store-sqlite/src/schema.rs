//! SQL schema for the Dossier SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per document version. Rows are only ever updated by the store's
-- lifecycle operations; a superseded row is frozen apart from deletion marks.
CREATE TABLE IF NOT EXISTS documents (
    document_id               TEXT PRIMARY KEY,
    tenant_id                 TEXT NOT NULL,
    owner_type                TEXT NOT NULL,   -- EntityKind tag
    owner_id                  TEXT NOT NULL,
    document_type             TEXT NOT NULL,
    category                  TEXT NOT NULL,
    file_name                 TEXT NOT NULL,
    file_path                 TEXT NOT NULL,   -- key in the external byte store
    mime_type                 TEXT NOT NULL,
    size_bytes                INTEGER NOT NULL,
    checksum                  TEXT NOT NULL,
    status                    TEXT NOT NULL DEFAULT 'pending',
    is_active                 INTEGER NOT NULL DEFAULT 0,
    valid_from                TEXT,            -- fixed-width RFC 3339 UTC
    valid_to                  TEXT,
    superseded_by_id          TEXT REFERENCES documents(document_id) ON DELETE SET NULL,
    previous_version_id       TEXT REFERENCES documents(document_id) ON DELETE SET NULL,
    version_number            INTEGER NOT NULL DEFAULT 1,
    replacement_reason        TEXT,
    replacement_authorized_by TEXT,
    uploaded_by               TEXT,
    reviewed_by               TEXT,
    reviewed_at               TEXT,
    review_notes              TEXT,
    created_at                TEXT NOT NULL,
    updated_at                TEXT NOT NULL,
    deleted_at                TEXT,
    CHECK (is_active IN (0, 1)),
    CHECK (version_number >= 1),
    CHECK (is_active = 0 OR valid_to IS NULL),
    CHECK (superseded_by_id IS NULL OR superseded_by_id != document_id),
    CHECK (status != 'superseded' OR (is_active = 0 AND valid_to IS NOT NULL))
);

-- The Active Document Pattern: at most one active row per (owner, type).
CREATE UNIQUE INDEX IF NOT EXISTS documents_one_active_idx
    ON documents(owner_type, owner_id, document_type)
    WHERE is_active = 1;

CREATE INDEX IF NOT EXISTS documents_slot_active_idx
    ON documents(owner_type, owner_id, document_type, is_active);
CREATE INDEX IF NOT EXISTS documents_validity_idx
    ON documents(owner_type, owner_id, document_type, valid_from, valid_to);
CREATE INDEX IF NOT EXISTS documents_superseded_by_idx
    ON documents(superseded_by_id);
CREATE INDEX IF NOT EXISTS documents_previous_version_idx
    ON documents(previous_version_id);

CREATE TABLE IF NOT EXISTS documentable_relations (
    relation_id      TEXT PRIMARY KEY,
    tenant_id        TEXT NOT NULL,
    document_id      TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    relatable_type   TEXT NOT NULL,
    relatable_id     TEXT NOT NULL,
    relation_context TEXT NOT NULL,   -- 'ownership' | 'usage' | 'reference'
    notes            TEXT,
    created_at       TEXT NOT NULL,
    deleted_at       TEXT,
    UNIQUE (document_id, relatable_type, relatable_id, relation_context),
    CHECK  (relation_context IN ('ownership', 'usage', 'reference'))
);

CREATE INDEX IF NOT EXISTS relations_relatable_idx
    ON documentable_relations(relatable_type, relatable_id, relation_context);

PRAGMA user_version = 1;
";

/// Name of the partial unique index, as it appears in SQLite's constraint
/// error messages (which list the indexed columns).
pub const ONE_ACTIVE_COLUMNS: &str =
  "documents.owner_type, documents.owner_id, documents.document_type";
