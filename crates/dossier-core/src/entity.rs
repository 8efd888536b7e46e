//! Opaque references to the business entities documents belong to.
//!
//! The engine never resolves these. An owner or relatable is a kind tag plus
//! an identifier issued by whichever service owns that entity.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};
use uuid::Uuid;

/// The kind of business entity a reference points at. The snake_case string
/// form is what gets persisted in `*_type` columns.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Applicant,
  Guarantor,
  LoanApplication,
  CreditDecision,
  Disbursement,
  Organization,
  StaffMember,
}

/// A typed, opaque pointer to a business entity.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct EntityRef {
  pub kind: EntityKind,
  pub id:   Uuid,
}

impl EntityRef {
  pub fn new(kind: EntityKind, id: Uuid) -> Self { Self { kind, id } }

  pub fn applicant(id: Uuid) -> Self { Self::new(EntityKind::Applicant, id) }

  pub fn loan_application(id: Uuid) -> Self {
    Self::new(EntityKind::LoanApplication, id)
  }

  pub fn credit_decision(id: Uuid) -> Self {
    Self::new(EntityKind::CreditDecision, id)
  }
}

impl fmt::Display for EntityRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind.as_ref(), self.id)
  }
}
