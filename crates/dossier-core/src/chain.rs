//! Supersession chains: the version history of one (owner, type) slot.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// The two rows touched by a supersession, as they were after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supersession {
  pub old: Document,
  pub new: Document,
}

/// `true` if the version numbers strictly increase along `chain`.
pub fn is_monotonic(chain: &[Document]) -> bool {
  chain
    .windows(2)
    .all(|w| w[0].version_number < w[1].version_number)
}
