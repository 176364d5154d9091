//! View models returned by repository queries that don't map 1:1 onto a
//! domain entity.

use serde::{Deserialize, Serialize};

/// Per-owner dashboard counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
}
