//! Canonical entity kinds that legacy rows are loaded into.

use serde::{Deserialize, Serialize};

/// The canonical entity a legacy row is resolved to.
///
/// "Document" mappings in a job configuration target [`TargetEntity::Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEntity {
    Client,
    Business,
    Transaction,
}

impl TargetEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Business => "business",
            Self::Transaction => "transaction",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Self::Client),
            "business" => Some(Self::Business),
            "transaction" | "document" => Some(Self::Transaction),
            _ => None,
        }
    }

    /// Inference order; earlier entries win ties.
    pub const ORDERED: [TargetEntity; 3] = [Self::Client, Self::Business, Self::Transaction];

    /// Fields whose absence lowers a record's quality score.
    ///
    /// Clients and businesses use name, contact and entity type. Transactions
    /// carry none of those, so their date, amount and description stand in.
    pub fn important_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Client | Self::Business => &["name", "email", "type"],
            Self::Transaction => &["date", "amount", "description"],
        }
    }
}

impl std::fmt::Display for TargetEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
