//! Builder configuration
//!
//! A [`PlanConfig`] is created once and shared, read-only, by every builder
//! in a tree.

use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// How builders generate ids for steps that were not given one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random UUID v4
    #[default]
    Uuid,
    /// ULID (lexicographically sortable by creation time)
    Ulid,
}

impl IdStrategy {
    /// Generate a fresh id
    #[must_use]
    pub fn generate(self) -> String {
        match self {
            Self::Uuid => Uuid::new_v4().to_string(),
            Self::Ulid => Ulid::new().to_string(),
        }
    }
}

/// Shared construction options for a builder tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Id generation strategy
    pub id_strategy: IdStrategy,
    /// Prefix prepended to every generated id
    pub id_prefix: Option<String>,
}

impl PlanConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With id strategy
    #[inline]
    #[must_use]
    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// With id prefix
    #[inline]
    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Generate a step id according to this configuration
    #[must_use]
    pub fn generate_id(&self) -> String {
        let id = self.id_strategy.generate();
        match &self.id_prefix {
            Some(prefix) => format!("{prefix}{id}"),
            None => id,
        }
    }
}
