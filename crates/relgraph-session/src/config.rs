//! Session configuration.

use relgraph_core::IsolationLevel;
use serde::{Deserialize, Serialize};

/// What happens to has-many children when their container is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Children stay in place, still carrying the deleted container's id.
    #[default]
    Orphan,
    /// Children are deleted first, recursively.
    Cascade,
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub delete_policy: DeletePolicy,
    /// Isolation of the transaction opened for each graph write.
    #[serde(skip)]
    pub isolation: IsolationLevel,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delete policy.
    pub fn delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Set the isolation level for write transactions.
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }
}
