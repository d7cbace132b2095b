//! Category shortcuts: pick a preset by what the operation does.
//!
//! | category  | preset         | label        |
//! |-----------|----------------|--------------|
//! | network   | `aggressive`   | `"network"`  |
//! | database  | `default`      | `"database"` |
//! | upload    | `conservative` | `"upload"`   |
//!
//! These are thin wrappers over [`RetryCoordinator::run_labeled`]; they add no
//! behavior beyond choosing the policy and the observer label.

use crate::cancel::CancelToken;
use crate::classify::Classify;
use crate::coordinator::RetryCoordinator;
use crate::error::RetryOutcome;
use crate::policy::{Preset, RetryPolicy};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// Kind of work being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCategory {
    Network,
    /// Database or storage writes.
    Database,
    Upload,
}

impl OperationCategory {
    pub const fn preset(self) -> Preset {
        match self {
            OperationCategory::Network => Preset::Aggressive,
            OperationCategory::Database => Preset::Default,
            OperationCategory::Upload => Preset::Conservative,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            OperationCategory::Network => "network",
            OperationCategory::Database => "database",
            OperationCategory::Upload => "upload",
        }
    }

    pub fn policy(self) -> RetryPolicy {
        self.preset().policy()
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OperationCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(OperationCategory::Network),
            "database" | "storage" => Ok(OperationCategory::Database),
            "upload" => Ok(OperationCategory::Upload),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Returned when parsing an unrecognised category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation category: {0}")]
pub struct UnknownCategory(pub String);

impl<C> RetryCoordinator<C> {
    /// Run `operation` with the policy and label of `category`.
    pub async fn run_category<T, E, Op, Fut>(
        &self,
        category: OperationCategory,
        cancel: &CancelToken,
        operation: Op,
    ) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let policy = category.policy();
        self.run_labeled(category.label(), &policy, cancel, operation).await
    }

    /// Network calls: aggressive preset.
    pub async fn retry_network_operation<T, E, Op, Fut>(&self, operation: Op) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_category(OperationCategory::Network, &CancelToken::never(), operation).await
    }

    /// Database and storage writes: default preset.
    pub async fn retry_database_operation<T, E, Op, Fut>(&self, operation: Op) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_category(OperationCategory::Database, &CancelToken::never(), operation).await
    }

    /// Uploads: conservative preset.
    pub async fn retry_upload_operation<T, E, Op, Fut>(&self, operation: Op) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        E: fmt::Display,
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_category(OperationCategory::Upload, &CancelToken::never(), operation).await
    }
}
