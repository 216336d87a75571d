//! Loader errors and per-file load reports.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("reading rules: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule file is not valid YAML for the rules schema: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A structurally valid rule that cannot be evaluated as written.
    #[error("invalid rule: {0}")]
    Validation(String),

    #[error("watching rules directory: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// What happened to one file during a directory scan.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

impl LoadResult {
    pub(crate) fn skipped(path: PathBuf, reason: &str) -> Self {
        Self {
            path,
            status: LoadStatus::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    pub(crate) fn failed(path: PathBuf, error: String) -> Self {
        Self {
            path,
            status: LoadStatus::Failed { error },
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum LoadStatus {
    /// `rule_ids` are the enabled rules the file contributed.
    Loaded { rule_ids: Vec<String>, disabled: usize },
    Skipped { reason: String },
    /// The whole file was rejected; none of its rules are active.
    Failed { error: String },
}
