//! Merge decisions and the decider capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use keyword_types::{Keyword, KeywordId};

use crate::error::DecisionError;

/// What to do with one secondary of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MergeDecision {
    /// Fold the secondary into the primary, optionally renaming the result
    Merge {
        #[serde(default)]
        keyword: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// Keep the secondary as a distinct keyword under a new name
    Rename {
        keyword: String,
        #[serde(default)]
        description: Option<String>,
    },
    /// Leave both untouched
    Skip,
}

impl MergeDecision {
    /// Short label for logs.
    pub fn action(&self) -> &'static str {
        match self {
            MergeDecision::Merge { .. } => "merge",
            MergeDecision::Rename { .. } => "rename",
            MergeDecision::Skip => "skip",
        }
    }

    /// Build a decision from loosely structured fields, as returned by a
    /// language model. `action` is case-insensitive; `rename` requires a
    /// keyword.
    pub fn from_parts(
        action: &str,
        keyword: Option<String>,
        description: Option<String>,
    ) -> Result<Self, DecisionError> {
        match action.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(MergeDecision::Merge {
                keyword,
                description,
            }),
            "rename" => {
                let keyword = keyword.ok_or_else(|| {
                    DecisionError::Malformed("rename without keyword".to_string())
                })?;
                Ok(MergeDecision::Rename {
                    keyword,
                    description,
                })
            }
            "skip" => Ok(MergeDecision::Skip),
            other => Err(DecisionError::Malformed(format!("unknown action '{other}'"))),
        }
    }
}

/// Latest identity of a cluster's surviving keyword.
///
/// Threaded through the per-cluster fold: after each merge it carries the
/// merged name and description so the next decision compares against them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySnapshot {
    pub id: KeywordId,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Keyword> for PrimarySnapshot {
    fn from(keyword: &Keyword) -> Self {
        Self {
            id: keyword.id,
            name: keyword.name.clone(),
            description: keyword.description.clone(),
        }
    }
}

/// Judges whether a secondary duplicates the primary.
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(
        &self,
        primary: &PrimarySnapshot,
        secondary: &Keyword,
    ) -> Result<MergeDecision, DecisionError>;
}
