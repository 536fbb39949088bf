//! Casting queue data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::task::Task;

/// Operator action on a casting entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CastingAction {
    Pin,
    Unpin,
    Promote,
    Delete,
}

impl CastingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CastingAction::Pin => "PIN",
            CastingAction::Unpin => "UNPIN",
            CastingAction::Promote => "PROMOTE",
            CastingAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for CastingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CastingAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PIN" => Ok(CastingAction::Pin),
            "UNPIN" => Ok(CastingAction::Unpin),
            "PROMOTE" => Ok(CastingAction::Promote),
            "DELETE" => Ok(CastingAction::Delete),
            other => Err(format!("unknown casting action: {}", other)),
        }
    }
}

/// A finished task shown on the public display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastingEntry {
    pub id: String,
    /// Set member, `casting:<code>`.
    pub name: String,
    pub task: Task,
    /// Insertion time in epoch milliseconds; unique within a type.
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// Paging parameters for [`CastingQueue::list`](super::CastingQueue::list).
#[derive(Debug, Clone, Default)]
pub struct CastingListQuery {
    /// Case-insensitive substring of the entry name.
    pub keyword: Option<String>,
    /// Only entries with a score at or below this anchor.
    pub score: Option<i64>,
    pub page_size: usize,
    /// One-based page number.
    pub page_num: usize,
}

/// One page of casting entries, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct CastingPage {
    pub items: Vec<CastingEntry>,
    pub total: usize,
    pub has_more: bool,
    /// Anchor to pass back for the following pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    pub page_size: usize,
    pub page_num: usize,
}
