//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::SharedError;

/// Unique identifier for an orchestrated dashboard session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, SharedError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SharedError::InvalidUuid { input: s.to_string() })
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Priority bucket a call belongs to. Buckets drain in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Important,
    Secondary,
    Background,
}

impl Priority {
    /// All buckets in their fixed drain order
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::Important,
        Priority::Secondary,
        Priority::Background,
    ];

    /// The bucket that must complete before this one becomes the current stage
    pub fn predecessor(self) -> Option<Priority> {
        match self {
            Priority::Critical => None,
            Priority::Important => Some(Priority::Critical),
            Priority::Secondary => Some(Priority::Important),
            Priority::Background => Some(Priority::Secondary),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Important => "important",
            Priority::Secondary => "secondary",
            Priority::Background => "background",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "important" => Ok(Priority::Important),
            "secondary" => Ok(Priority::Secondary),
            "background" => Ok(Priority::Background),
            other => Err(SharedError::InvalidConfig {
                field: "priority".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Session-wide stage. `Initial` precedes any registration; the rest mirror the buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Initial,
    Critical,
    Important,
    Secondary,
    Background,
}

impl From<Priority> for Stage {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Critical => Stage::Critical,
            Priority::Important => Stage::Important,
            Priority::Secondary => Stage::Secondary,
            Priority::Background => Stage::Background,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Initial => f.write_str("initial"),
            Stage::Critical => f.write_str("critical"),
            Stage::Important => f.write_str("important"),
            Stage::Secondary => f.write_str("secondary"),
            Stage::Background => f.write_str("background"),
        }
    }
}
