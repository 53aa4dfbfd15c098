//! Dotted-path node identifiers.
//!
//! A `NodeId` such as `1.2.3` names a position in the proof tree. The parent
//! is the path minus its last segment, and the root is always `1`. Segments
//! are positive integers, so zero is unrepresentable via `NonZeroU32`.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("node id must not be empty")]
    Empty,
    #[error("node id '{input}' contains whitespace")]
    Whitespace { input: String },
    #[error("node id '{input}' has invalid segment '{segment}' (expected a positive integer)")]
    InvalidSegment { input: String, segment: String },
    #[error("node id '{input}' must start at the root '1'")]
    NotRooted { input: String },
}

/// Ordering is numeric and segment-wise: `1.2 < 1.10`, and a parent sorts
/// before all of its descendants.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(Vec<NonZeroU32>);

const ROOT_SEGMENT: NonZeroU32 = NonZeroU32::MIN;

impl NodeId {
    #[must_use]
    pub fn root() -> Self {
        Self(vec![ROOT_SEGMENT])
    }

    pub fn parse(input: &str) -> Result<Self, NodeIdError> {
        if input.is_empty() {
            return Err(NodeIdError::Empty);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(NodeIdError::Whitespace {
                input: input.to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in input.split('.') {
            // `u32::from_str` accepts a leading '+', which is not a valid path.
            let parsed = if segment.bytes().all(|b| b.is_ascii_digit()) {
                segment.parse::<NonZeroU32>().ok()
            } else {
                None
            };
            match parsed {
                Some(value) => segments.push(value),
                None => {
                    return Err(NodeIdError::InvalidSegment {
                        input: input.to_string(),
                        segment: segment.to_string(),
                    });
                }
            }
        }

        if segments[0] != ROOT_SEGMENT {
            return Err(NodeIdError::NotRooted {
                input: input.to_string(),
            });
        }
        Ok(Self(segments))
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.to_string()
    }
}
