//! Lifecycle enumerations shared by the ledger payloads and projected state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    NodeType,
    NodeStatus,
    ChallengeStatus,
    ChallengeOutcome,
    Severity,
    PendingDefStatus,
}

impl EnumKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EnumKind::NodeType => "node type",
            EnumKind::NodeStatus => "node status",
            EnumKind::ChallengeStatus => "challenge status",
            EnumKind::ChallengeOutcome => "challenge outcome",
            EnumKind::Severity => "severity",
            EnumKind::PendingDefStatus => "pending definition status",
        }
    }
}

impl fmt::Display for EnumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value '{raw}'; expected one of: {expected:?}")]
pub struct EnumParseError {
    kind: EnumKind,
    raw: String,
    expected: &'static [&'static str],
}

impl EnumParseError {
    #[must_use]
    pub const fn kind(&self) -> EnumKind {
        self.kind
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

fn parse_enum<T: Copy>(
    kind: EnumKind,
    raw: &str,
    table: &[(&'static str, T)],
    expected: &'static [&'static str],
) -> Result<T, EnumParseError> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    table
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, value)| *value)
        .ok_or_else(|| EnumParseError {
            kind,
            raw: raw.to_string(),
            expected,
        })
}

// ── Node ─────────────────────────────────────────────────────

/// Logical role of a proof step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Claim,
    LocalAssume,
    LocalDischarge,
    Case,
    Qed,
}

const NODE_TYPES: &[(&str, NodeType)] = &[
    ("claim", NodeType::Claim),
    ("local_assume", NodeType::LocalAssume),
    ("local_discharge", NodeType::LocalDischarge),
    ("case", NodeType::Case),
    ("qed", NodeType::Qed),
];
const NODE_TYPE_NAMES: &[&str] = &["claim", "local_assume", "local_discharge", "case", "qed"];

impl NodeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeType::Claim => "claim",
            NodeType::LocalAssume => "local_assume",
            NodeType::LocalDischarge => "local_discharge",
            NodeType::Case => "case",
            NodeType::Qed => "qed",
        }
    }
}

impl FromStr for NodeType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(EnumKind::NodeType, s, NODE_TYPES, NODE_TYPE_NAMES)
    }
}

/// Where a node sits in its lifecycle.
///
/// ```text
/// Unclaimed -> Claimed -> Refined | Accepted -> Challenged -> Admitted | Refuted
///     ^           |                                                 |
///     +-----------+ (release / lease expiry)        any non-terminal -> Archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Unclaimed,
    Claimed,
    Refined,
    Accepted,
    Challenged,
    Admitted,
    Refuted,
    Archived,
}

const NODE_STATUSES: &[(&str, NodeStatus)] = &[
    ("unclaimed", NodeStatus::Unclaimed),
    ("claimed", NodeStatus::Claimed),
    ("refined", NodeStatus::Refined),
    ("accepted", NodeStatus::Accepted),
    ("challenged", NodeStatus::Challenged),
    ("admitted", NodeStatus::Admitted),
    ("refuted", NodeStatus::Refuted),
    ("archived", NodeStatus::Archived),
];
const NODE_STATUS_NAMES: &[&str] = &[
    "unclaimed",
    "claimed",
    "refined",
    "accepted",
    "challenged",
    "admitted",
    "refuted",
    "archived",
];

impl NodeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Unclaimed => "unclaimed",
            NodeStatus::Claimed => "claimed",
            NodeStatus::Refined => "refined",
            NodeStatus::Accepted => "accepted",
            NodeStatus::Challenged => "challenged",
            NodeStatus::Admitted => "admitted",
            NodeStatus::Refuted => "refuted",
            NodeStatus::Archived => "archived",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Archived)
    }
}

impl FromStr for NodeStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(EnumKind::NodeStatus, s, NODE_STATUSES, NODE_STATUS_NAMES)
    }
}

// ── Challenge ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Open,
    Resolved,
    Withdrawn,
}

impl ChallengeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Open => "open",
            ChallengeStatus::Resolved => "resolved",
            ChallengeStatus::Withdrawn => "withdrawn",
        }
    }
}

/// How a resolved challenge settled its target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOutcome {
    /// The objection was answered; the node stands.
    Admitted,
    /// The objection was upheld; the node is refuted.
    Refuted,
}

const OUTCOMES: &[(&str, ChallengeOutcome)] = &[
    ("admitted", ChallengeOutcome::Admitted),
    ("refuted", ChallengeOutcome::Refuted),
];
const OUTCOME_NAMES: &[&str] = &["admitted", "refuted"];

impl ChallengeOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChallengeOutcome::Admitted => "admitted",
            ChallengeOutcome::Refuted => "refuted",
        }
    }

    #[must_use]
    pub const fn node_status(self) -> NodeStatus {
        match self {
            ChallengeOutcome::Admitted => NodeStatus::Admitted,
            ChallengeOutcome::Refuted => NodeStatus::Refuted,
        }
    }
}

impl FromStr for ChallengeOutcome {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(EnumKind::ChallengeOutcome, s, OUTCOMES, OUTCOME_NAMES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    #[default]
    Major,
    Minor,
    Note,
}

const SEVERITIES: &[(&str, Severity)] = &[
    ("critical", Severity::Critical),
    ("major", Severity::Major),
    ("minor", Severity::Minor),
    ("note", Severity::Note),
];
const SEVERITY_NAMES: &[&str] = &["critical", "major", "minor", "note"];

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Note => "note",
        }
    }
}

impl FromStr for Severity {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(EnumKind::Severity, s, SEVERITIES, SEVERITY_NAMES)
    }
}

// ── Pending definition ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingDefStatus {
    Pending,
    Resolved,
    Cancelled,
}

impl PendingDefStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PendingDefStatus::Pending => "pending",
            PendingDefStatus::Resolved => "resolved",
            PendingDefStatus::Cancelled => "cancelled",
        }
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

display_via_as_str!(
    NodeType,
    NodeStatus,
    ChallengeStatus,
    ChallengeOutcome,
    Severity,
    PendingDefStatus,
);
