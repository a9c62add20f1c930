//! Case lifecycle: status state machine, case types, and department routing
//!
//! The status workflow is a fixed directed acyclic set of transitions:
//!
//! ```text
//! Pending ──▶ In Review ──▶ In Mediation ──▶ Resolved
//!    │            │              │
//!    └──────────▶ Closed ◀──────┘
//! ```
//!
//! Resolved and Closed are terminal. The assigned department is derived from
//! the case type at submission time and never changes afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaseStatus {
    #[default]
    Pending,
    #[serde(rename = "In Review")]
    InReview,
    #[serde(rename = "In Mediation")]
    InMediation,
    Resolved,
    Closed,
}

impl CaseStatus {
    /// All statuses, in workflow order
    pub const ALL: [CaseStatus; 5] = [
        CaseStatus::Pending,
        CaseStatus::InReview,
        CaseStatus::InMediation,
        CaseStatus::Resolved,
        CaseStatus::Closed,
    ];

    /// Whether no further transitions are allowed out of this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Resolved | CaseStatus::Closed)
    }

    /// Parse the wire representation ("In Review" etc.)
    pub fn parse(s: &str) -> Option<CaseStatus> {
        match s {
            "Pending" => Some(CaseStatus::Pending),
            "In Review" => Some(CaseStatus::InReview),
            "In Mediation" => Some(CaseStatus::InMediation),
            "Resolved" => Some(CaseStatus::Resolved),
            "Closed" => Some(CaseStatus::Closed),
            _ => None,
        }
    }

    /// Wire representation, matching the serde renames
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "Pending",
            CaseStatus::InReview => "In Review",
            CaseStatus::InMediation => "In Mediation",
            CaseStatus::Resolved => "Resolved",
            CaseStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a requested status transition against the workflow table.
///
/// Self-transitions are not in the table and are rejected like any other
/// missing edge.
pub fn allowed_transition(from: CaseStatus, to: CaseStatus) -> bool {
    use CaseStatus::*;
    matches!(
        (from, to),
        (Pending, InReview)
            | (Pending, Closed)
            | (InReview, InMediation)
            | (InReview, Resolved)
            | (InReview, Closed)
            | (InMediation, Resolved)
            | (InMediation, Closed)
    )
}

/// Dispute category chosen at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseType {
    Consumer,
    Employment,
    Contract,
    Property,
    Family,
    Other,
}

impl CaseType {
    pub fn parse(s: &str) -> Option<CaseType> {
        match s {
            "consumer" => Some(CaseType::Consumer),
            "employment" => Some(CaseType::Employment),
            "contract" => Some(CaseType::Contract),
            "property" => Some(CaseType::Property),
            "family" => Some(CaseType::Family),
            "other" => Some(CaseType::Other),
            _ => None,
        }
    }

    /// Fixed mapping from case type to the admin department that handles it
    pub fn department(&self) -> &'static str {
        match self {
            CaseType::Consumer => "Consumer Affairs",
            CaseType::Employment => "Employment",
            CaseType::Contract => "Contracts",
            CaseType::Property => "Property",
            CaseType::Family => "Family Services",
            CaseType::Other => "General Disputes",
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaseType::Consumer => "consumer",
            CaseType::Employment => "employment",
            CaseType::Contract => "contract",
            CaseType::Property => "property",
            CaseType::Family => "family",
            CaseType::Other => "other",
        };
        f.write_str(s)
    }
}

/// Urgency declared by the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    pub fn parse(s: &str) -> Option<Urgency> {
        match s {
            "low" => Some(Urgency::Low),
            "medium" => Some(Urgency::Medium),
            "high" => Some(Urgency::High),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use CaseStatus::*;

        // Every edge in the workflow
        assert!(allowed_transition(Pending, InReview));
        assert!(allowed_transition(Pending, Closed));
        assert!(allowed_transition(InReview, InMediation));
        assert!(allowed_transition(InReview, Resolved));
        assert!(allowed_transition(InReview, Closed));
        assert!(allowed_transition(InMediation, Resolved));
        assert!(allowed_transition(InMediation, Closed));

        // Representative missing edges
        assert!(!allowed_transition(Pending, Resolved));
        assert!(!allowed_transition(Pending, InMediation));
        assert!(!allowed_transition(InMediation, InReview));
        assert!(!allowed_transition(InMediation, Pending));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [CaseStatus::Resolved, CaseStatus::Closed] {
            assert!(from.is_terminal());
            for to in CaseStatus::ALL {
                assert!(!allowed_transition(from, to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for s in CaseStatus::ALL {
            assert!(!allowed_transition(s, s));
        }
    }

    #[test]
    fn test_status_wire_format_roundtrip() {
        for s in CaseStatus::ALL {
            assert_eq!(CaseStatus::parse(s.as_str()), Some(s));
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
        }
        assert_eq!(CaseStatus::parse("pending"), None);
        assert_eq!(CaseStatus::parse("InReview"), None);
    }

    #[test]
    fn test_department_mapping() {
        assert_eq!(CaseType::Consumer.department(), "Consumer Affairs");
        assert_eq!(CaseType::Employment.department(), "Employment");
        assert_eq!(CaseType::Family.department(), "Family Services");
        assert_eq!(CaseType::Other.department(), "General Disputes");
    }

    #[test]
    fn test_case_type_parse() {
        assert_eq!(CaseType::parse("consumer"), Some(CaseType::Consumer));
        assert_eq!(CaseType::parse("Consumer"), None);
        assert_eq!(CaseType::parse("lawsuit"), None);
    }

    #[test]
    fn test_urgency_default_is_medium() {
        assert_eq!(Urgency::default(), Urgency::Medium);
    }
}
