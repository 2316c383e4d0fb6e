//! Shared status types following Kubernetes API conventions

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Scheduled)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Whether status, reason and message all match, ignoring the timestamp
    pub fn same_observation(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Insert or update a condition by type.
///
/// `lastTransitionTime` only moves when the status flips. Returns `false`
/// when the existing condition already records the same observation, so
/// callers can skip the write.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.same_observation(&condition) => false,
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scheduled(status: ConditionStatus, reason: &str) -> Condition {
        Condition::new("Scheduled", status, reason, "msg")
    }

    #[test]
    fn set_condition_appends_new_type() {
        let mut conditions = Vec::new();
        assert!(set_condition(
            &mut conditions,
            scheduled(ConditionStatus::False, "CapacityExhausted")
        ));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn set_condition_is_noop_for_same_observation() {
        let mut conditions = vec![scheduled(ConditionStatus::False, "CapacityExhausted")];
        let before = conditions.clone();

        let changed = set_condition(
            &mut conditions,
            scheduled(ConditionStatus::False, "CapacityExhausted"),
        );

        assert!(!changed);
        assert_eq!(conditions, before);
    }

    #[test]
    fn transition_time_moves_only_when_status_flips() {
        let mut original = scheduled(ConditionStatus::False, "CapacityExhausted");
        original.last_transition_time = Utc::now() - Duration::hours(1);
        let mut conditions = vec![original.clone()];

        // Same status, different reason: keeps the original timestamp
        assert!(set_condition(
            &mut conditions,
            scheduled(ConditionStatus::False, "InvalidSpec")
        ));
        assert_eq!(
            conditions[0].last_transition_time,
            original.last_transition_time
        );
        assert_eq!(conditions[0].reason, "InvalidSpec");

        // Status flip: timestamp moves forward
        assert!(set_condition(
            &mut conditions,
            scheduled(ConditionStatus::True, "UnitCreated")
        ));
        assert!(conditions[0].last_transition_time > original.last_transition_time);
    }

    #[test]
    fn condition_serializes_with_kubernetes_field_names() {
        let json = serde_json::to_value(scheduled(ConditionStatus::True, "UnitCreated")).unwrap();
        assert_eq!(json["type"], "Scheduled");
        assert_eq!(json["status"], "True");
        assert!(json.get("lastTransitionTime").is_some());
    }
}
