//! Read-after-write consistency checks.
//!
//! After a create or update the platform may keep serving the old state for a
//! while. A [`ConsistencyCheck`] remembers what was written and compares every
//! re-read against it, turning a mismatch into a retryable error so the read
//! loop polls until the platform catches up.

use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ProviderError;
use crate::retry::RetryError;
use crate::types::equivalent_json;

/// Number of mismatching reads tolerated before the check fails terminally.
pub const DEFAULT_CONSISTENCY_CHECKS: u32 = 5;

/// How a tracked field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Compared as plain JSON values.
    Plain,
    /// A string holding a JSON document; compared after decoding.
    JsonString,
}

/// Compares re-read state against the state just written.
#[derive(Debug)]
pub struct ConsistencyCheck {
    resource: String,
    expected: Map<String, Value>,
    fields: Vec<(String, FieldKind)>,
    max_checks: u32,
    checks: AtomicU32,
    enabled: bool,
}

impl ConsistencyCheck {
    /// Track `fields` of the desired state written for `resource`.
    pub fn new(
        resource: impl Into<String>,
        desired: &Value,
        fields: &[(&str, FieldKind)],
    ) -> Self {
        let expected = desired.as_object().cloned().unwrap_or_default();
        Self {
            resource: resource.into(),
            expected,
            fields: fields
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
            max_checks: DEFAULT_CONSISTENCY_CHECKS,
            checks: AtomicU32::new(0),
            enabled: true,
        }
    }

    /// A check that accepts any state, for plain refresh reads.
    pub fn disabled() -> Self {
        Self {
            resource: String::new(),
            expected: Map::new(),
            fields: Vec::new(),
            max_checks: 0,
            checks: AtomicU32::new(0),
            enabled: false,
        }
    }

    /// Override the number of tolerated mismatches.
    pub fn with_max_checks(mut self, max_checks: u32) -> Self {
        self.max_checks = max_checks;
        self
    }

    /// Whether this check compares anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Compare freshly read state against the written state.
    ///
    /// Only fields set in the desired state are compared, so values the
    /// platform computes never count as drift.
    pub fn check(&self, actual: &Value) -> Result<(), RetryError> {
        if !self.enabled {
            return Ok(());
        }

        for (name, kind) in &self.fields {
            let Some(want) = self.expected.get(name).filter(|v| !is_unset(v)) else {
                continue;
            };
            let got = actual.get(name).unwrap_or(&Value::Null);
            let matches = match kind {
                FieldKind::Plain => want == got,
                FieldKind::JsonString => equivalent_json(want, got),
            };
            if matches {
                continue;
            }

            let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            let message = format!(
                "mismatch on attribute {} of {}: expected {}, got {}",
                name, self.resource, want, got
            );
            debug!(checks, max = self.max_checks, "{}", message);

            return if checks >= self.max_checks {
                Err(RetryError::non_retryable(ProviderError::Consistency(message)))
            } else {
                Err(RetryError::retryable(ProviderError::Consistency(message)))
            };
        }
        Ok(())
    }
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[(&str, FieldKind)] = &[
        ("name", FieldKind::Plain),
        ("description", FieldKind::Plain),
        ("skill_conditions", FieldKind::JsonString),
    ];

    #[test]
    fn test_matching_state_passes() {
        let desired = json!({"name": "Support", "description": "", "skill_conditions": "[{\"a\":1}]"});
        let cc = ConsistencyCheck::new("genesyscloud_routing_skill_group", &desired, FIELDS);

        let actual = json!({"name": "Support", "description": "from api", "skill_conditions": "[ {\"a\": 1} ]"});
        assert!(cc.check(&actual).is_ok());
    }

    #[test]
    fn test_mismatch_is_retryable_until_exhausted() {
        let desired = json!({"name": "New name"});
        let cc = ConsistencyCheck::new("genesyscloud_routing_skill_group", &desired, FIELDS)
            .with_max_checks(3);
        let stale = json!({"name": "Old name"});

        assert!(matches!(cc.check(&stale), Err(RetryError::Retryable(_))));
        assert!(matches!(cc.check(&stale), Err(RetryError::Retryable(_))));
        match cc.check(&stale) {
            Err(RetryError::NonRetryable(ProviderError::Consistency(msg))) => {
                assert!(msg.contains("name"));
                assert!(msg.contains("Old name"));
            },
            other => panic!("expected terminal consistency error, got {:?}", other),
        }
    }

    #[test]
    fn test_untracked_and_unset_fields_ignored() {
        let desired = json!({"name": "Support", "division_id": "d1"});
        let cc = ConsistencyCheck::new("res", &desired, FIELDS);
        assert!(cc.check(&json!({"name": "Support", "division_id": "other"})).is_ok());
    }

    #[test]
    fn test_disabled_accepts_anything() {
        let cc = ConsistencyCheck::disabled();
        assert!(!cc.is_enabled());
        assert!(cc.check(&json!({"name": "whatever"})).is_ok());
    }
}
