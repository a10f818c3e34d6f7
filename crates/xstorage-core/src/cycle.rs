// ── Polling cycle outcome ──
//
// Per-endpoint reduction of raw responses into snapshot fields, and the
// pass/fail verdict for a whole cycle.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use xstorage_api::{Endpoint, FetchError};

use crate::catalog::CatalogEntry;
use crate::error::CoreError;
use crate::snapshot::{Snapshot, is_empty_value};

/// Collapse one endpoint response into its snapshot field.
///
/// - failure → `{}`
/// - `{"successful": false, ..}` → `{}`
/// - mapping with `result` → that value, `null` becoming `{}`
/// - non-empty mapping without `result` → the mapping unchanged
/// - anything else (`null`, `{}`, arrays, scalars) → `{}`
pub fn reduce(outcome: Result<Value, FetchError>) -> Value {
    let Ok(Value::Object(mut body)) = outcome else {
        return empty();
    };

    if body.get("successful") == Some(&Value::Bool(false)) {
        return empty();
    }

    match body.remove("result") {
        Some(Value::Null) => empty(),
        Some(result) => result,
        None if body.is_empty() => empty(),
        None => Value::Object(body),
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

// ── CycleResult ──────────────────────────────────────────────────────

/// Everything one polling tick produced, before it is committed.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub snapshot: Snapshot,
    /// Required endpoints that yielded no data. Non-empty means failure.
    pub failed_required: Vec<Endpoint>,
    /// Optional endpoints that yielded no data.
    pub degraded: Vec<Endpoint>,
}

impl CycleResult {
    /// Reduce joined endpoint outcomes, in catalog order.
    pub fn from_outcomes(
        outcomes: Vec<(&CatalogEntry, Result<Value, FetchError>)>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let mut fields = IndexMap::with_capacity(outcomes.len());
        let mut failed_required = Vec::new();
        let mut degraded = Vec::new();

        for (entry, outcome) in outcomes {
            if let Err(ref e) = outcome {
                if entry.required {
                    warn!(endpoint = %entry.name, error = %e, "required endpoint failed");
                } else {
                    debug!(endpoint = %entry.name, error = %e, "optional endpoint failed");
                }
            }

            let value = reduce(outcome);
            if is_empty_value(&value) {
                if entry.required {
                    failed_required.push(entry.name);
                } else {
                    degraded.push(entry.name);
                }
            }
            fields.insert(entry.name, value);
        }

        Self {
            snapshot: Snapshot::new(fields, fetched_at),
            failed_required,
            degraded,
        }
    }

    pub fn success(&self) -> bool {
        self.failed_required.is_empty()
    }

    /// The retryable error for a failed cycle.
    pub fn error(&self) -> Option<CoreError> {
        if self.success() {
            return None;
        }
        Some(CoreError::UpdateFailed {
            endpoints: self
                .failed_required
                .iter()
                .map(|e| e.name().to_owned())
                .collect(),
        })
    }
}

// ── CycleState ───────────────────────────────────────────────────────

/// Coordinator state observable by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CycleState {
    #[default]
    Idle,
    Fetching,
    Succeeded { at: DateTime<Utc> },
    Failed { at: DateTime<Utc>, endpoints: Vec<String> },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use xstorage_api::{AccountType, FetchErrorKind};

    use super::*;
    use crate::catalog::EndpointCatalog;

    fn failure() -> Result<Value, FetchError> {
        Err(FetchError {
            kind: FetchErrorKind::Status,
            message: "boom".into(),
            status: Some(500),
        })
    }

    #[test]
    fn result_key_is_unwrapped() {
        assert_eq!(reduce(Ok(json!({"result": {"a": 1}}))), json!({"a": 1}));
        assert_eq!(reduce(Ok(json!({"successful": true, "result": [1, 2]}))), json!([1, 2]));
        assert_eq!(reduce(Ok(json!({"result": 0}))), json!(0));
        assert_eq!(reduce(Ok(json!({"result": null}))), json!({}));
    }

    #[test]
    fn mapping_without_result_passes_through() {
        assert_eq!(reduce(Ok(json!({"x": 5}))), json!({"x": 5}));
    }

    #[test]
    fn empty_and_non_mapping_bodies_become_empty_object() {
        for body in [json!(null), json!({}), json!([]), json!([1]), json!(""), json!(0), json!("ok")] {
            assert_eq!(reduce(Ok(body)), json!({}));
        }
        assert_eq!(reduce(failure()), json!({}));
    }

    #[test]
    fn failure_object_reduces_to_empty() {
        assert_eq!(
            reduce(Ok(json!({"successful": false, "error": "nope", "status": 500}))),
            json!({})
        );
    }

    #[test]
    fn required_failure_fails_the_cycle() {
        let catalog = EndpointCatalog::for_account(AccountType::Customer);
        let outcomes = catalog
            .entries()
            .iter()
            .map(|entry| {
                let outcome = if entry.name == Endpoint::Device {
                    failure()
                } else {
                    Ok(json!({"result": {"ok": true}}))
                };
                (entry, outcome)
            })
            .collect();

        let cycle = CycleResult::from_outcomes(outcomes, Utc::now());

        assert!(!cycle.success());
        assert_eq!(cycle.failed_required, vec![Endpoint::Device]);
        assert!(matches!(
            cycle.error(),
            Some(CoreError::UpdateFailed { endpoints }) if endpoints == vec!["device".to_owned()]
        ));
    }

    #[test]
    fn optional_failure_is_degraded_but_successful() {
        let catalog = EndpointCatalog::for_account(AccountType::Customer);
        let outcomes = catalog
            .entries()
            .iter()
            .map(|entry| {
                let outcome = if entry.name == Endpoint::Schedule {
                    failure()
                } else {
                    Ok(json!({"result": {"ok": true}}))
                };
                (entry, outcome)
            })
            .collect();

        let cycle = CycleResult::from_outcomes(outcomes, Utc::now());

        assert!(cycle.success());
        assert!(cycle.error().is_none());
        assert_eq!(cycle.degraded, vec![Endpoint::Schedule]);
        assert_eq!(cycle.snapshot.get(Endpoint::Schedule), Some(&json!({})));
        let order: Vec<_> = cycle.snapshot.fields().keys().copied().collect();
        let expected: Vec<_> = catalog.entries().iter().map(|e| e.name).collect();
        assert_eq!(order, expected);
    }
}
