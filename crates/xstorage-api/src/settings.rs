// Settings write path
//
// `GET /api/settings` returns `country`, `city` and `timezone` as
// composite objects, while `PUT /api/settings` only accepts their scalar
// ids. Every settings write therefore starts from the current settings,
// flattened.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{FetchError, FetchErrorKind};
use crate::session::SessionClient;

/// Replace the composite location fields with the ids `PUT` expects.
///
/// `country` and `city` become their `geonameId`, `timezone` its `id`.
/// A composite without the id field becomes `""`; scalars are left alone.
pub fn flatten_settings_for_put(mut settings: Map<String, Value>) -> Map<String, Value> {
    for (field, id_key) in [("country", "geonameId"), ("city", "geonameId"), ("timezone", "id")] {
        if let Some(Value::Object(composite)) = settings.get(field) {
            let id = composite
                .get(id_key)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            settings.insert(field.to_owned(), id);
        }
    }
    settings
}

impl SessionClient {
    /// Current settings, already flattened for a `PUT`.
    pub async fn fetch_settings_for_put(&self) -> Result<Map<String, Value>, FetchError> {
        let response = self.get_settings().await?;
        match response.get("result") {
            Some(Value::Object(current)) if !current.is_empty() => {
                Ok(flatten_settings_for_put(current.clone()))
            }
            _ => {
                warn!("failed to get current settings from device");
                Err(FetchError::new(
                    FetchErrorKind::Rejected,
                    "settings response carried no result",
                ))
            }
        }
    }

    /// Overlay `patch` on the current settings and write the result back.
    pub async fn update_settings_with(&self, patch: Map<String, Value>) -> Result<Value, FetchError> {
        let mut settings = self.fetch_settings_for_put().await?;
        debug!(fields = ?patch.keys().collect::<Vec<_>>(), "updating settings");
        settings.extend(patch);
        self.update_settings(&Value::Object(settings)).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn composites_collapse_to_ids() {
        let settings = object(json!({
            "country": {"geonameId": "2802361", "name": "Belgium"},
            "city": {"geonameId": "2800866", "name": "Brussels"},
            "timezone": {"id": "Europe/Brussels", "offset": "+01:00"},
            "maxPower": 3600,
        }));

        assert_eq!(
            Value::Object(flatten_settings_for_put(settings)),
            json!({
                "country": "2802361",
                "city": "2800866",
                "timezone": "Europe/Brussels",
                "maxPower": 3600,
            })
        );
    }

    #[test]
    fn scalars_and_missing_ids_are_handled() {
        let settings = object(json!({
            "country": "2802361",
            "city": {"name": "Nowhere"},
        }));

        assert_eq!(
            Value::Object(flatten_settings_for_put(settings)),
            json!({"country": "2802361", "city": ""})
        );
    }
}
