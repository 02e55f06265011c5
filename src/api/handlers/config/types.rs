//! Request/response types for config and sync endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub data: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfigWriteRequest {
    pub data: Option<serde_json::Value>,
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct SyncParams {
    /// Last observed `updatedAt` cursor, RFC 3339.
    pub since: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn config_response_serializes_camel_case() -> Result<()> {
        let response = ConfigResponse {
            data: Some(json!({"theme": "dark"})),
            updated_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("updated_at").is_none());
        Ok(())
    }

    #[test]
    fn config_response_nulls_when_absent() -> Result<()> {
        let response = ConfigResponse {
            data: None,
            updated_at: None,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value, json!({"data": null, "updatedAt": null}));
        Ok(())
    }

    #[test]
    fn config_write_request_accepts_missing_data() -> Result<()> {
        let request: ConfigWriteRequest = serde_json::from_str("{}")?;
        assert!(request.data.is_none());
        let request: ConfigWriteRequest = serde_json::from_str(r#"{"data": {"a": 1}}"#)?;
        assert_eq!(request.data, Some(json!({"a": 1})));
        Ok(())
    }
}
