//! Login records as they move through the pipeline.
//!
//! `RawRecord` is the parsed message body, `SanitizedRecord` the same record
//! with its PII masked, and `PersistedRow` the normalized row written to
//! `user_logins`.

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::codec;
use crate::db::schema::user_logins;
use crate::error::EtlError;

/// Literal stored when a record carries no locale
pub const DEFAULT_LOCALE: &str = "None";

/// Fields that must be present for a record to be masked
pub const REQUIRED_FIELDS: [&str; 2] = ["ip", "device_id"];

/// Parsed message body
///
/// Keys other than the six known ones are accepted and dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    pub ip: String,
    #[serde(default)]
    pub locale: Option<String>,
    pub device_id: String,
}

impl RawRecord {
    /// Parse a message body
    ///
    /// # Arguments
    /// * `position` - 1-based position of the message in its batch, used in errors
    /// * `body` - JSON-encoded message body, as delivered by the queue
    ///
    /// Every known field must have the expected type, not only `ip` and
    /// `device_id`: a numeric `user_id` or `app_version` rejects the whole
    /// message.
    ///
    /// # Errors
    /// * `MissingField` if `ip` or `device_id` is absent or null
    /// * `InvalidMessage` if the body is not UTF-8, is not a JSON object, or
    ///   any of `user_id`, `app_version`, `device_type`, `locale`, `ip`,
    ///   `device_id` is not a string
    pub fn parse(position: usize, body: impl AsRef<[u8]>) -> Result<Self, EtlError> {
        let body = std::str::from_utf8(body.as_ref()).map_err(|e| EtlError::InvalidMessage {
            position,
            reason: format!("body is not valid UTF-8: {}", e),
        })?;

        let value: JsonValue = serde_json::from_str(body).map_err(|e| EtlError::InvalidMessage {
            position,
            reason: format!("body is not valid JSON: {}", e),
        })?;

        let object = value.as_object().ok_or_else(|| EtlError::InvalidMessage {
            position,
            reason: "body is not a JSON object".to_string(),
        })?;

        for field in REQUIRED_FIELDS {
            if object.get(field).map_or(true, JsonValue::is_null) {
                return Err(EtlError::MissingField { position, field });
            }
        }

        serde_json::from_value(value).map_err(|e| EtlError::InvalidMessage {
            position,
            reason: format!("unexpected field type: {}", e),
        })
    }

    /// Mask `ip` and `device_id`
    pub fn sanitize(self, position: usize) -> SanitizedRecord {
        SanitizedRecord {
            position,
            user_id: self.user_id,
            app_version: self.app_version,
            device_type: self.device_type,
            masked_ip: codec::encode(&self.ip),
            locale: self.locale,
            masked_device_id: codec::encode(&self.device_id),
        }
    }
}

/// Record with its PII masked, waiting to be loaded
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedRecord {
    /// 1-based position of the source message in the batch
    pub position: usize,
    pub user_id: Option<String>,
    pub app_version: Option<String>,
    pub device_type: Option<String>,
    pub masked_ip: String,
    pub locale: Option<String>,
    pub masked_device_id: String,
}

impl SanitizedRecord {
    /// Normalize the record into the row written to `user_logins`
    ///
    /// Steps run in a fixed order: locale default, date stamp, then version
    /// truncation. `create_date` is always `today`, never a value from the
    /// message.
    pub fn into_row(self, today: NaiveDate) -> Result<PersistedRow, EtlError> {
        let locale = self.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let create_date = today;

        let app_version = self
            .app_version
            .as_deref()
            .and_then(truncate_version)
            .ok_or_else(|| EtlError::MalformedVersion {
                position: self.position,
                value: self.app_version.clone(),
            })?;

        Ok(PersistedRow {
            user_id: self.user_id,
            app_version,
            device_type: self.device_type,
            masked_ip: self.masked_ip,
            locale,
            masked_device_id: self.masked_device_id,
            create_date,
        })
    }
}

/// Row inserted into `user_logins`, fields in column order
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = user_logins)]
pub struct PersistedRow {
    pub user_id: Option<String>,
    pub app_version: i32,
    pub device_type: Option<String>,
    pub masked_ip: String,
    pub locale: String,
    pub masked_device_id: String,
    pub create_date: NaiveDate,
}

/// Integer portion of a dotted version string
///
/// `"12.4.1"` gives `Some(12)`. Returns `None` when there is no `.` or the
/// prefix is not an integer.
pub fn truncate_version(version: &str) -> Option<i32> {
    let (major, _) = version.split_once('.')?;
    major.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn sanitized(app_version: Option<&str>, locale: Option<&str>) -> SanitizedRecord {
        SanitizedRecord {
            position: 1,
            user_id: Some("424cdd21-063a-43a7-b91b-7ca1a833afae".to_string()),
            app_version: app_version.map(String::from),
            device_type: Some("android".to_string()),
            masked_ip: codec::encode("199.172.111.135"),
            locale: locale.map(String::from),
            masked_device_id: codec::encode("593-47-5928"),
        }
    }

    #[test]
    fn test_parse_full_body() {
        let body = r#"{"user_id": "u1", "app_version": "2.3.0", "device_type": "android",
            "ip": "199.172.111.135", "locale": "RU", "device_id": "593-47-5928", "extra": 1}"#;

        let record = RawRecord::parse(1, body).unwrap();
        assert_eq!(record.ip, "199.172.111.135");
        assert_eq!(record.device_id, "593-47-5928");
        assert_eq!(record.locale.as_deref(), Some("RU"));
    }

    #[test]
    fn test_parse_missing_required_field() {
        let err = RawRecord::parse(2, r#"{"ip": "1.2.3.4"}"#).unwrap_err();
        assert!(matches!(err, EtlError::MissingField { position: 2, field: "device_id" }));

        let err = RawRecord::parse(5, r#"{"device_id": "x"}"#).unwrap_err();
        assert!(matches!(err, EtlError::MissingField { position: 5, field: "ip" }));

        let err = RawRecord::parse(1, r#"{"ip": null, "device_id": "x"}"#).unwrap_err();
        assert!(matches!(err, EtlError::MissingField { field: "ip", .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_bodies() {
        assert!(matches!(
            RawRecord::parse(1, "not json").unwrap_err(),
            EtlError::InvalidMessage { position: 1, .. }
        ));
        assert!(matches!(
            RawRecord::parse(1, "[1, 2]").unwrap_err(),
            EtlError::InvalidMessage { .. }
        ));
        assert!(matches!(
            RawRecord::parse(1, r#"{"ip": 12, "device_id": "x"}"#).unwrap_err(),
            EtlError::InvalidMessage { .. }
        ));
        assert!(matches!(
            RawRecord::parse(1, r#"{"user_id": 42, "ip": "1.2.3.4", "device_id": "x"}"#).unwrap_err(),
            EtlError::InvalidMessage { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_non_utf8_body() {
        let body = b"{\"ip\": \"10.0.0.\xff\", \"device_id\": \"d\xfe\"}";

        let err = RawRecord::parse(4, body).unwrap_err();
        match err {
            EtlError::InvalidMessage { position, reason } => {
                assert_eq!(position, 4);
                assert!(reason.contains("UTF-8"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_masks_pii() {
        let record = RawRecord::parse(3, r#"{"ip": "199.172.111.135", "device_id": "593-47-5928"}"#).unwrap();
        let sanitized = record.sanitize(3);

        assert_eq!(sanitized.position, 3);
        assert_eq!(sanitized.masked_ip, "MTk5LjE3Mi4xMTEuMTM1");
        assert_eq!(sanitized.masked_device_id, "NTkzLTQ3LTU5Mjg=");
        assert_eq!(codec::decode(&sanitized.masked_ip).unwrap(), "199.172.111.135");
    }

    #[test]
    fn test_truncate_version() {
        assert_eq!(truncate_version("12.4.1"), Some(12));
        assert_eq!(truncate_version("2.3.0"), Some(2));
        assert_eq!(truncate_version("0.1"), Some(0));
        assert_eq!(truncate_version("7"), None);
        assert_eq!(truncate_version(".5"), None);
        assert_eq!(truncate_version("v1.2"), None);
    }

    #[test]
    fn test_into_row_defaults_locale() {
        let row = sanitized(Some("12.4.1"), None).into_row(today()).unwrap();
        assert_eq!(row.locale, "None");
        assert_eq!(row.app_version, 12);
        assert_eq!(row.create_date, today());
    }

    #[test]
    fn test_into_row_keeps_present_locale() {
        let row = sanitized(Some("1.0"), Some("PH")).into_row(today()).unwrap();
        assert_eq!(row.locale, "PH");
    }

    #[test]
    fn test_into_row_rejects_version_without_dot() {
        let err = sanitized(Some("7"), Some("PH")).into_row(today()).unwrap_err();
        match err {
            EtlError::MalformedVersion { position, value } => {
                assert_eq!(position, 1);
                assert_eq!(value.as_deref(), Some("7"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = sanitized(None, None).into_row(today()).unwrap_err();
        assert!(matches!(err, EtlError::MalformedVersion { value: None, .. }));
    }
}
