use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::{FieldValue, Fields};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeMetadata {
    pub created_by: String,
    pub version: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    pub is_public: bool,
    pub notifications_enabled: bool,
    pub theme: String,
}

/// The disposable record written to verify write/read connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeDocument {
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub status: String,
    pub metadata: ProbeMetadata,
    pub settings: ProbeSettings,
}

impl ProbeDocument {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            title: "Test Document".to_string(),
            description: "This is a test document created by the test script".to_string(),
            timestamp,
            user_id: "test_user_123".to_string(),
            status: "active".to_string(),
            metadata: ProbeMetadata {
                created_by: "test_script".to_string(),
                version: "1.0".to_string(),
                tags: vec![
                    "test".to_string(),
                    "development".to_string(),
                    "flutter-app".to_string(),
                ],
            },
            settings: ProbeSettings {
                is_public: false,
                notifications_enabled: true,
                theme: "default".to_string(),
            },
        }
    }

    /// Probe stamped with the current time
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn to_fields(&self) -> Fields {
        let mut metadata = Fields::new();
        metadata.insert("created_by".to_string(), self.metadata.created_by.as_str().into());
        metadata.insert("version".to_string(), self.metadata.version.as_str().into());
        metadata.insert(
            "tags".to_string(),
            FieldValue::Array(self.metadata.tags.iter().map(|t| t.as_str().into()).collect()),
        );

        let mut settings = Fields::new();
        settings.insert("is_public".to_string(), self.settings.is_public.into());
        settings.insert(
            "notifications_enabled".to_string(),
            self.settings.notifications_enabled.into(),
        );
        settings.insert("theme".to_string(), self.settings.theme.as_str().into());

        let mut fields = Fields::new();
        fields.insert("title".to_string(), self.title.as_str().into());
        fields.insert("description".to_string(), self.description.as_str().into());
        fields.insert("timestamp".to_string(), self.timestamp.into());
        fields.insert("user_id".to_string(), self.user_id.as_str().into());
        fields.insert("status".to_string(), self.status.as_str().into());
        fields.insert("metadata".to_string(), FieldValue::Map(metadata));
        fields.insert("settings".to_string(), FieldValue::Map(settings));
        fields
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Compares a read-back document against this one.
    ///
    /// Every field must match exactly except `timestamp`, which only has to
    /// be present: the store may truncate its precision.
    pub fn verify(&self, read_back: &Value) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let expected = self.to_json();

        if let Value::Object(expected) = &expected {
            for (key, expected_value) in expected {
                let actual = read_back.get(key);
                if key == "timestamp" {
                    if actual.map_or(true, Value::is_null) {
                        report.missing.push(key.clone());
                    }
                    continue;
                }
                compare_value(key, expected_value, actual, &mut report);
            }
        }

        report
    }
}

fn compare_value(path: &str, expected: &Value, actual: Option<&Value>, report: &mut IntegrityReport) {
    let Some(actual) = actual else {
        report.missing.push(path.to_string());
        return;
    };

    match expected {
        Value::Object(fields) => {
            for (key, nested) in fields {
                compare_value(&format!("{}.{}", path, key), nested, actual.get(key), report);
            }
        }
        _ if expected != actual => report.mismatched.push(FieldMismatch {
            field: path.to_string(),
            expected: expected.clone(),
            actual: actual.clone(),
        }),
        _ => {}
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: Value,
    pub actual: Value,
}

/// Outcome of comparing the written probe with what came back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    pub missing: Vec<String>,
    pub mismatched: Vec<FieldMismatch>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}
