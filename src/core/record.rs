//! Feature records and group schemas

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Platform naming rule shared by feature groups, pipelines, and models
const NAME_PATTERN: &str = r"^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,63}$";

/// Check a name against the platform naming rule
pub fn is_valid_resource_name(name: &str) -> bool {
    Regex::new(NAME_PATTERN)
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

/// Scalar type of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Integral,
    Fractional,
    String,
}

/// A typed scalar feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Integral(i64),
    Fractional(f64),
    String(String),
}

impl FeatureValue {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            FeatureValue::Integral(_) => FeatureType::Integral,
            FeatureValue::Fractional(_) => FeatureType::Fractional,
            FeatureValue::String(_) => FeatureType::String,
        }
    }

    /// Coerce a JSON value into a feature value of the declared type
    pub fn from_json(feature_type: FeatureType, value: &serde_json::Value) -> Result<Self> {
        match (feature_type, value) {
            (FeatureType::Integral, serde_json::Value::Number(n)) => n
                .as_i64()
                .map(FeatureValue::Integral)
                .ok_or_else(|| anyhow::anyhow!("{} is not an integral value", n)),
            // JSON integers are accepted for fractional features
            (FeatureType::Fractional, serde_json::Value::Number(n)) => n
                .as_f64()
                .map(FeatureValue::Fractional)
                .ok_or_else(|| anyhow::anyhow!("{} is not a fractional value", n)),
            (FeatureType::String, serde_json::Value::String(s)) => {
                Ok(FeatureValue::String(s.clone()))
            }
            (expected, other) => anyhow::bail!(
                "expected a {:?} value, got {}",
                expected,
                other
            ),
        }
    }

    /// Render the value as the platform's wire string
    pub fn as_wire(&self) -> String {
        match self {
            FeatureValue::Integral(v) => v.to_string(),
            FeatureValue::Fractional(v) => v.to_string(),
            FeatureValue::String(v) => v.clone(),
        }
    }
}

/// A single feature declaration in a group schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub feature_type: FeatureType,
}

/// Feature group declaration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureGroupConfig {
    /// Group name (platform naming rule applies)
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Feature holding the mandatory unique record identifier
    pub record_identifier: String,

    /// Feature holding the mandatory event timestamp
    pub event_time_feature: String,

    /// Declared features
    pub features: Vec<FeatureDefinition>,

    /// Whether the low-latency key-value side is enabled
    #[serde(default = "default_true")]
    pub online_store: bool,

    /// Whether the bulk analytical side is enabled
    #[serde(default = "default_true")]
    pub offline_store: bool,

    /// Override for the offline table name (defaults to `<name>_offline`)
    #[serde(default)]
    pub offline_table: Option<String>,
}

fn default_true() -> bool {
    true
}

impl FeatureGroupConfig {
    /// Load a feature group declaration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a feature group declaration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FeatureGroupConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the declaration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_resource_name(&self.name) {
            anyhow::bail!("Invalid feature group name: {}", self.name);
        }

        let mut seen = std::collections::HashSet::new();
        for feature in &self.features {
            if !is_valid_resource_name(&feature.name) {
                anyhow::bail!("Invalid feature name: {}", feature.name);
            }
            if !seen.insert(&feature.name) {
                anyhow::bail!("Duplicate feature: {}", feature.name);
            }
        }

        let id_feature = self.feature(&self.record_identifier).ok_or_else(|| {
            anyhow::anyhow!(
                "Record identifier '{}' is not a declared feature",
                self.record_identifier
            )
        })?;
        if id_feature.feature_type == FeatureType::Fractional {
            anyhow::bail!(
                "Record identifier '{}' may not be fractional",
                self.record_identifier
            );
        }

        // The platform accepts ISO-8601 strings or epoch seconds for event times
        let time_feature = self.feature(&self.event_time_feature).ok_or_else(|| {
            anyhow::anyhow!(
                "Event time feature '{}' is not a declared feature",
                self.event_time_feature
            )
        })?;
        if time_feature.feature_type == FeatureType::Integral {
            anyhow::bail!(
                "Event time feature '{}' must be a string or fractional feature",
                self.event_time_feature
            );
        }

        if !self.online_store && !self.offline_store {
            anyhow::bail!(
                "Feature group '{}' must enable the online store, the offline store, or both",
                self.name
            );
        }

        Ok(())
    }

    /// Look up a declared feature by name
    pub fn feature(&self, name: &str) -> Option<&FeatureDefinition> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Offline table name used in join queries
    pub fn offline_table_name(&self) -> String {
        self.offline_table
            .clone()
            .unwrap_or_else(|| format!("{}_offline", self.name.replace('-', "_")))
    }

    /// Declared feature names, in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }
}

/// One named field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub value: FeatureValue,
}

/// A row submitted to (or read back from) a feature group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fields: Vec<RecordField>,
}

impl Record {
    pub fn new(fields: Vec<(String, FeatureValue)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| RecordField { name, value })
                .collect(),
        }
    }

    /// Parse one JSON-lines object into a record, coercing values per the schema
    pub fn from_json_line(schema: &FeatureGroupConfig, line: &str) -> Result<Self> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line)?;

        let mut fields = Vec::with_capacity(object.len());
        for (name, value) in &object {
            let definition = schema.feature(name).ok_or_else(|| {
                anyhow::anyhow!("'{}' is not a feature of group '{}'", name, schema.name)
            })?;
            let value = FeatureValue::from_json(definition.feature_type, value)
                .map_err(|e| anyhow::anyhow!("feature '{}': {}", name, e))?;
            fields.push(RecordField {
                name: name.clone(),
                value,
            });
        }

        let record = Self { fields };
        record.validate_against(schema)?;
        Ok(record)
    }

    /// Check the record against a group schema
    pub fn validate_against(&self, schema: &FeatureGroupConfig) -> Result<()> {
        for field in &self.fields {
            let definition = schema.feature(&field.name).ok_or_else(|| {
                anyhow::anyhow!(
                    "'{}' is not a feature of group '{}'",
                    field.name,
                    schema.name
                )
            })?;
            if field.value.feature_type() != definition.feature_type {
                anyhow::bail!(
                    "Feature '{}' expects {:?}, got {:?}",
                    field.name,
                    definition.feature_type,
                    field.value.feature_type()
                );
            }
        }

        if self.get(&schema.record_identifier).is_none() {
            anyhow::bail!(
                "Record is missing its identifier feature '{}'",
                schema.record_identifier
            );
        }
        if self.get(&schema.event_time_feature).is_none() {
            anyhow::bail!(
                "Record is missing its event time feature '{}'",
                schema.event_time_feature
            );
        }

        Ok(())
    }

    /// Get a field value by feature name
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    /// The record identifier value, rendered as a wire string
    pub fn identifier(&self, schema: &FeatureGroupConfig) -> Option<String> {
        self.get(&schema.record_identifier).map(|v| v.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers_schema() -> FeatureGroupConfig {
        FeatureGroupConfig::from_yaml(
            r#"
name: "customers"
record_identifier: "customer-id"
event_time_feature: "event-time"
features:
  - name: "customer-id"
    type: string
  - name: "event-time"
    type: fractional
  - name: "age"
    type: integral
  - name: "city"
    type: string
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_resource_names() {
        assert!(is_valid_resource_name("customers"));
        assert!(is_valid_resource_name("churn-features-v2"));
        assert!(!is_valid_resource_name("-leading-dash"));
        assert!(!is_valid_resource_name("has spaces"));
        assert!(!is_valid_resource_name(""));
    }

    #[test]
    fn test_schema_parses_and_validates() {
        let schema = customers_schema();
        assert_eq!(schema.features.len(), 4);
        assert!(schema.online_store);
        assert_eq!(schema.offline_table_name(), "customers_offline");
    }

    #[test]
    fn test_schema_rejects_unknown_record_identifier() {
        let result = FeatureGroupConfig::from_yaml(
            r#"
name: "customers"
record_identifier: "missing"
event_time_feature: "event-time"
features:
  - name: "event-time"
    type: fractional
"#,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("missing"));
    }

    #[test]
    fn test_schema_rejects_integral_event_time() {
        let result = FeatureGroupConfig::from_yaml(
            r#"
name: "customers"
record_identifier: "id"
event_time_feature: "event-time"
features:
  - name: "id"
    type: string
  - name: "event-time"
    type: integral
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_record_from_json_line() {
        let schema = customers_schema();
        let record = Record::from_json_line(
            &schema,
            r#"{"customer-id": "c-1", "event-time": 1719772800.0, "age": 31, "city": "Lisbon"}"#,
        )
        .unwrap();

        assert_eq!(
            record.get("age"),
            Some(&FeatureValue::Integral(31))
        );
        assert_eq!(record.identifier(&schema), Some("c-1".to_string()));
    }

    #[test]
    fn test_record_integral_accepted_for_fractional() {
        let schema = customers_schema();
        // event-time is fractional; a plain JSON integer should coerce
        let record = Record::from_json_line(
            &schema,
            r#"{"customer-id": "c-2", "event-time": 1719772800, "age": 40, "city": "Porto"}"#,
        )
        .unwrap();
        assert_eq!(
            record.get("event-time"),
            Some(&FeatureValue::Fractional(1719772800.0))
        );
    }

    #[test]
    fn test_record_missing_identifier_rejected() {
        let schema = customers_schema();
        let result =
            Record::from_json_line(&schema, r#"{"event-time": 1.0, "age": 5, "city": "x"}"#);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("customer-id"));
    }

    #[test]
    fn test_record_type_mismatch_rejected() {
        let schema = customers_schema();
        let result = Record::from_json_line(
            &schema,
            r#"{"customer-id": "c-3", "event-time": 1.0, "age": "not-a-number", "city": "x"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_record_unknown_feature_rejected() {
        let schema = customers_schema();
        let result = Record::from_json_line(
            &schema,
            r#"{"customer-id": "c-4", "event-time": 1.0, "shoe-size": 43}"#,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("shoe-size"));
    }
}
