//! Resource domain types

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Prefix of a credential-manager placeholder such as `((github-token))`.
const PLACEHOLDER_PREFIX: &str = "((";

/// One pipeline resource definition as reported by the CI API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub webhook_token: String,
}

impl ResourceConfig {
    /// Whether the resource can be triggered through the webhook endpoint.
    pub fn has_webhook_token(&self) -> bool {
        !self.webhook_token.is_empty()
    }

    /// Whether the resource type is one of `types`.
    pub fn is_type(&self, types: &[&str]) -> bool {
        types.contains(&self.resource_type.as_str())
    }
}

/// Free-form resource source configuration.
///
/// Values come straight from pipeline YAML, so any JSON shape is possible.
/// Matching code only goes through the typed accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(BTreeMap<String, JsonValue>);

impl Source {
    pub fn new(values: BTreeMap<String, JsonValue>) -> Self {
        Self(values)
    }

    /// Returns the string value for `key`.
    ///
    /// Non-string values and secret placeholders yield `None`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            JsonValue::String(s) if !is_placeholder(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the string entries of the list stored under `key`.
    ///
    /// Non-string list entries are skipped; a missing key or a non-list
    /// value yields `None`.
    pub fn get_str_list(&self, key: &str) -> Option<Vec<&str>> {
        match self.0.get(key)? {
            JsonValue::Array(items) => Some(items.iter().filter_map(JsonValue::as_str).collect()),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for Source {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Whether `value` is a credential-manager placeholder rather than a literal.
pub fn is_placeholder(value: &str) -> bool {
    value.trim_start().starts_with(PLACEHOLDER_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_str_skips_placeholders() {
        let source: Source = [("uri", json!("((repo-uri))")), ("branch", json!("main"))]
            .into_iter()
            .collect();

        assert_eq!(source.get_str("uri"), None);
        assert_eq!(source.get_str("branch"), Some("main"));
        assert_eq!(source.get_str("missing"), None);
    }

    #[test]
    fn test_get_str_list() {
        let source: Source = [
            ("paths", json!(["src/", 7, "docs/*.md"])),
            ("branch", json!("main")),
        ]
        .into_iter()
        .collect();

        assert_eq!(source.get_str_list("paths"), Some(vec!["src/", "docs/*.md"]));
        assert_eq!(source.get_str_list("branch"), None);
    }

    #[test]
    fn test_resource_deserializes_without_token() {
        let resource: ResourceConfig = serde_json::from_value(json!({
            "name": "repo",
            "type": "git",
            "source": { "uri": "https://git.example/org/app" }
        }))
        .unwrap();

        assert!(!resource.has_webhook_token());
        assert!(resource.is_type(&["git", "git-proxy"]));
    }
}
