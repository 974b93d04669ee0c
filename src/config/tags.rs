//! Resolved stack tags.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

use super::render::stringify;

/// The resolved `tags` section for one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    /// Tag values keyed by tag name.
    values: BTreeMap<String, Value>,
}

/// One tag in the shape the stack provider expects.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tag {
    /// Tag key.
    #[serde(rename = "Key")]
    pub key: String,
    /// Tag value.
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tags {
    /// Wraps an already-interpolated `tags` section.
    #[must_use]
    pub const fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Returns one tag value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Iterates tags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no tags are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Projects the tags into the key/value records the stack provider
    /// consumes.
    #[must_use]
    pub fn to_list(&self) -> Vec<Tag> {
        self.values
            .iter()
            .map(|(key, value)| Tag {
                key: key.clone(),
                value: stringify(value).unwrap_or_else(|_| format!("{value:?}")),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_list_stringifies_values() {
        let mut values = BTreeMap::new();
        values.insert(String::from("environment"), Value::String(String::from("dev")));
        values.insert(String::from("cost_center"), serde_yaml::from_str("4200").unwrap());

        let tags = Tags::new(values);
        let list = tags.to_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].key, "cost_center");
        assert_eq!(list[0].value, "4200");
        assert_eq!(list[1].key, "environment");
        assert_eq!(list[1].value, "dev");
    }

    #[test]
    fn test_serialized_shape_matches_provider() {
        let tag = Tag {
            key: String::from("owner"),
            value: String::from("platform"),
        };
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "{\"Key\":\"owner\",\"Value\":\"platform\"}");
    }
}
