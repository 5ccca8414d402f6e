//! A `String` newtype that expands `${ENV_VAR}` references against the
//! process environment at deserialization time.
//!
//! Intended for use inside `#[serde(deserialize_with = "...")]` fields or
//! wrapped directly (`DynamicString`) where a configuration value may be
//! given literally or sourced from an environment variable, e.g.
//! `api_key = "${OPENAI_API_KEY}"`.

use std::{env, fmt};

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::sync::LazyLock;

static PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// A string value that may embed `${VAR}` placeholders, expanded against
/// `std::env` the moment the value is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicString(pub String);

impl DynamicString {
    /// Expand all `${VAR}` occurrences in `raw` using the process environment.
    ///
    /// Returns an error naming the first missing variable encountered.
    pub fn expand(raw: &str) -> Result<String, String> {
        let mut missing = None;

        let expanded = PATTERN.replace_all(raw, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match env::var(name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(format!("environment variable '{name}' is not set")),
            None => Ok(expanded.into_owned()),
        }
    }

    /// The variable names referenced by `raw`, in order of first appearance.
    pub fn referenced_vars(raw: &str) -> Vec<String> {
        PATTERN
            .captures_iter(raw)
            .map(|caps| caps[1].to_string())
            .unique()
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DynamicString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DynamicString> for String {
    fn from(value: DynamicString) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for DynamicString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let expanded = DynamicString::expand(&raw).map_err(de::Error::custom)?;
        Ok(DynamicString(expanded))
    }
}

impl Serialize for DynamicString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_env::with_var;

    #[test]
    fn expands_known_variable() {
        with_var("RCX_TEST_KEY", Some("secret-value"), || {
            assert_eq!(DynamicString::expand("${RCX_TEST_KEY}").unwrap(), "secret-value");
        });
    }

    #[test]
    fn passes_through_literal_values() {
        assert_eq!(DynamicString::expand("plain-value").unwrap(), "plain-value");
    }

    #[test]
    fn errors_on_missing_variable() {
        let err = DynamicString::expand("${RCX_DEFINITELY_UNSET_VAR}").unwrap_err();
        assert!(err.contains("RCX_DEFINITELY_UNSET_VAR"));
    }

    #[test]
    fn deserializes_from_toml() {
        with_var("RCX_TEST_TOML_KEY", Some("abc123"), || {
            #[derive(Deserialize)]
            struct Wrapper {
                key: DynamicString,
            }

            let parsed: Wrapper = toml::from_str(r#"key = "${RCX_TEST_TOML_KEY}""#).unwrap();
            assert_eq!(parsed.key.as_str(), "abc123");
        });
    }

    #[test]
    fn referenced_vars_dedupes_in_order() {
        let vars = DynamicString::referenced_vars("${A}-${B}-${A}");
        assert_eq!(vars, vec!["A".to_string(), "B".to_string()]);
    }
}
