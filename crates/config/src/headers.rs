//! Declarative header transformation rules, applied by the `header-rules`
//! crate to outbound provider requests (C2/C3) and usable anywhere a
//! request needs per-target header overrides.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_dynamic_string::DynamicString;

/// One header transformation. Rules of the same kind for the same target
/// are applied in configuration order; `Insert`/`RenameDuplicate` can
/// override a header set by an earlier `Forward`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case", deny_unknown_fields)]
pub enum HeaderRule {
    /// Copy a header from the inbound request onto the outbound request.
    Forward(HeaderForward),
    /// Set a header to a fixed (possibly `${ENV}`-expanded) value.
    Insert(HeaderInsert),
    /// Drop a header before sending.
    Remove(HeaderRemove),
    /// Copy a header under a new name, keeping the original.
    RenameDuplicate(HeaderRenameDuplicate),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderForward {
    pub name: NameOrPattern,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub rename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderInsert {
    pub name: String,
    pub value: DynamicString,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRemove {
    pub name: NameOrPattern,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRenameDuplicate {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
    pub rename: String,
}

/// Either a literal header name or a regex pattern matching several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NameOrPattern {
    Name(String),
    Pattern(NamePattern),
}

impl NameOrPattern {
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Name(name) => name.eq_ignore_ascii_case(candidate),
            Self::Pattern(pattern) => pattern.is_match(candidate),
        }
    }
}

/// A validated, case-insensitive regex matching one or more header names.
#[derive(Clone)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamePattern").field("pattern", &self.as_str()).finish()
    }
}

impl<'de> Deserialize<'de> for NamePattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper {
            pattern: String,
        }

        let wrapper = Wrapper::deserialize(deserializer)?;
        let regex = regex::RegexBuilder::new(&wrapper.pattern)
            .case_insensitive(true)
            .build()
            .map_err(serde::de::Error::custom)?;

        Ok(Self { regex })
    }
}
