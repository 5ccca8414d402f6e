//! Virtual router configuration (spec §4.5): route categories, priority
//! pools, classification keywords, and context-advisor thresholds.

use indexmap::IndexMap;
use serde::Deserialize;

/// A route category a request is classified into (spec §4.5, evaluated in
/// this order; first match wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    /// Any message part is an image reference.
    Vision,
    /// Estimated prompt tokens exceed the long-context threshold or warn
    /// ratio of the target's context window.
    LongContext,
    /// Tool definitions or user content match coding keywords.
    Coding,
    /// Request text matches thinking/reasoning keywords.
    Thinking,
    /// Request carries non-empty `tools`.
    Tools,
    /// Request requests a search tool or matches search keywords.
    WebSearch,
    /// Fallback when no other category matches.
    Default,
    /// Reserved for requests explicitly tagged as background/batch work;
    /// never selected by the classifier itself, only by an explicit
    /// routing directive.
    Background,
}

impl RouteCategory {
    /// Classification order (spec §4.5, steps 2-8; `Default` is the
    /// terminal fallback).
    pub const CLASSIFICATION_ORDER: &'static [RouteCategory] = &[
        RouteCategory::Vision,
        RouteCategory::LongContext,
        RouteCategory::Coding,
        RouteCategory::Thinking,
        RouteCategory::Tools,
        RouteCategory::WebSearch,
    ];
}

/// Precedence between an explicit `provider.model` in the request's
/// `model` field and an inline `<**provider.model**>` directive in user
/// text (spec §9 Open Questions — configurable, inline wins by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectivePrecedence {
    /// The inline `<**...**>` directive wins when both are present.
    InlineFirst,
    /// The `model` field's `provider.model` prefix wins when both are
    /// present.
    ModelFieldFirst,
}

impl Default for DirectivePrecedence {
    fn default() -> Self {
        Self::InlineFirst
    }
}

/// One pool of targets within a route category (spec §3 "Route Pool").
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutePoolConfig {
    /// Pool identifier, for logging.
    pub id: String,
    /// Selection priority; higher is tried first.
    #[serde(default)]
    pub priority: i32,
    /// Backup pools rank lowest regardless of `priority`.
    #[serde(default)]
    pub backup: bool,
    /// Targets as `providerId.modelId` or `providerId.modelId.keyId`.
    pub targets: Vec<String>,
}

/// Virtual router configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Ordered pools per route category.
    pub categories: IndexMap<RouteCategory, Vec<RoutePoolConfig>>,
    /// Estimated-token threshold above which a request is classified
    /// `long_context` outright (spec §4.5, default 180,000).
    pub long_context_threshold_tokens: u64,
    /// Fraction of a target's context window above which usage is
    /// considered "risky" rather than "safe" (spec §4.5, default 0.9).
    pub warn_ratio: f64,
    /// Tool names and user-content keywords that classify a request as
    /// `coding`.
    pub coding_keywords: Vec<String>,
    /// User-content keywords that classify a request as `thinking`.
    pub thinking_keywords: Vec<String>,
    /// User-content keywords that classify a request as `web_search`.
    pub search_keywords: Vec<String>,
    /// Whether the context advisor may fall back to `overflow` targets
    /// when no `safe`/`risky` target is available.
    pub allow_overflow: bool,
    /// Precedence between inline directives and the `model` field prefix.
    pub directive_precedence: DirectivePrecedence,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            categories: IndexMap::new(),
            long_context_threshold_tokens: 180_000,
            warn_ratio: 0.9,
            coding_keywords: vec!["apply_patch".to_string(), "write_file".to_string()],
            thinking_keywords: vec!["think step by step".to_string(), "reasoning".to_string()],
            search_keywords: vec!["search the web".to_string(), "web_search".to_string()],
            allow_overflow: true,
            directive_precedence: DirectivePrecedence::InlineFirst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn defaults_match_spec() {
        let config = RoutingConfig::default();
        assert_eq!(config.long_context_threshold_tokens, 180_000);
        assert_eq!(config.warn_ratio, 0.9);
        assert_eq!(config.directive_precedence, DirectivePrecedence::InlineFirst);
    }

    #[test]
    fn parses_category_pools() {
        let toml = indoc! {r#"
            [categories]
            default = [
                { id = "primary", priority = 200, targets = ["openai.gpt-4"] },
                { id = "backup", backup = true, targets = ["iflow.glm-4.7"] },
            ]
        "#};

        let config: RoutingConfig = toml::from_str(toml).unwrap();
        let pools = &config.categories[&RouteCategory::Default];
        assert_eq!(pools.len(), 2);
        assert!(pools[1].backup);
    }
}
