//! Target selection algorithm (spec §4.5 "Target selection algorithm"):
//! pool ordering, health filtering, context-advisor partitioning, and
//! round-robin cursors for both target and API-key rotation.

use std::sync::atomic::{AtomicUsize, Ordering};

use config::{ApiKeyConfig, AuthConfig, ProviderConfig, RoutePoolConfig};
use dashmap::DashMap;
use indexmap::IndexMap;
use rate_limit::{HealthTracker, TargetKey};

use crate::advisor::{self, Partition};
use crate::target::{self, ResolvedTarget};

/// Orders a category's pools the way spec §4.5 step 2 requires: priority
/// descending among the primary pools, with every `backup` pool ranked
/// after every primary pool regardless of its own priority number.
fn ordered_pools(pools: &[RoutePoolConfig]) -> Vec<&RoutePoolConfig> {
    let mut primary: Vec<&RoutePoolConfig> = pools.iter().filter(|pool| !pool.backup).collect();
    primary.sort_by(|a, b| b.priority.cmp(&a.priority));
    let mut backup: Vec<&RoutePoolConfig> = pools.iter().filter(|pool| pool.backup).collect();
    backup.sort_by(|a, b| b.priority.cmp(&a.priority));
    primary.into_iter().chain(backup).collect()
}

/// Resolves, health-filters, partitions, and rotates one pool's targets
/// (spec §4.5 step 3). Returns the chosen partition's targets, rotated so
/// repeated calls distribute load round-robin, with any unresolved
/// `keyId` filled in. Empty if nothing in the pool is both configured and
/// healthy, or if only an `overflow` partition exists and overflow isn't
/// allowed.
pub fn select_from_pool(
    pool: &RoutePoolConfig,
    providers: &IndexMap<String, ProviderConfig>,
    health: &HealthTracker,
    estimated_tokens: u32,
    warn_ratio: f64,
    allow_overflow: bool,
    target_cursors: &DashMap<String, AtomicUsize>,
    key_cursors: &DashMap<String, AtomicUsize>,
) -> Vec<ResolvedTarget> {
    let healthy: Vec<ResolvedTarget> = pool
        .targets
        .iter()
        .filter_map(|raw| target::resolve(raw, providers))
        .filter(|target| health.is_healthy(&TargetKey::new(&target.provider_id, &target.model_id)))
        .collect();
    if healthy.is_empty() {
        return Vec::new();
    }

    let mut safe = Vec::new();
    let mut risky = Vec::new();
    let mut overflow = Vec::new();
    for target in healthy {
        match advisor::partition(estimated_tokens, target.max_context_tokens, warn_ratio) {
            Partition::Safe => safe.push(target),
            Partition::Risky => risky.push(target),
            Partition::Overflow => overflow.push(target),
        }
    }

    let mut chosen = if !safe.is_empty() {
        safe
    } else if !risky.is_empty() {
        risky
    } else if allow_overflow {
        overflow
    } else {
        Vec::new()
    };
    if chosen.is_empty() {
        return Vec::new();
    }

    let cursor = target_cursors.entry(pool.id.clone()).or_insert_with(|| AtomicUsize::new(0));
    let start = cursor.fetch_add(1, Ordering::Relaxed) % chosen.len();
    chosen.rotate_left(start);

    for target in &mut chosen {
        assign_key_if_missing(target, providers, key_cursors);
    }

    chosen
}

fn assign_key_if_missing(target: &mut ResolvedTarget, providers: &IndexMap<String, ProviderConfig>, key_cursors: &DashMap<String, AtomicUsize>) {
    if target.key_id.is_some() {
        return;
    }
    let Some(provider) = providers.get(&target.provider_id) else { return };
    let AuthConfig::ApiKey(ApiKeyConfig { keys }) = &provider.auth else {
        return;
    };
    target.key_id = Some(match keys.len() {
        0 => return,
        1 => "0".to_string(),
        len => {
            let key = format!("{}.{}", target.provider_id, target.model_id);
            let cursor = key_cursors.entry(key).or_insert_with(|| AtomicUsize::new(0));
            (cursor.fetch_add(1, Ordering::Relaxed) % len).to_string()
        }
    });
}

/// Flattens every pool in a category, in priority/backup order, into one
/// ordered candidate list (spec §4.5 step 4: "if no pool yields a target,
/// fall back").
pub fn candidates_for_category(
    pools: &[RoutePoolConfig],
    providers: &IndexMap<String, ProviderConfig>,
    health: &HealthTracker,
    estimated_tokens: u32,
    warn_ratio: f64,
    allow_overflow: bool,
    target_cursors: &DashMap<String, AtomicUsize>,
    key_cursors: &DashMap<String, AtomicUsize>,
) -> Vec<ResolvedTarget> {
    let mut candidates = Vec::new();
    for pool in ordered_pools(pools) {
        candidates.append(&mut select_from_pool(pool, providers, health, estimated_tokens, warn_ratio, allow_overflow, target_cursors, key_cursors));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{HealthConfig, ProviderType};
    use secrecy::SecretString;

    fn providers() -> IndexMap<String, ProviderConfig> {
        let mut providers = IndexMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                provider_type: ProviderType::OpenAiCompatible,
                base_url: "https://api.openai.com/v1".to_string(),
                auth: AuthConfig::ApiKey(ApiKeyConfig { keys: vec![SecretString::from("k0".to_string()), SecretString::from("k1".to_string())] }),
                timeout_ms: 60_000,
                max_retries: 3,
                max_context_tokens: 128_000,
                models: IndexMap::new(),
                headers: Vec::new(),
                allowed_tool_names: Vec::new(),
                finish_reason_overrides: IndexMap::new(),
                requires_agent_request_type: false,
                harvest_inline_tool_calls: false,
                reasoning_tag: None,
                flatten_mixed_content: false,
            },
        );
        providers
    }

    fn pool(id: &str, priority: i32, backup: bool, targets: &[&str]) -> RoutePoolConfig {
        RoutePoolConfig { id: id.to_string(), priority, backup, targets: targets.iter().map(|t| t.to_string()).collect() }
    }

    #[test]
    fn backup_pools_always_sort_after_primary_pools() {
        let pools = vec![pool("backup", 500, true, &["openai.gpt-4"]), pool("primary", 10, false, &["openai.gpt-4"])];
        let ordered = ordered_pools(&pools);
        assert_eq!(ordered[0].id, "primary");
        assert_eq!(ordered[1].id, "backup");
    }

    #[test]
    fn unhealthy_target_is_filtered_out_of_the_pool() {
        let providers = providers();
        let health = HealthTracker::new(HealthConfig { failure_threshold: 1, cooldown_ms: 60_000 });
        health.record_failure(&TargetKey::new("openai", "gpt-4"));

        let candidates = select_from_pool(
            &pool("primary", 0, false, &["openai.gpt-4"]),
            &providers,
            &health,
            10,
            0.9,
            true,
            &DashMap::new(),
            &DashMap::new(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn overflow_only_pool_is_empty_when_overflow_disallowed() {
        let providers = providers();
        let health = HealthTracker::new(HealthConfig { failure_threshold: 3, cooldown_ms: 60_000 });

        let candidates = select_from_pool(
            &pool("primary", 0, false, &["openai.gpt-4"]),
            &providers,
            &health,
            200_000,
            0.9,
            false,
            &DashMap::new(),
            &DashMap::new(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn missing_key_id_rotates_across_calls() {
        let providers = providers();
        let health = HealthTracker::new(HealthConfig { failure_threshold: 3, cooldown_ms: 60_000 });
        let target_cursors = DashMap::new();
        let key_cursors = DashMap::new();

        let first = select_from_pool(&pool("primary", 0, false, &["openai.gpt-4"]), &providers, &health, 10, 0.9, true, &target_cursors, &key_cursors);
        let second = select_from_pool(&pool("primary", 0, false, &["openai.gpt-4"]), &providers, &health, 10, 0.9, true, &target_cursors, &key_cursors);

        assert_ne!(first[0].key_id, second[0].key_id);
    }
}
