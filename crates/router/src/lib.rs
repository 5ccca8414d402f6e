//! Virtual router (spec §4.5 "Virtual Router"): classifies a canonical
//! request into a route category, then selects a healthy, context-sized
//! target from that category's pools.

mod advisor;
mod classify;
mod select;
mod tokens;
mod target;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use config::{ProviderConfig, RouteCategory, RoutingConfig, DEFAULT_MAX_CONTEXT_TOKENS};
use dashmap::DashMap;
use indexmap::IndexMap;
use jiff::tz::TimeZone;
use jiff::Zoned;
use protocol::CanonicalChatRequest;
use rate_limit::HealthTracker;

pub use advisor::Partition;
pub use target::ResolvedTarget;

/// Why the router failed to produce any candidate.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Every configured pool for the matched category (and its fallback
    /// to `default`) is either unconfigured, unhealthy, or over the
    /// context window with `allow_overflow` disabled.
    #[error("no healthy route available")]
    NoRouteAvailable,
}

/// Outcome of routing one request: the category it was classified into
/// and its ordered candidate targets, most-preferred first. An explicit
/// directive bypasses pool-category classification entirely but still
/// reports `Default` (spec §4.5 scenario S5: "classification category is
/// `default`") since nothing about the request itself was ever
/// classified otherwise.
#[derive(Debug, Clone)]
pub struct RouteResult {
    pub category: RouteCategory,
    pub candidates: Vec<ResolvedTarget>,
}

/// Ties together route classification, pool selection, and per-target
/// health tracking for one configured provider set (spec §4.5).
pub struct Router {
    providers: IndexMap<String, ProviderConfig>,
    routing: RoutingConfig,
    health: Arc<HealthTracker>,
    target_cursors: DashMap<String, AtomicUsize>,
    key_cursors: DashMap<String, AtomicUsize>,
}

impl Router {
    pub fn new(providers: IndexMap<String, ProviderConfig>, routing: RoutingConfig, health: Arc<HealthTracker>) -> Self {
        Self { providers, routing, health, target_cursors: DashMap::new(), key_cursors: DashMap::new() }
    }

    /// The shared health tracker, so callers can report per-target
    /// success/failure after a request to an upstream completes.
    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    /// Routes one canonical request (spec §4.5 steps 1-4).
    pub fn route(&self, request: &CanonicalChatRequest) -> Result<RouteResult, RouterError> {
        if let Some(directive) = &request.routing_directive {
            return self.route_directive(directive);
        }

        let estimated_tokens = tokens::estimate_prompt_tokens(request);
        let category = classify::classify(request, &self.routing, estimated_tokens, DEFAULT_MAX_CONTEXT_TOKENS);

        let mut candidates = self.candidates(&category, estimated_tokens);
        let mut reason = "classified";
        if candidates.is_empty() && category != RouteCategory::Default {
            candidates = self.candidates(&RouteCategory::Default, estimated_tokens);
            reason = "default-fallback";
        }
        if candidates.is_empty() {
            return Err(RouterError::NoRouteAvailable);
        }

        log_route_hit(&format!("{category:?}"), &candidates[0], reason);
        Ok(RouteResult { category, candidates })
    }

    fn route_directive(&self, directive: &protocol::RoutingDirective) -> Result<RouteResult, RouterError> {
        let pool = config::RoutePoolConfig {
            id: "directive".to_string(),
            priority: 0,
            backup: false,
            targets: vec![format!("{}.{}", directive.provider_id, directive.model_id)],
        };
        let candidates = select::select_from_pool(
            &pool,
            &self.providers,
            &self.health,
            0,
            self.routing.warn_ratio,
            true,
            &self.target_cursors,
            &self.key_cursors,
        );
        if candidates.is_empty() {
            return Err(RouterError::NoRouteAvailable);
        }
        log_route_hit("directive", &candidates[0], "directive");
        Ok(RouteResult { category: RouteCategory::Default, candidates })
    }

    fn candidates(&self, category: &RouteCategory, estimated_tokens: u32) -> Vec<ResolvedTarget> {
        let Some(pools) = self.routing.categories.get(category) else { return Vec::new() };
        select::candidates_for_category(
            pools,
            &self.providers,
            &self.health,
            estimated_tokens,
            self.routing.warn_ratio,
            self.routing.allow_overflow,
            &self.target_cursors,
            &self.key_cursors,
        )
    }
}

fn log_route_hit(category_label: &str, target: &ResolvedTarget, reason: &str) {
    let now = Zoned::now().with_time_zone(TimeZone::UTC);
    log::info!("{} {} -> {}.{} reason={}", now.strftime("%H:%M:%S"), category_label, target.provider_id, target.model_id, reason);
}
