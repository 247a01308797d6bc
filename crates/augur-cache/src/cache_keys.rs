//! Cache key generators for consistent key naming.

/// Prefix for all cache keys to namespace them.
const CACHE_PREFIX: &str = "augur:cache";

/// Effective permission set of a user.
#[must_use]
pub fn user_permissions(user_id: i64) -> String {
    format!("{}:perms:user:{}", CACHE_PREFIX, user_id)
}

/// Permissions granted by a role.
#[must_use]
pub fn role_permissions(role: &str) -> String {
    format!("{}:perms:role:{}", CACHE_PREFIX, role.to_lowercase())
}

/// Roles assigned to a user.
#[must_use]
pub fn user_roles(user_id: i64) -> String {
    format!("{}:roles:user:{}", CACHE_PREFIX, user_id)
}

/// Derived snapshot (odds, volume) of a market.
#[must_use]
pub fn market_snapshot(market_id: i64) -> String {
    format!("{}:market:snapshot:{}", CACHE_PREFIX, market_id)
}

/// Keys to drop when a user's role assignments change.
#[must_use]
pub fn user_invalidation_keys(user_id: i64) -> Vec<String> {
    vec![user_permissions(user_id), user_roles(user_id)]
}
