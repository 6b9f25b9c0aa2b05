use std::collections::HashSet;

/// Gateway configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HS256 secret shared with whoever issues staff bearer tokens.
    pub jwt_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// The single path that accepts WebSocket upgrades.
    pub gateway_path: String,
    /// Browser origins allowed to connect. Empty or `*` allows every origin.
    pub allowed_origins: Vec<String>,
    /// Roles that may join restaurant rooms.
    pub staff_roles: HashSet<String>,
    /// Redis URL for cross-instance fanout. `None` runs single-instance.
    pub redis_url: Option<String>,
}

/// Used when `STAFF_ROLES` is unset.
pub const DEFAULT_STAFF_ROLES: &[&str] = &["admin", "manager", "staff"];

/// Paths served by other routes; the gateway cannot take them over.
pub const RESERVED_PATHS: &[&str] = &["/health"];

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            jwt_secret: required_var("JWT_SECRET"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            gateway_path: gateway_path(std::env::var("GATEWAY_PATH").ok().as_deref()),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            staff_roles: staff_roles(std::env::var("STAFF_ROLES").ok().as_deref()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Resolve `GATEWAY_PATH`. Values without a leading `/` fall back to `/ws`;
/// a reserved path panics.
pub fn gateway_path(raw: Option<&str>) -> String {
    let path = raw
        .map(str::trim)
        .filter(|s| s.starts_with('/'))
        .unwrap_or("/ws");
    if RESERVED_PATHS.contains(&path) {
        panic!("GATEWAY_PATH must not be {path}, which is already routed");
    }
    path.to_string()
}

/// Resolve `STAFF_ROLES`, falling back to [`DEFAULT_STAFF_ROLES`] when unset
/// or empty.
pub fn staff_roles(raw: Option<&str>) -> HashSet<String> {
    raw.map(split_list)
        .filter(|roles| !roles.is_empty())
        .unwrap_or_else(|| DEFAULT_STAFF_ROLES.iter().map(|r| r.to_string()).collect())
        .into_iter()
        .collect()
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list(" https://a.test, ,https://b.test ,"),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn gateway_path_defaults_and_keeps_custom_paths() {
        assert_eq!(gateway_path(None), "/ws");
        assert_eq!(gateway_path(Some("ws")), "/ws");
        assert_eq!(gateway_path(Some("/realtime")), "/realtime");
    }

    #[test]
    #[should_panic(expected = "GATEWAY_PATH must not be /health")]
    fn gateway_path_cannot_shadow_health() {
        gateway_path(Some("/health"));
    }

    #[test]
    fn staff_roles_override_and_default() {
        let expected: HashSet<String> = ["owner", "host"].iter().map(|r| r.to_string()).collect();
        assert_eq!(staff_roles(Some("owner, host")), expected);
        assert_eq!(staff_roles(Some(" , ")).len(), DEFAULT_STAFF_ROLES.len());
        assert!(staff_roles(None).contains("manager"));
    }
}
