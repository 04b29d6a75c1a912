//! Process configuration, read once at startup from the environment (after
//! `dotenvy` has loaded any `.env` file).

use std::path::PathBuf;
use std::time::Duration;

use crate::metrics::DEFAULT_LATENCY_WINDOW;

pub const DEFAULT_PUBLIC_TOOLS: &str = "code_gen,voice_speak,bw_remote,img_bw,list_issues";
const DEFAULT_LUNA_URL: &str = "http://localhost:8000";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;
const DEFAULT_PORT: u16 = 8080;

/// GitHub OAuth application credentials. Enabled only when both halves are set.
#[derive(Debug, Clone, Default)]
pub struct GitHubOAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl GitHubOAuthConfig {
    pub fn enabled(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret for the privileged path. `None` leaves `/mcp` unusable (500).
    pub auth_token: Option<String>,
    pub luna_url: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub github_oauth: GitHubOAuthConfig,
    pub public_tools: Vec<String>,
    pub latency_window: usize,
    pub command_timeout: Duration,
    pub workspace_dir: PathBuf,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset;
    /// unparseable numbers fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let auth_token = get("AUTH_TOKEN");
        if auth_token.is_some() {
            tracing::info!("AUTH_TOKEN configured - privileged endpoint enabled");
        } else {
            tracing::warn!("AUTH_TOKEN not set - POST /mcp will answer 500 until configured");
        }

        let public_tools = get("PUBLIC_TOOLS")
            .unwrap_or_else(|| DEFAULT_PUBLIC_TOOLS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            auth_token,
            luna_url: get("LUNA_URL").unwrap_or_else(|| DEFAULT_LUNA_URL.to_string()),
            github_token: get("GITHUB_TOKEN"),
            github_api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            github_oauth: GitHubOAuthConfig {
                client_id: get("GITHUB_CLIENT_ID"),
                client_secret: get("GITHUB_CLIENT_SECRET"),
            },
            public_tools,
            latency_window: parse_or(get("LATENCY_WINDOW"), "LATENCY_WINDOW", DEFAULT_LATENCY_WINDOW),
            command_timeout: Duration::from_secs(parse_or(
                get("COMMAND_TIMEOUT_SECS"),
                "COMMAND_TIMEOUT_SECS",
                DEFAULT_COMMAND_TIMEOUT_SECS,
            )),
            workspace_dir: get("WORKSPACE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT),
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("{} has invalid value '{}', using default", key, v);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert!(cfg.auth_token.is_none());
        assert_eq!(cfg.luna_url, "http://localhost:8000");
        assert_eq!(cfg.latency_window, 500);
        assert_eq!(cfg.command_timeout, Duration::from_secs(600));
        assert_eq!(cfg.port, 8080);
        assert!(cfg.public_tools.contains(&"code_gen".to_string()));
        assert!(!cfg.github_oauth.enabled());
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let cfg = config(&[
            ("AUTH_TOKEN", " abc "),
            ("PUBLIC_TOOLS", "img_bw, code_gen,,"),
            ("LATENCY_WINDOW", "50"),
            ("PORT", "not-a-port"),
            ("GITHUB_CLIENT_ID", "id"),
            ("GITHUB_CLIENT_SECRET", "secret"),
        ]);
        assert_eq!(cfg.auth_token.as_deref(), Some("abc"));
        assert_eq!(cfg.public_tools, vec!["img_bw", "code_gen"]);
        assert_eq!(cfg.latency_window, 50);
        assert_eq!(cfg.port, 8080);
        assert!(cfg.github_oauth.enabled());
    }

    #[test]
    fn empty_auth_token_counts_as_unset() {
        assert!(config(&[("AUTH_TOKEN", "")]).auth_token.is_none());
    }
}
