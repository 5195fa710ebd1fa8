//! Configuration loading
//!
//! Configuration lives in `<config dir>/merge-warden/config.toml`. Every
//! field has a default, so a missing file is not an error unless a path was
//! given explicitly.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config and data directories.
const APP_DIR: &str = "merge-warden";

/// Environment variable overriding the registry file location.
pub const STATE_FILE_ENV: &str = "MERGE_WARDEN_STATE_FILE";

/// Default per-call timeout for platform requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hosting platform settings
    pub github: GitHubConfig,
    /// Orchestrator settings
    pub orchestrator: OrchestratorConfig,
    /// Conflict delegation settings
    pub delegation: DelegationConfig,
    /// Optional gate settings
    pub gates: GateConfig,
}

/// Hosting platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Web host of the platform (`github.com` or a GitHub Enterprise host)
    pub host: String,
    /// Explicit REST API base URL; derived from `host` when absent
    pub api_base: Option<String>,
    /// Explicit GraphQL root (the `/graphql` endpoint hangs off it); derived
    /// from the REST base when absent
    pub graphql_base: Option<String>,
    /// Timeout applied to each platform call
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            api_base: None,
            graphql_base: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GitHubConfig {
    /// REST API base URL for the configured host
    pub fn api_base(&self) -> String {
        if let Some(base) = &self.api_base {
            return base.trim_end_matches('/').to_string();
        }
        if self.host == "github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("https://{}/api/v3", self.host)
        }
    }

    /// GraphQL root for the configured host
    ///
    /// GitHub Enterprise serves REST under `/api/v3` but GraphQL at
    /// `/api/graphql`, so the `/v3` suffix is dropped.
    pub fn graphql_base(&self) -> String {
        if let Some(base) = &self.graphql_base {
            return base.trim_end_matches('/').to_string();
        }
        let api_base = self.api_base();
        api_base
            .strip_suffix("/v3")
            .map_or_else(|| api_base.clone(), str::to_string)
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Registry file; defaults to the platform data directory
    pub state_file: Option<PathBuf>,
}

/// Conflict delegation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// `owner/repo` receiving conflict issues; defaults to the PR's repository
    pub task_repo: Option<String>,
    /// Labels applied to every conflict issue
    pub labels: Vec<String>,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            task_repo: None,
            labels: vec!["merge-conflict".to_string(), "automation".to_string()],
        }
    }
}

/// Optional gate settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Hold PRs until at least one approving review exists
    pub require_approval: bool,
    /// Regular expressions; a PR whose title or body matches one is held
    pub deny_patterns: Vec<String>,
}

/// Default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Default location of the registry file
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("registry.toml")
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// if present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Parse configuration from TOML text
pub fn parse_config(content: &str) -> std::result::Result<Config, toml::de::Error> {
    toml::from_str(content)
}

impl Config {
    /// Resolve the registry file: CLI override, then environment, then config, then default
    pub fn state_file(&self, cli_override: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_override {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(STATE_FILE_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        self.orchestrator
            .state_file
            .clone()
            .unwrap_or_else(default_state_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.github.host, "github.com");
        assert_eq!(config.github.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.delegation.labels, vec!["merge-conflict", "automation"]);
        assert!(!config.gates.require_approval);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [github]
            host = "git.example.com"

            [gates]
            deny_patterns = ["(?i)do not merge"]
            "#,
        )
        .unwrap();
        assert_eq!(config.github.host, "git.example.com");
        assert_eq!(config.github.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.gates.deny_patterns.len(), 1);
    }

    #[test]
    fn test_api_base_for_github_com() {
        let config = GitHubConfig::default();
        assert_eq!(config.api_base(), "https://api.github.com");
    }

    #[test]
    fn test_api_base_for_enterprise_host() {
        let config = GitHubConfig {
            host: "git.example.com".to_string(),
            ..GitHubConfig::default()
        };
        assert_eq!(config.api_base(), "https://git.example.com/api/v3");
    }

    #[test]
    fn test_graphql_base_for_github_com() {
        assert_eq!(GitHubConfig::default().graphql_base(), "https://api.github.com");
    }

    #[test]
    fn test_graphql_base_for_enterprise_host() {
        let config = GitHubConfig {
            host: "git.example.com".to_string(),
            ..GitHubConfig::default()
        };
        assert_eq!(config.graphql_base(), "https://git.example.com/api");
    }

    #[test]
    fn test_explicit_graphql_base_wins() {
        let config = GitHubConfig {
            host: "git.example.com".to_string(),
            graphql_base: Some("https://gql.example.com/".to_string()),
            ..GitHubConfig::default()
        };
        assert_eq!(config.graphql_base(), "https://gql.example.com");
    }

    #[test]
    fn test_explicit_api_base_trims_slash() {
        let config = GitHubConfig {
            api_base: Some("http://127.0.0.1:9000/".to_string()),
            ..GitHubConfig::default()
        };
        assert_eq!(config.api_base(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let result = load_config(Some(Path::new("/nonexistent/merge-warden.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    #[allow(unsafe_code)]
    fn test_state_file_resolution_order() {
        // Modifies process environment; serialized with other env tests
        let mut config = Config::default();
        unsafe { std::env::remove_var(STATE_FILE_ENV) };
        assert_eq!(config.state_file(None), default_state_path());

        config.orchestrator.state_file = Some(PathBuf::from("/srv/warden/config.toml"));
        assert_eq!(config.state_file(None), PathBuf::from("/srv/warden/config.toml"));

        unsafe { std::env::set_var(STATE_FILE_ENV, "/srv/warden/env.toml") };
        assert_eq!(config.state_file(None), PathBuf::from("/srv/warden/env.toml"));

        let cli = config.state_file(Some(Path::new("/tmp/reg.toml")));
        assert_eq!(cli, PathBuf::from("/tmp/reg.toml"));

        unsafe { std::env::set_var(STATE_FILE_ENV, "") };
        assert_eq!(
            config.state_file(None),
            PathBuf::from("/srv/warden/config.toml"),
            "empty env value is ignored"
        );

        unsafe { std::env::remove_var(STATE_FILE_ENV) };
    }
}
