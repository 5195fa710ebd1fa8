//! GitHub token discovery

use super::AuthSource;
use crate::error::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a token, in order
const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Resolved GitHub credentials
#[derive(Debug, Clone)]
pub struct GitHubAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
    /// Host the token is valid for
    pub host: String,
}

/// Read a token from the environment, ignoring empty values
pub fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Resolve a GitHub token for `host`.
///
/// Environment variables win; otherwise `gh auth token` is consulted.
pub async fn get_github_auth(host: &str) -> Result<GitHubAuthConfig> {
    if let Some(token) = token_from_env() {
        debug!(host, "using token from environment");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::EnvVar,
            host: host.to_string(),
        });
    }

    let output = Command::new("gh")
        .args(["auth", "token", "--hostname", host])
        .output()
        .await
        .map_err(|e| {
            Error::Auth(format!(
                "no GITHUB_TOKEN/GH_TOKEN set and failed to run gh: {e}"
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Auth(format!(
            "gh auth token failed for {host}: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::Auth(format!("gh returned an empty token for {host}")));
    }

    debug!(host, "using token from gh CLI");
    Ok(GitHubAuthConfig {
        token,
        source: AuthSource::Cli,
        host: host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[allow(unsafe_code)]
    fn set_tokens(github: Option<&str>, gh: Option<&str>) {
        for (name, value) in TOKEN_ENV_VARS.iter().zip([github, gh]) {
            match value {
                Some(v) => unsafe { std::env::set_var(name, v) },
                None => unsafe { std::env::remove_var(name) },
            }
        }
    }

    #[test]
    #[serial]
    fn test_github_token_preferred_over_gh_token() {
        set_tokens(Some("ghp_primary"), Some("ghp_secondary"));
        assert_eq!(token_from_env().as_deref(), Some("ghp_primary"));
        set_tokens(None, None);
    }

    #[test]
    #[serial]
    fn test_gh_token_used_when_github_token_unset() {
        set_tokens(None, Some("ghp_secondary"));
        assert_eq!(token_from_env().as_deref(), Some("ghp_secondary"));
        set_tokens(None, None);
    }

    #[test]
    #[serial]
    fn test_empty_and_blank_tokens_are_skipped() {
        set_tokens(Some(""), Some("  ghp_padded \n"));
        assert_eq!(token_from_env().as_deref(), Some("ghp_padded"));

        set_tokens(Some("   "), Some(""));
        assert_eq!(token_from_env(), None);
        set_tokens(None, None);
    }

    #[tokio::test]
    #[serial]
    async fn test_env_token_wins_over_gh_cli() {
        set_tokens(Some("ghp_env"), None);
        let auth = get_github_auth("github.com").await.unwrap();
        assert_eq!(auth.token, "ghp_env");
        assert_eq!(auth.source, AuthSource::EnvVar);
        assert_eq!(auth.host, "github.com");
        set_tokens(None, None);
    }
}
