//! Platform service construction

use crate::config::GitHubConfig;
use crate::error::Result;
use crate::platform::{GitHubService, PlatformService, TimeoutPlatform};
use std::time::Duration;
use tracing::debug;

/// Create the platform service for the configured host.
///
/// The returned service bounds every call by the configured timeout.
pub fn create_platform_service(
    config: &GitHubConfig,
    token: &str,
) -> Result<Box<dyn PlatformService>> {
    let api_base = config.api_base();
    let graphql_base = config.graphql_base();
    debug!(host = %config.host, %api_base, %graphql_base, "creating GitHub platform service");
    let service = GitHubService::new(token, &config.host, &api_base, &graphql_base)?;
    Ok(Box::new(TimeoutPlatform::new(
        service,
        Duration::from_secs(config.request_timeout_secs),
    )))
}
