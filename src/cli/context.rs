//! Shared command context for CLI commands
//!
//! Extracts the setup shared by `handle`, `excluded` and `attempts`.

use merge_warden::auth::get_github_auth;
use merge_warden::config::{Config, load_config};
use merge_warden::delegate::{ConflictDelegate, GitHubIssueSink};
use merge_warden::error::Result;
use merge_warden::orchestrator::{
    ApprovalGate, ComplianceGate, DenyPatternPolicy, MergeOrchestrator, PreviewConfirmer,
    PreviewGate, RegistryAdmin,
};
use merge_warden::platform::{PlatformService, create_platform_service};
use merge_warden::registry::{ExclusionRegistry, FileRegistry};
use merge_warden::types::PullRequestRef;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Shared context for CLI commands
///
/// Loading the context never touches the network, so administrative
/// commands work without credentials. Platform access is set up lazily by
/// [`CommandContext::orchestrator`].
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Resolved registry file
    pub state_path: PathBuf,
    /// File-backed exclusion registry
    pub registry: Arc<dyn ExclusionRegistry>,
}

impl CommandContext {
    /// Load configuration and open the registry
    pub fn load(config_path: Option<&Path>, state_override: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let state_path = config.state_file(state_override);
        debug!(path = %state_path.display(), "opening exclusion registry");
        let registry = Arc::new(FileRegistry::open(&state_path)?);

        Ok(Self {
            config,
            state_path,
            registry,
        })
    }

    /// Registry administration
    pub fn admin(&self) -> RegistryAdmin {
        RegistryAdmin::new(Arc::clone(&self.registry))
    }

    /// Build the orchestrator: authenticate, create the platform client and
    /// issue sink, and attach the configured gates.
    ///
    /// `preview` adds a preview gate asking the given confirmer.
    pub async fn orchestrator(
        &self,
        preview: Option<Box<dyn PreviewConfirmer>>,
    ) -> Result<MergeOrchestrator> {
        let github = &self.config.github;
        let auth = get_github_auth(&github.host).await?;
        debug!(host = %auth.host, source = ?auth.source, "authenticated");

        let platform: Arc<dyn PlatformService> =
            Arc::from(create_platform_service(github, &auth.token)?);
        let sink = GitHubIssueSink::new(&auth.token, &github.api_base())?;
        let delegate = ConflictDelegate::new(Arc::new(sink), self.config.delegation.labels.clone())
            .with_task_repo(self.config.delegation.task_repo.clone());

        let mut orchestrator =
            MergeOrchestrator::new(Arc::clone(&platform), Arc::clone(&self.registry), delegate);

        let gates = &self.config.gates;
        if !gates.deny_patterns.is_empty() {
            let policy = DenyPatternPolicy::new(&gates.deny_patterns)?;
            orchestrator = orchestrator.with_gate(ComplianceGate::new(policy));
        }
        if gates.require_approval {
            orchestrator = orchestrator.with_gate(ApprovalGate::new(platform));
        }
        if let Some(confirmer) = preview {
            orchestrator = orchestrator.with_gate(PreviewGate::from_boxed(confirmer));
        }

        Ok(orchestrator)
    }
}

/// Parse a PR web URL or a canonical `host/owner/repo#N` key
pub fn parse_reference(input: &str) -> Result<PullRequestRef> {
    if input.contains("://") {
        PullRequestRef::parse_url(input)
    } else {
        input.parse()
    }
}
