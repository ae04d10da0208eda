use crate::api::{self, AppState};
use crate::bootstrap::{self, BootstrapResources};
use crate::blobs::FsBlobStore;
use crate::config::FellowshipConfig;
use crate::database::Database;
use crate::events::ChangeFeed;
use crate::identity::IdentityProvider;
use crate::setup::SetupService;
use anyhow::Result;

/// Bootstraps the backend once and hands out the shared handles every
/// entrypoint (CLI, REST server, tests) needs.
pub struct FellowshipNode {
    config: FellowshipConfig,
    bootstrap: BootstrapResources,
    feed: ChangeFeed,
    identity: IdentityProvider,
    blobs: FsBlobStore,
}

impl FellowshipNode {
    pub fn start(config: FellowshipConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;
        let feed = ChangeFeed::default();
        let identity = IdentityProvider::new(bootstrap.database.clone());
        let blobs = FsBlobStore::new(config.paths.blobs_dir.clone(), config.file.public_url.clone());

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            db = %config.paths.db_path.display(),
            "fellowship node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            feed,
            identity,
            blobs,
        })
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            database: self.bootstrap.database.clone(),
            feed: self.feed.clone(),
            identity: self.identity.clone(),
            blobs: self.blobs.clone(),
        }
    }

    pub fn setup(&self) -> SetupService {
        self.state().setup()
    }

    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }

    pub fn config(&self) -> &FellowshipConfig {
        &self.config
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        api::serve_http(self.state()).await
    }
}
