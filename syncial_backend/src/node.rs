use crate::api;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::SyncialConfig;
use crate::database::Database;
use crate::error::ContractError;
use crate::feed::FeedComposer;
use crate::prices::HermesClient;
use crate::services::ContractServices;
use crate::storage::{self, StorageBackend};
use crate::upload_client::UploadClient;
use crate::wallet::WalletSession;
use anyhow::Result;
use std::sync::Arc;

/// Bootstraps local state once and hands out cloned handles for whichever
/// entrypoint (CLI, REST server) needs them.
pub struct SyncialNode {
    config: SyncialConfig,
    bootstrap: BootstrapResources,
    storage: Arc<dyn StorageBackend>,
}

impl SyncialNode {
    /// Creates the data layout, migrates the database and opens the
    /// configured storage backend.
    pub async fn start(config: SyncialConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config).await?;
        let storage = storage::build_backend(&config.storage, &config.paths, &config.chain.rpc_url)?;

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            storage_backend = storage.kind(),
            chain = %config.chain,
            "syncial node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            storage,
        })
    }

    /// Returns a snapshot of the node's reusable handles.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            config: self.config.clone(),
            database: self.bootstrap.database.clone(),
            storage: self.storage.clone(),
        }
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        let snapshot = self.snapshot();
        api::serve_http(snapshot.config, snapshot.database, snapshot.storage).await
    }

    pub fn config(&self) -> &SyncialConfig {
        &self.config
    }

    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }

    /// Resolves the wallet session from configuration and binds the
    /// contract services to it.
    pub async fn connect_wallet(&self) -> Result<WalletContext, ContractError> {
        let session = Arc::new(WalletSession::connect(&self.config.wallet, &self.config.chain).await?);
        tracing::info!(
            account = ?session.account(),
            signers = ?session.signer_chain(),
            "wallet session ready"
        );
        let services = ContractServices::new(session.clone(), &self.config.contracts);
        Ok(WalletContext { session, services })
    }

    /// Upload client pointed at the configured upload service, using this
    /// node's storage limits for local validation.
    pub fn upload_client(&self) -> UploadClient {
        UploadClient::new(&self.config.upload_api_url, self.storage.limits())
    }

    pub fn prices(&self) -> HermesClient {
        HermesClient::new(&self.config.prices.hermes_url)
    }
}

/// A connected wallet and the contract services bound to it.
#[derive(Clone)]
pub struct WalletContext {
    pub session: Arc<WalletSession>,
    pub services: ContractServices,
}

impl WalletContext {
    /// Feed composer for the connected account, if there is one.
    pub fn feed(&self, uploads: UploadClient) -> Result<FeedComposer, ContractError> {
        let account = self.session.require_account()?;
        Ok(FeedComposer::new(uploads, self.services.posts.clone(), account))
    }
}

/// Cloned handles suitable for consumers that just need access to backend
/// services without owning the entire node struct.
#[derive(Clone)]
pub struct NodeSnapshot {
    pub config: SyncialConfig,
    pub database: Database,
    pub storage: Arc<dyn StorageBackend>,
}
