use crate::chain::{ChainSpec, KnownChain};
use crate::contracts::ContractDirectory;
use crate::storage::UploadProfile;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_HERMES_URL: &str = "https://hermes.pyth.network";
pub const DEFAULT_UPLOAD_API_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct SyncialConfig {
    pub api_port: u16,
    pub paths: SyncialPaths,
    pub chain: ChainSpec,
    pub contracts: ContractDirectory,
    pub wallet: WalletConfig,
    pub storage: StorageConfig,
    pub prices: PriceFeedConfig,
    pub upload_api_url: String,
}

impl SyncialConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match non_empty_var("SYNCIAL_BASE_DIR") {
            Some(base) => SyncialPaths::from_base_dir(base)?,
            None => SyncialPaths::discover()?,
        };
        let api_port = env::var("SYNCIAL_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);
        let chain = match non_empty_var("SYNCIAL_CHAIN") {
            Some(raw) => raw.parse::<KnownChain>()?,
            None => KnownChain::ZeroGGalileo,
        }
        .spec();
        let chain = match non_empty_var("SYNCIAL_RPC_URL") {
            Some(url) => chain.with_rpc_url(url),
            None => chain,
        };
        let upload_api_url =
            non_empty_var("SYNCIAL_UPLOAD_API_URL").unwrap_or_else(|| DEFAULT_UPLOAD_API_URL.into());

        Ok(Self {
            api_port,
            paths,
            chain,
            contracts: ContractDirectory::from_env()?,
            wallet: WalletConfig::from_env(),
            storage: StorageConfig::from_env()?,
            prices: PriceFeedConfig::from_env(),
            upload_api_url,
        })
    }

    /// Configuration rooted at `base` with every optional integration off:
    /// filesystem storage, no wallets. Used by tests and local tooling.
    pub fn local(api_port: u16, paths: SyncialPaths) -> Self {
        Self {
            api_port,
            paths,
            chain: KnownChain::ZeroGGalileo.spec(),
            contracts: ContractDirectory::default(),
            wallet: WalletConfig::default(),
            storage: StorageConfig::default(),
            prices: PriceFeedConfig::default(),
            upload_api_url: format!("http://127.0.0.1:{api_port}"),
        }
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}

/// How the session reaches a wallet. Both are optional; a session with
/// neither can still read through the public RPC.
#[derive(Debug, Clone, Default)]
pub struct WalletConfig {
    pub injected_url: Option<String>,
    pub private_key: Option<String>,
}

impl WalletConfig {
    pub fn from_env() -> Self {
        Self {
            injected_url: non_empty_var("SYNCIAL_INJECTED_WALLET_URL"),
            private_key: non_empty_var("SYNCIAL_WALLET_PRIVATE_KEY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Fs,
    Gateway,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub profile: UploadProfile,
    pub gateway_url: Option<String>,
    pub token: Option<String>,
    pub wallet: Option<String>,
    pub max_upload_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Fs,
            profile: UploadProfile::Filecoin,
            gateway_url: None,
            token: None,
            wallet: None,
            max_upload_bytes: None,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let backend = match non_empty_var("SYNCIAL_STORAGE_BACKEND").as_deref() {
            None | Some("fs") => StorageBackendKind::Fs,
            Some("gateway") => StorageBackendKind::Gateway,
            Some(other) => return Err(anyhow!("unknown storage backend {other:?}")),
        };
        let profile = match non_empty_var("SYNCIAL_STORAGE_PROFILE") {
            Some(raw) => raw.parse()?,
            None => UploadProfile::Filecoin,
        };
        let max_upload_bytes = match non_empty_var("SYNCIAL_MAX_UPLOAD_BYTES") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .context("SYNCIAL_MAX_UPLOAD_BYTES must be a byte count")?,
            ),
            None => None,
        };
        Ok(Self {
            backend,
            profile,
            gateway_url: non_empty_var("SYNCIAL_STORAGE_GATEWAY_URL"),
            token: non_empty_var("SYNCIAL_STORAGE_TOKEN"),
            wallet: non_empty_var("SYNCIAL_STORAGE_WALLET"),
            max_upload_bytes,
        })
    }

    /// Request body ceiling for the upload route; a little above the
    /// profile maximum so multipart framing fits.
    pub fn body_limit(&self) -> usize {
        let max = self
            .max_upload_bytes
            .unwrap_or(self.profile.limits().max_bytes);
        usize::try_from(max)
            .unwrap_or(usize::MAX)
            .saturating_add(64 * 1024)
    }
}

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub hermes_url: String,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            hermes_url: DEFAULT_HERMES_URL.into(),
        }
    }
}

impl PriceFeedConfig {
    pub fn from_env() -> Self {
        Self {
            hermes_url: non_empty_var("SYNCIAL_HERMES_URL")
                .unwrap_or_else(|| DEFAULT_HERMES_URL.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncialPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub blobs_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl SyncialPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("syncial.db");
        let blobs_dir = base.join("blobs");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            blobs_dir,
            logs_dir,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
