use crate::config::SyncialConfig;
use crate::database::Database;
use anyhow::{Context, Result};
use std::fs;

pub struct BootstrapResources {
    pub directories_created: Vec<String>,
    pub database_initialized: bool,
    pub database: Database,
}

pub async fn initialize(config: &SyncialConfig) -> Result<BootstrapResources> {
    let mut directories_created = Vec::new();
    create_dir_if_missing(&config.paths.data_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.blobs_dir, &mut directories_created)?;
    create_dir_if_missing(&config.paths.logs_dir, &mut directories_created)?;

    let database = Database::connect(&config.paths)?;
    let database_initialized = database.ensure_migrations()?;

    Ok(BootstrapResources {
        directories_created,
        database_initialized,
        database,
    })
}

fn create_dir_if_missing(path: &std::path::Path, created: &mut Vec<String>) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))?;
        created.push(path.display().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncialPaths;

    #[tokio::test]
    async fn creates_layout_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncialConfig::local(0, SyncialPaths::from_base_dir(dir.path()).unwrap());

        let first = initialize(&config).await.unwrap();
        assert_eq!(first.directories_created.len(), 3);
        assert!(first.database_initialized);
        assert!(config.paths.db_path.exists());

        let second = initialize(&config).await.unwrap();
        assert!(second.directories_created.is_empty());
        assert!(!second.database_initialized);
    }
}
