use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{HarvestError, Result};
use crate::config::Config;
use crate::fetcher;
use crate::pipeline::Harvester;
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub harvester: Arc<Harvester>,
}

impl AppContext {
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let fetcher = fetcher::build(&config.fetch)?;
        let harvester = Arc::new(Harvester::new(
            store.clone(),
            fetcher,
            &config.site,
            &config.pipeline,
        )?);

        Ok(Self { store, harvester })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| HarvestError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("jobharvest");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("jobharvest.db"))
    }
}
