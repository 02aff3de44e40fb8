//! # Application Context
//!
//! What every command receives: the database, the orchestrator built from
//! the ledger settings, and the loaded configuration. Cheap to clone; the
//! pool is shared.

use tracing::{info, warn};

use khazna_core::CoreError;
use khazna_db::{Database, DbConfig, DbError, TransactionOrchestrator};

use crate::config::RegisterConfig;
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct AppContext {
    db: Database,
    orchestrator: TransactionOrchestrator,
    config: RegisterConfig,
}

impl AppContext {
    /// Opens (creating if needed) the configured database file.
    pub async fn open(config: RegisterConfig) -> Result<Self, ApiError> {
        let path = config.database_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::internal(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }
        info!(?path, "Opening register database");

        let db = Database::new(
            DbConfig::new(path).max_connections(config.database.max_connections),
        )
        .await?;
        Self::with_database(db, config).await
    }

    /// Wraps an already-open database, making sure the configured cashbox
    /// exists.
    pub async fn with_database(db: Database, config: RegisterConfig) -> Result<Self, ApiError> {
        let cashbox_id = &config.ledger.cashbox_id;
        match db.cashbox().get_cashbox(cashbox_id).await {
            Ok(_) => {}
            Err(DbError::Domain(CoreError::CashboxNotFound(_))) => {
                warn!(cashbox_id = %cashbox_id, "Configured cashbox missing, opening it");
                db.cashbox()
                    .open_cashbox(cashbox_id, &format!("{} Cashbox", config.store.name))
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        let orchestrator = db.orchestrator(config.ledger_settings());
        Ok(AppContext {
            db,
            orchestrator,
            config,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn orchestrator(&self) -> &TransactionOrchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &RegisterConfig {
        &self.config
    }

    /// The request's cashbox, or the configured one.
    pub fn cashbox_or_default<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.config.ledger.cashbox_id)
    }
}
