//! One-time database preparation: create the database, select it and
//! install the design documents the repository queries.

use mediacouch_core::AppError;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::store::{DatabaseAdmin, DatabaseServer, DesignDocument, MediaDatabase};
use super::views;

/// Idempotent bootstrap. The first successful `run` is memoized, later calls
/// return the same database handle without touching the server.
pub struct Bootstrap {
    database_name: String,
    designs: Vec<DesignDocument>,
    database: OnceCell<Arc<dyn MediaDatabase>>,
}

impl Bootstrap {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self::with_designs(database_name, views::design_documents())
    }

    pub fn with_designs(database_name: impl Into<String>, designs: Vec<DesignDocument>) -> Self {
        Bootstrap {
            database_name: database_name.into(),
            designs,
            database: OnceCell::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.database.initialized()
    }

    pub async fn run(
        &self,
        server: &dyn DatabaseServer,
    ) -> Result<Arc<dyn MediaDatabase>, AppError> {
        self.database
            .get_or_try_init(|| self.prepare(server))
            .await
            .cloned()
    }

    async fn prepare(
        &self,
        server: &dyn DatabaseServer,
    ) -> Result<Arc<dyn MediaDatabase>, AppError> {
        let name = self.database_name.as_str();

        match server.create_database(name).await {
            Ok(()) => tracing::info!(database = %name, "Database created"),
            Err(AppError::Conflict(_)) => {
                tracing::debug!(database = %name, "Database already exists")
            }
            Err(e) => {
                tracing::error!(error = %e, database = %name, "Failed to create database");
                return Err(e);
            }
        }

        let database = server.use_database(name);

        for design in &self.designs {
            match database.put_design(design).await {
                Ok(()) => tracing::info!(design = %design.id, "Design document installed"),
                Err(AppError::Conflict(_)) => {
                    tracing::debug!(design = %design.id, "Design document already installed")
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        design = %design.id,
                        "Failed to install design document"
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(database = %name, "Database bootstrap complete");
        Ok(database)
    }
}
