#![forbid(unsafe_code)]

mod branches;
mod config;
mod directories;
mod error;
mod files;
mod projects;
mod provisional;
mod requests;
mod revisions;
mod support;
mod transactions;
mod work;

pub use config::StoreConfig;
pub use error::StoreError;
pub use requests::*;

use crate::delta::DeltaEngine;
use crate::session::ServiceContext;
use rusqlite::Connection;
use std::path::Path;
use support::*;
use work::Engine;

pub const TRUNK_BRANCH_NAME: &str = "Trunk";

/// One database connection plus handles to the shared services. Each worker
/// serving a client connection owns one store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    services: ServiceContext,
    delta: DeltaEngine,
}

impl SqliteStore {
    /// Opens `storage_dir` with default settings and a private service context.
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let services = ServiceContext::new(StoreConfig::with_storage_dir(storage_dir))?;
        Self::open_with(services)
    }

    pub fn open_with(services: ServiceContext) -> Result<Self, StoreError> {
        let config = services.config();
        std::fs::create_dir_all(&config.storage_dir)?;

        let conn = Connection::open(config.database_path())?;
        conn.busy_timeout(config.busy_timeout())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Installing takes the write lock; an existing database is only read so
        // a worker can open while another holds a client transaction.
        if preflight_gate(&conn)? {
            install_schema(&conn)?;
        }

        let delta = config.delta_engine();
        Ok(Self {
            conn,
            services,
            delta,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.services.config().storage_dir
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }

    pub fn schema_version(&self) -> i64 {
        SCHEMA_VERSION
    }

    fn engine(&self) -> Engine<'_> {
        Engine {
            services: &self.services,
            delta: &self.delta,
        }
    }

    fn split(&mut self) -> (&mut Connection, Engine<'_>) {
        (
            &mut self.conn,
            Engine {
                services: &self.services,
                delta: &self.delta,
            },
        )
    }
}
