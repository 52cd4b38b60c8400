#![forbid(unsafe_code)]

mod dao;
mod error;
mod schema;
mod studies;
mod versions;

pub use dao::EntityOp;
pub use error::StoreError;
pub use studies::{EntityLogEntry, StudySummary};

use dao::TxDao;
use ppod_core::doc::DocStudy;
use ppod_core::model::Study;
use ppod_core::{
    DaoError, EntityKind, ExternalId, ReconcileConfig, ReconcileError, ReconcileReport, Version,
    VersionSource, create_or_update_study_at, now_ms,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DB_FILE: &str = "ppod.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    config: ReconcileConfig,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        schema::preflight_gate(&conn)?;
        schema::install_schema(&conn)?;
        debug!(dir = %storage_dir.display(), "opened study store");

        Ok(Self {
            conn,
            storage_dir,
            config: ReconcileConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Allocates a version outside any reconciliation session.
    pub fn next_version(&mut self) -> Result<Version, StoreError> {
        let tx = self.conn.transaction()?;
        let version = versions::next_version_tx(&tx)?;
        tx.commit()?;
        Ok(version)
    }

    /// Merges `incoming` onto the stored study with the same external id, or
    /// stores a new study when there is none. The merge, its journal and the
    /// new snapshot commit together or not at all.
    pub fn create_or_update_study(
        &mut self,
        incoming: &DocStudy,
    ) -> Result<(Study, ReconcileReport), StoreError> {
        let tx = self.conn.transaction()?;
        let db_study = match incoming.external_id.as_ref() {
            Some(external_id) => studies::load_study_conn(&tx, external_id)?,
            None => None,
        };

        let version = versions::next_version_tx(&tx)?;
        let (study, report) = {
            let mut dao = TxDao::new(&tx, version);
            create_or_update_study_at(db_study, incoming, &self.config, version, &mut dao)?
        };

        studies::save_vocabulary_conn(&tx, &report)?;
        studies::save_study_conn(&tx, &study)?;
        tx.commit()?;

        info!(
            version = version.number(),
            created = report.total_created(),
            deleted = report.total_deleted(),
            "stored study"
        );
        Ok((study, report))
    }

    /// Like `create_or_update_study`, but the study must already exist.
    pub fn update_study(
        &mut self,
        incoming: &DocStudy,
    ) -> Result<(Study, ReconcileReport), StoreError> {
        let Some(external_id) = incoming.external_id.as_ref() else {
            return Err(StoreError::InvalidInput("update requires a study external id"));
        };
        if studies::load_study_conn(&self.conn, external_id)?.is_none() {
            return Err(StoreError::Reconcile(ReconcileError::NotFound {
                kind: EntityKind::Study,
                external_id: external_id.to_string(),
            }));
        }
        self.create_or_update_study(incoming)
    }

    pub fn load_study(&self, external_id: &ExternalId) -> Result<Study, StoreError> {
        studies::load_study_conn(&self.conn, external_id)?.ok_or(StoreError::UnknownId)
    }

    pub fn list_studies(&self) -> Result<Vec<StudySummary>, StoreError> {
        studies::list_studies_conn(&self.conn)
    }

    /// Journal entries written by sessions newer than `version`, oldest first.
    pub fn entity_log_since(&self, version: i64) -> Result<Vec<EntityLogEntry>, StoreError> {
        studies::entity_log_since_conn(&self.conn, version)
    }
}

impl VersionSource for SqliteStore {
    fn next_version(&mut self) -> Result<Version, DaoError> {
        SqliteStore::next_version(self).map_err(DaoError::backend)
    }
}
