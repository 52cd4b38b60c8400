#![forbid(unsafe_code)]

//! Create-or-update merge of phylogenetic studies.
//!
//! An incoming document (`doc`) is reconciled onto a persisted study graph
//! (`model`): matched entities are reused, unmatched ones are created or
//! deleted, and every entity that changed receives the session's single
//! version token.

pub mod align;
pub mod config;
pub mod dao;
pub mod doc;
pub mod error;
pub mod ids;
pub mod model;
pub mod reconcile;
pub mod stamp;
pub mod symbols;
pub mod version;

pub use align::{Alignment, Incoming, align_by_id, find_by_id, position_by_id};
pub use config::{ReconcileConfig, UnknownIdPolicy};
pub use dao::{Dao, DaoCall, EntityHandle, EntityKind, RecordingDao};
pub use error::{DaoError, ReconcileError};
pub use ids::{ExternalId, ExternalIdError};
pub use reconcile::{
    AssignedId, ReconcileReport, Reconciler, create_or_update_study, create_or_update_study_at,
    rewrite_newick,
};
pub use stamp::stamp_study;
pub use version::{Version, VersionClock, VersionSource, now_ms};
