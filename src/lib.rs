//! Dependency-ordered migration of JSON collection exports into a normalized
//! SQLite store, with an independent integrity validator and rollback script
//! generation.

pub mod backup;
pub mod config;
pub mod db;
pub mod idmap;
pub mod import;
pub mod logging;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod source;
pub mod verify;

mod sql;

pub use config::MigrationConfig;
pub use idmap::{HashIdMapper, IdMapper};
pub use import::{BatchImporter, CancelToken, ImportStats};
pub use verify::{IntegrityValidator, VerifyReport, VerifyStatus};
