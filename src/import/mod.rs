pub mod dedupe;
pub mod engine;
pub mod report;
pub mod stats;
pub mod validator;

pub use engine::{BatchImporter, CancelToken, EngineError, ImportedIdSet};
pub use report::{render_markdown, write_import_report};
pub use stats::{BatchResult, CollectionStats, ImportStats, RecordError, SkipReason};
pub use validator::{RecordValidator, ValidationError};
