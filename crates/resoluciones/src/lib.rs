pub mod broadcast;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod reconciler;
pub mod retention;
pub mod sanitize;
pub mod scanner;
pub mod storage;
pub mod validator;

pub use broadcast::{LogBroadcaster, ProgressBroadcaster};
pub use config::{load_config, Config};
pub use document::{classify, InvalidDocument, InvalidReason, ParsedDocument};
pub use error::{ResolucionesError, Result};
pub use pipeline::{Pipeline, ProgressReporter, RunReport};
pub use processor::{PdfTextExtractor, TextExtractor};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use retention::RetentionSweeper;
pub use scanner::{DirectoryScanner, Manifest};
pub use storage::Archiver;
pub use validator::{validate, BatchValidation, ValidDocument};
