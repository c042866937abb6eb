pub mod archiver;
pub mod filesystem;

pub use archiver::{purge_source, ArchiveEntry, ArchiveFailure, ArchiveOutcome, Archiver, PurgeOutcome};
pub use filesystem::{available_path, first_available_name, move_file};
