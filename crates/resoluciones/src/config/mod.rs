pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, resolve_config_path, CONFIG_PATH_ENV};
pub use schema::{Config, DatabaseConfig};
