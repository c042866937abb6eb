use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use resoluciones::config::{load_config, resolve_config_path, Config};
use resoluciones::pipeline::{Pipeline, TracingProgress};

fn main() {
    init_tracing();

    let config_path = resolve_config_path(std::env::args_os().nth(1).map(PathBuf::from));
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) => {
            warn!("{}; using default configuration", e);
            Config::default()
        }
    };

    let pipeline = Pipeline::from_config(Arc::new(config));
    let report = pipeline.run(&TracingProgress);

    println!("{}", report);
    std::process::exit(if report.success { 0 } else { 1 });
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        // Route `log` records (lopdf, our own `log::` call sites) into tracing.
        let _ = tracing_log::LogTracer::init();
    }
}
