use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use asupersync::Cx;
use asupersync::runtime::RuntimeBuilder;
use prefmatch_cli::{JsonFileSource, LogSettings, USAGE, install_logging, parse_cli_args, serve};
use prefmatch_core::tracing_config::level_from_env;
use prefmatch_core::{MatchConfig, MatchResult, VectorSource};
use prefmatch_service::{IndexCoordinator, MatchService, RefreshWorker, RefreshWorkerConfig};
use tracing::{Level, error, info};

fn main() -> MatchResult<()> {
    let cli_input = parse_cli_args(std::env::args().skip(1))?;

    if cli_input.help {
        println!("{USAGE}");
        return Ok(());
    }
    if cli_input.version {
        println!("prefmatch {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    install_logging(LogSettings::from_cli(
        &cli_input,
        level_from_env(Level::WARN),
        io::stderr().is_terminal(),
    ))?;

    let config = load_config(cli_input.config_path.as_deref())?;
    info!(
        target: "prefmatch.config",
        dimension = config.dimension,
        engine = ?config.engine,
        default_top_k = config.default_top_k,
        "configuration loaded"
    );

    let coordinator = Arc::new(IndexCoordinator::from_config(&config)?);
    let service = MatchService::new(Arc::clone(&coordinator));

    if let Some(path) = cli_input.load_path.as_deref() {
        let source: Arc<dyn VectorSource> = Arc::new(JsonFileSource::new(path));
        let worker = RefreshWorker::new(
            RefreshWorkerConfig::from_match_config(&config).with_refresh_on_start(false),
            source,
            Arc::clone(&coordinator),
        );
        let loaded = worker.run_cycle()?;
        info!(target: "prefmatch.refresh", loaded, path = %path.display(), "initial snapshot loaded");
        if cli_input.refresh {
            spawn_refresh(worker)?;
        }
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = serve(&service, stdin.lock(), stdout.lock())?;
    info!(
        target: "prefmatch.service",
        requests = summary.requests,
        errors = summary.errors,
        "input closed, shutting down"
    );
    Ok(())
}

/// Defaults, then the TOML file (if given), then `PREFMATCH_*` overrides.
fn load_config(path: Option<&Path>) -> MatchResult<MatchConfig> {
    let base = match path {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::default(),
    };
    let config = base.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Run the refresh loop on its own thread for the life of the process.
fn spawn_refresh(worker: RefreshWorker) -> MatchResult<()> {
    std::thread::Builder::new()
        .name("prefmatch-refresh".into())
        .spawn(move || {
            let runtime = match RuntimeBuilder::current_thread().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(
                        target: "prefmatch.refresh",
                        error = %err,
                        "failed to initialize asupersync runtime; scheduled refresh disabled"
                    );
                    return;
                }
            };
            let cx = Cx::for_request();
            if let Err(err) = runtime.block_on(async move { worker.run(&cx).await }) {
                error!(target: "prefmatch.refresh", error = %err, "refresh worker stopped");
            }
        })?;
    Ok(())
}
