use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use launchpad::core::http::build_http_client;
use launchpad::{
    Environment, JsonConfigStore, LaunchArguments, LauncherResult, LogProgressSink,
    ResolutionContext, ResolvedLaunch, Resolver,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launchpad=debug")),
        )
        .init();

    info!("Launchpad {} starting...", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(launch) => {
            for path in &launch.paths {
                println!("{}", path.display());
            }
            println!("main class: {}", launch.main_class);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Resolution failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> LauncherResult<ResolvedLaunch> {
    let arguments = LaunchArguments::parse(std::env::args().skip(1));
    let game_dir = arguments.game_dir.clone();

    let store = JsonConfigStore::for_game_dir(&game_dir);
    let config = store.load()?;
    info!("Loaded configuration from {:?}", store.path());

    let environment = Environment::discover(&game_dir)?;
    let mut ctx = ResolutionContext::new(config, environment, arguments, Arc::new(store))?;

    Resolver::new(build_http_client()?)
        .resolve(&mut ctx, &mut LogProgressSink::default())
        .await
}
