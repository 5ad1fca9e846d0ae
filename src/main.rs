use std::process::ExitCode;
use std::sync::Arc;

use moc_admin::commands::{self, ConsoleRedirect};
use moc_admin::config::Config;
use moc_admin::state::AppState;

mod cli {
    use clap::Parser;
    use moc_admin::commands::Command;

    #[derive(Parser, Debug)]
    #[command(name = "moc-admin", version, about = "Admin console for the Moc F&B backend")]
    pub struct Args {
        /// Backend base URL (overrides MOC_API_URL)
        #[arg(long, global = true)]
        pub api_url: Option<String>,

        /// Talk to the backend anonymously; the stored session is neither read nor written
        #[arg(long, global = true)]
        pub no_session: bool,

        #[command(subcommand)]
        pub command: Command,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env from the working directory if present
    let _ = dotenvy::dotenv();

    env_logger::init();

    let args = {
        use clap::Parser;
        cli::Args::parse()
    };

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = args.api_url {
        if let Err(e) = config.override_api_url(url) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }
    log::info!("Using backend at {}", config.api_base_url);

    let state = match AppState::new(config, !args.no_session) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Cannot open session store: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    state.subscribe(Arc::new(ConsoleRedirect));

    // Tear down an already-expired session before anything is sent.
    if let Err(e) = state.check_session() {
        log::warn!("Startup session check failed: {}", e);
    }

    match commands::run(&state, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
