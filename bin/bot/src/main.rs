use chatrelay_bot::{build_dispatcher, config::BotConfig, console::ConsoleChannel};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(report) => {
            eprintln!("{report}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Loaded configuration");

    let dispatcher = match build_dispatcher(&config) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(report) => {
            tracing::error!(error = %report, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let console = ConsoleChannel::new(dispatcher, config.console_user(), config.bot.self_id.clone());
    let input = BufReader::new(tokio::io::stdin());
    let output = Arc::new(Mutex::new(tokio::io::stdout()));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    match console.run(input, output, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "console channel failed");
            ExitCode::FAILURE
        }
    }
}
