mod app;
mod cli;
mod config;
mod context;
mod paths;
mod provider;

use anyhow::Context;
use clap::Parser;
use provider::Client;
use std::io::{IsTerminal, Read};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::Args) -> anyhow::Result<()> {
    let config_path = paths::config_path()?;
    let cfg = config::Config::load_optional(&config_path)?;
    tracing::debug!(?config_path, found = cfg.is_some(), "resolved config");

    let flags = config::Overrides {
        provider: args.provider,
        model: args.model,
        api_key: None,
        host: args.host,
    };
    let overrides = flags.or(config::Overrides::from_env());

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let provider = app::build_provider(&http, cfg.as_ref(), overrides)?;

    let mut stdin = std::io::stdin();
    let piped = if stdin.is_terminal() {
        None
    } else {
        let mut buf = String::new();
        stdin.read_to_string(&mut buf).context("failed to read stdin")?;
        Some(buf)
    };
    let question = app::compose_question(piped.as_deref(), &args.prompt.join(" "));
    let mut system = args
        .system
        .unwrap_or_else(|| app::DEFAULT_SYSTEM_PROMPT.to_string());
    if !args.no_context {
        match std::env::current_dir() {
            Ok(cwd) => system = context::with_context(&system, &context::gather(&cwd).await),
            Err(e) => tracing::debug!(error = %e, "no working directory, skipping context"),
        }
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let fragments = provider
        .stream(cancel, &system, &question)
        .await
        .with_context(|| format!("{} provider failed to start streaming", provider.name()))?;

    let mut out = std::io::stdout().lock();
    app::print_stream(fragments, &mut out).await
}
