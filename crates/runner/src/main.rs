use anyhow::Context;
use concord_core::{Event, EventKind};
use concord_gateway::{Check, Pipeline, spawn_orchestrator};
use concord_runner::{Client, ClientConfig};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

fn print_help() {
    eprintln!(
        r#"Concord - gateway client runtime

USAGE:
    concord [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    CONCORD_TOKEN         Bot token (required unless set in the config file)
    CONCORD_GATEWAY_URL   Gateway URL override
    CONCORD_API_URL       HTTP API base URL override
    CONCORD_SHARD_COUNT   "auto" or a shard count
    RUST_LOG              Log level filter (default: concord=info)

EXAMPLES:
    # Run with defaults and a token from the environment
    CONCORD_TOKEN=... concord

    # Run with config file
    concord --config concord.json
"#
    );
}

enum Step {
    Finished(concord_runner::Result<()>),
    Interrupted,
    Stats,
}

fn log_stats(client: &Client) {
    let snapshot = client.stats();
    tracing::info!(
        guilds = snapshot.cache.guilds,
        users = snapshot.cache.users,
        members = snapshot.cache.members,
        events = snapshot.cache.events_applied,
        "cache"
    );
    for shard in snapshot.shards {
        tracing::info!(
            shard_id = shard.shard_id,
            state = %shard.state,
            latency = ?shard.latency,
            reconnects = shard.reconnects,
            "shard"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            ClientConfig::from_file(&path)?
        }
        None => {
            tracing::info!("Using default configuration");
            ClientConfig::default()
        }
    };
    config.apply_env()?;
    tracing::debug!(?config, "configuration loaded");

    let mut client = Client::new(config).context("failed to build client")?;

    let lifecycle = Pipeline::new().check(Check::kinds([
        EventKind::Ready,
        EventKind::Resumed,
        EventKind::GuildCreate,
        EventKind::GuildDelete,
    ]));
    let consumer = spawn_orchestrator(
        "lifecycle",
        client.events().subscribe(),
        lifecycle,
        |dispatch| async move {
            match dispatch.event.as_ref() {
                Event::Ready(ready) => tracing::info!(
                    shard_id = dispatch.shard_id,
                    user = %ready.user.username,
                    guilds = ready.guilds.len(),
                    "ready"
                ),
                Event::GuildCreate(guild) => tracing::info!(
                    shard_id = dispatch.shard_id,
                    guild_id = %guild.guild.id,
                    name = %guild.guild.name,
                    "guild available"
                ),
                other => tracing::info!(shard_id = dispatch.shard_id, event = other.name(), "lifecycle"),
            }
        },
    );

    let started = tokio::select! {
        started = client.start() => Some(started),
        _ = tokio::signal::ctrl_c() => None,
    };
    match started {
        Some(started) => started.context("failed to start shards")?,
        None => {
            tracing::info!("Interrupted during startup");
            client.shutdown().await?;
            return Ok(());
        }
    }

    let mut stats = tokio::time::interval(STATS_INTERVAL);
    stats.tick().await;
    let outcome = loop {
        let step = tokio::select! {
            finished = client.wait() => Step::Finished(finished),
            _ = tokio::signal::ctrl_c() => Step::Interrupted,
            _ = stats.tick() => Step::Stats,
        };
        match step {
            Step::Finished(finished) => break finished,
            Step::Interrupted => {
                tracing::info!("Shutting down");
                break Ok(());
            }
            Step::Stats => log_stats(&client),
        }
    };

    client.shutdown().await?;
    consumer.abort();
    outcome.context("shard stopped")?;
    Ok(())
}
