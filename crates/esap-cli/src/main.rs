//! 🚀 esap-cli: pipe stdin at a cluster and watch it become documents.
//!
//! 🎬 *[narrator voice]* "It all started with `tail -f app.log | esap-cli`..."
//! 📦 Loads config, bootstraps the appender, ships every stdin line as an INFO
//! event, drains on EOF, prints what happened. Like a manager, but it actually
//! reports back. 🦆

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::Table;
use esap::{Appender, AppenderError, LogEvent, PatternLayout, StatsSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// ⏳ How long the final drain gets before we give up on it.
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// 🚀 main(): where it all begins. The "I pressed enter and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing, because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        error!("💀 error: {:#}", err);
        if smells_like_a_connection_problem(&err) {
            error!(
                "🔧 hint: looks like the cluster isn't reachable. \
                Double-check `host` and that Elasticsearch is actually running. \
                If you're using Docker, try `docker ps` to see what's up, \
                or `docker compose up -d` to resurrect it. ☕"
            );
        }
        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    // 🎯 Grab the args like catching Pokémon, gotta get at least 1
    let args: Vec<String> = std::env::args().collect();
    let path_arg = args.get(1).map(String::as_str).unwrap_or("esap.toml");

    // 🔒 A missing file is fine, env vars alone can carry the config
    let config_file = Path::new(path_arg);
    let config_file = match config_file.try_exists().with_context(|| {
        format!(
            "💀 couldn't check whether the configuration file exists. Was checking here: '{}'",
            config_file.display()
        )
    })? {
        true => Some(config_file),
        false => {
            warn!("📋 no config file at '{}', using ESAP_* env vars only", config_file.display());
            None
        }
    };

    let config = esap::load_config(config_file)
        .context("💀 couldn't load the appender config. Username and password are required, everything else has a default")?;
    let host = config.host.clone();

    let appender = Appender::new("esap-cli", config, PatternLayout::new())
        .await
        .with_context(|| format!("💀 couldn't bring up the appender against '{host}'"))?;
    appender.start()?;
    info!("🚀 shipping stdin to {} (major version {})", host, appender.major_version());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("💀 failed reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        appender.append(&LogEvent::new(Level::INFO, "esap_cli", line));
    }

    let drained = appender.stop(STOP_TIMEOUT).await;
    if !drained {
        warn!("⏰ final flush did not finish within {:?}, some lines may be lost", STOP_TIMEOUT);
    }
    println!("{}", stats_table(&appender.stats()));
    Ok(())
}

/// 🍽️ The receipt.
fn stats_table(stats: &StatsSnapshot) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["📊 metric", "count"]);
    for (metric, count) in [
        ("accepted", stats.accepted),
        ("dropped (buffer full)", stats.dropped),
        ("failed (never buffered)", stats.failed),
        ("batches sent", stats.batches_sent),
        ("batches failed", stats.batches_failed),
        ("records delivered", stats.records_delivered),
    ] {
        table.add_row(vec![metric.to_string(), count.to_string()]);
    }
    table
}

/// 🕵️ Sniff the error chain like a truffle pig hunting for connection problems.
fn smells_like_a_connection_problem(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(AppenderError::Bootstrap { connected: false, .. }) = cause.downcast_ref::<AppenderError>() {
            return true;
        }
        let cause = cause.to_string();
        cause.contains("error sending request")
            || cause.contains("onnection refused")
            || cause.contains("tcp connect error")
            || cause.contains("dns error")
    })
}
