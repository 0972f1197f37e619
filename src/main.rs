use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use trendbot::api::{BinanceClient, DiscordNotifier, LogNotifier, Notifier};
use trendbot::config::Settings;
use trendbot::execution::TradingLoop;

/// Trend-following spot bot: SMA(50/200) filter, RSI(14) entry, trailing stop
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Read environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging();

    tracing::info!("🚀 trendbot starting");

    // Missing credentials abort here, before any order can be placed
    let settings =
        Settings::load(cli.env_file.as_deref()).context("Failed to load configuration")?;
    let credentials = settings.credentials()?;

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Exchange: {}", settings.binance_base_url);
    tracing::info!(
        "  Symbol: {} ({} candles, {} bars)",
        settings.symbol,
        settings.interval,
        settings.kline_limit
    );
    tracing::info!(
        "  Poll Interval: {}s | Request Timeout: {}s",
        settings.poll_interval_secs,
        settings.request_timeout_secs
    );
    tracing::info!(
        "  Stop Loss: -{:.0}% | Take Profit: +{:.0}%",
        (1.0 - settings.risk.stop_loss_factor) * 100.0,
        (settings.risk.take_profit_factor - 1.0) * 100.0
    );
    tracing::info!("  State is kept in memory only; a restart starts flat");

    let binance = Arc::new(BinanceClient::new(
        settings.binance_base_url.clone(),
        settings.symbol.clone(),
        credentials,
        settings.request_timeout(),
    ));
    let notifier: Arc<dyn Notifier> = match &settings.discord_webhook {
        Some(url) if !url.trim().is_empty() => {
            tracing::info!("  Notifications: Discord webhook");
            Arc::new(DiscordNotifier::new(url.clone()))
        }
        _ => {
            tracing::warn!("  Notifications: DISCORD_WEBHOOK not set, logging only");
            Arc::new(LogNotifier)
        }
    };

    let mut trading_loop = TradingLoop::new(
        settings.loop_settings(),
        settings.risk.clone(),
        binance.clone(),
        binance.clone(),
        binance,
        notifier,
    );

    if cli.once {
        let report = trading_loop.run_cycle().await?;
        tracing::info!("Single cycle: {:?}", report.outcome);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("\n⚠️  Received Ctrl+C, stopping after the current cycle...");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = trading_loop.run(shutdown_rx).await;

    tracing::info!(
        "👋 trendbot stopped ({} cycles, {} failed)",
        summary.cycles,
        summary.failed_cycles
    );
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendbot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
