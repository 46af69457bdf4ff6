use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, OrderSide, StreamConfig};
use dac::OutputSink;
use engine::{shutdown, AlpacaClient, OrderExecutor, StreamLoop};
use strategy::{IndicatorFileConfig, MacdIndicator};

#[derive(Parser)]
#[command(
    name = "macd-ticker",
    about = "Real-time stock ticker with MACD, DAC output and Alpaca trading"
)]
struct Cli {
    /// Alpaca API key. Defaults to ALPACA_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Alpaca secret key. Defaults to ALPACA_SECRET_KEY.
    #[arg(long, global = true)]
    secret_key: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll one-minute bars and report MACD on a fixed interval (default).
    Stream(StreamArgs),
    /// Submit a buy order (limit when --price is given).
    Buy(OrderArgs),
    /// Submit a sell order (limit when --price is given).
    Sell(OrderArgs),
    /// Show account status and balances.
    Account,
}

#[derive(Args)]
struct StreamArgs {
    /// Stock symbol to stream.
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    /// Polling interval in seconds.
    #[arg(long, default_value_t = StreamConfig::DEFAULT_INTERVAL_SECS)]
    interval: u64,

    /// Lookback window in minutes.
    #[arg(long, default_value_t = StreamConfig::DEFAULT_LOOKBACK_MINUTES)]
    lookback: u64,
}

impl Default for StreamArgs {
    fn default() -> Self {
        Self {
            symbol: "AAPL".to_string(),
            interval: StreamConfig::DEFAULT_INTERVAL_SECS,
            lookback: StreamConfig::DEFAULT_LOOKBACK_MINUTES,
        }
    }
}

#[derive(Args)]
struct OrderArgs {
    /// Stock symbol to trade.
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    /// Number of shares. Required.
    #[arg(long)]
    qty: Option<f64>,

    /// Limit price. Market order when omitted.
    #[arg(long)]
    price: Option<f64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Stream(StreamArgs::default()));

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env(cli.api_key, cli.secret_key).context("Startup failed")?;
    let client = Arc::new(AlpacaClient::new(&cfg)?);
    info!(data_url = %cfg.data_url, trading_url = %cfg.trading_url, "Alpaca client ready");

    match command {
        Commands::Stream(args) => {
            let stream_cfg = StreamConfig::new(&args.symbol, args.interval, args.lookback)?;
            let periods = IndicatorFileConfig::load_optional(cfg.indicator_config_path.as_deref())?
                .periods()?;

            // ── Hardware (optional) ───────────────────────────────────────────
            let sink = OutputSink::detect(&cfg.dac_bus_path);

            let (handle, shutdown) = shutdown::channel();
            tokio::spawn(handle.trigger_on_ctrl_c());

            info!("Press Ctrl+C to stop");
            StreamLoop::new(stream_cfg, client, MacdIndicator::new(periods), sink)
                .run(shutdown)
                .await;
        }
        Commands::Buy(args) => place(client, OrderSide::Buy, args).await?,
        Commands::Sell(args) => place(client, OrderSide::Sell, args).await?,
        Commands::Account => {
            OrderExecutor::new(client).account().await?;
        }
    }
    Ok(())
}

async fn place(client: Arc<AlpacaClient>, side: OrderSide, args: OrderArgs) -> anyhow::Result<()> {
    let Some(qty) = args.qty else {
        bail!("Quantity (--qty) is required for {side} orders");
    };
    OrderExecutor::new(client)
        .place(&args.symbol, side, qty, args.price)
        .await
        .with_context(|| format!("Error placing {side} order"))?;
    Ok(())
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` for JSON lines.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
