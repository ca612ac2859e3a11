use anyhow::{Context, Result};
use clap::Parser;
use ladder_follower::archive::{ArchiveSource, SqliteLedger, TradeArchiveSync};
use ladder_follower::exchange::{
    AccountData, CexClient, Credentials, HttpFetcher, OrderGateway, SimulatedGateway,
    DEFAULT_BASE_URL,
};
use ladder_follower::session::{Session, SessionContext, StdinInput, TerminalPresenter};
use ladder_follower::{ExecutionMode, TraderConfig};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Trade against the real account (requires CEX_USER_ID, CEX_API_KEY, CEX_API_SECRET)
    #[arg(long, env = "LADDER_LIVE")]
    live: bool,

    /// Base currency
    #[arg(long, default_value = "BTC")]
    base: String,

    /// Quote currency
    #[arg(long, default_value = "USD")]
    quote: String,

    /// REST API root
    #[arg(long, env = "CEX_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// SQLite trade ledger
    #[arg(short, long, env = "LADDER_LEDGER", default_value = "ledger.db")]
    ledger: PathBuf,

    /// Initial lock depth (0 disables the lock)
    #[arg(short = 'L', long, default_value = "5")]
    lock_depth: usize,

    /// Submit auto-trade suggestions instead of only showing them
    #[arg(long, env = "LADDER_AUTO_PLACE")]
    auto_place: bool,

    /// Milliseconds to wait for input each cycle
    #[arg(long, default_value = "200")]
    idle_ms: u64,

    /// Ladder rows shown per side
    #[arg(long, default_value = "40")]
    rows: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs on stderr, ladder on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ladder_follower=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let credentials = match Credentials::from_env() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            if args.live {
                warn!("{:#}; falling back to simulation", e);
            }
            None
        }
    };
    let mode = if args.live && credentials.is_some() {
        ExecutionMode::Live
    } else {
        ExecutionMode::Simulation
    };

    let config = TraderConfig {
        mode,
        base: args.base,
        quote: args.quote,
        base_url: args.base_url,
        auto_place: args.auto_place,
        lock_depth: args.lock_depth,
        idle_timeout_ms: args.idle_ms,
        ledger_path: args.ledger,
        book_rows: args.rows,
        ..Default::default()
    };

    info!("Starting ladder follower");
    info!("Pair: {}", config.namespace());
    info!("Mode: {}", config.mode);
    info!("Lock depth: L{}", config.lock_depth);
    info!("Ledger: {}", config.ledger_path.display());

    let ledger = SqliteLedger::new(config.ledger_path.clone());
    ledger
        .probe()
        .with_context(|| format!("cannot open trade ledger {}", config.ledger_path.display()))?;

    let fetcher = HttpFetcher::new(config.http_timeout(), config.http_retries, config.retry_backoff())
        .context("failed to build HTTP client")?;
    let client = CexClient::new(
        fetcher,
        config.base_url.clone(),
        config.base.clone(),
        config.quote.clone(),
        credentials,
    );

    if config.is_live() {
        run_session(config, &client, &client, ledger).await
    } else {
        let paper = SimulatedGateway::new(config.paper_balance, config.fee_rate);
        run_session(config, &client, &paper, ledger).await
    }
}

async fn run_session<G>(
    config: TraderConfig,
    market: &CexClient,
    account: &G,
    ledger: SqliteLedger,
) -> Result<()>
where
    G: AccountData + OrderGateway + ArchiveSource,
{
    let archive = TradeArchiveSync::new(ledger, config.namespace(), config.history_page);
    let mut session = Session::new(
        SessionContext::new(config),
        market,
        account,
        archive,
        TerminalPresenter::stdout(),
    );
    let mut input = StdinInput::spawn();

    session.startup().await;
    info!("Commands: u/d reprice, x cancel/unlock, j/k N skip, l N lock, p PRICE, h/hh history");

    tokio::select! {
        _ = session.run(&mut input) => {},
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}
