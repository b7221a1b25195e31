mod admin;
mod config;
mod error;
mod loader;
mod models;
mod pocketbase;
mod services;
mod store;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pocketbase::{PocketBaseClient, RecordService};
use crate::services::{AuthOutcome, AuthState, Services};
use crate::store::{WatchlistState, WatchlistStore};

#[derive(Parser)]
#[command(name = "tickersage", about = "Stock watchlist and filings client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct Credentials {
    #[arg(long, env = "TICKERSAGE_EMAIL")]
    email: String,

    #[arg(long, env = "TICKERSAGE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the record service is reachable
    Health,

    /// List all tickers
    Tickers,

    /// Show filings for one or more ticker symbols
    Filings {
        #[arg(required = true)]
        symbols: Vec<String>,
    },

    /// Create an account and sign in
    Register {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long, default_value = "")]
        name: String,
    },

    /// Show your watchlist with its filings
    Watchlist {
        #[command(flatten)]
        credentials: Credentials,
    },

    /// Add a ticker to your watchlist
    Add {
        #[command(flatten)]
        credentials: Credentials,

        symbol: String,
    },

    /// Remove a ticker from your watchlist
    Remove {
        #[command(flatten)]
        credentials: Credentials,

        symbol: String,
    },

    /// Create or update the tickers, filings and users_tickers collections
    ApplySchema {
        /// pb_schema.json-style file (default: built-in definitions)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Open self-registration on the users collection
    SetupUsers,

    /// Print the users collection rules and fields
    CheckSchema,

    /// Insert sample tickers and filings
    Seed {
        /// CSV with symbol,name columns (default: built-in tickers)
        #[arg(long)]
        tickers: Option<PathBuf>,

        /// CSV with symbol,type,date,title,summary,url columns
        #[arg(long)]
        filings: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tickersage=info,warn",
        1 => "tickersage=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let client = Arc::new(PocketBaseClient::new(&config.pocketbase)?);
    let records: Arc<dyn RecordService> = client.clone();
    let services = Services::new(records);

    match cli.command {
        Command::Health => {
            let message = client
                .health()
                .await
                .with_context(|| format!("Record service at {} is not reachable", config.pocketbase.url))?;
            println!("{}: {}", config.pocketbase.url, message);
        }

        Command::Tickers => {
            let tickers = services.tickers.try_available_tickers().await?;
            if tickers.is_empty() {
                println!("No tickers — run `tickersage seed` first.");
            }
            for t in &tickers {
                println!("  {:<6} {}", t.symbol, t.name);
            }
        }

        Command::Filings { symbols } => {
            let tickers = services.tickers.try_available_tickers().await?;
            let mut ids = Vec::new();
            for symbol in &symbols {
                let symbol = loader::normalise_symbol(symbol);
                match tickers.iter().find(|t| t.symbol == symbol) {
                    Some(t) => ids.push(t.id.clone()),
                    None => warn!("Unknown ticker {}", symbol),
                }
            }

            let filings = services.filings.try_filings_for_tickers(&ids).await?;
            if filings.is_empty() {
                println!("No filings found.");
            }
            for f in &filings {
                println!(
                    "{} {:<5} {:<6} {}",
                    f.date,
                    f.filing_type,
                    f.ticker_symbol.as_deref().unwrap_or("?"),
                    f.title
                );
                if !f.summary.is_empty() {
                    println!("    {}", utils::truncate(&f.summary, 100));
                }
            }
        }

        Command::Register { credentials, name } => {
            let outcome = services
                .auth
                .register(&credentials.email, &credentials.password, &credentials.password, &name)
                .await;
            match outcome {
                AuthOutcome::Success(session) => println!("Registered and signed in as {}", session.user.email),
                AuthOutcome::Failure(message) => bail!("Registration failed: {}", message),
            }
        }

        Command::Watchlist { credentials } => {
            sign_in(&services, &credentials).await?;
            let store = WatchlistStore::new(services.clone(), &config.store);
            print_watchlist(&store.init().await);
        }

        Command::Add { credentials, symbol } => {
            sign_in(&services, &credentials).await?;
            let store = WatchlistStore::new(services.clone(), &config.store);
            let state = store.init().await;

            let symbol = loader::normalise_symbol(&symbol);
            let Some(ticker) = state.available_tickers.iter().find(|t| t.symbol == symbol).cloned() else {
                bail!("Unknown ticker {}", symbol);
            };
            print_watchlist(&store.add_ticker(ticker).await);
        }

        Command::Remove { credentials, symbol } => {
            sign_in(&services, &credentials).await?;
            let store = WatchlistStore::new(services.clone(), &config.store);
            let state = store.init().await;

            let symbol = loader::normalise_symbol(&symbol);
            let Some(ticker) = state.selected_tickers.iter().find(|t| t.symbol == symbol) else {
                bail!("{} is not on your watchlist", symbol);
            };
            print_watchlist(&store.remove_ticker(&ticker.id).await);
        }

        Command::ApplySchema { file } => {
            let _t = utils::Timer::start("Apply schema");
            admin::authenticate(&*client, &config.admin).await?;

            let collections = match file {
                Some(path) => admin::schema::load_schema_file(&path)?,
                None => admin::schema::default_collections(),
            };
            let stats = admin::apply_schema(&*client, &collections).await?;
            info!(
                "Done: {} created, {} updated, {} errors",
                stats.created, stats.updated, stats.errors
            );
        }

        Command::SetupUsers => {
            admin::authenticate(&*client, &config.admin).await?;
            let users = admin::setup_users(&*client).await?;
            println!("Users collection is ready:");
            for line in admin::describe_collection(&users) {
                println!("  {}", line);
            }
        }

        Command::CheckSchema => {
            admin::authenticate(&*client, &config.admin).await?;
            let users = admin::check_schema(&*client).await?;
            println!("─────────────────────────────────");
            println!("  Users collection");
            println!("─────────────────────────────────");
            for line in admin::describe_collection(&users) {
                println!("  {}", line);
            }
        }

        Command::Seed { tickers, filings } => {
            let _t = utils::Timer::start("Seed");
            admin::authenticate(&*client, &config.admin).await?;
            info!("Seeding as {}", client.admin_email().unwrap_or_default());

            let tickers = match tickers {
                Some(path) => loader::load_tickers(&path)?,
                None => admin::seed::default_tickers(),
            };
            let filings = match filings {
                Some(path) => loader::load_filings(&path)?,
                None => admin::seed::default_filings(),
            };

            let stats = admin::seed::seed(&*client, &tickers, &filings).await;
            info!(
                "Done: {} tickers created, {} existing, {} filings created, {} errors",
                stats.tickers_created, stats.tickers_existing, stats.filings_created, stats.errors
            );
        }
    }

    Ok(())
}

async fn sign_in(services: &Services, credentials: &Credentials) -> Result<()> {
    match services.auth.login(&credentials.email, &credentials.password).await {
        AuthOutcome::Success(_) => {}
        AuthOutcome::Failure(message) => bail!("Login failed: {}", message),
    }
    match services.auth.state() {
        AuthState::Authenticated(user) => {
            info!("Signed in as {}", user.email);
            Ok(())
        }
        AuthState::Anonymous => bail!("Login did not establish a session"),
    }
}

fn print_watchlist(state: &WatchlistState) {
    if state.use_mock_data {
        println!("(record service unavailable, showing sample data)");
    }
    if state.sample_watchlist {
        println!("(your watchlist is empty, showing sample tickers; `tickersage add` starts your own)");
    }
    if let Some(error) = &state.error {
        println!("! {}", error);
    }
    if state.selected_tickers.is_empty() {
        println!("Your watchlist is empty.");
    }

    for ticker in &state.selected_tickers {
        let filings = state.filings.get(&ticker.id).map(Vec::as_slice).unwrap_or_default();
        println!("{:<6} {} ({} filings)", ticker.symbol, ticker.name, filings.len());
        for f in filings {
            println!("    {} {:<5} {}", f.date, f.filing_type, f.title);
        }
    }
}
