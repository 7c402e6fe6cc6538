//! Wallet CLI
//!
//! Command-line interface for the wallet consistency core. Talks to the
//! store directly and drives the relay/projector pair on demand with the
//! `project` command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use wallet_broker::InMemoryBroker;
use wallet_core::{HttpExchange, LedgerProjector, OutboxRelay, RelayConfig, SimExchange, WalletService};
use wallet_repo::{Store, build_store};
use wallet_types::{
    AccountId, ConvertRequest, Currency, DepositRequest, ExchangeApi, LedgerStore,
    OpenAccountRequest,
};

#[derive(Parser)]
#[command(name = "wallet")]
#[command(author, version, about = "Wallet consistency core CLI", long_about = None)]
struct Cli {
    /// Database URL
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://wallet.db?mode=rwc"
    )]
    database_url: String,

    /// External exchange base URL; uses the built-in simulator when unset
    #[arg(long, env = "EXCHANGE_URL")]
    exchange_url: Option<String>,

    /// Secret used to sign transport envelopes
    #[arg(long, env = "SIGNING_SECRET", default_value = "dev-signing-secret")]
    signing_secret: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account operations
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Deposit funds into an account balance
    Deposit {
        #[arg(long)]
        account: String,
        /// Amount in minor units
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long)]
        reference: Option<String>,
    },
    /// Convert between two currency balances of an account
    Convert {
        #[arg(long)]
        account: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount to debit, in minor units of the source currency
        #[arg(long)]
        amount: i64,
        /// Use the version-checked path instead of the row lock
        #[arg(long)]
        optimistic: bool,
    },
    /// Show the audit ledger for a user
    Ledger {
        /// User ID (UUID)
        #[arg(long)]
        user: String,
    },
    /// Publish pending outbox records and project them into the ledger
    Project,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Open a new account
    Open {
        /// Owning user ID (UUID); generated when omitted
        #[arg(long)]
        user: Option<String>,
        /// Account name
        name: String,
    },
    /// Get account details
    Get {
        /// Account ID (UUID)
        id: String,
    },
    /// List all accounts
    List,
}

fn parse_currency(s: &str) -> Result<Currency> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Unknown currency: {}. Supported: USD, EUR, GBP, NGN, GHS", s))
}

fn parse_account_id(s: &str) -> Result<AccountId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid account ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let store = Arc::new(build_store(&cli.database_url).await?);

    let exchange: Box<dyn ExchangeApi> = match &cli.exchange_url {
        Some(url) => Box::new(HttpExchange::new(url, Duration::from_secs(10))?),
        None => Box::new(SimExchange::default()),
    };
    let service = WalletService::new(Arc::clone(&store), exchange);

    match cli.command {
        Commands::Account { action } => match action {
            AccountCommands::Open { user, name } => {
                let user_id = match user {
                    Some(s) => s.parse()?,
                    None => Uuid::new_v4(),
                };
                let account = service
                    .open_account(OpenAccountRequest { user_id, name })
                    .await?;
                println!("{}", serde_json::to_string_pretty(&account)?);
            }
            AccountCommands::Get { id } => {
                let account = service.get_account(parse_account_id(&id)?).await?;
                println!("{}", serde_json::to_string_pretty(&account)?);
            }
            AccountCommands::List => {
                let accounts = service.list_accounts().await?;
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            }
        },

        Commands::Deposit {
            account,
            amount,
            currency,
            reference,
        } => {
            let receipt = service
                .deposit(DepositRequest {
                    account_id: parse_account_id(&account)?,
                    amount,
                    currency: parse_currency(&currency)?,
                    reference,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Commands::Convert {
            account,
            from,
            to,
            amount,
            optimistic,
        } => {
            let req = ConvertRequest {
                account_id: parse_account_id(&account)?,
                from: parse_currency(&from)?,
                to: parse_currency(&to)?,
                amount,
            };
            let receipt = if optimistic {
                service.convert_optimistic(req).await?
            } else {
                service.convert(req).await?
            };
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }

        Commands::Ledger { user } => {
            let user_id: Uuid = user.parse()?;
            let entries = store.entries_for_user(user_id).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }

        Commands::Project => {
            let published = project_pending(&store, &cli.signing_secret).await?;
            println!("Published {} records and projected the backlog", published);
        }
    }

    Ok(())
}

/// Runs one relay pass and drains the projector.
async fn project_pending(store: &Arc<Store>, secret: &str) -> Result<usize> {
    let broker = InMemoryBroker::new(4);

    let relay = OutboxRelay::new(
        Arc::clone(store),
        broker.clone(),
        RelayConfig {
            signing_secret: secret.to_string(),
            ..RelayConfig::default()
        },
    );
    let mut projector = LedgerProjector::new(
        Arc::clone(store),
        broker.subscribe("ledger-projector", "wallet.account"),
        secret,
        Duration::from_millis(10),
    );

    let mut published = 0;
    loop {
        let batch = relay.run_once().await?;
        if batch == 0 {
            break;
        }
        published += batch;
    }
    while projector.run_once().await?.is_some() {}

    Ok(published)
}
