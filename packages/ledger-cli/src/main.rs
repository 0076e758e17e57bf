//! Ledger CLI - command-line client for the personal finance ledger
//!
//! This binary can:
//! - Log in and keep the session token between runs
//! - Show who is logged in (decoded from the token)
//! - Manage the per-user income and expense category lists
//! - Query and edit transactions, ledgers, the balance summary and monthly
//!   budgets
//! - Follow session changes made by other processes

mod prompt;
mod watch;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use chrono::{NaiveDate, NaiveDateTime};
use ledger_core::api::{
    self, ApiClient, ApiConfig, BudgetRequest, Ledger, LedgerRequest, LedgerUpdate, SummaryQuery,
    Transaction, TransactionKind, TransactionQuery, TransactionRequest, TransactionUpdate,
};
use ledger_core::auth::{self, CredentialStore, Session};
use ledger_core::categories::{CategoryBook, CategoryKind};
use ledger_core::storage;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Ledger Client Team")]
#[command(version)]
#[command(about = "Command-line client for the personal finance ledger")]
#[command(long_about = "
Ledger CLI talks to the ledger HTTP API and keeps your session token between
runs. Every request except login carries it as a bearer token.

Quick start:
  1. Log in:            ledger login -u alice
  2. Check the session: ledger status
  3. See your balance:  ledger summary
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Income,
    Expense,
}

impl From<Kind> for CategoryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Income => CategoryKind::Income,
            Kind::Expense => CategoryKind::Expense,
        }
    }
}

impl From<Kind> for TransactionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Income => TransactionKind::Income,
            Kind::Expense => TransactionKind::Expense,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with username and password
    Login {
        #[arg(short, long)]
        username: String,

        /// Prompted for (without echo) when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show session status
    #[command(alias = "whoami")]
    Status,

    /// Print the claims carried by the stored token (unverified)
    Token,

    /// Manage income and expense categories
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// List, show, add, update or delete transactions
    Transactions {
        #[command(subcommand)]
        action: TransactionAction,
    },

    /// Manage ledgers
    Ledgers {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Show total income, total expense and balance
    Summary {
        #[command(flatten)]
        range: DateRange,
    },

    /// Show or set monthly budgets
    Budgets {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// Follow session changes until interrupted
    Watch,

    /// Show configuration paths and settings
    Config,
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// List categories
    List {
        #[arg(value_enum)]
        kind: Option<Kind>,
    },
    /// Add a category
    Add {
        #[arg(value_enum)]
        kind: Kind,
        name: String,
    },
    /// Remove a category
    Remove {
        #[arg(value_enum)]
        kind: Kind,
        name: String,
    },
    /// Move a category to another position (0-based)
    Move {
        #[arg(value_enum)]
        kind: Kind,
        from: usize,
        to: usize,
    },
}

/// Inclusive range of calendar days, either end open
#[derive(clap::Args)]
pub struct DateRange {
    /// First day, YYYY-MM-DD
    #[arg(long, value_parser = parse_day)]
    from: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD
    #[arg(long, value_parser = parse_day)]
    to: Option<NaiveDate>,
}

impl DateRange {
    fn start(&self) -> Option<NaiveDateTime> {
        self.from.and_then(|day| day.and_hms_opt(0, 0, 0))
    }

    fn end(&self) -> Option<NaiveDateTime> {
        self.to.and_then(|day| day.and_hms_opt(23, 59, 59))
    }
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[derive(Subcommand)]
pub enum TransactionAction {
    /// List transactions, newest first
    List {
        #[arg(short = 't', long = "type")]
        kind: Option<Kind>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[arg(long, default_value = "0")]
        skip: u32,

        #[command(flatten)]
        range: DateRange,
    },
    /// Show one transaction
    Show { id: i64 },
    /// Record a transaction dated now
    Add {
        #[arg(value_enum)]
        kind: Kind,
        amount: f64,
        category: String,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Change some fields of a transaction
    Update {
        id: i64,

        #[arg(short = 't', long = "type")]
        kind: Option<Kind>,

        #[arg(short, long)]
        amount: Option<f64>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a transaction by id
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum LedgerAction {
    /// List ledgers
    List {
        #[arg(short, long, default_value = "100")]
        limit: u32,

        #[arg(long, default_value = "0")]
        skip: u32,
    },
    /// Create a ledger
    Add {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Show one ledger
    Show { id: i64 },
    /// Rename a ledger or change its description
    Update {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a ledger by id
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// Show budgets for a month
    List {
        /// Month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Set the budget for a category, or the overall budget
    Set {
        amount: f64,

        /// Leave out for the overall monthly budget
        #[arg(short, long)]
        category: Option<String>,

        /// Month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,
    },
}

/// Everything a command needs, built once per run
struct App {
    config: ApiConfig,
    session: Session,
}

impl App {
    fn load() -> Result<Self> {
        let config = api::load_api_config();
        let store = storage::open_default(config.data_file.clone())
            .context("Failed to open preference storage")?;
        let session = Session::new(CredentialStore::new(store));
        Ok(Self { config, session })
    }

    fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.config, self.session.clone()).context("Failed to build HTTP client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ledger={},ledger_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let app = App::load()?;

    match &cli.command {
        Commands::Login { username, password } => {
            cmd_login(&cli, &app, username, password.as_deref()).await
        }
        Commands::Logout => cmd_logout(&cli, &app).await,
        Commands::Status => cmd_status(&cli, &app).await,
        Commands::Token => cmd_token(&cli, &app).await,
        Commands::Categories { action } => cmd_categories(&cli, &app, action).await,
        Commands::Transactions { action } => cmd_transactions(&cli, &app, action).await,
        Commands::Ledgers { action } => cmd_ledgers(&cli, &app, action).await,
        Commands::Summary { range } => cmd_summary(&cli, &app, range).await,
        Commands::Budgets { action } => cmd_budgets(&cli, &app, action).await,
        Commands::Watch => watch::run_watch(&app.session).await,
        Commands::Config => cmd_config(&cli, &app).await,
    }
}

async fn cmd_login(cli: &Cli, app: &App, username: &str, password: Option<&str>) -> Result<()> {
    let password = match password {
        Some(p) => p.to_string(),
        None => prompt::read_password("Password: ")?,
    };

    let client = app.client()?;
    client
        .login(username, &password)
        .await
        .context("Login failed")?;

    let status = app.session.status().await?;
    match cli.format {
        OutputFormat::Text => {
            println!(
                "Logged in as {}",
                status.username.as_deref().unwrap_or(auth::UNKNOWN_USER)
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "status": "logged_in",
                "username": status.username,
                "token_type": status.token_type,
            }));
        }
    }

    Ok(())
}

async fn cmd_logout(cli: &Cli, app: &App) -> Result<()> {
    let status = app.session.status().await?;

    if !status.authenticated {
        match cli.format {
            OutputFormat::Text => println!("Not logged in."),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "status": "not_logged_in" }));
            }
        }
        return Ok(());
    }

    app.session.logout().await?;

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Logged out {}",
                status.username.as_deref().unwrap_or(auth::UNKNOWN_USER)
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "status": "logged_out",
                "username": status.username,
            }));
        }
    }

    Ok(())
}

async fn cmd_status(cli: &Cli, app: &App) -> Result<()> {
    let status = app.session.status().await?;
    let storage_info = storage::get_storage_info(app.config.data_file.clone());

    match cli.format {
        OutputFormat::Text => {
            if status.authenticated {
                println!("Status:  Logged in");
                println!("User:    {}", app.session.display_label().await?);
                println!("Token:   {}", status.token_type.as_deref().unwrap_or("-"));
                println!("API:     {}", app.config.base_url);
                println!();
                println!("Storage: {}", storage_info);
            } else {
                println!("Status: Not logged in");
                println!();
                println!("Run 'ledger login -u <username>' to authenticate.");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "authenticated": status.authenticated,
                "username": status.username,
                "token_type": status.token_type,
                "api_url": app.config.base_url,
                "storage_info": storage_info,
            }));
        }
    }

    Ok(())
}

async fn cmd_token(cli: &Cli, app: &App) -> Result<()> {
    let Some(credential) = app.session.credentials().current().await? else {
        match cli.format {
            OutputFormat::Text => println!("Not logged in."),
            OutputFormat::Json => println!("null"),
        }
        return Ok(());
    };

    let claims = auth::token::decode(&credential.token);

    match cli.format {
        OutputFormat::Text => match claims {
            Some(claims) => {
                println!("Claims (signature NOT verified):");
                for (key, value) in claims.iter() {
                    println!("  {:10} {}", key, value);
                }
            }
            None => println!("Stored token is not a decodable JWT."),
        },
        OutputFormat::Json => {
            let value = claims.map(serde_json::Value::from);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

async fn cmd_categories(cli: &Cli, app: &App, action: &CategoryAction) -> Result<()> {
    let mut book = CategoryBook::for_session(&app.session)
        .await
        .context("Failed to load categories")?;

    let changed = match action {
        CategoryAction::List { kind } => {
            print_categories(cli, &book, kind.map(Into::into));
            return Ok(());
        }
        CategoryAction::Add { kind, name } => book.add((*kind).into(), name).await?,
        CategoryAction::Remove { kind, name } => book.remove((*kind).into(), name).await?,
        CategoryAction::Move { kind, from, to } => {
            book.reorder((*kind).into(), *from, *to).await?
        }
    };

    if !changed && matches!(cli.format, OutputFormat::Text) {
        println!("No change.");
    }
    print_categories(cli, &book, None);

    Ok(())
}

fn print_categories(cli: &Cli, book: &CategoryBook, kind: Option<CategoryKind>) {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => vec![CategoryKind::Income, CategoryKind::Expense],
    };

    match cli.format {
        OutputFormat::Text => {
            for kind in kinds {
                println!("{} categories ({}):", kind, book.username());
                for (i, name) in book.categories(kind).iter().enumerate() {
                    println!("  {:>2}. {}", i, name);
                }
            }
        }
        OutputFormat::Json => {
            let mut out = serde_json::Map::new();
            out.insert("username".into(), book.username().into());
            for kind in kinds {
                out.insert(kind.to_string(), book.categories(kind).to_vec().into());
            }
            println!("{}", serde_json::Value::Object(out));
        }
    }
}

async fn cmd_transactions(cli: &Cli, app: &App, action: &TransactionAction) -> Result<()> {
    let client = app.client()?;

    match action {
        TransactionAction::List {
            kind,
            category,
            limit,
            skip,
            range,
        } => {
            let query = TransactionQuery {
                skip: Some(*skip),
                limit: Some(*limit),
                kind: kind.map(Into::into),
                category: category.clone(),
                start_date: range.start(),
                end_date: range.end(),
            };
            let list = client.list_transactions(&query).await?;

            match cli.format {
                OutputFormat::Text => {
                    println!("{} of {} transactions:", list.items.len(), list.total);
                    println!();
                    for tx in &list.items {
                        print_transaction(tx);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&list)?),
            }
        }
        TransactionAction::Show { id } => {
            let tx = client
                .get_transaction(*id)
                .await
                .with_context(|| format!("Failed to fetch transaction {}", id))?;

            match cli.format {
                OutputFormat::Text => print_transaction(&tx),
                OutputFormat::Json => println!("{}", serde_json::to_string(&tx)?),
            }
        }
        TransactionAction::Add {
            kind,
            amount,
            category,
            description,
        } => {
            let request = TransactionRequest {
                amount: *amount,
                kind: (*kind).into(),
                category: category.clone(),
                description: description.clone(),
                image_path: None,
                date: None,
            };
            let tx = client
                .create_transaction(&request)
                .await
                .context("Failed to record transaction")?;

            match cli.format {
                OutputFormat::Text => {
                    println!("Recorded:");
                    print_transaction(&tx);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&tx)?),
            }
        }
        TransactionAction::Update {
            id,
            kind,
            amount,
            category,
            description,
        } => {
            let update = TransactionUpdate {
                kind: kind.map(Into::into),
                amount: *amount,
                category: category.clone(),
                description: description.clone(),
                ..Default::default()
            };
            if update.is_empty() {
                bail!("Nothing to update; pass at least one of --type, --amount, --category, --description");
            }
            let tx = client
                .update_transaction(*id, &update)
                .await
                .with_context(|| format!("Failed to update transaction {}", id))?;

            match cli.format {
                OutputFormat::Text => {
                    println!("Updated:");
                    print_transaction(&tx);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&tx)?),
            }
        }
        TransactionAction::Delete { id } => {
            client
                .delete_transaction(*id)
                .await
                .with_context(|| format!("Failed to delete transaction {}", id))?;

            match cli.format {
                OutputFormat::Text => println!("Deleted transaction {}", id),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "status": "deleted", "id": id }));
                }
            }
        }
    }

    Ok(())
}

fn print_transaction(tx: &Transaction) {
    let sign = match tx.kind {
        TransactionKind::Income => '+',
        TransactionKind::Expense => '-',
    };
    println!(
        "  {:>5}  {}  {}{:>10.2}  {:15} {}",
        tx.id,
        tx.date.format("%Y-%m-%d"),
        sign,
        tx.amount,
        tx.category,
        tx.description.as_deref().unwrap_or("")
    );
}

async fn cmd_ledgers(cli: &Cli, app: &App, action: &LedgerAction) -> Result<()> {
    let client = app.client()?;

    match action {
        LedgerAction::List { limit, skip } => {
            let list = client.list_ledgers(*skip, *limit).await?;

            match cli.format {
                OutputFormat::Text => {
                    println!("{} of {} ledgers:", list.items.len(), list.total);
                    println!();
                    for ledger in &list.items {
                        print_ledger(ledger);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&list)?),
            }
        }
        LedgerAction::Add { name, description } => {
            let request = LedgerRequest {
                name: name.clone(),
                description: description.clone(),
            };
            let ledger = client
                .create_ledger(&request)
                .await
                .context("Failed to create ledger")?;

            match cli.format {
                OutputFormat::Text => {
                    println!("Created:");
                    print_ledger(&ledger);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&ledger)?),
            }
        }
        LedgerAction::Show { id } => {
            let ledger = client
                .get_ledger(*id)
                .await
                .with_context(|| format!("Failed to fetch ledger {}", id))?;

            match cli.format {
                OutputFormat::Text => print_ledger(&ledger),
                OutputFormat::Json => println!("{}", serde_json::to_string(&ledger)?),
            }
        }
        LedgerAction::Update {
            id,
            name,
            description,
        } => {
            if name.is_none() && description.is_none() {
                bail!("Nothing to update; pass --name or --description");
            }
            let update = LedgerUpdate {
                name: name.clone(),
                description: description.clone(),
            };
            let ledger = client
                .update_ledger(*id, &update)
                .await
                .with_context(|| format!("Failed to update ledger {}", id))?;

            match cli.format {
                OutputFormat::Text => {
                    println!("Updated:");
                    print_ledger(&ledger);
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&ledger)?),
            }
        }
        LedgerAction::Delete { id } => {
            client
                .delete_ledger(*id)
                .await
                .with_context(|| format!("Failed to delete ledger {}", id))?;

            match cli.format {
                OutputFormat::Text => println!("Deleted ledger {}", id),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "status": "deleted", "id": id }));
                }
            }
        }
    }

    Ok(())
}

fn print_ledger(ledger: &Ledger) {
    println!(
        "  {:>5}  {}  {:20} {}",
        ledger.id,
        ledger.created_at.format("%Y-%m-%d"),
        ledger.name,
        ledger.description.as_deref().unwrap_or("")
    );
}

async fn cmd_summary(cli: &Cli, app: &App, range: &DateRange) -> Result<()> {
    let query = SummaryQuery {
        start_date: range.start(),
        end_date: range.end(),
    };
    let summary = app.client()?.transaction_summary(&query).await?;

    match cli.format {
        OutputFormat::Text => {
            println!("Income:  {:>12.2}", summary.total_income);
            println!("Expense: {:>12.2}", summary.total_expense);
            println!("Balance: {:>12.2}", summary.balance);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
    }

    Ok(())
}

fn month_or_current(month: Option<&str>) -> String {
    month
        .map(str::to_owned)
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m").to_string())
}

async fn cmd_budgets(cli: &Cli, app: &App, action: &BudgetAction) -> Result<()> {
    let client = app.client()?;

    match action {
        BudgetAction::List { month } => {
            let month = month_or_current(month.as_deref());
            let budgets = client.list_budgets(&month).await?;

            match cli.format {
                OutputFormat::Text => {
                    if budgets.is_empty() {
                        println!("No budgets set for {}.", month);
                    } else {
                        println!("Budgets for {}:", month);
                        for budget in &budgets {
                            println!(
                                "  {:15} {:>10.2}",
                                budget.category.as_deref().unwrap_or("(overall)"),
                                budget.amount
                            );
                        }
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&budgets)?),
            }
        }
        BudgetAction::Set {
            amount,
            category,
            month,
        } => {
            let request = BudgetRequest {
                amount: *amount,
                category: category.clone(),
                month: month_or_current(month.as_deref()),
            };
            let budget = client
                .set_budget(&request)
                .await
                .context("Failed to set budget")?;

            match cli.format {
                OutputFormat::Text => println!(
                    "Budget for {} ({}) set to {:.2}",
                    budget.month,
                    budget.category.as_deref().unwrap_or("overall"),
                    budget.amount
                ),
                OutputFormat::Json => println!("{}", serde_json::to_string(&budget)?),
            }
        }
    }

    Ok(())
}

async fn cmd_config(cli: &Cli, app: &App) -> Result<()> {
    let config = &app.config;
    let config_path = api::config::get_config_file_path_string();
    let storage_info = storage::get_storage_info(config.data_file.clone());

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:   {}", config_path);
            println!("API endpoint:  {} (from {})", config.base_url, config.source);
            println!("Timeout:       {}s", config.timeout.as_secs());
            println!("Exempt paths:  {}", config.exempt_paths.join(", "));
            println!("Storage:       {}", storage_info);
            println!();
            println!("Environment variables:");
            println!("  {} - Override API endpoint", api::config::ENV_API_URL);
            println!("  {} - Override preferences file", api::config::ENV_DATA_FILE);
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", api::config::generate_example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "config_file": config_path,
                "api_url": config.base_url,
                "api_source": config.source.to_string(),
                "timeout_secs": config.timeout.as_secs(),
                "exempt_paths": config.exempt_paths,
                "storage": storage_info,
            }));
        }
    }

    Ok(())
}
