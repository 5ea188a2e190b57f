//! Tote CLI - browse the catalog, manage the cart, and sign in.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! tote products --category electronics --search ssd
//! tote product 3
//! tote categories
//!
//! # Cart
//! tote cart add 3
//! tote cart set 3 2
//! tote cart show
//! tote checkout
//!
//! # Account
//! tote login --demo
//! tote register --first-name Ada --last-name Lovelace -e ada@example.com -p secret1 -c secret1
//! tote whoami
//! tote logout
//! ```
//!
//! # Environment Variables
//!
//! See `tote_client::config` for the full list. `RUST_LOG` overrides the
//! default log filter.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tote_client::AppContext;
use tote_client::config::ClientConfig;
use tote_core::ProductId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tote")]
#[command(author, version, about = "Tote storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        /// Only show this category ("all" shows everything)
        #[arg(short, long)]
        category: Option<String>,

        /// Case-insensitive title search
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one product
    Product {
        /// Product id
        id: ProductId,
    },
    /// List product categories
    Categories,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    /// Place an order for everything in the cart
    Checkout,
    /// Sign in
    Login {
        /// Account email
        #[arg(short, long, required_unless_present = "demo")]
        email: Option<String>,

        /// Account password
        #[arg(short, long, required_unless_present = "demo")]
        password: Option<String>,

        /// Use the demo account
        #[arg(long, conflicts_with_all = ["email", "password"])]
        demo: bool,
    },
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Repeat the password
        #[arg(short, long)]
        confirm_password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
}

#[derive(Subcommand)]
enum CartCommand {
    /// Show cart contents and totals
    Show,
    /// Add one unit of a product
    Add {
        /// Product id
        id: ProductId,
    },
    /// Set the quantity of a product (0 removes it)
    Set {
        /// Product id
        id: ProductId,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product
    Remove {
        /// Product id
        id: ProductId,
    },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing events to Sentry: warnings and errors become events, the rest
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tote=info,tote_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        e.report();
        tracing::error!("{}", e.user_message());
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> tote_client::Result<()> {
    let context = AppContext::open(config).await?;

    let result = dispatch(&context, cli.command).await;

    // Queued cart writes must land before the process exits.
    context.cart().flush().await;
    result
}

async fn dispatch(context: &AppContext, command: Commands) -> tote_client::Result<()> {
    match command {
        Commands::Products { category, search } => {
            commands::catalog::list(context, category.as_deref(), search).await
        }
        Commands::Product { id } => commands::catalog::show(context, id).await,
        Commands::Categories => commands::catalog::categories(context).await,
        Commands::Cart { action } => match action {
            CartCommand::Show => {
                commands::cart::show(context);
                Ok(())
            }
            CartCommand::Add { id } => commands::cart::add(context, id).await,
            CartCommand::Set { id, quantity } => commands::cart::set(context, id, quantity),
            CartCommand::Remove { id } => commands::cart::remove(context, id),
            CartCommand::Clear => commands::cart::clear(context),
        },
        Commands::Checkout => commands::cart::checkout(context),
        Commands::Login {
            email,
            password,
            demo,
        } => {
            let form = if demo {
                tote_client::identity::LoginForm::demo()
            } else {
                tote_client::identity::LoginForm {
                    email: email.unwrap_or_default(),
                    password: password.unwrap_or_default(),
                }
            };
            commands::account::login(context, &form).await
        }
        Commands::Register {
            first_name,
            last_name,
            email,
            password,
            confirm_password,
        } => {
            let form = tote_client::identity::RegisterForm {
                first_name,
                last_name,
                email,
                password,
                confirm_password,
            };
            commands::account::register(context, &form).await
        }
        Commands::Logout => commands::account::logout(context).await,
        Commands::Whoami => commands::account::whoami(context),
    }
}
