mod args;

use std::sync::Arc;

pub use args::{Args, Commands, CreateAdminArgs, SetRateArgs};
use clap::Parser;
use common::{Database, Exchange, ExchangeSettings, NewExchangeRate};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://exchange_desk.sqlite";

/// Runs the CLI command parser and executes the selected command.
/// Returns true if a CLI command was handled, false otherwise.
pub async fn run_cli() -> bool {
    let args = Args::parse();
    let Some(command) = args.command else {
        return false;
    };

    let exchange = match connect().await {
        Ok(exchange) => exchange,
        Err(e) => {
            eprintln!("Failed to open the database: {e:#}");
            return true;
        }
    };

    if let Err(e) = execute(&exchange, command).await {
        eprintln!("{e:#}");
    }
    true
}

/// Executes one command against `exchange` and prints what happened.
pub async fn execute(exchange: &Exchange, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::CreateAdmin(admin_args) => {
            let admin = create_admin(exchange, admin_args)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create admin: {e}"))?;
            println!("Admin '{}' created with id {}.", admin.email, admin.id);
        }
        Commands::SeedRates => {
            let added = exchange
                .seed_default_rates()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to seed rates: {e:#}"))?;
            if added == 0 {
                println!("Rates already present, nothing seeded.");
            } else {
                println!("Seeded {} default rates.", added);
            }
        }
        Commands::SetRate(rate_args) => {
            let rate = NewExchangeRate::new(&rate_args.pair, rate_args.rate)
                .with_fee(rate_args.fee_percent)
                .with_limits(rate_args.min_amount, rate_args.max_amount);
            let saved = exchange
                .set_rate(rate)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to set rate: {e}"))?;
            println!(
                "Rate {} = {} saved with id {}.",
                saved.pair, saved.rate, saved.id
            );
        }
    }
    Ok(())
}

async fn create_admin(
    exchange: &Exchange,
    admin_args: CreateAdminArgs,
) -> common::ExchangeResult<common::User> {
    exchange
        .create_admin(
            &admin_args.email,
            &admin_args.password,
            admin_args.first_name,
            admin_args.last_name,
        )
        .await
}

/// Opens the configured database the same way the server does.
async fn connect() -> anyhow::Result<Exchange> {
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::new(&database_url).await?;
    Ok(Exchange::new(Arc::new(db), ExchangeSettings::default()))
}
