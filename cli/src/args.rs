use clap::{Args as ClapArgs, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Exchange Desk CLI - manage admin accounts and exchange rates"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an approved admin account
    CreateAdmin(CreateAdminArgs),

    /// Load the default rates into an empty rate store
    ///
    /// Does nothing when at least one rate is already on file.
    SeedRates,

    /// Append a rate for a currency pair
    ///
    /// Rates are never overwritten: lookups use the first rate stored for a pair.
    SetRate(SetRateArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CreateAdminArgs {
    #[arg(short, long, help = "Email address of the admin")]
    pub email: String,

    #[arg(short, long, help = "Password of the admin (at least 6 characters)")]
    pub password: String,

    #[arg(long, help = "First name")]
    pub first_name: Option<String>,

    #[arg(long, help = "Last name")]
    pub last_name: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct SetRateArgs {
    #[arg(long, help = "Currency pair such as XOF_USDT")]
    pub pair: String,

    #[arg(short, long, help = "Units of the target currency per unit of the source")]
    pub rate: Decimal,

    #[arg(long, default_value = "0", help = "Informational fee percentage")]
    pub fee_percent: Decimal,

    #[arg(long, default_value = "0", help = "Minimum input amount")]
    pub min_amount: Decimal,

    #[arg(long, default_value = "0", help = "Maximum input amount, 0 for no limit")]
    pub max_amount: Decimal,
}
