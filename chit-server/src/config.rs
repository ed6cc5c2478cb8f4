use clap::{
    crate_authors,
    crate_description,
    crate_name,
    crate_version,
    Args,
    Parser,
};

mod auction;
mod server;

#[derive(Parser, Debug)]
#[command(name = crate_name!())]
#[command(author = crate_authors!())]
#[command(about = crate_description!())]
#[command(version = crate_version!())]
pub enum Options {
    /// Run the chit auction server service.
    Run(RunOptions),
    /// Run the database migrations and exit.
    Migrate(MigrateOptions),
}

#[derive(Args, Clone, Debug)]
pub struct RunOptions {
    #[command(flatten)]
    pub server: server::Options,

    #[command(flatten)]
    pub auction: auction::Options,

    #[command(flatten)]
    pub gateway: GatewayOptions,
}

#[derive(Args, Clone, Debug)]
pub struct MigrateOptions {
    /// database url for persistent storage.
    #[arg(long = "database-url")]
    #[arg(env = "DATABASE_URL")]
    pub database_url: String,
}

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Payment Gateway Options")]
#[group(id = "Gateway")]
pub struct GatewayOptions {
    /// Base url of the payment gateway used for escrow contributions.
    #[arg(long = "gateway-url")]
    #[arg(env = "PAYMENT_GATEWAY_URL")]
    #[arg(default_value = "https://api.razorpay.com")]
    pub gateway_url: String,

    /// Key id for authenticating against the payment gateway.
    #[arg(long = "gateway-key-id")]
    #[arg(env = "PAYMENT_GATEWAY_KEY_ID")]
    #[arg(default_value = "")]
    pub gateway_key_id: String,

    /// Key secret for authenticating against the payment gateway.
    #[arg(long = "gateway-key-secret")]
    #[arg(env = "PAYMENT_GATEWAY_KEY_SECRET")]
    #[arg(default_value = "")]
    pub gateway_key_secret: String,
}
