use clap::Args;

#[derive(Args, Clone, Debug)]
#[command(next_help_heading = "Auction Options")]
#[group(id = "Auction")]
pub struct Options {
    /// Number of hours a declared winner has to complete settlement before the
    /// organizer may reopen the round.
    #[arg(long = "payment-window-hours")]
    #[arg(env = "AUCTION_PAYMENT_WINDOW_HOURS")]
    #[arg(default_value = "24")]
    pub payment_window_hours: u64,

    /// Minimum number of seconds a bidder has to wait between two bids on the
    /// same auction.
    #[arg(long = "bid-cooldown-secs")]
    #[arg(env = "AUCTION_BID_COOLDOWN_SECS")]
    #[arg(default_value = "10")]
    pub bid_cooldown_secs: u64,
}
