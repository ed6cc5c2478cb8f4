use {
    crate::{
        api,
        auction,
        config::{
            MigrateOptions,
            RunOptions,
        },
        escrow,
        group,
        kernel::gateway::RazorpayGateway,
        state::{
            Store,
            StoreNew,
        },
    },
    anyhow::Result,
    sqlx::postgres::PgPoolOptions,
    std::sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
    std::time::Duration,
};

pub async fn start_server(run_options: RunOptions) -> Result<()> {
    tokio::spawn(async move {
        tracing::info!("Registered shutdown signal handler...");
        tokio::signal::ctrl_c().await.unwrap();
        tracing::info!("Shut down signal received, waiting for tasks...");
        SHOULD_EXIT.store(true, Ordering::Release);
    });

    let pool = PgPoolOptions::new()
        .max_connections(run_options.server.database_max_connections)
        .connect(&run_options.server.database_url)
        .await?;

    let store = Arc::new(Store { db: pool.clone() });

    let gateway = Arc::new(RazorpayGateway::new(
        run_options.gateway.gateway_url.clone(),
        run_options.gateway.gateway_key_id.clone(),
        run_options.gateway.gateway_key_secret.clone(),
    ));

    let group_service = group::service::Service::new(pool.clone());
    let escrow_service =
        escrow::service::Service::new(pool.clone(), group_service.clone(), gateway);
    let auction_service = auction::service::Service::new(
        pool.clone(),
        auction::service::Config {
            payment_window: time::Duration::hours(run_options.auction.payment_window_hours as i64),
            bid_cooldown:   time::Duration::seconds(run_options.auction.bid_cooldown_secs as i64),
        },
        group_service.clone(),
        escrow_service.clone(),
    );

    let store_new = Arc::new(StoreNew {
        store,
        group_service,
        auction_service,
        escrow_service,
    });

    api::start_api(run_options, store_new).await
}

pub async fn run_migrations(options: MigrateOptions) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&options.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied");
    Ok(())
}

// A static exit flag to indicate to running threads that we're shutting down. This is used to
// gracefully shutdown the application.
pub(crate) static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);
pub const EXIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);
