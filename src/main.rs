use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use reauth::auth::{AuthService, BcryptHasher};
use reauth::configuration::get_configuration;
use reauth::middleware::RefreshCookie;
use reauth::startup::run;
use reauth::storage::PgStorage;
use reauth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = init_telemetry("info") {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let store_timeout = configuration.database.store_timeout();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .min_connections(1)
        .max_lifetime(std::time::Duration::from_secs(60 * 60))
        .acquire_timeout(store_timeout)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to migrate the database: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
        })?;

    tracing::info!("Database connection pool created successfully");

    let storage = Arc::new(PgStorage::new(pool.clone()));
    let auth = Arc::new(AuthService::new(
        storage.clone(),
        storage,
        Arc::new(BcryptHasher::new(configuration.password.bcrypt_cost)),
        configuration.jwt.clone(),
        store_timeout,
    ));
    let cookie = RefreshCookie::new(
        configuration.application.secure_cookies,
        configuration.jwt.refresh_token_ttl(),
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        auth,
        cookie,
        configuration.application.shutdown_timeout_seconds,
    )?;

    let result = server.await;

    tracing::info!("Shutting down server");
    pool.close().await;
    tracing::info!("Server stopped");

    result
}
