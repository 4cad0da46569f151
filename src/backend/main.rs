/**
 * xfhub Server Entry Point
 *
 * `xfhub-server` runs the server.
 * `xfhub-server seal <plaintext>` prints `<plaintext>` encrypted with
 * `TENANT_ENCRYPTION_KEY`, ready to be stored in a tenant row.
 */
use xfhub::backend::server::create_app;
use xfhub::backend::tenancy::Vault;
use xfhub::shared::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => {}
        Some("seal") => {
            let Some(plaintext) = args.next() else {
                eprintln!("usage: xfhub-server seal <plaintext>");
                std::process::exit(2);
            };
            println!("{}", Vault::from_env()?.encrypt(&plaintext)?);
            return Ok(());
        }
        Some(other) => {
            eprintln!("unknown command: {}", other);
            eprintln!("usage: xfhub-server [seal <plaintext>]");
            std::process::exit(2);
        }
    }

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,xfhub=debug".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    tracing::info!("[STARTUP] Server initialization started");

    let config = ServerConfig::from_env()?;
    let (app, state) = create_app(&config).await?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[STARTUP] Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("[SHUTDOWN] Flushing buffered writes");
    state.writers.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("[SHUTDOWN] Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SHUTDOWN] Signal received");
}
