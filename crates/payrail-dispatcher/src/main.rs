use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payrail::{chain, config, RpcSubmitter, SqliteConfigStore};
use payrail_dispatcher::routes;
use payrail_dispatcher::state::{AppState, SigningKeys};

fn signing_key(var: &str) -> Option<Vec<u8>> {
    std::env::var(var)
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.into_bytes())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let current = match signing_key("QUEUE_CURRENT_SIGNING_KEY") {
        Some(key) => key,
        None => {
            tracing::error!(
                "QUEUE_CURRENT_SIGNING_KEY is required. \
                 Set it to the queue's current signing secret."
            );
            std::process::exit(1);
        }
    };
    let next = signing_key("QUEUE_NEXT_SIGNING_KEY");
    if next.is_none() {
        tracing::warn!(
            "QUEUE_NEXT_SIGNING_KEY not set — signature rotation window is a single key"
        );
    }

    let db_path =
        std::env::var("CONFIG_DB_PATH").unwrap_or_else(|_| "./payrail-config.db".to_string());
    let store = match SqliteConfigStore::open(&db_path) {
        Ok(store) => {
            tracing::info!("Config store: SQLite at {db_path}");
            Arc::new(store)
        }
        Err(e) => {
            tracing::error!("Failed to open config store at {db_path}: {e}");
            std::process::exit(1);
        }
    };

    // Log the configured chain (if provisioned) so a misconfigured deploy is
    // visible at startup. The dispatcher still starts unprovisioned and
    // answers every webhook with the not-configured message.
    match config::chain_config(store.as_ref()) {
        Ok(Some(chain_config)) => {
            let account = chain::derive_address(&chain_config.private_key)
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            tracing::info!(
                chain = %chain_config.chain_name,
                chain_id = chain_config.chain_id,
                native = %chain_config.token,
                signing_account = %account,
                "chain configuration loaded"
            );
        }
        Ok(None) => tracing::warn!("no chain configuration — run provision-chain before use"),
        Err(e) => tracing::warn!(error = %e, "could not read chain configuration"),
    }

    let metrics_token = std::env::var("METRICS_TOKEN")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.into_bytes());
    if metrics_token.is_none() {
        tracing::warn!("METRICS_TOKEN not set — /metrics requires PAYRAIL_PUBLIC_METRICS=true");
    }

    let state = web::Data::new(AppState {
        store,
        submitter: Arc::new(RpcSubmitter::from_env()),
        signing_keys: SigningKeys { current, next },
        signing_lock: tokio::sync::Mutex::new(()),
        metrics_token,
    });

    let port: u16 = std::env::var("DISPATCHER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8787);

    let rate_limit_rpm: u64 = std::env::var("RATE_LIMIT_RPM")
        .ok()
        .and_then(|r| r.parse().ok())
        .unwrap_or(120);

    tracing::info!("Payrail dispatcher listening on port {port}");
    tracing::info!("Rate limit: {rate_limit_rpm} req/min per IP");
    tracing::info!("  GET  http://localhost:{port}/health");
    tracing::info!("  POST http://localhost:{port}/");

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    HttpServer::new(move || {
        App::new()
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .app_data(web::PayloadConfig::default().limit(65_536))
            .service(routes::health)
            .service(routes::metrics_endpoint)
            .service(routes::dispatch)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
