use actix_web::{get, post, web, HttpRequest, HttpResponse};
use payrail::{config, signature, DispatchError, TransferRequest};

use crate::metrics;
use crate::state::{AppState, SigningKeys};

/// Header carrying the queue's HMAC signature over the raw body bytes.
pub const SIGNATURE_HEADER: &str = "X-Queue-Signature";

/// Verify the queue signature on an incoming request.
///
/// Runs before anything else touches the body — a request that fails here
/// must cause no store or chain access.
fn verify_queue_signature(
    req: &HttpRequest,
    body: &[u8],
    keys: &SigningKeys,
) -> Result<(), DispatchError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match header_value {
        Some(sig) => {
            if signature::verify_rotating(&keys.current, keys.next.as_deref(), body, sig) {
                Ok(())
            } else {
                tracing::warn!("queue signature verification failed — signature mismatch");
                metrics::SIGNATURE_FAILURES
                    .with_label_values(&["invalid"])
                    .inc();
                Err(DispatchError::Authentication)
            }
        }
        None => {
            tracing::warn!("queue signature header missing");
            metrics::SIGNATURE_FAILURES
                .with_label_values(&["missing"])
                .inc();
            Err(DispatchError::Authentication)
        }
    }
}

/// The dispatch pipeline after authentication: parse, validate, resolve
/// configuration, branch native-vs-token, submit, and return the explorer
/// URL for the confirmed transaction.
async fn run_dispatch(state: &AppState, body: &[u8]) -> Result<String, DispatchError> {
    // An empty body parses to an empty request; validation rejects it below.
    let request: TransferRequest = if body.is_empty() {
        TransferRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|_| DispatchError::InvalidPayload)?
    };
    let request = request.validate()?;

    let chain = config::chain_config(state.store.as_ref())?
        .ok_or(DispatchError::ChainNotConfigured)?;
    let registry = config::token_registry(state.store.as_ref())?;
    let transfer = config::resolve_transfer(&chain, &registry, &request)?;

    // One custodial account: hold the lock across submit so concurrent
    // requests cannot race on its nonce.
    let _guard = state.signing_lock.lock().await;
    let tx_hash = state.submitter.submit(&chain, transfer).await?;

    Ok(chain.explorer_tx_url(&tx_hash))
}

fn error_kind(error: &DispatchError) -> &'static str {
    match error {
        DispatchError::Authentication => "auth",
        DispatchError::InvalidPayload => "payload",
        DispatchError::ChainNotConfigured => "config",
        DispatchError::UnknownToken => "token",
        DispatchError::Chain(_) => "chain",
        DispatchError::Store(_) => "store",
    }
}

/// The webhook route. Always answers 200: the body is either the explorer
/// transaction URL or the failure's message. A non-200 status would make the
/// upstream queue redeliver a request that has already been decided.
#[post("/")]
pub async fn dispatch(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    let start = std::time::Instant::now();

    let result = match verify_queue_signature(&req, &body, &state.signing_keys) {
        Ok(()) => run_dispatch(&state, &body).await,
        Err(e) => Err(e),
    };
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(url) => {
            metrics::DISPATCH_REQUESTS
                .with_label_values(&["success"])
                .inc();
            metrics::DISPATCH_LATENCY
                .with_label_values(&["success"])
                .observe(elapsed);
            tracing::info!(tx = %url, "transfer dispatched");
            HttpResponse::Ok().content_type("text/plain").body(url)
        }
        Err(e) => {
            let kind = error_kind(&e);
            metrics::DISPATCH_REQUESTS.with_label_values(&[kind]).inc();
            metrics::DISPATCH_LATENCY
                .with_label_values(&[kind])
                .observe(elapsed);
            tracing::warn!(error = %e, kind, "dispatch rejected");
            HttpResponse::Ok()
                .content_type("text/plain")
                .body(e.to_string())
        }
    }
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match config::chain_config(state.store.as_ref()) {
        Ok(chain) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "payrail-dispatcher",
            "chainConfigured": chain.is_some(),
        })),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "degraded",
            "service": "payrail-dispatcher",
            "error": "config store unreachable",
        })),
    }
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match &state.metrics_token {
        Some(token) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| payrail::security::constant_time_eq(t.as_bytes(), token))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            // No token configured — metrics stay protected unless the
            // operator explicitly opts in.
            let public_metrics = std::env::var("PAYRAIL_PUBLIC_METRICS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
            if !public_metrics {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or PAYRAIL_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}
