use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::{test, web, App};
use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::{json, Value};

use payrail::store::{CHAIN_CONFIG_KEY, TOKEN_REGISTRY_KEY};
use payrail::{
    signature, ChainConfig, ConfigStore, DispatchError, InMemoryConfigStore, Transfer,
    TransferSubmitter,
};
use payrail_dispatcher::routes::{self, SIGNATURE_HEADER};
use payrail_dispatcher::state::{AppState, SigningKeys};

const CURRENT_KEY: &[u8] = b"test-current-key";
const NEXT_KEY: &[u8] = b"test-next-key";

fn tx_hash() -> String {
    format!("0x{}", "c".repeat(64))
}

/// Store double that counts reads, so tests can assert a rejected request
/// never touched configuration.
struct RecordingStore {
    inner: InMemoryConfigStore,
    gets: AtomicUsize,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryConfigStore::new(),
            gets: AtomicUsize::new(0),
        }
    }

    fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl ConfigStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DispatchError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), DispatchError> {
        self.inner.set(key, value)
    }
}

/// Submitter double that records every transfer instead of broadcasting.
struct RecordingSubmitter {
    calls: Mutex<Vec<Transfer>>,
}

impl RecordingSubmitter {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Transfer> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferSubmitter for RecordingSubmitter {
    async fn submit(
        &self,
        _config: &ChainConfig,
        transfer: Transfer,
    ) -> Result<String, DispatchError> {
        self.calls.lock().unwrap().push(transfer);
        Ok(tx_hash())
    }
}

/// Store double whose reads always fail, as when the backing database is
/// unreachable.
struct FailingStore;

impl ConfigStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, DispatchError> {
        Err(DispatchError::Store("store offline".to_string()))
    }

    fn set(&self, _key: &str, _value: &Value) -> Result<(), DispatchError> {
        Err(DispatchError::Store("store offline".to_string()))
    }
}

/// Submitter double that fails at the broadcast layer.
struct FailingSubmitter;

#[async_trait]
impl TransferSubmitter for FailingSubmitter {
    async fn submit(
        &self,
        _config: &ChainConfig,
        _transfer: Transfer,
    ) -> Result<String, DispatchError> {
        Err(DispatchError::Chain("insufficient funds".to_string()))
    }
}

fn make_state(
    store: Arc<RecordingStore>,
    submitter: Arc<dyn TransferSubmitter>,
) -> web::Data<AppState> {
    web::Data::new(AppState {
        store,
        submitter,
        signing_keys: SigningKeys {
            current: CURRENT_KEY.to_vec(),
            next: Some(NEXT_KEY.to_vec()),
        },
        signing_lock: tokio::sync::Mutex::new(()),
        metrics_token: None,
    })
}

fn seed_chain(store: &RecordingStore) {
    store
        .set(
            CHAIN_CONFIG_KEY,
            &json!({
                "chainId": 8453,
                "chainName": "Base",
                "rpcUrl": "http://localhost:1",
                "token": "$ETH",
                "decimals": 18,
                "blockExplorerUrl": "https://scan.example.org",
                "privateKey": format!("0x{}", "1".repeat(64)),
            }),
        )
        .unwrap();
}

fn seed_usdc(store: &RecordingStore) {
    store
        .set(
            TOKEN_REGISTRY_KEY,
            &json!({
                "$usdc": {
                    "address": format!("0x{}", "b".repeat(40)),
                    "decimals": "6",
                },
            }),
        )
        .unwrap();
}

fn recipient() -> String {
    format!("0x{}", "a".repeat(40))
}

fn payload(token: &str, amount: Value) -> String {
    json!({
        "address": recipient(),
        "token": token,
        "amount": amount,
    })
    .to_string()
}

fn signed_post(body: &str) -> actix_web::test::TestRequest {
    let sig = signature::compute_signature(CURRENT_KEY, body.as_bytes());
    test::TestRequest::post()
        .uri("/")
        .set_payload(body.to_string())
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, sig))
}

async fn dispatch_body(
    state: web::Data<AppState>,
    req: actix_web::test::TestRequest,
) -> (u16, String) {
    let app = test::init_service(App::new().app_data(state).service(routes::dispatch)).await;
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status().as_u16();
    let body = test::read_body(resp).await;
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[actix_rt::test]
async fn unconfigured_chain_returns_not_configured_message() {
    // Scenario A: store empty, payload and signature valid.
    let store = Arc::new(RecordingStore::new());
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, body) = dispatch_body(state, signed_post(&payload("$ETH", json!("1.5")))).await;

    assert_eq!(status, 200);
    assert_eq!(body, "RPC not configured or found.");
    assert!(submitter.calls().is_empty());
}

#[actix_rt::test]
async fn native_transfer_scales_by_native_decimals() {
    // Scenario B: $ETH at 18 decimals, amount 1.5.
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, body) = dispatch_body(state, signed_post(&payload("$ETH", json!("1.5")))).await;

    assert_eq!(status, 200);
    assert_eq!(body, format!("https://scan.example.org/tx/{}", tx_hash()));
    assert_eq!(
        submitter.calls(),
        vec![Transfer::Native {
            to: recipient().parse().unwrap(),
            value: U256::from_str_radix("1500000000000000000", 10).unwrap(),
        }]
    );
}

#[actix_rt::test]
async fn token_transfer_scales_by_token_decimals() {
    // Scenario C: registered $usdc at 6 decimals, amount 10, symbol case differs.
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    seed_usdc(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, body) = dispatch_body(state, signed_post(&payload("$USDC", json!("10")))).await;

    assert_eq!(status, 200);
    assert_eq!(body, format!("https://scan.example.org/tx/{}", tx_hash()));
    assert_eq!(
        submitter.calls(),
        vec![Transfer::Token {
            contract: format!("0x{}", "b".repeat(40)).parse().unwrap(),
            to: recipient().parse().unwrap(),
            value: U256::from(10_000_000u64),
        }]
    );
}

#[actix_rt::test]
async fn missing_signature_skips_store_and_submitter() {
    // Scenario D: no signature header at all.
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let body = payload("$ETH", json!("1.5"));
    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(body)
        .insert_header(("Content-Type", "application/json"));
    let (status, text) = dispatch_body(state, req).await;

    assert_eq!(status, 200);
    assert_eq!(text, "Signature verification failed.");
    assert_eq!(store.get_count(), 0);
    assert!(submitter.calls().is_empty());
}

#[actix_rt::test]
async fn invalid_signature_skips_store_and_submitter() {
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let body = payload("$ETH", json!("1.5"));
    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(body)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, "deadbeef"));
    let (status, text) = dispatch_body(state, req).await;

    assert_eq!(status, 200);
    assert_eq!(text, "Signature verification failed.");
    assert_eq!(store.get_count(), 0);
    assert!(submitter.calls().is_empty());
}

#[actix_rt::test]
async fn next_key_signature_is_accepted() {
    // Zero-downtime rotation: the queue may already sign with the next key.
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let body = payload("$ETH", json!("2"));
    let sig = signature::compute_signature(NEXT_KEY, body.as_bytes());
    let req = test::TestRequest::post()
        .uri("/")
        .set_payload(body)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, sig));
    let (status, text) = dispatch_body(state, req).await;

    assert_eq!(status, 200);
    assert_eq!(text, format!("https://scan.example.org/tx/{}", tx_hash()));
    assert_eq!(submitter.calls().len(), 1);
}

#[actix_rt::test]
async fn bad_amounts_are_rejected_before_any_lookup() {
    for bad in ["0", "-1", "abc", ""] {
        let store = Arc::new(RecordingStore::new());
        seed_chain(&store);
        let submitter = Arc::new(RecordingSubmitter::new());
        let state = make_state(store.clone(), submitter.clone());

        let (status, text) =
            dispatch_body(state, signed_post(&payload("$ETH", json!(bad)))).await;

        assert_eq!(status, 200);
        assert_eq!(text, "Invalid payload request.", "amount {bad:?}");
        assert_eq!(store.get_count(), 0, "amount {bad:?} must not reach the store");
        assert!(submitter.calls().is_empty());
    }
}

#[actix_rt::test]
async fn empty_body_is_an_invalid_payload() {
    let store = Arc::new(RecordingStore::new());
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, text) = dispatch_body(state, signed_post("")).await;

    assert_eq!(status, 200);
    assert_eq!(text, "Invalid payload request.");
    assert_eq!(store.get_count(), 0);
}

#[actix_rt::test]
async fn unknown_token_is_rejected_without_submission() {
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    seed_usdc(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, text) = dispatch_body(state, signed_post(&payload("$DAI", json!("1")))).await;

    assert_eq!(status, 200);
    assert_eq!(text, "Invalid token.");
    assert!(submitter.calls().is_empty());
}

#[actix_rt::test]
async fn native_symbol_wins_over_registry_entry() {
    // A registry entry under the native symbol must not turn a native
    // transfer into a contract call.
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    store
        .set(
            TOKEN_REGISTRY_KEY,
            &json!({
                "$eth": {
                    "address": format!("0x{}", "b".repeat(40)),
                    "decimals": "6",
                },
            }),
        )
        .unwrap();
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, _) = dispatch_body(state, signed_post(&payload("$eth", json!("1")))).await;

    assert_eq!(status, 200);
    assert!(matches!(
        submitter.calls().as_slice(),
        [Transfer::Native { .. }]
    ));
}

#[actix_rt::test]
async fn numeric_amount_is_accepted() {
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    seed_usdc(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, _) = dispatch_body(state, signed_post(&payload("$usdc", json!(10)))).await;

    assert_eq!(status, 200);
    assert_eq!(
        submitter.calls(),
        vec![Transfer::Token {
            contract: format!("0x{}", "b".repeat(40)).parse().unwrap(),
            to: recipient().parse().unwrap(),
            value: U256::from(10_000_000u64),
        }]
    );
}

#[actix_rt::test]
async fn incomplete_chain_record_reads_as_unconfigured() {
    let store = Arc::new(RecordingStore::new());
    store
        .set(CHAIN_CONFIG_KEY, &json!({"chainId": 8453, "chainName": "Base"}))
        .unwrap();
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter.clone());

    let (status, text) = dispatch_body(state, signed_post(&payload("$ETH", json!("1")))).await;

    assert_eq!(status, 200);
    assert_eq!(text, "RPC not configured or found.");
}

#[actix_rt::test]
async fn submission_failure_still_answers_200() {
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    let state = make_state(store.clone(), Arc::new(FailingSubmitter));

    let (status, text) = dispatch_body(state, signed_post(&payload("$ETH", json!("1")))).await;

    assert_eq!(status, 200);
    assert_eq!(text, "chain error: insufficient funds");
}

#[actix_rt::test]
async fn health_reports_chain_provisioning() {
    let store = Arc::new(RecordingStore::new());
    seed_chain(&store);
    let submitter = Arc::new(RecordingSubmitter::new());
    let state = make_state(store.clone(), submitter);

    let app = test::init_service(App::new().app_data(state).service(routes::health)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chainConfigured"], true);
}

#[actix_rt::test]
async fn health_degrades_when_store_is_unreachable() {
    let state = web::Data::new(AppState {
        store: Arc::new(FailingStore),
        submitter: Arc::new(RecordingSubmitter::new()),
        signing_keys: SigningKeys {
            current: CURRENT_KEY.to_vec(),
            next: Some(NEXT_KEY.to_vec()),
        },
        signing_lock: tokio::sync::Mutex::new(()),
        metrics_token: None,
    });

    let app = test::init_service(App::new().app_data(state).service(routes::health)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(resp.status(), 503);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "degraded");
}
