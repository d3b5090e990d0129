//! Operator tool: validate chain parameters from the environment, check them
//! against the live RPC endpoint, and write the chain record into the config
//! store. Unlike the webhook, validation failures here terminate non-zero.

use payrail::store::{ConfigStore, CHAIN_CONFIG_KEY};
use payrail::{chain, config, validation, ChainConfig, SqliteConfigStore};

fn require_env(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| {
        eprintln!("ERROR: {var} environment variable is required");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let chain_id_raw = require_env("RPC_CHAIN_ID");
    let chain_name = require_env("RPC_CHAIN_NAME");
    let rpc_url = require_env("RPC_URL");
    let token_symbol = require_env("RPC_TOKEN_SYMBOL");
    let decimals_raw = require_env("RPC_TOKEN_DECIMALS");
    let explorer_url = require_env("RPC_BLOCKEXPLORER_URL");
    let private_key = require_env("WALLET_PRIVATE_KEY");

    let mut invalid: Vec<&str> = Vec::new();

    let chain_id: u64 = match chain_id_raw.parse() {
        Ok(id) if id > 0 => id,
        _ => {
            invalid.push("RPC_CHAIN_ID");
            0
        }
    };
    if !validation::CHAIN_NAME.is_match(&chain_name) {
        invalid.push("RPC_CHAIN_NAME");
    }
    if !validation::is_http_url(&rpc_url) {
        invalid.push("RPC_URL");
    }
    if !validation::TOKEN_SYMBOL.is_match(&token_symbol) {
        invalid.push("RPC_TOKEN_SYMBOL");
    }
    let decimals: u8 = match decimals_raw.parse() {
        Ok(d) if d <= 18 => d,
        _ => {
            invalid.push("RPC_TOKEN_DECIMALS");
            0
        }
    };
    if !validation::is_http_url(&explorer_url) {
        invalid.push("RPC_BLOCKEXPLORER_URL");
    }
    let signing_account = match chain::derive_address(&private_key) {
        Ok(address) => address,
        Err(_) => {
            invalid.push("WALLET_PRIVATE_KEY");
            Default::default()
        }
    };

    if !invalid.is_empty() {
        eprintln!("Invalid environment variables: {}", invalid.join(", "));
        std::process::exit(1);
    }

    // The record is only useful if the endpoint actually serves this chain.
    println!("Checking RPC endpoint...");
    let provider = chain::connect_readonly(&rpc_url).expect("invalid RPC_URL");
    let live_chain_id = chain::chain_id(&provider)
        .await
        .expect("failed to query chain id from RPC endpoint");
    if live_chain_id != chain_id {
        eprintln!("Invalid RPC settings: endpoint reports chain id {live_chain_id}, expected {chain_id}");
        std::process::exit(1);
    }

    let db_path =
        std::env::var("CONFIG_DB_PATH").unwrap_or_else(|_| "./payrail-config.db".to_string());
    let store = SqliteConfigStore::open(&db_path).expect("failed to open config store");

    let record = ChainConfig {
        chain_id,
        chain_name,
        rpc_url,
        token: token_symbol,
        decimals,
        block_explorer_url: explorer_url,
        private_key,
    };
    store
        .set(
            CHAIN_CONFIG_KEY,
            &serde_json::to_value(&record).expect("chain record serializes"),
        )
        .expect("failed to write chain record");

    // Read back to confirm the record is durable and complete.
    let stored = config::chain_config(&store)
        .expect("failed to read back chain record")
        .expect("stored chain record is incomplete");

    println!("Chain configuration stored:");
    println!("  chainId:          {}", stored.chain_id);
    println!("  chainName:        {}", stored.chain_name);
    println!("  rpcUrl:           {}", stored.rpc_url);
    println!("  token:            {}", stored.token);
    println!("  decimals:         {}", stored.decimals);
    println!("  blockExplorerUrl: {}", stored.block_explorer_url);
    println!("  signing account:  {signing_account}");
    println!("Done!");
}
