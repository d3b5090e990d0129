//! Operator tool: register one fungible token in the token registry.
//! Read-merge-writes the registry so previously registered tokens survive.

use payrail::{chain, config, validation, SqliteConfigStore, TokenEntry};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [token, address, decimals] = match args.as_slice() {
        [t, a, d] => [t.clone(), a.clone(), d.clone()],
        _ => {
            eprintln!("usage: provision-token <token> <address> <decimals>");
            std::process::exit(2);
        }
    };

    // Normalize to the registry key form: lowercase, single leading '$'.
    let symbol = format!("${}", token.trim_start_matches('$').to_lowercase());

    let decimals_ok = decimals
        .parse::<u8>()
        .map(|d| d <= 18)
        .unwrap_or(false);
    if !validation::TOKEN_SYMBOL.is_match(&symbol)
        || !validation::ADDRESS.is_match(&address)
        || !decimals_ok
    {
        eprintln!("Invalid arguments.");
        std::process::exit(1);
    }

    let db_path =
        std::env::var("CONFIG_DB_PATH").unwrap_or_else(|_| "./payrail-config.db".to_string());
    let store = SqliteConfigStore::open(&db_path).expect("failed to open config store");

    let chain_config = config::chain_config(&store)
        .expect("failed to read chain record")
        .unwrap_or_else(|| {
            eprintln!("RPC not configured or found.");
            std::process::exit(1);
        });

    // Same liveness check as provision-chain: a stale record should not be
    // silently extended with new tokens.
    let provider = chain::connect_readonly(&chain_config.rpc_url).expect("invalid stored rpcUrl");
    let live_chain_id = chain::chain_id(&provider)
        .await
        .expect("failed to query chain id from RPC endpoint");
    if live_chain_id != chain_config.chain_id {
        eprintln!("Invalid RPC settings: endpoint reports chain id {live_chain_id}, expected {}", chain_config.chain_id);
        std::process::exit(1);
    }

    if symbol.eq_ignore_ascii_case(&chain_config.token) {
        eprintln!("Cannot register the native gas token symbol.");
        std::process::exit(1);
    }

    let stored = config::register_token(&store, &symbol, &TokenEntry { address, decimals })
        .expect("failed to write token registry");
    println!("Token registry:");
    for (key, entry) in &stored {
        match TokenEntry::from_value(entry) {
            Some(entry) => println!("  {key}: {} ({} decimals)", entry.address, entry.decimals),
            None => println!("  {key}: <malformed entry>"),
        }
    }
    println!("Done!");
}
