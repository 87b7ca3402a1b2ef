//! StakeVault Backend - Deposit Reconciliation Services
//!
//! Server-side services:
//! 1. Reconciler API - REST/WebSocket API for cross-chain deposit detection
//! 2. One-shot reconcile - Resolve a single transaction hash from the CLI
//!
//! Run modes:
//!   cargo run                        - Show usage
//!   cargo run -- api                 - Start REST API (for frontend)
//!   cargo run -- reconcile <hash>    - Reconcile one hash and print the verdict

use std::env;
use std::sync::Arc;

use stakevault::common::{Result, StakeVaultError};
use stakevault::config::StakeVaultConfig;
use stakevault::logging;
use stakevault::lookup::HttpLookupClient;
use stakevault::reconciler::{
    start_reconciler_server, DepositReconcilerService, MemoryDepositLedger, SearchStatus,
};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "api" => run_api_server().await,
        "reconcile" => run_reconcile_once(&args[2..]).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("[{}] {}", e.error_code(), e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("StakeVault Backend - Deposit Reconciliation Services");
    println!();
    println!("Usage:");
    println!("  stakevault-api api                 Start REST API server (default port: 3001)");
    println!("  stakevault-api reconcile <hash>    Reconcile one transaction hash");
    println!();
    println!("Environment Variables:");
    println!("  STAKEVAULT_LOOKUP_URL         Transaction lookup service base URL");
    println!("  STAKEVAULT_PROBE_TIMEOUT_MS   Bounded wait per network probe (default: 8000)");
    println!("  STAKEVAULT_API_PORT           REST API port (default: 3001)");
    println!("  STAKEVAULT_BSC_ADDRESS        Platform deposit address on BSC");
    println!("  STAKEVAULT_ETHEREUM_ADDRESS   Platform deposit address on Ethereum");
    println!("  STAKEVAULT_POLYGON_ADDRESS    Platform deposit address on Polygon");
    println!("  STAKEVAULT_TRON_ADDRESS       Platform deposit address on TRON");
    println!("  STAKEVAULT_LOG_LEVEL          Log level (default: info)");
    println!("  STAKEVAULT_LOG_JSON           Set to 1 for JSON log output");
}

/// Build the reconciler service from environment configuration
fn create_service(config: &StakeVaultConfig) -> DepositReconcilerService {
    let lookup = Arc::new(HttpLookupClient::new(&config.lookup_url));
    let ledger = Arc::new(MemoryDepositLedger::new());

    DepositReconcilerService::new(
        config.reconciler_config(),
        lookup,
        config.address_registry(),
        ledger,
    )
}

/// Start the REST API server
async fn run_api_server() -> Result<()> {
    let config = StakeVaultConfig::from_env()?;
    logging::init_from_config(&config)?;
    config.print_summary();

    let service = create_service(&config);
    start_reconciler_server(service, config.api_port).await?;
    Ok(())
}

/// Reconcile a single hash and print the result
async fn run_reconcile_once(args: &[String]) -> Result<()> {
    let Some(raw_hash) = args.first() else {
        eprintln!("Usage: stakevault-api reconcile <hash>");
        std::process::exit(2);
    };

    let config = StakeVaultConfig::from_env()?;
    let service = create_service(&config);
    let status = service.on_input(raw_hash).await;

    match &status {
        SearchStatus::Verified { verdict } => {
            println!("VERIFIED");
            println!("{}", serde_json::to_string_pretty(verdict).unwrap_or_default());
            Ok(())
        }
        SearchStatus::NotFound => {
            println!("NOT FOUND on any supported network");
            Ok(())
        }
        SearchStatus::Error { reason } => Err(StakeVaultError::service(reason.clone())),
        other => {
            println!("{}", other.label());
            Ok(())
        }
    }
}
