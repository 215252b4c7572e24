//! FundLedger CLI
//!
//! Command-line interface over a durable ledger directory.

use clap::{Parser, Subcommand};
use fundledger::config::WalSyncStrategy;
use fundledger::model::natural_id;
use fundledger::{Config, Donation, Ledger, LedgerError, Ngo, Query, Record, SpendRequest};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// FundLedger
#[derive(Parser, Debug)]
#[command(name = "fundledger")]
#[command(about = "Deterministic spend allocation over donation history")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./fundledger_data")]
    data_dir: String,

    /// Fractional digits allowed in amounts
    #[arg(short, long, default_value = "2")]
    scale: u32,

    /// fsync the WAL every N commits instead of every commit
    #[arg(long)]
    sync_every: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register an NGO
    Ngo {
        /// Registration number
        registration_number: String,

        /// Display name
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Record a donation to an NGO
    Donate {
        #[arg(long)]
        id: String,

        #[arg(long)]
        amount: Decimal,

        #[arg(long)]
        donor: String,

        /// NGO registration number
        #[arg(long)]
        ngo: String,

        #[arg(long)]
        date: String,
    },

    /// Record a spend and allocate it across donations
    Spend {
        /// Transaction id (seeds allocation ids)
        #[arg(long)]
        tx: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        amount: Decimal,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        date: String,

        /// NGO registration number
        #[arg(long)]
        ngo: String,
    },

    /// List documents of a type, optionally filtered on one field
    Query {
        /// Document type (ngo, donation, spend, spendAllocation)
        doc_type: String,

        #[arg(long, requires = "value")]
        field: Option<String>,

        /// Compared as a string unless --json is given
        #[arg(long, requires = "field")]
        value: Option<String>,

        /// Parse --value as JSON (numbers, booleans, null)
        #[arg(long, requires = "value")]
        json: bool,
    },

    /// Show per-donation balances of an NGO
    Balances {
        /// NGO registration number
        ngo: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fundledger=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let sync = match args.sync_every {
        Some(count) => WalSyncStrategy::EveryNEntries { count },
        None => WalSyncStrategy::EveryWrite,
    };
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .amount_scale(args.scale)
        .wal_sync_strategy(sync)
        .build();

    let ledger = match Ledger::open(config) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to open ledger: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&ledger, args.command) {
        if e.is_rejection() {
            tracing::warn!("Rejected: {}", e);
            std::process::exit(1);
        }
        tracing::error!("Failed: {}", e);
        std::process::exit(2);
    }
}

fn run(ledger: &Ledger, command: Commands) -> Result<(), LedgerError> {
    match command {
        Commands::Ngo { registration_number, name } => {
            let ngo = Ngo { registration_number, name };
            ledger.register_ngo(&ngo)?;
            print_json(&serde_json::to_value(&ngo)?);
        }
        Commands::Donate { id, amount, donor, ngo, date } => {
            let donation = Donation {
                donation_id: id,
                donation_amount: amount,
                donor_user_name: donor,
                ngo_registration_number: ngo,
                donation_date: date,
            };
            ledger.record_donation(&donation)?;
            print_json(&serde_json::to_value(&donation)?);
        }
        Commands::Spend { tx, id, amount, description, date, ngo } => {
            let request = SpendRequest {
                id,
                amount,
                description,
                date,
                beneficiary_id: ngo,
            };
            let set = ledger.submit_spend(&tx, &request)?;
            print_json(&serde_json::to_value(&set.spend)?);
            for allocation in &set.allocations {
                print_json(&serde_json::to_value(allocation)?);
            }
        }
        Commands::Query { doc_type, field, value, json } => {
            let mut query = Query::by_type(doc_type);
            if let (Some(field), Some(value)) = (field, value) {
                query = query.where_eq(field, predicate_value(value, json)?);
            }
            for hit in ledger.query(&query)? {
                let id = natural_id(&hit.key).unwrap_or_default().to_string();
                let record = match hit.record {
                    Record::Structured(fields) => Value::Object(fields),
                    Record::Opaque(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                };
                print_json(&json!({ "id": id, "record": record }));
            }
        }
        Commands::Balances { ngo } => {
            for balance in ledger.donation_balances(&ngo)? {
                print_json(&json!({
                    "donationId": balance.donation_id,
                    "amount": balance.amount,
                    "allocated": balance.allocated,
                    "remaining": balance.remaining(),
                }));
            }
        }
    }
    Ok(())
}

/// Stored ids and amounts are JSON strings, so raw values compare as strings
fn predicate_value(raw: String, json: bool) -> Result<Value, LedgerError> {
    if !json {
        return Ok(Value::String(raw));
    }
    serde_json::from_str(&raw)
        .map_err(|e| LedgerError::Validation(format!("--value is not valid JSON: {}", e)))
}

fn print_json(value: &Value) {
    println!("{}", value);
}
