//! Shade CLI
//!
//! Shield and unshield notes from the command line.
//!
//! ```text
//! shade shield 1.5
//! shade unshield 0x1f2e...
//! shade confirm 0x1f2e...
//! shade balance
//! ```
//!
//! The PIN is read from `--pin` or `SHADE_PIN`.

mod setup;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shade_config::ShadeConfig;
use shade_primitives::FieldElement;
use shade_prover::CircuitType;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::setup::{ShadeWallet, build_wallet};

#[derive(Parser, Debug)]
#[command(name = "shade")]
#[command(about = "Shielded pool wallet", long_about = None)]
struct Cli {
    /// Config file (defaults to SHADE_CONFIG, ./config.toml, ~/.shade/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Wallet address, overrides wallet.address
    #[arg(long, global = true, env = "SHADE_ADDRESS")]
    address: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PinArg {
    /// Note store PIN
    #[arg(long, env = "SHADE_PIN", hide_env_values = true)]
    pin: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shield an amount into a new note
    Shield {
        amount: String,
        #[command(flatten)]
        pin: PinArg,
    },
    /// Spend a note (recorded as pending until confirmed)
    Unshield {
        #[arg(value_parser = parse_field)]
        nullifier: FieldElement,
        #[command(flatten)]
        pin: PinArg,
    },
    /// Mark a pending unshield as confirmed on-chain
    Confirm {
        #[arg(value_parser = parse_field)]
        nullifier: FieldElement,
        #[command(flatten)]
        pin: PinArg,
    },
    /// Return a pending unshield to the spendable set
    Reject {
        #[arg(value_parser = parse_field)]
        nullifier: FieldElement,
        #[command(flatten)]
        pin: PinArg,
    },
    /// Print the unspent balance
    Balance {
        /// Fixed number of decimal places
        #[arg(long)]
        places: Option<u32>,
        #[command(flatten)]
        pin: PinArg,
    },
    /// List stored notes as JSON
    Notes {
        /// Only notes that can still be spent
        #[arg(long)]
        unspent: bool,
        #[command(flatten)]
        pin: PinArg,
    },
    /// Load circuits ahead of the first proof
    Preload {
        /// Circuits to load (all when omitted)
        circuits: Vec<CircuitType>,
    },
    /// Print a sample config file
    Sample,
}

fn parse_field(s: &str) -> Result<FieldElement, String> {
    FieldElement::from_hex(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    if let Command::Sample = cli.command {
        print!("{}", ShadeConfig::generate_sample());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => ShadeConfig::load_from(path)?,
        None => ShadeConfig::load()?,
    };
    if let Some(address) = cli.address {
        config.wallet.address = Some(address);
    }

    let wallet = build_wallet(&config)?;
    run(&wallet, cli.command).await
}

async fn run(wallet: &ShadeWallet, command: Command) -> Result<()> {
    match command {
        Command::Shield { amount, pin } => {
            let receipt = wallet.shield(&amount, &pin.pin).await?;
            println!("commitment: {}", receipt.note.commitment);
            println!("nullifier:  {}", receipt.note.nullifier);
            println!(
                "proof:      {} bytes in {}ms",
                receipt.proof.proof.len(),
                receipt.proof.proving_time_ms
            );
            println!("balance:    {}", receipt.balance);
        }
        Command::Unshield { nullifier, pin } => {
            let receipt = wallet.unshield(&nullifier, &pin.pin).await?;
            println!("pending:    {}", receipt.note.commitment);
            println!("balance:    {}", receipt.balance);
        }
        Command::Confirm { nullifier, pin } => {
            wallet.confirm_unshield(&nullifier, &pin.pin)?;
            println!("confirmed:  {}", nullifier);
        }
        Command::Reject { nullifier, pin } => {
            wallet.reject_unshield(&nullifier, &pin.pin)?;
            println!("restored:   {}", nullifier);
            println!("balance:    {}", wallet.balance(&pin.pin)?);
        }
        Command::Balance { places, pin } => {
            let balance = wallet.balance(&pin.pin)?;
            match places {
                Some(places) => println!("{}", balance.to_fixed(places)),
                None => println!("{}", balance),
            }
        }
        Command::Notes { unspent, pin } => {
            let notes = if unspent {
                wallet.store().list_unspent(&pin.pin)?
            } else {
                wallet.notes(&pin.pin)?
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&notes).context("Failed to serialize notes")?
            );
        }
        Command::Preload { circuits } => {
            let circuits = if circuits.is_empty() {
                CircuitType::ALL.to_vec()
            } else {
                circuits
            };
            for circuit in circuits {
                wallet.prover().preload(circuit).await?;
                info!("{} ready", circuit);
            }
        }
        Command::Sample => print!("{}", ShadeConfig::generate_sample()),
    }
    Ok(())
}
