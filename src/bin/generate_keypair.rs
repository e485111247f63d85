use anyhow::{Context, Result};
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Writes a fresh keypair where the assistant looks for its signer
/// (`KEYPAIR_PATH`, default `wallet-keypair.json`). Refuses to overwrite.
fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let path = PathBuf::from(
        std::env::var("KEYPAIR_PATH").unwrap_or_else(|_| "wallet-keypair.json".to_string()),
    );
    if path.exists() {
        anyhow::bail!("{:?} already exists; remove it first to generate a new wallet", path);
    }

    let keypair = Keypair::new();
    let keypair_bytes = keypair.to_bytes();

    // Same JSON byte-array format as the Solana CLI
    let mut file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
    file.write_all(serde_json::to_string(&keypair_bytes.to_vec())?.as_bytes())?;

    println!("Generated new wallet keypair:");
    println!("Path: {:?}", path);
    println!("Pubkey: {}", keypair.pubkey());
    println!("Fund it with a small amount of SOL before sending or swapping.");

    Ok(())
}
