use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sol_chat_assistant::config;
use sol_chat_assistant::solana::{self, KeypairSigner, WalletSigner};
use sol_chat_assistant::Assistant;

/// Chat with your Solana wallet from the terminal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// RPC endpoint; repeat to build a fallback pool (overrides RPC_URLS)
    #[arg(long = "rpc-url")]
    rpc_urls: Vec<String>,

    /// Keypair file used to sign transfers and swaps (overrides KEYPAIR_PATH)
    #[arg(long)]
    keypair: Option<String>,

    /// Handle a single message and exit
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables
    dotenv().ok();

    // Initialize logging
    init_logger();

    let cli = Cli::parse();

    let mut config = config::load_config()?;
    if !cli.rpc_urls.is_empty() {
        config.rpc_urls = cli.rpc_urls;
    }
    if let Some(keypair) = cli.keypair {
        config.keypair_path = keypair;
    }
    info!("Configuration loaded ({} RPC endpoints)", config.rpc_urls.len());

    let signer = match solana::create_signer_from_config(&config) {
        Ok(signer) => {
            if let Some(pubkey) = signer.pubkey() {
                info!("Wallet loaded with pubkey: {}", pubkey);
            }
            Some(signer)
        }
        Err(e) => {
            warn!("{:#}. Continuing without a wallet; transfers and swaps are disabled.", e);
            None
        }
    };
    let wallet = signer.as_ref().map(|s| s as &dyn WalletSigner);

    let assistant = Assistant::from_config(&config)?;

    if let Some(message) = cli.message {
        let response = assistant.process_request(&message, wallet).await;
        println!("{}", response.message);
        return Ok(());
    }

    repl(&assistant, signer.as_ref()).await
}

async fn repl(assistant: &Assistant, signer: Option<&KeypairSigner>) -> Result<()> {
    let wallet = signer.map(|s| s as &dyn WalletSigner);
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Solana wallet assistant. Type \"help\" for commands, \"exit\" to quit.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let response = assistant.process_request(line, wallet).await;
        println!("{}", response.message);
    }

    info!("Shutting down...");
    Ok(())
}

fn init_logger() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info")
    );
}
