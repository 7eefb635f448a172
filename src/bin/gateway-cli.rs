use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the chain gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:56667")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway connection and lock status
    Status,
    /// Node health
    Health,
    /// Best block header
    Header,
    /// Hash of the block at a height
    BlockHash {
        number: u64,
    },
    /// sWorker identity of an account
    Identity {
        address: String,
    },
    /// Latest work report of an account
    WorkReport {
        address: String,
    },
    /// Enclave code accepted by sWork
    Code,
    /// Storage order of a file
    File {
        cid: String,
    },
    /// Base fee for storing a file
    FileBalance,
    /// Next fee multiplier
    Staking,
    /// Submit a signed extrinsic
    Submit {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        nonce: u64,
        /// Signed extrinsic, 0x hex
        #[arg(long)]
        extrinsic: String,
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/api/v1/gateway/status", base)).send().await?,
        Commands::Health => client.get(format!("{}/api/v1/system/health", base)).send().await?,
        Commands::Header => client.get(format!("{}/api/v1/block/header", base)).send().await?,
        Commands::BlockHash { number } => {
            client
                .get(format!("{}/api/v1/block/hash", base))
                .query(&[("blockNumber", number)])
                .send()
                .await?
        }
        Commands::Identity { address } => {
            client
                .get(format!("{}/api/v1/swork/identity", base))
                .query(&[("address", address)])
                .send()
                .await?
        }
        Commands::WorkReport { address } => {
            client
                .get(format!("{}/api/v1/swork/workreport", base))
                .query(&[("address", address)])
                .send()
                .await?
        }
        Commands::Code => client.get(format!("{}/api/v1/swork/code", base)).send().await?,
        Commands::File { cid } => {
            client
                .get(format!("{}/api/v1/market/file", base))
                .query(&[("cid", cid)])
                .send()
                .await?
        }
        Commands::FileBalance => {
            client
                .get(format!("{}/api/v1/market/fileBalance", base))
                .send()
                .await?
        }
        Commands::Staking => client.get(format!("{}/api/v1/market/staking", base)).send().await?,
        Commands::Submit {
            kind,
            nonce,
            extrinsic,
            category,
        } => {
            client
                .post(format!("{}/api/v1/tx", base))
                .json(&json!({
                    "kind": kind,
                    "nonce": nonce,
                    "extrinsic": extrinsic,
                    "category": category,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    // Failed outcomes come back as 400 with a JSON body worth showing.
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => {
            eprintln!("Error: gateway returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
