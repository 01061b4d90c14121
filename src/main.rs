//! tron-multisig CLI Application
//!
//! A command-line client for proposing, co-signing and broadcasting
//! account-permission multisig transactions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tron_multisig::cli::{self, AppState};
use tron_multisig::config::{ClientConfig, DEFAULT_DATA_DIR, DEFAULT_NODE_URL};

#[derive(Parser)]
#[command(name = "tron-multisig")]
#[command(version = "0.1.0")]
#[command(about = "Account-permission multisig client for TRON", long_about = None)]
struct Cli {
    /// Data directory for keys and pending transactions
    #[arg(short, long, env = "MULTISIG_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Full node HTTP API
    #[arg(short, long, env = "TRON_NODE_URL", default_value = DEFAULT_NODE_URL)]
    node: String,

    /// API key for hosted nodes
    #[arg(long, env = "TRON_PRO_API_KEY")]
    api_key: Option<String>,

    /// Seconds added to the node's expiration when proposing
    #[arg(long)]
    extension: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Key management
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },

    /// Address format conversion
    Address {
        #[command(subcommand)]
        action: AddressCommands,
    },

    /// Show an account's balance and permissions
    Account {
        /// Account address (base58 or hex)
        address: String,
    },

    /// Show a TRC-20 token balance
    TokenBalance {
        /// Token contract address
        #[arg(short, long)]
        token: String,

        /// Holder address
        #[arg(long)]
        holder: String,
    },

    /// Propose a new multisig transaction
    Propose {
        #[command(subcommand)]
        action: ProposeCommands,
    },

    /// Sign a pending transaction
    Sign {
        /// Local id or txID
        id: String,

        /// Key file to sign with
        #[arg(short, long)]
        key: PathBuf,
    },

    /// Show a pending transaction
    Show {
        /// Local id or txID
        id: String,
    },

    /// List pending transactions
    List {
        /// Only this account
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Broadcast a transaction whose signatures meet the threshold
    Broadcast {
        /// Local id or txID
        id: String,
    },

    /// Check whether a broadcast transaction was confirmed
    Confirm {
        /// Local id or txID
        id: String,
    },

    /// Re-issue with a later expiration (collected signatures are void)
    Extend {
        /// Local id or txID
        id: String,

        /// Seconds to add
        #[arg(short, long)]
        seconds: Option<i64>,
    },

    /// Export a transaction document for co-signers
    Export {
        /// Local id or txID
        id: String,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a transaction document
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Delete a transaction from local bookkeeping
    Delete {
        /// Local id or txID
        id: String,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new key
    Generate {
        /// Optional label
        #[arg(short, long)]
        label: Option<String>,

        /// Key file path (defaults to the data directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print public info as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the address of a key file
    Address {
        /// Key file path
        key: PathBuf,
    },
}

#[derive(Subcommand)]
enum AddressCommands {
    /// Convert to 41-prefixed hex
    ToHex { address: String },

    /// Convert to base58
    ToBase58 { address: String },
}

#[derive(Subcommand)]
enum ProposeCommands {
    /// Propose a native or TRC-20 transfer
    Transfer {
        /// Sending (multisig) account
        #[arg(short, long)]
        from: String,

        /// Recipient
        #[arg(short, long)]
        to: String,

        /// Amount in sun, or in the token's smallest unit
        #[arg(short, long)]
        amount: i64,

        /// TRC-20 contract; native transfer when omitted
        #[arg(long)]
        token: Option<String>,

        /// Authorizing permission id (0 = owner, 2+ = active)
        #[arg(short, long, default_value = "0")]
        permission: i32,

        #[arg(long)]
        description: Option<String>,
    },

    /// Propose a new permission layout for an account
    PermissionUpdate {
        /// Account to update
        #[arg(short, long)]
        account: String,

        /// JSON file with `owner`, `actives` and optional `witness`
        #[arg(short, long)]
        layout: PathBuf,

        #[arg(long)]
        description: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = ClientConfig::default()
        .with_node_url(&cli.node)
        .with_data_dir(cli.data_dir.clone());
    config.api_key = cli.api_key.clone();
    if let Some(extension) = cli.extension {
        config.expiration_extension_secs = extension;
    }

    // Built only by the commands that need the data directory
    let state = || AppState::new(config.clone());
    let rt = tokio::runtime::Runtime::new()?;

    // Process commands
    match cli.command {
        Commands::Address { action } => match action {
            AddressCommands::ToHex { address } => cli::cmd_address_to_hex(&address)?,
            AddressCommands::ToBase58 { address } => cli::cmd_address_to_base58(&address)?,
        },

        Commands::Key { action } => match action {
            KeyCommands::Generate {
                label,
                output,
                json,
            } => {
                cli::cmd_key_generate(&state()?, label.as_deref(), output.as_deref(), json)?;
            }
            KeyCommands::Address { key } => {
                cli::cmd_key_address(&key)?;
            }
        },

        Commands::Account { address } => {
            rt.block_on(cli::cmd_account(&state()?, &address))?;
        }

        Commands::TokenBalance { token, holder } => {
            rt.block_on(cli::cmd_token_balance(&state()?, &token, &holder))?;
        }

        Commands::Propose { action } => match action {
            ProposeCommands::Transfer {
                from,
                to,
                amount,
                token,
                permission,
                description,
            } => {
                rt.block_on(cli::cmd_propose_transfer(
                    &state()?,
                    &from,
                    &to,
                    amount,
                    token.as_deref(),
                    permission,
                    description,
                ))?;
            }
            ProposeCommands::PermissionUpdate {
                account,
                layout,
                description,
            } => {
                rt.block_on(cli::cmd_propose_permission_update(
                    &state()?,
                    &account,
                    &layout,
                    description,
                ))?;
            }
        },

        Commands::Sign { id, key } => {
            cli::cmd_sign(&state()?, &id, &key)?;
        }

        Commands::Show { id } => {
            cli::cmd_show(&state()?, &id)?;
        }

        Commands::List { account } => {
            cli::cmd_list(&state()?, account.as_deref())?;
        }

        Commands::Broadcast { id } => {
            rt.block_on(cli::cmd_broadcast(&state()?, &id))?;
        }

        Commands::Confirm { id } => {
            rt.block_on(cli::cmd_confirm(&state()?, &id))?;
        }

        Commands::Extend { id, seconds } => {
            cli::cmd_extend(&state()?, &id, seconds)?;
        }

        Commands::Export { id, output } => {
            cli::cmd_export(&state()?, &id, output.as_deref())?;
        }

        Commands::Import { input } => {
            cli::cmd_import(&state()?, &input)?;
        }

        Commands::Delete { id } => {
            cli::cmd_delete(&state()?, &id)?;
        }
    }

    Ok(())
}
