use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{OptionExt, Result};
use tracing::{debug, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use tonbind::{Boundary, Client, ClientOptions, KeyStore, RetryPolicy, TonConfig};


#[derive(Parser)]
#[command(
    name="tonquery",
    version=tonbind::config::VERSION,
    about="Thin query tool over the TON node client library",
    arg_required_else_help(true),
)]
struct Cli {
    /// Turn verbose level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Do not print any logging messages.
    ///
    /// Normal output of the command is still available on stdout.
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}


#[derive(Subcommand, Debug)]
enum Commands {

    /// Fetch and print the raw state of an account
    AccountState {
        /// Path to the network configuration document (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory where the native library keeps its keys
        #[arg(short, long, default_value="./keystore")]
        keystore: PathBuf,

        /// The account address to look up
        address: String,
    },

    /// Unpack an account address into its raw parts (offline, no network config needed)
    UnpackAddress {
        /// The account address to unpack
        address: String,
    },
}

fn init_tracing(verbose_level: u8) {
    // use an env filter with default level of INFO
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let tracing = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter);

    // flags given on the command-line override those from the environment
    match verbose_level {
        0 => tracing.init(),
        1 => tracing.with_max_level(Level::DEBUG).init(),
        2 => tracing.with_max_level(Level::TRACE).init(),
        _ => panic!("too many -v flags, 2 max allowed"),
    };
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    if !cli.quiet {
        init_tracing(cli.verbose);
    }

    let cmd = cli.command.ok_or_eyre("No command given. You need to specify at least one")?;

    match cmd {
        Commands::AccountState { config, keystore, address } => {
            let config = TonConfig::from_file(&config)?;
            debug!(liteservers = config.liteserver_count(), "loaded network config");

            let options = ClientOptions::new(config, KeyStore::Directory(keystore))
                .with_verbosity(0);
            let client = Client::connect(Boundary::native(), options)?;

            let state = client.get_account_state(&address)?;
            println!("{:#?}", state);
        }

        Commands::UnpackAddress { address } => {
            // the offline execute path answers this without the init handshake
            let client = Client::new(Boundary::native(), RetryPolicy::default());
            let unpacked = client.unpack_account_address(&address)?;
            println!("{:#?}", unpacked);
        }
    }

    Ok(())
}
