use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use epos_bringup::driver::CanOpenDriver;
use epos_bringup::id::NodeId;
use epos_bringup::relay::format_chunk;
use epos_bringup::{Config, ConfigError, RelayServer, Sequencer};

const EXIT_DEVICE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_RELAY: u8 = 3;

/// Brings up a maxon EPOS4 over CANopen, or relays raw TCP bytes to the log
#[derive(Parser, Debug)]
#[command(name = "epos-bringup", version, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// CAN network interface, overriding the configuration
    #[arg(long, global = true)]
    port: Option<String>,

    /// CANopen node ID, overriding the configuration
    #[arg(long, global = true)]
    node_id: Option<u8>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bring-up sequence
    Run {
        /// Write the motor parameters even if the configuration skips them
        #[arg(long)]
        configure_motor: bool,
    },
    /// Print driver information and the protocol settings
    Inspect,
    /// Read one object of the node
    Query {
        /// Object index, decimal or 0x-prefixed hex
        #[arg(long, value_parser = parse_index)]
        index: u16,
        #[arg(long, default_value_t = 0, value_parser = parse_sub_index)]
        sub_index: u8,
        /// Number of bytes expected
        #[arg(long, default_value_t = 4)]
        width: usize,
    },
    /// Listen for TCP clients and log what they send
    Relay {
        /// Listen address, overriding the configuration
        #[arg(long)]
        address: Option<String>,
    },
}

fn parse_number(text: &str) -> Result<u64, String> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
    .map_err(|err| err.to_string())
}

fn parse_index(text: &str) -> Result<u16, String> {
    u16::try_from(parse_number(text)?).map_err(|err| err.to_string())
}

fn parse_sub_index(text: &str) -> Result<u8, String> {
    u8::try_from(parse_number(text)?).map_err(|err| err.to_string())
}

fn init_logging(verbose: u8) {
    let default_directive = match verbose {
        0 => "epos_bringup=info",
        1 => "epos_bringup=debug",
        _ => "epos_bringup=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    // WARN and ERROR go to stderr, progress to stdout.
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(port) = &cli.port {
        config.device.port_name = port.clone();
    }
    if let Some(raw) = cli.node_id {
        config.node_id = NodeId::new(raw).map_err(|err| ConfigError::Invalid {
            field: "node_id",
            reason: err.to_string(),
        })?;
    }
    match &cli.command {
        Command::Run {
            configure_motor: true,
        } => config.motor.configure = true,
        Command::Relay {
            address: Some(address),
        } => config.relay.address = address.clone(),
        _ => {}
    }
    config.validate()?;
    Ok(config)
}

async fn run(command: Command, config: Config) -> ExitCode {
    let sequencer = Sequencer::new(CanOpenDriver::new());
    match command {
        Command::Run { .. } => match sequencer.run(&config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("bring-up failed: {}", err);
                ExitCode::from(EXIT_DEVICE)
            }
        },
        Command::Inspect => match sequencer.inspect(&config).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                error!("inspection failed: {}", err);
                ExitCode::from(EXIT_DEVICE)
            }
        },
        Command::Query {
            index,
            sub_index,
            width,
        } => match sequencer.query(&config, index, sub_index, width).await {
            Ok(data) => {
                info!("0x{:04X}:{:02X} = [{}]", index, sub_index, format_chunk(&data));
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("query failed: {}", err);
                ExitCode::from(EXIT_DEVICE)
            }
        },
        Command::Relay { .. } => {
            let result = match RelayServer::bind(&config.relay) {
                Ok(mut server) => server.serve().await,
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("relay failed: {}", err);
                    ExitCode::from(EXIT_RELAY)
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    run(cli.command, config).await
}
