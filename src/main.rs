//! EthReg - Read or write a register on a remote device
//!
//! With one argument the register is read and printed, with two the
//! second is written to it.

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ethreg::config::Config;
use ethreg::display::{format_value, parse_number, DisplayMode};
use ethreg::network::Port;
use ethreg::{Device, EthRegResult};

/// EthReg - Register access over UDP
#[derive(Parser)]
#[command(name = "ethreg")]
#[command(version)]
#[command(about = "Read or write a register on a remote device over UDP", long_about = None)]
struct Cli {
    /// Register address (0x prefix for hex, leading 0 for octal, `_` allowed)
    #[arg(required_unless_present = "show_config")]
    address: Option<String>,

    /// Value to write; omit to read
    data: Option<String>,

    /// Print the value read in decimal only
    #[arg(long, conflicts_with = "hex")]
    dec: bool,

    /// Print the value read in hex only
    #[arg(long)]
    hex: bool,

    /// Use 64-bit register accesses
    #[arg(short, long)]
    wide: bool,

    /// Device host name or IP address
    #[arg(short, long)]
    remote: Option<String>,

    /// Local address to receive replies on
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

impl Cli {
    /// Command-line flags take precedence over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(remote) = &self.remote {
            config.device.remote_host = remote.clone();
        }
        if let Some(bind) = &self.bind {
            config.device.bind_address = Some(bind.clone());
        }
        if self.dec {
            config.display.mode = DisplayMode::Dec;
        }
        if self.hex {
            config.display.mode = DisplayMode::Hex;
        }
        if self.wide {
            config.display.wide = true;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };
    cli.apply(&mut config);

    if cli.show_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let address_text = cli.address.as_deref().unwrap_or_default();
    let address = parse_number(address_text)
        .ok_or_else(|| anyhow!("ethreg: {} is not a number", address_text))?;

    let data = cli
        .data
        .as_deref()
        .map(|text| parse_number(text).ok_or_else(|| anyhow!("ethreg: {} is not a number", text)))
        .transpose()?;

    let mut device = Device::connect(
        &config.device.remote_host,
        config.device.bind_address.as_deref(),
    )
    .await?;

    match data {
        None => {
            let value = perform_read(&mut device, address, config.display.wide).await?;
            println!("{}", format_value(value, config.display.mode, config.display.wide));
        }
        Some(value) => {
            perform_write(&mut device, address, value, config.display.wide).await?;
        }
    }

    Ok(())
}

/// Read a register at the configured width
async fn perform_read<P: Port>(device: &mut Device<P>, address: u64, wide: bool) -> EthRegResult<u64> {
    if wide {
        device.read64(address).await
    } else {
        device.read32(address).await.map(u64::from)
    }
}

/// Write a register; narrow writes keep only the low 32 bits of `value`
async fn perform_write<P: Port>(
    device: &mut Device<P>,
    address: u64,
    value: u64,
    wide: bool,
) -> EthRegResult<()> {
    if wide {
        device.write64(address, value).await
    } else {
        device.write32(address, value as u32).await
    }
}
