use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use wsstream_client::ClientConfig;

use crate::exit::{client_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod loopback;
pub mod plan;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the upgrade request a first write would produce.
    Plan(PlanArgs),
    /// Round-trip a payload through an in-memory echo peer.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Plan(args) => plan::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Client settings shared by commands that dial.
#[derive(Args, Debug, Default)]
pub struct ClientArgs {
    /// Target URI. Overrides the config file.
    #[arg(long)]
    pub uri: Option<String>,
    /// JSON client config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Largest early-data prefix in bytes (0 disables early data).
    #[arg(long, value_name = "BYTES")]
    pub max_early_data: Option<usize>,
    /// Carry early data in this header instead of the URI.
    #[arg(long, value_name = "NAME")]
    pub early_data_header: Option<String>,
    /// Extra upgrade request header, repeatable.
    #[arg(long = "header", short = 'H', value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
    /// Send text frames instead of binary ones.
    #[arg(long)]
    pub text: bool,
}

impl ClientArgs {
    /// Config file values, overridden by flags.
    pub fn resolve(&self, default_uri: Option<&str>) -> CliResult<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .map_err(|err| client_error("failed loading config", err))?,
            None => ClientConfig::default(),
        };

        if let Some(uri) = &self.uri {
            config.uri = uri.clone();
        }
        if config.uri.is_empty() {
            match default_uri {
                Some(uri) => config.uri = uri.to_string(),
                None => return Err(CliError::new(USAGE, "--uri or a config uri is required")),
            }
        }
        if let Some(max) = self.max_early_data {
            config.max_early_data = max;
        }
        if let Some(name) = &self.early_data_header {
            config.early_data_header_name = Some(name.clone());
        }
        for header in &self.headers {
            let (name, value) = header.split_once(':').ok_or_else(|| {
                CliError::new(USAGE, format!("header must be NAME:VALUE, got {header:?}"))
            })?;
            config
                .headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }
        if self.text {
            config.text_frames = true;
        }
        Ok(config)
    }
}

/// The bytes of the first write.
#[derive(Args, Debug, Default)]
pub struct PayloadArgs {
    /// Payload as a string.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(path) = &self.file {
            return std::fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
        }
        Ok(Vec::new())
    }
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// How long to wait for the dial and the echo (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
