// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! livecam CLI
//!
//! Runs the media transform core over files: resample raw PCM captures and
//! turn AVCC dumps into playable Annex B streams.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use livecam::core::{AudioCodec, PipelineConfig, SampleFormat};

mod commands;

#[derive(Parser)]
#[command(name = "livecam")]
#[command(author, version, about = "livecam media transform CLI", long_about = None)]
struct Cli {
    /// Directory containing livecam.yaml (defaults are used when omitted)
    #[arg(long, global = true, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Log filter, overriding the config file (e.g. "debug", "livecam=trace")
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resample a headerless PCM file
    Resample {
        /// Input PCM file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (headerless, destination format)
        #[arg(short, long)]
        output: PathBuf,

        /// Input sample rate in Hz
        #[arg(long)]
        input_rate: u32,

        /// Input channel count
        #[arg(long, default_value = "1")]
        channels: u16,

        /// Input sample encoding
        #[arg(long, value_enum, default_value = "s16-le")]
        format: PcmFormatArg,

        /// Destination sample rate in Hz (overrides the config file)
        #[arg(long)]
        rate: Option<u32>,

        /// Output codec (overrides the config file)
        #[arg(long, value_enum)]
        codec: Option<CodecArg>,

        /// Capture callback size to simulate, in milliseconds
        #[arg(long, default_value = "20")]
        chunk_ms: u32,
    },

    /// Convert an AVCC (length-prefixed) H.264 dump to Annex B
    Annexb {
        /// Input AVCC file
        #[arg(short, long)]
        input: PathBuf,

        /// Output .h264 file
        #[arg(short, long)]
        output: PathBuf,

        /// Raw SPS to write as stream header (requires --pps)
        #[arg(long, requires = "pps")]
        sps: Option<PathBuf>,

        /// Raw PPS to write as stream header (requires --sps)
        #[arg(long, requires = "sps")]
        pps: Option<PathBuf>,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as YAML
    Show,

    /// Write a default livecam.yaml into the config directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PcmFormatArg {
    S16Le,
    F32Le,
}

impl From<PcmFormatArg> for SampleFormat {
    fn from(arg: PcmFormatArg) -> Self {
        match arg {
            PcmFormatArg::S16Le => SampleFormat::S16Le,
            PcmFormatArg::F32Le => SampleFormat::F32Le,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CodecArg {
    Pcm,
    MuLaw,
    ALaw,
}

impl From<CodecArg> for AudioCodec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Pcm => AudioCodec::Pcm,
            CodecArg::MuLaw => AudioCodec::MuLaw,
            CodecArg::ALaw => AudioCodec::ALaw,
        }
    }
}

fn load_config(dir: Option<&PathBuf>) -> Result<PipelineConfig> {
    match dir {
        // An explicit directory must hold a valid file.
        Some(dir) => PipelineConfig::load(dir)
            .with_context(|| format!("Failed to load config from {}", dir.display())),
        None => Ok(PipelineConfig::load_or_default(&std::env::current_dir()?)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_config_init = matches!(
        cli.command,
        Commands::Config {
            action: ConfigCommands::Init { .. }
        }
    );
    let mut config = if is_config_init {
        PipelineConfig::default()
    } else {
        load_config(cli.config.as_ref())?
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    livecam::init_logging(&config.logging);

    match cli.command {
        Commands::Resample {
            input,
            output,
            input_rate,
            channels,
            format,
            rate,
            codec,
            chunk_ms,
        } => {
            let report = commands::resample::run(
                &config,
                commands::resample::ResampleArgs {
                    input,
                    output: output.clone(),
                    source: livecam::core::AudioStreamFormat::new(
                        input_rate,
                        channels,
                        format.into(),
                    ),
                    destination_rate: rate,
                    codec: codec.map(Into::into),
                    chunk_ms,
                },
            )?;
            println!(
                "Wrote {} bytes to {} ({} frames, {} dropped, {} bytes short of a pull left out)",
                report.bytes_written,
                output.display(),
                report.stats.processed,
                report.stats.dropped,
                report.tail_bytes
            );
        }
        Commands::Annexb {
            input,
            output,
            sps,
            pps,
        } => {
            let written =
                commands::annexb::run(&input, &output, sps.as_deref(), pps.as_deref())?;
            println!("Wrote {} bytes to {}", written, output.display());
        }
        Commands::Config { action } => {
            let dir = match cli.config {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            match action {
                ConfigCommands::Show => print!("{}", commands::config::show(&config)?),
                ConfigCommands::Init { force } => {
                    let path = commands::config::init(&dir, force)?;
                    println!("Wrote {}", path.display());
                }
            }
        }
    }

    Ok(())
}
