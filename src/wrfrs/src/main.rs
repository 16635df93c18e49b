// wrfrs/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use wrfrs::{ConfigStore, WpsNamelist, WrfNamelist, WrfVariant};

#[derive(Parser)]
#[command(name = "wrfrs")]
#[command(about = "Configuration management and namelist generation for WRF weather models", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, value_name = "FILE", global = true, default_value = "wrfrs.yaml")]
    config: PathBuf,

    /// Namelist template merged under the computed values
    #[arg(short, long, value_name = "FILE", global = true)]
    template: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the namelist for the WPS preprocessing tools
    Wps {
        /// Output path
        #[arg(short, long, default_value = "namelist.wps")]
        output: PathBuf,
    },
    /// Generate the namelist for the WRF model
    Wrf {
        /// Output path
        #[arg(short, long, default_value = "namelist.input")]
        output: PathBuf,

        /// Pipeline stage the namelist is for
        #[arg(long, value_enum, default_value_t = VariantArg::Base)]
        variant: VariantArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Base,
    NdownReal,
    Ndown,
    NdownDfi,
    NdownWrf,
}

impl From<VariantArg> for WrfVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Base => WrfVariant::Base,
            VariantArg::NdownReal => WrfVariant::DownscaleReal,
            VariantArg::Ndown => WrfVariant::DownscaleNdown,
            VariantArg::NdownDfi => WrfVariant::DownscaleDfiFix,
            VariantArg::NdownWrf => WrfVariant::DownscaleWrfContinuation,
        }
    }
}

fn entrypoint() -> Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = ConfigStore::from_path(&cli.config)
        .with_context(|| format!("unable to open config file '{}'", cli.config.display()))?;

    match cli.command {
        Commands::Wps { output } => {
            let mut nml = WpsNamelist::with_template(&config, cli.template)?;
            nml.write(&output)?;
            log::info!("wrote {}", output.display());
        }
        Commands::Wrf { output, variant } => {
            let mut nml = WrfNamelist::with_template(&config, variant.into(), cli.template)?;
            nml.write(&output)?;
            log::info!("wrote {}", output.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match entrypoint() {
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}
