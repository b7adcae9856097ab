//
// cli.rs
// PDT-Tools-rs
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::imaging::{self, IntensityChannel};
use crate::models::{FluorescenceRequest, TreatmentRequest};
use crate::{batch, dosimetry, fluorescence, web};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "pdt-tools")]
#[command(about = "Photodynamic therapy dosimetry and fluorescence analysis tools", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        #[arg(short = 'H', long, env = "PDT_TOOLS_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, env = "PDT_TOOLS_PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Estimate treatment parameters for a light dose
    Treatment {
        #[arg(long)]
        photosensitizer: String,
        /// Wavelength in nm
        #[arg(long)]
        wavelength: f64,
        /// Light fluence in J/cm²
        #[arg(long)]
        fluence: f64,
        #[arg(long)]
        tissue: String,
        /// Photosensitizer dose in mg/kg
        #[arg(long)]
        dose: Option<f64>,
        /// Power density in mW/cm²
        #[arg(long)]
        irradiance: Option<f64>,
        /// Treatment area in cm²
        #[arg(long)]
        area: Option<f64>,
        #[arg(long)]
        age: Option<f64>,
        #[arg(long)]
        melanin: Option<f64>,
        #[arg(long)]
        hemoglobin: Option<f64>,
    },
    /// Analyze a fluorescence request stored as JSON
    Fluorescence { input: PathBuf },
    /// Analyze fluorescence photographs taken before and after treatment
    FluorescenceImages {
        #[arg(long)]
        pre: PathBuf,
        #[arg(long)]
        post: Option<PathBuf>,
        /// Dark-frame image subtracted from both acquisitions
        #[arg(long)]
        background: Option<PathBuf>,
        #[arg(long)]
        tissue: String,
        #[arg(long, value_enum, default_value_t = Channel::Red)]
        channel: Channel,
        #[arg(long, default_value_t = fluorescence::DEFAULT_HISTOGRAM_BINS, value_parser = parse_bins)]
        bins: usize,
        #[arg(long, default_value = "max")]
        normalization: String,
    },
    /// Batch processing over a directory of JSON requests
    Batch {
        #[arg(short, long)]
        directory: PathBuf,
        #[arg(short, long, value_enum)]
        operation: BatchOperation,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum BatchOperation {
    Treatment,
    Fluorescence,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Luma,
}

impl From<Channel> for IntensityChannel {
    fn from(value: Channel) -> Self {
        match value {
            Channel::Red => IntensityChannel::Red,
            Channel::Green => IntensityChannel::Green,
            Channel::Blue => IntensityChannel::Blue,
            Channel::Luma => IntensityChannel::Luma,
        }
    }
}

fn parse_bins(value: &str) -> Result<usize, String> {
    let bins: usize = value.parse().map_err(|err| format!("{}", err))?;
    fluorescence::check_histogram_bins(bins).map_err(|err| err.to_string())
}

pub async fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => web::start_server(&host, port).await?,
        Commands::Treatment {
            photosensitizer,
            wavelength,
            fluence,
            tissue,
            dose,
            irradiance,
            area,
            age,
            melanin,
            hemoglobin,
        } => {
            let request = TreatmentRequest {
                photosensitizer: Some(photosensitizer),
                photosensitizer_dose: dose,
                wavelength: Some(wavelength),
                light_fluence: Some(fluence),
                tissue_type: Some(tissue),
                treatment_area: area,
                patient_age: age,
                melanin_content: melanin,
                hemoglobin_content: hemoglobin,
                irradiance,
            };
            print_json(&dosimetry::calculate_treatment(&request)?)?;
        }
        Commands::Fluorescence { input } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let request: FluorescenceRequest =
                serde_json::from_str(&text).context("Invalid fluorescence request")?;
            print_json(&fluorescence::analyze_fluorescence(&request)?)?;
        }
        Commands::FluorescenceImages {
            pre,
            post,
            background,
            tissue,
            channel,
            bins,
            normalization,
        } => {
            let channel = channel.into();
            let pre = imaging::load_sample(&pre, background.as_deref(), channel)?;
            let post = post
                .map(|path| imaging::load_sample(&path, background.as_deref(), channel))
                .transpose()?;
            let request = FluorescenceRequest {
                pre_treatment_data: Some(pre),
                post_treatment_data: post,
                tissue_type: Some(tissue),
                normalization_method: Some(normalization),
                histogram_bins: Some(bins),
                ..Default::default()
            };
            print_json(&fluorescence::analyze_fluorescence(&request)?)?;
        }
        Commands::Batch {
            directory,
            operation,
        } => {
            let summary = batch::process_directory(&directory, operation)?;
            println!(
                "Processed {} request(s), {} failed.",
                summary.processed, summary.failed
            );
            if summary.failed > 0 {
                bail!("{} request file(s) could not be evaluated", summary.failed);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_flag_is_bounded() {
        assert_eq!(parse_bins("32"), Ok(32));
        assert!(parse_bins("0").is_err());
        assert!(parse_bins("4097").is_err());
        assert!(parse_bins("lots").is_err());

        let cli = Cli::try_parse_from([
            "pdt-tools",
            "fluorescence-images",
            "--pre",
            "pre.png",
            "--tissue",
            "skin",
            "--bins",
            "100000",
        ]);
        assert!(cli.is_err());
    }
}
