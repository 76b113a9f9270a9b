//
// cli.rs
// Lab-Deidentify-rs
//
// Defines the CLI surface with Clap, installs logging, and dispatches user-selected commands to the corresponding modules.
//
// Thales Matheus Mendonça Santos - October 2026

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::anonymize::{self, DeidentifyOptions, DEFAULT_CHUNK_SIZE, DEFAULT_SALT};
use crate::dataset::{self, DEFAULT_ENCODING};
use crate::mapping::Mappings;
use crate::models::RunSummary;
use crate::{batch, web};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "lab-deidentify")]
#[command(about = "Pseudonimização de exportações de exames laboratoriais", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Anonymize one tab-separated lab export
    Deidentify {
        input: PathBuf,
        #[arg(short, long, default_value = "anonymized_data.csv")]
        output: PathBuf,
        #[arg(short, long, default_value = "anonymization_mappings.json")]
        mappings: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Anonymize every .txt/.tsv export under a directory with shared mappings
    Batch {
        #[arg(short, long)]
        directory: PathBuf,
        /// Defaults to the input directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Count records and distinct identifiers in an export
    Info {
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_ENCODING)]
        encoding: String,
    },
    /// Show how many entries a mapping file holds
    Mappings { file: PathBuf },
    /// Start the web server
    Web {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
        /// Minutes an uploaded export and its outputs are kept
        #[arg(long, default_value_t = 60)]
        retention_minutes: u64,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Records per chunk when the input is larger than this
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Text encoding of the input (WHATWG label)
    #[arg(long, default_value = DEFAULT_ENCODING)]
    pub encoding: String,
}

impl RunArgs {
    pub fn to_options(&self) -> anyhow::Result<DeidentifyOptions> {
        if self.chunk_size == 0 {
            bail!("--chunk-size must be greater than zero");
        }
        // The salt is fixed; it is never read from arguments or the environment.
        Ok(DeidentifyOptions {
            salt: DEFAULT_SALT.to_string(),
            chunk_size: self.chunk_size,
            encoding: dataset::resolve_encoding(&self.encoding)?,
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Deidentify {
            input,
            output,
            mappings,
            run,
        } => {
            let options = run.to_options()?;
            let summary = anonymize::process_file(&input, &output, &mappings, &options)
                .with_context(|| format!("Failed to anonymize {:?}", input))?;
            print_summary(&summary);
            println!("Anonymized data saved to {:?}", output);
            println!("Mappings saved to {:?}", mappings);
        }
        Commands::Batch {
            directory,
            output_dir,
            run,
        } => {
            let options = run.to_options()?;
            let output_dir = output_dir.unwrap_or_else(|| directory.clone());
            let summary = batch::process_directory(&directory, &output_dir, &options)?;
            print_summary(&summary);
            println!(
                "Mappings saved to {:?}",
                output_dir.join(batch::MAPPINGS_FILE_NAME)
            );
        }
        Commands::Info { file, encoding } => {
            let encoding = dataset::resolve_encoding(&encoding)?;
            let records = dataset::read_records(&file, encoding)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let info = dataset::dataset_info(&records);
            println!("Dataset {:?}", file);
            println!("  Records:   {}", info.records);
            println!("  Patients:  {}", info.distinct_patients);
            println!("  Documents: {}", info.distinct_documents);
            println!("  Locations: {}", info.distinct_locations);
        }
        Commands::Mappings { file } => {
            let mappings = Mappings::read_json(&file)
                .with_context(|| format!("Failed to read mapping file {:?}", file))?;
            let counts = mappings.counts();
            println!("Mappings {:?}", file);
            println!("  patient_ids:  {}", counts.patient_ids);
            println!("  document_ids: {}", counts.document_ids);
            println!("  locations:    {}", counts.locations);
            for (raw, surrogate) in mappings.locations.iter().take(16) {
                println!("    {} -> {}", raw, surrogate);
            }
            if counts.locations > 16 {
                println!("    ... {} more locations omitted", counts.locations - 16);
            }
        }
        Commands::Web {
            host,
            port,
            retention_minutes,
            run,
        } => {
            if retention_minutes == 0 {
                bail!("--retention-minutes must be greater than zero");
            }
            let retention = Duration::from_secs(retention_minutes * 60);
            web::start_server(&host, port, run.to_options()?, retention).await?
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Ignore the error: a subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Anonymization complete | records: {} | chunks: {}",
        summary.records, summary.chunks
    );
    println!("  Patients:  {}", summary.mappings.patient_ids);
    println!("  Documents: {}", summary.mappings.document_ids);
    println!("  Locations: {}", summary.mappings.locations);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deidentify_defaults_match_the_documented_outputs() {
        let cli = Cli::try_parse_from(["lab-deidentify", "deidentify", "data/AllDataset.txt"])
            .expect("parse");
        match cli.command {
            Commands::Deidentify {
                output,
                mappings,
                run,
                ..
            } => {
                assert_eq!(output, PathBuf::from("anonymized_data.csv"));
                assert_eq!(mappings, PathBuf::from("anonymization_mappings.json"));
                assert_eq!(run.chunk_size, 100_000);
                assert_eq!(run.encoding, "windows-1252");
                let options = run.to_options().expect("options");
                assert_eq!(options.encoding, encoding_rs::WINDOWS_1252);
                assert_eq!(options.salt, DEFAULT_SALT);
            }
            _ => panic!("expected deidentify"),
        }
    }

    #[test]
    fn salt_cannot_be_given_on_the_command_line() {
        let parsed = Cli::try_parse_from([
            "lab-deidentify",
            "deidentify",
            "export.txt",
            "--salt",
            "other",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_chunk_size_is_refused() {
        let run = RunArgs {
            chunk_size: 0,
            encoding: DEFAULT_ENCODING.into(),
        };
        assert!(run.to_options().is_err());
    }

    #[test]
    fn unknown_encoding_is_refused() {
        let run = RunArgs {
            chunk_size: 10,
            encoding: "not-a-charset".into(),
        };
        assert!(run.to_options().is_err());
    }
}
