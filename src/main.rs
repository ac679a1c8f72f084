use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};

use whisker::config::Settings;
use whisker::extractor::LabReportExtractor;
use whisker::lexicon;
use whisker::merge::merge_documents;
use whisker::normalize::normalize_unit_simple;
use whisker::ocr::TokenRecord;
use whisker::output::{terminal, validate_tests, DocumentResult};

/// Whisker: structured extraction of veterinary lab reports.
///
/// Consumes positioned OCR tokens (text + bounding boxes + confidence) and
/// produces normalized report documents: test codes, values, units, and
/// reference ranges.
#[derive(Parser)]
#[command(name = "whisker", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a single page of OCR tokens (JSON array of token records)
    Extract {
        /// Path to the token JSON file
        input: PathBuf,

        /// Emit the document as JSON instead of a terminal summary
        #[arg(long)]
        json: bool,
    },

    /// Extract multiple pages and merge them into documents
    Batch {
        /// Token JSON files, one page each, in source order
        inputs: Vec<PathBuf>,

        /// Number of pages to extract in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Emit merged documents as JSON instead of a terminal summary
        #[arg(long)]
        json: bool,
    },

    /// Resolve a token against the test-code lexicon
    ResolveCode {
        /// The raw token text (e.g. "p02", "LYMPH (%)")
        token: String,
    },

    /// Canonicalize a unit string
    NormalizeUnit {
        /// The raw unit text (e.g. "10^3/uL", "mg/d1")
        unit: String,
    },

    /// Show lexicon statistics
    Lexicon,
}

fn load_page(path: &PathBuf) -> Result<Vec<TokenRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid token JSON in {}", path.display()))
}

fn build_extractor(settings: Settings) -> LabReportExtractor {
    let extractor = LabReportExtractor::new(settings);

    #[cfg(feature = "llm")]
    {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.trim().is_empty() {
                let provider = Arc::new(whisker::llm::openai::OpenAiFallback::new(api_key));
                tracing::info!("external fallback enabled");
                return extractor
                    .with_header_fallback(provider.clone())
                    .with_patient_fallback(provider);
            }
        }
    }

    extractor
}

fn print_result(doc: &DocumentResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(doc)?);
    } else {
        terminal::print_document(doc);
        terminal::print_validation(&validate_tests(&doc.tests).summary());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("whisker=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Extract { input, json } => {
            let records = load_page(&input)?;
            let extractor = build_extractor(settings);
            let doc = extractor.extract_records(records).await?;
            print_result(&doc, json)?;
        }

        Commands::Batch {
            inputs,
            concurrency,
            json,
        } => {
            if inputs.is_empty() {
                anyhow::bail!("batch requires at least one input file");
            }
            let extractor = Arc::new(build_extractor(settings));

            let pb = ProgressBar::new(inputs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  Pages [{bar:30}] {pos}/{len} ({eta})")
                    .unwrap(),
            );

            // Pages are independent; extract them concurrently but keep
            // source order for the merge.
            let results: Vec<Result<DocumentResult>> = stream::iter(inputs.iter())
                .map(|path| {
                    let extractor = extractor.clone();
                    let pb = pb.clone();
                    async move {
                        let records = load_page(path)?;
                        let doc = extractor.extract_records(records).await?;
                        pb.inc(1);
                        Ok(doc)
                    }
                })
                .buffered(concurrency.max(1))
                .collect()
                .await;
            pb.finish_and_clear();

            let pages: Vec<DocumentResult> = results.into_iter().collect::<Result<_>>()?;
            let (merged, summary) = merge_documents(pages);

            if json {
                println!("{}", serde_json::to_string_pretty(&merged)?);
            } else {
                println!(
                    "Merged {} pages into {} documents ({} empty pruned, {} duplicate tests removed)",
                    inputs.len(),
                    summary.merged_len,
                    summary.pruned_empty,
                    summary.before_dedup - summary.after_dedup,
                );
                for doc in &merged {
                    println!();
                    print_result(doc, false)?;
                }
            }
        }

        Commands::ResolveCode { token } => match lexicon::resolve_code(&token) {
            Some(code) => println!("{} -> {}", token, code.green()),
            None => println!("{} -> {}", token, "unresolved".yellow()),
        },

        Commands::NormalizeUnit { unit } => match normalize_unit_simple(&unit) {
            Some(canonical) => println!("{} -> {}", unit, canonical.green()),
            None => println!("{} -> {}", unit, "null".yellow()),
        },

        Commands::Lexicon => {
            let codes = lexicon::code_lexicon();
            let units = lexicon::unit_lexicon();
            println!("Codes: {} canonical entries", codes.len());
            println!("Units: {} canonical entries", units.len());
        }
    }

    Ok(())
}
