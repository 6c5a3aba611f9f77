#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for locality analysis.
//!
//! ```text
//! locality_lens "Koramangala, Bengaluru" --profile "Family with Kids"
//! locality_lens 12.9784,77.6408 --compact
//! ```
//!
//! Prints the analysis result as JSON and exits with status 1 when the
//! result carries errors. LLM credentials are read from the environment
//! (`AI_PROVIDER`, `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `GROQ_API_KEY`,
//! `AI_MODEL`, `AI_BASE_URL`); without them intent extraction and summaries
//! use their deterministic fallbacks.

mod unavailable;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use locality_lens_ai::providers::{LlmProvider, create_provider_from_env};
use locality_lens_ai::{IntentExtractor, LlmIntentExtractor, LlmSummarizer, Summarizer};
use locality_lens_analysis_models::AnalysisRequest;
use locality_lens_geocoder::nominatim::NominatimGeocoder;
use locality_lens_poi::overpass::OverpassProvider;
use locality_lens_workflow::{AnalysisConfig, Analyzer};

use crate::unavailable::Unavailable;

#[derive(Parser)]
#[command(
    name = "locality_lens",
    about = "Analyze the amenities and connectivity around a location"
)]
struct Cli {
    /// Address, or a `lat,lon` literal
    location: String,

    /// Profile label or free text, e.g. "Family with Kids"
    #[arg(long)]
    profile: Option<String>,

    /// TOML config file (takes precedence over `LOCALITY_LENS_CONFIG`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result on one line
    #[arg(long)]
    compact: bool,
}

fn build_analyzer(config: AnalysisConfig, client: &reqwest::Client) -> Analyzer {
    let geocoder = NominatimGeocoder::new(client.clone(), config.nominatim_url.clone());
    let geodata = OverpassProvider::new(client.clone(), config.overpass_url.clone())
        .with_query_timeout(config.overpass_query_timeout_secs);

    let (intent, summarizer) = match create_provider_from_env(client.clone()) {
        Ok(provider) => {
            let provider: Arc<dyn LlmProvider> = Arc::from(provider);
            let intent: Arc<dyn IntentExtractor> =
                Arc::new(LlmIntentExtractor::new(Arc::clone(&provider)));
            let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::new(provider));
            (intent, summarizer)
        }
        Err(e) => {
            log::warn!("{e}; intent extraction and summaries will use fallbacks");
            let unavailable = Arc::new(Unavailable::new(e.to_string()));
            let intent: Arc<dyn IntentExtractor> = unavailable.clone();
            let summarizer: Arc<dyn Summarizer> = unavailable;
            (intent, summarizer)
        }
    };

    Analyzer::new(
        Arc::new(geocoder),
        Arc::new(geodata),
        intent,
        summarizer,
        config,
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let config = AnalysisConfig::load(cli.config.as_deref())?;
    let client = config.http.build()?;
    let analyzer = build_analyzer(config, &client);

    let request = AnalysisRequest::new(cli.location, cli.profile);
    log::info!("Starting analysis {}", request.id());
    let result = analyzer.analyze(&request).await;

    let json = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{json}");

    if !result.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
