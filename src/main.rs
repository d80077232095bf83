use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use foodreel::apis::detect::DetectionServiceClient;
use foodreel::apis::openai::OpenAiExtractor;
use foodreel::apis::places::GooglePlacesResolver;
use foodreel::apis::whisper::WhisperClient;
use foodreel::apis::ytdlp::YtDlpFetcher;
use foodreel::config::Config;
use foodreel::db::SqliteStorage;
use foodreel::extract::ExtractionCoordinator;
use foodreel::logging;
use foodreel::media::MediaStore;
use foodreel::pipeline::{PipelineOutcome, VideoPipeline};
use foodreel::resolve::RecommendationResolver;
use foodreel::retry::RetryPolicy;
use foodreel::storage::Storage;

#[derive(Parser)]
#[command(name = "foodreel")]
#[command(about = "Extracts venue recommendations from short-form videos")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single video URL
    Process {
        /// Share URL of the video
        url: String,
        /// Tag discovered venues as curated
        #[arg(long)]
        curated: bool,
    },
    /// Process every URL listed in a file, one per line
    ProcessFile {
        /// Path to the URL list; blank lines and # comments are skipped
        path: String,
        /// Tag discovered venues as curated
        #[arg(long)]
        curated: bool,
    },
    /// Geocode and store one venue directly, bypassing video processing
    Seed {
        #[arg(long)]
        name: String,
        #[arg(long)]
        city: String,
    },
    /// Create the database file and run migrations
    InitDb,
}

fn build_pipeline(config: &Config) -> Result<VideoPipeline, Box<dyn std::error::Error>> {
    let retry = RetryPolicy::from_config(&config.retry);
    let media = MediaStore::new(&config.media.root)?;
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.database.path)?);

    let fetcher = Arc::new(YtDlpFetcher::new(media.clone(), retry.clone()));
    let transcriber = Arc::new(WhisperClient::new(
        config.services.transcription_url.clone(),
        retry.clone(),
    ));
    let detector = Arc::new(DetectionServiceClient::new(
        config.services.detection_url.clone(),
        retry.clone(),
    ));
    let extractor = Arc::new(OpenAiExtractor::new(
        config.services.model_url.clone(),
        config.services.model_name.clone(),
        retry.clone(),
    )?);
    let places: Arc<GooglePlacesResolver> = Arc::new(GooglePlacesResolver::new(
        config.services.places_url.clone(),
        retry,
    )?);

    let extraction = ExtractionCoordinator::new(
        transcriber,
        detector,
        config.extraction.workers,
        Duration::from_secs(config.extraction.deadline_seconds),
    );
    let resolver = RecommendationResolver::new(extractor, places.clone());

    Ok(VideoPipeline::new(
        fetcher, extraction, resolver, places, storage, media,
    ))
}

fn read_url_list(path: &str) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;
    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Process { url, curated } => {
            let pipeline = build_pipeline(&config)?;
            match pipeline.process_video(&url, curated).await {
                Ok(PipelineOutcome::AlreadyProcessed) => {
                    println!("⏭️  Already processed, skipping");
                }
                Ok(PipelineOutcome::Completed {
                    venues_linked,
                    had_venues,
                }) => {
                    if had_venues {
                        println!("✅ Done: {venues_linked} venue(s) linked");
                    } else {
                        println!("✅ Done: no venues found");
                    }
                }
                Err(e) => {
                    error!("Processing failed: {}", e);
                    println!("❌ Processing failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::ProcessFile { path, curated } => {
            let urls = read_url_list(&path)?;
            println!("🔄 Processing {} video(s) from {path}", urls.len());

            let pipeline = build_pipeline(&config)?;
            let summary = pipeline.process_batch(&urls, curated).await;
            println!(
                "📊 Batch results: {} processed, {} skipped, {} failed, {} venue(s) linked",
                summary.processed, summary.skipped, summary.failed, summary.venues_linked
            );
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Seed { name, city } => {
            let pipeline = build_pipeline(&config)?;
            match pipeline.seed_venue(&name, &city).await? {
                Some(venue_id) => println!("✅ Seeded venue '{name}' as id {venue_id}"),
                None => {
                    println!("⚠️  No place found for '{name}, {city}'");
                    std::process::exit(1);
                }
            }
        }
        Commands::InitDb => {
            SqliteStorage::open(&config.database.path)?;
            info!("Database initialized at {}", config.database.path);
            println!("✅ Database ready at {}", config.database.path);
        }
    }

    Ok(())
}
