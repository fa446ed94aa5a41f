use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use isotune::catalog::{CatalogEntry, project_catalog};
use isotune::config::AppConfig;
use isotune::curate::{CurationOutcome, CurationRequest, Curator};
use isotune::encoder::HttpEncoder;
use isotune::generator::{ChatCompletionClient, request_playlist};
use isotune::index::metadata::MetadataStore;
use isotune::index::{LoadedIndex, TRACKS_FILE};
use isotune::index::models::TrackRecord;
use isotune::progression::select_with_uplift;
use isotune::retriever::Retriever;
use isotune::scoring::{Jitter, NoJitter, UniformJitter};
use isotune::validate::{GeneratedPlaylist, validate_playlist};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "isotune", version, about = "Mood-progressive playlist curation")]
struct Cli {
    /// Path to a config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index directory (vectors.bin, tracks.db, metadata.json)
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show index size, dimension and embedding model
    Info,

    /// Run a free-text similarity search against the index
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Curate a reflect → transition → uplift progression
    Curate {
        /// Mood before the session, 0-10
        #[arg(long)]
        pre_mood: i32,

        /// PHQ-9 score, 0-27 (reported, not used for scoring)
        #[arg(long, default_value = "0")]
        phq9: u8,

        /// Desired length in minutes: "30" or "30-45"
        #[arg(long, default_value = "30-45")]
        minutes: String,

        /// Listener location (defaults to config)
        #[arg(long)]
        location: Option<String>,

        /// Favourite track URI or id (repeatable)
        #[arg(long = "top-id")]
        top_ids: Vec<String>,

        /// Reduce the plan to this many tracks, closing on the most energetic one
        #[arg(long)]
        count: Option<usize>,

        /// Disable score jitter
        #[arg(long)]
        no_jitter: bool,

        /// Seed the jitter instead of using the current minute
        #[arg(long, conflicts_with = "no_jitter")]
        seed: Option<u64>,

        /// Write the plan's catalog projection to this JSON file
        #[arg(long)]
        catalog_out: Option<PathBuf>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a generated playlist against a catalog file
    Validate {
        /// Generated playlist JSON
        #[arg(long)]
        generated: PathBuf,

        /// Catalog JSON (as written by `curate --catalog-out`)
        #[arg(long)]
        catalog: PathBuf,

        /// Target playlist length
        #[arg(long, default_value = "12")]
        count: usize,
    },

    /// Ask the completion service for a playlist and validate it
    Generate {
        /// File holding the full prompt text
        #[arg(long)]
        prompt: PathBuf,

        /// Catalog JSON the playlist must draw from
        #[arg(long)]
        catalog: PathBuf,

        /// Target playlist length
        #[arg(long, default_value = "12")]
        count: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    // CLI > config > XDG default
    let index_dir = cli.index_dir.clone().unwrap_or_else(|| config.resolve_index_dir());
    log::info!("Index: {}", index_dir.display());

    match cli.command {
        Commands::Info => {
            let index = LoadedIndex::load(&index_dir).context("Failed to load index")?;
            let rows = MetadataStore::open(&index_dir.join(TRACKS_FILE))
                .and_then(|store| store.count())
                .context("Failed to read track table")?;
            println!("Index:      {}", index_dir.display());
            println!("Tracks:     {} ({} metadata rows)", index.tracks.len(), rows);
            println!("Dimension:  {}", index.vectors.dim());
            println!("Model:      {}", index.model);
        }

        Commands::Search { query, limit } => {
            let retriever = Retriever::new(&index_dir, HttpEncoder::new(&config.embedding));
            let hits = retriever.search(&query, limit).context("Search failed")?;
            println!("{:<30} {:<22} {:>6}  {}", "Title", "Artist", "Score", "Id");
            println!("{}", "-".repeat(100));
            for c in &hits {
                println!(
                    "{:<30} {:<22} {:>6.3}  {}",
                    truncate(&c.track.title, 30),
                    truncate(&c.track.artist, 22),
                    c.score,
                    c.track.identifier().unwrap_or("-")
                );
            }
        }

        Commands::Curate {
            pre_mood,
            phq9,
            minutes,
            location,
            top_ids,
            count,
            no_jitter,
            seed,
            catalog_out,
            json,
        } => {
            let retriever = Retriever::new(&index_dir, HttpEncoder::new(&config.embedding));
            let jitter_enabled = config.curation.jitter && !no_jitter;
            let curator = Curator::new(retriever, config.curation.clone());

            let request = CurationRequest {
                pre_mood,
                phq9,
                desired_minutes: minutes,
                top_ids,
                location: location.unwrap_or_else(|| config.curation.default_location.clone()),
            };

            let mut jitter: Box<dyn Jitter> = match (jitter_enabled, seed) {
                (false, _) => Box::new(NoJitter),
                (true, Some(s)) => Box::new(UniformJitter::seeded(s)),
                (true, None) => Box::new(UniformJitter::per_minute()),
            };
            let mut outcome = curator
                .curate(&request, jitter.as_mut())
                .context("Curation failed")?;

            if let Some(n) = count {
                outcome.plan = select_with_uplift(&outcome.plan, n);
                outcome.target_count = outcome.target_count.min(n.max(3));
            }

            if let Some(path) = catalog_out {
                let catalog = project_catalog(&outcome.plan, config.curation.catalog_max_items);
                write_json(&path, &catalog)?;
                println!("Wrote {} catalog entries to {}", catalog.len(), path.display());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }

        Commands::Validate {
            generated,
            catalog,
            count,
        } => {
            let mut playlist: GeneratedPlaylist = read_json(&generated)?;
            let catalog: Vec<CatalogEntry> = read_json(&catalog)?;
            let result = validate_playlist(&mut playlist, &catalog, count);
            for d in &result.dropped {
                eprintln!("dropped: {d}");
            }
            println!("{}", serde_json::to_string_pretty(&playlist)?);
        }

        Commands::Generate {
            prompt,
            catalog,
            count,
        } => {
            let prompt = std::fs::read_to_string(&prompt)
                .with_context(|| format!("Failed to read {}", prompt.display()))?;
            let catalog: Vec<CatalogEntry> = read_json(&catalog)?;
            let client = ChatCompletionClient::from_config(&config.generator)
                .context("Failed to set up completion client")?;
            let mut playlist =
                request_playlist(&client, &prompt).context("Playlist generation failed")?;
            let result = validate_playlist(&mut playlist, &catalog, count);
            if !result.dropped.is_empty() {
                log::warn!("Generator proposed {} tracks outside the catalog", result.dropped.len());
            }
            println!("{}", serde_json::to_string_pretty(&playlist)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Print the curated plan as a table, lowest mood first.
fn print_outcome(outcome: &CurationOutcome) {
    println!(
        "Severity: {}  Target: {} tracks  Pool: {}",
        outcome.severity.label(),
        outcome.target_count,
        outcome.pool_size
    );
    if outcome.referral_suggested {
        println!("PHQ-9 is in the severe range: suggest reaching out to a professional.");
    }
    println!();
    println!(
        "{:<30} {:<22} {:>4} {:>4} {:>5} {:>4}",
        "Title", "Artist", "Val", "Eng", "BPM", "Pop"
    );
    println!("{}", "-".repeat(74));
    for t in &outcome.plan {
        print_track_row(t);
    }
    if outcome.is_underfilled() {
        println!();
        println!("(only {} of {} tracks matched the mood windows)", outcome.plan.len(), outcome.target_count);
    }
}

fn print_track_row(t: &TrackRecord) {
    println!(
        "{:<30} {:<22} {:>4.2} {:>4.2} {:>5.0} {:>4.0}",
        truncate(&t.title, 30),
        truncate(&t.artist, 22),
        t.valence_or_zero(),
        t.energy_or_zero(),
        t.tempo_or_zero(),
        t.popularity_or_default()
    );
}
