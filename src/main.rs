use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use movie_prep::analyse;
use movie_prep::config::Config;
use movie_prep::constants::{
    ANALYSED_COLUMNS, DEFAULT_CONFIG_FILE, DEFAULT_SAMPLE_ROWS, EXTRA_DATA_FILE,
    METADATA_INPUT_FILE, MOVIES_FILE, PROFILE_FILE,
};
use movie_prep::fetcher::{self, Fetcher};
use movie_prep::logging;
use movie_prep::pipeline::outcome::{StageStatus, StageSummary};
use movie_prep::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "movie_prep")]
#[command(about = "Movie dataset preparation pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch poster, title and genres for every id in the movies file
    Fetch {
        /// Movies CSV to read ids from (defaults to <output_dir>/movies.csv)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Clean movies_metadata.csv into movies.csv and poster_path.csv
    Clean,
    /// Extract director, actors and characters from credits.csv
    Credits,
    /// Expand keywords.csv into one row per keyword
    Keywords,
    /// Join cleaned movies with credits (and fetched posters if present)
    Merge,
    /// Filter ratings files to ids present in movies.csv
    Align,
    /// Run every stage in order
    Run {
        /// Also fetch catalog details and join the poster URLs
        #[arg(long)]
        fetch: bool,
    },
    /// Copy the first rows of a CSV to a new file
    Sample {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        rows: usize,
    },
    /// Write missing-value and value-frequency profiles
    Analyse {
        /// CSV to profile (defaults to <output_dir>/movies.csv)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Use the raw metadata file instead of the cleaned movies
        #[arg(long)]
        raw: bool,
    },
}

fn report(summaries: &[StageSummary]) {
    for summary in summaries {
        let icon = match summary.status {
            StageStatus::Success => "✅",
            StageStatus::Partial => "⚠️ ",
            StageStatus::Fatal => "❌",
        };
        println!(
            "{} {:<24} {:<8} item errors: {}",
            icon, summary.stage, summary.status, summary.item_errors
        );
        if let Some(reason) = &summary.fatal {
            println!("   - {}", reason);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let paths = config.paths.clone();

    match cli.command {
        Commands::Fetch { input } => {
            println!("📡 Fetching movie details...");
            let input = input.unwrap_or_else(|| paths.output(MOVIES_FILE));
            let pool = Fetcher::from_config(&config.fetcher)?;
            let ids = match fetcher::read_movie_ids(&input, paths.encoding) {
                Ok(ids) => ids,
                Err(e) => {
                    error!("Error occurred while reading movie IDs from {}: {}", input.display(), e);
                    Vec::new()
                }
            };
            let outcome = pool.fetch_all(ids).await;
            if !outcome.value.is_empty() {
                let output = paths.output(EXTRA_DATA_FILE);
                if let Err(e) = fetcher::write_extra_data(&outcome.value, &output) {
                    error!("Error occurred while writing {}: {}", output.display(), e);
                }
            }
            report(&[outcome.summary()]);
        }
        Commands::Clean => {
            println!("🔨 Cleaning metadata...");
            let pipeline = Pipeline::new(config);
            report(&[pipeline.clean_only()]);
        }
        Commands::Credits => {
            let pipeline = Pipeline::new(config);
            report(&[pipeline.credits_stage().summary()]);
        }
        Commands::Keywords => {
            let pipeline = Pipeline::new(config);
            report(&[pipeline.keywords_stage().summary()]);
        }
        Commands::Merge => {
            let pipeline = Pipeline::new(config);
            report(&[pipeline.merge_from_outputs().summary()]);
        }
        Commands::Align => {
            let pipeline = Pipeline::new(config);
            report(&pipeline.align_from_outputs());
        }
        Commands::Run { fetch } => {
            println!("🚀 Running full pipeline...");
            config.pipeline.fetch_extra |= fetch;
            let pool = if config.pipeline.fetch_extra {
                Some(Fetcher::from_config(&config.fetcher)?)
            } else {
                None
            };
            let pipeline = Pipeline::new(config);
            let result = pipeline.run(pool.as_ref()).await;

            println!("\n📊 Pipeline Results:");
            report(&result.stages);
            for output in &result.outputs {
                println!("   Output file: {}", output);
            }
            let failed = result.failed_stages().count();
            if failed > 0 {
                error!("{} stages failed", failed);
            } else {
                info!("All stages completed");
            }
        }
        Commands::Sample { input, output, rows } => {
            match analyse::extract_sample(&input, &output, rows, paths.encoding) {
                Ok(n) => println!("✅ Wrote {} rows to {}", n, output.display()),
                Err(e) => error!("Sample extraction failed: {}", e),
            }
        }
        Commands::Analyse { input, raw } => {
            let input = match (input, raw) {
                (Some(input), _) => input,
                (None, true) => paths.input(METADATA_INPUT_FILE),
                (None, false) => paths.output(MOVIES_FILE),
            };
            match analyse::profile_file(&input, paths.encoding, ANALYSED_COLUMNS, &paths.output_dir, PROFILE_FILE) {
                Ok(files) => {
                    for file in files {
                        println!("   Output file: {}", file);
                    }
                }
                Err(e) => error!("Analysis of {} failed: {}", input.display(), e),
            }
        }
    }

    Ok(())
}
