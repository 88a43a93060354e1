mod dataset;
mod error;
mod freshness;
mod geocode;
mod latest;
mod parser;
mod pipeline;
mod settings;
mod source;

use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use dataset::Period;
use settings::Settings;

#[derive(Parser)]
#[command(name = "hn_hiring_map", about = "Map the postings of a Hacker News \"Who is hiring?\" thread")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one thread into the dataset for a period
    Run {
        /// Hacker News item id of the thread
        thread_id: u64,
        /// Period label, e.g. 2015-03
        period: String,
    },
    /// Process every `<thread id> <period>` line of the input file
    RunInput,
    /// Find the newest thread and append it to the input file
    Latest,
    /// Regenerate the period manifest from the data directory
    Manifest,
    /// Show counts for a period's dataset
    Stats {
        /// Period label, e.g. 2015-03
        period: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run { thread_id, period } => {
            // Config problems surface before any request goes out
            let period: Period = period.parse()?;
            let guesser = pipeline::load_guesser(&settings)?;
            let summary = pipeline::run(&settings, guesser, thread_id, period).await?;
            summary.print();
            Ok(())
        }
        Commands::RunInput => {
            let contents = std::fs::read_to_string(&settings.input_path)
                .with_context(|| format!("Failed to read {:?}", settings.input_path))?;
            let threads = latest::parse_input(&contents)?;
            if threads.is_empty() {
                println!("No threads in {:?}. Run 'latest' first.", settings.input_path);
                return Ok(());
            }
            let guesser = pipeline::load_guesser(&settings)?;
            // Oldest first, so each period sees its predecessor's dataset
            let mut threads = threads;
            threads.sort_by_key(|(_, period)| *period);
            for (thread_id, period) in threads {
                println!("\n== {} (thread {}) ==", period, thread_id);
                let summary = pipeline::run(&settings, guesser.clone(), thread_id, period).await?;
                summary.print();
            }
            Ok(())
        }
        Commands::Latest => {
            let client = source::http_client(&settings)?;
            let api = source::HnApiSource::new(client, &settings.hn_api_url);
            match latest::find_latest(&api).await? {
                Some(thread) => {
                    if latest::record_in_input(&settings.input_path, &thread)? {
                        println!("Appending latest thread to input: {}", thread.input_line());
                    } else {
                        println!("Latest thread already present in input: {}", thread.input_line());
                    }
                }
                None => println!("No \"Who is hiring?\" thread found."),
            }
            Ok(())
        }
        Commands::Manifest => {
            let periods = dataset::write_manifest(&settings.data_dir, &settings.manifest_path)?;
            println!("Manifest {:?} lists {} periods.", settings.manifest_path, periods.len());
            Ok(())
        }
        Commands::Stats { period } => {
            let period: Period = period.parse()?;
            let path = dataset::dataset_path(&settings.data_dir, period);
            let records = dataset::read_dataset(&path)?;
            let count = |f: fn(&dataset::JobPostingRecord) -> bool| records.iter().filter(|r| f(r)).count();
            println!("Period:    {}", period);
            println!("Postings:  {}", records.len());
            println!("Fresh:     {}", count(|r| r.freshness));
            println!("Remote:    {}", count(|r| r.remote));
            println!("H1B:       {}", count(|r| r.visa_sponsorship));
            println!("Intern:    {}", count(|r| r.internship));
            println!("Located:   {}", count(|r| r.location.is_some()));
            println!("Geocoded:  {}", count(|r| r.latitude.is_some()));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}
