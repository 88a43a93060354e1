use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::dataset::{self, JobPostingRecord, Period};
use crate::freshness::PriorAuthors;
use crate::geocode::{GeocodeCache, Geocoder, GoogleGeocoder};
use crate::parser::location::{LocationGuesser, SynonymTable};
use crate::parser::{self, Extracted};
use crate::settings::Settings;
use crate::source::{self, HnApiSource, RawComment, ThreadSource};

pub const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";

pub fn permalink(id: u64) -> String {
    format!("{}{}", ITEM_URL, id)
}

/// A comment that survived filtering, with its offline extraction done.
struct Prepared {
    id: u64,
    author: String,
    markup: String,
    extracted: Extracted,
}

/// Turns fetched comments into records. Owns the geocode cache for the run.
pub struct RecordBuilder {
    guesser: LocationGuesser,
    cache: GeocodeCache,
    prior: PriorAuthors,
    aggressive_headline: bool,
    max_address_len: usize,
}

impl RecordBuilder {
    pub fn new(
        guesser: LocationGuesser,
        cache: GeocodeCache,
        prior: PriorAuthors,
        settings: &Settings,
    ) -> Self {
        RecordBuilder {
            guesser,
            cache,
            prior,
            aggressive_headline: settings.aggressive_headline,
            max_address_len: settings.max_address_len,
        }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub async fn build(&self, comments: &[RawComment]) -> Result<Vec<JobPostingRecord>> {
        // Offline stages in parallel; collect keeps thread order.
        let prepared: Vec<Prepared> = comments
            .par_iter()
            .filter_map(|c| self.prepare(c))
            .collect();
        info!(
            "Extracted {} postings ({} skipped)",
            prepared.len(),
            comments.len() - prepared.len()
        );

        let pb = ProgressBar::new(prepared.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} geocoding")?
                .progress_chars("#>-"),
        );

        let mut records = Vec::with_capacity(prepared.len());
        for p in prepared {
            records.push(self.assemble(p).await);
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(records)
    }

    fn prepare(&self, comment: &RawComment) -> Option<Prepared> {
        if comment.deleted {
            return None;
        }
        let (Some(author), Some(markup)) = (&comment.author, &comment.body) else {
            debug!("Skipping comment {}: no author or body", comment.id);
            return None;
        };
        let extracted = parser::extract(markup, &self.guesser, self.aggressive_headline);
        if let Some(guess) = &extracted.location {
            debug!(id = comment.id, phrase = %guess.phrase, strategy = guess.strategy.name(), "location guessed");
        }
        Some(Prepared {
            id: comment.id,
            author: author.clone(),
            markup: markup.clone(),
            extracted,
        })
    }

    async fn assemble(&self, p: Prepared) -> JobPostingRecord {
        let (location, geocode) = match p.extracted.location {
            Some(guess) => {
                let outcome = self.cache.resolve(&guess.phrase).await;
                match outcome.resolved() {
                    Some(g) if g.is_precise(self.max_address_len) => (Some(guess.phrase), Some(g.clone())),
                    Some(g) => {
                        debug!(
                            phrase = %guess.phrase,
                            address = %g.formatted_address,
                            "Discarding imprecise geocode"
                        );
                        (None, None)
                    }
                    None => (Some(guess.phrase), None),
                }
            }
            None => (None, None),
        };

        let flags = p.extracted.classification;
        JobPostingRecord {
            freshness: self.prior.is_fresh(&p.author),
            user: p.author,
            url: permalink(p.id),
            markup: p.markup,
            text: p.extracted.normalized.text,
            remote: flags.remote,
            visa_sponsorship: flags.visa_sponsorship,
            internship: flags.internship,
            location,
            latitude: geocode.as_ref().map(|g| g.latitude),
            longitude: geocode.as_ref().map(|g| g.longitude),
            address: geocode.as_ref().map(|g| g.formatted_address.clone()),
            country: geocode.and_then(|g| g.country_code),
        }
    }
}

// ── Driver ──

pub struct RunSummary {
    pub comments: usize,
    pub fetched: usize,
    pub fetch_errors: usize,
    pub records: usize,
    pub located: usize,
    pub geocoded: usize,
    pub dataset: PathBuf,
    pub periods: Vec<String>,
}

impl RunSummary {
    pub fn print(&self) {
        println!(
            "Wrote {} records to {:?} ({} comments, {} fetched, {} fetch errors).",
            self.records, self.dataset, self.comments, self.fetched, self.fetch_errors
        );
        println!("Located {}, geocoded {}.", self.located, self.geocoded);
        println!("Manifest lists {} periods.", self.periods.len());
    }
}

/// Load everything that can fail without the network.
pub fn load_guesser(settings: &Settings) -> Result<LocationGuesser> {
    let synonyms = SynonymTable::load(&settings.synonyms_path)?;
    info!("Loaded {} location synonyms", synonyms.len());
    Ok(LocationGuesser::new(synonyms))
}

/// Run against the Hacker News API and the Google geocoder.
pub async fn run(settings: &Settings, guesser: LocationGuesser, thread_id: u64, period: Period) -> Result<RunSummary> {
    let client = source::http_client(settings)?;
    let thread = Arc::new(HnApiSource::new(client.clone(), &settings.hn_api_url));
    let geocoder = GoogleGeocoder::new(client, &settings.geocoder_url, settings.geocoder_api_key.clone());
    run_with(settings, thread, Box::new(geocoder), guesser, thread_id, period).await
}

pub async fn run_with(
    settings: &Settings,
    thread: Arc<dyn ThreadSource>,
    geocoder: Box<dyn Geocoder>,
    guesser: LocationGuesser,
    thread_id: u64,
    period: Period,
) -> Result<RunSummary> {
    let prior = dataset::load_prior_authors(&settings.data_dir, period)?;

    info!("Fetching thread {} for {}", thread_id, period);
    let ids = source::fetch_thread(thread.as_ref(), thread_id, settings.request_timeout())
        .await
        .with_context(|| format!("Failed to fetch thread {}", thread_id))?;
    println!("Thread {} has {} top-level comments", thread_id, ids.len());

    let (comments, stats) = source::fetch_comments(
        thread,
        &ids,
        settings.fetch_concurrency,
        settings.request_timeout(),
    )
    .await?;

    let cache = GeocodeCache::new(
        geocoder,
        settings.geocode_cache_capacity,
        settings.geocode_delay(),
        settings.request_timeout(),
    );
    let builder = RecordBuilder::new(guesser, cache, prior, settings);
    let records = builder.build(&comments).await?;
    let cache_stats = builder.cache().stats().await;
    info!(
        "Geocode cache: {} entries, {} hits, {} misses, {} failures",
        builder.cache().len().await,
        cache_stats.hits,
        cache_stats.misses,
        cache_stats.failures
    );

    let dataset = dataset::write_dataset(&settings.data_dir, period, &records)?;
    let periods = dataset::write_manifest(&settings.data_dir, &settings.manifest_path)?;

    Ok(RunSummary {
        comments: stats.total,
        fetched: stats.ok,
        fetch_errors: stats.errors,
        records: records.len(),
        located: records.iter().filter(|r| r.location.is_some()).count(),
        geocoded: records.iter().filter(|r| r.latitude.is_some()).count(),
        dataset,
        periods,
    })
}
