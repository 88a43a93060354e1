use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::GeocodeFailure;

#[derive(Debug, Clone, PartialEq)]
pub struct Geocode {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub country_code: Option<String>,
}

impl Geocode {
    /// Long formatted addresses come from vague matches (a street in the
    /// wrong town, a whole county); they are not trusted.
    pub fn is_precise(&self, max_address_len: usize) -> bool {
        self.formatted_address.chars().count() <= max_address_len
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    Resolved(Geocode),
    Unresolved(GeocodeFailure),
}

impl GeocodeOutcome {
    pub fn resolved(&self) -> Option<&Geocode> {
        match self {
            GeocodeOutcome::Resolved(g) => Some(g),
            GeocodeOutcome::Unresolved(_) => None,
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, phrase: &str) -> Result<Geocode, GeocodeFailure>;
}

// ── Google Geocoding API ──

pub struct GoogleGeocoder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, url: &str, api_key: Option<String>) -> Self {
        GoogleGeocoder {
            client,
            url: url.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, phrase: &str) -> Result<Geocode, GeocodeFailure> {
        let mut query = vec![("address", phrase)];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }
        let response = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| GeocodeFailure::Malformed(e.to_string()))?;
        parse_response(body)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

fn parse_response(body: GoogleResponse) -> Result<Geocode, GeocodeFailure> {
    match body.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Err(GeocodeFailure::NoResults),
        other => {
            let detail = body.error_message.unwrap_or_default();
            return Err(GeocodeFailure::Upstream(format!("{} {}", other, detail).trim().to_string()));
        }
    }
    let first = body.results.into_iter().next().ok_or(GeocodeFailure::NoResults)?;
    let country_code = first
        .address_components
        .iter()
        .find(|c| c.types.iter().any(|t| t == "country"))
        .map(|c| c.short_name.clone());
    Ok(Geocode {
        latitude: first.geometry.location.lat,
        longitude: first.geometry.location.lng,
        formatted_address: first.formatted_address,
        country_code,
    })
}

// ── Cache ──

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub failures: usize,
}

struct CacheTable {
    capacity: usize,
    entries: HashMap<String, GeocodeOutcome>,
    // insertion order, oldest at the front
    order: VecDeque<String>,
    stats: CacheStats,
}

impl CacheTable {
    fn new(capacity: usize) -> Self {
        CacheTable {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            stats: CacheStats::default(),
        }
    }

    fn get(&self, phrase: &str) -> Option<&GeocodeOutcome> {
        self.entries.get(phrase)
    }

    fn put(&mut self, phrase: String, outcome: GeocodeOutcome) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(phrase.clone(), outcome).is_none() {
            self.order.push_back(phrase);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Memoizes geocoder lookups by exact phrase and spaces out outbound calls.
///
/// One lock covers the table and the outbound call, so concurrent callers
/// never query the same phrase twice and the delay between calls holds.
/// Failures are cached too and never retried within a run.
pub struct GeocodeCache {
    geocoder: Box<dyn Geocoder>,
    table: Mutex<CacheTable>,
    delay: Duration,
    timeout: Duration,
}

impl GeocodeCache {
    pub fn new(geocoder: Box<dyn Geocoder>, capacity: usize, delay: Duration, timeout: Duration) -> Self {
        GeocodeCache {
            geocoder,
            table: Mutex::new(CacheTable::new(capacity)),
            delay,
            timeout,
        }
    }

    pub async fn resolve(&self, phrase: &str) -> GeocodeOutcome {
        let mut table = self.table.lock().await;
        if let Some(hit) = table.get(phrase).cloned() {
            table.stats.hits += 1;
            debug!(phrase, "geocode cache hit");
            return hit;
        }
        table.stats.misses += 1;

        tokio::time::sleep(self.delay).await;
        let outcome = match tokio::time::timeout(self.timeout, self.geocoder.geocode(phrase)).await {
            Ok(Ok(geocode)) => GeocodeOutcome::Resolved(geocode),
            Ok(Err(failure)) => GeocodeOutcome::Unresolved(failure),
            Err(_) => GeocodeOutcome::Unresolved(GeocodeFailure::Timeout(self.timeout.as_secs())),
        };
        if let GeocodeOutcome::Unresolved(failure) = &outcome {
            table.stats.failures += 1;
            warn!(phrase, %failure, "geocode unresolved");
        }
        table.put(phrase.to_string(), outcome.clone());
        outcome
    }

    pub async fn stats(&self) -> CacheStats {
        self.table.lock().await.stats
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingGeocoder {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, phrase: &str) -> Result<Geocode, GeocodeFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeocodeFailure::Upstream("quota".into()));
            }
            Ok(Geocode {
                latitude: 42.37,
                longitude: -71.11,
                formatted_address: format!("{}, USA", phrase),
                country_code: Some("US".into()),
            })
        }
    }

    struct StalledGeocoder;

    #[async_trait]
    impl Geocoder for StalledGeocoder {
        async fn geocode(&self, _phrase: &str) -> Result<Geocode, GeocodeFailure> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GeocodeFailure::NoResults)
        }
    }

    fn cache(fail: bool, capacity: usize) -> (GeocodeCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let geocoder = CountingGeocoder { calls: Arc::clone(&calls), fail };
        let cache = GeocodeCache::new(
            Box::new(geocoder),
            capacity,
            Duration::from_millis(250),
            Duration::from_secs(30),
        );
        (cache, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn second_lookup_is_cached_and_not_delayed() {
        let (cache, calls) = cache(false, 200);

        let start = tokio::time::Instant::now();
        let first = cache.resolve("Cambridge, MA").await;
        assert!(start.elapsed() >= Duration::from_millis(250));

        let start = tokio::time::Instant::now();
        let second = cache.resolve("Cambridge, MA").await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await, CacheStats { hits: 1, misses: 1, failures: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_exact_phrases() {
        let (cache, calls) = cache(false, 200);
        cache.resolve("Boston").await;
        cache.resolve("boston").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_cached_not_retried() {
        let (cache, calls) = cache(true, 200);
        let first = cache.resolve("Atlantis").await;
        let second = cache.resolve("Atlantis").await;
        assert_eq!(first, GeocodeOutcome::Unresolved(GeocodeFailure::Upstream("quota".into())));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().await.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_entry_is_evicted() {
        let (cache, calls) = cache(false, 2);
        cache.resolve("a").await;
        cache.resolve("b").await;
        cache.resolve("c").await;
        assert_eq!(cache.len().await, 2);
        // "a" was evicted, "c" is still cached
        cache.resolve("c").await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cache.resolve("a").await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out_as_unresolved() {
        let cache = GeocodeCache::new(
            Box::new(StalledGeocoder),
            10,
            Duration::from_millis(250),
            Duration::from_secs(5),
        );
        let outcome = cache.resolve("Nowhere").await;
        assert_eq!(outcome, GeocodeOutcome::Unresolved(GeocodeFailure::Timeout(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_lookup() {
        let (cache, calls) = cache(false, 200);
        let cache = Arc::new(cache);
        let a = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.resolve("Berlin").await }
        });
        let b = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.resolve("Berlin").await }
        });
        assert_eq!(a.await.unwrap(), b.await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn precision_threshold() {
        let mut g = Geocode {
            latitude: 0.0,
            longitude: 0.0,
            formatted_address: "x".repeat(50),
            country_code: None,
        };
        assert!(g.is_precise(50));
        g.formatted_address.push('x');
        assert!(!g.is_precise(50));
    }

    #[test]
    fn parses_google_response() {
        let body: GoogleResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "results": [{
                    "formatted_address": "Cambridge, MA, USA",
                    "geometry": {"location": {"lat": 42.3736158, "lng": -71.10973349999999}},
                    "address_components": [
                        {"long_name": "Cambridge", "short_name": "Cambridge", "types": ["locality", "political"]},
                        {"long_name": "United States", "short_name": "US", "types": ["country", "political"]}
                    ]
                }]
            }"#,
        )
        .unwrap();
        let g = parse_response(body).unwrap();
        assert_eq!(g.formatted_address, "Cambridge, MA, USA");
        assert_eq!(g.country_code.as_deref(), Some("US"));
        assert_eq!(g.latitude, 42.3736158);
    }

    #[test]
    fn google_status_errors() {
        let zero: GoogleResponse = serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert_eq!(parse_response(zero), Err(GeocodeFailure::NoResults));

        let denied: GoogleResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "error_message": "bad key", "results": []}"#,
        )
        .unwrap();
        assert_eq!(
            parse_response(denied),
            Err(GeocodeFailure::Upstream("REQUEST_DENIED bad key".into()))
        );
    }
}
