use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::error::ConfigError;

const SETTINGS_FILE: &str = "hnmap";
const ENV_PREFIX: &str = "HNMAP";

/// Run settings. Every field has a default, so an empty environment works.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// One `<YYYY-MM>.json` dataset per period.
    pub data_dir: PathBuf,
    pub manifest_path: PathBuf,
    /// `<thread id> <period>` lines, appended to by `latest`.
    pub input_path: PathBuf,
    pub synonyms_path: PathBuf,
    pub hn_api_url: String,
    pub geocoder_url: String,
    pub geocoder_api_key: Option<String>,
    pub geocode_delay_ms: u64,
    pub geocode_cache_capacity: usize,
    pub max_address_len: usize,
    pub request_timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub aggressive_headline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("web/data"),
            manifest_path: PathBuf::from("web/js/months.js"),
            input_path: PathBuf::from("input"),
            synonyms_path: PathBuf::from("data/synonyms.json"),
            hn_api_url: "https://hacker-news.firebaseio.com/v0".to_string(),
            geocoder_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            geocoder_api_key: None,
            geocode_delay_ms: 250,
            geocode_cache_capacity: 200,
            max_address_len: 50,
            request_timeout_secs: 30,
            fetch_concurrency: 10,
            aggressive_headline: true,
        }
    }
}

impl Settings {
    /// `hnmap.toml` (optional) overlaid by `HNMAP_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name(SETTINGS_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn geocode_delay(&self) -> Duration {
        Duration::from_millis(self.geocode_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
