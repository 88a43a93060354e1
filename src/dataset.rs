use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::freshness::PriorAuthors;

// ── Periods ──

/// A calendar month, labelled `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    first_day: NaiveDate,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Period { first_day })
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn previous(&self) -> Period {
        let first_day = self
            .first_day
            .checked_sub_months(Months::new(1))
            .unwrap_or(self.first_day);
        Period { first_day }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day.format("%Y-%m"))
    }
}

impl FromStr for Period {
    type Err = ConfigError;

    /// Accepts `2015-3` as well as `2015-03`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Period::new(year, month).ok_or_else(invalid)
    }
}

// ── Records ──

/// One posting. Field names on disk follow the web map's data files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPostingRecord {
    pub user: String,
    pub url: String,
    #[serde(rename = "full_html")]
    pub markup: String,
    pub text: String,
    pub remote: bool,
    #[serde(rename = "h1b")]
    pub visa_sponsorship: bool,
    #[serde(rename = "intern")]
    pub internship: bool,
    pub freshness: bool,
    pub location: Option<String>,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lon")]
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub country: Option<String>,
}

/// Only the author is needed from older datasets.
#[derive(Deserialize)]
struct PriorRecord {
    user: String,
}

pub fn dataset_path(data_dir: &Path, period: Period) -> PathBuf {
    data_dir.join(period.file_name())
}

/// Authors of the period before `period`. A missing file is normal (first
/// run, or a skipped month) and yields `Unavailable`.
pub fn load_prior_authors(data_dir: &Path, period: Period) -> Result<PriorAuthors> {
    let path = dataset_path(data_dir, period.previous());
    if !path.exists() {
        info!("No previous dataset at {:?}; every posting counts as fresh", path);
        return Ok(PriorAuthors::Unavailable);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
    let records: Vec<PriorRecord> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))?;
    let prior = PriorAuthors::from_authors(records.into_iter().map(|r| r.user));
    info!("Loaded {} previous authors from {:?}", prior.len().unwrap_or(0), path);
    Ok(prior)
}

/// Pretty JSON, four-space indent, keys sorted so reruns diff cleanly.
pub fn to_json(records: &[JobPostingRecord]) -> Result<String> {
    // serde_json::Value keeps object keys in a BTreeMap
    let value = serde_json::to_value(records)?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(out)?)
}

pub fn write_dataset(data_dir: &Path, period: Period, records: &[JobPostingRecord]) -> Result<PathBuf> {
    fs::create_dir_all(data_dir).with_context(|| format!("Failed to create {:?}", data_dir))?;
    let path = dataset_path(data_dir, period);
    fs::write(&path, to_json(records)?).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

pub fn read_dataset(path: &Path) -> Result<Vec<JobPostingRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))
}

// ── Manifest ──

/// Labels of every dataset in `data_dir`, hidden entries skipped, sorted.
pub fn available_periods(data_dir: &Path) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    for entry in fs::read_dir(data_dir).with_context(|| format!("Failed to list {:?}", data_dir))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let label = name.split('.').next().unwrap_or_default().to_string();
        labels.push(label);
    }
    labels.sort();
    Ok(labels)
}

/// Rewrite the JS manifest the web map loads to know which months exist.
pub fn write_manifest(data_dir: &Path, manifest_path: &Path) -> Result<Vec<String>> {
    let labels = available_periods(data_dir)?;
    if let Some(parent) = manifest_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let js = format!("var available_data = {};", serde_json::to_string(&labels)?);
    fs::write(manifest_path, js).with_context(|| format!("Failed to write {:?}", manifest_path))?;
    Ok(labels)
}
