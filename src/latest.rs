use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::{debug, info};

use crate::dataset::Period;
use crate::error::ConfigError;
use crate::source::HnApiSource;

const HIRING_ACCOUNT: &str = "whoishiring";
// The account also posts "Who wants to be hired?" and "Freelancer?" threads.
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Ask HN: Who is hiring\? \(([A-Z][a-z]+ \d{4})\)").unwrap());
// A year's worth of monthly threads, three per month.
const MAX_SCANNED: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiringThread {
    pub id: u64,
    pub period: Period,
}

impl HiringThread {
    /// `<id> <year>-<month>`, unpadded month, as the input file stores it.
    pub fn input_line(&self) -> String {
        format!("{} {}-{}", self.id, self.period.year(), self.period.month())
    }
}

/// Period from a title like `Ask HN: Who is hiring? (March 2015)`.
pub fn parse_title(title: &str) -> Option<Period> {
    let caps = TITLE_RE.captures(title)?;
    let date = NaiveDate::parse_from_str(&format!("1 {}", &caps[1]), "%d %B %Y").ok()?;
    Period::new(date.year(), date.month())
}

/// Newest "Who is hiring?" thread posted by the hiring account.
pub async fn find_latest(api: &HnApiSource) -> Result<Option<HiringThread>> {
    let submitted = api
        .submissions(HIRING_ACCOUNT)
        .await
        .context("Failed to fetch whoishiring submissions")?;
    info!("{} has {} submissions", HIRING_ACCOUNT, submitted.len());

    for id in submitted.into_iter().take(MAX_SCANNED) {
        let item = api.item(id).await.with_context(|| format!("Failed to fetch item {}", id))?;
        let Some(title) = item.title else { continue };
        debug!(id, %title, "checking submission");
        if let Some(period) = parse_title(&title) {
            return Ok(Some(HiringThread { id, period }));
        }
    }
    Ok(None)
}

/// Append the thread to the input file unless the same line is there already.
/// Returns whether anything was written.
pub fn record_in_input(path: &Path, thread: &HiringThread) -> Result<bool> {
    let line = thread.input_line();
    if path.exists() {
        let existing = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        if existing.lines().any(|l| l.trim() == line) {
            return Ok(false);
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    writeln!(file, "{}", line)?;
    Ok(true)
}

/// Parse `<thread id> <period>` lines. Blank lines and `#` comments are skipped.
pub fn parse_input(contents: &str) -> Result<Vec<(u64, Period)>, ConfigError> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| -> Result<(u64, Period), ConfigError> {
            let invalid = || ConfigError::InvalidPeriod(l.to_string());
            let (id, period) = l.split_once(char::is_whitespace).ok_or_else(invalid)?;
            let id: u64 = id.parse().map_err(|_| invalid())?;
            Ok((id, period.trim().parse::<Period>()?))
        })
        .collect()
}
