use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

// "Cambridge, MA", "San Francisco, CA", "London, UK"
static CITY_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(([A-Z][^ A-Z\n]{2,} ?){1,2}, [A-Z]{2})(?:\W|$)").unwrap());
// "Munich, Germany": any capitalized token after the comma
static CITY_REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(([A-Z][^ A-Z,\n]{2,} ?){1,2}?, [A-Z][^\s]+)").unwrap());

/// Shorthand → canonical place name. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    // longest synonym first, so "NYC" wins over "NY"
    entries: Vec<(String, String)>,
}

impl SynonymTable {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: Vec<_> = pairs.into_iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        SynonymTable { entries }
    }

    /// Load a JSON object of `"synonym": "canonical"` pairs.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::SynonymsMissing(path.to_path_buf()))?;
        let map: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::SynonymsInvalid {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(map))
    }

    /// Plain substring match: a short all-caps synonym like "NY" also hits
    /// "COMPANY", so keep such entries out of the table.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(synonym, _)| text.contains(synonym.as_str()))
            .map(|(_, canonical)| canonical.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Synonyms,
    CityRegionCode,
    CityRegion,
}

/// Tried in order; the first hit wins.
pub const STRATEGIES: &[Strategy] = &[Strategy::Synonyms, Strategy::CityRegionCode, Strategy::CityRegion];

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Synonyms => "synonyms",
            Strategy::CityRegionCode => "city_region_code",
            Strategy::CityRegion => "city_region",
        }
    }

    /// Loose strategies only run in aggressive mode.
    pub fn is_aggressive(self) -> bool {
        matches!(self, Strategy::CityRegion)
    }

    pub fn apply(self, text: &str, synonyms: &SynonymTable) -> Option<String> {
        match self {
            Strategy::Synonyms => synonyms.lookup(text).map(str::to_string),
            Strategy::CityRegionCode => CITY_CODE_RE
                .captures(text)
                .map(|caps| caps[1].trim().to_string()),
            Strategy::CityRegion => CITY_REGION_RE
                .captures(text)
                .map(|caps| trim_trailing_punct(&caps[1]))
                .filter(|s| !s.is_empty()),
        }
    }
}

fn trim_trailing_punct(s: &str) -> String {
    s.trim_end_matches(|c: char| !c.is_alphanumeric()).trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationGuess {
    pub phrase: String,
    pub strategy: Strategy,
}

#[derive(Clone)]
pub struct LocationGuesser {
    synonyms: SynonymTable,
}

impl LocationGuesser {
    pub fn new(synonyms: SynonymTable) -> Self {
        LocationGuesser { synonyms }
    }

    pub fn guess(&self, text: &str, aggressive: bool) -> Option<LocationGuess> {
        STRATEGIES
            .iter()
            .filter(|s| aggressive || !s.is_aggressive())
            .find_map(|&strategy| {
                strategy
                    .apply(text, &self.synonyms)
                    .map(|phrase| LocationGuess { phrase, strategy })
            })
    }

    /// Headline first (aggressive if asked), then the full text conservatively.
    pub fn guess_comment(
        &self,
        headline: &str,
        text: &str,
        aggressive_headline: bool,
    ) -> Option<LocationGuess> {
        self.guess(headline, aggressive_headline)
            .or_else(|| self.guess(text, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SynonymTable {
        SynonymTable::new(
            [
                ("SF", "San Francisco"),
                ("Bay Area", "San Francisco"),
                ("NY", "New York"),
                ("NYC", "New York"),
            ]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string())),
        )
    }

    fn guesser() -> LocationGuesser {
        LocationGuesser::new(table())
    }

    #[test]
    fn synonym_returns_canonical_name() {
        let g = guesser().guess("We are in SF", false).unwrap();
        assert_eq!(g.phrase, "San Francisco");
        assert_eq!(g.strategy, Strategy::Synonyms);
    }

    #[test]
    fn longer_synonym_first() {
        let t = table();
        assert_eq!(t.entries[0].0, "Bay Area");
        assert_eq!(t.lookup("NYC office"), Some("New York"));
    }

    #[test]
    fn city_with_region_code() {
        let g = guesser().guess("Cambridge, MA is our home", false).unwrap();
        assert_eq!(g.phrase, "Cambridge, MA");
        assert_eq!(g.strategy, Strategy::CityRegionCode);
    }

    #[test]
    fn two_word_city_at_end_of_text() {
        let g = guesser().guess("Office: Palo Alto, CA", false).unwrap();
        assert_eq!(g.phrase, "Palo Alto, CA");
    }

    #[test]
    fn country_code() {
        let g = guesser().guess("Acme | London, UK | Full-time", false);
        // "London" is not in this table, so the pattern catches it
        assert_eq!(g.unwrap().phrase, "London, UK");
    }

    #[test]
    fn region_name_needs_aggressive() {
        assert_eq!(guesser().guess("Brezn Labs - Munich, Germany - Data", false), None);
        let g = guesser().guess("Brezn Labs - Munich, Germany - Data", true).unwrap();
        assert_eq!(g.phrase, "Munich, Germany");
        assert_eq!(g.strategy, Strategy::CityRegion);
    }

    #[test]
    fn aggressive_trims_punctuation() {
        let g = guesser().guess("Based in Munich, Germany.", true).unwrap();
        assert_eq!(g.phrase, "Munich, Germany");
    }

    #[test]
    fn nothing_found() {
        assert_eq!(guesser().guess("we are hiring engineers", true), None);
    }

    #[test]
    fn strategies_are_independent() {
        let t = table();
        assert_eq!(Strategy::CityRegionCode.apply("We are in SF", &t), None);
        assert_eq!(Strategy::Synonyms.apply("Cambridge, MA", &t), None);
        assert_eq!(
            Strategy::CityRegion.apply("Lyon, France", &t).as_deref(),
            Some("Lyon, France")
        );
    }

    #[test]
    fn falls_back_to_full_text_without_aggressive() {
        let g = guesser();
        let hit = g
            .guess_comment("Acme | Backend Engineer", "We sit in Austin, TX near the river", true)
            .unwrap();
        assert_eq!(hit.phrase, "Austin, TX");

        // The loose pattern is not applied to the full text.
        assert_eq!(g.guess_comment("Acme", "Offices in Lyon, France", true), None);
    }

    #[test]
    fn headline_wins_over_text() {
        let hit = guesser()
            .guess_comment("Acme | Boston, MA", "Also hiring in SF", true)
            .unwrap();
        assert_eq!(hit.phrase, "Boston, MA");
    }

    #[test]
    fn short_synonym_matches_inside_words() {
        assert_eq!(table().lookup("GREAT COMPANY"), Some("New York"));
    }

    #[test]
    fn load_missing_table_is_config_error() {
        let err = SynonymTable::load(Path::new("does/not/exist.json")).unwrap_err();
        assert!(matches!(err, ConfigError::SynonymsMissing(_)));
    }

    #[test]
    fn load_shipped_table() {
        let t = SynonymTable::load(Path::new("data/synonyms.json")).unwrap();
        assert!(t.len() >= 10);
        assert_eq!(t.lookup("HQ in SoMa"), Some("San Francisco"));
    }
}
