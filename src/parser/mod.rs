pub mod classify;
pub mod location;
pub mod text;

use classify::Classification;
use location::{LocationGuess, LocationGuesser};
use text::NormalizedComment;

/// Everything derivable from a comment without touching the network.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub normalized: NormalizedComment,
    pub classification: Classification,
    pub location: Option<LocationGuess>,
}

/// Three steps: markup → normalized text → flags + location guess.
pub fn extract(markup: &str, guesser: &LocationGuesser, aggressive_headline: bool) -> Extracted {
    let normalized = text::normalize(markup);
    let classification = classify::classify(&normalized.headline);
    let location =
        guesser.guess_comment(&normalized.headline, &normalized.text, aggressive_headline);
    Extracted {
        normalized,
        classification,
        location,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use super::location::SynonymTable;
    use std::path::Path;

    fn parse(fixture: &str) -> Extracted {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        let synonyms = SynonymTable::load(Path::new("data/synonyms.json")).unwrap();
        extract(&html, &LocationGuesser::new(synonyms), true)
    }

    #[test]
    fn acme_posting() {
        let e = parse("comment_acme");
        assert!(e.classification.remote);
        assert!(!e.classification.internship);
        // the "No H1B" line is in the body, not the headline
        assert!(!e.classification.visa_sponsorship);
        assert_eq!(e.location.unwrap().phrase, "Cambridge, MA");
    }

    #[test]
    fn munich_posting() {
        let e = parse("comment_munich");
        assert!(e.classification.internship);
        assert!(!e.classification.remote);
        assert_eq!(e.location.unwrap().phrase, "Munich, Germany");
    }

    #[test]
    fn plain_posting_has_no_location() {
        let e = parse("comment_plain");
        assert_eq!(e.location, None);
        assert_eq!(e.classification, Classification::default());
        assert_eq!(e.normalized.headline, "Looking for a contract designer, message me.");
    }
}
