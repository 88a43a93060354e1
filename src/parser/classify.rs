use std::sync::LazyLock;

use regex::Regex;

// Group 1 captures a negating "no" right before the keyword.
static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(no\s+)?remote\b").unwrap());
static VISA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(no\s+)?(?:h1b|h1-b|h-1b)\b").unwrap());
static INTERN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(no\s+)?intern(?:s|ships?)?\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub remote: bool,
    pub visa_sponsorship: bool,
    pub internship: bool,
}

/// Keyword heuristics over a posting. Case-insensitive; each flag is
/// independent of the others.
pub fn classify(text: &str) -> Classification {
    let folded = text.to_lowercase();
    Classification {
        remote: affirmed(&REMOTE_RE, &folded),
        visa_sponsorship: affirmed(&VISA_RE, &folded),
        internship: affirmed(&INTERN_RE, &folded),
    }
}

/// True if any occurrence of the keyword is not negated.
fn affirmed(re: &Regex, text: &str) -> bool {
    re.captures_iter(text).any(|caps| caps.get(1).is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote() {
        assert!(!classify("No remote work").remote);
        assert!(classify("We are fully remote").remote);
        assert!(classify("REMOTE (US only)").remote);
    }

    #[test]
    fn remote_needs_whole_word() {
        assert!(!classify("Our remoteness is a feature").remote);
        assert!(!classify("We are not hiring").remote);
    }

    #[test]
    fn negation_needs_the_word_no() {
        // "piano" ends in "no" but does not negate
        assert!(classify("We sell piano remote controls").remote);
    }

    #[test]
    fn visa_variants() {
        assert!(classify("Need H1B sponsorship").visa_sponsorship);
        assert!(classify("h1-b transfers ok").visa_sponsorship);
        assert!(classify("H-1B welcome").visa_sponsorship);
        assert!(!classify("No H1B").visa_sponsorship);
        assert!(!classify("Visa: none").visa_sponsorship);
    }

    #[test]
    fn internship_variants() {
        assert!(classify("Senior interns wanted").internship);
        assert!(classify("Summer internship").internship);
        assert!(classify("INTERN, full-time").internship);
        assert!(!classify("International team").internship);
        assert!(!classify("no interns please").internship);
    }

    #[test]
    fn flags_are_independent() {
        let c = classify("Remote | H1B | Interns");
        assert_eq!(
            c,
            Classification { remote: true, visa_sponsorship: true, internship: true }
        );
        assert_eq!(classify("Onsite only"), Classification::default());
    }

    #[test]
    fn pure() {
        let text = "ONSITE, REMOTE | no interns | H1B";
        assert_eq!(classify(text), classify(text));
    }
}
