use std::collections::HashSet;

/// Authors who posted in the previous period, if that period was processed.
#[derive(Debug, Clone, Default)]
pub enum PriorAuthors {
    #[default]
    Unavailable,
    Known(HashSet<String>),
}

impl PriorAuthors {
    pub fn from_authors<I, S>(authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PriorAuthors::Known(authors.into_iter().map(Into::into).collect())
    }

    /// Fresh means new since last period. Without a previous dataset every
    /// posting counts as fresh.
    pub fn is_fresh(&self, author: &str) -> bool {
        match self {
            PriorAuthors::Unavailable => true,
            PriorAuthors::Known(authors) => !authors.contains(author),
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            PriorAuthors::Unavailable => None,
            PriorAuthors::Known(authors) => Some(authors.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_is_fresh_without_prior_data() {
        let prior = PriorAuthors::Unavailable;
        assert!(prior.is_fresh("pg"));
        assert!(prior.is_fresh(""));
        assert_eq!(prior.len(), None);
    }

    #[test]
    fn repeat_posters_are_not_fresh() {
        let prior = PriorAuthors::from_authors(["pg", "dang"]);
        assert!(!prior.is_fresh("pg"));
        assert!(prior.is_fresh("tptacek"));
        assert_eq!(prior.len(), Some(2));
    }

    #[test]
    fn empty_prior_set_marks_everyone_fresh() {
        let prior = PriorAuthors::from_authors(Vec::<String>::new());
        assert!(prior.is_fresh("pg"));
    }
}
