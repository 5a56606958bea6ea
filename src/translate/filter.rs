use std::collections::HashSet;

/// Decides which records are sent to a model and which pass through untranslated
///
/// Shared by the preprocessing stage and every back-end that filters inline.
pub trait ValidityFilter: Send + Sync {
    fn is_valid(&self, text: &str) -> bool;

    /// One flag per record, aligned with the input order
    fn mask(&self, texts: &[String]) -> Vec<bool> {
        texts.iter().map(|t| self.is_valid(t)).collect()
    }
}

/// Exact-match ignore set: no trimming, no normalization
#[derive(Debug, Clone, Default)]
pub struct IgnoreSetFilter {
    ignore: HashSet<String>,
}

impl IgnoreSetFilter {
    pub fn new<I, S>(ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore: ignore.into_iter().map(Into::into).collect(),
        }
    }
}

impl ValidityFilter for IgnoreSetFilter {
    fn is_valid(&self, text: &str) -> bool {
        !self.ignore.contains(text)
    }
}

/// Keep the items whose mask flag is set
pub fn select_valid<T: Clone>(items: &[T], mask: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(mask)
        .filter(|(_, valid)| **valid)
        .map(|(item, _)| item.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_membership_only() {
        let filter = IgnoreSetFilter::new([" "]);
        let mask = filter.mask(&texts(&[" ", "  ", "Hello", ""]));
        assert_eq!(mask, vec![false, true, true, true]);
    }

    #[test]
    fn test_empty_ignore_set_keeps_everything() {
        let filter = IgnoreSetFilter::default();
        assert_eq!(filter.mask(&texts(&["", "\n"])), vec![true, true]);
    }

    #[test]
    fn test_mask_length_matches_input() {
        let filter = IgnoreSetFilter::new(["", "\n"]);
        let input = texts(&["a", "", "b", "\n", "c"]);
        let mask = filter.mask(&input);
        assert_eq!(mask.len(), input.len());
        assert_eq!(select_valid(&input, &mask), texts(&["a", "b", "c"]));
    }
}
