/// Sliding window over preceding records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSettings {
    pub window: usize,
    pub separator: String,
}

impl ContextSettings {
    pub fn new(window: usize, separator: impl Into<String>) -> Self {
        Self {
            window,
            separator: separator.into(),
        }
    }

    pub fn build(&self, records: &[String]) -> Vec<String> {
        build_context(records, self.window, &self.separator)
    }
}

/// Context for every record, computed on the unfiltered batch
///
/// Record `i` gets `records[max(0, i - window)..i]` joined with `sep`. Validity is not
/// consulted here; callers select the entries of valid records afterwards.
pub fn build_context(records: &[String], window: usize, sep: &str) -> Vec<String> {
    (0..records.len())
        .map(|i| {
            let start = i.saturating_sub(window);
            records[start..i].join(sep)
        })
        .collect()
}
