//! Per-item results for best-effort batch operations

use std::fmt;

/// Outcome for one item of a batch
#[derive(Debug)]
pub struct ItemResult<T, E> {
    /// Item identifier (source name, module name)
    pub item: String,
    /// What happened to it
    pub result: Result<T, E>,
}

/// Collected outcomes of a batch; aggregation happens after the loop
#[derive(Debug)]
pub struct BatchReport<T, E> {
    items: Vec<ItemResult<T, E>>,
}

impl<T, E> Default for BatchReport<T, E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T, E> BatchReport<T, E> {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one item
    pub fn push(&mut self, item: impl Into<String>, result: Result<T, E>) {
        self.items.push(ItemResult {
            item: item.into(),
            result,
        });
    }

    /// All outcomes in processing order
    pub fn items(&self) -> &[ItemResult<T, E>] {
        &self.items
    }

    /// Number of items processed
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was processed
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of successful items
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_ok()).count()
    }

    /// Number of failed items
    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_err()).count()
    }

    /// Successful items with their values
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().ok().map(|v| (i.item.as_str(), v)))
    }

    /// Failed items with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &E)> {
        self.items
            .iter()
            .filter_map(|i| i.result.as_ref().err().map(|e| (i.item.as_str(), e)))
    }
}

impl<T, E> FromIterator<(String, Result<T, E>)> for BatchReport<T, E> {
    fn from_iter<I: IntoIterator<Item = (String, Result<T, E>)>>(iter: I) -> Self {
        Self {
            items: iter
                .into_iter()
                .map(|(item, result)| ItemResult { item, result })
                .collect(),
        }
    }
}

impl<T, E> fmt::Display for BatchReport<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded, {} failed", self.succeeded(), self.failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report: BatchReport<u32, String> = BatchReport::new();
        report.push("a", Ok(1));
        report.push("b", Err("boom".to_string()));
        report.push("c", Ok(3));

        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.to_string(), "2 succeeded, 1 failed");

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![("b", &"boom".to_string())]);
    }

    #[test]
    fn test_collect() {
        let report: BatchReport<(), &str> = vec![
            ("x".to_string(), Ok(())),
            ("y".to_string(), Err("no")),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.items()[1].item, "y");
        assert_eq!(report.successes().count(), 1);
    }

    #[test]
    fn test_empty() {
        let report: BatchReport<(), ()> = BatchReport::new();
        assert!(report.is_empty());
        assert_eq!(report.succeeded(), 0);
    }
}
