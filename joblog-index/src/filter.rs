use crate::index::LogIndex;
use rayon::prelude::*;

/// row count above which matching goes parallel
const PARALLEL_THRESHOLD: usize = 1000;

/// filtering engine over the index's in-memory columns, with incremental
/// narrowing and parallel matching
///
/// matches are case-insensitive substring tests against each row's host,
/// pid, tid and subsystem fields; messages live on disk and are not
/// searched. the result is a set of row indices the viewer can feed back
/// into [`LogIndex::rows`] one window at a time.
pub struct RowFilter {
    /// previous filter query for incremental filtering
    previous_query: String,
    /// cached results from previous filter
    previous_results: Vec<usize>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self {
            previous_query: String::new(),
            previous_results: Vec::new(),
        }
    }

    /// filter all indexed rows and return indices of matching ones
    ///
    /// when the query extends the previous query, only the previous result
    /// set is re-searched. a cached result set that no longer fits the
    /// index (it was blanked and rebuilt shorter) forces a full search.
    pub fn filter(&mut self, index: &LogIndex, query: &str) -> Vec<usize> {
        // empty query = show all
        if query.is_empty() {
            self.reset();
            return (0..index.n_rows()).collect();
        }

        let cache_valid = self
            .previous_results
            .last()
            .is_none_or(|&last| last < index.n_rows());

        let can_use_incremental = !self.previous_query.is_empty()
            && query.starts_with(&self.previous_query)
            && !self.previous_results.is_empty()
            && cache_valid;

        let search_space: Vec<usize> = if can_use_incremental {
            self.previous_results.clone()
        } else {
            (0..index.n_rows()).collect()
        };

        // pre-lowercase the pattern once, not per row
        let pattern_lower = query.to_lowercase();

        let matched = if search_space.len() > PARALLEL_THRESHOLD {
            Self::filter_parallel(index, &search_space, &pattern_lower)
        } else {
            Self::filter_sequential(index, &search_space, &pattern_lower)
        };

        // cache for next filter
        self.previous_query = query.to_string();
        self.previous_results = matched.clone();

        matched
    }

    /// filter only rows appended since `old_count` and extend the cached
    /// results, cheaper than re-filtering everything after a scan
    pub fn filter_appended(
        &mut self,
        index: &LogIndex,
        old_count: usize,
        query: &str,
    ) -> Vec<usize> {
        // query changed: nothing to extend
        if query != self.previous_query {
            return self.filter(index, query);
        }

        if old_count >= index.n_rows() {
            return self.previous_results.clone();
        }

        if query.is_empty() {
            return (0..index.n_rows()).collect();
        }

        let new_indices: Vec<usize> = (old_count..index.n_rows()).collect();
        let pattern_lower = query.to_lowercase();

        let new_matched = if new_indices.len() > PARALLEL_THRESHOLD {
            Self::filter_parallel(index, &new_indices, &pattern_lower)
        } else {
            Self::filter_sequential(index, &new_indices, &pattern_lower)
        };

        self.previous_results.extend(new_matched);
        self.previous_results.clone()
    }

    /// reset the incremental cache
    pub fn reset(&mut self) {
        self.previous_query.clear();
        self.previous_results.clear();
    }

    fn filter_sequential(index: &LogIndex, search_space: &[usize], pattern_lower: &str) -> Vec<usize> {
        search_space
            .iter()
            .filter(|&&row| index.field_text(row).to_lowercase().contains(pattern_lower))
            .copied()
            .collect()
    }

    fn filter_parallel(index: &LogIndex, search_space: &[usize], pattern_lower: &str) -> Vec<usize> {
        search_space
            .par_iter()
            .filter(|&&row| index.field_text(row).to_lowercase().contains(pattern_lower))
            .copied()
            .collect()
    }
}

impl Default for RowFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn indexed(content: &str) -> LogIndex {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.log");
        fs::write(&path, content).unwrap();
        let mut index = LogIndex::new(&path);
        index.scan().unwrap();
        index
    }

    const MIXED: &str = "id-f\n\
                         0.0 alpha_1_1 net: a\n\
                         1.0 beta_2_1 disk: b\n\
                         2.0 alpha_1_2 gpu: c\n\
                         3.0 gamma_3_1 net: d\n";

    #[test]
    fn test_empty_query_matches_all() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        assert_eq!(filter.filter(&index, ""), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_host_match() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        assert_eq!(filter.filter(&index, "alpha"), vec![0, 2]);
    }

    #[test]
    fn test_subsystem_match_is_case_insensitive() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        assert_eq!(filter.filter(&index, "NET"), vec![0, 3]);
    }

    #[test]
    fn test_incremental_narrowing() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        assert_eq!(filter.filter(&index, "a"), vec![0, 1, 2, 3]);
        // extends "a": searched within the cached result set
        assert_eq!(filter.filter(&index, "al"), vec![0, 2]);
        assert_eq!(filter.filter(&index, "alp"), vec![0, 2]);
    }

    #[test]
    fn test_filter_appended_extends_results() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        assert_eq!(filter.filter(&index, "net"), vec![0, 3]);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.log");
        fs::write(
            &path,
            format!("{MIXED}4.0 delta_4_1 net: e\n5.0 beta_2_1 gpu: f\n"),
        )
        .unwrap();
        let mut grown = LogIndex::new(&path);
        grown.scan().unwrap();

        let results = filter.filter_appended(&grown, 4, "net");
        assert_eq!(results, vec![0, 3, 4]);
    }

    #[test]
    fn test_stale_cache_after_blank_forces_full_search() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        filter.filter(&index, "a");

        let short = indexed("id-g\n0.0 alpha_1_1 net: only\n");
        // "al" extends "a" but the cached indices exceed the new index
        assert_eq!(filter.filter(&short, "al"), vec![0]);
    }

    #[test]
    fn test_no_match() {
        let index = indexed(MIXED);
        let mut filter = RowFilter::new();
        assert!(filter.filter(&index, "zeppelin").is_empty());
    }
}
