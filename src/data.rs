//! Data structures for parsed benchmark tests

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One comparison subject of the benchmark harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySpec {
    /// Name as printed on the line following `START_PART`
    pub name: String,
    /// Overlay categories are drawn after every other category
    pub overlay: bool,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, overlay: bool) -> Self {
        Self {
            name: name.into(),
            overlay,
        }
    }
}

/// Ordered table of recognized categories.
///
/// The parser consults it to decide which part blocks to keep, the renderer
/// to decide draw order and colors. Table position is the stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    entries: Vec<CategorySpec>,
}

impl CategoryTable {
    pub fn new(entries: Vec<CategorySpec>) -> Self {
        Self { entries }
    }

    /// Look up a category by exact name
    pub fn get(&self, name: &str) -> Option<&CategorySpec> {
        self.entries.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Position of a category in the table
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|c| c.name == name)
    }

    /// Categories in draw order: regular ones in table order, overlays last
    pub fn draw_order(&self) -> impl Iterator<Item = &CategorySpec> {
        self.entries
            .iter()
            .filter(|c| !c.overlay)
            .chain(self.entries.iter().filter(|c| c.overlay))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(vec![
            CategorySpec::new("STL-MTX", true),
            CategorySpec::new("LF-P-1", false),
            CategorySpec::new("LF-P-T", false),
            CategorySpec::new("LF-LEAKS", false),
        ])
    }
}

/// Total run time per thread count for one category
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Series {
    points: BTreeMap<u32, f64>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample. A repeated thread count keeps the larger duration.
    ///
    /// Returns `true` when the thread count was already present.
    pub fn record(&mut self, threads: u32, seconds: f64) -> bool {
        let seconds = seconds.max(0.0);
        match self.points.get_mut(&threads) {
            Some(existing) => {
                if seconds > *existing {
                    *existing = seconds;
                }
                true
            }
            None => {
                self.points.insert(threads, seconds);
                false
            }
        }
    }

    pub fn get(&self, threads: u32) -> Option<f64> {
        self.points.get(&threads).copied()
    }

    /// Points sorted by thread count
    pub fn points(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.points.iter().map(|(t, s)| (*t, *s))
    }

    pub fn threads(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.keys().copied()
    }

    pub fn max_seconds(&self) -> Option<f64> {
        self.points.values().copied().reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<(u32, f64)> for Series {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        let mut series = Series::new();
        for (threads, seconds) in iter {
            series.record(threads, seconds);
        }
        series
    }
}

/// Operation mix of a run, e.g. `15+ / 5- / 10w / 70r`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationMix {
    pub push: u32,
    pub pop: u32,
    pub write: u32,
    pub read: u32,
}

impl std::fmt::Display for OperationMix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}+ / {}- / {}w / {}r",
            self.push, self.pop, self.write, self.read
        )
    }
}

/// The line following `START_TEST`, plus whatever could be extracted from it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Descriptor {
    /// Descriptor line as it appeared in the log (trimmed)
    pub raw: String,
    /// Leading label such as `locked tests`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pools: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix: Option<OperationMix>,
    /// Text after the final `|`, used when no operation mix was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

impl Descriptor {
    /// A descriptor with nothing extracted
    pub fn raw(line: impl Into<String>) -> Self {
        Self {
            raw: line.into(),
            label: None,
            seed: None,
            pools: None,
            mix: None,
            params: None,
        }
    }

    /// Normalized chart title, `(seed: 42 | 15+ / 5- / 10w / 70r)`.
    ///
    /// Falls back to the raw line when neither a seed nor parameters were found.
    pub fn title(&self) -> String {
        let params = match (&self.mix, &self.params) {
            (Some(mix), _) => Some(mix.to_string()),
            (None, Some(params)) => Some(params.clone()),
            (None, None) => None,
        };

        match (self.seed, params) {
            (Some(seed), Some(params)) => format!("(seed: {} | {})", seed, params),
            (Some(seed), None) => format!("(seed: {})", seed),
            (None, Some(params)) => format!("(seed: ? | {})", params),
            (None, None) => self.raw.clone(),
        }
    }
}

/// One completed `START_TEST` .. `END_TEST` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRecord {
    pub descriptor: Descriptor,
    /// Series keyed by category name. Categories not exercised are absent.
    pub series: BTreeMap<String, Series>,
}

impl TestRecord {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            series: BTreeMap::new(),
        }
    }

    pub fn title(&self) -> String {
        self.descriptor.title()
    }

    pub fn series(&self, category: &str) -> Option<&Series> {
        self.series.get(category)
    }

    /// Series whose category is listed in `categories`
    pub fn known_series<'a>(
        &'a self,
        categories: &'a CategoryTable,
    ) -> impl Iterator<Item = &'a Series> + 'a {
        self.series
            .iter()
            .filter(|(name, _)| categories.contains(name))
            .map(|(_, series)| series)
    }

    /// Union of thread counts across the known categories, sorted
    pub fn thread_domain(&self, categories: &CategoryTable) -> Vec<u32> {
        let mut threads: Vec<u32> = self
            .known_series(categories)
            .flat_map(|s| s.threads())
            .collect();
        threads.sort_unstable();
        threads.dedup();
        threads
    }

    /// Largest duration over the known categories
    pub fn max_seconds(&self, categories: &CategoryTable) -> Option<f64> {
        self.known_series(categories)
            .filter_map(Series::max_seconds)
            .reduce(f64::max)
    }

    /// Smallest strictly positive duration over the known categories
    pub fn min_positive_seconds(&self, categories: &CategoryTable) -> Option<f64> {
        self.known_series(categories)
            .flat_map(|s| s.points().map(|(_, secs)| secs))
            .filter(|secs| *secs > 0.0)
            .reduce(f64::min)
    }

    pub fn sample_count(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }
}

/// All records parsed from one log, in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordSet {
    pub records: Vec<TestRecord>,
}

impl RecordSet {
    pub fn new(records: Vec<TestRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load records from a JSON file written by [`RecordSet::to_json`]
    pub fn load_from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| crate::error::Error::FileReadError {
                path: path.display().to_string(),
                source: e,
            })?;

        let records: Self = serde_json::from_str(&content)?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_table_draws_overlay_last() {
        let table = CategoryTable::default();
        let order: Vec<&str> = table.draw_order().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["LF-P-1", "LF-P-T", "LF-LEAKS", "STL-MTX"]);
        assert!(table.get("STL-MTX").unwrap().overlay);
        assert!(!table.contains("LF-UNKNOWN"));
    }

    #[test]
    fn test_series_keeps_maximum_on_duplicate() {
        let mut series = Series::new();
        assert!(!series.record(4, 0.5));
        assert!(series.record(4, 0.8));
        assert!(series.record(4, 0.2));
        assert_eq!(series.get(4), Some(0.8));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_series_clamps_negative_durations() {
        let series: Series = vec![(1, -3.0)].into_iter().collect();
        assert_eq!(series.get(1), Some(0.0));
    }

    #[test]
    fn test_descriptor_title_variants() {
        let mut descriptor = Descriptor::raw("locked tests | seed: 42 | pools: 1");
        assert_eq!(descriptor.title(), "locked tests | seed: 42 | pools: 1");

        descriptor.seed = Some(42);
        assert_eq!(descriptor.title(), "(seed: 42)");

        descriptor.params = Some("pools: 1".to_string());
        assert_eq!(descriptor.title(), "(seed: 42 | pools: 1)");

        descriptor.mix = Some(OperationMix {
            push: 15,
            pop: 5,
            write: 10,
            read: 70,
        });
        assert_eq!(descriptor.title(), "(seed: 42 | 15+ / 5- / 10w / 70r)");

        descriptor.seed = None;
        assert_eq!(descriptor.title(), "(seed: ? | 15+ / 5- / 10w / 70r)");
    }

    #[test]
    fn test_thread_domain_is_union_across_categories() {
        let mut record = TestRecord::new(Descriptor::raw("t"));
        record
            .series
            .insert("STL-MTX".to_string(), vec![(1, 0.1), (4, 0.2)].into_iter().collect());
        record
            .series
            .insert("LF-P-1".to_string(), vec![(2, 0.3), (4, 0.05)].into_iter().collect());

        let categories = CategoryTable::default();
        assert_eq!(record.thread_domain(&categories), vec![1, 2, 4]);
        assert_eq!(record.max_seconds(&categories), Some(0.3));
        assert_eq!(record.min_positive_seconds(&categories), Some(0.05));
        assert_eq!(record.sample_count(), 4);
    }

    #[test]
    fn test_extent_ignores_categories_outside_table() {
        let mut record = TestRecord::new(Descriptor::raw("t"));
        record
            .series
            .insert("LF-P-1".to_string(), vec![(2, 0.3)].into_iter().collect());
        record
            .series
            .insert("TBB-Q".to_string(), vec![(64, 900.0), (1, 0.001)].into_iter().collect());

        let categories = CategoryTable::default();
        assert_eq!(record.thread_domain(&categories), vec![2]);
        assert_eq!(record.max_seconds(&categories), Some(0.3));
        assert_eq!(record.min_positive_seconds(&categories), Some(0.3));

        let custom = CategoryTable::new(vec![CategorySpec::new("TBB-Q", false)]);
        assert_eq!(record.thread_domain(&custom), vec![1, 64]);
        assert_eq!(record.max_seconds(&custom), Some(900.0));
    }

    #[test]
    fn test_empty_record_has_no_extent() {
        let record = TestRecord::new(Descriptor::raw("t"));
        let categories = CategoryTable::default();
        assert!(record.thread_domain(&categories).is_empty());
        assert_eq!(record.max_seconds(&categories), None);
        assert_eq!(record.min_positive_seconds(&categories), None);
    }

    #[test]
    fn test_record_set_json_shape() {
        let mut record = TestRecord::new(Descriptor::raw("raw line"));
        record
            .series
            .insert("LF-P-T".to_string(), vec![(8, 1.5)].into_iter().collect());
        let set = RecordSet::new(vec![record]);

        let json = set.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["records"][0]["descriptor"]["raw"], "raw line");
        assert_eq!(value["records"][0]["series"]["LF-P-T"]["8"], 1.5);

        let back: RecordSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
