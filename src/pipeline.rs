//! End-to-end run: read a log, parse it, render and store the charts

use crate::chart::{ArtifactKind, ChartConfig, ChartRenderer, RenderReport};
use crate::data::{CategoryTable, RecordSet};
use crate::error::Result;
use crate::parser::{ParseDiagnostics, TestRecordBuilder};
use crate::sink::{ArtifactNames, ChartSink, FileSink};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Settings for a plotting run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub chart: ChartConfig,
    pub categories: CategoryTable,
    /// Also store the parsed records as JSON
    pub write_records: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chart: ChartConfig::default(),
            categories: CategoryTable::default(),
            write_records: true,
        }
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Number of test records parsed
    pub records: usize,
    pub diagnostics: ParseDiagnostics,
    /// Every artifact written or skipped, records JSON included
    pub report: RenderReport,
}

impl RunSummary {
    /// Where the parsed records were stored, if they were
    pub fn records_path(&self) -> Option<&PathBuf> {
        self.report.path_of(&ArtifactKind::Records)
    }
}

/// Plot `input`, writing artifacts next to it
pub fn run(input: &Path, options: &RunOptions) -> Result<RunSummary> {
    let mut sink = FileSink::beside(input);
    run_with_sink(input, options, &mut sink)
}

/// Plot `input` into an arbitrary sink.
///
/// The whole log is parsed before anything is rendered. An unreadable input
/// fails before the sink is touched.
pub fn run_with_sink(
    input: &Path,
    options: &RunOptions,
    sink: &mut dyn ChartSink,
) -> Result<RunSummary> {
    info!("Parsing benchmark log {:?}", input);
    let builder = TestRecordBuilder::new(options.categories.clone())?;
    let outcome = builder.parse_file(input)?;

    info!("Parsed {} test records", outcome.records.len());
    if !outcome.diagnostics.is_clean() {
        debug!("Parse diagnostics: {:?}", outcome.diagnostics);
    }

    let names = ArtifactNames::from_input(input);
    let renderer = ChartRenderer::new(options.chart.clone(), options.categories.clone());
    let mut report = renderer.render_all(&outcome.records, &names, sink);

    let records = RecordSet::new(outcome.records);
    if options.write_records {
        match records.to_json() {
            Ok(json) => report.deliver(sink, ArtifactKind::Records, &names.records_json(), &json),
            Err(e) => {
                warn!("Failed to serialize parsed records: {}", e);
                report.skip(ArtifactKind::Records, &e);
            }
        }
    }

    Ok(RunSummary {
        records: records.len(),
        diagnostics: outcome.diagnostics,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sink::MemorySink;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const LOG: &str = "hello world
START_TEST
locked tests | seed: 42 | pools: 1 | 15+ / 5- / 10w / 70r
START_PART
STL-MTX
Threads: 1	Total Time: 40ms
Threads: 2	Total Time: 20ms
END_PART
START_PART
LF-P-1
Threads: 1	Total Time: 50ms
END_PART
END_TEST
START_TEST
lock_free tests | seed: 43 | pools: 2 | 25+ / 5- / 0w / 70r
END_TEST
";

    #[test]
    fn test_run_writes_artifacts_beside_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("results.txt");
        fs::write(&input, LOG).unwrap();

        let summary = run(&input, &RunOptions::default()).unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.diagnostics.unrecognized_lines, 1);

        let written: Vec<PathBuf> = summary
            .report
            .written
            .iter()
            .map(|a| a.path.clone())
            .collect();
        assert_eq!(
            written,
            vec![
                dir.path().join("results_mega_page.svg"),
                dir.path().join("results_test1.svg"),
                dir.path().join("results_records.json"),
            ]
        );
        assert_eq!(summary.report.skipped.len(), 1);
        assert_eq!(summary.report.skipped[0].kind, ArtifactKind::Record(2));
        assert!(!dir.path().join("results_test2.svg").exists());

        let svg = fs::read_to_string(dir.path().join("results_test1.svg")).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("STL-MTX"));

        let records_path = summary.records_path().unwrap();
        let records = RecordSet::load_from_file(records_path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.records[0].series("STL-MTX").unwrap().get(2), Some(0.02));
    }

    #[test]
    fn test_run_missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut sink = MemorySink::new();

        let result = run_with_sink(
            &dir.path().join("absent.log"),
            &RunOptions::default(),
            &mut sink,
        );

        assert!(matches!(result, Err(Error::FileReadError { .. })));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_run_without_records_writes_no_charts() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("noise.log");
        fs::write(&input, "starting cancel\nsim done...\n").unwrap();
        let mut sink = MemorySink::new();

        let summary = run_with_sink(&input, &RunOptions::default(), &mut sink).unwrap();

        assert_eq!(summary.records, 0);
        let kinds: Vec<&ArtifactKind> = summary.report.written.iter().map(|a| &a.kind).collect();
        assert_eq!(kinds, vec![&ArtifactKind::Records]);
        assert_eq!(sink.names(), vec!["noise_records.json"]);
    }

    #[test]
    fn test_run_can_skip_records_json() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("run.log");
        fs::write(&input, LOG).unwrap();
        let mut sink = MemorySink::new();

        let options = RunOptions {
            write_records: false,
            ..Default::default()
        };
        let summary = run_with_sink(&input, &options, &mut sink).unwrap();

        assert_eq!(summary.records_path(), None);
        assert_eq!(sink.names(), vec!["run_mega_page.svg", "run_test1.svg"]);
    }

    /// Accepts charts but rejects the records JSON
    struct NoJsonSink {
        charts: MemorySink,
    }

    impl ChartSink for NoJsonSink {
        fn write_artifact(&mut self, name: &str, contents: &str) -> Result<PathBuf> {
            if name.ends_with(".json") {
                return Err(Error::FileWriteError {
                    path: name.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.charts.write_artifact(name, contents)
        }
    }

    #[test]
    fn test_records_json_failure_keeps_charts() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("run.log");
        fs::write(&input, LOG).unwrap();
        let mut sink = NoJsonSink {
            charts: MemorySink::new(),
        };

        let summary = run_with_sink(&input, &RunOptions::default(), &mut sink).unwrap();

        assert_eq!(sink.charts.names(), vec!["run_mega_page.svg", "run_test1.svg"]);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.records_path(), None);

        let skipped: Vec<&ArtifactKind> = summary.report.skipped.iter().map(|s| &s.kind).collect();
        assert_eq!(skipped, vec![&ArtifactKind::Record(2), &ArtifactKind::Records]);
        assert!(summary.report.skipped[1].reason.contains("run_records.json"));
    }
}
