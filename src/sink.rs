//! Destinations for rendered chart artifacts

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Receives finished artifacts one at a time.
///
/// Each call owns the underlying resource only for its own duration, so a
/// failed write never leaves a handle open for the next artifact.
pub trait ChartSink {
    /// Store `contents` under `name` and report where it ended up
    fn write_artifact(&mut self, name: &str, contents: &str) -> Result<PathBuf>;
}

/// Writes artifacts into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink writing next to the given input file
    pub fn beside(input: &Path) -> Self {
        match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::new(parent),
            _ => Self::new("."),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChartSink for FileSink {
    fn write_artifact(&mut self, name: &str, contents: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::FileWriteError {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let path = self.dir.join(name);
        let write_err = |e| Error::FileWriteError {
            path: path.display().to_string(),
            source: e,
        };

        let file = File::create(&path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(contents.as_bytes()).map_err(write_err)?;
        writer.flush().map_err(write_err)?;

        Ok(path)
    }
}

/// Keeps artifacts in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Vec<(String, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    /// Artifact names in write order
    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ChartSink for MemorySink {
    fn write_artifact(&mut self, name: &str, contents: &str) -> Result<PathBuf> {
        self.artifacts.push((name.to_string(), contents.to_string()));
        Ok(PathBuf::from(name))
    }
}

/// Deterministic artifact names derived from the input file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    stem: String,
}

impl ArtifactNames {
    pub fn new(stem: impl Into<String>) -> Self {
        Self { stem: stem.into() }
    }

    /// `results/run.log` gives the stem `run`
    pub fn from_input(input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "bench".to_string());
        Self::new(stem)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Chart for the record at 1-based `index`
    pub fn record(&self, index: usize) -> String {
        format!("{}_test{}.svg", self.stem, index)
    }

    pub fn composite(&self) -> String {
        format!("{}_mega_page.svg", self.stem)
    }

    pub fn records_json(&self) -> String {
        format!("{}_records.json", self.stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_names_from_input() {
        let names = ArtifactNames::from_input(Path::new("logs/run.2024.txt"));
        assert_eq!(names.stem(), "run.2024");
        assert_eq!(names.record(3), "run.2024_test3.svg");
        assert_eq!(names.composite(), "run.2024_mega_page.svg");
        assert_eq!(names.records_json(), "run.2024_records.json");

        assert_eq!(ArtifactNames::from_input(Path::new("bench")).stem(), "bench");
        assert_eq!(ArtifactNames::from_input(Path::new("/")).stem(), "bench");
    }

    #[test]
    fn test_file_sink_writes_beside_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("out.log");

        let mut sink = FileSink::beside(&input);
        assert_eq!(sink.dir(), dir.path());

        let path = sink.write_artifact("a.svg", "<svg/>").unwrap();
        assert_eq!(path, dir.path().join("a.svg"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<svg/>");
    }

    #[test]
    fn test_file_sink_relative_input_uses_current_dir() {
        let sink = FileSink::beside(Path::new("run.log"));
        assert_eq!(sink.dir(), Path::new("."));
    }

    #[test]
    fn test_file_sink_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::new(dir.path().join("nested/charts"));

        let path = sink.write_artifact("b.svg", "x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_sink_reports_write_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a dir").unwrap();

        let mut sink = FileSink::new(&blocker);
        let result = sink.write_artifact("c.svg", "x");
        assert!(matches!(result, Err(Error::FileWriteError { .. })));
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.write_artifact("one", "1").unwrap();
        sink.write_artifact("two", "2").unwrap();

        assert_eq!(sink.names(), vec!["one", "two"]);
        assert_eq!(sink.get("two"), Some("2"));
        assert_eq!(sink.len(), 2);
    }
}
