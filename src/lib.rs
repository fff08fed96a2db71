//! bench-plot - Charts for concurrency benchmark logs
//!
//! Reads the line-oriented log written by the lock/lock-free container
//! benchmark harness and turns each test block into a log-scale comparison
//! chart of total run time per thread count.
//!
//! # Features
//!
//! - Tolerant parsing of `START_TEST` / `START_PART` blocks with diagnostics
//! - One SVG chart per test plus a composite page stacking all of them
//! - Parsed records exported as JSON
//!
//! # Example
//!
//! ```no_run
//! use bench_plot::{chart, parser, sink};
//!
//! let outcome = parser::parse_from_file("bench.log".as_ref()).unwrap();
//! let renderer = chart::ChartRenderer::new(Default::default(), Default::default());
//!
//! let mut out = sink::FileSink::new("charts");
//! let names = sink::ArtifactNames::new("bench");
//! let report = renderer.render_all(&outcome.records, &names, &mut out);
//! println!("{} charts written", report.written.len());
//! ```

pub mod chart;
pub mod data;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod sink;

pub use chart::{ChartConfig, ChartRenderer, RenderReport};
pub use data::{CategorySpec, CategoryTable, Descriptor, RecordSet, Series, TestRecord};
pub use error::{Error, Result};
pub use parser::{parse_from_file, parse_from_string, ParseDiagnostics, TestRecordBuilder};
pub use pipeline::{run, RunOptions, RunSummary};
