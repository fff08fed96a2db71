//! Parser for concurrency benchmark logs
//!
//! Log format:
//! ```text
//! START_TEST
//! locked tests | seed: 42 | pools: 1 | 15+ / 5- / 10w / 70r
//! START_PART
//! STL-MTX
//! Threads: 1	Total Time: 40ms
//! Threads: 2	Total Time: 20ms
//! END_PART
//! END_TEST
//! ```
//!
//! Parsing is tolerant: lines that match no marker or sample pattern are
//! skipped and only counted in [`ParseDiagnostics`].

use crate::data::{CategoryTable, Descriptor, OperationMix, Series, TestRecord};
use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const START_TEST: &str = "START_TEST";
pub const END_TEST: &str = "END_TEST";
pub const START_PART: &str = "START_PART";
pub const END_PART: &str = "END_PART";

const SAMPLE_PREFIX: &str = "Threads:";

/// Classification of a single trimmed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    StartTest,
    EndTest,
    StartPart,
    EndPart,
    /// `Threads: <n> ... Total Time: <ms>ms`
    Sample { threads: u32, millis: u64 },
    /// Starts like a sample but does not parse as one
    MalformedSample,
    Blank,
    Text(&'a str),
}

/// Read position over the trimmed lines of a log
#[derive(Debug)]
pub struct LineCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().map(str::trim).collect(),
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    pub fn next_line(&mut self) -> Option<&'a str> {
        let line = self.peek()?;
        self.pos += 1;
        Some(line)
    }

    /// 1-based number of the line most recently returned
    pub fn line_number(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.lines.len()
    }
}

/// Classifies lines into structural markers and samples
pub struct LogTokenizer {
    sample_regex: Regex,
}

impl LogTokenizer {
    pub fn new() -> Result<Self> {
        // Threads: 1	Total Time: 40ms
        let sample_regex = Regex::new(r"^Threads:\s*(\d+)\s*Total Time:\s*(\d+)ms")?;
        Ok(Self { sample_regex })
    }

    pub fn classify<'a>(&self, line: &'a str) -> Token<'a> {
        match line {
            "" => Token::Blank,
            START_TEST => Token::StartTest,
            END_TEST => Token::EndTest,
            START_PART => Token::StartPart,
            END_PART => Token::EndPart,
            _ => {
                if let Some(sample) = self.parse_sample(line) {
                    sample
                } else if line.starts_with(SAMPLE_PREFIX) {
                    Token::MalformedSample
                } else {
                    Token::Text(line)
                }
            }
        }
    }

    fn parse_sample(&self, line: &str) -> Option<Token<'static>> {
        let captures = self.sample_regex.captures(line)?;

        let threads: u32 = captures.get(1)?.as_str().parse().ok()?;
        let millis: u64 = captures.get(2)?.as_str().parse().ok()?;
        if threads == 0 {
            return None;
        }

        Some(Token::Sample { threads, millis })
    }
}

/// Extracts seed, pool count and operation mix from a descriptor line
pub struct DescriptorParser {
    seed_regex: Regex,
    pools_regex: Regex,
    mix_regex: Regex,
}

impl DescriptorParser {
    pub fn new() -> Result<Self> {
        let seed_regex = Regex::new(r"seed:\s*(\d+)")?;
        let pools_regex = Regex::new(r"pools:\s*(\d+)")?;
        // 15+ / 5- / 10w / 70r
        let mix_regex =
            Regex::new(r"(\d+)\s*\+\s*/\s*(\d+)\s*-\s*/\s*(\d+)\s*w\s*/\s*(\d+)\s*r")?;

        Ok(Self {
            seed_regex,
            pools_regex,
            mix_regex,
        })
    }

    pub fn parse(&self, line: &str) -> Descriptor {
        let mut descriptor = Descriptor::raw(line);

        descriptor.seed = self.capture_number(&self.seed_regex, line);
        descriptor.pools = self.capture_number(&self.pools_regex, line);
        descriptor.mix = self.parse_mix(line);

        if let Some((head, _)) = line.split_once('|') {
            let head = head.trim();
            if !head.is_empty() {
                descriptor.label = Some(head.to_string());
            }
        }

        if let Some((_, tail)) = line.rsplit_once('|') {
            let tail = tail.trim();
            if !tail.is_empty() && !self.seed_regex.is_match(tail) {
                descriptor.params = Some(tail.to_string());
            }
        }

        descriptor
    }

    fn capture_number<T: std::str::FromStr>(&self, regex: &Regex, line: &str) -> Option<T> {
        regex.captures(line)?.get(1)?.as_str().parse().ok()
    }

    fn parse_mix(&self, line: &str) -> Option<OperationMix> {
        let captures = self.mix_regex.captures(line)?;
        let field = |i: usize| -> Option<u32> { captures.get(i)?.as_str().parse().ok() };

        Some(OperationMix {
            push: field(1)?,
            pop: field(2)?,
            write: field(3)?,
            read: field(4)?,
        })
    }
}

/// Counters for everything the parser skipped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseDiagnostics {
    /// Non-blank lines that matched no marker or sample pattern
    pub unrecognized_lines: usize,
    /// Lines starting with `Threads:` that did not parse
    pub malformed_samples: usize,
    /// Markers seen in a state where they mean nothing
    pub misplaced_markers: usize,
    /// Part blocks whose category line was missing or not in the table
    pub unknown_categories: usize,
    /// Valid samples dropped because no known category was open
    pub discarded_samples: usize,
    /// Samples repeating a thread count within one part
    pub duplicate_samples: usize,
    /// Test blocks closed without a descriptor line
    pub untitled_tests: usize,
    /// Test blocks never closed by `END_TEST`
    pub abandoned_tests: usize,
}

impl ParseDiagnostics {
    /// Number of lines that contributed nothing to the output
    pub fn skipped_lines(&self) -> usize {
        self.unrecognized_lines
            + self.malformed_samples
            + self.misplaced_markers
            + self.discarded_samples
    }

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Records parsed from one log and what was skipped on the way
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub records: Vec<TestRecord>,
    pub diagnostics: ParseDiagnostics,
}

/// Test block under construction
#[derive(Debug)]
struct TestDraft {
    descriptor: Option<Descriptor>,
    series: BTreeMap<String, Series>,
}

impl TestDraft {
    fn close_part(&mut self, part: PartDraft) {
        if let Some(category) = part.category {
            self.series.insert(category, part.series);
        }
    }
}

/// Part block under construction. `category` is `None` for unknown names.
#[derive(Debug)]
struct PartDraft {
    category: Option<String>,
    series: Series,
}

#[derive(Debug)]
enum State {
    OutsideTest,
    InTest(TestDraft),
    InPart(TestDraft, PartDraft),
}

struct ParseContext<'a> {
    cursor: LineCursor<'a>,
    records: Vec<TestRecord>,
    diagnostics: ParseDiagnostics,
}

/// Assembles [`TestRecord`]s from a tokenized log
pub struct TestRecordBuilder {
    tokenizer: LogTokenizer,
    descriptors: DescriptorParser,
    categories: CategoryTable,
}

impl TestRecordBuilder {
    pub fn new(categories: CategoryTable) -> Result<Self> {
        Ok(Self {
            tokenizer: LogTokenizer::new()?,
            descriptors: DescriptorParser::new()?,
            categories,
        })
    }

    /// Read and parse a log file. An unreadable file is the only fatal case.
    pub fn parse_file(&self, path: &Path) -> Result<ParseOutcome> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(self.parse(&content))
    }

    /// Parse a whole log
    pub fn parse(&self, input: &str) -> ParseOutcome {
        let mut ctx = ParseContext {
            cursor: LineCursor::new(input),
            records: Vec::new(),
            diagnostics: ParseDiagnostics::default(),
        };

        let mut state = State::OutsideTest;
        while let Some(line) = ctx.cursor.next_line() {
            let token = self.tokenizer.classify(line);
            state = self.step(state, token, &mut ctx);
        }

        if !matches!(state, State::OutsideTest) {
            debug!("Input ended inside a test block, discarding it");
            ctx.diagnostics.abandoned_tests += 1;
        }

        ParseOutcome {
            records: ctx.records,
            diagnostics: ctx.diagnostics,
        }
    }

    fn step(&self, state: State, token: Token<'_>, ctx: &mut ParseContext<'_>) -> State {
        match (state, token) {
            (State::OutsideTest, Token::StartTest) => State::InTest(self.open_test(ctx)),
            (State::InTest(_) | State::InPart(..), Token::StartTest) => {
                debug!(
                    "Line {}: {} inside an open test, discarding the open test",
                    ctx.cursor.line_number(),
                    START_TEST
                );
                ctx.diagnostics.abandoned_tests += 1;
                State::InTest(self.open_test(ctx))
            }

            (State::InTest(draft), Token::StartPart) => State::InPart(draft, self.open_part(ctx)),
            (State::InPart(mut draft, part), Token::StartPart) => {
                draft.close_part(part);
                State::InPart(draft, self.open_part(ctx))
            }

            (State::InPart(draft, mut part), Token::Sample { threads, millis }) => {
                match part.category {
                    Some(_) => {
                        if part.series.record(threads, millis as f64 / 1000.0) {
                            ctx.diagnostics.duplicate_samples += 1;
                        }
                    }
                    None => ctx.diagnostics.discarded_samples += 1,
                }
                State::InPart(draft, part)
            }

            (State::InPart(mut draft, part), Token::EndPart) => {
                draft.close_part(part);
                State::InTest(draft)
            }
            (State::InPart(mut draft, part), Token::EndTest) => {
                draft.close_part(part);
                self.close_test(draft, ctx);
                State::OutsideTest
            }
            (State::InTest(draft), Token::EndTest) => {
                self.close_test(draft, ctx);
                State::OutsideTest
            }

            (state, Token::StartPart | Token::EndPart | Token::EndTest) => {
                debug!("Line {}: misplaced marker", ctx.cursor.line_number());
                ctx.diagnostics.misplaced_markers += 1;
                state
            }
            (state, Token::Sample { .. }) => {
                ctx.diagnostics.discarded_samples += 1;
                state
            }
            (state, Token::MalformedSample) => {
                debug!("Line {}: malformed sample line", ctx.cursor.line_number());
                ctx.diagnostics.malformed_samples += 1;
                state
            }
            (state, Token::Text(_)) => {
                ctx.diagnostics.unrecognized_lines += 1;
                state
            }
            (state, Token::Blank) => state,
        }
    }

    /// Take the descriptor line following `START_TEST`, if there is one
    fn open_test(&self, ctx: &mut ParseContext<'_>) -> TestDraft {
        let descriptor = self
            .take_text_line(&mut ctx.cursor)
            .map(|line| self.descriptors.parse(line));

        TestDraft {
            descriptor,
            series: BTreeMap::new(),
        }
    }

    /// Take the category line following `START_PART`
    fn open_part(&self, ctx: &mut ParseContext<'_>) -> PartDraft {
        let category = match self.take_text_line(&mut ctx.cursor) {
            Some(name) if self.categories.contains(name) => Some(name.to_string()),
            Some(name) => {
                debug!(
                    "Line {}: ignoring unknown category '{}'",
                    ctx.cursor.line_number(),
                    name
                );
                ctx.diagnostics.unknown_categories += 1;
                None
            }
            None => {
                debug!(
                    "Line {}: {} without a category line",
                    ctx.cursor.line_number(),
                    START_PART
                );
                ctx.diagnostics.unknown_categories += 1;
                None
            }
        };

        PartDraft {
            category,
            series: Series::new(),
        }
    }

    fn close_test(&self, draft: TestDraft, ctx: &mut ParseContext<'_>) {
        match draft.descriptor {
            Some(descriptor) => {
                let mut record = TestRecord::new(descriptor);
                record.series = draft.series;
                ctx.records.push(record);
            }
            None => {
                debug!(
                    "Line {}: dropping test without descriptor line",
                    ctx.cursor.line_number()
                );
                ctx.diagnostics.untitled_tests += 1;
            }
        }
    }

    /// Consume the next line only if it is plain text
    fn take_text_line<'a>(&self, cursor: &mut LineCursor<'a>) -> Option<&'a str> {
        let line = cursor.peek()?;
        match self.tokenizer.classify(line) {
            Token::Text(text) => {
                cursor.next_line();
                Some(text)
            }
            _ => None,
        }
    }
}

/// Parse a benchmark log from a file with the default category table
pub fn parse_from_file(path: &Path) -> Result<ParseOutcome> {
    TestRecordBuilder::new(CategoryTable::default())?.parse_file(path)
}

/// Parse a benchmark log from a string with the default category table
pub fn parse_from_string(input: &str) -> Result<ParseOutcome> {
    let builder = TestRecordBuilder::new(CategoryTable::default())?;
    Ok(builder.parse(input))
}
