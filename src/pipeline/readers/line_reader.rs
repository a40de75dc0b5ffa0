// src/pipeline/readers/line_reader.rs

use std::borrow::Cow;
use std::io::BufRead;

use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::data_model::{Command, WorkItem};
use crate::error::Result;
use crate::pipeline::readers::BaseReader;

static COORDINATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d+(\.\d+)?$").expect("coordinate regex is valid"));

const UTF8_BOM: char = '\u{feff}';

/// Column selection for a `LineReader`.
#[derive(Debug, Clone, PartialEq)]
pub struct LineReaderConfig {
    pub command: Command,
    /// 1-based column indices. Empty selects the whole row.
    pub input_columns: Vec<usize>,
}

impl LineReaderConfig {
    pub fn new(command: Command) -> Self {
        LineReaderConfig {
            command,
            input_columns: default_input_columns(command),
        }
    }

    pub fn with_columns(command: Command, input_columns: Vec<usize>) -> Self {
        LineReaderConfig {
            command,
            input_columns,
        }
    }
}

pub fn default_input_columns(command: Command) -> Vec<usize> {
    match command {
        Command::Forward => vec![1],
        Command::Reverse => vec![1, 2],
    }
}

/// Turns comma-delimited input lines into `WorkItem`s, one per line.
///
/// Each line is parsed on its own so that blank lines keep their row position.
pub struct LineReader<R: BufRead> {
    input: R,
    config: LineReaderConfig,
    next_row_id: u64,
    started: bool,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(input: R, config: LineReaderConfig) -> Self {
        LineReader {
            input,
            config,
            next_row_id: 1,
            started: false,
            buf: Vec::new(),
        }
    }

    /// Row id the next item will get.
    pub fn next_row_id(&self) -> u64 {
        self.next_row_id
    }

    /// Next line without its terminator. The flag is set when undecodable
    /// bytes were replaced with U+FFFD.
    fn read_line(&mut self) -> Result<Option<(String, bool)>> {
        self.buf.clear();
        if self.input.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let decoded = String::from_utf8_lossy(&self.buf);
        let lossy = matches!(decoded, Cow::Owned(_));
        let mut line = decoded.trim_end_matches(['\n', '\r']);
        if !self.started {
            self.started = true;
            line = line.trim_start_matches(UTF8_BOM);
        }
        Ok(Some((line.to_string(), lossy)))
    }

    fn build_item(&self, row_id: u64, line: &str, lossy: bool) -> Result<WorkItem> {
        let mut warnings = Vec::new();
        if lossy {
            warnings.push("Invalid UTF-8, undecodable bytes were replaced".to_string());
        }

        let fields = if line.is_empty() {
            warnings.push("Empty line".to_string());
            vec![String::new()]
        } else {
            parse_fields(line)?
        };

        let selected = self.select_columns(&fields, &mut warnings);
        let query = match self.config.command {
            Command::Forward => selected.join(","),
            Command::Reverse => reverse_query(&selected, &mut warnings),
        };

        Ok(WorkItem {
            row_id,
            query,
            original_fields: fields,
            warnings,
        })
    }

    fn select_columns(&self, fields: &[String], warnings: &mut Vec<String>) -> Vec<String> {
        if self.config.input_columns.is_empty() {
            return fields.to_vec();
        }

        let mut selected = Vec::with_capacity(self.config.input_columns.len());
        for &column in &self.config.input_columns {
            match column.checked_sub(1).and_then(|idx| fields.get(idx)) {
                Some(value) => selected.push(value.clone()),
                None => {
                    warnings.push(format!("Missing input column {} in {:?}", column, fields));
                    break;
                }
            }
        }
        selected
    }
}

impl<R: BufRead> BaseReader for LineReader<R> {
    fn read_header(&mut self) -> Result<Option<Vec<String>>> {
        match self.read_line()? {
            Some((line, _)) if line.is_empty() => Ok(Some(vec![String::new()])),
            Some((line, _)) => parse_fields(&line).map(Some),
            None => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<WorkItem>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, lossy) = match self.read_line() {
            Ok(Some(read)) => read,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        Some(self.build_item(row_id, &line, lossy))
    }
}

fn parse_fields(line: &str) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(record.iter().map(str::to_string).collect())
    } else {
        Ok(vec![String::new()])
    }
}

fn reverse_query(selected: &[String], warnings: &mut Vec<String>) -> String {
    if selected.len() != 2 {
        warnings.push(format!(
            "Expected two comma-separated values for reverse geocoding, got {:?}",
            selected
        ));
        return String::new();
    }

    let (lat, lng) = (&selected[0], &selected[1]);
    if !COORDINATE_RE.is_match(lat) || !COORDINATE_RE.is_match(lng) {
        warnings.push(format!(
            "Does not look like latitude and longitude: '{}' and '{}'",
            lat, lng
        ));
        return String::new();
    }

    format!("{},{}", lat, lng)
}
