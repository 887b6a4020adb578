//! Batch reader over a delimited mandate extract.
//!
//! Records are pulled lazily from the underlying reader, so only the batch
//! currently being reconciled is resident regardless of file size.

use crate::config::ReconcileConfig;
use crate::error::{EngineError, ParseError, Result};
use crate::mandate::MandateRecord;
use crate::parser::{parse_fields, validate_header};
use csv::{ErrorKind, ReaderBuilder, StringRecord, Trim};
use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Forward-only reader that yields batches of successfully parsed records.
///
/// Malformed lines are logged at warn level, counted, and skipped; they never
/// shorten a batch unless the input is exhausted. Once [`next_batch`]
/// returns an empty batch the reader is finished.
///
/// [`next_batch`]: BatchReader::next_batch
pub struct BatchReader<R: Read> {
    csv_reader: csv::Reader<R>,
    record: StringRecord,
    batch_size: usize,
    parse_errors: u64,
    exhausted: bool,
}

impl BatchReader<BufReader<File>> {
    /// Opens a file and validates its header.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &ReconcileConfig) -> Result<Self> {
        let file = File::open(path)?;
        BatchReader::new(BufReader::new(file), config)
    }
}

impl<R: Read> BatchReader<R> {
    /// Wraps a reader, consuming and validating the header line.
    pub fn new(reader: R, config: &ReconcileConfig) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(true)
            .quoting(false)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let header = csv_reader.headers()?.clone();
        if header.is_empty() {
            return Err(EngineError::MissingHeader);
        }
        info!("Read {} columns from header", header.len());

        let columns: Vec<&str> = header.iter().collect();
        validate_header(&columns, config.validate_header_names)?;

        Ok(BatchReader {
            csv_reader,
            record: StringRecord::new(),
            batch_size: config.batch_size,
            parse_errors: 0,
            exhausted: false,
        })
    }

    /// Reads up to `n` successfully parsed records.
    ///
    /// An empty batch means end of input.
    pub fn next_batch(&mut self, n: usize) -> Result<Vec<MandateRecord>> {
        let mut batch = Vec::with_capacity(n);

        while batch.len() < n && !self.exhausted {
            match self.read_one()? {
                Some(Ok(record)) => batch.push(record),
                Some(Err(e)) => {
                    self.parse_errors += 1;
                    warn!("Skipping {}", e);
                }
                None => self.exhausted = true,
            }
        }

        Ok(batch)
    }

    /// Number of malformed lines skipped so far.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    /// Reads the next non-blank line.
    ///
    /// Outer error: the input itself failed. Inner error: this line is bad.
    fn read_one(&mut self) -> Result<Option<std::result::Result<MandateRecord, ParseError>>> {
        loop {
            match self.csv_reader.read_record(&mut self.record) {
                Ok(false) => return Ok(None),
                // csv only drops truly empty lines; whitespace-only ones trim to one empty field.
                Ok(true) if is_blank(&self.record) => continue,
                Ok(true) => {
                    let line = self.record.position().map_or(0, |p| p.line());
                    let fields: Vec<&str> = self.record.iter().collect();
                    return Ok(Some(parse_fields(&fields, line)));
                }
                Err(e) => {
                    if let ErrorKind::Utf8 { pos, .. } = e.kind() {
                        let line = pos.as_ref().map_or(0, |p| p.line());
                        return Ok(Some(Err(ParseError::InvalidUtf8 { line })));
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).map_or(true, |f| f.trim().is_empty())
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = Result<Vec<MandateRecord>>;

    /// Yields non-empty batches of the configured size until input is exhausted.
    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = self.batch_size;
        match self.next_batch(batch_size) {
            Ok(batch) if batch.is_empty() => None,
            other => Some(other),
        }
    }
}
