//! Chunked CSV reading with configurable encoding and decimal separator.
//!
//! Records are read as raw bytes and each field is decoded with the
//! configured [`encoding_rs`] encoding, so only ASCII-compatible encodings
//! are accepted. Rows are yielded in chunks to bound memory.

use std::io::Read;

use csv::{ByteRecord, Reader, ReaderBuilder};
use encoding_rs::Encoding;
use thiserror::Error;
use wbk_core::{ConfigError, CsvDialect};

use crate::Row;

/// Rows per chunk when the configuration does not say otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Errors raised while reading CSV input.
#[derive(Debug, Error)]
pub enum CsvError {
    /// The dialect cannot be used.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The header row could not be read.
    #[error("failed to read CSV header")]
    Header {
        /// Parser error.
        #[source]
        source: csv::Error,
    },
    /// A record could not be read.
    #[error("failed to read CSV record at data line {line}")]
    Read {
        /// 1-based data line.
        line: usize,
        /// Parser error.
        #[source]
        source: csv::Error,
    },
    /// A field held bytes that are invalid in the configured encoding.
    #[error("field '{column}' at data line {line} is not valid {encoding}")]
    Decode {
        /// 1-based data line; 0 for the header.
        line: usize,
        /// Column of the field.
        column: String,
        /// Encoding name.
        encoding: &'static str,
    },
}

/// Iterator over chunks of decoded rows.
pub struct CsvChunks<R> {
    reader: Reader<R>,
    headers: Vec<String>,
    encoding: &'static Encoding,
    decimal_separator: char,
    chunk_size: usize,
    line: usize,
    finished: bool,
}

impl<R: Read> CsvChunks<R> {
    /// Read the header of `source` and prepare to yield rows.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn new(source: R, dialect: &CsvDialect, chunk_size: usize) -> Result<Self, CsvError> {
        let encoding = encoding_for(&dialect.encoding)?;
        let delimiter = u8::try_from(dialect.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConfigError::UnsupportedDelimiter {
                delimiter: dialect.delimiter,
            })?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(source);
        let raw_headers = reader
            .byte_headers()
            .map_err(|source| CsvError::Header { source })?
            .clone();
        let mut headers = Vec::with_capacity(raw_headers.len());
        for (index, field) in raw_headers.iter().enumerate() {
            let name = decode_field(encoding, field).ok_or_else(|| CsvError::Decode {
                line: 0,
                column: format!("#{}", index + 1),
                encoding: encoding.name(),
            })?;
            let name = if index == 0 {
                name.trim_start_matches('\u{feff}').to_owned()
            } else {
                name
            };
            headers.push(name.trim().to_owned());
        }

        Ok(Self {
            reader,
            headers,
            encoding,
            decimal_separator: dialect.decimal_separator,
            chunk_size: chunk_size.max(1),
            line: 0,
            finished: false,
        })
    }

    /// Column names from the header row.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn read_row(&mut self, record: &mut ByteRecord) -> Result<Option<Row>, CsvError> {
        let line = self.line + 1;
        let more = self
            .reader
            .read_byte_record(record)
            .map_err(|source| CsvError::Read { line, source })?;
        if !more {
            return Ok(None);
        }
        self.line = line;

        let mut cells = Vec::with_capacity(self.headers.len());
        for (column, field) in self.headers.iter().zip(record.iter()) {
            let value = decode_field(self.encoding, field).ok_or_else(|| CsvError::Decode {
                line,
                column: column.clone(),
                encoding: self.encoding.name(),
            })?;
            let value = rewrite_decimal(value.trim(), self.decimal_separator)
                .unwrap_or_else(|| value.trim().to_owned());
            cells.push((column.clone(), value));
        }
        Ok(Some(Row::new(line, cells)))
    }
}

impl<R: Read> Iterator for CsvChunks<R> {
    type Item = Result<Vec<Row>, CsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut record = ByteRecord::new();
        let mut rows = Vec::with_capacity(self.chunk_size);
        while rows.len() < self.chunk_size {
            match self.read_row(&mut record) {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {
                    self.finished = true;
                    break;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
        (!rows.is_empty()).then_some(Ok(rows))
    }
}

fn encoding_for(label: &str) -> Result<&'static Encoding, ConfigError> {
    Encoding::for_label(label.trim().as_bytes())
        .filter(|encoding| encoding.is_ascii_compatible())
        .ok_or_else(|| ConfigError::UnsupportedEncoding {
            label: label.to_owned(),
        })
}

fn decode_field(encoding: &'static Encoding, field: &[u8]) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(field);
    (!had_errors).then(|| text.into_owned())
}

/// Rewrite a plain decimal number written with `separator` to use `.`.
///
/// Returns `None` when the separator is already `.` or the cell is not a
/// plain signed decimal such as `-12,5`.
fn rewrite_decimal(cell: &str, separator: char) -> Option<String> {
    if separator == '.' {
        return None;
    }
    let unsigned = cell.strip_prefix(['+', '-']).unwrap_or(cell);
    let (integral, fractional) = unsigned.split_once(separator)?;
    let digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    (digits(integral) && digits(fractional)).then(|| cell.replacen(separator, ".", 1))
}
