// 🏗️ CSV Parser - streaming extract reader
// Reads one `;`-delimited row at a time, decodes fields, and coerces
// day/month/year dates and comma-decimal amounts

use crate::config::{EtlConfig, InputEncoding};
use crate::entities::Entity;
use crate::error::{EtlError, Result};
use crate::normalizer::FieldMap;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Bytes inspected when sniffing the encoding
pub const SNIFF_LEN: u64 = 8 * 1024;

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

// ============================================================================
// RAW RECORD
// ============================================================================

/// One decoded CSV row keyed by header name
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line in the source file (header is line 1)
    pub line: u64,
    fields: FieldMap,
}

impl RawRecord {
    pub fn new(line: u64, fields: FieldMap) -> Self {
        RawRecord { line, fields }
    }

    /// Build from header/value pairs (mostly for tests)
    pub fn from_pairs(line: u64, pairs: &[(&str, &str)]) -> Self {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawRecord { line, fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Value of a required column, or `SchemaMismatch`
    pub fn require(&self, entity: Entity, column: &str) -> Result<&str> {
        self.get(column).ok_or_else(|| EtlError::SchemaMismatch {
            entity,
            column: column.to_string(),
        })
    }

    /// Fail on the first required column that is absent
    pub fn require_all(&self, entity: Entity, columns: &[&str]) -> Result<()> {
        for column in columns {
            self.require(entity, column)?;
        }
        Ok(())
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Pick a decoder for a file, sniffing its first bytes when asked to
pub fn resolve_encoding(path: &Path, encoding: InputEncoding) -> Result<&'static Encoding> {
    match encoding {
        InputEncoding::Latin1 => Ok(WINDOWS_1252),
        InputEncoding::Utf8 => Ok(UTF_8),
        InputEncoding::Auto => {
            let file = File::open(path).map_err(|source| EtlError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            let mut head = Vec::new();
            file.take(SNIFF_LEN)
                .read_to_end(&mut head)
                .map_err(|source| EtlError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

            detect_encoding(&head)
        }
    }
}

/// BOM first, then UTF-8 validity, else the single-byte fallback.
/// UTF-16 input is rejected: the `;` delimiter scan is byte based.
pub fn detect_encoding(head: &[u8]) -> Result<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(head) {
        if encoding == UTF_8 {
            return Ok(UTF_8);
        }
        return Err(EtlError::Configuration(format!(
            "unsupported input encoding {}",
            encoding.name()
        )));
    }

    match std::str::from_utf8(head) {
        Ok(_) => Ok(UTF_8),
        // a multi-byte char cut at the sniff boundary is still UTF-8
        Err(e) if e.error_len().is_none() => Ok(UTF_8),
        Err(_) => Ok(WINDOWS_1252),
    }
}

fn decode_field(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    if encoding == UTF_8 {
        return encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|s| s.into_owned())
            .ok_or_else(|| EtlError::MalformedInput {
                value: String::from_utf8_lossy(bytes).into_owned(),
                reason: "invalid utf-8".to_string(),
            });
    }

    let (text, _) = encoding.decode_without_bom_handling(bytes);
    Ok(text.into_owned())
}

// ============================================================================
// CSV SOURCE
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub encoding: InputEncoding,
}

impl ReadOptions {
    pub fn from_config(config: &EtlConfig) -> Self {
        ReadOptions {
            delimiter: config.delimiter_byte(),
            encoding: config.encoding,
        }
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            delimiter: b';',
            encoding: InputEncoding::Latin1,
        }
    }
}

/// Streams `RawRecord`s out of one extract without buffering the file
pub struct CsvSource<R: Read> {
    entity: Entity,
    path: PathBuf,
    reader: csv::Reader<R>,
    headers: Vec<String>,
    encoding: &'static Encoding,
    record: ByteRecord,
}

impl CsvSource<File> {
    pub fn open(path: &Path, entity: Entity, options: ReadOptions) -> Result<Self> {
        let encoding = resolve_encoding(path, options.encoding)?;
        let file = File::open(path).map_err(|source| EtlError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        CsvSource::from_reader(file, path, entity, options.delimiter, encoding)
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(
        reader: R,
        path: &Path,
        entity: Entity,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            // short rows surface as per-row schema mismatches
            .flexible(true)
            .from_reader(reader);

        let raw_headers = reader
            .byte_headers()
            .map_err(|source| EtlError::Csv {
                path: path.to_path_buf(),
                source,
            })?
            .clone();

        let mut headers = Vec::with_capacity(raw_headers.len());
        for (i, field) in raw_headers.iter().enumerate() {
            let mut name = decode_field(encoding, field)?;
            if i == 0 {
                name = name.trim_start_matches('\u{feff}').to_string();
            }
            headers.push(name.trim().to_string());
        }

        Ok(CsvSource {
            entity,
            path: path.to_path_buf(),
            reader,
            headers,
            encoding,
            record: ByteRecord::new(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }

    fn decode_record(&self, line: u64) -> Result<RawRecord> {
        let mut fields = FieldMap::with_capacity(self.headers.len());
        for (header, value) in self.headers.iter().zip(self.record.iter()) {
            let value = decode_field(self.encoding, value)
                .map_err(|e| e.in_row(self.entity, line, None))?;
            fields.insert(header.clone(), value);
        }
        Ok(RawRecord::new(line, fields))
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                Some(self.decode_record(line))
            }
            Err(source) => Some(Err(EtlError::Csv {
                path: self.path.clone(),
                source,
            })),
        }
    }
}

/// Open a reader over in-memory bytes (tests, piped input)
pub fn source_from_bytes(
    bytes: &[u8],
    entity: Entity,
    options: ReadOptions,
) -> Result<CsvSource<io::Cursor<Vec<u8>>>> {
    let encoding = match options.encoding {
        InputEncoding::Latin1 => WINDOWS_1252,
        InputEncoding::Utf8 => UTF_8,
        InputEncoding::Auto => detect_encoding(&bytes[..bytes.len().min(SNIFF_LEN as usize)])?,
    };

    CsvSource::from_reader(
        io::Cursor::new(bytes.to_vec()),
        Path::new("<memory>"),
        entity,
        options.delimiter,
        encoding,
    )
}

// ============================================================================
// TYPE COERCION
// ============================================================================

/// `dd/mm/yyyy` → calendar date
pub fn parse_date(column: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| EtlError::InvalidDate {
        column: column.to_string(),
        value: value.to_string(),
        expected: "dd/mm/yyyy",
    })
}

/// `dd/mm/yyyy HH:MM:SS` → timestamp
pub fn parse_timestamp(column: &str, value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|_| {
        EtlError::InvalidDate {
            column: column.to_string(),
            value: value.to_string(),
            expected: "dd/mm/yyyy HH:MM:SS",
        }
    })
}

/// Comma decimal separator → period, then parse.
///
/// Thousands separators are not recognised: `"1.234,56"` becomes
/// `"1.234.56"` and is rejected, `"1.234"` reads as 1.234.
pub fn parse_amount(column: &str, value: &str) -> Result<BigDecimal> {
    let candidate = value.trim().replace(',', ".");
    let invalid = || EtlError::InvalidAmount {
        column: column.to_string(),
        value: value.to_string(),
    };

    // BigDecimal also takes exponents; extracts never carry them
    let plain = !candidate.is_empty()
        && candidate
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')));
    if !plain {
        return Err(invalid());
    }

    BigDecimal::from_str(&candidate).map_err(|_| invalid())
}

// ============================================================================
// TESTS
// ============================================================================
