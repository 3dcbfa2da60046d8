//! I/O utilities for reading input tables and writing CSV output.
//!
//! - **Format dispatch**: `.xlsx`, `.xlsm`, `.xls`, `.xlsb` and `.ods` files are
//!   read through `calamine`; everything else is treated as delimited text.
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **Quoting**: CSV output uses `QuoteStyle::Always` for round-trip safety.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{data::Value, error::CruceError, table::Table};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// How an input table should be read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    /// Worksheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            sheet: None,
        }
    }
}

impl ReadOptions {
    pub fn from_cli(
        delimiter: Option<u8>,
        encoding: Option<&str>,
        sheet: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            delimiter,
            encoding: resolve_encoding(encoding)?,
            sheet,
        })
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

/// Reads a whole table from a spreadsheet or delimited text file.
pub fn read_table(path: &Path, options: &ReadOptions) -> Result<Table> {
    if is_spreadsheet(path) {
        read_spreadsheet(path, options.sheet.as_deref())
    } else {
        let delimiter = resolve_input_delimiter(path, options.delimiter);
        let reader = open_input(path)?;
        read_csv_table(reader, delimiter, options.encoding)
            .with_context(|| format!("Reading delimited file {path:?}"))
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    Ok(if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Reads delimited text; the first record is the header row.
pub fn read_csv_table<R: Read>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Table> {
    let mut reader = open_csv_reader(reader, delimiter, true);
    let headers = reader_headers(&mut reader, encoding)?;
    let mut table = Table::new(headers);
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        table.push_row(decoded.into_iter().map(Value::from).collect());
    }
    debug!(
        "Read {} row(s) across {} column(s) of delimited text",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

fn read_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Opening spreadsheet {path:?}"))?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| CruceError::EmptyWorkbook(path.to_path_buf()))?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading sheet '{sheet_name}' from {path:?}"))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(first) => first
            .iter()
            .map(|cell| cell_to_value(cell).as_display())
            .collect(),
        None => return Ok(Table::default()),
    };
    let mut table = Table::new(headers);
    for row in rows {
        let cells: Vec<Value> = row.iter().map(cell_to_value).collect();
        if cells.iter().all(Value::is_blank) {
            continue;
        }
        table.push_row(cells);
    }
    debug!(
        "Read {} row(s) from sheet '{}' of {:?}",
        table.row_count(),
        sheet_name,
        path
    );
    Ok(table)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Empty,
        Data::String(s) => Value::from(s.as_str()),
        Data::Float(n) => Value::Number(*n),
        Data::Int(n) => Value::Number(*n as f64),
        Data::Bool(b) => Value::from(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|parsed| Value::Date(parsed.date()))
            .unwrap_or(Value::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::from(s.as_str()),
    }
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };
    Ok(csv_writer(writer, delimiter))
}

pub fn csv_writer<W: Write>(inner: W, delimiter: u8) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    builder.from_writer(inner)
}

pub fn write_csv_table<W: Write>(writer: &mut csv::Writer<W>, table: &Table) -> Result<()> {
    writer
        .write_record(table.headers())
        .context("Writing output headers")?;
    for (idx, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(Value::as_display))
            .with_context(|| format!("Writing output row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output writer")?;
    Ok(())
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = decode_record(&headers, encoding)?;
    if let Some(first) = decoded.first_mut() {
        // Excel writes a BOM in front of UTF-8 CSV exports.
        *first = first.trim_start_matches('\u{feff}').to_string();
    }
    Ok(decoded)
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        loop {
            if self.buffer.is_empty() {
                return Ok(());
            }
            match std::str::from_utf8(&self.buffer) {
                Ok(valid) => {
                    let text = valid.to_owned();
                    self.encode_and_write(&text)?;
                    self.buffer.clear();
                    return Ok(());
                }
                Err(err) => {
                    if let Some(error_len) = err.error_len() {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Invalid UTF-8 sequence in output stream ({error_len} bytes)"),
                        ));
                    }
                    let valid_up_to = err.valid_up_to();
                    if valid_up_to > 0 {
                        let text = String::from_utf8_lossy(&self.buffer[..valid_up_to]).into_owned();
                        self.encode_and_write(&text)?;
                        self.buffer.drain(..valid_up_to);
                        continue;
                    }
                    if force {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "Incomplete UTF-8 sequence at end of output stream",
                        ));
                    }
                    return Ok(());
                }
            }
        }
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_csv_table_pads_short_rows_and_strips_bom() {
        let raw = "\u{feff}code,qty\nA1,2\nB2\n";
        let table = read_csv_table(raw.as_bytes(), b',', UTF_8).unwrap();
        assert_eq!(table.headers(), &["code", "qty"]);
        assert_eq!(table.rows()[1], vec![Value::from("B2"), Value::Empty]);
    }

    #[test]
    fn transcoding_writer_emits_latin1() {
        let encoding = resolve_encoding(Some("latin1")).unwrap();
        let mut buffer = Vec::new();
        {
            let mut writer = TranscodingWriter::new(&mut buffer, encoding);
            writer.write_all("Médico".as_bytes()).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(buffer, vec![b'M', 0xE9, b'd', b'i', b'c', b'o']);
    }

    #[test]
    fn spreadsheet_detection_is_case_insensitive() {
        assert!(is_spreadsheet(Path::new("Cuentas.XLSX")));
        assert!(!is_spreadsheet(Path::new("cuentas.csv")));
    }
}
