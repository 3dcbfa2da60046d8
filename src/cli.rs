use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Consolidate and reconcile clinic spreadsheets",
    long_about = None
)]
pub struct Cli {
    /// Settings file (defaults to sheet-cruce.yaml in the working directory when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Price a primary activity table against a reference table and store the result
    Consolidate(ConsolidateArgs),
    /// Split two tables into matched, only-left and only-right rows on a key column
    Reconcile(ReconcileArgs),
    /// Show which column each role resolves to
    Columns(ColumnsArgs),
    /// Preview the first few rows of a table in a formatted view
    Preview(PreviewArgs),
    /// Extract distinct professionals, patients, procedures and cities as JSON
    Catalog(CatalogArgs),
    /// Summarize the canonical dataset by a dimension against monthly goals
    Report(ReportArgs),
    /// Show the canonical dataset location, size and last update time
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct ConsolidateArgs {
    /// Primary activity table (CSV or spreadsheet)
    #[arg(long)]
    pub primary: PathBuf,
    /// Reference price table (CSV or spreadsheet)
    #[arg(long)]
    pub reference: PathBuf,
    /// Canonical dataset to replace (defaults to the configured path)
    #[arg(long)]
    pub canonical: Option<PathBuf>,
    /// Also export the consolidated table to this file (.xlsx or .csv)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Do not replace the canonical dataset
    #[arg(long = "no-persist")]
    pub no_persist: bool,
    /// Delimiter for delimited inputs and outputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the primary file (defaults to utf-8)
    #[arg(long = "primary-encoding")]
    pub primary_encoding: Option<String>,
    /// Character encoding of the reference file (defaults to utf-8)
    #[arg(long = "reference-encoding")]
    pub reference_encoding: Option<String>,
    /// Character encoding of a delimited export (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Worksheet to read from a primary workbook (defaults to the first sheet)
    #[arg(long = "primary-sheet")]
    pub primary_sheet: Option<String>,
    /// Worksheet to read from a reference workbook (defaults to the first sheet)
    #[arg(long = "reference-sheet")]
    pub reference_sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Left table (A)
    #[arg(long = "left")]
    pub left: PathBuf,
    /// Right table (B)
    #[arg(long = "right")]
    pub right: PathBuf,
    /// Key column present in both tables
    #[arg(short = 'k', long = "key")]
    pub key: String,
    /// Output workbook (.xlsx)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Skip the sheet listing rows found only in the right table
    #[arg(long = "no-only-right")]
    pub no_only_right: bool,
    /// Refuse runs producing more matched rows than this
    #[arg(long = "max-matched-rows")]
    pub max_matched_rows: Option<usize>,
    /// Delimiter for delimited inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the left file (defaults to utf-8)
    #[arg(long = "left-encoding")]
    pub left_encoding: Option<String>,
    /// Character encoding of the right file (defaults to utf-8)
    #[arg(long = "right-encoding")]
    pub right_encoding: Option<String>,
    /// Worksheet to read from a left workbook
    #[arg(long = "left-sheet")]
    pub left_sheet: Option<String>,
    /// Worksheet to read from a right workbook
    #[arg(long = "right-sheet")]
    pub right_sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Input table to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Delimiter for delimited input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Worksheet to read from a workbook
    #[arg(long)]
    pub sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input table to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Delimiter for delimited input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Worksheet to read from a workbook
    #[arg(long)]
    pub sheet: Option<String>,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Input table (defaults to the canonical dataset)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Destination JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter for delimited input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum Dimension {
    Professional,
    Patient,
    Procedure,
    City,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Input table (defaults to the canonical dataset)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// Dimension to group by
    #[arg(long = "by", value_enum, default_value_t = Dimension::Professional)]
    pub by: Dimension,
    /// Restrict to one month, formatted YYYY-MM
    #[arg(long)]
    pub month: Option<String>,
    /// Delimiter for delimited input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Canonical dataset to inspect (defaults to the configured path)
    #[arg(long)]
    pub canonical: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_aliases() {
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }
}
