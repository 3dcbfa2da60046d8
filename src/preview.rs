use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    io_utils::{self, ReadOptions},
    table,
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let options = ReadOptions::from_cli(
        args.delimiter,
        args.input_encoding.as_deref(),
        args.sheet.clone(),
    )?;
    let loaded = io_utils::read_table(&args.input, &options)
        .with_context(|| format!("Reading {:?}", args.input))?;
    let rows = loaded.display_rows(Some(args.rows));

    table::print_table(loaded.headers(), &rows);
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len(),
        loaded.row_count(),
        args.input
    );
    Ok(())
}
