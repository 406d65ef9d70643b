use std::collections::BTreeSet;
use std::fs::File;
use std::io::{prelude::*, BufReader, BufWriter};
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::config::ExtractConfig;
use crate::Result;

/// Collect every postcode that has at least one live (non-terminated) row
/// in the reference CSV.
///
/// Rows without a postcode, and rows the CSV reader cannot make sense of,
/// are skipped without comment. I/O failures are returned.
pub fn extract_live_postcodes(
  source_path: &Path,
  postcode_column: &str,
  termination_column: &str,
) -> Result<BTreeSet<String>> {
  let mut reader = ReaderBuilder::new()
    .trim(Trim::All)
    .flexible(true)
    .from_path(source_path)?;
  let headers = reader.headers()?.clone();
  let postcode_idx = headers.iter().position(|h| h == postcode_column);
  let termination_idx = headers.iter().position(|h| h == termination_column);

  let mut postcodes = BTreeSet::new();
  // without a postcode column no row can qualify
  let Some(postcode_idx) = postcode_idx else {
    return Ok(postcodes);
  };

  for record in reader.records() {
    let record = match record {
      Ok(record) => record,
      Err(e) if e.is_io_error() => return Err(e.into()),
      Err(_) => continue,
    };
    let postcode = record.get(postcode_idx).unwrap_or_default();
    let terminated = termination_idx
      .and_then(|idx| record.get(idx))
      .unwrap_or_default();
    if !postcode.is_empty() && terminated.is_empty() {
      postcodes.insert(postcode.to_string());
    }
  }
  Ok(postcodes)
}

/// Overwrite `destination_path` with one postcode per line, in iteration order.
pub fn write_postcode_list<'a, I>(postcodes: I, destination_path: &Path) -> Result<usize>
where
  I: IntoIterator<Item = &'a String>,
{
  let mut dest_file = BufWriter::new(File::create(destination_path)?);
  let mut written = 0;
  for postcode in postcodes {
    writeln!(dest_file, "{}", postcode)?;
    written += 1;
  }
  dest_file.flush()?;
  Ok(written)
}

/// Run the whole extract stage: read the reference dataset, then write the
/// sorted, deduplicated list of live postcodes.
pub fn extract(config: &ExtractConfig) -> Result<usize> {
  let postcodes = extract_live_postcodes(
    &config.source_path,
    &config.postcode_column,
    &config.termination_column,
  )?;
  write_postcode_list(&postcodes, &config.destination_path)
}

/// Load the postcode list in file order, trimmed, blank lines dropped.
pub fn read_postcode_list(path: &Path) -> Result<Vec<String>> {
  let postcodes_file = File::open(path)?;
  let reader = BufReader::new(postcodes_file);
  let mut postcodes = Vec::new();
  for line in reader.lines() {
    let line = line?;
    let postcode = line.trim();
    if !postcode.is_empty() {
      postcodes.push(postcode.to_string());
    }
  }
  Ok(postcodes)
}
