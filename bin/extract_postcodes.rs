//! One-time step: pull every live postcode out of the ONS Postcode Directory
//! into a plain sorted list, the input of `map_postcodes`.

use std::error::Error;

use postcode_mapper::config::ExtractConfig;
use postcode_mapper::local::extract;
use postcode_mapper::logging::init_logging;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
  init_logging();
  let config = ExtractConfig::default();
  info!("-- reading live postcodes from {}", config.source_path.display());
  let count = extract(&config)?;
  info!(
    "Extracted {} unique postcodes to {}",
    count,
    config.destination_path.display()
  );
  Ok(())
}
