use std::error::Error;

use postcode_mapper::config::{LookupConfig, MapperConfig};
use postcode_mapper::logging::init_logging;
use postcode_mapper::mapper::run;
use postcode_mapper::remote::TypeaheadClient;

// Reentrant: postcodes already in the mapping file are skipped, so an
// interrupted run resumes from its last checkpoint.
fn main() -> Result<(), Box<dyn Error>> {
  init_logging();
  let client = TypeaheadClient::new(LookupConfig::default())?;
  run(&MapperConfig::default(), &client)?;
  Ok(())
}
