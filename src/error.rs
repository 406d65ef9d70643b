use thiserror::Error;

/// Fatal errors of the extract and map stages.
///
/// Per-postcode lookup problems never surface here, they are reported as a
/// [`crate::remote::LookupOutcome`] instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
