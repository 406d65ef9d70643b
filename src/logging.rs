//! Plain line-oriented progress output on stdout.

use tracing::Level;
use tracing_subscriber::fmt;

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging() {
  let installed = fmt()
    .with_writer(std::io::stdout)
    .with_max_level(Level::INFO)
    .with_level(false)
    .with_target(false)
    .without_time()
    .with_ansi(false)
    .try_init();
  if installed.is_err() {
    tracing::debug!("global tracing subscriber already set, keeping it");
  }
}
