use std::time::{Duration, Instant};

use chrono::{Local, TimeDelta};
use tracing::info;

use crate::checkpoint::{MappingFile, MappingState};
use crate::config::MapperConfig;
use crate::local::read_postcode_list;
use crate::remote::{LookupOutcome, PostcodeLookup};
use crate::Result;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
  pub total: usize,
  pub processed: usize,
  pub skipped: usize,
  pub fetched: usize,
  pub resolved: usize,
  pub not_found: usize,
  pub failed: usize,
  pub mapping_size: usize,
  /// Progress lines emitted, at checkpoints and at list strides.
  pub progress_reports: usize,
  pub elapsed: Duration,
}

/// Resolve every postcode not yet present in `state`, checkpointing to
/// `mapping_file` every `checkpoint_interval` lookups and rewriting it sorted
/// at the end. Position in the list is also reported every `progress_stride`
/// postcodes, so a resumed run that mostly skips is not silent.
///
/// Postcodes already in `state` are never looked up again. A failed lookup is
/// logged and the run moves on; only local I/O errors end it early.
pub fn map_postcodes<L: PostcodeLookup>(
  postcodes: &[String],
  state: &mut MappingState,
  lookup: &L,
  mapping_file: &MappingFile,
  checkpoint_interval: usize,
  progress_stride: usize,
) -> Result<RunSummary> {
  let start_time = Instant::now();
  let checkpoint_interval = checkpoint_interval.max(1);
  let progress_stride = progress_stride.max(1);
  let mut summary = RunSummary {
    total: postcodes.len(),
    ..RunSummary::default()
  };

  for postcode in postcodes {
    summary.processed += 1;
    if summary.processed % progress_stride == 0 {
      summary.progress_reports += 1;
      info!("\nProgress: {}/{} postcodes", summary.processed, summary.total);
    }
    if state.contains(postcode) {
      summary.skipped += 1;
      continue;
    }
    summary.fetched += 1;
    match lookup.fetch_postcode_id(postcode) {
      LookupOutcome::Resolved(id) => {
        if state.insert(postcode.clone(), id) {
          summary.resolved += 1;
        }
      }
      LookupOutcome::NotFound => {
        summary.not_found += 1;
        info!("  No ID found for {}", postcode);
      }
      LookupOutcome::TransientFailure(cause) => {
        summary.failed += 1;
        info!("  Failed to fetch {}: {}", postcode, cause);
      }
    }

    if summary.fetched % checkpoint_interval == 0 {
      mapping_file.append_checkpoint(&state.take_pending())?;
      summary.progress_reports += 1;
      info!(
        "{}",
        progress_line(&summary, state.len(), start_time.elapsed())
      );
    }
  }

  mapping_file.append_checkpoint(&state.take_pending())?;
  mapping_file.rewrite_sorted(state)?;

  summary.mapping_size = state.len();
  summary.elapsed = start_time.elapsed();
  Ok(summary)
}

/// Run the map stage end to end from the configured files.
pub fn run<L: PostcodeLookup>(config: &MapperConfig, lookup: &L) -> Result<RunSummary> {
  let mapping_file = MappingFile::new(&config.mapping_path);
  let mut state = mapping_file.load()?;
  mapping_file.initialize()?;
  info!(
    "Loaded {} existing mappings from {}",
    state.len(),
    mapping_file.path().display()
  );

  let postcodes = read_postcode_list(&config.postcodes_path)?;
  info!(
    "Read {} postcodes from {} (started {})",
    postcodes.len(),
    config.postcodes_path.display(),
    Local::now().format("%Y-%m-%d %H:%M:%S")
  );

  let summary = map_postcodes(
    &postcodes,
    &mut state,
    lookup,
    &mapping_file,
    config.checkpoint_interval,
    config.progress_stride,
  )?;
  info!(
    "\nDone: {} postcodes, {} fetched, {} resolved, {} not found, {} failed in {}",
    summary.total,
    summary.fetched,
    summary.resolved,
    summary.not_found,
    summary.failed,
    format_duration(summary.elapsed)
  );
  info!(
    "Mapping of {} postcodes saved to {}",
    summary.mapping_size,
    mapping_file.path().display()
  );
  Ok(summary)
}

/// Time left at the current fetch rate; `None` before anything was fetched.
pub fn estimate_remaining(remaining: usize, fetched: usize, elapsed: Duration) -> Option<Duration> {
  let elapsed_secs = elapsed.as_secs_f64();
  if fetched == 0 || elapsed_secs <= 0.0 {
    return None;
  }
  let rate = fetched as f64 / elapsed_secs;
  Some(Duration::from_secs_f64(remaining as f64 / rate))
}

/// `1h02m03s`, `4m05s` or `6s`.
pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
  if hours > 0 {
    format!("{}h{:02}m{:02}s", hours, minutes, seconds)
  } else if minutes > 0 {
    format!("{}m{:02}s", minutes, seconds)
  } else {
    format!("{}s", seconds)
  }
}

fn progress_line(summary: &RunSummary, mapping_size: usize, elapsed: Duration) -> String {
  let remaining = summary.total - summary.processed;
  let eta = match estimate_remaining(remaining, summary.fetched, elapsed) {
    Some(eta) => {
      let finish = TimeDelta::from_std(eta)
        .ok()
        .and_then(|delta| Local::now().checked_add_signed(delta))
        .map(|at| at.format(" (~%H:%M)").to_string())
        .unwrap_or_default();
      format!("{}{}", format_duration(eta), finish)
    }
    None => String::from("unknown"),
  };
  format!(
    "Progress: {}/{} processed, {} fetched, {} mapped, elapsed {}, eta {}",
    summary.processed,
    summary.total,
    summary.fetched,
    mapping_size,
    format_duration(elapsed),
    eta
  )
}
