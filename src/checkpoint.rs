//! The mapping file doubles as the resume checkpoint.
//!
//! It is appended to at every checkpoint during a run and rewritten once,
//! sorted, when the run completes. Appending never touches rows that are
//! already on disk, so an interrupted run keeps everything flushed so far.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::Result;

pub const MAPPING_HEADER: [&str; 2] = ["postcode", "id"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
  pub postcode: String,
  pub id: String,
}

/// Resumable state of a mapping run: everything resolved so far, plus the
/// entries resolved since the last checkpoint.
#[derive(Debug, Default)]
pub struct MappingState {
  entries: BTreeMap<String, String>,
  pending: Vec<MappingEntry>,
}

impl MappingState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, postcode: &str) -> bool {
    self.entries.contains_key(postcode)
  }

  pub fn get(&self, postcode: &str) -> Option<&str> {
    self.entries.get(postcode).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn pending_len(&self) -> usize {
    self.pending.len()
  }

  /// Record a freshly resolved postcode. Existing entries are kept as they
  /// are; returns whether the entry was new.
  pub fn insert(&mut self, postcode: String, id: String) -> bool {
    if self.entries.contains_key(&postcode) {
      return false;
    }
    self.entries.insert(postcode.clone(), id.clone());
    self.pending.push(MappingEntry { postcode, id });
    true
  }

  /// Hand over the entries not yet checkpointed.
  pub fn take_pending(&mut self) -> Vec<MappingEntry> {
    std::mem::take(&mut self.pending)
  }

  /// All entries, ordered by postcode.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Seed an entry that is already persisted, so it is not queued for writing.
  fn restore(&mut self, entry: MappingEntry) {
    self.entries.entry(entry.postcode).or_insert(entry.id);
  }
}

#[derive(Debug, Clone)]
pub struct MappingFile {
  path: PathBuf,
}

impl MappingFile {
  pub fn new<P: Into<PathBuf>>(path: P) -> Self {
    MappingFile { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Create the file with just its header, unless it already exists.
  pub fn initialize(&self) -> Result<()> {
    if self.path.exists() {
      return Ok(());
    }
    let mut writer = WriterBuilder::new().from_path(&self.path)?;
    writer.write_record(MAPPING_HEADER)?;
    writer.flush()?;
    Ok(())
  }

  /// Read whatever is on disk. A missing file is an empty mapping, and rows
  /// without both a postcode and an id are skipped.
  pub fn load(&self) -> Result<MappingState> {
    let mut state = MappingState::new();
    if !self.path.exists() {
      return Ok(state);
    }
    let mut reader = ReaderBuilder::new().flexible(true).from_path(&self.path)?;
    for entry in reader.deserialize::<MappingEntry>() {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) if e.is_io_error() => return Err(e.into()),
        // a row torn by an interrupted append
        Err(_) => continue,
      };
      if entry.postcode.is_empty() || entry.id.is_empty() {
        continue;
      }
      state.restore(entry);
    }
    Ok(state)
  }

  /// Append rows to the end of the file, without a header.
  pub fn append_checkpoint(&self, entries: &[MappingEntry]) -> Result<()> {
    if entries.is_empty() {
      return Ok(());
    }
    let mut file = OpenOptions::new()
      .read(true)
      .append(true)
      .create(true)
      .open(&self.path)?;
    // never glue a new row onto the end of a torn one
    if file.metadata()?.len() > 0 {
      let mut last = [0u8; 1];
      file.seek(SeekFrom::End(-1))?;
      file.read_exact(&mut last)?;
      if last[0] != b'\n' {
        file.write_all(b"\n")?;
      }
    }
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    for entry in entries {
      writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
  }

  /// Replace the file with the full mapping, sorted by postcode.
  ///
  /// The new content goes to a sibling file first and is renamed into place.
  pub fn rewrite_sorted(&self, state: &MappingState) -> Result<()> {
    let tmp_path = self.tmp_path();
    {
      let tmp_file = File::create(&tmp_path)?;
      let mut writer = WriterBuilder::new().has_headers(false).from_writer(tmp_file);
      writer.write_record(MAPPING_HEADER)?;
      for (postcode, id) in state.iter() {
        writer.write_record([postcode, id])?;
      }
      let mut tmp_file = writer.into_inner().map_err(|e| e.into_error())?;
      tmp_file.flush()?;
      tmp_file.sync_all()?;
    }
    fs::rename(&tmp_path, &self.path)?;
    Ok(())
  }

  fn tmp_path(&self) -> PathBuf {
    let mut name = self
      .path
      .file_name()
      .map(|n| n.to_os_string())
      .unwrap_or_default();
    name.push(".tmp");
    self.path.with_file_name(name)
  }
}
