use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use postcode_mapper::config::{ExtractConfig, MapperConfig};
use postcode_mapper::local::extract;
use postcode_mapper::mapper::run;
use postcode_mapper::remote::{LookupOutcome, PostcodeLookup};
use tempfile::TempDir;

/// Deterministic stand-in for the typeahead service.
struct FakeService {
  ids: HashMap<String, String>,
  calls: RefCell<Vec<String>>,
  die_after: Cell<Option<usize>>,
}

impl FakeService {
  fn new(ids: &[(&str, &str)]) -> Self {
    FakeService {
      ids: ids
        .iter()
        .map(|(p, id)| (p.to_string(), id.to_string()))
        .collect(),
      calls: RefCell::new(Vec::new()),
      die_after: Cell::new(None),
    }
  }
}

impl PostcodeLookup for FakeService {
  fn fetch_postcode_id(&self, postcode: &str) -> LookupOutcome {
    if let Some(limit) = self.die_after.get() {
      if self.calls.borrow().len() == limit {
        panic!("simulated interruption");
      }
    }
    self.calls.borrow_mut().push(postcode.to_string());
    match self.ids.get(postcode) {
      Some(id) => LookupOutcome::Resolved(id.clone()),
      None => LookupOutcome::NotFound,
    }
  }
}

fn mapper_config(dir: &Path, interval: usize) -> MapperConfig {
  MapperConfig {
    postcodes_path: dir.join("postcodes.txt"),
    mapping_path: dir.join("postcode-mapping.csv"),
    checkpoint_interval: interval,
    progress_stride: 1000,
  }
}

const POSTCODES: &str = "B1 1AA\nE1 6AN\nM1 1AE\nSW1A 1AA\nZE1 0AA\nAB10 1AB\nCF10 1AA\n";
const IDS: &[(&str, &str)] = &[
  ("AB10 1AB", "5"),
  ("B1 1AA", "1"),
  ("CF10 1AA", "6"),
  ("E1 6AN", "2"),
  ("M1 1AE", "3"),
  ("SW1A 1AA", "4"),
];

#[test]
fn extract_then_map_end_to_end() {
  let dir = TempDir::new().unwrap();
  let source = dir.path().join("onspd.csv");
  fs::write(
    &source,
    "pcds,doterm\nAB1 2CD,\nEF3 4GH,2020-01-01\nAB1 2CD,\n",
  )
  .unwrap();
  let config = mapper_config(dir.path(), 100);
  extract(&ExtractConfig {
    source_path: source,
    destination_path: config.postcodes_path.clone(),
    ..ExtractConfig::default()
  })
  .unwrap();
  assert_eq!(fs::read_to_string(&config.postcodes_path).unwrap(), "AB1 2CD\n");

  let service = FakeService::new(&[("AB1 2CD", "99887")]);
  run(&config, &service).unwrap();
  assert_eq!(
    fs::read_to_string(&config.mapping_path).unwrap(),
    "postcode,id\nAB1 2CD,99887\n"
  );
}

#[test]
fn second_run_is_idempotent_and_fetches_only_misses() {
  let dir = TempDir::new().unwrap();
  let config = mapper_config(dir.path(), 3);
  fs::write(&config.postcodes_path, POSTCODES).unwrap();

  let first = FakeService::new(IDS);
  run(&config, &first).unwrap();
  let after_first = fs::read_to_string(&config.mapping_path).unwrap();
  assert_eq!(first.calls.borrow().len(), 7);

  let second = FakeService::new(IDS);
  let summary = run(&config, &second).unwrap();
  assert_eq!(fs::read_to_string(&config.mapping_path).unwrap(), after_first);
  // only the unresolved postcode is asked for again
  assert_eq!(*second.calls.borrow(), vec!["ZE1 0AA"]);
  assert_eq!(summary.skipped, 6);
  assert!(!after_first.contains("ZE1 0AA"));
}

#[test]
fn resumed_run_matches_uninterrupted_run() {
  let reference_dir = TempDir::new().unwrap();
  let reference = mapper_config(reference_dir.path(), 2);
  fs::write(&reference.postcodes_path, POSTCODES).unwrap();
  run(&reference, &FakeService::new(IDS)).unwrap();
  let expected = fs::read_to_string(&reference.mapping_path).unwrap();

  let dir = TempDir::new().unwrap();
  let config = mapper_config(dir.path(), 2);
  fs::write(&config.postcodes_path, POSTCODES).unwrap();
  let interrupted = FakeService::new(IDS);
  interrupted.die_after.set(Some(5));
  let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(&config, &interrupted)));
  assert!(outcome.is_err());

  // two checkpoints of two rows each made it to disk, unsorted
  let partial = fs::read_to_string(&config.mapping_path).unwrap();
  assert_eq!(partial, "postcode,id\nB1 1AA,1\nE1 6AN,2\nM1 1AE,3\nSW1A 1AA,4\n");

  let resumed = FakeService::new(IDS);
  run(&config, &resumed).unwrap();
  assert_eq!(*resumed.calls.borrow(), vec!["ZE1 0AA", "AB10 1AB", "CF10 1AA"]);
  assert_eq!(fs::read_to_string(&config.mapping_path).unwrap(), expected);
}

#[test]
fn resumes_over_a_torn_last_row() {
  let dir = TempDir::new().unwrap();
  let config = mapper_config(dir.path(), 2);
  fs::write(&config.postcodes_path, POSTCODES).unwrap();
  fs::write(&config.mapping_path, "postcode,id\nB1 1AA,1\nE1 6AN,2\nM1 1").unwrap();

  let service = FakeService::new(IDS);
  run(&config, &service).unwrap();
  assert_eq!(
    *service.calls.borrow(),
    vec!["M1 1AE", "SW1A 1AA", "ZE1 0AA", "AB10 1AB", "CF10 1AA"]
  );
  assert_eq!(
    fs::read_to_string(&config.mapping_path).unwrap(),
    "postcode,id\nAB10 1AB,5\nB1 1AA,1\nCF10 1AA,6\nE1 6AN,2\nM1 1AE,3\nSW1A 1AA,4\n"
  );
}

#[test]
fn final_file_is_strictly_sorted() {
  let dir = TempDir::new().unwrap();
  let config = mapper_config(dir.path(), 1);
  fs::write(&config.postcodes_path, POSTCODES).unwrap();
  run(&config, &FakeService::new(IDS)).unwrap();

  let contents = fs::read_to_string(&config.mapping_path).unwrap();
  let mut lines = contents.lines();
  assert_eq!(lines.next(), Some("postcode,id"));
  let keys: Vec<&str> = lines.map(|l| l.split(',').next().unwrap()).collect();
  assert_eq!(keys.len(), 6);
  assert!(keys.windows(2).all(|w| w[0] < w[1]), "{:?}", keys);
}

#[test]
fn missing_postcode_list_is_fatal() {
  let dir = TempDir::new().unwrap();
  let config = mapper_config(dir.path(), 100);
  assert!(run(&config, &FakeService::new(IDS)).is_err());
}
