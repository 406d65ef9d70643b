use std::thread;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::{LookupConfig, POOL_MAX_IDLE_PER_HOST, USER_AGENT};
use crate::Result;

/// What a single postcode lookup came back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
  Resolved(String),
  NotFound,
  TransientFailure(String),
}

/// Resolves a postcode to the listing service's location id.
pub trait PostcodeLookup {
  fn fetch_postcode_id(&self, postcode: &str) -> LookupOutcome;
}

#[derive(Debug, Deserialize)]
struct TypeaheadResponse {
  #[serde(default)]
  matches: Vec<TypeaheadMatch>,
}

#[derive(Debug, Deserialize)]
struct TypeaheadMatch {
  id: Option<serde_json::Value>,
}

/// Pick the id of the first match; every other match is ignored.
pub fn first_match_id(body: &str) -> Result<Option<String>> {
  let response: TypeaheadResponse = serde_json::from_str(body)?;
  let id = response
    .matches
    .into_iter()
    .next()
    .and_then(|first| first.id)
    .and_then(|id| match id {
      serde_json::Value::String(s) if !s.is_empty() => Some(s),
      serde_json::Value::Number(n) => Some(n.to_string()),
      _ => None,
    });
  Ok(id)
}

pub fn is_retryable_status(status: StatusCode) -> bool {
  matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Connection-level failures: refused or reset connections, timeouts and
/// bodies cut off before their declared length.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
  err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Blocking client for the typeahead endpoint, sharing one connection pool
/// across all lookups of a run.
pub struct TypeaheadClient {
  client: Client,
  config: LookupConfig,
}

impl TypeaheadClient {
  pub fn new(config: LookupConfig) -> Result<Self> {
    let client = reqwest::blocking::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(config.timeout)
      .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
      .build()?;
    Ok(TypeaheadClient { client, config })
  }

  fn get_with_retry(&self, postcode: &str) -> std::result::Result<String, String> {
    let limit = self.config.limit.to_string();
    let params = [
      ("query", postcode),
      ("limit", limit.as_str()),
      ("exclude", self.config.exclude.as_str()),
    ];
    let retry = &self.config.retry;
    let mut last_failure = String::from("no attempt made");
    for attempt in 1..=retry.max_attempts {
      match self.client.get(&self.config.base_url).query(&params).send() {
        Ok(resp) => {
          let status = resp.status();
          if status.is_success() {
            // the body can still break off mid-read
            match resp.text() {
              Ok(body) => return Ok(body),
              Err(e) => {
                last_failure = e.to_string();
                if !is_retryable_error(&e) {
                  return Err(last_failure);
                }
              }
            }
          } else {
            last_failure = format!("http status {}", status);
            if !is_retryable_status(status) {
              return Err(last_failure);
            }
          }
        }
        Err(e) => {
          last_failure = e.to_string();
          if !is_retryable_error(&e) {
            return Err(last_failure);
          }
        }
      }
      if attempt < retry.max_attempts {
        let delay = retry.backoff_delay(attempt);
        debug!("retrying {} after {:?}: {}", postcode, delay, last_failure);
        thread::sleep(delay);
      }
    }
    Err(last_failure)
  }
}

impl PostcodeLookup for TypeaheadClient {
  fn fetch_postcode_id(&self, postcode: &str) -> LookupOutcome {
    match self.get_with_retry(postcode) {
      Ok(body) => match first_match_id(&body) {
        Ok(Some(id)) => LookupOutcome::Resolved(id),
        Ok(None) => LookupOutcome::NotFound,
        Err(e) => LookupOutcome::TransientFailure(e.to_string()),
      },
      Err(cause) => LookupOutcome::TransientFailure(cause),
    }
  }
}
