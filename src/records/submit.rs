//! Record parsing and fan-out submission.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::cache::ReferenceCache;
use crate::error::{BridgeError, BridgeResult};
use crate::upstream::types::{ScanCvRequest, ScanCvResponse, SCAN_CV_PATH};
use crate::upstream::ConnectionPool;

/// A record as received from the collector, kept byte for byte.
#[derive(Debug)]
pub struct Record {
    reference: String,
    raw: Box<RawValue>,
}

impl Record {
    pub fn parse(bytes: &[u8]) -> BridgeResult<Self> {
        #[derive(Deserialize)]
        struct Fields {
            #[serde(rename = "referenceNumber")]
            reference_number: Option<Value>,
        }

        let raw: Box<RawValue> = serde_json::from_slice(bytes)
            .map_err(|e| BridgeError::InvalidInput(format!("record is not valid json: {e}")))?;
        let fields: Fields = serde_json::from_str(raw.get())
            .map_err(|_| BridgeError::InvalidInput("record must be a json object".into()))?;

        let reference = match fields.reference_number {
            None | Some(Value::Null) => {
                return Err(BridgeError::InvalidInput(
                    "referenceNumber field does not exist".into(),
                ))
            }
            Some(Value::String(s)) if s.is_empty() => {
                return Err(BridgeError::InvalidInput(
                    "referenceNumber cannot be empty".into(),
                ))
            }
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(BridgeError::InvalidInput(
                    "referenceNumber must be a string".into(),
                ))
            }
        };

        Ok(Self { reference, raw })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn raw(&self) -> &RawValue {
        &self.raw
    }
}

/// Result of submitting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub already_sent: bool,
    pub has_matches: bool,
}

/// Submits records to every upstream, skipping ones sent recently.
#[derive(Debug, Clone)]
pub struct RecordSubmitter {
    /// `None` in mock mode.
    pool: Option<ConnectionPool>,
    cache: ReferenceCache,
    match_ttl: Duration,
}

impl RecordSubmitter {
    pub fn new(pool: Option<ConnectionPool>, cache: ReferenceCache, match_ttl: Duration) -> Self {
        Self {
            pool,
            cache,
            match_ttl,
        }
    }

    pub fn pool(&self) -> Option<&ConnectionPool> {
        self.pool.as_ref()
    }

    /// Check the cache, fan out, and cache the reference on a primary match.
    pub async fn submit(&self, record: &Record) -> BridgeResult<SubmitOutcome> {
        if self.cache.exists(record.reference()) {
            tracing::debug!(reference = record.reference(), "Record already sent");
            return Ok(SubmitOutcome {
                already_sent: true,
                has_matches: false,
            });
        }

        let has_matches = match &self.pool {
            None => true,
            Some(pool) => {
                let results = pool
                    .fanout_post::<_, ScanCvResponse>(SCAN_CV_PATH, &ScanCvRequest { cv: record.raw() })
                    .await?;
                results.authoritative().has_matches
            }
        };

        if has_matches {
            self.cache.put(record.reference(), self.match_ttl);
        }
        tracing::info!(reference = record.reference(), has_matches, "Record submitted");

        Ok(SubmitOutcome {
            already_sent: false,
            has_matches,
        })
    }
}
