//! Firebase Realtime Database read client
//!
//! The dataset lives under one secret node and is read in a single REST call:
//! `GET {base_url}/{hidden_path}.json`.
//!
//! Firebase answers with a keyed object, or with an array (holes as `null`)
//! when the keys happen to be sequential integers. Both shapes are accepted.
//! Keyed records come out with integer-like keys first in numeric order,
//! then the remaining keys in document order.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::Meteorite;
use crate::utils::constants::USER_AGENT;

/// Source of the full record set.
///
/// `Ok(None)` means the store answered but holds no dataset.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_all(&self) -> AppResult<Option<Vec<Meteorite>>>;
}

/// Raw payload shapes returned by the REST API
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FirebasePayload {
    Keyed(Map<String, Value>),
    Indexed(Vec<Option<Meteorite>>),
}

impl FirebasePayload {
    /// Flatten into records, using the node key as id when the record has none.
    fn into_records(self) -> AppResult<Vec<Meteorite>> {
        match self {
            Self::Keyed(map) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                // Stable: non-index keys keep document order
                entries.sort_by_key(|(key, _)| match array_index(key) {
                    Some(index) => (0, index),
                    None => (1, 0),
                });

                let mut records = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    if value.is_null() {
                        continue;
                    }
                    let mut m: Meteorite = serde_json::from_value(value)?;
                    if m.id.trim().is_empty() {
                        m.id = key;
                    }
                    records.push(m);
                }
                Ok(records)
            }
            Self::Indexed(list) => Ok(list
                .into_iter()
                .enumerate()
                .filter_map(|(index, slot)| {
                    slot.map(|mut m| {
                        if m.id.trim().is_empty() {
                            m.id = index.to_string();
                        }
                        m
                    })
                })
                .collect()),
        }
    }
}

/// Canonical array index (`"0"`, `"17"`, never `"07"`), which object
/// iteration visits before every other key
fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|i| *i < u32::MAX)
}

/// Reads the dataset node over HTTPS
pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    hidden_path: String,
    timeout: Duration,
}

impl FirebaseStore {
    pub fn new(base_url: impl Into<String>, hidden_path: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            hidden_path: hidden_path.into(),
            timeout,
        }
    }

    /// Full node URL. The path is secret, so this is never logged.
    fn node_url(&self) -> String {
        format!(
            "{}/{}.json",
            self.base_url.trim_end_matches('/'),
            self.hidden_path.trim_matches('/')
        )
    }
}

#[async_trait]
impl RecordStore for FirebaseStore {
    async fn fetch_all(&self) -> AppResult<Option<Vec<Meteorite>>> {
        info!("📡 Firebase: reading dataset node");

        let response = self
            .client
            .get(self.node_url())
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::store_invalid_response(format!(
                "Firebase answered {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Firebase payload received");

        let payload: Option<FirebasePayload> = serde_json::from_slice(&body)?;
        payload.map(FirebasePayload::into_records).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_payload_backfills_id() {
        let raw = r#"{"k1":{"id":"1","name":"Aachen"},"k2":{"name":"Aarhus"}}"#;
        let payload: Option<FirebasePayload> = serde_json::from_str(raw).unwrap();
        let records = payload.unwrap().into_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "1");
        assert_eq!(records[1].id, "k2");
    }

    #[test]
    fn test_indexed_payload_skips_holes() {
        let raw = r#"[null,{"name":"Aachen"},null,{"id":"9","name":"Abee"}]"#;
        let payload: Option<FirebasePayload> = serde_json::from_str(raw).unwrap();
        let records = payload.unwrap().into_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "1");
        assert_eq!(records[1].id, "9");
    }

    #[test]
    fn test_keyed_payload_orders_like_object_iteration() {
        let raw = r#"{"b":{"name":"B"},"10":{"name":"Ten"},"2":{"name":"Two"},"a":{"name":"A"},"1":{"name":"One"},"01":{"name":"Padded"}}"#;
        let payload: Option<FirebasePayload> = serde_json::from_str(raw).unwrap();
        let ids: Vec<String> = payload
            .unwrap()
            .into_records()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "10", "b", "a", "01"]);
    }

    #[test]
    fn test_array_index_keys() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("042"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("4294967295"), None);
        assert_eq!(array_index(""), None);
    }

    #[test]
    fn test_null_payload_is_no_dataset() {
        let payload: Option<FirebasePayload> = serde_json::from_str("null").unwrap();
        assert!(payload.is_none());
    }

    #[test]
    fn test_node_url_normalizes_slashes() {
        let store = FirebaseStore::new("https://db.example.com/", "/hidden/path/", Duration::from_secs(1));
        assert_eq!(store.node_url(), "https://db.example.com/hidden/path.json");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_an_error() {
        let store = FirebaseStore::new("http://127.0.0.1:9", "data", Duration::from_millis(500));
        assert!(store.fetch_all().await.is_err());
    }
}
