//! Watermark tracking
//!
//! The watermark is the newest message already reported. Only messages
//! received strictly after it are new, and it never moves backwards.

use crate::{CoreResult, MessageSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Last seen message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub received_at: DateTime<Utc>,
    pub message_id: String,
}

impl Watermark {
    /// Timestamp literal for an OData `receivedDateTime gt ...` filter
    pub fn filter_value(&self) -> String {
        self.received_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Whether `message` lies strictly after this watermark
    pub fn admits(&self, message: &MessageSummary) -> bool {
        message.id != self.message_id && message.received_at > self.received_at
    }
}

impl From<&MessageSummary> for Watermark {
    fn from(message: &MessageSummary) -> Self {
        Self {
            received_at: message.received_at,
            message_id: message.id.clone(),
        }
    }
}

/// Pick the new messages out of a fetched batch.
///
/// Returns at most `limit` of them, oldest first, together with the watermark
/// to use next. The watermark stops at the newest message returned, so any
/// newer ones left over are picked up by the next poll. It is never older
/// than `watermark`; for an empty selection it is `watermark` unchanged.
pub fn select_new(
    watermark: Option<&Watermark>,
    batch: Vec<MessageSummary>,
    limit: usize,
) -> (Vec<MessageSummary>, Option<Watermark>) {
    let mut fresh: Vec<MessageSummary> = batch
        .into_iter()
        .filter(|m| watermark.map_or(true, |w| w.admits(m)))
        .collect();

    // API order is newest first; reverse so equal timestamps stay in arrival order
    fresh.reverse();
    fresh.sort_by_key(|m| m.received_at);
    fresh.dedup_by(|a, b| a.id == b.id);

    if fresh.len() > limit {
        debug!(
            "{} new messages, reporting the oldest {}",
            fresh.len(),
            limit
        );
        fresh.truncate(limit);
    }

    let next = match fresh.last() {
        Some(newest) => Some(Watermark::from(newest)),
        None => watermark.cloned(),
    };

    (fresh, next)
}

/// On-disk form, compatible with the `.last_email.json` tracking file
#[derive(Debug, Serialize, Deserialize)]
struct TrackingRecord {
    last_received_datetime: String,
    last_message_id: String,
    #[serde(default)]
    last_subject: Option<String>,
    #[serde(default)]
    last_from: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
}

/// JSON file holding the watermark between runs
#[derive(Debug, Clone)]
pub struct WatermarkFile {
    path: PathBuf,
}

impl WatermarkFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored watermark. A missing file means first run; an
    /// unreadable one is reported and treated the same way.
    pub fn load(&self) -> Option<Watermark> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read tracking file {}: {}", self.path.display(), e);
                return None;
            }
        };

        let record: TrackingRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring corrupt tracking file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match DateTime::parse_from_rfc3339(&record.last_received_datetime) {
            Ok(ts) => Some(Watermark {
                received_at: ts.with_timezone(&Utc),
                message_id: record.last_message_id,
            }),
            Err(e) => {
                warn!(
                    "Ignoring tracking file {} with bad timestamp: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Record `newest` as the last processed message
    pub fn save(&self, newest: &MessageSummary) -> CoreResult<()> {
        let record = TrackingRecord {
            last_received_datetime: newest
                .received_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            last_message_id: newest.id.clone(),
            last_subject: newest.subject.clone(),
            last_from: newest.from.clone(),
            last_updated: Some(Utc::now().to_rfc3339()),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| crate::CoreError::Parse(e.to_string()))?;

        // Write beside the target, then rename, so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Tracking file {} updated", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn msg(id: &str, received_at: DateTime<Utc>) -> MessageSummary {
        MessageSummary {
            id: id.to_string(),
            subject: Some(format!("subject {}", id)),
            from: Some("alice@example.com".to_string()),
            to: vec!["shared@contoso.com".to_string()],
            received_at,
            has_attachments: false,
            preview: None,
        }
    }

    #[test]
    fn test_select_advances_to_newest_and_orders_oldest_first() {
        let t0 = Watermark {
            received_at: at(8, 0),
            message_id: "m0".to_string(),
        };
        // Newest first, as the API returns them
        let batch = vec![msg("m3", at(9, 30)), msg("m2", at(9, 20)), msg("m1", at(9, 10))];

        let (fresh, next) = select_new(Some(&t0), batch, 50);

        let ids: Vec<_> = fresh.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(next.unwrap().received_at, at(9, 30));
    }

    #[test]
    fn test_burst_over_limit_keeps_oldest_and_stops_watermark_there() {
        let t0 = Watermark {
            received_at: at(8, 0),
            message_id: "m0".to_string(),
        };
        let batch = vec![msg("m3", at(9, 30)), msg("m2", at(9, 20)), msg("m1", at(9, 10))];

        let (fresh, next) = select_new(Some(&t0), batch, 2);
        let ids: Vec<_> = fresh.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        let next = next.unwrap();
        assert_eq!(next.message_id, "m2");

        // The leftover is still new against the advanced watermark
        let (fresh, next) = select_new(Some(&next), vec![msg("m3", at(9, 30))], 2);
        assert_eq!(fresh[0].id, "m3");
        assert_eq!(next.unwrap().message_id, "m3");
    }

    #[test]
    fn test_empty_batch_keeps_watermark() {
        let t0 = Watermark {
            received_at: at(8, 0),
            message_id: "m0".to_string(),
        };
        let (fresh, next) = select_new(Some(&t0), Vec::new(), 50);
        assert!(fresh.is_empty());
        assert_eq!(next, Some(t0));

        let (fresh, next) = select_new(None, Vec::new(), 50);
        assert!(fresh.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn test_already_seen_messages_are_dropped() {
        let w = Watermark {
            received_at: at(9, 0),
            message_id: "m5".to_string(),
        };
        let batch = vec![
            msg("m6", at(9, 1)),
            // Same id as the watermark
            msg("m5", at(9, 0)),
            // Same second, different id: not strictly after
            msg("m4", at(9, 0)),
            // Older than the watermark
            msg("m3", at(8, 59)),
        ];

        let (fresh, next) = select_new(Some(&w), batch, 50);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "m6");
        assert_eq!(next.unwrap().message_id, "m6");
    }

    #[test]
    fn test_stale_batch_never_moves_watermark_back() {
        let w = Watermark {
            received_at: at(10, 0),
            message_id: "m9".to_string(),
        };
        let (fresh, next) = select_new(Some(&w), vec![msg("m1", at(7, 0))], 50);
        assert!(fresh.is_empty());
        assert_eq!(next, Some(w));
    }

    #[test]
    fn test_first_run_takes_everything() {
        let (fresh, next) = select_new(None, vec![msg("b", at(9, 5)), msg("a", at(9, 0))], 50);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].id, "a");
        assert_eq!(next.unwrap().message_id, "b");
    }

    #[test]
    fn test_filter_value_format() {
        let w = Watermark {
            received_at: at(9, 30),
            message_id: "x".to_string(),
        };
        assert_eq!(w.filter_value(), "2024-03-01T09:30:00Z");
    }

    #[test]
    fn test_tracking_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = WatermarkFile::new(dir.path().join(".last_email.json"));
        assert_eq!(file.load(), None);

        let newest = msg("AAMk42", at(11, 15));
        file.save(&newest).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded, Watermark::from(&newest));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(raw["last_message_id"], "AAMk42");
        assert_eq!(raw["last_from"], "alice@example.com");
    }

    #[test]
    fn test_corrupt_tracking_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(WatermarkFile::new(&path).load(), None);
    }

    #[test]
    fn test_reads_tracking_file_written_by_older_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".last_email.json");
        std::fs::write(
            &path,
            r#"{
  "last_received_datetime": "2024-03-01T09:30:00Z",
  "last_message_id": "AAMkOld",
  "last_subject": "Hello",
  "last_from": "bob@example.com",
  "last_updated": "2024-03-01T09:31:02.123456"
}"#,
        )
        .unwrap();

        let loaded = WatermarkFile::new(&path).load().unwrap();
        assert_eq!(loaded.message_id, "AAMkOld");
        assert_eq!(loaded.received_at, at(9, 30));
    }
}
