use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Partition of the store; bulk queries are per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Schedule,
    Speakers,
    Content,
    FormSubmission,
    Static,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Schedule,
        ContentType::Speakers,
        ContentType::Content,
        ContentType::FormSubmission,
        ContentType::Static,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Schedule => "schedule",
            ContentType::Speakers => "speakers",
            ContentType::Content => "content",
            ContentType::FormSubmission => "form-submission",
            ContentType::Static => "static",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::new("content type", s))
    }
}

/// Eviction priority. Variants are declared lowest first so the derived
/// ordering reads `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(ParseError::new("priority", s)),
        }
    }
}

/// Delivery state. Only form submissions ever leave `Synced`, but every
/// record carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Synced | SyncStatus::Failed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(ParseError::new("sync status", s)),
        }
    }
}

/// The unit of storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    /// Codec output; base64 in the on-disk JSON.
    #[serde(with = "payload_encoding")]
    pub payload: Vec<u8>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    #[serde(rename = "syncStatus")]
    pub sync_status: SyncStatus,
    #[serde(rename = "retryCount", default)]
    pub retry_count: u32,
}

impl ContentRecord {
    /// True once `expires_at` lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    /// Form submissions still waiting for delivery.
    pub fn is_pending_submission(&self) -> bool {
        self.content_type == ContentType::FormSubmission && self.sync_status == SyncStatus::Pending
    }

    /// Checks the record-level invariants the store enforces on `put`.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("id must not be empty".to_string());
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at < self.created_at {
                return Err(format!(
                    "expiresAt {} precedes createdAt {}",
                    expires_at, self.created_at
                ));
            }
        }
        Ok(())
    }

    /// Length of the record's JSON form, the unit used for size accounting.
    pub fn serialized_len(&self) -> Result<usize, serde_json::Error> {
        serde_json::to_vec(self).map(|bytes| bytes.len())
    }
}

mod payload_encoding {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================
