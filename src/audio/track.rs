use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::time::Duration;

/// Display metadata the node returns alongside an encoded track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub author: Option<String>,
    pub length: Duration,
    pub uri: Option<String>,
    pub is_stream: bool,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>, length: Duration) -> Self {
        Self {
            title: title.into(),
            author: None,
            length,
            uri: None,
            is_stream: false,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn stream(mut self) -> Self {
        self.is_stream = true;
        self
    }
}

/// A playable item loaded from the audio node.
///
/// `encoded` is opaque to this crate; it is handed back to the node verbatim
/// when the track is started. Equality covers the handle, the metadata and the
/// requester, but not the time the track was queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    encoded: String,
    info: TrackInfo,
    requester: Option<UserId>,
    queued_at: DateTime<Utc>,
}

impl Track {
    pub fn new(encoded: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            encoded: encoded.into(),
            info,
            requester: None,
            queued_at: Utc::now(),
        }
    }

    // Getters
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
    pub fn info(&self) -> &TrackInfo {
        &self.info
    }
    pub fn title(&self) -> &str {
        &self.info.title
    }
    pub fn length(&self) -> Duration {
        self.info.length
    }
    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }
    pub fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }

    /// Returns a copy tagged with the user who asked for it.
    pub fn with_requester(mut self, user_id: UserId) -> Self {
        self.requester = Some(user_id);
        self
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
            && self.info == other.info
            && self.requester == other.requester
    }
}

impl Eq for Track {}

#[cfg(test)]
pub(crate) fn test_track(name: &str) -> Track {
    Track::new(
        format!("enc:{name}"),
        TrackInfo::new(name, Duration::from_secs(180)),
    )
}
