use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;

use crate::audio::track::Track;

/// Why the node stopped playing a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    /// Played to the end
    Finished,
    /// The node could not load or decode the track
    LoadFailed,
    /// Playback was stopped on request
    Stopped,
    /// Another track was started over this one
    Replaced,
    /// The player was torn down with the link
    Cleanup,
}

impl TrackEndReason {
    /// Whether the scheduler may advance the queue after this reason.
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished)
    }
}

/// Events pushed by the audio node for a guild's player.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    TrackStart {
        guild_id: GuildId,
        track: Track,
    },
    TrackEnd {
        guild_id: GuildId,
        track: Track,
        reason: TrackEndReason,
    },
    TrackException {
        guild_id: GuildId,
        track: Track,
        message: String,
    },
    TrackStuck {
        guild_id: GuildId,
        track: Track,
        threshold_ms: u64,
    },
    WebSocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
    },
}

impl NodeEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            NodeEvent::TrackStart { guild_id, .. }
            | NodeEvent::TrackEnd { guild_id, .. }
            | NodeEvent::TrackException { guild_id, .. }
            | NodeEvent::TrackStuck { guild_id, .. }
            | NodeEvent::WebSocketClosed { guild_id, .. } => *guild_id,
        }
    }
}
