use serenity::model::id::UserId;
use tracing::{info, warn};

use crate::{
    audio::{
        manager::GuildMusicManager,
        scheduler::{BatchOutcome, EnqueueOutcome},
        track::Track,
    },
    bot::Reply,
    ui,
};

/// What the node returned for a load request.
#[derive(Debug, Clone)]
pub enum LoadResult {
    Track(Track),
    Playlist { name: String, tracks: Vec<Track> },
    Search(Vec<Track>),
    Empty,
    Error(String),
}

/// Feeds one load result into a guild's scheduler on behalf of `requester`.
pub struct AudioLoader<'a> {
    manager: &'a GuildMusicManager,
    requester: UserId,
}

impl<'a> AudioLoader<'a> {
    pub fn new(manager: &'a GuildMusicManager, requester: UserId) -> Self {
        Self { manager, requester }
    }

    pub fn handle(&self, result: LoadResult) -> Reply {
        match result {
            LoadResult::Track(track) => self.track_loaded(track),
            LoadResult::Playlist { name, tracks } => self.playlist_loaded(&name, tracks),
            LoadResult::Search(tracks) => self.search_loaded(tracks),
            LoadResult::Empty => Reply::text("No matches found for your input!"),
            LoadResult::Error(message) => {
                warn!("Falló la carga en guild {}: {}", self.manager.guild_id(), message);
                Reply::text(format!("Failed to load track! {}", message))
            }
        }
    }

    fn track_loaded(&self, track: Track) -> Reply {
        let track = track.with_requester(self.requester);
        let message = ui::track_added(&track);
        self.enqueue(track, message)
    }

    /// Encola y responde con `message` solo si el track fue aceptado.
    fn enqueue(&self, track: Track, message: String) -> Reply {
        match self.manager.scheduler().enqueue(track) {
            Ok(EnqueueOutcome::Started(completion)) => Reply {
                message,
                completion: Some(completion),
            },
            Ok(EnqueueOutcome::Queued { .. }) => Reply::text(message),
            Err(e) => Reply::text(format!("Could not queue track: {}", e)),
        }
    }

    fn playlist_loaded(&self, name: &str, tracks: Vec<Track>) -> Reply {
        let tracks: Vec<_> = tracks
            .into_iter()
            .map(|track| track.with_requester(self.requester))
            .collect();
        let BatchOutcome {
            added,
            dropped,
            started,
        } = self.manager.scheduler().enqueue_batch(tracks);

        info!("📋 Playlist '{}' cargada: {} tracks", name, added);
        let mut message = format!("Added {} tracks to the queue from {}!", added, name);
        if dropped > 0 {
            message.push_str(&format!(" ({} skipped, queue is full)", dropped));
        }

        Reply {
            message,
            completion: started,
        }
    }

    fn search_loaded(&self, tracks: Vec<Track>) -> Reply {
        let Some(first) = tracks.into_iter().next() else {
            return Reply::text("No tracks found!");
        };

        let first = first.with_requester(self.requester);
        let message = format!("Adding to queue: {}", first.title());
        self.enqueue(first, message)
    }
}
