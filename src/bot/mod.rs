//! # Bot Module
//!
//! Command handling for the music bot.
//!
//! [`MusicBot`] owns the audio node and the manager registry and turns each
//! command into scheduler calls plus a reply text. The [`console`] drives it
//! from stdin; a chat gateway would call the same methods.
//!
//! ## Example
//!
//! ```rust,no_run
//! use queuebot::{bot::{loader::LoadResult, MusicBot}, config::Config};
//! use serenity::model::id::{GuildId, UserId};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (bot, _events) = MusicBot::new(Config::load()?);
//! let reply = bot.load(GuildId::new(1), UserId::new(2), LoadResult::Empty);
//! println!("{}", reply.message);
//! # Ok(())
//! # }
//! ```

use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod console;
pub mod loader;

use crate::{
    audio::{
        manager::ManagerRegistry,
        node::{EventReceiver, LocalNode},
        scheduler::SchedulerOptions,
        session::{Completion, PlaybackSession},
    },
    config::Config,
    ui,
};
use loader::{AudioLoader, LoadResult};

/// Text to send back, plus the pending player call behind it.
#[derive(Debug)]
pub struct Reply {
    pub message: String,
    pub completion: Option<Completion>,
}

impl Reply {
    pub(crate) fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            completion: None,
        }
    }

    /// Waits for the player call, if any, and folds its error into the text.
    pub async fn resolve(self) -> String {
        match self.completion {
            Some(completion) => match completion.await {
                Ok(()) => self.message,
                Err(e) => format!("{}\nPlayer error: {}", self.message, e),
            },
            None => self.message,
        }
    }
}

pub struct MusicBot {
    config: Arc<Config>,
    node: Arc<LocalNode>,
    registry: Arc<ManagerRegistry>,
}

impl MusicBot {
    /// Builds the node and registry. The receiver carries the node's events
    /// and must be handed to [`MusicBot::spawn_event_loop`].
    pub fn new(config: Config) -> (Self, EventReceiver) {
        let (node, events) = LocalNode::new(config.node_name.clone(), config.playback_speed);
        let registry = Arc::new(ManagerRegistry::new(
            node.clone(),
            SchedulerOptions::from(&config),
        ));

        let bot = Self {
            config: Arc::new(config),
            node,
            registry,
        };
        (bot, events)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node(&self) -> &Arc<LocalNode> {
        &self.node
    }

    pub fn registry(&self) -> &Arc<ManagerRegistry> {
        &self.registry
    }

    pub fn spawn_event_loop(
        &self,
        events: EventReceiver,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.registry).run_events(events, shutdown))
    }

    /// Encola lo que haya producido la carga para `requester`.
    pub fn load(&self, guild_id: GuildId, requester: UserId, result: LoadResult) -> Reply {
        let manager = self.registry.get_or_create(guild_id);
        AudioLoader::new(&manager, requester).handle(result)
    }

    pub fn stop(&self, guild_id: GuildId) -> Reply {
        let outcome = self.registry.stop(guild_id);
        info!("🧹 Eliminados {} tracks en cola en guild {}", outcome.cleared, guild_id);
        Reply {
            message: "Stopped the current track and clearing the queue".to_string(),
            completion: outcome.completion,
        }
    }

    pub fn now_playing(&self, guild_id: GuildId) -> String {
        let Some(link) = self.node.link(guild_id) else {
            return "Not connected or no player available!".to_string();
        };

        match link.current_track() {
            Some(track) => ui::now_playing(&track, link.position()),
            None => "Nothing playing currently!".to_string(),
        }
    }

    pub fn queue(&self, guild_id: GuildId, page: usize) -> String {
        let current = self
            .node
            .link(guild_id)
            .and_then(|link| link.current_track());
        let queue = self.registry.queue_snapshot(guild_id);
        ui::queue_listing(current.as_ref(), &queue, page)
    }

    pub fn queue_json(&self, guild_id: GuildId) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.registry.queue_snapshot(guild_id))
    }

    pub fn join(&self, guild_id: GuildId) -> String {
        let link = self.node.connect(guild_id);
        format!(
            "Joined voice in guild {} on node '{}'",
            link.guild_id(),
            self.node.name()
        )
    }

    /// Limpia la cola del guild y destruye su link.
    pub async fn leave(&self, guild_id: GuildId) -> String {
        if self.node.link(guild_id).is_none() {
            return "Not connected!".to_string();
        }

        let outcome = self.registry.stop(guild_id);
        if let Some(completion) = outcome.completion {
            // El link se destruye de todas formas
            let _ = completion.await;
        }
        self.node.disconnect(guild_id);
        "Left the voice channel".to_string()
    }

    /// Node and registry overview for the console.
    pub fn status(&self) -> String {
        format!(
            "Node '{}': {} links, {} guild managers ({} created)",
            self.node.name(),
            self.node.link_count(),
            self.registry.len(),
            self.registry.created_count(),
        )
    }

    pub async fn shutdown(&self) {
        let guilds = self.registry.stop_all().await;
        self.node.shutdown();
        info!("👋 Reproducción detenida en {} guilds", guilds);
    }
}
