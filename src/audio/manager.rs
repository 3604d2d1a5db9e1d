use dashmap::DashMap;
use futures::future::join_all;
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        events::NodeEvent,
        scheduler::{BatchOutcome, EnqueueOutcome, SchedulerOptions, StopOutcome, TrackScheduler},
        session::{Completion, SessionProvider},
        track::Track,
    },
    error::SchedulerError,
};

/// Discord closes the voice websocket with this code when the session is no
/// longer valid.
const SESSION_INVALID: u16 = 4006;

/// Playback state owned by one guild.
pub struct GuildMusicManager {
    guild_id: GuildId,
    scheduler: TrackScheduler,
}

impl GuildMusicManager {
    pub fn new(
        guild_id: GuildId,
        provider: Arc<dyn SessionProvider>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            guild_id,
            scheduler: TrackScheduler::new(guild_id, provider, options),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn scheduler(&self) -> &TrackScheduler {
        &self.scheduler
    }

    pub fn stop(&self) -> StopOutcome {
        self.scheduler.stop()
    }
}

/// Guild id to manager map. Managers are created on first use and kept until
/// [`ManagerRegistry::remove`].
pub struct ManagerRegistry {
    managers: DashMap<GuildId, Arc<GuildMusicManager>>,
    provider: Arc<dyn SessionProvider>,
    options: SchedulerOptions,
    created: AtomicUsize,
}

impl ManagerRegistry {
    pub fn new(provider: Arc<dyn SessionProvider>, options: SchedulerOptions) -> Self {
        Self {
            managers: DashMap::new(),
            provider,
            options,
            created: AtomicUsize::new(0),
        }
    }

    /// Existing manager, or one built and stored atomically.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildMusicManager> {
        self.managers
            .entry(guild_id)
            .or_insert_with(|| {
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!("🆕 Manager de música creado para guild {}", guild_id);
                Arc::new(GuildMusicManager::new(
                    guild_id,
                    Arc::clone(&self.provider),
                    self.options,
                ))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildMusicManager>> {
        self.managers.get(&guild_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildMusicManager>> {
        self.managers.remove(&guild_id).map(|(_, manager)| manager)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Number of managers ever constructed, including removed ones.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn enqueue(
        &self,
        guild_id: GuildId,
        track: Track,
    ) -> Result<EnqueueOutcome, SchedulerError> {
        self.get_or_create(guild_id).scheduler().enqueue(track)
    }

    pub fn enqueue_batch(&self, guild_id: GuildId, tracks: Vec<Track>) -> BatchOutcome {
        self.get_or_create(guild_id).scheduler().enqueue_batch(tracks)
    }

    pub fn stop(&self, guild_id: GuildId) -> StopOutcome {
        self.get_or_create(guild_id).stop()
    }

    /// Pending tracks in play order; empty for unseen guilds.
    pub fn queue_snapshot(&self, guild_id: GuildId) -> Vec<Track> {
        self.get(guild_id)
            .map(|manager| manager.scheduler().snapshot())
            .unwrap_or_default()
    }

    /// Enruta un evento del nodo al planificador del guild.
    pub fn handle_event(&self, event: NodeEvent) -> Option<Completion> {
        let guild_id = event.guild_id();

        match event {
            NodeEvent::TrackStart { track, .. } => {
                if let Some(manager) = self.get(guild_id) {
                    manager.scheduler().on_track_start(&track);
                }
                None
            }
            NodeEvent::TrackEnd { track, reason, .. } => match self.get(guild_id) {
                Some(manager) => manager.scheduler().on_track_end(&track, reason),
                None => {
                    debug!("Fin de track para guild sin manager {}, ignorado", guild_id);
                    None
                }
            },
            NodeEvent::TrackException { track, message, .. } => {
                warn!("⚠️ Track {} falló en guild {}: {}", track.title(), guild_id, message);
                None
            }
            NodeEvent::TrackStuck {
                track,
                threshold_ms,
                ..
            } => {
                warn!(
                    "⚠️ Track {} atascado por {}ms en guild {}",
                    track.title(),
                    threshold_ms,
                    guild_id
                );
                None
            }
            NodeEvent::WebSocketClosed { code, reason, .. } => {
                if code == SESSION_INVALID {
                    warn!("🔌 Sesión de voz invalidada en guild {}, hay que reconectar", guild_id);
                } else {
                    warn!("🔌 Websocket de voz cerrado en guild {} ({}): {}", guild_id, code, reason);
                }
                None
            }
        }
    }

    /// Consume eventos hasta que se cierre el canal o se dispare `shutdown`.
    pub async fn run_events(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<NodeEvent>,
        shutdown: CancellationToken,
    ) {
        info!("📡 Escuchando eventos del nodo");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        // Los resultados de inicio los reporta el propio despachador
                        let _ = self.handle_event(event);
                    }
                    None => break,
                },
            }
        }
        info!("📡 Loop de eventos del nodo detenido");
    }

    /// Detiene todos los guilds y espera a que se limpien los reproductores.
    pub async fn stop_all(&self) -> usize {
        let managers: Vec<_> = self
            .managers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let completions: Vec<_> = managers
            .iter()
            .filter_map(|manager| manager.stop().completion)
            .collect();

        for result in join_all(completions).await {
            if let Err(e) = result {
                warn!("❌ Falló la limpieza del reproductor al apagar: {}", e);
            }
        }
        managers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        events::TrackEndReason,
        node::LocalNode,
        session::PlaybackSession,
        track::test_track,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn registry() -> (Arc<LocalNode>, crate::audio::node::EventReceiver, Arc<ManagerRegistry>) {
        let (node, events) = LocalNode::new("test", 0.0);
        let registry = Arc::new(ManagerRegistry::new(node.clone(), SchedulerOptions::default()));
        (node, events, registry)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_builds_once() {
        let (_node, _events, registry) = registry();
        let guild = GuildId::new(77);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create(guild) })
            })
            .collect();
        let managers: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(registry.created_count(), 1);
        assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
    }

    #[tokio::test]
    async fn test_guilds_are_independent() {
        let (node, _events, registry) = registry();
        let (g1, g2) = (GuildId::new(1), GuildId::new(2));

        registry.enqueue(g1, test_track("a")).unwrap();
        let other = registry.enqueue(g2, test_track("x")).unwrap();
        registry.enqueue(g1, test_track("b")).unwrap();
        if let EnqueueOutcome::Started(completion) = other {
            completion.await.unwrap();
        }

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.queue_snapshot(g1).len(), 1);
        assert!(registry.queue_snapshot(g2).is_empty());

        let stopped = registry.stop(g1);
        stopped.completion.unwrap().await.unwrap();
        assert!(registry.queue_snapshot(g1).is_empty());
        assert_eq!(
            node.link(g2).unwrap().current_track().map(|t| t.title().to_string()),
            Some("x".to_string())
        );
    }

    #[tokio::test]
    async fn test_stop_on_unseen_guild_creates_manager() {
        let (_node, _events, registry) = registry();
        let guild = GuildId::new(5);

        let outcome = registry.stop(guild);

        assert_eq!(outcome.cleared, 0);
        assert!(outcome.completion.is_none());
        assert!(registry.get(guild).is_some());
        assert!(registry.queue_snapshot(GuildId::new(6)).is_empty());
        assert!(registry.get(GuildId::new(6)).is_none());
    }

    #[tokio::test]
    async fn test_event_loop_advances_queue() {
        let (node, events, registry) = registry();
        let guild = GuildId::new(9);
        let shutdown = CancellationToken::new();
        let listener = tokio::spawn(Arc::clone(&registry).run_events(events, shutdown.clone()));

        match registry.enqueue(guild, test_track("a")).unwrap() {
            EnqueueOutcome::Started(completion) => completion.await.unwrap(),
            other => panic!("expected start, got {other:?}"),
        }
        registry.enqueue(guild, test_track("b")).unwrap();

        node.finish_current(guild);

        let mut advanced = false;
        for _ in 0..50 {
            let current = node.link(guild).and_then(|link| link.current_track());
            if current.is_some_and(|t| t.title() == "b") {
                advanced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(advanced, "queue did not advance after track end");
        assert!(registry.queue_snapshot(guild).is_empty());

        shutdown.cancel();
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_event_does_not_advance() {
        let (node, mut events, registry) = registry();
        let guild = GuildId::new(3);

        match registry.enqueue(guild, test_track("a")).unwrap() {
            EnqueueOutcome::Started(completion) => completion.await.unwrap(),
            other => panic!("expected start, got {other:?}"),
        }
        registry.enqueue(guild, test_track("b")).unwrap();

        node.disconnect(guild);

        while let Ok(event) = events.try_recv() {
            if let NodeEvent::TrackEnd { reason, .. } = &event {
                assert_eq!(*reason, TrackEndReason::Cleanup);
            }
            assert!(registry.handle_event(event).is_none());
        }
        assert_eq!(registry.queue_snapshot(guild).len(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_clears_every_guild() {
        let (node, _events, registry) = registry();
        for id in 1..=3 {
            let guild = GuildId::new(id);
            if let EnqueueOutcome::Started(completion) =
                registry.enqueue(guild, test_track("a")).unwrap()
            {
                completion.await.unwrap();
            }
            registry.enqueue(guild, test_track("b")).unwrap();
        }

        assert_eq!(registry.stop_all().await, 3);

        for id in 1..=3 {
            let guild = GuildId::new(id);
            assert!(registry.queue_snapshot(guild).is_empty());
            assert!(node.link(guild).unwrap().current_track().is_none());
        }
    }
}
