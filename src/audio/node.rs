//! In-process audio node.
//!
//! Stands in for a remote node: keeps one player per connected guild, plays
//! tracks on a timer and reports start/end through an event channel, the same
//! way a remote node pushes events over its websocket.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        events::{NodeEvent, TrackEndReason},
        session::{PlaybackSession, SessionProvider},
        track::Track,
    },
    error::SessionError,
};

pub type EventReceiver = mpsc::UnboundedReceiver<NodeEvent>;

pub struct LocalNode {
    name: String,
    sessions: DashMap<GuildId, Arc<LocalSession>>,
    events: mpsc::UnboundedSender<NodeEvent>,
    playback_speed: f64,
    shutdown: CancellationToken,
}

impl LocalNode {
    /// Creates the node and the receiving end of its event stream.
    ///
    /// Tracks end on their own after `length / playback_speed`; a speed of
    /// zero disables the timer so tracks only end through
    /// [`LocalNode::finish_current`].
    pub fn new(name: impl Into<String>, playback_speed: f64) -> (Arc<Self>, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let node = Arc::new(Self {
            name: name.into(),
            sessions: DashMap::new(),
            events,
            playback_speed: playback_speed.max(0.0),
            shutdown: CancellationToken::new(),
        });
        info!("🎼 Nodo de audio '{}' listo", node.name);
        (node, receiver)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Abre el link del guild o devuelve el existente.
    pub fn connect(&self, guild_id: GuildId) -> Arc<LocalSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🔗 Link creado para guild {} en '{}'", guild_id, self.name);
                Arc::new(LocalSession::new(
                    guild_id,
                    self.events.clone(),
                    self.playback_speed,
                    self.shutdown.child_token(),
                ))
            })
            .clone()
    }

    /// Tears down the guild's link. The current track, if any, ends with
    /// [`TrackEndReason::Cleanup`].
    pub fn disconnect(&self, guild_id: GuildId) -> bool {
        match self.sessions.remove(&guild_id) {
            Some((_, session)) => {
                session.end_current(TrackEndReason::Cleanup);
                session.closed.cancel();
                info!("👋 Link destruido para guild {}", guild_id);
                true
            }
            None => false,
        }
    }

    pub fn link(&self, guild_id: GuildId) -> Option<Arc<LocalSession>> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn link_count(&self) -> usize {
        self.sessions.len()
    }

    /// Termina el track actual como si hubiera sonado completo.
    pub fn finish_current(&self, guild_id: GuildId) -> Option<Track> {
        self.link(guild_id)?.end_current(TrackEndReason::Finished)
    }

    /// Termina el track actual con un fallo de carga.
    pub fn fail_current(&self, guild_id: GuildId, message: &str) -> Option<Track> {
        let session = self.link(guild_id)?;
        let track = session.current_track()?;
        let _ = self.events.send(NodeEvent::TrackException {
            guild_id,
            track,
            message: message.to_string(),
        });
        session.end_current(TrackEndReason::LoadFailed)
    }

    /// Detiene todos los reproductores y rechaza pedidos nuevos.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        info!("🛑 Nodo de audio '{}' apagado", self.name);
    }
}

impl SessionProvider for LocalNode {
    fn session(&self, guild_id: GuildId) -> Option<Arc<dyn PlaybackSession>> {
        self.link(guild_id)
            .map(|session| session as Arc<dyn PlaybackSession>)
    }

    fn session_or_create(&self, guild_id: GuildId) -> Arc<dyn PlaybackSession> {
        self.connect(guild_id)
    }
}

struct PlayingTrack {
    id: u64,
    track: Track,
    started_at: Instant,
    timer: CancellationToken,
}

#[derive(Default)]
struct PlayerState {
    current: Option<PlayingTrack>,
    volume: u16,
    plays: u64,
}

/// One guild's player on a [`LocalNode`].
pub struct LocalSession {
    guild_id: GuildId,
    state: Arc<Mutex<PlayerState>>,
    events: mpsc::UnboundedSender<NodeEvent>,
    playback_speed: f64,
    closed: CancellationToken,
}

impl LocalSession {
    fn new(
        guild_id: GuildId,
        events: mpsc::UnboundedSender<NodeEvent>,
        playback_speed: f64,
        closed: CancellationToken,
    ) -> Self {
        Self {
            guild_id,
            state: Arc::new(Mutex::new(PlayerState::default())),
            events,
            playback_speed,
            closed,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn volume(&self) -> u16 {
        self.state.lock().volume
    }

    /// Playback position of the current track, scaled by the node speed.
    pub fn position(&self) -> Option<Duration> {
        let state = self.state.lock();
        let playing = state.current.as_ref()?;
        let elapsed = playing.started_at.elapsed();
        let scaled = if self.playback_speed > 0.0 {
            elapsed.mul_f64(self.playback_speed)
        } else {
            elapsed
        };
        Some(scaled.min(playing.track.length()))
    }

    fn end_current(&self, reason: TrackEndReason) -> Option<Track> {
        let ended = self.state.lock().current.take()?;
        ended.timer.cancel();
        self.emit_end(ended.track.clone(), reason);
        Some(ended.track)
    }

    fn emit_end(&self, track: Track, reason: TrackEndReason) {
        debug!("⏹️ Track terminado en guild {} ({:?}): {}", self.guild_id, reason, track.title());
        let _ = self.events.send(NodeEvent::TrackEnd {
            guild_id: self.guild_id,
            track,
            reason,
        });
    }

    fn spawn_timer(&self, track: &Track, play_id: u64, timer: CancellationToken) {
        if self.playback_speed <= 0.0 || track.info().is_stream {
            return;
        }

        let play_for = track.length().div_f64(self.playback_speed);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let guild_id = self.guild_id;

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(play_for) => {
                    let finished = {
                        let mut state = state.lock();
                        // Solo termina el track para el que se armó este timer
                        let same_play = state
                            .current
                            .as_ref()
                            .is_some_and(|playing| playing.id == play_id);
                        if same_play {
                            state.current.take()
                        } else {
                            None
                        }
                    };
                    if let Some(playing) = finished {
                        let _ = events.send(NodeEvent::TrackEnd {
                            guild_id,
                            track: playing.track,
                            reason: TrackEndReason::Finished,
                        });
                    }
                }
            }
        });
    }
}

#[async_trait]
impl PlaybackSession for LocalSession {
    fn current_track(&self) -> Option<Track> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|playing| playing.track.clone())
    }

    async fn start_track(&self, track: Track, volume: u16) -> Result<(), SessionError> {
        if self.closed.is_cancelled() {
            warn!("Inicio rechazado, el link de guild {} está cerrado", self.guild_id);
            return Err(SessionError::NodeUnavailable(format!(
                "link for guild {} is closed",
                self.guild_id
            )));
        }

        let timer = self.closed.child_token();
        let (play_id, replaced) = {
            let mut state = self.state.lock();
            state.volume = volume;
            state.plays += 1;
            let play_id = state.plays;
            let replaced = state.current.replace(PlayingTrack {
                id: play_id,
                track: track.clone(),
                started_at: Instant::now(),
                timer: timer.clone(),
            });
            (play_id, replaced)
        };

        if let Some(previous) = replaced {
            previous.timer.cancel();
            self.emit_end(previous.track, TrackEndReason::Replaced);
        }

        info!("▶️ Reproduciendo en guild {}: {}", self.guild_id, track.title());
        let _ = self.events.send(NodeEvent::TrackStart {
            guild_id: self.guild_id,
            track: track.clone(),
        });
        self.spawn_timer(&track, play_id, timer);
        Ok(())
    }

    async fn stop_and_clear(&self) -> Result<(), SessionError> {
        self.end_current(TrackEndReason::Stopped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::{test_track, TrackInfo};

    const GUILD: GuildId = GuildId::new(10);

    fn drain(events: &mut EventReceiver) -> Vec<NodeEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    fn end_reasons(events: &[NodeEvent]) -> Vec<TrackEndReason> {
        events
            .iter()
            .filter_map(|event| match event {
                NodeEvent::TrackEnd { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_starting_over_a_track_reports_replaced() {
        let (node, mut events) = LocalNode::new("test", 0.0);
        let session = node.session_or_create(GUILD);

        session.start_track(test_track("a"), 40).await.unwrap();
        session.start_track(test_track("b"), 40).await.unwrap();

        assert_eq!(end_reasons(&drain(&mut events)), vec![TrackEndReason::Replaced]);
        assert_eq!(session.current_track().unwrap().title(), "b");
        assert_eq!(node.link(GUILD).unwrap().volume(), 40);
    }

    #[tokio::test]
    async fn test_timer_finishes_track() {
        let (node, mut events) = LocalNode::new("test", 10_000.0);
        let session = node.session_or_create(GUILD);

        session.start_track(test_track("short"), 35).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(session.current_track().is_none());
        assert_eq!(end_reasons(&drain(&mut events)), vec![TrackEndReason::Finished]);
    }

    #[tokio::test]
    async fn test_streams_never_finish_on_their_own() {
        let (node, mut events) = LocalNode::new("test", 10_000.0);
        let session = node.session_or_create(GUILD);
        let radio = Track::new("enc:radio", TrackInfo::new("radio", Duration::ZERO).stream());

        session.start_track(radio, 35).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(session.current_track().is_some());
        assert!(end_reasons(&drain(&mut events)).is_empty());
    }

    #[tokio::test]
    async fn test_stop_and_disconnect() {
        let (node, mut events) = LocalNode::new("test", 0.0);
        let session = node.session_or_create(GUILD);

        session.stop_and_clear().await.unwrap();
        session.start_track(test_track("a"), 35).await.unwrap();
        session.stop_and_clear().await.unwrap();
        session.start_track(test_track("b"), 35).await.unwrap();
        assert!(node.disconnect(GUILD));
        assert!(!node.disconnect(GUILD));

        assert_eq!(
            end_reasons(&drain(&mut events)),
            vec![TrackEndReason::Stopped, TrackEndReason::Cleanup]
        );
        assert!(matches!(
            session.start_track(test_track("c"), 35).await,
            Err(SessionError::NodeUnavailable(_))
        ));
        assert!(node.session(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_tracks() {
        let (node, _events) = LocalNode::new("test", 0.0);
        let session = node.session_or_create(GUILD);

        node.shutdown();

        assert!(session.start_track(test_track("a"), 35).await.is_err());
    }
}
