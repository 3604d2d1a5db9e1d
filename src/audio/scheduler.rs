use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        events::TrackEndReason,
        queue::TrackQueue,
        session::{Completion, PlaybackSession, SessionProvider},
        track::Track,
    },
    config::Config,
    error::{SchedulerError, SessionError},
};

/// Knobs the scheduler takes from the bot configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Volume sent with every start request
    pub volume: u16,
    /// `None` keeps the queue unbounded
    pub max_queue_size: Option<usize>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            volume: 35,
            max_queue_size: None,
        }
    }
}

impl From<&Config> for SchedulerOptions {
    fn from(config: &Config) -> Self {
        Self {
            volume: config.default_volume,
            max_queue_size: config.max_queue_size,
        }
    }
}

/// Observable playback state of one guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(Track),
    /// Stopped on request; nothing started since
    Draining,
}

#[derive(Debug)]
pub enum EnqueueOutcome {
    /// Nothing was playing; the track was sent straight to the player
    Started(Completion),
    /// Appended behind the current track, 1-based
    Queued { position: usize },
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// Tracks accepted, including the one started
    pub added: usize,
    /// Tracks dropped because the queue limit was reached
    pub dropped: usize,
    pub started: Option<Completion>,
}

#[derive(Debug)]
pub struct StopOutcome {
    pub cleared: usize,
    /// `None` when the guild had no session to clear
    pub completion: Option<Completion>,
}

enum SessionCommand {
    Start {
        track: Track,
        generation: u64,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

#[derive(Debug)]
struct SchedulerState {
    queue: TrackQueue,
    /// Último track enviado al reproductor que aún no terminó
    dispatched: Option<Track>,
    draining: bool,
    generation: u64,
    /// Inicios enviados al despachador sin respuesta todavía
    starts_in_flight: usize,
}

impl SchedulerState {
    /// Solo consulta; nunca modifica el estado.
    ///
    /// Sin sesión, un track despachado cuenta solo mientras su inicio sigue
    /// en vuelo (ese inicio es el que crea la sesión).
    fn is_playing(&self, session: Option<&Arc<dyn PlaybackSession>>) -> bool {
        match session {
            Some(session) => {
                self.dispatched.is_some() || (!self.draining && session.current_track().is_some())
            }
            None => self.starts_in_flight > 0 && self.dispatched.is_some(),
        }
    }

    fn mark_dispatched(&mut self, track: Track) -> u64 {
        self.generation += 1;
        self.starts_in_flight += 1;
        self.dispatched = Some(track);
        self.draining = false;
        self.generation
    }
}

/// Sequential playback for one guild.
///
/// Every operation takes the guild lock, looks up the session, decides, queues
/// the resulting session call on the guild's dispatcher and returns. Session
/// calls run in order on the dispatcher task, never under the lock.
pub struct TrackScheduler {
    guild_id: GuildId,
    provider: Arc<dyn SessionProvider>,
    state: Arc<Mutex<SchedulerState>>,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl TrackScheduler {
    /// Must be called from within a Tokio runtime; spawns the dispatcher.
    pub fn new(
        guild_id: GuildId,
        provider: Arc<dyn SessionProvider>,
        options: SchedulerOptions,
    ) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState {
            queue: TrackQueue::with_limit(options.max_queue_size),
            dispatched: None,
            draining: false,
            generation: 0,
            starts_in_flight: 0,
        }));
        let (commands, receiver) = mpsc::unbounded_channel();

        tokio::spawn(run_dispatcher(
            guild_id,
            Arc::clone(&provider),
            options.volume,
            Arc::clone(&state),
            receiver,
        ));

        Self {
            guild_id,
            provider,
            state,
            commands,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Inicia `track` de inmediato si el guild está libre; si no, lo encola.
    pub fn enqueue(&self, track: Track) -> Result<EnqueueOutcome, SchedulerError> {
        let mut state = self.state.lock();
        let session = self.provider.session(self.guild_id);

        if state.is_playing(session.as_ref()) {
            let position = state.queue.enqueue(track)?;
            return Ok(EnqueueOutcome::Queued { position });
        }

        Ok(EnqueueOutcome::Started(self.start(&mut state, track)))
    }

    /// Encola todos en orden y luego inicia la cabeza si el guild está libre.
    pub fn enqueue_batch(&self, tracks: Vec<Track>) -> BatchOutcome {
        let total = tracks.len();
        let mut state = self.state.lock();
        let session = self.provider.session(self.guild_id);

        let added = state.queue.enqueue_all(tracks);
        let dropped = total - added;
        if dropped > 0 {
            warn!(
                "⚠️ Límite de cola alcanzado en guild {}, descartados {} tracks",
                self.guild_id, dropped
            );
        }

        let started = if state.is_playing(session.as_ref()) {
            None
        } else {
            state
                .queue
                .poll_next()
                .map(|head| self.start(&mut state, head))
        };

        BatchOutcome {
            added,
            dropped,
            started,
        }
    }

    pub fn on_track_start(&self, track: &Track) {
        info!("🎵 Track iniciado en guild {}: {}", self.guild_id, track.title());
    }

    /// Avanza la cola cuando `reason` lo permite.
    pub fn on_track_end(&self, ended: &Track, reason: TrackEndReason) -> Option<Completion> {
        let mut state = self.state.lock();

        // El sucesor de un track reemplazado ya fue despachado
        if reason != TrackEndReason::Replaced {
            let ended_dispatched = state
                .dispatched
                .as_ref()
                .is_some_and(|current| current.encoded() == ended.encoded());
            if ended_dispatched {
                state.dispatched = None;
            }
        }

        if !reason.may_start_next() {
            debug!(
                "Track {} terminó en guild {} ({:?}), la cola no avanza",
                ended.title(),
                self.guild_id,
                reason
            );
            return None;
        }

        if let Some(current) = state.dispatched.as_ref() {
            debug!(
                "Evento de fin obsoleto para {} en guild {}, {} sigue sonando",
                ended.title(),
                self.guild_id,
                current.title()
            );
            return None;
        }

        match state.queue.poll_next() {
            Some(next) => Some(self.start(&mut state, next)),
            None => {
                info!("📭 Cola terminada en guild {}", self.guild_id);
                None
            }
        }
    }

    /// Limpia la cola y pide al reproductor soltar el track actual.
    pub fn stop(&self) -> StopOutcome {
        let mut state = self.state.lock();
        let session = self.provider.session(self.guild_id);

        let cleared = state.queue.clear();
        state.dispatched = None;
        state.draining = true;
        state.generation += 1;

        // Un inicio en vuelo crea la sesión antes de que corra este stop
        let completion = (session.is_some() || state.starts_in_flight > 0).then(|| {
            let (reply, completion) = Completion::channel();
            self.send(SessionCommand::Stop { reply });
            completion
        });

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        StopOutcome {
            cleared,
            completion,
        }
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.state.lock().queue.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Lo que reporta el reproductor, o el último track despachado.
    pub fn now_playing(&self) -> Option<Track> {
        let session = self.provider.session(self.guild_id)?;
        session
            .current_track()
            .or_else(|| self.state.lock().dispatched.clone())
    }

    pub fn state(&self) -> PlaybackState {
        let state = self.state.lock();
        match (&state.dispatched, state.draining) {
            (Some(track), _) => PlaybackState::Playing(track.clone()),
            (None, true) => PlaybackState::Draining,
            (None, false) => PlaybackState::Idle,
        }
    }

    fn start(&self, state: &mut SchedulerState, track: Track) -> Completion {
        let generation = state.mark_dispatched(track.clone());
        let (reply, completion) = Completion::channel();
        self.send(SessionCommand::Start {
            track,
            generation,
            reply,
        });
        completion
    }

    fn send(&self, command: SessionCommand) {
        // El receptor solo desaparece con el runtime; el llamador recibe
        // `SessionError::Aborted` por la respuesta descartada
        let _ = self.commands.send(command);
    }
}

async fn run_dispatcher(
    guild_id: GuildId,
    provider: Arc<dyn SessionProvider>,
    volume: u16,
    state: Arc<Mutex<SchedulerState>>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            SessionCommand::Start {
                track,
                generation,
                reply,
            } => {
                let session = provider.session_or_create(guild_id);
                let title = track.title().to_string();
                let result = session.start_track(track, volume).await;

                {
                    let mut state = state.lock();
                    state.starts_in_flight = state.starts_in_flight.saturating_sub(1);
                    if let Err(ref e) = result {
                        warn!("❌ No se pudo iniciar {} en guild {}: {}", title, guild_id, e);
                        if state.generation == generation {
                            state.dispatched = None;
                        }
                    }
                }
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reply } => {
                let result = match provider.session(guild_id) {
                    Some(session) => session.stop_and_clear().await,
                    None => Ok(()),
                };
                if let Err(ref e) = result {
                    warn!("❌ No se pudo limpiar el reproductor en guild {}: {}", guild_id, e);
                }
                let _ = reply.send(result);
            }
        }
    }

    debug!("Despachador de guild {} finalizado", guild_id);
}
