use std::collections::VecDeque;
use tracing::{debug, info};

use crate::{audio::track::Track, error::SchedulerError};

/// FIFO of tracks waiting to be played for one guild.
///
/// Only the owning [`TrackScheduler`](super::scheduler::TrackScheduler) mutates
/// it. Unbounded unless a limit is configured.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: Option<usize>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue that refuses growth past `max_size` tracks. `None` means unbounded.
    pub fn with_limit(max_size: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega al final; devuelve el nuevo largo de la cola.
    pub fn enqueue(&mut self, track: Track) -> Result<usize, SchedulerError> {
        if let Some(limit) = self.max_size {
            if self.items.len() >= limit {
                return Err(SchedulerError::QueueFull { limit });
            }
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Agrega múltiples tracks (playlist) en orden. Con límite solo entran los
    /// que caben; devuelve cuántos se agregaron.
    pub fn enqueue_all(&mut self, tracks: Vec<Track>) -> usize {
        let available = match self.max_size {
            Some(limit) => limit.saturating_sub(self.items.len()),
            None => usize::MAX,
        };
        let before = self.items.len();

        self.items.extend(tracks.into_iter().take(available));

        let added = self.items.len() - before;
        info!("➕ Agregados {} tracks a la cola", added);
        added
    }

    /// Obtiene el siguiente track (FIFO).
    pub fn poll_next(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        match next {
            Some(ref track) => debug!("➡️ Siguiente en cola (FIFO): {}", track.title()),
            None => debug!("📭 Cola vacía"),
        }
        next
    }

    /// Limpia la cola; devuelve cuántos tracks había.
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        if cleared > 0 {
            info!("🗑️ Cola limpiada: {} tracks eliminados", cleared);
        }
        cleared
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
