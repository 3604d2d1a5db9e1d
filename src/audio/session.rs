//! Contract between the scheduler and the audio node's per-guild player.

use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

#[cfg(test)]
use mockall::automock;

use crate::{audio::track::Track, error::SessionError};

/// A guild's player on the node. At most one track is current at a time.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlaybackSession: Send + Sync {
    /// Track the node reports as playing, if any.
    fn current_track(&self) -> Option<Track>;

    /// Replaces whatever is playing with `track`.
    async fn start_track(&self, track: Track, volume: u16) -> Result<(), SessionError>;

    /// Unpauses and clears the current track.
    async fn stop_and_clear(&self) -> Result<(), SessionError>;
}

/// Resolves guild ids to sessions ("links").
#[cfg_attr(test, automock)]
pub trait SessionProvider: Send + Sync {
    /// Existing session, `None` when the guild has no active connection.
    fn session(&self, guild_id: GuildId) -> Option<Arc<dyn PlaybackSession>>;

    /// Existing session or a freshly created one.
    fn session_or_create(&self, guild_id: GuildId) -> Arc<dyn PlaybackSession>;
}

/// Outcome of a session call dispatched by the scheduler.
///
/// The call is already queued on the guild's dispatcher; awaiting this only
/// observes the result. Dropping it does not cancel the call.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), SessionError>>,
}

impl Completion {
    pub(crate) fn channel() -> (oneshot::Sender<Result<(), SessionError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    pub async fn wait(self) -> Result<(), SessionError> {
        self.await
    }
}

impl Future for Completion {
    type Output = Result<(), SessionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SessionError::Aborted)),
            Poll::Pending => Poll::Pending,
        }
    }
}
