//! # Audio Module
//!
//! Per-guild sequential playback on top of an audio node.
//!
//! ## Architecture
//!
//! ### [`scheduler`] - Track Scheduler
//! - Decides under a per-guild lock whether a track starts or waits
//! - Advances the queue when the node reports a finished track
//! - Runs player calls in order on one dispatcher task per guild
//!
//! ### [`queue`] - Queue Store
//! - FIFO of pending tracks with an optional size limit
//!
//! ### [`manager`] - Manager Registry
//! - One [`manager::GuildMusicManager`] per guild, created on first use
//! - Routes node events to the owning guild
//!
//! ### [`node`] - Local Node
//! - In-process player per guild that plays tracks on a timer and emits
//!   the same start/end events a remote node would
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use queuebot::audio::{
//!     manager::ManagerRegistry, node::LocalNode, scheduler::SchedulerOptions,
//!     track::{Track, TrackInfo},
//! };
//! use serenity::model::id::GuildId;
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (node, events) = LocalNode::new("local", 1.0);
//! let registry = Arc::new(ManagerRegistry::new(node, SchedulerOptions::default()));
//! tokio::spawn(Arc::clone(&registry).run_events(events, Default::default()));
//!
//! let track = Track::new("enc:song", TrackInfo::new("Song", Duration::from_secs(180)));
//! registry.enqueue(GuildId::new(123456789), track)?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod manager;
pub mod node;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod track;
