//! # queuebot
//!
//! Per-guild sequential track scheduling for Discord music bots.
//!
//! - [`audio`] holds the scheduler, queue, manager registry and local node
//! - [`bot`] turns commands into scheduler calls and reply texts
//! - [`ui`] renders tracks and queues as text

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod ui;
