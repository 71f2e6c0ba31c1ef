//! Reply-side channel abstraction.
//!
//! A transport (Bot Framework, a terminal, a test harness) implements
//! [`ChannelOutbound`] so the relay can answer a turn without knowing how the
//! reply travels.

pub mod error;
pub mod plugin;
pub mod recording;

pub use {
    error::{Error, Result},
    plugin::{ChannelOutbound, ChannelReplyTarget},
    recording::{RecordedReply, RecordingOutbound},
};
