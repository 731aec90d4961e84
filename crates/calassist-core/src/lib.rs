//! Core types: normalized events, time windows, chat turns, tracing

pub mod chat;
pub mod event;
pub mod time;
pub mod tracing;

pub use chat::{ChatRole, ChatTurn};
pub use event::NormalizedEvent;
pub use time::{TimeWindow, TimeWindowError};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
