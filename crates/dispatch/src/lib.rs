//! Serialized dispatch of outbound messages through one channel session.
//!
//! - [`session`]: lifecycle of the channel (bootstrap, login polling, readiness).
//! - [`registry`]: append-only task records, the source of truth for polling.
//! - [`queue`] and [`worker`]: FIFO admission and the single consumer that
//!   sends one task at a time with randomized pacing between sends.
//! - [`engine`]: the application context tying the above together.

pub mod engine;
pub mod error;
pub mod pacing;
pub mod queue;
pub mod registry;
pub mod session;
pub mod types;
pub mod worker;

pub use {
    engine::{Admission, DispatchEngine, EngineConfig, QueueStatus, ShutdownMode},
    error::{DispatchError, Result},
    pacing::PacingPolicy,
    registry::{StatusCounts, TaskRegistry},
    session::{PollPolicy, Session, SessionController, SessionHandle, SessionState},
    types::{DeliveryResult, Task, TaskId, TaskKind, TaskPayload, TaskStatus},
};
