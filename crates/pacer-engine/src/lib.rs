//! Dispatch engine for pacer.
//!
//! Owns the run state machine and the paced send loop.
//!
//! # Key Components
//!
//! - [`DispatchEngine`]: `configure` / `load_queue` / `start` / `stop` / `status`
//! - [`MessageSource`]: where queue items come from (file, URL, inline list)
//! - [`DispatchEvent`]: broadcast of state transitions and per-item outcomes
//!
//! # Run Lifecycle
//!
//! ```text
//! Idle ──start()──▶ Running ──exhausted──▶ Idle
//! Idle ──start()──▶ Running ──stop()──▶ Stopping ──(loop exits)──▶ Idle
//! Running ──delivery failure──▶ Idle   (abort policy)
//! any ──shutdown()──▶ (loop exits) ──▶ Stopped
//! ```
//!
//! At most one run exists at a time. `start` checks and claims the run slot
//! under the same lock, then hands the loop to a tokio task and returns.

pub mod engine;
pub mod events;
mod run_loop;
pub mod source;

pub use engine::{ActiveRunStatus, DispatchEngine, EngineStatus, StartAck, StopAck};
pub use events::DispatchEvent;
pub use source::{FileSource, HttpSource, InlineSource, MessageSource, SourceLocator};
