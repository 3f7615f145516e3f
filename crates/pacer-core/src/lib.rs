//! Core domain types for the pacer dispatch service.
//!
//! This crate provides the types shared by the engine, the delivery adapters
//! and the control surface:
//! - `DispatchConfig` / `ConfigPatch`: runtime configuration and partial updates
//! - `MessageQueue`: the ordered items a run walks through
//! - `RunState`, `RunSummary`, `RunReport`: run lifecycle and outcomes
//! - `DispatchError`: the error taxonomy returned by engine operations

pub mod config;
pub mod error;
pub mod queue;
pub mod run;

pub use config::{ConfigPatch, DispatchConfig, FailurePolicy, MAX_DELAY_MS, MAX_TEXT_LEN};
pub use error::{DispatchError, DispatchResult};
pub use queue::{format_item, parse_lines, MessageQueue};
pub use run::{
    DeliveryOutcome, OutcomeRecord, RecipientId, RunId, RunReport, RunState, RunSummary,
};
