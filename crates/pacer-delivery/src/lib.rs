//! Delivery port for pacer.
//!
//! The dispatch engine never talks to the messaging API directly. It calls a
//! [`DeliveryPort`], which allows for:
//! - Dependency injection for testing ([`MockDelivery`])
//! - Swapping the outbound transport ([`HttpDelivery`] is the default)
//! - A single readiness predicate evaluated before a run starts
//!
//! The delivery credential lives in a [`CredentialStore`] shared between the
//! control surface (which sets it) and the adapter (which reads it).

pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod mock;
pub mod port;

pub use config::HttpDeliveryConfig;
pub use credential::CredentialStore;
pub use error::{DeliveryError, DeliveryResult};
pub use http::HttpDelivery;
pub use mock::{MockDelivery, RecordedSend};
pub use port::{BoxFuture, DeliveryPort, DynDelivery, SendResult};
