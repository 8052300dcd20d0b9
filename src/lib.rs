//! # Stream Router
//!
//! A field-indexed routing engine for log messages: each *stream* is a
//! routing destination defined by a conjunction of field predicates, and
//! [`RouterEngine::match_message`] returns the streams whose every rule
//! matches a given message.
//!
//! ## Architecture
//!
//! - **Compile** (per snapshot): stream rules are compiled into per-type,
//!   field-keyed indices; invalid rules are dropped with a warning.
//! - **Match** (per message): rule types run fastest-first, each restricted
//!   to the fields the message carries where semantics allow, tallying
//!   satisfied rules per stream; a stream matches when its tally reaches its
//!   valid-rule count.
//! - **Contain** (per regex invocation): a timeout guard bounds the
//!   wall-clock cost of any single pattern evaluation so one pathological
//!   rule cannot stall ingestion.
//!
//! ## Usage
//!
//! ```rust
//! use stream_router::{Message, RouterConfig, RouterEngine, Stream, StreamRule};
//!
//! let streams = vec![
//!     Stream::new("app1-errors")
//!         .with_rule(StreamRule::exact("source", "app1"))
//!         .with_rule(StreamRule::regex("message", "(?i)error")),
//! ];
//!
//! let engine = RouterEngine::new(streams, RouterConfig::default());
//!
//! let message = Message::new()
//!     .with_field("source", "app1")
//!     .with_field("message", "Database ERROR: connection refused");
//!
//! for stream in engine.match_message(&message) {
//!     println!("route to {}", stream.id);
//! }
//! ```
//!
//! Engines are immutable after construction and safe to share across worker
//! threads; rebuild through [`EngineFactory`] when the stream snapshot
//! changes.

pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod metrics;
pub mod stream;

mod guard;
mod index;
mod matcher;

pub use config::RouterConfig;
pub use engine::{EngineFactory, RouterEngine, RuleTestResult, StreamTestMatch};
pub use error::{Result, RouterError};
pub use message::Message;
pub use metrics::{MetricsSnapshot, RouterMetrics};
pub use stream::{RuleType, Stream, StreamRule};
