//! Agent runtime: the [`Harness`] reason/act loop and its configuration.
//!
//! - [`harness::Harness`]: the tool-use loop. Start here.
//! - [`config::HarnessConfig`]: model, round cap, sampling, retry and
//!   summarization settings.
//! - [`events`]: [`EventHandler`] and [`HarnessEvent`] for observing a run.
//! - [`prompt`]: the default system prompt.

pub mod config;
pub mod events;
pub mod harness;
pub mod prompt;

pub use config::{DEFAULT_MAX_ROUNDS, FALLBACK_RESPONSE, HarnessConfig};
pub use events::{EventHandler, HarnessEvent, HarnessResult, LoggingHandler, NoopHandler};
pub use harness::Harness;
pub use prompt::DEFAULT_SYSTEM_PROMPT;
