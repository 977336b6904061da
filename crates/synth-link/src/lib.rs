//! `synth-link` - platform adapters for the synthesiser core.
//!
//! - [`source::FeedSource`] follows one feed through a subscription helper
//!   process that prints one message per line.
//! - [`sink::RestCommandSink`] delivers commands as input messages over REST;
//!   [`sink::LogSink`] prints them instead.
//! - [`search::RestSearch`] resolves twins from metadata queries.

pub mod envelope;
pub mod error;
pub(crate) mod process;
pub mod rest;
pub mod search;
pub mod sink;
pub mod source;

pub use error::LinkError;
pub use rest::RestClient;
pub use search::RestSearch;
pub use sink::{LogSink, RestCommandSink};
pub use source::FeedSource;
