pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod indexer;
pub mod query;
pub mod store;
pub mod timeparse;
pub mod transcript;

pub use config::Config;
pub use error::{QueryError, RecallError, TimeParseError};
pub use events::{EventLog, EventSink};
pub use indexer::{Indexer, UpdateOutcome};
pub use query::{Query, QueryEngine};
pub use store::{Exchange, IndexStore, SessionIndex};
