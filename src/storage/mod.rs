pub mod sqlite;

pub use sqlite::{SinkSummary, SqliteStorage};
