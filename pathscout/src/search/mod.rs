pub mod engine;
pub mod matcher;

pub use engine::{search, SearchExecutor};
pub use matcher::{Matcher, MATCH_ALL};
