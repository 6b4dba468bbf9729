pub mod ignore_rules;
pub mod walker;

pub use ignore_rules::{IgnoreCache, IgnoreResolver};
pub use walker::{narrow_to_pathname, walk, Walker};
