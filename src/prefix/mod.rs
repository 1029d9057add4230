//! IRC message prefix (source) types.

mod types;

pub use self::types::Prefix;
