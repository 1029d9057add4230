//! IRC wire message parsing and serialization (the command codec, C1).

mod nom_parser;
mod parse;
mod serialize;
pub mod tags;
mod types;

pub use self::serialize::{check_limits, SerializeLimitError};
pub use self::types::{Message, Tag, Tags};
