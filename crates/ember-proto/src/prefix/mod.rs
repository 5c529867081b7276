//! IRC message prefix: identifies the origin of a message.

mod serialize;
mod types;

pub use types::{Prefix, PrefixRef};
