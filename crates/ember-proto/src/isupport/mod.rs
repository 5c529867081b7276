//! ISUPPORT (RPL_ISUPPORT / 005) token construction for server responses.
//!
//! # Reference
//! - Modern IRC documentation: <https://modern.ircdocs.horse/isupport.html>

mod tokens;

pub use tokens::{ChanModesBuilder, IsupportBuilder, TargMaxBuilder};
