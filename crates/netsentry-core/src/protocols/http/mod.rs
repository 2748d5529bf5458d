pub mod error;
mod parser;

pub use parser::{HttpKind, HttpMessage, decode_http};
