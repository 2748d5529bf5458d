//! Protocol decoding modules.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets, ranges, and wire constants (source of truth)
//! - `reader`: safe byte access and protocol conventions
//! - `parser`: domain-level decoding (no direct byte indexing)
//! - `error`: explicit, actionable errors
//!
//! Parsers are pure, copy-free where the wire format allows it, and
//! contain no I/O; sources and the pipeline handle capture access and
//! aggregation.

pub mod dns;
pub mod http;
pub mod packet;
