//! Page acquisition: one static HTTP GET, or one rendered browser capture.
//!
//! Both paths yield a [`crate::types::RawDocument`]; nothing downstream
//! cares which one produced the HTML apart from the trace.

pub mod fetcher;
pub mod http_client;
