//! Command-line plumbing for the `event-scraper` binary.

pub mod logging;
pub mod output;
