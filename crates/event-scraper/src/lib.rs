// Copyright 2026 Event Scraper Contributors
// SPDX-License-Identifier: MIT

//! Event scraper library: turns one event-listing URL into one normalized
//! event record.
//!
//! The flow is static fetch, structured blob, text heuristics, then
//! assembly, with a single headless-browser fallback when the static page
//! is not enough. See [`pipeline::Pipeline`].

pub mod acquisition;
pub mod assemble;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod policy;
pub mod renderer;
pub mod types;

pub use config::ScraperConfig;
pub use error::{ScrapeError, ScrapeResult};
pub use pipeline::{Outcome, Pipeline};
pub use types::{EventRecord, ExtractionError};
