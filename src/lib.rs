//! Reads a title, an image and a like count out of the page open in a
//! Chromium browser, then fills a placeholder list with that many unique
//! display names.

pub mod browser;
pub mod config;
pub mod dom;
pub mod extract;
pub mod identifiers;
pub mod logger;
pub mod orchestrator;
pub mod report;

pub use browser::{ScriptInjector, TabReference, TabService};
pub use config::Config;
pub use orchestrator::{Orchestrator, Phase, RunError, Snapshot};
