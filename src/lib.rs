//! Pages through a remote catalog search API with a fixed pool of workers,
//! merges every page into one collection and exports it as CSV and Markdown.

mod config;
mod error;
mod macros;
pub mod output;
pub mod parse;
pub mod process;
pub mod request;

pub use config::Config;
pub use error::{Error, FetchError, OutputError, Result};

const PAGE_SIZE: usize = 100;
const PAGE_MAX: usize = 100;
const MAX_CONCURRENT: usize = 5;
const ENDPOINT: &str = "https://www.oreilly.com/search/api/search/";
const FILE_STEM: &str = "oreilly-book-list";

/// Zero-based page number.
pub type PageIndex = usize;
