//! officer-extract: catalog extraction for script-rendered officer databases.
//!
//! Discovery crawls the paginated list and writes entry stubs; enrichment
//! loads each stub's detail page and writes the merged dataset. Both stages
//! share a `RenderClient` that either issues plain HTTP requests or drives
//! headless Chromium.

pub mod config;
pub mod error;
pub mod extract;
pub mod hydration;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod renderer;
pub mod tap;

pub use config::{ExtractConfig, RenderMode};
pub use error::{ExtractError, Result};
pub use model::{Dataset, EntityDetail, EntryStub, Record};
pub use pipeline::{Pipeline, RunSummary};
