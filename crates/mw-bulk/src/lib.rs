//! # busbar-mw-bulk
//!
//! Bulk execution helpers for the MediaWiki Action API.
//!
//! ## Features
//!
//! - **Batch executors** - run a worker over many items with bounded
//!   concurrency, or one at a time with a pause, retrying only the failures
//! - **Continued queries** - follow `continue` tokens eagerly or as a stream
//! - **Mass queries** - split an oversized multi-value field into chunks the
//!   server accepts (500 with `apihighlimits`, 50 otherwise)
//!
//! Every request goes through [`busbar_mw_client::MwClient::call`], so token
//! refresh, backoff and re-login apply per request.
//!
//! ## Example - Batch edit
//!
//! ```rust,ignore
//! use busbar_mw_bulk::batch_operation;
//! use busbar_mw_client::{CallOptions, CallParams, MwClient};
//!
//! let titles = vec!["Sandbox/1".to_string(), "Sandbox/2".to_string()];
//! let result = batch_operation(
//!     titles,
//!     |title, _| {
//!         let client = client.clone();
//!         async move {
//!             let token = client.csrf_token();
//!             client
//!                 .call(
//!                     CallParams::new()
//!                         .with("action", "edit")
//!                         .with("title", title)
//!                         .with("appendtext", "\n~~~~")
//!                         .with("token", token),
//!                     CallOptions::new(),
//!                 )
//!                 .await
//!         }
//!     },
//!     5,
//!     1,
//! )
//! .await?;
//!
//! println!("{} edited, {} failed", result.successes, result.failures.len());
//! ```

mod batch;
mod client;
mod error;

pub use batch::{batch_operation, series_batch_operation, BatchResult};
pub use client::{BulkClient, MASS_QUERY_HIGH_LIMIT, MASS_QUERY_LIMIT};
pub use error::{Error, ErrorKind, Result};
