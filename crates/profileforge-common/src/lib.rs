//! Profileforge-Common: document model and shared utilities.
//!
//! This crate provides the pieces every other profileforge crate builds on:
//!
//! - **Document**: an ordered JSON object with path-addressed get/set
//! - **Paths**: parsing of `a.b[2].c` style paths
//! - **Units**: bitrate, size and flag parsing for legacy profile values
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use profileforge_common::{Document, Result};
//! use serde_json::json;
//!
//! fn example() -> Result<()> {
//!     let mut doc = Document::new();
//!     doc.set("Settings.OutputGroups[0].Name", json!("File Group"))?;
//!     assert_eq!(
//!         doc.get("Settings.OutputGroups[0].Name"),
//!         Some(&json!("File Group"))
//!     );
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod document;
pub mod error;
pub mod path;
pub mod units;

pub use document::{merge_objects, merge_value, Document};
pub use error::{Error, Result};
pub use serde_json::{Map, Value};
