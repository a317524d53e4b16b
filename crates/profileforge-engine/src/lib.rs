//! Profileforge-Engine: rule-driven conversion of legacy profiles
//!
//! This crate turns a legacy transcoding profile into a cloud transcoding job
//! descriptor. It applies a [`RuleSet`](profileforge_rules::RuleSet) to the
//! profile and fills in what the rules cannot express from built-in decision
//! tables.
//!
//! # Modules
//!
//! - `engine` - The [`ConversionEngine`] orchestrating one conversion
//! - `stream` - Expansion of renditions into outputs
//! - `rate_control` - Bitrate management decision table
//! - `audio` - Audio codec decision table
//! - `groups` - Output group settings per output format
//! - `transform` - Transform-name resolution and the built-in custom transforms
//! - `report` - Per-parameter mapping outcomes
//!
//! # Example
//!
//! ```
//! use profileforge_engine::ConversionEngine;
//! use profileforge_rules::RuleSet;
//! use serde_json::json;
//!
//! let rules = RuleSet::from_value(&json!({"rules": []})).unwrap();
//! let engine = ConversionEngine::new(rules);
//! let conversion = engine.convert(&json!({"bitrate": "1000k", "cbr": "yes"}), None).unwrap();
//! assert_eq!(
//!     conversion.target["Settings"]["OutputGroups"][0]["Outputs"][0]["VideoDescription"]
//!         ["CodecSettings"]["H264Settings"]["RateControlMode"],
//!     json!("CBR")
//! );
//! ```

pub mod alternate;
pub mod audio;
pub mod config;
pub mod context;
pub mod engine;
pub mod format;
pub mod groups;
pub mod patch;
pub mod postprocess;
pub mod rate_control;
pub mod report;
pub mod stream;
pub mod transform;
pub mod transpose;

pub use alternate::{AudioSelector, AudioSelectorMap};
pub use config::EngineConfig;
pub use context::ConversionContext;
pub use engine::{Conversion, ConversionEngine};
pub use format::{Container, GroupType, OutputFormat, VideoCodec};
pub use report::{ConversionReport, ConversionStatus, MappingOutcome, MappingRecord, UnmappedParam};
pub use transform::{CustomTransform, TransformRegistry};
