//! Declarative mapping rules for profileforge.
//!
//! A rule document pairs source paths in a legacy profile with target paths
//! in the job descriptor. This crate parses that document into a [`RuleSet`],
//! evaluates the [`Condition`]s that guard rules, and holds the enumerated
//! transformer tables and built-in [`Formula`]s that rules may name.

pub mod condition;
pub mod rule;
pub mod ruleset;
pub mod transformers;

pub use condition::{evaluate, Condition, Operator};
pub use rule::{Rendered, Rule, Source, SourceKind, SourcePattern, Target};
pub use ruleset::RuleSet;
pub use transformers::{Formula, Lookup, Transformers};
