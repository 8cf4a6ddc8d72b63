//! `warden-policy`: role-based access decisions.
//!
//! A [`Model`] is a casbin model: request shape, rule shape, how matching
//! rules combine and the matcher expression. A [`PolicyEngine`] pairs a model
//! with a [`PolicySource`], builds a casbin enforcer from the source's rules
//! and answers `(role, resource, action)` queries against an atomically
//! swappable snapshot of that enforcer.

pub mod engine;
pub mod error;
pub mod model;
pub mod path;
pub mod rules;
pub mod source;

pub use engine::{Enforcer, PolicyEngine};
pub use error::{EnforceError, ModelError, PolicyError, SourceError};
pub use model::{DEFAULT_MODEL, Model};
pub use path::normalize_path;
pub use rules::{PolicyRule, RuleSet};
pub use source::{PolicySource, StaticPolicySource, parse_rules};
