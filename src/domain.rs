//! Domain models for RASE compilation.
//!
//! This module contains the node model, the normalisation and context
//! resolution passes, the type dictionary, and the rule representation the
//! compilers produce. Nothing here touches the filesystem except the config and
//! dictionary loaders.

/// RASE node model: tags, containers and their kinds.
pub mod node;
pub use node::{Container, Kind, Node, NodeId, Tag};

/// Repair and validation of mixed containers.
pub mod normalize;
pub use normalize::MixedContentError;

/// Inference of the object class a section applies to.
pub mod context;

/// The type dictionary collaborator.
pub mod dictionary;
pub use dictionary::{Dictionary, TypeDictionary};

/// Canonical rule ids, property names and comparators.
pub mod sanitize;

/// The structured rule representation.
pub mod rule;
pub use rule::{CompiledRule, RuleSet};

/// A whole document and its root validation.
pub mod document;
pub use document::Document;

/// Dictionary coverage audit.
pub mod coverage;

mod config;
pub use config::{Config, ConfigError};
