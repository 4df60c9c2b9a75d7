//! RASE rule compilation
//!
//! Compliance documents annotated with Requirement / Application / Selection /
//! Exception markup are compiled into forward-chaining production rules that
//! decide, per clause and per building entity, whether the clause applies and
//! whether it passes.

pub mod domain;
pub use domain::{Config, Dictionary, Document, RuleSet};

/// Rule synthesis from documents and clause records.
pub mod compiler;
pub use compiler::{Compiler, Error, compile_document};

/// Rendering of rule sets into concrete rule languages.
pub mod render;
pub use render::Renderer;

/// File formats for documents and clause records.
pub mod storage;
