//! Rendering of compiled rules into concrete rule languages.
//!
//! Compilers only ever produce a [`RuleSet`]; everything syntax specific lives
//! behind the [`Renderer`] trait.

use std::io;

use crate::domain::rule::RuleSet;

mod drl;
mod json;

pub use drl::Drl;
pub use json::Json;

/// Writes a rule set in some concrete syntax.
pub trait Renderer {
    /// Renders `rules` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    fn render(&self, rules: &RuleSet, out: &mut dyn io::Write) -> io::Result<()>;

    /// Renders `rules` into a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer fails.
    fn render_to_string(&self, rules: &RuleSet) -> io::Result<String> {
        let mut buffer = Vec::new();
        self.render(rules, &mut buffer)?;
        String::from_utf8(buffer).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }
}
