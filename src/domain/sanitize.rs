//! Canonicalisation of rule identifiers, property names and comparator tokens.
//!
//! The synthesizer and the evaluator must agree on the exact spelling of every
//! clause path and property name, so all free text coming out of the document
//! passes through these functions before it becomes part of a rule.

use std::{fmt, sync::LazyLock};

use borsh::BorshSerialize;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Every character outside `[A-Za-z0-9 \-/_]`.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 \-/_]").expect("static pattern is valid"));

/// Canonicalises a document reference (or any text) into a rule identifier.
///
/// URLs are reduced to their path, space separated words are title-cased and
/// joined, and anything outside `[A-Za-z0-9 \-/_]` is removed.
///
/// ```
/// use rase::domain::sanitize::sanitize_rule_id;
///
/// assert_eq!(sanitize_rule_id("approved document b/1.2"), "ApprovedDocumentB/12");
/// assert_eq!(sanitize_rule_id("https://example.org/doc/b/1"), "/doc/b/1");
/// ```
#[must_use]
pub fn sanitize_rule_id(input: &str) -> String {
    let path = url_path(input);
    let input = path.as_deref().unwrap_or(input);

    let tokens: Vec<&str> = input.split(' ').collect();
    let joined = if tokens.len() > 1 {
        tokens
            .iter()
            .map(|token| capitalise_first(token.trim()))
            .collect::<String>()
    } else {
        input.to_string()
    };

    DISALLOWED.replace_all(&joined, "").into_owned()
}

/// Canonicalises a human-authored property name.
///
/// Disallowed characters are stripped and the result trimmed. Then the first
/// letter after any non-letter (or at the start) is upper-cased. Internal spaces
/// survive.
///
/// ```
/// use rase::domain::sanitize::sanitize_property;
///
/// assert_eq!(sanitize_property(" fire door (fd30) "), "Fire Door Fd30");
/// assert_eq!(sanitize_property("u-value"), "U-Value");
/// ```
#[must_use]
pub fn sanitize_property(input: &str) -> String {
    let stripped = DISALLOWED.replace_all(input, "");
    let mut after_non_letter = true;
    stripped
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                if after_non_letter {
                    after_non_letter = false;
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            } else {
                after_non_letter = true;
                c
            }
        })
        .collect()
}

fn url_path(input: &str) -> Option<String> {
    if !(input.starts_with("http") || input.starts_with("Http")) {
        return None;
    }
    url::Url::parse(input).ok().map(|url| url.path().to_string())
}

fn capitalise_first(token: &str) -> String {
    let mut chars = token.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// A comparator understood by the evaluator.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// `==`
    Equal,
    /// `<=`
    LessOrEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// Set membership.
    Includes,
    /// Set exclusion.
    Excludes,
    /// A token the evaluator does not know; passed through untouched.
    Unrecognised(String),
}

impl Comparator {
    /// Normalises a raw comparator token taken from markup.
    ///
    /// HTML entities and ampersand-escaped variants are folded onto the plain
    /// operator. Unknown tokens are returned as [`Comparator::Unrecognised`];
    /// it is up to the caller to report them.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Equal;
        };
        let token = raw.trim().replace("+amp;", "&").replace("&amp;", "&");
        match token.as_str() {
            "" | "null" | "=" | "==" | "&gt;&lt;" => Self::Equal,
            "&le;" | "&lt;=" | "<=" => Self::LessOrEqual,
            "&lt;" | "<" => Self::Less,
            "&gt;" | ">" => Self::Greater,
            "&ge;" | "&gt;=" | ">=" => Self::GreaterOrEqual,
            "includes" => Self::Includes,
            "excludes" => Self::Excludes,
            _ => Self::Unrecognised(token),
        }
    }

    /// Whether the token is one the evaluator understands.
    #[must_use]
    pub const fn is_recognised(&self) -> bool {
        !matches!(self, Self::Unrecognised(_))
    }

    /// The operator symbol as the evaluator expects it.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Equal => "==",
            Self::LessOrEqual => "<=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Includes => "includes",
            Self::Excludes => "excludes",
            Self::Unrecognised(token) => token,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
