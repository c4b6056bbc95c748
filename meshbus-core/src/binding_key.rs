//! Binding keys: literal / `*` / `#` token sequences used in subscriptions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single binding key token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingToken {
    /// A literal string that must match exactly.
    Literal(String),
    /// Matches any single token at this position.
    Star,
    /// Matches the remainder of the routing content (must be last).
    Hash,
}

impl BindingToken {
    fn parse(raw: &str) -> Self {
        match raw {
            "*" => Self::Star,
            "#" => Self::Hash,
            literal => Self::Literal(literal.to_string()),
        }
    }
}

impl fmt::Display for BindingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Star => write!(f, "*"),
            Self::Hash => write!(f, "#"),
        }
    }
}

/// A finite ordered sequence of [`BindingToken`]s.
///
/// The empty binding key matches every routing content for its message type.
/// A `#` token is only valid as the final token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingKey {
    tokens: Vec<BindingToken>,
}

impl BindingKey {
    /// The empty binding key (matches everything).
    #[must_use]
    pub fn empty() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Build a binding key from raw token strings (`"*"`, `"#"`, or literals).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBindingKey`] if `#` appears anywhere but
    /// as the final token.
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<BindingToken> =
            parts.into_iter().map(|s| BindingToken::parse(s.as_ref())).collect();
        Self::validate(&tokens)?;
        Ok(Self { tokens })
    }

    fn validate(tokens: &[BindingToken]) -> Result<()> {
        if let Some(pos) = tokens.iter().position(|t| matches!(t, BindingToken::Hash)) {
            if pos != tokens.len() - 1 {
                return Err(CoreError::invalid_binding_key(
                    "'#' token is only valid as the final token",
                ));
            }
        }
        Ok(())
    }

    /// The token sequence.
    #[must_use]
    pub fn parts(&self) -> &[BindingToken] {
        &self.tokens
    }

    /// Whether this is the empty binding key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of tokens.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.tokens.len()
    }

    /// The token at position `i`, if any.
    #[must_use]
    pub fn get_part_token(&self, i: usize) -> Option<&BindingToken> {
        self.tokens.get(i)
    }

    /// Whether the final token is `#`.
    #[must_use]
    pub fn ends_with_hash(&self) -> bool {
        matches!(self.tokens.last(), Some(BindingToken::Hash))
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.tokens.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}
