//! Preprocessor records: macro expansions and listener events.

use serde::{Deserialize, Serialize};

use super::source::{SourceLoc, SourceRange};

/// A macro expansion recorded by the preprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroExpansion {
    /// Expanded macro name.
    pub name: String,
    /// Extent of the expansion in the source.
    pub range: SourceRange,
    /// Naive definition range of the expanded macro, or the invalid range for
    /// command-line macros.
    pub definition: SourceRange,
}

/// Location and length of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    /// Location of the first character.
    pub loc: SourceLoc,
    /// Length in characters.
    pub len: u32,
}

/// A `#define` seen by the preprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDefinedEvent {
    /// Macro name.
    pub name: String,
    /// Naive definition range: name start to the start of the last token.
    pub definition: SourceRange,
    /// Last replacement token, `None` for an empty body.
    #[serde(default)]
    pub last_token: Option<TokenSpan>,
}

/// A macro expansion seen by the preprocessor, in lexing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroExpandsEvent {
    /// Expanded macro name.
    pub name: String,
    /// Naive definition range of the expanded macro.
    pub definition: SourceRange,
    /// Whether the expansion happens inside another macro's expansion.
    #[serde(default)]
    pub nested: bool,
}

/// One preprocessor callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessorEvent {
    /// `#define`.
    MacroDefined(MacroDefinedEvent),
    /// Macro expansion.
    MacroExpands(MacroExpandsEvent),
}
