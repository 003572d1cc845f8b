//! Presumed source locations, ranges and file entries.
//!
//! Locations are already resolved by the front end to their presumed
//! position: the file name, line and column as honored by `#line`
//! directives. Lines and columns are 1-based; line 0 marks an invalid
//! location.

use serde::{Deserialize, Serialize};

use super::ids::FileId;

/// A presumed source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    /// File the location belongs to.
    pub file: FileId,
    /// 1-based line, 0 when invalid.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Whether the location is spelled inside a macro expansion.
    #[serde(default)]
    pub from_macro: bool,
}

impl SourceLoc {
    /// Column standing for the end of a line.
    pub const END_OF_LINE: u32 = u32::MAX;

    /// Create a location outside of any macro expansion.
    pub fn new(file: FileId, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            from_macro: false,
        }
    }

    /// The distinguished invalid location.
    pub fn invalid() -> Self {
        Self {
            file: FileId::INVALID,
            line: 0,
            column: 0,
            from_macro: false,
        }
    }

    /// Mark the location as coming from a macro expansion.
    pub fn in_macro(mut self) -> Self {
        self.from_macro = true;
        self
    }

    /// Whether the location points into a real file.
    pub fn is_valid(&self) -> bool {
        self.line > 0 && self.file.is_valid()
    }

    /// Line and column, for position comparisons within one file.
    pub fn position(&self) -> (u32, u32) {
        (self.line, self.column)
    }

    /// The end of the line before this one.
    ///
    /// The locator does not know line lengths, so the end is reported as
    /// [`SourceLoc::END_OF_LINE`], which sorts after every column on the line.
    pub fn previous_line(&self) -> Self {
        Self {
            line: self.line.saturating_sub(1),
            column: Self::END_OF_LINE,
            ..*self
        }
    }

    /// The location `delta` columns further along the same line.
    pub fn advanced_by(&self, delta: u32) -> Self {
        Self {
            column: self.column + delta,
            ..*self
        }
    }
}

/// A begin/end pair of presumed locations; both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    /// First location of the range.
    pub begin: SourceLoc,
    /// Last location of the range.
    pub end: SourceLoc,
}

impl SourceRange {
    /// Create a range from two locations.
    pub fn new(begin: SourceLoc, end: SourceLoc) -> Self {
        Self { begin, end }
    }

    /// Range spanning `(begin_line, begin_col)` to `(end_line, end_col)` in one file.
    pub fn span(file: FileId, begin: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            begin: SourceLoc::new(file, begin.0, begin.1),
            end: SourceLoc::new(file, end.0, end.1),
        }
    }

    /// The range of macros defined on the command line.
    pub fn invalid() -> Self {
        Self {
            begin: SourceLoc::invalid(),
            end: SourceLoc::invalid(),
        }
    }

    /// Whether both ends are valid.
    pub fn is_valid(&self) -> bool {
        self.begin.is_valid() && self.end.is_valid()
    }

    /// Whether both ends are valid and in the same file.
    pub fn is_markable(&self) -> bool {
        self.is_valid() && self.begin.file == self.end.file
    }

    /// Whether `other` lies entirely within this range.
    pub fn fully_contains(&self, other: &SourceRange) -> bool {
        self.is_markable()
            && other.is_markable()
            && self.begin.file == other.begin.file
            && self.begin.position() <= other.begin.position()
            && other.end.position() <= self.end.position()
    }

    /// Whether `loc` lies within this range.
    pub fn contains(&self, loc: SourceLoc) -> bool {
        self.is_markable()
            && loc.is_valid()
            && loc.file == self.begin.file
            && self.begin.position() <= loc.position()
            && loc.position() <= self.end.position()
    }
}

/// What kind of buffer a file entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A real source or header file.
    #[default]
    Source,
    /// The compiler's `<built-in>` buffer.
    BuiltIn,
    /// The `<command line>` buffer holding `-D` definitions.
    CommandLine,
}

/// A file known to the source locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Presumed file name.
    pub name: String,
    /// Location of the `#include` that pulled this file in; `None` for the main file.
    #[serde(default)]
    pub include_loc: Option<SourceLoc>,
    /// Buffer kind.
    #[serde(default)]
    pub kind: FileKind,
}

impl FileEntry {
    /// A real source file.
    pub fn source(name: impl Into<String>, include_loc: Option<SourceLoc>) -> Self {
        Self {
            name: name.into(),
            include_loc,
            kind: FileKind::Source,
        }
    }

    /// Whether lines of this file may be kept.
    pub fn is_actual_file(&self) -> bool {
        self.kind == FileKind::Source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: FileId = FileId(0);

    #[test]
    fn test_invalid_location() {
        assert!(!SourceLoc::invalid().is_valid());
        assert!(!SourceLoc::new(F, 0, 1).is_valid());
        assert!(SourceLoc::new(F, 1, 1).is_valid());
        assert!(!SourceRange::invalid().is_valid());
    }

    #[test]
    fn test_previous_line() {
        let loc = SourceLoc::new(F, 5, 12).previous_line();
        assert_eq!(loc.line, 4);
        assert_eq!(loc.file, F);

        // The whole previous line lies before its end.
        let head = SourceRange::new(SourceLoc::new(F, 4, 1), loc);
        assert!(head.contains(SourceLoc::new(F, 4, 1)));
        assert!(head.contains(SourceLoc::new(F, 4, 300)));
        assert!(!head.contains(SourceLoc::new(F, 5, 1)));
    }

    #[test]
    fn test_cross_file_range_is_not_markable() {
        let range = SourceRange::new(SourceLoc::new(F, 1, 1), SourceLoc::new(FileId(1), 2, 1));
        assert!(range.is_valid());
        assert!(!range.is_markable());
    }

    #[test]
    fn test_fully_contains() {
        let outer = SourceRange::span(F, (1, 1), (3, 4));
        let inner = SourceRange::span(F, (1, 9), (3, 1));
        assert!(outer.fully_contains(&inner));
        assert!(!inner.fully_contains(&outer));
        assert!(outer.fully_contains(&outer));

        let elsewhere = SourceRange::span(FileId(1), (1, 9), (3, 1));
        assert!(!outer.fully_contains(&elsewhere));
    }

    #[test]
    fn test_contains_location() {
        let range = SourceRange::span(F, (2, 5), (4, 1));
        assert!(range.contains(SourceLoc::new(F, 2, 5)));
        assert!(range.contains(SourceLoc::new(F, 3, 80)));
        assert!(!range.contains(SourceLoc::new(F, 2, 4)));
        assert!(!range.contains(SourceLoc::new(FileId(1), 3, 1)));
    }
}
