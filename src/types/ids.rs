//! Arena identifiers for translation-unit nodes.
//!
//! Every declaration, statement, type and file of a translation unit lives in
//! an arena owned by the front end. Identity is the arena index, so two
//! syntactically identical declarations are still distinct nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Create an id from an arena index.
            ///
            /// # Panics
            ///
            /// Panics if `index` does not fit in 32 bits.
            pub fn new(index: usize) -> Self {
                Self(u32::try_from(index).expect(concat!(stringify!($name), " index exceeds u32")))
            }

            /// Arena index of this id.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Identifier of a declaration node.
    DeclId,
    "decl"
);

arena_id!(
    /// Identifier of a statement or expression node.
    StmtId,
    "stmt"
);

arena_id!(
    /// Identifier of a type node.
    TypeId,
    "type"
);

arena_id!(
    /// Identifier of a file entry known to the source locator.
    FileId,
    "file"
);

impl FileId {
    /// Sentinel used by invalid source locations.
    pub const INVALID: FileId = FileId(u32::MAX);

    /// Whether this id refers to a real file entry.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

// The first registered file is the main file.
impl Default for FileId {
    fn default() -> Self {
        FileId(0)
    }
}
