//! Rendering kept lines back into source text.
//!
//! Two modes are supported. Comment-out mode prefixes every elided line with
//! [`ELIDED_LINE_PREFIX`] so line numbers stay stable for diagnostics; strip
//! mode drops elided lines altogether.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::types::{FileLines, KeptLines};

/// Prefix written in front of elided lines.
pub const ELIDED_LINE_PREFIX: &str = "//-";

/// How elided lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Keep elided lines behind a comment prefix.
    #[default]
    CommentOut,
    /// Drop elided lines.
    Strip,
}

/// Error type for writing a carved tree.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Reading a source file or writing its carved copy failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Render one file's text according to its kept lines.
///
/// Line terminators are copied as found, so `\r\n` endings and a missing
/// final newline survive. Files without flags render with every line elided.
pub fn render_source(source: &str, lines: Option<&FileLines>, mode: RenderMode) -> String {
    let mut out = String::with_capacity(source.len());
    for (index, line) in source.split_inclusive('\n').enumerate() {
        let kept = lines.is_some_and(|lines| lines.is_kept(index));
        match (kept, mode) {
            (true, _) => {}
            (false, RenderMode::CommentOut) => out.push_str(ELIDED_LINE_PREFIX),
            (false, RenderMode::Strip) => continue,
        }
        out.push_str(line);
    }
    out
}

/// Write the carved copy of every file in `kept` under `out_root`.
///
/// File names are resolved against `source_root` for reading and mirrored
/// under `out_root` for writing. Absolute names and names escaping the root
/// (typically system headers) are skipped. Returns the written paths.
pub fn write_tree(
    source_root: &Path,
    out_root: &Path,
    kept: &KeptLines,
    mode: RenderMode,
) -> Result<Vec<PathBuf>, RenderError> {
    let mut written = Vec::new();
    for (name, lines) in kept.iter() {
        let relative = Path::new(name);
        if !is_contained(relative) {
            warn!(file = %name, "Skipping file outside the source root");
            continue;
        }

        let source_path = source_root.join(relative);
        let text = fs::read_to_string(&source_path).map_err(|source| RenderError::Io {
            path: source_path.clone(),
            source,
        })?;

        let target = out_root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| RenderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, render_source(&text, Some(lines), mode)).map_err(|source| {
            RenderError::Io {
                path: target.clone(),
                source,
            }
        })?;
        debug!(file = %name, kept = lines.kept_count(), "Wrote carved file");
        written.push(target);
    }
    Ok(written)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
