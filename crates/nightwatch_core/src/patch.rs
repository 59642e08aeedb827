//! Exact-span patch application.
//!
//! A patch is a literal (original_span, replacement_span) pair targeting one
//! file. Apply replaces the first occurrence; revert swaps the spans. A
//! revert where the replacement span is already absent is a no-op, so a
//! failed apply can always be followed by a blind revert.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PatchError;

/// A single-file textual patch synthesized by the fix stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchArtifact {
    /// Path relative to the workspace root
    pub file_path: String,
    /// Literal span copied from the current file contents
    pub original_span: String,
    /// Literal replacement
    pub replacement_span: String,
    /// Short human-readable explanation
    pub explanation: String,
}

/// Apply a patch to the workspace, replacing the first occurrence of
/// `original_span`.
pub fn apply_patch(workspace: &Path, patch: &PatchArtifact) -> Result<(), PatchError> {
    let target = workspace.join(&patch.file_path);
    if !target.is_file() {
        return Err(PatchError::FileMissing(target));
    }

    let contents = fs::read_to_string(&target)?;
    if !contents.contains(&patch.original_span) {
        return Err(PatchError::SpanNotFound);
    }

    let occurrences = contents.matches(&patch.original_span).count();
    if occurrences > 1 {
        warn!(
            "original span occurs {} times in {}; replacing first occurrence",
            occurrences, patch.file_path
        );
    }

    let patched = contents.replacen(&patch.original_span, &patch.replacement_span, 1);
    if patched == contents {
        return Err(PatchError::NoOp);
    }

    fs::write(&target, patched)?;
    Ok(())
}

/// Undo a previously applied patch.
///
/// No-op when the replacement span is absent (already reverted or the apply
/// never landed).
pub fn revert_patch(workspace: &Path, patch: &PatchArtifact) -> Result<(), PatchError> {
    let target = workspace.join(&patch.file_path);
    if !target.is_file() {
        return Err(PatchError::FileMissing(target));
    }

    let contents = fs::read_to_string(&target)?;
    if !contents.contains(&patch.replacement_span) {
        return Ok(());
    }

    let reverted = contents.replacen(&patch.replacement_span, &patch.original_span, 1);
    fs::write(&target, reverted)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn patch(original: &str, replacement: &str) -> PatchArtifact {
        PatchArtifact {
            file_path: "src/app.py".to_string(),
            original_span: original.to_string(),
            replacement_span: replacement.to_string(),
            explanation: "test patch".to_string(),
        }
    }

    fn write_target(dir: &Path, contents: &str) {
        let target = dir.join("src");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("app.py"), contents).unwrap();
    }

    fn read_target(dir: &Path) -> String {
        fs::read_to_string(dir.join("src/app.py")).unwrap()
    }

    #[test]
    fn test_apply_then_revert_restores_file_byte_for_byte() {
        let dir = tempdir().unwrap();
        let original = "def f(user):\n    return user.email\n";
        write_target(dir.path(), original);

        let p = patch("return user.email", "return user.email if user else None");
        apply_patch(dir.path(), &p).unwrap();
        assert!(read_target(dir.path()).contains("if user else None"));

        revert_patch(dir.path(), &p).unwrap();
        assert_eq!(read_target(dir.path()), original);
    }

    #[test]
    fn test_apply_missing_span_fails() {
        let dir = tempdir().unwrap();
        write_target(dir.path(), "print('hello')\n");

        let p = patch("does not exist", "replacement");
        assert!(matches!(
            apply_patch(dir.path(), &p),
            Err(PatchError::SpanNotFound)
        ));
    }

    #[test]
    fn test_apply_missing_file_fails() {
        let dir = tempdir().unwrap();
        let p = patch("a", "b");
        assert!(matches!(
            apply_patch(dir.path(), &p),
            Err(PatchError::FileMissing(_))
        ));
    }

    #[test]
    fn test_apply_noop_patch_fails() {
        let dir = tempdir().unwrap();
        write_target(dir.path(), "x = 1\n");

        let p = patch("x = 1", "x = 1");
        assert!(matches!(apply_patch(dir.path(), &p), Err(PatchError::NoOp)));
    }

    #[test]
    fn test_apply_replaces_first_of_multiple_occurrences() {
        let dir = tempdir().unwrap();
        write_target(dir.path(), "x = 1\ny = 2\nx = 1\n");

        let p = patch("x = 1", "x = 99");
        apply_patch(dir.path(), &p).unwrap();
        assert_eq!(read_target(dir.path()), "x = 99\ny = 2\nx = 1\n");
    }

    #[test]
    fn test_revert_is_noop_when_replacement_absent() {
        let dir = tempdir().unwrap();
        write_target(dir.path(), "x = 1\n");

        let p = patch("x = 1", "x = 99");
        revert_patch(dir.path(), &p).unwrap();
        assert_eq!(read_target(dir.path()), "x = 1\n");
    }
}
