//! Finding screenplay files on disk.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ScreenplayError, ScreenplayErrorDescription};

/// Files that live next to screenplays but are not screenplay content.
pub const EXCLUDED_FILES: [&str; 7] = [
    "table_of_contents.txt",
    "main.txt",
    "old traps.txt",
    "trap ideas.txt",
    "readme.md",
    "tts_readme.md",
    "claude.md",
];

fn is_txt(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| EXCLUDED_FILES.contains(&name.as_str()))
}

/// Every `.txt` file under `dir`, recursively, sorted by path.
pub fn find_text_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                log::warn!("Failed to read directory entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_txt(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    files
}

/// A single `.txt` file as given, or every `.txt` file in a directory tree.
pub fn collect_text_files(input: &Path) -> Result<Vec<PathBuf>, ScreenplayError> {
    if input.is_file() {
        return if is_txt(input) {
            Ok(vec![input.to_path_buf()])
        } else {
            Err(ScreenplayError::new(ScreenplayErrorDescription::NotATextFile(input.to_path_buf())))
        };
    }
    if !input.is_dir() {
        return Err(ScreenplayError::new(ScreenplayErrorDescription::InputNotFound(input.to_path_buf())));
    }

    Ok(find_text_files(input))
}

/// Screenplays to convert: a single file as given, or the `.txt` files of a
/// directory tree minus [`EXCLUDED_FILES`].
pub fn collect_screenplays(input: &Path) -> Result<Vec<PathBuf>, ScreenplayError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(ScreenplayError::new(ScreenplayErrorDescription::InputNotFound(input.to_path_buf())));
    }

    let files = find_text_files(input)
        .into_iter()
        .filter(|path| !is_excluded(path))
        .collect::<Vec<_>>();

    if files.is_empty() {
        return Err(ScreenplayError::new(ScreenplayErrorDescription::NoScreenplays(input.to_path_buf())));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_tree_and_skips_excluded_names() {
        let dir = tempfile::tempdir().unwrap();
        let act = dir.path().join("Act 1");
        fs::create_dir(&act).unwrap();
        fs::write(act.join("scene2.txt"), "").unwrap();
        fs::write(act.join("scene1.TXT"), "").unwrap();
        fs::write(act.join("notes.md"), "").unwrap();
        fs::write(dir.path().join("Table_Of_Contents.txt"), "").unwrap();

        let files = collect_screenplays(dir.path()).unwrap();
        assert_eq!(files, vec![act.join("scene1.TXT"), act.join("scene2.txt")]);

        let all = collect_text_files(dir.path()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_screenplays(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err.as_inner(), ScreenplayErrorDescription::InputNotFound(_)));
    }

    #[test]
    fn directory_without_screenplays_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.txt"), "").unwrap();
        let err = collect_screenplays(dir.path()).unwrap_err();
        assert!(matches!(err.as_inner(), ScreenplayErrorDescription::NoScreenplays(_)));
    }

    #[test]
    fn formatter_input_must_be_txt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.md");
        fs::write(&path, "").unwrap();
        assert!(collect_text_files(&path).is_err());
    }
}
