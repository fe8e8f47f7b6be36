//! Unpacks a story archive into a working directory and locates its entry
//! point.

use crate::error::ConversionError;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;

/// Name of the media folder expected next to the HTML file.
pub const ASSETS_DIR_NAME: &str = "assets";

/// Where the extracted story lives inside the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStory {
    pub html_file: PathBuf,
    pub assets_dir: Option<PathBuf>,
    /// Directory holding the HTML file and the assets folder.
    pub base_path: PathBuf,
}

/// Keeps only normal path components, so `../../etc/passwd` becomes
/// `etc/passwd` and `/abs` becomes `abs`.
fn sanitize_path(path: &str) -> Option<PathBuf> {
    let mut sanitized = PathBuf::new();
    for component in Path::new(path).components() {
        if let Component::Normal(part) = component {
            sanitized.push(part);
        }
    }
    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Writes every entry of the archive under `dest`.
pub fn unzip_into(zip_path: &Path, dest: &Path) -> Result<(), ConversionError> {
    let file = File::open(zip_path)
        .map_err(|e| ConversionError::InvalidArchive(format!("{}: {e}", zip_path.display())))?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.encrypted() {
            return Err(ConversionError::InvalidArchive(
                "archive is password-protected".to_string(),
            ));
        }

        let raw_name = entry.name().to_string();
        let Some(rel) = sanitize_path(&raw_name) else {
            warn!("skipping zip entry with unusable path: {raw_name}");
            continue;
        };
        let target = dest.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| ConversionError::InvalidArchive(format!("{raw_name}: {e}")))?;
    }
    Ok(())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, ConversionError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

fn is_html_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("html"))
            .unwrap_or(false)
}

fn is_assets_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case(ASSETS_DIR_NAME))
            .unwrap_or(false)
}

/// Finds the HTML entry point and optional assets folder in an extracted
/// tree, unwrapping a single top-level folder once.
pub fn locate_story(root: &Path) -> Result<ExtractedStory, ConversionError> {
    let mut base_path = root.to_path_buf();
    let mut entries = list_dir(root)?;

    if entries.len() == 1 && entries[0].is_dir() {
        let nested = list_dir(&entries[0])?;
        if !nested.is_empty() {
            debug!("unwrapping single top-level folder {}", entries[0].display());
            base_path = entries[0].clone();
            entries = nested;
        }
    }

    let html_files: Vec<&PathBuf> = entries.iter().filter(|p| is_html_file(p)).collect();
    let assets_dir = entries.iter().find(|p| is_assets_dir(p)).cloned();

    match html_files.len() {
        0 => Err(ConversionError::NoHtmlFile),
        1 => Ok(ExtractedStory {
            html_file: html_files[0].clone(),
            assets_dir,
            base_path,
        }),
        count => Err(ConversionError::MultipleHtmlFiles { count }),
    }
}

/// Unzips `zip_path` into `work_dir` and locates the story inside it.
pub fn extract_story(zip_path: &Path, work_dir: &Path) -> Result<ExtractedStory, ConversionError> {
    unzip_into(zip_path, work_dir)?;
    locate_story(work_dir)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Builds a zip from `(name, contents)` pairs; names ending in `/` are
    /// directories.
    pub(crate) fn make_zip(entries: &[(&str, &[u8])]) -> NamedTempFile {
        let temp = NamedTempFile::new().expect("temp zip");
        let mut zip = ZipWriter::new(temp.reopen().expect("reopen"));
        let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, opts).expect("add dir");
            } else {
                zip.start_file(*name, opts).expect("start file");
                zip.write_all(contents).expect("write");
            }
        }
        zip.finish().expect("finish");
        temp
    }

    #[test]
    fn finds_html_and_assets_at_root() {
        let zip = make_zip(&[
            ("story.html", b"<h1>x</h1>"),
            ("assets/a.jpg", b"jpg"),
        ]);
        let dir = TempDir::new().unwrap();
        let story = extract_story(zip.path(), dir.path()).unwrap();
        assert_eq!(story.html_file, dir.path().join("story.html"));
        assert_eq!(story.assets_dir, Some(dir.path().join("assets")));
        assert_eq!(story.base_path, dir.path());
    }

    #[test]
    fn unwraps_one_level_of_nesting() {
        let zip = make_zip(&[
            ("export/", b""),
            ("export/index.html", b"<p>x</p>"),
            ("export/Assets/b.png", b"png"),
        ]);
        let dir = TempDir::new().unwrap();
        let story = extract_story(zip.path(), dir.path()).unwrap();
        assert_eq!(story.base_path, dir.path().join("export"));
        assert_eq!(story.html_file, dir.path().join("export/index.html"));
        assert_eq!(story.assets_dir, Some(dir.path().join("export/Assets")));
    }

    #[test]
    fn does_not_unwrap_twice() {
        let zip = make_zip(&[("a/b/index.html", b"<p>x</p>")]);
        let dir = TempDir::new().unwrap();
        let err = extract_story(zip.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConversionError::NoHtmlFile));
    }

    #[test]
    fn two_html_files_are_ambiguous() {
        let zip = make_zip(&[("a.html", b"<p>a</p>"), ("b.HTML", b"<p>b</p>")]);
        let dir = TempDir::new().unwrap();
        let err = extract_story(zip.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConversionError::MultipleHtmlFiles { count: 2 }));
    }

    #[test]
    fn missing_html_is_an_error() {
        let zip = make_zip(&[("assets/a.jpg", b"jpg"), ("readme.txt", b"hi")]);
        let dir = TempDir::new().unwrap();
        let err = extract_story(zip.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConversionError::NoHtmlFile));
    }

    #[test]
    fn missing_assets_folder_is_fine() {
        let zip = make_zip(&[("story.html", b"<p>x</p>")]);
        let dir = TempDir::new().unwrap();
        let story = extract_story(zip.path(), dir.path()).unwrap();
        assert!(story.assets_dir.is_none());
    }

    #[test]
    fn rejects_non_zip_input() {
        let mut not_zip = NamedTempFile::new().unwrap();
        not_zip.write_all(b"definitely not a zip").unwrap();
        let dir = TempDir::new().unwrap();
        let err = extract_story(not_zip.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidArchive(_)));
    }

    /// Sets general-purpose flag bit 0 (encrypted) on every local and
    /// central header of a plain archive.
    fn mark_encrypted(bytes: &mut [u8]) {
        let mut i = 0;
        while i + 10 <= bytes.len() {
            let signature = [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];
            match &signature {
                b"PK\x03\x04" => bytes[i + 6] |= 1,
                b"PK\x01\x02" => bytes[i + 8] |= 1,
                _ => {}
            }
            i += 1;
        }
    }

    #[test]
    fn password_protected_archive_is_invalid() {
        let plain = make_zip(&[("story.html", b"<h1>locked</h1>")]);
        let mut bytes = std::fs::read(plain.path()).unwrap();
        mark_encrypted(&mut bytes);
        let mut locked = NamedTempFile::new().unwrap();
        locked.write_all(&bytes).unwrap();

        let dir = TempDir::new().unwrap();
        let err = extract_story(locked.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidArchive(_)), "{err}");
        assert!(!dir.path().join("story.html").exists());
    }

    #[test]
    fn traversal_entries_stay_inside_the_working_dir() {
        assert_eq!(sanitize_path("../../etc/passwd"), Some(PathBuf::from("etc/passwd")));
        assert_eq!(sanitize_path(".."), None);
        assert_eq!(sanitize_path("/abs/file.html"), Some(PathBuf::from("abs/file.html")));
    }
}
