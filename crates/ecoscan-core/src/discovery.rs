use crate::error::{Result, ScanError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg"];
pub const MODERN_IMAGE_EXTS: &[&str] = &["webp", "avif"];
pub const CODE_EXTS: &[&str] = &["js", "jsx", "ts", "tsx", "css", "html"];
pub const SCRIPT_STYLE_EXTS: &[&str] = &["js", "css"];
pub const SCRIPT_EXTS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// Version-control and dependency directories never scanned.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules"];

/// How the static rule engine treats a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Image,
    Markup,
    Stylesheet,
    Script,
    Python,
    Other,
}

/// A regular file found under the analyzed root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub extension: String,
    pub class: FileClass,
}

/// Lower-cased extension without the dot, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn classify(extension: &str) -> FileClass {
    if IMAGE_EXTS.contains(&extension) {
        FileClass::Image
    } else if extension == "html" {
        FileClass::Markup
    } else if extension == "css" {
        FileClass::Stylesheet
    } else if SCRIPT_EXTS.contains(&extension) {
        FileClass::Script
    } else if extension == "py" {
        FileClass::Python
    } else {
        FileClass::Other
    }
}

/// Repository-relative path with forward slashes.
pub fn relative_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Fail unless `root` is an existing directory.
pub fn ensure_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ScanError::SourceTree(root.to_path_buf()))
    }
}

/// Exclusion rules applied on top of the built-in skipped directories.
#[derive(Debug, Clone, Default)]
pub struct Excludes {
    patterns: Vec<glob::Pattern>,
}

impl Excludes {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(relative))
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
}

/// Walk every regular file under `root`, including VCS and dependency directories.
pub fn walk_all_files(root: &Path) -> Result<Vec<PathBuf>> {
    ensure_root(root)?;

    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .collect();

    Ok(files)
}

/// Walk the source files under `root`, skipping VCS/dependency directories and excludes.
pub fn discover_source_files(root: &Path, excludes: &Excludes) -> Result<Vec<SourceFile>> {
    ensure_root(root)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let relative = relative_path(&path, root);
        if excludes.is_excluded(&relative) {
            tracing::debug!(file = %relative, "excluded by config");
            continue;
        }

        let extension = extension_of(&path);
        files.push(SourceFile {
            class: classify(&extension),
            path,
            relative_path: relative,
            extension,
        });
    }

    Ok(files)
}

/// Every directory under `root` with its regular files in name order.
///
/// Directories are listed in walk order (depth-first by name), the root first.
pub fn list_directories(root: &Path, excludes: &Excludes) -> Result<Vec<(PathBuf, Vec<PathBuf>)>> {
    ensure_root(root)?;

    let mut groups: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();
    let mut slots: HashMap<PathBuf, usize> = HashMap::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !is_skipped_dir(e)
                && (e.depth() == 0 || !excludes.is_excluded(&relative_path(e.path(), root)))
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            let path = entry.into_path();
            slots.insert(path.clone(), groups.len());
            groups.push((path, Vec::new()));
        } else if file_type.is_file() {
            let slot = entry.path().parent().and_then(|parent| slots.get(parent)).copied();
            if let Some(slot) = slot {
                groups[slot].1.push(entry.into_path());
            }
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("src/app.js"), "let a = 1;").unwrap();
        fs::write(root.join("src/components/Button.tsx"), "export {}").unwrap();
        fs::write(root.join("node_modules/lib/index.js"), "x").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join("dist/bundle.js"), "x").unwrap();
        dir
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("jpg"), FileClass::Image);
        assert_eq!(classify("html"), FileClass::Markup);
        assert_eq!(classify("css"), FileClass::Stylesheet);
        assert_eq!(classify("tsx"), FileClass::Script);
        assert_eq!(classify("py"), FileClass::Python);
        assert_eq!(classify("md"), FileClass::Other);
        assert_eq!(extension_of(Path::new("a/B.JPG")), "jpg");
        assert_eq!(extension_of(Path::new("Makefile")), "");
    }

    #[test]
    fn test_discover_skips_vcs_and_dependencies() {
        let dir = tree();
        let files = discover_source_files(dir.path(), &Excludes::default()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert!(paths.contains(&"index.html"));
        assert!(paths.contains(&"src/app.js"));
        assert!(paths.contains(&"src/components/Button.tsx"));
        assert!(paths.contains(&"dist/bundle.js"));
        assert!(!paths.iter().any(|p| p.starts_with("node_modules")));
        assert!(!paths.iter().any(|p| p.starts_with(".git")));
    }

    #[test]
    fn test_discover_honors_excludes() {
        let dir = tree();
        let excludes = Excludes::new(&["dist/**".to_string()]);
        let files = discover_source_files(dir.path(), &excludes).unwrap();
        assert!(!files.iter().any(|f| f.relative_path.starts_with("dist")));
    }

    #[test]
    fn test_walk_all_files_includes_everything() {
        let dir = tree();
        let files = walk_all_files(dir.path()).unwrap();
        assert_eq!(files.len(), 6);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_source_files(&missing, &Excludes::default()),
            Err(ScanError::SourceTree(_))
        ));
    }

    #[test]
    fn test_list_directories_order() {
        let dir = tree();
        let dirs = list_directories(dir.path(), &Excludes::default()).unwrap();
        let names: Vec<String> = dirs
            .iter()
            .map(|(d, _)| relative_path(d, dir.path()))
            .collect();
        assert_eq!(names, vec!["", "dist", "src", "src/components"]);
        assert_eq!(dirs[0].1.len(), 1);
    }

    #[test]
    fn test_list_directories_groups_files_by_parent() {
        let dir = tree();
        fs::write(dir.path().join("src/zeta.js"), "z").unwrap();
        fs::write(dir.path().join("src/alpha.js"), "a").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let dirs = list_directories(dir.path(), &Excludes::default()).unwrap();
        let src = dirs
            .iter()
            .find(|(d, _)| relative_path(d, dir.path()) == "src")
            .unwrap();
        let names: Vec<String> = src.1.iter().map(|f| relative_path(f, dir.path())).collect();
        assert_eq!(names, vec!["src/alpha.js", "src/app.js", "src/zeta.js"]);

        let empty = dirs
            .iter()
            .find(|(d, _)| relative_path(d, dir.path()) == "empty")
            .unwrap();
        assert!(empty.1.is_empty());
    }

    #[test]
    fn test_list_directories_honors_excludes() {
        let dir = tree();
        let excludes = Excludes::new(&["src/components".to_string(), "dist/*.js".to_string()]);
        let dirs = list_directories(dir.path(), &excludes).unwrap();
        let names: Vec<String> = dirs
            .iter()
            .map(|(d, _)| relative_path(d, dir.path()))
            .collect();
        assert_eq!(names, vec!["", "dist", "src"]);
        assert!(dirs[1].1.is_empty());
    }

    #[test]
    fn test_list_directories_walks_deep_trees() {
        let dir = tempfile::tempdir().unwrap();
        let mut deep = dir.path().to_path_buf();
        for _ in 0..64 {
            deep.push("d");
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.js"), "x").unwrap();

        let dirs = list_directories(dir.path(), &Excludes::default()).unwrap();
        assert_eq!(dirs.len(), 65);
        let (last, files) = dirs.last().unwrap();
        assert_eq!(last, &deep);
        assert_eq!(files.len(), 1);
    }
}
