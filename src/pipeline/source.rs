// src/pipeline/source.rs

//! Source file collection: glob patterns → file set.

use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;
use crate::pipeline::{FileRecord, FileSet};

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect all files under `root` matching the given patterns, in sorted
/// path order, with their contents loaded.
///
/// Paths in the returned records are relative to `root` with forward
/// slashes, so pipelines behave the same across platforms.
pub fn collect_sources(
    fs: &dyn FileSystem,
    root: &Path,
    patterns: &[String],
) -> Result<FileSet> {
    let set = build_globset(patterns)?;
    let mut paths = collect_matching_paths(fs, root, &set)?;
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for rel in paths {
        let contents = fs.read(&root.join(&rel))?;
        files.push(FileRecord::new(rel, contents));
    }
    Ok(files)
}

/// Walk `root` recursively and return relative path strings matching `set`.
pub fn collect_matching_paths(
    fs: &dyn FileSystem,
    root: &Path,
    set: &GlobSet,
) -> Result<Vec<String>> {
    let mut matched = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if !fs.is_dir(&dir) {
            continue;
        }
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                // When root is ".", walked paths may already be relative.
                let rel = match path.strip_prefix(root) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) if root == Path::new(".") => path.clone(),
                    Err(_) => continue,
                };
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                let rel_str = rel_str.trim_start_matches("./").to_string();
                if set.is_match(&rel_str) {
                    matched.push(rel_str);
                }
            }
        }
    }

    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use std::path::PathBuf;

    #[test]
    fn collects_matching_files_sorted() {
        let fs = MockFileSystem::new();
        fs.add_file("src/client/styles/b.less", "b");
        fs.add_file("src/client/styles/a.less", "a");
        fs.add_file("src/client/app/x.js", "x");

        let files = collect_sources(
            &fs,
            Path::new("."),
            &["src/client/styles/**/*.less".to_string()],
        )
        .unwrap();

        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("src/client/styles/a.less"),
                PathBuf::from("src/client/styles/b.less"),
            ]
        );
        assert_eq!(files[0].contents, b"a");
    }

    #[test]
    fn empty_pattern_list_matches_nothing() {
        let fs = MockFileSystem::new();
        fs.add_file("a.txt", "a");

        let files = collect_sources(&fs, Path::new("."), &[]).unwrap();
        assert!(files.is_empty());
    }
}
