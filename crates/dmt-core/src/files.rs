use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::detect::detect_name_only;

pub fn is_tag_file(p: &Path) -> bool {
    p.is_file()
        && p.file_name()
            .and_then(|s| s.to_str())
            .and_then(detect_name_only)
            .is_some()
}

/// `.dm3`/`.dm4` files under `dir`, sorted by path.
pub fn find_tag_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 });
    let mut out = Vec::new();
    for entry in walker {
        match entry {
            Ok(e) if is_tag_file(e.path()) => out.push(e.into_path()),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "skipping directory entry"),
        }
    }
    out.sort();
    out
}
