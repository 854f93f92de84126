use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Walks the library depth-first and yields every file in it.
///
/// Symlinked directories are not followed, so link cycles cannot trap the
/// walk; symlinks to files are yielded like regular files. A directory that
/// cannot be listed is logged once and skipped. The walk is lazy and can be
/// restarted by calling `walk` again.
pub fn walk(root: &Path) -> impl Iterator<Item = PathBuf> + use<> {
    walk_excluding(root, None)
}

/// Like [`walk`], but never descends into `excluded`.
///
/// Used to keep a destination nested inside the library out of the walk.
/// Directories are compared by canonical path, so `excluded` may be given in
/// any form that resolves to the same directory.
pub fn walk_excluding(
    root: &Path,
    excluded: Option<&Path>,
) -> impl Iterator<Item = PathBuf> + use<> {
    let excluded = excluded.and_then(|path| path.canonicalize().ok());

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |entry| match &excluded {
            Some(excluded) => !is_dir_at(entry, excluded),
            None => true,
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                tracing::warn!("Skipping unreadable path {:?}: {}", path, e);
                None
            }
        })
        .filter(|entry| {
            let file_type = entry.file_type();
            file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
        })
        .map(|entry| entry.into_path())
}

fn is_dir_at(entry: &DirEntry, path: &Path) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let skip = entry.path().canonicalize().is_ok_and(|canonical| canonical == path);
    if skip {
        tracing::debug!("Not descending into destination {:?}", entry.path());
    }
    skip
}
