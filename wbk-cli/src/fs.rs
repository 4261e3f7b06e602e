//! Capability-based file access for mapping files and their CSV inputs.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};
use std::io;

/// Open a UTF-8 file path using ambient authority.
pub(crate) fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Open the directory containing `path`.
pub(crate) fn open_parent_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())
}

/// Open a file named by a mapping.
///
/// Relative paths are confined to `dir`; absolute paths are opened as is.
pub(crate) fn open_input(dir: &fs_utf8::Dir, path: &Utf8Path) -> io::Result<fs_utf8::File> {
    if path.is_absolute() {
        open_utf8_file(path)
    } else {
        dir.open(path)
    }
}
