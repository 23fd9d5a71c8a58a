use std::fs;
use std::path::Path;

use tempfile::TempDir;

pub const SUBJECTS_DIR: &str = "resources/subjects_dir";

fn copy_dir(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// A scratch copy of the demo subjects directory, with `subjects/` and `out/` inside.
#[allow(dead_code)]
pub fn scratch_subjects_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    copy_dir(Path::new(SUBJECTS_DIR), &dir.path().join("subjects"));
    dir
}
