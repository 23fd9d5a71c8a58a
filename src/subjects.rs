//! Locating FreeSurfer subjects and their files inside a `SUBJECTS_DIR`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FsPostError, Result};
use crate::hemisphere::Hemisphere;

/// Directories every FreeSurfer subject directory has.
pub const REQUIRED_SUBDIRS: [&str; 3] = ["surf", "mri", "label"];

/// Which hemispheres to consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HemisphereSelection {
    Lh,
    Rh,
    Both,
}

impl HemisphereSelection {
    pub fn hemispheres(&self) -> Vec<Hemisphere> {
        match self {
            HemisphereSelection::Lh => vec![Hemisphere::Lh],
            HemisphereSelection::Rh => vec![Hemisphere::Rh],
            HemisphereSelection::Both => Hemisphere::BOTH.to_vec(),
        }
    }
}

/// Whether `subjects_dir/subject_id` exists and has the `surf`, `mri` and `label` directories.
pub fn validate_freesurfer_subject<P: AsRef<Path>>(subjects_dir: P, subject_id: &str) -> bool {
    let subject_dir = subjects_dir.as_ref().join(subject_id);
    subject_dir.is_dir() && REQUIRED_SUBDIRS.iter().all(|d| subject_dir.join(d).is_dir())
}

/// The sorted names of all valid FreeSurfer subjects in `subjects_dir`. A missing directory has no subjects.
pub fn find_freesurfer_subjects<P: AsRef<Path>>(subjects_dir: P) -> Result<Vec<String>> {
    let subjects_dir = subjects_dir.as_ref();
    if !subjects_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut subjects = Vec::new();
    for entry in fs::read_dir(subjects_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if validate_freesurfer_subject(subjects_dir, &name) {
            subjects.push(name);
        }
    }
    subjects.sort();
    Ok(subjects)
}

/// Find the FreeSurfer directory of a subject, which may be specific to a session.
///
/// Tries `<subject>_<session>`, then `<subject>/<session>`, then `<subject>`.
pub fn find_freesurfer_dir<P: AsRef<Path>>(subjects_dir: P, subject_id: &str, session_id: Option<&str>) -> Result<PathBuf> {
    let subjects_dir = subjects_dir.as_ref();
    let mut candidates = Vec::with_capacity(3);
    if let Some(session) = session_id {
        candidates.push(subjects_dir.join(format!("{}_{}", subject_id, session)));
        candidates.push(subjects_dir.join(subject_id).join(session));
    }
    candidates.push(subjects_dir.join(subject_id));

    candidates.into_iter().find(|c| c.is_dir()).ok_or_else(|| {
        FsPostError::NotFound(format!(
            "No FreeSurfer directory for subject {} (session {}) in {}",
            subject_id,
            session_id.unwrap_or("none"),
            subjects_dir.display()
        ))
    })
}

/// The regular files in `subject_dir/surf` which belong to the selected hemispheres, sorted by name.
///
/// Returns an empty map if there is no `surf` directory.
pub fn get_hemisphere_files<P: AsRef<Path>>(
    subject_dir: P,
    selection: HemisphereSelection,
) -> Result<BTreeMap<Hemisphere, Vec<PathBuf>>> {
    let surf_dir = subject_dir.as_ref().join("surf");
    let mut files = BTreeMap::new();
    if !surf_dir.is_dir() {
        return Ok(files);
    }

    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(&surf_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            entries.push(entry.path());
        }
    }
    entries.sort();

    for hemi in selection.hemispheres() {
        let hemi_files: Vec<PathBuf> = entries
            .iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| Hemisphere::from_file_name(&n.to_string_lossy()))
                    == Some(hemi)
            })
            .cloned()
            .collect();
        files.insert(hemi, hemi_files);
    }
    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_subject(subjects_dir: &Path, name: &str, subdirs: &[&str]) {
        for d in subdirs {
            fs::create_dir_all(subjects_dir.join(name).join(d)).unwrap();
        }
    }

    #[test]
    fn subjects_need_surf_mri_and_label() {
        let dir = tempfile::tempdir().unwrap();
        make_subject(dir.path(), "sub-01", &["surf", "mri", "label"]);
        make_subject(dir.path(), "sub-02", &["surf", "mri"]);
        assert!(validate_freesurfer_subject(dir.path(), "sub-01"));
        assert!(!validate_freesurfer_subject(dir.path(), "sub-02"));
        assert!(!validate_freesurfer_subject(dir.path(), "nonexistent"));
    }

    #[test]
    fn valid_subjects_are_found_sorted() {
        let dir = tempfile::tempdir().unwrap();
        make_subject(dir.path(), "sub-02", &["surf", "mri", "label"]);
        make_subject(dir.path(), "sub-01", &["surf", "mri", "label"]);
        fs::create_dir_all(dir.path().join("invalid")).unwrap();
        fs::write(dir.path().join("file.txt"), "").unwrap();

        assert_eq!(vec!["sub-01", "sub-02"], find_freesurfer_subjects(dir.path()).unwrap());
        assert!(find_freesurfer_subjects(dir.path().join("nonexistent")).unwrap().is_empty());
    }

    #[test]
    fn session_directories_are_preferred() {
        let dir = tempfile::tempdir().unwrap();
        make_subject(dir.path(), "sub-01", &["surf"]);
        assert_eq!(dir.path().join("sub-01"), find_freesurfer_dir(dir.path(), "sub-01", Some("ses-1")).unwrap());

        make_subject(dir.path(), "sub-01_ses-1", &["surf"]);
        assert_eq!(dir.path().join("sub-01_ses-1"), find_freesurfer_dir(dir.path(), "sub-01", Some("ses-1")).unwrap());
        assert!(find_freesurfer_dir(dir.path(), "sub-02", None).is_err());
    }

    #[test]
    fn hemisphere_files_are_split_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let surf = dir.path().join("surf");
        fs::create_dir_all(&surf).unwrap();
        for f in ["lh.pial", "lh.white", "rh.pial", "rh.white", "other.file"].iter() {
            fs::write(surf.join(f), "").unwrap();
        }

        let both = get_hemisphere_files(dir.path(), HemisphereSelection::Both).unwrap();
        assert_eq!(2, both[&Hemisphere::Lh].len());
        assert_eq!(2, both[&Hemisphere::Rh].len());

        let lh = get_hemisphere_files(dir.path(), HemisphereSelection::Lh).unwrap();
        assert!(lh.get(&Hemisphere::Rh).is_none());
        assert_eq!(vec![surf.join("lh.pial"), surf.join("lh.white")], lh[&Hemisphere::Lh]);

        let empty = tempfile::tempdir().unwrap();
        assert!(get_hemisphere_files(empty.path(), HemisphereSelection::Both).unwrap().is_empty());
    }
}
