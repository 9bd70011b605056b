//! Existence check for incoming entries.
//!
//! Before a directory's entries are copied into the destination dataset, the
//! candidates whose destination counterpart is already a regular file or a
//! symlink are filtered out. Those are never overwritten: the destination
//! copy may be committed (and annexed) data. Directories are never filtered;
//! they are merged entry by entry instead.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::MergeError;

/// Return the candidates that must not be copied into `root_existing`.
///
/// Each candidate is resolved inside `subdir_incoming`, made relative to
/// `root_incoming`, and looked up at the same relative path under
/// `root_existing`. It is excluded if that path is a regular file (following
/// symlinks) or is itself a symlink, dangling or not. The result keeps the
/// candidates' input order and their original spelling.
///
/// # Errors
/// [`MergeError::PathResolution`] if a candidate does not resolve to a path
/// inside `root_incoming` (typically because `subdir_incoming` is not a
/// descendant of it).
pub fn filter_existing<P: AsRef<Path>>(
    root_incoming: &Path,
    root_existing: &Path,
    subdir_incoming: &Path,
    candidates: &[P],
) -> Result<Vec<PathBuf>, MergeError> {
    let mut excluded = Vec::new();
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let incoming = subdir_incoming.join(candidate);
        let relative =
            incoming
                .strip_prefix(root_incoming)
                .map_err(|_| MergeError::PathResolution {
                    path: incoming.clone(),
                    root: root_incoming.to_path_buf(),
                })?;
        if is_occupied(&root_existing.join(relative)) {
            excluded.push(candidate.to_path_buf());
        }
    }
    Ok(excluded)
}

/// Whether `path` holds something a copy must not replace.
pub(crate) fn is_occupied(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => true,
        Ok(meta) => meta.is_file(),
        Err(_) => false,
    }
}


#[cfg(all(test, unix))]
mod proptests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;

    #[derive(Clone, Copy, Debug)]
    enum Occupant {
        Nothing,
        File,
        Dir,
        Symlink,
    }

    fn arb_occupant() -> impl Strategy<Value = Occupant> {
        prop_oneof![
            Just(Occupant::Nothing),
            Just(Occupant::File),
            Just(Occupant::Dir),
            Just(Occupant::Symlink),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn excluded_iff_file_or_symlink(
            layout in prop::collection::btree_map("[a-z]{1,6}", arb_occupant(), 0..8)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let incoming = dir.path().join("in");
            let existing = dir.path().join("ex");
            fs::create_dir_all(incoming.join("sub")).unwrap();
            fs::create_dir_all(existing.join("sub")).unwrap();

            let layout: BTreeMap<String, Occupant> = layout;
            for (name, occupant) in &layout {
                let path = existing.join("sub").join(name);
                match occupant {
                    Occupant::Nothing => {}
                    Occupant::File => fs::write(&path, "x").unwrap(),
                    Occupant::Dir => fs::create_dir(&path).unwrap(),
                    Occupant::Symlink => std::os::unix::fs::symlink("missing", &path).unwrap(),
                }
            }

            let names: Vec<&String> = layout.keys().collect();
            let excluded = filter_existing(&incoming, &existing, &incoming.join("sub"), &names).unwrap();
            let expected: Vec<PathBuf> = layout
                .iter()
                .filter(|(_, o)| matches!(o, Occupant::File | Occupant::Symlink))
                .map(|(n, _)| PathBuf::from(n))
                .collect();
            prop_assert_eq!(excluded, expected);
        }
    }
}
