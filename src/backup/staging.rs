//! Where each source file lands inside the staging tree.
//!
//! Paths are made relative to the deepest directory shared by every source
//! folder. When the folders share nothing at all (different drives, or a mix
//! of relative and absolute paths) each file is placed under the last
//! component of its own source folder instead.

use crate::backup::enumerate::FileTask;
use crate::backup::result_error::result::Result;

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct StagingLayout {
    staging: Arc<Path>,
    ancestor: Option<PathBuf>,
}

impl StagingLayout {
    pub fn new<P: Into<Arc<Path>>>(staging: P, source_folders: &[PathBuf]) -> Self {
        let ancestor = common_ancestor(source_folders);
        match &ancestor {
            Some(a) => tracing::debug!("Staging paths are relative to {:?}", a),
            None => tracing::warn!(
                "Source folders share no common ancestor, staging each under its folder name"
            ),
        }
        Self {
            staging: staging.into(),
            ancestor,
        }
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn ancestor(&self) -> Option<&Path> {
        self.ancestor.as_deref()
    }

    pub fn relative_path(&self, task: &FileTask) -> Result<PathBuf> {
        match &self.ancestor {
            Some(ancestor) => Ok(task.src.strip_prefix(ancestor)?.to_path_buf()),
            None => {
                let folder_name = task
                    .root
                    .file_name()
                    .unwrap_or_else(|| OsStr::new("root"));
                Ok(Path::new(folder_name).join(task.src.strip_prefix(&task.root)?))
            }
        }
    }

    pub fn destination(&self, task: &FileTask) -> Result<PathBuf> {
        Ok(self.staging.join(self.relative_path(task)?))
    }
}

/// Longest shared component prefix, `None` when not even the root is shared.
pub fn common_ancestor<P: AsRef<Path>>(paths: &[P]) -> Option<PathBuf> {
    let (first, rest) = paths.split_first()?;
    let mut common: Vec<Component> = first.as_ref().components().collect();
    for path in rest {
        let shared = common
            .iter()
            .zip(path.as_ref().components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }

    if common.is_empty() {
        None
    } else {
        Some(common.iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(src: &str, root: &str) -> FileTask {
        FileTask {
            src: Path::new(src).into(),
            root: Path::new(root).into(),
            size: 0,
        }
    }

    #[test]
    fn test_common_ancestor() {
        assert_eq!(
            common_ancestor(&["/data/docs", "/data/photos/2024"]),
            Some(PathBuf::from("/data"))
        );
        assert_eq!(
            common_ancestor(&["/data/docs"]),
            Some(PathBuf::from("/data/docs"))
        );
        assert_eq!(
            common_ancestor(&["/srv/a", "/home/b"]),
            Some(PathBuf::from("/"))
        );
        assert_eq!(common_ancestor(&["a/x", "b/y"]), None);
        assert_eq!(common_ancestor::<&str>(&[]), None);
    }

    #[test]
    fn test_relative_to_common_ancestor() {
        let folders = vec![PathBuf::from("/data/docs"), PathBuf::from("/data/photos")];
        let layout = StagingLayout::new(Path::new("/staging"), &folders);

        let t = task("/data/docs/report/q1.txt", "/data/docs");
        assert_eq!(layout.relative_path(&t).unwrap(), PathBuf::from("docs/report/q1.txt"));
        assert_eq!(
            layout.destination(&t).unwrap(),
            PathBuf::from("/staging/docs/report/q1.txt")
        );
    }

    #[test]
    fn test_single_folder_is_its_own_ancestor() {
        let folders = vec![PathBuf::from("/data/docs")];
        let layout = StagingLayout::new(Path::new("/staging"), &folders);
        let t = task("/data/docs/a.txt", "/data/docs");
        assert_eq!(layout.relative_path(&t).unwrap(), PathBuf::from("a.txt"));
    }

    #[test]
    fn test_no_common_ancestor_uses_folder_name() {
        let folders = vec![PathBuf::from("left/docs"), PathBuf::from("right/pics")];
        let layout = StagingLayout::new(Path::new("/staging"), &folders);
        assert!(layout.ancestor().is_none());

        let t = task("right/pics/cat/1.png", "right/pics");
        assert_eq!(layout.relative_path(&t).unwrap(), PathBuf::from("pics/cat/1.png"));
    }

    #[test]
    fn test_file_outside_ancestor_is_error() {
        let folders = vec![PathBuf::from("/data/docs")];
        let layout = StagingLayout::new(Path::new("/staging"), &folders);
        assert!(layout.relative_path(&task("/elsewhere/a.txt", "/elsewhere")).is_err());
    }
}
