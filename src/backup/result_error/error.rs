use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    LiblzmaStream(#[from] liblzma::stream::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),
    #[error(transparent)]
    LoggingInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("Lock file {lock_path:?} already exists (owner pid: {}), another backup may be running", owner_pid.map(|p| p.to_string()).unwrap_or_else(|| "unknown".into()))]
    AlreadyRunning {
        lock_path: PathBuf,
        owner_pid: Option<u32>,
    },
    #[error("Source folder not found or not a directory, skipping: {0:?}")]
    SourceMissing(PathBuf),
    #[error("Copy {:?} failed:\n{}", src, indent::indent_all_with("  ", error.to_string()))]
    CopyFailure { src: PathBuf, error: Box<Error> },
    #[error("Archive {:?} failed:\n{}", bundle, indent::indent_all_with("  ", error.to_string()))]
    ArchiveFailure { bundle: PathBuf, error: Box<Error> },
    #[error("Retention cleanup failed:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    RetentionFailure(Box<Error>),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send + Sync>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + Sync + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(|e| e.into_iter()).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    /// True for the lock conflict, looking through context wrappers.
    pub fn is_already_running(&self) -> bool {
        match self {
            Error::AlreadyRunning { .. } => true,
            Error::WithMsg { error, .. } | Error::WithDebugObjAndFnName { error, .. } => {
                error.is_already_running()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> Error {
        Error::from(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ))
    }

    #[test]
    fn test_error_from_io_error() {
        match not_found() {
            Error::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_with_msg() {
        match not_found().with_msg("Custom message") {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Custom message"),
            _ => panic!("Expected WithMsg error"),
        }
    }

    #[test]
    fn test_error_with_debug_object_and_fn_name() {
        let error = not_found().with_debug_object_and_fn_name("test_object", "test_function");
        match error {
            Error::WithDebugObjAndFnName { fn_name, .. } => assert_eq!(fn_name, "test_function"),
            _ => panic!("Expected WithDebugObjAndFnName error"),
        }
    }

    #[test]
    fn test_error_from_vec_flattens() {
        let nested = Error::from(vec![not_found(), not_found()]);
        let combined = Error::from(vec![nested, not_found()]);
        match combined {
            Error::LotsOfError(error_vec) => assert_eq!(error_vec.len(), 3),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let _error = Error::from(Vec::<Error>::new());
    }

    #[test]
    fn test_already_running_display_and_detection() {
        let error = Error::AlreadyRunning {
            lock_path: PathBuf::from("/backups/.backup.lock"),
            owner_pid: Some(4242),
        };
        let error_str = error.to_string();
        assert!(error_str.contains(".backup.lock"));
        assert!(error_str.contains("4242"));
        assert!(error.with_msg("run").is_already_running());
        assert!(!not_found().is_already_running());
    }

    #[test]
    fn test_copy_failure_display_indents_cause() {
        let error = Error::CopyFailure {
            src: PathBuf::from("/data/a.txt"),
            error: Box::new(not_found()),
        };
        let error_str = error.to_string();
        assert!(error_str.contains("a.txt"));
        assert!(error_str.contains("\n  file not found"));
    }
}
