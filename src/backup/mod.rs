pub mod archive;
pub mod backup_config;
pub mod compress;
pub mod copy;
pub mod enumerate;
pub mod file_ext;
pub mod lock;
pub mod logging;
pub mod progress;
pub mod result_error;
pub mod retention;
pub mod runner;
pub mod staging;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
