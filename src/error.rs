//! Errors raised while building a filter pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors that leave a filter without a usable pipeline.
///
/// [`VideoFilter::initialize`](crate::VideoFilter::initialize) treats every
/// variant as fatal.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("shader library `{name}` not found (searched {searched:?})")]
    LibraryNotFound { name: String, searched: Vec<PathBuf> },

    #[error("failed to read shader library {path:?}")]
    LibraryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader library `{name}` is invalid: {reason}")]
    LibraryInvalid { name: String, reason: String },

    #[error("{stage} function `{function}` not found in shader library `{library}`")]
    FunctionNotFound {
        library: String,
        function: String,
        stage: &'static str,
    },

    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: &'static str, log: String },

    #[error("program failed to link: {0}")]
    ProgramLink(String),

    #[error("GPU object allocation failed: {0}")]
    Allocation(String),

    #[error("context has no vertex arrays: needs GL 3.0 or `{0}`")]
    MissingExtension(&'static str),
}
