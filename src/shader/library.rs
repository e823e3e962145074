//! Shader libraries for the modern backend.

use crate::error::FilterError;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the library compiled into the crate.
pub const DEFAULT_LIBRARY: &str = "default";

const DEFAULT_LIBRARY_SOURCE: &str = include_str!("../../shaders/default.wgsl");

/// File extension of on-disk libraries.
const LIBRARY_EXTENSION: &str = "wgsl";

/// Pipeline stage of a library function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        }
    }

    fn as_naga(&self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

/// Resolves shader libraries by name.
///
/// Search directories are tried in order for `<name>.wgsl`; the embedded
/// default library answers for [`DEFAULT_LIBRARY`] when no directory
/// overrides it.
#[derive(Debug, Clone)]
pub struct ShaderBundle {
    search_dirs: Vec<PathBuf>,
    embedded: bool,
}

impl ShaderBundle {
    /// Bundle holding only the embedded default library.
    pub fn embedded() -> Self {
        Self {
            search_dirs: Vec::new(),
            embedded: true,
        }
    }

    pub fn new(search_dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_dirs: search_dirs.into_iter().collect(),
            embedded: true,
        }
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Drops the embedded fallback, so every library must come from disk.
    pub fn without_embedded(mut self) -> Self {
        self.embedded = false;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Finds and parses the library called `name`.
    pub fn load(&self, name: &str) -> Result<ShaderLibrary, FilterError> {
        for dir in &self.search_dirs {
            let path = dir.join(format!("{name}.{LIBRARY_EXTENSION}"));
            if path.is_file() {
                debug!("Loading shader library `{}` from {:?}", name, path);
                return ShaderLibrary::from_path(name, &path);
            }
        }

        if self.embedded && name == DEFAULT_LIBRARY {
            debug!("Using embedded shader library `{}`", name);
            return ShaderLibrary::parse(name, DEFAULT_LIBRARY_SOURCE);
        }

        Err(FilterError::LibraryNotFound {
            name: name.to_string(),
            searched: self.search_dirs.clone(),
        })
    }
}

impl Default for ShaderBundle {
    fn default() -> Self {
        Self::embedded()
    }
}

/// A parsed and validated WGSL library.
#[derive(Debug)]
pub struct ShaderLibrary {
    name: String,
    source: String,
    module: naga::Module,
}

impl ShaderLibrary {
    pub fn from_path(name: &str, path: &Path) -> Result<Self, FilterError> {
        let source = std::fs::read_to_string(path).map_err(|source| FilterError::LibraryRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(name, &source)
    }

    pub fn parse(name: &str, source: &str) -> Result<Self, FilterError> {
        let invalid = |reason: String| FilterError::LibraryInvalid {
            name: name.to_string(),
            reason,
        };

        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| invalid(format!("parse error: {:?}", e)))?;
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        validator
            .validate(&module)
            .map_err(|e| invalid(format!("validation error: {:?}", e)))?;

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            module,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.module.entry_points.iter().map(|ep| ep.name.as_str())
    }

    /// Looks up a function by name, requiring it to be an entry point of `stage`.
    pub fn resolve<'a>(&self, function: &'a str, stage: Stage) -> Result<&'a str, FilterError> {
        let found = self
            .module
            .entry_points
            .iter()
            .any(|ep| ep.name == function && ep.stage == stage.as_naga());
        if found {
            Ok(function)
        } else {
            Err(FilterError::FunctionNotFound {
                library: self.name.clone(),
                function: function.to_string(),
                stage: stage.name(),
            })
        }
    }
}
