use std::fmt;

use super::ScopeError;

/// Which cache tier repository policies visit while a scope is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryCacheMode {
    /// Inherit from the parent scope; a root scope falls back to `Default`.
    #[default]
    Unspecified,
    /// Read and write the shared global caches.
    Default,
    /// Read and write caches private to the scope; committed changes flush the
    /// affected global caches on successful exit.
    Scoped,
    /// Bypass caching entirely.
    None,
}

impl RepositoryCacheMode {
    fn isolation(self) -> u8 {
        match self {
            RepositoryCacheMode::Unspecified => 0,
            RepositoryCacheMode::Default => 1,
            RepositoryCacheMode::Scoped => 2,
            RepositoryCacheMode::None => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryCacheMode::Unspecified => "unspecified",
            RepositoryCacheMode::Default => "default",
            RepositoryCacheMode::Scoped => "scoped",
            RepositoryCacheMode::None => "none",
        }
    }

    /// Resolves the effective mode of a new scope.
    ///
    /// A child may be as isolated as its parent or more, never less.
    pub(crate) fn resolve(
        self,
        parent: Option<RepositoryCacheMode>,
    ) -> Result<RepositoryCacheMode, ScopeError> {
        match (self, parent) {
            (RepositoryCacheMode::Unspecified, None) => Ok(RepositoryCacheMode::Default),
            (RepositoryCacheMode::Unspecified, Some(parent)) => Ok(parent),
            (requested, Some(parent)) if requested.isolation() < parent.isolation() => {
                Err(ScopeError::IncompatibleCacheMode { requested, parent })
            }
            (requested, _) => Ok(requested),
        }
    }
}

impl fmt::Display for RepositoryCacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
