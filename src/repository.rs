//! Repository-facing error type and the callback shapes cache policies delegate to.
//!
//! Cache policies never talk to storage themselves. Every operation receives the
//! repository's own fetch or persist routine as a borrowed callback and decides when
//! (and whether) to invoke it.

use std::future::Future;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("repository timeout")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

// ============================================================================
// Synchronous callbacks
// ============================================================================

/// Fetches a single entity by identifier.
pub type GetFn<'a, E, I> = dyn Fn(&I) -> RepoResult<Option<E>> + Send + Sync + 'a;

/// Fetches the entities with the given identifiers; an empty slice means "all".
pub type GetAllFn<'a, E, I> = dyn Fn(&[I]) -> RepoResult<Vec<E>> + Send + Sync + 'a;

pub type ExistsFn<'a, I> = dyn Fn(&I) -> RepoResult<bool> + Send + Sync + 'a;

/// Writes a new or changed entity and returns the stored state (with identity assigned).
pub type PersistFn<'a, E> = dyn Fn(E) -> RepoResult<E> + Send + Sync + 'a;

pub type DeleteFn<'a, E> = dyn Fn(&E) -> RepoResult<()> + Send + Sync + 'a;

/// Counts the entities in storage; used to validate a cached "get all" result.
pub type CountFn = dyn Fn() -> RepoResult<usize> + Send + Sync;

// ============================================================================
// Asynchronous callbacks
// ============================================================================

pub type AsyncGetFn<'a, E, I> = dyn Fn(I) -> BoxFuture<'a, RepoResult<Option<E>>> + Send + Sync + 'a;

pub type AsyncGetAllFn<'a, E, I> =
    dyn Fn(Vec<I>) -> BoxFuture<'a, RepoResult<Vec<E>>> + Send + Sync + 'a;

pub type AsyncExistsFn<'a, I> = dyn Fn(I) -> BoxFuture<'a, RepoResult<bool>> + Send + Sync + 'a;

pub type AsyncPersistFn<'a, E> = dyn Fn(E) -> BoxFuture<'a, RepoResult<E>> + Send + Sync + 'a;

pub type AsyncDeleteFn<'a, E> = dyn Fn(E) -> BoxFuture<'a, RepoResult<()>> + Send + Sync + 'a;

/// Runs `fut` until it finishes or `cancel` fires, whichever comes first.
///
/// On cancellation the inner future is dropped without being polled again.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> RepoResult<T>
where
    F: Future<Output = RepoResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RepoError::Cancelled),
        result = fut => result,
    }
}
