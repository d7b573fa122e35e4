use crate::repository::RepoResult;

/// Transaction handle owned by the scope that opened it.
///
/// Nested scopes share their parent's unit of work; only the owning scope commits or
/// rolls it back when it exits.
pub trait UnitOfWork: Send + Sync {
    fn commit(&self) -> RepoResult<()>;

    fn rollback(&self);
}
