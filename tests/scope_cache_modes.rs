use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pubcache::{
    AppCaches, Entity, EntityKind, PolicyRegistry, RepoResult, RepositoryCacheMode,
    RepositoryCachePolicy, ScopeOptions, ScopeProvider,
    cache::CacheConfig,
    scoping::{Notification, NotificationKind, NotificationSink, ScopeError},
};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Article {
    id: i32,
    title: String,
}

impl Entity for Article {
    const TYPE_NAME: &'static str = "Article";
    const KIND: EntityKind = EntityKind::Content;

    fn id(&self) -> i32 {
        self.id
    }

    fn key(&self) -> Uuid {
        Uuid::from_u128(self.id as u128)
    }
}

#[derive(Default)]
struct Articles {
    rows: Mutex<BTreeMap<i32, Article>>,
    fetches: AtomicUsize,
}

impl Articles {
    fn with(rows: &[(i32, &str)]) -> Self {
        let store = Self::default();
        store.rows.lock().unwrap().extend(rows.iter().map(|(id, title)| {
            (
                *id,
                Article {
                    id: *id,
                    title: title.to_string(),
                },
            )
        }));
        store
    }

    fn get(&self, id: &i32) -> RepoResult<Option<Article>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    fn get_all(&self, ids: &[i32]) -> RepoResult<Vec<Article>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|row| ids.is_empty() || ids.contains(&row.id))
            .cloned()
            .collect())
    }

    fn get_async(&self, id: i32) -> BoxFuture<'_, RepoResult<Option<Article>>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.get(&id)
        })
    }

    fn get_all_async(&self, ids: Vec<i32>) -> BoxFuture<'_, RepoResult<Vec<Article>>> {
        Box::pin(async move { self.get_all(&ids) })
    }

    fn save(&self, entity: Article) -> RepoResult<Article> {
        self.rows.lock().unwrap().insert(entity.id, entity.clone());
        Ok(entity)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notifications: Vec<Notification>) {
        self.delivered.lock().unwrap().extend(notifications);
    }
}

fn setup() -> (
    ScopeProvider,
    Arc<dyn RepositoryCachePolicy<Article, i32>>,
    Arc<AppCaches>,
) {
    let caches = Arc::new(AppCaches::new());
    let policy = PolicyRegistry::default().create::<Article, i32>(caches.clone(), &CacheConfig::default());
    (ScopeProvider::new(caches.clone()), policy, caches)
}

fn read(
    policy: &dyn RepositoryCachePolicy<Article, i32>,
    scope: Option<&pubcache::Scope>,
    store: &Articles,
    id: i32,
) -> Option<Article> {
    policy
        .get(scope, &id, &|id| store.get(id), &|ids| store.get_all(ids))
        .expect("read succeeds")
}

#[test]
fn default_scopes_share_the_global_cache() {
    let (provider, policy, caches) = setup();
    let store = Articles::with(&[(1, "hello")]);

    let first = provider.create_scope(None, ScopeOptions::default()).unwrap();
    assert_eq!(first.repository_cache_mode(), RepositoryCacheMode::Default);
    read(policy.as_ref(), Some(&first), &store, 1);
    first.completed(true);

    let second = provider.create_scope(None, ScopeOptions::default()).unwrap();
    read(policy.as_ref(), Some(&second), &store, 1);
    read(policy.as_ref(), None, &store, 1);

    assert_eq!(store.fetches(), 1);
    assert!(caches.isolated_caches().get::<Article>().is_some());
}

#[test]
fn scoped_reads_stay_private_until_commit() {
    let (provider, policy, caches) = setup();
    let store = Articles::with(&[(1, "hello")]);

    read(policy.as_ref(), None, &store, 1);
    assert_eq!(store.fetches(), 1);

    let scope = provider
        .create_scope(None, ScopeOptions::with_mode(RepositoryCacheMode::Scoped))
        .unwrap();
    let updated = policy
        .update(
            Some(&scope),
            Article {
                id: 1,
                title: "edited".into(),
            },
            &|entity| store.save(entity),
        )
        .unwrap();
    assert_eq!(
        read(policy.as_ref(), Some(&scope), &store, 1),
        Some(updated.clone())
    );
    assert_eq!(policy.get_cached(None, &1).map(|a| a.title), Some("hello".into()));

    scope.completed(true);

    let global = caches.isolated_caches().get::<Article>().unwrap();
    assert!(global.is_empty());
    assert_eq!(read(policy.as_ref(), None, &store, 1), Some(updated));
    assert_eq!(store.fetches(), 2);
}

#[test]
fn rolled_back_scoped_scope_leaves_global_cache_alone() {
    let (provider, policy, _) = setup();
    let store = Articles::with(&[(1, "hello")]);
    read(policy.as_ref(), None, &store, 1);

    {
        let scope = provider
            .create_scope(None, ScopeOptions::with_mode(RepositoryCacheMode::Scoped))
            .unwrap();
        read(policy.as_ref(), Some(&scope), &store, 1);
    }

    assert_eq!(policy.get_cached(None, &1).map(|a| a.id), Some(1));
}

#[test]
fn none_mode_bypasses_caching() {
    let (provider, policy, _) = setup();
    let store = Articles::with(&[(1, "hello")]);
    let scope = provider
        .create_scope(None, ScopeOptions::with_mode(RepositoryCacheMode::None))
        .unwrap();

    read(policy.as_ref(), Some(&scope), &store, 1);
    read(policy.as_ref(), Some(&scope), &store, 1);

    assert_eq!(store.fetches(), 2);
    assert_eq!(policy.get_cached(None, &1), None);
}

#[test]
fn child_inherits_and_may_not_relax_isolation() {
    let (provider, _, _) = setup();
    let root = provider
        .create_scope(None, ScopeOptions::with_mode(RepositoryCacheMode::Scoped))
        .unwrap();

    let child = provider
        .create_scope(Some(&root), ScopeOptions::default())
        .unwrap();
    assert_eq!(child.repository_cache_mode(), RepositoryCacheMode::Scoped);
    assert_eq!(child.depth(), 1);

    let err = provider
        .create_scope(
            Some(&child),
            ScopeOptions::with_mode(RepositoryCacheMode::Default),
        )
        .unwrap_err();
    assert_eq!(
        err,
        ScopeError::IncompatibleCacheMode {
            requested: RepositoryCacheMode::Default,
            parent: RepositoryCacheMode::Scoped,
        }
    );
}

#[test]
fn notifications_reach_the_sink_only_after_root_commit() {
    let caches = Arc::new(AppCaches::new());
    let sink = Arc::new(RecordingSink::default());
    let provider = ScopeProvider::new(caches).with_notification_sink(sink.clone());

    let root = provider.create_scope(None, ScopeOptions::default()).unwrap();
    let child = provider
        .create_scope(Some(&root), ScopeOptions::default())
        .unwrap();
    child.notifications().publish(NotificationKind::EntitySaved {
        entity_type: Article::TYPE_NAME,
        id: 1,
    });
    assert!(sink.delivered.lock().unwrap().is_empty());

    child.completed(true);

    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0].kind,
        NotificationKind::EntitySaved {
            entity_type: "Article",
            id: 1
        }
    );
}

#[tokio::test]
async fn async_reads_use_the_scope_they_were_given_across_awaits() {
    let (provider, policy, caches) = setup();
    let store = Articles::with(&[(1, "hello")]);
    let cancel = CancellationToken::new();

    let scoped = provider
        .create_scope(None, ScopeOptions::with_mode(RepositoryCacheMode::Scoped))
        .unwrap();

    let get_one = |id| store.get_async(id);
    let get_all = |ids| store.get_all_async(ids);
    let read = policy.get_async(Some(&scoped), &1, &get_one, &get_all, &cancel);
    let interleaved = async {
        tokio::task::yield_now().await;
        provider
            .create_scope(None, ScopeOptions::with_mode(RepositoryCacheMode::None))
            .unwrap()
    };
    let (found, bypass) = tokio::join!(read, interleaved);

    assert_eq!(found.unwrap().map(|a| a.id), Some(1));
    assert_eq!(policy.get_cached(Some(&scoped), &1).map(|a| a.id), Some(1));
    assert!(!scoped.isolated_caches().get::<Article>().unwrap().is_empty());
    assert!(caches.isolated_caches().get::<Article>().is_none());
    assert!(bypass.isolated_caches().is_empty());
}
