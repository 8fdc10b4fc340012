use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::cache::Cache;
use crate::error::Result;

/// How a wrapped fetcher derives its cache key: either one fixed key for
/// every call, or a key computed from the call arguments.
pub enum CacheKey<A> {
    Fixed(String),
    FromArgs(Box<dyn Fn(&A) -> String + Send + Sync>),
}

impl<A> CacheKey<A> {
    pub fn fixed(key: impl Into<String>) -> Self {
        CacheKey::Fixed(key.into())
    }

    pub fn from_args<F>(f: F) -> Self
    where
        F: Fn(&A) -> String + Send + Sync + 'static,
    {
        CacheKey::FromArgs(Box::new(f))
    }

    fn resolve(&self, args: &A) -> String {
        match self {
            CacheKey::Fixed(key) => key.clone(),
            CacheKey::FromArgs(f) => f(args),
        }
    }
}

/// An async fetch function wrapped with caching.
///
/// Calling it consults the cache under a key derived from the arguments and
/// only falls through to the underlying fetcher on a miss. The return value
/// is the same either way; a hit is only observable through the stats.
pub struct Cached<A, V> {
    cache: Arc<Cache<V>>,
    key: CacheKey<A>,
    ttl: Duration,
    tags: Vec<String>,
    fetcher: Box<dyn Fn(A) -> BoxFuture<'static, Result<V>> + Send + Sync>,
}

impl<A, V> Cached<A, V>
where
    V: Clone + Send + Sync + 'static,
{
    pub async fn call(&self, args: A) -> Result<V> {
        let key = self.key.resolve(&args);
        self.cache
            .get_or_set(&key, self.ttl, self.tags.clone(), || (self.fetcher)(args))
            .await
    }
}

/// Wrap `fetcher` so call sites get caching without rewriting their call
/// structure. Composed explicitly where the fetcher is defined.
pub fn with_cache<A, V, F, Fut>(
    cache: Arc<Cache<V>>,
    key: CacheKey<A>,
    ttl: Duration,
    tags: Vec<String>,
    fetcher: F,
) -> Cached<A, V>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V>> + Send + 'static,
{
    Cached {
        cache,
        key,
        ttl,
        tags,
        fetcher: Box::new(move |args| Box::pin(fetcher(args))),
    }
}
