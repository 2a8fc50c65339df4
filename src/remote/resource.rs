//! Remote resources: query state with refetch, and mutation wrappers.
//!
//! A [`Query`] re-fetches whenever its key changes and publishes its
//! [`RemoteResource`] state on a `watch` channel, so any number of
//! observers can follow it. A [`Mutation`] wraps one mutating call with a
//! loading flag and leaves error handling and invalidation to the caller.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, ErrorCode, Result};

/// Observable state of a remote resource.
///
/// `data` keeps its last successful value when a later fetch fails.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResource<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    /// Category of the last failure, alongside `error`.
    pub error_code: Option<ErrorCode>,
}

impl<T> Default for RemoteResource<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            error_code: None,
        }
    }
}

impl<T> RemoteResource<T> {
    /// The data if the last fetch succeeded, otherwise the failure.
    ///
    /// # Errors
    ///
    /// Returns `Error::Resource` carrying the recorded message and code,
    /// or `Error::Other` if nothing has been loaded.
    pub fn into_result(self) -> Result<T> {
        if let Some(message) = self.error {
            return Err(Error::Resource {
                code: self.error_code.unwrap_or(ErrorCode::InternalError),
                message,
            });
        }
        self.data
            .ok_or_else(|| Error::Other("Resource has not been loaded".to_string()))
    }
}

/// Query side of a remote resource, keyed by `K`.
///
/// Each fetch takes a generation number; a response only updates the
/// state if no newer fetch (or key reset) was issued in the meantime, so
/// overlapping key changes resolve to the most recent key.
pub struct Query<K, T, F> {
    fetch: F,
    key: Mutex<Option<K>>,
    mounted: AtomicBool,
    disposed: AtomicBool,
    generation: AtomicU64,
    state: watch::Sender<RemoteResource<T>>,
}

impl<K, T, F, Fut> Query<K, T, F>
where
    K: Clone + PartialEq,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    /// Create an unmounted query. Nothing is fetched until
    /// [`Query::set_key`] is called.
    pub fn new(fetch: F) -> Self {
        let (state, _) = watch::channel(RemoteResource::default());
        Self {
            fetch,
            key: Mutex::new(None),
            mounted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Declare the query key.
    ///
    /// The first call always evaluates; later calls only when the key
    /// differs from the current one. `None` skips fetching and resets
    /// `data` to nothing.
    pub async fn set_key(&self, key: Option<K>) {
        {
            let mut current = self.key.lock().unwrap_or_else(PoisonError::into_inner);
            let first = !self.mounted.swap(true, Ordering::SeqCst);
            if !first && *current == key {
                return;
            }
            current.clone_from(&key);
        }

        match key {
            Some(key) => self.run(key).await,
            None => self.reset(),
        }
    }

    /// Re-run the fetch with the current key. No-op without a key.
    pub async fn refetch(&self) {
        let key = self
            .key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(key) = key {
            self.run(key).await;
        }
    }

    /// Stop accepting responses. In-flight fetches resolve into nothing.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<RemoteResource<T>> {
        self.state.subscribe()
    }

    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(RemoteResource::default());
    }

    async fn run(&self, key: K) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            s.error_code = None;
        });
        debug!(generation, "Fetching remote resource");

        let result = (self.fetch)(key).await;

        if self.disposed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            debug!(generation, "Discarding superseded response");
            return;
        }

        self.state.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(data) => s.data = Some(data),
                Err(e) => {
                    warn!(generation, error = %e, "Remote resource fetch failed");
                    s.error_code = Some(e.error_code());
                    s.error = Some(e.to_string());
                }
            }
        });
    }
}

impl<K, T: Clone, F> Query<K, T, F> {
    /// Snapshot of the current state.
    pub fn state(&self) -> RemoteResource<T> {
        self.state.borrow().clone()
    }
}

/// Mutation side of a remote resource.
///
/// `loading` is true while at least one call is in flight.
pub struct Mutation<F> {
    action: F,
    in_flight: AtomicUsize,
    loading: watch::Sender<bool>,
}

impl<F> Mutation<F> {
    pub fn new(action: F) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            action,
            in_flight: AtomicUsize::new(0),
            loading,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Subscribe to loading changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Run the action.
    ///
    /// # Errors
    ///
    /// Returns the action's error unchanged.
    pub async fn run<A, T, Fut>(&self, args: A) -> Result<T>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _guard = InFlight::enter(&self.in_flight, &self.loading);
        (self.action)(args).await
    }
}

/// Marks one call in flight; dropping it (completion or cancellation)
/// releases it.
struct InFlight<'a> {
    count: &'a AtomicUsize,
    loading: &'a watch::Sender<bool>,
}

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize, loading: &'a watch::Sender<bool>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        loading.send_replace(true);
        Self { count, loading }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let remaining = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        self.loading.send_replace(remaining > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    type BoxedFetch = std::pin::Pin<Box<dyn Future<Output = Result<String>> + Send>>;

    fn counting_query(calls: Arc<AtomicUsize>) -> Query<u32, String, impl Fn(u32) -> BoxedFetch> {
        Query::new(move |id: u32| {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("partner {id}"))
            }) as std::pin::Pin<Box<dyn Future<Output = Result<String>> + Send>>
        })
    }

    #[tokio::test]
    async fn test_fetches_on_mount_and_key_change_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(calls.clone());

        query.set_key(Some(1)).await;
        query.set_key(Some(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(query.state().data.as_deref(), Some("partner 1"));

        query.set_key(Some(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(query.state().data.as_deref(), Some("partner 2"));

        query.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_none_key_skips_fetch_and_resets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(calls.clone());

        query.set_key(None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(query.state(), RemoteResource::default());

        query.set_key(Some(7)).await;
        assert!(query.state().data.is_some());

        query.set_key(None).await;
        let state = query.state();
        assert!(state.data.is_none());
        assert!(!state.loading);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Refetch without a key does nothing.
        query.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_stale_data() {
        let fail = Arc::new(AtomicBool::new(false));
        let flag = fail.clone();
        let query = Query::new(move |_: ()| {
            let fail = flag.load(Ordering::SeqCst);
            async move {
                if fail {
                    Err(Error::Api {
                        status: 502,
                        message: "Bad Gateway".into(),
                    })
                } else {
                    Ok(42_u32)
                }
            }
        });

        query.set_key(Some(())).await;
        assert_eq!(query.state().data, Some(42));

        fail.store(true, Ordering::SeqCst);
        query.refetch().await;

        let state = query.state();
        assert_eq!(state.data, Some(42));
        assert!(state.error.as_deref().unwrap().contains("Bad Gateway"));
        assert_eq!(state.error_code, Some(ErrorCode::ApiError));
        assert!(!state.loading);

        // The next successful fetch clears the error.
        fail.store(false, Ordering::SeqCst);
        query.refetch().await;
        let state = query.state();
        assert!(state.error.is_none());
        assert!(state.error_code.is_none());
    }

    #[tokio::test]
    async fn test_loading_clears_error() {
        let query = Query::new(|fail: bool| async move {
            if fail {
                Err(Error::Other("boom".into()))
            } else {
                tokio::task::yield_now().await;
                Ok(1_u8)
            }
        });
        query.set_key(Some(true)).await;
        assert!(query.state().error.is_some());

        let mut rx = query.subscribe();
        rx.borrow_and_update();
        let observer = tokio::spawn(async move {
            rx.changed().await.unwrap();
            rx.borrow().clone()
        });
        query.set_key(Some(false)).await;

        let first_change = observer.await.unwrap();
        assert!(first_change.loading);
        assert!(first_change.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_response_is_discarded() {
        let query = Query::new(|id: u32| async move {
            let delay = if id == 1 { 500 } else { 50 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(format!("partner {id}"))
        });

        tokio::join!(query.set_key(Some(1)), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            query.set_key(Some(2)).await;
        });

        let state = query.state();
        assert_eq!(state.data.as_deref(), Some("partner 2"));
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_ignores_in_flight_response() {
        let query = Query::new(|id: u32| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(id)
        });

        tokio::join!(query.set_key(Some(1)), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            query.dispose();
        });

        assert!(query.state().data.is_none());
    }

    #[test]
    fn test_into_result() {
        let ok = RemoteResource {
            data: Some(1),
            ..RemoteResource::default()
        };
        assert_eq!(ok.into_result().unwrap(), 1);

        let failed: RemoteResource<u8> = RemoteResource {
            data: Some(1),
            error: Some("Partner not found.".into()),
            error_code: Some(ErrorCode::ResourceNotFound),
            loading: false,
        };
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "Partner not found.");
    }

    #[tokio::test]
    async fn test_mutation_propagates_and_tracks_loading() {
        let mutation = Mutation::new(|value: i32| async move {
            if value < 0 {
                Err(Error::InvalidArgument("negative".into()))
            } else {
                Ok(value * 2)
            }
        });

        assert!(!mutation.is_loading());
        assert_eq!(mutation.run(21).await.unwrap(), 42);
        assert!(!mutation.is_loading());

        let err = mutation.run(-1).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!mutation.is_loading());
    }

    #[tokio::test]
    async fn test_mutation_loading_during_call() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = Mutex::new(Some(release_rx));
        let mutation = Mutation::new(|()| {
            let rx = release_rx.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok(())
            }
        });

        let mut loading = mutation.subscribe();
        let run = mutation.run(());
        tokio::pin!(run);

        // Drive the call until it parks on the oneshot.
        tokio::select! {
            _ = &mut run => panic!("call finished before release"),
            _ = loading.changed() => {}
        }
        assert!(mutation.is_loading());

        release_tx.send(()).unwrap();
        run.await.unwrap();
        assert!(!mutation.is_loading());
    }
}
