//! Remote data loading.
//!
//! [`Fetch`] owns a set of query parameters and an async fetch function. A
//! fetch encodes the non-empty parameters as a query string, runs the function
//! on the tokio runtime, and replaces the table's data with the result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::PluginError;
use crate::events::EventKind;
use crate::extras::{Extras, Key};
use crate::plugin::{ConfigureContext, Plugin};
use crate::table::{TableHandle, TableView};

/// Whether a request is in flight, in extensions.
pub const LOADING: Key<bool> = Key::new("loading");
/// Current parameter values as an object, in extensions.
pub const QUERY_PARAMS: Key<Map<String, Value>> = Key::new("query_params");
/// Message of the last failed request, in extensions.
pub const LAST_ERROR: Key<Option<String>> = Key::new("last_error");

/// Error returned by a fetch function.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    /// Error message
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for FetchError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FetchError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What a fetch function returns.
#[derive(Debug, Clone)]
pub struct FetchResponse<T> {
    pub data: Vec<T>,
    /// Merged into the table's extensions until the next response.
    pub extras: Extras,
}

impl<T> FetchResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            extras: Extras::new(),
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }
}

/// One query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub value: Value,
    /// Fetch again whenever this parameter changes.
    pub request_on_change: bool,
}

impl QueryParam {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            request_on_change: false,
        }
    }

    pub fn request_on_change(mut self) -> Self {
        self.request_on_change = true;
        self
    }
}

/// Ordered query parameters.
pub type QueryParams = Vec<(String, QueryParam)>;

type FetchFn<T> =
    Box<dyn Fn(String, QueryParams) -> BoxFuture<'static, Result<FetchResponse<T>, FetchError>> + Send + Sync>;

struct FetchState<T> {
    params: QueryParams,
    loading: bool,
    extras: Extras,
    last_error: Option<String>,
    handle: Option<TableHandle<T>>,
}

struct FetchInner<T> {
    fetch_fn: FetchFn<T>,
    fetch_on_mount: bool,
    state: Mutex<FetchState<T>>,
}

impl<T> FetchInner<T> {
    fn lock(&self) -> MutexGuard<'_, FetchState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loads the table's data from an async source.
pub struct Fetch<T> {
    inner: Arc<FetchInner<T>>,
}

impl<T> Clone for Fetch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Fetch<T> {
    /// `fetch_fn` receives the encoded query string and the raw parameters.
    pub fn new<F>(params: QueryParams, fetch_fn: F) -> Self
    where
        F: Fn(String, QueryParams) -> BoxFuture<'static, Result<FetchResponse<T>, FetchError>>
            + Send
            + Sync
            + 'static,
    {
        Self::build(params, fetch_fn, true)
    }

    /// Like [`new`](Self::new), without fetching on mount.
    pub fn lazy<F>(params: QueryParams, fetch_fn: F) -> Self
    where
        F: Fn(String, QueryParams) -> BoxFuture<'static, Result<FetchResponse<T>, FetchError>>
            + Send
            + Sync
            + 'static,
    {
        Self::build(params, fetch_fn, false)
    }

    fn build<F>(params: QueryParams, fetch_fn: F, fetch_on_mount: bool) -> Self
    where
        F: Fn(String, QueryParams) -> BoxFuture<'static, Result<FetchResponse<T>, FetchError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            inner: Arc::new(FetchInner {
                fetch_fn: Box::new(fetch_fn),
                fetch_on_mount,
                state: Mutex::new(FetchState {
                    params,
                    loading: false,
                    extras: Extras::new(),
                    last_error: None,
                    handle: None,
                }),
            }),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// The encoded query string for the current parameters.
    pub fn query_string(&self) -> String {
        encode_query(&self.inner.lock().params)
    }

    /// Set one parameter's value; refetches if the parameter asks for it.
    /// Unknown keys are added.
    pub fn set_query_param(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let (refetch, handle) = {
            let mut state = self.inner.lock();
            let refetch = match state.params.iter_mut().find(|(k, _)| k == key) {
                Some((_, param)) => {
                    param.value = value;
                    param.request_on_change
                }
                None => {
                    state.params.push((key.to_string(), QueryParam::new(value)));
                    false
                }
            };
            (refetch, state.handle.clone())
        };
        if let Some(handle) = handle {
            handle.dispatch(EventKind::UpdateExtensions);
        }
        if refetch {
            self.fetch();
        }
    }

    /// Replace every parameter without fetching.
    pub fn set_query_params(&self, params: QueryParams) {
        let handle = {
            let mut state = self.inner.lock();
            state.params = params;
            state.handle.clone()
        };
        if let Some(handle) = handle {
            handle.dispatch(EventKind::UpdateExtensions);
        }
    }

    /// Start a fetch on the ambient runtime. Returns `None` outside one.
    pub fn fetch(&self) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("fetch-plugin: no tokio runtime, fetch skipped");
                return None;
            }
        };
        let this = self.clone();
        Some(runtime.spawn(async move { this.fetch_now().await }))
    }

    /// Run a fetch to completion and replace the table's data.
    pub async fn fetch_now(&self) {
        let (query, params, handle) = {
            let mut state = self.inner.lock();
            state.loading = true;
            (encode_query(&state.params), state.params.clone(), state.handle.clone())
        };
        if let Some(handle) = &handle {
            handle.dispatch(EventKind::UpdateExtensions);
        }

        log::debug!("fetch-plugin: requesting `{query}`");
        let result = (self.inner.fetch_fn)(query, params).await;

        let data = {
            let mut state = self.inner.lock();
            state.loading = false;
            match result {
                Ok(response) => {
                    state.extras = response.extras;
                    state.last_error = None;
                    Some(response.data)
                }
                Err(err) => {
                    log::warn!("fetch-plugin: request failed: {err}");
                    state.last_error = Some(err.message);
                    None
                }
            }
        };

        if let Some(handle) = handle {
            match data {
                Some(data) => handle.set_data(data),
                None => handle.dispatch(EventKind::UpdateExtensions),
            }
        }
    }
}

/// `application/x-www-form-urlencoded` query of the non-empty parameters.
fn encode_query(params: &QueryParams) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, param) in params {
        let value = match &param.value {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        query.append_pair(key, &value);
    }
    query.finish()
}

impl<T: Send + Sync + 'static> Plugin<T> for Fetch<T> {
    fn name(&self) -> &str {
        "fetch-plugin"
    }

    fn configure(&self, cx: &ConfigureContext<'_, T>) -> Result<Extras, PluginError> {
        self.inner.lock().handle = Some(cx.handle().clone());
        Ok(Extras::new())
    }

    fn on_mount(&self) {
        if self.inner.fetch_on_mount {
            self.fetch();
        }
    }

    fn extend(&self, _view: &TableView<'_, T>) -> Extras {
        let state = self.inner.lock();
        let params: Map<String, Value> = state
            .params
            .iter()
            .map(|(key, param)| (key.clone(), param.value.clone()))
            .collect();
        let mut extras = Extras::new()
            .with(LOADING, state.loading)
            .with(QUERY_PARAMS, params)
            .with(LAST_ERROR, state.last_error.clone());
        extras.merge(state.extras.clone());
        extras
    }
}
