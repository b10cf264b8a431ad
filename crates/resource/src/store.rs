//! The resource store: every resource of a running server, keyed by uri.
//!
//! The map is guarded as a whole by a reader/writer lock, and every [`Resource`] guards its own
//! mutable state with another one. Values are immutable [`Bytes`] replaced wholesale, so a
//! reader holding a value never sees it change underneath.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::media_type::MediaType;
use crate::methods::Methods;
use crate::relay::ResourceCallback;
use crate::value::{IntegerEncoding, ResourceValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("resource {uri} already exists")]
    AlreadyExists { uri: String },

    #[error("resource {uri} not found")]
    NotFound { uri: String },
}

impl StoreError {
    pub fn already_exists<S: ToString>(uri: S) -> Self {
        Self::AlreadyExists { uri: uri.to_string() }
    }

    pub fn not_found<S: ToString>(uri: S) -> Self {
        Self::NotFound { uri: uri.to_string() }
    }
}

/// A uri addressable value.
pub struct Resource {
    uri: Arc<str>,
    attached: AtomicBool,
    state: RwLock<ResourceState>,
}

struct ResourceState {
    value: Bytes,
    media_type: MediaType,
    /// Methods currently routed to the dispatcher on the transport.
    routed: Methods,
    callback: Option<Arc<dyn ResourceCallback>>,
    callback_methods: Methods,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("attached", &self.is_attached())
            .field("media_type", &state.media_type)
            .field("value_len", &state.value.len())
            .field("routed", &state.routed)
            .field("callback_methods", &state.callback_methods)
            .finish()
    }
}

impl Resource {
    fn new(uri: Arc<str>, value: Bytes, media_type: MediaType) -> Self {
        Self {
            uri,
            attached: AtomicBool::new(true),
            state: RwLock::new(ResourceState {
                value,
                media_type,
                routed: Methods::NONE,
                callback: None,
                callback_methods: Methods::NONE,
            }),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn shared_uri(&self) -> Arc<str> {
        Arc::clone(&self.uri)
    }

    pub fn value(&self) -> Bytes {
        self.state.read().value.clone()
    }

    pub fn media_type(&self) -> MediaType {
        self.state.read().media_type
    }

    /// Media type and value read under one lock.
    pub fn snapshot(&self) -> (MediaType, Bytes) {
        let state = self.state.read();
        (state.media_type, state.value.clone())
    }

    /// Whether the resource is still part of its store.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub fn routed(&self) -> Methods {
        self.state.read().routed
    }

    pub fn callback_methods(&self) -> Methods {
        self.state.read().callback_methods
    }

    /// The callback to notify for a request with `method`, if one is bound.
    pub fn callback_for(&self, method: Methods) -> Option<Arc<dyn ResourceCallback>> {
        let state = self.state.read();
        if state.callback_methods.intersects(method) { state.callback.clone() } else { None }
    }

    /// Applies an accepted POST: the media type and the value change together.
    pub(crate) fn apply_post(&self, media_type: Option<MediaType>, value: Option<Bytes>) {
        let old_value = {
            let mut state = self.state.write();
            if let Some(media_type) = media_type {
                state.media_type = media_type;
            }
            value.map(|value| std::mem::replace(&mut state.value, value))
        };
        // the previous buffer goes away outside the lock
        drop(old_value);
    }

    pub(crate) fn replace_value(&self, value: Bytes) {
        let old_value = std::mem::replace(&mut self.state.write().value, value);
        drop(old_value);
    }

    pub(crate) fn set_routed(&self, routed: Methods) {
        self.state.write().routed = routed;
    }

    pub(crate) fn bind_callback(&self, methods: Methods, callback: Arc<dyn ResourceCallback>, newly_routed: Methods) {
        let mut state = self.state.write();
        state.routed |= newly_routed;
        state.callback_methods |= methods;
        state.callback = Some(callback);
    }

    pub(crate) fn unbind_callback(&self, methods: Methods, unrouted: Methods) {
        let mut state = self.state.write();
        state.routed = state.routed.difference(unrouted);
        state.callback_methods = state.callback_methods.difference(methods);
        if state.callback_methods.is_empty() {
            state.callback = None;
        }
    }

    fn detach(&self) {
        self.attached.store(false, Ordering::Release);
        let mut state = self.state.write();
        state.routed = Methods::NONE;
        state.callback_methods = Methods::NONE;
        state.callback = None;
    }
}

pub struct ResourceStore {
    resources: RwLock<BTreeMap<Arc<str>, Arc<Resource>>>,
    encoding: IntegerEncoding,
}

impl fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore").field("encoding", &self.encoding).field("resources", &self.resources.read().keys()).finish()
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new(IntegerEncoding::default())
    }
}

impl ResourceStore {
    pub fn new(encoding: IntegerEncoding) -> Self {
        Self { resources: RwLock::new(BTreeMap::new()), encoding }
    }

    pub fn encoding(&self) -> IntegerEncoding {
        self.encoding
    }

    /// Exact lookup by uri.
    pub fn find(&self, uri: &str) -> Option<Arc<Resource>> {
        self.resources.read().get(uri).cloned()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.resources.read().contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Creates a resource, a missing value becomes a single zero byte.
    pub fn add(&self, uri: &str, value: Option<ResourceValue>, media_type: MediaType) -> Result<Arc<Resource>, StoreError> {
        // encode before taking the lock
        let value = value.unwrap_or_default().encode(self.encoding);

        let mut resources = self.resources.write();
        if resources.contains_key(uri) {
            return Err(StoreError::already_exists(uri));
        }

        let uri: Arc<str> = Arc::from(uri);
        let resource = Arc::new(Resource::new(Arc::clone(&uri), value, media_type));
        resources.insert(uri, Arc::clone(&resource));

        debug!(uri = resource.uri(), %media_type, "added resource");
        Ok(resource)
    }

    /// Unlinks a resource; outstanding references see it as detached.
    pub fn remove(&self, uri: &str) -> Result<Arc<Resource>, StoreError> {
        let resource = self.resources.write().remove(uri).ok_or_else(|| StoreError::not_found(uri))?;
        resource.detach();

        debug!(uri, "removed resource");
        Ok(resource)
    }

    /// Replaces the value of `resource`, encoding integers with the store's encoding.
    pub fn update_value(&self, resource: &Resource, value: ResourceValue) {
        resource.replace_value(value.encode(self.encoding));
    }

    /// Removes and detaches every resource.
    pub fn drain(&self) -> Vec<Arc<Resource>> {
        let resources = std::mem::take(&mut *self.resources.write());
        resources
            .into_values()
            .inspect(|resource| resource.detach())
            .collect()
    }
}
