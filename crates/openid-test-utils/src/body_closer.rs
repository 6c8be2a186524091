//! Body closer that counts how many response bodies were released.

use openid_auth::transport::{BodyCloser, ResponseBody};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// [`BodyCloser`] that counts closes. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct CountingCloser {
    closed: Arc<AtomicUsize>,
}

impl CountingCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl BodyCloser for CountingCloser {
    fn close(&self, body: Box<dyn ResponseBody>) {
        drop(body);
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
