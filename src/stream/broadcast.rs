//! Notification fan-out to every open stream
//!
//! The envelope is serialized once per broadcast; each registry then frames
//! that single JSON text for its own flavor and enqueues it per entry. A slow
//! or dead peer only ever affects its own queue.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::rpc::envelope::NotificationEnvelope;
use crate::stream::frame::{chunk_frame, sse_frame};
use crate::stream::registry::{StreamEntry, StreamFlavor, StreamRegistry};

pub struct Broadcaster {
    chunked: Arc<StreamRegistry>,
    sse: Arc<StreamRegistry>,
}

impl Broadcaster {
    pub fn new(chunked: Arc<StreamRegistry>, sse: Arc<StreamRegistry>) -> Self {
        Self { chunked, sse }
    }

    pub fn chunked(&self) -> &Arc<StreamRegistry> {
        &self.chunked
    }

    pub fn sse(&self) -> &Arc<StreamRegistry> {
        &self.sse
    }

    /// Serialize `event`/`payload` once and enqueue the framed notification
    /// for every entry in both registries.
    pub fn broadcast(&self, event: &str, payload: Value) {
        let json = NotificationEnvelope::new(event, payload).to_json();

        let chunk = chunk_frame(json.as_bytes());
        for entry in self.chunked.entries() {
            self.chunked.deliver(&entry, chunk.clone());
        }

        let sse = sse_frame(&json);
        for entry in self.sse.entries() {
            self.sse.deliver(&entry, sse.clone());
        }

        debug!(event, "notification broadcast");
    }

    /// Enqueue a notification for a single entry, framed for its flavor.
    /// Used for the per-stream snapshot pushed right after an upgrade.
    pub fn deliver_to(&self, entry: &Arc<StreamEntry>, event: &str, payload: Value) {
        let json = NotificationEnvelope::new(event, payload).to_json();

        match entry.flavor {
            StreamFlavor::Chunked => self.chunked.deliver(entry, chunk_frame(json.as_bytes())),
            StreamFlavor::EventStream => self.sse.deliver(entry, sse_frame(&json)),
        }
    }
}
