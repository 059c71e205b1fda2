//! Registry of open streaming connections
//!
//! One registry per streaming flavor; both share the same id counter so
//! stream ids are process-lifetime unique across flavors. The entry map sits
//! behind a short-critical-section lock; all socket I/O happens outside it,
//! in drain tasks submitted through the [`Spawn`] seam.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::exec::Spawn;
use crate::stream::queue::FrameQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFlavor {
    Chunked,
    EventStream,
}

impl StreamFlavor {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chunked => "chunked",
            Self::EventStream => "event_stream",
        }
    }
}

pub struct StreamEntry {
    pub id: u64,
    pub flavor: StreamFlavor,
    pub queue: FrameQueue,
    sink: AsyncMutex<OwnedWriteHalf>,
}

pub struct StreamRegistry {
    flavor: StreamFlavor,
    queue_capacity: usize,
    ids: Arc<AtomicU64>,
    entries: Mutex<HashMap<u64, Arc<StreamEntry>>>,
    spawner: Arc<dyn Spawn>,
}

impl StreamRegistry {
    pub fn new(
        flavor: StreamFlavor,
        queue_capacity: usize,
        ids: Arc<AtomicU64>,
        spawner: Arc<dyn Spawn>,
    ) -> Self {
        Self {
            flavor,
            queue_capacity,
            ids,
            entries: Mutex::new(HashMap::new()),
            spawner,
        }
    }

    pub fn flavor(&self) -> StreamFlavor {
        self.flavor
    }

    /// Register a freshly upgraded connection and return its entry.
    pub fn register(&self, sink: OwnedWriteHalf) -> Arc<StreamEntry> {
        let id = self.ids.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Arc::new(StreamEntry {
            id,
            flavor: self.flavor,
            queue: FrameQueue::new(self.queue_capacity),
            sink: AsyncMutex::new(sink),
        });

        self.entries
            .lock()
            .expect("stream registry mutex poisoned")
            .insert(id, Arc::clone(&entry));

        debug!(stream_id = id, flavor = self.flavor.as_str(), "stream registered");
        entry
    }

    /// Tear a stream down: forget it, clear its queue, and let the socket
    /// drop with the last reference.
    pub fn remove(&self, id: u64) -> Option<Arc<StreamEntry>> {
        let removed = self
            .entries
            .lock()
            .expect("stream registry mutex poisoned")
            .remove(&id);

        if let Some(entry) = &removed {
            entry.queue.clear();
            debug!(stream_id = id, flavor = self.flavor.as_str(), "stream removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("stream registry mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current entries, taken under a short lock so delivery
    /// can iterate without holding it.
    pub fn entries(&self) -> Vec<Arc<StreamEntry>> {
        self.entries
            .lock()
            .expect("stream registry mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Enqueue a pre-framed payload for one entry, starting a drain task if
    /// the queue was idle. Never blocks on the peer.
    pub fn deliver(self: &Arc<Self>, entry: &Arc<StreamEntry>, frame: Bytes) {
        let outcome = entry.queue.push(frame);

        if outcome.overflow_warning {
            warn!(
                stream_id = entry.id,
                flavor = self.flavor.as_str(),
                dropped = entry.queue.dropped(),
                "stream queue overflow, dropping oldest frames"
            );
        }

        if outcome.start_drain {
            let registry = Arc::clone(self);
            let entry = Arc::clone(entry);
            self.spawner
                .spawn(Box::pin(async move { drain(registry, entry).await }));
        }
    }
}

/// Write queued frames until the queue is empty. The single-writer guarantee
/// comes from the queue: only the push that claimed the drain reaches here.
async fn drain(registry: Arc<StreamRegistry>, entry: Arc<StreamEntry>) {
    loop {
        let Some(frame) = entry.queue.pop() else {
            return;
        };

        let mut sink = entry.sink.lock().await;
        if let Err(error) = sink.write_all(&frame).await {
            drop(sink);
            debug!(
                stream_id = entry.id,
                error = %error,
                "stream write failed, disposing entry"
            );
            registry.remove(entry.id);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    use bytes::Bytes;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    use super::{StreamFlavor, StreamRegistry};
    use crate::exec::TokioSpawn;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let client = TcpStream::connect(addr).await.expect("connect");
        let (server, _) = listener.accept().await.expect("accept");
        (client, server)
    }

    fn registry(flavor: StreamFlavor) -> Arc<StreamRegistry> {
        Arc::new(StreamRegistry::new(
            flavor,
            16,
            Arc::new(AtomicU64::new(0)),
            Arc::new(TokioSpawn),
        ))
    }

    #[tokio::test]
    async fn delivers_frames_in_fifo_order() {
        let registry = registry(StreamFlavor::Chunked);
        let (mut client, server) = socket_pair().await;
        let (_server_read, server_write) = server.into_split();

        let entry = registry.register(server_write);
        registry.deliver(&entry, Bytes::from_static(b"first|"));
        registry.deliver(&entry, Bytes::from_static(b"second|"));

        let mut received = vec![0u8; 13];
        client.read_exact(&mut received).await.expect("read frames");
        assert_eq!(&received, b"first|second|");
    }

    #[tokio::test]
    async fn ids_are_unique_across_registries() {
        let ids = Arc::new(AtomicU64::new(0));
        let chunked = Arc::new(StreamRegistry::new(
            StreamFlavor::Chunked,
            16,
            Arc::clone(&ids),
            Arc::new(TokioSpawn),
        ));
        let sse = Arc::new(StreamRegistry::new(
            StreamFlavor::EventStream,
            16,
            ids,
            Arc::new(TokioSpawn),
        ));

        let (_client_a, server_a) = socket_pair().await;
        let (_client_b, server_b) = socket_pair().await;

        let first = chunked.register(server_a.into_split().1);
        let second = sse.register(server_b.into_split().1);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn remove_clears_queue_and_forgets_entry() {
        let registry = registry(StreamFlavor::EventStream);
        let (_client, server) = socket_pair().await;

        let entry = registry.register(server.into_split().1);
        entry.queue.push(Bytes::from_static(b"pending"));
        assert_eq!(registry.len(), 1);

        registry.remove(entry.id);
        assert!(registry.is_empty());
        assert!(entry.queue.is_empty());
        assert!(registry.remove(entry.id).is_none());
    }
}
