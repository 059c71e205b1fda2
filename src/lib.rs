use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde_json::Value;

pub mod config;
pub mod domain;
pub mod errors;
pub mod exec;
pub mod http;
pub mod limit;
pub mod logging;
pub mod registry;
pub mod rpc;
pub mod stream;

use config::Config;
use exec::Spawn;
use limit::RateLimiter;
use logging::EventLog;
use registry::{ResourceRegistry, ToolRegistry};
use stream::broadcast::Broadcaster;
use stream::registry::{StreamFlavor, StreamRegistry};

/// Cloneable handle to the live server: collaborators, the concurrency gate,
/// and both stream registries. Anything that needs to emit notifications gets
/// this handle through its constructor; there is no global accessor.
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<ServerShared>,
}

struct ServerShared {
    tools: Arc<dyn ToolRegistry>,
    resources: Arc<dyn ResourceRegistry>,
    log: Arc<dyn EventLog>,
    limiter: RateLimiter,
    streams: Broadcaster,
    spawner: Arc<dyn Spawn>,
    snapshot_uri: String,
    snapshot_event: String,
}

impl ServerHandle {
    pub fn new(
        tools: Arc<dyn ToolRegistry>,
        resources: Arc<dyn ResourceRegistry>,
        log: Arc<dyn EventLog>,
        config: &Config,
        spawner: Arc<dyn Spawn>,
    ) -> Self {
        let ids = Arc::new(AtomicU64::new(0));
        let chunked = Arc::new(StreamRegistry::new(
            StreamFlavor::Chunked,
            config.stream_queue_capacity,
            Arc::clone(&ids),
            Arc::clone(&spawner),
        ));
        let sse = Arc::new(StreamRegistry::new(
            StreamFlavor::EventStream,
            config.stream_queue_capacity,
            ids,
            Arc::clone(&spawner),
        ));

        Self {
            inner: Arc::new(ServerShared {
                tools,
                resources,
                log,
                limiter: RateLimiter::new(config.max_parallel_requests),
                streams: Broadcaster::new(chunked, sse),
                spawner,
                snapshot_uri: config.snapshot_uri.clone(),
                snapshot_event: config.snapshot_event.clone(),
            }),
        }
    }

    pub fn tools(&self) -> &dyn ToolRegistry {
        self.inner.tools.as_ref()
    }

    pub fn resources(&self) -> &dyn ResourceRegistry {
        self.inner.resources.as_ref()
    }

    pub fn log(&self) -> &dyn EventLog {
        self.inner.log.as_ref()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn streams(&self) -> &Broadcaster {
        &self.inner.streams
    }

    pub fn spawner(&self) -> &Arc<dyn Spawn> {
        &self.inner.spawner
    }

    pub fn snapshot_uri(&self) -> &str {
        &self.inner.snapshot_uri
    }

    pub fn snapshot_event(&self) -> &str {
        &self.inner.snapshot_event
    }

    /// Serialize a named event once and fan it out to every open stream.
    pub fn broadcast(&self, event: &str, payload: Value) {
        self.inner.streams.broadcast(event, payload);
    }
}
