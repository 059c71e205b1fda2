use std::sync::Arc;

use scene_control_mcp::{
    config::Config,
    domain::scenes::{build_resource_registry, build_tool_registry, SceneModel},
    exec::TokioSpawn,
    http::server::Server,
    logging::{self, BufferLog},
    ServerHandle,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;

    let model = Arc::new(SceneModel::with_demo_scenes());
    let tools = Arc::new(build_tool_registry(Arc::clone(&model)));
    let resources = Arc::new(build_resource_registry(model));
    let log = Arc::new(BufferLog::new(512));

    let handle = ServerHandle::new(tools, resources, log, &config, Arc::new(TokioSpawn));
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        max_parallel = config.max_parallel_requests,
        "server starting"
    );

    Server::new(handle).serve(listener).await?;
    Ok(())
}
