//! Tool and resource collaborator interfaces
//!
//! The transport invokes domain operations only through these traits. The
//! static registries are explicit registration tables built once at startup:
//! name (or uri) mapped to a typed async handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list(&self) -> Vec<ToolDescriptor>;

    /// Invoke a registered tool. Unknown names raise `NotFound`.
    async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, AppError>;
}

#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    fn list(&self) -> Vec<ResourceDescriptor>;

    /// Read a registered resource. Unknown uris raise `NotFound`.
    async fn read(&self, uri: &str) -> Result<Value, AppError>;
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, AppError>> + Send>>;
type ToolHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;
type ResourceHandler = Arc<dyn Fn() -> HandlerFuture + Send + Sync>;

struct ToolEntry {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// Registration-table tool registry. Listing preserves registration order.
#[derive(Default)]
pub struct StaticToolRegistry {
    tools: Vec<ToolEntry>,
}

impl StaticToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        self.tools.push(ToolEntry {
            descriptor,
            handler: Arc::new(move |arguments| -> HandlerFuture { Box::pin(handler(arguments)) }),
        });
    }
}

#[async_trait]
impl ToolRegistry for StaticToolRegistry {
    fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|entry| entry.descriptor.clone()).collect()
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, AppError> {
        let entry = self
            .tools
            .iter()
            .find(|entry| entry.descriptor.name == name)
            .ok_or_else(|| {
                AppError::not_found("unknown tool name")
                    .with_hint("call list_tools for the available tools")
                    .with_detail(serde_json::json!({"name": name}))
            })?;

        (entry.handler)(arguments).await
    }
}

struct ResourceEntry {
    descriptor: ResourceDescriptor,
    handler: ResourceHandler,
}

/// Registration-table resource registry. Listing preserves registration order.
#[derive(Default)]
pub struct StaticResourceRegistry {
    resources: Vec<ResourceEntry>,
}

impl StaticResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, descriptor: ResourceDescriptor, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, AppError>> + Send + 'static,
    {
        self.resources.push(ResourceEntry {
            descriptor,
            handler: Arc::new(move || -> HandlerFuture { Box::pin(handler()) }),
        });
    }
}

#[async_trait]
impl ResourceRegistry for StaticResourceRegistry {
    fn list(&self) -> Vec<ResourceDescriptor> {
        self.resources
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    async fn read(&self, uri: &str) -> Result<Value, AppError> {
        let entry = self
            .resources
            .iter()
            .find(|entry| entry.descriptor.uri == uri)
            .ok_or_else(|| {
                AppError::not_found("unknown resource uri")
                    .with_hint("call list_resources for the available uris")
                    .with_detail(serde_json::json!({"uri": uri}))
            })?;

        (entry.handler)().await
    }
}
