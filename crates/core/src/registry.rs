//! Tool Registry
//!
//! Serves a [`PresenterService`] over an in-process MCP transport and keeps the
//! client side. The registry lists tool declarations for the model provider
//! and dispatches model tool calls by name.

use crate::generic_types::{ToolCallRequest, ToolDeclaration};
use crate::tools::PresenterService;
use anyhow::{Context, Result};
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{Peer, RoleClient, RunningService},
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

/// Keys JSON-schema generators emit that live model providers reject.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$defs",
    "definitions",
    "title",
    "additionalProperties",
];

pub struct ToolRegistry {
    client: RunningService<RoleClient, ()>,
    server_task: JoinHandle<()>,
}

impl ToolRegistry {
    /// Starts the tool server and connects a client to it.
    pub async fn start(service: PresenterService) -> Result<Self> {
        let (server_transport, client_transport) = tokio::io::duplex(4096);

        let server_task = tokio::spawn(async move {
            if let Ok(service) = service.serve(server_transport).await {
                let _ = service.waiting().await;
            }
        });
        let client = ()
            .serve(client_transport)
            .await
            .context("Failed to connect to the in-process tool server")?;

        Ok(Self {
            client,
            server_task,
        })
    }

    /// Declarations for every registered tool, with provider-safe schemas.
    pub async fn declarations(&self) -> Result<Vec<ToolDeclaration>> {
        let tools = self.client.list_all_tools().await?;
        tools
            .into_iter()
            .map(|t| {
                let schema = serde_json::to_value(&*t.input_schema)?;
                Ok(ToolDeclaration {
                    name: t.name.to_string(),
                    description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                    parameters: provider_schema(schema),
                })
            })
            .collect()
    }

    /// A cheap handle for dispatching calls from spawned tasks.
    pub fn invoker(&self) -> ToolInvoker {
        ToolInvoker {
            peer: self.client.peer().clone(),
        }
    }

    pub async fn shutdown(self) {
        let _ = self.client.cancel().await;
        self.server_task.abort();
    }
}

/// Result of one dispatched tool call, as shown back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub output: String,
    pub is_error: bool,
}

#[derive(Clone)]
pub struct ToolInvoker {
    peer: Peer<RoleClient>,
}

impl ToolInvoker {
    pub async fn call(&self, request: &ToolCallRequest) -> Result<ToolOutcome> {
        let arguments = match &request.arguments {
            Value::Object(map) => Some(map.clone()),
            Value::Null => None,
            other => anyhow::bail!("Tool arguments must be an object, got {other}"),
        };

        let result = self
            .peer
            .call_tool(CallToolRequestParam {
                name: request.tool_name.clone().into(),
                arguments,
            })
            .await?;
        debug!(tool = %request.tool_name, ?result, "Tool call returned");

        let annotated_content = result
            .content
            .context("Tool call returned no content")?
            .pop()
            .context("Content list was empty")?;
        let output = match annotated_content.raw {
            RawContent::Text(text_content) => text_content.text,
            _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
        };

        Ok(ToolOutcome {
            output,
            is_error: result.is_error.unwrap_or(false),
        })
    }
}

/// Strips generator-only keys; a schema with no properties becomes `None`.
pub fn provider_schema(mut schema: Value) -> Option<Value> {
    strip_keys(&mut schema);
    let has_properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| !props.is_empty());
    has_properties.then_some(schema)
}

fn strip_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_SCHEMA_KEYS {
                map.remove(*key);
            }
            // `properties` is keyed by field name, so a field called "title" must survive.
            if let Some(Value::Object(props)) = map.get_mut("properties") {
                for prop in props.values_mut() {
                    strip_keys(prop);
                }
            }
            for (key, child) in map.iter_mut() {
                if key != "properties" {
                    strip_keys(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_keys),
        _ => {}
    }
}
