use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use stayfinder_core::availability::{find_available, DEFAULT_MAX_PRICE};
use stayfinder_core::catalog::LodgingRecord;

/// Wire-facing declaration of a callable capability: the name the runtime
/// invokes it by, plus a typed JSON schema for its parameters.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    Unknown(String),
    #[error("tool `{name}` failed: {source}")]
    Execution { name: String, source: anyhow::Error },
}

/// Named capability table the agent runtime invokes by name. Registration
/// order is preserved so the declared tool list is stable on the wire.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.push(Arc::new(tool));
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name(),
                description: tool.description(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;

        tool.execute(input)
            .await
            .map_err(|source| ToolError::Execution { name: name.to_string(), source })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The hotel availability query exposed as a callable tool.
///
/// Holds its catalog rather than reading global state, so tests can hand it a
/// substitute data set. Every input problem comes back as a text payload the
/// model can relay conversationally; `execute` only errs on registry-level
/// misuse, never on user-visible validation.
pub struct FindHotelsTool {
    catalog: Arc<Vec<LodgingRecord>>,
}

#[derive(Debug, Deserialize)]
struct FindHotelsArgs {
    check_in_date: String,
    check_out_date: String,
    #[serde(default = "default_max_price")]
    max_price: u32,
}

fn default_max_price() -> u32 {
    DEFAULT_MAX_PRICE
}

impl FindHotelsTool {
    pub fn new(catalog: Vec<LodgingRecord>) -> Self {
        Self { catalog: Arc::new(catalog) }
    }
}

#[async_trait]
impl Tool for FindHotelsTool {
    fn name(&self) -> &'static str {
        "get_available_hotels"
    }

    fn description(&self) -> &'static str {
        "Get available hotels in Seattle for the specified dates."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "check_in_date": {
                    "type": "string",
                    "description": "Check-in date in YYYY-MM-DD format"
                },
                "check_out_date": {
                    "type": "string",
                    "description": "Check-out date in YYYY-MM-DD format"
                },
                "max_price": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Maximum price per night in USD (optional)"
                }
            },
            "required": ["check_in_date", "check_out_date"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args: FindHotelsArgs = match serde_json::from_value(input) {
            Ok(args) => args,
            // Schema violations (negative or non-numeric max_price, missing
            // dates) become inline text, matching the query's failure policy.
            Err(error) => {
                return Ok(Value::String(format!(
                    "Error: invalid arguments for get_available_hotels: {error}"
                )));
            }
        };

        let listing = find_available(
            &self.catalog,
            &args.check_in_date,
            &args.check_out_date,
            args.max_price,
        );
        Ok(Value::String(listing))
    }
}
