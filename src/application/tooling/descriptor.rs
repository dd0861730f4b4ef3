//! Static tool descriptions shared by the model catalog and the MCP server.

use serde::Serialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    /// Element type for array parameters.
    pub items: Option<ParamType>,
}

impl ParamSpec {
    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String(self.kind.as_str().into()));
        schema.insert("description".into(), Value::String(self.description.clone()));
        if let Some(items) = self.items {
            schema.insert("items".into(), json!({ "type": items.as_str() }));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Name, description and parameters of one tool. Built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn required(mut self, name: &str, kind: ParamType, description: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            default: None,
            items: None,
        });
        self
    }

    pub fn optional(
        mut self,
        name: &str,
        kind: ParamType,
        description: &str,
        default: Option<Value>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            default,
            items: None,
        });
        self
    }

    /// Set the element type of the most recently added array parameter.
    pub fn items(mut self, kind: ParamType) -> Self {
        if let Some(last) = self.params.last_mut() {
            last.items = Some(kind);
        }
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// `{name, description, parameters: {required: [...], optional: {...}}}`
    pub fn catalog_entry(&self) -> Value {
        let optional: Map<String, Value> = self
            .params
            .iter()
            .filter(|p| !p.required)
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "required": self.required_names(),
                "optional": optional,
            }
        })
    }

    /// JSON Schema for the argument object.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
        })
    }

    /// Function declaration in the OpenAI `tools` format.
    pub fn openai_function(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema(),
            }
        })
    }

    /// Tool entry for an MCP `tools/list` result.
    pub fn mcp_tool(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}
