//! OpenAPI document → internal IR (intermediate representation)
//!
//! Turns a dereferenced OpenAPI document into its `info` metadata plus a flat
//! list of `ApiOperation`s. Run [`resolve_refs`] on the raw document first.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::BuildError;

const METHODS: [&str; 8] = [
    "get", "post", "put", "patch", "delete", "head", "options", "trace",
];

/// Top-level metadata of one API description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct DocumentInfo {
    pub title: String,
    pub version: String,
    pub description: String,
    /// First entry of `servers`, used when no base URL is configured.
    pub server: Option<String>,
}

/// A parsed API description.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ApiDocument {
    pub info: DocumentInfo,
    pub operations: Vec<ApiOperation>,
}

/// A parsed API operation ready for command generation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiOperation {
    /// operationId from the document (may be empty)
    pub operation_id: String,
    /// HTTP method, upper-cased (GET, POST, etc.)
    pub method: String,
    /// URL path template (e.g. "/pods/{podId}")
    pub path: String,
    /// First tag, or "other" (used as the resource)
    pub group: String,
    /// Summary text for help
    pub summary: String,
    pub path_params: Vec<Param>,
    pub query_params: Vec<Param>,
    pub header_params: Vec<Param>,
    /// Request body JSON schema (if any)
    pub body_schema: Option<Value>,
    pub body_required: bool,
}

impl ApiOperation {
    pub fn new(method: &str, path: &str, group: &str) -> Self {
        Self {
            operation_id: String::new(),
            method: method.to_uppercase(),
            path: path.to_owned(),
            group: group.to_owned(),
            summary: String::new(),
            path_params: Vec::new(),
            query_params: Vec::new(),
            header_params: Vec::new(),
            body_schema: None,
            body_required: false,
        }
    }

    /// Whether running this operation destroys something.
    pub fn is_destructive(&self) -> bool {
        self.method == "DELETE"
    }
}

/// A single API parameter.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Param {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub schema: Value,
}

impl Param {
    pub fn new(name: &str, required: bool, schema: Value) -> Self {
        Self {
            name: name.to_owned(),
            description: String::new(),
            required,
            schema,
        }
    }
}

/// Inline every `$ref` of a raw document.
pub fn resolve_refs(raw: &Value) -> Result<Value, BuildError> {
    openapi_deref::resolve(raw)
        .map(|resolved| resolved.value)
        .map_err(|e| BuildError::Reference(e.to_string()))
}

/// Parse a dereferenced OpenAPI document.
pub fn parse_document(spec: &Value) -> ApiDocument {
    ApiDocument {
        info: extract_info(spec),
        operations: extract_operations(spec),
    }
}

fn extract_info(spec: &Value) -> DocumentInfo {
    let info = spec.get("info");
    let text = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    let server = spec
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    DocumentInfo {
        title: text("title"),
        version: text("version"),
        description: text("description"),
        server,
    }
}

/// Extract all operations, path by path in document order.
pub fn extract_operations(spec: &Value) -> Vec<ApiOperation> {
    let mut ops = Vec::new();

    let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
        return ops;
    };

    for (path, path_item) in paths {
        let path_level_params = path_item.get("parameters");

        for method in METHODS {
            let Some(operation) = path_item.get(method) else {
                continue;
            };
            ops.push(extract_single_operation(
                path,
                method,
                operation,
                path_level_params,
            ));
        }
    }

    ops
}

fn extract_single_operation(
    path: &str,
    method: &str,
    operation: &Value,
    path_level_params: Option<&Value>,
) -> ApiOperation {
    let text = |key: &str| operation.get(key).and_then(Value::as_str);

    let mut op = ApiOperation::new(method, path, "other");
    op.operation_id = text("operationId").unwrap_or_default().to_owned();
    op.summary = text("summary")
        .or_else(|| text("description"))
        .unwrap_or_default()
        .to_owned();
    if let Some(tag) = operation
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.first())
        .and_then(Value::as_str)
    {
        op.group = tag.to_owned();
    }

    let (mut path_params, query_params, header_params) =
        collect_params(path_level_params, operation.get("parameters"));

    // Path params follow their position in the template, others are by name
    path_params.sort_by_cached_key(|p| path.find(&format!("{{{}}}", p.name)).unwrap_or(usize::MAX));
    op.path_params = path_params;
    op.query_params = query_params;
    op.header_params = header_params;

    (op.body_schema, op.body_required) = extract_body(operation);
    op
}

/// Merge path-level + operation-level parameters, split by location.
/// Operation-level overrides path-level.
fn collect_params(
    path_level: Option<&Value>,
    operation_level: Option<&Value>,
) -> (Vec<Param>, Vec<Param>, Vec<Param>) {
    let mut param_map: HashMap<(String, String), Param> = HashMap::new();

    for source in [path_level, operation_level].into_iter().flatten() {
        let Some(params) = source.as_array() else {
            continue;
        };
        for param in params {
            if let Some((p, location)) = parse_param(param) {
                param_map.insert((p.name.clone(), location), p);
            }
        }
    }

    let mut path_params = Vec::new();
    let mut query_params = Vec::new();
    let mut header_params = Vec::new();

    for ((_, location), p) in param_map {
        match location.as_str() {
            "path" => path_params.push(p),
            "query" => query_params.push(p),
            "header" => header_params.push(p),
            _ => {}
        }
    }

    query_params.sort_by(|a, b| a.name.cmp(&b.name));
    header_params.sort_by(|a, b| a.name.cmp(&b.name));

    (path_params, query_params, header_params)
}

fn extract_body(operation: &Value) -> (Option<Value>, bool) {
    let Some(request_body) = operation.get("requestBody") else {
        return (None, false);
    };

    let body_required = request_body
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let body_schema = request_body
        .get("content")
        .and_then(|c| c.get("application/json"))
        .and_then(|ct| ct.get("schema"))
        .cloned();

    (body_schema, body_required)
}

/// Parse a single parameter object. Objects without `name`/`in` are skipped.
fn parse_param(param: &Value) -> Option<(Param, String)> {
    let name = param.get("name").and_then(Value::as_str)?;
    let location = param.get("in").and_then(Value::as_str)?;

    let description = param
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    // Path parameters are always required.
    let required = location == "path"
        || param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
    let schema = param
        .get("schema")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type": "string"}));

    Some((
        Param {
            name: name.to_owned(),
            description,
            required,
            schema,
        },
        location.to_owned(),
    ))
}
