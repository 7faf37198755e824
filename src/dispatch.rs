//! Converted parameters → HTTP request dispatch
//!
//! [`HttpAction`] is the executor behind every action built from an API
//! description: it converts its inputs with the declared schemas, builds the
//! request for its `ApiOperation` and returns the decoded response.

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{DispatchError, Error};
use crate::node::{Descriptor, Executor, Info};
use crate::spec::{ApiOperation, Param};
use crate::value::{display_value, Field, FieldKind, Schema};

/// Parameter name the request body travels under.
pub const BODY_FIELD: &str = "body";

/// Config keys understood by every [`HttpAction`].
pub const BASE_URL: &str = "base_url";
pub const API_KEY: &str = "api_key";

/// Executor that performs one API operation over HTTP.
pub struct HttpAction {
    info: Info,
    operation: ApiOperation,
    parameters: Schema,
    configs: Schema,
    default_base_url: Option<String>,
    client: Client,
}

impl HttpAction {
    pub fn new(info: Info, operation: ApiOperation, client: Client) -> Self {
        Self {
            info,
            parameters: parameter_schema(&operation),
            configs: config_schema(),
            operation,
            default_base_url: None,
            client,
        }
    }

    /// Base URL used when the configs do not carry one.
    pub fn with_default_base_url(mut self, base_url: Option<String>) -> Self {
        self.default_base_url = base_url;
        self
    }

    pub fn operation(&self) -> &ApiOperation {
        &self.operation
    }
}

impl Descriptor for HttpAction {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn version(&self) -> &str {
        &self.info.version
    }

    fn description(&self) -> &str {
        &self.info.description
    }
}

impl Executor for HttpAction {
    fn parameter_schema(&self) -> &Schema {
        &self.parameters
    }

    fn config_schema(&self) -> &Schema {
        &self.configs
    }

    fn execute(&self, parameters: &Value, configs: &Value) -> Result<Value, Error> {
        let parameters = self.parameters.convert(parameters)?;
        let configs = self.configs.convert(configs)?;

        let base_url = configs
            .get(BASE_URL)
            .and_then(Value::as_str)
            .or(self.default_base_url.as_deref())
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingBaseUrl)?;
        let api_key = configs
            .get(API_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default();

        info!(
            action = %self.info.name,
            method = %self.operation.method,
            path = %self.operation.path,
            "dispatching request"
        );
        Ok(dispatch(
            &self.client,
            base_url,
            api_key,
            &self.operation,
            &parameters,
        )?)
    }
}

/// Declared parameters of an operation: path, query and header params by
/// name, plus `body` when the operation accepts a JSON request body.
pub fn parameter_schema(op: &ApiOperation) -> Schema {
    let params = op
        .path_params
        .iter()
        .chain(&op.query_params)
        .chain(&op.header_params);

    let mut schema = params.fold(Schema::new(), |schema, param| {
        schema.field(param_field(param))
    });
    if op.body_schema.is_some() {
        schema = schema.field(
            Field::new(BODY_FIELD, FieldKind::Body)
                .required(op.body_required)
                .description("Request body"),
        );
    }
    schema
}

fn param_field(param: &Param) -> Field {
    Field::new(param.name.clone(), FieldKind::from_json_schema(&param.schema))
        .required(param.required)
        .description(param.description.clone())
}

/// Configs accepted by every HTTP action.
pub fn config_schema() -> Schema {
    Schema::new()
        .field(Field::new(BASE_URL, FieldKind::String).description("API base URL"))
        .field(Field::new(API_KEY, FieldKind::String).description("Bearer token"))
}

/// Execute an API operation with already-converted parameters.
pub fn dispatch(
    client: &Client,
    base_url: &str,
    api_key: &str,
    op: &ApiOperation,
    params: &Map<String, Value>,
) -> Result<Value, DispatchError> {
    let url = build_url(base_url, op, params);
    let query_pairs = collect_pairs(&op.query_params, params, &[op.path_params.as_slice()]);
    let headers = collect_pairs(
        &op.header_params,
        params,
        &[op.path_params.as_slice(), op.query_params.as_slice()],
    );

    let method: Method = op
        .method
        .parse()
        .map_err(|_| DispatchError::UnsupportedMethod {
            method: op.method.clone(),
        })?;

    let mut req = client.request(method, &url);

    if !api_key.is_empty() {
        req = req.bearer_auth(api_key);
    }
    if !query_pairs.is_empty() {
        req = req.query(&query_pairs);
    }
    for (name, val) in &headers {
        req = req.header(name, val);
    }
    if let Some(body) = params.get(BODY_FIELD).filter(|_| op.body_schema.is_some()) {
        req = req.json(body);
    }

    send_request(req)
}

fn build_url(base_url: &str, op: &ApiOperation, params: &Map<String, Value>) -> String {
    let base = base_url.trim_end_matches('/');
    let mut url = format!("{}{}", base, op.path);
    for param in &op.path_params {
        if let Some(val) = params.get(&param.name) {
            url = url.replace(
                &format!("{{{}}}", param.name),
                &urlencoding::encode(&display_value(val)),
            );
        }
    }
    url
}

/// Name/value pairs for the given params. A boolean `false` is omitted, the
/// same as an unset switch. Params whose name belongs to an earlier location
/// (`shadowed_by`) are skipped: the schema only holds one field per name.
fn collect_pairs(
    declared: &[Param],
    params: &Map<String, Value>,
    shadowed_by: &[&[Param]],
) -> Vec<(String, String)> {
    declared
        .iter()
        .filter(|param| {
            !shadowed_by
                .iter()
                .flat_map(|earlier| earlier.iter())
                .any(|p| p.name == param.name)
        })
        .filter_map(|param| match params.get(&param.name)? {
            Value::Bool(false) => None,
            val => Some((param.name.clone(), display_value(val))),
        })
        .collect()
}

fn send_request(req: reqwest::blocking::RequestBuilder) -> Result<Value, DispatchError> {
    let resp = req.send().map_err(DispatchError::RequestFailed)?;
    let status = resp.status();
    let text = resp.text().map_err(DispatchError::ResponseRead)?;

    if !status.is_success() {
        return Err(DispatchError::HttpError { status, body: text });
    }

    let value: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok(value)
}
