//! Schema → clap flag bindings
//!
//! Every declared parameter becomes a `--<name>` flag. Booleans are
//! switches; the request body is assembled from `--json` or repeated
//! `--field key=value` flags. Parsed matches are turned back into a parameter
//! value for `Executor::execute`, which does the type conversion.

use std::io::Read;

use clap::{Arg, ArgAction, ArgMatches};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::value::{Field, FieldKind, Schema};

const JSON_BODY_ID: &str = "json-body";
const FIELD_ID: &str = "field";

/// Long names the front end reserves for itself on every action.
pub const RESERVED: [&str; 6] = ["json", "field", "yes", "help", "base-url", "api-key"];

/// Flags for every field of `schema`.
pub fn flag_args(schema: &Schema) -> Vec<Arg> {
    let mut args = Vec::new();
    for field in schema.fields() {
        if field.kind == FieldKind::Body {
            args.push(
                Arg::new(JSON_BODY_ID)
                    .long("json")
                    .short('j')
                    .value_name("JSON|@FILE|-")
                    .help("Request body as JSON, @path to read a file, or - for stdin")
                    .action(ArgAction::Set),
            );
            args.push(
                Arg::new(FIELD_ID)
                    .long("field")
                    .short('f')
                    .value_name("KEY=VALUE")
                    .help("Set body field: key=value (repeatable)")
                    .action(ArgAction::Append),
            );
            continue;
        }

        let id = long_name(field);
        let arg = Arg::new(id.clone())
            .long(id)
            .help(field.description.clone());
        let arg = if field.kind == FieldKind::Boolean {
            arg.action(ArgAction::SetTrue)
        } else {
            arg.action(ArgAction::Set).required(field.required)
        };
        args.push(arg);
    }
    args
}

/// Flag id and long name for `field`. Names that collide with a reserved
/// flag get a `param-` prefix.
fn long_name(field: &Field) -> String {
    if RESERVED.contains(&field.name.as_str()) {
        format!("param-{}", field.name)
    } else {
        field.name.clone()
    }
}

/// Parameter object built from matches parsed with [`flag_args`].
pub fn collect_parameters(schema: &Schema, matches: &ArgMatches) -> Result<Value, Error> {
    let mut params = Map::new();
    for field in schema.fields() {
        match field.kind {
            FieldKind::Body => {
                if let Some(body) = build_body(matches)? {
                    params.insert(field.name.clone(), body);
                }
            }
            FieldKind::Boolean => {
                if matches.get_flag(&long_name(field)) {
                    params.insert(field.name.clone(), Value::Bool(true));
                }
            }
            _ => {
                if let Some(val) = matches.get_one::<String>(&long_name(field)) {
                    params.insert(field.name.clone(), Value::String(val.clone()));
                }
            }
        }
    }
    Ok(Value::Object(params))
}

fn build_body(matches: &ArgMatches) -> Result<Option<Value>, Error> {
    // --json takes precedence
    if let Some(json_arg) = matches.get_one::<String>(JSON_BODY_ID) {
        let text = read_json_arg(json_arg)?;
        let val: Value = serde_json::from_str(&text).map_err(Error::InvalidJsonBody)?;
        return Ok(Some(val));
    }

    // --field key=value pairs
    if let Some(fields) = matches.get_many::<String>(FIELD_ID) {
        let mut obj = Map::new();
        for field in fields {
            let (key, val) = field
                .split_once('=')
                .ok_or_else(|| Error::InvalidFieldFormat {
                    field: field.to_string(),
                })?;
            // Try to parse as JSON value, fall back to string
            let json_val = serde_json::from_str(val).unwrap_or(Value::String(val.to_string()));
            obj.insert(key.to_string(), json_val);
        }
        return Ok(Some(Value::Object(obj)));
    }

    Ok(None)
}

/// `@path` reads a file, `-` reads stdin, anything else is literal JSON.
fn read_json_arg(arg: &str) -> Result<String, Error> {
    if let Some(path) = arg.strip_prefix('@') {
        return std::fs::read_to_string(path).map_err(|source| Error::JsonFileRead {
            path: path.to_owned(),
            source,
        });
    }
    if arg == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(Error::JsonStdinRead)?;
        return Ok(text);
    }
    Ok(arg.to_owned())
}
