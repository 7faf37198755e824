//! Command names for resources and actions.
//!
//! Resources are named after their normalized tag; actions after their HTTP
//! verb and path template (see [`derive_name`]).

use std::collections::{HashMap, HashSet};

use crate::spec::ApiOperation;

/// Derive an action name from an HTTP verb and a path template.
///
/// The verb comes first, lower-cased. Placeholder segments (`{id}`)
/// contribute their parameter name. Literal segments are only kept once a
/// placeholder has been seen, which drops the shared `/v1/instances` style
/// prefix but keeps distinguishing suffixes such as `/events`.
///
/// `GET /instances/{id}/events/{event_id}` → `get-id-events-event_id`
pub fn derive_name(verb: &str, path: &str) -> String {
    let mut parts = vec![verb.to_lowercase()];
    let mut seen_placeholder = false;

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        {
            parts.push(param.to_owned());
            seen_placeholder = true;
        } else if seen_placeholder {
            parts.push(segment.to_owned());
        }
    }

    parts.join("-")
}

/// Action names for the operations of one resource, in input order.
///
/// When two operations derive the same name, each of them falls back to its
/// normalized operationId, or to the derived name plus the first literal path
/// segment when it has none. Names still taken after that get a `-2`, `-3`,
/// ... suffix in input order, so every operation stays reachable.
pub fn action_names(ops: &[ApiOperation]) -> Vec<String> {
    let derived: Vec<String> = ops
        .iter()
        .map(|op| derive_name(&op.method, &op.path))
        .collect();

    let mut name_count: HashMap<&str, usize> = HashMap::new();
    for name in &derived {
        *name_count.entry(name.as_str()).or_default() += 1;
    }

    let candidates: Vec<String> = ops
        .iter()
        .zip(&derived)
        .map(|(op, name)| {
            let collides = name_count.get(name.as_str()).copied().unwrap_or(0) > 1;
            if !collides {
                name.clone()
            } else if !op.operation_id.is_empty() {
                normalize_operation_id(&op.operation_id)
            } else {
                match first_literal(&op.path) {
                    Some(segment) => format!("{name}-{segment}"),
                    None => name.clone(),
                }
            }
        })
        .collect();

    let mut taken: HashSet<String> = candidates.iter().cloned().collect();
    let mut assigned: HashSet<&str> = HashSet::new();
    let mut names = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        if assigned.insert(candidate.as_str()) {
            names.push(candidate.clone());
            continue;
        }
        let unique = (2..)
            .map(|n| format!("{candidate}-{n}"))
            .find(|name| !taken.contains(name))
            .unwrap_or_default();
        taken.insert(unique.clone());
        names.push(unique);
    }
    names
}

fn first_literal(path: &str) -> Option<&str> {
    path.split('/')
        .find(|s| !s.is_empty() && !s.starts_with('{'))
}

/// Normalize a tag into a resource name: `My Group` → `my-group`.
pub fn normalize_group(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            result.push(c.to_ascii_lowercase());
        } else if !result.is_empty() && !result.ends_with('-') {
            result.push('-');
        }
    }
    while result.ends_with('-') {
        result.pop();
    }
    result
}

/// Kebab-case an operationId: `getHTTPStatus` → `get-http-status`.
pub fn normalize_operation_id(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || (prev.is_uppercase() && next_is_lower) {
                    result.push('-');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operation_id: &str, method: &str, path: &str) -> ApiOperation {
        let mut op = ApiOperation::new(method, path, "Pods");
        op.operation_id = operation_id.to_owned();
        op
    }

    // -- derive_name --

    #[test]
    fn derive_name_keeps_segments_after_first_placeholder() {
        assert_eq!(
            derive_name("GET", "/instances/{id}/events/{event_id}"),
            "get-id-events-event_id"
        );
    }

    #[test]
    fn derive_name_without_placeholder_is_just_the_verb() {
        assert_eq!(derive_name("POST", "/instances"), "post");
    }

    #[test]
    fn derive_name_drops_versioned_prefix() {
        assert_eq!(derive_name("DELETE", "/v1/pods/{podId}"), "delete-podId");
    }

    #[test]
    fn derive_name_ignores_trailing_slash() {
        assert_eq!(derive_name("put", "/pods/{id}/"), "put-id");
    }

    // -- action_names --

    #[test]
    fn action_names_are_derived_when_unique() {
        let ops = vec![op("ListPods", "GET", "/pods"), op("GetPod", "GET", "/pods/{id}")];
        assert_eq!(action_names(&ops), ["get", "get-id"]);
    }

    #[test]
    fn action_names_fall_back_to_operation_id_on_collision() {
        let ops = vec![
            op("ListPods", "GET", "/pods"),
            op("ListPodTemplates", "GET", "/templates"),
            op("CreatePod", "POST", "/pods"),
        ];
        assert_eq!(
            action_names(&ops),
            ["list-pods", "list-pod-templates", "post"]
        );
    }

    #[test]
    fn action_names_use_first_literal_segment_without_operation_id() {
        let ops = vec![op("", "GET", "/pods"), op("", "GET", "/templates")];
        assert_eq!(action_names(&ops), ["get-pods", "get-templates"]);
    }

    #[test]
    fn action_names_number_remaining_collisions() {
        let ops = vec![
            op("", "GET", "/pods"),
            op("", "GET", "/pods/"),
            op("GetId", "GET", "/templates"),
            op("", "GET", "/pods/{id}"),
        ];
        // `get-id` from the operationId clashes with the derived `get-id`.
        assert_eq!(
            action_names(&ops),
            ["get-pods", "get-pods-2", "get-id", "get-id-2"]
        );
    }

    // -- normalize_operation_id --

    #[test]
    fn normalize_operation_id_pascal_case() {
        assert_eq!(normalize_operation_id("CreatePod"), "create-pod");
    }

    #[test]
    fn normalize_operation_id_camel_case() {
        assert_eq!(normalize_operation_id("getPods"), "get-pods");
    }

    #[test]
    fn normalize_operation_id_consecutive_uppercase() {
        assert_eq!(normalize_operation_id("getHTTPStatus"), "get-http-status");
    }

    #[test]
    fn normalize_operation_id_acronym_at_start() {
        assert_eq!(normalize_operation_id("HTMLParser"), "html-parser");
    }

    #[test]
    fn normalize_operation_id_empty() {
        assert_eq!(normalize_operation_id(""), "");
    }

    // -- normalize_group --

    #[test]
    fn normalize_group_with_spaces() {
        assert_eq!(normalize_group("My Cool Group"), "my-cool-group");
    }

    #[test]
    fn normalize_group_uppercase() {
        assert_eq!(normalize_group("PODS"), "pods");
    }

    #[test]
    fn normalize_group_special_characters() {
        assert_eq!(normalize_group("My/Group"), "my-group");
        assert_eq!(normalize_group("My_Group"), "my-group");
        assert_eq!(normalize_group("My..Group"), "my-group");
        assert_eq!(normalize_group("--edge--"), "edge");
    }
}
