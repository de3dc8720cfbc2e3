//! Diagnostics over settled values.
//!
//! Converts [`Value`] trees into the neutral render tree of
//! `tansu-support`. Object graphs may be cyclic; an object is rendered
//! in full the first time it appears and elided afterwards.

use std::collections::HashSet;

use tansu_support::Node;

use crate::value::Value;

/// Scalar/structural kind name, or the class name for objects.
pub fn type_name_of(value: &Value) -> String {
    value.type_name()
}

/// Builds a renderable tree for a settled value.
pub fn describe(value: &Value) -> Node {
    let mut seen = HashSet::new();
    node_of(value, &mut seen)
}

fn node_of(value: &Value, seen: &mut HashSet<u64>) -> Node {
    match value {
        Value::Map(map) => Node::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), node_of(v, seen)))
                .collect(),
        ),
        Value::Object(obj) => {
            let label = format!("{}#{}", obj.class_name(), obj.oid());
            if !seen.insert(obj.oid()) {
                return Node::Object { label, fields: Vec::new(), elided: true };
            }
            let fields = obj
                .fields()
                .iter()
                .map(|(k, v)| (k.clone(), node_of(v, seen)))
                .collect();
            Node::Object { label, fields, elided: false }
        }
        scalar => Node::Leaf(format_scalar(scalar)),
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Map(_) | Value::Object(_) => unreachable!("handled structurally"),
    }
}
