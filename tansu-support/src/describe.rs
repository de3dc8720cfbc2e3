//! Text rendering for settled container values.
//!
//! The container converts its values into a neutral [`Node`] tree and
//! this module turns that tree into a readable, aligned dump similar
//! to a hand-written config literal.

use std::fmt::Write;

/// A renderable view of a settled value.
///
/// The container crate owns the real value types; diagnostics convert
/// them into this tree so rendering stays independent of the core.
#[derive(Debug, Clone)]
pub enum Node {
    /// A pre-formatted scalar (`123`, `3.14`, `'text'`, `true`, `NULL`).
    Leaf(String),
    /// An ordered map. Keys are rendered quoted and aligned.
    Map(Vec<(String, Node)>),
    /// An object with a `Class#id` label.
    Object {
        label: String,
        fields: Vec<(String, Node)>,
        /// Already rendered elsewhere in this dump; show `{...}`.
        elided: bool,
    },
}

/// Renders a [`Node`] tree.
///
/// # Examples
/// ```
/// use tansu_support::describe::{render, Node};
///
/// let node = Node::Map(vec![
///     ("a".into(), Node::Leaf("1".into())),
///     ("long".into(), Node::Leaf("'x'".into())),
/// ]);
/// assert_eq!(render(&node), "[\n    'a'    => 1,\n    'long' => 'x',\n]");
/// ```
pub fn render(node: &Node) -> String {
    let mut out = String::new();
    render_nested(node, 0, &mut out);
    out
}

fn render_nested(node: &Node, nest: usize, out: &mut String) {
    match node {
        Node::Leaf(text) => out.push_str(text),
        Node::Map(pairs) => render_pairs(pairs, nest, true, out),
        Node::Object { label, fields, elided } => {
            out.push_str(label);
            if *elided {
                out.push_str(" {...}");
            } else {
                out.push(' ');
                render_pairs(fields, nest, false, out);
            }
        }
    }
}

/// Renders `key => value` pairs with the keys padded to a common width.
fn render_pairs(pairs: &[(String, Node)], nest: usize, as_array: bool, out: &mut String) {
    let (open, close) = if as_array { ('[', ']') } else { ('{', '}') };
    if pairs.is_empty() {
        out.push(open);
        out.push(close);
        return;
    }

    let keys: Vec<String> = pairs.iter().map(|(k, _)| quote_key(k)).collect();
    let width = keys.iter().map(String::len).max().unwrap_or(0);
    let indent = " ".repeat((nest + 1) * 4);

    out.push(open);
    out.push('\n');
    for ((_, value), key) in pairs.iter().zip(&keys) {
        let _ = write!(out, "{indent}{key:<width$} => ");
        render_nested(value, nest + 1, out);
        out.push_str(",\n");
    }
    out.push_str(&" ".repeat(nest * 4));
    out.push(close);
}

/// Quotes a map key the way a config literal would.
///
/// Purely numeric keys (list indices) stay bare; everything else is
/// single-quoted with embedded quotes escaped.
pub fn quote_key(key: &str) -> String {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        return key.to_string();
    }
    format!("'{}'", key.replace('\\', "\\\\").replace('\'', "\\'"))
}
