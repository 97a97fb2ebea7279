//! Accessibility tree snapshots.
//!
//! The tree a driver reports for the page at the moment of failure. It is
//! attached to failure payloads and rendered as an indented outline for
//! human (and agent) consumption.

use serde::{Deserialize, Serialize};

/// One node of an accessibility tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessibilityNode {
    /// ARIA role (explicit or implicit)
    pub role: String,
    /// Accessible name
    #[serde(default)]
    pub name: String,
    /// Current value for form controls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether the control is disabled
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    /// Child nodes in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AccessibilityNode>,
}

impl AccessibilityNode {
    /// Create a node with a role and name
    #[must_use]
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a child node
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Set the value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Total number of nodes in this subtree
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Depth-first search for the first node with this role and name
    #[must_use]
    pub fn find(&self, role: &str, name: &str) -> Option<&Self> {
        if self.role == role && self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(role, name))
    }

    /// Render as an indented outline, one node per line:
    ///
    /// ```text
    /// - WebArea "Tic Tac Toe"
    ///   - button "Start"
    ///   - textbox "Name": alice
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&"  ".repeat(depth));
        out.push_str("- ");
        out.push_str(&self.role);
        if !self.name.is_empty() {
            out.push_str(&format!(" {:?}", self.name));
        }
        if self.disabled {
            out.push_str(" [disabled]");
        }
        if let Some(ref value) = self.value {
            out.push_str(": ");
            out.push_str(value);
        }
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

/// Implicit ARIA role for an HTML tag.
///
/// `input_type` is the `type` attribute of `<input>` elements; `has_href`
/// distinguishes links from bare anchors.
#[must_use]
pub fn implicit_role(tag: &str, input_type: Option<&str>, has_href: bool) -> Option<&'static str> {
    let role = match tag.to_ascii_lowercase().as_str() {
        "a" if has_href => "link",
        "button" => "button",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "textarea" => "textbox",
        "select" => "combobox",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "nav" => "navigation",
        "main" => "main",
        "form" => "form",
        "dialog" => "dialog",
        "table" => "table",
        "tr" => "row",
        "td" => "cell",
        "th" => "columnheader",
        "input" => match input_type.unwrap_or("text").to_ascii_lowercase().as_str() {
            "checkbox" => "checkbox",
            "radio" => "radio",
            "button" | "submit" | "reset" => "button",
            "range" => "slider",
            "search" => "searchbox",
            "number" => "spinbutton",
            "hidden" => return None,
            _ => "textbox",
        },
        _ => return None,
    };
    Some(role)
}
