//! Static description of the web application a [`super::MockDriver`] serves.

use crate::accessibility::{implicit_role, AccessibilityNode};
use crate::driver::ElementState;
use crate::locator::{Selector, TextMatch};
use std::collections::HashMap;
use std::time::Duration;

/// What clicking an element does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    /// Navigate to another page of the site
    Navigate(String),
    /// Make the element with this id visible
    Reveal(String),
    /// Replace the text of the element with this id
    SetText {
        /// Target element id
        target: String,
        /// New text
        text: String,
    },
}

/// One element on a mock page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MockElement {
    /// DOM id
    pub id: Option<String>,
    /// Lowercase tag name
    pub tag: String,
    /// Explicit ARIA role (otherwise derived from the tag)
    pub role: Option<String>,
    /// Accessible name (otherwise label, then text)
    pub name: Option<String>,
    /// Associated label text
    pub label: Option<String>,
    /// Text content
    pub text: String,
    /// Placeholder attribute
    pub placeholder: Option<String>,
    /// `data-testid` attribute
    pub test_id: Option<String>,
    /// Form control value
    pub value: Option<String>,
    /// Rendered
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Attached only after this long on the page
    pub appears_after: Option<Duration>,
    /// Click behavior
    pub on_click: Option<ClickEffect>,
}

impl MockElement {
    /// Visible, enabled element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            visible: true,
            enabled: true,
            ..Self::default()
        }
    }

    /// `<button>` with text
    #[must_use]
    pub fn button(text: impl Into<String>) -> Self {
        Self::new("button").text(text)
    }

    /// `<h1>` with text
    #[must_use]
    pub fn heading(text: impl Into<String>) -> Self {
        Self::new("h1").text(text)
    }

    /// `<a href>` navigating to `url`
    #[must_use]
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new("a").text(text).on_click(ClickEffect::Navigate(url.into()))
    }

    /// Labelled `<input>`
    #[must_use]
    pub fn input(label: impl Into<String>) -> Self {
        Self::new("input").label(label).value("")
    }

    /// `<p>` with text
    #[must_use]
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new("p").text(text)
    }

    /// Set the id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set an explicit role
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the accessible name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the label
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the placeholder
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the test id
    #[must_use]
    pub fn test_id(mut self, id: impl Into<String>) -> Self {
        self.test_id = Some(id.into());
        self
    }

    /// Set the value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Start disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Attach the element only after `delay` on the page
    #[must_use]
    pub const fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = Some(delay);
        self
    }

    /// Set the click behavior
    #[must_use]
    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    /// Explicit role, else the tag's implicit role
    #[must_use]
    pub fn effective_role(&self) -> Option<&str> {
        self.role
            .as_deref()
            .or_else(|| implicit_role(&self.tag, None, self.tag == "a"))
    }

    /// Accessible name: explicit name, then label, then text
    #[must_use]
    pub fn accessible_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or(&self.text)
    }

    /// Whether text can be typed into the element
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
            || matches!(self.effective_role(), Some("textbox" | "searchbox"))
    }

    /// Whether `selector` matches this element.
    ///
    /// CSS support is limited to `#id`, `[data-testid="..."]` and bare tag names.
    #[must_use]
    pub fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Css(css) => self.matches_css(css.trim()),
            Selector::Role { role, name } => {
                self.effective_role() == Some(role.as_str())
                    && name.as_ref().map_or(true, |m| m.matches(self.accessible_name()))
            }
            Selector::Text(m) => !self.text.is_empty() && m.matches(&self.text),
            Selector::Label(m) => option_matches(self.label.as_deref(), m),
            Selector::Placeholder(m) => option_matches(self.placeholder.as_deref(), m),
            Selector::TestId(id) => self.test_id.as_deref() == Some(id.as_str()),
        }
    }

    fn matches_css(&self, css: &str) -> bool {
        if let Some(id) = css.strip_prefix('#') {
            return self.id.as_deref() == Some(id);
        }
        if let Some(rest) = css
            .strip_prefix("[data-testid=")
            .and_then(|r| r.strip_suffix(']'))
        {
            let wanted = rest.trim_matches(|c| c == '"' || c == '\'');
            return self.test_id.as_deref() == Some(wanted);
        }
        css == "*" || css.eq_ignore_ascii_case(&self.tag)
    }

    /// Snapshot as seen by a query
    #[must_use]
    pub fn state(&self) -> ElementState {
        ElementState {
            tag: self.tag.clone(),
            text: self.text.clone(),
            value: self.value.clone(),
            visible: self.visible,
            enabled: self.enabled,
        }
    }

    /// Serialized markup
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut attrs = String::new();
        if let Some(id) = &self.id {
            attrs.push_str(&format!(" id=\"{id}\""));
        }
        if let Some(role) = &self.role {
            attrs.push_str(&format!(" role=\"{role}\""));
        }
        if let Some(label) = &self.label {
            attrs.push_str(&format!(" aria-label=\"{label}\""));
        }
        if let Some(p) = &self.placeholder {
            attrs.push_str(&format!(" placeholder=\"{p}\""));
        }
        if let Some(t) = &self.test_id {
            attrs.push_str(&format!(" data-testid=\"{t}\""));
        }
        if let Some(v) = &self.value {
            attrs.push_str(&format!(" value=\"{v}\""));
        }
        if !self.visible {
            attrs.push_str(" hidden");
        }
        if !self.enabled {
            attrs.push_str(" disabled");
        }
        if self.tag == "input" {
            format!("<input{attrs}>")
        } else {
            format!("<{tag}{attrs}>{text}</{tag}>", tag = self.tag, text = self.text)
        }
    }

    /// Accessibility node, `None` when the element is not exposed
    #[must_use]
    pub fn accessibility_node(&self) -> Option<AccessibilityNode> {
        if !self.visible {
            return None;
        }
        let role = self.effective_role()?;
        let mut node = AccessibilityNode::new(role, self.accessible_name());
        if let Some(v) = self.value.as_deref().filter(|v| !v.is_empty()) {
            node = node.with_value(v);
        }
        node.disabled = !self.enabled;
        Some(node)
    }
}

fn option_matches(candidate: Option<&str>, m: &TextMatch) -> bool {
    candidate.is_some_and(|c| m.matches(c))
}

/// One page of the site
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MockPageSpec {
    /// Document title
    pub title: String,
    /// Elements in document order
    pub elements: Vec<MockElement>,
}

impl MockPageSpec {
    /// Empty page
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
        }
    }

    /// Append an element
    #[must_use]
    pub fn with(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// URL to page mapping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MockSite {
    pages: HashMap<String, MockPageSpec>,
}

impl MockSite {
    /// Site with no pages
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, page: MockPageSpec) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Look up a page
    #[must_use]
    pub fn page(&self, url: &str) -> Option<&MockPageSpec> {
        self.pages.get(url)
    }

    /// Number of pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the site has no pages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::Pattern;

    #[test]
    fn test_role_and_name() {
        let button = MockElement::button("Start Game");
        assert_eq!(button.effective_role(), Some("button"));
        assert!(button.matches(&Selector::Role {
            role: "button".into(),
            name: Some("start".into()),
        }));
        assert!(!button.matches(&Selector::Role {
            role: "button".into(),
            name: Some(TextMatch::exact("Start")),
        }));
        assert!(!button.matches(&Selector::role("link")));
    }

    #[test]
    fn test_input_name_from_label() {
        let input = MockElement::input("Email").placeholder("you@example.com");
        assert_eq!(input.accessible_name(), "Email");
        assert_eq!(input.effective_role(), Some("textbox"));
        assert!(input.is_editable());
        assert!(input.matches(&Selector::label("email")));
        assert!(input.matches(&Selector::Placeholder("example".into())));
        assert!(!input.matches(&Selector::text("Email")));
    }

    #[test]
    fn test_css_subset() {
        let el = MockElement::paragraph("hi").id("status").test_id("status-line");
        assert!(el.matches(&Selector::css("#status")));
        assert!(el.matches(&Selector::css("p")));
        assert!(el.matches(&Selector::css("[data-testid=\"status-line\"]")));
        assert!(!el.matches(&Selector::css("#other")));
        assert!(el.matches(&Selector::test_id("status-line")));
    }

    #[test]
    fn test_pattern_name() {
        let link = MockElement::link("Sign In", "http://app/login");
        let selector = Selector::Role {
            role: "link".into(),
            name: Some(Pattern::new("^sign in$", true).unwrap().into()),
        };
        assert!(link.matches(&selector));
    }

    #[test]
    fn test_html_and_accessibility() {
        let input = MockElement::input("Name").id("name").value("alice").disabled();
        let html = input.to_html();
        assert!(html.starts_with("<input"));
        assert!(html.contains("value=\"alice\""));
        assert!(html.contains("disabled"));

        let node = input.accessibility_node().unwrap();
        assert_eq!(node.role, "textbox");
        assert_eq!(node.value.as_deref(), Some("alice"));
        assert!(node.disabled);

        assert!(MockElement::button("x").hidden().accessibility_node().is_none());
        assert!(MockElement::new("div").text("x").accessibility_node().is_none());
    }
}
