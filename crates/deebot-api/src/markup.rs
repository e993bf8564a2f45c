//! Owned markup element model for legacy-generation payloads.
//!
//! Legacy firmware exchanges small `<ctl>` documents: one element named
//! after the command, attributes for scalar arguments, and nested
//! elements for structured ones. [`Element`] is an owned tree that can
//! be rendered to text for the wire and parsed back from inbound reports.

use std::fmt::Write as _;

use crate::error::Error;

/// One markup element with ordered attributes and child elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    /// Depth-first search for the first element with the given name,
    /// including `self`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Render to compact markup text.
    ///
    /// Fails with [`Error::Encoding`] if any element or attribute name is
    /// not a valid markup name.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut out = String::new();
        self.write_into(&mut out)?;
        Ok(out)
    }

    fn write_into(&self, out: &mut String) -> Result<(), Error> {
        validate_name(&self.name)?;
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            validate_name(key)?;
            // Writing into a String is infallible.
            let _ = write!(out, " {key}=\"{}\"", escape(value));
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return Ok(());
        }
        out.push('>');
        if let Some(ref text) = self.text {
            out.push_str(&escape(text));
        }
        for child in &self.children {
            child.write_into(out)?;
        }
        let _ = write!(out, "</{}>", self.name);
        Ok(())
    }

    // ── Parsing ──────────────────────────────────────────────────────

    /// Parse a markup document into an owned tree rooted at its
    /// document element. Namespaces are dropped; local names are kept.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let doc = roxmltree::Document::parse(text).map_err(|e| Error::Markup(e.to_string()))?;
        Ok(Self::from_node(doc.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let text = node
            .children()
            .filter(roxmltree::Node::is_text)
            .filter_map(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<String>();

        Self {
            name: node.tag_name().name().to_owned(),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_owned(), a.value().to_owned()))
                .collect(),
            children: node
                .children()
                .filter(roxmltree::Node::is_element)
                .map(Self::from_node)
                .collect(),
            text: if text.is_empty() { None } else { Some(text) },
        }
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(Error::Encoding(format!("invalid markup name: {name:?}")))
    }
}

/// Escape the five predefined entities.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_nested_command() {
        let el = Element::new("ctl")
            .with_attr("td", "Clean")
            .with_child(Element::new("clean").with_attr("type", "auto").with_attr("act", "s"));
        assert_eq!(
            el.to_xml().unwrap(),
            r#"<ctl td="Clean"><clean type="auto" act="s"/></ctl>"#
        );
    }

    #[test]
    fn escapes_attribute_values() {
        let el = Element::new("ctl").with_attr("name", "a<b&\"c\"");
        assert_eq!(el.to_xml().unwrap(), r#"<ctl name="a&lt;b&amp;&quot;c&quot;"/>"#);
    }

    #[test]
    fn rejects_invalid_names() {
        let el = Element::new("ctl").with_attr("bad name", "x");
        assert!(matches!(el.to_xml(), Err(Error::Encoding(_))));
        assert!(Element::new("").to_xml().is_err());
    }

    #[test]
    fn parses_report_with_namespaced_wrapper() {
        let text = r#"<iq type="set" id="1"><query xmlns="com:ctl"><ctl td="ChargeState"><charge type="SlotCharging"/></ctl></query></iq>"#;
        let root = Element::parse(text).unwrap();
        let ctl = root.find("ctl").unwrap();
        assert_eq!(ctl.attr("td"), Some("ChargeState"));
        assert_eq!(ctl.first_child().unwrap().attr("type"), Some("SlotCharging"));
    }

    #[test]
    fn set_attr_replaces_in_place() {
        let mut el = Element::new("ctl").with_attr("a", "1").with_attr("b", "2");
        el.set_attr("a", "3");
        assert_eq!(el.attributes, vec![("a".into(), "3".into()), ("b".into(), "2".into())]);
        assert_eq!(el.remove_attr("a").as_deref(), Some("3"));
        assert_eq!(el.attr("a"), None);
    }

    #[test]
    fn malformed_markup_is_an_error() {
        assert!(matches!(Element::parse("<ctl"), Err(Error::Markup(_))));
    }
}
