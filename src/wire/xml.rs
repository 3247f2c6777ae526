//! A namespace-aware element tree, just large enough to select the nodes of a
//! service response by path.
use quick_xml::{
    events::{attributes::Attribute as RawAttribute, BytesStart, Event},
    name::ResolveResult,
    NsReader,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A node that must be present is not. `cursor` names it.
    #[error("missing element {cursor}")]
    Missing { cursor: String },
    #[error("malformed XML: {0}")]
    Malformed(String),
}

impl ParseError {
    pub fn missing(cursor: impl Into<String>) -> Self {
        Self::Missing {
            cursor: cursor.into(),
        }
    }

    /// The node the error refers to, if any.
    pub fn cursor(&self) -> Option<&str> {
        match self {
            Self::Missing { cursor } => Some(cursor),
            Self::Malformed(_) => None,
        }
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// An expanded name: namespace URI plus local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlName {
    pub namespace: Option<&'static str>,
    pub local: &'static str,
}

impl XmlName {
    pub const fn qualified(namespace: &'static str, local: &'static str) -> Self {
        Self {
            namespace: Some(namespace),
            local,
        }
    }

    /// A name in no namespace, such as `MSS_SignatureResponse xmlns=""`.
    pub const fn unqualified(local: &'static str) -> Self {
        Self {
            namespace: None,
            local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, ParseError> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = vec![];
        let mut root: Option<Element> = None;

        loop {
            let (namespace, event) = reader.read_resolved_event()?;
            let namespace = match namespace {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    return Err(ParseError::Malformed(format!(
                        "unknown namespace prefix '{}'",
                        String::from_utf8_lossy(&prefix)
                    )))
                }
            };
            match event {
                Event::Start(start) => {
                    let element = open_element(&reader, namespace, &start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = open_element(&reader, namespace, &start)?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ParseError::Malformed("unbalanced end tag".into()))?;
                    close_element(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| ParseError::Malformed(e.to_string()))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = std::str::from_utf8(&data)
                            .map_err(|e| ParseError::Malformed(e.to_string()))?;
                        parent.children.push(Node::Text(text.to_string()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ParseError::Malformed("unclosed tags".into()));
        }
        root.ok_or_else(|| ParseError::Malformed("document has no root element".into()))
    }

    pub fn is(&self, name: XmlName) -> bool {
        self.name == name.local && self.namespace.as_deref() == name.namespace
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, name: XmlName) -> Option<&Element> {
        self.child_elements().find(|element| element.is(name))
    }

    /// Follow `path` from this element, one child per step.
    pub fn find(&self, path: &[XmlName]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, step| element.child(*step))
    }

    /// An attribute by local name. Only unprefixed attributes match, which is how
    /// the service sends them.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.namespace.is_none() && attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    /// The text content of the element and its descendants, each piece trimmed and
    /// separated by a single space.
    pub fn text(&self) -> String {
        let mut pieces = vec![];
        self.collect_text(&mut pieces);
        pieces.join(" ")
    }

    fn collect_text<'a>(&'a self, pieces: &mut Vec<&'a str>) {
        for node in &self.children {
            match node {
                Node::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        pieces.push(text);
                    }
                }
                Node::Element(element) => element.collect_text(pieces),
            }
        }
    }

    /// Every attribute called `name` in this subtree, in document order.
    pub fn descendant_attributes<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        let mut values = vec![];
        self.collect_attributes(name, &mut values);
        values
    }

    fn collect_attributes<'a>(&'a self, name: &str, values: &mut Vec<&'a str>) {
        values.extend(
            self.attributes
                .iter()
                .filter(|attribute| attribute.name == name)
                .map(|attribute| attribute.value.as_str()),
        );
        for element in self.child_elements() {
            element.collect_attributes(name, values);
        }
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart,
) -> Result<Element, ParseError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attributes = vec![];
    for attribute in start.attributes() {
        let attribute: RawAttribute = attribute?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attribute.key);
        let namespace = match resolved {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
            _ => None,
        };
        attributes.push(Attribute {
            namespace,
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: attribute.unescape_value()?.into_owned(),
        });
    }
    Ok(Element {
        namespace,
        name,
        attributes,
        children: vec![],
    })
}

fn close_element(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ParseError::Malformed("more than one root element".into())),
    }
}
