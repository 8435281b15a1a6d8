//! Namespace-aware XML tree and string helpers.
//!
//! Incoming messages are parsed with `quick-xml`'s [`NsReader`] into a small
//! owned tree of [`XmlElement`]s. Document type declarations are rejected.
//! The string helpers locate elements by byte range so signatures and
//! encrypted assertions can be spliced without re-serialising the document.

use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Reader};
use xml_canonicalization::Canonicalizer;

use crate::error::{SamlError, SamlResult};

/// An XML attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Resolved namespace, if the attribute is prefixed.
    pub namespace: Option<String>,
    /// Local name.
    pub local_name: String,
    /// Unescaped value.
    pub value: String,
}

/// An XML element with its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Resolved namespace.
    pub namespace: Option<String>,
    /// Qualified name as written.
    pub qname: String,
    /// Local name.
    pub local_name: String,
    /// Attributes, excluding namespace declarations.
    pub attributes: Vec<XmlAttribute>,
    /// Child elements.
    pub children: Vec<XmlElement>,
    /// Concatenated, unescaped text content.
    pub text: String,
}

impl XmlElement {
    /// Returns true if the element has this namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns the first child with the given namespace and local name.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.is(namespace, local_name))
    }

    /// Returns all children with the given namespace and local name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Self> + 'a {
        self.children
            .iter()
            .filter(move |c| c.is(namespace, local_name))
    }

    /// Depth-first search for a descendant (or self) with the given name.
    #[must_use]
    pub fn find(&self, namespace: &str, local_name: &str) -> Option<&Self> {
        if self.is(namespace, local_name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(namespace, local_name))
    }

    /// Collects every descendant (or self) with the given name.
    #[must_use]
    pub fn find_all<'a>(&'a self, namespace: &str, local_name: &str) -> Vec<&'a Self> {
        let mut found = Vec::new();
        self.collect(namespace, local_name, &mut found);
        found
    }

    fn collect<'a>(&'a self, namespace: &str, local_name: &str, found: &mut Vec<&'a Self>) {
        if self.is(namespace, local_name) {
            found.push(self);
        }
        for child in &self.children {
            child.collect(namespace, local_name, found);
        }
    }

    /// Returns an unprefixed attribute value.
    #[must_use]
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Returns a namespaced attribute value.
    #[must_use]
    pub fn attr_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.local_name == local_name && a.namespace.as_deref() == Some(namespace))
            .map(|a| a.value.as_str())
    }

    /// Returns the trimmed text content.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Returns the trimmed text of a child, if present and non-empty.
    #[must_use]
    pub fn child_text(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.child(namespace, local_name)
            .map(Self::text)
            .filter(|t| !t.is_empty())
    }
}

/// Parses a document into its root element.
pub fn parse(xml: &str) -> SamlResult<XmlElement> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = namespace_of(&resolved);
        match event.into_owned() {
            Event::Start(start) => {
                let element = element_from(&reader, &start, namespace)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = element_from(&reader, &start, namespace)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::DocType(_) => {
                return Err(SamlError::XmlParse(
                    "document type declarations are not allowed".to_string(),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SamlError::XmlParse("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
}

fn namespace_of(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => Some(String::from_utf8_lossy(ns).into_owned()),
        _ => None,
    }
}

fn element_from(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    namespace: Option<String>,
) -> SamlResult<XmlElement> {
    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = attr.key;
        if key.as_ref() == b"xmlns" || key.as_ref().starts_with(b"xmlns:") {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(key);
        attributes.push(XmlAttribute {
            namespace: namespace_of(&resolved),
            local_name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: attr.unescape_value()?.into_owned(),
        });
    }

    Ok(XmlElement {
        namespace,
        qname,
        local_name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(SamlError::XmlParse("multiple root elements".to_string()))
    }
}

/// Escapes text or attribute content.
#[must_use]
pub fn escape(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

/// Exclusive canonical form (without comments) of a detached fragment.
///
/// `inherited` carries the namespace declarations in scope where the
/// fragment sits in its document, see [`declare_namespaces`].
pub fn canonicalize(fragment: &str, inherited: &[(String, String)]) -> SamlResult<String> {
    let document = declare_namespaces(fragment, inherited)?;
    let mut output = Vec::new();
    Canonicalizer::read_from_str(&document)
        .write_to_writer(&mut output)
        .canonicalize(false)
        .map_err(|e| SamlError::XmlParse(format!("canonicalization failed: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| SamlError::XmlParse(format!("canonical form is not UTF-8: {e}")))
}

/// Declares `inherited` namespaces on the fragment root, so prefixes used
/// inside it stay bound once it is cut out of its document. Prefixes the
/// root declares itself are left alone.
pub fn declare_namespaces(fragment: &str, inherited: &[(String, String)]) -> SamlResult<String> {
    let start = root_range(fragment)
        .ok_or_else(|| SamlError::XmlParse("fragment has no root element".to_string()))?
        .start;
    let name_end = fragment[start + 1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .map(|p| start + 1 + p)
        .ok_or_else(|| SamlError::XmlParse("malformed start tag".to_string()))?;

    let mut reader = Reader::from_str(&fragment[start..]);
    let declared = loop {
        match reader.read_event()? {
            Event::Start(tag) | Event::Empty(tag) => break declarations(&tag)?,
            Event::Eof => {
                return Err(SamlError::XmlParse("fragment has no root element".to_string()))
            }
            _ => {}
        }
    };

    let mut extra = String::new();
    for (prefix, uri) in inherited {
        if uri.is_empty() || declared.iter().any(|(p, _)| p == prefix) {
            continue;
        }
        if prefix.is_empty() {
            extra.push_str(&format!(" xmlns=\"{}\"", escape(uri)));
        } else {
            extra.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape(uri)));
        }
    }
    Ok(format!("{}{extra}{}", &fragment[..name_end], &fragment[name_end..]))
}

/// Cuts the element at `range` out of `xml` as a standalone fragment.
pub fn detach(xml: &str, range: Range<usize>) -> SamlResult<String> {
    let inherited = namespaces_in_scope(xml, range.start)?;
    declare_namespaces(&xml[range], &inherited)
}

/// Exclusive canonical form of the element at `range` within `xml`.
pub fn canonicalize_element(xml: &str, range: Range<usize>) -> SamlResult<String> {
    let inherited = namespaces_in_scope(xml, range.start)?;
    canonicalize(&xml[range], &inherited)
}

/// Returns the namespace declarations in scope at byte `position`, as
/// `(prefix, uri)` pairs. The default namespace has an empty prefix.
pub fn namespaces_in_scope(xml: &str, position: usize) -> SamlResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    loop {
        let offset = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        if offset >= position {
            break;
        }
        match reader.read_event()? {
            Event::Start(tag) => scopes.push(declarations(&tag)?),
            Event::End(_) => {
                scopes.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut in_scope: Vec<(String, String)> = Vec::new();
    for (prefix, uri) in scopes.into_iter().flatten() {
        in_scope.retain(|(p, _)| *p != prefix);
        in_scope.push((prefix, uri));
    }
    Ok(in_scope)
}

fn declarations(tag: &BytesStart<'_>) -> SamlResult<Vec<(String, String)>> {
    let mut found = Vec::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        let prefix = if key == b"xmlns" {
            String::new()
        } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            String::from_utf8_lossy(prefix).into_owned()
        } else {
            continue;
        };
        found.push((prefix, attr.unescape_value()?.into_owned()));
    }
    Ok(found)
}

/// Returns the byte range of the first root element.
pub fn root_range(xml: &str) -> Option<Range<usize>> {
    let mut pos = 0;
    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        match xml.as_bytes().get(start + 1) {
            Some(b'?' | b'!') => pos = start + 1,
            Some(_) => return element_range_at(xml, start),
            None => return None,
        }
    }
    None
}

/// Returns the byte range of the element carrying `ID="id"` or `Id="id"`.
pub fn element_range_by_id(xml: &str, id: &str) -> Option<Range<usize>> {
    let attr_pos = [format!(" ID=\"{id}\""), format!(" Id=\"{id}\"")]
        .iter()
        .find_map(|pattern| xml.find(pattern.as_str()))?;
    let start = xml[..attr_pos].rfind('<')?;
    element_range_at(xml, start)
}

/// Returns the byte range of the element whose start tag begins at `start`.
///
/// Nested elements with the same qualified name are balanced.
pub fn element_range_at(xml: &str, start: usize) -> Option<Range<usize>> {
    let rest = xml.get(start + 1..)?;
    let name_len = rest.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
    let qname = &rest[..name_len];
    let open_end = start + xml[start..].find('>')?;
    if xml[..open_end].ends_with('/') {
        return Some(start..open_end + 1);
    }

    let open_pattern = format!("<{qname}");
    let close_pattern = format!("</{qname}>");
    let mut depth = 1usize;
    let mut pos = open_end + 1;
    loop {
        let close = pos + xml[pos..].find(&close_pattern)?;
        let mut search = pos;
        while let Some(offset) = xml[search..close].find(&open_pattern) {
            let open = search + offset;
            let next = xml.as_bytes().get(open + open_pattern.len());
            if matches!(next, Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/')) {
                let tag_end = open + xml[open..].find('>')?;
                if !xml[..tag_end].ends_with('/') {
                    depth += 1;
                }
            }
            search = open + open_pattern.len();
        }
        depth -= 1;
        pos = close + close_pattern.len();
        if depth == 0 {
            return Some(start..pos);
        }
    }
}

/// Returns the ranges of every element with one of the given qualified
/// names, in document order. Nested matches are not reported.
pub fn element_ranges(xml: &str, qnames: &[&str]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut pos = 0;
    while let Some((start, _)) = qnames
        .iter()
        .filter_map(|q| find_start_tag(xml, pos, q).map(|s| (s, *q)))
        .min_by_key(|(s, _)| *s)
    {
        match element_range_at(xml, start) {
            Some(range) => {
                pos = range.end;
                ranges.push(range);
            }
            None => break,
        }
    }
    ranges
}

/// Finds the next start tag with exactly this qualified name.
#[must_use]
pub fn find_start_tag(xml: &str, from: usize, qname: &str) -> Option<usize> {
    let pattern = format!("<{qname}");
    let mut pos = from;
    while let Some(offset) = xml.get(pos..)?.find(&pattern) {
        let start = pos + offset;
        let next = xml.as_bytes().get(start + pattern.len());
        if matches!(next, Some(b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/')) {
            return Some(start);
        }
        pos = start + pattern.len();
    }
    None
}

/// Returns the position just past the end of the start tag at `start`.
#[must_use]
pub fn start_tag_end(xml: &str, start: usize) -> Option<usize> {
    xml.get(start..)?.find('>').map(|p| start + p + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion" ID="_abc" Version="2.0">
  <saml2:Issuer>https://sp.example.eu/metadata</saml2:Issuer>
  <samlp:Extensions>
    <eidas:SPType xmlns:eidas="http://eidas.europa.eu/saml-extensions">public</eidas:SPType>
  </samlp:Extensions>
  <samlp:NameIDPolicy AllowCreate="true" Format="urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"/>
</samlp:AuthnRequest>"#;

    #[test]
    fn parses_namespaces_and_attributes() {
        let root = parse(DOC).unwrap();
        assert!(root.is("urn:oasis:names:tc:SAML:2.0:protocol", "AuthnRequest"));
        assert_eq!(root.attr("ID"), Some("_abc"));
        assert_eq!(
            root.child_text("urn:oasis:names:tc:SAML:2.0:assertion", "Issuer"),
            Some("https://sp.example.eu/metadata")
        );
        let sp_type = root
            .find("http://eidas.europa.eu/saml-extensions", "SPType")
            .unwrap();
        assert_eq!(sp_type.text(), "public");
        assert_eq!(sp_type.qname, "eidas:SPType");
        let policy = root
            .child("urn:oasis:names:tc:SAML:2.0:protocol", "NameIDPolicy")
            .unwrap();
        assert_eq!(policy.attr("AllowCreate"), Some("true"));
    }

    #[test]
    fn rejects_doctype_and_garbage() {
        let xml = r#"<!DOCTYPE foo [<!ENTITY x "y">]><foo>&x;</foo>"#;
        assert!(matches!(parse(xml), Err(SamlError::XmlParse(_))));
        assert!(parse("not xml at all").is_err());
        assert!(parse("<a><b></a>").is_err());
    }

    #[test]
    fn unescapes_text() {
        let root = parse("<a>Fish &amp; Chips</a>").unwrap();
        assert_eq!(root.text(), "Fish & Chips");
        assert_eq!(escape("a<b&\"c\""), "a&lt;b&amp;&quot;c&quot;");
    }

    #[test]
    fn locates_elements_by_range() {
        let root = root_range(DOC).unwrap();
        assert!(DOC[root.clone()].starts_with("<samlp:AuthnRequest"));
        assert!(DOC[root].ends_with("</samlp:AuthnRequest>"));

        let by_id = element_range_by_id(DOC, "_abc").unwrap();
        assert!(DOC[by_id].ends_with("</samlp:AuthnRequest>"));

        let nested = "<x:A ID=\"1\"><x:A>inner</x:A><x:A/></x:A><x:A>tail</x:A>";
        let range = element_range_by_id(nested, "1").unwrap();
        assert_eq!(&nested[range], "<x:A ID=\"1\"><x:A>inner</x:A><x:A/></x:A>");
    }

    #[test]
    fn finds_sibling_ranges() {
        let xml = "<r><s:Assertion ID=\"a\"><x/></s:Assertion><s:AssertionX/><s:Assertion ID=\"b\"/></r>";
        let ranges = element_ranges(xml, &["s:Assertion"]);
        assert_eq!(ranges.len(), 2);
        assert_eq!(&xml[ranges[1].clone()], "<s:Assertion ID=\"b\"/>");
    }

    #[test]
    fn canonical_form_expands_empty_elements() {
        let canonical = canonicalize(r#"<a:E xmlns:a="urn:a"/>"#, &[]).unwrap();
        assert_eq!(canonical, r#"<a:E xmlns:a="urn:a"></a:E>"#);
    }

    #[test]
    fn canonical_form_keeps_text_whitespace() {
        let one = canonicalize("<a>x y</a>", &[]).unwrap();
        let two = canonicalize("<a>x  y</a>", &[]).unwrap();
        assert_ne!(one, two);
    }

    #[test]
    fn fragment_keeps_inherited_prefixes_bound() {
        let doc = r#"<a:R xmlns:a="urn:a" xmlns:b="urn:b"><a:C><a:D>x</a:D></a:C></a:R>"#;
        let range = element_ranges(doc, &["a:C"])[0].clone();

        let in_scope = namespaces_in_scope(doc, range.start).unwrap();
        assert!(in_scope.contains(&("a".to_string(), "urn:a".to_string())));
        assert!(in_scope.contains(&("b".to_string(), "urn:b".to_string())));

        let canonical = canonicalize_element(doc, range).unwrap();
        assert!(canonical.starts_with(r#"<a:C xmlns:a="urn:a""#));
        assert!(canonical.ends_with("</a:C>"));
        assert!(parse(&canonical).unwrap().is("urn:a", "C"));
    }

    #[test]
    fn nested_declarations_shadow_outer_ones() {
        let doc = r#"<a:R xmlns:a="urn:outer"><a:S xmlns:a="urn:inner"><a:T/></a:S></a:R>"#;
        let position = find_start_tag(doc, 0, "a:T").unwrap();
        let in_scope = namespaces_in_scope(doc, position).unwrap();
        assert_eq!(in_scope, vec![("a".to_string(), "urn:inner".to_string())]);
    }
}
