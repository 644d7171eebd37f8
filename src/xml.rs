//! Validated, order-sensitive XML element stream.
//!
//! [`XmlCursor`] is the tokenizing reader every built-in XML converter is
//! written against. It reads only what a converter asks for, fails fast with
//! a positional [`FormatError`] the first time an expectation is violated,
//! and silently skips elements and attributes a schema does not recognize so
//! newer tool output still converts.
//!
//! Self-closing elements and empty-but-present elements are expanded into
//! identical start/end pairs, so downstream code never sees a distinction
//! the formats themselves do not make. Whitespace-only text between
//! structural elements is trimmed away rather than surfacing as content.

use crate::error::FormatError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::BufRead;

/// An opened element: local name plus its already-decoded attributes.
#[derive(Debug)]
pub struct Element {
    pub name: String,
    /// Byte offset of the input just past this element's start tag.
    pub offset: u64,
    attrs: Vec<(String, String)>,
}

impl Element {
    /// The attribute value if present. Unrecognized attributes are simply
    /// never asked for.
    #[inline]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v.as_str()))
    }

    /// The attribute value, or a [`FormatError::MissingField`] naming the
    /// element and attribute.
    pub fn require_attr(&self, name: &str) -> Result<&str, FormatError> {
        self.attr(name).ok_or_else(|| FormatError::MissingField {
            offset: self.offset,
            element: self.name.clone(),
            field: name.to_owned(),
        })
    }

    /// Parses an attribute as `i64`. A present-but-malformed value is a
    /// [`FormatError::InvalidValue`], never a best-effort substitution.
    pub fn attr_i64(&self, name: &str) -> Result<Option<i64>, FormatError> {
        let Some(raw) = self.attr(name) else {
            return Ok(None);
        };

        raw.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| FormatError::InvalidValue {
                offset: self.offset,
                field: format!("{}@{name}", self.name),
                value: raw.to_owned(),
                expected: "an integer",
            })
    }
}

/// A structural event, decoded and owned.
#[derive(Debug)]
pub enum Node {
    Start(Element),
    End(String),
    Text(String),
    Eof,
}

pub struct XmlCursor<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    peeked: Option<Node>,
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text_start = true;
        config.trim_text_end = true;
        // <element/> and <element></element> both mean "present, no content"
        config.expand_empty_elements = true;

        Self {
            reader,
            buf: Vec::new(),
            peeked: None,
        }
    }

    /// Current byte position in the input, for error context.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// The next structural node, skipping comments, processing instructions
    /// and the like.
    pub fn next_node(&mut self) -> Result<Node, FormatError> {
        if let Some(node) = self.peeked.take() {
            return Ok(node);
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(err) => {
                    return Err(FormatError::Xml {
                        offset: self.reader.buffer_position() as u64,
                        source: err,
                    })
                }
            };

            // computed up front; the event below holds a borrow of the buffer
            let offset = self.reader.buffer_position() as u64;

            match event {
                Event::Start(start) => {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

                    let mut attrs = Vec::new();
                    for attr in start.attributes() {
                        let attr = attr.map_err(|err| FormatError::Xml {
                            offset,
                            source: quick_xml::Error::from(err),
                        })?;
                        let key =
                            String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|err| FormatError::Xml {
                                offset,
                                source: err,
                            })?
                            .into_owned();
                        attrs.push((key, value));
                    }

                    return Ok(Node::Start(Element {
                        name,
                        offset,
                        attrs,
                    }));
                }
                Event::End(end) => {
                    return Ok(Node::End(
                        String::from_utf8_lossy(end.local_name().as_ref()).into_owned(),
                    ));
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|source| FormatError::Xml { offset, source })?;
                    if !text.is_empty() {
                        return Ok(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    return Ok(Node::Text(
                        String::from_utf8_lossy(&data.into_inner()).into_owned(),
                    ));
                }
                Event::Eof => return Ok(Node::Eof),
                // Empty never fires with expand_empty_elements set
                Event::Empty(_)
                | Event::Decl(_)
                | Event::Comment(_)
                | Event::PI(_)
                | Event::DocType(_) => {}
            }
        }
    }

    pub fn peek(&mut self) -> Result<&Node, FormatError> {
        if self.peeked.is_none() {
            let node = self.next_node()?;
            self.peeked = Some(node);
        }

        Ok(self.peeked.as_ref().unwrap())
    }

    /// Consumes the next node, which must open `name`.
    pub fn expect_start(&mut self, name: &str) -> Result<Element, FormatError> {
        match self.next_node()? {
            Node::Start(element) if element.name == name => Ok(element),
            Node::Start(element) => Err(FormatError::UnexpectedElement {
                offset: element.offset,
                expected: name.to_owned(),
                found: element.name,
            }),
            Node::End(found) => Err(FormatError::UnexpectedElement {
                offset: self.offset(),
                expected: name.to_owned(),
                found: format!("/{found}"),
            }),
            Node::Text(_) => Err(FormatError::UnexpectedElement {
                offset: self.offset(),
                expected: name.to_owned(),
                found: "#text".to_owned(),
            }),
            Node::Eof => Err(FormatError::UnexpectedEof {
                offset: self.offset(),
                expected: name.to_owned(),
            }),
        }
    }

    /// The next child element inside `parent`, or `None` once the parent's
    /// end tag has been consumed. Stray non-whitespace text inside a
    /// structural container is skipped with a trace, not an error.
    pub fn next_child(&mut self, parent: &str) -> Result<Option<Element>, FormatError> {
        loop {
            match self.next_node()? {
                Node::Start(element) => return Ok(Some(element)),
                Node::End(name) if name == parent => return Ok(None),
                Node::End(name) => {
                    return Err(FormatError::UnexpectedElement {
                        offset: self.offset(),
                        expected: format!("/{parent}"),
                        found: format!("/{name}"),
                    });
                }
                Node::Text(text) => {
                    log::debug!("ignoring stray text inside <{parent}>: {text:?}");
                }
                Node::Eof => {
                    return Err(FormatError::UnexpectedEof {
                        offset: self.offset(),
                        expected: format!("/{parent}"),
                    });
                }
            }
        }
    }

    /// Reads the textual content of the just-opened `element` and consumes
    /// its end tag. Unrecognized child elements are skipped.
    pub fn element_text(&mut self, element: &Element) -> Result<String, FormatError> {
        let mut content = String::new();

        loop {
            match self.next_node()? {
                Node::Text(text) => content.push_str(&text),
                Node::Start(child) => {
                    log::debug!("skipping <{}> inside <{}>", child.name, element.name);
                    self.skip_element(&child.name)?;
                }
                Node::End(name) if name == element.name => return Ok(content),
                Node::End(name) => {
                    return Err(FormatError::UnexpectedElement {
                        offset: self.offset(),
                        expected: format!("/{}", element.name),
                        found: format!("/{name}"),
                    });
                }
                Node::Eof => {
                    return Err(FormatError::UnexpectedEof {
                        offset: self.offset(),
                        expected: format!("/{}", element.name),
                    });
                }
            }
        }
    }

    /// Consumes everything up to and including the end tag of the
    /// just-opened element `name`.
    pub fn skip_element(&mut self, name: &str) -> Result<(), FormatError> {
        let mut depth = 0usize;

        loop {
            match self.next_node()? {
                Node::Start(_) => depth += 1,
                Node::End(end) => {
                    if depth == 0 {
                        if end == name {
                            return Ok(());
                        }
                        return Err(FormatError::UnexpectedElement {
                            offset: self.offset(),
                            expected: format!("/{name}"),
                            found: format!("/{end}"),
                        });
                    }
                    depth -= 1;
                }
                Node::Text(_) => {}
                Node::Eof => {
                    return Err(FormatError::UnexpectedEof {
                        offset: self.offset(),
                        expected: format!("/{name}"),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cursor(xml: &str) -> XmlCursor<&[u8]> {
        XmlCursor::new(xml.as_bytes())
    }

    #[test]
    fn self_closing_and_empty_elements_are_identical() {
        for xml in ["<root><child/></root>", "<root><child></child></root>"] {
            let mut cur = cursor(xml);
            cur.expect_start("root").unwrap();
            let child = cur.next_child("root").unwrap().unwrap();
            assert_eq!(child.name, "child");
            assert_eq!(cur.element_text(&child).unwrap(), "");
            assert!(cur.next_child("root").unwrap().is_none());
        }
    }

    #[test]
    fn whitespace_between_elements_is_not_content() {
        let mut cur = cursor("<root>\n  <child>x</child>\n</root>");
        cur.expect_start("root").unwrap();
        let child = cur.next_child("root").unwrap().unwrap();
        assert_eq!(cur.element_text(&child).unwrap(), "x");
        assert!(cur.next_child("root").unwrap().is_none());
    }

    #[test]
    fn unknown_children_are_skipped_inside_leaves() {
        let mut cur = cursor("<msg>hello<b>new</b>world</msg>");
        let msg = cur.expect_start("msg").unwrap();
        // the unrecognized <b> subtree is dropped, surrounding text kept
        assert_eq!(cur.element_text(&msg).unwrap(), "helloworld");
    }

    #[test]
    fn wrong_root_is_an_unexpected_element() {
        let mut cur = cursor("<other/>");
        let err = cur.expect_start("root").unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnexpectedElement { expected, found, .. }
                if expected == "root" && found == "other"
        ));
    }

    #[test]
    fn truncated_input_is_an_unexpected_eof() {
        let mut cur = cursor("<root><child>");
        cur.expect_start("root").unwrap();
        let child = cur.next_child("root").unwrap().unwrap();
        assert!(matches!(
            cur.element_text(&child),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn malformed_numeric_attribute_is_an_error() {
        let mut cur = cursor(r#"<e line="twelve"/>"#);
        let e = cur.expect_start("e").unwrap();
        assert!(matches!(
            e.attr_i64("line"),
            Err(FormatError::InvalidValue { .. })
        ));
        // absent attribute is not an error
        assert_eq!(e.attr_i64("column").unwrap(), None);
    }

    #[test]
    fn attributes_are_decoded() {
        let mut cur = cursor(r#"<e name="a &amp; b" line="3"/>"#);
        let e = cur.expect_start("e").unwrap();
        assert_eq!(e.attr("name"), Some("a & b"));
        assert_eq!(e.attr_i64("line").unwrap(), Some(3));
        assert!(matches!(
            e.require_attr("missing"),
            Err(FormatError::MissingField { .. })
        ));
    }
}
