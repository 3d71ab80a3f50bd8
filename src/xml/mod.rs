//! Lazy XML element streams
//!
//! [`ElementStream`] pulls events from `quick_xml` and yields one complete
//! element subtree for every occurrence of a tag of interest, wherever it sits
//! in the document. Tags are matched on their local name, so `x:row` and `row`
//! are the same element. Everything outside the matched subtrees is skipped
//! without being retained.
//!
//! The generic trees are turned into strongly typed shapes by the
//! [`elements`] module before anything else in the crate looks at them.

pub mod elements;

use crate::error::{Result, XlsxStreamError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::marker::PhantomData;

pub use elements::FromElement;

/// Generic element tree: local name, attributes, children and direct text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    /// Attributes keyed by local name (`r:id` is stored as `id`)
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        XmlElement {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = XmlElement::new(local_str(start.local_name().as_ref()));
        for attr in start.attributes() {
            let attr = attr?;
            let key = local_str(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

fn local_str(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn is_target(targets: &[&str], local: &[u8]) -> bool {
    targets.iter().any(|t| t.as_bytes() == local)
}

/// Attach a finished element to its parent, or hand it out at the top
fn close_element(stack: &mut [XmlElement], element: XmlElement) -> Option<XmlElement> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}

/// Streams complete subtrees of the elements named in `targets`
pub struct ElementStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    targets: &'static [&'static str],
    stack: Vec<XmlElement>,
    done: bool,
}

impl<R: BufRead> ElementStream<R> {
    pub fn new(source: R, targets: &'static [&'static str]) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(false);
        ElementStream {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            targets,
            stack: Vec::new(),
            done: false,
        }
    }

    fn next_element(&mut self) -> Result<Option<XmlElement>> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?;
            match event {
                Event::Start(ref e) => {
                    if !self.stack.is_empty() || is_target(self.targets, e.local_name().as_ref()) {
                        let element = XmlElement::from_start(e)?;
                        self.stack.push(element);
                    }
                }
                Event::Empty(ref e) => {
                    if !self.stack.is_empty() || is_target(self.targets, e.local_name().as_ref()) {
                        let element = XmlElement::from_start(e)?;
                        if let Some(done) = close_element(&mut self.stack, element) {
                            return Ok(Some(done));
                        }
                    }
                }
                Event::End(_) => {
                    if let Some(element) = self.stack.pop() {
                        if let Some(done) = close_element(&mut self.stack, element) {
                            return Ok(Some(done));
                        }
                    }
                }
                Event::Text(ref e) => {
                    if let Some(top) = self.stack.last_mut() {
                        top.text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(ref e) => {
                    if let Some(top) = self.stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Event::Eof => {
                    if let Some(open) = self.stack.last() {
                        return Err(XlsxStreamError::corrupt(format!(
                            "Unexpected end of document inside <{}>",
                            open.name
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementStream<R> {
    type Item = Result<XmlElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Element stream mapped into a typed element shape
pub struct TypedStream<T, R: BufRead> {
    inner: ElementStream<R>,
    _marker: PhantomData<T>,
}

impl<T: FromElement, R: BufRead> TypedStream<T, R> {
    pub fn new(source: R) -> Self {
        TypedStream {
            inner: ElementStream::new(source, T::TAGS),
            _marker: PhantomData,
        }
    }
}

impl<T: FromElement, R: BufRead> Iterator for TypedStream<T, R> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        let mapped = item.and_then(T::from_element);
        if mapped.is_err() {
            self.inner.done = true;
        }
        Some(mapped)
    }
}

/// Stream the typed elements of one kind from an XML source
///
/// # Examples
///
/// ```
/// use xlsxstream::xml::{typed_elements, elements::MergeRangeElement};
///
/// let xml = r#"<worksheet><mergeCells><mergeCell ref="A1:B2"/></mergeCells></worksheet>"#;
/// let merges: Vec<MergeRangeElement> = typed_elements(xml.as_bytes())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(merges[0].reference, "A1:B2");
/// ```
pub fn typed_elements<T: FromElement, R: BufRead>(source: R) -> TypedStream<T, R> {
    TypedStream::new(source)
}
