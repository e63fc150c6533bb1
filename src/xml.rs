
//! Streaming xml events and a small indenting xml writer.
//! Readers dispatch on start, text and end events instead of walking a document tree.

use std::borrow::Cow;
use quick_xml::events::Event;
use quick_xml::Reader;
use crate::error::{Error, Result, UnitResult};
use crate::meta::header::FileHeader;


/// The event kinds the data file readers react to.
/// Empty elements produce a start and an end event, cdata sections are text.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    Start { name: String, attributes: Vec<(String, String)> },
    Text(String),
    End(String),
}

/// Pulls events from an in-memory xml document and tracks the open elements.
pub struct XmlEvents<'b> {
    reader: Reader<&'b [u8]>,
    open_elements: Vec<String>,
    pending_end: Option<String>,
}

impl<'b> XmlEvents<'b> {

    pub fn new(bytes: &'b [u8]) -> Self {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        XmlEvents { reader, open_elements: Vec::new(), pending_end: None }
    }

    /// The next event, or `None` at the end of the document.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(name) = self.pending_end.take() {
            self.open_elements.pop();
            return Ok(Some(XmlEvent::End(name)));
        }

        loop {
            let event = match self.reader.read_event()? {
                Event::Start(start) => {
                    let (name, attributes) = start_element(&start)?;
                    self.open_elements.push(name.clone());
                    XmlEvent::Start { name, attributes }
                },

                Event::Empty(start) => {
                    let (name, attributes) = start_element(&start)?;
                    self.open_elements.push(name.clone());
                    self.pending_end = Some(name.clone());
                    XmlEvent::Start { name, attributes }
                },

                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    self.open_elements.pop();
                    XmlEvent::End(name)
                },

                Event::Text(text) => XmlEvent::Text(text.unescape()?.into_owned()),
                Event::CData(data) => XmlEvent::Text(String::from_utf8_lossy(&data.into_inner()).into_owned()),
                Event::Eof => return Ok(None),
                _ => continue,
            };

            return Ok(Some(event));
        }
    }

    /// The names of the currently open elements, outermost first.
    pub fn open_elements(&self) -> &[String] { &self.open_elements }

    /// The element that contains the current element.
    pub fn parent(&self) -> Option<&str> {
        let count = self.open_elements.len();
        if count < 2 { None } else { Some(self.open_elements[count - 2].as_str()) }
    }

    /// Consume events up to the end of the current element
    /// and return all text directly or indirectly inside it.
    /// Call this right after the start event of a leaf element.
    pub fn read_element_text(&mut self) -> Result<String> {
        let depth = self.open_elements.len();
        let mut text = String::new();

        loop {
            match self.next_event()? {
                None => return Err(Error::invalid("xml element is not closed")),
                Some(XmlEvent::Text(part)) => text.push_str(&part),
                Some(XmlEvent::End(_)) if self.open_elements.len() < depth => return Ok(text),
                Some(_) => {},
            }
        }
    }

    /// Consume events up to the end of the current element.
    pub fn skip_element(&mut self) -> UnitResult {
        self.read_element_text().map(|_| ())
    }

    /// Find the first start event of the document, which must be the root element.
    pub fn read_root(&mut self, expected: &str) -> UnitResult {
        loop {
            match self.next_event()? {
                Some(XmlEvent::Start { name, .. }) => {
                    return if name == expected { Ok(()) }
                    else { Err(Error::invalid(format!("xml root element is {}, expected {}", name, expected))) };
                },

                Some(_) => continue,
                None => return Err(Error::invalid("xml document has no root element")),
            }
        }
    }
}

fn start_element(start: &quick_xml::events::BytesStart<'_>) -> Result<(String, Vec<(String, String)>)> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        attributes.push((key, attribute.unescape_value()?.into_owned()));
    }

    Ok((name, attributes))
}

/// The value of an attribute of a start event.
pub fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}


/// Writes an indented xml document into a string.
#[derive(Debug, Default)]
pub struct XmlWriter {
    output: String,
    open_elements: Vec<String>,
}

const INDENTATION: usize = 3;

impl XmlWriter {

    /// Start a document with the xml declaration.
    pub fn new() -> Self {
        let mut writer = XmlWriter::default();
        writer.output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        writer
    }

    fn indent(&mut self) {
        let width = self.open_elements.len() * INDENTATION;
        self.output.extend(std::iter::repeat(' ').take(width));
    }

    fn push_start_tag(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.output.push('<');
        self.output.push_str(name);

        for (key, value) in attributes {
            self.output.push(' ');
            self.output.push_str(key);
            self.output.push_str("=\"");
            self.output.push_str(&escape(value));
            self.output.push('"');
        }

        self.output.push('>');
    }

    /// Open an element that will contain other elements.
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.indent();
        self.push_start_tag(name, attributes);
        self.output.push('\n');
        self.open_elements.push(name.to_string());
    }

    /// Close the innermost open element.
    pub fn end(&mut self) {
        if let Some(name) = self.open_elements.pop() {
            self.indent();
            self.output.push_str("</");
            self.output.push_str(&name);
            self.output.push_str(">\n");
        }
    }

    /// An element containing only escaped text.
    pub fn text_element(&mut self, name: &str, text: &str) {
        self.text_element_with(name, &[], text);
    }

    pub fn text_element_with(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) {
        self.indent();
        self.push_start_tag(name, attributes);
        self.output.push_str(&escape(text));
        self.output.push_str("</");
        self.output.push_str(name);
        self.output.push_str(">\n");
    }

    /// An element containing text in a cdata section, for free text such as comments.
    pub fn cdata_element(&mut self, name: &str, text: &str) {
        self.indent();
        self.push_start_tag(name, &[]);

        // a cdata section cannot contain its own terminator
        self.output.push_str("<![CDATA[");
        self.output.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
        self.output.push_str("]]>");

        self.output.push_str("</");
        self.output.push_str(name);
        self.output.push_str(">\n");
    }

    /// Close all open elements and return the document.
    pub fn finish(mut self) -> String {
        while !self.open_elements.is_empty() {
            self.end();
        }

        self.output
    }
}

fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}


pub const FILE_HEADER: &str = "FileHeader";
const ELEMENT: &str = "Element";
const NAME: &str = "Name";
const VALUE: &str = "Value";

/// Write the header tags as `Element` entries with a `Name` and a `Value`.
pub fn write_file_header(writer: &mut XmlWriter, header: &FileHeader) {
    writer.start(FILE_HEADER, &[]);

    for (name, value) in header.tags() {
        writer.start(ELEMENT, &[]);
        writer.text_element(NAME, name);
        writer.cdata_element(VALUE, value);
        writer.end();
    }

    writer.end();
}

/// Read header tags. Call this right after the start event of the `FileHeader` element.
pub fn read_file_header(events: &mut XmlEvents<'_>, header: &mut FileHeader) -> UnitResult {
    let depth = events.open_elements().len();
    let mut name = String::new();
    let mut value = String::new();

    loop {
        match events.next_event()? {
            None => return Err(Error::invalid("file header element is not closed")),

            Some(XmlEvent::Start { name: element, .. }) => match element.as_str() {
                ELEMENT => { name.clear(); value.clear(); },
                NAME => name = events.read_element_text()?,
                VALUE => value = events.read_element_text()?,
                _ => events.skip_element()?,
            },

            Some(XmlEvent::End(element)) => {
                if events.open_elements().len() < depth { return Ok(()); }
                if element == ELEMENT && !name.is_empty() {
                    header.set_tag(name.trim(), value.trim());
                }
            },

            Some(XmlEvent::Text(_)) => {},
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_elements_produce_start_and_end(){
        let mut events = XmlEvents::new(b"<Root><Leaf a=\"1\"/><Other>x &amp; y</Other></Root>");
        events.read_root("Root").unwrap();

        assert_eq!(events.next_event().unwrap(), Some(XmlEvent::Start {
            name: "Leaf".into(), attributes: vec![("a".into(), "1".into())]
        }));

        assert_eq!(events.parent(), Some("Root"));
        assert_eq!(events.next_event().unwrap(), Some(XmlEvent::End("Leaf".into())));

        assert!(matches!(events.next_event().unwrap(), Some(XmlEvent::Start { .. })));
        assert_eq!(events.read_element_text().unwrap(), "x & y");
        assert_eq!(events.next_event().unwrap(), Some(XmlEvent::End("Root".into())));
        assert_eq!(events.next_event().unwrap(), None);
    }

    #[test]
    fn wrong_root(){
        assert!(XmlEvents::new(b"<A/>").read_root("B").is_err());
    }

    #[test]
    fn header_round_trip(){
        let mut header = FileHeader::new("Cell File", ".cell", "CellFile");
        header.set_comment("a <b> ]]> c");
        header.set_tag("space", "711-2C");

        let mut writer = XmlWriter::new();
        writer.start("CellFile", &[]);
        write_file_header(&mut writer, &header);
        let document = writer.finish();

        let mut events = XmlEvents::new(document.as_bytes());
        events.read_root("CellFile").unwrap();
        assert!(matches!(events.next_event().unwrap(), Some(XmlEvent::Start { name, .. }) if name == FILE_HEADER));

        let mut read = FileHeader::new("Cell File", ".cell", "CellFile");
        read_file_header(&mut events, &mut read).unwrap();
        assert_eq!(read.comment(), "a <b> ]]> c");
        assert_eq!(read.tag("SPACE"), Some("711-2C"));
    }
}
