//! Small helpers over quick-xml reader/writer events.
//!
//! All parsing in this crate is expressed in terms of these primitives so
//! unknown sibling elements anywhere in a response are skipped rather than
//! treated as errors.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{AutodiscoverError, AutodiscoverResult};

/// Reads the text content of the element whose start tag was just consumed,
/// up to the matching end tag. Nested elements are skipped.
pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end: &[u8]) -> AutodiscoverResult<String> {
    let mut buf = Vec::new();
    let mut out = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => out.push_str(&t.unescape()?),
            Event::Start(_) => skip_element(reader)?,
            Event::End(e) if e.local_name().as_ref() == end => return Ok(out),
            Event::Eof => return Err(truncated()),
            _ => {}
        }
        buf.clear();
    }
}

/// Consumes events up to and including the end tag matching the start tag
/// that was just consumed.
pub(crate) fn skip_element(reader: &mut Reader<&[u8]>) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    let mut depth = 1usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => return Err(truncated()),
            _ => {}
        }
        buf.clear();
    }
}

/// Returns the value of the `type` attribute (`i:type`/`xsi:type`), if any.
pub(crate) fn type_attr(e: &BytesStart) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"type" {
            return Some(String::from_utf8_lossy(&attr.value).to_string());
        }
    }
    None
}

pub(crate) fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

pub(crate) fn truncated() -> AutodiscoverError {
    AutodiscoverError::ProtocolViolation("unexpected end of document".to_string())
}
