/*!
Pull tokenizer over the repaired index stream.

Events are produced one at a time from buffered reads, so a malformed tail only
stops the run at the point where it is found. Element names and attribute values
are decoded as UTF-8 with invalid sequences replaced.
*/

use std::borrow::Cow;
use std::io::BufRead;

use log::warn;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};

/// A structural event of the index document.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum XmlEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    End,
    Text(String),
}

pub(crate) struct XmlEvents<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    seen_root: bool,
    replaced_utf8: bool,
}

impl<R: BufRead> XmlEvents<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.expand_empty_elements(true);
        reader.check_end_names(true);

        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            seen_root: false,
            replaced_utf8: false,
        }
    }

    /// Returns the next event, `None` once the document is exhausted.
    ///
    /// Declarations, comments, processing instructions and doctypes are skipped.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(quick_xml::Error::Io(err)) => {
                    return Err(Error(ErrorOrigin::TagRepair, ErrorKind::UnableToReadFile)
                        .log_error(err))
                }
                Err(err) => return Err(malformed(self.reader.buffer_position(), err)),
            };

            match event {
                Event::Start(start) => {
                    let position = self.reader.buffer_position();
                    let event = start_event(&start, &mut self.replaced_utf8)
                        .map_err(|err| err.log_error(format!("at byte {}", position)))?;
                    self.depth += 1;
                    self.seen_root = true;
                    return Ok(Some(event));
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(Some(XmlEvent::End));
                }
                Event::Text(text) => {
                    let raw = decode(&text, &mut self.replaced_utf8);
                    let text = unescape(&raw)
                        .map_err(|err| malformed(self.reader.buffer_position(), err))?
                        .into_owned();
                    if self.depth == 0 {
                        outside_root(self.reader.buffer_position(), &text)?;
                        continue;
                    }
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::CData(data) => {
                    let text = decode(&data, &mut self.replaced_utf8).into_owned();
                    if self.depth == 0 {
                        outside_root(self.reader.buffer_position(), &text)?;
                        continue;
                    }
                    return Ok(Some(XmlEvent::Text(text)));
                }
                Event::Eof if !self.seen_root => {
                    return Err(Error(ErrorOrigin::Tokenizer, ErrorKind::MalformedDocument)
                        .log_error("the index has no root element"));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

/// Whitespace may surround the root element, anything else may not.
fn outside_root(position: usize, text: &str) -> Result<()> {
    if text.trim_start_matches('\u{feff}').trim().is_empty() {
        Ok(())
    } else {
        Err(malformed(position, "character data outside of the root element"))
    }
}

fn start_event(start: &BytesStart, replaced_utf8: &mut bool) -> Result<XmlEvent> {
    let name = decode(start.name().as_ref(), replaced_utf8).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| {
            Error(ErrorOrigin::Tokenizer, ErrorKind::MalformedDocument)
                .log_debug(format!("attribute of `{}`: {}", name, err))
        })?;
        let key = decode(attr.key.as_ref(), replaced_utf8).into_owned();
        let raw = decode(&attr.value, replaced_utf8);
        let value = unescape(&raw)
            .map_err(|err| {
                Error(ErrorOrigin::Tokenizer, ErrorKind::MalformedDocument)
                    .log_debug(format!("`{}` on `{}`: {}", key, name, err))
            })?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlEvent::Start { name, attributes })
}

fn decode<'a>(bytes: &'a [u8], replaced_utf8: &mut bool) -> Cow<'a, str> {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        if !*replaced_utf8 {
            warn!("index is not valid utf-8, replacing invalid sequences");
            *replaced_utf8 = true;
        }
    }
    text
}

fn malformed<E: std::fmt::Display>(position: usize, err: E) -> Error {
    Error(ErrorOrigin::Tokenizer, ErrorKind::MalformedDocument)
        .log_error(format!("at byte {}: {}", position, err))
}
