/*!
Lenient tag repair in front of the structural tokenizer.

The extraction tool that writes index files truncates its output when the dumped
process was itself corrupted, which leaves tags unterminated. [`TagRepairStream`]
watches the byte stream, keeps a stack of open tag names and inserts the missing
closing text inline so the tokenizer only ever sees balanced tags:

* a start tag with the same name as the innermost open tag means the previous
  one was never closed, so `</name>` is inserted in front of it;
* a close tag for an element further down the stack closes every element above it;
* a close tag for an element that is not open at all becomes an empty element;
* at the end of the input every element that is still open is closed.

Well-formed input passes through byte for byte.
*/

mod buffer;

use buffer::LookaheadBuffer;

use std::collections::VecDeque;
use std::io::{self, Read};

use log::{debug, warn};
use smallvec::SmallVec;

use crate::types::size;

pub(crate) type TagName = SmallVec<[u8; 32]>;

/// Default upper bound for tag name lookahead.
pub const DEFAULT_PEEK_LIMIT: usize = 256;

/// Default initial capacity of the read buffer.
pub const DEFAULT_BUFFER_SIZE: usize = size::kb(8);

/// Position of the repair automaton relative to the markup it is passing through.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RepairState {
    /// Character data between tags.
    Contents,
    /// After `<`, reading the element name.
    StartTag,
    /// After `</`, reading the element name.
    CloseTag,
    /// Inside a start tag, after the element name.
    Attributes,
    /// Inside a quoted attribute value.
    AttributeValue,
    /// Emitting synthesized close tags in front of a close tag.
    InsertMissingClose,
    /// Emitting a synthesized close tag in front of a repeated start tag.
    InsertMissingCloseAtRoot,
    /// Inside a comment, processing instruction, doctype or CDATA section.
    Markup,
}

/// Progress through the current attribute of a start tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AttributePart {
    Between,
    Name,
    Equals,
}

/// Counters of the repairs applied to a stream.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct RepairStats {
    /// Start tags that repeated the innermost open tag.
    pub duplicate_opens: usize,
    /// Close tags inserted for elements skipped by a close tag.
    pub missing_closes: usize,
    /// Close tags that did not match any open element.
    pub stray_closes: usize,
    /// Close tags inserted at the end of a truncated stream.
    pub truncated_closes: usize,
    /// Real close tags whose name differed from the element they closed.
    pub integrity_mismatches: usize,
}

impl RepairStats {
    /// Total number of modifications made to the stream.
    pub fn repairs(&self) -> usize {
        self.duplicate_opens + self.missing_closes + self.stray_closes + self.truncated_closes
    }
}

/// A byte stream filter that repairs unterminated tags.
///
/// # Examples
///
/// ```
/// use dumpflow::repair::TagRepairStream;
/// use std::io::Read;
///
/// let mut repaired = String::new();
/// TagRepairStream::new(&b"<a><b><b></a>"[..])
///     .read_to_string(&mut repaired)
///     .unwrap();
/// assert_eq!(repaired, "<a><b></b><b></b></a>");
/// ```
pub struct TagRepairStream<R> {
    inner: R,
    buffer: LookaheadBuffer,
    peek_limit: usize,

    state: RepairState,
    open_tags: Vec<TagName>,
    name: TagName,
    quote: u8,
    attribute: AttributePart,
    markup_end: &'static [u8],
    markup_tail: [u8; 3],

    pending: VecDeque<u8>,
    exhausted: bool,
    stats: RepairStats,
}

impl<R: Read> TagRepairStream<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limits(inner, DEFAULT_PEEK_LIMIT, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a stream with an explicit lookahead bound and initial buffer capacity.
    pub fn with_limits(inner: R, peek_limit: usize, buffer_size: usize) -> Self {
        Self {
            inner,
            buffer: LookaheadBuffer::with_capacity(buffer_size),
            peek_limit: peek_limit.max(1),

            state: RepairState::Contents,
            open_tags: Vec::new(),
            name: TagName::new(),
            quote: b'"',
            attribute: AttributePart::Between,
            markup_end: b">",
            markup_tail: [0; 3],

            pending: VecDeque::new(),
            exhausted: false,
            stats: RepairStats::default(),
        }
    }

    pub fn state(&self) -> RepairState {
        self.state
    }

    pub fn stats(&self) -> RepairStats {
        self.stats
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.open_tags.len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Returns the next byte of the repaired stream, `None` at the end.
    ///
    /// Synthesized text is always drained before the end is reported.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            if let Some(b) = self.pending.pop_front() {
                return Ok(Some(b));
            }

            match self.state {
                RepairState::InsertMissingCloseAtRoot => self.state = RepairState::StartTag,
                RepairState::InsertMissingClose => self.state = RepairState::CloseTag,
                _ => {}
            }

            if self.exhausted {
                return Ok(None);
            }

            match self.buffer.next(&mut self.inner)? {
                Some(b) => return self.advance(b).map(Some),
                None => {
                    self.complete_truncated();
                    self.exhausted = true;
                }
            }
        }
    }

    /// Feeds one input byte through the automaton and returns the byte to emit in its place.
    fn advance(&mut self, b: u8) -> io::Result<u8> {
        match self.state {
            RepairState::Contents => {
                if b == b'<' {
                    self.enter_tag()?;
                }
            }
            RepairState::StartTag => {
                if self.name.is_empty() && b == b'/' {
                    return self.enter_close_tag(b);
                } else if is_name_end(b) {
                    self.open_tags.push(self.name.clone());
                    self.attribute = AttributePart::Between;
                    self.state = match b {
                        b'>' => RepairState::Contents,
                        b'/' => {
                            self.open_tags.pop();
                            RepairState::Attributes
                        }
                        _ => RepairState::Attributes,
                    };
                } else {
                    self.name.push(b);
                }
            }
            RepairState::CloseTag => {
                if b == b'>' {
                    self.close_current();
                    self.state = RepairState::Contents;
                } else if !b.is_ascii_whitespace() {
                    self.name.push(b);
                }
            }
            RepairState::Attributes => match b {
                b'"' | b'\'' => {
                    self.quote = b;
                    self.state = RepairState::AttributeValue;
                }
                b'/' => {
                    self.open_tags.pop();
                }
                b'>' => self.state = RepairState::Contents,
                b'=' => self.attribute = AttributePart::Equals,
                _ if b.is_ascii_whitespace() => {}
                _ => self.attribute = AttributePart::Name,
            },
            RepairState::AttributeValue => {
                if b == self.quote {
                    self.attribute = AttributePart::Between;
                    self.state = RepairState::Attributes;
                }
            }
            RepairState::Markup => {
                self.markup_tail = [self.markup_tail[1], self.markup_tail[2], b];
                if self.markup_tail.ends_with(self.markup_end) {
                    self.state = RepairState::Contents;
                }
            }
            RepairState::InsertMissingClose | RepairState::InsertMissingCloseAtRoot => {
                // next_byte() leaves these states before consuming input
                debug_assert!(false, "input consumed while repair text was pending");
            }
        }
        Ok(b)
    }

    /// Handles a `<` in character data.
    fn enter_tag(&mut self) -> io::Result<()> {
        self.name.clear();

        match self.buffer.peek(&mut self.inner, 0)? {
            Some(b'?') => {
                self.enter_markup(b"?>");
                return Ok(());
            }
            Some(b'!') => {
                let end: &'static [u8] = if self.peek_matches(b"!--")? {
                    b"-->"
                } else if self.peek_matches(b"![CDATA[")? {
                    b"]]>"
                } else {
                    b">"
                };
                self.enter_markup(end);
                return Ok(());
            }
            _ => {}
        }

        self.state = RepairState::StartTag;

        if self.buffer.peek(&mut self.inner, 0)? == Some(b'/') {
            return Ok(());
        }

        let top = match self.open_tags.last() {
            Some(top) => top.clone(),
            None => return Ok(()),
        };

        if self.peek_name()?.as_ref() == Some(&top) {
            debug!(
                "tag `{}` opened again before being closed, inserting close tag",
                String::from_utf8_lossy(&top)
            );
            self.open_tags.pop();
            self.pending.push_back(b'/');
            self.pending.extend(top.iter().copied());
            self.pending.extend(b"><".iter().copied());
            self.state = RepairState::InsertMissingCloseAtRoot;
            self.stats.duplicate_opens += 1;
        }

        Ok(())
    }

    /// Handles the `/` of `</` and returns the byte to emit for it.
    fn enter_close_tag(&mut self, b: u8) -> io::Result<u8> {
        self.name.clear();
        self.state = RepairState::CloseTag;

        let upcoming = match self.peek_name()? {
            Some(upcoming) => upcoming,
            None => return Ok(b),
        };

        match self.open_tags.iter().rposition(|tag| *tag == upcoming) {
            Some(idx) if idx + 1 == self.open_tags.len() => Ok(b),
            Some(idx) => {
                while self.open_tags.len() > idx + 1 {
                    if let Some(popped) = self.open_tags.pop() {
                        debug!(
                            "close tag `{}` skips open tag `{}`, inserting close tag",
                            String::from_utf8_lossy(&upcoming),
                            String::from_utf8_lossy(&popped)
                        );
                        self.pending.extend(popped.iter().copied());
                        self.pending.extend(b"></".iter().copied());
                        self.stats.missing_closes += 1;
                    }
                }
                self.state = RepairState::InsertMissingClose;
                Ok(b)
            }
            None => {
                // `</name>` becomes `<name></name>`, the leading `<` is already out
                debug!(
                    "close tag `{}` without open tag, inserting empty element",
                    String::from_utf8_lossy(&upcoming)
                );
                self.open_tags.push(upcoming.clone());
                self.pending.extend(upcoming.iter().skip(1).copied());
                self.pending.extend(b"></".iter().copied());
                self.state = RepairState::InsertMissingClose;
                self.stats.stray_closes += 1;
                Ok(upcoming[0])
            }
        }
    }

    fn enter_markup(&mut self, end: &'static [u8]) {
        self.markup_end = end;
        self.markup_tail = [0; 3];
        self.state = RepairState::Markup;
    }

    /// Pops the element closed by the close tag that just ended.
    ///
    /// A differing name does not change the output, it is only reported.
    fn close_current(&mut self) {
        match self.open_tags.pop() {
            Some(expected) if expected == self.name => {}
            Some(expected) => {
                self.stats.integrity_mismatches += 1;
                warn!(
                    "close tag `{}` closes open tag `{}`",
                    String::from_utf8_lossy(&self.name),
                    String::from_utf8_lossy(&expected)
                );
            }
            None => {
                self.stats.integrity_mismatches += 1;
                warn!(
                    "close tag `{}` without any open tag",
                    String::from_utf8_lossy(&self.name)
                );
            }
        }
    }

    /// Queues the text that terminates a stream which ended inside markup.
    ///
    /// Whatever the cut point, the markup is completed first and every element still
    /// open is closed afterwards.
    fn complete_truncated(&mut self) {
        match self.state {
            RepairState::AttributeValue => {
                self.pending.push_back(self.quote);
                self.pending.push_back(b'>');
            }
            RepairState::Attributes => {
                match self.attribute {
                    AttributePart::Name => self.pending.extend(b"=\"\"".iter().copied()),
                    AttributePart::Equals => self.pending.extend(b"\"\"".iter().copied()),
                    AttributePart::Between => {}
                }
                self.pending.push_back(b'>');
            }
            RepairState::StartTag if self.name.is_empty() => {
                // a lone `<` is already out, turn it into an empty comment
                self.pending.extend(b"!---->".iter().copied());
            }
            RepairState::StartTag => {
                self.open_tags.push(self.name.clone());
                self.pending.push_back(b'>');
            }
            RepairState::Markup => {
                let completion: &[u8] = if self.markup_end == b"?>" {
                    b" ?>"
                } else if self.markup_end == b">" && self.markup_tail == [0, 0, b'!'] {
                    b"---->"
                } else {
                    self.markup_end
                };
                debug!(
                    "index ends inside markup, inserting `{}`",
                    String::from_utf8_lossy(completion)
                );
                self.pending.extend(completion.iter().copied());
            }
            RepairState::CloseTag => {
                if self.name.is_empty() {
                    if let Some(top) = self.open_tags.last() {
                        self.name = top.clone();
                        self.pending.extend(top.iter().copied());
                    }
                }
                self.pending.push_back(b'>');
                self.close_current();
            }
            RepairState::Contents
            | RepairState::InsertMissingClose
            | RepairState::InsertMissingCloseAtRoot => {}
        }

        while let Some(tag) = self.open_tags.pop() {
            debug!(
                "index ends with tag `{}` still open, inserting close tag",
                String::from_utf8_lossy(&tag)
            );
            self.pending.extend(b"</".iter().copied());
            self.pending.extend(tag.iter().copied());
            self.pending.push_back(b'>');
            self.stats.truncated_closes += 1;
        }

        self.state = RepairState::Contents;
    }

    /// Reads the tag name right after the cursor without consuming it.
    ///
    /// Returns `None` if the name is empty or not terminated within the peek limit.
    fn peek_name(&mut self) -> io::Result<Option<TagName>> {
        let mut name = TagName::new();
        for offset in 0..self.peek_limit {
            match self.buffer.peek(&mut self.inner, offset)? {
                Some(b) if is_name_end(b) => {
                    return Ok(if name.is_empty() { None } else { Some(name) });
                }
                Some(b) => name.push(b),
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    fn peek_matches(&mut self, expected: &[u8]) -> io::Result<bool> {
        for (offset, b) in expected.iter().enumerate() {
            if self.buffer.peek(&mut self.inner, offset)? != Some(*b) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<R: Read> Read for TagRepairStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read = 0;
        while read < buf.len() {
            match self.next_byte()? {
                Some(b) => {
                    buf[read] = b;
                    read += 1;
                }
                None => break,
            }
        }
        Ok(read)
    }
}

#[inline]
fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repair(input: &str) -> (String, RepairStats) {
        repair_with(input, DEFAULT_PEEK_LIMIT, DEFAULT_BUFFER_SIZE)
    }

    fn repair_with(input: &str, peek_limit: usize, buffer_size: usize) -> (String, RepairStats) {
        let mut stream = TagRepairStream::with_limits(input.as_bytes(), peek_limit, buffer_size);
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        (out, stream.stats())
    }

    const WELL_FORMED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- extracted by jextract -->
<j9dump endian="little" size="64" osName="Linux">
  <gpf failingThread="0x7f3a2c001000">J9Generic_Signal_Number=00000004 Signal_Number=0000000B</gpf>
  <javavm id="0x7f3a2c00a010">
    <class id="0x100" name="java/lang/Object" source="a/b>c.java" loader="0x200"/>
    <class id="0x110" name="java/lang/String" super="0x100" loader='0x200'>
      <field name="value" sig="[C" modifiers="0x12" offset="0x8" />
      <static name="serialVersionUID" sig="J" value="-6849794470754667710"/>
    </class>
    <heap id="0x1" name="Default"><region start="0x1000" end="0x2000"></region></heap>
    <error><![CDATA[class <x> unreadable]]></error>
  </javavm>
</j9dump>
"#;

    #[test]
    fn well_formed_passes_unchanged() {
        let (out, stats) = repair(WELL_FORMED);
        assert_eq!(out, WELL_FORMED);
        assert_eq!(stats, RepairStats::default());
    }

    #[test]
    fn well_formed_passes_unchanged_with_tiny_buffer() {
        let (out, stats) = repair_with(WELL_FORMED, DEFAULT_PEEK_LIMIT, 1);
        assert_eq!(out, WELL_FORMED);
        assert_eq!(stats.repairs(), 0);
    }

    #[test]
    fn repeated_open_gets_one_close() {
        let (out, stats) = repair(r#"<r><a id="1"><a id="2"></a></r>"#);
        assert_eq!(out, r#"<r><a id="1"></a><a id="2"></a></r>"#);
        assert_eq!(stats.duplicate_opens, 1);
        assert_eq!(stats.repairs(), 1);
    }

    #[test]
    fn repeated_open_with_children() {
        let (out, _) = repair("<r><thread id=\"1\"><stack/><thread id=\"2\"><stack/></thread></r>");
        assert_eq!(
            out,
            "<r><thread id=\"1\"><stack/></thread><thread id=\"2\"><stack/></thread></r>"
        );
    }

    #[test]
    fn close_backfills_skipped_elements() {
        let (out, stats) = repair("<a><b><c></a>");
        assert_eq!(out, "<a><b><c></c></b></a>");
        assert_eq!(stats.missing_closes, 2);
        assert_eq!(stats.integrity_mismatches, 0);
    }

    #[test]
    fn stray_close_becomes_empty_element() {
        let (out, stats) = repair("<a><b></c></b></a>");
        assert_eq!(out, "<a><b><c></c></b></a>");
        assert_eq!(stats.stray_closes, 1);
        assert_eq!(stats.integrity_mismatches, 0);
    }

    #[test]
    fn truncated_attribute_value() {
        let (out, stats) = repair("<a><b x=\"1");
        assert_eq!(out, "<a><b x=\"1\"></b></a>");
        assert_eq!(stats.truncated_closes, 2);
    }

    #[test]
    fn truncated_contents_and_tags() {
        assert_eq!(repair("<a><b>text").0, "<a><b>text</b></a>");
        assert_eq!(repair("<a><b").0, "<a><b></b></a>");
        assert_eq!(repair("<a><b/").0, "<a><b/></a>");
        assert_eq!(repair("<a><b></b").0, "<a><b></b></a>");
        assert_eq!(repair("<a><b></").0, "<a><b></b></a>");
    }

    #[test]
    fn truncated_after_lt() {
        let (out, stats) = repair("<a><b>text<");
        assert_eq!(out, "<a><b>text<!----></b></a>");
        assert_eq!(stats.truncated_closes, 2);
    }

    #[test]
    fn truncated_dangling_attribute() {
        assert_eq!(repair("<a><b x").0, "<a><b x=\"\"></b></a>");
        assert_eq!(repair("<a><b x=").0, "<a><b x=\"\"></b></a>");
        assert_eq!(repair("<a><b x = ").0, "<a><b x = \"\"></b></a>");
        assert_eq!(repair("<a><b x=\"1\" ").0, "<a><b x=\"1\" ></b></a>");
    }

    #[test]
    fn truncated_markup() {
        assert_eq!(repair("<a><!-- note").0, "<a><!-- note--></a>");
        assert_eq!(repair("<a><?pi data").0, "<a><?pi data ?></a>");
        assert_eq!(repair("<a><![CDATA[x").0, "<a><![CDATA[x]]></a>");
        assert_eq!(repair("<a><!").0, "<a><!----></a>");

        let (_, stats) = repair("<a><b><!-- note");
        assert_eq!(stats.truncated_closes, 2);
    }

    #[test]
    fn self_closing_tags_do_not_stay_open() {
        let (out, stats) = repair("<a><b/><b x=\"/\" /><b></b></a>");
        assert_eq!(out, "<a><b/><b x=\"/\" /><b></b></a>");
        assert_eq!(stats.repairs(), 0);
    }

    #[test]
    fn repairs_across_buffer_refills() {
        let input = "<javavm><class id=\"1\"><class id=\"2\"></class></javavm>";
        for size in 1..8 {
            let (out, stats) = repair_with(input, DEFAULT_PEEK_LIMIT, size);
            assert_eq!(
                out,
                "<javavm><class id=\"1\"></class><class id=\"2\"></class></javavm>"
            );
            assert_eq!(stats.duplicate_opens, 1);
        }
    }

    #[test]
    fn lookahead_is_bounded() {
        // the close tag name is longer than the lookahead, so it is not repaired
        let (out, stats) = repair_with("<r><a></longname></r>", 4, 16);
        assert_eq!(out, "<r><a></longname></r>");
        assert_eq!(stats.repairs(), 0);
        assert_eq!(stats.integrity_mismatches, 1);
    }

    #[test]
    fn repair_text_drained_before_end() {
        let mut stream = TagRepairStream::new(&b"<a><b></a>"[..]);
        let mut out = Vec::new();
        while let Some(b) = stream.next_byte().unwrap() {
            out.push(b);
        }
        assert_eq!(out, b"<a><b></b></a>");
        assert_eq!(stream.state(), RepairState::Contents);
        assert_eq!(stream.depth(), 0);
        assert_eq!(stream.next_byte().unwrap(), None);
    }

    #[test]
    fn state_tracks_markup() {
        let mut stream = TagRepairStream::new(&b"<a x=\"1\"/>"[..]);
        let mut states = Vec::new();
        while stream.next_byte().unwrap().is_some() {
            states.push(stream.state());
        }
        assert_eq!(
            states,
            vec![
                RepairState::StartTag,
                RepairState::StartTag,
                RepairState::Attributes,
                RepairState::Attributes,
                RepairState::Attributes,
                RepairState::AttributeValue,
                RepairState::AttributeValue,
                RepairState::Attributes,
                RepairState::Attributes,
                RepairState::Contents,
            ]
        );
    }
}
