//-
// Copyright (c) 2016, Jason Lingle
//
// This file is part of PGPWrap.
//
// PGPWrap is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// PGPWrap is distributed  in the hope that  it will be useful,  but WITHOUT
// ANY WARRANTY; without even the implied  warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// PGPWrap. If not, see <http://www.gnu.org/licenses/>.

//! In-memory representation of MIME messages.
//!
//! The whole message is parsed up front into a tree of `MimeEntity` values.
//! This is not a full MIME implementation; it understands just enough
//! structure (headers, Content-Type, multipart nesting) to rearrange messages
//! into PGP/MIME form. Bodies are kept as opaque bytes and never decoded.
//!
//! Entities are immutable once built. Anything derived from an existing
//! entity is assembled with an `EntityBuilder`, usually obtained through
//! `MimeEntity::to_builder()`.
//!
//! Both UNIX and DOS line-endings are accepted. Line endings are normalised
//! to LF when parsing, and everything is serialised with LF;
//! `canonicalize_line_endings()` converts to the CRLF form needed for
//! signing.
//!
//! Relevant standards:
//!   [RFC  822]        Basic definition of MIME format
//!   [RFC 2045]        Defines the Content-* headers
//!   [RFC 2046]        Defines Multipart syntax

use std::cmp::max;
use std::fmt;
use std::io::{self,Write};
use std::iter::Peekable;
use std::slice;

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error,Result};

/// Maximum depth of multipart nesting before we simply keep the whole
/// multipart as an opaque body instead of recursing.
const MAX_DEPTH : u32 = 256;

// Header constants
pub const CONTENT_DESCRIPTION : &'static str = "Content-Description";
pub const CONTENT_DISPOSITION : &'static str = "Content-Disposition";
pub const CONTENT_TRANSFER_ENCODING : &'static str =
    "Content-Transfer-Encoding";
pub const CONTENT_TYPE : &'static str = "Content-Type";
pub const MIME_VERSION : &'static str = "MIME-Version";
pub const SUBJECT : &'static str = "Subject";

/// What [RFC 2045] says to assume when there is no Content-Type at all.
pub const DEFAULT_CONTENT_TYPE : &'static str = "text/plain";

pub const APPLICATION : &'static str = "application";
pub const MULTIPART : &'static str = "multipart";
pub const TEXT : &'static str = "text";

const BOUNDARY : &'static str = "boundary";
const MBOX_FROM : &'static [u8] = b"From ";

/// Returns whether the given character is a "linear whitespace" character
/// according to RFC 822.
fn is_lwsp(ch: u8) -> bool {
    b' ' == ch || b'\t' == ch
}

/// Attempts to interpret `text` as a MIME header, splitting it into its name
/// and value parts.
///
/// Leading whitespace in the value is not removed. While the header name is
/// constrained to printable ASCII, this function permits arbitrary binary
/// data in the value.
pub fn split_header(text: &[u8]) -> Option<(&str,&[u8])> {
    // [RFC 822, section 3.1.2]
    //
    // > The  field-name must be composed of printable ASCII characters
    // > (i.e., characters that  have  values  between  33.  and  126.,
    // > decimal, except colon).
    let colon = text.iter().position(|&ch| b':' == ch || ch < 33 || ch > 126)?;
    if 0 == colon || b':' != text[colon] {
        return None;
    }

    std::str::from_utf8(&text[..colon]).ok().map(
        |name| (name, &text[colon + 1 ..]))
}

fn header_text(data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec()).map_err(
        |_| Error::Malformed("header is not valid UTF-8".to_owned()))
}

/// A single header field.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Header {
    /// The field name, as spelt in the message.
    pub name: String,
    /// The field body without leading whitespace. Folded headers keep their
    /// interior line breaks.
    pub value: String,
}

impl Header {
    /// Returns whether this header is named `name`, ignoring case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// An ordered list of headers.
///
/// Lookup is case-insensitive. Duplicate names are permitted and keep their
/// relative order.
#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub struct Headers {
    headers: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    /// Returns the value of the first header named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|h| h.is(name))
            .map(|h| &h.value[..])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.is(name))
    }

    /// Appends a header after all existing ones.
    pub fn append<N : Into<String>, V : Into<String>>(&mut self, name: N,
                                                     value: V) {
        self.headers.push(Header { name: name.into(), value: value.into() });
    }

    /// Removes every header named `name`, returning the value of the first
    /// one removed.
    pub fn take(&mut self, name: &str) -> Option<String> {
        let mut taken = None;
        let mut kept = Vec::with_capacity(self.headers.len());
        for header in self.headers.drain(..) {
            if !header.is(name) {
                kept.push(header);
            } else if taken.is_none() {
                taken = Some(header.value);
            }
        }
        self.headers = kept;
        taken
    }

    pub fn iter(&self) -> slice::Iter<'_, Header> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The body of a `MimeEntity`.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Payload {
    /// Raw content, not decoded in any way.
    Body(Vec<u8>),
    /// Nested body parts.
    Multipart(Multipart),
}

/// The body of a multipart entity, as per [RFC 2046] section 5.1.1.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Multipart {
    boundary: String,
    /// Text before the first delimiter, if there was any line there at all.
    preamble: Option<Vec<u8>>,
    parts: Vec<MimeEntity>,
    /// Text after the close delimiter, if the close delimiter was followed
    /// by a line ending.
    epilogue: Option<Vec<u8>>,
}

impl Multipart {
    #[cfg(test)]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[cfg(test)]
    pub fn parts(&self) -> &[MimeEntity] {
        &self.parts
    }

    #[cfg(test)]
    pub fn preamble(&self) -> Option<&[u8]> {
        self.preamble.as_ref().map(|p| &p[..])
    }

    fn write_to<W : Write>(&self, dst: &mut W) -> io::Result<()> {
        // The line ending before each delimiter belongs to the delimiter, not
        // to the preceding part.
        if let Some(ref preamble) = self.preamble {
            dst.write_all(preamble)?;
            dst.write_all(b"\n")?;
        }
        for part in &self.parts {
            write!(dst, "--{}\n", self.boundary)?;
            part.write_to(dst)?;
            dst.write_all(b"\n")?;
        }
        write!(dst, "--{}--", self.boundary)?;
        if let Some(ref epilogue) = self.epilogue {
            dst.write_all(b"\n")?;
            dst.write_all(epilogue)?;
        }
        Ok(())
    }
}

/// A structured email message or body part.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct MimeEntity {
    headers: Headers,
    payload: Payload,
}

impl MimeEntity {
    /// Parses a complete message.
    ///
    /// A leading UNIX mbox "From " line is discarded. The only hard failures
    /// are empty input and headers which are not UTF-8; anything else that
    /// cannot be understood is kept as opaque body text.
    pub fn parse(data: &[u8]) -> Result<MimeEntity> {
        if data.iter().all(|&ch| is_lwsp(ch) || b'\r' == ch || b'\n' == ch) {
            return Err(Error::Malformed("empty message".to_owned()));
        }

        let text = normalize_line_endings(data);
        let mut start = 0;
        if text.starts_with(MBOX_FROM) {
            debug!("discarding mbox envelope line");
            start = lines(&text).next().map_or(text.len(), |(_, _, next)| next);
        }

        parse_entity(&text[start..], 0)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns the raw body, or `None` if this is a parsed multipart.
    #[cfg(test)]
    pub fn body(&self) -> Option<&[u8]> {
        match self.payload {
            Payload::Body(ref body) => Some(body),
            Payload::Multipart(_) => None,
        }
    }

    /// Returns the child entities; empty for non-multipart entities.
    #[cfg(test)]
    pub fn parts(&self) -> &[MimeEntity] {
        match self.payload {
            Payload::Body(_) => &[],
            Payload::Multipart(ref mp) => mp.parts(),
        }
    }

    /// Extracts and parses the Content-Type header.
    pub fn content_type(&self) -> Option<ContentType> {
        self.headers.get(CONTENT_TYPE).and_then(
            |ct| parse_content_type(ct.as_bytes()))
    }

    /// Returns whether the Content-Type is exactly `toplevel/subtype`.
    pub fn has_mime_type(&self, toplevel: &str, subtype: &str) -> bool {
        self.content_type().map_or(
            false, |ct| ct.is_mime_type(toplevel, subtype))
    }

    /// Returns an editable copy of this entity.
    pub fn to_builder(&self) -> EntityBuilder {
        EntityBuilder {
            headers: self.headers.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Writes the wire form of this entity to `dst`.
    pub fn write_to<W : Write>(&self, dst: &mut W) -> io::Result<()> {
        for header in &self.headers {
            write!(dst, "{}: {}\n", header.name, header.value)?;
        }
        dst.write_all(b"\n")?;
        match self.payload {
            Payload::Body(ref body) => dst.write_all(body),
            Payload::Multipart(ref mp) => mp.write_to(dst),
        }
    }

    /// Returns the wire form of this entity.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dst = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut dst);
        dst
    }
}

/// Assembles a new `MimeEntity`.
#[derive(Clone,Debug)]
pub struct EntityBuilder {
    headers: Headers,
    payload: Payload,
}

impl Default for EntityBuilder {
    fn default() -> Self {
        EntityBuilder {
            headers: Headers::new(),
            payload: Payload::Body(Vec::new()),
        }
    }
}

impl EntityBuilder {
    pub fn new() -> Self {
        EntityBuilder::default()
    }

    pub fn header<N : Into<String>, V : Into<String>>(mut self, name: N,
                                                     value: V) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Removes every header named `name` from the entity being built,
    /// handing the first value to the caller.
    pub fn take_header(&mut self, name: &str) -> Option<String> {
        self.headers.take(name)
    }

    pub fn body<B : Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.payload = Payload::Body(body.into());
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Makes this a multipart entity holding `parts` in the given order.
    ///
    /// A fresh boundary is drawn from `sgen` and appended to `content_type`,
    /// which is then added as the Content-Type header.
    pub fn multipart<G : SeparatorGen + ?Sized>(
        mut self, content_type: ContentType, preamble: Option<&str>,
        parts: Vec<MimeEntity>, sgen: &mut G) -> Self
    {
        let boundary = sgen.gen();
        self.headers.append(
            CONTENT_TYPE,
            content_type.with_param(BOUNDARY, boundary.clone()).to_string());
        self.payload = Payload::Multipart(Multipart {
            boundary: boundary,
            preamble: preamble.map(|p| p.as_bytes().to_vec()),
            parts: parts,
            epilogue: Some(Vec::new()),
        });
        self
    }

    pub fn build(self) -> MimeEntity {
        MimeEntity {
            headers: self.headers,
            payload: self.payload,
        }
    }
}

/// Trait for generating multipart separators.
///
/// In practical use, this will always be `UuidSeparatorGen`, but the tests
/// provide their own deterministic implementation.
pub trait SeparatorGen {
    /// Generates a new, unique multipart separator. The separator must be safe
    /// to splice into a quoted-string without escaping, and must not exceeed
    /// 70 characters in length.
    fn gen(&mut self) -> String;
}

/// Separator generator based on random UUIDs.
#[derive(Clone,Copy,Debug)]
pub struct UuidSeparatorGen;
impl SeparatorGen for UuidSeparatorGen {
    fn gen(&mut self) -> String {
        format!("PGPWrap-{}", Uuid::new_v4())
    }
}

/// Converts all CRLF sequences to bare LF.
fn normalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(data.len());
    let mut it = data.iter().cloned().peekable();
    while let Some(ch) = it.next() {
        if b'\r' == ch && Some(&b'\n') == it.peek() {
            continue;
        }
        dst.push(ch);
    }
    dst
}

/// Converts every bare LF in `data` to CRLF, leaving existing CRLF alone.
///
/// Detached signatures are computed over this form ([RFC 3156] section 5).
pub fn canonicalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(data.len() + data.len() / 32);
    let mut prev = 0u8;
    for &ch in data {
        if b'\n' == ch && b'\r' != prev {
            dst.push(b'\r');
        }
        dst.push(ch);
        prev = ch;
    }
    dst
}

/// Iterates over the lines of LF-terminated text.
///
/// Each item is `(start, end, next)`: the line text is `start..end` and the
/// following line starts at `next`, which equals `end` only on a final line
/// with no line ending.
struct Lines<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, usize, usize);

    fn next(&mut self) -> Option<(usize, usize, usize)> {
        if self.pos >= self.text.len() {
            return None;
        }

        let start = self.pos;
        let end = self.text[start..].iter().position(|&ch| b'\n' == ch)
            .map_or(self.text.len(), |off| start + off);
        self.pos = if end < self.text.len() { end + 1 } else { end };
        Some((start, end, self.pos))
    }
}

fn lines(text: &[u8]) -> Lines<'_> {
    Lines { text: text, pos: 0 }
}

fn parse_entity(text: &[u8], depth: u32) -> Result<MimeEntity> {
    let mut headers = Headers::new();
    // If the header block never ends, there is no body.
    let mut body_start = text.len();

    for (start, end, next) in lines(text) {
        let line = &text[start..end];
        if line.is_empty() {
            body_start = next;
            break;
        }

        if is_lwsp(line[0]) {
            if let Some(last) = headers.headers.last_mut() {
                last.value.push('\n');
                last.value.push_str(&header_text(line)?);
                continue;
            }
        }

        if let Some((name, value)) = split_header(line) {
            let value = header_text(value)?;
            headers.append(name, value.trim_start_matches(
                |ch: char| ' ' == ch || '\t' == ch));
        } else {
            // Not a header; assume the blank line was omitted and the body
            // starts here.
            body_start = start;
            break;
        }
    }

    let body = &text[body_start..];
    let content_type = headers.get(CONTENT_TYPE).and_then(
        |ct| parse_content_type(ct.as_bytes()));
    let payload = match content_type {
        Some(ref ct) if ct.is_toplevel_type(MULTIPART) => {
            match ct.boundary() {
                Some(_) if depth >= MAX_DEPTH => {
                    debug!("multipart too deep, treating as opaque");
                    Payload::Body(body.to_vec())
                },
                Some(boundary) => match split_multipart(body, boundary,
                                                        depth)? {
                    Some(mp) => Payload::Multipart(mp),
                    None => {
                        debug!(boundary, "multipart has no delimiters, \
                                          treating as opaque");
                        Payload::Body(body.to_vec())
                    },
                },
                None => {
                    debug!("multipart has no boundary, treating as opaque");
                    Payload::Body(body.to_vec())
                },
            }
        },
        _ => Payload::Body(body.to_vec()),
    };

    Ok(MimeEntity { headers: headers, payload: payload })
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
enum Delimiter {
    /// `--boundary`, starting a new body part.
    Part,
    /// `--boundary--`, ending the multipart.
    Close,
}

fn classify_delimiter(line: &[u8], boundary: &str) -> Option<Delimiter> {
    let boundary = boundary.as_bytes();
    if line.len() < boundary.len() + 2 ||
        !line.starts_with(b"--") ||
        boundary != &line[2..2 + boundary.len()]
    {
        return None;
    }

    let rest = &line[2 + boundary.len()..];
    if rest.starts_with(b"--") {
        Some(Delimiter::Close)
    } else if rest.iter().all(|&ch| is_lwsp(ch)) {
        // [RFC 2046] permits transport padding after the boundary.
        Some(Delimiter::Part)
    } else {
        None
    }
}

/// Splits a multipart body into its constituent parts.
///
/// Returns `None` if no delimiter line occurs at all. A missing close
/// delimiter is tolerated; the last part then runs to the end of the body.
fn split_multipart(body: &[u8], boundary: &str, depth: u32)
                   -> Result<Option<Multipart>> {
    let mut preamble = None;
    let mut epilogue = None;
    let mut ranges = Vec::new();
    let mut part_start = None;
    let mut seen_delim = false;
    let mut closed = false;

    for (start, end, next) in lines(body) {
        let delim = match classify_delimiter(&body[start..end], boundary) {
            Some(delim) => delim,
            None => continue,
        };

        // The line ending before the delimiter is part of the delimiter.
        let content_end = start.saturating_sub(1);
        if let Some(s) = part_start {
            ranges.push((s, max(s, content_end)));
        } else if !seen_delim && start > 0 {
            preamble = Some(body[..content_end].to_vec());
        }
        seen_delim = true;

        if Delimiter::Close == delim {
            if end < body.len() {
                epilogue = Some(body[next..].to_vec());
            }
            closed = true;
            break;
        }
        part_start = Some(next);
    }

    if !seen_delim {
        return Ok(None);
    }
    if !closed {
        debug!(boundary, "multipart not terminated");
        if let Some(s) = part_start {
            ranges.push((s, body.len()));
        }
    }

    let mut parts = Vec::with_capacity(ranges.len());
    for (s, e) in ranges {
        parts.push(parse_entity(&body[s..e], depth + 1)?);
    }

    Ok(Some(Multipart {
        boundary: boundary.to_owned(),
        preamble: preamble,
        parts: parts,
        epilogue: epilogue,
    }))
}

/// A deserialised representation of the Content-Type header.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct ContentType {
    /// The top-level content type, eg, "multipart" or "text".
    pub toplevel: String,
    /// The content subtype, eg, "alternative" or "plain".
    pub subtype: String,
    /// Parameters in the order they appeared.
    pub params: Vec<(String,String)>,
}

impl ContentType {
    pub fn new(toplevel: &str, subtype: &str) -> Self {
        ContentType {
            toplevel: toplevel.to_owned(),
            subtype: subtype.to_owned(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    pub fn with_param<N : Into<String>, V : Into<String>>(mut self, name: N,
                                                         value: V) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Returns the value of the parameter `name`. If it occurs more than once,
    /// the last one wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().rev()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
    }

    /// The multipart boundary, if there is a non-empty one.
    pub fn boundary(&self) -> Option<&str> {
        self.param(BOUNDARY).filter(|b| !b.is_empty())
    }

    /// Returns whether this `ContentType` has a top-level type matching `tl`.
    pub fn is_toplevel_type(&self, tl: &str) -> bool {
        tl.eq_ignore_ascii_case(&self.toplevel)
    }

    /// Returns whether this is exactly `tl/st`, case-insensitively.
    pub fn is_mime_type(&self, tl: &str, st: &str) -> bool {
        tl.eq_ignore_ascii_case(&self.toplevel) &&
            st.eq_ignore_ascii_case(&self.subtype)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.toplevel, self.subtype)?;
        for &(ref name, ref value) in &self.params {
            write!(f, "; {}=\"", name)?;
            for ch in value.chars() {
                if '"' == ch || '\\' == ch {
                    f.write_str("\\")?;
                }
                write!(f, "{}", ch)?;
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
enum ContentTypeChar {
    Literal(u8),
    Delimiter,
    Slash, Semicolon, Equals,
    Nil,
}

/// An iterator which lexes the Content-Type header, as per [RFC 2045], which
/// of course is subtly different from the structured header syntax defined by
/// [RFC 822].
///
/// This lexer is generally permissive. It permits arbitrary binary data, and
/// ascribes no special meaning to the characters `<>@,[]?` which have no
/// meaning in the Content-Type header. Unclosed quotes, unclosed or
/// unbalanced comments, and trailing backslashes at the end of the string are
/// silently ignored.
struct ContentTypeLexer<T : Iterator<Item = u8>> {
    src: T,
    comment_depth: u32,
    in_quote: bool,
    backslash: bool,
}

impl<T : Iterator<Item = u8>> Iterator for ContentTypeLexer<T> {
    type Item = ContentTypeChar;

    fn next(&mut self) -> Option<ContentTypeChar> {
        use self::ContentTypeChar::*;

        self.src.next().map(|ch| match ch {
            _ if self.backslash => {
                self.backslash = false;
                // An escape inside a comment still emits nothing.
                if self.comment_depth > 0 { Nil } else { Literal(ch) }
            },
            b'\\' => {
                self.backslash = true;
                Nil
            },

            b'"' => {
                self.in_quote = !self.in_quote;
                Nil
            },
            // Folding inside a quoted-string is deleted.
            b'\r' | b'\n' if self.in_quote => Nil,
            _ if self.in_quote => {
                if self.comment_depth > 0 { Nil } else { Literal(ch) }
            },

            // Comments nest and count as delimiters
            b'(' => {
                self.comment_depth += 1;
                Nil
            },
            b')' => {
                if self.comment_depth > 0 {
                    self.comment_depth -= 1;
                }
                Delimiter
            },
            _ if self.comment_depth > 0 => Nil,

            b'/' => Slash,
            b'=' => Equals,
            b';' => Semicolon,
            // Header values keep their folding line breaks.
            b' ' | b'\t' | b'\r' | b'\n' => Delimiter,
            _ => Literal(ch),
        })
    }
}

impl<T : Iterator<Item = u8>> ContentTypeLexer<T> {
    fn new(src: T) -> Self {
        ContentTypeLexer {
            src: src,
            comment_depth: 0,
            in_quote: false,
            backslash: false,
        }
    }
}

/// Parses a Content-Type header.
///
/// This parser is _extremely_ permissive, and accepts many things most parsers
/// wouldn't. If it successfully parses the Content-Type, at the very least it
/// is guaranteed that there is a non-empty toplevel type and subtype.
/// Parameters with an empty name are dropped.
pub fn parse_content_type(data: &[u8]) -> Option<ContentType> {
    use self::ContentTypeChar::*;
    type CTC = ContentTypeChar;

    let mut it = ContentTypeLexer::new(data.iter().cloned())
        .filter(|ch| Nil != *ch)
        .peekable();

    fn skip_delims<T : Iterator<Item = CTC>>(it: &mut Peekable<T>) {
        while Some(&Delimiter) == it.peek() {
            it.next();
        }
    }

    fn skip_to<T : Iterator<Item = CTC>>(it: &mut Peekable<T>, ch: CTC) {
        while it.peek().map_or(false, |a| &ch != a) {
            it.next();
        }
        it.next();
    }

    fn read_word<T : Iterator<Item = CTC>>(it: &mut Peekable<T>) -> String {
        skip_delims(it);

        let mut dst = Vec::new();
        while let Some(&Literal(ch)) = it.peek() {
            dst.push(ch);
            it.next();
        }
        String::from_utf8_lossy(&dst).into_owned()
    }

    let toplevel = read_word(&mut it);
    skip_to(&mut it, Slash);
    let subtype = read_word(&mut it);
    skip_to(&mut it, Semicolon);

    let mut params = Vec::new();
    while it.peek().is_some() {
        let attr = read_word(&mut it);
        skip_to(&mut it, Equals);
        let value = read_word(&mut it);
        skip_to(&mut it, Semicolon);

        if !attr.is_empty() {
            params.push((attr, value));
        }
    }

    if !toplevel.is_empty() && !subtype.is_empty() {
        Some(ContentType {
            toplevel: toplevel,
            subtype: subtype,
            params: params,
        })
    } else {
        None
    }
}

/// Deterministic `SeparatorGen` for tests: `PGPWrap-1`, `PGPWrap-2`, ...
#[cfg(test)]
#[derive(Clone,Copy,Debug,Default)]
pub struct DetSeparatorGen {
    counter: u32,
}

#[cfg(test)]
impl SeparatorGen for DetSeparatorGen {
    fn gen(&mut self) -> String {
        self.counter += 1;
        format!("PGPWrap-{}", self.counter)
    }
}
