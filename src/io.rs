
//! Specialized binary and text input and output.
//! Uses the error handling for this crate.
//!
//! Binary sections of caret files are always big endian.
//! Text sections are read from an in-memory copy of the file,
//! so the byte position of the text cursor is always exact
//! and binary decoding can continue right where the text ended.

pub use ::std::io::{Read, Write};
use lebe::prelude::*;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result, UnitResult, IoResult};


/// Number of digits written after the decimal point of text floats.
pub const FLOAT_DIGITS: usize = 6;

/// Skip reading uninteresting bytes without allocating.
#[inline]
pub fn skip_bytes(read: &mut impl Read, count: usize) -> IoResult<()> {
    let skipped = std::io::copy(
        &mut read.by_ref().take(count as u64),
        &mut std::io::sink()
    )?;

    if skipped < count as u64 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "cannot skip bytes"));
    }

    Ok(())
}

/// Read three unsigned octets, most significant first, as one integer.
/// Used by legacy FreeSurfer headers.
#[inline]
pub fn read_three_byte_integer(read: &mut impl Read) -> Result<i32> {
    let mut bytes = [0_u8; 3];
    read.read_exact(&mut bytes)?;
    Ok((i32::from(bytes[0]) << 16) | (i32::from(bytes[1]) << 8) | i32::from(bytes[2]))
}

/// Write the lowest three octets of the integer, most significant first.
#[inline]
pub fn write_three_byte_integer(write: &mut impl Write, value: i32) -> UnitResult {
    if !(0 ..= 0x00FF_FFFF).contains(&value) {
        return Err(Error::invalid("three byte integer out of range"));
    }

    let bytes = value.to_be_bytes();
    write.write_all(&bytes[1..])?;
    Ok(())
}


/// Generic trait that defines common binary operations such as reading and writing for this type.
/// All values are stored big endian.
pub trait Data: Sized + Default + Clone {

    /// Number of bytes this would consume in a file.
    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    /// Read a value of type `Self`.
    fn read(read: &mut impl Read) -> Result<Self>;

    /// Read as many values of type `Self` as fit into the specified slice.
    /// If the slice cannot be filled completely, returns `Error::FormatInvalid`.
    fn read_slice(read: &mut impl Read, slice: &mut[Self]) -> UnitResult;

    /// Write this value to the writer.
    fn write(self, write: &mut impl Write) -> UnitResult;

    /// Write all values of that slice to the writer.
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;

    /// Read as many values of type `Self` as specified with `data_size`.
    ///
    /// This method will not allocate more memory than `soft_max` at once,
    /// so that a corrupt count does not exhaust the memory before the read fails.
    #[inline]
    fn read_vec(read: &mut impl Read, data_size: usize, soft_max: usize) -> Result<Vec<Self>> {
        let mut data = Vec::new();
        let soft_max = soft_max.max(1);

        while data.len() < data_size {
            let chunk_start = data.len();
            let chunk_end = (chunk_start + soft_max).min(data_size);

            data.resize(chunk_end, Self::default());
            Self::read_slice(read, &mut data[chunk_start .. chunk_end])?;
        }

        Ok(data)
    }
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            #[inline]
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_big_endian()?)
            }

            #[inline]
            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_big_endian(&self).map_err(Error::IoWriteFailed)?;
                Ok(())
            }

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_big_endian_into(slice)?;
                Ok(())
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_big_endian(slice).map_err(Error::IoWriteFailed)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(i8);
implement_data_for_primitive!(i16);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(i32);
implement_data_for_primitive!(i64);
implement_data_for_primitive!(f32);
implement_data_for_primitive!(f64);


/// A float written with the fixed number of decimal digits used in all text files.
#[derive(Clone, Copy, Debug)]
pub struct Fixed(pub f32);

impl fmt::Display for Fixed {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.*}", FLOAT_DIGITS, self.0)
    }
}


/// Reads lines, tag lines and tokens from an in-memory file.
/// The byte position is exact, so binary data can be decoded from `remaining()`.
#[derive(Debug, Clone)]
pub struct TextReader<'b> {
    bytes: &'b [u8],
    position: usize,
}

/// A header or data tag and the text that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagLine {

    /// The first whitespace-delimited token.
    pub tag: String,

    /// The remainder of the line, trimmed.
    pub value: String,
}

impl<'b> TextReader<'b> {

    /// Start reading at the first byte.
    pub fn new(bytes: &'b [u8]) -> Self {
        TextReader { bytes, position: 0 }
    }

    /// The byte index of the next unread byte.
    pub fn position(&self) -> usize { self.position }

    /// Continue reading at the specified byte.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.bytes.len());
    }

    /// Whether all bytes were consumed.
    pub fn is_at_end(&self) -> bool { self.position >= self.bytes.len() }

    /// All bytes of the file, including those already consumed.
    pub fn all_bytes(&self) -> &'b [u8] { self.bytes }

    /// The unread bytes. Binary payloads are decoded from here.
    pub fn remaining(&self) -> &'b [u8] { &self.bytes[self.position ..] }

    /// Fail unless the unread bytes can hold `count` items of at least `item_size` bytes each.
    pub fn check_count(&self, count: usize, item_size: usize, what: &'static str) -> UnitResult {
        check_count(count, item_size, self.remaining().len(), what)
    }

    /// Mark the specified number of bytes as consumed by a binary decoder.
    pub fn advance(&mut self, count: usize) {
        self.set_position(self.position + count);
    }

    /// Read the next line without its line terminator. Returns `None` at the end of the file.
    pub fn next_line(&mut self) -> Option<Cow<'b, str>> {
        if self.is_at_end() {
            return None;
        }

        let rest = self.remaining();
        let (line, consumed) = match rest.iter().position(|&byte| byte == b'\n') {
            Some(end) => (&rest[.. end], end + 1),
            None => (rest, rest.len()),
        };

        self.position += consumed;

        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some(String::from_utf8_lossy(line))
    }

    /// Look at the next line without consuming it.
    pub fn peek_line(&self) -> Option<Cow<'b, str>> {
        self.clone().next_line()
    }

    /// Read the next line, failing at the end of the file.
    pub fn read_line(&mut self) -> Result<Cow<'b, str>> {
        self.next_line().ok_or_else(|| Error::invalid("unexpected end of file"))
    }

    /// Read the next line that contains anything other than whitespace.
    pub fn read_non_empty_line(&mut self) -> Result<Cow<'b, str>> {
        loop {
            let line = self.read_line()?;
            if !line.trim().is_empty() {
                return Ok(line);
            }
        }
    }

    /// Read a line and split it into its tag and value.
    /// Blank lines are skipped.
    pub fn read_tag_line(&mut self) -> Result<TagLine> {
        let line = self.read_non_empty_line()?;
        let (tag, value) = split_tag_line(&line);
        Ok(TagLine { tag: tag.to_string(), value: value.to_string() })
    }

    /// Read a tag line whose value starts with a column index.
    pub fn read_numbered_tag_line(&mut self) -> Result<(String, usize, String)> {
        let TagLine { tag, value } = self.read_tag_line()?;
        let (index, rest) = split_numbered_value(&value)?;
        Ok((tag, index, rest.to_string()))
    }

    /// Read a line and split it at whitespace.
    pub fn read_tokens(&mut self) -> Result<Vec<String>> {
        let line = self.read_line()?;
        Ok(line.split_whitespace().map(str::to_string).collect())
    }
}


/// Fail unless `count` items of at least `item_size` bytes each fit into `available` bytes.
/// Counts read from a header are checked before anything is allocated for them.
pub fn check_count(count: usize, item_size: usize, available: usize, what: &'static str) -> UnitResult {
    match count.checked_mul(item_size) {
        Some(size) if size <= available => Ok(()),
        _ => Err(Error::invalid(format!("{} {} exceeds the remaining {} bytes", what, count, available))),
    }
}

/// Multiply a count read from a file, failing instead of overflowing.
pub fn checked_count(count: usize, factor: usize, what: &'static str) -> Result<usize> {
    count.checked_mul(factor).ok_or_else(|| Error::invalid(format!("{} {}", what, count)))
}

/// Split a line into its first token and the trimmed remainder.
pub fn split_tag_line(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(end) => (&line[.. end], line[end ..].trim()),
        None => (line, ""),
    }
}

/// Split the value of a numbered tag into the index and the rest of the value.
pub fn split_numbered_value(value: &str) -> Result<(usize, &str)> {
    let (index, rest) = split_tag_line(value);
    Ok((parse(index, "column index")?, rest))
}

/// Split a line at whitespace without allocating for typical line lengths.
pub fn tokens(line: &str) -> SmallVec<[&str; 16]> {
    line.split_whitespace().collect()
}

/// Parse a token, naming the value in the error message.
pub fn parse<T: FromStr>(token: &str, what: &'static str) -> Result<T> {
    token.trim().parse()
        .map_err(|_| Error::invalid(format!("{} \"{}\"", what, token)))
}

/// Parse the token at the index, failing if the line has too few tokens.
pub fn parse_token<T: FromStr>(tokens: &[&str], index: usize, what: &'static str) -> Result<T> {
    let token = tokens.get(index)
        .ok_or_else(|| Error::invalid(format!("missing {}", what)))?;

    parse(token, what)
}

/// Parse a `true`/`false` token as written by caret files.
pub fn parse_bool(token: &str) -> bool {
    matches!(token.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Encode a multi-line comment so that it fits on a single text line.
pub fn comment_for_storage(comment: &str) -> String {
    let mut stored = String::with_capacity(comment.len());
    for character in comment.chars() {
        match character {
            '\n' => stored.push_str("\\n"),
            '\t' => stored.push_str("\\t"),
            '\r' => {},
            other => stored.push(other),
        }
    }

    stored
}

/// Decode a comment that was encoded with `comment_for_storage`.
pub fn comment_for_display(stored: &str) -> String {
    let mut comment = String::with_capacity(stored.len());
    let mut characters = stored.chars().peekable();

    while let Some(character) = characters.next() {
        if character == '\\' {
            match characters.peek() {
                Some('n') => { characters.next(); comment.push('\n'); },
                Some('t') => { characters.next(); comment.push('\t'); },
                _ => comment.push(character),
            }
        }
        else {
            comment.push(character);
        }
    }

    comment
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn three_byte_integer(){
        let bytes: &[u8] = &[0x01, 0x02, 0x03, 0xFF, 0xFF, 0xFF];
        let mut read = bytes;
        assert_eq!(read_three_byte_integer(&mut read).unwrap(), 0x010203);
        assert_eq!(read_three_byte_integer(&mut read).unwrap(), 0xFFFFFF);
        assert!(read_three_byte_integer(&mut read).is_err());

        let mut written = Vec::new();
        write_three_byte_integer(&mut written, 0x010203).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
        assert!(write_three_byte_integer(&mut written, -1).is_err());
    }

    #[test]
    fn big_endian_data(){
        let mut bytes = Vec::new();
        7_i32.write(&mut bytes).unwrap();
        1.5_f32.write(&mut bytes).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 7]);

        let mut read = bytes.as_slice();
        assert_eq!(i32::read(&mut read).unwrap(), 7);
        assert_eq!(f32::read(&mut read).unwrap(), 1.5);
    }

    #[test]
    fn text_cursor_hands_over_to_binary(){
        let bytes = b"tag-version 1\r\ntag-BEGIN-DATA\n\x00\x00\x00\x05";
        let mut text = TextReader::new(bytes);

        let first = text.read_tag_line().unwrap();
        assert_eq!(first.tag, "tag-version");
        assert_eq!(first.value, "1");
        assert_eq!(text.read_tag_line().unwrap().tag, "tag-BEGIN-DATA");

        let mut binary = text.remaining();
        assert_eq!(i32::read(&mut binary).unwrap(), 5);
    }

    #[test]
    fn numbered_tags(){
        let mut text = TextReader::new(b"\n  tag-column-name 3 Left  Hem  \n");
        let (tag, index, value) = text.read_numbered_tag_line().unwrap();
        assert_eq!(tag, "tag-column-name");
        assert_eq!(index, 3);
        assert_eq!(value, "Left  Hem");
        assert!(text.next_line().is_none());
    }

    #[test]
    fn comment_escaping(){
        let comment = "first line\nsecond\tline";
        let stored = comment_for_storage(comment);
        assert!(!stored.contains('\n'));
        assert_eq!(comment_for_display(&stored), comment);
    }

    #[test]
    fn fixed_floats(){
        assert_eq!(Fixed(0.25).to_string(), "0.250000");
        assert_eq!(Fixed(-2.0).to_string(), "-2.000000");
    }
}
