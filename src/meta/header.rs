
//! The header shared by all data files:
//! descriptive name, file name, comment, title, tags and the modified bit.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::error::{Error, Result, UnitResult};
use crate::io::{TextReader, comment_for_display, comment_for_storage, split_tag_line};
use crate::meta::{CommentMode, FileFormat, Structure, WriteOptions};


pub const BEGIN_HEADER: &str = "BeginHeader";
pub const END_HEADER: &str = "EndHeader";

pub mod tag {
    pub const COMMENT: &str = "comment";
    pub const DATE: &str = "date";
    pub const ENCODING: &str = "encoding";
    pub const STRUCTURE: &str = "structure";
    pub const SPACE: &str = "space";
    pub const SPECIES: &str = "species";
    pub const SUBJECT: &str = "subject";
    pub const CATEGORY: &str = "category";
    pub const PUBMED_ID: &str = "pubmed_id";
    pub const CONFIGURATION_ID: &str = "configuration_id";
    pub const COORDFRAME_ID: &str = "coordframe_id";
    pub const ORIENTATION: &str = "orientation";
    pub const RESOLUTION: &str = "resolution";
    pub const SAMPLING: &str = "sampling";
    pub const SCALE: &str = "scale";
    pub const VERSION_ID: &str = "version_id";

    /// Old name of the structure tag.
    pub const HEMISPHERE_FLAG: &str = "hem_flag";
}

/// Comments longer than this are reported when read.
const COMMENT_LENGTH_WARNING: usize = 100_000;


/// Meta data of one data file.
/// Every kind of file owns one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    descriptive_name: &'static str,
    default_extension: &'static str,
    root_element: &'static str,

    file_name: Option<PathBuf>,

    /// Keys are lower case, the value holds the key as it was written.
    tags: BTreeMap<String, (String, String)>,

    title: String,
    modified: bool,

    read_format: FileFormat,
    write_format: FileFormat,
}

impl FileHeader {

    /// An empty header for a kind of file.
    /// The root element is the name of the outermost element of the xml encoding.
    pub fn new(descriptive_name: &'static str, default_extension: &'static str, root_element: &'static str) -> Self {
        FileHeader {
            descriptive_name, default_extension, root_element,
            file_name: None,
            tags: BTreeMap::new(),
            title: String::new(),
            modified: false,
            read_format: FileFormat::Ascii,
            write_format: FileFormat::Ascii,
        }
    }

    /// Forget the file name, tags, title and the modified bit.
    /// Formats are kept.
    pub fn clear(&mut self) {
        self.file_name = None;
        self.tags.clear();
        self.title.clear();
        self.modified = false;
    }

    pub fn descriptive_name(&self) -> &'static str { self.descriptive_name }
    pub fn default_extension(&self) -> &'static str { self.default_extension }
    pub fn root_element(&self) -> &'static str { self.root_element }

    /// The path this file was last read from or written to.
    pub fn file_name(&self) -> Option<&Path> { self.file_name.as_deref() }

    pub fn set_file_name(&mut self, path: impl Into<PathBuf>) {
        self.file_name = Some(path.into());
    }

    /// The value of a header tag. Tag names are compared ignoring case.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(&name.to_ascii_lowercase()).map(|(_, value)| value.as_str())
    }

    /// Set the value of a header tag, replacing any previous value.
    /// The old `hem_flag` tag is stored as `structure`.
    pub fn set_tag(&mut self, name: &str, value: impl Into<String>) {
        let name = if name.eq_ignore_ascii_case(tag::HEMISPHERE_FLAG) { tag::STRUCTURE } else { name };
        self.tags.insert(name.to_ascii_lowercase(), (name.to_string(), value.into()));
        self.modified = true;
    }

    pub fn remove_tag(&mut self, name: &str) {
        if self.tags.remove(&name.to_ascii_lowercase()).is_some() {
            self.modified = true;
        }
    }

    /// All tags in sorted order, with their names as written.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.values().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The free text comment, possibly spanning multiple lines.
    pub fn comment(&self) -> &str {
        self.tag(tag::COMMENT).unwrap_or("")
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.set_tag(tag::COMMENT, comment);
    }

    /// Add text to the end of the comment.
    pub fn append_to_comment(&mut self, text: &str) {
        if !text.is_empty() {
            let comment = format!("{}{}", self.comment(), text);
            self.set_comment(comment);
        }
    }

    /// Merge the comment of a file that is appended to this file.
    pub fn append_file_comment(&mut self, other: &FileHeader, mode: CommentMode) {
        match mode {
            CommentMode::LeaveAsIs => {},
            CommentMode::Replace => self.set_comment(other.comment()),
            CommentMode::Append => {
                if !other.comment().is_empty() {
                    let mut comment = self.comment().to_string();

                    match other.file_name().and_then(Path::file_name) {
                        Some(name) => {
                            comment.push_str("\nAppended File: ");
                            comment.push_str(&name.to_string_lossy());
                        },
                        None => comment.push_str("\nAppended Unnamed File"),
                    }

                    comment.push('\n');
                    comment.push_str(other.comment());
                    self.set_comment(comment);
                }
            },
        }
    }

    pub fn title(&self) -> &str { &self.title }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.modified = true;
    }

    /// The `structure` tag, `Invalid` if missing.
    pub fn structure(&self) -> Structure {
        self.tag(tag::STRUCTURE).map(Structure::from_name).unwrap_or_default()
    }

    pub fn set_structure(&mut self, structure: Structure) {
        self.set_tag(tag::STRUCTURE, structure.name());
    }

    pub fn is_modified(&self) -> bool { self.modified }
    pub fn set_modified(&mut self) { self.modified = true; }
    pub fn clear_modified(&mut self) { self.modified = false; }

    /// The format of the file that was last read.
    pub fn read_format(&self) -> FileFormat { self.read_format }

    /// The format that will be used by the next write.
    pub fn write_format(&self) -> FileFormat { self.write_format }

    pub fn set_read_format(&mut self, format: FileFormat) { self.read_format = format; }
    pub fn set_write_format(&mut self, format: FileFormat) { self.write_format = format; }

    /// The version number in the `version_id` tag, if present.
    pub fn version_id(&self) -> Option<i32> {
        self.tag(tag::VERSION_ID).and_then(|version| version.trim().parse().ok())
    }


    /// Read the `BeginHeader` ... `EndHeader` section.
    /// Returns false and leaves the reader untouched if the file has no header.
    /// Tags with a leading `#` are accepted.
    pub fn read_text(&mut self, text: &mut TextReader<'_>) -> Result<bool> {
        let start = text.position();

        let is_header = loop {
            match text.next_line() {
                None => break false,
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break split_tag_line(&line).0 == BEGIN_HEADER,
            }
        };

        if !is_header {
            text.set_position(start);
            return Ok(false);
        }

        loop {
            let line = text.next_line()
                .ok_or_else(|| Error::invalid("header is missing EndHeader"))?;

            if line.trim().is_empty() {
                continue;
            }

            let (name, value) = split_tag_line(&line);
            let name = name.strip_prefix('#').unwrap_or(name);

            if name == END_HEADER {
                break;
            }

            if name.eq_ignore_ascii_case(tag::COMMENT) {
                let comment = comment_for_display(value);
                if comment.len() > COMMENT_LENGTH_WARNING {
                    log::warn!("{} comment is {} characters", self.descriptive_name, comment.len());
                }

                self.set_tag(name, comment);
            }
            else {
                self.set_tag(name, value);
            }
        }

        Ok(true)
    }

    /// Set the tags that describe how the file is about to be written.
    pub fn stamp_for_write(&mut self, format: FileFormat, options: WriteOptions) {
        let modified = self.modified;

        self.set_tag(tag::ENCODING, format.encoding_name());
        if options.stamp_date {
            self.set_tag(tag::DATE, chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string());
        }

        self.modified = modified;
    }

    /// Write the `BeginHeader` ... `EndHeader` section.
    pub fn write_text(&self, write: &mut impl Write) -> UnitResult {
        writeln!(write, "{}", BEGIN_HEADER)?;

        for (name, value) in self.tags() {
            if name.eq_ignore_ascii_case(tag::COMMENT) {
                writeln!(write, "{} {}", name, comment_for_storage(value))?;
            }
            else {
                writeln!(write, "{} {}", name, value)?;
            }
        }

        writeln!(write, "{}", END_HEADER)?;
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn header() -> FileHeader {
        FileHeader::new("Paint File", ".paint", "PaintFile")
    }

    #[test]
    fn header_text_round_trip(){
        let mut original = header();
        original.set_comment("two\nlines");
        original.set_tag("hem_flag", "left");
        original.set_tag("Caret-Version", "5.6");

        let mut bytes = Vec::new();
        original.write_text(&mut bytes).unwrap();

        let mut read = header();
        assert!(read.read_text(&mut TextReader::new(&bytes)).unwrap());
        assert_eq!(read.comment(), "two\nlines");
        assert_eq!(read.structure(), Structure::Left);
        assert_eq!(read.tag("caret-version"), Some("5.6"));
    }

    #[test]
    fn headerless_file_is_untouched(){
        let mut text = TextReader::new(b"tag-version 1\n");
        assert!(!header().read_text(&mut text).unwrap());
        assert_eq!(text.position(), 0);
    }

    #[test]
    fn missing_end_is_invalid(){
        let mut text = TextReader::new(b"BeginHeader\nencoding ASCII\n");
        assert!(header().read_text(&mut text).is_err());
    }

    #[test]
    fn hash_prefixed_tags(){
        let mut read = header();
        read.read_text(&mut TextReader::new(b"BeginHeader\n#encoding BINARY\nEndHeader\n")).unwrap();
        assert_eq!(read.tag("encoding"), Some("BINARY"));
    }

    #[test]
    fn comment_modes(){
        let mut other = header();
        other.set_comment("other");
        other.set_file_name("/data/lh.paint");

        let mut appended = header();
        appended.set_comment("mine");
        appended.append_file_comment(&other, CommentMode::Append);
        assert_eq!(appended.comment(), "mine\nAppended File: lh.paint\nother");

        let mut unnamed = header();
        let mut anonymous = header();
        anonymous.set_comment("x");
        unnamed.append_file_comment(&anonymous, CommentMode::Append);
        assert_eq!(unnamed.comment(), "\nAppended Unnamed File\nx");

        let mut replaced = header();
        replaced.set_comment("mine");
        replaced.append_file_comment(&other, CommentMode::Replace);
        assert_eq!(replaced.comment(), "other");

        let mut kept = header();
        kept.set_comment("mine");
        kept.append_file_comment(&other, CommentMode::LeaveAsIs);
        assert_eq!(kept.comment(), "mine");

        // an empty comment appends nothing
        let mut empty_other = header();
        empty_other.set_file_name("x.paint");
        kept.append_file_comment(&empty_other, CommentMode::Append);
        assert_eq!(kept.comment(), "mine");
    }
}
