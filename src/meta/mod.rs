
//! Describes the meta data shared by all data files:
//! the storage formats, which of them a kind of file supports,
//! and the header with its tags.

pub mod header;

use std::fmt;


/// The encodings a data file can be stored in.
/// The name of the encoding is written to the `encoding` header tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {

    /// Human readable text, numbers written with fixed precision.
    Ascii,

    /// A text header followed by big endian binary data.
    Binary,

    /// Xml with human readable values.
    Xml,

    /// Xml with base64 encoded binary values.
    XmlBase64,

    /// Xml with base64 encoded, zlib compressed binary values.
    XmlGzipBase64,

    /// Xml that references binary data in a separate file.
    XmlExternalBinary,

    /// A format specific to one kind of file.
    Other,

    /// Comma separated values.
    CommaSeparatedValue,
}

impl FileFormat {

    /// All formats, in the order of the support matrix.
    pub const ALL: [FileFormat; 8] = [
        FileFormat::Ascii, FileFormat::Binary, FileFormat::Xml, FileFormat::XmlBase64,
        FileFormat::XmlGzipBase64, FileFormat::XmlExternalBinary, FileFormat::Other,
        FileFormat::CommaSeparatedValue,
    ];

    /// The value of the `encoding` header tag for this format.
    pub fn encoding_name(self) -> &'static str {
        match self {
            FileFormat::Ascii => "ASCII",
            FileFormat::Binary => "BINARY",
            FileFormat::Xml => "XML",
            FileFormat::XmlBase64 => "XML_BASE64",
            FileFormat::XmlGzipBase64 => "XML_GZIP_BASE64",
            FileFormat::XmlExternalBinary => "XML_EXTERNAL_BINARY",
            FileFormat::Other => "OTHER",
            FileFormat::CommaSeparatedValue => "COMMA_SEPARATED_VALUE_FILE",
        }
    }

    /// Parse the value of an `encoding` header tag, ignoring case.
    pub fn from_encoding_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied()
            .find(|format| format.encoding_name().eq_ignore_ascii_case(name))
    }

    /// Whether the file is an xml document.
    pub fn is_xml(self) -> bool {
        matches!(self, FileFormat::Xml | FileFormat::XmlBase64 | FileFormat::XmlGzipBase64 | FileFormat::XmlExternalBinary)
    }

    fn matrix_index(self) -> usize {
        match self {
            FileFormat::Ascii => 0,
            FileFormat::Binary => 1,
            FileFormat::Xml => 2,
            FileFormat::XmlBase64 => 3,
            FileFormat::XmlGzipBase64 => 4,
            FileFormat::XmlExternalBinary => 5,
            FileFormat::Other => 6,
            FileFormat::CommaSeparatedValue => 7,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.encoding_name())
    }
}


/// Whether a kind of file can read or write a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatSupport {
    None,
    ReadOnly,
    WriteOnly,
    ReadAndWrite,
}

impl FormatSupport {
    pub fn can_read(self) -> bool { matches!(self, FormatSupport::ReadOnly | FormatSupport::ReadAndWrite) }
    pub fn can_write(self) -> bool { matches!(self, FormatSupport::WriteOnly | FormatSupport::ReadAndWrite) }
}


/// The formats supported by one kind of file.
/// Each kind declares its matrix as a constant, so the table is known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatMatrix {
    support: [FormatSupport; 8],
}

impl FormatMatrix {

    /// Supports nothing.
    pub const NONE: FormatMatrix = FormatMatrix { support: [FormatSupport::None; 8] };

    /// Returns a copy of this matrix with the support for one format replaced.
    pub const fn with(self, format: FileFormat, support: FormatSupport) -> FormatMatrix {
        let mut matrix = self;
        let index = match format {
            FileFormat::Ascii => 0,
            FileFormat::Binary => 1,
            FileFormat::Xml => 2,
            FileFormat::XmlBase64 => 3,
            FileFormat::XmlGzipBase64 => 4,
            FileFormat::XmlExternalBinary => 5,
            FileFormat::Other => 6,
            FileFormat::CommaSeparatedValue => 7,
        };

        matrix.support[index] = support;
        matrix
    }

    /// Reading and writing of the format.
    pub const fn read_write(self, format: FileFormat) -> FormatMatrix {
        self.with(format, FormatSupport::ReadAndWrite)
    }

    /// Only reading of the format.
    pub const fn read_only(self, format: FileFormat) -> FormatMatrix {
        self.with(format, FormatSupport::ReadOnly)
    }

    /// The support for the format.
    pub fn support(&self, format: FileFormat) -> FormatSupport {
        self.support[format.matrix_index()]
    }

    pub fn can_read(&self, format: FileFormat) -> bool { self.support(format).can_read() }
    pub fn can_write(&self, format: FileFormat) -> bool { self.support(format).can_write() }

    /// Whether any of the xml formats can be read.
    pub fn is_xml_readable(&self) -> bool {
        FileFormat::ALL.iter().any(|&format| format.is_xml() && self.can_read(format))
    }

    /// All formats that can be written, in matrix order.
    pub fn writable_formats(&self) -> impl Iterator<Item = FileFormat> + '_ {
        FileFormat::ALL.iter().copied().filter(move |&format| self.can_write(format))
    }
}


/// What happens to the comment of a file when another file is appended to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommentMode {

    /// Use the comment of the appended file.
    Replace,

    /// Add the comment of the appended file after a line naming that file.
    #[default]
    Append,

    /// Keep the current comment.
    LeaveAsIs,
}


/// The part of the brain a file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Structure {
    Left,
    Right,
    Both,
    Cerebellum,
    #[default]
    Invalid,
}

impl Structure {

    /// The lower case name written to headers and spec files.
    pub fn name(self) -> &'static str {
        match self {
            Structure::Left => "left",
            Structure::Right => "right",
            Structure::Both => "both",
            Structure::Cerebellum => "cerebellum",
            Structure::Invalid => "invalid",
        }
    }

    /// Parse any of the historical spellings, ignoring case.
    pub fn from_name(name: &str) -> Structure {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "left_hemisphere" | "lh" => Structure::Left,
            "right" | "r" | "right_hemisphere" | "rh" => Structure::Right,
            "both" | "lr" | "both_hemispheres" => Structure::Both,
            "cerebellum" => Structure::Cerebellum,
            _ => Structure::Invalid,
        }
    }

    /// The structure of a point, judged by the sign of its x coordinate.
    pub fn from_x_coordinate(x: f32) -> Structure {
        if x > 0.0 { Structure::Right } else { Structure::Left }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}


/// Options for reading a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {

    /// Only read the header and skip the payload.
    pub meta_data_only: bool,
}

/// Options for writing a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {

    /// Write the current date into the `date` header tag.
    pub stamp_date: bool,
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encoding_names(){
        for format in FileFormat::ALL {
            assert_eq!(FileFormat::from_encoding_name(format.encoding_name()), Some(format));
        }

        assert_eq!(FileFormat::from_encoding_name(" binary "), Some(FileFormat::Binary));
        assert_eq!(FileFormat::from_encoding_name("EBCDIC"), None);
    }

    #[test]
    fn const_matrix(){
        const MATRIX: FormatMatrix = FormatMatrix::NONE
            .read_write(FileFormat::Ascii)
            .read_only(FileFormat::Xml);

        assert!(MATRIX.can_read(FileFormat::Ascii) && MATRIX.can_write(FileFormat::Ascii));
        assert!(MATRIX.can_read(FileFormat::Xml) && !MATRIX.can_write(FileFormat::Xml));
        assert!(!MATRIX.can_read(FileFormat::Binary));
        assert_eq!(MATRIX.writable_formats().collect::<Vec<_>>(), vec![FileFormat::Ascii]);
    }

    #[test]
    fn structure_spellings(){
        assert_eq!(Structure::from_name("LEFT"), Structure::Left);
        assert_eq!(Structure::from_name("right_hemisphere"), Structure::Right);
        assert_eq!(Structure::from_name("???"), Structure::Invalid);
        assert_eq!(Structure::from_x_coordinate(-3.0), Structure::Left);
    }
}
