
//! Error type definitions.

use std::borrow::Cow;
use std::fmt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;


/// A result that may contain a caret file error.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that, if ok, contains nothing, and otherwise contains a caret file error.
pub type UnitResult = Result<()>;


/// An error that may happen while reading, writing or processing a data file.
/// Distinguishes between the kinds listed in [`ErrorKind`].
#[derive(Debug)]
pub enum Error {

    /// The file does not exist or cannot be opened for reading.
    FileNotFound(PathBuf),

    /// The file contents are stored in a format that this kind of file cannot read or write.
    FormatUnsupported(Cow<'static, str>),

    /// The contents of the file are not in the expected format:
    /// wrong magic, header tag mismatch, invalid version, inconsistent counts.
    FormatInvalid(Cow<'static, str>),

    /// Two node attribute files do not have the same number of nodes.
    ColumnMismatch(Cow<'static, str>),

    /// A projection or link references a vertex that the mesh does not have.
    VertexOutOfRange {

        /// The referenced vertex.
        vertex: i64,

        /// Number of vertices in the mesh.
        count: usize,
    },

    /// A file referenced by a spec file does not exist.
    DependencyMissing(Cow<'static, str>),

    /// An external program, such as the zip utility, did not succeed.
    ExternalToolFailed {

        /// The command line that was executed.
        command: String,

        /// The exit status or the reason the program could not be started.
        status: String,
    },

    /// Writing the output failed.
    IoWriteFailed(IoError),

    /// Reading failed for reasons other than the contents.
    Io(IoError),

    /// Another error that happened while processing the file at `path`.
    File {

        /// The file being processed.
        path: PathBuf,

        /// What went wrong.
        source: Box<Error>,
    },
}

/// The category of an [`Error`], without any attached details.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    FileNotFound,
    FormatUnsupported,
    FormatInvalid,
    ColumnMismatch,
    VertexOutOfRange,
    DependencyMissing,
    ExternalToolFailed,
    IoWriteFailed,
    Io,
}


impl Error {

    /// Create an error of the variant `FormatInvalid`.
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::FormatInvalid(message.into())
    }

    /// Create an error of the variant `FormatUnsupported`.
    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::FormatUnsupported(message.into())
    }

    /// Create an error of the variant `ColumnMismatch`.
    pub(crate) fn column_mismatch(message: impl Into<Cow<'static, str>>) -> Self {
        Error::ColumnMismatch(message.into())
    }

    /// Attach the path of the file that was processed.
    /// Errors that already name a file are returned unchanged.
    pub fn in_file(self, path: impl AsRef<Path>) -> Self {
        match self {
            Error::File { .. } | Error::FileNotFound(_) => self,
            other => Error::File { path: path.as_ref().to_path_buf(), source: Box::new(other) },
        }
    }

    /// The category of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileNotFound(_) => ErrorKind::FileNotFound,
            Error::FormatUnsupported(_) => ErrorKind::FormatUnsupported,
            Error::FormatInvalid(_) => ErrorKind::FormatInvalid,
            Error::ColumnMismatch(_) => ErrorKind::ColumnMismatch,
            Error::VertexOutOfRange { .. } => ErrorKind::VertexOutOfRange,
            Error::DependencyMissing(_) => ErrorKind::DependencyMissing,
            Error::ExternalToolFailed { .. } => ErrorKind::ExternalToolFailed,
            Error::IoWriteFailed(_) => ErrorKind::IoWriteFailed,
            Error::Io(_) => ErrorKind::Io,
            Error::File { source, .. } => source.kind(),
        }
    }

    /// The path attached to this error, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::FileNotFound(path) | Error::File { path, .. } => Some(path),
            _ => None,
        }
    }
}


/// Enable using the `?` operator on `std::io::Result`.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        match error.kind() {
            IoErrorKind::UnexpectedEof => Error::invalid("reference to missing bytes"),
            _ => Error::Io(error),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(error: quick_xml::Error) -> Self {
        Error::invalid(format!("xml: {}", error))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        Error::invalid(format!("xml attribute: {}", error))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(error: base64::DecodeError) -> Self {
        Error::invalid(format!("base64: {}", error))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FileNotFound(path) => write!(formatter, "file not found: {}", path.display()),
            Error::FormatUnsupported(message) => write!(formatter, "unsupported format: {}", message),
            Error::FormatInvalid(message) => write!(formatter, "invalid content: {}", message),
            Error::ColumnMismatch(message) => write!(formatter, "column mismatch: {}", message),
            Error::VertexOutOfRange { vertex, count } =>
                write!(formatter, "vertex {} out of range for {} vertices", vertex, count),
            Error::DependencyMissing(message) => write!(formatter, "missing data file: {}", message),
            Error::ExternalToolFailed { command, status } =>
                write!(formatter, "Execution of command \"{}\" failed with status: {}", command, status),
            Error::IoWriteFailed(error) => write!(formatter, "write failed: {}", error),
            Error::Io(error) => error.fmt(formatter),
            Error::File { path, source } => write!(formatter, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) | Error::IoWriteFailed(error) => Some(error),
            Error::File { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}


/// Convert a count read from a file to a `usize`, failing on negative numbers.
#[inline]
pub(crate) fn i32_to_usize(value: i32, what: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::invalid(what))
}

/// Convert a count to the 32-bit number stored in binary files.
#[inline]
pub(crate) fn usize_to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_looks_through_file_wrapper(){
        let error = Error::invalid("bad magic").in_file("a.curv");
        assert_eq!(error.kind(), ErrorKind::FormatInvalid);
        assert_eq!(error.path(), Some(Path::new("a.curv")));

        // a second path does not hide the first one
        let error = error.in_file("b.curv");
        assert_eq!(error.path(), Some(Path::new("a.curv")));
    }

    #[test]
    fn eof_is_invalid_content(){
        let error: Error = IoError::new(IoErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(error.kind(), ErrorKind::FormatInvalid);
    }
}
