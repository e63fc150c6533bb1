
//! The contract shared by all data files, and the drivers that
//! read and write a data file from and to the file system.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use crate::error::{Error, Result, UnitResult};
use crate::io::TextReader;
use crate::meta::{FileFormat, FormatMatrix, ReadOptions, WriteOptions};
use crate::meta::header::FileHeader;


/// A kind of data file.
///
/// The driver functions `read_file` and `write_file` handle the file system,
/// the header and the format checks. Implementations only handle their payload.
pub trait DataFile {

    /// Which formats this kind can read and write.
    const FORMATS: FormatMatrix;

    fn header(&self) -> &FileHeader;
    fn header_mut(&mut self) -> &mut FileHeader;

    /// Remove all data, including the header.
    fn clear(&mut self);

    /// Whether the file contains no data.
    fn is_empty(&self) -> bool;

    /// Decode the payload.
    ///
    /// For text and binary formats, the reader is positioned after the header.
    /// For xml formats, the reader is at the start of the document and
    /// the implementation also reads the header element.
    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult;

    /// Encode the payload. For xml formats, the whole document including the header is written.
    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult;

    /// Whether the file starts with a `BeginHeader` section.
    fn has_header(&self) -> bool { true }

    /// The format of a file without header, judged by its name and bytes.
    fn detect_format(&self, _path: &Path, _bytes: &[u8]) -> FileFormat { FileFormat::Ascii }

    /// Whether the file or any of its elements was changed since it was read or written.
    fn is_modified(&self) -> bool { self.header().is_modified() }

    /// Clear the modified bit of the file and all of its elements.
    fn clear_modified(&mut self) { self.header_mut().clear_modified() }

    fn set_modified(&mut self) { self.header_mut().set_modified() }

    /// Replace the contents of this file with the file at the path.
    fn read_file(&mut self, path: impl AsRef<Path>) -> UnitResult where Self: Sized {
        read_file_with_options(self, path.as_ref(), ReadOptions::default())
    }

    /// Write this file to the path, in the current write format.
    fn write_file(&mut self, path: impl AsRef<Path>) -> UnitResult where Self: Sized {
        write_file_with_options(self, path.as_ref(), WriteOptions::default())
    }

    /// Read a new file from the path.
    fn from_file(path: impl AsRef<Path>) -> Result<Self> where Self: Sized + Default {
        let mut file = Self::default();
        file.read_file(path)?;
        Ok(file)
    }
}


/// Compares two files of the same kind, with a tolerance for floats.
/// Returns a message describing the first difference.
pub trait CompareForTesting {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String>;
}


/// Read the bytes of a file, reporting a missing file as `FileNotFound`.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|error| match error.kind() {
        IoErrorKind::NotFound | IoErrorKind::PermissionDenied => Error::FileNotFound(path.to_path_buf()),
        _ => Error::from(error).in_file(path),
    })
}

/// Whether the bytes look like an xml document.
pub fn is_xml_document(bytes: &[u8]) -> bool {
    bytes.iter().find(|byte| !byte.is_ascii_whitespace()) == Some(&b'<')
}

/// Replace the contents of the file with the file at the path.
pub fn read_file_with_options<F: DataFile>(file: &mut F, path: &Path, options: ReadOptions) -> UnitResult {
    let bytes = read_bytes(path)?;
    read_file_from_bytes(file, path, &bytes, options).map_err(|error| error.in_file(path))
}

/// Replace the contents of the file with the in-memory file.
/// The path is remembered as the file name and used for probing headerless formats.
pub fn read_file_from_bytes<F: DataFile>(file: &mut F, path: &Path, bytes: &[u8], options: ReadOptions) -> UnitResult {
    file.clear();

    let mut text = TextReader::new(bytes);

    let format = {
        if is_xml_document(bytes) && F::FORMATS.is_xml_readable() {
            FileFormat::Xml
        }
        else if file.has_header() && file.header_mut().read_text(&mut text)? {
            match file.header().tag(crate::meta::header::tag::ENCODING) {
                None => FileFormat::Ascii,
                Some(name) => FileFormat::from_encoding_name(name).ok_or_else(|| Error::unsupported(
                    format!("unknown encoding {}", name)
                ))?,
            }
        }
        else {
            file.detect_format(path, bytes)
        }
    };

    let readable = if format == FileFormat::Xml { F::FORMATS.is_xml_readable() } else { F::FORMATS.can_read(format) };
    if !readable {
        return Err(Error::unsupported(format!(
            "{} cannot be read in {} format",
            file.header().descriptive_name(), format
        )));
    }

    {
        let header = file.header_mut();
        header.set_file_name(path);
        header.set_read_format(format);
        header.set_write_format(format);
    }

    if !(options.meta_data_only && !format.is_xml()) {
        file.read_data(format, &mut text)?;
    }

    if !F::FORMATS.can_write(file.header().write_format()) {
        if let Some(writable) = F::FORMATS.writable_formats().next() {
            file.header_mut().set_write_format(writable);
        }
    }

    log::debug!("read {} from {}", file.header().descriptive_name(), path.display());
    file.clear_modified();
    Ok(())
}

/// Encode the file in its current write format.
pub fn write_file_to_bytes<F: DataFile>(file: &mut F, options: WriteOptions) -> Result<Vec<u8>> {
    let format = file.header().write_format();

    if !F::FORMATS.can_write(format) {
        return Err(Error::unsupported(format!(
            "{} cannot be written in {} format",
            file.header().descriptive_name(), format
        )));
    }

    file.header_mut().stamp_for_write(format, options);

    let mut bytes = Vec::new();
    if file.has_header() && !format.is_xml() {
        file.header().write_text(&mut bytes)?;
    }

    file.write_data(format, &mut bytes)?;
    Ok(bytes)
}

/// Write the file to the path. The target is only replaced after all bytes were written.
pub fn write_file_with_options<F: DataFile>(file: &mut F, path: &Path, options: WriteOptions) -> UnitResult {
    let bytes = write_file_to_bytes(file, options).map_err(|error| error.in_file(path))?;
    write_bytes_replacing(path, &bytes).map_err(|error| error.in_file(path))?;

    file.header_mut().set_file_name(path);
    file.clear_modified();
    log::debug!("wrote {} to {}", file.header().descriptive_name(), path.display());
    Ok(())
}

/// Write to a temporary sibling of the path, then move it over the path.
pub fn write_bytes_replacing(path: &Path, bytes: &[u8]) -> UnitResult {
    let file_name = path.file_name()
        .ok_or_else(|| Error::invalid("cannot write to a path without file name"))?;

    let temporary = path.with_file_name(format!(".{}.partial", file_name.to_string_lossy()));

    let result = fs::write(&temporary, bytes)
        .and_then(|()| fs::rename(&temporary, path));

    if let Err(error) = result {
        let _ = fs::remove_file(&temporary);
        return Err(Error::IoWriteFailed(error));
    }

    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::Write;

    /// A file that stores one line of text.
    #[derive(Debug)]
    struct LineFile { header: FileHeader, line: String }

    impl LineFile {
        fn new() -> Self {
            LineFile { header: FileHeader::new("Line File", ".line", "LineFile"), line: String::new() }
        }
    }

    impl DataFile for LineFile {
        const FORMATS: FormatMatrix = FormatMatrix::NONE
            .read_write(FileFormat::Ascii)
            .read_only(FileFormat::Binary);

        fn header(&self) -> &FileHeader { &self.header }
        fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }
        fn clear(&mut self) { self.header.clear(); self.line.clear(); }
        fn is_empty(&self) -> bool { self.line.is_empty() }

        fn read_data(&mut self, _: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
            self.line = text.read_line()?.into_owned();
            Ok(())
        }

        fn write_data(&self, _: FileFormat, write: &mut Vec<u8>) -> UnitResult {
            writeln!(write, "{}", self.line)?;
            Ok(())
        }
    }

    #[test]
    fn round_trip_clears_modified(){
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("a.line");

        let mut file = LineFile::new();
        file.line = "hello".into();
        file.set_modified();
        file.write_file(&path).unwrap();
        assert!(!file.is_modified());

        let mut read = LineFile::new();
        read.read_file(&path).unwrap();
        assert_eq!(read.line, "hello");
        assert_eq!(read.header().tag("encoding"), Some("ASCII"));
        assert_eq!(read.header().file_name(), Some(path.as_path()));
    }

    #[test]
    fn missing_file(){
        let error = LineFile::new().read_file("/does/not/exist.line").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn unsupported_formats(){
        let mut file = LineFile::new();
        file.header_mut().set_write_format(FileFormat::Binary);
        file.set_modified();

        let directory = tempfile::tempdir().unwrap();
        let error = file.write_file(directory.path().join("b.line")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FormatUnsupported);
        assert!(file.is_modified());

        let bytes = b"BeginHeader\nencoding XML_BASE64\nEndHeader\nx\n";
        let error = read_file_from_bytes(&mut LineFile::new(), Path::new("c.line"), bytes, ReadOptions::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FormatUnsupported);
    }

    #[test]
    fn meta_data_only(){
        let bytes = b"BeginHeader\ncomment hi\nEndHeader\npayload\n";
        let mut file = LineFile::new();
        read_file_from_bytes(&mut file, Path::new("d.line"), bytes, ReadOptions { meta_data_only: true }).unwrap();
        assert_eq!(file.header().comment(), "hi");
        assert!(file.line.is_empty());
    }
}
