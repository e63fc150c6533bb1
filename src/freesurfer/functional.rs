
//! Functional values of some vertices, as written by paint and weight exports.
//!
//! The binary layout is a 16 bit latency, a three byte count,
//! then a three byte vertex number and a float per value.
//! The text layout has the latency and the count on the first two lines,
//! followed by one `vertex value` line per value.

use std::io::Write;
use std::path::Path;
use crate::codec::gunzip_if_compressed;
use crate::error::{Error, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::DataFile;
use crate::io::{Data, Fixed, TextReader, parse, read_three_byte_integer, write_three_byte_integer};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{format_by_suffix, read_values};


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionalValue {
    pub vertex: i32,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeSurferFunctionalFile {
    header: FileHeader,
    latency: i16,
    values: Vec<FunctionalValue>,
}

impl Default for FreeSurferFunctionalFile {
    fn default() -> Self {
        FreeSurferFunctionalFile {
            header: FileHeader::new("Free Surfer Functional File", ".w.asc", "FreeSurferFunctionalFile"),
            latency: 0,
            values: Vec::new(),
        }
    }
}

impl FreeSurferFunctionalFile {
    pub fn new() -> Self { Self::default() }

    pub fn latency(&self) -> i16 { self.latency }

    pub fn set_latency(&mut self, latency: i16) {
        self.latency = latency;
        self.header.set_modified();
    }

    pub fn values(&self) -> &[FunctionalValue] { &self.values }

    pub fn add_value(&mut self, vertex: i32, value: f32) {
        self.values.push(FunctionalValue { vertex, value });
        self.header.set_modified();
    }

    /// The values as one value per vertex of a surface. Vertices without value are zero.
    pub fn values_per_vertex(&self, number_of_vertices: usize) -> Vec<f32> {
        let mut per_vertex = vec![0.0; number_of_vertices];
        for value in &self.values {
            if let Some(slot) = usize::try_from(value.vertex).ok().and_then(|vertex| per_vertex.get_mut(vertex)) {
                *slot = value.value;
            }
        }

        per_vertex
    }
}

impl DataFile for FreeSurferFunctionalFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.latency = 0;
        self.values.clear();
    }

    fn is_empty(&self) -> bool { self.values.is_empty() }
    fn has_header(&self) -> bool { false }

    fn detect_format(&self, path: &Path, _bytes: &[u8]) -> FileFormat {
        format_by_suffix(path, ".asc")
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        match format {
            FileFormat::Ascii => {
                self.latency = parse(text.read_non_empty_line()?.trim(), "latency")?;
                let count: usize = parse(text.read_non_empty_line()?.trim(), "number of values")?;

                for _ in 0 .. count {
                    let values = read_values(text, 2, "functional value")?;
                    self.values.push(FunctionalValue {
                        vertex: parse(&values[0], "vertex number")?,
                        value: parse(&values[1], "functional value")?,
                    });
                }
            },

            FileFormat::Binary => {
                let bytes = gunzip_if_compressed(text.remaining())?;
                let mut read: &[u8] = &bytes;

                self.latency = i16::read(&mut read)?;
                let count = i32_to_usize(read_three_byte_integer(&mut read)?, "number of values")?;
                self.values.reserve(count.min(read.len() / 7));

                for _ in 0 .. count {
                    let vertex = read_three_byte_integer(&mut read)?;
                    let value = f32::read(&mut read)?;
                    self.values.push(FunctionalValue { vertex, value });
                }
            },

            other => return Err(Error::unsupported(format!("functional data in {} format", other))),
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        match format {
            FileFormat::Ascii => {
                writeln!(write, "{}", self.latency)?;
                writeln!(write, "{}", self.values.len())?;
                for value in &self.values {
                    writeln!(write, "{} {}", value.vertex, Fixed(value.value))?;
                }
            },

            FileFormat::Binary => {
                self.latency.write(write)?;
                write_three_byte_integer(write, usize_to_i32(self.values.len()))?;
                for value in &self.values {
                    write_three_byte_integer(write, value.vertex)?;
                    value.value.write(write)?;
                }
            },

            other => return Err(Error::unsupported(format!("functional data in {} format", other))),
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};

    #[test]
    fn both_formats(){
        for (format, name) in [(FileFormat::Ascii, "a.w.asc"), (FileFormat::Binary, "a.w")] {
            let mut file = FreeSurferFunctionalFile::new();
            file.set_latency(3);
            file.add_value(4, 0.5);
            file.add_value(0, -2.0);
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let mut read = FreeSurferFunctionalFile::new();
            read_file_from_bytes(&mut read, Path::new(name), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.latency(), 3);
            assert_eq!(read.values(), file.values());
            assert_eq!(read.values_per_vertex(5), vec![-2.0, 0.0, 0.0, 0.0, 0.5]);
        }
    }
}
