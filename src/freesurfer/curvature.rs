
//! Curvature per vertex.

use std::io::Write;
use std::path::Path;
use crate::codec::gunzip_if_compressed;
use crate::error::{Error, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::DataFile;
use crate::io::{Data, Fixed, TextReader, check_count, read_three_byte_integer};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{parse_vertex_line, format_by_suffix};


/// The first three bytes of binary curvature files that store floats.
const NEW_FORMAT_MAGIC: [u8; 3] = [0xff, 0xff, 0xff];

/// Curvature values of the legacy format are stored as hundredths.
const LEGACY_SCALE: f32 = 100.0;

/// The curvature of every vertex of a surface.
/// The text format also stores the position of each vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeSurferCurvatureFile {
    header: FileHeader,
    positions: Vec<[f32; 3]>,
    curvature: Vec<f32>,
    number_of_faces: usize,
}

impl Default for FreeSurferCurvatureFile {
    fn default() -> Self {
        FreeSurferCurvatureFile {
            header: FileHeader::new("Free Surfer Curvature File", ".curv.asc", "FreeSurferCurvatureFile"),
            positions: Vec::new(),
            curvature: Vec::new(),
            number_of_faces: 0,
        }
    }
}

impl FreeSurferCurvatureFile {
    pub fn new() -> Self { Self::default() }

    /// A file with zero positions.
    pub fn from_curvature(curvature: Vec<f32>) -> Self {
        let mut file = FreeSurferCurvatureFile::default();
        file.positions = vec![[0.0; 3]; curvature.len()];
        file.curvature = curvature;
        file
    }

    pub fn number_of_vertices(&self) -> usize { self.curvature.len() }
    pub fn curvature(&self) -> &[f32] { &self.curvature }
    pub fn position(&self, vertex: usize) -> [f32; 3] { self.positions[vertex] }

    /// The number of faces of the surface, as stored by binary files.
    pub fn number_of_faces(&self) -> usize { self.number_of_faces }

    pub fn set_curvature(&mut self, vertex: usize, position: [f32; 3], curvature: f32) {
        self.positions[vertex] = position;
        self.curvature[vertex] = curvature;
        self.header.set_modified();
    }

    /// Resize to the number of vertices. New vertices have zero curvature.
    pub fn set_number_of_vertices(&mut self, count: usize) {
        self.positions.resize(count, [0.0; 3]);
        self.curvature.resize(count, 0.0);
        self.header.set_modified();
    }

    fn read_ascii(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let file_size = text.all_bytes().len();

        while let Some(line) = text.next_line() {
            let values: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if values.is_empty() { continue; }
            if values.len() < 5 {
                return Err(Error::invalid(format!("invalid curvature line: {}", line)));
            }

            let (vertex, position, curvature) = parse_vertex_line(&values)?;
            let vertex = i32_to_usize(vertex, "curvature vertex")?;

            // each vertex before this one has a line of its own
            check_count(vertex, 2, file_size, "curvature vertex")?;

            if vertex >= self.curvature.len() {
                self.positions.resize(vertex + 1, [0.0; 3]);
                self.curvature.resize(vertex + 1, 0.0);
            }

            self.positions[vertex] = position;
            self.curvature[vertex] = curvature;
        }

        Ok(())
    }

    fn read_binary(&mut self, bytes: &[u8]) -> UnitResult {
        let bytes = gunzip_if_compressed(bytes)?;
        let mut read: &[u8] = &bytes;

        let count = if read.starts_with(&NEW_FORMAT_MAGIC) {
            read = &read[3..];
            let count = i32_to_usize(i32::read(&mut read)?, "number of vertices")?;
            self.number_of_faces = i32_to_usize(i32::read(&mut read)?, "number of faces")?;

            let values_per_vertex = i32::read(&mut read)?;
            if values_per_vertex != 1 {
                return Err(Error::unsupported(format!("{} curvature values per vertex", values_per_vertex)));
            }

            self.curvature = f32::read_vec(&mut read, count, 1 << 16)?;
            count
        }
        else {
            let count = i32_to_usize(read_three_byte_integer(&mut read)?, "number of vertices")?;
            self.number_of_faces = i32_to_usize(read_three_byte_integer(&mut read)?, "number of faces")?;

            self.curvature = i16::read_vec(&mut read, count, 1 << 16)?
                .into_iter().map(|value| f32::from(value) / LEGACY_SCALE)
                .collect();

            count
        };

        self.positions = vec![[0.0; 3]; count];
        Ok(())
    }
}

impl DataFile for FreeSurferCurvatureFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.positions.clear();
        self.curvature.clear();
        self.number_of_faces = 0;
    }

    fn is_empty(&self) -> bool { self.curvature.is_empty() }
    fn has_header(&self) -> bool { false }

    fn detect_format(&self, path: &Path, _bytes: &[u8]) -> FileFormat {
        format_by_suffix(path, ".asc")
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        match format {
            FileFormat::Ascii => self.read_ascii(text),
            FileFormat::Binary => self.read_binary(text.remaining()),
            other => Err(Error::unsupported(format!("curvature in {} format", other))),
        }
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        match format {
            FileFormat::Ascii => {
                for (vertex, (position, curvature)) in self.positions.iter().zip(&self.curvature).enumerate() {
                    let [x, y, z] = *position;
                    writeln!(write, "{:03} {} {} {} {}", vertex, Fixed(x), Fixed(y), Fixed(z), Fixed(*curvature))?;
                }
            },

            FileFormat::Binary => {
                u8::write_slice(write, &NEW_FORMAT_MAGIC)?;
                usize_to_i32(self.curvature.len()).write(write)?;
                usize_to_i32(self.number_of_faces).write(write)?;
                1_i32.write(write)?;
                f32::write_slice(write, &self.curvature)?;
            },

            other => return Err(Error::unsupported(format!("curvature in {} format", other))),
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::io::write_three_byte_integer;
    use crate::meta::{ReadOptions, WriteOptions};

    #[test]
    fn float_format_after_magic(){
        let mut bytes = vec![0xff, 0xff, 0xff];
        2_i32.write(&mut bytes).unwrap();
        7_i32.write(&mut bytes).unwrap();
        1_i32.write(&mut bytes).unwrap();
        f32::write_slice(&mut bytes, &[0.5, -1.25]).unwrap();

        let mut file = FreeSurferCurvatureFile::new();
        read_file_from_bytes(&mut file, Path::new("lh.curv"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(file.curvature(), &[0.5, -1.25]);
        assert_eq!(file.number_of_faces(), 7);
    }

    #[test]
    fn legacy_format_without_magic(){
        let mut bytes = Vec::new();
        write_three_byte_integer(&mut bytes, 3).unwrap();
        write_three_byte_integer(&mut bytes, 1).unwrap();
        i16::write_slice(&mut bytes, &[150, -25, 0]).unwrap();

        let mut file = FreeSurferCurvatureFile::new();
        read_file_from_bytes(&mut file, Path::new("lh.curv"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(file.curvature(), &[1.5, -0.25, 0.0]);
        assert_eq!(file.number_of_faces(), 1);
    }

    #[test]
    fn text_round_trip(){
        let mut file = FreeSurferCurvatureFile::from_curvature(vec![0.0, 0.0]);
        file.set_curvature(1, [1.0, 2.0, 3.0], -0.5);
        file.header_mut().set_write_format(FileFormat::Ascii);

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("000 0.000000"));

        let mut read = FreeSurferCurvatureFile::new();
        read_file_from_bytes(&mut read, Path::new("lh.curv.asc"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.curvature(), &[0.0, -0.5]);
        assert_eq!(read.position(1), [1.0, 2.0, 3.0]);
    }
}
