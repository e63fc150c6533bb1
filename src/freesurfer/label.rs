
//! A labeled set of vertices.
//!
//! The first line is a comment, the second the number of vertices,
//! followed by one `vertex x y z value` line per vertex.

use std::io::Write;
use crate::error::{Error, UnitResult};
use crate::file::DataFile;
use crate::io::{Fixed, TextReader, parse};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{parse_vertex_line, read_values};


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledVertex {
    pub vertex: i32,
    pub position: [f32; 3],
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeSurferLabelFile {
    header: FileHeader,
    vertices: Vec<LabeledVertex>,
}

impl Default for FreeSurferLabelFile {
    fn default() -> Self {
        FreeSurferLabelFile {
            header: FileHeader::new("Free Surfer Label File", ".label", "FreeSurferLabelFile"),
            vertices: Vec::new(),
        }
    }
}

impl FreeSurferLabelFile {
    pub fn new() -> Self { Self::default() }

    pub fn vertices(&self) -> &[LabeledVertex] { &self.vertices }

    pub fn add_vertex(&mut self, vertex: LabeledVertex) {
        self.vertices.push(vertex);
        self.header.set_modified();
    }

    /// Whether a vertex of a surface is part of this label.
    pub fn contains_vertex(&self, vertex: i32) -> bool {
        self.vertices.iter().any(|labeled| labeled.vertex == vertex)
    }
}

impl DataFile for FreeSurferLabelFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.vertices.clear();
    }

    fn is_empty(&self) -> bool { self.vertices.is_empty() }
    fn has_header(&self) -> bool { false }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("labels in {} format", format)));
        }

        let comment = text.read_line()?;
        self.header.set_comment(comment.trim_start_matches('#').trim());

        let count: usize = parse(text.read_non_empty_line()?.trim(), "number of label vertices")?;
        for _ in 0 .. count {
            let (vertex, position, value) = parse_vertex_line(&read_values(text, 5, "label vertex")?)?;
            self.vertices.push(LabeledVertex { vertex, position, value });
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("labels in {} format", format)));
        }

        let comment = self.header.comment().lines().next().unwrap_or("");
        writeln!(write, "#{}", comment)?;
        writeln!(write, "{}", self.vertices.len())?;

        for labeled in &self.vertices {
            let [x, y, z] = labeled.position;
            writeln!(write, "{} {} {} {} {}", labeled.vertex, Fixed(x), Fixed(y), Fixed(z), Fixed(labeled.value))?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};
    use std::path::Path;

    #[test]
    fn read_and_write(){
        let text = b"#!ascii label , from subject bert\n2\n12 1.0 2.0 3.0 0.0\n40 -1 -2 -3 1\n";

        let mut file = FreeSurferLabelFile::new();
        read_file_from_bytes(&mut file, Path::new("lh.V1.label"), text, ReadOptions::default()).unwrap();
        assert_eq!(file.vertices().len(), 2);
        assert!(file.contains_vertex(40));
        assert_eq!(file.vertices()[1].position, [-1.0, -2.0, -3.0]);
        assert_eq!(file.header().comment(), "!ascii label , from subject bert");

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let mut read = FreeSurferLabelFile::new();
        read_file_from_bytes(&mut read, Path::new("lh.V1.label"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.vertices(), file.vertices());
    }
}
