
//! Triangulated surfaces and surface patches.
//!
//! A patch lists only some vertices of a surface. Binary patches store
//! the vertex numbers one-based and negate those on the border of the patch.

use std::io::Write;
use std::path::Path;
use crate::codec::gunzip_if_compressed;
use crate::error::{Error, Result, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::DataFile;
use crate::io::{Data, Fixed, TextReader, checked_count, parse, tokens};
use crate::math::Vec3;
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use crate::surface::{CoordinateFile, TopologyFile};
use super::format_by_suffix;


/// The first three bytes of binary triangle files.
const TRIANGLE_MAGIC: [u8; 3] = [0xff, 0xff, 0xfe];

/// The first integer of binary patches that store float positions.
const FLOAT_PATCH_VERSION: i32 = -1;

/// Vertex counts beyond this mean the file is not a patch or not big endian.
const MAXIMUM_PATCH_VERTICES: usize = 10_000_000;


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceVertex {

    /// The zero-based node of the full surface.
    pub vertex_number: i32,

    pub position: Vec3,

    /// Whether the vertex is on the border of a patch.
    pub on_border: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeSurferSurfaceFile {
    header: FileHeader,
    vertices: Vec<SurfaceVertex>,
    triangles: Vec<[i32; 3]>,
    is_patch: bool,
}

impl Default for FreeSurferSurfaceFile {
    fn default() -> Self {
        FreeSurferSurfaceFile {
            header: FileHeader::new("Free Surfer Surface File", ".asc", "FreeSurferSurfaceFile"),
            vertices: Vec::new(),
            triangles: Vec::new(),
            is_patch: false,
        }
    }
}

impl FreeSurferSurfaceFile {
    pub fn new() -> Self { Self::default() }

    /// A full surface with vertices numbered in order.
    pub fn from_mesh(positions: &[Vec3], triangles: Vec<[i32; 3]>) -> Self {
        let mut file = FreeSurferSurfaceFile::default();
        file.vertices = positions.iter().enumerate()
            .map(|(index, &position)| SurfaceVertex { vertex_number: usize_to_i32(index), position, on_border: false })
            .collect();

        file.triangles = triangles;
        file
    }

    pub fn number_of_vertices(&self) -> usize { self.vertices.len() }
    pub fn number_of_triangles(&self) -> usize { self.triangles.len() }
    pub fn vertices(&self) -> &[SurfaceVertex] { &self.vertices }
    pub fn triangles(&self) -> &[[i32; 3]] { &self.triangles }
    pub fn is_patch(&self) -> bool { self.is_patch }

    pub fn set_patch(&mut self, is_patch: bool) {
        self.is_patch = is_patch;
        self.header.set_modified();
    }

    /// The positions of a surface with the number of nodes.
    /// Nodes that the file does not list stay at the origin.
    pub fn to_coordinate_file(&self, number_of_nodes: usize) -> Result<CoordinateFile> {
        let mut positions = vec![Vec3::ZERO; number_of_nodes.max(self.vertices.len())];

        for vertex in &self.vertices {
            let node = i32_to_usize(vertex.vertex_number, "surface vertex number")?;
            let slot = positions.get_mut(node).ok_or(Error::VertexOutOfRange {
                vertex: i64::from(vertex.vertex_number), count: number_of_nodes,
            })?;

            *slot = vertex.position;
        }

        Ok(CoordinateFile::from_coordinates(positions))
    }

    pub fn to_topology_file(&self) -> TopologyFile {
        TopologyFile::from_tiles(self.triangles.clone())
    }

    fn read_ascii(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let comment = text.read_line()?;
        if !comment.starts_with("#!a") {
            return Err(Error::invalid("not an ASCII Free Surfer file"));
        }

        self.is_patch = comment.contains("patch");
        self.header.set_comment(comment.trim_start_matches('#').trim());

        let counts = text.read_non_empty_line()?;
        let counts = tokens(&counts);
        let vertex_count: usize = parse(counts.first().copied().unwrap_or(""), "number of vertices")?;
        let triangle_count: usize = parse(counts.get(1).copied().unwrap_or(""), "number of triangles")?;

        if vertex_count == 0 || triangle_count == 0 {
            return Err(Error::invalid("Number of nodes and tiles not found."));
        }

        self.vertices.reserve(vertex_count.min(text.remaining().len() / 8));

        for index in 0 .. vertex_count {
            let vertex_number = if self.is_patch {
                let line = text.read_non_empty_line()?;
                let number = line.split_once('=').map_or(line.trim(), |(_, number)| number.trim());
                parse(number, "patch vertex number")?
            }
            else {
                usize_to_i32(index)
            };

            let line = text.read_non_empty_line()?;
            let values = tokens(&line);
            let position = Vec3(
                parse(values.first().copied().unwrap_or(""), "x")?,
                parse(values.get(1).copied().unwrap_or(""), "y")?,
                parse(values.get(2).copied().unwrap_or(""), "z")?,
            );

            self.vertices.push(SurfaceVertex { vertex_number, position, on_border: false });
        }

        // triangles are whitespace separated and may span lines
        let remaining = String::from_utf8_lossy(text.remaining()).into_owned();
        let mut numbers = remaining.split_whitespace();
        let mut next = |what: &'static str| -> Result<i32> {
            parse(numbers.next().ok_or_else(|| Error::invalid("At end of file before done reading topology."))?, what)
        };

        for _ in 0 .. triangle_count {
            if self.is_patch { next("patch triangle number")?; }
            let triangle = [next("triangle vertex")?, next("triangle vertex")?, next("triangle vertex")?];
            if !self.is_patch { next("triangle flag")?; }
            self.triangles.push(triangle);
        }

        text.advance(text.remaining().len());
        Ok(())
    }

    fn read_binary(&mut self, bytes: &[u8]) -> UnitResult {
        let bytes = gunzip_if_compressed(bytes)?;

        if bytes.starts_with(&TRIANGLE_MAGIC) {
            self.read_binary_triangles(&bytes[3..])
        }
        else if self.header.file_name().map_or(false, |path| path.to_string_lossy().contains("patch")) {
            self.read_binary_patch(&bytes)
        }
        else {
            let magic: Vec<String> = bytes.iter().take(3).map(|byte| format!("{:x}", byte)).collect();
            Err(Error::invalid(format!("FreeSurfer File, invalid magic number (hex): {}", magic.join(" "))))
        }
    }

    fn read_binary_triangles(&mut self, bytes: &[u8]) -> UnitResult {
        // the comment is terminated by an empty line
        let comment_end = bytes.windows(2).position(|pair| pair == b"\n\n")
            .ok_or_else(|| Error::invalid("Unexpectedly encountered end of file while reading comment."))?;

        self.header.set_comment(String::from_utf8_lossy(&bytes[.. comment_end]).trim());

        let mut read = &bytes[comment_end + 2 ..];
        let vertex_count = i32_to_usize(i32::read(&mut read)?, "Vertex count less than zero")?;
        let triangle_count = i32_to_usize(i32::read(&mut read)?, "Face count less than zero")?;

        let positions = f32::read_vec(&mut read, checked_count(vertex_count, 3, "vertex count")?, 3 << 16)?;
        self.vertices = positions.chunks_exact(3).enumerate()
            .map(|(index, xyz)| SurfaceVertex {
                vertex_number: usize_to_i32(index),
                position: Vec3(xyz[0], xyz[1], xyz[2]),
                on_border: false,
            })
            .collect();

        let triangles = i32::read_vec(&mut read, checked_count(triangle_count, 3, "face count")?, 3 << 16)?;
        self.triangles = triangles.chunks_exact(3).map(|tile| [tile[0], tile[1], tile[2]]).collect();
        Ok(())
    }

    fn read_binary_patch(&mut self, bytes: &[u8]) -> UnitResult {
        self.is_patch = true;
        let mut read = bytes;

        let first = i32::read(&mut read)?;
        let float_positions = first == FLOAT_PATCH_VERSION;
        let count = if float_positions { i32::read(&mut read)? } else { first };

        let count = usize::try_from(count).ok().filter(|&count| count <= MAXIMUM_PATCH_VERTICES)
            .ok_or_else(|| Error::invalid(format!(
                "Vertex count={} invalid. File is not in big endian order or format has changed.", count
            )))?;

        self.vertices.reserve(count.min(read.len() / 10));

        for _ in 0 .. count {
            let stored = i32::read(&mut read)?;

            let position = if float_positions {
                Vec3(f32::read(&mut read)?, f32::read(&mut read)?, f32::read(&mut read)?)
            }
            else {
                Vec3(f32::from(i16::read(&mut read)?), f32::from(i16::read(&mut read)?), f32::from(i16::read(&mut read)?))
            };

            let vertex_number = stored.abs() - 1;
            if vertex_number < 0 {
                return Err(Error::invalid(format!("Free Surfer vertex number less than zero {}", vertex_number)));
            }

            self.vertices.push(SurfaceVertex { vertex_number, position, on_border: stored < 0 });
        }

        Ok(())
    }

    fn write_ascii(&self, write: &mut Vec<u8>) -> UnitResult {
        let kind = if self.is_patch { "patch" } else { "surface" };
        writeln!(write, "#!ascii version of {} written by caret_files", kind)?;
        writeln!(write, "{} {}", self.vertices.len(), self.triangles.len())?;

        for vertex in &self.vertices {
            let Vec3(x, y, z) = vertex.position;
            if self.is_patch {
                writeln!(write, "vno={}", vertex.vertex_number)?;
                writeln!(write, "{} {} {}", Fixed(x), Fixed(y), Fixed(z))?;
            }
            else {
                writeln!(write, "{} {} {} 0", Fixed(x), Fixed(y), Fixed(z))?;
            }
        }

        for (index, [a, b, c]) in self.triangles.iter().enumerate() {
            if self.is_patch {
                writeln!(write, "{}", index)?;
                writeln!(write, "{} {} {}", a, b, c)?;
            }
            else {
                writeln!(write, "{} {} {} 0", a, b, c)?;
            }
        }

        Ok(())
    }

    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult {
        if self.is_patch {
            FLOAT_PATCH_VERSION.write(write)?;
            usize_to_i32(self.vertices.len()).write(write)?;

            for vertex in &self.vertices {
                let stored = vertex.vertex_number + 1;
                (if vertex.on_border { -stored } else { stored }).write(write)?;
                f32::write_slice(write, &vertex.position.to_array())?;
            }

            return Ok(());
        }

        u8::write_slice(write, &TRIANGLE_MAGIC)?;
        let comment = self.header.comment().replace('\n', " ");
        write!(write, "{}\n\n", comment)?;

        usize_to_i32(self.vertices.len()).write(write)?;
        usize_to_i32(self.triangles.len()).write(write)?;

        for vertex in &self.vertices {
            f32::write_slice(write, &vertex.position.to_array())?;
        }

        for triangle in &self.triangles {
            i32::write_slice(write, triangle)?;
        }

        Ok(())
    }
}

impl DataFile for FreeSurferSurfaceFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.vertices.clear();
        self.triangles.clear();
        self.is_patch = false;
    }

    fn is_empty(&self) -> bool { self.vertices.is_empty() }
    fn has_header(&self) -> bool { false }

    fn detect_format(&self, path: &Path, _bytes: &[u8]) -> FileFormat {
        format_by_suffix(path, ".asc")
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        match format {
            FileFormat::Ascii => self.read_ascii(text),
            FileFormat::Binary => self.read_binary(text.remaining()),
            other => Err(Error::unsupported(format!("\"{}\" file format not supported.", other))),
        }
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        match format {
            FileFormat::Ascii => self.write_ascii(write),
            FileFormat::Binary => self.write_binary(write),
            other => Err(Error::unsupported(format!("\"{}\" file format not supported.", other))),
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};

    fn tetrahedron() -> FreeSurferSurfaceFile {
        let positions = [Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 0.0), Vec3(0.0, 0.0, 1.0)];
        FreeSurferSurfaceFile::from_mesh(&positions, vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]])
    }

    #[test]
    fn both_formats_round_trip(){
        for (format, name) in [(FileFormat::Ascii, "lh.white.asc"), (FileFormat::Binary, "lh.white")] {
            let mut file = tetrahedron();
            file.header_mut().set_comment("created by test");
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let mut read = FreeSurferSurfaceFile::new();
            read_file_from_bytes(&mut read, Path::new(name), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.vertices(), file.vertices());
            assert_eq!(read.triangles(), file.triangles());
            assert!(!read.is_patch());
        }
    }

    #[test]
    fn binary_patch_border_vertices(){
        let mut bytes = Vec::new();
        2_i32.write(&mut bytes).unwrap();
        5_i32.write(&mut bytes).unwrap();
        i16::write_slice(&mut bytes, &[1, 2, 3]).unwrap();
        (-8_i32).write(&mut bytes).unwrap();
        i16::write_slice(&mut bytes, &[4, 5, 6]).unwrap();

        let mut file = FreeSurferSurfaceFile::new();
        read_file_from_bytes(&mut file, Path::new("lh.occip.patch"), &bytes, ReadOptions::default()).unwrap();

        assert!(file.is_patch());
        assert_eq!(file.vertices()[0].vertex_number, 4);
        assert!(!file.vertices()[0].on_border);
        assert_eq!(file.vertices()[1].vertex_number, 7);
        assert!(file.vertices()[1].on_border);
        assert_eq!(file.vertices()[1].position, Vec3(4.0, 5.0, 6.0));

        let coordinates = file.to_coordinate_file(10).unwrap();
        assert_eq!(coordinates.number_of_coordinates(), 10);
        assert!(file.to_coordinate_file(5).is_err());
    }

    #[test]
    fn float_patch_round_trip(){
        let mut file = FreeSurferSurfaceFile::new();
        file.set_patch(true);
        file.vertices.push(SurfaceVertex { vertex_number: 0, position: Vec3(0.5, 1.5, 0.0), on_border: true });
        file.header_mut().set_write_format(FileFormat::Binary);

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let mut read = FreeSurferSurfaceFile::new();
        read_file_from_bytes(&mut read, Path::new("flat.patch"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.vertices(), file.vertices());
    }

    #[test]
    fn ascii_patch(){
        let text = b"#!ascii version of patch\n2 1\nvno=3\n1 2 3\nvno=5\n4 5 6\n0\n0 1 1\n";
        let mut file = FreeSurferSurfaceFile::new();
        read_file_from_bytes(&mut file, Path::new("lh.patch.asc"), text, ReadOptions::default()).unwrap();

        assert!(file.is_patch());
        assert_eq!(file.vertices()[1].vertex_number, 5);
        assert_eq!(file.triangles(), &[[0, 1, 1]]);
    }

    #[test]
    fn unknown_magic(){
        let mut file = FreeSurferSurfaceFile::new();
        let result = read_file_from_bytes(&mut file, Path::new("lh.white"), &[1, 2, 3, 4], ReadOptions::default());
        assert!(result.is_err());
    }
}
