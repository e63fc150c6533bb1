
//! Polygon surfaces in the MNI object format. These files can only be read.
//!
//! The file is a stream of whitespace separated values: the `P` object type,
//! the surface properties and the number of points, then the points,
//! the normals, the number of polygons, the colors, the end index of each polygon
//! and finally the point indices of all polygons.

use crate::error::{Error, Result, UnitResult, i32_to_usize};
use crate::file::DataFile;
use crate::io::{TextReader, parse};
use crate::math::Vec3;
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use crate::surface::{CoordinateFile, TopologyFile};


/// The lighting properties of the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProperties {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub specular_exponent: f32,
    pub opacity: f32,
}

impl Default for SurfaceProperties {
    fn default() -> Self {
        SurfaceProperties { ambient: 0.3, diffuse: 0.3, specular: 0.4, specular_exponent: 10.0, opacity: 1.0 }
    }
}

/// How many colors the file stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    OnePerObject,
    OnePerPolygon,
    OnePerVertex,
}

impl ColorMode {
    fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ColorMode::OnePerObject),
            1 => Ok(ColorMode::OnePerPolygon),
            2 => Ok(ColorMode::OnePerVertex),
            other => Err(Error::invalid(format!("mni object color flag {}", other))),
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct MniObjSurfaceFile {
    header: FileHeader,
    properties: SurfaceProperties,
    points: Vec<Vec3>,
    normals: Vec<Vec3>,

    /// The color of each point, as red, green, blue and alpha in `0..=1`.
    colors: Vec<[f32; 4]>,
    color_mode: ColorMode,
    triangles: Vec<[i32; 3]>,
}

impl Default for MniObjSurfaceFile {
    fn default() -> Self {
        MniObjSurfaceFile {
            header: FileHeader::new("MNI OBJ Surface File", ".obj", "MniObjSurfaceFile"),
            properties: SurfaceProperties::default(),
            points: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            color_mode: ColorMode::OnePerObject,
            triangles: Vec::new(),
        }
    }
}

impl MniObjSurfaceFile {
    pub fn new() -> Self { Self::default() }

    pub fn properties(&self) -> SurfaceProperties { self.properties }
    pub fn number_of_points(&self) -> usize { self.points.len() }
    pub fn points(&self) -> &[Vec3] { &self.points }
    pub fn normals(&self) -> &[Vec3] { &self.normals }
    pub fn color_mode(&self) -> ColorMode { self.color_mode }
    pub fn point_color(&self, point: usize) -> [f32; 4] { self.colors[point] }

    /// The polygons, with polygons of more than three points split into triangles.
    pub fn triangles(&self) -> &[[i32; 3]] { &self.triangles }

    /// The color of each point as bytes.
    pub fn point_colors_rgba(&self) -> Vec<[u8; 4]> {
        self.colors.iter()
            .map(|color| color.map(|component| (component.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }

    pub fn to_coordinate_file(&self) -> CoordinateFile {
        CoordinateFile::from_coordinates(self.points.clone())
    }

    pub fn to_topology_file(&self) -> TopologyFile {
        let mut topology = TopologyFile::from_tiles(self.triangles.clone());
        topology.set_number_of_nodes(self.points.len());
        topology
    }
}

/// Pulls whitespace separated values out of the whole file.
struct Values<'t> {
    values: std::str::SplitWhitespace<'t>,
}

impl<'t> Values<'t> {
    fn next<T: std::str::FromStr>(&mut self, what: &'static str) -> Result<T> {
        let value = self.values.next()
            .ok_or_else(|| Error::invalid(format!("mni object ends before {}", what)))?;

        parse(value, what)
    }

    fn vector(&mut self, what: &'static str) -> Result<Vec3> {
        Ok(Vec3(self.next(what)?, self.next(what)?, self.next(what)?))
    }

    fn color(&mut self) -> Result<[f32; 4]> {
        Ok([self.next("red")?, self.next("green")?, self.next("blue")?, self.next("alpha")?])
    }

    fn count(&mut self, what: &'static str) -> Result<usize> {
        i32_to_usize(self.next(what)?, what)
    }
}

impl DataFile for MniObjSurfaceFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_only(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.properties = SurfaceProperties::default();
        self.points.clear();
        self.normals.clear();
        self.colors.clear();
        self.color_mode = ColorMode::OnePerObject;
        self.triangles.clear();
    }

    fn is_empty(&self) -> bool { self.points.is_empty() }
    fn has_header(&self) -> bool { false }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("mni objects in {} format", format)));
        }

        let contents = String::from_utf8_lossy(text.remaining()).into_owned();
        let mut values = Values { values: contents.split_whitespace() };

        let object_type: String = values.next("object type")?;
        if object_type != "P" {
            return Err(Error::unsupported(format!("mni object type {}, only polygons are supported", object_type)));
        }

        self.properties = SurfaceProperties {
            ambient: values.next("ambient")?,
            diffuse: values.next("diffuse")?,
            specular: values.next("specular")?,
            specular_exponent: values.next("specular exponent")?,
            opacity: values.next("opacity")?,
        };

        let point_count = values.count("number of points")?;
        self.points = (0 .. point_count).map(|_| values.vector("point")).collect::<Result<_>>()?;
        self.normals = (0 .. point_count).map(|_| values.vector("normal")).collect::<Result<_>>()?;

        let polygon_count = values.count("number of polygons")?;
        self.color_mode = ColorMode::from_code(values.next("color flag")?)?;

        let stored_colors = match self.color_mode {
            ColorMode::OnePerObject => 1,
            ColorMode::OnePerPolygon => polygon_count,
            ColorMode::OnePerVertex => point_count,
        };

        let colors: Vec<[f32; 4]> = (0 .. stored_colors).map(|_| values.color()).collect::<Result<_>>()?;

        let end_indices: Vec<usize> = (0 .. polygon_count)
            .map(|_| values.count("polygon end index"))
            .collect::<Result<_>>()?;

        let index_count = end_indices.last().copied().unwrap_or(0);
        let indices: Vec<i32> = (0 .. index_count).map(|_| values.next("point index")).collect::<Result<_>>()?;

        if let Some(&invalid) = indices.iter().find(|&&index| index < 0 || index as usize >= point_count) {
            return Err(Error::VertexOutOfRange { vertex: i64::from(invalid), count: point_count });
        }

        self.colors = vec![[1.0; 4]; point_count];
        let mut start = 0;

        for (polygon, &end) in end_indices.iter().enumerate() {
            if end < start || end > indices.len() {
                return Err(Error::invalid("mni object polygon end indices are not ascending"));
            }

            let corners = &indices[start .. end];
            for fan in 1 .. corners.len().saturating_sub(1) {
                self.triangles.push([corners[0], corners[fan], corners[fan + 1]]);
            }

            if self.color_mode == ColorMode::OnePerPolygon {
                for &corner in corners {
                    self.colors[corner as usize] = colors[polygon];
                }
            }

            start = end;
        }

        match self.color_mode {
            ColorMode::OnePerObject => self.colors.fill(colors[0]),
            ColorMode::OnePerVertex => self.colors = colors,
            ColorMode::OnePerPolygon => {},
        }

        log::debug!("mni object with {} points and {} triangles", point_count, self.triangles.len());
        Ok(())
    }

    fn write_data(&self, _: FileFormat, _: &mut Vec<u8>) -> UnitResult {
        Err(Error::unsupported("writing mni objects"))
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use crate::file::read_file_from_bytes;
    use crate::meta::ReadOptions;
    use std::path::Path;

    const SQUARE: &str = "P 0.3 0.3 0.4 10 1 4
        0 0 0   1 0 0   1 1 0   0 1 0

        0 0 1   0 0 1   0 0 1   0 0 1

        1
        0 1 0 0 1
        4
        0 1 2 3
    ";

    #[test]
    fn quad_becomes_two_triangles(){
        let mut file = MniObjSurfaceFile::new();
        read_file_from_bytes(&mut file, Path::new("square.obj"), SQUARE.as_bytes(), ReadOptions::default()).unwrap();

        assert_eq!(file.number_of_points(), 4);
        assert_eq!(file.points()[2], Vec3(1.0, 1.0, 0.0));
        assert_eq!(file.normals()[0], Vec3(0.0, 0.0, 1.0));
        assert_eq!(file.triangles(), &[[0, 1, 2], [0, 2, 3]]);
        assert_eq!(file.color_mode(), ColorMode::OnePerObject);
        assert_eq!(file.point_colors_rgba()[3], [255, 0, 0, 255]);

        let topology = file.to_topology_file();
        assert_eq!(topology.number_of_tiles(), 2);
        assert_eq!(file.to_coordinate_file().number_of_coordinates(), 4);
    }

    #[test]
    fn colors_per_polygon(){
        let text = "P 0.3 0.3 0.4 10 1 4
            0 0 0  1 0 0  0 1 0  1 1 0
            0 0 1  0 0 1  0 0 1  0 0 1
            2
            1
            1 0 0 1
            0 0 1 1
            3 6
            0 1 2  1 3 2
        ";

        let mut file = MniObjSurfaceFile::new();
        read_file_from_bytes(&mut file, Path::new("two.obj"), text.as_bytes(), ReadOptions::default()).unwrap();
        assert_eq!(file.point_color(0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(file.point_color(3), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn indices_are_checked(){
        let text = SQUARE.replace("0 1 2 3", "0 1 2 9");
        let mut file = MniObjSurfaceFile::new();
        let error = read_file_from_bytes(&mut file, Path::new("bad.obj"), text.as_bytes(), ReadOptions::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::VertexOutOfRange);
    }

    #[test]
    fn only_polygons(){
        let mut file = MniObjSurfaceFile::new();
        let error = read_file_from_bytes(&mut file, Path::new("lines.obj"), b"L 1 0", ReadOptions::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FormatUnsupported);
    }
}
