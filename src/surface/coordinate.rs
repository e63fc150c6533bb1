
//! The position of every node of a surface.

use std::io::Write;
use crate::error::{Error, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, TextReader, checked_count, parse, parse_token, tokens};
use crate::math::{Extent, Vec3};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::{self, FileHeader};
use super::SurfaceConfiguration;


#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateFile {
    header: FileHeader,
    coordinates: Vec<Vec3>,
}

impl Default for CoordinateFile {
    fn default() -> Self {
        CoordinateFile {
            header: FileHeader::new("Coordinate File", ".coord", "CoordinateFile"),
            coordinates: Vec::new(),
        }
    }
}

impl CoordinateFile {
    pub fn new() -> Self { Self::default() }

    /// A file containing the points.
    pub fn from_coordinates(coordinates: Vec<Vec3>) -> Self {
        CoordinateFile { coordinates, ..Self::default() }
    }

    pub fn number_of_coordinates(&self) -> usize { self.coordinates.len() }

    /// Resize the file, new coordinates are at the origin.
    pub fn set_number_of_coordinates(&mut self, count: usize) {
        self.coordinates.resize(count, Vec3::ZERO);
        self.header.set_modified();
    }

    pub fn add_coordinate(&mut self, position: Vec3) {
        self.coordinates.push(position);
        self.header.set_modified();
    }

    pub fn coordinate(&self, index: usize) -> Vec3 { self.coordinates[index] }

    pub fn set_coordinate(&mut self, index: usize, position: Vec3) {
        self.coordinates[index] = position;
        self.header.set_modified();
    }

    pub fn coordinates(&self) -> &[Vec3] { &self.coordinates }

    /// The shape this file describes, as declared in its header.
    pub fn configuration(&self) -> SurfaceConfiguration {
        self.header.tag(header::tag::CONFIGURATION_ID)
            .map_or(SurfaceConfiguration::Unknown, SurfaceConfiguration::from_id)
    }

    pub fn set_configuration(&mut self, configuration: SurfaceConfiguration) {
        self.header.set_tag(header::tag::CONFIGURATION_ID, configuration.id());
    }

    /// The smallest box containing all coordinates, `None` for an empty file.
    pub fn bounds(&self) -> Option<Extent> {
        let (first, rest) = self.coordinates.split_first()?;

        Some(rest.iter().fold(Extent { min: *first, max: *first }, |extent, &point| Extent {
            min: Vec3(extent.min.0.min(point.0), extent.min.1.min(point.1), extent.min.2.min(point.2)),
            max: Vec3(extent.max.0.max(point.0), extent.max.1.max(point.1), extent.max.2.max(point.2)),
        }))
    }

    /// The index of the coordinate nearest to the point.
    /// Coordinates before `start` are not considered.
    pub fn closest_coordinate(&self, point: Vec3, start: usize) -> Option<usize> {
        self.coordinates.iter().enumerate().skip(start)
            .map(|(index, coordinate)| (index, coordinate.distance_squared(point)))
            .fold(None, |closest: Option<(usize, f32)>, (index, distance)| match closest {
                Some((_, closest_distance)) if closest_distance <= distance => closest,
                _ => Some((index, distance)),
            })
            .map(|(index, _)| index)
    }

    pub fn distance_to_point(&self, index: usize, point: Vec3) -> f32 {
        self.coordinates[index].distance(point)
    }

    pub fn distance_between(&self, first: usize, second: usize) -> f32 {
        self.coordinates[first].distance(self.coordinates[second])
    }

    /// The coordinate at a node index read from a file.
    pub fn checked_coordinate(&self, node: i32) -> crate::error::Result<Vec3> {
        usize::try_from(node).ok()
            .and_then(|index| self.coordinates.get(index).copied())
            .ok_or(Error::VertexOutOfRange { vertex: i64::from(node), count: self.coordinates.len() })
    }
}

impl DataFile for CoordinateFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.coordinates.clear();
    }

    fn is_empty(&self) -> bool { self.coordinates.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        match format {
            FileFormat::Ascii => {
                let count: i32 = parse(&text.read_non_empty_line()?, "number of coordinates")?;
                let count = i32_to_usize(count, "Number of coordinates is less than zero.")?;
                let mut coordinates = Vec::with_capacity(count.min(text.remaining().len() / 8));

                for _ in 0 .. count {
                    let line = text.read_non_empty_line()?;
                    let tokens = tokens(&line);

                    coordinates.push(Vec3(
                        parse_token(&tokens, 1, "x coordinate")?,
                        parse_token(&tokens, 2, "y coordinate")?,
                        parse_token(&tokens, 3, "z coordinate")?,
                    ));
                }

                self.coordinates = coordinates;
            },

            FileFormat::Binary => {
                let mut bytes = text.remaining();
                let start = bytes.len();

                let count = i32::read(&mut bytes)?;
                let count = if count > 0 { i32_to_usize(count, "number of coordinates")? } else { 0 };
                let values = f32::read_vec(&mut bytes, checked_count(count, 3, "number of coordinates")?, 3 * 4096)?;

                self.coordinates = values.chunks_exact(3)
                    .map(|xyz| Vec3(xyz[0], xyz[1], xyz[2]))
                    .collect();

                text.advance(start - bytes.len());
            },

            other => return Err(Error::unsupported(format!("coordinates in {} format", other))),
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        match format {
            FileFormat::Ascii => {
                writeln!(write, "{}", self.coordinates.len())?;

                for (index, Vec3(x, y, z)) in self.coordinates.iter().enumerate() {
                    writeln!(write, "{} {} {} {}", index, Fixed(*x), Fixed(*y), Fixed(*z))?;
                }
            },

            FileFormat::Binary => {
                usize_to_i32(self.coordinates.len()).write(write)?;

                for coordinate in &self.coordinates {
                    f32::write_slice(write, &coordinate.to_array())?;
                }
            },

            other => return Err(Error::unsupported(format!("coordinates in {} format", other))),
        }

        Ok(())
    }
}

impl CompareForTesting for CoordinateFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_coordinates() != other.number_of_coordinates() {
            return Err("ERROR: The files contain a different number of coordinates.".to_string());
        }

        for (index, (mine, theirs)) in self.coordinates.iter().zip(&other.coordinates).enumerate() {
            let close = mine.to_array().iter().zip(theirs.to_array())
                .all(|(a, b)| (a - b).abs() <= tolerance);

            if !close {
                return Err(format!("ERROR: coordinate {} is not within tolerance.", index));
            }
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

    fn triangle() -> CoordinateFile {
        CoordinateFile::from_coordinates(vec![
            Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, -2.0),
        ])
    }

    #[test]
    fn round_trip_with_configuration(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = triangle();
            file.set_configuration(SurfaceConfiguration::Fiducial);
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let mut read = CoordinateFile::new();
            read_file_from_bytes(&mut read, Path::new("a.coord"), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
            assert_eq!(read.configuration(), SurfaceConfiguration::Fiducial);
        }
    }

    #[test]
    fn negative_count_is_invalid(){
        let bytes = b"BeginHeader\nEndHeader\n-3\n";
        let result = read_file_from_bytes(&mut CoordinateFile::new(), Path::new("a.coord"), bytes, ReadOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn bounds_and_nearest(){
        let file = triangle();
        let bounds = file.bounds().unwrap();
        assert_eq!(bounds.min, Vec3(0.0, 0.0, -2.0));
        assert_eq!(bounds.max, Vec3(1.0, 1.0, 0.0));

        assert_eq!(file.closest_coordinate(Vec3(0.9, 0.1, 0.0), 0), Some(1));
        assert_eq!(file.closest_coordinate(Vec3(0.9, 0.1, 0.0), 2), Some(2));
        assert_eq!(CoordinateFile::new().closest_coordinate(Vec3::ZERO, 0), None);
        assert!(file.checked_coordinate(3).is_err());
    }
}
