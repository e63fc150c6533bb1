
//! Latitude and longitude of each node on a spherical surface,
//! optionally with the latitude and longitude after a deformation.

use std::io::Write;
use crate::error::{Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, Read, TextReader, parse_bool, parse_token};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{
    NodeAttributeFile, NodeAttributeTable, NodeValue, extra_at, forward_to_header_and_table,
    numbered_tokens, read_table, write_rows, write_table_tags,
};


pub const TAG_DEFORMED_LAT_LON_VALID: &str = "tag-deformed-lat-lon-valid";


/// Coordinates of a node in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLon {
    pub latitude: f32,
    pub longitude: f32,
    pub deformed_latitude: f32,
    pub deformed_longitude: f32,
}

impl LatLon {
    fn to_array(self) -> [f32; 4] {
        [self.latitude, self.longitude, self.deformed_latitude, self.deformed_longitude]
    }

    fn from_array(values: [f32; 4]) -> Self {
        LatLon { latitude: values[0], longitude: values[1], deformed_latitude: values[2], deformed_longitude: values[3] }
    }
}

impl NodeValue for LatLon {
    const TOKENS: usize = 4;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> {
        Ok(LatLon {
            latitude: parse_token(tokens, 0, "latitude")?,
            longitude: parse_token(tokens, 1, "longitude")?,
            deformed_latitude: parse_token(tokens, 2, "deformed latitude")?,
            deformed_longitude: parse_token(tokens, 3, "deformed longitude")?,
        })
    }

    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult {
        for value in self.to_array() {
            write!(write, " {}", Fixed(value))?;
        }

        Ok(())
    }

    fn read_binary(read: &mut impl Read) -> Result<Self> {
        let mut values = [0.0; 4];
        f32::read_slice(read, &mut values)?;
        Ok(LatLon::from_array(values))
    }

    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult {
        f32::write_slice(write, &self.to_array())
    }

    fn interpolate(corners: [&Self; 3], areas: [f32; 3]) -> Option<Self> {
        let weights = crate::math::barycentric_weights(areas)?;
        let mut values = [0.0; 4];

        for (corner, weight) in corners.iter().zip(weights) {
            for (sum, value) in values.iter_mut().zip(corner.to_array()) {
                *sum += value * weight;
            }
        }

        Some(LatLon::from_array(values))
    }
}


/// Whether a column holds valid deformed coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatLonColumn {
    pub deformed_valid: bool,
}


#[derive(Debug, Clone, PartialEq)]
pub struct LatLonFile {
    header: FileHeader,
    table: NodeAttributeTable<LatLon, LatLonColumn>,
}

impl Default for LatLonFile {
    fn default() -> Self {
        LatLonFile {
            header: FileHeader::new("Lat Lon File", ".latlon", "LatLonFile"),
            table: NodeAttributeTable::new(),
        }
    }
}

impl LatLonFile {
    pub fn new() -> Self { Self::default() }

    pub fn lat_lon(&self, node: usize, column: usize) -> (f32, f32) {
        let value = self.table.value(node, column);
        (value.latitude, value.longitude)
    }

    pub fn set_lat_lon(&mut self, node: usize, column: usize, latitude: f32, longitude: f32) {
        let mut value = *self.table.value(node, column);
        value.latitude = latitude;
        value.longitude = longitude;
        self.table.set_value(node, column, value);
    }

    pub fn deformed_lat_lon(&self, node: usize, column: usize) -> (f32, f32) {
        let value = self.table.value(node, column);
        (value.deformed_latitude, value.deformed_longitude)
    }

    /// Set the deformed coordinates, marking the column as having deformed coordinates.
    pub fn set_deformed_lat_lon(&mut self, node: usize, column: usize, latitude: f32, longitude: f32) {
        let mut value = *self.table.value(node, column);
        value.deformed_latitude = latitude;
        value.deformed_longitude = longitude;
        self.table.set_value(node, column, value);
        self.table.column_mut(column).extra.deformed_valid = true;
    }

    pub fn deformed_lat_lon_valid(&self, column: usize) -> bool {
        self.table.column(column).extra.deformed_valid
    }
}

impl DataFile for LatLonFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let tags = read_table(format, text, &mut self.table, |extras, tag, value| {
            if tag != TAG_DEFORMED_LAT_LON_VALID { return Ok(false); }

            let (index, values) = numbered_tokens(value)?;
            extra_at(extras, index)?.deformed_valid = values.first().map_or(false, |token| parse_bool(token));
            Ok(true)
        })?;

        self.header.set_title(tags.title);
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 1, self.header.title(), &self.table, |write, index, column| {
            writeln!(write, "{} {} {}", TAG_DEFORMED_LAT_LON_VALID, index, column.deformed_valid)?;
            Ok(())
        })?;

        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for LatLonFile {
    type Value = LatLon;
    type Extra = LatLonColumn;

    fn table(&self) -> &NodeAttributeTable<LatLon, LatLonColumn> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<LatLon, LatLonColumn> { &mut self.table }
}

impl CompareForTesting for LatLonFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: lat lon files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            for node in 0 .. self.number_of_nodes() {
                let mine = self.table.value(node, column).to_array();
                let theirs = other.table.value(node, column).to_array();

                if mine.iter().zip(theirs).any(|(a, b)| (a - b).abs() > tolerance) {
                    return Err(format!("ERROR: lat lon of node {} column {} is not within tolerance.", node, column));
                }
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

    #[test]
    fn round_trip_keeps_deformed_flag(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = LatLonFile::new();
            file.set_number_of_nodes_and_columns(2, 2);
            file.set_lat_lon(0, 0, 45.0, -90.0);
            file.set_deformed_lat_lon(1, 1, 10.0, 20.0);
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let mut read = LatLonFile::new();
            read_file_from_bytes(&mut read, Path::new("a.latlon"), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
            assert!(!read.deformed_lat_lon_valid(0));
            assert!(read.deformed_lat_lon_valid(1));
            assert_eq!(read.deformed_lat_lon(1, 1), (10.0, 20.0));
        }
    }

    #[test]
    fn interpolation_weights_all_components(){
        let a = LatLon::from_array([0.0, 0.0, 0.0, 0.0]);
        let b = LatLon::from_array([4.0, 8.0, 0.0, 0.0]);
        let value = LatLon::interpolate([&a, &b, &a], [0.0, 1.0, 0.0]).unwrap();
        assert_eq!(value.latitude, 0.0);

        let value = LatLon::interpolate([&a, &b, &a], [0.0, 0.0, 1.0]).unwrap();
        assert_eq!(value.longitude, 8.0);
    }
}
