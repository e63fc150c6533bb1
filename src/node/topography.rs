
//! Topography files name the area of each node together with
//! its eccentricity and polar angle ranges.

use std::io::Write;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Fixed, Read, TextReader, parse_token};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{NodeAttributeFile, NodeAttributeTable, NodeValue, forward_to_header_and_table, read_table, write_rows, write_table_tags};


/// Written in place of an empty area name.
const EMPTY_NAME: &str = "*";

/// Visual field position of a node: mean, low and high of eccentricity and of polar angle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topography {
    pub area_name: String,
    pub eccentricity: [f32; 3],
    pub polar_angle: [f32; 3],
}

impl NodeValue for Topography {
    const TOKENS: usize = 7;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> {
        let name = tokens.first().copied().unwrap_or(EMPTY_NAME);
        let mut value = Topography {
            area_name: if name == EMPTY_NAME { String::new() } else { name.to_string() },
            ..Topography::default()
        };

        for index in 0 .. 3 {
            value.eccentricity[index] = parse_token(tokens, 1 + index, "eccentricity")?;
            value.polar_angle[index] = parse_token(tokens, 4 + index, "polar angle")?;
        }

        Ok(value)
    }

    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult {
        let name = if self.area_name.is_empty() { EMPTY_NAME } else { self.area_name.as_str() };
        write!(write, " {}", name)?;

        for value in self.eccentricity.iter().chain(&self.polar_angle) {
            write!(write, " {}", Fixed(*value))?;
        }

        Ok(())
    }

    fn read_binary(_: &mut impl Read) -> Result<Self> {
        Err(Error::unsupported("binary topography"))
    }

    fn write_binary(&self, _: &mut Vec<u8>) -> UnitResult {
        Err(Error::unsupported("binary topography"))
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct TopographyFile {
    header: FileHeader,
    table: NodeAttributeTable<Topography>,
}

impl Default for TopographyFile {
    fn default() -> Self {
        TopographyFile {
            header: FileHeader::new("Topography File", ".topography", "TopographyFile"),
            table: NodeAttributeTable::new(),
        }
    }
}

impl TopographyFile {
    pub fn new() -> Self { Self::default() }

    pub fn topography(&self, node: usize, column: usize) -> &Topography { self.table.value(node, column) }

    pub fn set_topography(&mut self, node: usize, column: usize, value: Topography) {
        self.table.set_value(node, column, value);
    }
}

impl DataFile for TopographyFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let tags = read_table(format, text, &mut self.table, |_, _, _| Ok(false))?;
        self.header.set_title(tags.title);
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 1, self.header.title(), &self.table, |_, _, _| Ok(()))?;
        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for TopographyFile {
    type Value = Topography;
    type Extra = ();

    fn table(&self) -> &NodeAttributeTable<Topography> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<Topography> { &mut self.table }
}

impl CompareForTesting for TopographyFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: topography files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            for node in 0 .. self.number_of_nodes() {
                let (mine, theirs) = (self.topography(node, column), other.topography(node, column));

                let close = mine.eccentricity.iter().chain(&mine.polar_angle)
                    .zip(theirs.eccentricity.iter().chain(&theirs.polar_angle))
                    .all(|(a, b)| (a - b).abs() <= tolerance);

                if mine.area_name != theirs.area_name || !close {
                    return Err(format!("ERROR: topography of node {} column {} does not match.", node, column));
                }
            }
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_names_are_written_as_star(){
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("v.topography");

        let mut file = TopographyFile::new();
        file.set_number_of_nodes_and_columns(2, 1);
        file.set_topography(1, 0, Topography {
            area_name: "V1".into(), eccentricity: [1.0, 0.5, 2.0], polar_angle: [90.0, 80.0, 100.0],
        });

        file.write_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n0 * 0.000000"));

        let read = TopographyFile::from_file(&path).unwrap();
        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
        assert_eq!(read.topography(0, 0).area_name, "");
    }

    #[test]
    fn binary_is_unsupported(){
        let mut file = TopographyFile::new();
        file.header_mut().set_write_format(FileFormat::Binary);
        let directory = tempfile::tempdir().unwrap();
        assert!(file.write_file(directory.path().join("b.topography")).is_err());
    }
}
