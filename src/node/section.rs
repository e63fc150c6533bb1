
//! Section numbers of each node, for surfaces reconstructed from slices.

use crate::error::UnitResult;
use crate::file::{CompareForTesting, DataFile};
use crate::io::TextReader;
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{NodeAttributeFile, NodeAttributeTable, forward_to_header_and_table, read_table, write_rows, write_table_tags};


/// The smallest and the largest section of a column.
/// An empty range has a minimum larger than its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRange {
    pub minimum: i32,
    pub maximum: i32,
}

impl SectionRange {
    pub const EMPTY: SectionRange = SectionRange { minimum: i32::MAX, maximum: i32::MIN };

    pub fn include(&mut self, section: i32) {
        self.minimum = self.minimum.min(section);
        self.maximum = self.maximum.max(section);
    }

    pub fn is_empty(&self) -> bool { self.minimum > self.maximum }
}

impl Default for SectionRange {
    fn default() -> Self { Self::EMPTY }
}


/// One section number per node and column.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionFile {
    header: FileHeader,
    table: NodeAttributeTable<i32, SectionRange>,
}

impl Default for SectionFile {
    fn default() -> Self {
        SectionFile {
            header: FileHeader::new("Section File", ".section", "SectionFile"),
            table: NodeAttributeTable::new(),
        }
    }
}

impl SectionFile {
    pub fn new() -> Self { Self::default() }

    pub fn section(&self, node: usize, column: usize) -> i32 {
        *self.table.value(node, column)
    }

    /// Set a section and extend the range of the column.
    pub fn set_section(&mut self, node: usize, column: usize, section: i32) {
        self.table.set_value(node, column, section);
        self.table.column_mut(column).extra.include(section);
    }

    pub fn minimum_section(&self, column: usize) -> i32 { self.table.column(column).extra.minimum }
    pub fn maximum_section(&self, column: usize) -> i32 { self.table.column(column).extra.maximum }

    /// Recompute the range of every column from its sections.
    pub fn update_ranges(&mut self) {
        for column in 0 .. self.table.number_of_columns() {
            let mut range = SectionRange::EMPTY;
            for &section in self.table.column_values(column) {
                range.include(section);
            }

            self.table.column_mut(column).extra = range;
        }
    }
}

impl DataFile for SectionFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let tags = read_table(format, text, &mut self.table, |_, _, _| Ok(false))?;
        self.header.set_title(tags.title);
        self.update_ranges();
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 0, self.header.title(), &self.table, |_, _, _| Ok(()))?;
        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for SectionFile {
    type Value = i32;
    type Extra = SectionRange;

    fn table(&self) -> &NodeAttributeTable<i32, SectionRange> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<i32, SectionRange> { &mut self.table }

    fn update_column_extras(&mut self) { self.update_ranges() }
}

impl CompareForTesting for SectionFile {
    fn compare_file_for_unit_testing(&self, other: &Self, _tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: section files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            if self.table.column_values(column) != other.table.column_values(column) {
                return Err(format!("ERROR: sections of column {} do not match.", column));
            }
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;
    use crate::deformation_map::{DeformMapNodeData, DeformationMapFile};
    use crate::error::ErrorKind;
    use crate::file::read_file_from_bytes;
    use crate::meta::ReadOptions;
    use crate::node::DeformKind;

    fn sections() -> SectionFile {
        let mut file = SectionFile::new();
        file.set_number_of_nodes_and_columns(3, 1);
        file.set_section(0, 0, 4);
        file.set_section(1, 0, 7);
        file.set_section(2, 0, 9);
        file
    }

    #[test]
    fn reset_column_updates_the_range(){
        let mut file = sections();
        assert_eq!((file.minimum_section(0), file.maximum_section(0)), (4, 9));

        file.reset_column(0);
        assert_eq!((file.minimum_section(0), file.maximum_section(0)), (0, 0));
    }

    #[test]
    fn deform_updates_the_range(){
        let mut map = DeformationMapFile::new();
        map.set_number_of_nodes(2);
        map.set_node(0, DeformMapNodeData { tile_nodes: [1, 0, 2], tile_barycentric: [1.0, 0.0, 0.0] });
        map.set_node(1, DeformMapNodeData { tile_nodes: [2, 0, 1], tile_barycentric: [1.0, 0.0, 0.0] });

        let deformed = sections().deform(&map, DeformKind::NearestNode).unwrap();
        assert_eq!(deformed.table().column_values(0), &[7, 9]);
        assert_eq!((deformed.minimum_section(0), deformed.maximum_section(0)), (7, 9));
    }

    #[test]
    fn node_count_beyond_the_file_is_invalid(){
        let text = b"BeginHeader\nEndHeader\ntag-version 0\ntag-number-of-nodes 4611686018427387904\n\
            tag-number-of-columns 1\ntag-BEGIN-DATA\n0 1\n";

        let result = read_file_from_bytes(&mut SectionFile::new(), Path::new("a.section"), text, ReadOptions::default());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::FormatInvalid);
    }

    #[test]
    fn sections_survive_a_round_trip(){
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("t.section");

        let mut file = SectionFile::new();
        file.set_number_of_nodes_and_columns(3, 1);
        file.set_section(0, 0, 5);
        file.set_section(1, 0, -2);
        file.set_section(2, 0, 5);
        assert_eq!(file.minimum_section(0), -2);
        file.write_file(&path).unwrap();

        let read = SectionFile::from_file(&path).unwrap();
        assert_eq!(read.table().column_values(0), &[5, -2, 5]);
        assert_eq!(read.minimum_section(0), -2);
        assert_eq!(read.maximum_section(0), 5);
        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
    }

    #[test]
    fn binary_round_trip(){
        let mut file = SectionFile::new();
        file.set_number_of_nodes_and_columns(2, 2);
        file.set_section(1, 1, 9);
        file.header_mut().set_write_format(FileFormat::Binary);

        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("b.section");
        file.write_file(&path).unwrap();

        let read = SectionFile::from_file(&path).unwrap();
        assert_eq!(read.header().read_format(), FileFormat::Binary);
        assert_eq!(read.section(1, 1), 9);
        assert_eq!(read.maximum_section(1), 9);
    }
}
