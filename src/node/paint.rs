
//! Paint files assign a named region to each node.
//! The nodes store indices into a table of paint names.

use std::io::Write;
use crate::error::{Error, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{TextReader, parse, split_numbered_value};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{
    NodeAttributeFile, NodeAttributeTable, forward_to_header_and_table,
    read_rows, read_table_head, write_column_tags, write_rows, write_table_head,
};


/// The name at index zero, used for nodes without paint.
pub const UNASSIGNED_NAME: &str = "???";

pub const TAG_NUMBER_OF_PAINT_NAMES: &str = "tag-number-of-paint-names";


/// A list of names where each name is stored once.
/// Index zero is always the unassigned name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTable {
    names: Vec<String>,
}

impl Default for NameTable {
    fn default() -> Self { NameTable { names: vec![UNASSIGNED_NAME.to_string()] } }
}

impl NameTable {

    /// Add the name if it is not in the table yet. Returns the index of the name.
    pub fn add(&mut self, name: &str) -> usize {
        match self.index_of(name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|existing| existing == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn set_name(&mut self, index: usize, name: impl Into<String>) {
        if let Some(existing) = self.names.get_mut(index) {
            *existing = name.into();
        }
    }

    pub fn len(&self) -> usize { self.names.len() }
    pub fn is_empty(&self) -> bool { self.names.is_empty() }
    pub fn names(&self) -> &[String] { &self.names }

    /// Add all names of the other table.
    /// Returns the index in this table of each name of the other table.
    pub fn merge(&mut self, other: &NameTable) -> Vec<usize> {
        other.names.iter().map(|name| self.add(name)).collect()
    }

    /// Read `count` lines of `index name`.
    /// Returns the index in this table of each index of the file.
    pub(crate) fn read_indexed_names(&mut self, text: &mut TextReader<'_>, count: usize) -> crate::error::Result<Vec<usize>> {
        text.check_count(count, 2, "number of names")?;
        let mut remap = vec![0; count];

        for _ in 0 .. count {
            let line = text.read_non_empty_line()?;
            let (index, name) = split_numbered_value(line.trim())?;

            let slot = remap.get_mut(index)
                .ok_or_else(|| Error::invalid(format!("name index {} of {} names", index, count)))?;

            *slot = self.add(name);
        }

        Ok(remap)
    }

    /// Write the names as lines of `index name`.
    pub(crate) fn write_indexed_names(&self, write: &mut Vec<u8>) -> UnitResult {
        for (index, name) in self.names.iter().enumerate() {
            writeln!(write, "{} {}", index, name)?;
        }

        Ok(())
    }
}

/// Replace a name index read from a file with the index in the name table.
pub(crate) fn remap_index(index: i32, remap: &[usize]) -> i32 {
    usize::try_from(index).ok()
        .and_then(|index| remap.get(index))
        .map_or(index, |&index| crate::error::usize_to_i32(index))
}


/// One paint name index per node and column.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintFile {
    header: FileHeader,
    table: NodeAttributeTable<i32>,
    names: NameTable,
}

impl Default for PaintFile {
    fn default() -> Self {
        PaintFile {
            header: FileHeader::new("Paint File", ".paint", "PaintFile"),
            table: NodeAttributeTable::new(),
            names: NameTable::default(),
        }
    }
}

impl PaintFile {
    pub fn new() -> Self { Self::default() }

    pub fn paint_names(&self) -> &NameTable { &self.names }

    /// Add a paint name if it does not exist yet and return its index.
    pub fn add_paint_name(&mut self, name: &str) -> usize {
        let count = self.names.len();
        let index = self.names.add(name);
        if self.names.len() != count { self.header.set_modified(); }
        index
    }

    pub fn paint_name(&self, index: usize) -> Option<&str> { self.names.name(index) }

    pub fn paint(&self, node: usize, column: usize) -> i32 { *self.table.value(node, column) }

    pub fn set_paint(&mut self, node: usize, column: usize, name_index: i32) {
        self.table.set_value(node, column, name_index);
    }

    /// The name of the paint of a node.
    pub fn paint_name_of_node(&self, node: usize, column: usize) -> Option<&str> {
        usize::try_from(self.paint(node, column)).ok().and_then(|index| self.names.name(index))
    }

    /// Assign the paint with this name to a node, adding the name if needed.
    pub fn set_paint_name_of_node(&mut self, node: usize, column: usize, name: &str) {
        let index = self.add_paint_name(name);
        self.set_paint(node, column, crate::error::usize_to_i32(index));
    }
}

impl DataFile for PaintFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
        self.names = NameTable::default();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let mut name_count = 0;

        let tags = read_table_head(text, &mut self.table, |_, tag, value| {
            if tag != TAG_NUMBER_OF_PAINT_NAMES { return Ok(false); }
            name_count = parse(value, "number of paint names")?;
            Ok(true)
        })?;

        self.header.set_title(tags.title);

        let remap = self.names.read_indexed_names(text, name_count)?;
        read_rows(format, text, &mut self.table)?;

        for column in 0 .. self.table.number_of_columns() {
            let values = self.table.column_values(column).iter()
                .map(|&index| remap_index(index, &remap))
                .collect();

            self.table.set_column_values(column, values)?;
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_head(write, 1, self.header.title(), &self.table)?;
        writeln!(write, "{} {}", TAG_NUMBER_OF_PAINT_NAMES, self.names.len())?;
        write_column_tags(write, &self.table, |_, _, _| Ok(()))?;

        self.names.write_indexed_names(write)?;
        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for PaintFile {
    type Value = i32;
    type Extra = ();

    fn table(&self) -> &NodeAttributeTable<i32> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<i32> { &mut self.table }

    fn merge_name_tables(&mut self, other: &Self) -> Vec<usize> {
        self.names.merge(&other.names)
    }

    fn remap_names(value: &i32, remap: &[usize]) -> i32 {
        remap_index(*value, remap)
    }
}

impl CompareForTesting for PaintFile {
    fn compare_file_for_unit_testing(&self, other: &Self, _tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: paint files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            for node in 0 .. self.number_of_nodes() {
                if self.paint_name_of_node(node, column) != other.paint_name_of_node(node, column) {
                    return Err(format!("ERROR: paint of node {} in column {} does not match.", node, column));
                }
            }
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::deformation_map::{DeformMapNodeData, DeformationMapFile};
    use crate::error::ErrorKind;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{CommentMode, ReadOptions, WriteOptions};
    use crate::node::{ColumnDestination, DeformKind};
    use std::path::Path;

    fn paint(names: &[&str]) -> PaintFile {
        let mut file = PaintFile::new();
        file.set_number_of_nodes_and_columns(names.len(), 1);
        file.set_column_name(0, "lobes");

        for (node, name) in names.iter().enumerate() {
            file.set_paint_name_of_node(node, 0, name);
        }

        file
    }

    #[test]
    fn names_are_unique(){
        let mut file = PaintFile::new();
        assert_eq!(file.add_paint_name("A"), 1);
        assert_eq!(file.add_paint_name("B"), 2);
        assert_eq!(file.add_paint_name("A"), 1);
        assert_eq!(file.paint_name(0), Some(UNASSIGNED_NAME));
    }

    #[test]
    fn round_trip_in_both_formats(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = paint(&["frontal", "occipital", "frontal"]);
            file.header_mut().set_write_format(format);
            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

            let mut read = PaintFile::new();
            read_file_from_bytes(&mut read, Path::new("a.paint"), &bytes, ReadOptions::default()).unwrap();
            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
            assert_eq!(read.table().column_name(0), "lobes");
        }
    }

    #[test]
    fn append_remaps_names(){
        let mut first = paint(&["frontal", "parietal"]);
        let second = paint(&["parietal", "temporal"]);

        first.append(&second).unwrap();
        assert_eq!(first.number_of_columns(), 2);
        assert_eq!(first.paint_name_of_node(0, 1), Some("parietal"));
        assert_eq!(first.paint_name_of_node(1, 1), Some("temporal"));
        assert_eq!(first.paint_names().len(), 4);
    }

    #[test]
    fn append_requires_matching_nodes(){
        let mut first = paint(&["a", "b"]);
        let second = paint(&["a", "b", "c"]);
        assert!(first.append(&second).is_err());

        let mut empty = PaintFile::new();
        empty.append(&second).unwrap();
        assert_eq!(empty.number_of_nodes(), 3);
    }

    #[test]
    fn append_skips_and_replaces_columns(){
        let mut first = paint(&["frontal", "parietal"]);

        let mut second = paint(&["parietal", "temporal"]);
        second.append(&paint(&["occipital", "occipital"])).unwrap();
        second.set_column_name(1, "replacement");

        let destination = [ColumnDestination::Skip, ColumnDestination::Existing(0)];
        first.append_with(&second, &destination, CommentMode::LeaveAsIs).unwrap();

        assert_eq!(first.number_of_columns(), 1);
        assert_eq!(first.column_name(0), "replacement");
        assert_eq!(first.paint_name_of_node(0, 0), Some("occipital"));
        assert_eq!(first.paint_name_of_node(1, 0), Some("occipital"));

        let missing = [ColumnDestination::Skip, ColumnDestination::Existing(3)];
        let error = first.append_with(&second, &missing, CommentMode::LeaveAsIs).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ColumnMismatch);

        let too_few = [ColumnDestination::New];
        assert_eq!(first.append_with(&second, &too_few, CommentMode::LeaveAsIs).unwrap_err().kind(), ErrorKind::ColumnMismatch);
    }

    #[test]
    fn removing_appended_columns_restores_the_file(){
        let original = paint(&["frontal", "parietal", "frontal"]);

        let mut other = paint(&["temporal", "insula", "frontal"]);
        other.append(&paint(&["a", "b", "c"])).unwrap();

        let mut appended = original.clone();
        appended.append(&other).unwrap();
        assert_eq!(appended.number_of_columns(), 3);

        appended.remove_column(2);
        appended.remove_column(1);
        assert_eq!(appended.compare_file_for_unit_testing(&original, 0.0), Ok(()));
        assert_eq!(appended.column_name(0), "lobes");
    }

    #[test]
    fn deform_leaves_unmapped_nodes_unassigned(){
        let file = paint(&["frontal", "parietal", "temporal"]);

        let mut map = DeformationMapFile::new();
        map.set_number_of_nodes(2);
        map.set_node(0, DeformMapNodeData { tile_nodes: [1, 0, 2], tile_barycentric: [0.2, 0.3, 0.5] });

        for kind in [DeformKind::NearestNode, DeformKind::TileAreas] {
            let deformed = file.deform(&map, kind).unwrap();
            assert_eq!(deformed.number_of_nodes(), 2);
            assert_eq!(deformed.paint_name_of_node(0, 0), Some("parietal"));
            assert_eq!(deformed.paint_name_of_node(1, 0), Some(UNASSIGNED_NAME));
        }
    }
}
