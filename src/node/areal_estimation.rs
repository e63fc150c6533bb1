
//! Areal estimation files store, for each node, up to four areas
//! that the node may belong to and the probability of each area.

use std::io::Write;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, Read, TextReader, parse, parse_token, tokens};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::paint::{NameTable, remap_index};
use super::{
    ColumnInfo, NodeAttributeFile, NodeAttributeTable, NodeValue, forward_to_header_and_table,
    read_rows, read_table_head, tag, write_rows, write_table_tags,
};


/// Number of areas stored for each node.
pub const AREAS_PER_NODE: usize = 4;

/// The candidate areas of one node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArealEstimation {

    /// Indices into the area name table.
    pub area_names: [i32; AREAS_PER_NODE],

    pub probabilities: [f32; AREAS_PER_NODE],
}

impl NodeValue for ArealEstimation {
    const TOKENS: usize = 2 * AREAS_PER_NODE;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> {
        let mut value = ArealEstimation::default();

        for area in 0 .. AREAS_PER_NODE {
            value.area_names[area] = parse_token(tokens, 2 * area, "area name index")?;
            value.probabilities[area] = parse_token(tokens, 2 * area + 1, "area probability")?;
        }

        Ok(value)
    }

    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult {
        for (name, probability) in self.area_names.iter().zip(&self.probabilities) {
            write!(write, " {} {}", name, Fixed(*probability))?;
        }

        Ok(())
    }

    fn read_binary(read: &mut impl Read) -> Result<Self> {
        let mut value = ArealEstimation::default();

        for area in 0 .. AREAS_PER_NODE {
            value.area_names[area] = i32::read(read)?;
            value.probabilities[area] = f32::read(read)?;
        }

        Ok(value)
    }

    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult {
        for (name, probability) in self.area_names.iter().zip(&self.probabilities) {
            name.write(write)?;
            probability.write(write)?;
        }

        Ok(())
    }
}


/// Candidate areas and probabilities for each node and column.
#[derive(Debug, Clone, PartialEq)]
pub struct ArealEstimationFile {
    header: FileHeader,
    table: NodeAttributeTable<ArealEstimation>,
    names: NameTable,
}

impl Default for ArealEstimationFile {
    fn default() -> Self {
        ArealEstimationFile {
            header: FileHeader::new("Areal Estimation File", ".areal_estimation", "ArealEstimationFile"),
            table: NodeAttributeTable::new(),
            names: NameTable::default(),
        }
    }
}

impl ArealEstimationFile {
    pub fn new() -> Self { Self::default() }

    pub fn area_names(&self) -> &NameTable { &self.names }

    /// Add an area name if it does not exist yet and return its index.
    /// Index zero is reserved for the unassigned name.
    pub fn add_area_name(&mut self, name: &str) -> usize {
        let count = self.names.len();
        let index = self.names.add(name);
        if self.names.len() != count { self.header.set_modified(); }
        index
    }

    pub fn area_name(&self, index: usize) -> Option<&str> { self.names.name(index) }

    pub fn node_data(&self, node: usize, column: usize) -> &ArealEstimation { self.table.value(node, column) }

    pub fn set_node_data(&mut self, node: usize, column: usize, data: ArealEstimation) {
        self.table.set_value(node, column, data);
    }

    /// Set the areas of a node by name, adding names as needed.
    pub fn set_node_areas(&mut self, node: usize, column: usize, areas: [(&str, f32); AREAS_PER_NODE]) {
        let mut data = ArealEstimation::default();

        for (area, (name, probability)) in areas.iter().enumerate() {
            data.area_names[area] = crate::error::usize_to_i32(self.add_area_name(name));
            data.probabilities[area] = *probability;
        }

        self.set_node_data(node, column, data);
    }

    /// Read the count line and the `index name` lines that follow `tag-BEGIN-DATA`.
    fn read_names(&mut self, text: &mut TextReader<'_>) -> Result<Vec<usize>> {
        let count: usize = parse(&text.read_non_empty_line()?, "number of area names")?;
        if count == 0 {
            return Err(Error::invalid("no area names in file"));
        }

        self.names.read_indexed_names(text, count)
    }

    fn remap_table(&mut self, remap: &[usize]) -> UnitResult {
        for column in 0 .. self.table.number_of_columns() {
            let values = self.table.column_values(column).iter()
                .map(|value| Self::remap_names(value, remap))
                .collect();

            self.table.set_column_values(column, values)?;
        }

        Ok(())
    }

    /// Single column files without column indices in their tags,
    /// where the node count follows the area names.
    fn read_version_1(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let mut info = ColumnInfo { comment: self.header.comment().to_string(), ..ColumnInfo::default() };

        loop {
            let line = text.read_tag_line()?;
            match line.tag.as_str() {
                tag::BEGIN_DATA => break,
                tag::COLUMN_NAME | tag::COLUMN_NAME_ALIAS => info.name = line.value,
                tag::LONG_NAME => info.long_name = line.value,
                tag::TITLE => self.header.set_title(line.value),
                _ => {},
            }
        }

        let remap = self.read_names(text)?;
        let number_of_nodes = parse(&text.read_non_empty_line()?, "number of nodes")?;
        text.check_count(number_of_nodes, 2, "number of nodes")?;

        self.table.prepare_for_reading(number_of_nodes, vec![info], Vec::new());
        read_rows(FileFormat::Ascii, text, &mut self.table)?;
        self.remap_table(&remap)
    }
}

impl DataFile for ArealEstimationFile {
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
        let mut peek = text.clone();
        let first = peek.read_tag_line()?;

        if matches!(first.tag.as_str(), tag::VERSION | tag::VERSION_ALIAS) && first.value == "1" {
            *text = peek;
            return self.read_version_1(text);
        }

        let tags = read_table_head(text, &mut self.table, |_, _, _| Ok(false))?;
        if tags.version != 2 {
            return Err(Error::invalid(format!("areal estimation file version {}", tags.version)));
        }

        self.header.set_title(tags.title);

        let remap = self.read_names(text)?;
        read_rows(format, text, &mut self.table)?;
        self.remap_table(&remap)
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 2, self.header.title(), &self.table, |_, _, _| Ok(()))?;

        writeln!(write, "{}", self.names.len())?;
        self.names.write_indexed_names(write)?;
        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for ArealEstimationFile {
    type Value = ArealEstimation;
    type Extra = ();

    fn table(&self) -> &NodeAttributeTable<ArealEstimation> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<ArealEstimation> { &mut self.table }

    fn merge_name_tables(&mut self, other: &Self) -> Vec<usize> {
        self.names.merge(&other.names)
    }

    fn remap_names(value: &ArealEstimation, remap: &[usize]) -> ArealEstimation {
        ArealEstimation {
            area_names: value.area_names.map(|index| remap_index(index, remap)),
            probabilities: value.probabilities,
        }
    }
}

impl CompareForTesting for ArealEstimationFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: areal estimation files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            for node in 0 .. self.number_of_nodes() {
                let (mine, theirs) = (self.node_data(node, column), other.node_data(node, column));

                for area in 0 .. AREAS_PER_NODE {
                    let name = |file: &Self, data: &ArealEstimation| {
                        usize::try_from(data.area_names[area]).ok().and_then(|index| file.area_name(index).map(str::to_string))
                    };

                    if name(self, mine) != name(other, theirs) {
                        return Err(format!("ERROR: area names of node {} do not match.", node));
                    }

                    if (mine.probabilities[area] - theirs.probabilities[area]).abs() > tolerance {
                        return Err(format!("ERROR: probabilities of node {} are not within tolerance.", node));
                    }
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

    fn estimation() -> ArealEstimationFile {
        let mut file = ArealEstimationFile::new();
        file.set_number_of_nodes_and_columns(2, 1);
        file.set_column_name(0, "estimate");
        file.set_node_areas(0, 0, [("V1", 0.5), ("V2", 0.25), ("MT", 0.25), ("???", 0.0)]);
        file.set_node_areas(1, 0, [("V2", 1.0), ("???", 0.0), ("???", 0.0), ("???", 0.0)]);
        file
    }

    #[test]
    fn names_are_deduplicated(){
        let mut file = ArealEstimationFile::new();
        assert_eq!(file.add_area_name("A"), 1);
        assert_eq!(file.add_area_name("B"), 2);
        assert_eq!(file.add_area_name("A"), 1);
    }

    #[test]
    fn version_2_round_trip(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = estimation();
            file.header_mut().set_write_format(format);
            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

            let mut read = ArealEstimationFile::new();
            read_file_from_bytes(&mut read, Path::new("a.areal_estimation"), &bytes, ReadOptions::default()).unwrap();
            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
            assert_eq!(read.column_name(0), "estimate");
        }
    }

    #[test]
    fn version_1_single_column(){
        let text = b"BeginHeader\ncomment legacy\nEndHeader\ntag-version 1\ntag-short-name old\n\
            tag-BEGIN-DATA\n2\n0 ???\n1 V1\n2\n0 1 0.9 0 0.1 0 0 0 0\n1 0 0 0 0 0 0 0 0\n";

        let mut file = ArealEstimationFile::new();
        read_file_from_bytes(&mut file, Path::new("a.areal_estimation"), text, ReadOptions::default()).unwrap();

        assert_eq!(file.number_of_columns(), 1);
        assert_eq!(file.column_name(0), "old");
        assert_eq!(file.column_comment(0), "legacy");
        assert_eq!(file.node_data(0, 0).area_names[0], 1);
        assert_eq!(file.area_name(1), Some("V1"));
    }

    #[test]
    fn append_merges_names(){
        let mut first = estimation();
        let mut second = ArealEstimationFile::new();
        second.set_number_of_nodes_and_columns(2, 1);
        second.set_node_areas(0, 0, [("MT", 1.0), ("???", 0.0), ("???", 0.0), ("???", 0.0)]);

        first.append(&second).unwrap();
        let index = first.node_data(0, 1).area_names[0];
        assert_eq!(first.area_name(index as usize), Some("MT"));
    }
}
