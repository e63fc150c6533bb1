
//! Deformation fields keep, for each node and deformation,
//! the source triangle the node was mapped to, along with the
//! files of the surfaces before and after the deformation.

use std::io::Write;
use crate::deformation_map::DeformMapNodeData;
use crate::error::{Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, Read, TextReader, parse_token};
use crate::math::{Vec3, unproject};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{
    NodeAttributeFile, NodeAttributeTable, NodeValue, extra_at, forward_to_header_and_table,
    numbered_tokens, read_table, write_rows, write_table_tags,
};


pub mod tag {
    pub const PRE_DEFORMED_COORD_FILE: &str = "tag-pre-deformed-coord-file";
    pub const DEFORMED_COORD_FILE: &str = "tag-deformed-coord-file";
    pub const DEFORMED_TOPO_FILE: &str = "tag-deformed-topo-file";
    pub const TOPO_FILE: &str = "tag-topo-file";
    pub const COORD_FILE: &str = "tag-coord-file";

    /// Older files use these spellings.
    pub const PRE_DEFORMED_COORD_FILE_ALIAS: &str = "tag-original-coord-file";
    pub const DEFORMED_TOPO_FILE_ALIAS: &str = "tag-topology-file";
}


impl NodeValue for DeformMapNodeData {
    const TOKENS: usize = 6;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> {
        let mut data = DeformMapNodeData::UNRESOLVED;

        for corner in 0 .. 3 {
            data.tile_nodes[corner] = parse_token(tokens, corner, "tile node")?;
            data.tile_barycentric[corner] = parse_token(tokens, 3 + corner, "tile area")?;
        }

        Ok(data)
    }

    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult {
        let [n0, n1, n2] = self.tile_nodes;
        let [a0, a1, a2] = self.tile_barycentric;
        write!(write, " {} {} {} {} {} {}", n0, n1, n2, Fixed(a0), Fixed(a1), Fixed(a2))?;
        Ok(())
    }

    fn read_binary(read: &mut impl Read) -> Result<Self> {
        let mut data = DeformMapNodeData::UNRESOLVED;
        i32::read_slice(read, &mut data.tile_nodes)?;
        f32::read_slice(read, &mut data.tile_barycentric)?;
        Ok(data)
    }

    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult {
        i32::write_slice(write, &self.tile_nodes)?;
        f32::write_slice(write, &self.tile_barycentric)
    }
}


/// The files that a deformation column was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeformationFieldColumn {
    pub pre_deformed_coordinate_file: String,
    pub deformed_coordinate_file: String,
    pub deformed_topology_file: String,
    pub topology_file: String,
    pub coordinate_file: String,
}

impl DeformationFieldColumn {
    fn files(&self) -> [(&'static str, &String); 5] {
        [
            (tag::PRE_DEFORMED_COORD_FILE, &self.pre_deformed_coordinate_file),
            (tag::DEFORMED_COORD_FILE, &self.deformed_coordinate_file),
            (tag::DEFORMED_TOPO_FILE, &self.deformed_topology_file),
            (tag::TOPO_FILE, &self.topology_file),
            (tag::COORD_FILE, &self.coordinate_file),
        ]
    }

    fn file_mut(&mut self, file_tag: &str) -> Option<&mut String> {
        match file_tag {
            tag::PRE_DEFORMED_COORD_FILE | tag::PRE_DEFORMED_COORD_FILE_ALIAS => Some(&mut self.pre_deformed_coordinate_file),
            tag::DEFORMED_COORD_FILE => Some(&mut self.deformed_coordinate_file),
            tag::DEFORMED_TOPO_FILE | tag::DEFORMED_TOPO_FILE_ALIAS => Some(&mut self.deformed_topology_file),
            tag::TOPO_FILE => Some(&mut self.topology_file),
            tag::COORD_FILE => Some(&mut self.coordinate_file),
            _ => None,
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct DeformationFieldFile {
    header: FileHeader,
    table: NodeAttributeTable<DeformMapNodeData, DeformationFieldColumn>,
}

impl Default for DeformationFieldFile {
    fn default() -> Self {
        DeformationFieldFile {
            header: FileHeader::new("Deformation Field File", ".deform_field", "DeformationFieldFile"),
            table: NodeAttributeTable::new(),
        }
    }
}

impl DeformationFieldFile {
    pub fn new() -> Self { Self::default() }

    pub fn node_data(&self, node: usize, column: usize) -> &DeformMapNodeData { self.table.value(node, column) }

    pub fn set_node_data(&mut self, node: usize, column: usize, data: DeformMapNodeData) {
        self.table.set_value(node, column, data);
    }

    pub fn column_files(&self, column: usize) -> &DeformationFieldColumn { &self.table.column(column).extra }

    pub fn column_files_mut(&mut self, column: usize) -> &mut DeformationFieldColumn {
        &mut self.table.column_mut(column).extra
    }

    /// The position of a node on the source surface with these coordinates.
    /// `None` for unresolved nodes and tiles outside of the coordinates.
    pub fn source_position(&self, node: usize, column: usize, coordinates: &[Vec3]) -> Option<Vec3> {
        let data = self.node_data(node, column);
        if !data.tile_nodes.iter().all(|&node| node >= 0) { return None; }

        let corner = |index: usize| usize::try_from(data.tile_nodes[index]).ok()
            .and_then(|node| coordinates.get(node).copied());

        unproject([corner(0)?, corner(1)?, corner(2)?], data.tile_barycentric)
    }
}

impl DataFile for DeformationFieldFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let tags = read_table(format, text, &mut self.table, |extras, file_tag, value| {
            if DeformationFieldColumn::default().file_mut(file_tag).is_none() { return Ok(false); }

            let (index, values) = numbered_tokens(value)?;
            if let Some(file) = extra_at(extras, index)?.file_mut(file_tag) {
                *file = values.join(" ");
            }

            Ok(true)
        })?;

        self.header.set_title(tags.title);
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 1, self.header.title(), &self.table, |write, index, column| {
            for (file_tag, name) in column.files() {
                writeln!(write, "{} {} {}", file_tag, index, name)?;
            }

            Ok(())
        })?;

        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for DeformationFieldFile {
    type Value = DeformMapNodeData;
    type Extra = DeformationFieldColumn;

    fn table(&self) -> &NodeAttributeTable<DeformMapNodeData, DeformationFieldColumn> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<DeformMapNodeData, DeformationFieldColumn> { &mut self.table }
}

impl CompareForTesting for DeformationFieldFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: deformation field files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            for node in 0 .. self.number_of_nodes() {
                let (mine, theirs) = (self.node_data(node, column), other.node_data(node, column));

                if mine.tile_nodes != theirs.tile_nodes {
                    return Err(format!("ERROR: tiles of node {} column {} do not match.", node, column));
                }

                if mine.tile_barycentric.iter().zip(&theirs.tile_barycentric).any(|(a, b)| (a - b).abs() > tolerance) {
                    return Err(format!("ERROR: tile areas of node {} column {} are not within tolerance.", node, column));
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

    fn field() -> DeformationFieldFile {
        let mut file = DeformationFieldFile::new();
        file.set_number_of_nodes_and_columns(2, 1);
        file.set_node_data(0, 0, DeformMapNodeData { tile_nodes: [0, 1, 2], tile_barycentric: [0.5, 0.25, 0.25] });
        file.column_files_mut(0).topology_file = "closed.topo".into();
        file
    }

    #[test]
    fn round_trip_with_file_tags(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = field();
            file.header_mut().set_write_format(format);
            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

            let mut read = DeformationFieldFile::new();
            read_file_from_bytes(&mut read, Path::new("a.deform_field"), &bytes, ReadOptions::default()).unwrap();
            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
            assert_eq!(read.column_files(0).topology_file, "closed.topo");
            assert!(!read.node_data(1, 0).is_resolved());
        }
    }

    #[test]
    fn old_tag_spellings(){
        let text = b"tag-version 1\ntag-number-of-nodes 1\ntag-number-of-columns 1\n\
            tag-original-coord-file 0 before.coord\ntag-BEGIN-DATA\n0 -1 -1 -1 0 0 0\n";

        let mut file = DeformationFieldFile::new();
        read_file_from_bytes(&mut file, Path::new("a.deform_field"), text, ReadOptions::default()).unwrap();
        assert_eq!(file.column_files(0).pre_deformed_coordinate_file, "before.coord");
    }

    #[test]
    fn source_position(){
        let coordinates = [Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 0.0)];
        let file = field();
        assert_eq!(file.source_position(0, 0, &coordinates), Some(Vec3(0.25, 0.5, 0.0)));
        assert_eq!(file.source_position(1, 0, &coordinates), None);
    }
}
