
//! Geodesic distance files store, for each node, the distance along the surface
//! to a root node and the neighbor on the shortest path towards the root.

use std::io::Write;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, Read, TextReader, parse_token, tokens};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{NodeAttributeFile, NodeAttributeTable, NodeValue, forward_to_header_and_table, read_rows, read_table_head, write_rows, write_table_tags};


/// The path of one node towards the root node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodesicPath {

    /// The next node on the path, `-1` for the root and unreached nodes.
    pub parent: i32,

    pub distance: f32,
}

impl Default for GeodesicPath {
    fn default() -> Self { GeodesicPath { parent: -1, distance: 0.0 } }
}

impl NodeValue for GeodesicPath {
    const TOKENS: usize = 2;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> {
        Ok(GeodesicPath {
            parent: parse_token(tokens, 0, "parent node")?,
            distance: parse_token(tokens, 1, "geodesic distance")?,
        })
    }

    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult {
        write!(write, " {} {}", self.parent, Fixed(self.distance))?;
        Ok(())
    }

    fn read_binary(read: &mut impl Read) -> Result<Self> {
        Ok(GeodesicPath { parent: i32::read(read)?, distance: f32::read(read)? })
    }

    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult {
        self.parent.write(write)?;
        self.distance.write(write)
    }
}


/// The node that the distances of a column are measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootNode(pub i32);

impl Default for RootNode {
    fn default() -> Self { RootNode(-1) }
}


#[derive(Debug, Clone, PartialEq)]
pub struct GeodesicDistanceFile {
    header: FileHeader,
    table: NodeAttributeTable<GeodesicPath, RootNode>,
}

impl Default for GeodesicDistanceFile {
    fn default() -> Self {
        GeodesicDistanceFile {
            header: FileHeader::new("Geodesic Distance File", ".geodesic", "GeodesicDistanceFile"),
            table: NodeAttributeTable::new(),
        }
    }
}

impl GeodesicDistanceFile {
    pub fn new() -> Self { Self::default() }

    pub fn root_node(&self, column: usize) -> i32 { self.table.column(column).extra.0 }

    pub fn set_root_node(&mut self, column: usize, node: i32) {
        self.table.column_mut(column).extra = RootNode(node);
    }

    pub fn path(&self, node: usize, column: usize) -> GeodesicPath { *self.table.value(node, column) }

    pub fn set_path(&mut self, node: usize, column: usize, parent: i32, distance: f32) {
        self.table.set_value(node, column, GeodesicPath { parent, distance });
    }

    /// The nodes from the node to the root of the column, starting with the node.
    /// Stops when a node is revisited.
    pub fn path_to_root(&self, node: usize, column: usize) -> Vec<usize> {
        let mut path = vec![node];
        let mut current = node;

        while let Ok(parent) = usize::try_from(self.path(current, column).parent) {
            if parent >= self.number_of_nodes() || path.contains(&parent) { break; }
            path.push(parent);
            current = parent;
        }

        path
    }
}

impl DataFile for GeodesicDistanceFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let tags = read_table_head(text, &mut self.table, |_, _, _| Ok(false))?;
        self.header.set_title(tags.title);

        let column_count = self.table.number_of_columns();
        let roots: Vec<i32> = match format {
            FileFormat::Ascii if column_count == 0 => Vec::new(),
            FileFormat::Ascii => {
                let line = text.read_non_empty_line()?;
                let tokens = tokens(&line);
                (0 .. column_count).map(|column| parse_token(&tokens, column, "root node")).collect::<Result<_>>()?
            },

            FileFormat::Binary => {
                let mut bytes = text.remaining();
                let start = bytes.len();
                let roots = i32::read_vec(&mut bytes, column_count, 1024)?;
                text.advance(start - bytes.len());
                roots
            },

            other => return Err(Error::unsupported(format!("geodesic distances in {} format", other))),
        };

        for (column, root) in roots.into_iter().enumerate() {
            self.table.column_mut(column).extra = RootNode(root);
        }

        read_rows(format, text, &mut self.table)
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 1, self.header.title(), &self.table, |_, _, _| Ok(()))?;

        let roots = self.table.columns().iter().map(|column| column.extra.0);
        match format {
            FileFormat::Binary => {
                for root in roots { root.write(write)?; }
            },
            _ => {
                let line: Vec<String> = roots.map(|root| root.to_string()).collect();
                writeln!(write, "{}", line.join(" "))?;
            },
        }

        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for GeodesicDistanceFile {
    type Value = GeodesicPath;
    type Extra = RootNode;

    fn table(&self) -> &NodeAttributeTable<GeodesicPath, RootNode> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<GeodesicPath, RootNode> { &mut self.table }
}

impl CompareForTesting for GeodesicDistanceFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: geodesic files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            if self.root_node(column) != other.root_node(column) {
                return Err(format!("ERROR: root nodes of column {} do not match.", column));
            }

            for node in 0 .. self.number_of_nodes() {
                let (mine, theirs) = (self.path(node, column), other.path(node, column));
                if mine.parent != theirs.parent || (mine.distance - theirs.distance).abs() > tolerance {
                    return Err(format!("ERROR: node {} column {} does not match.", node, column));
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

    fn distances() -> GeodesicDistanceFile {
        let mut file = GeodesicDistanceFile::new();
        file.set_number_of_nodes_and_columns(3, 2);
        file.set_root_node(0, 0);
        file.set_root_node(1, 2);
        file.set_path(1, 0, 0, 1.5);
        file.set_path(2, 0, 1, 3.0);
        file.set_path(0, 1, 2, 4.25);
        file
    }

    #[test]
    fn roots_follow_begin_data(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = distances();
            file.header_mut().set_write_format(format);
            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

            let mut read = GeodesicDistanceFile::new();
            read_file_from_bytes(&mut read, Path::new("a.geodesic"), &bytes, ReadOptions::default()).unwrap();
            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
            assert_eq!(read.root_node(1), 2);
        }
    }

    #[test]
    fn path_to_root(){
        assert_eq!(distances().path_to_root(2, 0), vec![2, 1, 0]);
    }
}
