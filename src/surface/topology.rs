
//! The triangles of a surface, as indices into its coordinates.

use std::io::Write;
use crate::error::{Error, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, TextReader, checked_count, parse, parse_token, split_tag_line, tokens};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::TopologyType;


pub const TAG_VERSION: &str = "tag-version";
pub const TAG_PERIMETER_ID: &str = "perimeter_id";

/// A triangle, listing its nodes counter-clockwise.
pub type Tile = [i32; 3];


#[derive(Debug, Clone, PartialEq)]
pub struct TopologyFile {
    header: FileHeader,
    tiles: Vec<Tile>,

    /// One more than the largest node index of any tile.
    number_of_nodes: usize,

    /// The section of each node, only present in version 0 files.
    node_sections: Vec<i32>,
}

impl Default for TopologyFile {
    fn default() -> Self {
        TopologyFile {
            header: FileHeader::new("Topology File", ".topo", "TopologyFile"),
            tiles: Vec::new(),
            number_of_nodes: 0,
            node_sections: Vec::new(),
        }
    }
}

impl TopologyFile {
    pub fn new() -> Self { Self::default() }

    pub fn from_tiles(tiles: Vec<Tile>) -> Self {
        let mut file = TopologyFile::default();
        for tile in tiles { file.add_tile(tile); }
        file.header.clear_modified();
        file
    }

    pub fn number_of_tiles(&self) -> usize { self.tiles.len() }
    pub fn number_of_nodes(&self) -> usize { self.number_of_nodes }

    /// Grow the node count, for example to match a coordinate file with unconnected nodes.
    pub fn set_number_of_nodes(&mut self, count: usize) {
        self.number_of_nodes = self.number_of_nodes.max(count);
    }

    pub fn add_tile(&mut self, tile: Tile) {
        self.include_nodes(tile);
        self.tiles.push(tile);
        self.header.set_modified();
    }

    pub fn tile(&self, index: usize) -> Tile { self.tiles[index] }

    pub fn set_tile(&mut self, index: usize, tile: Tile) {
        self.include_nodes(tile);
        self.tiles[index] = tile;
        self.header.set_modified();
    }

    pub fn tiles(&self) -> &[Tile] { &self.tiles }

    /// The index of a tile that uses all three nodes, in any order.
    pub fn tile_with_vertices(&self, first: i32, second: i32, third: i32) -> Option<usize> {
        self.tiles.iter().position(|tile| {
            [first, second, third].iter().all(|node| tile.contains(node))
        })
    }

    /// The indices of all tiles using the node.
    pub fn tiles_with_node(&self, node: i32) -> impl Iterator<Item = usize> + '_ {
        self.tiles.iter().enumerate()
            .filter(move |(_, tile)| tile.contains(&node))
            .map(|(index, _)| index)
    }

    /// Remove all tiles that use any marked node.
    pub fn delete_tiles_with_marked_nodes(&mut self, marked: &[bool]) {
        let is_marked = |node: i32| usize::try_from(node).ok()
            .and_then(|node| marked.get(node).copied())
            .unwrap_or(false);

        let before = self.tiles.len();
        self.tiles.retain(|tile| !tile.iter().any(|&node| is_marked(node)));
        if self.tiles.len() != before { self.header.set_modified(); }
    }

    /// Reverse the orientation of every tile.
    pub fn flip_tile_orientation(&mut self) {
        for tile in &mut self.tiles { tile.swap(0, 2); }
        self.header.set_modified();
    }

    /// The section of each node, as stored by old files.
    pub fn node_sections(&self) -> &[i32] { &self.node_sections }

    pub fn topology_type(&self) -> TopologyType {
        self.header.tag(TAG_PERIMETER_ID).map_or(TopologyType::Unknown, TopologyType::from_perimeter_id)
    }

    pub fn set_topology_type(&mut self, topology: TopologyType) {
        self.header.set_tag(TAG_PERIMETER_ID, topology.perimeter_id());
    }

    fn include_nodes(&mut self, tile: Tile) {
        if let Some(&largest) = tile.iter().max() {
            if let Ok(largest) = usize::try_from(largest) {
                self.number_of_nodes = self.number_of_nodes.max(largest + 1);
            }
        }
    }

    fn read_ascii_tiles(&mut self, text: &mut TextReader<'_>, clockwise: bool) -> UnitResult {
        let count: i32 = parse(&text.read_non_empty_line()?, "number of tiles")?;
        let count = i32_to_usize(count, "Number of tiles is less than zero")?;
        self.tiles.reserve(count.min(text.remaining().len() / 6));

        for _ in 0 .. count {
            let line = text.read_non_empty_line()?;
            let tokens = tokens(&line);

            let mut tile: Tile = [
                parse_token(&tokens, 0, "tile node")?,
                parse_token(&tokens, 1, "tile node")?,
                parse_token(&tokens, 2, "tile node")?,
            ];

            if clockwise { tile.reverse(); }
            self.include_nodes(tile);
            self.tiles.push(tile);
        }

        Ok(())
    }

    /// Version 0 lists every node with its neighbors before the tiles,
    /// and stores the tiles clockwise.
    fn read_version_0(&mut self, first_line: &str, text: &mut TextReader<'_>) -> UnitResult {
        let node_count: i32 = parse(first_line, "number of nodes")?;
        let node_count = i32_to_usize(node_count, "number of nodes")?;
        let mut sections = Vec::with_capacity(node_count.min(text.remaining().len() / 12));

        for _ in 0 .. node_count {
            let line = text.read_non_empty_line()?;
            let tokens = tokens(&line);

            let neighbors: usize = parse_token(&tokens, 1, "number of neighbors")?;
            sections.push(parse_token(&tokens, 2, "section")?);

            for _ in 0 .. neighbors {
                text.read_line()?;
            }
        }

        self.node_sections = sections;
        self.number_of_nodes = node_count;
        self.read_ascii_tiles(text, true)
    }
}

impl DataFile for TopologyFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.tiles.clear();
        self.node_sections.clear();
        self.number_of_nodes = 0;
    }

    fn is_empty(&self) -> bool { self.tiles.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let first_line = text.read_non_empty_line()?;
        let (tag, value) = split_tag_line(&first_line);

        if tag != TAG_VERSION {
            return match format {
                FileFormat::Ascii => self.read_version_0(&first_line, text),
                _ => Err(Error::invalid("binary topology without version")),
            };
        }

        if parse::<i32>(value, "topology version")? != 1 {
            return Err(Error::invalid("Unknown version of topology file"));
        }

        match format {
            FileFormat::Ascii => self.read_ascii_tiles(text, false),

            FileFormat::Binary => {
                let mut bytes = text.remaining();
                let start = bytes.len();

                let count = i32_to_usize(i32::read(&mut bytes)?, "Number of tiles is less than zero")?;
                let values = i32::read_vec(&mut bytes, checked_count(count, 3, "number of tiles")?, 3 * 4096)?;

                for tile in values.chunks_exact(3) {
                    let tile = [tile[0], tile[1], tile[2]];
                    self.include_nodes(tile);
                    self.tiles.push(tile);
                }

                text.advance(start - bytes.len());
                Ok(())
            },

            other => Err(Error::unsupported(format!("topology in {} format", other))),
        }
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        writeln!(write, "{} 1", TAG_VERSION)?;

        match format {
            FileFormat::Ascii => {
                writeln!(write, "{}", self.tiles.len())?;
                for [a, b, c] in &self.tiles {
                    writeln!(write, "{} {} {}", a, b, c)?;
                }
            },

            FileFormat::Binary => {
                usize_to_i32(self.tiles.len()).write(write)?;
                for tile in &self.tiles {
                    i32::write_slice(write, tile)?;
                }
            },

            other => return Err(Error::unsupported(format!("topology in {} format", other))),
        }

        Ok(())
    }
}

impl CompareForTesting for TopologyFile {
    fn compare_file_for_unit_testing(&self, other: &Self, _tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_tiles() != other.number_of_tiles() {
            return Err("ERROR: The files contain a different number of tiles.".to_string());
        }

        match self.tiles.iter().zip(&other.tiles).position(|(mine, theirs)| mine != theirs) {
            Some(index) => Err(format!("ERROR: tile {} does not match.", index)),
            None => Ok(()),
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};
    use std::path::Path;

    #[test]
    fn version_1_round_trip(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = TopologyFile::from_tiles(vec![[0, 1, 2], [2, 1, 3]]);
            file.set_topology_type(TopologyType::Closed);
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let mut read = TopologyFile::new();
            read_file_from_bytes(&mut read, Path::new("a.topo"), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
            assert_eq!(read.number_of_nodes(), 4);
            assert_eq!(read.topology_type(), TopologyType::Closed);
        }
    }

    #[test]
    fn version_0_is_clockwise(){
        let text = b"BeginHeader\nEndHeader\n2\n0 1 7 0 0 0\n1\n1 0 8 0 0 0\n1\n1\n0 1 2\n";

        let mut file = TopologyFile::new();
        read_file_from_bytes(&mut file, Path::new("old.topo"), text, ReadOptions::default()).unwrap();
        assert_eq!(file.tiles(), &[[2, 1, 0]]);
        assert_eq!(file.node_sections(), &[7, 8]);
        assert_eq!(file.number_of_nodes(), 3);
    }

    #[test]
    fn tile_queries(){
        let mut file = TopologyFile::from_tiles(vec![[0, 1, 2], [2, 1, 3]]);
        assert_eq!(file.tile_with_vertices(3, 2, 1), Some(1));
        assert_eq!(file.tiles_with_node(2).collect::<Vec<_>>(), vec![0, 1]);

        file.delete_tiles_with_marked_nodes(&[true]);
        assert_eq!(file.tiles(), &[[2, 1, 3]]);
        assert!(file.is_modified());
    }
}
