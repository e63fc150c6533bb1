
//! Files that store a table of values for each node of a surface.
//!
//! Every node attribute file owns a [`FileHeader`] and a [`NodeAttributeTable`].
//! The table holds `number_of_nodes` values for each of its columns,
//! and the operations that append, remove and deform columns work on the table.

pub mod areal_estimation;
pub mod deformation_field;
pub mod geodesic;
pub mod lat_lon;
pub mod metric;
pub mod paint;
pub mod rgb_paint;
pub mod section;
pub mod topography;

use std::fmt::Debug;
use std::io::Write;
use crate::deformation_map::DeformationMapFile;
use crate::error::{Error, Result, UnitResult, i32_to_usize};
use crate::file::DataFile;
use crate::io::{Data, Fixed, Read, TextReader, check_count, checked_count, comment_for_display, comment_for_storage, parse, split_numbered_value, tokens};
use crate::meta::{CommentMode, FileFormat};


/// The tags of the text section that precedes the data of a node attribute file.
pub mod tag {
    pub const VERSION: &str = "tag-version";
    pub const NUMBER_OF_NODES: &str = "tag-number-of-nodes";
    pub const NUMBER_OF_COLUMNS: &str = "tag-number-of-columns";
    pub const TITLE: &str = "tag-title";
    pub const COLUMN_NAME: &str = "tag-column-name";
    pub const COLUMN_COMMENT: &str = "tag-column-comment";
    pub const COLUMN_STUDY_META_DATA: &str = "tag-column-study-meta-data";
    pub const LONG_NAME: &str = "tag-long-name";
    pub const BEGIN_DATA: &str = "tag-BEGIN-DATA";

    /// Older files use these spellings.
    pub const VERSION_ALIAS: &str = "tag-file-version";
    pub const COLUMN_NAME_ALIAS: &str = "tag-short-name";
}


/// Implements the `DataFile` methods that forward to the `header` and `table` fields.
macro_rules! forward_to_header_and_table {
    () => {
        fn header(&self) -> &crate::meta::header::FileHeader { &self.header }
        fn header_mut(&mut self) -> &mut crate::meta::header::FileHeader { &mut self.header }
        fn is_empty(&self) -> bool { self.table.is_empty() }
        fn is_modified(&self) -> bool { self.header.is_modified() || self.table.is_modified() }

        fn clear_modified(&mut self) {
            self.header.clear_modified();
            self.table.clear_modified();
        }
    };
}

pub(crate) use forward_to_header_and_table;


/// The value stored for one node in one column.
pub trait NodeValue: Clone + Default + PartialEq + Debug {

    /// Number of whitespace separated tokens in a text row.
    const TOKENS: usize;

    /// Parse the value from the first `TOKENS` tokens.
    fn parse_tokens(tokens: &[&str]) -> Result<Self>;

    /// Write the value as text, each token preceded by a space.
    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult;

    /// Read the big endian binary representation.
    fn read_binary(read: &mut impl Read) -> Result<Self>;

    /// Write the big endian binary representation.
    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult;

    /// Combine the values at the corners of a triangle with barycentric areas.
    /// Values that cannot be interpolated return `None`.
    fn interpolate(_corners: [&Self; 3], _areas: [f32; 3]) -> Option<Self> { None }
}

impl NodeValue for i32 {
    const TOKENS: usize = 1;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> { parse(tokens[0], "integer node value") }
    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult { write!(write, " {}", self)?; Ok(()) }
    fn read_binary(read: &mut impl Read) -> Result<Self> { i32::read(read) }
    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult { self.write(write) }
}

impl NodeValue for f32 {
    const TOKENS: usize = 1;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> { parse(tokens[0], "float node value") }
    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult { write!(write, " {}", Fixed(*self))?; Ok(()) }
    fn read_binary(read: &mut impl Read) -> Result<Self> { f32::read(read) }
    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult { self.write(write) }

    fn interpolate(corners: [&Self; 3], areas: [f32; 3]) -> Option<Self> {
        let weights = crate::math::barycentric_weights(areas)?;
        Some(corners[0] * weights[0] + corners[1] * weights[1] + corners[2] * weights[2])
    }
}


/// Descriptive text of one column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    pub name: String,
    pub comment: String,
    pub long_name: String,

    /// Links to study meta data, in their coded text form.
    pub study_meta_data: String,
}

/// The values of one column, with its description
/// and the additional per-column data of a kind of file.
#[derive(Debug, Clone, PartialEq)]
pub struct Column<T, C> {
    pub info: ColumnInfo,
    pub extra: C,
    values: Vec<T>,
}

impl<T, C> Column<T, C> {
    pub fn values(&self) -> &[T] { &self.values }
}


/// Where a column of an appended file ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnDestination {

    /// Add a new column.
    New,

    /// Do not append this column.
    Skip,

    /// Replace the column with this index.
    Existing(usize),
}

/// How deformed values are computed from the source triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeformKind {

    /// Copy the value of the first node of the source triangle.
    #[default]
    NearestNode,

    /// Interpolate the values of the source triangle with its barycentric areas,
    /// for values that can be interpolated.
    TileAreas,
}


/// A table of `number_of_nodes` values per column.
/// Tracks whether it was modified since it was last read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttributeTable<T, C = ()> {
    number_of_nodes: usize,
    columns: Vec<Column<T, C>>,
    modified: bool,
}

impl<T, C> Default for NodeAttributeTable<T, C> {
    fn default() -> Self {
        NodeAttributeTable { number_of_nodes: 0, columns: Vec::new(), modified: false }
    }
}

impl<T: NodeValue, C: Clone + Default> NodeAttributeTable<T, C> {

    pub fn new() -> Self { Self::default() }

    pub fn number_of_nodes(&self) -> usize { self.number_of_nodes }
    pub fn number_of_columns(&self) -> usize { self.columns.len() }

    /// Whether the table has no values.
    pub fn is_empty(&self) -> bool { self.number_of_nodes == 0 || self.columns.is_empty() }

    pub fn is_modified(&self) -> bool { self.modified }
    pub fn set_modified(&mut self) { self.modified = true; }
    pub fn clear_modified(&mut self) { self.modified = false; }

    /// Remove all columns and nodes.
    pub fn clear(&mut self) {
        self.number_of_nodes = 0;
        self.columns = Vec::new();
        self.modified = false;
    }

    /// Replace the table with a table of default values.
    /// A size of zero releases all storage.
    pub fn set_number_of_nodes_and_columns(&mut self, number_of_nodes: usize, number_of_columns: usize) {
        self.columns = Vec::new();
        self.number_of_nodes = number_of_nodes;

        if number_of_nodes > 0 {
            self.add_columns(number_of_columns);
        }

        self.modified = true;
    }

    /// Add columns with default values.
    pub fn add_columns(&mut self, count: usize) {
        let number_of_nodes = self.number_of_nodes;
        self.columns.extend((0 .. count).map(|_| Column {
            info: ColumnInfo::default(),
            extra: C::default(),
            values: vec![T::default(); number_of_nodes],
        }));

        self.modified = true;
    }

    /// Add nodes with default values to all columns.
    pub fn add_nodes(&mut self, count: usize) {
        self.number_of_nodes += count;

        let number_of_nodes = self.number_of_nodes;
        for column in &mut self.columns {
            column.values.resize(number_of_nodes, T::default());
        }

        self.modified = true;
    }

    /// Set all values of the column to the default value.
    pub fn reset_column(&mut self, column: usize) {
        for value in &mut self.columns[column].values {
            *value = T::default();
        }

        self.modified = true;
    }

    /// Remove a column. Removing the last column clears the table.
    pub fn remove_column(&mut self, column: usize) {
        if self.columns.len() <= 1 {
            self.clear();
        }
        else {
            self.columns.remove(column);
        }

        self.modified = true;
    }

    pub fn column(&self, column: usize) -> &Column<T, C> { &self.columns[column] }

    /// Access a column for changing its description or extra data.
    pub fn column_mut(&mut self, column: usize) -> &mut Column<T, C> {
        self.modified = true;
        &mut self.columns[column]
    }

    pub fn columns(&self) -> &[Column<T, C>] { &self.columns }

    pub fn value(&self, node: usize, column: usize) -> &T {
        &self.columns[column].values[node]
    }

    pub fn set_value(&mut self, node: usize, column: usize, value: T) {
        self.columns[column].values[node] = value;
        self.modified = true;
    }

    /// All values of a column.
    pub fn column_values(&self, column: usize) -> &[T] { &self.columns[column].values }

    /// Replace all values of a column. The number of values must match the number of nodes.
    pub fn set_column_values(&mut self, column: usize, values: Vec<T>) -> UnitResult {
        if values.len() != self.number_of_nodes {
            return Err(Error::column_mismatch(format!(
                "column has {} values, file has {} nodes", values.len(), self.number_of_nodes
            )));
        }

        self.columns[column].values = values;
        self.modified = true;
        Ok(())
    }

    /// The index of the first column with this name.
    pub fn column_with_name(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.info.name == name)
    }

    pub fn column_name(&self, column: usize) -> &str { &self.columns[column].info.name }

    pub fn set_column_name(&mut self, column: usize, name: impl Into<String>) {
        self.column_mut(column).info.name = name.into();
    }

    pub fn column_comment(&self, column: usize) -> &str { &self.columns[column].info.comment }

    pub fn set_column_comment(&mut self, column: usize, comment: impl Into<String>) {
        self.column_mut(column).info.comment = comment.into();
    }

    pub fn append_to_column_comment(&mut self, column: usize, text: &str) {
        if !text.is_empty() {
            self.column_mut(column).info.comment.push_str(text);
        }
    }

    /// Copy name, comment and study meta data of a column of another table.
    pub fn transfer_column_meta_data(&mut self, column: usize, other: &Self, other_column: usize) {
        let info = other.columns[other_column].info.clone();
        self.column_mut(column).info = info;
    }

    /// Add a column whose values have the number of nodes of this table.
    fn push_column(&mut self, column: Column<T, C>) {
        debug_assert_eq!(column.values.len(), self.number_of_nodes);
        self.columns.push(column);
        self.modified = true;
    }

    /// Set up the shape before reading values, without marking the table as modified.
    pub(crate) fn prepare_for_reading(&mut self, number_of_nodes: usize, infos: Vec<ColumnInfo>, extras: Vec<C>) {
        self.number_of_nodes = number_of_nodes;

        let mut extras = extras.into_iter();
        self.columns = infos.into_iter()
            .map(|info| Column {
                info, extra: extras.next().unwrap_or_default(),
                values: vec![T::default(); number_of_nodes],
            })
            .collect();
    }
}


/// A file that consists of a header and a node attribute table.
/// Append and deformation are provided for every kind.
pub trait NodeAttributeFile: DataFile + Sized {
    type Value: NodeValue;
    type Extra: Clone + Default + PartialEq + Debug;

    fn table(&self) -> &NodeAttributeTable<Self::Value, Self::Extra>;
    fn table_mut(&mut self) -> &mut NodeAttributeTable<Self::Value, Self::Extra>;

    /// The value of nodes that are not covered by a deformation.
    fn null_value(&self) -> Self::Value { Self::Value::default() }

    /// Merge the name table of another file into this file.
    /// Returns the new index of each name of the other file.
    fn merge_name_tables(&mut self, _other: &Self) -> Vec<usize> { Vec::new() }

    /// Replace the name indices inside a value, using the result of `merge_name_tables`.
    fn remap_names(value: &Self::Value, _remap: &[usize]) -> Self::Value { value.clone() }

    /// Called after whole columns were reset, resized, appended or deformed,
    /// for kinds that derive their column extras from the values.
    fn update_column_extras(&mut self) {}

    fn number_of_nodes(&self) -> usize { self.table().number_of_nodes() }
    fn number_of_columns(&self) -> usize { self.table().number_of_columns() }

    fn set_number_of_nodes_and_columns(&mut self, number_of_nodes: usize, number_of_columns: usize) {
        self.table_mut().set_number_of_nodes_and_columns(number_of_nodes, number_of_columns);
        self.update_column_extras();
    }

    fn add_columns(&mut self, count: usize) {
        self.table_mut().add_columns(count);
        self.update_column_extras();
    }

    fn add_nodes(&mut self, count: usize) {
        self.table_mut().add_nodes(count);
        self.update_column_extras();
    }

    fn reset_column(&mut self, column: usize) {
        self.table_mut().reset_column(column);
        self.update_column_extras();
    }

    /// Remove a column. Removing the last column clears the whole file.
    fn remove_column(&mut self, column: usize) {
        if self.number_of_columns() <= 1 {
            self.clear();
            self.set_modified();
        }
        else {
            self.table_mut().remove_column(column);
        }
    }

    fn column_with_name(&self, name: &str) -> Option<usize> { self.table().column_with_name(name) }

    fn column_name(&self, column: usize) -> &str { self.table().column_name(column) }
    fn set_column_name(&mut self, column: usize, name: &str) { self.table_mut().set_column_name(column, name) }
    fn column_comment(&self, column: usize) -> &str { self.table().column_comment(column) }
    fn set_column_comment(&mut self, column: usize, comment: &str) { self.table_mut().set_column_comment(column, comment) }
    fn append_to_column_comment(&mut self, column: usize, text: &str) { self.table_mut().append_to_column_comment(column, text) }

    /// Copy name, comment and study meta data of a column of another file.
    fn transfer_column_meta_data(&mut self, column: usize, other: &Self, other_column: usize) {
        self.table_mut().transfer_column_meta_data(column, other.table(), other_column)
    }

    /// Append all columns of the other file as new columns.
    fn append(&mut self, other: &Self) -> UnitResult {
        let destination = vec![ColumnDestination::New; other.number_of_columns()];
        self.append_with(other, &destination, CommentMode::Append)
    }

    /// Append the columns of the other file as specified for each of its columns.
    /// Fails with a column mismatch if both files have nodes, but not the same number of nodes.
    fn append_with(&mut self, other: &Self, destination: &[ColumnDestination], comment_mode: CommentMode) -> UnitResult {
        if other.table().is_empty() {
            return Ok(());
        }

        if destination.len() != other.number_of_columns() {
            return Err(Error::column_mismatch(format!(
                "{} column destinations for {} columns", destination.len(), other.number_of_columns()
            )));
        }

        if self.table().is_empty() {
            self.table_mut().set_number_of_nodes_and_columns(other.number_of_nodes(), 0);
        }
        else if self.number_of_nodes() != other.number_of_nodes() {
            return Err(Error::column_mismatch(format!(
                "file has {} nodes, appended file has {} nodes",
                self.number_of_nodes(), other.number_of_nodes()
            )));
        }

        let remap = self.merge_name_tables(other);

        for (source_index, source) in other.table().columns().iter().enumerate() {
            let target = match destination[source_index] {
                ColumnDestination::Skip => continue,
                ColumnDestination::New => None,
                ColumnDestination::Existing(index) if index < self.number_of_columns() => Some(index),
                ColumnDestination::Existing(index) => return Err(Error::column_mismatch(format!(
                    "append destination column {} does not exist", index
                ))),
            };

            let values = source.values.iter()
                .map(|value| Self::remap_names(value, &remap))
                .collect();

            let column = Column { info: source.info.clone(), extra: source.extra.clone(), values };

            match target {
                None => self.table_mut().push_column(column),
                Some(index) => *self.table_mut().column_mut(index) = column,
            }
        }

        self.update_column_extras();
        self.header_mut().append_file_comment(other.header(), comment_mode);
        self.set_modified();
        Ok(())
    }

    /// Create a file for the target surface of the deformation map.
    /// Nodes whose source triangle is unknown receive the null value.
    fn deform(&self, map: &DeformationMapFile, kind: DeformKind) -> Result<Self> where Self: Clone {
        let source_nodes = self.number_of_nodes();
        let target_nodes = map.number_of_nodes();
        let null = self.null_value();

        let mut deformed = self.clone();
        let mut columns = Vec::with_capacity(self.number_of_columns());

        for column in self.table().columns() {
            let mut values = Vec::with_capacity(target_nodes);

            for node in 0 .. target_nodes {
                let data = map.node(node);
                if data.tile_nodes[0] < 0 {
                    values.push(null.clone());
                    continue;
                }

                let nearest = source_node_index(data.tile_nodes[0], source_nodes)?;

                let interpolated = match kind {
                    DeformKind::NearestNode => None,
                    DeformKind::TileAreas if data.tile_nodes.iter().all(|&node| node >= 0) => {
                        let corners = [
                            &column.values[nearest],
                            &column.values[source_node_index(data.tile_nodes[1], source_nodes)?],
                            &column.values[source_node_index(data.tile_nodes[2], source_nodes)?],
                        ];

                        Self::Value::interpolate(corners, data.tile_barycentric)
                    },
                    DeformKind::TileAreas => None,
                };

                values.push(interpolated.unwrap_or_else(|| column.values[nearest].clone()));
            }

            let mut info = column.info.clone();
            info.name = format!("{}{}", map.deformed_column_name_prefix(), info.name);
            columns.push(Column { info, extra: column.extra.clone(), values });
        }

        let table = deformed.table_mut();
        table.number_of_nodes = target_nodes;
        table.columns = columns;
        table.modified = true;

        deformed.update_column_extras();
        deformed.header_mut().append_to_comment(&format!(
            "\nDeformed with {}", map.header().file_name()
                .and_then(std::path::Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));

        Ok(deformed)
    }
}

fn source_node_index(node: i32, count: usize) -> Result<usize> {
    usize::try_from(node).ok()
        .filter(|&index| index < count)
        .ok_or(Error::VertexOutOfRange { vertex: i64::from(node), count })
}


/// The generic tags that precede the data, as read from a file.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableTags {
    pub version: i32,
    pub number_of_nodes: usize,
    pub number_of_columns: usize,
    pub title: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableTags {
    fn column(&mut self, index: usize) -> Result<&mut ColumnInfo> {
        if index >= self.number_of_columns {
            return Err(Error::invalid(format!(
                "column tag for column {} of {} columns", index, self.number_of_columns
            )));
        }

        if self.columns.len() <= index {
            self.columns.resize(index + 1, ColumnInfo::default());
        }

        Ok(&mut self.columns[index])
    }

    /// The column descriptions, one for each column.
    pub fn column_infos(&self) -> Vec<ColumnInfo> {
        let mut infos = self.columns.clone();
        infos.resize(self.number_of_columns, ColumnInfo::default());
        infos
    }
}

/// Read tag lines up to and including `tag-BEGIN-DATA`.
/// Tags that are not generic are passed to `kind_tag` with their value.
/// Unknown tags are reported and ignored.
/// Column tags must follow the number of columns.
pub(crate) fn read_table_tags(
    text: &mut TextReader<'_>,
    mut kind_tag: impl FnMut(&TableTags, &str, &str) -> Result<bool>,
) -> Result<TableTags>
{
    let mut tags = TableTags::default();
    let file_size = text.all_bytes().len();

    loop {
        let line = text.read_tag_line()?;
        let value = line.value.as_str();

        match line.tag.as_str() {
            tag::BEGIN_DATA => break,
            tag::VERSION | tag::VERSION_ALIAS => tags.version = parse(value, "file version")?,
            tag::NUMBER_OF_NODES => tags.number_of_nodes = parse(value, "number of nodes")?,
            tag::NUMBER_OF_COLUMNS => {
                let count = parse(value, "number of columns")?;
                check_count(count, 1, file_size, "number of columns")?;
                tags.number_of_columns = count;
            },
            tag::TITLE => tags.title = value.to_string(),

            tag::COLUMN_NAME | tag::COLUMN_NAME_ALIAS => {
                let (index, name) = split_numbered_value(value)?;
                tags.column(index)?.name = name.to_string();
            },

            tag::COLUMN_COMMENT => {
                let (index, comment) = split_numbered_value(value)?;
                tags.column(index)?.comment = comment_for_display(comment);
            },

            tag::COLUMN_STUDY_META_DATA => {
                let (index, links) = split_numbered_value(value)?;
                tags.column(index)?.study_meta_data = links.to_string();
            },

            tag::LONG_NAME => {
                let (index, name) = split_numbered_value(value)?;
                tags.column(index)?.long_name = name.to_string();
            },

            other => {
                if !kind_tag(&tags, other, value)? {
                    log::warn!("ignoring unknown node attribute tag {}", other);
                }
            },
        }
    }

    if tags.columns.len() > tags.number_of_columns {
        return Err(Error::invalid(format!(
            "column tag for column {} of {} columns", tags.columns.len() - 1, tags.number_of_columns
        )));
    }

    Ok(tags)
}

/// Write the generic tags, the kind's per-column tags, and `tag-BEGIN-DATA`.
pub(crate) fn write_table_tags<T: NodeValue, C: Clone + Default>(
    write: &mut Vec<u8>, version: i32, title: &str,
    table: &NodeAttributeTable<T, C>,
    kind_tags: impl FnMut(&mut Vec<u8>, usize, &C) -> UnitResult,
) -> UnitResult
{
    write_table_head(write, version, title, table)?;
    write_column_tags(write, table, kind_tags)
}

/// Write the version, the counts and the title.
pub(crate) fn write_table_head<T: NodeValue, C: Clone + Default>(
    write: &mut Vec<u8>, version: i32, title: &str, table: &NodeAttributeTable<T, C>,
) -> UnitResult
{
    writeln!(write, "{} {}", tag::VERSION, version)?;
    writeln!(write, "{} {}", tag::NUMBER_OF_NODES, table.number_of_nodes())?;
    writeln!(write, "{} {}", tag::NUMBER_OF_COLUMNS, table.number_of_columns())?;
    writeln!(write, "{} {}", tag::TITLE, title)?;
    Ok(())
}

/// Write the description of each column followed by the kind's tags for that column,
/// then `tag-BEGIN-DATA`.
pub(crate) fn write_column_tags<T: NodeValue, C: Clone + Default>(
    write: &mut Vec<u8>, table: &NodeAttributeTable<T, C>,
    mut kind_tags: impl FnMut(&mut Vec<u8>, usize, &C) -> UnitResult,
) -> UnitResult
{
    for (index, column) in table.columns().iter().enumerate() {
        writeln!(write, "{} {} {}", tag::COLUMN_NAME, index, column.info.name)?;
        writeln!(write, "{} {} {}", tag::COLUMN_COMMENT, index, comment_for_storage(&column.info.comment))?;

        if !column.info.long_name.is_empty() {
            writeln!(write, "{} {} {}", tag::LONG_NAME, index, column.info.long_name)?;
        }

        writeln!(write, "{} {} {}", tag::COLUMN_STUDY_META_DATA, index, column.info.study_meta_data)?;
        kind_tags(write, index, &column.extra)?;
    }

    writeln!(write, "{}", tag::BEGIN_DATA)?;
    Ok(())
}

/// Read one row per node, in text or binary form.
/// Binary rows contain the values of all columns of a node, one after another.
pub(crate) fn read_rows<T: NodeValue, C: Clone + Default>(
    format: FileFormat, text: &mut TextReader<'_>, table: &mut NodeAttributeTable<T, C>,
) -> UnitResult
{
    let number_of_columns = table.number_of_columns();
    let number_of_nodes = table.number_of_nodes();

    match format {
        FileFormat::Ascii => {
            let expected = 1 + number_of_columns * T::TOKENS;

            for node in 0 .. number_of_nodes {
                let line = text.read_non_empty_line()?;
                let tokens = tokens(&line);

                if tokens.len() < expected {
                    return Err(Error::invalid(format!(
                        "node {} has {} values, expected {}", node, tokens.len(), expected
                    )));
                }

                for (column, cell) in table.columns.iter_mut().zip(tokens[1..].chunks(T::TOKENS)) {
                    column.values[node] = T::parse_tokens(cell)?;
                }
            }
        },

        FileFormat::Binary => {
            let mut bytes = text.remaining();
            let start = bytes.len();

            for node in 0 .. number_of_nodes {
                for column in &mut table.columns {
                    column.values[node] = T::read_binary(&mut bytes)?;
                }
            }

            text.advance(start - bytes.len());
        },

        other => return Err(Error::unsupported(format!("node attribute rows in {} format", other))),
    }

    Ok(())
}

/// Write one row per node, in text or binary form.
pub(crate) fn write_rows<T: NodeValue, C: Clone + Default>(
    format: FileFormat, write: &mut Vec<u8>, table: &NodeAttributeTable<T, C>,
) -> UnitResult
{
    match format {
        FileFormat::Ascii => {
            for node in 0 .. table.number_of_nodes() {
                write!(write, "{}", node)?;

                for column in table.columns() {
                    column.values[node].write_tokens(write)?;
                }

                writeln!(write)?;
            }
        },

        FileFormat::Binary => {
            for node in 0 .. table.number_of_nodes() {
                for column in table.columns() {
                    column.values[node].write_binary(write)?;
                }
            }
        },

        other => return Err(Error::unsupported(format!("node attribute rows in {} format", other))),
    }

    Ok(())
}

/// Read the tags and shape the table for reading the rows.
/// Tags specific to a kind are passed to `kind_tag`, together with the per-column extras.
pub(crate) fn read_table_head<T: NodeValue, C: Clone + Default>(
    text: &mut TextReader<'_>, table: &mut NodeAttributeTable<T, C>,
    mut kind_tag: impl FnMut(&mut Vec<C>, &str, &str) -> Result<bool>,
) -> Result<TableTags>
{
    let mut extras = Vec::new();
    let tags = read_table_tags(text, |tags, tag, value| {
        extras.resize(tags.number_of_columns, C::default());
        kind_tag(&mut extras, tag, value)
    })?;

    // every row holds at least one byte per column, or the node index
    let values = checked_count(tags.number_of_nodes, tags.number_of_columns.max(1), "number of nodes")?;
    text.check_count(values, 1, "number of node values")?;

    extras.resize(tags.number_of_columns, C::default());
    table.prepare_for_reading(tags.number_of_nodes, tags.column_infos(), extras);
    Ok(tags)
}

/// Read the tags, shape the table and read the rows.
pub(crate) fn read_table<T: NodeValue, C: Clone + Default>(
    format: FileFormat, text: &mut TextReader<'_>, table: &mut NodeAttributeTable<T, C>,
    kind_tag: impl FnMut(&mut Vec<C>, &str, &str) -> Result<bool>,
) -> Result<TableTags>
{
    let tags = read_table_head(text, table, kind_tag)?;
    read_rows(format, text, table)?;
    Ok(tags)
}

/// Parse a numbered tag value into the column index and the tokens that follow.
pub(crate) fn numbered_tokens(value: &str) -> Result<(usize, Vec<&str>)> {
    let (index, rest) = split_numbered_value(value)?;
    Ok((index, rest.split_whitespace().collect()))
}

/// The per-column extras of a column announced by the number of columns.
pub(crate) fn extra_at<C>(extras: &mut [C], index: usize) -> Result<&mut C> {
    let count = extras.len();
    extras.get_mut(index)
        .ok_or_else(|| Error::invalid(format!("column tag for column {} of {} columns", index, count)))
}

/// Convert a count read from a binary section.
pub(crate) fn binary_count(read: &mut impl Read, what: &'static str) -> Result<usize> {
    i32_to_usize(i32::read(read)?, what)
}


#[cfg(test)]
mod test {
    use super::*;

    type Table = NodeAttributeTable<i32, ()>;

    #[test]
    fn resize_and_remove(){
        let mut table = Table::new();
        table.set_number_of_nodes_and_columns(3, 2);
        assert_eq!(table.number_of_columns(), 2);
        assert_eq!(table.column_values(1), &[0, 0, 0]);

        table.add_nodes(2);
        assert_eq!(table.column_values(0).len(), 5);

        table.set_value(4, 1, 7);
        table.remove_column(0);
        assert_eq!(table.column_values(0), &[0, 0, 0, 0, 7]);

        table.remove_column(0);
        assert!(table.is_empty());
        assert_eq!(table.number_of_nodes(), 0);

        table.set_number_of_nodes_and_columns(0, 4);
        assert_eq!(table.number_of_columns(), 0);
    }

    #[test]
    fn tags_accept_old_spellings(){
        let text = b"tag-file-version 2\ntag-number-of-nodes 2\ntag-number-of-columns 1\n\
            tag-short-name 0 depth\ntag-column-comment 0 a\\nb\ntag-BEGIN-DATA\n0 1\n1 2\n";

        let mut reader = TextReader::new(text);
        let mut table = Table::new();
        let tags = read_table(FileFormat::Ascii, &mut reader, &mut table, |_, _, _| Ok(false)).unwrap();

        assert_eq!(tags.version, 2);
        assert_eq!(table.column_name(0), "depth");
        assert_eq!(table.column_comment(0), "a\nb");
        assert_eq!(table.column_values(0), &[1, 2]);
    }

    #[test]
    fn column_tag_beyond_column_count(){
        let text = b"tag-number-of-columns 1\ntag-column-name 3 x\ntag-BEGIN-DATA\n";
        assert!(read_table_tags(&mut TextReader::new(text), |_, _, _| Ok(false)).is_err());
    }

    #[test]
    fn counts_beyond_the_file_are_invalid(){
        let columns = b"tag-number-of-nodes 1\ntag-number-of-columns 99999999999\ntag-BEGIN-DATA\n0 1\n";
        assert!(read_table_tags(&mut TextReader::new(columns), |_, _, _| Ok(false)).is_err());

        let nodes = b"tag-number-of-nodes 4611686018427387904\ntag-number-of-columns 2\ntag-BEGIN-DATA\n0 1 2\n";
        let result = read_table(FileFormat::Ascii, &mut TextReader::new(nodes), &mut Table::new(), |_, _, _| Ok(false));
        assert_eq!(result.unwrap_err().kind(), crate::error::ErrorKind::FormatInvalid);
    }

    #[test]
    fn extras_exist_only_for_counted_columns(){
        let text = b"tag-number-of-nodes 1\ntag-number-of-columns 1\ntag-extra 5 x\ntag-BEGIN-DATA\n0 1\n";

        let mut table = NodeAttributeTable::<i32, u8>::new();
        let result = read_table(FileFormat::Ascii, &mut TextReader::new(text), &mut table, |extras, tag, value| {
            if tag != "tag-extra" { return Ok(false); }
            let (index, _) = numbered_tokens(value)?;
            *extra_at(extras, index)? = 1;
            Ok(true)
        });

        assert!(result.is_err());
    }

    #[test]
    fn short_rows_are_invalid(){
        let text = b"tag-number-of-nodes 1\ntag-number-of-columns 2\ntag-BEGIN-DATA\n0 1\n";
        let mut table = Table::new();
        let result = read_table(FileFormat::Ascii, &mut TextReader::new(text), &mut table, |_, _, _| Ok(false));
        assert!(result.is_err());
    }
}
