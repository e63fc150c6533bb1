
//! Metric and surface shape files store one float per node and column.
//! Besides the caret text and binary formats, both can be stored
//! as GIFTI data arrays with ascii, base64 or compressed base64 data.

use std::io::Write;
use crate::codec::{decode_base64, decode_zlib_base64, encode_base64, encode_zlib_base64};
use crate::error::{Error, Result, UnitResult, i32_to_usize};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Fixed, TextReader, parse_token};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use crate::xml::{XmlEvent, XmlEvents, XmlWriter, attribute};
use super::{
    ColumnInfo, NodeAttributeFile, NodeAttributeTable, extra_at, forward_to_header_and_table,
    numbered_tokens, read_table, write_rows, write_table_tags,
};


pub const TAG_COLUMN_COLOR_MAPPING: &str = "tag-column-color-mapping";
pub const TAG_COLUMN_THRESHOLD: &str = "tag-column-threshold";
pub const TAG_COLUMN_AVERAGE_THRESHOLD: &str = "tag-column-average-threshold";


/// Display settings of a metric column.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricColumnSettings {

    /// The negative and positive values mapped to the ends of the palette.
    pub color_mapping: [f32; 2],

    /// Values between the negative and the positive threshold are not displayed.
    pub threshold: [f32; 2],

    pub average_threshold: [f32; 2],
}

/// Whether the file holds functional data or surface shape measurements.
/// Both kinds share the same formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricKind {
    #[default]
    Metric,
    SurfaceShape,
}

impl MetricKind {
    fn header(self) -> FileHeader {
        match self {
            MetricKind::Metric => FileHeader::new("Metric File", ".metric", "MetricFile"),
            MetricKind::SurfaceShape => FileHeader::new("Surface Shape File", ".surface_shape", "SurfaceShapeFile"),
        }
    }

    fn gifti_intent(self) -> &'static str {
        match self {
            MetricKind::Metric => "NIFTI_INTENT_NONE",
            MetricKind::SurfaceShape => "NIFTI_INTENT_SHAPE",
        }
    }
}


/// One float per node and column.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFile {
    kind: MetricKind,
    header: FileHeader,
    table: NodeAttributeTable<f32, MetricColumnSettings>,
}

/// Surface shape files are metric files with their own header.
pub type SurfaceShapeFile = MetricFile;

impl Default for MetricFile {
    fn default() -> Self { Self::with_kind(MetricKind::Metric) }
}

impl MetricFile {

    pub fn new() -> Self { Self::default() }

    /// An empty surface shape file.
    pub fn surface_shape() -> Self { Self::with_kind(MetricKind::SurfaceShape) }

    pub fn with_kind(kind: MetricKind) -> Self {
        MetricFile { kind, header: kind.header(), table: NodeAttributeTable::new() }
    }

    pub fn kind(&self) -> MetricKind { self.kind }

    pub fn value(&self, node: usize, column: usize) -> f32 { *self.table.value(node, column) }

    pub fn set_value(&mut self, node: usize, column: usize, value: f32) {
        self.table.set_value(node, column, value);
    }

    pub fn column_settings(&self, column: usize) -> &MetricColumnSettings { &self.table.column(column).extra }

    pub fn column_settings_mut(&mut self, column: usize) -> &mut MetricColumnSettings {
        &mut self.table.column_mut(column).extra
    }

    /// The smallest and largest value of the column, `None` for a file without nodes.
    pub fn column_min_max(&self, column: usize) -> Option<(f32, f32)> {
        let values = self.table.column_values(column);
        let first = *values.first()?;

        Some(values.iter().fold((first, first), |(min, max), &value| (min.min(value), max.max(value))))
    }

    /// Set the color mapping of each column to the range of its values.
    pub fn set_color_mapping_to_column_ranges(&mut self) {
        for column in 0 .. self.table.number_of_columns() {
            if let Some((min, max)) = self.column_min_max(column) {
                self.column_settings_mut(column).color_mapping = [min, max];
            }
        }
    }

    fn read_gifti(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let mut events = XmlEvents::new(text.all_bytes());
        events.read_root(gifti::ROOT)?;

        let mut infos = Vec::new();
        let mut columns = Vec::new();
        let mut encoding = FileFormat::Xml;

        while let Some(event) = events.next_event()? {
            match event {
                XmlEvent::Start { name, attributes } => match name.as_str() {
                    gifti::META_DATA if events.parent() == Some(gifti::ROOT) => {
                        for (name, value) in gifti::read_meta_data(&mut events)? {
                            self.header.set_tag(&name, value);
                        }
                    },

                    gifti::DATA_ARRAY => {
                        let (info, values, array_encoding) = gifti::read_data_array(&mut events, &attributes)?;
                        infos.push(info);
                        columns.push(values);
                        encoding = array_encoding;
                    },

                    _ => events.skip_element()?,
                },

                XmlEvent::Text(_) | XmlEvent::End(_) => {},
            }
        }

        let number_of_nodes = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|column| column.len() != number_of_nodes) {
            return Err(Error::invalid("data arrays of different length"));
        }

        self.table.prepare_for_reading(number_of_nodes, infos, Vec::new());
        for (index, values) in columns.into_iter().enumerate() {
            self.table.set_column_values(index, values)?;
        }

        self.header.set_read_format(encoding);
        self.header.set_write_format(encoding);
        Ok(())
    }

    fn write_gifti(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        let mut writer = XmlWriter::new();

        let array_count = self.table.number_of_columns().to_string();
        writer.start(gifti::ROOT, &[("Version", "1.0"), ("NumberOfDataArrays", &array_count)]);

        let header_tags: Vec<(&str, &str)> = self.header.tags().collect();
        gifti::write_meta_data(&mut writer, &header_tags);

        for column in self.table.columns() {
            gifti::write_data_array(&mut writer, format, self.kind.gifti_intent(), &column.info, column.values())?;
        }

        write.write_all(writer.finish().as_bytes())?;
        Ok(())
    }
}

impl DataFile for MetricFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary)
        .read_write(FileFormat::Xml)
        .read_write(FileFormat::XmlBase64)
        .read_write(FileFormat::XmlGzipBase64);

    forward_to_header_and_table!();

    fn clear(&mut self) {
        self.header.clear();
        self.table.clear();
    }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format.is_xml() {
            return self.read_gifti(text);
        }

        let tags = read_table(format, text, &mut self.table, |extras, tag, value| {
            if ![TAG_COLUMN_COLOR_MAPPING, TAG_COLUMN_THRESHOLD, TAG_COLUMN_AVERAGE_THRESHOLD].contains(&tag) {
                return Ok(false);
            }

            let (index, values) = numbered_tokens(value)?;
            let pair = [
                parse_token(&values, 0, "negative value")?,
                parse_token(&values, 1, "positive value")?,
            ];

            let settings = extra_at(extras, index)?;
            match tag {
                TAG_COLUMN_COLOR_MAPPING => settings.color_mapping = pair,
                TAG_COLUMN_THRESHOLD => settings.threshold = pair,
                _ => settings.average_threshold = pair,
            }

            Ok(true)
        })?;

        self.header.set_title(tags.title);
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format.is_xml() {
            return self.write_gifti(format, write);
        }

        write_table_tags(write, 1, self.header.title(), &self.table, |write, index, settings| {
            let [negative, positive] = settings.color_mapping;
            writeln!(write, "{} {} {} {}", TAG_COLUMN_COLOR_MAPPING, index, Fixed(negative), Fixed(positive))?;

            let [negative, positive] = settings.threshold;
            writeln!(write, "{} {} {} {}", TAG_COLUMN_THRESHOLD, index, Fixed(negative), Fixed(positive))?;

            let [negative, positive] = settings.average_threshold;
            writeln!(write, "{} {} {} {}", TAG_COLUMN_AVERAGE_THRESHOLD, index, Fixed(negative), Fixed(positive))?;
            Ok(())
        })?;

        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for MetricFile {
    type Value = f32;
    type Extra = MetricColumnSettings;

    fn table(&self) -> &NodeAttributeTable<f32, MetricColumnSettings> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<f32, MetricColumnSettings> { &mut self.table }
}

impl CompareForTesting for MetricFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() {
            return Err("ERROR: The files have a different number of nodes.".to_string());
        }

        if self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: The files have a different number of columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            let mine = self.table.column_values(column);
            let theirs = other.table.column_values(column);

            if let Some(node) = (0 .. mine.len()).find(|&node| (mine[node] - theirs[node]).abs() > tolerance) {
                return Err(format!("ERROR: node {} column {} is not within tolerance.", node, column));
            }
        }

        Ok(())
    }
}


/// Reading and writing of GIFTI float data arrays.
mod gifti {
    use super::*;

    pub const ROOT: &str = "GIFTI";
    pub const META_DATA: &str = "MetaData";
    pub const DATA_ARRAY: &str = "DataArray";
    const MD: &str = "MD";
    const NAME: &str = "Name";
    const VALUE: &str = "Value";
    const DATA: &str = "Data";

    const META_COLUMN_NAME: &str = "Name";
    const META_COMMENT: &str = "comment";
    const META_LONG_NAME: &str = "LongName";
    const META_STUDY_META_DATA: &str = "StudyMetaDataLinkSet";

    fn encoding_name(format: FileFormat) -> Result<&'static str> {
        match format {
            FileFormat::Xml => Ok("ASCII"),
            FileFormat::XmlBase64 => Ok("Base64Binary"),
            FileFormat::XmlGzipBase64 => Ok("GZipBase64Binary"),
            other => Err(Error::unsupported(format!("gifti data in {} format", other))),
        }
    }

    fn format_of_encoding(name: &str) -> Result<FileFormat> {
        match name {
            "ASCII" => Ok(FileFormat::Xml),
            "Base64Binary" => Ok(FileFormat::XmlBase64),
            "GZipBase64Binary" => Ok(FileFormat::XmlGzipBase64),
            other => Err(Error::unsupported(format!("gifti encoding {}", other))),
        }
    }

    /// Read the `MD` entries. Call this right after the start event of a `MetaData` element.
    pub fn read_meta_data(events: &mut XmlEvents<'_>) -> Result<Vec<(String, String)>> {
        let depth = events.open_elements().len();
        let mut entries = Vec::new();
        let (mut name, mut value) = (String::new(), String::new());

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("meta data element is not closed")),

                Some(XmlEvent::Start { name: element, .. }) => match element.as_str() {
                    MD => { name.clear(); value.clear(); },
                    NAME => name = events.read_element_text()?,
                    VALUE => value = events.read_element_text()?,
                    _ => events.skip_element()?,
                },

                Some(XmlEvent::End(element)) => {
                    if events.open_elements().len() < depth { return Ok(entries); }
                    if element == MD && !name.is_empty() {
                        entries.push((name.trim().to_string(), value.trim().to_string()));
                    }
                },

                Some(XmlEvent::Text(_)) => {},
            }
        }
    }

    pub fn write_meta_data(writer: &mut XmlWriter, entries: &[(&str, &str)]) {
        writer.start(META_DATA, &[]);

        for (name, value) in entries {
            writer.start(MD, &[]);
            writer.cdata_element(NAME, name);
            writer.cdata_element(VALUE, value);
            writer.end();
        }

        writer.end();
    }

    /// Read a one-dimensional float array.
    /// Call this right after the start event of a `DataArray` element.
    pub fn read_data_array(events: &mut XmlEvents<'_>, attributes: &[(String, String)]) -> Result<(ColumnInfo, Vec<f32>, FileFormat)> {
        let data_type = attribute(attributes, "DataType").unwrap_or("NIFTI_TYPE_FLOAT32");
        if data_type != "NIFTI_TYPE_FLOAT32" {
            return Err(Error::unsupported(format!("gifti data type {}", data_type)));
        }

        let node_count = i32_to_usize(
            attribute(attributes, "Dim0").ok_or_else(|| Error::invalid("data array without Dim0"))?
                .trim().parse().map_err(|_| Error::invalid("data array Dim0"))?,
            "data array length"
        )?;

        let format = format_of_encoding(attribute(attributes, "Encoding").unwrap_or("ASCII"))?;
        let little_endian = attribute(attributes, "Endian") == Some("LittleEndian");

        let depth = events.open_elements().len();
        let mut info = ColumnInfo::default();
        let mut values = Vec::new();

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("data array element is not closed")),

                Some(XmlEvent::Start { name, .. }) => match name.as_str() {
                    META_DATA => {
                        for (name, value) in read_meta_data(events)? {
                            match name.as_str() {
                                META_COLUMN_NAME => info.name = value,
                                META_COMMENT => info.comment = value,
                                META_LONG_NAME => info.long_name = value,
                                META_STUDY_META_DATA => info.study_meta_data = value,
                                _ => {},
                            }
                        }
                    },

                    DATA => {
                        let text = events.read_element_text()?;
                        values = decode_values(&text, format, node_count, little_endian)?;
                    },

                    _ => events.skip_element()?,
                },

                Some(XmlEvent::End(_)) if events.open_elements().len() < depth => break,
                Some(_) => {},
            }
        }

        if values.len() != node_count {
            return Err(Error::invalid(format!("data array has {} values, expected {}", values.len(), node_count)));
        }

        Ok((info, values, format))
    }

    fn decode_values(text: &str, format: FileFormat, count: usize, little_endian: bool) -> Result<Vec<f32>> {
        let bytes = match format {
            FileFormat::Xml => {
                return text.split_whitespace()
                    .map(|token| crate::io::parse(token, "gifti value"))
                    .collect();
            },

            FileFormat::XmlBase64 => decode_base64(text)?,
            _ => decode_zlib_base64(text, Some(count * 4))?,
        };

        if bytes.len() != count * 4 {
            return Err(Error::invalid("gifti data has the wrong number of bytes"));
        }

        Ok(bytes.chunks_exact(4)
            .map(|chunk| {
                let quad = [chunk[0], chunk[1], chunk[2], chunk[3]];
                if little_endian { f32::from_le_bytes(quad) } else { f32::from_be_bytes(quad) }
            })
            .collect())
    }

    pub fn write_data_array(writer: &mut XmlWriter, format: FileFormat, intent: &str, info: &ColumnInfo, values: &[f32]) -> UnitResult {
        let encoding = encoding_name(format)?;
        let node_count = values.len().to_string();

        writer.start(DATA_ARRAY, &[
            ("Intent", intent), ("DataType", "NIFTI_TYPE_FLOAT32"),
            ("ArrayIndexingOrder", "RowMajorOrder"), ("Dimensionality", "1"),
            ("Dim0", &node_count), ("Encoding", encoding), ("Endian", "BigEndian"),
            ("ExternalFileName", ""), ("ExternalFileOffset", ""),
        ]);

        write_meta_data(writer, &[
            (META_COLUMN_NAME, &info.name),
            (META_COMMENT, &info.comment),
            (META_LONG_NAME, &info.long_name),
            (META_STUDY_META_DATA, &info.study_meta_data),
        ]);

        let data = match format {
            FileFormat::Xml => values.iter().map(|value| Fixed(*value).to_string()).collect::<Vec<_>>().join("\n"),
            _ => {
                let bytes: Vec<u8> = values.iter().flat_map(|value| value.to_be_bytes()).collect();
                if format == FileFormat::XmlBase64 { encode_base64(&bytes) } else { encode_zlib_base64(&bytes) }
            },
        };

        writer.text_element(DATA, &data);
        writer.end();
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};
    use crate::node::DeformKind;
    use crate::deformation_map::{DeformationMapFile, DeformMapNodeData};
    use std::path::Path;

    fn metric() -> MetricFile {
        let mut file = MetricFile::new();
        file.set_number_of_nodes_and_columns(3, 2);
        file.set_column_name(0, "thickness");
        file.set_column_comment(1, "two\nlines");

        for node in 0 .. 3 {
            file.set_value(node, 0, node as f32 * 0.5);
            file.set_value(node, 1, -(node as f32));
        }

        file.column_settings_mut(0).threshold = [-1.0, 2.5];
        file
    }

    #[test]
    fn every_format_round_trips(){
        for format in [FileFormat::Ascii, FileFormat::Binary, FileFormat::Xml, FileFormat::XmlBase64, FileFormat::XmlGzipBase64] {
            let mut file = metric();
            file.header_mut().set_write_format(format);
            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

            let mut read = MetricFile::new();
            read_file_from_bytes(&mut read, Path::new("a.metric"), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()), "{}", format);
            assert_eq!(read.column_name(0), "thickness");
            assert_eq!(read.column_comment(1), "two\nlines");
            assert_eq!(read.header().read_format(), format);
        }
    }

    #[test]
    fn settings_survive_text(){
        let mut file = metric();
        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

        let mut read = MetricFile::new();
        read_file_from_bytes(&mut read, Path::new("a.metric"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.column_settings(0).threshold, [-1.0, 2.5]);
    }

    #[test]
    fn deform_interpolates_or_copies(){
        let file = metric();

        let mut map = DeformationMapFile::new();
        map.set_number_of_nodes(2);
        map.set_node(0, DeformMapNodeData { tile_nodes: [0, 1, 2], tile_barycentric: [0.5, 0.25, 0.25] });

        let nearest = file.deform(&map, DeformKind::NearestNode).unwrap();
        assert_eq!(nearest.number_of_nodes(), 2);
        assert_eq!(nearest.value(0, 0), 0.0);
        assert_eq!(nearest.value(1, 0), 0.0);
        assert!(nearest.column_name(0).ends_with("thickness"));

        // weights rotate: node 0 gets a1, node 1 gets a2, node 2 gets a0
        let areas = file.deform(&map, DeformKind::TileAreas).unwrap();
        assert!((areas.value(0, 0) - (0.0 * 0.25 + 0.5 * 0.25 + 1.0 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn min_max(){
        assert_eq!(metric().column_min_max(1), Some((-2.0, 0.0)));
        assert_eq!(MetricFile::surface_shape().header().default_extension(), ".surface_shape");
    }
}
