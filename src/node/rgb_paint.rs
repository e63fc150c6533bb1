
//! Red, green and blue components for each node, each with its own scale.

use std::io::Write;
use crate::error::{Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, Read, TextReader, comment_for_display, comment_for_storage, parse_token};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use super::{
    NodeAttributeFile, NodeAttributeTable, NodeValue, extra_at, forward_to_header_and_table,
    numbered_tokens, read_table, write_rows, write_table_tags,
};


const COMPONENTS: [&str; 3] = ["red", "green", "blue"];

fn component_tag(kind: &str, component: usize) -> String {
    format!("tag-{}-{}", kind, COMPONENTS[component])
}


#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Rgb {
    fn to_array(self) -> [f32; 3] { [self.red, self.green, self.blue] }
    fn from_array([red, green, blue]: [f32; 3]) -> Self { Rgb { red, green, blue } }
}

impl NodeValue for Rgb {
    const TOKENS: usize = 3;

    fn parse_tokens(tokens: &[&str]) -> Result<Self> {
        Ok(Rgb {
            red: parse_token(tokens, 0, "red")?,
            green: parse_token(tokens, 1, "green")?,
            blue: parse_token(tokens, 2, "blue")?,
        })
    }

    fn write_tokens(&self, write: &mut Vec<u8>) -> UnitResult {
        write!(write, " {} {} {}", Fixed(self.red), Fixed(self.green), Fixed(self.blue))?;
        Ok(())
    }

    fn read_binary(read: &mut impl Read) -> Result<Self> {
        let mut values = [0.0; 3];
        f32::read_slice(read, &mut values)?;
        Ok(Rgb::from_array(values))
    }

    fn write_binary(&self, write: &mut Vec<u8>) -> UnitResult {
        f32::write_slice(write, &self.to_array())
    }

    fn interpolate(corners: [&Self; 3], areas: [f32; 3]) -> Option<Self> {
        let weights = crate::math::barycentric_weights(areas)?;
        let mut values = [0.0; 3];

        for (corner, weight) in corners.iter().zip(weights) {
            for (sum, value) in values.iter_mut().zip(corner.to_array()) {
                *sum += value * weight;
            }
        }

        Some(Rgb::from_array(values))
    }
}


/// Description and scale of each color component of a column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RgbColumn {
    pub comments: [String; 3],
    pub titles: [String; 3],

    /// Minimum and maximum of each component.
    pub scales: [[f32; 2]; 3],
}


#[derive(Debug, Clone, PartialEq)]
pub struct RgbPaintFile {
    header: FileHeader,
    table: NodeAttributeTable<Rgb, RgbColumn>,
}

impl Default for RgbPaintFile {
    fn default() -> Self {
        RgbPaintFile {
            header: FileHeader::new("RGB Paint File", ".RGB_paint", "RgbPaintFile"),
            table: NodeAttributeTable::new(),
        }
    }
}

impl RgbPaintFile {
    pub fn new() -> Self { Self::default() }

    pub fn rgb(&self, node: usize, column: usize) -> Rgb { *self.table.value(node, column) }

    pub fn set_rgb(&mut self, node: usize, column: usize, rgb: Rgb) {
        self.table.set_value(node, column, rgb);
    }

    pub fn column_components(&self, column: usize) -> &RgbColumn { &self.table.column(column).extra }

    pub fn column_components_mut(&mut self, column: usize) -> &mut RgbColumn {
        &mut self.table.column_mut(column).extra
    }
}

impl DataFile for RgbPaintFile {
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
            let found = ["comment", "title", "scale"].iter().enumerate()
                .flat_map(|(kind, name)| (0 .. 3).map(move |component| (kind, *name, component)))
                .find(|&(_, name, component)| component_tag(name, component) == tag);

            let Some((kind, _, component)) = found else { return Ok(false) };
            let (index, values) = numbered_tokens(value)?;
            let column = extra_at(extras, index)?;

            match kind {
                0 => column.comments[component] = comment_for_display(&values.join(" ")),
                1 => column.titles[component] = values.join(" "),
                _ => column.scales[component] = [
                    parse_token(&values, 0, "scale minimum")?,
                    parse_token(&values, 1, "scale maximum")?,
                ],
            }

            Ok(true)
        })?;

        self.header.set_title(tags.title);
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write_table_tags(write, 2, self.header.title(), &self.table, |write, index, column| {
            for component in 0 .. 3 {
                writeln!(write, "{} {} {}", component_tag("comment", component), index, comment_for_storage(&column.comments[component]))?;
            }

            for component in 0 .. 3 {
                writeln!(write, "{} {} {}", component_tag("title", component), index, column.titles[component])?;
            }

            for component in 0 .. 3 {
                let [min, max] = column.scales[component];
                writeln!(write, "{} {} {} {}", component_tag("scale", component), index, Fixed(min), Fixed(max))?;
            }

            Ok(())
        })?;

        write_rows(format, write, &self.table)
    }
}

impl NodeAttributeFile for RgbPaintFile {
    type Value = Rgb;
    type Extra = RgbColumn;

    fn table(&self) -> &NodeAttributeTable<Rgb, RgbColumn> { &self.table }
    fn table_mut(&mut self) -> &mut NodeAttributeTable<Rgb, RgbColumn> { &mut self.table }
}

impl CompareForTesting for RgbPaintFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() || self.number_of_columns() != other.number_of_columns() {
            return Err("ERROR: rgb paint files have a different number of nodes or columns.".to_string());
        }

        for column in 0 .. self.number_of_columns() {
            for node in 0 .. self.number_of_nodes() {
                let mine = self.rgb(node, column).to_array();
                let theirs = other.rgb(node, column).to_array();

                if mine.iter().zip(theirs).any(|(a, b)| (a - b).abs() > tolerance) {
                    return Err(format!("ERROR: color of node {} column {} is not within tolerance.", node, column));
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
    fn component_tags_round_trip(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut file = RgbPaintFile::new();
            file.set_number_of_nodes_and_columns(2, 1);
            file.set_rgb(1, 0, Rgb { red: 0.5, green: 1.0, blue: 0.0 });

            let components = file.column_components_mut(0);
            components.titles[1] = "green title".into();
            components.comments[2] = "blue\ncomment".into();
            components.scales[0] = [-1.0, 4.0];
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let text = String::from_utf8_lossy(&bytes);
            assert!(text.contains("tag-version 2"));
            assert!(text.contains("tag-scale-red 0 -1.000000 4.000000"));

            let mut read = RgbPaintFile::new();
            read_file_from_bytes(&mut read, Path::new("a.RGB_paint"), &bytes, ReadOptions::default()).unwrap();
            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
            assert_eq!(read.column_components(0), file.column_components(0));
        }
    }
}
