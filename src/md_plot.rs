
//! Plots of sections, made of vertices, points and lines.
//! The files have no header and can only be read.

use crate::error::{Error, Result, UnitResult};
use crate::file::DataFile;
use crate::io::{TextReader, parse, tokens};
use crate::math::Vec3;
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;


/// The fixed palette of plot colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlotColor {
    DarkRed, Red, DarkGreen, Green, DarkBlue, Blue, DarkMagenta, Magenta,
    DarkYellow, Yellow, DarkCyan, Cyan, Black, DarkGray, LightGray, White,
}

impl PlotColor {
    pub const ALL: [PlotColor; 16] = [
        PlotColor::DarkRed, PlotColor::Red, PlotColor::DarkGreen, PlotColor::Green,
        PlotColor::DarkBlue, PlotColor::Blue, PlotColor::DarkMagenta, PlotColor::Magenta,
        PlotColor::DarkYellow, PlotColor::Yellow, PlotColor::DarkCyan, PlotColor::Cyan,
        PlotColor::Black, PlotColor::DarkGray, PlotColor::LightGray, PlotColor::White,
    ];

    /// The color stored with this number, if any.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(|index| Self::ALL.get(index).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            PlotColor::DarkRed => "Red - Dark",
            PlotColor::Red => "Red",
            PlotColor::DarkGreen => "Green - Dark",
            PlotColor::Green => "Green",
            PlotColor::DarkBlue => "Blue - Dark",
            PlotColor::Blue => "Blue",
            PlotColor::DarkMagenta => "Magenta - Dark",
            PlotColor::Magenta => "Magenta",
            PlotColor::DarkYellow => "Yellow - Dark",
            PlotColor::Yellow => "Yellow",
            PlotColor::DarkCyan => "Cyan - Dark",
            PlotColor::Cyan => "Cyan",
            PlotColor::Black => "Black",
            PlotColor::DarkGray => "Gray - Dark",
            PlotColor::LightGray => "Gray - Light",
            PlotColor::White => "White",
        }
    }

    pub fn components(self) -> [u8; 3] {
        match self {
            PlotColor::DarkRed => [128, 0, 0],
            PlotColor::Red => [255, 0, 0],
            PlotColor::DarkGreen => [0, 128, 0],
            PlotColor::Green => [0, 255, 0],
            PlotColor::DarkBlue => [0, 0, 128],
            PlotColor::Blue => [0, 0, 255],
            PlotColor::DarkMagenta => [128, 0, 128],
            PlotColor::Magenta => [255, 0, 255],
            PlotColor::DarkYellow => [128, 128, 0],
            PlotColor::Yellow => [255, 255, 0],
            PlotColor::DarkCyan => [0, 128, 128],
            PlotColor::Cyan => [0, 255, 255],
            PlotColor::Black => [0, 0, 0],
            PlotColor::DarkGray => [128, 128, 128],
            PlotColor::LightGray => [192, 192, 192],
            PlotColor::White => [255, 255, 255],
        }
    }
}

/// The components of a stored color number. Unknown numbers are drawn gray.
pub fn color_components(code: i32) -> [u8; 3] {
    PlotColor::from_code(code).map_or([127, 127, 127], PlotColor::components)
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointSymbol {
    Dot,
    Plus,
    Cross,
    Circle,
    Square,
    Triangle,
    Other(i32),
}

impl PointSymbol {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PointSymbol::Dot,
            1 => PointSymbol::Plus,
            2 => PointSymbol::Cross,
            3 => PointSymbol::Circle,
            4 => PointSymbol::Square,
            5 => PointSymbol::Triangle,
            other => PointSymbol::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    Other(i32),
}

impl LineStyle {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => LineStyle::Solid,
            1 => LineStyle::Dashed,
            2 => LineStyle::Dotted,
            other => LineStyle::Other(other),
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct PlotPoint {
    pub vertex: usize,
    pub symbol: PointSymbol,
    pub size: f32,
    pub color: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotLine {
    pub vertices: Vec<usize>,
    pub style: LineStyle,
    pub color: i32,
    pub width: f32,
}

impl Default for PlotLine {
    fn default() -> Self {
        PlotLine { vertices: Vec::new(), style: LineStyle::Solid, color: 1, width: 1.0 }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct MdPlotFile {
    header: FileHeader,
    vertices: Vec<Vec3>,
    points: Vec<PlotPoint>,
    lines: Vec<PlotLine>,
}

impl Default for MdPlotFile {
    fn default() -> Self {
        MdPlotFile {
            header: FileHeader::new("MDPlot File", ".mdo", "MDPlotFile"),
            vertices: Vec::new(),
            points: Vec::new(),
            lines: Vec::new(),
        }
    }
}

impl MdPlotFile {
    pub fn new() -> Self { Self::default() }

    pub fn vertices(&self) -> &[Vec3] { &self.vertices }
    pub fn points(&self) -> &[PlotPoint] { &self.points }
    pub fn lines(&self) -> &[PlotLine] { &self.lines }

    pub fn add_vertex(&mut self, vertex: Vec3) {
        self.vertices.push(vertex);
        self.header.set_modified();
    }

    pub fn add_point(&mut self, point: PlotPoint) {
        self.points.push(point);
        self.header.set_modified();
    }

    pub fn add_line(&mut self, line: PlotLine) {
        self.lines.push(line);
        self.header.set_modified();
    }

    /// The absolute vertex of a one-based index within the current section.
    /// Indices past the vertices read so far are `None`.
    fn section_vertex(&self, index: &str, section_start: usize) -> Result<Option<usize>> {
        let index: i64 = parse(index, "plot vertex index")?;
        if index < 1 {
            return Err(Error::invalid(format!("plot vertex index {} precedes its section", index)));
        }

        let vertex = usize::try_from(index - 1).ok()
            .and_then(|offset| offset.checked_add(section_start));

        Ok(vertex.filter(|&vertex| vertex < self.vertices.len()))
    }
}

/// Strip the comment of a line, which starts at `#`.
fn without_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

/// The next logical line, with continued lines ending in `\` joined by spaces.
fn next_logical_line(text: &mut TextReader<'_>) -> Option<String> {
    let line = text.next_line()?;
    let mut logical = without_comment(&line).to_string();

    while let Some(stripped) = logical.strip_suffix('\\') {
        logical.truncate(stripped.len());

        let continued = match text.next_line() {
            Some(next) => without_comment(&next).to_string(),
            None => break,
        };

        if continued.is_empty() { break; }
        logical.push(' ');
        logical.push_str(&continued);
    }

    Some(logical)
}

impl DataFile for MdPlotFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_only(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.vertices.clear();
        self.points.clear();
        self.lines.clear();
    }

    fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.points.is_empty() && self.lines.is_empty()
    }

    fn has_header(&self) -> bool { false }

    fn read_data(&mut self, _: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        let mut section_start = 0;
        let mut z = 0.0;

        while let Some(line) = next_logical_line(text) {
            let values = tokens(&line);
            if values.len() < 2 { continue; }

            match values[0] {
                "SECTION" => {
                    section_start = self.vertices.len();
                    z = 0.0;
                },

                "ZVALUE" => z = parse::<i32>(values[1], "z value")? as f32,

                "V" => {
                    if values.len() < 3 {
                        return Err(Error::invalid(format!("MDPlot File Invalid vertex: {}", line)));
                    }

                    let x = parse(values[1], "vertex x")?;
                    let y = parse(values[2], "vertex y")?;
                    self.vertices.push(Vec3(x, y, z));
                },

                "P" => {
                    if values.len() < 5 {
                        return Err(Error::invalid(format!("MDPlot File Invalid point: {}", line)));
                    }

                    match self.section_vertex(values[4], section_start)? {
                        Some(vertex) => self.points.push(PlotPoint {
                            vertex,
                            symbol: PointSymbol::from_code(parse(values[1], "point symbol")?),
                            size: parse::<i32>(values[2], "point size")? as f32,
                            color: parse(values[3], "point color")?,
                        }),

                        None => log::warn!(
                            "plot point ({}) has invalid vertex index, total {}", line, self.vertices.len()
                        ),
                    }
                },

                "L" => {
                    if values.len() < 5 {
                        return Err(Error::invalid(format!("MDPlot File Invalid line: {}", line)));
                    }

                    let mut vertices = Vec::with_capacity(values.len() - 4);
                    for index in &values[4..] {
                        match self.section_vertex(index, section_start)? {
                            Some(vertex) => vertices.push(vertex),
                            None => log::warn!("plot line has invalid vertex index {}", index),
                        }
                    }

                    self.lines.push(PlotLine {
                        vertices,
                        style: LineStyle::from_code(parse(values[1], "line style")?),
                        color: parse(values[2], "line color")?,
                        width: parse(values[3], "line width")?,
                    });
                },

                other => log::debug!("ignoring plot line with key {}", other),
            }
        }

        Ok(())
    }

    fn write_data(&self, _: FileFormat, _: &mut Vec<u8>) -> UnitResult {
        Err(Error::unsupported("Writing of MD Plot files not supported."))
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};
    use crate::error::ErrorKind;
    use std::path::Path;

    fn read(text: &str) -> MdPlotFile {
        let mut file = MdPlotFile::new();
        read_file_from_bytes(&mut file, Path::new("a.mdo"), text.as_bytes(), ReadOptions::default()).unwrap();
        file
    }

    #[test]
    fn continued_line(){
        let file = read("SECTION S1\nZVALUE 0\nV 1.0 2.0 \\\n3.0\n");
        assert_eq!(file.vertices(), &[Vec3(1.0, 2.0, 0.0)]);
    }

    #[test]
    fn indices_are_relative_to_section(){
        let file = read(
            "# a plot\nSECTION S1\nZVALUE 3\nV 0 0\nV 1 0\nL 0 1 2.0 1 2\n\
             SECTION S2\nV 5 5 # comment\nV 6 6\nP 3 2 4 2\nP 3 2 4 9\nL 1 2 1.0 1 7\n"
        );

        assert_eq!(file.vertices().len(), 4);
        assert_eq!(file.vertices()[0], Vec3(0.0, 0.0, 3.0));
        assert_eq!(file.vertices()[2], Vec3(5.0, 5.0, 0.0));

        assert_eq!(file.points().len(), 1);
        assert_eq!(file.points()[0].vertex, 3);
        assert_eq!(file.points()[0].symbol, PointSymbol::Circle);

        assert_eq!(file.lines()[0].vertices, vec![0, 1]);
        assert_eq!(file.lines()[1].vertices, vec![2]);
        assert_eq!(file.lines()[1].style, LineStyle::Dashed);
    }

    #[test]
    fn indices_cannot_reach_into_an_earlier_section(){
        let text = "SECTION S1\nV 0 0\nSECTION S2\nV 1 1\nP 0 1 1 0\n";
        let result = read_file_from_bytes(&mut MdPlotFile::new(), Path::new("a.mdo"), text.as_bytes(), ReadOptions::default());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::FormatInvalid);

        let file = read("SECTION S1\nV 0 0\nSECTION S2\nV 1 1\nP 0 1 1 1\n");
        assert_eq!(file.points()[0].vertex, 1);
    }

    #[test]
    fn palette(){
        assert_eq!(color_components(1), [255, 0, 0]);
        assert_eq!(color_components(16), [127, 127, 127]);
        assert_eq!(PlotColor::from_code(14).map(PlotColor::name), Some("Gray - Light"));
    }

    #[test]
    fn cannot_be_written(){
        let mut file = read("V 1 2\n");
        let error = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FormatUnsupported);
    }
}
