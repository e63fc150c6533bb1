
//! Cells and foci: named points in stereotaxic space, grouped by class
//! and linked to the studies that reported them.

pub mod projection;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::io::Write;
use std::marker::PhantomData;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Fixed, TextReader, comment_for_display, comment_for_storage, parse, parse_token, split_tag_line, tokens};
use crate::math::Vec3;
use crate::meta::{CommentMode, FileFormat, FormatMatrix, Structure};
use crate::meta::header::FileHeader;
use crate::node::tag::{BEGIN_DATA, VERSION};
use crate::xml::{XmlEvent, XmlEvents, XmlWriter, read_file_header, write_file_header, FILE_HEADER};

pub use projection::{CellProjection, CellProjectionFile, FociProjectionFile, ProjectionRecord};


/// Distinguishes cell files from foci files, which share their format.
pub trait CellKind: Debug + Clone + Copy + Default + PartialEq + Send + Sync + 'static {
    const DESCRIPTIVE_NAME: &'static str;
    const EXTENSION: &'static str;
    const ROOT_ELEMENT: &'static str;

    const PROJECTION_DESCRIPTIVE_NAME: &'static str;
    const PROJECTION_EXTENSION: &'static str;
    const PROJECTION_ROOT_ELEMENT: &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cells;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Foci;

impl CellKind for Cells {
    const DESCRIPTIVE_NAME: &'static str = "Cell File";
    const EXTENSION: &'static str = ".cell";
    const ROOT_ELEMENT: &'static str = "CellFile";
    const PROJECTION_DESCRIPTIVE_NAME: &'static str = "Cell Projection File";
    const PROJECTION_EXTENSION: &'static str = ".cellproj";
    const PROJECTION_ROOT_ELEMENT: &'static str = "CellProjectionFile";
}

impl CellKind for Foci {
    const DESCRIPTIVE_NAME: &'static str = "Foci File";
    const EXTENSION: &'static str = ".foci";
    const ROOT_ELEMENT: &'static str = "FociFile";
    const PROJECTION_DESCRIPTIVE_NAME: &'static str = "Foci Projection File";
    const PROJECTION_EXTENSION: &'static str = ".fociproj";
    const PROJECTION_ROOT_ELEMENT: &'static str = "FociProjectionFile";
}


/// The tags of cell, foci and their projection files.
pub mod tag {
    pub const NUMBER_OF_CELLS: &str = "tag-number-of-cells";
    pub const NUMBER_OF_CELL_PROJECTIONS: &str = "tag-number-of-cell-projections";
    pub const NUMBER_OF_COMMENTS: &str = "tag-number-of-comments";

    pub const URL: &str = "tag-url";
    pub const KEY_WORDS: &str = "tag-key-words";
    pub const TITLE: &str = "tag-title";
    pub const AUTHORS: &str = "tag-authors";
    pub const CITATION: &str = "tag-citation";
    pub const STEREOTAXIC_SPACE: &str = "tag-space";
}

/// Written for cells without a class, read as an empty class.
const NO_CLASS: &str = "???";


/// A point with its name and the attributes used to display and filter it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub position: Vec3,
    pub name: String,
    pub class_name: String,

    /// Index into the color file, `-1` if no color was assigned.
    pub color_index: i32,

    pub section: i32,
    pub size: f32,
    pub statistic: String,
    pub comment: String,

    /// Index of the study info in the file, `-1` if not linked to a study.
    pub study_number: i32,

    pub study_meta_data_link: String,
    pub structure: Structure,
    pub signed_distance_above_surface: f32,

    /// Whether the cell passed the last display filter.
    pub displayed: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            position: Vec3::ZERO,
            name: String::new(),
            class_name: String::new(),
            color_index: -1,
            section: 0,
            size: 1.0,
            statistic: String::new(),
            comment: String::new(),
            study_number: -1,
            study_meta_data_link: String::new(),
            structure: Structure::Invalid,
            signed_distance_above_surface: 0.0,
            displayed: true,
        }
    }
}

impl Cell {

    /// A cell at the position, whose structure is derived from the sign of x.
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Cell {
            name: name.into(), position,
            structure: Structure::from_x_coordinate(position.0),
            ..Cell::default()
        }
    }

    /// The study number as an index, if the cell is linked to a study.
    pub fn study_index(&self) -> Option<usize> {
        usize::try_from(self.study_number).ok()
    }

    /// Parse `index x y z name [study [section [class]]]`.
    fn read_text_line(line: &str) -> Result<Cell> {
        let tokens = tokens(line);
        if tokens.len() < 5 {
            return Err(Error::invalid(format!("reading line: {}", line)));
        }

        let position = Vec3(
            parse_token(&tokens, 1, "x coordinate")?,
            parse_token(&tokens, 2, "y coordinate")?,
            parse_token(&tokens, 3, "z coordinate")?,
        );

        let mut cell = Cell::new(tokens[4], position);
        if tokens.len() > 5 { cell.study_number = parse_token(&tokens, 5, "study number")?; }
        if tokens.len() > 6 { cell.section = parse_token(&tokens, 6, "section")?; }
        if let Some(&class_name) = tokens.get(7) {
            if class_name != NO_CLASS { cell.class_name = class_name.to_string(); }
        }

        Ok(cell)
    }

    /// Parse `index section node name x y z class` of the oldest files.
    fn read_version_0_line(line: &str) -> Result<Cell> {
        let tokens = tokens(line);

        let position = Vec3(
            parse_token(&tokens, 4, "x coordinate")?,
            parse_token(&tokens, 5, "y coordinate")?,
            parse_token(&tokens, 6, "z coordinate")?,
        );

        let mut cell = Cell::new(tokens.get(3).copied().unwrap_or_default(), position);
        cell.section = parse_token(&tokens, 1, "section")?;
        cell.class_name = tokens.get(7).filter(|&&class| class != NO_CLASS).map_or_else(String::new, |class| class.to_string());
        Ok(cell)
    }

    fn write_text_line(&self, write: &mut Vec<u8>, index: usize) -> UnitResult {
        let Vec3(x, y, z) = self.position;
        let class_name = if self.class_name.is_empty() { NO_CLASS } else { &self.class_name };

        writeln!(
            write, "{} {} {} {} {} {} {} {}", index, Fixed(x), Fixed(y), Fixed(z),
            self.name, self.study_number, self.section, class_name
        )?;

        Ok(())
    }
}


/// Describes the publication a cell or focus was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellStudyInfo {
    pub url: String,
    pub keywords: String,
    pub title: String,
    pub authors: String,
    pub citation: String,
    pub stereotaxic_space: String,
}

impl CellStudyInfo {

    /// The individual keywords, separated by commas or semicolons.
    pub fn keyword_list(&self) -> impl Iterator<Item = &str> {
        self.keywords.split([',', ';']).map(str::trim).filter(|keyword| !keyword.is_empty())
    }

    /// Whether no field has any text.
    pub fn is_empty(&self) -> bool {
        *self == CellStudyInfo::default()
    }

    fn field_mut(&mut self, tag: &str) -> Option<&mut String> {
        Some(match tag {
            tag::URL => &mut self.url,
            tag::KEY_WORDS => &mut self.keywords,
            tag::TITLE => &mut self.title,
            tag::AUTHORS => &mut self.authors,
            tag::CITATION => &mut self.citation,
            tag::STEREOTAXIC_SPACE => &mut self.stereotaxic_space,
            _ => return None,
        })
    }

    fn tagged_fields(&self) -> [(&'static str, &str); 6] {
        [
            (tag::URL, &self.url), (tag::KEY_WORDS, &self.keywords), (tag::TITLE, &self.title),
            (tag::AUTHORS, &self.authors), (tag::CITATION, &self.citation),
            (tag::STEREOTAXIC_SPACE, &self.stereotaxic_space),
        ]
    }
}


/// The study infos of a text file and the study numbers they were stored with.
/// Study numbers in a file need not start at zero.
#[derive(Debug, Default)]
pub(crate) struct StudyInfoReader {
    pub studies: Vec<CellStudyInfo>,
    stored_numbers: Vec<i32>,
}

impl StudyInfoReader {

    /// Read `number tag value` lines up to the end of the file.
    pub fn read_numbered_tags(text: &mut TextReader<'_>) -> Result<Self> {
        let mut reader = StudyInfoReader::default();

        while let Some(line) = text.next_line() {
            if line.trim().is_empty() { continue; }

            let (number, rest) = split_tag_line(&line);
            let number: i32 = parse(number, "study number")?;
            let (tag, value) = split_tag_line(rest);
            if value.is_empty() { continue; }

            let index = match reader.stored_numbers.iter().position(|&stored| stored == number) {
                Some(index) => index,
                None => {
                    reader.stored_numbers.push(number);
                    reader.studies.push(CellStudyInfo::default());
                    reader.studies.len() - 1
                },
            };

            match reader.studies[index].field_mut(tag) {
                Some(field) => *field = comment_for_display(value),
                None => log::warn!("unrecognized cell study tag {}", tag),
            }
        }

        Ok(reader)
    }

    /// Read `number title` lines of older files, which only store titles.
    pub fn read_titles(text: &mut TextReader<'_>, count: usize) -> Result<Self> {
        let mut reader = StudyInfoReader::default();

        for number in 0 .. count {
            let line = text.read_line()?;
            let (_, title) = split_tag_line(&line);

            reader.studies.push(CellStudyInfo { title: comment_for_display(title), ..CellStudyInfo::default() });
            reader.stored_numbers.push(i32::try_from(number).unwrap_or(i32::MAX));
        }

        Ok(reader)
    }

    /// The index in the file of a study number as stored.
    pub fn renumber(&self, stored: i32) -> i32 {
        self.stored_numbers.iter().position(|&number| number == stored)
            .and_then(|index| i32::try_from(index).ok())
            .unwrap_or(stored)
    }
}

pub(crate) fn write_study_info_tags(write: &mut Vec<u8>, studies: &[CellStudyInfo]) -> UnitResult {
    for (index, study) in studies.iter().enumerate() {
        for (tag, value) in study.tagged_fields() {
            writeln!(write, "{} {} {}", index, tag, comment_for_storage(value))?;
        }
    }

    Ok(())
}


/// Which cells of a file are displayed.
/// Every criterion that is present must be met.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayFilter {
    pub hemisphere: HemisphereFilter,

    /// Display only cells of these classes.
    pub classes: Option<BTreeSet<String>>,

    /// Display only cells with these color indices.
    pub colors: Option<BTreeSet<i32>>,

    /// Display only cells whose study has any of these keywords.
    pub keywords: Option<BTreeSet<String>>,

    /// Display only cells whose name contains this text, ignoring case.
    pub name: Option<String>,

    /// Display only cells linked to these studies.
    pub studies: Option<BTreeSet<i32>>,

    /// Keep cells hidden that are currently hidden.
    pub keep_hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HemisphereFilter {
    #[default]
    Both,
    LeftOnly,
    RightOnly,
}

impl DisplayFilter {

    /// Whether the cell passes the filter. `studies` is the study table of the file.
    pub fn accepts(&self, cell: &Cell, studies: &[CellStudyInfo]) -> bool {
        let hemisphere = match self.hemisphere {
            HemisphereFilter::Both => true,
            HemisphereFilter::LeftOnly => cell.structure == Structure::Left,
            HemisphereFilter::RightOnly => cell.structure == Structure::Right,
        };

        let study = cell.study_index().and_then(|index| studies.get(index));

        hemisphere
            && (cell.displayed || !self.keep_hidden)
            && self.classes.as_ref().map_or(true, |classes| classes.contains(&cell.class_name))
            && self.colors.as_ref().map_or(true, |colors| colors.contains(&cell.color_index))
            && self.studies.as_ref().map_or(true, |numbers| numbers.contains(&cell.study_number))
            && self.name.as_ref().map_or(true, |name| cell.name.to_lowercase().contains(&name.to_lowercase()))
            && self.keywords.as_ref().map_or(true, |keywords| study.map_or(false, |study| {
                study.keyword_list().any(|keyword| keywords.contains(keyword))
            }))
    }
}

/// Update the displayed flag of every cell. Returns the number of displayed cells.
pub(crate) fn apply_display_filter<'c>(
    cells: impl Iterator<Item = &'c mut Cell>, studies: &[CellStudyInfo], filter: &DisplayFilter,
) -> usize {
    let mut displayed = 0;
    for cell in cells {
        cell.displayed = filter.accepts(cell, studies);
        displayed += usize::from(cell.displayed);
    }

    displayed
}

/// Remove a study and renumber the links of the cells.
pub(crate) fn unlink_study<'c>(cells: impl Iterator<Item = &'c mut Cell>, removed: i32) {
    for cell in cells {
        if cell.study_number == removed { cell.study_number = -1; }
        else if cell.study_number > removed { cell.study_number -= 1; }
    }
}


/// The xml elements that describe a cell.
pub(crate) mod xml_elements {
    use super::*;

    pub const CELL_DATA: &str = "CellData";
    pub const CELL_NUMBER: &str = "cellNumber";
    pub const CELL_BASE: &str = "CellBase";
    pub const STUDY_INFO: &str = "CellStudyInfo";

    const XYZ: &str = "xyz";
    const NAME: &str = "name";
    const CLASS_NAME: &str = "className";
    const SECTION: &str = "sectionNumber";
    const STUDY_NUMBER: &str = "studyNumber";
    const SIZE: &str = "size";
    const STATISTIC: &str = "statistic";
    const COMMENT: &str = "comment";
    const STRUCTURE: &str = "structure";
    const SIGNED_DISTANCE: &str = "signedDistanceAboveSurface";
    const STUDY_META_DATA_LINK: &str = "StudyMetaDataLinkSet";
    const COLOR_INDEX: &str = "colorIndex";

    const URL: &str = "URL";
    const KEYWORDS: &str = "keywords";
    const TITLE: &str = "title";
    const AUTHORS: &str = "authors";
    const CITATION: &str = "citation";
    const STEREOTAXIC_SPACE: &str = "stereotaxicSpace";

    pub fn write_cell_base(writer: &mut XmlWriter, cell: &Cell) {
        let Vec3(x, y, z) = cell.position;

        writer.start(CELL_BASE, &[]);
        writer.text_element(XYZ, &format!("{} {} {}", Fixed(x), Fixed(y), Fixed(z)));
        writer.cdata_element(NAME, &cell.name);
        writer.cdata_element(CLASS_NAME, &cell.class_name);
        writer.text_element(SECTION, &cell.section.to_string());
        writer.text_element(STUDY_NUMBER, &cell.study_number.to_string());
        writer.text_element(COLOR_INDEX, &cell.color_index.to_string());
        writer.text_element(SIZE, &Fixed(cell.size).to_string());
        writer.cdata_element(STATISTIC, &cell.statistic);
        writer.cdata_element(COMMENT, &cell.comment);
        writer.text_element(STRUCTURE, cell.structure.name());
        writer.text_element(SIGNED_DISTANCE, &Fixed(cell.signed_distance_above_surface).to_string());
        if !cell.study_meta_data_link.is_empty() {
            writer.cdata_element(STUDY_META_DATA_LINK, &cell.study_meta_data_link);
        }
        writer.end();
    }

    /// Read the children of a `CellBase` element. Call this right after its start event.
    pub fn read_cell_base(events: &mut XmlEvents<'_>, cell: &mut Cell) -> UnitResult {
        let depth = events.open_elements().len();
        let mut has_structure = false;

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("cell element is not closed")),
                Some(XmlEvent::End(_)) if events.open_elements().len() < depth => break,
                Some(XmlEvent::Start { name, .. }) => {
                    let text = events.read_element_text()?;
                    let text = text.trim();

                    match name.as_str() {
                        XYZ => {
                            let values = tokens(text);
                            cell.position = Vec3(
                                parse_token(&values, 0, "x coordinate")?,
                                parse_token(&values, 1, "y coordinate")?,
                                parse_token(&values, 2, "z coordinate")?,
                            );
                        },

                        NAME => cell.name = text.to_string(),
                        CLASS_NAME => cell.class_name = if text == NO_CLASS { String::new() } else { text.to_string() },
                        SECTION => cell.section = parse(text, "section")?,
                        STUDY_NUMBER => cell.study_number = parse(text, "study number")?,
                        COLOR_INDEX => cell.color_index = parse(text, "color index")?,
                        SIZE => cell.size = parse(text, "size")?,
                        STATISTIC => cell.statistic = text.to_string(),
                        COMMENT => cell.comment = text.to_string(),
                        SIGNED_DISTANCE => cell.signed_distance_above_surface = parse(text, "signed distance")?,
                        STUDY_META_DATA_LINK => cell.study_meta_data_link = text.to_string(),
                        STRUCTURE => {
                            cell.structure = Structure::from_name(text);
                            has_structure = cell.structure != Structure::Invalid;
                        },

                        other => log::warn!("ignoring unknown cell element {}", other),
                    }
                },
                Some(_) => {},
            }
        }

        if !has_structure {
            cell.structure = Structure::from_x_coordinate(cell.position.0);
        }

        Ok(())
    }

    pub fn write_study_info(writer: &mut XmlWriter, study: &CellStudyInfo, index: usize) {
        writer.start(STUDY_INFO, &[]);
        writer.text_element(STUDY_NUMBER, &index.to_string());
        writer.cdata_element(URL, &study.url);
        writer.cdata_element(KEYWORDS, &study.keywords);
        writer.cdata_element(TITLE, &study.title);
        writer.cdata_element(AUTHORS, &study.authors);
        writer.cdata_element(CITATION, &study.citation);
        writer.cdata_element(STEREOTAXIC_SPACE, &study.stereotaxic_space);
        writer.end();
    }

    /// Read the children of a `CellStudyInfo` element. Call this right after its start event.
    pub fn read_study_info(events: &mut XmlEvents<'_>) -> Result<CellStudyInfo> {
        let depth = events.open_elements().len();
        let mut study = CellStudyInfo::default();

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("study info element is not closed")),
                Some(XmlEvent::End(_)) if events.open_elements().len() < depth => return Ok(study),
                Some(XmlEvent::Start { name, .. }) => {
                    let text = events.read_element_text()?.trim().to_string();
                    match name.as_str() {
                        URL => study.url = text,
                        KEYWORDS => study.keywords = text,
                        TITLE => study.title = text,
                        AUTHORS => study.authors = text,
                        CITATION => study.citation = text,
                        STEREOTAXIC_SPACE => study.stereotaxic_space = text,
                        _ => {},
                    }
                },
                Some(_) => {},
            }
        }
    }
}


/// A list of cells, or foci, and the studies they were taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFile<K: CellKind = Cells> {
    header: FileHeader,
    cells: Vec<Cell>,
    studies: Vec<CellStudyInfo>,
    kind: PhantomData<K>,
}

pub type FociFile = CellFile<Foci>;

impl<K: CellKind> Default for CellFile<K> {
    fn default() -> Self {
        CellFile {
            header: FileHeader::new(K::DESCRIPTIVE_NAME, K::EXTENSION, K::ROOT_ELEMENT),
            cells: Vec::new(),
            studies: Vec::new(),
            kind: PhantomData,
        }
    }
}

impl<K: CellKind> CellFile<K> {
    pub fn new() -> Self { Self::default() }

    pub fn number_of_cells(&self) -> usize { self.cells.len() }
    pub fn cell(&self, index: usize) -> &Cell { &self.cells[index] }
    pub fn cells(&self) -> &[Cell] { &self.cells }

    /// Access a cell for modification, marking the file as modified.
    pub fn cell_mut(&mut self, index: usize) -> &mut Cell {
        self.header.set_modified();
        &mut self.cells[index]
    }

    pub fn add_cell(&mut self, cell: Cell) {
        self.cells.push(cell);
        self.header.set_modified();
    }

    pub fn remove_cell(&mut self, index: usize) {
        if index < self.cells.len() {
            self.cells.remove(index);
            self.header.set_modified();
        }
    }

    pub fn remove_cells_with_name(&mut self, name: &str) {
        let before = self.cells.len();
        self.cells.retain(|cell| cell.name != name);
        if before != self.cells.len() { self.header.set_modified(); }
    }

    pub fn number_of_study_info(&self) -> usize { self.studies.len() }
    pub fn study_info(&self, index: usize) -> &CellStudyInfo { &self.studies[index] }
    pub fn studies(&self) -> &[CellStudyInfo] { &self.studies }

    /// Add a study and return its index.
    pub fn add_study_info(&mut self, study: CellStudyInfo) -> usize {
        self.studies.push(study);
        self.header.set_modified();
        self.studies.len() - 1
    }

    pub fn set_study_info(&mut self, index: usize, study: CellStudyInfo) {
        self.studies[index] = study;
        self.header.set_modified();
    }

    /// Remove the study. Cells linked to it are unlinked, links to later studies are renumbered.
    pub fn delete_study_info(&mut self, index: usize) {
        if index >= self.studies.len() { return; }

        self.studies.remove(index);
        unlink_study(self.cells.iter_mut(), i32::try_from(index).unwrap_or(i32::MAX));
        self.header.set_modified();
    }

    pub fn delete_all_study_info(&mut self) {
        for cell in &mut self.cells { cell.study_number = -1; }
        self.studies.clear();
        self.header.set_modified();
    }

    /// All class names in use, sorted, without the empty class.
    pub fn class_names(&self) -> BTreeSet<&str> {
        self.cells.iter().map(|cell| cell.class_name.as_str())
            .filter(|class| !class.is_empty())
            .collect()
    }

    /// Set the displayed flag of every cell. Returns the number of displayed cells.
    pub fn set_display_flags(&mut self, filter: &DisplayFilter) -> usize {
        apply_display_filter(self.cells.iter_mut(), &self.studies, filter)
    }

    pub fn displayed_cell_indices(&self) -> Vec<usize> {
        self.cells.iter().enumerate()
            .filter(|(_, cell)| cell.displayed)
            .map(|(index, _)| index)
            .collect()
    }

    /// Derive the structure of every cell from the sign of its x coordinate.
    pub fn set_structures_from_x_coordinates(&mut self) {
        for cell in &mut self.cells {
            cell.structure = Structure::from_x_coordinate(cell.position.0);
        }

        self.header.set_modified();
    }

    /// Add the cells and studies of the other file.
    /// The study numbers of the added cells are shifted past the existing studies.
    pub fn append(&mut self, other: &CellFile<K>, comment_mode: CommentMode) {
        let study_offset = i32::try_from(self.studies.len()).unwrap_or(i32::MAX);

        self.cells.extend(other.cells.iter().cloned().map(|mut cell| {
            if cell.study_number >= 0 { cell.study_number += study_offset; }
            cell
        }));

        self.studies.extend_from_slice(&other.studies);
        self.header.append_file_comment(&other.header, comment_mode);
        self.header.set_modified();
    }

    fn read_text(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let mut version = None;
        let mut number_of_cells = 0_usize;
        let mut number_of_studies = 0_usize;
        let mut is_first_tag = true;

        loop {
            let line = text.read_non_empty_line()?;
            let (tag, value) = split_tag_line(&line);

            match tag {
                VERSION => version = Some(parse::<i32>(value, "cell file version")?),
                tag::NUMBER_OF_CELLS => number_of_cells = parse(value, "number of cells")?,
                tag::NUMBER_OF_COMMENTS => number_of_studies = parse(value, "number of comments")?,
                BEGIN_DATA => break,

                _ if is_first_tag => {
                    let count: usize = parse(&line, "number of cells")?;
                    for _ in 0 .. count {
                        let cell = Cell::read_version_0_line(&text.read_non_empty_line()?)?;
                        self.cells.push(cell);
                    }

                    return Ok(());
                },

                other => log::warn!("unrecognized cell file tag {}", other),
            }

            is_first_tag = false;
        }

        for _ in 0 .. number_of_cells {
            let cell = Cell::read_text_line(&text.read_non_empty_line()?)?;
            self.cells.push(cell);
        }

        let studies = match version {
            Some(1) => StudyInfoReader::read_titles(text, number_of_studies)?,
            Some(2) => StudyInfoReader::read_numbered_tags(text)?,
            other => return Err(Error::invalid(format!("Unrecognized cell file version {}", other.unwrap_or(-1)))),
        };

        for cell in &mut self.cells {
            cell.study_number = studies.renumber(cell.study_number);
        }

        self.studies = studies.studies;
        Ok(())
    }

    fn write_text(&self, write: &mut Vec<u8>) -> UnitResult {
        writeln!(write, "{} 2", VERSION)?;
        writeln!(write, "{} {}", tag::NUMBER_OF_CELLS, self.cells.len())?;
        writeln!(write, "{} {}", tag::NUMBER_OF_COMMENTS, self.studies.len())?;
        writeln!(write, "{}", BEGIN_DATA)?;

        for (index, cell) in self.cells.iter().enumerate() {
            cell.write_text_line(write, index)?;
        }

        write_study_info_tags(write, &self.studies)
    }

    fn read_xml(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let mut events = XmlEvents::new(text.all_bytes());
        events.read_root(K::ROOT_ELEMENT)?;

        while let Some(event) = events.next_event()? {
            if let XmlEvent::Start { name, .. } = event {
                match name.as_str() {
                    FILE_HEADER => read_file_header(&mut events, &mut self.header)?,
                    xml_elements::STUDY_INFO => self.studies.push(xml_elements::read_study_info(&mut events)?),
                    xml_elements::CELL_DATA => {},
                    xml_elements::CELL_BASE => {
                        let mut cell = Cell::default();
                        xml_elements::read_cell_base(&mut events, &mut cell)?;
                        self.cells.push(cell);
                    },

                    _ => events.skip_element()?,
                }
            }
        }

        Ok(())
    }

    fn write_xml(&self, write: &mut Vec<u8>) -> UnitResult {
        let mut writer = XmlWriter::new();
        writer.start(K::ROOT_ELEMENT, &[]);
        write_file_header(&mut writer, &self.header);

        for (index, cell) in self.cells.iter().enumerate() {
            writer.start(xml_elements::CELL_DATA, &[]);
            writer.text_element(xml_elements::CELL_NUMBER, &index.to_string());
            xml_elements::write_cell_base(&mut writer, cell);
            writer.end();
        }

        for (index, study) in self.studies.iter().enumerate() {
            xml_elements::write_study_info(&mut writer, study, index);
        }

        write.write_all(writer.finish().as_bytes())?;
        Ok(())
    }
}

impl<K: CellKind> DataFile for CellFile<K> {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Xml);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.cells.clear();
        self.studies.clear();
    }

    fn is_empty(&self) -> bool { self.cells.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        match format {
            FileFormat::Ascii => self.read_text(text),
            FileFormat::Xml => self.read_xml(text),
            other => Err(Error::unsupported(format!("cells in {} format", other))),
        }
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        match format {
            FileFormat::Ascii => self.write_text(write),
            FileFormat::Xml => self.write_xml(write),
            other => Err(Error::unsupported(format!("cells in {} format", other))),
        }
    }
}

impl<K: CellKind> CompareForTesting for CellFile<K> {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_cells() != other.number_of_cells() {
            return Err("Files have a different number of cells.".to_string());
        }

        for (index, (mine, theirs)) in self.cells.iter().zip(&other.cells).enumerate() {
            if mine.name != theirs.name {
                return Err(format!("Cell {} names do not match {} and {}", index, mine.name, theirs.name));
            }

            if mine.position.distance(theirs.position) > tolerance {
                return Err(format!("Cell {} coordinates do not match", index));
            }
        }

        if self.studies != other.studies {
            return Err("Files have different study info.".to_string());
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

    fn study(title: &str, keywords: &str) -> CellStudyInfo {
        CellStudyInfo { title: title.into(), keywords: keywords.into(), ..CellStudyInfo::default() }
    }

    fn file() -> CellFile {
        let mut file = CellFile::new();
        file.add_study_info(study("visual", "vision; motion"));

        let mut left = Cell::new("V1", Vec3(-20.0, -80.0, 5.0));
        left.study_number = 0;
        left.class_name = "peak".into();
        file.add_cell(left);
        file.add_cell(Cell::new("MT", Vec3(40.0, -60.0, 2.0)));
        file
    }

    #[test]
    fn structure_follows_x(){
        let file = file();
        assert_eq!(file.cell(0).structure, Structure::Left);
        assert_eq!(file.cell(1).structure, Structure::Right);
    }

    #[test]
    fn text_and_xml_round_trip(){
        for format in [FileFormat::Ascii, FileFormat::Xml] {
            let mut file = file();
            file.header_mut().set_write_format(format);

            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
            let mut read = CellFile::<Cells>::new();
            read_file_from_bytes(&mut read, Path::new("a.cell"), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.compare_file_for_unit_testing(&file, 0.001), Ok(()));
            assert_eq!(read.cell(0).class_name, "peak");
            assert_eq!(read.cell(1).class_name, "");
            assert_eq!(read.cell(0).study_number, 0);
            assert_eq!(read.cell(1).structure, Structure::Right);
        }
    }

    #[test]
    fn study_numbers_are_renumbered_on_read(){
        let text = b"BeginHeader\nEndHeader\ntag-version 2\ntag-number-of-cells 1\ntag-number-of-comments 1\n\
            tag-BEGIN-DATA\n0 1.0 2.0 3.0 focus 7 0 ???\n7 tag-title first\\nsecond\n7 tag-url http://a\n";

        let mut file = FociFile::new();
        read_file_from_bytes(&mut file, Path::new("a.foci"), text, ReadOptions::default()).unwrap();
        assert_eq!(file.cell(0).study_number, 0);
        assert_eq!(file.study_info(0).title, "first\nsecond");
        assert_eq!(file.study_info(0).url, "http://a");
    }

    #[test]
    fn unknown_version_is_invalid(){
        let text = b"BeginHeader\nEndHeader\ntag-version 9\ntag-BEGIN-DATA\n";
        let result = read_file_from_bytes(&mut CellFile::<Cells>::new(), Path::new("a.cell"), text, ReadOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn append_shifts_study_numbers(){
        let mut file = file();
        let other = file.clone();
        file.append(&other, CommentMode::Append);

        assert_eq!(file.number_of_cells(), 4);
        assert_eq!(file.number_of_study_info(), 2);
        assert_eq!(file.cell(2).study_number, 1);
        assert_eq!(file.cell(3).study_number, -1);

        file.delete_study_info(0);
        assert_eq!(file.cell(0).study_number, -1);
        assert_eq!(file.cell(2).study_number, 0);
    }

    #[test]
    fn display_filters(){
        let mut file = file();

        let keywords = DisplayFilter { keywords: Some(["motion".to_string()].into()), ..DisplayFilter::default() };
        assert_eq!(file.set_display_flags(&keywords), 1);
        assert_eq!(file.displayed_cell_indices(), vec![0]);

        let right = DisplayFilter { hemisphere: HemisphereFilter::RightOnly, ..DisplayFilter::default() };
        assert_eq!(file.set_display_flags(&right), 1);
        assert_eq!(file.displayed_cell_indices(), vec![1]);

        let name = DisplayFilter { name: Some("v".into()), keep_hidden: true, ..DisplayFilter::default() };
        assert_eq!(file.set_display_flags(&name), 0);

        assert_eq!(file.set_display_flags(&DisplayFilter::default()), 2);
        assert_eq!(file.class_names().into_iter().collect::<Vec<_>>(), vec!["peak"]);
    }
}
