
//! The spec file lists all data files of a dataset, grouped by kind,
//! and remembers which of them are selected for loading.
//!
//! In text format, each line after the header names one file:
//! `<tag> <file name> [<data file name>] [<structure>]`.
//! Files of version 1 and later store the structure right after the tag instead.

pub mod entry;
pub mod scene;
pub mod utilities;

use std::io::Write;
use std::path::{Path, PathBuf};
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{TextReader, tokens};
use crate::loader::{DataFileKind, LoadedFile};
use crate::meta::{FileFormat, FormatMatrix, ReadOptions, Structure};
use crate::meta::header::{FileHeader, tag as header_tag};
use entry::resolve;
use crate::xml::{XmlEvent, XmlEvents, XmlWriter, read_file_header, write_file_header, FILE_HEADER};

pub use entry::{Entry, EntryKind, FileType, ListedFile, SortMethod, ENTRY_KINDS, base_name, entry_kind, extension, tag};
pub use scene::{Scene, SceneClass, SceneInfo};


/// The name of the scene class that stores the loaded files.
pub const SCENE_CLASS: &str = "SpecFile";

const ROOT_ELEMENT: &str = "Spec_File";

mod xml_element {
    pub const FILE_NAME: &str = "file1";
    pub const DATA_FILE_NAME: &str = "file2";
    pub const STRUCTURE: &str = "structure";
}


/// Selects which groups of entries an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileTypes {
    pub volume: bool,
    pub surface: bool,
    pub other: bool,
}

impl FileTypes {
    pub const ALL: FileTypes = FileTypes { volume: true, surface: true, other: true };

    pub fn contains(self, file_type: FileType) -> bool {
        match file_type {
            FileType::Volume => self.volume,
            FileType::Surface => self.surface,
            FileType::Other => self.other,
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct SpecFile {
    header: FileHeader,
    entries: Vec<Entry>,
    file_version: i32,
    write_only_selected_files: bool,
    sorting: SortMethod,
}

impl Default for SpecFile {
    fn default() -> Self {
        SpecFile {
            header: FileHeader::new("Spec File", extension::SPEC, ROOT_ELEMENT),
            entries: ENTRY_KINDS.iter().copied().map(Entry::new).collect(),
            file_version: 0,
            write_only_selected_files: false,
            sorting: SortMethod::default(),
        }
    }
}

impl SpecFile {
    pub fn new() -> Self { Self::default() }

    pub fn entries(&self) -> &[Entry] { &self.entries }

    /// The entry with exactly the specified tag.
    pub fn entry(&self, tag: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.tag() == tag)
    }

    pub fn entry_mut(&mut self, tag: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.tag() == tag)
    }

    pub fn file_version(&self) -> i32 { self.file_version }

    /// Version 1 and later store the structure of each file right after its tag.
    pub fn set_file_version(&mut self, version: i32) {
        self.file_version = version;
        self.header.set_tag(header_tag::VERSION_ID, version.to_string());
    }

    pub fn sorting(&self) -> SortMethod { self.sorting }
    pub fn set_sorting(&mut self, sorting: SortMethod) { self.sorting = sorting; }

    /// Write only the selected files the next time this file is written.
    pub fn set_write_only_selected_files(&mut self, only_selected: bool) {
        self.write_only_selected_files = only_selected;
    }

    pub fn structure(&self) -> Structure { self.header.structure() }
    pub fn set_structure(&mut self, structure: Structure) { self.header.set_structure(structure); }

    pub fn species(&self) -> &str { self.header.tag(header_tag::SPECIES).unwrap_or("") }
    pub fn set_species(&mut self, species: &str) { self.header.set_tag(header_tag::SPECIES, species); }

    pub fn subject(&self) -> &str { self.header.tag(header_tag::SUBJECT).unwrap_or("") }
    pub fn set_subject(&mut self, subject: &str) { self.header.set_tag(header_tag::SUBJECT, subject); }

    pub fn space(&self) -> &str { self.header.tag(header_tag::SPACE).unwrap_or("") }
    pub fn set_space(&mut self, space: &str) { self.header.set_tag(header_tag::SPACE, space); }

    pub fn category(&self) -> &str { self.header.tag(header_tag::CATEGORY).unwrap_or("") }
    pub fn set_category(&mut self, category: &str) { self.header.set_tag(header_tag::CATEGORY, category); }

    /// The directory that relative file names refer to.
    pub fn directory(&self) -> PathBuf {
        self.header.file_name()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Forget the files of the selected groups, optionally deleting them from the disk.
    pub fn clear_files(&mut self, types: FileTypes, remove_from_disk: bool) {
        let directory = self.directory();

        for entry in self.entries.iter_mut().filter(|entry| types.contains(entry.file_type())) {
            entry.clear(&directory, remove_from_disk);
        }

        self.header.set_modified();
    }

    /// Forget all files that no longer exist. Returns their names.
    pub fn clean(&mut self) -> Vec<String> {
        let directory = self.directory();
        let removed: Vec<String> = self.entries.iter_mut()
            .flat_map(|entry| entry.retain_existing(&directory))
            .collect();

        if !removed.is_empty() {
            log::info!("removed {} missing files from the spec file", removed.len());
            self.header.set_modified();
        }

        removed
    }

    /// Add all files of the other spec file that are not yet listed.
    pub fn append(&mut self, other: &SpecFile) {
        for entry in &other.entries {
            for file in entry.files() {
                self.add_to_spec_file(entry.tag(), &file.filename, &file.data_file_name);
            }
        }
    }

    /// Add a file with a name relative to this spec file, or only its last component
    /// if this spec file has no name yet. Returns whether the tag is known.
    pub fn add_to_spec_file(&mut self, tag: &str, filename: &str, data_file_name: &str) -> bool {
        let mut filename = filename.to_string();
        match self.header.file_name().and_then(Path::parent) {
            Some(directory) if !directory.as_os_str().is_empty() =>
                crate::deformation_map::make_file_relative(directory, &mut filename),

            _ => filename = base_name(&filename).to_string(),
        }

        let data_file_name = base_name(data_file_name);
        let count = self.number_of_files();

        let known = self.add_file(tag, &filename, data_file_name, self.structure());
        if self.number_of_files() != count {
            self.header.set_modified();
        }

        known
    }

    /// Add the file to the first entry that accepts the tag.
    /// Unknown tags are kept in the header.
    fn add_file(&mut self, tag: &str, filename: &str, data_file_name: &str, structure: Structure) -> bool {
        let accepted = self.entries.iter_mut()
            .any(|entry| entry.add_file(tag, filename, data_file_name, structure));

        if !accepted {
            log::warn!("unknown spec file tag moved to header: {}", tag);
            self.header.set_tag(tag, filename);
        }

        accepted
    }

    /// Interpret the tokens of one line.
    fn process_tokens(&mut self, line: &[&str]) -> bool {
        let Some((&tag, mut rest)) = line.split_first() else { return false };

        let mut structure = Structure::Invalid;
        if self.file_version >= 1 {
            let Some((&name, remaining)) = rest.split_first() else { return false };
            structure = Structure::from_name(name);
            rest = remaining;
        }

        let (filename, data_file_name) = match *rest {
            [] => return false,
            [filename] => (filename, ""),

            [filename, extra] if self.file_version < 1 && Structure::from_name(extra) != Structure::Invalid => {
                structure = Structure::from_name(extra);
                (filename, "")
            },

            [filename, data_file_name] => (filename, data_file_name),

            [filename, data_file_name, extra, ..] => {
                if self.file_version < 1 { structure = Structure::from_name(extra); }
                (filename, data_file_name)
            },
        };

        self.add_file(tag, filename, data_file_name, structure)
    }

    pub fn number_of_files(&self) -> usize {
        self.entries.iter().map(Entry::number_of_files).sum()
    }

    pub fn number_of_selected_files(&self) -> usize {
        self.entries.iter().map(Entry::number_of_files_selected).sum()
    }

    /// Whether scene files are the only files selected.
    pub fn only_scene_files_selected(&self) -> bool {
        let scenes = self.entry(tag::SCENE).map_or(0, Entry::number_of_files_selected);
        scenes > 0 && scenes == self.number_of_selected_files()
    }

    pub fn set_all_file_selections(&mut self, selected: bool) {
        for entry in &mut self.entries {
            entry.set_all_selections(selected);
        }
    }

    /// Select the files of an entry whose last component matches the name.
    pub fn set_selected(&mut self, tag: &str, name: &str, add_if_not_found: bool) -> bool {
        let structure = self.structure();
        self.entry_mut(tag).map_or(false, |entry| entry.set_selected(name, add_if_not_found, structure))
    }

    fn select_in(&mut self, tags: &[&str], name: &str, add_if_not_found: bool, structure: Structure) -> bool {
        let mut selected = false;
        for tag in tags {
            if let Some(entry) = self.entry_mut(tag) {
                selected |= entry.set_selected(name, add_if_not_found, structure);
            }
        }

        selected
    }

    /// Select the first file in the first entry of the list that has files.
    fn select_first_in(&mut self, tags: &[&str]) -> bool {
        tags.iter().any(|tag| self.entry_mut(tag).map_or(false, Entry::select_first))
    }

    /// Select the topology and the coordinates, adding them as unknown files if they are not listed.
    pub fn set_topology_and_coordinates_selected(&mut self, topology: &str, coordinates: &str, structure: Structure) {
        self.select_in(&[tag::UNKNOWN_TOPO], topology, true, structure);
        self.select_in(&[tag::UNKNOWN_COORD], coordinates, true, structure);
    }

    /// Select the files that metric mapping needs.
    /// Fails if the topology or the coordinates are not listed. The metric file is optional.
    pub fn set_files_for_metric_mapping(&mut self, topology: &str, coordinates: &str, metric: &str, structure: Structure) -> UnitResult {
        const TOPOLOGY: [&str; 5] = [tag::CLOSED_TOPO, tag::OPEN_TOPO, tag::CUT_TOPO, tag::LOBAR_CUT_TOPO, tag::UNKNOWN_TOPO];
        const COORDINATES: [&str; 12] = [
            tag::FIDUCIAL_COORD, tag::RAW_COORD, tag::INFLATED_COORD, tag::VERY_INFLATED_COORD,
            tag::SPHERICAL_COORD, tag::ELLIPSOID_COORD, tag::COMPRESSED_COORD, tag::FLAT_COORD,
            tag::LOBAR_FLAT_COORD, tag::HULL_COORD, tag::UNKNOWN_COORD, tag::AVERAGE_FIDUCIAL_COORD,
        ];

        let topology_selected = TOPOLOGY.iter().any(|&tag| self.select_in(&[tag], topology, false, structure));
        let coordinates_selected = COORDINATES.iter().any(|&tag| self.select_in(&[tag], coordinates, false, structure));
        self.select_in(&[tag::METRIC], metric, false, structure);

        let mut messages = Vec::new();
        if !topology_selected { messages.push(format!("ERROR: {} is not a topo file in the spec file.", topology)); }
        if !coordinates_selected { messages.push(format!("ERROR: {} is not a coord file in the spec file.", coordinates)); }

        if messages.is_empty() { Ok(()) }
        else { Err(Error::DependencyMissing(messages.join("\n").into())) }
    }

    /// Select only one fiducial and one flat surface, with the shape, params and hull files.
    /// Surfaces are preferred, otherwise a topology and coordinates are selected.
    pub fn set_default_files_fiducial_and_flat(&mut self) {
        self.set_all_file_selections(false);

        if !self.select_first_in(&[tag::FIDUCIAL_SURFACE]) {
            self.select_first_in(&[tag::CLOSED_TOPO]);
            self.select_first_in(&[tag::FIDUCIAL_COORD]);
        }

        if !self.select_first_in(&[tag::FLAT_SURFACE]) {
            self.select_first_in(&[tag::CUT_TOPO]);
            self.select_first_in(&[tag::FLAT_COORD]);
        }

        self.select_first_in(&[tag::SURFACE_SHAPE]);
        self.select_first_in(&[tag::PARAMS]);
        self.select_first_in(&[tag::CEREBRAL_HULL]);
    }

    /// Select only the files that deforming a surface needs.
    #[allow(clippy::too_many_arguments)]
    pub fn set_deformation_selected_files(
        &mut self, closed_topology: &str, cut_topology: &str,
        fiducial_coordinates: &str, spherical_coordinates: &str, flat_coordinates: &str,
        border_or_border_projection: &str, add_if_not_found: bool, structure: Structure,
    ) {
        self.set_all_file_selections(false);

        let topology = [tag::CLOSED_TOPO, tag::CUT_TOPO, tag::LOBAR_CUT_TOPO];
        self.select_in(&topology, closed_topology, add_if_not_found, structure);
        self.select_in(&topology, cut_topology, add_if_not_found, structure);

        self.select_in(&[tag::FIDUCIAL_COORD], fiducial_coordinates, add_if_not_found, structure);
        self.select_in(&[tag::SPHERICAL_COORD], spherical_coordinates, add_if_not_found, structure);
        self.select_in(&[tag::FLAT_COORD, tag::LOBAR_FLAT_COORD], flat_coordinates, add_if_not_found, structure);

        self.select_in(
            &[tag::SPHERICAL_BORDER, tag::FLAT_BORDER, tag::LOBAR_FLAT_BORDER, tag::BORDER_PROJECTION],
            border_or_border_projection, add_if_not_found, structure
        );
    }

    /// Additionally select the files that multi-resolution morphing needs.
    pub fn set_multiresolution_morphing_files(&mut self, topology: &str, fiducial: &str, flat_or_sphere: &str, structure: Structure) {
        self.select_in(
            &[tag::CLOSED_TOPO, tag::OPEN_TOPO, tag::CUT_TOPO, tag::LOBAR_CUT_TOPO, tag::UNKNOWN_TOPO],
            topology, false, structure
        );

        self.select_in(&[tag::FIDUCIAL_COORD], fiducial, false, structure);
        self.select_in(&[tag::SPHERICAL_COORD, tag::FLAT_COORD, tag::LOBAR_FLAT_COORD], flat_or_sphere, false, structure);
    }

    pub fn prepend_path_to_all_files(&mut self, directory: &str, ignore_absolute: bool) {
        for entry in &mut self.entries {
            entry.prepend_path(directory, ignore_absolute);
        }
    }

    pub fn remove_paths_from_all_files(&mut self) {
        for entry in &mut self.entries {
            entry.remove_paths();
        }
    }

    pub fn sort_all_files_by_name(&mut self) {
        self.sort_all_files(SortMethod::Name);
    }

    pub fn sort_all_files_by_date(&mut self) {
        self.sort_all_files(SortMethod::Date);
    }

    fn sort_all_files(&mut self, method: SortMethod) {
        let directory = self.directory();
        for entry in &mut self.entries {
            entry.sort(method, &directory);
        }
    }

    /// All file names, with the separate data files of volumes if requested.
    pub fn all_data_files(&self, include_volume_data: bool) -> Vec<String> {
        let mut files = Vec::new();

        for entry in &self.entries {
            for file in entry.files() {
                files.push(file.filename.clone());

                if include_volume_data && entry.file_type() == FileType::Volume && !file.data_file_name.is_empty() {
                    files.push(file.data_file_name.clone());
                }
            }
        }

        files
    }

    /// Rewrite every listed data file in the first of the formats its kind can write.
    /// Volumes and files without header are left alone.
    /// Returns what happened to each file, by its name in this spec file.
    pub fn convert_all_data_files_to_type(&self, formats: &[FileFormat]) -> Vec<(String, Conversion)> {
        let directory = self.directory();
        let ids = std::sync::Arc::new(crate::border::UniqueIdSource::new());
        let mut conversions = Vec::new();

        for entry in self.entries.iter().filter(|entry| entry.file_type() != FileType::Volume) {
            let kind = DataFileKind::from_tag(entry.tag());
            let target = formats.iter().copied().find(|&format| kind.formats().can_write(format));

            for file in entry.files() {
                let conversion = match target {
                    None => Conversion::NotSupported,
                    Some(format) => convert_file(kind, &resolve(&directory, &file.filename), format, &ids)
                        .unwrap_or_else(|error| Conversion::Failed(error.to_string())),
                };

                conversions.push((file.filename.clone(), conversion));
            }
        }

        conversions
    }

    /// Fail with a list of all selected files that cannot be found.
    pub fn validate(&self) -> UnitResult {
        let directory = self.directory();
        let mut message = String::new();

        for entry in &self.entries {
            entry.validate(&directory, &mut message);
        }

        if message.is_empty() { Ok(()) }
        else { Err(Error::DependencyMissing(message.into())) }
    }

    /// Whether every file of this spec file is listed in the other spec file.
    /// Otherwise returns a line for each file that is missing from the other.
    pub fn is_subset_of_other_spec_file(&self, other: &SpecFile) -> std::result::Result<(), String> {
        let mut message = String::new();

        for entry in &self.entries {
            match other.entry(entry.tag()) {
                Some(other_entry) => { entry.is_subset(other_entry, &mut message); },
                None => { entry.is_subset(&Entry::new(*entry.kind()), &mut message); },
            }
        }

        if message.is_empty() { Ok(()) } else { Err(message) }
    }

    /// Deselect the files that are also selected in the other spec file.
    pub fn deselect_files_selected_in_other_spec_file(&mut self, other: &SpecFile) {
        for entry in &mut self.entries {
            if let Some(other_entry) = other.entry(entry.tag()) {
                entry.deselect_files_selected_in(other_entry);
            }
        }
    }

    /// Deselect the files with the specified names in the entries with the specified tags.
    pub fn clear_selection_status(&mut self, tags: &[&str], filename: &str) {
        for tag in tags {
            if let Some(entry) = self.entry_mut(tag) {
                entry.clear_selection_status(filename);
            }
        }
    }

    /// Replace all files with the files recorded in the scene.
    /// Scene files are not restored. Returns the unrecognized tags, one per line.
    pub fn show_scene(&mut self, scene: &Scene) -> String {
        self.clear();
        let mut message = String::new();

        for class in scene.classes.iter().filter(|class| class.name == SCENE_CLASS) {
            for info in &class.infos {
                if info.name == tag::SCENE {
                    continue;
                }

                let mut names = info.value.split(':');
                let filename = names.next().unwrap_or("");
                let data_file_name = names.next().unwrap_or("");
                if filename.is_empty() {
                    continue;
                }

                let structure = self.structure();
                let known = self.entries.iter_mut()
                    .any(|entry| entry.add_file(&info.name, filename, data_file_name, structure));

                if !known {
                    message.push_str(&format!("Unrecognized spec file tag in scene: {}\n", info.name));
                }
            }
        }

        message
    }

    /// Record the files in the scene, unless there are none.
    pub fn save_scene(&self, scene: &mut Scene, selected_only: bool) {
        let mut class = SceneClass::new(SCENE_CLASS);

        for entry in &self.entries {
            entry.save_scene(&mut class, selected_only);
        }

        if !class.is_empty() {
            scene.add_class(class);
        }
    }

    fn structure_to_write(&self, file: &ListedFile) -> Option<Structure> {
        let differs = file.structure != Structure::Invalid && file.structure != self.structure();
        if self.file_version >= 1 || differs { Some(file.structure) } else { None }
    }

    fn files_to_write(&self) -> impl Iterator<Item = (&Entry, &ListedFile)> {
        self.entries.iter().flat_map(move |entry| {
            entry.files().iter()
                .filter(move |file| !file.is_marked_for_deletion())
                .filter(move |file| file.selected || !self.write_only_selected_files)
                .map(move |file| (entry, file))
        })
    }

    fn read_text(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        while let Some(line) = text.next_line() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            self.process_tokens(&tokens(line));
        }

        Ok(())
    }

    fn read_xml(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        let mut events = XmlEvents::new(text.all_bytes());
        events.read_root(ROOT_ELEMENT)?;

        while let Some(event) = events.next_event()? {
            let XmlEvent::Start { name, .. } = event else { continue };

            if name == FILE_HEADER {
                read_file_header(&mut events, &mut self.header)?;
                self.file_version = self.header.version_id().unwrap_or(0);
                continue;
            }

            let depth = events.open_elements().len();
            let mut filename = String::new();
            let mut data_file_name = String::new();
            let mut structure = String::new();

            loop {
                match events.next_event()? {
                    None => return Err(Error::invalid(format!("spec file element {} is not closed", name))),
                    Some(XmlEvent::End(_)) if events.open_elements().len() < depth => break,

                    Some(XmlEvent::Start { name: child, .. }) => {
                        let target = match child.as_str() {
                            xml_element::FILE_NAME => &mut filename,
                            xml_element::DATA_FILE_NAME => &mut data_file_name,
                            xml_element::STRUCTURE => &mut structure,
                            _ => { events.skip_element()?; continue; },
                        };

                        *target = events.read_element_text()?.trim().to_string();
                    },

                    Some(_) => {},
                }
            }

            if !filename.is_empty() {
                self.add_file(&name, &filename, &data_file_name, Structure::from_name(&structure));
            }
        }

        Ok(())
    }

    fn write_text(&self, write: &mut Vec<u8>) -> UnitResult {
        writeln!(write)?;

        for (entry, file) in self.files_to_write() {
            write!(write, "{}", entry.tag())?;

            if self.file_version >= 1 {
                write!(write, " {}", file.structure)?;
            }

            write!(write, " {}", file.filename)?;

            if !file.data_file_name.is_empty() && file.data_file_name != file.filename {
                write!(write, " {}", file.data_file_name)?;
            }

            if self.file_version < 1 {
                if let Some(structure) = self.structure_to_write(file) {
                    write!(write, " {}", structure)?;
                }
            }

            writeln!(write)?;
        }

        writeln!(write)?;
        Ok(())
    }

    fn write_xml(&self, write: &mut Vec<u8>) -> UnitResult {
        let mut writer = XmlWriter::new();
        writer.start(ROOT_ELEMENT, &[]);
        write_file_header(&mut writer, &self.header);

        for (entry, file) in self.files_to_write() {
            writer.start(entry.tag(), &[]);

            if let Some(structure) = self.structure_to_write(file) {
                writer.cdata_element(xml_element::STRUCTURE, structure.name());
            }

            writer.cdata_element(xml_element::FILE_NAME, &file.filename);

            if !file.data_file_name.is_empty() && file.data_file_name != file.filename {
                writer.cdata_element(xml_element::DATA_FILE_NAME, &file.data_file_name);
            }

            writer.end();
        }

        write.write_all(writer.finish().as_bytes())?;
        Ok(())
    }
}

impl DataFile for SpecFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Xml);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    /// Forget all files and the header, but keep the sorting mode.
    fn clear(&mut self) {
        self.header.clear();
        self.file_version = 0;
        self.write_only_selected_files = false;

        for entry in &mut self.entries {
            entry.clear(Path::new(""), false);
        }
    }

    fn is_empty(&self) -> bool { self.number_of_files() == 0 }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        self.file_version = self.header.version_id().unwrap_or(0);

        match format {
            FileFormat::Ascii => self.read_text(text)?,
            FileFormat::Xml => self.read_xml(text)?,
            other => return Err(Error::unsupported(format!("spec files in {} format", other))),
        }

        if self.space() == "7112B" {
            self.set_space("711-2B");
        }

        let structure = self.structure();
        for entry in &mut self.entries {
            for file in entry.files_mut().iter_mut().filter(|file| file.structure == Structure::Invalid) {
                file.structure = structure;
            }
        }

        let sorting = self.sorting;
        self.sort_all_files(sorting);
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        match format {
            FileFormat::Ascii => self.write_text(write),
            FileFormat::Xml => self.write_xml(write),
            other => Err(Error::unsupported(format!("spec files in {} format", other))),
        }
    }
}

impl CompareForTesting for SpecFile {
    fn compare_file_for_unit_testing(&self, other: &Self, _tolerance: f32) -> std::result::Result<(), String> {
        for (entry, other_entry) in self.entries.iter().zip(&other.entries) {
            let names = |entry: &Entry| entry.files().iter()
                .map(|file| (file.filename.clone(), file.data_file_name.clone()))
                .collect::<Vec<_>>();

            if names(entry) != names(other_entry) {
                return Err(format!("{} files do not match.", entry.descriptive_name()));
            }
        }

        Ok(())
    }
}


/// The outcome of converting one data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    AlreadyInFormat,
    Converted(FileFormat),

    /// The kind cannot write any of the requested formats.
    NotSupported,

    /// Files without header do not record their format.
    NoHeader,

    Failed(String),
}

fn convert_file(kind: DataFileKind, path: &Path, format: FileFormat, ids: &std::sync::Arc<crate::border::UniqueIdSource>) -> Result<Conversion> {
    let meta_data_only = ReadOptions { meta_data_only: true };
    let existing = LoadedFile::read(kind, path, meta_data_only, ids)?;

    if !existing.has_header() { return Ok(Conversion::NoHeader); }
    if existing.header().map(FileHeader::read_format) == Some(format) { return Ok(Conversion::AlreadyInFormat); }

    let mut file = LoadedFile::read(kind, path, ReadOptions::default(), ids)?;
    if let Some(header) = file.header_mut() { header.set_write_format(format); }

    file.write_file(path)?;
    Ok(Conversion::Converted(format))
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};

    fn read(text: &str) -> SpecFile {
        let mut file = SpecFile::new();
        file.set_sorting(SortMethod::None);
        read_file_from_bytes(&mut file, Path::new("brain.spec"), text.as_bytes(), ReadOptions::default()).unwrap();
        file
    }

    fn names(file: &SpecFile, tag: &str) -> Vec<String> {
        file.entry(tag).unwrap().files().iter().map(|file| file.filename.clone()).collect()
    }

    const SPEC: &str = "BeginHeader
structure left
species Human
space 7112B
EndHeader

FIDUCIALcoord_file fiducial.coord
CLOSEDtopo_file closed.topo
SMOOTHcoord_file smooth.coord
volume_anatomy_file anatomy.hdr anatomy.img
metric_file right.metric right
# a comment
surprise_file who.knows
";

    #[test]
    fn tags_go_to_matching_entries(){
        let file = read(SPEC);

        assert_eq!(names(&file, tag::FIDUCIAL_COORD), vec!["fiducial.coord"]);
        assert_eq!(names(&file, tag::CLOSED_TOPO), vec!["closed.topo"]);
        assert_eq!(names(&file, tag::UNKNOWN_COORD), vec!["smooth.coord"]);
        assert_eq!(file.entry(tag::VOLUME_ANATOMY).unwrap().files()[0].data_file_name, "anatomy.img");
        assert_eq!(file.header().tag("surprise_file"), Some("who.knows"));
        assert_eq!(file.space(), "711-2B");
        assert_eq!(file.species(), "Human");

        assert_eq!(file.entry(tag::METRIC).unwrap().files()[0].structure, Structure::Right);
        assert_eq!(file.entry(tag::FIDUCIAL_COORD).unwrap().files()[0].structure, Structure::Left);
        assert_eq!(file.number_of_files(), 5);
        assert_eq!(file.number_of_selected_files(), 5);
    }

    #[test]
    fn text_and_xml_round_trip(){
        let mut file = read(SPEC);

        for format in [FileFormat::Ascii, FileFormat::Xml] {
            file.header_mut().set_write_format(format);
            let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

            let mut read = SpecFile::new();
            read.set_sorting(SortMethod::None);
            read_file_from_bytes(&mut read, Path::new("brain.spec"), &bytes, ReadOptions::default()).unwrap();

            assert_eq!(read.header().read_format(), format);
            assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
            assert_eq!(read.entry(tag::METRIC).unwrap().files()[0].structure, Structure::Right);
            assert_eq!(read.structure(), Structure::Left);
        }
    }

    #[test]
    fn versioned_files_store_the_structure_first(){
        let mut file = read(SPEC);
        file.set_file_version(1);
        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("metric_file right right.metric\n"));
        assert!(text.contains("FIDUCIALcoord_file left fiducial.coord\n"));

        let mut read = SpecFile::new();
        read_file_from_bytes(&mut read, Path::new("brain.spec"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.file_version(), 1);
        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
    }

    #[test]
    fn only_selected_and_marked_files(){
        let mut file = read(SPEC);
        file.set_all_file_selections(false);
        file.set_selected(tag::CLOSED_TOPO, "closed.topo", false);
        file.entry_mut(tag::FIDUCIAL_COORD).unwrap().files_mut()[0].filename = "*fiducial.coord".into();
        file.set_write_only_selected_files(true);

        let text = String::from_utf8(write_file_to_bytes(&mut file, WriteOptions::default()).unwrap()).unwrap();
        assert!(text.contains("CLOSEDtopo_file closed.topo"));
        assert!(!text.contains("fiducial.coord"));
        assert!(!text.contains("metric_file"));
    }

    #[test]
    fn subset_lists_missing_files(){
        let mut small = SpecFile::new();
        small.add_to_spec_file(tag::FIDUCIAL_COORD, "f.coord", "");

        let mut large = small.clone();
        large.add_to_spec_file(tag::CLOSED_TOPO, "t.topo", "");

        assert_eq!(small.is_subset_of_other_spec_file(&large), Ok(()));
        assert_eq!(large.is_subset_of_other_spec_file(&large), Ok(()));

        let message = large.is_subset_of_other_spec_file(&small).unwrap_err();
        assert!(message.contains("t.topo"));
        assert!(!message.contains("f.coord"));
    }

    #[test]
    fn append_is_a_union(){
        let mut first = read(SPEC);
        let mut second = SpecFile::new();
        second.add_to_spec_file(tag::CLOSED_TOPO, "/data/closed.topo", "");
        second.add_to_spec_file(tag::PAINT, "/data/areas.paint", "");

        first.append(&second);
        assert_eq!(names(&first, tag::CLOSED_TOPO), vec!["closed.topo"]);
        assert_eq!(names(&first, tag::PAINT), vec!["areas.paint"]);
        assert!(first.is_modified());
    }

    #[test]
    fn deselect_files_of_other(){
        let mut file = read(SPEC);
        let mut other = SpecFile::new();
        other.add_to_spec_file(tag::CLOSED_TOPO, "closed.topo", "");
        other.add_to_spec_file(tag::FIDUCIAL_COORD, "fiducial.coord", "");
        other.entry_mut(tag::FIDUCIAL_COORD).unwrap().set_all_selections(false);

        file.deselect_files_selected_in_other_spec_file(&other);
        assert!(!file.entry(tag::CLOSED_TOPO).unwrap().files()[0].selected);
        assert!(file.entry(tag::FIDUCIAL_COORD).unwrap().files()[0].selected);
    }

    #[test]
    fn scenes_restore_the_files(){
        let mut file = read(SPEC);
        file.add_to_spec_file(tag::SCENE, "views.scene", "");
        file.entry_mut(tag::METRIC).unwrap().set_all_selections(false);

        let mut scene = Scene::new("first");
        file.save_scene(&mut scene, true);
        assert_eq!(scene.classes.len(), 1);

        let class = scene.class(SCENE_CLASS).unwrap();
        assert!(class.infos.iter().any(|info| info.value == "anatomy.hdr:anatomy.img"));
        assert!(!class.infos.iter().any(|info| info.name == tag::METRIC));

        let mut restored = SpecFile::new();
        let message = restored.show_scene(&scene);
        assert_eq!(message, "");
        assert_eq!(names(&restored, tag::UNKNOWN_COORD), vec!["smooth.coord"]);
        assert_eq!(restored.entry(tag::VOLUME_ANATOMY).unwrap().files()[0].data_file_name, "anatomy.img");
        assert!(restored.entry(tag::SCENE).unwrap().is_empty());
        assert!(restored.entry(tag::METRIC).unwrap().is_empty());

        let mut empty = Scene::new("empty");
        SpecFile::new().save_scene(&mut empty, false);
        assert!(empty.classes.is_empty());
    }

    #[test]
    fn default_fiducial_and_flat(){
        let mut file = SpecFile::new();
        for (tag, name) in [
            (tag::CLOSED_TOPO, "closed.topo"), (tag::CUT_TOPO, "cut.topo"),
            (tag::FIDUCIAL_COORD, "fiducial.coord"), (tag::FIDUCIAL_COORD, "other.fiducial.coord"),
            (tag::FLAT_SURFACE, "flat.surf"), (tag::INFLATED_COORD, "inflated.coord"),
            (tag::SURFACE_SHAPE, "depth.surface_shape"), (tag::PAINT, "areas.paint"),
        ] {
            file.add_to_spec_file(tag, name, "");
        }

        file.set_default_files_fiducial_and_flat();

        let selected: Vec<&str> = file.entries().iter()
            .flat_map(|entry| entry.selected_files())
            .map(|file| file.filename.as_str())
            .collect();

        assert_eq!(selected, vec!["closed.topo", "fiducial.coord", "flat.surf", "depth.surface_shape"]);
    }

    #[test]
    fn metric_mapping_needs_topology_and_coordinates(){
        let mut file = read(SPEC);
        file.set_all_file_selections(false);

        assert!(file.set_files_for_metric_mapping("closed.topo", "/elsewhere/smooth.coord", "none.metric", Structure::Left).is_ok());
        assert!(file.entry(tag::UNKNOWN_COORD).unwrap().files()[0].selected);

        let error = file.set_files_for_metric_mapping("no.topo", "no.coord", "", Structure::Left).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("ERROR: no.topo is not a topo file in the spec file.\nERROR: no.coord is not a coord file"));
    }

    #[test]
    fn deformation_selection(){
        let mut file = SpecFile::new();
        file.add_to_spec_file(tag::CUT_TOPO, "cut.topo", "");
        file.add_to_spec_file(tag::FLAT_COORD, "flat.coord", "");
        file.add_to_spec_file(tag::PAINT, "areas.paint", "");

        file.set_deformation_selected_files(
            "closed.topo", "cut.topo", "fiducial.coord", "sphere.coord", "flat.coord", "borders.borderproj",
            false, Structure::Left
        );

        assert_eq!(file.number_of_selected_files(), 2);
        assert!(file.entry(tag::CUT_TOPO).unwrap().files()[0].selected);
        assert!(!file.entry(tag::PAINT).unwrap().files()[0].selected);

        file.set_multiresolution_morphing_files("cut.topo", "fiducial.coord", "flat.coord", Structure::Left);
        assert_eq!(file.number_of_selected_files(), 2);
    }

    #[test]
    fn only_scenes(){
        let mut file = SpecFile::new();
        assert!(!file.only_scene_files_selected());

        file.add_to_spec_file(tag::SCENE, "a.scene", "");
        assert!(file.only_scene_files_selected());

        file.add_to_spec_file(tag::PAINT, "a.paint", "");
        assert!(!file.only_scene_files_selected());
    }

    #[test]
    fn volume_data_is_listed_on_request(){
        let file = read(SPEC);
        assert!(!file.all_data_files(false).contains(&"anatomy.img".to_string()));
        assert!(file.all_data_files(true).contains(&"anatomy.img".to_string()));
    }

    #[test]
    fn clear_keeps_sorting(){
        let mut file = read(SPEC);
        file.set_sorting(SortMethod::Name);
        file.clear();
        assert!(file.is_empty());
        assert_eq!(file.sorting(), SortMethod::Name);
        assert_eq!(file.species(), "");
    }

    #[test]
    fn conversion_rewrites_in_the_first_writable_format(){
        use crate::node::NodeAttributeFile;
        use crate::node::metric::MetricFile;

        let directory = tempfile::tempdir().unwrap();

        let mut metric = MetricFile::default();
        metric.set_number_of_nodes_and_columns(4, 2);
        metric.write_file(directory.path().join("a.metric")).unwrap();

        let mut file = SpecFile::new();
        file.header_mut().set_file_name(directory.path().join("a.spec"));
        file.add_to_spec_file(tag::METRIC, "a.metric", "");
        file.add_to_spec_file(tag::PARAMS, "a.params", "");
        file.add_to_spec_file(tag::PAINT, "missing.paint", "");
        file.add_to_spec_file(tag::VOLUME_ANATOMY, "anatomy.hdr", "");

        let formats = [FileFormat::Xml, FileFormat::Binary];
        let conversions = file.convert_all_data_files_to_type(&formats);
        let outcome_in = |conversions: &[(String, Conversion)], name: &str| conversions.iter()
            .find(|(file, _)| file == name)
            .map(|(_, conversion)| conversion.clone());

        let outcome = |name: &str| outcome_in(&conversions, name);

        assert_eq!(conversions.len(), 3);
        assert_eq!(outcome("a.metric"), Some(Conversion::Converted(FileFormat::Xml)));
        assert_eq!(outcome("a.params"), Some(Conversion::NotSupported));
        assert!(matches!(outcome("missing.paint"), Some(Conversion::Failed(_))));

        let converted = MetricFile::from_file(directory.path().join("a.metric")).unwrap();
        assert_eq!(converted.header().read_format(), FileFormat::Xml);
        assert_eq!(converted.number_of_nodes(), 4);

        let again = file.convert_all_data_files_to_type(&formats);
        assert_eq!(outcome_in(&again, "a.metric"), Some(Conversion::AlreadyInFormat));
    }
}
