
//! Parameters of multi-resolution morphing, stored as xml.

use std::io::Write;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{TextReader, parse};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use crate::xml::{FILE_HEADER, XmlEvent, XmlEvents, XmlWriter, read_file_header, write_file_header};


pub const MAXIMUM_NUMBER_OF_CYCLES: usize = 10;
pub const MAXIMUM_NUMBER_OF_LEVELS: usize = 7;

mod element {
    pub const NUMBER_OF_CYCLES: &str = "numberOfCycles";
    pub const NUMBER_OF_LEVELS: &str = "numberOfLevels";
    pub const DELETE_TEMPORARY_FILES: &str = "deleteTemporaryFilesFlag";
    pub const SMOOTH_OUT_CROSSOVERS: &str = "smoothOutCrossoversFlag";
    pub const SMOOTH_OUT_FLAT_OVERLAP: &str = "smoothOutFlatSurfaceOverlapFlag";
    pub const POINT_SPHERICAL_TRIANGLES_OUTWARD: &str = "pointSphericalTrianglesOutwardFlag";
    pub const ALIGN_TO_CENTRAL_SULCUS: &str = "alignToCentralSulcusLandmarkFlag";
    pub const CENTRAL_SULCUS_LANDMARK: &str = "centralSulcusLandmarkName";

    pub const CYCLE: &str = "cycle";
    pub const ITERATIONS: &str = "iterations";
    pub const LINEAR_FORCE: &str = "linearForce";
    pub const ANGULAR_FORCE: &str = "angularForce";
    pub const STEP_SIZE: &str = "stepSize";
    pub const SMOOTHING_STRENGTH: &str = "smoothingStrength";
    pub const SMOOTHING_ITERATIONS: &str = "smoothingIterations";
    pub const SMOOTHING_ITERATIONS_EDGES: &str = "smoothingIterationsEdges";
}


/// The parameters of one morphing cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphingCycle {

    /// Iterations per resolution level, finest level first.
    pub iterations: [i32; MAXIMUM_NUMBER_OF_LEVELS],

    pub linear_force: f32,
    pub angular_force: f32,
    pub step_size: f32,
    pub smoothing_strength: f32,
    pub smoothing_iterations: i32,
    pub smoothing_iterations_edges: i32,
}

impl Default for MorphingCycle {
    fn default() -> Self {
        MorphingCycle {
            iterations: [0; MAXIMUM_NUMBER_OF_LEVELS],
            linear_force: 0.5,
            angular_force: 0.3,
            step_size: 0.5,
            smoothing_strength: 1.0,
            smoothing_iterations: 10,
            smoothing_iterations_edges: 10,
        }
    }
}

impl MorphingCycle {
    fn with_iterations(iterations: [i32; MAXIMUM_NUMBER_OF_LEVELS]) -> Self {
        MorphingCycle { iterations, ..MorphingCycle::default() }
    }

    fn read_xml(&mut self, events: &mut XmlEvents<'_>) -> UnitResult {
        let depth = events.open_elements().len();

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("morphing cycle element is not closed")),
                Some(XmlEvent::End(_)) if events.open_elements().len() < depth => return Ok(()),

                Some(XmlEvent::Start { name, .. }) => {
                    let text = events.read_element_text()?;
                    let text = text.trim();

                    match name.as_str() {
                        element::ITERATIONS => {
                            for (level, value) in text.split_whitespace().take(MAXIMUM_NUMBER_OF_LEVELS).enumerate() {
                                self.iterations[level] = parse(value, "morphing iterations")?;
                            }
                        },

                        element::LINEAR_FORCE => self.linear_force = parse(text, "linear force")?,
                        element::ANGULAR_FORCE => self.angular_force = parse(text, "angular force")?,
                        element::STEP_SIZE => self.step_size = parse(text, "step size")?,
                        element::SMOOTHING_STRENGTH => self.smoothing_strength = parse(text, "smoothing strength")?,
                        element::SMOOTHING_ITERATIONS => self.smoothing_iterations = parse(text, "smoothing iterations")?,
                        element::SMOOTHING_ITERATIONS_EDGES => self.smoothing_iterations_edges = parse(text, "smoothing iterations")?,
                        other => log::warn!("unrecognized morphing cycle element {}", other),
                    }
                },

                Some(_) => {},
            }
        }
    }

    fn write_xml(&self, writer: &mut XmlWriter) {
        let iterations = self.iterations.iter().map(i32::to_string).collect::<Vec<_>>().join(" ");

        writer.start(element::CYCLE, &[]);
        writer.text_element(element::ITERATIONS, &iterations);
        writer.text_element(element::ANGULAR_FORCE, &self.angular_force.to_string());
        writer.text_element(element::LINEAR_FORCE, &self.linear_force.to_string());
        writer.text_element(element::STEP_SIZE, &self.step_size.to_string());
        writer.text_element(element::SMOOTHING_STRENGTH, &self.smoothing_strength.to_string());
        writer.text_element(element::SMOOTHING_ITERATIONS, &self.smoothing_iterations.to_string());
        writer.text_element(element::SMOOTHING_ITERATIONS_EDGES, &self.smoothing_iterations_edges.to_string());
        writer.end();
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct MultiResMorphFile {
    header: FileHeader,
    cycles: [MorphingCycle; MAXIMUM_NUMBER_OF_CYCLES],
    number_of_cycles: usize,
    number_of_levels: usize,

    pub delete_temporary_files: bool,
    pub smooth_out_crossovers: bool,
    pub smooth_out_flat_surface_overlap: bool,
    pub point_spherical_triangles_outward: bool,
    pub align_to_central_sulcus_landmark: bool,
    pub central_sulcus_landmark_name: String,
}

impl Default for MultiResMorphFile {
    fn default() -> Self {
        let mut file = MultiResMorphFile {
            header: FileHeader::new("Multi-Resolution Morphing Parameters File", ".multi_res_morph", "MultiResMorphFile"),
            cycles: [MorphingCycle::default(); MAXIMUM_NUMBER_OF_CYCLES],
            number_of_cycles: 0,
            number_of_levels: 0,
            delete_temporary_files: true,
            smooth_out_crossovers: true,
            smooth_out_flat_surface_overlap: true,
            point_spherical_triangles_outward: false,
            align_to_central_sulcus_landmark: true,
            central_sulcus_landmark_name: String::new(),
        };

        file.header.set_read_format(FileFormat::Xml);
        file.header.set_write_format(FileFormat::Xml);
        file.initialize_parameters_spherical();
        file.header.clear_modified();
        file
    }
}

impl MultiResMorphFile {
    pub fn new() -> Self { Self::default() }

    fn reset_flags(&mut self) {
        self.delete_temporary_files = true;
        self.smooth_out_crossovers = true;
        self.smooth_out_flat_surface_overlap = true;
        self.point_spherical_triangles_outward = false;
        self.align_to_central_sulcus_landmark = true;
        self.central_sulcus_landmark_name = "LANDMARK.CentralSulcus".to_string();
    }

    /// The default parameters for morphing a sphere.
    pub fn initialize_parameters_spherical(&mut self) {
        self.reset_flags();
        self.set_number_of_cycles(4);
        self.set_number_of_levels(6);

        self.cycles = [MorphingCycle::with_iterations([0, 25, 10, 10, 5, 2, 1]); MAXIMUM_NUMBER_OF_CYCLES];
        self.cycles[0].iterations = [2, 3, 5, 20, 20, 15, 0];
        self.cycles[1].iterations = [2, 3, 15, 20, 15, 0, 0];
        self.cycles[2].iterations = [2, 5, 10, 10, 10, 0, 0];
        self.cycles[3].iterations = [2, 5, 10, 20, 5, 0, 0];
        self.header.set_modified();
    }

    /// The default parameters for morphing a flat surface.
    pub fn initialize_parameters_flat(&mut self) {
        self.reset_flags();
        self.set_number_of_cycles(5);
        self.set_number_of_levels(7);

        let flat = MorphingCycle {
            angular_force: 0.5,
            smoothing_iterations: 50,
            ..MorphingCycle::with_iterations([0, 10, 20, 40, 60, 80, 100])
        };

        self.cycles = [flat; MAXIMUM_NUMBER_OF_CYCLES];
        self.cycles[0].iterations = [0, 10, 20, 40, 60, 70, 60];
        self.cycles[1].iterations = [0, 10, 20, 40, 60, 60, 50];
        self.cycles[2].iterations = [0, 10, 20, 40, 60, 60, 50];
        self.cycles[3].iterations = [0, 20, 20, 40, 60, 50, 30];
        self.cycles[4].iterations = [0, 20, 20, 40, 60, 50, 30];
        self.cycles[4].linear_force = 0.4;
        self.header.set_modified();
    }

    pub fn number_of_cycles(&self) -> usize { self.number_of_cycles }
    pub fn number_of_levels(&self) -> usize { self.number_of_levels }

    /// Set the number of cycles, at most `MAXIMUM_NUMBER_OF_CYCLES`.
    pub fn set_number_of_cycles(&mut self, count: usize) {
        self.number_of_cycles = count.min(MAXIMUM_NUMBER_OF_CYCLES);
        self.header.set_modified();
    }

    /// Set the number of levels, at most `MAXIMUM_NUMBER_OF_LEVELS`.
    pub fn set_number_of_levels(&mut self, count: usize) {
        self.number_of_levels = count.min(MAXIMUM_NUMBER_OF_LEVELS);
        self.header.set_modified();
    }

    pub fn cycle(&self, index: usize) -> &MorphingCycle { &self.cycles[index] }

    pub fn cycle_mut(&mut self, index: usize) -> &mut MorphingCycle {
        self.header.set_modified();
        &mut self.cycles[index]
    }

    fn read_count(events: &mut XmlEvents<'_>, what: &'static str) -> Result<usize> {
        parse(events.read_element_text()?.trim(), what)
    }

    fn read_flag(events: &mut XmlEvents<'_>) -> Result<bool> {
        Ok(parse::<i32>(events.read_element_text()?.trim(), "flag")? != 0)
    }
}

impl DataFile for MultiResMorphFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Xml);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
    }

    /// The parameters always have values.
    fn is_empty(&self) -> bool { false }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Xml {
            return Err(Error::unsupported(format!("morphing parameters in {} format", format)));
        }

        let mut events = XmlEvents::new(text.all_bytes());
        events.read_root(self.header.root_element())?;
        let mut cycle_index = 0;

        while let Some(event) = events.next_event()? {
            let XmlEvent::Start { name, .. } = event else { continue };

            match name.as_str() {
                FILE_HEADER => read_file_header(&mut events, &mut self.header)?,
                element::NUMBER_OF_CYCLES => self.number_of_cycles = Self::read_count(&mut events, "number of cycles")?.min(MAXIMUM_NUMBER_OF_CYCLES),
                element::NUMBER_OF_LEVELS => self.number_of_levels = Self::read_count(&mut events, "number of levels")?.min(MAXIMUM_NUMBER_OF_LEVELS),
                element::DELETE_TEMPORARY_FILES => self.delete_temporary_files = Self::read_flag(&mut events)?,
                element::SMOOTH_OUT_CROSSOVERS => self.smooth_out_crossovers = Self::read_flag(&mut events)?,
                element::SMOOTH_OUT_FLAT_OVERLAP => self.smooth_out_flat_surface_overlap = Self::read_flag(&mut events)?,
                element::POINT_SPHERICAL_TRIANGLES_OUTWARD => self.point_spherical_triangles_outward = Self::read_flag(&mut events)?,
                element::ALIGN_TO_CENTRAL_SULCUS => self.align_to_central_sulcus_landmark = Self::read_flag(&mut events)?,
                element::CENTRAL_SULCUS_LANDMARK => self.central_sulcus_landmark_name = events.read_element_text()?.trim().to_string(),

                element::CYCLE => {
                    let cycle = self.cycles.get_mut(cycle_index)
                        .ok_or_else(|| Error::invalid("too many morphing cycles"))?;

                    cycle.read_xml(&mut events)?;
                    cycle_index += 1;
                },

                other => {
                    log::warn!("unrecognized morphing parameter element {}", other);
                    events.skip_element()?;
                },
            }
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format != FileFormat::Xml {
            return Err(Error::unsupported(format!("morphing parameters in {} format", format)));
        }

        let flag = |value: bool| if value { "1" } else { "0" };

        let mut writer = XmlWriter::new();
        writer.start(self.header.root_element(), &[]);
        write_file_header(&mut writer, &self.header);

        writer.text_element(element::NUMBER_OF_CYCLES, &self.number_of_cycles.to_string());
        writer.text_element(element::NUMBER_OF_LEVELS, &self.number_of_levels.to_string());
        writer.text_element(element::DELETE_TEMPORARY_FILES, flag(self.delete_temporary_files));
        writer.text_element(element::SMOOTH_OUT_CROSSOVERS, flag(self.smooth_out_crossovers));
        writer.text_element(element::SMOOTH_OUT_FLAT_OVERLAP, flag(self.smooth_out_flat_surface_overlap));
        writer.text_element(element::POINT_SPHERICAL_TRIANGLES_OUTWARD, flag(self.point_spherical_triangles_outward));
        writer.text_element(element::ALIGN_TO_CENTRAL_SULCUS, flag(self.align_to_central_sulcus_landmark));
        writer.text_element(element::CENTRAL_SULCUS_LANDMARK, &self.central_sulcus_landmark_name);

        for cycle in &self.cycles[.. self.number_of_cycles] {
            cycle.write_xml(&mut writer);
        }

        write.write_all(writer.finish().as_bytes())?;
        Ok(())
    }
}

impl CompareForTesting for MultiResMorphFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_cycles != other.number_of_cycles || self.number_of_levels != other.number_of_levels {
            return Err("Files have a different number of cycles or levels.".to_string());
        }

        let close = |a: f32, b: f32| (a - b).abs() <= tolerance;

        for (index, (mine, theirs)) in self.cycles.iter().zip(&other.cycles).take(self.number_of_cycles).enumerate() {
            let matches = mine.iterations == theirs.iterations
                && close(mine.linear_force, theirs.linear_force)
                && close(mine.angular_force, theirs.angular_force)
                && close(mine.step_size, theirs.step_size)
                && close(mine.smoothing_strength, theirs.smoothing_strength)
                && mine.smoothing_iterations == theirs.smoothing_iterations
                && mine.smoothing_iterations_edges == theirs.smoothing_iterations_edges;

            if !matches { return Err(format!("Cycle {} does not match.", index)); }
        }

        if self.central_sulcus_landmark_name != other.central_sulcus_landmark_name {
            return Err("Landmark names do not match.".to_string());
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
    fn spherical_defaults(){
        let file = MultiResMorphFile::new();
        assert_eq!(file.number_of_cycles(), 4);
        assert_eq!(file.number_of_levels(), 6);
        assert_eq!(file.cycle(3).iterations, [2, 5, 10, 20, 5, 0, 0]);
        assert_eq!(file.central_sulcus_landmark_name, "LANDMARK.CentralSulcus");
    }

    #[test]
    fn xml_round_trip(){
        let mut file = MultiResMorphFile::new();
        file.initialize_parameters_flat();
        file.smooth_out_crossovers = false;
        file.cycle_mut(2).step_size = 0.25;

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let mut read = MultiResMorphFile::new();
        read_file_from_bytes(&mut read, Path::new("a.multi_res_morph"), &bytes, ReadOptions::default()).unwrap();

        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
        assert_eq!(read.number_of_cycles(), 5);
        assert!(!read.smooth_out_crossovers);
        assert_eq!(read.cycle(4).linear_force, 0.4);
    }

    #[test]
    fn counts_are_limited(){
        let mut file = MultiResMorphFile::new();
        file.set_number_of_cycles(50);
        file.set_number_of_levels(50);
        assert_eq!(file.number_of_cycles(), MAXIMUM_NUMBER_OF_CYCLES);
        assert_eq!(file.number_of_levels(), MAXIMUM_NUMBER_OF_LEVELS);
    }
}
