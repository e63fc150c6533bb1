
//! The deformation map: for each node of a target surface,
//! the triangle of the source surface that the node maps to,
//! together with the parameters and files of the deformation that produced it.

use std::io::Write;
use std::path::Path;
use crate::error::{Error, Result, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, Fixed, TextReader, parse, parse_bool, parse_token, split_numbered_value, tokens};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;


/// Files written by this version and older can be read.
pub const DEFAULT_VERSION: i32 = 3;

pub const MAX_SPHERICAL_STAGES: usize = 10;
pub const MAX_SPHERICAL_CYCLES: usize = 10;

pub mod tag {
    pub const FILE_VERSION: &str = "deform-map-file-version";
    pub const FLAT_OR_SPHERE: &str = "flat-or-sphere";
    pub const DEFORMED_FILE_NAME_PREFIX: &str = "deformed-file-name-prefix";
    pub const DEFORMED_COLUMN_NAME_PREFIX: &str = "deformed-column-name-prefix";
    pub const SPHERE_RESOLUTION: &str = "sphere-resolution";
    pub const BORDER_RESAMPLING: &str = "border-resampling";
    pub const SPHERICAL_NUMBER_OF_STAGES: &str = "spherical-number-of-stages";
    pub const SPHERICAL_NUMBER_OF_CYCLES: &str = "spherical-number-of-cycles";
    pub const SMOOTHING_PARAMETERS: &str = "smoothing-parameters";
    pub const MORPHING_PARAMETERS: &str = "morphing-parameters";
    pub const LANDMARK_VECTOR_PARAMETERS: &str = "landmark-vector-parameters";
    pub const LANDMARK_VECTOR_STAGE_PARAMETERS: &str = "landmark-vector-stage-parameters";
    pub const FLAT_PARAMETERS: &str = "flat-parameters";
    pub const SPHERE_FIDUCIAL_SPHERE_RATIO: &str = "sphere-fiducial-sphere-ratio";
    pub const SMOOTH_DEFORMED_SURFACE: &str = "smooth-deformed-surface-flag";
    pub const PAUSE_FOR_CROSSOVERS_CONFIRMATION: &str = "pause-for-crossovers-confirmation";
    pub const INVERSE_DEFORMATION: &str = "inverse-deformation";

    pub const SOURCE_DIRECTORY: &str = "source-directory";
    pub const SOURCE_SPEC: &str = "source-spec";
    pub const SOURCE_BORDER: &str = "source-landmark-border";
    pub const SOURCE_CLOSED_TOPO: &str = "source-closed-topo";
    pub const SOURCE_CUT_TOPO: &str = "source-cut-topo";
    pub const SOURCE_FIDUCIAL_COORD: &str = "source-fiducial-coord";
    pub const SOURCE_SPHERE_COORD: &str = "source-sphere-coord";
    pub const SOURCE_DEFORMED_SPHERE_COORD: &str = "source-deform-sphere-coord";
    pub const SOURCE_DEFORMED_FLAT_COORD: &str = "source-deform-flat-coord";
    pub const SOURCE_FLAT_COORD: &str = "source-flat-coord";
    pub const SOURCE_RESAMPLED_FLAT_COORD: &str = "source-resampled-flat-coord";
    pub const SOURCE_RESAMPLED_DEFORMED_FLAT_COORD: &str = "source-resampled-deformed-flat-coord";
    pub const SOURCE_RESAMPLED_CUT_TOPO: &str = "source-resampled-cut-topo";

    pub const TARGET_DIRECTORY: &str = "target-directory";
    pub const TARGET_SPEC: &str = "target-spec";
    pub const TARGET_BORDER: &str = "target-landmark-border";
    pub const TARGET_CLOSED_TOPO: &str = "target-closed-topo";
    pub const TARGET_CUT_TOPO: &str = "target-cut-topo";
    pub const TARGET_FIDUCIAL_COORD: &str = "target-fiducial-coord";
    pub const TARGET_SPHERE_COORD: &str = "target-sphere-coord";
    pub const TARGET_FLAT_COORD: &str = "target-flat-coord";
    pub const OUTPUT_SPEC_FILE: &str = "output-spec-file";

    pub const DATA_START: &str = "DATA-START";
}


/// The source triangle of one target node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeformMapNodeData {

    /// The nodes of the source triangle, `-1` if the node could not be mapped.
    pub tile_nodes: [i32; 3],

    /// The barycentric areas within the source triangle.
    pub tile_barycentric: [f32; 3],
}

impl DeformMapNodeData {
    pub const UNRESOLVED: DeformMapNodeData = DeformMapNodeData { tile_nodes: [-1; 3], tile_barycentric: [0.0; 3] };

    pub fn is_resolved(&self) -> bool { self.tile_nodes[0] >= 0 }
}

impl Default for DeformMapNodeData {
    fn default() -> Self { Self::UNRESOLVED }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeformationType {
    Flat,
    #[default]
    Sphere,
    SphereMultiStageVector,
    SphereSingleStageVector,
}

impl DeformationType {
    fn name(self) -> &'static str {
        match self {
            DeformationType::Flat => "DEFORM_FLAT",
            DeformationType::Sphere => "DEFORM_SPHERE",
            DeformationType::SphereMultiStageVector => "DEFORM_SPHERE_MULTI_STAGE_VECTOR",
            DeformationType::SphereSingleStageVector => "DEFORM_SPHERE_SINGLE_STAGE_VECTOR",
        }
    }

    fn from_name(name: &str) -> Result<Self> {
        [DeformationType::Flat, DeformationType::Sphere, DeformationType::SphereMultiStageVector, DeformationType::SphereSingleStageVector]
            .into_iter().find(|kind| kind.name() == name)
            .ok_or_else(|| Error::invalid(format!("deformation type {}", name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderResampling {
    None,
    FromBorderFile,
    #[default]
    Value,
}

impl BorderResampling {
    fn number(self) -> i32 {
        match self { BorderResampling::None => 0, BorderResampling::FromBorderFile => 1, BorderResampling::Value => 2 }
    }

    fn from_number(number: i32) -> Result<Self> {
        match number {
            0 => Ok(BorderResampling::None),
            1 => Ok(BorderResampling::FromBorderFile),
            2 => Ok(BorderResampling::Value),
            _ => Err(Error::invalid(format!("border resampling type {}", number))),
        }
    }
}


/// Smoothing and morphing parameters of one cycle of a spherical stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleParameters {
    pub smoothing_strength: f32,
    pub smoothing_cycles: i32,
    pub smoothing_iterations: i32,
    pub smoothing_neighbor_iterations: i32,
    pub smoothing_final_iterations: i32,

    pub morphing_cycles: i32,
    pub morphing_linear_force: f32,
    pub morphing_angular_force: f32,
    pub morphing_step_size: f32,
    pub morphing_landmark_step_size: f32,
    pub morphing_iterations: i32,
    pub morphing_smooth_iterations: i32,

    pub landmark_vector_smoothing_iterations: i32,
    pub landmark_vector_displacement_factor: f32,
}

impl CycleParameters {
    fn for_cycle(cycle: usize) -> Self {
        let mut parameters = CycleParameters {
            smoothing_strength: 1.0, smoothing_cycles: 100, smoothing_iterations: 20,
            smoothing_neighbor_iterations: 10, smoothing_final_iterations: 5,
            morphing_cycles: 1, morphing_linear_force: 0.3, morphing_angular_force: 0.6,
            morphing_step_size: 0.5, morphing_landmark_step_size: 0.5,
            morphing_iterations: 300, morphing_smooth_iterations: 5,
            landmark_vector_smoothing_iterations: 10, landmark_vector_displacement_factor: 1.0,
        };

        match cycle {
            0 => { parameters.smoothing_final_iterations = 30; parameters.morphing_smooth_iterations = 20; },
            1 => {},
            2 => { parameters.smoothing_cycles = 50; parameters.smoothing_final_iterations = 1; parameters.morphing_smooth_iterations = 2; },
            _ => { parameters.morphing_angular_force = 0.4; parameters.morphing_iterations = 80; },
        }

        parameters
    }
}

/// One stage of a spherical deformation.
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalStage {
    pub sphere_resolution: i32,
    pub cycles: Vec<CycleParameters>,
    pub landmark_vector_endpoint_factor: f32,
}

impl Default for SphericalStage {
    fn default() -> Self {
        SphericalStage {
            sphere_resolution: 4610,
            cycles: (0 .. 3).map(CycleParameters::for_cycle).collect(),
            landmark_vector_endpoint_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatParameters {
    pub sub_sampling_tiles: i32,
    pub beta: f32,
    pub variance_multiplier: f32,
    pub iterations: i32,
}

impl Default for FlatParameters {
    fn default() -> Self {
        FlatParameters { sub_sampling_tiles: 900, beta: 0.00001, variance_multiplier: 1.0, iterations: 20 }
    }
}

/// The files of the individual that is deformed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceFiles {
    pub directory: String,
    pub spec: String,
    pub border: String,
    pub closed_topo: String,
    pub cut_topo: String,
    pub fiducial_coord: String,
    pub sphere_coord: String,
    pub deformed_sphere_coord: String,
    pub deformed_flat_coord: String,
    pub flat_coord: String,
    pub resampled_flat_coord: String,
    pub resampled_deformed_flat_coord: String,
    pub resampled_cut_topo: String,
}

impl SourceFiles {
    fn named_files_mut(&mut self) -> [(&'static str, &mut String); 12] {
        [
            (tag::SOURCE_SPEC, &mut self.spec),
            (tag::SOURCE_BORDER, &mut self.border),
            (tag::SOURCE_CLOSED_TOPO, &mut self.closed_topo),
            (tag::SOURCE_CUT_TOPO, &mut self.cut_topo),
            (tag::SOURCE_FIDUCIAL_COORD, &mut self.fiducial_coord),
            (tag::SOURCE_SPHERE_COORD, &mut self.sphere_coord),
            (tag::SOURCE_DEFORMED_SPHERE_COORD, &mut self.deformed_sphere_coord),
            (tag::SOURCE_DEFORMED_FLAT_COORD, &mut self.deformed_flat_coord),
            (tag::SOURCE_FLAT_COORD, &mut self.flat_coord),
            (tag::SOURCE_RESAMPLED_FLAT_COORD, &mut self.resampled_flat_coord),
            (tag::SOURCE_RESAMPLED_DEFORMED_FLAT_COORD, &mut self.resampled_deformed_flat_coord),
            (tag::SOURCE_RESAMPLED_CUT_TOPO, &mut self.resampled_cut_topo),
        ]
    }
}

/// The files of the atlas that the source is deformed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetFiles {
    pub directory: String,
    pub spec: String,

    /// One landmark border file per spherical stage.
    pub borders: Vec<String>,

    pub closed_topo: String,
    pub cut_topo: String,
    pub fiducial_coord: String,
    pub sphere_coord: String,
    pub flat_coord: String,
    pub output_spec: String,
}

impl TargetFiles {
    fn named_files_mut(&mut self) -> [(&'static str, &mut String); 7] {
        [
            (tag::TARGET_SPEC, &mut self.spec),
            (tag::TARGET_CLOSED_TOPO, &mut self.closed_topo),
            (tag::TARGET_CUT_TOPO, &mut self.cut_topo),
            (tag::TARGET_SPHERE_COORD, &mut self.sphere_coord),
            (tag::TARGET_FIDUCIAL_COORD, &mut self.fiducial_coord),
            (tag::TARGET_FLAT_COORD, &mut self.flat_coord),
            (tag::OUTPUT_SPEC_FILE, &mut self.output_spec),
        ]
    }
}


/// Everything in a deformation map file except for the per-node data.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformationParameters {
    pub deformation_type: DeformationType,
    pub deformed_file_name_prefix: String,
    pub deformed_column_name_prefix: String,

    pub source: SourceFiles,
    pub target: TargetFiles,

    pub stages: Vec<SphericalStage>,
    pub border_resampling: BorderResampling,
    pub border_resampling_value: f32,
    pub flat: FlatParameters,

    pub smooth_deformed_surfaces: bool,
    pub fiducial_sphere_ratio_enabled: bool,
    pub fiducial_sphere_ratio: f32,
    pub pause_for_crossovers_confirmation: bool,
    pub inverse_deformation: bool,
}

impl Default for DeformationParameters {
    fn default() -> Self {
        DeformationParameters {
            deformation_type: DeformationType::Sphere,
            deformed_file_name_prefix: "deformed_".to_string(),
            deformed_column_name_prefix: "deformed ".to_string(),
            source: SourceFiles::default(),
            target: TargetFiles::default(),
            stages: vec![SphericalStage::default()],
            border_resampling: BorderResampling::Value,
            border_resampling_value: 10.0,
            flat: FlatParameters::default(),
            smooth_deformed_surfaces: true,
            fiducial_sphere_ratio_enabled: true,
            fiducial_sphere_ratio: 0.5,
            pause_for_crossovers_confirmation: false,
            inverse_deformation: false,
        }
    }
}


/// Maps each node of a target surface into a triangle of a source surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformationMapFile {
    header: FileHeader,
    file_version: i32,
    parameters: DeformationParameters,
    nodes: Vec<DeformMapNodeData>,
}

impl Default for DeformationMapFile {
    fn default() -> Self {
        DeformationMapFile {
            header: FileHeader::new("Deformation Map File", ".deform_map", "DeformationMapFile"),
            file_version: DEFAULT_VERSION,
            parameters: DeformationParameters::default(),
            nodes: Vec::new(),
        }
    }
}

impl DeformationMapFile {

    pub fn new() -> Self { Self::default() }

    /// The version of the file that was read, or the version that will be written.
    pub fn file_version(&self) -> i32 { self.file_version }

    pub fn number_of_nodes(&self) -> usize { self.nodes.len() }

    /// Resize the map. New nodes are unresolved.
    pub fn set_number_of_nodes(&mut self, count: usize) {
        self.nodes.resize(count, DeformMapNodeData::UNRESOLVED);
        self.header.set_modified();
    }

    pub fn node(&self, node: usize) -> &DeformMapNodeData { &self.nodes[node] }

    pub fn set_node(&mut self, node: usize, data: DeformMapNodeData) {
        self.nodes[node] = data;
        self.header.set_modified();
    }

    pub fn nodes(&self) -> &[DeformMapNodeData] { &self.nodes }

    pub fn parameters(&self) -> &DeformationParameters { &self.parameters }

    /// Change the parameters. Marks the file as modified.
    pub fn parameters_mut(&mut self) -> &mut DeformationParameters {
        self.header.set_modified();
        &mut self.parameters
    }

    pub fn deformed_column_name_prefix(&self) -> &str { &self.parameters.deformed_column_name_prefix }
    pub fn deformed_file_name_prefix(&self) -> &str { &self.parameters.deformed_file_name_prefix }

    /// Replace absolute file names that lie inside the directory
    /// with names relative to the directory. Other names are kept.
    pub fn make_paths_relative(&mut self, directory: impl AsRef<Path>) {
        let directory = directory.as_ref();

        for (_, name) in self.parameters.source.named_files_mut() {
            make_file_relative(directory, name);
        }

        for (_, name) in self.parameters.target.named_files_mut() {
            make_file_relative(directory, name);
        }

        for name in &mut self.parameters.target.borders {
            make_file_relative(directory, name);
        }

        self.header.set_modified();
    }

    /// Exchange the files of the source and the target.
    pub fn swap_source_and_target_files(&mut self) {
        let parameters = &mut self.parameters;
        let (source, target) = (&mut parameters.source, &mut parameters.target);

        std::mem::swap(&mut source.directory, &mut target.directory);
        std::mem::swap(&mut source.spec, &mut target.spec);
        std::mem::swap(&mut source.closed_topo, &mut target.closed_topo);
        std::mem::swap(&mut source.cut_topo, &mut target.cut_topo);
        std::mem::swap(&mut source.fiducial_coord, &mut target.fiducial_coord);
        std::mem::swap(&mut source.sphere_coord, &mut target.sphere_coord);
        std::mem::swap(&mut source.flat_coord, &mut target.flat_coord);

        if target.borders.is_empty() {
            target.borders.push(String::new());
        }

        std::mem::swap(&mut source.border, &mut target.borders[0]);
        self.header.set_modified();
    }

    fn stage_mut(&mut self, stage: usize) -> Result<&mut SphericalStage> {
        if stage >= MAX_SPHERICAL_STAGES {
            return Err(Error::invalid(format!("spherical stage {}", stage)));
        }

        let stages = &mut self.parameters.stages;
        if stages.len() <= stage {
            stages.resize(stage + 1, SphericalStage::default());
        }

        Ok(&mut stages[stage])
    }

    fn cycle_mut(&mut self, stage: usize, cycle: usize) -> Result<&mut CycleParameters> {
        if cycle >= MAX_SPHERICAL_CYCLES {
            return Err(Error::invalid(format!("spherical cycle {}", cycle)));
        }

        let cycles = &mut self.stage_mut(stage)?.cycles;
        while cycles.len() <= cycle {
            cycles.push(CycleParameters::for_cycle(cycles.len()));
        }

        Ok(&mut cycles[cycle])
    }

    fn read_tags(&mut self, text: &mut TextReader<'_>) -> UnitResult {
        loop {
            let line = text.read_tag_line()?;
            let value = line.value.as_str();
            let values = tokens(value);
            let version = self.file_version;

            match line.tag.as_str() {
                tag::DATA_START => return Ok(()),

                tag::FILE_VERSION => {
                    self.file_version = parse(value, "deformation map version")?;
                    if self.file_version > DEFAULT_VERSION {
                        return Err(Error::invalid(format!(
                            "deformation map version {} is newer than supported version {}",
                            self.file_version, DEFAULT_VERSION
                        )));
                    }
                },

                tag::FLAT_OR_SPHERE => self.parameters.deformation_type = DeformationType::from_name(value)?,
                tag::DEFORMED_FILE_NAME_PREFIX => self.parameters.deformed_file_name_prefix = value.to_string(),
                tag::DEFORMED_COLUMN_NAME_PREFIX => self.parameters.deformed_column_name_prefix = value.to_string(),
                tag::SOURCE_DIRECTORY => self.parameters.source.directory = value.to_string(),
                tag::TARGET_DIRECTORY => self.parameters.target.directory = value.to_string(),

                tag::SPHERE_RESOLUTION => {
                    let (stage, resolution) = staged_value(version, &values, value)?;
                    self.stage_mut(stage)?.sphere_resolution = parse(resolution, "sphere resolution")?;
                },

                tag::BORDER_RESAMPLING => {
                    self.parameters.border_resampling = BorderResampling::from_number(parse_token(&values, 0, "border resampling type")?)?;
                    self.parameters.border_resampling_value = parse_token(&values, 1, "border resampling value")?;
                },

                tag::SPHERICAL_NUMBER_OF_STAGES => {
                    let count: usize = parse(value, "number of spherical stages")?;
                    if count == 0 || count > MAX_SPHERICAL_STAGES {
                        return Err(Error::invalid(format!("{} spherical stages", count)));
                    }

                    self.parameters.stages.resize(count, SphericalStage::default());
                },

                tag::SPHERICAL_NUMBER_OF_CYCLES => {
                    let (stage, count) = staged_value(version, &values, value)?;
                    let count: usize = parse(count, "number of spherical cycles")?;
                    if count == 0 || count > MAX_SPHERICAL_CYCLES {
                        return Err(Error::invalid(format!("{} spherical cycles", count)));
                    }

                    let cycles = &mut self.stage_mut(stage)?.cycles;
                    cycles.truncate(count);
                    while cycles.len() < count {
                        cycles.push(CycleParameters::for_cycle(cycles.len()));
                    }
                },

                tag::SMOOTHING_PARAMETERS => {
                    let (stage, cycle, rest) = stage_and_cycle(version, &values)?;
                    let cycle = self.cycle_mut(stage, cycle)?;
                    parse_into(rest, 0, "smoothing strength", &mut cycle.smoothing_strength)?;
                    parse_into(rest, 1, "smoothing cycles", &mut cycle.smoothing_cycles)?;
                    parse_into(rest, 2, "smoothing iterations", &mut cycle.smoothing_iterations)?;
                    parse_into(rest, 3, "smoothing neighbor iterations", &mut cycle.smoothing_neighbor_iterations)?;
                    parse_into(rest, 4, "smoothing final iterations", &mut cycle.smoothing_final_iterations)?;
                },

                tag::MORPHING_PARAMETERS => {
                    let (stage, cycle, rest) = stage_and_cycle(version, &values)?;
                    let cycle = self.cycle_mut(stage, cycle)?;

                    // unversioned files may stop after the step size
                    if version == 0 {
                        cycle.morphing_cycles = 1;
                        cycle.morphing_smooth_iterations = 0;
                    }

                    parse_into(rest, 0, "morphing cycles", &mut cycle.morphing_cycles)?;
                    parse_into(rest, 1, "morphing linear force", &mut cycle.morphing_linear_force)?;
                    parse_into(rest, 2, "morphing angular force", &mut cycle.morphing_angular_force)?;
                    parse_into(rest, 3, "morphing step size", &mut cycle.morphing_step_size)?;

                    if version == 0 {
                        cycle.morphing_landmark_step_size = cycle.morphing_step_size;
                    }

                    parse_into(rest, 4, "morphing landmark step size", &mut cycle.morphing_landmark_step_size)?;
                    parse_into(rest, 5, "morphing iterations", &mut cycle.morphing_iterations)?;
                    parse_into(rest, 6, "morphing smooth iterations", &mut cycle.morphing_smooth_iterations)?;
                },

                tag::LANDMARK_VECTOR_PARAMETERS => {
                    let (stage, cycle, rest) = stage_and_cycle(version.max(1), &values)?;

                    // a lone number in older files is the smoothing iterations of every cycle
                    if version < 3 && rest.is_empty() {
                        let iterations = i32::try_from(cycle)
                            .map_err(|_| Error::invalid("landmark vector smoothing iterations"))?;

                        for cycle in &mut self.stage_mut(0)?.cycles {
                            cycle.landmark_vector_smoothing_iterations = iterations;
                        }
                    }
                    else {
                        let cycle = self.cycle_mut(stage, cycle)?;
                        cycle.landmark_vector_smoothing_iterations = parse_token(rest, 0, "landmark vector smoothing iterations")?;
                        cycle.landmark_vector_displacement_factor = parse_token(rest, 1, "landmark vector displacement factor")?;
                    }
                },

                tag::LANDMARK_VECTOR_STAGE_PARAMETERS => {
                    let (stage, factor) = indexed_value(&values)?;
                    self.stage_mut(stage)?.landmark_vector_endpoint_factor = parse(factor, "landmark vector endpoint factor")?;
                },

                tag::FLAT_PARAMETERS => {
                    let flat = &mut self.parameters.flat;
                    flat.sub_sampling_tiles = parse_token(&values, 0, "flat sub sampling tiles")?;
                    flat.beta = parse_token(&values, 1, "flat beta")?;
                    flat.variance_multiplier = parse_token(&values, 2, "flat variance multiplier")?;
                    flat.iterations = parse_token(&values, 3, "flat iterations")?;
                },

                tag::SPHERE_FIDUCIAL_SPHERE_RATIO => {
                    self.parameters.fiducial_sphere_ratio_enabled = values.first().map_or(false, |token| parse_bool(token));
                    self.parameters.fiducial_sphere_ratio = parse_token(&values, 1, "fiducial sphere ratio")?;
                },

                tag::SMOOTH_DEFORMED_SURFACE => self.parameters.smooth_deformed_surfaces = parse_bool(value),
                tag::PAUSE_FOR_CROSSOVERS_CONFIRMATION => self.parameters.pause_for_crossovers_confirmation = parse_bool(value),
                tag::INVERSE_DEFORMATION => self.parameters.inverse_deformation = parse_bool(value),

                tag::TARGET_BORDER => {
                    let (stage, name) = if version >= 3 { split_numbered_value(value)? } else { (0, value) };

                    let borders = &mut self.parameters.target.borders;
                    if stage >= MAX_SPHERICAL_STAGES {
                        return Err(Error::invalid(format!("target border of stage {}", stage)));
                    }

                    if borders.len() <= stage {
                        borders.resize(stage + 1, String::new());
                    }

                    borders[stage] = name.to_string();
                },

                other => {
                    let file = self.parameters.source.named_files_mut().into_iter()
                        .chain(self.parameters.target.named_files_mut())
                        .find(|(name, _)| *name == other);

                    match file {
                        Some((_, file)) => *file = value.to_string(),
                        None => log::warn!("ignoring unknown deformation map tag {}", other),
                    }
                },
            }
        }
    }

    fn write_tags(&self, write: &mut Vec<u8>) -> UnitResult {
        let parameters = &self.parameters;

        writeln!(write, "{} {}", tag::FILE_VERSION, DEFAULT_VERSION)?;
        writeln!(write, "{} {}", tag::FLAT_OR_SPHERE, parameters.deformation_type.name())?;
        writeln!(write, "{} {}", tag::DEFORMED_FILE_NAME_PREFIX, parameters.deformed_file_name_prefix)?;
        writeln!(write, "{} {}", tag::DEFORMED_COLUMN_NAME_PREFIX, parameters.deformed_column_name_prefix)?;

        // names are written relative to their directory
        let mut source = parameters.source.clone();
        let source_directory = source.directory.clone();
        writeln!(write, "{} {}", tag::SOURCE_DIRECTORY, source_directory)?;

        for (file_tag, name) in source.named_files_mut() {
            if !source_directory.is_empty() { make_file_relative(Path::new(&source_directory), name); }
            writeln!(write, "{} {}", file_tag, name)?;
        }

        for (index, stage) in parameters.stages.iter().enumerate() {
            writeln!(write, "{} {} {}", tag::SPHERE_RESOLUTION, index, stage.sphere_resolution)?;
        }

        writeln!(write, "{} {} {}", tag::BORDER_RESAMPLING, parameters.border_resampling.number(), Fixed(parameters.border_resampling_value))?;
        writeln!(write, "{} {}", tag::SPHERICAL_NUMBER_OF_STAGES, parameters.stages.len())?;

        for (index, stage) in parameters.stages.iter().enumerate() {
            writeln!(write, "{} {} {}", tag::SPHERICAL_NUMBER_OF_CYCLES, index, stage.cycles.len())?;
        }

        for (stage_index, stage) in parameters.stages.iter().enumerate() {
            for (cycle_index, cycle) in stage.cycles.iter().enumerate() {
                writeln!(
                    write, "{} {} {} {} {} {} {} {}", tag::SMOOTHING_PARAMETERS, stage_index, cycle_index,
                    Fixed(cycle.smoothing_strength), cycle.smoothing_cycles, cycle.smoothing_iterations,
                    cycle.smoothing_neighbor_iterations, cycle.smoothing_final_iterations
                )?;

                writeln!(
                    write, "{} {} {} {} {} {} {} {} {} {}", tag::MORPHING_PARAMETERS, stage_index, cycle_index,
                    cycle.morphing_cycles, Fixed(cycle.morphing_linear_force), Fixed(cycle.morphing_angular_force),
                    Fixed(cycle.morphing_step_size), Fixed(cycle.morphing_landmark_step_size),
                    cycle.morphing_iterations, cycle.morphing_smooth_iterations
                )?;

                writeln!(
                    write, "{} {} {} {} {}", tag::LANDMARK_VECTOR_PARAMETERS, stage_index, cycle_index,
                    cycle.landmark_vector_smoothing_iterations, Fixed(cycle.landmark_vector_displacement_factor)
                )?;
            }

            writeln!(write, "{} {} {}", tag::LANDMARK_VECTOR_STAGE_PARAMETERS, stage_index, Fixed(stage.landmark_vector_endpoint_factor))?;
        }

        let flat = &parameters.flat;
        writeln!(
            write, "{} {} {} {} {}", tag::FLAT_PARAMETERS,
            flat.sub_sampling_tiles, flat.beta, Fixed(flat.variance_multiplier), flat.iterations
        )?;

        let mut target = parameters.target.clone();
        let target_directory = target.directory.clone();
        writeln!(write, "{} {}", tag::TARGET_DIRECTORY, target_directory)?;
        writeln!(write, "{} {}", tag::SMOOTH_DEFORMED_SURFACE, parameters.smooth_deformed_surfaces)?;

        for (index, border) in target.borders.iter_mut().enumerate() {
            if !target_directory.is_empty() { make_file_relative(Path::new(&target_directory), border); }
            writeln!(write, "{} {} {}", tag::TARGET_BORDER, index, border)?;
        }

        for (file_tag, name) in target.named_files_mut() {
            if !target_directory.is_empty() { make_file_relative(Path::new(&target_directory), name); }
            writeln!(write, "{} {}", file_tag, name)?;
        }

        writeln!(
            write, "{} {} {}", tag::SPHERE_FIDUCIAL_SPHERE_RATIO,
            parameters.fiducial_sphere_ratio_enabled, Fixed(parameters.fiducial_sphere_ratio)
        )?;

        writeln!(write, "{} {}", tag::PAUSE_FOR_CROSSOVERS_CONFIRMATION, parameters.pause_for_crossovers_confirmation)?;
        writeln!(write, "{} {}", tag::INVERSE_DEFORMATION, parameters.inverse_deformation)?;
        writeln!(write, "{}", tag::DATA_START)?;
        Ok(())
    }
}

/// Parse `index value` tokens.
fn indexed_value<'t>(values: &[&'t str]) -> Result<(usize, &'t str)> {
    let index = parse_token(values, 0, "index")?;
    let value = values.get(1).copied().ok_or_else(|| Error::invalid("missing indexed value"))?;
    Ok((index, value))
}

/// Version 3 prefixes per-stage values with the stage index, older files have a single stage.
fn staged_value<'t>(version: i32, values: &[&'t str], value: &'t str) -> Result<(usize, &'t str)> {
    if version >= 3 { indexed_value(values) } else { Ok((0, value)) }
}

/// Split `stage cycle parameters...`.
/// Version 1 and 2 omit the stage, unversioned files omit both indices.
fn stage_and_cycle<'a, 't>(version: i32, values: &'a [&'t str]) -> Result<(usize, usize, &'a [&'t str])> {
    match version {
        0 => Ok((0, 0, values)),
        1 | 2 => Ok((0, parse_token(values, 0, "cycle")?, values.get(1..).unwrap_or(&[]))),
        _ => Ok((parse_token(values, 0, "stage")?, parse_token(values, 1, "cycle")?, values.get(2..).unwrap_or(&[]))),
    }
}

/// Parse the token if the line has it, keeping the previous value otherwise.
fn parse_into<T: std::str::FromStr>(values: &[&str], index: usize, what: &'static str, target: &mut T) -> UnitResult {
    if let Some(token) = values.get(index) {
        *target = parse(token, what)?;
    }

    Ok(())
}

/// If the name is an absolute path inside the directory, make it relative to the directory.
pub fn make_file_relative(directory: &Path, name: &mut String) {
    let path = Path::new(name.as_str());
    if !path.is_absolute() {
        return;
    }

    if let Ok(relative) = path.strip_prefix(directory) {
        *name = relative.to_string_lossy().into_owned();
    }
}


impl DataFile for DeformationMapFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.file_version = DEFAULT_VERSION;
        self.parameters = DeformationParameters::default();
        self.nodes.clear();
    }

    fn is_empty(&self) -> bool { self.nodes.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        self.read_tags(text)?;

        match format {
            FileFormat::Ascii => {
                let count = parse(&text.read_non_empty_line()?, "number of nodes")?;
                text.check_count(count, 2, "number of nodes")?;
                self.nodes = vec![DeformMapNodeData::UNRESOLVED; count];

                for _ in 0 .. count {
                    let line = text.read_non_empty_line()?;
                    let tokens = tokens(&line);

                    let node: usize = parse_token(&tokens, 0, "node number")?;
                    let data = self.nodes.get_mut(node)
                        .ok_or(Error::VertexOutOfRange { vertex: node as i64, count })?;

                    for corner in 0 .. 3 {
                        data.tile_nodes[corner] = parse_token(&tokens, 1 + corner, "tile node")?;
                        data.tile_barycentric[corner] = parse_token(&tokens, 4 + corner, "tile area")?;
                    }
                }
            },

            FileFormat::Binary => {
                let mut bytes = text.remaining();
                let start = bytes.len();

                let count = i32_to_usize(i32::read(&mut bytes)?, "number of nodes")?;
                let mut nodes = Vec::with_capacity(count.min(bytes.len() / 24));

                for _ in 0 .. count {
                    let mut data = DeformMapNodeData::UNRESOLVED;
                    i32::read_slice(&mut bytes, &mut data.tile_nodes)?;
                    f32::read_slice(&mut bytes, &mut data.tile_barycentric)?;
                    nodes.push(data);
                }

                self.nodes = nodes;
                text.advance(start - bytes.len());
            },

            other => return Err(Error::unsupported(format!("deformation map in {} format", other))),
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        self.write_tags(write)?;

        match format {
            FileFormat::Ascii => {
                writeln!(write, "{}", self.nodes.len())?;

                for (index, data) in self.nodes.iter().enumerate() {
                    let [n0, n1, n2] = data.tile_nodes;
                    let [a0, a1, a2] = data.tile_barycentric;
                    writeln!(write, "{} {} {} {} {} {} {}", index, n0, n1, n2, Fixed(a0), Fixed(a1), Fixed(a2))?;
                }
            },

            FileFormat::Binary => {
                usize_to_i32(self.nodes.len()).write(write)?;

                for data in &self.nodes {
                    i32::write_slice(write, &data.tile_nodes)?;
                    f32::write_slice(write, &data.tile_barycentric)?;
                }
            },

            other => return Err(Error::unsupported(format!("deformation map in {} format", other))),
        }

        Ok(())
    }
}

impl CompareForTesting for DeformationMapFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_nodes() != other.number_of_nodes() {
            return Err("ERROR number of nodes do not match for file comparison.".to_string());
        }

        for (mine, theirs) in self.nodes.iter().zip(&other.nodes) {
            if mine.tile_nodes != theirs.tile_nodes {
                return Err("ERROR: There are tiles that do not match between the files.".to_string());
            }

            let areas_match = mine.tile_barycentric.iter().zip(&theirs.tile_barycentric)
                .all(|(a, b)| (a - b).abs() <= tolerance);

            if !areas_match {
                return Err("ERROR: tile areas are not within tolerance.".to_string());
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

    fn map() -> DeformationMapFile {
        let mut map = DeformationMapFile::new();
        map.set_number_of_nodes(3);
        map.set_node(0, DeformMapNodeData { tile_nodes: [4, 5, 6], tile_barycentric: [0.2, 0.3, 0.5] });
        map.set_node(2, DeformMapNodeData { tile_nodes: [1, 2, 3], tile_barycentric: [1.0, 0.0, 0.0] });

        let parameters = map.parameters_mut();
        parameters.source.directory = "/data/source".into();
        parameters.source.spec = "/data/source/human.spec".into();
        parameters.target.borders = vec!["atlas.border".into()];
        parameters.stages[0].cycles[1].morphing_iterations = 77;
        map
    }

    fn round_trip(map: &mut DeformationMapFile, format: FileFormat) -> DeformationMapFile {
        map.header_mut().set_write_format(format);
        let bytes = write_file_to_bytes(map, WriteOptions::default()).unwrap();

        let mut read = DeformationMapFile::new();
        read_file_from_bytes(&mut read, Path::new("x.deform_map"), &bytes, ReadOptions::default()).unwrap();
        read
    }

    #[test]
    fn ascii_and_binary_round_trip(){
        for format in [FileFormat::Ascii, FileFormat::Binary] {
            let mut original = map();
            let read = round_trip(&mut original, format);

            assert_eq!(read.compare_file_for_unit_testing(&original, 0.0001), Ok(()));
            assert!(!read.node(1).is_resolved());
            assert_eq!(read.parameters().stages[0].cycles[1].morphing_iterations, 77);
            assert_eq!(read.parameters().target.borders, vec!["atlas.border".to_string()]);

            // written relative to the source directory
            assert_eq!(read.parameters().source.spec, "human.spec");
        }
    }

    #[test]
    fn newer_version_is_invalid(){
        let bytes = b"BeginHeader\nEndHeader\ndeform-map-file-version 4\nDATA-START\n0\n";
        let result = read_file_from_bytes(&mut DeformationMapFile::new(), Path::new("x"), bytes, ReadOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn version_two_has_no_stage_index(){
        let bytes = b"BeginHeader\nEndHeader\n\
            deform-map-file-version 2\n\
            flat-or-sphere DEFORM_SPHERE\n\
            sphere-resolution 4610\n\
            spherical-number-of-cycles 3\n\
            smoothing-parameters 1 0.5 50 10 5 2\n\
            morphing-parameters 2 1 0.2 0.4 0.3 0.3 200 4\n\
            landmark-vector-parameters 12\n\
            target-landmark-border atlas.border\n\
            DATA-START\n\
            1\n\
            0 1 2 3 0.25 0.25 0.5\n";

        let mut map = DeformationMapFile::new();
        read_file_from_bytes(&mut map, Path::new("old.deform_map"), bytes, ReadOptions::default()).unwrap();

        assert_eq!(map.file_version(), 2);
        assert_eq!(map.number_of_nodes(), 1);
        assert_eq!(map.node(0).tile_nodes, [1, 2, 3]);

        let stage = &map.parameters().stages[0];
        assert_eq!(stage.sphere_resolution, 4610);
        assert_eq!(stage.cycles.len(), 3);
        assert_eq!(stage.cycles[1].smoothing_cycles, 50);
        assert_eq!(stage.cycles[2].morphing_iterations, 200);
        assert!(stage.cycles.iter().all(|cycle| cycle.landmark_vector_smoothing_iterations == 12));
        assert_eq!(map.parameters().target.borders, vec!["atlas.border".to_string()]);
    }

    #[test]
    fn unversioned_morphing_may_stop_early(){
        let bytes = b"BeginHeader\nEndHeader\n\
            deform-map-file-version 0\n\
            smoothing-parameters 0.5 50 10 5 2\n\
            morphing-parameters 4 0.2 0.4 0.7\n\
            DATA-START\n\
            0\n";

        let mut map = DeformationMapFile::new();
        read_file_from_bytes(&mut map, Path::new("old.deform_map"), bytes, ReadOptions::default()).unwrap();

        let cycle = &map.parameters().stages[0].cycles[0];
        assert_eq!(cycle.smoothing_iterations, 10);
        assert_eq!(cycle.morphing_cycles, 4);
        assert_eq!(cycle.morphing_landmark_step_size, 0.7);
        assert_eq!(cycle.morphing_smooth_iterations, 0);
    }

    #[test]
    fn relative_paths_and_swap(){
        let mut map = map();
        map.parameters_mut().target.fiducial_coord = "/elsewhere/atlas.coord".into();
        map.make_paths_relative("/data/source");
        assert_eq!(map.parameters().source.spec, "human.spec");
        assert_eq!(map.parameters().target.fiducial_coord, "/elsewhere/atlas.coord");

        map.swap_source_and_target_files();
        assert_eq!(map.parameters().target.spec, "human.spec");
        assert_eq!(map.parameters().source.fiducial_coord, "/elsewhere/atlas.coord");
        assert_eq!(map.parameters().target.directory, "/data/source");
    }

    #[test]
    fn compare_detects_differences(){
        let original = map();
        let mut changed = map();
        changed.set_node(0, DeformMapNodeData { tile_nodes: [4, 5, 6], tile_barycentric: [0.2, 0.3, 0.6] });
        assert!(original.compare_file_for_unit_testing(&changed, 0.01).is_err());
        assert!(original.compare_file_for_unit_testing(&changed, 0.2).is_ok());
    }
}
