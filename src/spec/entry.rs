
//! The catalogue of file kinds a spec file can list,
//! and the list of files of one kind.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use crate::meta::Structure;
use crate::spec::scene::SceneClass;


/// The tags that introduce a file in a spec file.
pub mod tag {
    pub const VOLUME_FUNCTIONAL: &str = "volume_functional_file";
    pub const VOLUME_PAINT: &str = "volume_paint_file";
    pub const VOLUME_PROB_ATLAS: &str = "volume_prob_atlas_file";
    pub const VOLUME_RGB: &str = "volume_rgb_file";
    pub const VOLUME_SEGMENTATION: &str = "volume_segmentation_file";
    pub const VOLUME_ANATOMY: &str = "volume_anatomy_file";
    pub const VOLUME_VECTOR: &str = "volume_vector_file";

    pub const CLOSED_TOPO: &str = "CLOSEDtopo_file";
    pub const OPEN_TOPO: &str = "OPENtopo_file";
    pub const CUT_TOPO: &str = "CUTtopo_file";
    pub const LOBAR_CUT_TOPO: &str = "LOBAR_CUTtopo_file";
    pub const UNKNOWN_TOPO: &str = "topo_file";

    pub const RAW_COORD: &str = "RAWcoord_file";
    pub const FIDUCIAL_COORD: &str = "FIDUCIALcoord_file";
    pub const INFLATED_COORD: &str = "INFLATEDcoord_file";
    pub const VERY_INFLATED_COORD: &str = "VERY_INFLATEDcoord_file";
    pub const SPHERICAL_COORD: &str = "SPHERICALcoord_file";
    pub const ELLIPSOID_COORD: &str = "ELLIPSOIDcoord_file";
    pub const COMPRESSED_COORD: &str = "COMPRESSED_MEDIAL_WALLcoord_file";
    pub const FLAT_COORD: &str = "FLATcoord_file";
    pub const LOBAR_FLAT_COORD: &str = "LOBAR_FLATcoord_file";
    pub const HULL_COORD: &str = "HULLcoord_file";
    pub const AVERAGE_FIDUCIAL_COORD: &str = "AVERAGE_FIDUCIALcoord_file";
    pub const UNKNOWN_COORD: &str = "coord_file";

    pub const RAW_SURFACE: &str = "RAWsurface_file";
    pub const FIDUCIAL_SURFACE: &str = "FIDUCIALsurface_file";
    pub const INFLATED_SURFACE: &str = "INFLATEDsurface_file";
    pub const VERY_INFLATED_SURFACE: &str = "VERY_INFLATEDsurface_file";
    pub const SPHERICAL_SURFACE: &str = "SPHERICALsurface_file";
    pub const ELLIPSOID_SURFACE: &str = "ELLIPSOIDsurface_file";
    pub const COMPRESSED_SURFACE: &str = "COMPRESSED_MEDIAL_WALLsurface_file";
    pub const FLAT_SURFACE: &str = "FLATsurface_file";
    pub const LOBAR_FLAT_SURFACE: &str = "LOBAR_FLATsurface_file";
    pub const HULL_SURFACE: &str = "HULLsurface_file";
    pub const UNKNOWN_SURFACE: &str = "surface_file";

    pub const LAT_LON: &str = "lat_lon_file";
    pub const SECTION: &str = "section_file";
    pub const SCENE: &str = "scene_file";
    pub const IMAGE: &str = "image_file";
    pub const SCRIPT: &str = "script_file";
    pub const TRANSFORMATION_MATRIX: &str = "transformation_matrix_file";
    pub const PAINT: &str = "paint_file";
    pub const AREA_COLOR: &str = "area_color_file";
    pub const RGB_PAINT: &str = "RGBpaint_file";
    pub const SURFACE_VECTOR: &str = "surface_vector_file";

    pub const RAW_BORDER: &str = "RAWborder_file";
    pub const FIDUCIAL_BORDER: &str = "FIDUCIALborder_file";
    pub const INFLATED_BORDER: &str = "INFLATEDborder_file";
    pub const VERY_INFLATED_BORDER: &str = "VERY_INFLATEDborder_file";
    pub const SPHERICAL_BORDER: &str = "SPHERICALborder_file";
    pub const ELLIPSOID_BORDER: &str = "ELLIPSOIDborder_file";
    pub const COMPRESSED_BORDER: &str = "COMPRESSED_MEDIAL_WALLborder_file";
    pub const FLAT_BORDER: &str = "FLATborder_file";
    pub const LOBAR_FLAT_BORDER: &str = "LOBAR_FLATborder_file";
    pub const HULL_BORDER: &str = "HULLborder_file";
    pub const VOLUME_BORDER: &str = "VOLUMEborder_file";
    pub const UNKNOWN_BORDER: &str = "border_file";

    pub const BORDER_COLOR: &str = "border_color_file";
    pub const BORDER_PROJECTION: &str = "borderproj_file";
    pub const MOMC_TEMPLATE: &str = "momc_template_file";
    pub const MOMC_TEMPLATE_MATCH: &str = "momc_template_match_file";
    pub const PALETTE: &str = "palette_file";
    pub const TOPOGRAPHY: &str = "topography_file";

    pub const CELL: &str = "cell_file";
    pub const CELL_COLOR: &str = "cell_color_file";
    pub const CELL_PROJECTION: &str = "cellproj_file";
    pub const VOLUME_CELL: &str = "volume_cell_file";

    pub const CONTOUR: &str = "contour_file";
    pub const CONTOUR_CELL: &str = "contour_cell_file";
    pub const CONTOUR_CELL_COLOR: &str = "contour_cell_color_file";

    pub const ATLAS: &str = "atlas_file";
    pub const METRIC: &str = "metric_file";
    pub const SURFACE_SHAPE: &str = "surface_shape_file";
    pub const COCOMAC: &str = "cocomac_connect_file";
    pub const AREAL_ESTIMATION: &str = "areal_estimation_file";
    pub const CUTS: &str = "cuts_file";

    pub const FOCI: &str = "foci_file";
    pub const FOCI_COLOR: &str = "foci_color_file";
    pub const FOCI_PROJECTION: &str = "fociproj_file";
    pub const VOLUME_FOCI: &str = "volume_foci_file";
    pub const FOCI_SEARCH: &str = "foci_search_file";

    pub const PARAMS: &str = "params_file";
    pub const DEFORMATION_MAP: &str = "deform_map_file";
    pub const DEFORMATION_FIELD: &str = "deform_field_file";
    pub const CEREBRAL_HULL: &str = "CEREBRAL_HULLvtk_file";
    pub const VTK_MODEL: &str = "vtk_model_file";
    pub const GEODESIC_DISTANCE: &str = "geodesic_distance_file";
    pub const WUSTL_REGION: &str = "wustl_region_file";
    pub const TRANSFORMATION_DATA: &str = "transformation_data_file";

    pub const META_ANALYSIS: &str = "meta_analysis_file";
    pub const STUDY_METADATA: &str = "study_metadata_file";
    pub const STUDY_COLLECTION: &str = "study_collection_file";
    pub const VOCABULARY: &str = "vocabulary_file";
    pub const DOCUMENT: &str = "document_file";

    /// Header tags of older spec files that are not file tags.
    pub const TOPO_FLAG: &str = "topo_flag";
    pub const FOCI_FILTER_FLAG: &str = "foci_filter_flag";
}


/// The canonical file name extensions of all data files.
pub mod extension {
    pub const TOPOLOGY: &str = ".topo";
    pub const COORDINATE: &str = ".coord";
    pub const TRANSFORMATION_MATRIX: &str = ".matrix";
    pub const LAT_LON: &str = ".latlon";
    pub const SECTION: &str = ".section";
    pub const PAINT: &str = ".paint";
    pub const AREA_COLOR: &str = ".areacolor";
    pub const RGB_PAINT: &str = ".RGB_paint";
    pub const BORDER: &str = ".border";
    pub const BORDER_COLOR: &str = ".bordercolor";
    pub const BORDER_PROJECTION: &str = ".borderproj";
    pub const PALETTE: &str = ".palette";
    pub const TOPOGRAPHY: &str = ".topography";
    pub const CELL: &str = ".cell";
    pub const CELL_COLOR: &str = ".cell_color";
    pub const CELL_PROJECTION: &str = ".cellproj";
    pub const CONTOUR: &str = ".contours";
    pub const METRIC: &str = ".metric";
    pub const SURFACE_SHAPE: &str = ".surface_shape";
    pub const COCOMAC: &str = ".cocomac.xml";
    pub const AREAL_ESTIMATION: &str = ".areal_estimation";
    pub const CUTS: &str = ".cuts";
    pub const FOCI: &str = ".foci";
    pub const FOCI_COLOR: &str = ".focicolor";
    pub const FOCI_PROJECTION: &str = ".fociproj";
    pub const FOCI_SEARCH: &str = ".focisearch";
    pub const PARAMS: &str = ".params";
    pub const DEFORMATION_MAP: &str = ".deform_map";
    pub const DEFORMATION_FIELD: &str = ".deform_field";
    pub const VTK_MODEL: &str = ".vtk";
    pub const GEODESIC_DISTANCE: &str = ".geodesic";
    pub const SPEC: &str = ".spec";
    pub const SCENE: &str = ".scene";
    pub const SCRIPT: &str = ".script";
    pub const STUDY_METADATA: &str = ".study";
    pub const VOCABULARY: &str = ".vocabulary";
    pub const TEXT: &str = ".txt";
    pub const COMMA_SEPARATED_VALUE: &str = ".csv";
    pub const ZIP: &str = ".zip";

    pub const SUREFIT_VECTOR: &str = ".vec";
    pub const SURFACE_VECTOR: &str = ".svec";
    pub const WUSTL_REGION: &str = ".wustl_txt";
    pub const MD_PLOT: &str = ".mdo";
    pub const MNI_OBJ_SURFACE: &str = ".obj";

    pub const FREE_SURFER_ASCII_SURFACE: &str = ".asc";
    pub const FREE_SURFER_ASCII_CURVATURE: &str = ".curv.asc";
    pub const FREE_SURFER_ASCII_FUNCTIONAL: &str = ".w.asc";
    pub const FREE_SURFER_BINARY_FUNCTIONAL: &str = ".w";
    pub const FREE_SURFER_LABEL: &str = ".label";

    pub const ANALYZE_VOLUME: &str = ".hdr";
    pub const AFNI_VOLUME: &str = ".HEAD";
    pub const WU_NIL_VOLUME: &str = ".ifh";
    pub const MINC_VOLUME: &str = ".mnc";
    pub const NIFTI_VOLUME: &str = ".nii";
    pub const NIFTI_GZIP_VOLUME: &str = ".nii.gz";

    pub const GIFTI: &str = ".gii";
    pub const GIFTI_COORDINATE: &str = ".coord.gii";
    pub const GIFTI_SURFACE: &str = ".surf.gii";
    pub const GIFTI_TOPOLOGY: &str = ".topo.gii";
    pub const GIFTI_FUNCTIONAL: &str = ".func.gii";
    pub const GIFTI_SHAPE: &str = ".shape.gii";
    pub const GIFTI_LABEL: &str = ".label.gii";
    pub const GIFTI_TIME: &str = ".time.gii";
    pub const GIFTI_RGBA: &str = ".rgba.gii";
    pub const GIFTI_TENSOR: &str = ".tensor.gii";
}


/// Which group of files an entry belongs to when files are cleared or copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Surface,
    Volume,
    Other,
}

/// The order of the files of each entry after a spec file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMethod {
    None,

    /// Most recently modified files first.
    #[default]
    Date,

    Name,
}


/// Describes one kind of file that a spec file can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryKind {
    pub descriptive_name: &'static str,
    pub tag: &'static str,
    pub file_type: FileType,

    /// Whether any tag ending with this tag is accepted,
    /// so that `XYZcoord_file` is listed as an unknown coordinate file.
    pub pattern_match: bool,
}

impl EntryKind {

    /// Whether a tag read from a spec file belongs to this kind.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if self.pattern_match { tag.ends_with(self.tag) }
        else { tag == self.tag }
    }
}

const fn surface(descriptive_name: &'static str, tag: &'static str) -> EntryKind {
    EntryKind { descriptive_name, tag, file_type: FileType::Surface, pattern_match: false }
}

const fn volume(descriptive_name: &'static str, tag: &'static str) -> EntryKind {
    EntryKind { descriptive_name, tag, file_type: FileType::Volume, pattern_match: false }
}

const fn other(descriptive_name: &'static str, tag: &'static str) -> EntryKind {
    EntryKind { descriptive_name, tag, file_type: FileType::Other, pattern_match: false }
}

const fn any_surface(descriptive_name: &'static str, tag: &'static str) -> EntryKind {
    EntryKind { descriptive_name, tag, file_type: FileType::Surface, pattern_match: true }
}

/// All kinds, in the order in which tags are matched and files are written.
/// Pattern entries follow all exact entries of their group.
pub const ENTRY_KINDS: &[EntryKind] = &[
    volume("Volume - Functional", tag::VOLUME_FUNCTIONAL),
    volume("Volume - Paint", tag::VOLUME_PAINT),
    volume("Volume - Probabilistic Atlas", tag::VOLUME_PROB_ATLAS),
    volume("Volume - RGB", tag::VOLUME_RGB),
    volume("Volume - Segmentation", tag::VOLUME_SEGMENTATION),
    volume("Volume - Anatomy", tag::VOLUME_ANATOMY),
    volume("Volume - Vector", tag::VOLUME_VECTOR),

    surface("Topology - Closed", tag::CLOSED_TOPO),
    surface("Topology - Open", tag::OPEN_TOPO),
    surface("Topology - Cut", tag::CUT_TOPO),
    surface("Topology - Lobar Cut", tag::LOBAR_CUT_TOPO),
    any_surface("Topology - Unknown", tag::UNKNOWN_TOPO),

    surface("Coordinate - Raw", tag::RAW_COORD),
    surface("Coordinate - Fiducial", tag::FIDUCIAL_COORD),
    surface("Coordinate - Inflated", tag::INFLATED_COORD),
    surface("Coordinate - Very Inflated", tag::VERY_INFLATED_COORD),
    surface("Coordinate - Spherical", tag::SPHERICAL_COORD),
    surface("Coordinate - Ellipsoid", tag::ELLIPSOID_COORD),
    surface("Coordinate - Compressed Medial Wall", tag::COMPRESSED_COORD),
    surface("Coordinate - Flat", tag::FLAT_COORD),
    surface("Coordinate - Lobar Flat", tag::LOBAR_FLAT_COORD),
    surface("Coordinate - Hull", tag::HULL_COORD),
    surface("Coordinate - Average Fiducial", tag::AVERAGE_FIDUCIAL_COORD),
    any_surface("Coordinate - Unknown", tag::UNKNOWN_COORD),

    surface("Surface - Raw", tag::RAW_SURFACE),
    surface("Surface - Fiducial", tag::FIDUCIAL_SURFACE),
    surface("Surface - Inflated", tag::INFLATED_SURFACE),
    surface("Surface - Very Inflated", tag::VERY_INFLATED_SURFACE),
    surface("Surface - Spherical", tag::SPHERICAL_SURFACE),
    surface("Surface - Ellipsoid", tag::ELLIPSOID_SURFACE),
    surface("Surface - Compressed Medial Wall", tag::COMPRESSED_SURFACE),
    surface("Surface - Flat", tag::FLAT_SURFACE),
    surface("Surface - Lobar Flat", tag::LOBAR_FLAT_SURFACE),
    surface("Surface - Hull", tag::HULL_SURFACE),
    any_surface("Surface - Unknown", tag::UNKNOWN_SURFACE),

    surface("Latitude/Longitude File", tag::LAT_LON),
    surface("Section File", tag::SECTION),
    other("Scene File", tag::SCENE),
    other("Image File", tag::IMAGE),
    other("Script File", tag::SCRIPT),
    surface("Transformation Matrix File", tag::TRANSFORMATION_MATRIX),
    surface("Paint File", tag::PAINT),
    surface("Area Color File", tag::AREA_COLOR),
    surface("RGB Paint File", tag::RGB_PAINT),
    surface("Surface Vector File", tag::SURFACE_VECTOR),

    surface("Border File - Raw", tag::RAW_BORDER),
    surface("Border File - Fiducial", tag::FIDUCIAL_BORDER),
    surface("Border File - Inflated", tag::INFLATED_BORDER),
    surface("Border File - Very Inflated", tag::VERY_INFLATED_BORDER),
    surface("Border File - Spherical", tag::SPHERICAL_BORDER),
    surface("Border File - Ellipsoid", tag::ELLIPSOID_BORDER),
    surface("Border File - Comp Med Wall", tag::COMPRESSED_BORDER),
    surface("Border File - Flat", tag::FLAT_BORDER),
    surface("Border File - Lobar Flat", tag::LOBAR_FLAT_BORDER),
    surface("Border File - Hull", tag::HULL_BORDER),
    surface("Border File - Volume", tag::VOLUME_BORDER),
    any_surface("Border File - Unknown", tag::UNKNOWN_BORDER),

    surface("Border Color File", tag::BORDER_COLOR),
    surface("Border Projection File", tag::BORDER_PROJECTION),
    surface("Momc Template", tag::MOMC_TEMPLATE),
    surface("Momc Template Match", tag::MOMC_TEMPLATE_MATCH),
    surface("Palette File", tag::PALETTE),
    surface("Topography File", tag::TOPOGRAPHY),

    other("Cell File", tag::CELL),
    other("Cell Color File", tag::CELL_COLOR),
    other("Cell Projection File", tag::CELL_PROJECTION),
    other("Volume Cell File", tag::VOLUME_CELL),

    other("Contour File", tag::CONTOUR),
    other("Contour Cell File", tag::CONTOUR_CELL),
    other("Contour Cell Color File", tag::CONTOUR_CELL_COLOR),

    surface("Prog Atlas File", tag::ATLAS),
    surface("Metric File", tag::METRIC),
    surface("Surface Shape File", tag::SURFACE_SHAPE),
    surface("CoCoMac File", tag::COCOMAC),
    surface("Areal Estimation File", tag::AREAL_ESTIMATION),
    surface("Cuts File", tag::CUTS),

    other("Foci File", tag::FOCI),
    other("Foci Color File", tag::FOCI_COLOR),
    other("Foci Projection File", tag::FOCI_PROJECTION),
    other("Volume Foci File", tag::VOLUME_FOCI),
    other("Foci Search File", tag::FOCI_SEARCH),

    other("Params File", tag::PARAMS),
    surface("Deformation Map File", tag::DEFORMATION_MAP),
    surface("Deformation Field File", tag::DEFORMATION_FIELD),
    other("Cerebral Hull File", tag::CEREBRAL_HULL),
    surface("VTK Model File", tag::VTK_MODEL),
    surface("Geodesic Distance File", tag::GEODESIC_DISTANCE),
    other("WUSTL Region File", tag::WUSTL_REGION),
    surface("Transformation Data File", tag::TRANSFORMATION_DATA),

    other("Study Meta-Analysis File", tag::META_ANALYSIS),
    other("Study Metadata File", tag::STUDY_METADATA),
    other("Study Collection File", tag::STUDY_COLLECTION),
    other("Vocabulary File", tag::VOCABULARY),
    other("Document File", tag::DOCUMENT),
];

/// The kind whose tag is exactly the specified tag.
pub fn entry_kind(tag: &str) -> Option<&'static EntryKind> {
    ENTRY_KINDS.iter().find(|kind| kind.tag == tag)
}


/// One file listed in a spec file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub filename: String,

    /// The separate data file of a volume whose header and voxels are stored apart.
    /// Empty for all other files.
    pub data_file_name: String,

    pub structure: Structure,
    pub selected: bool,
}

impl ListedFile {
    pub fn new(filename: impl Into<String>, data_file_name: impl Into<String>, structure: Structure) -> Self {
        ListedFile { filename: filename.into(), data_file_name: data_file_name.into(), structure, selected: true }
    }

    /// Files whose name starts with `*` are marked for deletion and never written.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.filename.starts_with('*')
    }
}


/// The files of one kind listed in a spec file.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    kind: EntryKind,
    files: Vec<ListedFile>,
}

impl Entry {
    pub fn new(kind: EntryKind) -> Self {
        Entry { kind, files: Vec::new() }
    }

    pub fn kind(&self) -> &EntryKind { &self.kind }
    pub fn tag(&self) -> &'static str { self.kind.tag }
    pub fn descriptive_name(&self) -> &'static str { self.kind.descriptive_name }
    pub fn file_type(&self) -> FileType { self.kind.file_type }

    pub fn files(&self) -> &[ListedFile] { &self.files }
    pub fn files_mut(&mut self) -> &mut [ListedFile] { &mut self.files }
    pub fn number_of_files(&self) -> usize { self.files.len() }
    pub fn is_empty(&self) -> bool { self.files.is_empty() }

    pub fn selected_files(&self) -> impl Iterator<Item = &ListedFile> {
        self.files.iter().filter(|file| file.selected)
    }

    pub fn number_of_files_selected(&self) -> usize {
        self.selected_files().count()
    }

    /// Add the file if the tag belongs to this entry. Returns whether the tag matched.
    /// A file that is already listed is selected again instead of being listed twice,
    /// and takes the new data file name.
    pub fn add_file(&mut self, tag: &str, filename: &str, data_file_name: &str, structure: Structure) -> bool {
        if !self.kind.matches_tag(tag) {
            return false;
        }

        match self.files.iter_mut().find(|file| file.filename == filename) {
            Some(existing) => {
                existing.selected = true;
                existing.data_file_name = data_file_name.to_string();
            },

            None => self.files.push(ListedFile::new(filename, data_file_name, structure)),
        }

        true
    }

    /// Select all files with the same file name as the specified name, ignoring directories.
    /// Returns whether a file was selected.
    pub fn set_selected(&mut self, name: &str, add_if_not_found: bool, structure: Structure) -> bool {
        if name.is_empty() {
            return false;
        }

        let mut selected = false;
        for file in &mut self.files {
            if base_name(&file.filename) == base_name(name) {
                file.selected = true;
                selected = true;
            }
        }

        if !selected && add_if_not_found {
            self.files.push(ListedFile::new(name, "", structure));
            selected = true;
        }

        selected
    }

    pub fn set_all_selections(&mut self, selected: bool) {
        for file in &mut self.files {
            file.selected = selected;
        }
    }

    /// Select only the first file, if any. Returns whether there was a file.
    pub fn select_first(&mut self) -> bool {
        match self.files.first_mut() {
            Some(first) => { first.selected = true; true },
            None => false,
        }
    }

    /// Deselect the files with exactly the specified name.
    pub fn clear_selection_status(&mut self, filename: &str) {
        for file in self.files.iter_mut().filter(|file| file.filename == filename) {
            file.selected = false;
        }
    }

    /// Deselect every file that is also selected in the other entry.
    pub fn deselect_files_selected_in(&mut self, other: &Entry) {
        for file in self.files.iter_mut().filter(|file| file.selected) {
            if other.selected_files().any(|other_file| other_file.filename == file.filename) {
                file.selected = false;
            }
        }
    }

    /// Append a line to the message for each file of this entry
    /// that the other entry does not list. Returns whether all files are listed.
    pub fn is_subset(&self, other: &Entry, message: &mut String) -> bool {
        let mut is_subset = true;

        for file in &self.files {
            if !other.files.iter().any(|other_file| other_file.filename == file.filename) {
                message.push_str(&format!("   {} {} is not in spec file but is in scene.\n", self.descriptive_name(), file.filename));
                is_subset = false;
            }
        }

        is_subset
    }

    /// Put the directory in front of all file names,
    /// optionally leaving absolute names alone.
    pub fn prepend_path(&mut self, directory: &str, ignore_absolute: bool) {
        let prepend = |name: &mut String| {
            if name.is_empty() || (ignore_absolute && Path::new(name.as_str()).is_absolute()) {
                return;
            }

            *name = format!("{}/{}", directory, name);
        };

        for file in &mut self.files {
            prepend(&mut file.filename);
            prepend(&mut file.data_file_name);
        }
    }

    /// Reduce all file names to their last component.
    pub fn remove_paths(&mut self) {
        for file in &mut self.files {
            file.filename = base_name(&file.filename).to_string();
            file.data_file_name = base_name(&file.data_file_name).to_string();
        }
    }

    /// All file names and data file names.
    pub fn all_files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().flat_map(|file| {
            std::iter::once(file.filename.as_str())
                .chain(Some(file.data_file_name.as_str()).filter(|name| !name.is_empty()))
        })
    }

    /// Forget all files, optionally deleting them and their data files from the disk.
    /// Relative names are resolved against the directory.
    pub fn clear(&mut self, directory: &Path, remove_from_disk: bool) {
        if remove_from_disk {
            for name in self.all_files() {
                let path = resolve(directory, name);
                if let Err(error) = fs::remove_file(&path) {
                    log::warn!("cannot remove {}: {}", path.display(), error);
                }
            }
        }

        self.files.clear();
    }

    /// Keep only the files that exist. Returns the names of the removed files.
    pub fn retain_existing(&mut self, directory: &Path) -> Vec<String> {
        let mut removed = Vec::new();

        self.files.retain(|file| {
            let exists = resolve(directory, &file.filename).exists();
            if !exists { removed.push(file.filename.clone()); }
            exists
        });

        removed
    }

    /// Sort the files. Modification dates are read relative to the directory,
    /// files that cannot be found count as the oldest.
    pub fn sort(&mut self, method: SortMethod, directory: &Path) {
        match method {
            SortMethod::None => {},
            SortMethod::Name => self.files.sort_by(|a, b| a.filename.cmp(&b.filename)),
            SortMethod::Date => self.files.sort_by_cached_key(|file| {
                let modified = fs::metadata(resolve(directory, &file.filename))
                    .and_then(|metadata| metadata.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);

                std::cmp::Reverse(modified)
            }),
        }
    }

    /// Append a line to the message for each selected file or data file that cannot be found.
    pub fn validate(&self, directory: &Path, message: &mut String) {
        for file in self.selected_files() {
            if !file.filename.is_empty() && !resolve(directory, &file.filename).is_file() {
                message.push_str(&format!("DATA FILE NOT FOUND: {}\n", file.filename));
            }

            if !file.data_file_name.is_empty() {
                let data = resolve(directory, &file.data_file_name);
                if !data.is_file() && !with_gzip_suffix(&data).is_file() {
                    message.push_str(&format!("DATA FILE NOT FOUND: {}\n", file.data_file_name));
                }
            }
        }
    }

    /// Add one scene entry per file, holding the file name and,
    /// separated by a colon, the data file name.
    pub fn save_scene(&self, class: &mut SceneClass, selected_only: bool) {
        for file in &self.files {
            if file.filename.is_empty() || (selected_only && !file.selected) {
                continue;
            }

            let value = if file.data_file_name.is_empty() { file.filename.clone() }
                else { format!("{}:{}", file.filename, file.data_file_name) };

            class.add_info(self.tag(), value);
        }
    }
}


/// The last component of a file name, or the name itself if it has none.
pub fn base_name(name: &str) -> &str {
    Path::new(name).file_name()
        .and_then(|file_name| file_name.to_str())
        .unwrap_or(name)
}

/// The name relative to the directory, or the name itself if it is absolute.
pub fn resolve(directory: &Path, name: &str) -> PathBuf {
    directory.join(name)
}

/// The path with `.gz` appended to its file name.
pub fn with_gzip_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}


#[cfg(test)]
mod test {
    use super::*;

    fn entry(tag: &str) -> Entry {
        Entry::new(*entry_kind(tag).unwrap())
    }

    #[test]
    fn tags_are_unique(){
        for (index, kind) in ENTRY_KINDS.iter().enumerate() {
            assert!(
                ENTRY_KINDS[.. index].iter().all(|earlier| earlier.tag != kind.tag),
                "duplicate tag {}", kind.tag
            );
        }
    }

    #[test]
    fn pattern_entries_follow_their_exact_entries(){
        for (index, kind) in ENTRY_KINDS.iter().enumerate().filter(|(_, kind)| kind.pattern_match) {
            for later in &ENTRY_KINDS[index + 1 ..] {
                assert!(!kind.matches_tag(later.tag), "{} shadows {}", kind.tag, later.tag);
            }
        }
    }

    #[test]
    fn exact_and_pattern_tags(){
        let mut fiducial = entry(tag::FIDUCIAL_COORD);
        assert!(fiducial.add_file(tag::FIDUCIAL_COORD, "a.coord", "", Structure::Left));
        assert!(!fiducial.add_file("OTHERcoord_file", "b.coord", "", Structure::Left));

        let mut unknown = entry(tag::UNKNOWN_COORD);
        assert!(unknown.add_file("OTHERcoord_file", "b.coord", "", Structure::Left));
        assert!(!unknown.add_file("coord_file_old", "c.coord", "", Structure::Left));
        assert_eq!(unknown.number_of_files(), 1);
    }

    #[test]
    fn adding_twice_reselects(){
        let mut anatomy = entry(tag::VOLUME_ANATOMY);
        anatomy.add_file(tag::VOLUME_ANATOMY, "brain.hdr", "brain.img", Structure::Both);
        anatomy.set_all_selections(false);

        anatomy.add_file(tag::VOLUME_ANATOMY, "brain.hdr", "brain.img.gz", Structure::Both);
        assert_eq!(anatomy.number_of_files(), 1);
        assert!(anatomy.files()[0].selected);
        assert_eq!(anatomy.files()[0].data_file_name, "brain.img.gz");
    }

    #[test]
    fn selection_by_base_name(){
        let mut metric = entry(tag::METRIC);
        metric.add_file(tag::METRIC, "sub/a.metric", "", Structure::Left);
        metric.set_all_selections(false);

        assert!(metric.set_selected("/elsewhere/a.metric", false, Structure::Left));
        assert!(metric.files()[0].selected);

        assert!(!metric.set_selected("b.metric", false, Structure::Left));
        assert!(metric.set_selected("b.metric", true, Structure::Right));
        assert_eq!(metric.number_of_files(), 2);
        assert_eq!(metric.files()[1].structure, Structure::Right);
    }

    #[test]
    fn prepend_and_remove_paths(){
        let mut anatomy = entry(tag::VOLUME_ANATOMY);
        anatomy.add_file(tag::VOLUME_ANATOMY, "brain.hdr", "brain.img", Structure::Both);
        anatomy.add_file(tag::VOLUME_ANATOMY, "/abs/other.hdr", "", Structure::Both);

        anatomy.prepend_path("/data", true);
        assert_eq!(anatomy.files()[0].filename, "/data/brain.hdr");
        assert_eq!(anatomy.files()[0].data_file_name, "/data/brain.img");
        assert_eq!(anatomy.files()[1].filename, "/abs/other.hdr");

        anatomy.remove_paths();
        assert_eq!(anatomy.files()[0].filename, "brain.hdr");
        assert_eq!(anatomy.files()[0].data_file_name, "brain.img");
        assert_eq!(anatomy.all_files().collect::<Vec<_>>(), vec!["brain.hdr", "brain.img", "other.hdr"]);
    }

    #[test]
    fn sort_by_name(){
        let mut paint = entry(tag::PAINT);
        for name in ["c.paint", "a.paint", "b.paint"] {
            paint.add_file(tag::PAINT, name, "", Structure::Left);
        }

        paint.sort(SortMethod::Name, Path::new("."));
        let names: Vec<&str> = paint.files().iter().map(|file| file.filename.as_str()).collect();
        assert_eq!(names, vec!["a.paint", "b.paint", "c.paint"]);
    }
}
