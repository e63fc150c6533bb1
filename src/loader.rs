
//! Read all selected files of a spec file into a [`BrainSet`].
//!
//! Files are read in phases. The files of one phase are read in parallel,
//! and a phase only starts after the previous phase is complete.
//! Progress is reported on the calling thread.

use std::path::{Path, PathBuf};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::border::{BorderFile, BorderProjectionFile, UniqueIdSource};
use crate::cell::{CellFile, CellProjectionFile, Cells, Foci};
use crate::cocomac::CocomacConnectivityFile;
use crate::deformation_map::DeformationMapFile;
use crate::error::{Error, Result, UnitResult};
use crate::file::{DataFile, read_file_with_options, write_file_with_options};
use crate::meta::{FileFormat, FormatMatrix, ReadOptions, Structure, WriteOptions};
use crate::meta::header::FileHeader;
use crate::node::areal_estimation::ArealEstimationFile;
use crate::node::deformation_field::DeformationFieldFile;
use crate::node::geodesic::GeodesicDistanceFile;
use crate::node::lat_lon::LatLonFile;
use crate::node::metric::MetricFile;
use crate::node::paint::PaintFile;
use crate::node::rgb_paint::RgbPaintFile;
use crate::node::section::SectionFile;
use crate::node::topography::TopographyFile;
use crate::params::ParamsFile;
use crate::spec::{FileType, SpecFile, tag};
use crate::spec::entry::{resolve, with_gzip_suffix};
use crate::surface::{CoordinateFile, SurfaceConfiguration, TopologyFile, TopologyType};
use crate::wustl_region::WustlRegionFile;


fn new_file<F: Default>(_ids: Arc<UniqueIdSource>) -> F { F::default() }

macro_rules! loadable_files {
    ( $( $variant: ident ( $file: ty ) = $constructor: expr ),* $(,)? ) => {

        /// The kinds of data files the loader can decode.
        /// Files of other kinds are only checked for existence.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DataFileKind {
            $( $variant, )*
            External,
        }

        /// A data file read by the loader.
        #[derive(Debug)]
        pub enum LoadedFile {
            $( $variant($file), )*

            /// A file that is not decoded, by its path.
            External(PathBuf),
        }

        impl DataFileKind {

            /// The formats this kind can read and write.
            pub const fn formats(self) -> FormatMatrix {
                match self {
                    $( DataFileKind::$variant => <$file as DataFile>::FORMATS, )*
                    DataFileKind::External => FormatMatrix::NONE,
                }
            }
        }

        impl LoadedFile {

            /// Read a file of the kind from the path.
            pub fn read(kind: DataFileKind, path: &Path, options: ReadOptions, ids: &Arc<UniqueIdSource>) -> Result<Self> {
                match kind {
                    $(
                        DataFileKind::$variant => {
                            let mut file: $file = ($constructor)(Arc::clone(ids));
                            read_file_with_options(&mut file, path, options)?;
                            Ok(LoadedFile::$variant(file))
                        },
                    )*

                    DataFileKind::External => {
                        if path.exists() { Ok(LoadedFile::External(path.to_path_buf())) }
                        else { Err(Error::FileNotFound(path.to_path_buf())) }
                    },
                }
            }

            pub fn kind(&self) -> DataFileKind {
                match self {
                    $( LoadedFile::$variant(_) => DataFileKind::$variant, )*
                    LoadedFile::External(_) => DataFileKind::External,
                }
            }

            /// The header, unless the file is external.
            pub fn header(&self) -> Option<&FileHeader> {
                match self {
                    $( LoadedFile::$variant(file) => Some(file.header()), )*
                    LoadedFile::External(_) => None,
                }
            }

            pub fn header_mut(&mut self) -> Option<&mut FileHeader> {
                match self {
                    $( LoadedFile::$variant(file) => Some(file.header_mut()), )*
                    LoadedFile::External(_) => None,
                }
            }

            /// Whether the file starts with a header section.
            pub fn has_header(&self) -> bool {
                match self {
                    $( LoadedFile::$variant(file) => file.has_header(), )*
                    LoadedFile::External(_) => false,
                }
            }

            /// Write the file to the path in its current write format.
            pub fn write_file(&mut self, path: &Path) -> UnitResult {
                match self {
                    $( LoadedFile::$variant(file) => write_file_with_options(file, path, WriteOptions::default()), )*
                    LoadedFile::External(_) => Err(Error::unsupported("external files cannot be written")),
                }
            }
        }
    };
}

loadable_files! {
    Topology(TopologyFile) = new_file,
    Coordinate(CoordinateFile) = new_file,
    ArealEstimation(ArealEstimationFile) = new_file,
    Border(BorderFile) = BorderFile::with_id_source,
    BorderProjection(BorderProjectionFile) = BorderProjectionFile::with_id_source,
    Cell(CellFile<Cells>) = new_file,
    CellProjection(CellProjectionFile<Cells>) = new_file,
    Foci(CellFile<Foci>) = new_file,
    FociProjection(CellProjectionFile<Foci>) = new_file,
    Cocomac(CocomacConnectivityFile) = new_file,
    DeformationField(DeformationFieldFile) = new_file,
    DeformationMap(DeformationMapFile) = new_file,
    GeodesicDistance(GeodesicDistanceFile) = new_file,
    LatLon(LatLonFile) = new_file,
    Metric(MetricFile) = new_file,
    SurfaceShape(MetricFile) = |_ids| MetricFile::surface_shape(),
    Paint(PaintFile) = new_file,
    Params(ParamsFile) = new_file,
    RgbPaint(RgbPaintFile) = new_file,
    Section(SectionFile) = new_file,
    Topography(TopographyFile) = new_file,
    WustlRegion(WustlRegionFile) = new_file,
}

impl DataFileKind {

    /// The kind of the files listed under a spec file tag.
    pub fn from_tag(spec_tag: &str) -> Self {
        let is = |suffix: &str| spec_tag.ends_with(suffix);

        match spec_tag {
            _ if is(tag::UNKNOWN_TOPO) => DataFileKind::Topology,
            _ if is(tag::UNKNOWN_COORD) => DataFileKind::Coordinate,
            _ if is(tag::UNKNOWN_BORDER) => DataFileKind::Border,
            tag::BORDER_PROJECTION => DataFileKind::BorderProjection,
            tag::AREAL_ESTIMATION => DataFileKind::ArealEstimation,
            tag::CELL => DataFileKind::Cell,
            tag::CELL_PROJECTION => DataFileKind::CellProjection,
            tag::FOCI => DataFileKind::Foci,
            tag::FOCI_PROJECTION => DataFileKind::FociProjection,
            tag::COCOMAC => DataFileKind::Cocomac,
            tag::DEFORMATION_FIELD => DataFileKind::DeformationField,
            tag::DEFORMATION_MAP => DataFileKind::DeformationMap,
            tag::GEODESIC_DISTANCE => DataFileKind::GeodesicDistance,
            tag::LAT_LON => DataFileKind::LatLon,
            tag::METRIC => DataFileKind::Metric,
            tag::SURFACE_SHAPE => DataFileKind::SurfaceShape,
            tag::PAINT => DataFileKind::Paint,
            tag::PARAMS => DataFileKind::Params,
            tag::RGB_PAINT => DataFileKind::RgbPaint,
            tag::SECTION => DataFileKind::Section,
            tag::TOPOGRAPHY => DataFileKind::Topography,
            tag::WUSTL_REGION => DataFileKind::WustlRegion,
            _ => DataFileKind::External,
        }
    }
}


/// A file of the spec file that will be read.
#[derive(Debug, Clone, PartialEq)]
pub struct FileToLoad {
    pub tag: &'static str,
    pub kind: DataFileKind,
    pub path: PathBuf,

    /// The data file of a volume header.
    pub data_file: Option<PathBuf>,

    pub structure: Structure,
}

/// The groups of selected files in the order they are read.
/// Files of one group do not depend on each other.
pub fn load_order(spec: &SpecFile) -> Vec<Vec<FileToLoad>> {
    let directory = spec.directory();

    let selected = |accept: &dyn Fn(&'static str, FileType) -> bool| -> Vec<FileToLoad> {
        spec.entries().iter()
            .filter(|entry| accept(entry.tag(), entry.file_type()))
            .flat_map(|entry| entry.selected_files().map(move |file| (entry.tag(), file)))
            .map(|(tag, file)| FileToLoad {
                tag,
                kind: DataFileKind::from_tag(tag),
                path: resolve(&directory, &file.filename),
                data_file: (!file.data_file_name.is_empty()).then(|| resolve(&directory, &file.data_file_name)),
                structure: file.structure,
            })
            .collect()
    };

    let is_topology = |tag: &str| tag.ends_with(tag::UNKNOWN_TOPO);
    let is_coordinate = |tag: &str| tag.ends_with(tag::UNKNOWN_COORD) || tag == tag::VOLUME_ANATOMY;
    let is_surface = |tag: &str| tag.ends_with(tag::UNKNOWN_SURFACE);
    let is_volume = |file_type: FileType| file_type == FileType::Volume;
    let is_contour = |tag: &str| tag == tag::CONTOUR || tag == tag::CONTOUR_CELL;

    let mut phases: Vec<Vec<FileToLoad>> = TopologyType::LOAD_ORDER.iter()
        .map(|&topology| topology_tag(topology))
        .map(|topology| selected(&|tag, _| tag == topology))
        .collect();

    phases.push(selected(&|tag, _| is_coordinate(tag)));
    phases.push(selected(&|tag, _| is_surface(tag)));
    phases.push(selected(&|tag, file_type| is_volume(file_type) && !is_coordinate(tag)));
    phases.push(selected(&|tag, _| is_contour(tag)));

    let mut remaining = selected(&|tag, file_type| {
        !is_topology(tag) && !is_coordinate(tag) && !is_surface(tag) && !is_volume(file_type)
            && !is_contour(tag) && tag != tag::SCENE
    });

    // stable, so the order of all other files is kept
    remaining.sort_by_key(|file| file.tag != tag::FOCI_PROJECTION);
    phases.push(remaining);

    phases.retain(|phase| !phase.is_empty());
    phases
}

fn topology_tag(topology: TopologyType) -> &'static str {
    match topology {
        TopologyType::Closed => tag::CLOSED_TOPO,
        TopologyType::Open => tag::OPEN_TOPO,
        TopologyType::Cut => tag::CUT_TOPO,
        TopologyType::LobarCut => tag::LOBAR_CUT_TOPO,
        TopologyType::Unknown => tag::UNKNOWN_TOPO,
    }
}

/// Read one file, and check that the data file of a volume exists.
pub fn load_file(file: &FileToLoad, ids: &Arc<UniqueIdSource>) -> Result<LoadedFile> {
    let loaded = LoadedFile::read(file.kind, &file.path, ReadOptions::default(), ids)?;

    if let Some(data_file) = &file.data_file {
        if !data_file.exists() && !with_gzip_suffix(data_file).exists() {
            return Err(Error::DependencyMissing(
                format!("{} (data file of {})", data_file.display(), file.path.display()).into()
            ));
        }
    }

    Ok(loaded)
}


/// A file that was read into the brain set.
#[derive(Debug)]
pub struct LoadedEntry {
    pub tag: &'static str,
    pub path: PathBuf,
    pub structure: Structure,
    pub file: LoadedFile,

    /// The position of the file in the load order.
    pub order: usize,
}

/// All data files of a subject. Files may be added from multiple threads.
#[derive(Debug, Default)]
pub struct BrainSet {
    files: Mutex<Vec<LoadedEntry>>,
    selected_topology: Mutex<Option<PathBuf>>,
    ids: Arc<UniqueIdSource>,
}

impl BrainSet {
    pub fn new() -> Self { Self::default() }

    /// The source of unique ids for borders of this brain set.
    pub fn id_source(&self) -> &Arc<UniqueIdSource> { &self.ids }

    /// Add a file. May be called from any thread.
    pub fn add_file(&self, entry: LoadedEntry) {
        lock(&self.files).push(entry);
    }

    /// The files read so far.
    pub fn files(&self) -> MutexGuard<'_, Vec<LoadedEntry>> {
        lock(&self.files)
    }

    pub fn number_of_files(&self) -> usize {
        lock(&self.files).len()
    }

    /// Remove all files and restart the unique ids.
    pub fn clear(&self) {
        lock(&self.files).clear();
        *lock(&self.selected_topology) = None;
        self.ids.reset();
    }

    /// The path of the topology that surfaces are displayed with.
    pub fn selected_topology(&self) -> Option<PathBuf> {
        lock(&self.selected_topology).clone()
    }

    /// Select the loaded topology that covers the most of the surface.
    pub fn set_selected_topology_files(&self) {
        let files = lock(&self.files);

        let best = files.iter()
            .filter_map(|entry| match &entry.file {
                LoadedFile::Topology(topology) => Some((topology.topology_type(), entry)),
                _ => None,
            })
            .max_by_key(|(topology, entry)| {
                let rank = TopologyType::LOAD_ORDER.iter().position(|load| load == topology);
                (rank, std::cmp::Reverse(entry.order))
            })
            .map(|(_, entry)| entry.path.clone());

        *lock(&self.selected_topology) = best;
    }

    /// Order the files by their load order, with coordinates ordered by configuration.
    pub fn sort_brain_models(&self) {
        let configuration_rank = |entry: &LoadedEntry| match &entry.file {
            LoadedFile::Coordinate(coordinates) => SurfaceConfiguration::ALL.iter()
                .position(|&configuration| configuration == coordinates.configuration()),
            _ => None,
        };

        lock(&self.files).sort_by_cached_key(|entry| (
            configuration_rank(entry).is_none(),
            configuration_rank(entry),
            entry.order,
        ));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}


/// Options for reading the files of a spec file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderOptions {

    /// How many files are read at the same time. Zero means one per core.
    pub thread_count: usize,
}

impl LoaderOptions {

    /// Read one file after another on the calling thread.
    pub fn sequential() -> Self { LoaderOptions { thread_count: 1 } }
}

/// Reported when a file starts to be read.
#[derive(Debug, Clone, Copy)]
pub struct LoadProgress<'p> {

    /// How many files were started so far, including this one.
    pub started: usize,

    pub total: usize,
    pub path: &'p Path,
}

/// Read all selected files of the spec file.
///
/// Files that cannot be read are skipped, and their errors are added to `errors`.
/// Progress is reported on the calling thread when each file is started.
pub fn read_data_files(
    options: LoaderOptions, spec: &SpecFile,
    mut progress: impl FnMut(LoadProgress<'_>), errors: &mut Vec<Error>,
) -> BrainSet {
    let brain = Arc::new(BrainSet::new());
    let phases = load_order(spec);
    let total = phases.iter().map(Vec::len).sum();

    let mut reader = PhaseReader::new(options);
    let mut started = 0;
    let mut order = 0;

    for phase in phases {
        let mut report = |event: PhaseEvent| match event {
            PhaseEvent::Started(path) => {
                started += 1;
                progress(LoadProgress { started, total, path: &path });
            },

            PhaseEvent::Finished(result) => {
                if let Err(error) = result { errors.push(error); }
            },
        };

        let first = order;
        order += phase.len();
        reader.read_phase(&brain, phase, first, &mut report);

        brain.set_selected_topology_files();
        brain.sort_brain_models();
    }

    log::debug!("read {} of {} files", brain.number_of_files(), total);

    Arc::try_unwrap(brain).unwrap_or_else(|shared| {
        let copy = BrainSet::new();
        copy.files().append(&mut shared.files());
        *lock(&copy.selected_topology) = shared.selected_topology();
        copy
    })
}

/// Read the file into the brain set. A panic while reading becomes the error of this file.
fn read_guarded(brain: &BrainSet, file: FileToLoad, order: usize) -> Result<()> {
    let path = file.path.clone();

    panic::catch_unwind(AssertUnwindSafe(|| read_into(brain, file, order)))
        .unwrap_or_else(|_| Err(Error::invalid("reading the file panicked").in_file(path)))
}

fn read_into(brain: &BrainSet, file: FileToLoad, order: usize) -> Result<()> {
    let loaded = load_file(&file, brain.id_source())?;
    log::debug!("loaded {} file {}", file.tag, file.path.display());

    brain.add_file(LoadedEntry {
        tag: file.tag, path: file.path,
        structure: file.structure,
        file: loaded, order,
    });

    Ok(())
}


/// Reads the files of each phase, in parallel if possible.
/// Sent by the tasks that read the files of a phase.
enum PhaseEvent {
    Started(PathBuf),
    Finished(Result<()>),
}

enum PhaseReader {
    Sequential,

    #[cfg(feature = "rayon")]
    Parallel(rayon_core::ThreadPool),
}

impl PhaseReader {
    fn new(options: LoaderOptions) -> Self {
        if options.thread_count == 1 { PhaseReader::Sequential }
        else { Self::parallel(options).unwrap_or(PhaseReader::Sequential) }
    }

    #[cfg(feature = "rayon")]
    fn parallel(options: LoaderOptions) -> Option<Self> {
        let pool = rayon_core::ThreadPoolBuilder::new()
            .num_threads(options.thread_count)
            .thread_name(|index| format!("Spec File Loader Thread #{}", index))
            .build();

        match pool {
            Ok(pool) => Some(PhaseReader::Parallel(pool)),
            Err(error) => {
                log::warn!("reading files sequentially: {}", error);
                None
            },
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn parallel(_options: LoaderOptions) -> Option<Self> { None }

    /// Returns after all files of the phase are read.
    fn read_phase(
        &mut self, brain: &Arc<BrainSet>, phase: Vec<FileToLoad>,
        first_order: usize, report: &mut dyn FnMut(PhaseEvent),
    ) {
        match self {
            PhaseReader::Sequential => {
                for (index, file) in phase.into_iter().enumerate() {
                    report(PhaseEvent::Started(file.path.clone()));
                    report(PhaseEvent::Finished(read_guarded(brain, file, first_order + index)));
                }
            },

            #[cfg(feature = "rayon")]
            PhaseReader::Parallel(pool) => {
                let (sender, receiver) = flume::unbounded();

                for (index, file) in phase.into_iter().enumerate() {
                    let sender = sender.clone();
                    let brain = Arc::clone(brain);

                    pool.spawn_fifo(move || {
                        send_event(&sender, PhaseEvent::Started(file.path.clone()));
                        send_event(&sender, PhaseEvent::Finished(read_guarded(&brain, file, first_order + index)));
                    });
                }

                // ends when every task has dropped its sender
                drop(sender);

                for event in receiver.iter() {
                    report(event);
                }
            },
        }
    }
}

#[cfg(feature = "rayon")]
fn send_event(sender: &flume::Sender<PhaseEvent>, event: PhaseEvent) {
    if sender.send(event).is_err() {
        log::warn!("the loader stopped receiving before all files of the phase were read");
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use crate::math::Vec3;
    use crate::node::NodeAttributeFile;

    fn write_surface(directory: &Path) {
        let mut topology = TopologyFile::from_tiles(vec![[0, 1, 2]]);
        topology.set_topology_type(TopologyType::Closed);
        topology.write_file(directory.join("a.closed.topo")).unwrap();

        let mut open = TopologyFile::from_tiles(vec![[0, 1, 2]]);
        open.set_topology_type(TopologyType::Open);
        open.write_file(directory.join("a.open.topo")).unwrap();

        let mut flat = CoordinateFile::from_coordinates(vec![Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 0.0)]);
        flat.set_configuration(SurfaceConfiguration::Flat);
        flat.write_file(directory.join("a.flat.coord")).unwrap();

        let mut fiducial = CoordinateFile::from_coordinates(vec![Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 1.0)]);
        fiducial.set_configuration(SurfaceConfiguration::Fiducial);
        fiducial.write_file(directory.join("a.fiducial.coord")).unwrap();
    }

    fn spec_in(directory: &Path) -> SpecFile {
        let mut spec = SpecFile::new();
        spec.header_mut().set_file_name(directory.join("a.spec"));
        spec
    }

    #[test]
    fn phases_follow_dependencies(){
        let mut spec = SpecFile::new();
        spec.add_to_spec_file(tag::METRIC, "a.metric", "");
        spec.add_to_spec_file(tag::FOCI_PROJECTION, "a.fociproj", "");
        spec.add_to_spec_file(tag::FIDUCIAL_COORD, "a.coord", "");
        spec.add_to_spec_file(tag::CLOSED_TOPO, "a.closed.topo", "");
        spec.add_to_spec_file(tag::CUT_TOPO, "a.cut.topo", "");
        spec.add_to_spec_file(tag::VOLUME_FUNCTIONAL, "a.nii", "");
        spec.add_to_spec_file(tag::FIDUCIAL_SURFACE, "a.surf.gii", "");
        spec.add_to_spec_file(tag::SCENE, "a.scene", "");

        let names: Vec<Vec<String>> = load_order(&spec).iter()
            .map(|phase| phase.iter().map(|file| file.path.display().to_string()).collect())
            .collect();

        assert_eq!(names, vec![
            vec!["a.cut.topo".to_string()],
            vec!["a.closed.topo".to_string()],
            vec!["a.coord".to_string()],
            vec!["a.surf.gii".to_string()],
            vec!["a.nii".to_string()],
            vec!["a.fociproj".to_string(), "a.metric".to_string()],
        ]);
    }

    #[test]
    fn kinds_of_tags(){
        assert_eq!(DataFileKind::from_tag(tag::LOBAR_CUT_TOPO), DataFileKind::Topology);
        assert_eq!(DataFileKind::from_tag(tag::HULL_COORD), DataFileKind::Coordinate);
        assert_eq!(DataFileKind::from_tag(tag::VOLUME_BORDER), DataFileKind::Border);
        assert_eq!(DataFileKind::from_tag(tag::BORDER_PROJECTION), DataFileKind::BorderProjection);
        assert_eq!(DataFileKind::from_tag(tag::SURFACE_SHAPE), DataFileKind::SurfaceShape);
        assert_eq!(DataFileKind::from_tag(tag::VOLUME_ANATOMY), DataFileKind::External);

        assert!(DataFileKind::Metric.formats().can_write(FileFormat::Binary));
        assert!(!DataFileKind::Cocomac.formats().can_write(FileFormat::Xml));
        assert_eq!(DataFileKind::External.formats(), FormatMatrix::NONE);
    }

    #[test]
    fn errors_are_collected_and_loading_continues(){
        let directory = tempfile::tempdir().unwrap();
        write_surface(directory.path());

        let mut spec = spec_in(directory.path());
        spec.add_to_spec_file(tag::CLOSED_TOPO, "a.closed.topo", "");
        spec.add_to_spec_file(tag::OPEN_TOPO, "a.open.topo", "");
        spec.add_to_spec_file(tag::FLAT_COORD, "a.flat.coord", "");
        spec.add_to_spec_file(tag::FIDUCIAL_COORD, "a.fiducial.coord", "");
        spec.add_to_spec_file(tag::PAINT, "missing.paint", "");
        spec.add_to_spec_file(tag::VOLUME_ANATOMY, "anatomy.hdr", "anatomy.img");

        let mut reported = Vec::new();
        let mut errors = Vec::new();

        let brain = read_data_files(
            LoaderOptions::default(), &spec,
            |progress| reported.push((progress.started, progress.total)),
            &mut errors
        );

        assert_eq!(reported.len(), 6);
        assert_eq!(reported.last(), Some(&(6, 6)));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|error| error.kind() == ErrorKind::FileNotFound));

        assert_eq!(brain.number_of_files(), 4);
        assert_eq!(brain.selected_topology(), Some(directory.path().join("a.closed.topo")));

        let files = brain.files();
        let configurations: Vec<_> = files.iter()
            .filter_map(|entry| match &entry.file {
                LoadedFile::Coordinate(coordinates) => Some(coordinates.configuration()),
                _ => None,
            })
            .collect();

        assert_eq!(configurations, vec![SurfaceConfiguration::Fiducial, SurfaceConfiguration::Flat]);
    }

    #[test]
    fn corrupt_counts_become_errors(){
        let directory = tempfile::tempdir().unwrap();
        write_surface(directory.path());

        let mut sections = SectionFile::new();
        sections.set_number_of_nodes_and_columns(3, 1);
        sections.write_file(directory.path().join("a.section")).unwrap();

        let path = directory.path().join("a.section");
        let contents = std::fs::read_to_string(&path).unwrap()
            .replace("tag-number-of-nodes 3", "tag-number-of-nodes 4611686018427387904");
        std::fs::write(&path, contents).unwrap();

        let mut spec = spec_in(directory.path());
        spec.add_to_spec_file(tag::CLOSED_TOPO, "a.closed.topo", "");
        spec.add_to_spec_file(tag::FIDUCIAL_COORD, "a.fiducial.coord", "");
        spec.add_to_spec_file(tag::SECTION, "a.section", "");

        let mut errors = Vec::new();
        let brain = read_data_files(LoaderOptions::default(), &spec, |_| {}, &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::FormatInvalid);
        assert_eq!(brain.number_of_files(), 2);
    }

    #[test]
    fn progress_is_reported_before_each_file(){
        let directory = tempfile::tempdir().unwrap();
        write_surface(directory.path());

        let mut spec = spec_in(directory.path());
        spec.add_to_spec_file(tag::FIDUCIAL_COORD, "a.fiducial.coord", "");
        spec.add_to_spec_file(tag::CLOSED_TOPO, "a.closed.topo", "");
        spec.add_to_spec_file(tag::PAINT, "missing.paint", "");

        let mut started = Vec::new();
        let mut errors = Vec::new();

        read_data_files(LoaderOptions::sequential(), &spec, |progress| {
            started.push((progress.started, progress.path.file_name().unwrap().to_string_lossy().into_owned()));
        }, &mut errors);

        assert_eq!(started, vec![
            (1, "a.closed.topo".to_string()),
            (2, "a.fiducial.coord".to_string()),
            (3, "missing.paint".to_string()),
        ]);

        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn volume_data_files_must_exist(){
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("anatomy.hdr"), b"header").unwrap();

        let mut spec = spec_in(directory.path());
        spec.add_to_spec_file(tag::VOLUME_ANATOMY, "anatomy.hdr", "anatomy.img");

        let mut errors = Vec::new();
        let brain = read_data_files(LoaderOptions::sequential(), &spec, |_| {}, &mut errors);
        assert_eq!(brain.number_of_files(), 0);
        assert_eq!(errors[0].kind(), ErrorKind::DependencyMissing);

        std::fs::write(directory.path().join("anatomy.img.gz"), b"data").unwrap();
        errors.clear();

        let brain = read_data_files(LoaderOptions::sequential(), &spec, |_| {}, &mut errors);
        assert!(errors.is_empty());
        assert!(matches!(brain.files()[0].file, LoadedFile::External(_)));
    }

    #[test]
    fn clearing_restarts_unique_ids(){
        let directory = tempfile::tempdir().unwrap();

        let mut paint = PaintFile::default();
        paint.set_number_of_nodes_and_columns(3, 1);
        paint.write_file(directory.path().join("a.paint")).unwrap();

        let mut spec = spec_in(directory.path());
        spec.add_to_spec_file(tag::PAINT, "a.paint", "");

        let mut errors = Vec::new();
        let brain = read_data_files(LoaderOptions::default(), &spec, |_| {}, &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(brain.files()[0].file.kind(), DataFileKind::Paint);

        assert_eq!(brain.id_source().next_id(), 1);
        assert_eq!(brain.id_source().next_id(), 2);
        brain.clear();
        assert_eq!(brain.number_of_files(), 0);
        assert_eq!(brain.id_source().next_id(), 1);
    }
}
