extern crate caret_files;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use caret_files::prelude::*;
use caret_files::spec::tag;
use caret_files::spec::utilities::{copy_spec_file, CopyMode};
use caret_files::node::metric::MetricFile;
use caret_files::surface::{CoordinateFile, SurfaceConfiguration, TopologyFile, TopologyType};

/// a subject with its surface in a sub directory, and an analyze volume next to the spec file.
fn write_subject(directory: &Path) -> std::path::PathBuf {
    let surface = directory.join("surface");
    fs::create_dir(&surface).unwrap();

    let mut topology = TopologyFile::from_tiles(vec![[0, 1, 2], [0, 2, 3]]);
    topology.set_topology_type(TopologyType::Closed);
    topology.write_file(surface.join("subject.closed.topo")).unwrap();

    let mut coordinates = CoordinateFile::from_coordinates(vec![
        Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(1.0, 1.0, 0.0), Vec3(0.0, 1.0, 0.0),
    ]);

    coordinates.set_configuration(SurfaceConfiguration::Fiducial);
    coordinates.write_file(surface.join("subject.fiducial.coord")).unwrap();

    let mut metric = MetricFile::new();
    metric.set_number_of_nodes_and_columns(4, 1);
    metric.write_file(directory.join("subject.metric")).unwrap();

    fs::write(directory.join("anatomy.hdr"), b"header").unwrap();
    fs::write(directory.join("anatomy.img"), b"voxels").unwrap();
    fs::write(directory.join("subject.scene"), b"scene").unwrap();

    let spec_path = directory.join("subject.spec");
    let mut spec = SpecFile::new();
    spec.header_mut().set_file_name(&spec_path);
    spec.set_species("Human");

    assert!(spec.add_to_spec_file(tag::CLOSED_TOPO, "surface/subject.closed.topo", ""));
    assert!(spec.add_to_spec_file(tag::FIDUCIAL_COORD, "surface/subject.fiducial.coord", ""));
    assert!(spec.add_to_spec_file(tag::METRIC, "subject.metric", ""));
    assert!(spec.add_to_spec_file(tag::VOLUME_ANATOMY, "anatomy.hdr", ""));
    assert!(spec.add_to_spec_file(tag::SCENE, "subject.scene", ""));

    spec.write_file(&spec_path).unwrap();
    spec_path
}

fn files_in(directory: &Path) -> BTreeSet<String> {
    walkdir::WalkDir::new(directory).into_iter()
        .map(std::result::Result::unwrap)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().strip_prefix(directory).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}

#[test]
fn copy_all_flattens_the_tree() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let spec_path = write_subject(source.path());

    let report = copy_spec_file(&spec_path, target.path(), CopyMode::CopyAll).unwrap();
    assert!(report.is_ok(), "{}", report.message());

    let expected: BTreeSet<String> = [
        "subject.spec", "subject.closed.topo", "subject.fiducial.coord",
        "subject.metric", "anatomy.hdr", "anatomy.img", "subject.scene",
    ].iter().map(|name| name.to_string()).collect();

    assert_eq!(files_in(target.path()), expected);

    // the source is left as it was
    assert!(files_in(source.path()).contains("surface/subject.closed.topo"));

    let copy = SpecFile::from_file(target.path().join("subject.spec")).unwrap();
    assert_eq!(copy.species(), "Human");
    assert!(copy.validate().is_ok());
    assert_eq!(copy.entry(tag::CLOSED_TOPO).unwrap().files()[0].filename, "subject.closed.topo");
    assert_eq!(copy.entry(tag::VOLUME_ANATOMY).unwrap().files()[0].data_file_name, "anatomy.img");
}

#[test]
fn copied_subject_loads_completely() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let spec_path = write_subject(source.path());

    copy_spec_file(&spec_path, target.path(), CopyMode::CopyAll).unwrap();
    let copy = SpecFile::from_file(target.path().join("subject.spec")).unwrap();

    let mut progress = 0;
    let mut errors = Vec::new();
    let brain = read_data_files(LoaderOptions::default(), &copy, |_| progress += 1, &mut errors);

    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(progress, 4);
    assert_eq!(brain.number_of_files(), 4);
    assert_eq!(brain.selected_topology(), Some(target.path().join("subject.closed.topo")));

    let files = brain.files();
    let kinds: Vec<DataFileKind> = files.iter().map(|entry| entry.file.kind()).collect();

    assert_eq!(kinds, vec![
        DataFileKind::Coordinate, DataFileKind::Topology,
        DataFileKind::External, DataFileKind::Metric,
    ]);
}

#[test]
fn move_all_empties_the_source() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    let spec_path = write_subject(source.path());

    let report = copy_spec_file(&spec_path, target.path(), CopyMode::MoveAll).unwrap();
    assert!(report.is_ok(), "{}", report.message());

    // scenes are copied, never moved
    assert_eq!(files_in(source.path()), ["subject.scene".to_string()].into_iter().collect());
    assert_eq!(files_in(target.path()).len(), 7);
}
