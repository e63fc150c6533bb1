
//! Cells and foci stored relative to the triangles of a surface.

use std::io::Write;
use std::marker::PhantomData;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Fixed, TextReader, parse, parse_token, split_tag_line, tokens};
use crate::math::{Vec3, solve_3x3, triangle_normal, unproject};
use crate::meta::{CommentMode, FileFormat, FormatMatrix, Structure};
use crate::meta::header::FileHeader;
use crate::node::tag::{BEGIN_DATA, VERSION};
use crate::surface::{CoordinateFile, TopologyFile};
use super::{
    Cell, CellFile, CellKind, CellStudyInfo, Cells, DisplayFilter, Foci, NO_CLASS, StudyInfoReader,
    apply_display_filter, tag, unlink_study, write_study_info_tags,
};


const INSIDE: &str = "INSIDE";
const OUTSIDE: &str = "OUTSIDE";
const UNKNOWN: &str = "UNKNOWN";


/// Where a cell lies relative to the surface it was projected to.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionRecord {

    /// The cell projects into a triangle. The nodes are listed clockwise.
    Inside {
        nodes: [i32; 3],
        areas: [f32; 3],

        /// The offset from the projected point to the cell.
        distance: Vec3,
    },

    /// The cell projects beyond the edge shared by two triangles.
    Outside(Box<OutsideTriangle>),

    /// The cell was not projected.
    Unknown,
}

/// The edge projection of a cell that lies outside of the surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutsideTriangle {
    pub fraction_ri: f32,
    pub fraction_rj: f32,
    pub distance_r: f32,
    pub theta_r: f32,
    pub phi_r: f32,

    /// The fiducial corners of the two triangles sharing the edge.
    pub triangle_positions: [[Vec3; 3]; 2],
    pub triangle_nodes: [[i32; 3]; 2],

    /// The fiducial positions and nodes of the shared edge.
    pub edge_positions: [Vec3; 2],
    pub edge_nodes: [i32; 2],

    pub fiducial_position: Vec3,
}

impl OutsideTriangle {

    /// The cell position projected into the plane of the first triangle.
    fn projection_point(&self) -> Option<Vec3> {
        let [a, b, c] = self.triangle_positions[0];
        let v = b - a;
        let w = b - c;
        let normal = w.cross(v);

        solve_3x3(
            [v, w, normal],
            Vec3(v.dot(self.fiducial_position), w.dot(self.fiducial_position), normal.dot(c)),
        )
    }
}


/// The outward normal of a tile whose nodes are stored clockwise.
pub(crate) fn clockwise_tile_normal(first: Vec3, second: Vec3, third: Vec3) -> Vec3 {
    triangle_normal(third, second, first)
}

fn node_is_connected(topology: &TopologyFile, node: i32) -> bool {
    topology.tiles_with_node(node).next().is_some()
}


/// A cell and its projection.
#[derive(Debug, Clone, PartialEq)]
pub struct CellProjection {
    pub cell: Cell,
    pub record: ProjectionRecord,
}

impl CellProjection {

    /// A cell that is not projected yet.
    pub fn unprojected(cell: Cell) -> Self {
        CellProjection { cell, record: ProjectionRecord::Unknown }
    }

    pub fn name(&self) -> &str { &self.cell.name }

    /// The position of the cell on the surface with these coordinates.
    ///
    /// Cells without projection only have a position on the fiducial surface.
    /// On a flat surface, cells that are pasted onto the surface are lifted above it instead.
    pub fn projected_position(
        &self, coordinates: &CoordinateFile, topology: &TopologyFile,
        fiducial_surface: bool, flat_surface: bool, paste_onto_surface: bool,
    ) -> Result<Option<Vec3>> {
        let paste = paste_onto_surface && !flat_surface;

        let position = match &self.record {
            ProjectionRecord::Inside { nodes, areas, distance } =>
                self.unproject_inside(coordinates, topology, *nodes, *areas, *distance, paste)?,

            ProjectionRecord::Outside(outside) =>
                unproject_outside(outside, coordinates, topology, paste)?,

            ProjectionRecord::Unknown => {
                let position = self.cell.position;
                if fiducial_surface && position != Vec3::ZERO { Some(position) } else { None }
            },
        };

        Ok(position.map(|Vec3(x, y, z)| {
            if flat_surface && paste_onto_surface { Vec3(x, y, 1.0) } else { Vec3(x, y, z) }
        }))
    }

    fn unproject_inside(
        &self, coordinates: &CoordinateFile, topology: &TopologyFile,
        nodes: [i32; 3], areas: [f32; 3], distance: Vec3, paste: bool,
    ) -> Result<Option<Vec3>> {
        let corners = [
            coordinates.checked_coordinate(nodes[0])?,
            coordinates.checked_coordinate(nodes[1])?,
            coordinates.checked_coordinate(nodes[2])?,
        ];

        if !nodes.iter().all(|&node| node_is_connected(topology, node)) {
            return Ok(None);
        }

        let projection = unproject(corners, areas).unwrap_or(Vec3::ZERO);
        if paste { return Ok(Some(projection)); }

        let signed_distance = self.cell.signed_distance_above_surface;
        if signed_distance == 0.0 { return Ok(Some(projection + distance)); }

        let normal = if nodes[0] == nodes[1] && nodes[1] == nodes[2] {
            // a single node uses the average normal of its tiles
            let mut sum = Vec3::ZERO;
            for tile in topology.tiles_with_node(nodes[0]) {
                let [a, b, c] = topology.tile(tile);
                sum = sum + triangle_normal(
                    coordinates.checked_coordinate(a)?,
                    coordinates.checked_coordinate(b)?,
                    coordinates.checked_coordinate(c)?,
                );
            }

            sum.normalized()
        }
        else {
            clockwise_tile_normal(corners[0], corners[1], corners[2])
        };

        Ok(Some(projection + normal * signed_distance))
    }

    /// Parse a projection of a version 2 or 3 file.
    fn read_text(text: &mut TextReader<'_>) -> Result<Self> {
        let line = text.read_non_empty_line()?;
        let values = tokens(&line);
        if values.len() < 6 {
            return Err(Error::invalid(format!("Reading cell projection 1st line {}", line)));
        }

        let mut cell = Cell {
            section: parse_token(&values, 1, "section")?,
            name: values[2].to_string(),
            class_name: if values[3] == NO_CLASS { String::new() } else { values[3].to_string() },
            study_number: parse_token(&values, 5, "study number")?,
            structure: values.get(6).map_or(Structure::Invalid, |name| Structure::from_name(name)),
            ..Cell::default()
        };

        if values.len() > 7 {
            cell.signed_distance_above_surface = parse_token(&values, 7, "signed distance")?;
        }

        let record = match values[4] {
            INSIDE => {
                let line = text.read_non_empty_line()?;
                let values = tokens(&line);
                if values.len() < 9 {
                    return Err(Error::invalid(format!("Reading CellProjection INSIDE line {}", line)));
                }

                ProjectionRecord::Inside {
                    nodes: read_array(&values, 0, "tile node")?,
                    areas: read_array(&values, 3, "tile area")?,
                    distance: Vec3::from(read_array::<f32, 3>(&values, 6, "distance")?),
                }
            },

            OUTSIDE => {
                let mut outside = OutsideTriangle::default();

                let line = text.read_non_empty_line()?;
                let [ri, rj, dr, theta, phi] = read_array(&tokens(&line), 0, "outside projection")?;
                outside.fraction_ri = ri;
                outside.fraction_rj = rj;
                outside.distance_r = dr;
                outside.theta_r = theta;
                outside.phi_r = phi;

                let line = text.read_non_empty_line()?;
                let positions: [f32; 18] = read_array(&tokens(&line), 0, "triangle position")?;
                for (index, xyz) in positions.chunks_exact(3).enumerate() {
                    outside.triangle_positions[index / 3][index % 3] = Vec3(xyz[0], xyz[1], xyz[2]);
                }

                let line = text.read_non_empty_line()?;
                let nodes: [i32; 6] = read_array(&tokens(&line), 0, "triangle node")?;
                outside.triangle_nodes = [[nodes[0], nodes[1], nodes[2]], [nodes[3], nodes[4], nodes[5]]];

                let line = text.read_non_empty_line()?;
                let edge: [f32; 6] = read_array(&tokens(&line), 0, "edge position")?;
                outside.edge_positions = [Vec3(edge[0], edge[1], edge[2]), Vec3(edge[3], edge[4], edge[5])];

                let line = text.read_non_empty_line()?;
                let values = tokens(&line);
                outside.edge_nodes = read_array(&values, 0, "edge node")?;
                outside.fiducial_position = Vec3::from(read_array::<f32, 3>(&values, 2, "fiducial position")?);

                cell.position = outside.fiducial_position;
                ProjectionRecord::Outside(Box::new(outside))
            },

            UNKNOWN => ProjectionRecord::Unknown,
            other => return Err(Error::invalid(format!("invalid projection type {}", other))),
        };

        if cell.structure == Structure::Invalid && cell.position != Vec3::ZERO {
            cell.structure = Structure::from_x_coordinate(cell.position.0);
        }

        Ok(CellProjection { cell, record })
    }

    fn write_text(&self, write: &mut Vec<u8>, index: usize) -> UnitResult {
        let cell = &self.cell;
        let class_name = if cell.class_name.is_empty() { NO_CLASS } else { &cell.class_name };
        let kind = match self.record {
            ProjectionRecord::Inside { .. } => INSIDE,
            ProjectionRecord::Outside(_) => OUTSIDE,
            ProjectionRecord::Unknown => UNKNOWN,
        };

        writeln!(
            write, "{} {} {} {} {} {} {} {}", index, cell.section, cell.name, class_name, kind,
            cell.study_number, cell.structure.name().to_ascii_uppercase(), Fixed(cell.signed_distance_above_surface)
        )?;

        match &self.record {
            ProjectionRecord::Inside { nodes, areas, distance } => {
                write_values(write, nodes.iter())?;
                write!(write, " ")?;
                write_values(write, areas.iter().chain(&distance.to_array()).map(|&value| Fixed(value)))?;
                writeln!(write)?;
            },

            ProjectionRecord::Outside(outside) => {
                let scalars = [outside.fraction_ri, outside.fraction_rj, outside.distance_r, outside.theta_r, outside.phi_r];
                write_values(write, scalars.iter().map(|&value| Fixed(value)))?;
                writeln!(write)?;

                let positions = outside.triangle_positions.iter().flatten().flat_map(|position| position.to_array());
                write_values(write, positions.map(Fixed))?;
                writeln!(write)?;

                write_values(write, outside.triangle_nodes.iter().flatten())?;
                writeln!(write)?;

                write_values(write, outside.edge_positions.iter().flat_map(|position| position.to_array()).map(Fixed))?;
                writeln!(write)?;

                let [first, second] = outside.edge_nodes;
                let Vec3(x, y, z) = outside.fiducial_position;
                writeln!(write, "{} {} {} {} {}", first, second, Fixed(x), Fixed(y), Fixed(z))?;
            },

            ProjectionRecord::Unknown => {},
        }

        Ok(())
    }
}

fn unproject_outside(
    outside: &OutsideTriangle, coordinates: &CoordinateFile, topology: &TopologyFile, paste: bool,
) -> Result<Option<Vec3>> {
    let [first_node, second_node] = outside.edge_nodes;
    if !node_is_connected(topology, first_node) || !node_is_connected(topology, second_node) {
        return Ok(None);
    }

    let [edge_start, edge_end] = outside.edge_positions;
    let edge = edge_end - edge_start;
    let edge_length_squared = edge.dot(edge);
    if edge_length_squared == 0.0 { return Ok(None); }

    let closest_on_edge = edge_start + edge * ((outside.fiducial_position - edge_start).dot(edge) / edge_length_squared);

    let start = coordinates.checked_coordinate(first_node)?;
    let end = coordinates.checked_coordinate(second_node)?;
    if paste { return Ok(Some((start + end) / 2.0)); }

    let (ri, rj) = (outside.fraction_ri, outside.fraction_rj);
    let on_edge = {
        if ri <= 1.0 && rj <= 1.0 {
            start + (end - start) * ri
        }
        else if ri > 1.0 && ri > rj {
            let direction = end - start;
            end + direction * (closest_on_edge.distance(edge_end) / direction.length())
        }
        else if rj > 1.0 && rj > ri {
            let direction = start - end;
            start + direction * (closest_on_edge.distance(edge_start) / direction.length())
        }
        else {
            return Ok(None);
        }
    };

    let [first_tile, second_tile] = outside.triangle_nodes;
    if first_tile[0] < 0 || second_tile[0] < 0 { return Ok(None); }

    let tile_normal = |nodes: [i32; 3]| -> Result<Vec3> {
        Ok(triangle_normal(
            coordinates.checked_coordinate(nodes[0])?,
            coordinates.checked_coordinate(nodes[1])?,
            coordinates.checked_coordinate(nodes[2])?,
        ))
    };

    let normal_a = tile_normal(first_tile)?;
    let normal_b = tile_normal(second_tile)?;

    let phi = normal_a.dot(normal_b).min(1.0).acos();
    let theta = if outside.phi_r > 0.0 { (outside.theta_r / outside.phi_r) * phi } else { 0.5 * phi };

    let Some(projection) = outside.projection_point() else { return Ok(None) };

    let [a, b, c] = outside.triangle_positions[0];
    let fiducial_normal = triangle_normal(a, b, c);
    let across_edge = fiducial_normal.cross(edge.normalized());
    let side = (projection - closest_on_edge).normalized().dot(across_edge);

    let beside = on_edge + across_edge * (side * outside.distance_r * theta.sin());
    let height = fiducial_normal.dot((outside.fiducial_position - projection).normalized());

    Ok(Some(beside + normal_a * (outside.distance_r * height * theta.cos())))
}

fn read_array<T: std::str::FromStr + Copy + Default, const N: usize>(
    values: &[&str], start: usize, what: &'static str,
) -> Result<[T; N]> {
    let mut array = [T::default(); N];
    for (index, value) in array.iter_mut().enumerate() {
        *value = parse_token(values, start + index, what)?;
    }

    Ok(array)
}

fn write_values<T: std::fmt::Display>(write: &mut Vec<u8>, values: impl Iterator<Item = T>) -> UnitResult {
    for (index, value) in values.enumerate() {
        if index > 0 { write!(write, " ")?; }
        write!(write, "{}", value)?;
    }

    Ok(())
}


/// A list of cell projections, or foci projections, and the studies they were taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct CellProjectionFile<K: CellKind = Cells> {
    header: FileHeader,
    projections: Vec<CellProjection>,
    studies: Vec<CellStudyInfo>,
    kind: PhantomData<K>,
}

pub type FociProjectionFile = CellProjectionFile<Foci>;

impl<K: CellKind> Default for CellProjectionFile<K> {
    fn default() -> Self {
        CellProjectionFile {
            header: FileHeader::new(K::PROJECTION_DESCRIPTIVE_NAME, K::PROJECTION_EXTENSION, K::PROJECTION_ROOT_ELEMENT),
            projections: Vec::new(),
            studies: Vec::new(),
            kind: PhantomData,
        }
    }
}

impl<K: CellKind> CellProjectionFile<K> {
    pub fn new() -> Self { Self::default() }

    pub fn number_of_cell_projections(&self) -> usize { self.projections.len() }
    pub fn cell_projection(&self, index: usize) -> &CellProjection { &self.projections[index] }
    pub fn cell_projections(&self) -> &[CellProjection] { &self.projections }

    /// Access a projection for modification, marking the file as modified.
    pub fn cell_projection_mut(&mut self, index: usize) -> &mut CellProjection {
        self.header.set_modified();
        &mut self.projections[index]
    }

    pub fn add_cell_projection(&mut self, projection: CellProjection) {
        self.projections.push(projection);
        self.header.set_modified();
    }

    /// Add the cells of a fiducial cell file as not yet projected cells, including its studies.
    pub fn append_fiducial_cell_file(&mut self, cells: &CellFile<K>) {
        let study_offset = i32::try_from(self.studies.len()).unwrap_or(i32::MAX);

        for cell in cells.cells() {
            let mut cell = cell.clone();
            if cell.study_number >= 0 { cell.study_number += study_offset; }
            self.projections.push(CellProjection::unprojected(cell));
        }

        self.studies.extend_from_slice(cells.studies());
        self.header.set_modified();
    }

    /// The cells at their original, fiducial positions.
    pub fn cell_file_original_coordinates(&self) -> CellFile<K> {
        let mut file = CellFile::new();
        for projection in &self.projections {
            let mut cell = projection.cell.clone();
            if let ProjectionRecord::Outside(outside) = &projection.record {
                cell.position = outside.fiducial_position;
            }

            file.add_cell(cell);
        }

        for study in &self.studies { file.add_study_info(study.clone()); }
        file.header_mut().clear_modified();
        file
    }

    /// The cells unprojected onto the surface. Cells without a position on it are left out.
    pub fn cell_file(
        &self, coordinates: &CoordinateFile, topology: &TopologyFile, fiducial_surface: bool,
    ) -> Result<CellFile<K>> {
        let flat = coordinates.configuration().is_flat();
        let mut file = CellFile::new();

        for projection in &self.projections {
            if let Some(position) = projection.projected_position(coordinates, topology, fiducial_surface, flat, false)? {
                file.add_cell(Cell { position, ..projection.cell.clone() });
            }
        }

        for study in &self.studies { file.add_study_info(study.clone()); }
        file.header_mut().clear_modified();
        Ok(file)
    }

    pub fn first_cell_projection_with_name(&self, name: &str) -> Option<&CellProjection> {
        self.projections.iter().find(|projection| projection.name() == name)
    }

    pub fn last_cell_projection_with_name(&self, name: &str) -> Option<&CellProjection> {
        self.projections.iter().rev().find(|projection| projection.name() == name)
    }

    pub fn delete_cell_projection(&mut self, index: usize) {
        if index < self.projections.len() {
            self.projections.remove(index);
            self.header.set_modified();
        }
    }

    pub fn delete_cell_projections_with_name(&mut self, name: &str) {
        let before = self.projections.len();
        self.projections.retain(|projection| projection.name() != name);
        if before != self.projections.len() { self.header.set_modified(); }
    }

    /// Remove every projection that equals an earlier one in name and position.
    pub fn delete_all_duplicate_cell_projections(&mut self) {
        let before = self.projections.len();
        let mut kept: Vec<CellProjection> = Vec::with_capacity(before);
        for projection in self.projections.drain(..) {
            let duplicate = kept.iter().any(|earlier| {
                earlier.cell.name == projection.cell.name
                    && earlier.cell.position == projection.cell.position
                    && earlier.record == projection.record
            });

            if !duplicate { kept.push(projection); }
        }

        if kept.len() != before { self.header.set_modified(); }
        self.projections = kept;
    }

    /// Keep only the displayed projections, optionally only those of one structure.
    pub fn delete_all_non_displayed_cell_projections(&mut self, keep_structure: Option<Structure>) {
        self.projections.retain(|projection| {
            projection.cell.displayed && keep_structure.map_or(true, |structure| projection.cell.structure == structure)
        });

        self.header.set_modified();
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

    /// Remove the study. Cells linked to it are unlinked, links to later studies are renumbered.
    pub fn delete_study_info(&mut self, index: usize) {
        if index >= self.studies.len() { return; }

        self.studies.remove(index);
        let removed = i32::try_from(index).unwrap_or(i32::MAX);
        unlink_study(self.projections.iter_mut().map(|projection| &mut projection.cell), removed);
        self.header.set_modified();
    }

    /// Set the displayed flag of every cell. Returns the number of displayed cells.
    pub fn set_display_flags(&mut self, filter: &DisplayFilter) -> usize {
        apply_display_filter(self.projections.iter_mut().map(|projection| &mut projection.cell), &self.studies, filter)
    }

    /// Add the projections and studies of the other file.
    /// The study numbers of the added cells are shifted past the existing studies.
    pub fn append(&mut self, other: &CellProjectionFile<K>, comment_mode: CommentMode) {
        let study_offset = i32::try_from(self.studies.len()).unwrap_or(i32::MAX);

        self.projections.extend(other.projections.iter().cloned().map(|mut projection| {
            if projection.cell.study_number >= 0 { projection.cell.study_number += study_offset; }
            projection
        }));

        self.studies.extend_from_slice(&other.studies);
        self.header.append_file_comment(&other.header, comment_mode);
        self.header.set_modified();
    }
}

impl<K: CellKind> DataFile for CellProjectionFile<K> {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.projections.clear();
        self.studies.clear();
    }

    fn is_empty(&self) -> bool { self.projections.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("cell projections in {} format", format)));
        }

        let mut version = 0;
        let mut number_of_projections = 0_usize;
        let mut number_of_studies = 0_usize;

        loop {
            let line = text.read_non_empty_line()?;
            match split_tag_line(&line) {
                (VERSION, value) => version = parse(value, "cell projection file version")?,
                (tag::NUMBER_OF_CELL_PROJECTIONS, value) => number_of_projections = parse(value, "number of cell projections")?,
                (tag::NUMBER_OF_COMMENTS, value) => number_of_studies = parse(value, "number of comments")?,
                (BEGIN_DATA, _) => break,
                (other, _) if version == 0 && !other.starts_with("tag-") => break,
                (other, _) => log::warn!("unrecognized cell projection file tag {}", other),
            }
        }

        if !(2 ..= 3).contains(&version) {
            return Err(Error::invalid(format!(
                "cell projection file version {} is no longer supported, reproject the original cell file", version
            )));
        }

        for _ in 0 .. number_of_projections {
            self.projections.push(CellProjection::read_text(text)?);
        }

        let studies = if version == 2 { StudyInfoReader::read_titles(text, number_of_studies)? }
            else { StudyInfoReader::read_numbered_tags(text)? };

        for projection in &mut self.projections {
            projection.cell.study_number = studies.renumber(projection.cell.study_number);
        }

        self.studies = studies.studies;
        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("cell projections in {} format", format)));
        }

        writeln!(write, "{} 3", VERSION)?;
        writeln!(write, "{} {}", tag::NUMBER_OF_CELL_PROJECTIONS, self.projections.len())?;
        writeln!(write, "{} {}", tag::NUMBER_OF_COMMENTS, self.studies.len())?;
        writeln!(write, "{}", BEGIN_DATA)?;

        for (index, projection) in self.projections.iter().enumerate() {
            projection.write_text(write, index)?;
        }

        write_study_info_tags(write, &self.studies)
    }
}

impl<K: CellKind> CompareForTesting for CellProjectionFile<K> {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_cell_projections() != other.number_of_cell_projections() {
            return Err("Files have a different number of cell projections.".to_string());
        }

        let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(a, b)| (a - b).abs() <= tolerance);

        for (index, (mine, theirs)) in self.projections.iter().zip(&other.projections).enumerate() {
            if mine.cell.name != theirs.cell.name {
                return Err(format!("Cell projection {} names do not match {} and {}", index, mine.cell.name, theirs.cell.name));
            }

            let matches = match (&mine.record, &theirs.record) {
                (ProjectionRecord::Inside { nodes: a, areas: a_areas, distance: a_distance },
                 ProjectionRecord::Inside { nodes: b, areas: b_areas, distance: b_distance }) =>
                    a == b && close(a_areas, b_areas) && close(&a_distance.to_array(), &b_distance.to_array()),

                (ProjectionRecord::Outside(a), ProjectionRecord::Outside(b)) =>
                    a.triangle_nodes == b.triangle_nodes && a.edge_nodes == b.edge_nodes
                        && close(&a.fiducial_position.to_array(), &b.fiducial_position.to_array()),

                (ProjectionRecord::Unknown, ProjectionRecord::Unknown) => true,
                _ => false,
            };

            if !matches {
                return Err(format!("Cell projection {} has a different projection", index));
            }
        }

        Ok(())
    }
}
