
//! Projection of points onto the triangles of a surface.
//!
//! A projection stores the triangle and three barycentric areas. The areas use
//! the rotated order of [`crate::math::unproject`], so that unprojecting them
//! with the coordinates of the same nodes yields the projected point.

use crate::border::{Border, BorderProjection, BorderProjectionLink};
use crate::cell::{CellFile, CellKind, CellProjection, CellProjectionFile, ProjectionRecord};
use crate::error::{Error, Result};
use crate::math::{Vec3, closest_weights_on_triangle, triangle_area};
use crate::meta::Structure;
use crate::surface::{CoordinateFile, TopologyFile};


/// The nearest point of a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {

    /// Index of the triangle in the topology.
    pub tile: usize,

    /// The nodes of the triangle in topology order.
    pub nodes: [i32; 3],

    /// Unnormalized barycentric areas. Projections onto an edge have two,
    /// projections onto a vertex have one area that is not zero.
    pub areas: [f32; 3],

    /// Distance from the point to the surface.
    pub distance: f32,

    /// The projected point.
    pub position: Vec3,
}

/// Which cells are projected onto a surface of one hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellProjectionMode {

    /// Project every cell.
    #[default]
    All,

    /// Only project cells of the hemisphere of the surface.
    HemisphereOnly,

    /// Mirror cells of the other hemisphere before projecting them.
    FlipToMatch,
}


/// Projects points onto a surface.
#[derive(Debug)]
pub struct SurfaceProjector<'s> {
    coordinates: &'s CoordinateFile,
    topology: &'s TopologyFile,
}

impl<'s> SurfaceProjector<'s> {

    /// Fails if a triangle references a node without coordinates.
    pub fn new(coordinates: &'s CoordinateFile, topology: &'s TopologyFile) -> Result<Self> {
        let count = coordinates.number_of_coordinates();

        for tile in topology.tiles() {
            if let Some(&node) = tile.iter().find(|&&node| node < 0 || node as usize >= count) {
                return Err(Error::VertexOutOfRange { vertex: i64::from(node), count });
            }
        }

        Ok(SurfaceProjector { coordinates, topology })
    }

    fn corners(&self, tile: [i32; 3]) -> [Vec3; 3] {
        tile.map(|node| self.coordinates.coordinate(node as usize))
    }

    /// The nearest point of the nearest triangle. `None` if the surface has no triangles.
    pub fn project(&self, point: Vec3) -> Option<Projection> {
        let mut nearest: Option<(usize, [f32; 3], Vec3, f32)> = None;

        for (index, &tile) in self.topology.tiles().iter().enumerate() {
            let [a, b, c] = self.corners(tile);
            let weights = closest_weights_on_triangle(point, a, b, c);
            let position = a * weights[0] + b * weights[1] + c * weights[2];
            let distance = position.distance_squared(point);

            if nearest.map_or(true, |(_, _, _, best)| distance < best) {
                nearest = Some((index, weights, position, distance));
            }
        }

        let (tile, weights, position, distance) = nearest?;
        let nodes = self.topology.tile(tile);
        let [a, b, c] = self.corners(nodes);

        // degenerate triangles have no area to scale the weights with
        let area = triangle_area(a, b, c);
        let scale = if area > 0.0 { area } else { 1.0 };

        Some(Projection {
            tile, nodes, position,
            areas: [weights[2] * scale, weights[0] * scale, weights[1] * scale],
            distance: distance.sqrt(),
        })
    }

    /// Project every link of the border. Links are left out if the surface has no triangles.
    pub fn project_border(&self, border: &Border) -> BorderProjection {
        let mut projection = BorderProjection::new(border.attributes.clone());

        for link in border.links() {
            if let Some(projected) = self.project(link.position) {
                projection.add_border_projection_link(
                    BorderProjectionLink::new(link.section, projected.nodes, projected.areas, link.radius)
                );
            }
        }

        projection
    }

    /// Project a cell. Cells that cannot be projected get an unknown record.
    pub fn project_cell(&self, mut cell: crate::cell::Cell, hemisphere: Structure, mode: CellProjectionMode) -> CellProjection {
        if cell.structure == Structure::Invalid {
            cell.structure = Structure::from_x_coordinate(cell.position.0);
        }

        let other_hemisphere = matches!(hemisphere, Structure::Left | Structure::Right)
            && matches!(cell.structure, Structure::Left | Structure::Right)
            && cell.structure != hemisphere;

        if other_hemisphere {
            match mode {
                CellProjectionMode::All => {},
                CellProjectionMode::HemisphereOnly => return CellProjection::unprojected(cell),
                CellProjectionMode::FlipToMatch => {
                    cell.position.0 = -cell.position.0;
                    cell.structure = hemisphere;
                },
            }
        }

        let Some(projection) = self.project(cell.position) else {
            return CellProjection::unprojected(cell);
        };

        // cell projections list the nodes clockwise
        let [first, second, third] = projection.nodes;
        let [area_first, area_second, area_third] = projection.areas;

        let record = ProjectionRecord::Inside {
            nodes: [third, second, first],
            areas: [area_second, area_first, area_third],
            distance: cell.position - projection.position,
        };

        CellProjection { cell, record }
    }

    /// Project all cells of the file onto a surface of the hemisphere.
    pub fn project_cells<K: CellKind>(&self, cells: &CellFile<K>, hemisphere: Structure, mode: CellProjectionMode) -> CellProjectionFile<K> {
        let mut file = CellProjectionFile::new();

        for cell in cells.cells() {
            file.add_cell_projection(self.project_cell(cell.clone(), hemisphere, mode));
        }

        for study in cells.studies() {
            file.add_study_info(study.clone());
        }

        let projected = file.cell_projections().iter()
            .filter(|projection| projection.record != ProjectionRecord::Unknown)
            .count();

        log::debug!("projected {} of {} cells", projected, cells.number_of_cells());
        file
    }
}

/// The nearest point of the surface to the point.
pub fn project(coordinates: &CoordinateFile, topology: &TopologyFile, point: Vec3) -> Result<Option<Projection>> {
    Ok(SurfaceProjector::new(coordinates, topology)?.project(point))
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::border::BorderAttributes;
    use crate::cell::{Cell, FociFile};
    use crate::error::ErrorKind;
    use crate::math::unproject;

    fn square() -> (CoordinateFile, TopologyFile) {
        let coordinates = CoordinateFile::from_coordinates(vec![
            Vec3(0.0, 0.0, 0.0), Vec3(2.0, 0.0, 0.0), Vec3(2.0, 2.0, 0.0), Vec3(0.0, 2.0, 0.0),
        ]);

        let mut topology = TopologyFile::from_tiles(vec![[0, 1, 2], [0, 2, 3]]);
        topology.set_number_of_nodes(4);
        (coordinates, topology)
    }

    fn corners(coordinates: &CoordinateFile, nodes: [i32; 3]) -> [Vec3; 3] {
        nodes.map(|node| coordinates.coordinate(node as usize))
    }

    #[test]
    fn unprojection_reproduces_the_point(){
        let (coordinates, topology) = square();
        let point = Vec3(1.5, 0.5, 0.0);

        let projection = project(&coordinates, &topology, point).unwrap().unwrap();
        assert_eq!(projection.tile, 0);
        assert!(projection.distance < 1e-6);

        let unprojected = unproject(corners(&coordinates, projection.nodes), projection.areas).unwrap();
        assert!(unprojected.distance(point) < 1e-5);
    }

    #[test]
    fn points_above_the_surface(){
        let (coordinates, topology) = square();
        let projection = project(&coordinates, &topology, Vec3(0.5, 1.5, 3.0)).unwrap().unwrap();
        assert_eq!(projection.tile, 1);
        assert!((projection.distance - 3.0).abs() < 1e-5);
        assert!(projection.position.distance(Vec3(0.5, 1.5, 0.0)) < 1e-5);
    }

    #[test]
    fn edges_and_vertices_are_degenerate(){
        let (coordinates, topology) = square();

        let edge = project(&coordinates, &topology, Vec3(1.0, -1.0, 0.0)).unwrap().unwrap();
        assert_eq!(edge.areas.iter().filter(|&&area| area != 0.0).count(), 2);
        let position = unproject(corners(&coordinates, edge.nodes), edge.areas).unwrap();
        assert!(position.distance(Vec3(1.0, 0.0, 0.0)) < 1e-5);

        let vertex = project(&coordinates, &topology, Vec3(3.0, -1.0, 0.0)).unwrap().unwrap();
        assert_eq!(vertex.areas.iter().filter(|&&area| area != 0.0).count(), 1);
        let position = unproject(corners(&coordinates, vertex.nodes), vertex.areas).unwrap();
        assert!(position.distance(Vec3(2.0, 0.0, 0.0)) < 1e-5);
    }

    #[test]
    fn nodes_must_have_coordinates(){
        let (coordinates, _) = square();
        let topology = TopologyFile::from_tiles(vec![[0, 1, 7]]);
        let error = SurfaceProjector::new(&coordinates, &topology).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::VertexOutOfRange);
    }

    #[test]
    fn empty_surfaces_project_nothing(){
        let coordinates = CoordinateFile::new();
        let topology = TopologyFile::new();
        assert_eq!(project(&coordinates, &topology, Vec3(1.0, 1.0, 1.0)).unwrap(), None);
    }

    #[test]
    fn cells_unproject_onto_their_fiducial_position(){
        let (coordinates, topology) = square();
        let projector = SurfaceProjector::new(&coordinates, &topology).unwrap();

        let mut foci = FociFile::new();
        foci.add_cell(Cell::new("inside", Vec3(1.5, 0.5, 0.0)));
        foci.add_cell(Cell::new("above", Vec3(0.5, 1.5, 1.0)));

        let projections = projector.project_cells(&foci, Structure::Right, CellProjectionMode::All);
        assert_eq!(projections.number_of_cell_projections(), 2);

        for (projection, cell) in projections.cell_projections().iter().zip(foci.cells()) {
            assert!(matches!(projection.record, ProjectionRecord::Inside { .. }));

            let position = projection.projected_position(&coordinates, &topology, true, false, false)
                .unwrap().unwrap();

            assert!(position.distance(cell.position) < 1e-5, "{} moved to {:?}", cell.name, position);
        }
    }

    #[test]
    fn hemisphere_modes(){
        let (coordinates, topology) = square();
        let projector = SurfaceProjector::new(&coordinates, &topology).unwrap();
        let left = Cell::new("left", Vec3(-1.0, 1.0, 0.0));
        assert_eq!(left.structure, Structure::Left);

        let skipped = projector.project_cell(left.clone(), Structure::Right, CellProjectionMode::HemisphereOnly);
        assert_eq!(skipped.record, ProjectionRecord::Unknown);

        let flipped = projector.project_cell(left.clone(), Structure::Right, CellProjectionMode::FlipToMatch);
        assert_eq!(flipped.cell.position, Vec3(1.0, 1.0, 0.0));
        assert_eq!(flipped.cell.structure, Structure::Right);

        let all = projector.project_cell(left, Structure::Right, CellProjectionMode::All);
        assert_eq!(all.cell.position, Vec3(-1.0, 1.0, 0.0));
        assert!(matches!(all.record, ProjectionRecord::Inside { .. }));
    }

    #[test]
    fn border_links_project_onto_the_surface(){
        let (coordinates, topology) = square();
        let projector = SurfaceProjector::new(&coordinates, &topology).unwrap();

        let mut border = Border::new(BorderAttributes::named("sulcus"));
        border.add_border_link(Vec3(0.5, 0.25, 0.0), 0, 1.0);
        border.add_border_link(Vec3(1.75, 1.5, 0.0), 0, 1.0);

        let projection = projector.project_border(&border);
        assert_eq!(projection.number_of_links(), 2);
        assert_eq!(projection.name(), "sulcus");

        for (index, link) in border.links().iter().enumerate() {
            let position = projection.link(index).unproject(&coordinates).unwrap().unwrap();
            assert!(position.distance(link.position) < 1e-5);
        }
    }
}
