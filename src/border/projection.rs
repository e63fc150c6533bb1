
//! Border projections and the `.borderproj` file.

use std::io::Write;
use std::sync::Arc;
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Fixed, TextReader, parse, parse_token, tokens};
use crate::math::{Extent, Vec3, unproject};
use crate::meta::{CommentMode, FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use crate::surface::CoordinateFile;
use super::{Border, BorderAttributes, UniqueIdSource, center_of_gravity, link_positions};


/// One link of a border, as barycentric areas within a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderProjectionLink {
    pub section: i32,
    pub nodes: [i32; 3],
    pub areas: [f32; 3],
    pub radius: f32,
}

impl BorderProjectionLink {
    pub fn new(section: i32, nodes: [i32; 3], areas: [f32; 3], radius: f32) -> Self {
        BorderProjectionLink { section, nodes, areas, radius }
    }

    /// A link placed exactly on a node.
    pub fn on_node(node: i32) -> Self {
        BorderProjectionLink { section: 0, nodes: [node; 3], areas: [1.0, 0.0, 0.0], radius: 0.0 }
    }

    /// Same nodes and exactly the same areas. Section and radius are ignored.
    pub fn is_duplicate_of(&self, other: &BorderProjectionLink) -> bool {
        self.nodes == other.nodes && self.areas == other.areas
    }

    /// The position of the link on the surface with these coordinates.
    /// `None` if the areas do not sum up to a positive value.
    pub fn unproject(&self, coordinates: &CoordinateFile) -> Result<Option<Vec3>> {
        let corners = [
            coordinates.checked_coordinate(self.nodes[0])?,
            coordinates.checked_coordinate(self.nodes[1])?,
            coordinates.checked_coordinate(self.nodes[2])?,
        ];

        Ok(unproject(corners, self.areas))
    }
}


/// A border whose links are stored relative to the triangles of a surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderProjection {
    pub attributes: BorderAttributes,
    links: Vec<BorderProjectionLink>,
}

impl BorderProjection {
    pub fn new(attributes: BorderAttributes) -> Self {
        BorderProjection { attributes, links: Vec::new() }
    }

    pub fn name(&self) -> &str { &self.attributes.name }
    pub fn unique_id(&self) -> i32 { self.attributes.unique_id }

    pub fn number_of_links(&self) -> usize { self.links.len() }
    pub fn link(&self, index: usize) -> &BorderProjectionLink { &self.links[index] }
    pub fn links(&self) -> &[BorderProjectionLink] { &self.links }

    /// Append the link if at least one of its nodes is valid.
    /// Returns whether the link was added.
    pub fn add_border_projection_link(&mut self, link: BorderProjectionLink) -> bool {
        if !link.nodes.iter().any(|&node| node >= 0) { return false; }
        self.links.push(link);
        true
    }

    /// Insert a link before the index, or append it if the index is past the end.
    pub fn insert_border_projection_link(&mut self, index: usize, link: BorderProjectionLink) -> bool {
        if index >= self.links.len() { return self.add_border_projection_link(link); }
        if !link.nodes.iter().any(|&node| node >= 0) { return false; }
        self.links.insert(index, link);
        true
    }

    pub fn remove_border_projection_link(&mut self, index: usize) -> bool {
        if index >= self.links.len() { return false; }
        self.links.remove(index);
        true
    }

    pub fn remove_last_border_projection_link(&mut self) -> bool {
        self.links.pop().is_some()
    }

    /// Remove every link that duplicates an earlier link.
    pub fn remove_duplicate_border_projection_links(&mut self) -> bool {
        let mask: Vec<bool> = (0 .. self.links.len())
            .map(|later| !self.links[.. later].iter().any(|earlier| earlier.is_duplicate_of(&self.links[later])))
            .collect();

        link_positions::retain_masked(&mut self.links, &mask)
    }

    pub fn reverse(&mut self) { self.links.reverse(); }

    /// Add the links of the other projection after the links of this one.
    pub fn append(&mut self, other: &BorderProjection) {
        self.links.extend_from_slice(&other.links);
    }

    /// Same name and links with the same nodes and areas.
    pub fn is_duplicate_of(&self, other: &BorderProjection) -> bool {
        self.name() == other.name()
            && self.links.len() == other.links.len()
            && self.links.iter().zip(&other.links).all(|(a, b)| a.is_duplicate_of(b))
    }

    /// The links from `start` to `end`, both included, as a new projection with the same attributes.
    pub fn sub_set(&self, start: usize, end: usize) -> BorderProjection {
        let end = end.min(self.links.len().saturating_sub(1));
        let links = if start <= end { self.links[start ..= end].to_vec() } else { Vec::new() };
        BorderProjection { attributes: self.attributes.clone(), links }
    }

    /// The position of every link on the surface.
    /// Links whose areas do not sum up to a positive value are placed at the origin.
    pub fn link_positions(&self, coordinates: &CoordinateFile) -> Result<Vec<Vec3>> {
        self.links.iter()
            .map(|link| Ok(link.unproject(coordinates)?.unwrap_or(Vec3::ZERO)))
            .collect()
    }

    /// The border on the surface with these coordinates.
    /// Links that cannot be unprojected are left out.
    pub fn unproject_border_projection(&self, coordinates: &CoordinateFile) -> Result<Border> {
        let mut border = Border::new(self.attributes.clone());
        border.projection_id = self.unique_id();

        for link in &self.links {
            if let Some(position) = link.unproject(coordinates)? {
                border.add_border_link(position, link.section, link.radius);
            }
        }

        Ok(border)
    }

    pub fn center_of_gravity(&self, coordinates: &CoordinateFile) -> Result<Option<Vec3>> {
        let mut positions = Vec::with_capacity(self.links.len());
        for link in &self.links {
            positions.extend(link.unproject(coordinates)?);
        }

        Ok(center_of_gravity(positions.into_iter()))
    }

    pub fn link_nearest_to(&self, coordinates: &CoordinateFile, point: Vec3) -> Result<Option<usize>> {
        Ok(link_positions::nearest(&self.link_positions(coordinates)?, point))
    }

    pub fn link_furthest_from(&self, coordinates: &CoordinateFile, point: Vec3) -> Result<Option<usize>> {
        Ok(link_positions::furthest(&self.link_positions(coordinates)?, point))
    }

    /// Keep only the links whose position on the surface is inside the box.
    pub fn remove_links_outside_extent(&mut self, coordinates: &CoordinateFile, extent: &Extent) -> Result<bool> {
        let mask = link_positions::keep_mask(&self.link_positions(coordinates)?, link_positions::inside(extent));
        Ok(link_positions::retain_masked(&mut self.links, &mask))
    }

    /// Remove the links within the axis distances or the straight line distance of the point.
    /// Distances of zero or less are ignored.
    pub fn remove_links_near_point(
        &mut self, coordinates: &CoordinateFile, point: Vec3,
        axis_distances: Vec3, straight_line_distance: f32,
    ) -> Result<bool> {
        let mask = link_positions::keep_mask(&self.link_positions(coordinates)?, |position| {
            !link_positions::is_near(position, point, axis_distances, straight_line_distance)
        });

        Ok(link_positions::retain_masked(&mut self.links, &mask))
    }

    /// Rotate the links of a closed border so that the link nearest to the point comes first.
    pub fn change_starting_link_of_closed_border_to_be_near_point(&mut self, coordinates: &CoordinateFile, point: Vec3) -> Result<bool> {
        Ok(match self.link_nearest_to(coordinates, point)? {
            Some(nearest) if nearest > 0 => { self.links.rotate_left(nearest); true },
            _ => false,
        })
    }

    /// Remove the links after and/or before the link nearest to the point.
    pub fn remove_links_before_after_link_nearest_point(
        &mut self, coordinates: &CoordinateFile, point: Vec3,
        remove_after: bool, remove_before: bool,
    ) -> Result<bool> {
        let positions = self.link_positions(coordinates)?;
        let Some(range) = link_positions::range_around_nearest(&positions, point, remove_after, remove_before)
            else { return Ok(false) };

        let changed = range.len() != self.links.len();
        self.links = self.links[range].to_vec();
        Ok(changed)
    }
}


/// A list of border projections, in the text format `.borderproj`.
#[derive(Debug, Clone)]
pub struct BorderProjectionFile {
    header: FileHeader,
    projections: Vec<BorderProjection>,
    ids: Arc<UniqueIdSource>,
}

impl Default for BorderProjectionFile {
    fn default() -> Self { Self::with_id_source(Default::default()) }
}

impl BorderProjectionFile {
    pub fn new() -> Self { Self::default() }

    /// A file that takes the unique ids of its projections from a source shared with other files.
    pub fn with_id_source(ids: Arc<UniqueIdSource>) -> Self {
        BorderProjectionFile {
            header: FileHeader::new("Border Projection File", ".borderproj", "BorderProjectionFile"),
            projections: Vec::new(),
            ids,
        }
    }

    pub fn number_of_border_projections(&self) -> usize { self.projections.len() }
    pub fn border_projection(&self, index: usize) -> &BorderProjection { &self.projections[index] }
    pub fn border_projections(&self) -> &[BorderProjection] { &self.projections }

    /// Access a projection for modification, marking the file as modified.
    pub fn border_projection_mut(&mut self, index: usize) -> &mut BorderProjection {
        self.header.set_modified();
        &mut self.projections[index]
    }

    /// Add the projection, assigning it a new unique id. Returns the unique id.
    pub fn add_border_projection(&mut self, mut projection: BorderProjection) -> i32 {
        let id = self.ids.next_id();
        projection.attributes.unique_id = id;
        self.projections.push(projection);
        self.header.set_modified();
        id
    }

    pub fn first_border_projection_by_name(&self, name: &str) -> Option<&BorderProjection> {
        self.projections.iter().find(|projection| projection.name() == name)
    }

    pub fn last_border_projection_by_name(&self, name: &str) -> Option<&BorderProjection> {
        self.projections.iter().rev().find(|projection| projection.name() == name)
    }

    pub fn border_projection_index_with_unique_id(&self, id: i32) -> Option<usize> {
        self.projections.iter().position(|projection| projection.unique_id() == id)
    }

    pub fn border_projection_with_unique_id(&self, id: i32) -> Option<&BorderProjection> {
        self.border_projection_index_with_unique_id(id).map(|index| &self.projections[index])
    }

    pub fn border_projection_with_largest_number_of_links(&self) -> Option<&BorderProjection> {
        self.projections.iter().rev().max_by_key(|projection| projection.number_of_links())
    }

    pub fn remove_border_projection(&mut self, index: usize) {
        if index < self.projections.len() {
            self.projections.remove(index);
            self.header.set_modified();
        }
    }

    pub fn remove_border_projection_with_unique_id(&mut self, id: i32) {
        if let Some(index) = self.border_projection_index_with_unique_id(id) {
            self.remove_border_projection(index);
        }
    }

    pub fn remove_borders_with_indices(&mut self, indices: &[usize]) {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        for index in indices.into_iter().rev() {
            self.remove_border_projection(index);
        }
    }

    pub fn remove_borders_with_name(&mut self, name: &str) {
        let before = self.projections.len();
        self.projections.retain(|projection| projection.name() != name);
        if before != self.projections.len() { self.header.set_modified(); }
    }

    /// Indices of projections that duplicate an earlier projection.
    pub fn duplicate_border_projection_indices(&self) -> Vec<usize> {
        (1 .. self.projections.len())
            .filter(|&later| self.projections[.. later].iter()
                .any(|earlier| earlier.is_duplicate_of(&self.projections[later])))
            .collect()
    }

    pub fn reverse_order_of_all_border_projections(&mut self) {
        for projection in &mut self.projections { projection.reverse(); }
        self.header.set_modified();
    }

    /// Add all projections of the other file and take over its comment.
    pub fn append(&mut self, other: &BorderProjectionFile, comment_mode: CommentMode) {
        for projection in &other.projections {
            self.add_border_projection(projection.clone());
        }

        self.header.append_file_comment(&other.header, comment_mode);
    }

    /// Unproject all projections onto the surface.
    pub fn unproject(&self, coordinates: &CoordinateFile) -> Result<Vec<Border>> {
        self.projections.iter()
            .map(|projection| projection.unproject_border_projection(coordinates))
            .collect()
    }
}

impl DataFile for BorderProjectionFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.projections.clear();
    }

    fn is_empty(&self) -> bool { self.projections.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("border projections in {} format", format)));
        }

        let count: usize = parse(&text.read_non_empty_line()?, "number of border projections")?;

        for _ in 0 .. count {
            let (attributes, link_count) = BorderAttributes::read(text)?;
            let mut projection = BorderProjection::new(attributes);

            for _ in 0 .. link_count {
                let line = text.read_non_empty_line()?;
                let tokens = tokens(&line);

                let mut link = BorderProjectionLink::new(0, [-1; 3], [0.0; 3], 0.0);
                for corner in 0 .. 3 {
                    link.nodes[corner] = parse_token(&tokens, corner, "link node")?;
                    link.areas[corner] = parse_token(&tokens, 4 + corner, "link area")?;
                }

                link.section = parse_token(&tokens, 3, "section")?;
                link.radius = tokens.get(7).map_or(Ok(0.0), |token| parse(token, "radius"))?;
                projection.add_border_projection_link(link);
            }

            self.add_border_projection(projection);
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("border projections in {} format", format)));
        }

        let with_links = self.projections.iter().filter(|projection| projection.number_of_links() > 0).count();
        writeln!(write, "{}", with_links)?;

        for (index, projection) in self.projections.iter().enumerate() {
            if projection.number_of_links() == 0 { continue; }
            projection.attributes.write(write, index, projection.number_of_links())?;

            for link in &projection.links {
                let [n0, n1, n2] = link.nodes;
                let [a0, a1, a2] = link.areas;

                writeln!(
                    write, "{} {} {} {} {} {} {} {}", n0, n1, n2, link.section,
                    Fixed(a0), Fixed(a1), Fixed(a2), Fixed(link.radius)
                )?;
            }
        }

        Ok(())
    }
}

impl CompareForTesting for BorderProjectionFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_border_projections() != other.number_of_border_projections() {
            return Err("Files have a different number of border projections.".to_string());
        }

        for (index, (mine, theirs)) in self.projections.iter().zip(&other.projections).enumerate() {
            if mine.name() != theirs.name() {
                return Err(format!("Border {} names to not match {} and {}", index, mine.name(), theirs.name()));
            }

            if mine.number_of_links() != theirs.number_of_links() {
                return Err("Border Projection has a different number of links.".to_string());
            }

            for (a, b) in mine.links.iter().zip(&theirs.links) {
                if a.nodes != b.nodes {
                    return Err("border link has non-matching vertices".to_string());
                }

                if a.areas.iter().zip(&b.areas).any(|(a, b)| (a - b).abs() > tolerance) {
                    return Err("border link has non-matching areas".to_string());
                }
            }
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    fn triangle() -> CoordinateFile {
        CoordinateFile::from_coordinates(vec![Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 0.0)])
    }

    fn projection() -> BorderProjection {
        let mut projection = BorderProjection::new(BorderAttributes::named("sulcus"));
        projection.add_border_projection_link(BorderProjectionLink::new(1, [0, 1, 2], [0.5, 0.25, 0.25], 2.0));
        projection.add_border_projection_link(BorderProjectionLink::new(1, [0, 1, 2], [0.0, 0.0, 1.0], 2.0));
        projection
    }

    #[test]
    fn invalid_links_are_rejected(){
        let mut projection = projection();
        assert!(!projection.add_border_projection_link(BorderProjectionLink::new(0, [-1, -1, -1], [1.0, 0.0, 0.0], 0.0)));
        assert!(projection.add_border_projection_link(BorderProjectionLink::new(0, [-1, 3, -1], [1.0, 0.0, 0.0], 0.0)));
    }

    #[test]
    fn unprojection_uses_rotated_areas(){
        let border = projection().unproject_border_projection(&triangle()).unwrap();
        assert_eq!(border.link(0).position, Vec3(0.25, 0.5, 0.0));
        assert_eq!(border.link(1).position, Vec3(1.0, 0.0, 0.0));
        assert_eq!(border.projection_id, -1);

        let mut at_origin = projection();
        at_origin.add_border_projection_link(BorderProjectionLink::new(1, [0, 1, 2], [0.0, 1.0, 0.0], 2.0));
        assert_eq!(at_origin.unproject_border_projection(&triangle()).unwrap().number_of_links(), 2);
    }

    #[test]
    fn out_of_range_nodes(){
        let mut projection = projection();
        projection.add_border_projection_link(BorderProjectionLink::new(0, [0, 1, 9], [1.0, 1.0, 1.0], 0.0));
        let error = projection.unproject_border_projection(&triangle()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::VertexOutOfRange);
    }

    #[test]
    fn all_later_duplicates_are_removed(){
        let a = BorderProjectionLink::new(0, [0, 1, 2], [1.0, 0.0, 0.0], 0.0);
        let b = BorderProjectionLink::new(0, [0, 1, 2], [0.0, 1.0, 0.0], 0.0);

        let mut projection = BorderProjection::new(BorderAttributes::named("x"));
        for link in [a, b, a, b, a] { projection.add_border_projection_link(link); }

        assert!(projection.remove_duplicate_border_projection_links());
        assert_eq!(projection.links(), &[a, b]);
    }

    #[test]
    fn file_lookup_and_round_trip(){
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("a.borderproj");

        let mut file = BorderProjectionFile::new();
        let first = file.add_border_projection(projection());
        let mut renamed = projection();
        renamed.attributes.name = "gyrus".into();
        file.add_border_projection(renamed);
        let last = file.add_border_projection(projection());

        assert_eq!(file.duplicate_border_projection_indices(), vec![2]);
        assert_eq!(file.first_border_projection_by_name("sulcus").unwrap().unique_id(), first);
        assert_eq!(file.last_border_projection_by_name("sulcus").unwrap().unique_id(), last);
        assert_eq!(file.border_projection_index_with_unique_id(last), Some(2));

        file.write_file(&path).unwrap();
        let read = BorderProjectionFile::from_file(&path).unwrap();
        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0001), Ok(()));
        assert_eq!(read.border_projection(1).link(0).radius, 2.0);
    }
}
