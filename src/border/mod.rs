
//! Borders are named curves on a surface, stored as an ordered list of links.
//! Border projections store each link relative to a triangle of a surface instead,
//! so that the border can be unprojected onto any surface sharing the topology.

pub mod projection;

use std::io::Write;
use std::sync::atomic::{AtomicI32, Ordering};
use crate::error::{Error, Result, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Fixed, TextReader, parse, parse_token, tokens};
use crate::math::{Extent, Vec3};
use crate::meta::{CommentMode, FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;

pub use projection::{BorderProjection, BorderProjectionFile, BorderProjectionLink};


/// Hands out identifiers that are unique among the borders of a data set.
/// Can be shared between threads that read files in parallel.
#[derive(Debug)]
pub struct UniqueIdSource {
    next: AtomicI32,
}

impl UniqueIdSource {

    /// A source whose first identifier is `1`.
    pub const fn new() -> Self {
        UniqueIdSource { next: AtomicI32::new(1) }
    }

    /// A new identifier, never returned before since the last reset.
    pub fn next_id(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Start again at `1`.
    pub fn reset(&self) {
        self.next.store(1, Ordering::Relaxed);
    }
}

impl Default for UniqueIdSource {
    fn default() -> Self { Self::new() }
}


/// The attributes shared by borders and border projections.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderAttributes {
    pub name: String,

    /// Obsolete, but still stored in the files.
    pub center: Vec3,

    pub sampling_density: f32,
    pub variance: f32,
    pub topography: f32,
    pub areal_uncertainty: f32,

    /// Index into the border color file.
    pub color_index: i32,

    /// Assigned when the border is added to a file, `-1` before.
    pub unique_id: i32,
}

impl Default for BorderAttributes {
    fn default() -> Self {
        BorderAttributes {
            name: String::from("_no_name_"),
            center: Vec3::ZERO,
            sampling_density: 25.0,
            variance: 1.0,
            topography: 0.0,
            areal_uncertainty: 0.0,
            color_index: 0,
            unique_id: -1,
        }
    }
}

impl BorderAttributes {
    pub fn named(name: impl Into<String>) -> Self {
        BorderAttributes { name: name.into(), ..Self::default() }
    }

    /// Parse the line `index links name density variance topography uncertainty`
    /// and the center line that follows it. Returns the number of links.
    fn read(text: &mut TextReader<'_>) -> Result<(Self, usize)> {
        let line = text.read_non_empty_line()?;
        let values = tokens(&line);

        let optional = |index: usize, default: f32, what: &'static str| -> Result<f32> {
            match values.get(index) {
                Some(token) => parse(token, what),
                None => Ok(default),
            }
        };

        let link_count = parse_token(&values, 1, "number of links")?;
        let attributes = BorderAttributes {
            name: values.get(2).map_or_else(String::new, |name| name.to_string()),
            sampling_density: optional(3, 25.0, "sampling density")?,
            variance: optional(4, 1.0, "variance")?,
            topography: optional(5, 0.0, "topography")?,
            areal_uncertainty: optional(6, 1.0, "areal uncertainty")?,
            ..Self::default()
        };

        let center_line = text.read_line()?;
        let center = tokens_to_vec3(&tokens(&center_line)).unwrap_or(Vec3::ZERO);

        Ok((BorderAttributes { center, ..attributes }, link_count))
    }

    fn write(&self, write: &mut Vec<u8>, index: usize, link_count: usize) -> UnitResult {
        writeln!(
            write, "{} {} {} {} {} {} {}", index, link_count, self.name,
            Fixed(self.sampling_density), Fixed(self.variance),
            Fixed(self.topography), Fixed(self.areal_uncertainty)
        )?;

        let Vec3(x, y, z) = self.center;
        writeln!(write, "{} {} {}", Fixed(x), Fixed(y), Fixed(z))?;
        Ok(())
    }
}

fn tokens_to_vec3(tokens: &[&str]) -> Result<Vec3> {
    Ok(Vec3(
        parse_token(tokens, 0, "x")?,
        parse_token(tokens, 1, "y")?,
        parse_token(tokens, 2, "z")?,
    ))
}


/// Selects links by their position. Shared by borders and border projections,
/// which compute the positions of their links differently.
pub(crate) mod link_positions {
    use crate::math::{Extent, Vec3};

    pub fn nearest(positions: &[Vec3], point: Vec3) -> Option<usize> {
        positions.iter().enumerate()
            .map(|(index, position)| (index, position.distance_squared(point)))
            .fold(None, |nearest: Option<(usize, f32)>, (index, distance)| match nearest {
                Some((_, nearest_distance)) if nearest_distance <= distance => nearest,
                _ => Some((index, distance)),
            })
            .map(|(index, _)| index)
    }

    /// The last link is never reported as the furthest.
    pub fn furthest(positions: &[Vec3], point: Vec3) -> Option<usize> {
        let candidates = positions.len().saturating_sub(1);

        positions[.. candidates].iter().enumerate()
            .map(|(index, position)| (index, position.distance_squared(point)))
            .fold(None, |furthest: Option<(usize, f32)>, (index, distance)| match furthest {
                Some((_, furthest_distance)) if furthest_distance >= distance => furthest,
                _ => Some((index, distance)),
            })
            .map(|(index, _)| index)
    }

    /// Whether a link is within all positive axis distances of the point,
    /// or within the positive straight line distance.
    /// Distances of zero or less are ignored.
    pub fn is_near(position: Vec3, point: Vec3, axis_distances: Vec3, straight_line_distance: f32) -> bool {
        let delta = (position - point).map(f32::abs);
        let axes = [(delta.0, axis_distances.0), (delta.1, axis_distances.1), (delta.2, axis_distances.2)];

        let any_axis = axes.iter().any(|&(_, limit)| limit > 0.0);
        let within_axes = any_axis && axes.iter()
            .all(|&(delta, limit)| limit <= 0.0 || delta <= limit);

        let within_distance = straight_line_distance > 0.0
            && position.distance(point) <= straight_line_distance;

        within_axes || within_distance
    }

    pub fn keep_mask(positions: &[Vec3], keep: impl Fn(Vec3) -> bool) -> Vec<bool> {
        positions.iter().map(|&position| keep(position)).collect()
    }

    pub fn inside(extent: &Extent) -> impl Fn(Vec3) -> bool + '_ {
        move |position| extent.contains(position)
    }

    /// The range of links to keep when removing the links before and/or after the nearest link.
    pub fn range_around_nearest(
        positions: &[Vec3], point: Vec3, remove_after: bool, remove_before: bool,
    ) -> Option<std::ops::Range<usize>> {
        let nearest = nearest(positions, point)?;
        let start = if remove_before { nearest } else { 0 };
        let end = if remove_after { nearest + 1 } else { positions.len() };
        Some(start .. end)
    }

    /// Remove the elements whose mask entry is false.
    pub fn retain_masked<T>(values: &mut Vec<T>, mask: &[bool]) -> bool {
        let before = values.len();
        let mut index = 0;
        values.retain(|_| { let keep = mask.get(index).copied().unwrap_or(true); index += 1; keep });
        values.len() != before
    }
}


/// One point of a border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderLink {
    pub section: i32,
    pub position: Vec3,
    pub radius: f32,
}


/// A named curve in space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Border {
    pub attributes: BorderAttributes,
    links: Vec<BorderLink>,

    /// The unique id of the border projection this border was unprojected from, `-1` if none.
    pub projection_id: i32,
}

impl Border {
    pub fn new(attributes: BorderAttributes) -> Self {
        Border { attributes, links: Vec::new(), projection_id: -1 }
    }

    pub fn name(&self) -> &str { &self.attributes.name }
    pub fn unique_id(&self) -> i32 { self.attributes.unique_id }

    pub fn number_of_links(&self) -> usize { self.links.len() }
    pub fn link(&self, index: usize) -> &BorderLink { &self.links[index] }
    pub fn links(&self) -> &[BorderLink] { &self.links }

    pub fn link_positions(&self) -> Vec<Vec3> {
        self.links.iter().map(|link| link.position).collect()
    }

    /// Append a link. Links at the origin could not be projected and are ignored.
    /// Returns whether the link was added.
    pub fn add_border_link(&mut self, position: Vec3, section: i32, radius: f32) -> bool {
        if position == Vec3::ZERO { return false; }
        self.links.push(BorderLink { section, position, radius });
        true
    }

    /// Insert a link before the index, or append it if the index is past the end.
    pub fn insert_border_link(&mut self, index: usize, position: Vec3, section: i32, radius: f32) -> bool {
        if index >= self.links.len() { return self.add_border_link(position, section, radius); }
        self.links.insert(index, BorderLink { section, position, radius });
        true
    }

    pub fn set_link_position(&mut self, index: usize, position: Vec3) {
        self.links[index].position = position;
    }

    pub fn remove_link(&mut self, index: usize) -> bool {
        if index >= self.links.len() { return false; }
        self.links.remove(index);
        true
    }

    pub fn clear_links(&mut self) { self.links.clear(); }

    /// Same name and exactly the same link positions.
    pub fn is_duplicate_of(&self, other: &Border) -> bool {
        self.name() == other.name()
            && self.links.len() == other.links.len()
            && self.links.iter().zip(&other.links).all(|(a, b)| a.position == b.position)
    }

    /// The sum of the distances between consecutive links.
    pub fn length(&self) -> f32 {
        self.links.windows(2)
            .map(|pair| pair[0].position.distance(pair[1].position))
            .sum()
    }

    pub fn distance_between_links(&self, first: usize, second: usize) -> f32 {
        self.links[first].position.distance(self.links[second].position)
    }

    pub fn reverse(&mut self) { self.links.reverse(); }

    /// The mean position of the links, `None` without links.
    pub fn center_of_gravity(&self) -> Option<Vec3> {
        center_of_gravity(self.links.iter().map(|link| link.position))
    }

    /// The smallest box containing all links.
    pub fn bounds(&self) -> Option<Extent> {
        let (first, rest) = self.links.split_first()?;

        Some(rest.iter().fold(Extent { min: first.position, max: first.position }, |extent, link| {
            let point = link.position;
            Extent {
                min: Vec3(extent.min.0.min(point.0), extent.min.1.min(point.1), extent.min.2.min(point.2)),
                max: Vec3(extent.max.0.max(point.0), extent.max.1.max(point.1), extent.max.2.max(point.2)),
            }
        }))
    }

    pub fn link_nearest_to(&self, point: Vec3) -> Option<usize> {
        link_positions::nearest(&self.link_positions(), point)
    }

    pub fn link_furthest_from(&self, point: Vec3) -> Option<usize> {
        link_positions::furthest(&self.link_positions(), point)
    }

    /// The links from `start` to `end`, both included, as a new border with the same attributes.
    pub fn sub_set(&self, start: usize, end: usize) -> Border {
        let end = end.min(self.links.len().saturating_sub(1));
        let links = if start <= end { self.links[start ..= end].to_vec() } else { Vec::new() };
        Border { attributes: self.attributes.clone(), links, projection_id: self.projection_id }
    }

    /// Keep only the links inside the box. Returns whether any link was removed.
    pub fn remove_links_outside_extent(&mut self, extent: &Extent) -> bool {
        let mask = link_positions::keep_mask(&self.link_positions(), link_positions::inside(extent));
        link_positions::retain_masked(&mut self.links, &mask)
    }

    /// Remove the links within the axis distances or the straight line distance of the point.
    /// Distances of zero or less are ignored.
    pub fn remove_links_near_point(&mut self, point: Vec3, axis_distances: Vec3, straight_line_distance: f32) -> bool {
        let mask = link_positions::keep_mask(&self.link_positions(), |position| {
            !link_positions::is_near(position, point, axis_distances, straight_line_distance)
        });

        link_positions::retain_masked(&mut self.links, &mask)
    }

    /// Rotate the links of a closed border so that the link nearest to the point comes first.
    pub fn change_starting_link_of_closed_border_to_be_near_point(&mut self, point: Vec3) -> bool {
        match self.link_nearest_to(point) {
            Some(nearest) if nearest > 0 => { self.links.rotate_left(nearest); true },
            _ => false,
        }
    }

    /// Remove the links after and/or before the link nearest to the point.
    pub fn remove_links_before_after_link_nearest_point(&mut self, point: Vec3, remove_after: bool, remove_before: bool) -> bool {
        let Some(range) = link_positions::range_around_nearest(&self.link_positions(), point, remove_after, remove_before)
            else { return false };

        let changed = range.len() != self.links.len();
        self.links = self.links[range].to_vec();
        changed
    }
}

pub(crate) fn center_of_gravity(positions: impl Iterator<Item = Vec3>) -> Option<Vec3> {
    let (sum, count) = positions.fold(([0.0_f64; 3], 0_usize), |(sum, count), Vec3(x, y, z)| {
        ([sum[0] + f64::from(x), sum[1] + f64::from(y), sum[2] + f64::from(z)], count + 1)
    });

    if count == 0 { return None; }
    let count = count as f64;
    Some(Vec3((sum[0] / count) as f32, (sum[1] / count) as f32, (sum[2] / count) as f32))
}


/// A list of borders, in the text format `.border`.
#[derive(Debug, Clone)]
pub struct BorderFile {
    header: FileHeader,
    borders: Vec<Border>,
    ids: std::sync::Arc<UniqueIdSource>,
}

impl Default for BorderFile {
    fn default() -> Self {
        Self::with_id_source(Default::default())
    }
}

impl BorderFile {
    pub fn new() -> Self { Self::default() }

    /// A file that takes the unique ids of its borders from a source shared with other files.
    pub fn with_id_source(ids: std::sync::Arc<UniqueIdSource>) -> Self {
        BorderFile {
            header: FileHeader::new("Border File", ".border", "BorderFile"),
            borders: Vec::new(),
            ids,
        }
    }

    pub fn number_of_borders(&self) -> usize { self.borders.len() }
    pub fn border(&self, index: usize) -> &Border { &self.borders[index] }
    pub fn borders(&self) -> &[Border] { &self.borders }

    /// Access a border for modification, marking the file as modified.
    pub fn border_mut(&mut self, index: usize) -> &mut Border {
        self.header.set_modified();
        &mut self.borders[index]
    }

    /// Add a copy of the border, assigning it a new unique id.
    /// Returns the unique id.
    pub fn add_border(&mut self, mut border: Border) -> i32 {
        let id = self.ids.next_id();
        border.attributes.unique_id = id;
        self.borders.push(border);
        self.header.set_modified();
        id
    }

    pub fn remove_border(&mut self, index: usize) {
        if index < self.borders.len() {
            self.borders.remove(index);
            self.header.set_modified();
        }
    }

    pub fn remove_borders_with_indices(&mut self, indices: &[usize]) {
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();

        for index in indices.into_iter().rev() {
            self.remove_border(index);
        }
    }

    pub fn border_index_by_name(&self, name: &str) -> Option<usize> {
        self.borders.iter().position(|border| border.name() == name)
    }

    pub fn border_index_with_unique_id(&self, id: i32) -> Option<usize> {
        self.borders.iter().position(|border| border.unique_id() == id)
    }

    pub fn border_index_with_projection_id(&self, id: i32) -> Option<usize> {
        self.borders.iter().position(|border| border.projection_id == id)
    }

    /// Indices of borders that duplicate an earlier border.
    pub fn duplicate_border_indices(&self) -> Vec<usize> {
        (1 .. self.borders.len())
            .filter(|&later| self.borders[.. later].iter().any(|earlier| earlier.is_duplicate_of(&self.borders[later])))
            .collect()
    }

    /// Remove the borders that were unprojected from border projections.
    pub fn remove_all_projected_borders(&mut self) {
        let before = self.borders.len();
        self.borders.retain(|border| border.projection_id < 0);
        if self.borders.len() != before { self.header.set_modified(); }
    }

    pub fn total_number_of_links(&self) -> usize {
        self.borders.iter().map(Border::number_of_links).sum()
    }

    /// Add all borders of the other file and take over its comment.
    pub fn append(&mut self, other: &BorderFile, comment_mode: CommentMode) {
        for border in &other.borders {
            self.add_border(border.clone());
        }

        self.header.append_file_comment(&other.header, comment_mode);
    }

    /// Move all links of a spherical border file onto a sphere with the radius.
    pub fn set_spherical_border_radius(&mut self, radius: f32) {
        if radius <= 0.0 { return; }

        for border in &mut self.borders {
            for link in &mut border.links {
                let length = link.position.length();
                if length > 0.0 { link.position = link.position * (radius / length); }
            }
        }

        self.header.set_modified();
    }
}

impl DataFile for BorderFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.borders.clear();
    }

    fn is_empty(&self) -> bool { self.borders.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("borders in {} format", format)));
        }

        let count: usize = parse(&text.read_non_empty_line()?, "number of borders")?;

        for _ in 0 .. count {
            let (attributes, link_count) = BorderAttributes::read(text)?;
            let mut border = Border::new(attributes);

            for _ in 0 .. link_count {
                let line = text.read_non_empty_line()?;
                let tokens = tokens(&line);

                let section = parse_token(&tokens, 1, "section")?;
                let position = tokens_to_vec3(tokens.get(2 ..).unwrap_or_default())?;
                let radius = tokens.get(5).map_or(Ok(0.0), |token| parse(token, "radius"))?;
                border.add_border_link(position, section, radius);
            }

            self.add_border(border);
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("borders in {} format", format)));
        }

        let with_links = self.borders.iter().filter(|border| border.number_of_links() > 0).count();
        writeln!(write, "{}", with_links)?;

        for (index, border) in self.borders.iter().enumerate() {
            if border.number_of_links() == 0 { continue; }
            border.attributes.write(write, index, border.number_of_links())?;

            for (link_index, link) in border.links.iter().enumerate() {
                let Vec3(x, y, z) = link.position;
                writeln!(write, "{} {} {} {} {} {}", link_index, link.section, Fixed(x), Fixed(y), Fixed(z), Fixed(link.radius))?;
            }
        }

        Ok(())
    }
}

impl CompareForTesting for BorderFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.number_of_borders() != other.number_of_borders() {
            return Err("Files have a different number of borders.".to_string());
        }

        for (index, (mine, theirs)) in self.borders.iter().zip(&other.borders).enumerate() {
            if mine.name() != theirs.name() {
                return Err(format!("Border {} names to not match {} and {}", index, mine.name(), theirs.name()));
            }

            if mine.number_of_links() != theirs.number_of_links() {
                return Err("Border has a different number of links.".to_string());
            }

            for (a, b) in mine.links.iter().zip(&theirs.links) {
                let close = a.position.to_array().iter().zip(b.position.to_array())
                    .all(|(a, b)| (a - b).abs() <= tolerance);

                if !close { return Err("border link has non-matching coordinates".to_string()); }
            }
        }

        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn line() -> Border {
        let mut border = Border::new(BorderAttributes::named("central"));
        for x in 1 ..= 5 {
            border.add_border_link(Vec3(x as f32, 0.0, 0.0), 3, 1.0);
        }
        border
    }

    #[test]
    fn origin_links_are_ignored(){
        let mut border = line();
        assert!(!border.add_border_link(Vec3::ZERO, 0, 0.0));
        assert_eq!(border.number_of_links(), 5);
        assert_eq!(border.length(), 4.0);
        assert_eq!(border.center_of_gravity(), Some(Vec3(3.0, 0.0, 0.0)));
    }

    #[test]
    fn link_editing(){
        let mut border = line();
        border.remove_links_outside_extent(&Extent { min: Vec3(1.5, -1.0, -1.0), max: Vec3(4.5, 1.0, 1.0) });
        assert_eq!(border.link_positions(), vec![Vec3(2.0, 0.0, 0.0), Vec3(3.0, 0.0, 0.0), Vec3(4.0, 0.0, 0.0)]);

        let mut border = line();
        border.remove_links_near_point(Vec3(3.0, 0.0, 0.0), Vec3(0.0, 0.0, 0.0), 1.0);
        assert_eq!(border.number_of_links(), 2);

        let mut border = line();
        border.remove_links_near_point(Vec3(3.0, 0.0, 0.0), Vec3(0.5, 0.0, 0.0), 0.0);
        assert_eq!(border.number_of_links(), 4);

        let mut border = line();
        border.change_starting_link_of_closed_border_to_be_near_point(Vec3(4.1, 0.0, 0.0));
        assert_eq!(border.link(0).position, Vec3(4.0, 0.0, 0.0));
        assert_eq!(border.link(2).position, Vec3(1.0, 0.0, 0.0));

        let mut border = line();
        border.remove_links_before_after_link_nearest_point(Vec3(2.0, 0.0, 0.0), true, false);
        assert_eq!(border.number_of_links(), 2);

        let mut border = line();
        border.remove_links_before_after_link_nearest_point(Vec3(2.0, 0.0, 0.0), false, true);
        assert_eq!(border.number_of_links(), 4);
    }

    #[test]
    fn ids_are_unique_until_reset(){
        let ids = std::sync::Arc::new(UniqueIdSource::new());
        let mut first = BorderFile::with_id_source(ids.clone());
        let mut second = BorderFile::with_id_source(ids.clone());

        assert_eq!(first.add_border(line()), 1);
        assert_eq!(second.add_border(line()), 2);

        ids.reset();
        assert_eq!(first.add_border(line()), 1);
    }

    #[test]
    fn duplicates_and_round_trip(){
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("a.border");

        let mut file = BorderFile::new();
        file.add_border(line());
        file.add_border(Border::new(BorderAttributes::named("empty")));
        file.add_border(line());
        assert_eq!(file.duplicate_border_indices(), vec![2]);

        file.write_file(&path).unwrap();
        let read = BorderFile::from_file(&path).unwrap();

        // borders without links are not written
        assert_eq!(read.number_of_borders(), 2);
        assert_eq!(read.border(0).link(4).section, 3);
        assert_eq!(read.border(0).attributes.sampling_density, 25.0);
    }
}
