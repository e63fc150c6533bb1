
//! A dense volume of vectors with a magnitude per voxel.
//!
//! Binary files store the three dimensions, followed by four planes:
//! all x components, all y components, all z components, all magnitudes.

use std::io::Write;
use crate::error::{Error, Result, UnitResult, i32_to_usize, usize_to_i32};
use crate::file::{CompareForTesting, DataFile};
use crate::io::{Data, TextReader, check_count, checked_count, parse};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;


/// How the vectors of two files are merged by `SureFitVectorFile::combine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOperation {

    /// The magnitude is the square root of the positive part of the dot product
    /// of the first vectors, negated, with the second vectors.
    /// The direction is taken from the second file.
    DotSqrtRectMinus,

    /// The larger magnitude with the direction of the second file.
    TwoVectorNormal,

    /// The vector with the larger magnitude. If the second file wins,
    /// its direction is flipped to agree with the first file.
    TwoVector,
}

/// How a volume changes the magnitudes in `combine_with_volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineVolumeOperation {
    ReplaceMagnitudeWithVolume,
    MultiplyMagnitudeWithVolume,
}

/// The voxels of a scalar volume, x fastest.
#[derive(Debug, Clone, Copy)]
pub struct VolumeValues<'v> {
    pub dimensions: [usize; 3],
    pub voxels: &'v [f32],
}

impl VolumeValues<'_> {
    fn is_masked_out(&self, index: usize) -> bool {
        self.voxels.get(index).map_or(true, |&voxel| voxel == 0.0)
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct SureFitVectorFile {
    header: FileHeader,
    dimensions: [usize; 3],
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    magnitude: Vec<f32>,
}

impl Default for SureFitVectorFile {
    fn default() -> Self { Self::new([0, 0, 0]) }
}

impl SureFitVectorFile {

    /// A volume of zero vectors.
    pub fn new(dimensions: [usize; 3]) -> Self {
        let mut header = FileHeader::new("Vector File", ".vec", "VectorFile");
        header.set_read_format(FileFormat::Binary);
        header.set_write_format(FileFormat::Binary);

        let mut file = SureFitVectorFile {
            header, dimensions: [0; 3],
            x: Vec::new(), y: Vec::new(), z: Vec::new(), magnitude: Vec::new(),
        };

        file.initialize(dimensions);
        file
    }

    /// Resize to the dimensions and set all vectors to zero.
    pub fn initialize(&mut self, dimensions: [usize; 3]) {
        let count = dimensions.iter().product();
        self.dimensions = dimensions;

        for plane in [&mut self.x, &mut self.y, &mut self.z, &mut self.magnitude] {
            plane.clear();
            plane.resize(count, 0.0);
        }
    }

    pub fn dimensions(&self) -> [usize; 3] { self.dimensions }
    pub fn number_of_voxels(&self) -> usize { self.x.len() }

    /// The flat index of a voxel, x fastest.
    pub fn data_index(&self, [i, j, k]: [usize; 3]) -> usize {
        let [dim_x, dim_y, _] = self.dimensions;
        i + j * dim_x + k * dim_x * dim_y
    }

    pub fn vector_with_flat_index(&self, index: usize) -> [f32; 3] {
        [self.x[index], self.y[index], self.z[index]]
    }

    pub fn set_vector_with_flat_index(&mut self, index: usize, [x, y, z]: [f32; 3]) {
        self.x[index] = x;
        self.y[index] = y;
        self.z[index] = z;
        self.header.set_modified();
    }

    pub fn vector(&self, ijk: [usize; 3]) -> [f32; 3] {
        self.vector_with_flat_index(self.data_index(ijk))
    }

    pub fn magnitude(&self, ijk: [usize; 3]) -> f32 {
        self.magnitude[self.data_index(ijk)]
    }

    pub fn magnitude_with_flat_index(&self, index: usize) -> f32 { self.magnitude[index] }

    pub fn set_magnitude_with_flat_index(&mut self, index: usize, magnitude: f32) {
        self.magnitude[index] = magnitude;
        self.header.set_modified();
    }

    /// Scale every vector by its magnitude.
    pub fn multiply_xyz_by_magnitude(&mut self) {
        for (index, &magnitude) in self.magnitude.iter().enumerate() {
            self.x[index] *= magnitude;
            self.y[index] *= magnitude;
            self.z[index] *= magnitude;
        }

        self.header.set_modified();
    }

    fn check_dimensions(&self, dimensions: [usize; 3], operation: &'static str) -> UnitResult {
        if self.dimensions != dimensions {
            return Err(Error::invalid(format!(
                "volume dimensions {:?} and vector dimensions {:?} do not match in {}",
                dimensions, self.dimensions, operation
            )));
        }

        Ok(())
    }

    /// Replace or scale the magnitudes with the voxels of a volume of the same dimensions.
    pub fn combine_with_volume(&mut self, operation: CombineVolumeOperation, volume: VolumeValues<'_>) -> UnitResult {
        self.check_dimensions(volume.dimensions, "combine with volume")?;

        for (magnitude, &voxel) in self.magnitude.iter_mut().zip(volume.voxels) {
            *magnitude = match operation {
                CombineVolumeOperation::ReplaceMagnitudeWithVolume => voxel,
                CombineVolumeOperation::MultiplyMagnitudeWithVolume => voxel * *magnitude,
            };
        }

        self.header.set_modified();
        Ok(())
    }

    /// The magnitudes as voxels of a volume of the same dimensions.
    pub fn copy_magnitude_to_volume(&self, dimensions: [usize; 3], voxels: &mut [f32]) -> UnitResult {
        self.check_dimensions(dimensions, "copy magnitude to volume")?;

        for (voxel, &magnitude) in voxels.iter_mut().zip(&self.magnitude) {
            *voxel = magnitude;
        }

        Ok(())
    }

    /// Merge two vector files of the same dimensions into a new file.
    /// Voxels that are zero in the mask become zero vectors.
    pub fn combine(
        operation: CombineOperation, first: &Self, second: &Self, mask: Option<VolumeValues<'_>>
    ) -> Result<Self>
    {
        if first.dimensions != second.dimensions {
            return Err(Error::invalid("vector file dimensions do not match in combine"));
        }

        if let Some(mask) = mask {
            first.check_dimensions(mask.dimensions, "combine with mask")?;
        }

        let mut out = SureFitVectorFile::new(first.dimensions);
        let included = |index: usize| mask.map_or(true, |mask| !mask.is_masked_out(index));

        for index in 0 .. out.number_of_voxels() {
            if !included(index) { continue; }

            let vector1 = first.vector_with_flat_index(index);
            let vector2 = second.vector_with_flat_index(index);
            let (magnitude1, magnitude2) = (first.magnitude[index], second.magnitude[index]);

            let (magnitude, vector) = match operation {
                CombineOperation::DotSqrtRectMinus => {
                    let scaled1 = vector1.map(|value| value * -magnitude1);
                    let scaled2 = vector2.map(|value| value * magnitude2);
                    let dot: f32 = scaled1.iter().zip(&scaled2).map(|(a, b)| a * b).sum();
                    (dot.max(0.0).sqrt(), vector2)
                },

                CombineOperation::TwoVectorNormal => (magnitude1.max(magnitude2), vector2),

                CombineOperation::TwoVector => {
                    let (magnitude, mut vector) = if magnitude1 > magnitude2 { (magnitude1, vector1) }
                    else {
                        let dot: f32 = vector1.iter().zip(&vector2).map(|(a, b)| a * b).sum();
                        let sign = if dot < 0.0 { -1.0 } else { 1.0 };
                        (magnitude2, vector2.map(|value| value * sign))
                    };

                    let length = |vector: [f32; 3]| vector.iter().map(|value| value * value).sum::<f32>().sqrt();
                    if length(vector1) == 0.0 { vector = vector2; }
                    if length(vector2) == 0.0 { vector = vector1; }

                    (magnitude, vector)
                },
            };

            out.magnitude[index] = magnitude;
            out.set_vector_with_flat_index(index, vector);
        }

        Ok(out)
    }

    fn planes(&self) -> [&Vec<f32>; 4] {
        [&self.x, &self.y, &self.z, &self.magnitude]
    }
}

fn voxel_count(dimensions: [usize; 3]) -> Result<usize> {
    dimensions.iter().try_fold(1_usize, |count, &dimension| checked_count(count, dimension, "vector dimensions"))
}

impl DataFile for SureFitVectorFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE
        .read_write(FileFormat::Ascii)
        .read_write(FileFormat::Binary);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.initialize([0, 0, 0]);
    }

    fn is_empty(&self) -> bool { self.x.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        match format {
            FileFormat::Ascii => {
                let rest = String::from_utf8_lossy(text.remaining()).into_owned();
                let mut values = rest.split_whitespace();
                let mut next = |what: &'static str| values.next()
                    .ok_or_else(|| Error::invalid(format!("missing {}", what)));

                let mut dimensions = [0; 3];
                for dimension in &mut dimensions {
                    *dimension = i32_to_usize(parse(next("vector dimension")?, "vector dimension")?, "vector dimension")?;
                }

                // four text values of at least two bytes per voxel
                text.check_count(voxel_count(dimensions)?, 4 * 2, "number of voxels")?;

                self.initialize(dimensions);
                for index in 0 .. self.number_of_voxels() {
                    self.x[index] = parse(next("vector x")?, "vector x")?;
                    self.y[index] = parse(next("vector y")?, "vector y")?;
                    self.z[index] = parse(next("vector z")?, "vector z")?;
                    self.magnitude[index] = parse(next("vector magnitude")?, "vector magnitude")?;
                }
            },

            FileFormat::Binary => {
                let mut read = text.remaining();
                let mut dimensions = [0; 3];
                for dimension in &mut dimensions {
                    *dimension = i32_to_usize(i32::read(&mut read)?, "vector dimension")?;
                }

                let count = voxel_count(dimensions)?;
                check_count(count, 4 * 4, read.len(), "number of voxels")?;

                self.dimensions = dimensions;
                for plane in [&mut self.x, &mut self.y, &mut self.z, &mut self.magnitude] {
                    *plane = f32::read_vec(&mut read, count, 1 << 20)?;
                }
            },

            other => return Err(Error::unsupported(format!("vector files in {} format", other))),
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        let [dim_x, dim_y, dim_z] = self.dimensions.map(usize_to_i32);

        match format {
            FileFormat::Ascii => {
                writeln!(write, "{} {} {} ", dim_x, dim_y, dim_z)?;
                for index in 0 .. self.number_of_voxels() {
                    writeln!(
                        write, "{} {} {} {}",
                        self.x[index], self.y[index], self.z[index], self.magnitude[index]
                    )?;
                }
            },

            FileFormat::Binary => {
                i32::write_slice(write, &[dim_x, dim_y, dim_z])?;
                for plane in self.planes() {
                    f32::write_slice(write, plane)?;
                }
            },

            other => return Err(Error::unsupported(format!("vector files in {} format", other))),
        }

        Ok(())
    }
}

impl CompareForTesting for SureFitVectorFile {
    fn compare_file_for_unit_testing(&self, other: &Self, tolerance: f32) -> std::result::Result<(), String> {
        if self.dimensions != other.dimensions {
            return Err("Files have different dimensions.".to_string());
        }

        for (mine, theirs) in self.planes().into_iter().zip(other.planes()) {
            if let Some(index) = mine.iter().zip(theirs).position(|(a, b)| (a - b).abs() > tolerance) {
                return Err(format!("Voxel {} does not match.", index));
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
    use std::path::Path;

    fn file_with(vectors: &[([f32; 3], f32)]) -> SureFitVectorFile {
        let mut file = SureFitVectorFile::new([vectors.len(), 1, 1]);
        for (index, &(vector, magnitude)) in vectors.iter().enumerate() {
            file.set_vector_with_flat_index(index, vector);
            file.set_magnitude_with_flat_index(index, magnitude);
        }

        file
    }

    #[test]
    fn binary_is_plane_major(){
        let mut file = file_with(&[([1.0, 2.0, 3.0], 4.0), ([5.0, 6.0, 7.0], 8.0)]);
        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();

        let header_end = bytes.windows(10).position(|window| window == b"EndHeader\n").unwrap() + 10;
        let mut payload = &bytes[header_end ..];
        let mut dimensions = [0_i32; 3];
        i32::read_slice(&mut payload, &mut dimensions).unwrap();
        assert_eq!(dimensions, [2, 1, 1]);

        let mut values = [0.0_f32; 8];
        f32::read_slice(&mut payload, &mut values).unwrap();
        assert_eq!(values, [1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0]);

        let mut read = SureFitVectorFile::default();
        read_file_from_bytes(&mut read, Path::new("a.vec"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
    }

    #[test]
    fn text_round_trip(){
        let mut file = file_with(&[([0.5, 0.0, -1.0], 2.0)]);
        file.header_mut().set_write_format(FileFormat::Ascii);

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let mut read = SureFitVectorFile::default();
        read_file_from_bytes(&mut read, Path::new("a.vec"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.vector([0, 0, 0]), [0.5, 0.0, -1.0]);
        assert_eq!(read.magnitude([0, 0, 0]), 2.0);
    }

    #[test]
    fn combine_operations(){
        let first = file_with(&[([1.0, 0.0, 0.0], 3.0), ([0.0, 1.0, 0.0], 1.0)]);
        let second = file_with(&[([-1.0, 0.0, 0.0], 2.0), ([0.0, 0.0, 1.0], 5.0)]);

        let two_vector = SureFitVectorFile::combine(CombineOperation::TwoVector, &first, &second, None).unwrap();
        assert_eq!(two_vector.vector_with_flat_index(0), [1.0, 0.0, 0.0]);
        assert_eq!(two_vector.magnitude_with_flat_index(1), 5.0);

        let normal = SureFitVectorFile::combine(CombineOperation::TwoVectorNormal, &first, &second, None).unwrap();
        assert_eq!(normal.vector_with_flat_index(0), [-1.0, 0.0, 0.0]);
        assert_eq!(normal.magnitude_with_flat_index(0), 3.0);

        let dot = SureFitVectorFile::combine(CombineOperation::DotSqrtRectMinus, &first, &second, None).unwrap();
        assert_eq!(dot.magnitude_with_flat_index(0), 6.0_f32.sqrt());
        assert_eq!(dot.magnitude_with_flat_index(1), 0.0);

        let voxels = [1.0, 0.0];
        let mask = VolumeValues { dimensions: [2, 1, 1], voxels: &voxels };
        let masked = SureFitVectorFile::combine(CombineOperation::TwoVector, &first, &second, Some(mask)).unwrap();
        assert_eq!(masked.vector_with_flat_index(1), [0.0, 0.0, 0.0]);
        assert_eq!(masked.magnitude_with_flat_index(1), 0.0);
    }

    #[test]
    fn volume_dimensions_must_match(){
        let mut file = file_with(&[([1.0, 1.0, 1.0], 2.0)]);
        let voxels = [3.0];

        let wrong = VolumeValues { dimensions: [1, 2, 1], voxels: &voxels };
        assert!(file.combine_with_volume(CombineVolumeOperation::ReplaceMagnitudeWithVolume, wrong).is_err());

        let volume = VolumeValues { dimensions: [1, 1, 1], voxels: &voxels };
        file.combine_with_volume(CombineVolumeOperation::MultiplyMagnitudeWithVolume, volume).unwrap();
        assert_eq!(file.magnitude([0, 0, 0]), 6.0);

        file.multiply_xyz_by_magnitude();
        assert_eq!(file.vector([0, 0, 0]), [6.0, 6.0, 6.0]);
    }
}
