
//! Files of the FreeSurfer suite: curvature, functional data, labels and surfaces.
//! None of them has a caret header. Binary variants are big endian,
//! and may be gzip compressed.

pub mod curvature;
pub mod functional;
pub mod label;
pub mod surface;

pub use curvature::FreeSurferCurvatureFile;
pub use functional::FreeSurferFunctionalFile;
pub use label::FreeSurferLabelFile;
pub use surface::FreeSurferSurfaceFile;

use std::path::Path;
use crate::error::{Error, Result};
use crate::io::{TextReader, parse, tokens};
use crate::meta::FileFormat;


/// Text files are recognized by their suffix, everything else is binary.
pub(crate) fn format_by_suffix(path: &Path, ascii_suffix: &str) -> FileFormat {
    let name = path.file_name().map(|name| name.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
    if name.ends_with(ascii_suffix) { FileFormat::Ascii } else { FileFormat::Binary }
}

/// A line split into tokens, of which at least `count` are required.
pub(crate) fn read_values(text: &mut TextReader<'_>, count: usize, what: &'static str) -> Result<Vec<String>> {
    let line = text.read_non_empty_line()?;
    let values: Vec<String> = tokens(&line).iter().map(|value| value.to_string()).collect();

    if values.len() < count {
        return Err(Error::invalid(format!("{} line has too few values: {}", what, line)));
    }

    Ok(values)
}

/// Parse `vertex x y z value` lines, as used by curvature and label files.
pub(crate) fn parse_vertex_line(values: &[String]) -> Result<(i32, [f32; 3], f32)> {
    Ok((
        parse(&values[0], "vertex number")?,
        [parse(&values[1], "x")?, parse(&values[2], "y")?, parse(&values[3], "z")?],
        parse(&values[4], "value")?,
    ))
}
