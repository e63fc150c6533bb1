
//! Read, write, validate and cross-reference the data files of Caret,
//! bound together by a spec file that lists all files of a subject.
//!
//! Every kind of data file implements [`file::DataFile`], which provides
//! `read_file` and `write_file`. The files of a spec file can be read
//! all at once with [`loader::read_data_files`].

#![forbid(unsafe_code)]
#![forbid(
    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
)]

// TODO #![warn(missing_docs)]


pub mod io;
pub mod codec;
pub mod math;
pub mod meta;
pub mod xml;
pub mod file;
pub mod error;

pub mod node;
pub mod surface;
pub mod border;
pub mod cell;
pub mod deformation_map;
pub mod surefit_vector;
pub mod cocomac;
pub mod multires_morph;
pub mod md_plot;
pub mod params;
pub mod wustl_region;
pub mod mni_obj;
pub mod freesurfer;

pub mod spec;
pub mod projector;
pub mod loader;


pub mod prelude {
    // main exports
    pub use crate::file::{DataFile, CompareForTesting};
    pub use crate::spec::SpecFile;
    pub use crate::loader::{read_data_files, BrainSet, LoaderOptions, LoadedFile, DataFileKind};

    // core data types
    pub use crate::meta::{FileFormat, FormatMatrix, CommentMode, Structure, ReadOptions, WriteOptions};
    pub use crate::meta::header::FileHeader;
    pub use crate::node::NodeAttributeFile;
    pub use crate::math::Vec3;

    // secondary data types
    pub use crate::meta;
    pub use crate::error;
    pub use crate::spec;
}
