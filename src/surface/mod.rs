
//! Surface geometry: the coordinates of the nodes and the triangles connecting them.
//! Projection and unprojection of borders, cells and foci work on these.

pub mod coordinate;
pub mod topology;

use std::fmt;

pub use coordinate::CoordinateFile;
pub use topology::TopologyFile;


/// The shape a coordinate file describes.
/// Stored in the `configuration_id` header tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceConfiguration {
    Raw,
    Fiducial,
    Inflated,
    VeryInflated,
    Spherical,
    Ellipsoidal,
    CompressedMedialWall,
    Flat,
    LobarFlat,
    Hull,

    #[default]
    Unknown,
}

impl SurfaceConfiguration {

    /// All configurations in the order surfaces are loaded.
    pub const ALL: [SurfaceConfiguration; 11] = [
        SurfaceConfiguration::Raw, SurfaceConfiguration::Fiducial, SurfaceConfiguration::Inflated,
        SurfaceConfiguration::VeryInflated, SurfaceConfiguration::Spherical, SurfaceConfiguration::Ellipsoidal,
        SurfaceConfiguration::CompressedMedialWall, SurfaceConfiguration::Flat, SurfaceConfiguration::LobarFlat,
        SurfaceConfiguration::Hull, SurfaceConfiguration::Unknown,
    ];

    /// The value of the `configuration_id` header tag.
    pub fn id(self) -> &'static str {
        match self {
            SurfaceConfiguration::Raw => "RAW",
            SurfaceConfiguration::Fiducial => "FIDUCIAL",
            SurfaceConfiguration::Inflated => "INFLATED",
            SurfaceConfiguration::VeryInflated => "VERY_INFLATED",
            SurfaceConfiguration::Spherical => "SPHERICAL",
            SurfaceConfiguration::Ellipsoidal => "ELLIPSOIDAL",
            SurfaceConfiguration::CompressedMedialWall => "CMW",
            SurfaceConfiguration::Flat => "FLAT",
            SurfaceConfiguration::LobarFlat => "FLAT_LOBAR",
            SurfaceConfiguration::Hull => "HULL",
            SurfaceConfiguration::Unknown => "UNKNOWN",
        }
    }

    /// Parse a `configuration_id`, ignoring case. Unknown names are `Unknown`.
    pub fn from_id(id: &str) -> Self {
        let id = id.trim();
        Self::ALL.iter().copied()
            .find(|configuration| configuration.id().eq_ignore_ascii_case(id))
            .unwrap_or(SurfaceConfiguration::Unknown)
    }

    /// Whether the surface lies in a plane.
    pub fn is_flat(self) -> bool {
        matches!(self, SurfaceConfiguration::Flat | SurfaceConfiguration::LobarFlat)
    }
}

impl fmt::Display for SurfaceConfiguration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.id())
    }
}


/// How the triangles of a topology cover the surface.
/// Stored in the `perimeter_id` header tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopologyType {
    Closed,
    Open,
    Cut,
    LobarCut,

    #[default]
    Unknown,
}

impl TopologyType {

    /// The order in which topologies are loaded.
    pub const LOAD_ORDER: [TopologyType; 5] = [
        TopologyType::Unknown, TopologyType::LobarCut, TopologyType::Cut,
        TopologyType::Open, TopologyType::Closed,
    ];

    /// The value of the `perimeter_id` header tag.
    pub fn perimeter_id(self) -> &'static str {
        match self {
            TopologyType::Closed => "CLOSED",
            TopologyType::Open => "OPEN",
            TopologyType::Cut => "CUT",
            TopologyType::LobarCut => "LOBAR_CUT",
            TopologyType::Unknown => "UNKNOWN",
        }
    }

    /// Parse a `perimeter_id`. Unknown names are `Unknown`.
    pub fn from_perimeter_id(id: &str) -> Self {
        match id.trim().to_ascii_uppercase().as_str() {
            "CLOSED" => TopologyType::Closed,
            "OPEN" => TopologyType::Open,
            "CUT" => TopologyType::Cut,
            "LOBAR_CUT" => TopologyType::LobarCut,
            _ => TopologyType::Unknown,
        }
    }
}

impl fmt::Display for TopologyType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.perimeter_id())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_round_trip(){
        for configuration in SurfaceConfiguration::ALL {
            assert_eq!(SurfaceConfiguration::from_id(configuration.id()), configuration);
        }

        assert_eq!(SurfaceConfiguration::from_id("cmw"), SurfaceConfiguration::CompressedMedialWall);
        assert_eq!(SurfaceConfiguration::from_id("TORUS"), SurfaceConfiguration::Unknown);

        for topology in TopologyType::LOAD_ORDER {
            assert_eq!(TopologyType::from_perimeter_id(topology.perimeter_id()), topology);
        }
    }
}
