
//! Connectivity exported from the CoCoMac database. These files can only be read.

use crate::error::{Error, Result, UnitResult};
use crate::file::DataFile;
use crate::io::TextReader;
use crate::meta::{CommentMode, FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;
use crate::xml::{XmlEvent, XmlEvents};


mod element {
    pub const ROOT: &str = "CoCoMacExport";
    pub const HEADER: &str = "Header";
    pub const VERSION: &str = "CoCoMacVersion";
    pub const EXPORT_DATE: &str = "ExportDate";
    pub const DATA_TYPE: &str = "DataType";
    pub const COMMENTS: &str = "Comments";

    pub const CONNECTIVITY: &str = "ProcessedConnectivityData";
    pub const PRIMARY_PROJECTION: &str = "PrimaryProjection";
    pub const INTEGRATED_PRIMARY_PROJECTION: &str = "IntegratedPrimaryProjection";
    pub const INTEGRATED_RESULTING_PROJECTION: &str = "IntegratedResultingProjection";

    pub const SOURCE_SITE: &str = "SourceSite";
    pub const TARGET_SITE: &str = "TargetSite";
    pub const BRAIN_SITE: &str = "ID_BrainSite";
    pub const LAMINAE: [&str; 3] = ["Laminae", "LaminaeA", "LaminaeB"];
    pub const PATTERN: &str = "Pattern";
    pub const DENSITY: &str = "Density";
    pub const DEGREE: &str = "Degree";
}


/// A projection from a source site to a target site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CocomacProjection {
    pub source_site: String,
    pub target_site: String,
    pub density: String,

    /// The laminae pattern of the target site.
    pub laminae_a: String,

    /// The laminae pattern of the source site.
    pub laminae_b: String,
}


#[derive(Debug, Clone, PartialEq)]
pub struct CocomacConnectivityFile {
    header: FileHeader,
    projections: Vec<CocomacProjection>,
    version: String,
    export_date: String,
    data_type: String,
    comments: String,
}

impl Default for CocomacConnectivityFile {
    fn default() -> Self {
        let mut header = FileHeader::new("CoCoMac File", ".cocomac.xml", element::ROOT);
        header.set_read_format(FileFormat::Xml);
        header.set_write_format(FileFormat::Xml);

        CocomacConnectivityFile {
            header,
            projections: Vec::new(),
            version: String::new(),
            export_date: String::new(),
            data_type: String::new(),
            comments: String::new(),
        }
    }
}

impl CocomacConnectivityFile {
    pub fn new() -> Self { Self::default() }

    pub fn projections(&self) -> &[CocomacProjection] { &self.projections }
    pub fn version(&self) -> &str { &self.version }
    pub fn export_date(&self) -> &str { &self.export_date }
    pub fn data_type(&self) -> &str { &self.data_type }

    /// The comments of the export, which are separate from the file comment.
    pub fn comments(&self) -> &str { &self.comments }

    /// Add the projections of another file to this file.
    pub fn append(&mut self, other: &CocomacConnectivityFile, mode: CommentMode) {
        self.projections.extend(other.projections.iter().cloned());
        self.header.append_file_comment(&other.header, mode);
        self.header.set_modified();
    }

    fn read_header(&mut self, events: &mut XmlEvents<'_>) -> UnitResult {
        let depth = events.open_elements().len();

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("cocomac header is not closed")),
                Some(XmlEvent::End(_)) if events.open_elements().len() < depth => return Ok(()),

                Some(XmlEvent::Start { name, .. }) => {
                    let target = match name.as_str() {
                        element::VERSION => &mut self.version,
                        element::EXPORT_DATE => &mut self.export_date,
                        element::DATA_TYPE => &mut self.data_type,
                        element::COMMENTS => &mut self.comments,
                        _ => { events.skip_element()?; continue; },
                    };

                    *target = events.read_element_text()?.trim().to_string();
                },

                Some(_) => {},
            }
        }
    }

    fn read_connectivity(&mut self, events: &mut XmlEvents<'_>) -> UnitResult {
        let depth = events.open_elements().len();

        loop {
            match events.next_event()? {
                None => return Err(Error::invalid("cocomac connectivity is not closed")),
                Some(XmlEvent::End(_)) if events.open_elements().len() < depth => return Ok(()),

                Some(XmlEvent::Start { name, .. }) => match name.as_str() {
                    element::PRIMARY_PROJECTION
                    | element::INTEGRATED_PRIMARY_PROJECTION
                    | element::INTEGRATED_RESULTING_PROJECTION => {
                        let projection = read_projection(events)?;
                        self.projections.push(projection);
                    },

                    _ => events.skip_element()?,
                },

                Some(_) => {},
            }
        }
    }
}

/// Read the sites and the density of a projection.
/// Call this right after the start event of the projection.
fn read_projection(events: &mut XmlEvents<'_>) -> Result<CocomacProjection> {
    let depth = events.open_elements().len();
    let mut projection = CocomacProjection::default();

    // the innermost site element, and whether it is the target
    let mut site: Option<bool> = None;

    loop {
        match events.next_event()? {
            None => return Err(Error::invalid("cocomac projection is not closed")),
            Some(XmlEvent::End(_)) if events.open_elements().len() < depth => return Ok(projection),

            Some(XmlEvent::Start { name, .. }) => match name.as_str() {
                element::SOURCE_SITE => site = Some(false),
                element::TARGET_SITE => site = Some(true),
                element::DENSITY | element::PATTERN => {},
                name if element::LAMINAE.contains(&name) => {},

                element::BRAIN_SITE => {
                    let text = events.read_element_text()?.trim().to_string();
                    match site {
                        Some(true) => projection.target_site = text,
                        Some(false) => projection.source_site = text,
                        None => log::warn!("cocomac brain site outside of a site element"),
                    }
                },

                element::DEGREE if events.parent() == Some(element::DENSITY) => {
                    projection.density = events.read_element_text()?.trim().to_string();
                },

                _ => events.skip_element()?,
            },

            Some(XmlEvent::Text(text)) => {
                let in_laminae = events.parent().map_or(false, |parent| element::LAMINAE.contains(&parent));
                let in_pattern = events.open_elements().last().map(String::as_str) == Some(element::PATTERN);

                if in_pattern && in_laminae {
                    match site {
                        Some(true) => projection.laminae_a = text.trim().to_string(),
                        Some(false) => projection.laminae_b = text.trim().to_string(),
                        None => {},
                    }
                }
            },

            Some(XmlEvent::End(name)) => {
                if name == element::SOURCE_SITE || name == element::TARGET_SITE {
                    site = None;
                }
            },
        }
    }
}

impl DataFile for CocomacConnectivityFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_only(FileFormat::Xml);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.projections.clear();
        self.version.clear();
        self.export_date.clear();
        self.data_type.clear();
        self.comments.clear();
    }

    fn is_empty(&self) -> bool { self.projections.is_empty() }
    fn has_header(&self) -> bool { false }

    fn detect_format(&self, _path: &std::path::Path, _bytes: &[u8]) -> FileFormat { FileFormat::Xml }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Xml {
            return Err(Error::unsupported(format!("cocomac files in {} format", format)));
        }

        let mut events = XmlEvents::new(text.all_bytes());
        events.read_root(element::ROOT)?;

        while let Some(event) = events.next_event()? {
            let XmlEvent::Start { name, .. } = event else { continue };

            match name.as_str() {
                element::HEADER => self.read_header(&mut events)?,
                element::CONNECTIVITY => self.read_connectivity(&mut events)?,
                other => {
                    log::warn!("cocomac element {} not recognized in root", other);
                    events.skip_element()?;
                },
            }
        }

        Ok(())
    }

    fn write_data(&self, _: FileFormat, _: &mut Vec<u8>) -> UnitResult {
        Err(Error::unsupported("writing cocomac files"))
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::{read_file_from_bytes, write_file_to_bytes};
    use crate::meta::{ReadOptions, WriteOptions};
    use crate::error::ErrorKind;
    use std::path::Path;

    const EXPORT: &str = r#"<?xml version="1.0"?>
        <CoCoMacExport>
            <Header>
                <CoCoMacVersion>1.0</CoCoMacVersion>
                <ExportDate>2004-05-06</ExportDate>
                <DataType>Connectivity</DataType>
                <Comments>axonal tracing</Comments>
            </Header>
            <ProcessedConnectivityData>
                <PrimaryProjection>
                    <SourceSite>
                        <ID_BrainSite>FV91-V1</ID_BrainSite>
                        <Laminae><Pattern>X?XX</Pattern></Laminae>
                    </SourceSite>
                    <TargetSite>
                        <ID_BrainSite>FV91-V2</ID_BrainSite>
                        <LaminaeA><Pattern>1?3</Pattern></LaminaeA>
                    </TargetSite>
                    <Density><Degree>2</Degree></Density>
                </PrimaryProjection>
                <IntegratedResultingProjection>
                    <SourceSite><ID_BrainSite>FV91-V2</ID_BrainSite></SourceSite>
                    <TargetSite><ID_BrainSite>FV91-V4</ID_BrainSite></TargetSite>
                </IntegratedResultingProjection>
                <Unrelated><ID_BrainSite>ignored</ID_BrainSite></Unrelated>
            </ProcessedConnectivityData>
        </CoCoMacExport>
    "#;

    fn read() -> CocomacConnectivityFile {
        let mut file = CocomacConnectivityFile::new();
        read_file_from_bytes(&mut file, Path::new("a.cocomac.xml"), EXPORT.as_bytes(), ReadOptions::default()).unwrap();
        file
    }

    #[test]
    fn projections_and_header(){
        let file = read();
        assert_eq!(file.version(), "1.0");
        assert_eq!(file.export_date(), "2004-05-06");
        assert_eq!(file.comments(), "axonal tracing");
        assert_eq!(file.projections().len(), 2);

        assert_eq!(file.projections()[0], CocomacProjection {
            source_site: "FV91-V1".into(),
            target_site: "FV91-V2".into(),
            density: "2".into(),
            laminae_a: "1?3".into(),
            laminae_b: "X?XX".into(),
        });

        assert_eq!(file.projections()[1].target_site, "FV91-V4");
        assert_eq!(file.projections()[1].density, "");
    }

    #[test]
    fn read_only(){
        let mut file = read();
        let error = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FormatUnsupported);
    }

    #[test]
    fn append_keeps_order(){
        let mut file = read();
        file.append(&read(), CommentMode::Append);
        assert_eq!(file.projections().len(), 4);
        assert_eq!(file.projections()[2].source_site, "FV91-V1");
        assert!(file.is_modified());
    }
}
