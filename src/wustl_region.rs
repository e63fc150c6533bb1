
//! Region of interest time courses exported by the WUSTL fMRI tools.
//! These files can only be read.
//!
//! A time course starts with a `Time course:` line naming it. Each region of a
//! time course starts with a `REGION <number> <name> [<voxels>]` line, followed by
//! one line per case holding the case name and its values.
//! Lines starting with `#` are comments.

use crate::error::{Error, UnitResult};
use crate::file::DataFile;
use crate::io::{TextReader, parse, split_tag_line, tokens};
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;


const TIME_COURSE: &str = "time course:";
const REGION: &str = "REGION";


#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionCase {
    pub name: String,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub number: i32,
    pub name: String,
    pub number_of_voxels: usize,
    pub cases: Vec<RegionCase>,
}

impl Region {
    pub fn case_with_name(&self, name: &str) -> Option<&RegionCase> {
        self.cases.iter().find(|case| case.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeCourse {
    pub name: String,
    pub regions: Vec<Region>,
}

impl TimeCourse {
    pub fn region_with_name(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.name == name)
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct WustlRegionFile {
    header: FileHeader,
    time_courses: Vec<TimeCourse>,
}

impl Default for WustlRegionFile {
    fn default() -> Self {
        WustlRegionFile {
            header: FileHeader::new("WUSTL Region File", ".wustl_txt", "WustlRegionFile"),
            time_courses: Vec::new(),
        }
    }
}

impl WustlRegionFile {
    pub fn new() -> Self { Self::default() }

    pub fn time_courses(&self) -> &[TimeCourse] { &self.time_courses }
    pub fn number_of_time_courses(&self) -> usize { self.time_courses.len() }

    /// Names of all regions of all time courses, without duplicates, in file order.
    pub fn all_region_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for region in self.time_courses.iter().flat_map(|course| &course.regions) {
            if !names.contains(&region.name.as_str()) {
                names.push(&region.name);
            }
        }

        names
    }

    fn current_time_course(&mut self) -> &mut TimeCourse {
        if self.time_courses.is_empty() {
            self.time_courses.push(TimeCourse::default());
        }

        let last = self.time_courses.len() - 1;
        &mut self.time_courses[last]
    }
}

impl DataFile for WustlRegionFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_only(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.time_courses.clear();
    }

    fn is_empty(&self) -> bool { self.time_courses.is_empty() }
    fn has_header(&self) -> bool { false }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("wustl regions in {} format", format)));
        }

        while let Some(line) = text.next_line() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }

            let lowercase = line.to_ascii_lowercase();
            if lowercase.starts_with(TIME_COURSE) {
                let name = line[TIME_COURSE.len() ..].trim().to_string();
                self.time_courses.push(TimeCourse { name, regions: Vec::new() });
                continue;
            }

            let (first, rest) = split_tag_line(line);
            if first.eq_ignore_ascii_case(REGION) {
                let values = tokens(rest);
                let number = parse(values.first().copied().unwrap_or(""), "region number")?;
                let name = values.get(1).copied().unwrap_or("").to_string();
                let number_of_voxels = match values.get(2) {
                    Some(voxels) => parse(voxels.trim_start_matches("nvox="), "region voxel count")?,
                    None => 0,
                };

                self.current_time_course().regions.push(Region { number, name, number_of_voxels, cases: Vec::new() });
                continue;
            }

            let region = self.current_time_course().regions.last_mut()
                .ok_or_else(|| Error::invalid(format!("wustl region values before the first region: {}", line)))?;

            let values = tokens(rest).iter()
                .map(|value| parse(value, "region value"))
                .collect::<Result<Vec<f32>, _>>()?;

            region.cases.push(RegionCase { name: first.to_string(), values });
        }

        Ok(())
    }

    fn write_data(&self, _: FileFormat, _: &mut Vec<u8>) -> UnitResult {
        Err(Error::unsupported("writing wustl region files"))
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::file::read_file_from_bytes;
    use crate::meta::ReadOptions;
    use std::path::Path;

    const REGIONS: &str = "# exported regions
Time course: visual
REGION 1 V1_left nvox=120
subject1 0.5 0.25 -1
subject2 1 2 3
REGION 2 MT 40
subject1 7

Time course: motor
REGION 1 M1 10
subject1 0.0
";

    #[test]
    fn time_courses_regions_and_cases(){
        let mut file = WustlRegionFile::new();
        read_file_from_bytes(&mut file, Path::new("a.wustl_txt"), REGIONS.as_bytes(), ReadOptions::default()).unwrap();

        assert_eq!(file.number_of_time_courses(), 2);
        let visual = &file.time_courses()[0];
        assert_eq!(visual.name, "visual");
        assert_eq!(visual.regions.len(), 2);

        let v1 = visual.region_with_name("V1_left").unwrap();
        assert_eq!(v1.number_of_voxels, 120);
        assert_eq!(v1.case_with_name("subject1").unwrap().values, vec![0.5, 0.25, -1.0]);
        assert_eq!(visual.regions[1].number_of_voxels, 40);

        assert_eq!(file.all_region_names(), vec!["V1_left", "MT", "M1"]);
    }

    #[test]
    fn values_need_a_region(){
        let mut file = WustlRegionFile::new();
        assert!(read_file_from_bytes(&mut file, Path::new("a.wustl_txt"), b"subject1 1 2\n", ReadOptions::default()).is_err());
    }
}
