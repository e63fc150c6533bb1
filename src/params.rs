
//! Plain text files, and parameter files of `key=value` lines.

use std::io::Write;
use std::str::FromStr;
use crate::error::{Error, UnitResult};
use crate::file::{CompareForTesting, DataFile};
use crate::io::TextReader;
use crate::meta::{FileFormat, FormatMatrix};
use crate::meta::header::FileHeader;


/// A text file without header.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFile {
    header: FileHeader,
    text: String,
}

impl Default for TextFile {
    fn default() -> Self {
        TextFile { header: FileHeader::new("Text File", ".txt", "TextFile"), text: String::new() }
    }
}

impl TextFile {
    pub fn new() -> Self { Self::default() }

    pub fn text(&self) -> &str { &self.text }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.header.set_modified();
    }

    pub fn append_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.header.set_modified();
    }
}

impl DataFile for TextFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.text.clear();
    }

    fn is_empty(&self) -> bool { self.text.is_empty() }
    fn has_header(&self) -> bool { false }

    fn read_data(&mut self, _: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        self.text = String::from_utf8_lossy(text.remaining()).into_owned();
        Ok(())
    }

    fn write_data(&self, _: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        write.write_all(self.text.as_bytes())?;
        Ok(())
    }
}


/// Keys of the parameters written by the segmentation and mapping tools.
pub mod param {
    pub const X_DIMENSION: &str = "xdim";
    pub const Y_DIMENSION: &str = "ydim";
    pub const Z_DIMENSION: &str = "zdim";
    pub const RESOLUTION: &str = "resolution";
    pub const HEMISPHERE: &str = "hem";

    pub const AC_X: &str = "ACx";
    pub const AC_Y: &str = "ACy";
    pub const AC_Z: &str = "ACz";
    pub const WHOLE_VOLUME_AC_X: &str = "WholeVolumeACx";
    pub const WHOLE_VOLUME_AC_Y: &str = "WholeVolumeACy";
    pub const WHOLE_VOLUME_AC_Z: &str = "WholeVolumeACz";

    pub const PADDED: &str = "padded";
    pub const OLD_PAD_NEG_X: &str = "OldPadNegX";
    pub const OLD_PAD_NEG_Y: &str = "OldPadNegY";
    pub const OLD_PAD_NEG_Z: &str = "OldPadNegZ";
    pub const OLD_PAD_POS_X: &str = "OldPadPosX";
    pub const OLD_PAD_POS_Y: &str = "OldPadPosY";
    pub const OLD_PAD_POS_Z: &str = "OldPadPosZ";

    pub const CROPPED: &str = "cropped";
    pub const X_MIN: &str = "Xmin";
    pub const Y_MIN: &str = "Ymin";
    pub const Z_MIN: &str = "Zmin";
    pub const CROP_MIN_X: &str = "CropMinX";
    pub const CROP_MIN_Y: &str = "CropMinY";
    pub const CROP_MIN_Z: &str = "CropMinZ";
    pub const CROP_MAX_X: &str = "CropMaxX";
    pub const CROP_MAX_Y: &str = "CropMaxY";
    pub const CROP_MAX_Z: &str = "CropMaxZ";

    pub const CGM_PEAK: &str = "CGMpeak";
    pub const WM_PEAK: &str = "WMpeak";
    pub const WM_THRESHOLD_SET: &str = "WMThreshSet";

    pub const VALUE_YES: &str = "YES";
    pub const VALUE_NO: &str = "NO";
}


/// Named parameters, in the order they were first set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsFile {
    header: FileHeader,
    parameters: Vec<(String, String)>,
}

impl Default for ParamsFile {
    fn default() -> Self {
        ParamsFile { header: FileHeader::new("Params File", ".params", "ParamsFile"), parameters: Vec::new() }
    }
}

impl ParamsFile {
    pub fn new() -> Self { Self::default() }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// The value of a parameter as text.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// The value of a parameter, or `None` if it is missing or cannot be parsed.
    pub fn parameter_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.parameter(key).and_then(|value| value.trim().parse().ok())
    }

    /// Whether a flag parameter has the value `YES`.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.parameter(key).map_or(false, |value| value.trim().eq_ignore_ascii_case(param::VALUE_YES))
    }

    /// Replace the value of an existing parameter or add a new parameter.
    pub fn set_parameter(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();

        match self.parameters.iter_mut().find(|(existing, _)| existing == key) {
            Some((_, existing)) => *existing = value,
            None => self.parameters.push((key.to_string(), value)),
        }

        self.header.set_modified();
    }

    pub fn set_flag(&mut self, key: &str, enabled: bool) {
        self.set_parameter(key, if enabled { param::VALUE_YES } else { param::VALUE_NO });
    }

    pub fn remove_parameter(&mut self, key: &str) {
        let count = self.parameters.len();
        self.parameters.retain(|(existing, _)| existing != key);
        if self.parameters.len() != count { self.header.set_modified(); }
    }
}

impl DataFile for ParamsFile {
    const FORMATS: FormatMatrix = FormatMatrix::NONE.read_write(FileFormat::Ascii);

    fn header(&self) -> &FileHeader { &self.header }
    fn header_mut(&mut self) -> &mut FileHeader { &mut self.header }

    fn clear(&mut self) {
        self.header.clear();
        self.parameters.clear();
    }

    fn is_empty(&self) -> bool { self.parameters.is_empty() }

    fn read_data(&mut self, format: FileFormat, text: &mut TextReader<'_>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("parameters in {} format", format)));
        }

        while let Some(line) = text.next_line() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }

            match line.split_once('=') {
                Some((key, value)) => self.set_parameter(key.trim(), value.trim()),
                None => log::warn!("params line without value: {}", line),
            }
        }

        Ok(())
    }

    fn write_data(&self, format: FileFormat, write: &mut Vec<u8>) -> UnitResult {
        if format != FileFormat::Ascii {
            return Err(Error::unsupported(format!("parameters in {} format", format)));
        }

        for (key, value) in &self.parameters {
            writeln!(write, "{}={}", key, value)?;
        }

        Ok(())
    }
}

impl CompareForTesting for ParamsFile {
    fn compare_file_for_unit_testing(&self, other: &Self, _tolerance: f32) -> std::result::Result<(), String> {
        if self.parameters.len() != other.parameters.len() {
            return Err("Files have a different number of parameters.".to_string());
        }

        for (key, value) in &self.parameters {
            if other.parameter(key) != Some(value.as_str()) {
                return Err(format!("Parameter {} does not match.", key));
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

    #[test]
    fn parameters_round_trip(){
        let mut file = ParamsFile::new();
        file.set_parameter(param::X_DIMENSION, 128);
        file.set_parameter(param::AC_X, 64.5);
        file.set_flag(param::PADDED, true);
        file.set_parameter(param::X_DIMENSION, 256);

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.ends_with("xdim=256\nACx=64.5\npadded=YES\n"));

        let mut read = ParamsFile::new();
        read_file_from_bytes(&mut read, Path::new("a.params"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.compare_file_for_unit_testing(&file, 0.0), Ok(()));
        assert_eq!(read.parameter_as::<i32>(param::X_DIMENSION), Some(256));
        assert_eq!(read.parameter_as::<f32>(param::AC_X), Some(64.5));
        assert!(read.is_enabled(param::PADDED));
        assert!(!read.is_enabled(param::CROPPED));
    }

    #[test]
    fn headerless_parameters(){
        let mut file = ParamsFile::new();
        read_file_from_bytes(&mut file, Path::new("a.params"), b"# made by hand\nhem = left\nbroken\n", ReadOptions::default()).unwrap();
        assert_eq!(file.parameter(param::HEMISPHERE), Some("left"));
        assert_eq!(file.parameters().count(), 1);
    }

    #[test]
    fn text_is_kept_verbatim(){
        let mut file = TextFile::new();
        file.append_line("BeginHeader is just text here");
        file.append_line("second");

        let bytes = write_file_to_bytes(&mut file, WriteOptions::default()).unwrap();
        let mut read = TextFile::new();
        read_file_from_bytes(&mut read, Path::new("notes.txt"), &bytes, ReadOptions::default()).unwrap();
        assert_eq!(read.text(), "BeginHeader is just text here\nsecond\n");
    }
}
