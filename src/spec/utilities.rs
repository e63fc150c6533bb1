
//! Copy, move and bundle a spec file together with its data files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use crate::error::{Error, Result};
use crate::file::DataFile;
use crate::spec::{FileType, SpecFile, base_name, extension, tag};
use crate::spec::entry::{resolve, with_gzip_suffix};


/// What happens to the data files when a spec file is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {

    /// Copy the data files next to the new spec file.
    CopyAll,

    /// Move the data files next to the new spec file and remove the old spec file.
    MoveAll,

    /// Leave the data files where they are and list them with absolute paths.
    PointToDataFiles,

    None,
}

/// The data files that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyReport {
    pub errors: Vec<String>,
}

impl CopyReport {
    pub fn is_ok(&self) -> bool { self.errors.is_empty() }

    /// One line per failed file.
    pub fn message(&self) -> String {
        self.errors.iter().map(|error| format!("ERROR processing: {}\n", error)).collect()
    }
}


/// Write the spec file to the target, which may be a directory, and copy or move its data files there.
/// Failing data files do not stop the copy, they are listed in the report instead.
/// Scene files are always copied.
pub fn copy_spec_file(source: &Path, target: &Path, mode: CopyMode) -> Result<CopyReport> {
    if mode == CopyMode::None {
        return Err(Error::invalid("no copy mode selected for copying a spec file"));
    }

    let mut spec = SpecFile::from_file(source)?;
    let source_directory = source.parent().map(Path::to_path_buf).unwrap_or_default();

    let target = match source.file_name() {
        Some(name) if target.is_dir() => target.join(name),
        _ => target.to_path_buf(),
    };

    let target_directory = target.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut report = CopyReport::default();

    for entry_index in 0 .. spec.entries().len() {
        let entry = &spec.entries()[entry_index];
        let entry_mode = if entry.tag() == tag::SCENE { CopyMode::CopyAll } else { mode };
        let is_volume = entry.file_type() == FileType::Volume;
        let entry_tag = entry.tag();

        let Some(entry) = spec.entry_mut(entry_tag) else { continue };

        for file in entry.files_mut() {
            if file.filename.is_empty() {
                continue;
            }

            let input = resolve(&source_directory, &file.filename);

            if entry_mode == CopyMode::PointToDataFiles {
                file.filename = absolute(&input).to_string_lossy().into_owned();

                if !file.data_file_name.is_empty() {
                    let data = resolve(&source_directory, &file.data_file_name);
                    file.data_file_name = absolute(&data).to_string_lossy().into_owned();
                }

                continue;
            }

            let name = base_name(&file.filename).to_string();
            if let Err(error) = transfer(&input, &target_directory.join(&name), entry_mode) {
                log::warn!("cannot copy {}: {}", input.display(), error);
                report.errors.push(name.clone());
            }

            if is_volume && has_separate_data_file(&name) {
                let data = if file.data_file_name.is_empty() { volume_data_file_name(&input) }
                    else { existing_data_file(&resolve(&source_directory, &file.data_file_name)) };

                match data {
                    Some(data) => {
                        let data_name = base_name(&data.to_string_lossy()).to_string();
                        if let Err(error) = transfer(&data, &target_directory.join(&data_name), entry_mode) {
                            log::warn!("cannot copy {}: {}", data.display(), error);
                            report.errors.push(data_name.clone());
                        }

                        file.data_file_name = data_name;
                    },

                    None => report.errors.push(format!("{} (volume data)", name)),
                }
            }

            file.filename = name;
        }
    }

    spec.write_file(&target)?;

    if mode == CopyMode::MoveAll && absolute(source) != absolute(&target) {
        fs::remove_file(source)?;
    }

    log::info!("copied {} to {} with {} errors", source.display(), target.display(), report.errors.len());
    Ok(report)
}

/// Analyze, AFNI and NIfTI-pair headers store the voxels in a separate file.
fn has_separate_data_file(name: &str) -> bool {
    ![extension::NIFTI_VOLUME, extension::NIFTI_GZIP_VOLUME, extension::MINC_VOLUME]
        .iter().any(|volume_extension| name.ends_with(volume_extension))
}

fn existing_data_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() { return Some(path.to_path_buf()); }

    let compressed = with_gzip_suffix(path);
    if compressed.is_file() { Some(compressed) } else { None }
}

/// The existing data file of a volume header, preferring the uncompressed file.
/// `None` for volume formats that keep header and voxels in one file.
pub fn volume_data_file_name(header: &Path) -> Option<PathBuf> {
    let name = header.file_name()?.to_str()?;

    let data_extension = if name.ends_with(extension::ANALYZE_VOLUME) || name.ends_with(extension::WU_NIL_VOLUME) { "img" }
        else if name.ends_with(extension::AFNI_VOLUME) { "BRIK" }
        else { return None };

    existing_data_file(&header.with_extension(data_extension))
}

fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    if path.is_absolute() { return path.to_path_buf(); }

    std::env::current_dir()
        .map(|directory| directory.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Copy or move a file, unless it would be replaced by itself.
fn transfer(source: &Path, target: &Path, mode: CopyMode) -> std::io::Result<()> {
    if absolute(source) == absolute(target) {
        return Ok(());
    }

    match mode {
        CopyMode::MoveAll => move_file(source, target),
        _ => fs::copy(source, target).map(|_| ()),
    }
}

fn move_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    // renaming fails across file systems
    fs::copy(source, target)?;
    fs::remove_file(source)
}


/// The spec files in a directory, sorted by name.
pub fn find_spec_files_in_directory(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && path.to_string_lossy().ends_with(extension::SPEC) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}


/// How to create a zip archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipOptions {

    /// The program and its leading arguments. The archive name and the directory are appended.
    pub command: String,

    /// Where the files are collected before zipping. Defaults to the system temporary directory.
    pub temporary_directory: Option<PathBuf>,
}

impl Default for ZipOptions {
    fn default() -> Self {
        ZipOptions { command: "zip -r".to_string(), temporary_directory: None }
    }
}

/// Removes a directory tree when dropped.
struct RemoveDirectory(PathBuf);

impl Drop for RemoveDirectory {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_dir_all(&self.0) {
            log::warn!("cannot remove {}: {}", self.0.display(), error);
        }
    }
}

/// Copy the spec file and all its data files into a directory and zip that directory.
/// Unpacking the archive yields the directory. Returns the path of the archive.
pub fn zip_spec_file(source: &Path, zip_name: &Path, unzip_directory_name: &str, options: &ZipOptions) -> Result<PathBuf> {
    let spec = SpecFile::from_file(source)?;

    if let Err(error) = spec.validate() {
        return Err(Error::DependencyMissing(format!(
            "Missing data files so unable to zip {}:\n{}", source.display(), error
        ).into()));
    }

    if zip_name.as_os_str().is_empty() {
        return Err(Error::invalid("zip file name is empty"));
    }

    if unzip_directory_name.trim().is_empty() {
        return Err(Error::invalid("unzip directory name is empty"));
    }

    let mut zip_name = zip_name.to_path_buf();
    if !zip_name.to_string_lossy().ends_with(extension::ZIP) {
        let mut name = zip_name.into_os_string();
        name.push(extension::ZIP);
        zip_name = PathBuf::from(name);
    }

    let zip_path = absolute(&zip_name);
    let zip_file_name = base_name(&zip_path.to_string_lossy()).to_string();

    let temporary = options.temporary_directory.clone().unwrap_or_else(std::env::temp_dir);
    let collect_directory = temporary.join(unzip_directory_name);

    fs::create_dir_all(&collect_directory).map_err(Error::IoWriteFailed)?;
    let _remove = RemoveDirectory(collect_directory.clone());

    let report = copy_spec_file(source, &collect_directory, CopyMode::CopyAll)?;
    if !report.is_ok() {
        return Err(Error::DependencyMissing(report.message().into()));
    }

    let mut arguments = options.command.split_whitespace();
    let program = arguments.next()
        .ok_or_else(|| Error::invalid("zip command is empty"))?;

    let command_line = format!("{} {} {}", options.command, zip_file_name, unzip_directory_name);
    log::info!("running {} in {}", command_line, temporary.display());

    let status = Command::new(program)
        .args(arguments)
        .arg(&zip_file_name)
        .arg(unzip_directory_name)
        .current_dir(&temporary)
        .status();

    match status {
        Ok(status) if status.success() => {},
        Ok(status) => return Err(Error::ExternalToolFailed { command: command_line, status: status.to_string() }),
        Err(error) => return Err(Error::ExternalToolFailed { command: command_line, status: error.to_string() }),
    }

    let archive = temporary.join(&zip_file_name);
    if archive != zip_path {
        move_file(&archive, &zip_path).map_err(Error::IoWriteFailed)?;
    }

    Ok(zip_path)
}


#[cfg(test)]
mod test {
    use super::*;

    fn write(path: &Path, text: &str) {
        fs::write(path, text).unwrap();
    }

    fn source_tree() -> (tempfile::TempDir, PathBuf) {
        let directory = tempfile::tempdir().unwrap();
        let data = directory.path().join("data");
        fs::create_dir(&data).unwrap();

        write(&data.join("closed.topo"), "topology");
        write(&data.join("anatomy.hdr"), "header");
        write(&data.join("anatomy.img.gz"), "voxels");
        write(&data.join("views.scene"), "scene");

        let spec = data.join("brain.spec");
        write(&spec, "BeginHeader\nEndHeader\nCLOSEDtopo_file closed.topo\nvolume_anatomy_file anatomy.hdr\nscene_file views.scene\npaint_file missing.paint\n");
        (directory, spec)
    }

    #[test]
    fn copy_all_collects_files_next_to_the_spec(){
        let (directory, spec) = source_tree();
        let target = directory.path().join("copy");
        fs::create_dir(&target).unwrap();

        let report = copy_spec_file(&spec, &target, CopyMode::CopyAll).unwrap();
        assert_eq!(report.errors, vec!["missing.paint".to_string()]);
        assert!(report.message().contains("ERROR processing: missing.paint"));

        for name in ["brain.spec", "closed.topo", "anatomy.hdr", "anatomy.img.gz", "views.scene"] {
            assert!(target.join(name).is_file(), "{} was not copied", name);
        }

        let copied = SpecFile::from_file(target.join("brain.spec")).unwrap();
        let anatomy = &copied.entry(tag::VOLUME_ANATOMY).unwrap().files()[0];
        assert_eq!(anatomy.data_file_name, "anatomy.img.gz");
        assert!(spec.is_file());
    }

    #[test]
    fn move_all_removes_the_source(){
        let (directory, spec) = source_tree();
        let target = directory.path().join("moved.spec");

        copy_spec_file(&spec, &target, CopyMode::MoveAll).unwrap();
        assert!(target.is_file());
        assert!(!spec.exists());
        assert!(!directory.path().join("data/closed.topo").exists());
        assert!(directory.path().join("closed.topo").is_file());

        // scenes are copied even when moving
        assert!(directory.path().join("data/views.scene").is_file());
    }

    #[test]
    fn point_to_data_files_keeps_data_in_place(){
        let (directory, spec) = source_tree();
        let target = directory.path().join("pointer.spec");

        let report = copy_spec_file(&spec, &target, CopyMode::PointToDataFiles).unwrap();
        assert!(report.is_ok());

        let pointer = SpecFile::from_file(&target).unwrap();
        let topology = &pointer.entry(tag::CLOSED_TOPO).unwrap().files()[0];
        assert!(Path::new(&topology.filename).is_absolute());
        assert!(Path::new(&topology.filename).is_file());
        assert!(directory.path().join("data/closed.topo").is_file());
    }

    #[test]
    fn no_mode_is_an_error(){
        let (directory, spec) = source_tree();
        assert!(copy_spec_file(&spec, directory.path(), CopyMode::None).is_err());
    }

    #[test]
    fn data_files_of_volume_headers(){
        let directory = tempfile::tempdir().unwrap();
        write(&directory.path().join("a.hdr"), "");
        write(&directory.path().join("a.img"), "");
        write(&directory.path().join("b.HEAD"), "");
        write(&directory.path().join("b.BRIK.gz"), "");

        assert_eq!(volume_data_file_name(&directory.path().join("a.hdr")), Some(directory.path().join("a.img")));
        assert_eq!(volume_data_file_name(&directory.path().join("b.HEAD")), Some(directory.path().join("b.BRIK.gz")));
        assert_eq!(volume_data_file_name(&directory.path().join("c.ifh")), None);
        assert_eq!(volume_data_file_name(&directory.path().join("d.nii.gz")), None);
    }

    #[test]
    fn spec_files_in_directory(){
        let (_directory, spec) = source_tree();
        let found = find_spec_files_in_directory(spec.parent().unwrap()).unwrap();
        assert_eq!(found, vec![spec]);
    }

    #[test]
    fn zip_needs_all_data_files(){
        let (directory, spec) = source_tree();
        let options = ZipOptions { temporary_directory: Some(directory.path().to_path_buf()), ..ZipOptions::default() };

        let error = zip_spec_file(&spec, &directory.path().join("bundle"), "bundle", &options).unwrap_err();
        assert!(error.to_string().contains("missing.paint"));
        assert!(!directory.path().join("bundle").exists());
    }
}
