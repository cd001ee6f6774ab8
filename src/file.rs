use indicatif::{ParallelProgressIterator, ProgressIterator};
use itertools::Itertools;
use rayon::iter::IntoParallelIterator;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use rust_search::SearchBuilder;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub const DICM_PREFIX: &[u8; 4] = b"DICM";
pub const DICM_PREFIX_LOCATION: u64 = 128;

/// Extensions of single-slice raster formats read through the `image` crate
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

type IOResult<T> = Result<T, std::io::Error>;

pub fn default_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

pub fn default_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner
}

/// Filter map function for boolean tuple results with the following logic:
/// - Boolean true results are propagated
/// - Boolean false results are filtered
/// - Errors are propagated
fn filter_fn_bool_tuple<T, E>(r: Result<(bool, T), E>) -> Option<Result<T, E>> {
    match r {
        Ok((true, p)) => Some(Ok(p)),
        Ok((false, _)) => None,
        Err(e) => Some(Err(e)),
    }
}

pub trait Inode
where
    Self: AsRef<Path>,
{
    /// Get the inode of a path.
    fn inode(&self) -> IOResult<u64> {
        let metadata = std::fs::metadata(self.as_ref())?;
        Ok(metadata.ino())
    }

    /// Get the inode of a path, or a default value if an error occurs.
    fn inode_or(&self, value: u64) -> u64 {
        self.inode().unwrap_or(value)
    }
}

impl<P: AsRef<Path>> Inode for P {}

pub trait InodeSort<P>
where
    P: AsRef<Path> + Inode,
    Self: Iterator<Item = P>,
{
    /// Sort paths by inode number.
    fn sorted_by_inode(&mut self) -> impl Iterator<Item = P> {
        self.map(|p| (p.inode_or(0), p))
            .sorted_unstable_by_key(|(i, _)| *i)
            .map(|(_, p)| p)
    }

    /// Like `sorted_by_inode`, but with a progress bar or spinner.
    /// The progress bar tracks the querying of the inode numbers, but not the sorting.
    fn sorted_by_inode_with_progress(&mut self) -> impl Iterator<Item = P> {
        let (_, total) = self.size_hint();
        let pb = match total {
            Some(total) => default_bar(total as u64),
            None => default_spinner(),
        };
        pb.set_message("Sorting paths by inode");
        self.map(|p| (p.inode_or(0), p))
            .progress_with(pb)
            .sorted_unstable_by_key(|(i, _)| *i)
            .map(|(_, p)| p)
    }
}

impl<P: AsRef<Path> + Inode, I: Iterator<Item = P>> InodeSort<P> for I {}

pub trait SourceFileOperations
where
    Self: AsRef<Path>,
{
    /// Read a file containing a list of paths, one per line. Blank lines are skipped.
    fn read_paths(&self) -> IOResult<impl Iterator<Item = IOResult<PathBuf>>> {
        let reader = BufReader::new(File::open(self.as_ref())?);
        let result = reader.lines().filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(Ok(PathBuf::from(line.trim()))),
            Err(e) => Some(Err(e)),
        });
        Ok(result)
    }
}

impl<P: AsRef<Path>> SourceFileOperations for P {}

pub trait DicomFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has a DICM prefix.
    /// This will only return an error if the file cannot be opened.
    /// Any other errors mapped to `false`.
    fn has_dicm_prefix(&self) -> IOResult<bool> {
        let mut reader = File::open(self.as_ref())?;
        let mut buffer = [0; DICM_PREFIX.len()];
        reader
            .seek(SeekFrom::Start(DICM_PREFIX_LOCATION))
            .and_then(|_| reader.read_exact(&mut buffer))
            .map_or(Ok(false), |_| Ok(&buffer == DICM_PREFIX))
    }

    /// Check if a file has a DICOM extension.
    fn has_dicom_extension(&self) -> bool {
        match self.as_ref().extension() {
            Some(ext) => ext == "dcm" || ext == "dicom" || ext == "DCM" || ext == "DICOM",
            None => false,
        }
    }

    /// Check if a path is a DICOM file as efficiently as possible.
    /// The function will use the file extension if available, otherwise it will check the DICM prefix.
    fn is_dicom_file(&self) -> IOResult<bool> {
        let path = self.as_ref();
        if self.has_dicom_extension() {
            Ok(path.is_file())
        } else if path.extension().is_some() || path.is_dir() {
            Ok(false)
        } else {
            self.has_dicm_prefix()
        }
    }

    /// Similar to `is_dicom_file`, but returns a default value if an error occurs.
    fn is_dicom_file_or(&self, default: bool) -> bool {
        self.is_dicom_file().unwrap_or(default)
    }
}

impl<P: AsRef<Path>> DicomFileOperations for P {}

pub trait TiffFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has a TIFF extension.
    fn has_tiff_extension(&self) -> bool {
        match self.as_ref().extension() {
            Some(ext) => ext == "tiff" || ext == "tif" || ext == "TIFF" || ext == "TIF",
            None => false,
        }
    }

    /// Check if a path is a TIFF file.
    fn is_tiff_file(&self) -> IOResult<bool> {
        // Extensionless TIFF files are not recognized
        Ok(self.as_ref().is_file() && self.has_tiff_extension())
    }

    /// Similar to `is_tiff_file`, but returns a default value if an error occurs.
    fn is_tiff_file_or(&self, default: bool) -> bool {
        self.is_tiff_file().unwrap_or(default)
    }
}

impl<P: AsRef<Path>> TiffFileOperations for P {}

/// Discovery of files that can be read as a volume
pub trait VolumeFileOperations
where
    Self: AsRef<Path> + DicomFileOperations + TiffFileOperations,
{
    /// Check if a file has the extension of a supported single-slice raster format.
    fn has_image_extension(&self) -> bool {
        self.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Check if a path is any readable volume: TIFF, DICOM or a raster image.
    fn is_volume_file(&self) -> IOResult<bool> {
        if self.is_tiff_file()? {
            return Ok(true);
        }
        if self.has_image_extension() {
            return Ok(self.as_ref().is_file());
        }
        self.is_dicom_file()
    }

    /// Similar to `is_volume_file`, but returns a default value if an error occurs.
    fn is_volume_file_or(&self, default: bool) -> bool {
        self.is_volume_file().unwrap_or(default)
    }

    /// Find all volume files in a directory, recursively.
    fn find_volumes(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let result = SearchBuilder::default()
            .location(dir)
            .build()
            .map(PathBuf::from)
            .filter(|file| file.is_volume_file_or(false));
        Ok(result)
    }

    /// Find all volume files in a directory, with a progress spinner.
    fn find_volumes_with_spinner(&self) -> IOResult<impl Iterator<Item = PathBuf>> {
        let spinner = default_spinner();
        spinner.set_message("Searching for volume files");
        let result = self.find_volumes()?.inspect(move |_| {
            spinner.tick();
        });
        Ok(result)
    }

    /// Read volume paths from a text file. Propagates any errors encountered in opening the text file
    /// or in validating the paths. Paths are filtered using `is_volume_file`.
    fn read_volume_paths(&self) -> IOResult<impl Iterator<Item = PathBuf>>
    where
        Self: SourceFileOperations,
    {
        let result = self
            .read_paths()?
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|r| r.and_then(|p| p.is_volume_file().map(|is_volume| (is_volume, p))))
            .filter_map(filter_fn_bool_tuple)
            .collect::<IOResult<Vec<_>>>()?
            .into_iter();
        Ok(result)
    }

    /// Like `read_volume_paths`, but with a progress bar.
    fn read_volume_paths_with_bar(&self) -> IOResult<impl Iterator<Item = PathBuf>>
    where
        Self: SourceFileOperations,
    {
        let paths = self.read_paths()?.collect::<Vec<_>>();

        let pb = default_bar(paths.len() as u64);
        pb.set_message("Reading volume paths from text file");

        let result = paths
            .into_par_iter()
            .progress_with(pb)
            .map(|r| r.and_then(|p| p.is_volume_file().map(|is_volume| (is_volume, p))))
            .filter_map(filter_fn_bool_tuple)
            .collect::<IOResult<Vec<_>>>()?
            .into_iter();
        Ok(result)
    }
}

impl<P: AsRef<Path>> VolumeFileOperations for P {}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case::empty_file(vec![], false)]
    #[case::dicm_prefix(b"DICM".to_vec(), true)]
    #[case::wrong_prefix(b"NOT_DICM".to_vec(), false)]
    fn test_has_dicm_prefix(#[case] contents: Vec<u8>, #[case] expected: bool) {
        let mut temp = NamedTempFile::new().unwrap();
        temp.seek(SeekFrom::Start(DICM_PREFIX_LOCATION)).unwrap();
        temp.write_all(&contents).unwrap();

        let result = temp.path().has_dicm_prefix().unwrap();
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case::no_extension("test", false)]
    #[case::wrong_extension("test.txt", false)]
    #[case::dcm_extension("test.dcm", true)]
    #[case::dicom_extension("test.dicom", true)]
    #[case::dcm_extension_uppercase("test.DCM", true)]
    #[case::mixed_case("test.DiCoM", false)]
    fn test_has_dicom_extension(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(PathBuf::from(path).has_dicom_extension(), expected);
    }

    #[test]
    fn test_is_dicom_file_real_dicom() {
        let path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        assert!(path.is_dicom_file().unwrap());
    }

    #[rstest]
    #[case("test.tiff", true)]
    #[case("test.TIF", true)]
    #[case("path/to/test.tiff", true)]
    #[case("test.tif.txt", false)]
    #[case("test", false)]
    fn test_tiff_extension(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(PathBuf::from(path).has_tiff_extension(), expected);
    }

    #[rstest]
    #[case("slice.png", true)]
    #[case("slice.JPG", true)]
    #[case("slice.jpeg", true)]
    #[case("slice.bmp", true)]
    #[case("slice.tiff", false)]
    #[case("slice.gif", false)]
    #[case("slice", false)]
    fn test_image_extension(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(PathBuf::from(path).has_image_extension(), expected);
    }

    #[rstest]
    #[case("volume.tiff", true)]
    #[case("slice.png", true)]
    #[case("notes.txt", false)]
    #[case("nonexistent.tiff", false)]
    #[case("nonexistent.png", false)]
    fn test_is_volume_file(#[case] filename: &str, #[case] expected: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join(filename);
        if !filename.starts_with("nonexistent") {
            std::fs::write(&file_path, "test").unwrap();
        }
        assert_eq!(file_path.is_volume_file().unwrap(), expected);
        assert_eq!(file_path.is_volume_file_or(!expected), expected);
    }

    #[rstest]
    #[case::no_spinner(false)]
    #[case::spinner(true)]
    fn test_find_volumes(#[case] spinner: bool) {
        let temp_dir = tempfile::tempdir().unwrap();

        // A DICOM without extension, a TIFF and a PNG in a subdirectory
        let dicom_path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        let dicom_dest = temp_dir.path().join("ct");
        std::fs::copy(&dicom_path, &dicom_dest).unwrap();
        let tiff_dest = temp_dir.path().join("mask.tiff");
        std::fs::write(&tiff_dest, "test").unwrap();
        let sub_dir = temp_dir.path().join("subdir");
        std::fs::create_dir(&sub_dir).unwrap();
        let png_dest = sub_dir.join("slice.png");
        std::fs::write(&png_dest, "test").unwrap();

        // Not volumes
        std::fs::write(temp_dir.path().join("notes.txt"), "text").unwrap();
        std::fs::write(temp_dir.path().join("README"), "text").unwrap();

        let files: Vec<_> = match spinner {
            true => temp_dir
                .path()
                .find_volumes_with_spinner()
                .unwrap()
                .collect(),
            false => temp_dir.path().find_volumes().unwrap().collect(),
        };
        assert_eq!(files.len(), 3);
        assert!(files.contains(&dicom_dest));
        assert!(files.contains(&tiff_dest));
        assert!(files.contains(&png_dest));
    }

    #[test]
    fn test_find_volumes_not_a_directory() {
        let temp = NamedTempFile::new().unwrap();
        assert!(temp.path().find_volumes().is_err());
    }

    #[rstest]
    #[case::no_spinner(false)]
    #[case::spinner(true)]
    fn test_inode_sort(#[case] spinner: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file1 = temp_dir.path().join("file1.txt");
        let file2 = temp_dir.path().join("file2.txt");
        let file3 = temp_dir.path().join("file3.txt");
        std::fs::write(&file1, "file1").unwrap();
        std::fs::write(&file2, "file2").unwrap();
        std::fs::write(&file3, "file3").unwrap();

        let paths = vec![&file2, &file3, &file1];
        let sorted: Vec<_> = match spinner {
            true => paths.into_iter().sorted_by_inode_with_progress().collect(),
            false => paths.into_iter().sorted_by_inode().collect(),
        };
        assert_eq!(sorted.len(), 3);

        let inodes: Vec<u64> = sorted.iter().map(|p| p.inode().unwrap()).collect();
        for i in 1..inodes.len() {
            assert!(inodes[i - 1] <= inodes[i]);
        }
    }

    #[rstest]
    #[case::no_bar(false)]
    #[case::bar(true)]
    fn test_volume_paths_from_file(#[case] bar: bool) {
        let mut temp_file = tempfile::NamedTempFile::new().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();

        let file1 = temp_dir.path().join("file1.tiff");
        let file2 = temp_dir.path().join("file2.dcm");
        std::fs::write(&file1, "test1").unwrap();
        std::fs::write(&file2, "test2").unwrap();

        writeln!(temp_file.as_file(), "{}", file1.display()).unwrap();
        writeln!(temp_file.as_file(), "").unwrap();
        writeln!(temp_file.as_file(), "{}", file2.display()).unwrap();
        writeln!(temp_file.as_file(), "invalid/path.tiff").unwrap();
        temp_file.flush().unwrap();

        let paths = match bar {
            true => temp_file
                .path()
                .read_volume_paths_with_bar()
                .unwrap()
                .collect::<Vec<_>>(),
            false => temp_file
                .path()
                .read_volume_paths()
                .unwrap()
                .collect::<Vec<_>>(),
        };

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
