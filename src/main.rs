use std::path::PathBuf;

use clap::Parser;
use indicatif::ProgressFinish;
use rayon::prelude::*;
use std::fmt;
use tiff::encoder::compression::{Compressor, Deflate, Lzw, Packbits, Uncompressed};
use tracing::{error, info, Level};

use distance_map::distance::{DistanceAlgorithm, FeatureLabel};
use distance_map::file::{default_bar, InodeSort, VolumeFileOperations};
use distance_map::pipeline::{DistanceMapper, PipelineError};
use distance_map::save::TiffSaver;
use snafu::{ensure, Report, ResultExt, Snafu, Whatever};
use std::path::Path;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Invalid source path: {}", path.display()))]
    InvalidSourcePath { path: PathBuf },

    #[snafu(display("No sources found in source path: {}", path.display()))]
    NoSources { path: PathBuf },

    #[snafu(display("Invalid output path: {}", path.display()))]
    InvalidOutputPath { path: PathBuf },

    #[snafu(display("Failed to create directory: {}", path.display()))]
    CreateDir {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("Error processing {}: {}", path.display(), source))]
    Process {
        path: PathBuf,
        #[snafu(source(from(PipelineError, Box::new)))]
        source: Box<PipelineError>,
    },

    #[snafu(display("{} of {} files failed", failed, total))]
    Failed { failed: usize, total: usize },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
enum SupportedCompressor {
    #[default]
    Packbits,
    Lzw,
    Deflate,
    #[value(name = "none")]
    Uncompressed,
}

impl From<SupportedCompressor> for Compressor {
    fn from(value: SupportedCompressor) -> Self {
        match value {
            SupportedCompressor::Packbits => Compressor::Packbits(Packbits),
            SupportedCompressor::Lzw => Compressor::Lzw(Lzw),
            SupportedCompressor::Deflate => Compressor::Deflate(Deflate::default()),
            SupportedCompressor::Uncompressed => Compressor::Uncompressed(Uncompressed),
        }
    }
}

impl fmt::Display for SupportedCompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compressor_str = match self {
            SupportedCompressor::Packbits => "packbits",
            SupportedCompressor::Lzw => "lzw",
            SupportedCompressor::Deflate => "deflate",
            SupportedCompressor::Uncompressed => "none",
        };
        write!(f, "{}", compressor_str)
    }
}

#[derive(Parser, Debug)]
#[command(author = "Scott Chase Waggener", version = env!("CARGO_PKG_VERSION"), about = "Compute Euclidean distance maps of volumes as float TIFFs", long_about = None)]
struct Args {
    #[arg(
        help = "Source path. Can be a volume file (TIFF, DICOM, PNG, JPEG, BMP), directory, or a text file with volume paths"
    )]
    source: PathBuf,

    #[arg(
        help = "Output path. Can be a directory (for multiple files) or a file (for a single file)"
    )]
    output: PathBuf,

    #[arg(
        help = "Measure distances in physical units using the voxel spacing of the source",
        long = "physical",
        short = 'p',
        default_value_t = false
    )]
    physical: bool,

    #[arg(
        help = "Distance transform algorithm",
        long = "algorithm",
        short = 'a',
        value_parser = clap::value_parser!(DistanceAlgorithm),
        default_value_t = DistanceAlgorithm::default(),
    )]
    algorithm: DistanceAlgorithm,

    #[arg(
        help = "Which voxels distances are measured to",
        long = "feature",
        value_parser = clap::value_parser!(FeatureLabel),
        default_value_t = FeatureLabel::default(),
    )]
    feature: FeatureLabel,

    #[arg(
        help = "Compression type",
        long = "compressor",
        short = 'z',
        value_parser = clap::value_parser!(SupportedCompressor),
        default_value_t = SupportedCompressor::default(),
    )]
    compressor: SupportedCompressor,

    #[arg(
        help = "Fail if any file processing fails",
        long = "strict",
        default_value_t = false
    )]
    strict: bool,

    #[arg(
        help = "Enable debug logging",
        long = "verbose",
        short = 'v',
        default_value_t = false
    )]
    verbose: bool,
}

/// Maximum log level for the subscriber
fn log_level(verbose: bool) -> Level {
    match verbose {
        true => Level::DEBUG,
        false => Level::INFO,
    }
}

fn main() {
    let args = Args::parse();
    let level = log_level(args.verbose);

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(args).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
}

/// Output file for `source` when writing into the directory `dest`
fn get_output_path<P: AsRef<Path>, Q: AsRef<Path>>(source: P, dest: Q) -> PathBuf {
    let stem = source
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "distance".to_string());
    dest.as_ref().join(format!("{}.tiff", stem))
}

fn process<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    dest: Q,
    mapper: &DistanceMapper,
    saver: &TiffSaver,
) -> Result<(), Error> {
    let source = source.as_ref();
    let dest = dest.as_ref();
    let dest = match dest.is_dir() {
        true => get_output_path(source, dest),
        false => dest.to_path_buf(),
    };

    info!("Processing {} -> {}", source.display(), dest.display());
    mapper
        .process(source, &dest, saver)
        .context(ProcessSnafu { path: source })
}

fn run(args: Args) -> Result<(), Error> {
    // Parse the sources
    let source = if args.source.is_dir() {
        args.source
            .find_volumes_with_spinner()
            .map_err(|_| Error::InvalidSourcePath {
                path: args.source.to_path_buf(),
            })?
            .collect::<Vec<_>>()
    } else if args.source.is_file() && args.source.extension().is_some_and(|ext| ext == "txt") {
        args.source
            .read_volume_paths_with_bar()
            .map_err(|_| Error::InvalidSourcePath {
                path: args.source.to_path_buf(),
            })?
            .collect::<Vec<_>>()
    } else if args.source.is_file() {
        vec![args.source.clone()]
    } else {
        return InvalidSourcePathSnafu { path: args.source }.fail();
    };
    let source = source
        .into_iter()
        .sorted_by_inode_with_progress()
        .collect::<Vec<_>>();

    info!("Number of sources found: {}", source.len());

    // Validate the output path
    let dest = match (source.len(), args.output.is_file()) {
        // No sources
        (0, _) => NoSourcesSnafu { path: args.source }.fail(),
        // Single source
        (1, _) => Ok(args.output),
        // Multiple sources, target is an existing file. Cannot continue.
        (_, true) => InvalidOutputPathSnafu { path: args.output }.fail(),
        // Multiple sources, target is a directory that may need creating
        _ => {
            std::fs::create_dir_all(&args.output).context(CreateDirSnafu {
                path: args.output.clone(),
            })?;
            Ok(args.output)
        }
    }?;

    let mapper = DistanceMapper {
        algorithm: args.algorithm,
        physical: args.physical,
        feature: args.feature,
    };
    let saver = TiffSaver::new(args.compressor.into());

    let pb = default_bar(source.len() as u64).with_finish(ProgressFinish::AndLeave);
    pb.set_message("Computing distance maps");

    let par_func = |file: PathBuf| {
        let result = process(&file, &dest, &mapper, &saver);
        pb.inc(1);
        match result {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(
                    "Error processing file {}: {}",
                    file.display(),
                    Report::from_error(&e)
                );
                Err(e)
            }
        }
    };

    let total = source.len();
    if args.strict {
        // In strict mode, abort on first error
        source.into_par_iter().try_for_each(par_func)?;
    } else {
        // In non-strict mode, keep going and report the failures at the end
        let failed = source
            .into_par_iter()
            .map(par_func)
            .filter(Result::is_err)
            .count();
        ensure!(failed == 0, FailedSnafu { failed, total });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{log_level, run, Args, Error, SupportedCompressor};
    use distance_map::distance::{DistanceAlgorithm, FeatureLabel};
    use distance_map::field::ScalarField;
    use distance_map::load::load_volume;
    use distance_map::metadata::Spacing;
    use distance_map::save::TiffSaver;
    use distance_map::volume::VolumeData;
    use ndarray::Array3;
    use rstest::rstest;
    use std::path::{Path, PathBuf};
    use tracing::Level;

    fn args(source: PathBuf, output: PathBuf) -> Args {
        Args {
            source,
            output,
            physical: true,
            algorithm: DistanceAlgorithm::default(),
            feature: FeatureLabel::default(),
            compressor: SupportedCompressor::default(),
            strict: true,
            verbose: false,
        }
    }

    /// Write a mask with a single feature voxel at the origin
    fn write_mask(path: &Path) {
        let mut data = Array3::<f32>::zeros((2, 3, 4));
        data[[0, 0, 0]] = 1.0;
        TiffSaver::default()
            .save(path, &ScalarField::new(data), Spacing::new(0.5, 0.5, 2.0))
            .unwrap();
    }

    #[rstest]
    #[case("path")]
    #[case("text")]
    #[case("dir")]
    fn test_main(#[case] input_type: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mask_path = temp_dir.path().join("mask.tiff");
        write_mask(&mask_path);
        let output_dir = tempfile::tempdir().unwrap();

        let source = match input_type {
            "path" => mask_path,
            "text" => {
                let paths_file_path = temp_dir.path().join("paths.txt");
                std::fs::write(&paths_file_path, mask_path.to_str().unwrap()).unwrap();
                paths_file_path
            }
            "dir" => temp_dir.path().to_path_buf(),
            _ => unreachable!(),
        };
        run(args(source, output_dir.path().to_path_buf())).unwrap();

        let output = load_volume(output_dir.path().join("mask.tiff")).unwrap();
        assert_eq!(output.shape(), (2, 3, 4));
        assert_eq!(output.spacing().z, 2.0);
        match output.data() {
            VolumeData::F32(array) => {
                assert_eq!(array[[0, 0, 0]], 0.0);
                assert!((array[[1, 0, 0]] - 2.0).abs() < 1e-6);
                assert!((array[[0, 0, 3]] - 1.5).abs() < 1e-6);
            }
            other => panic!("unexpected data {:?}", other.component_type()),
        }
    }

    #[test]
    fn test_main_multiple_sources() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_mask(&temp_dir.path().join("first.tiff"));
        let dicom_file_path = dicom_test_files::path("pydicom/CT_small.dcm").unwrap();
        std::fs::copy(&dicom_file_path, temp_dir.path().join("ct.dcm")).unwrap();

        // The output directory does not exist yet
        let output_dir = tempfile::tempdir().unwrap();
        let output = output_dir.path().join("maps");
        let mut args = args(temp_dir.path().to_path_buf(), output.clone());
        args.algorithm = DistanceAlgorithm::Parabolic;
        run(args).unwrap();

        assert!(output.join("first.tiff").is_file());
        let ct = load_volume(output.join("ct.tiff")).unwrap();
        assert_eq!(ct.shape(), (1, 128, 128));
    }

    #[test]
    fn test_main_output_is_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_mask(&temp_dir.path().join("first.tiff"));
        write_mask(&temp_dir.path().join("second.tiff"));
        let output = tempfile::NamedTempFile::new().unwrap();

        let result = run(args(
            temp_dir.path().to_path_buf(),
            output.path().to_path_buf(),
        ));
        assert!(matches!(result, Err(Error::InvalidOutputPath { .. })));
    }

    #[test]
    fn test_main_no_sources() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "not a volume").unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let result = run(args(
            temp_dir.path().to_path_buf(),
            output_dir.path().to_path_buf(),
        ));
        assert!(matches!(result, Err(Error::NoSources { .. })));
    }

    #[rstest]
    #[case::strict(true)]
    #[case::lenient(false)]
    fn test_main_single_failure(#[case] strict: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let corrupt = temp_dir.path().join("corrupt.tiff");
        std::fs::write(&corrupt, "not a tiff").unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let mut args = args(corrupt, output_dir.path().join("out.tiff"));
        args.strict = strict;
        let result = run(args);
        match strict {
            true => assert!(matches!(result, Err(Error::Process { .. }))),
            false => assert!(matches!(
                result,
                Err(Error::Failed {
                    failed: 1,
                    total: 1
                })
            )),
        }
    }

    #[rstest]
    #[case::strict(true)]
    #[case::lenient(false)]
    fn test_main_no_feature_voxels(#[case] strict: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let empty_mask = temp_dir.path().join("empty.tiff");
        TiffSaver::default()
            .save(
                &empty_mask,
                &ScalarField::new(Array3::zeros((1, 2, 2))),
                Spacing::default(),
            )
            .unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let mut args = args(empty_mask, output_dir.path().to_path_buf());
        args.strict = strict;
        assert!(run(args).is_err());
    }

    #[test]
    fn test_main_lenient_partial_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        write_mask(&temp_dir.path().join("good.tiff"));
        std::fs::write(temp_dir.path().join("bad.tiff"), "not a tiff").unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let mut args = args(
            temp_dir.path().to_path_buf(),
            output_dir.path().to_path_buf(),
        );
        args.strict = false;
        let result = run(args);
        assert!(matches!(
            result,
            Err(Error::Failed {
                failed: 1,
                total: 2
            })
        ));
        // The remaining source is still written
        assert!(output_dir.path().join("good.tiff").is_file());
    }

    #[rstest]
    #[case::quiet(false, Level::INFO)]
    #[case::verbose(true, Level::DEBUG)]
    fn test_log_level(#[case] verbose: bool, #[case] expected: Level) {
        assert_eq!(log_level(verbose), expected);
    }
}
