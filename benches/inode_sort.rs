use criterion::{measurement::Measurement, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use distance_map::file::InodeSort;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

const NUM_FILES: usize = 1000;

/// Create `num_files` small volumes, keeping the directory alive for the benchmark
fn setup(num_files: usize) -> (TempDir, Vec<PathBuf>) {
    let temp_dir = tempdir().unwrap();
    let paths = (0..num_files)
        .map(|i| {
            let file_path = temp_dir.path().join(format!("mask{}.tiff", i));
            std::fs::write(&file_path, format!("test content {}", i)).unwrap();
            file_path
        })
        .collect();
    (temp_dir, paths)
}

struct BenchDef {
    paths: Vec<PathBuf>,
    id: &'static str,
    sample_size: usize,
}

impl BenchDef {
    fn run<M: Measurement>(&self, group: &mut BenchmarkGroup<M>) {
        group
            .sample_size(self.sample_size)
            .throughput(Throughput::Elements(self.paths.len() as u64))
            .bench_with_input(
                BenchmarkId::new(self.id, self.paths.len()),
                &self.paths,
                |b, input| b.iter(|| input.iter().sorted_by_inode().collect::<Vec<_>>()),
            );
    }
}

fn main() {
    let mut c = Criterion::default().configure_from_args();
    let mut group = c.benchmark_group("inode-sort");
    let (_temp_dir, paths) = setup(NUM_FILES);

    BenchDef {
        paths,
        id: "inode_sort",
        sample_size: 500,
    }
    .run(&mut group);
    group.finish();
}
