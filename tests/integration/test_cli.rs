//! Integration tests for the `disksort` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn disksort_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_disksort"))
}

fn run(args: &[&str]) -> Output {
    Command::new(disksort_binary_path())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run disksort")
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn generate(dir: &Path, n: u64, record_size: usize, seed: u64) -> PathBuf {
    let path = dir.join("input.bin");
    let out = run(&[
        "generate",
        "-o",
        path_str(&path),
        "-n",
        &n.to_string(),
        "--record-size",
        &record_size.to_string(),
        "--seed",
        &seed.to_string(),
    ]);
    assert!(out.status.success(), "generate failed: {}", String::from_utf8_lossy(&out.stderr));
    path
}

/// Records of `bytes`, as owned chunks in file order.
fn records(bytes: &[u8], record_size: usize) -> Vec<Vec<u8>> {
    bytes.chunks_exact(record_size).map(<[u8]>::to_vec).collect()
}

#[test]
fn test_generate_sort_verify() {
    let dir = TempDir::new().unwrap();
    let input = generate(dir.path(), 50_000, 16, 42);
    assert_eq!(std::fs::metadata(&input).unwrap().len(), 50_000 * 16);

    let output = dir.path().join("sorted.bin");
    let out = run(&[
        "sort",
        "-i",
        path_str(&input),
        "-o",
        path_str(&output),
        "--record-size",
        "16",
        "--key-bytes",
        "4",
        "--log-buckets",
        "5",
        "--threads",
        "4",
        "-T",
        path_str(dir.path()),
        "--write-buffer",
        "4K",
    ]);
    assert!(out.status.success(), "sort failed: {}", String::from_utf8_lossy(&out.stderr));

    let mut before = records(&std::fs::read(&input).unwrap(), 16);
    let after = records(&std::fs::read(&output).unwrap(), 16);
    assert!(after.windows(2).all(|w| w[0][..4] <= w[1][..4]));
    let mut sorted_after = after.clone();
    sorted_after.sort_unstable();
    before.sort_unstable();
    assert_eq!(sorted_after, before);

    // Only the input, the output and nothing left over from the bucket files.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(leftovers.len(), 2, "unexpected files: {leftovers:?}");

    let verify = run(&["sort", "-i", path_str(&output), "--record-size", "16", "--key-bytes", "4", "--verify"]);
    assert!(verify.status.success());
}

#[test]
fn test_verify_rejects_unsorted_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("unsorted.bin");
    std::fs::write(&input, [0u8, 1, 0, 3, 0, 2]).unwrap();
    let out = run(&["sort", "-i", path_str(&input), "--record-size", "2", "--key-bytes", "2", "--verify"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("NOT sorted"));
}

#[test]
fn test_default_bucket_and_block_choice() {
    let dir = TempDir::new().unwrap();
    let input = generate(dir.path(), 4_000, 100, 7);
    let output = dir.path().join("out.bin");
    let out = run(&[
        "sort",
        "-i",
        path_str(&input),
        "-o",
        path_str(&output),
        "--record-size",
        "100",
        "--max-bucket-memory",
        "64K",
        "-T",
        path_str(dir.path()),
    ]);
    assert!(out.status.success(), "sort failed: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(std::fs::metadata(&output).unwrap().len(), 400_000);

    let verify = run(&["sort", "-i", path_str(&output), "--record-size", "100", "--verify"]);
    assert!(verify.status.success());
}

#[test]
fn test_unsupported_record_size() {
    let dir = TempDir::new().unwrap();
    let input = generate(dir.path(), 10, 9, 1);
    let out = run(&[
        "sort",
        "-i",
        path_str(&input),
        "-o",
        path_str(&dir.path().join("o.bin")),
        "--record-size",
        "9",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unsupported record size 9"));
}

#[test]
fn test_input_with_partial_record() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ragged.bin");
    std::fs::write(&input, [0u8; 10]).unwrap();
    let out = run(&[
        "sort",
        "-i",
        path_str(&input),
        "-o",
        path_str(&dir.path().join("o.bin")),
        "--record-size",
        "4",
        "--key-bytes",
        "4",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not a multiple"));
}

#[test]
fn test_missing_output_and_verify() {
    let dir = TempDir::new().unwrap();
    let input = generate(dir.path(), 10, 8, 1);
    let out = run(&["sort", "-i", path_str(&input), "--record-size", "8"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--output or --verify"));
}
