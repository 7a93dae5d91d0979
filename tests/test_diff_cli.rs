//! CLI integration tests: exit-code contract and report formatting.

use byteorder::{ByteOrder, LittleEndian};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Build a little-endian NIfTI-1 file: float32 volume, data at offset 352.
fn nifti1_file(descrip: &str, shape: &[i16], values: &[f32]) -> Vec<u8> {
    let mut header = vec![0u8; 352];
    LittleEndian::write_i32(&mut header[0..4], 348);
    header[344..348].copy_from_slice(b"n+1\0");
    LittleEndian::write_i16(&mut header[40..42], shape.len() as i16);
    for (i, &d) in shape.iter().enumerate() {
        LittleEndian::write_i16(&mut header[42 + i * 2..44 + i * 2], d);
    }
    LittleEndian::write_i16(&mut header[70..72], 16); // datatype = float32
    LittleEndian::write_i16(&mut header[72..74], 32); // bitpix
    LittleEndian::write_f32(&mut header[76..80], 1.0); // qfac
    for i in 1..=shape.len() {
        LittleEndian::write_f32(&mut header[76 + i * 4..80 + i * 4], 1.0);
    }
    LittleEndian::write_f32(&mut header[108..112], 352.0); // vox_offset
    let descrip_bytes = descrip.as_bytes();
    header[148..148 + descrip_bytes.len()].copy_from_slice(descrip_bytes);

    let mut data = vec![0u8; values.len() * 4];
    LittleEndian::write_f32_into(values, &mut data);
    header.extend_from_slice(&data);
    header
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn niidiff() -> Command {
    Command::new(env!("CARGO_BIN_EXE_niidiff"))
}

#[test]
fn test_completed_comparison_exits_one() {
    let dir = TempDir::new().unwrap();
    let values = [1.0f32, 2.0, 3.0, 4.0];
    let a = write_file(dir.path(), "a.nii", &nifti1_file("abc", &[2, 2], &values));
    let b = write_file(dir.path(), "b.nii", &nifti1_file("xyz", &[2, 2], &values));

    let output = niidiff().args([&a, &b]).output().unwrap();

    // "Comparison completed" is exit 1 by contract, not an error.
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);

    // Fixed-width layout: 11-column field label, 45 columns per file.
    assert_eq!(&lines[0][..11], "Field      ");
    assert!(lines[0][11..].starts_with(&a.display().to_string()));
    assert_eq!(&lines[1][..11], "descrip    ");
    assert_eq!(&lines[1][11..56], format!("{:<45}", "abc"));
    assert_eq!(&lines[1][56..], format!("{:<45}", "xyz"));
    assert_eq!(lines[2], "DATA: These files are identical!");
}

#[test]
fn test_differing_data_line() {
    let dir = TempDir::new().unwrap();
    let a = write_file(
        dir.path(),
        "a.nii",
        &nifti1_file("scan", &[2], &[1.0, 2.0]),
    );
    let b = write_file(
        dir.path(),
        "b.nii",
        &nifti1_file("scan", &[2], &[1.0, 3.0]),
    );

    let output = niidiff().args([&a, &b]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.ends_with("DATA: These files are different.\n"));
}

#[test]
fn test_explicit_header_fields() {
    let dir = TempDir::new().unwrap();
    let a = write_file(
        dir.path(),
        "a.nii",
        &nifti1_file("abc", &[2], &[1.0, 2.0]),
    );
    let b = write_file(
        dir.path(),
        "b.nii",
        &nifti1_file("xyz", &[3], &[1.0, 2.0, 3.0]),
    );

    // Restricting to descrip hides the dim difference.
    let output = niidiff()
        .arg("-H")
        .arg("descrip")
        .args([&a, &b])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("descrip"));
    assert!(!stdout.contains("dim "));
}

#[test]
fn test_single_file_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.nii", &nifti1_file("abc", &[2], &[0.0; 2]));

    let output = niidiff().arg(&a).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least two files"));
    // Nothing was loaded or printed.
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unreadable_file_is_a_runtime_error() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.nii", &nifti1_file("abc", &[2], &[0.0; 2]));
    let missing = dir.path().join("missing.nii");

    let output = niidiff().args([&a, &missing]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_missing_field_is_a_runtime_error() {
    let dir = TempDir::new().unwrap();
    let a = write_file(dir.path(), "a.nii", &nifti1_file("abc", &[2], &[0.0; 2]));

    let output = niidiff()
        .arg("-H")
        .arg("no_such_field")
        .args([&a, &a])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no_such_field"));
}
