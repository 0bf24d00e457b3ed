//! File boundary: EXR inputs in, PNG out, through a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use ndarray::Array3;

use nlm_denoise::io::{load_buffer, save_display, save_linear, stage_display, write_outputs, JobPaths};
use nlm_denoise::{denoise, to_display_u8, DenoiseError, FilterParameters};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nlm_denoise_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn dir_entries(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_exr_roundtrip_preserves_values() {
    let dir = scratch_dir("exr_roundtrip");
    let path = dir.join("color.exr");
    let buf = Array3::from_shape_fn((3, 4, 3), |(y, x, c)| (y * 12 + x * 3 + c) as f32 * 0.25);

    save_linear(buf.view(), &path).unwrap();
    let loaded = load_buffer(&path).unwrap();

    assert_eq!(loaded.dim(), (3, 4, 3));
    for (a, b) in loaded.iter().zip(buf.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_file_job_writes_denoised_png() {
    let dir = scratch_dir("file_job");
    let paths = JobPaths::from_input(&dir.join("render.exr"), "exr");

    let color = Array3::<f32>::from_elem((5, 6, 3), 0.18);
    let variance = Array3::<f32>::zeros((5, 6, 3));
    save_linear(color.view(), &paths.color).unwrap();
    save_linear(variance.view(), &paths.variance).unwrap();

    let color = load_buffer(&paths.color).unwrap();
    let variance = load_buffer(&paths.variance).unwrap();
    let params = FilterParameters::new(2, 1, 0.45).unwrap();
    let denoised = denoise(color.view(), variance.view(), &params).unwrap();
    save_display(to_display_u8(denoised.view()).view(), &paths.output).unwrap();

    let written = image::open(&paths.output).unwrap().into_rgb8();
    assert_eq!(written.dimensions(), (6, 5));
    // sRGB(0.18) ~ 0.4613 -> 118
    for px in written.pixels() {
        assert_eq!(px.0, [118, 118, 118]);
    }

    // No leftover partial file next to the output
    let leftovers: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_variance_is_reported() {
    let dir = scratch_dir("missing_variance");
    let paths = JobPaths::from_input(&dir.join("render.exr"), "exr");
    save_linear(Array3::<f32>::zeros((2, 2, 3)).view(), &paths.color).unwrap();

    match load_buffer(&paths.variance) {
        Err(DenoiseError::MissingInput { path, .. }) => assert_eq!(path, paths.variance),
        other => panic!("expected MissingInput, got {other:?}"),
    }
    assert!(!paths.output.exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_save_linear_rejects_single_channel() {
    let dir = scratch_dir("single_channel");
    let path = dir.join("gray.exr");

    let result = save_linear(Array3::<f32>::zeros((2, 2, 1)).view(), &path);

    assert!(matches!(result, Err(DenoiseError::UnsupportedChannels { channels: 1 })));
    assert!(!path.exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_write_outputs_writes_display_and_linear() {
    let dir = scratch_dir("both_outputs");
    let paths = JobPaths::from_input(&dir.join("render.exr"), "exr");
    let denoised = Array3::<f32>::from_elem((3, 4, 3), 0.18);

    let written = write_outputs(denoised.view(), &paths, true).unwrap();

    assert_eq!(written, vec![paths.output.clone(), paths.linear_output()]);
    let linear = load_buffer(&paths.linear_output()).unwrap();
    assert_abs_diff_eq!(linear[[2, 3, 1]], 0.18, epsilon = 1e-6);
    assert_eq!(image::open(&paths.output).unwrap().into_rgb8().get_pixel(0, 0).0, [118, 118, 118]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_failed_linear_write_leaves_no_display_output() {
    let dir = scratch_dir("linear_fails");
    let paths = JobPaths::from_input(&dir.join("render.exr"), "exr");
    // Single channel: the PNG encodes fine, the EXR writer refuses it
    let denoised = Array3::<f32>::from_elem((3, 4, 1), 0.5);

    let result = write_outputs(denoised.view(), &paths, true);

    assert!(matches!(result, Err(DenoiseError::UnsupportedChannels { channels: 1 })));
    assert!(!paths.output.exists());
    assert!(!paths.linear_output().exists());
    assert!(dir_entries(&dir).is_empty(), "left behind: {:?}", dir_entries(&dir));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_dropped_stage_removes_temp_file() {
    let dir = scratch_dir("dropped_stage");
    let path = dir.join("out.png");

    let staged = stage_display(Array3::<u8>::zeros((2, 2, 3)).view(), &path).unwrap();
    assert_eq!(dir_entries(&dir).len(), 1);
    assert!(!path.exists());
    drop(staged);

    assert!(dir_entries(&dir).is_empty());

    fs::remove_dir_all(&dir).unwrap();
}
