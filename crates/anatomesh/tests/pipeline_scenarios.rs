//! End-to-end segmentation scenarios on synthetic volumes.
//!
//! Run with: cargo test -p anatomesh --test pipeline_scenarios

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use anatomesh::{
    ErrorCode, MeshAdjacency, RawSeries, SegmentBuilder, SegmentError, SegmentParams, Structure,
    StructureProfile, VertexSpace, Volume, VolumeSource, segment_named, segment_structure,
    segment_volume,
};
use nalgebra::Vector3;
use tempfile::TempDir;

// =============================================================================
// Synthetic volumes
// =============================================================================

const AIR: f32 = -1000.0;
const BONE: f32 = 1200.0;

/// Balls of `(center_xyz, radius)` filled with `inside` on an air background.
fn balls_volume(shape: [usize; 3], spacing: Vector3<f64>, balls: &[([f64; 3], f64)], inside: f32) -> Volume {
    Volume::from_fn(shape, spacing, |x, y, z| {
        let p = [x as f64, y as f64, z as f64];
        let hit = balls.iter().any(|(c, r)| {
            let d2: f64 = (0..3).map(|i| (p[i] - c[i]).powi(2)).sum();
            d2 <= r * r
        });
        if hit { inside } else { AIR }
    })
    .unwrap()
}

fn sphere_volume() -> Volume {
    balls_volume(
        [64, 64, 64],
        Vector3::new(1.0, 1.0, 1.0),
        &[([31.5, 31.5, 31.5], 20.0)],
        BONE,
    )
}

fn lenient_profile() -> StructureProfile {
    StructureProfile {
        opening_radius: 1,
        closing_radius: 1,
        min_component_voxels: 10,
        ..Structure::Bone.profile()
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn sphere_becomes_closed_mesh_of_matching_size() {
    let result = segment_structure(sphere_volume(), Structure::Bone, &SegmentParams::default())
        .unwrap();

    assert_eq!(result.structure, Some(Structure::Bone));
    assert_eq!(result.selection.component_count, 1);
    assert_eq!(result.finalize.boundary_edges, 0);
    assert!(MeshAdjacency::build(&result.mesh.faces).is_watertight());
    assert!(result.mesh.indices_in_range());

    let vertices = result.mesh.vertex_count();
    assert!((2_000..20_000).contains(&vertices), "vertex count {vertices}");

    let extent = result.mesh.extent();
    for axis in 0..3 {
        assert!(
            (37.0..=43.0).contains(&extent[axis]),
            "extent along axis {axis} is {}",
            extent[axis]
        );
    }

    // A ball of radius 20 holds about 33510 voxels.
    let volume = result.mesh.volume();
    assert!((28_000.0..40_000.0).contains(&volume), "mesh volume {volume}");
}

#[test]
fn vertices_follow_physical_spacing_unless_voxel_space_requested() {
    let spacing = Vector3::new(0.5, 0.5, 2.0);
    let balls = [([15.5, 15.5, 15.5], 9.0)];

    let physical = segment_volume(
        balls_volume([32, 32, 32], spacing, &balls, BONE),
        &lenient_profile(),
        &SegmentParams::default(),
    )
    .unwrap();
    let extent = physical.mesh.extent();
    assert!(extent.z > 3.0 * extent.x, "extent {extent:?}");

    let params = SegmentParams {
        vertex_space: VertexSpace::Voxel,
        ..Default::default()
    };
    let voxel = segment_volume(
        balls_volume([32, 32, 32], spacing, &balls, BONE),
        &lenient_profile(),
        &params,
    )
    .unwrap();
    let extent = voxel.mesh.extent();
    approx::assert_relative_eq!(extent.x, extent.z, epsilon = 1.0);
}

#[test]
fn empty_volume_reports_empty_segmentation() {
    let volume = Volume::from_fn([16, 16, 16], Vector3::new(1.0, 1.0, 1.0), |_, _, _| AIR).unwrap();
    let err = segment_structure(volume, Structure::Bone, &SegmentParams::default()).unwrap_err();

    assert!(matches!(
        err,
        SegmentError::EmptyOrFullSegmentation { full: false, voxel_count: 0 }
    ));
    assert_eq!(err.code(), ErrorCode::EmptyOrFullSegmentation);
}

#[test]
fn saturated_volume_reports_full_segmentation() {
    let volume = Volume::from_fn([16, 16, 16], Vector3::new(1.0, 1.0, 1.0), |_, _, _| BONE).unwrap();
    let err = segment_volume(volume, &lenient_profile(), &SegmentParams::default()).unwrap_err();

    assert!(matches!(
        err,
        SegmentError::EmptyOrFullSegmentation { full: true, voxel_count: 4096 }
    ));
}

#[test]
fn only_the_larger_of_two_blobs_is_kept() {
    let volume = balls_volume(
        [48, 48, 48],
        Vector3::new(1.0, 1.0, 1.0),
        &[([14.0, 24.0, 24.0], 8.0), ([38.0, 24.0, 24.0], 5.0)],
        BONE,
    );
    let result = segment_volume(volume, &lenient_profile(), &SegmentParams::default()).unwrap();

    assert_eq!(result.selection.component_count, 2);
    let sizes = &result.selection.component_sizes;
    assert!(sizes[0] > sizes[1]);
    assert_eq!(result.selection.kept_voxels, sizes[0]);
    assert_eq!(result.selection.discarded_voxels, sizes[1]);

    let (min, max) = result.mesh.bounds().unwrap();
    assert!(max.x < 26.0, "mesh reaches x = {}", max.x);
    assert!(min.x > 2.0, "mesh reaches x = {}", min.x);
    assert_eq!(result.finalize.boundary_edges, 0);
}

#[test]
fn column_through_every_slice_is_watertight() {
    // Shape is (depth, height, width): 24 slices of 32 x 32.
    let volume = Volume::from_fn([24, 32, 32], Vector3::new(1.0, 1.0, 1.0), |x, y, _| {
        let d2 = (x as f64 - 15.5).powi(2) + (y as f64 - 15.5).powi(2);
        if d2 <= 36.0 { BONE } else { AIR }
    })
    .unwrap();
    let result = segment_volume(volume, &lenient_profile(), &SegmentParams::default()).unwrap();

    assert!(result.finalize.is_watertight());
    assert_eq!(result.finalize.holes.holes_found, 0);
    assert!(MeshAdjacency::build(&result.mesh.faces).is_watertight());

    // Both caps sit half a voxel outside the first and last slice.
    let extent = result.mesh.extent();
    assert!((23.5..=24.5).contains(&extent.z), "extent {extent:?}");
}

#[test]
fn speckle_below_minimum_size_is_dropped() {
    let mut profile = lenient_profile();
    profile.min_component_voxels = 5_000;
    let volume = balls_volume(
        [32, 32, 32],
        Vector3::new(1.0, 1.0, 1.0),
        &[([15.5, 15.5, 15.5], 4.0)],
        BONE,
    );
    let err = segment_volume(volume, &profile, &SegmentParams::default()).unwrap_err();
    assert!(matches!(err, SegmentError::EmptyOrFullSegmentation { full: false, .. }));
}

#[test]
fn unknown_structure_is_rejected() {
    let err = segment_named(sphere_volume(), "spleen", &SegmentParams::default()).unwrap_err();
    assert!(matches!(err, SegmentError::UnknownStructure { ref name } if name == "spleen"));
    assert_eq!(err.code(), ErrorCode::UnknownStructure);
    assert!(err.code().is_configuration());
}

#[test]
fn named_structure_matches_enum() {
    let by_name = segment_named(sphere_volume(), "bone", &SegmentParams::default()).unwrap();
    let by_enum = segment_structure(sphere_volume(), Structure::Bone, &SegmentParams::default())
        .unwrap();
    assert_eq!(by_name.mesh, by_enum.mesh);
}

// =============================================================================
// Export and ingestion
// =============================================================================

#[test]
fn exported_stl_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meshes/bone.stl");

    let result = SegmentBuilder::new(sphere_volume())
        .structure(Structure::Bone)
        .export_to(&path)
        .run()
        .unwrap();

    let mut reader = BufReader::new(File::open(&path).unwrap());
    let stl = stl_io::read_stl(&mut reader).unwrap();
    assert_eq!(stl.faces.len(), result.mesh.face_count());
    assert_eq!(stl.vertices.len(), result.mesh.vertex_count());
}

#[test]
fn exported_obj_keeps_indexing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bone.obj");

    let result = SegmentBuilder::new(sphere_volume())
        .structure(Structure::Bone)
        .export_to(&path)
        .run()
        .unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let vertices = text.lines().filter(|l| l.starts_with("v ")).count();
    let faces = text.lines().filter(|l| l.starts_with("f ")).count();
    assert_eq!(vertices, result.mesh.vertex_count());
    assert_eq!(faces, result.mesh.face_count());
}

fn write_sphere_series(dir: &Path) {
    fs::write(
        dir.join(RawSeries::METADATA_FILE),
        r#"{
            "width": 32,
            "height": 32,
            "spacing": [0.8, 0.8, 1.5],
            "sample_type": "i16",
            "rescale_intercept": -1024.0,
            "rescale_slope": 1.0
        }"#,
    )
    .unwrap();

    for z in 0..32 {
        let mut bytes = Vec::with_capacity(32 * 32 * 2);
        for y in 0..32 {
            for x in 0..32 {
                let d2 = [x, y, z]
                    .iter()
                    .map(|&c| (c as f64 - 15.5).powi(2))
                    .sum::<f64>();
                // Stored values before calibration.
                let raw: i16 = if d2 <= 100.0 { 2224 } else { 24 };
                bytes.extend_from_slice(&raw.to_le_bytes());
            }
        }
        fs::write(dir.join(format!("slice_{z:03}.raw")), bytes).unwrap();
    }
}

#[test]
fn raw_series_to_mesh() {
    let dir = TempDir::new().unwrap();
    write_sphere_series(dir.path());

    let volume = RawSeries::new(dir.path()).load_volume().unwrap();
    assert_eq!(volume.shape(), [32, 32, 32]);
    let (min, max) = volume.value_range();
    assert_eq!((min, max), (-1000.0, 1200.0));

    let profile = StructureProfile {
        closing_radius: 3,
        min_component_voxels: 100,
        ..Structure::Bone.profile()
    };
    let result = segment_volume(volume, &profile, &SegmentParams::default()).unwrap();
    assert!(result.finalize.is_watertight());

    let extent = result.mesh.extent();
    // Radius 10 voxels: about 16 mm across in x, 30 mm in z.
    assert!((13.0..20.0).contains(&extent.x), "extent {extent:?}");
    assert!((26.0..36.0).contains(&extent.z), "extent {extent:?}");
}

#[test]
fn missing_series_is_input_absent() {
    let dir = TempDir::new().unwrap();
    let err = RawSeries::new(dir.path().join("nope")).load_volume().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InputAbsent);
}
