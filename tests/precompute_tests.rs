//! Pre-computation Tests
//!
//! Tests for:
//! - Pose cache header layout and validation
//! - Cache generation, cancellation and random-access reading
//! - The background pre-calculator queue
//! - Settings serialization

use std::f32::consts::FRAC_PI_2;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Mat4, Quat, Vec3};
use parking_lot::Mutex;

use mmd_motion::animation::{BonePose, Motion, MotionPlayer, StaticPose};
use mmd_motion::config::{GeneratorSettings, PrecomputeSettings};
use mmd_motion::errors::MotionError;
use mmd_motion::physics::{NullPhysicsReactor, PhysicsReactor};
use mmd_motion::poser::{BoneTransform, Poser};
use mmd_motion::precompute::cache::{HEADER_SIZE, RECORD_SIZE, write_frame};
use mmd_motion::precompute::{
    CacheHeader, GenerateStatus, PoseCacheGenerator, PoseCacheReader, PoseSource, PreCalculator, Take,
};
use mmd_motion::skeleton::{Bone, Skeleton};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_quat(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

fn skeleton(name: &str) -> Arc<Skeleton> {
    Arc::new(Skeleton::new(
        name,
        vec![
            Bone::new("center", Vec3::new(0.0, 1.0, 0.0)),
            Bone::new("head", Vec3::new(0.0, 2.0, 0.0)).with_parent(0),
        ],
        Vec::new(),
    ))
}

/// `center` rises two units and turns a quarter around Y over one second.
fn rise() -> Arc<Motion> {
    let mut builder = Motion::builder("rise");
    builder
        .add_linear_bone_key("center", 0, Vec3::ZERO, Quat::IDENTITY)
        .add_linear_bone_key("center", 30, Vec3::new(0.0, 2.0, 0.0), Quat::from_rotation_y(FRAC_PI_2));
    Arc::new(builder.build())
}

fn header_bytes(header: &CacheHeader) -> Vec<u8> {
    let mut bytes = Vec::new();
    header.write(&mut bytes).unwrap();
    bytes
}

// ============================================================================
// Cache header
// ============================================================================

#[test]
fn header_round_trip_and_offsets() {
    let skeleton = skeleton("model");
    let header = CacheHeader::for_skeleton(&skeleton, 10, 0.5);
    let bytes = header_bytes(&header);
    assert_eq!(bytes.len() as u64, HEADER_SIZE);
    assert_eq!(&bytes[..4], b"VBP ");

    let back = CacheHeader::read(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(back, header);
    assert_eq!(back.frame_size(), 2 * RECORD_SIZE);
    assert_eq!(back.frame_offset(3), HEADER_SIZE + 3 * 2 * RECORD_SIZE);
}

#[test]
fn header_for_other_skeleton_is_unsuitable() {
    let header = CacheHeader::for_skeleton(&skeleton("model"), 1, 0.5);
    let mut bytes = header_bytes(&header);
    write_frame(&mut bytes, vec![BoneTransform::default(); 2]).unwrap();

    let err = PoseCacheReader::new(Cursor::new(bytes), &skeleton("other")).unwrap_err();
    assert!(matches!(err, MotionError::Unsuitable(_)), "{err}");
    assert!(err.is_recoverable());
}

#[test]
fn bad_magic_is_a_format_error() {
    let mut bytes = header_bytes(&CacheHeader::for_skeleton(&skeleton("model"), 1, 0.5));
    bytes[..4].copy_from_slice(b"VPD ");
    let err = CacheHeader::read(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, MotionError::Format(_)), "{err}");
    assert!(!err.is_recoverable());
}

#[test]
fn truncated_header_is_a_format_error() {
    let bytes = header_bytes(&CacheHeader::for_skeleton(&skeleton("model"), 1, 0.5));
    let err = CacheHeader::read(&mut Cursor::new(&bytes[..20])).unwrap_err();
    assert!(matches!(err, MotionError::Format(_)), "{err}");
}

fn raw_header(major: i16, bones: i32, frames: i32, step: f32) -> Vec<u8> {
    let mut bytes = b"VBP ".to_vec();
    bytes.write_i16::<LittleEndian>(major).unwrap();
    bytes.write_i16::<LittleEndian>(0).unwrap();
    bytes.write_i32::<LittleEndian>(bones).unwrap();
    bytes.write_i32::<LittleEndian>(frames).unwrap();
    bytes.write_f32::<LittleEndian>(step).unwrap();
    bytes.extend_from_slice(&[0; 16]);
    bytes
}

#[test]
fn invalid_header_fields_are_format_errors() {
    for (label, bytes) in [
        ("negative bones", raw_header(1, -1, 1, 0.5)),
        ("negative frames", raw_header(1, 2, -3, 0.5)),
        ("no frames", raw_header(1, 2, 0, 0.5)),
        ("zero step", raw_header(1, 2, 1, 0.0)),
        ("nan step", raw_header(1, 2, 1, f32::NAN)),
        ("future version", raw_header(2, 2, 1, 0.5)),
    ] {
        let err = CacheHeader::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, MotionError::Format(_)), "{label}: {err}");
    }
}

#[test]
fn truncated_frame_is_a_format_error() {
    let skeleton = skeleton("model");
    let mut bytes = header_bytes(&CacheHeader::for_skeleton(&skeleton, 2, 0.5));
    write_frame(&mut bytes, vec![BoneTransform::default(); 2]).unwrap();

    let mut reader = PoseCacheReader::new(Cursor::new(bytes), &skeleton).unwrap();
    assert_eq!(reader.pose_at(0.0).unwrap().len(), 2);
    let err = reader.pose_at(0.5).unwrap_err();
    assert!(matches!(err, MotionError::Format(_)), "{err}");
}

// ============================================================================
// Generator & reader
// ============================================================================

fn generator_settings() -> GeneratorSettings {
    GeneratorSettings {
        frame_step_length: 0.25,
        time_after_motion_finish: 0.0,
        physics_step_length: 1.0 / 60.0,
    }
}

#[test]
fn frame_count_covers_motion_and_settle_time() {
    let motion = rise();
    let settings = generator_settings();
    assert_eq!(PoseCacheGenerator::frame_count(&motion, &settings), 6);

    let longer = GeneratorSettings {
        time_after_motion_finish: 1.0,
        ..settings
    };
    assert_eq!(PoseCacheGenerator::frame_count(&motion, &longer), 10);
}

#[test]
fn generated_cache_reads_back() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let skeleton = skeleton("model");
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rise.vbp");
    let settings = generator_settings();

    let generator = PoseCacheGenerator::new();
    let status = generator
        .generate(Arc::clone(&skeleton), rise(), &mut NullPhysicsReactor, &path, &settings)?;
    assert_eq!(status, GenerateStatus::Finished);
    assert_eq!(generator.status(), GenerateStatus::Finished);
    assert_eq!(generator.total_frames(), 6);
    assert_eq!(generator.calculated_frames(), 6);

    let mut reader = PoseCacheReader::open(&path, &skeleton)?;
    assert_eq!(reader.header().frame_count, 6);
    assert!((reader.duration() - 1.25).abs() < 1e-9);

    let mid = reader.pose_at(0.5)?;
    assert!(approx(mid[0].position.y, 2.0), "{:?}", mid[0]);
    assert!(approx(mid[1].position.y, 3.0), "{:?}", mid[1]);

    let end = reader.pose_at(100.0)?;
    assert!(approx(end[0].position.y, 3.0));
    assert!(approx_quat(end[0].rotation, Quat::from_rotation_y(FRAC_PI_2)), "{:?}", end[0]);

    // Backwards seek.
    let start = reader.pose_at(0.0)?;
    assert!(approx(start[0].position.y, 1.0));
    assert!(approx_quat(start[0].rotation, Quat::IDENTITY));
    Ok(())
}

#[test]
fn generation_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("rise.vbp");
    let generator = PoseCacheGenerator::new();
    let err = generator
        .generate(skeleton("model"), rise(), &mut NullPhysicsReactor, &path, &generator_settings())
        .unwrap_err();
    assert!(matches!(err, MotionError::Io(_)));
    assert_eq!(generator.status(), GenerateStatus::Failed);
}

/// Cancels the generation driving it on the first physics step.
struct CancelOnReact(Arc<PoseCacheGenerator>);

impl PhysicsReactor for CancelOnReact {
    fn add_poser(&mut self, _poser: &Poser) {}

    fn remove_poser(&mut self, _poser: &Poser) {}

    fn reset(&mut self, _poser: &mut Poser) {}

    fn react(&mut self, _poser: &mut Poser, _step: f32, _max_sub_steps: u32, _fixed_step: f32) {
        self.0.cancel();
    }
}

#[test]
fn canceled_generation_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rise.vbp");
    let generator = Arc::new(PoseCacheGenerator::new());
    let mut reactor = CancelOnReact(Arc::clone(&generator));

    let status = generator
        .generate(skeleton("model"), rise(), &mut reactor, &path, &generator_settings())
        .unwrap();
    assert_eq!(status, GenerateStatus::Canceled);
    assert_eq!(generator.status(), GenerateStatus::Canceled);
    assert!(generator.calculated_frames() < generator.total_frames());
    assert!(!path.exists());
}

/// Shifts `head` ten units along X through its skinning matrix, the way a
/// rigid-body world writes a simulated bone.
struct ShiftHead;

impl ShiftHead {
    fn write(poser: &mut Poser) {
        if let Some(head) = poser.bone_mut(1) {
            head.skinning_matrix = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        }
    }
}

impl PhysicsReactor for ShiftHead {
    fn add_poser(&mut self, _poser: &Poser) {}

    fn remove_poser(&mut self, _poser: &Poser) {}

    fn reset(&mut self, poser: &mut Poser) {
        Self::write(poser);
    }

    fn react(&mut self, poser: &mut Poser, _step: f32, _max_sub_steps: u32, _fixed_step: f32) {
        Self::write(poser);
    }
}

#[test]
fn generated_cache_keeps_simulated_bones() {
    let skeleton = skeleton("model");
    let mut bytes = Vec::new();
    let generator = PoseCacheGenerator::new();
    let status = generator
        .generate_to(Arc::clone(&skeleton), rise(), &mut ShiftHead, &mut bytes, &generator_settings())
        .unwrap();
    assert_eq!(status, GenerateStatus::Finished);

    let mut reader = PoseCacheReader::new(Cursor::new(bytes), &skeleton).unwrap();
    for time in [0.0, 0.5] {
        let pose = reader.pose_at(time).unwrap();
        let head = pose[1].position;
        assert!(approx(head.x, 10.0) && approx(head.y, 2.0) && approx(head.z, 0.0), "{head} at {time}");
        assert!(approx_quat(pose[1].rotation, Quat::IDENTITY));
    }
    // The kinematic center still follows the motion.
    assert!(approx(reader.pose_at(0.5).unwrap()[0].position.y, 2.0));
}

#[test]
fn zero_step_lengths_are_rejected() {
    let skeleton = skeleton("model");
    for settings in [
        GeneratorSettings {
            frame_step_length: 0.0,
            ..generator_settings()
        },
        GeneratorSettings {
            physics_step_length: 0.0,
            ..generator_settings()
        },
        GeneratorSettings {
            frame_step_length: f32::NAN,
            ..generator_settings()
        },
        GeneratorSettings {
            physics_step_length: -1.0,
            ..generator_settings()
        },
    ] {
        let generator = PoseCacheGenerator::new();
        let mut bytes = Vec::new();
        let err = generator
            .generate_to(Arc::clone(&skeleton), rise(), &mut NullPhysicsReactor, &mut bytes, &settings)
            .unwrap_err();
        assert!(matches!(err, MotionError::Format(_)), "{settings:?}: {err}");
        assert_eq!(generator.status(), GenerateStatus::Failed);
        assert!(bytes.is_empty());
    }
}

#[test]
fn invalid_settings_never_create_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rise.vbp");
    let settings = GeneratorSettings {
        frame_step_length: 0.0,
        ..generator_settings()
    };
    let generator = PoseCacheGenerator::new();
    let err = generator
        .generate(skeleton("model"), rise(), &mut NullPhysicsReactor, &path, &settings)
        .unwrap_err();
    assert!(matches!(err, MotionError::Format(_)));
    assert_eq!(generator.status(), GenerateStatus::Failed);
    assert!(!path.exists());
}

#[test]
fn degenerate_steps_saturate_counts() {
    let zero_physics = GeneratorSettings {
        physics_step_length: 0.0,
        ..generator_settings()
    };
    assert_eq!(zero_physics.max_sub_steps(), u32::MAX);

    let zero_frame = GeneratorSettings {
        frame_step_length: 0.0,
        ..generator_settings()
    };
    assert_eq!(PoseCacheGenerator::frame_count(&rise(), &zero_frame), u32::MAX);
}

#[test]
fn spawned_generation_can_be_joined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rise.vbp");
    let (generator, handle) = PoseCacheGenerator::spawn(
        skeleton("model"),
        rise(),
        Box::new(NullPhysicsReactor),
        path.clone(),
        generator_settings(),
    )
    .unwrap();

    let status = handle.join().unwrap().unwrap();
    assert_eq!(status, GenerateStatus::Finished);
    assert_eq!(generator.calculated_frames(), 6);
    assert!(path.exists());
}

// ============================================================================
// Pre-calculator
// ============================================================================

fn poll_ready(calculator: &PreCalculator, time: f64) -> Arc<mmd_motion::precompute::PoseFrame> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match calculator.take(time) {
            Take::Ready(frame) => return frame,
            Take::Stale => panic!("time {time} reported stale"),
            Take::NotReady { .. } => {
                assert!(Instant::now() < deadline, "no frame for {time} in time");
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }
}

fn motion_calculator(settings: PrecomputeSettings, reactor: Box<dyn PhysicsReactor>) -> PreCalculator {
    let skeleton = skeleton("model");
    let player = MotionPlayer::new(rise(), &skeleton);
    PreCalculator::new(Poser::new(skeleton), PoseSource::Motion(player), reactor, 0.0, settings).unwrap()
}

#[test]
fn frames_are_taken_in_order() {
    let settings = PrecomputeSettings {
        step_length: 0.1,
        cache_size: 4,
        auto_step_length: false,
        max_sub_steps: 1,
    };
    let mut calculator = motion_calculator(settings, Box::new(NullPhysicsReactor));

    let first = poll_ready(&calculator, 0.0);
    assert_eq!(first.time, 0.0);
    assert!(approx(first.bones[0].position.y, 1.0));

    let second = poll_ready(&calculator, 0.1);
    assert!((second.time - 0.1).abs() < 1e-6);
    assert!(second.bones[0].position.y > 1.0);

    assert!(matches!(calculator.take(0.05), Take::Stale));

    match calculator.take(1.0e6) {
        Take::NotReady { fallback } => {
            let fallback = fallback.expect("frames were consumed");
            assert!(fallback.time >= second.time);
        }
        other => panic!("expected NotReady, got {other:?}"),
    }

    calculator.stop().unwrap();
    assert_eq!(calculator.queued(), 0);
}

/// Records the longest step it was asked to simulate.
struct StepRecorder(Arc<Mutex<f32>>);

impl PhysicsReactor for StepRecorder {
    fn add_poser(&mut self, _poser: &Poser) {}

    fn remove_poser(&mut self, _poser: &Poser) {}

    fn reset(&mut self, _poser: &mut Poser) {}

    fn react(&mut self, _poser: &mut Poser, step: f32, _max_sub_steps: u32, _fixed_step: f32) {
        let mut longest = self.0.lock();
        *longest = longest.max(step);
    }
}

#[test]
fn auto_step_jumps_to_missed_time() {
    let longest = Arc::new(Mutex::new(0.0_f32));
    let settings = PrecomputeSettings {
        step_length: 0.1,
        cache_size: 2,
        auto_step_length: true,
        max_sub_steps: 2,
    };
    let calculator = motion_calculator(settings, Box::new(StepRecorder(Arc::clone(&longest))));

    let frame = poll_ready(&calculator, 5.0);
    assert!(frame.time + 0.05 >= 5.0);
    assert!(*longest.lock() > 1.0, "longest step {}", *longest.lock());
}

#[test]
fn precalculated_frames_keep_simulated_bones() {
    let settings = PrecomputeSettings {
        step_length: 0.1,
        cache_size: 2,
        auto_step_length: false,
        max_sub_steps: 1,
    };
    let calculator = motion_calculator(settings, Box::new(ShiftHead));

    for time in [0.0, 0.1] {
        let head = poll_ready(&calculator, time).bones[1].position;
        assert!(approx(head.x, 10.0) && approx(head.y, 2.0), "{head} at {time}");
    }
}

#[test]
fn precalculator_rejects_zero_step() {
    let skeleton = skeleton("model");
    let player = MotionPlayer::new(rise(), &skeleton);
    let settings = PrecomputeSettings {
        step_length: 0.0,
        ..PrecomputeSettings::default()
    };
    let err = PreCalculator::new(
        Poser::new(skeleton),
        PoseSource::Motion(player),
        Box::new(NullPhysicsReactor),
        0.0,
        settings,
    )
    .unwrap_err();
    assert!(matches!(err, MotionError::Format(_)), "{err}");
}

#[test]
fn static_pose_source_holds_the_pose() {
    let skeleton = skeleton("model");
    let pose = StaticPose::new("model").with_bone("center", BonePose::new(Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_2)));
    let settings = PrecomputeSettings {
        step_length: 0.1,
        cache_size: 3,
        ..PrecomputeSettings::default()
    };
    let calculator = PreCalculator::new(
        Poser::new(skeleton),
        PoseSource::Pose(pose),
        Box::new(NullPhysicsReactor),
        0.0,
        settings,
    )
    .unwrap();

    for time in [0.0, 0.1, 0.2] {
        let frame = poll_ready(&calculator, time);
        let head = frame.bones[1].position;
        assert!(approx(head.x, -1.0) && approx(head.y, 1.0), "{head} at {time}");
    }
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_round_trip_through_json() {
    let settings = PrecomputeSettings {
        step_length: 0.02,
        cache_size: 12,
        auto_step_length: false,
        max_sub_steps: 4,
    };
    let json = serde_json::to_string(&settings).unwrap();
    let back: PrecomputeSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(back, settings);
}

#[test]
fn partial_settings_use_defaults() {
    let settings: PrecomputeSettings = serde_json::from_str(r#"{ "cache_size": 8 }"#).unwrap();
    assert_eq!(settings.cache_size, 8);
    assert_eq!(settings.step_length, PrecomputeSettings::default().step_length);
    assert!(settings.auto_step_length);

    let generator: GeneratorSettings = serde_json::from_str(r#"{ "physics_step_length": 0.5 }"#).unwrap();
    assert_eq!(generator.effective_physics_step(), generator.frame_step_length);
    assert_eq!(generator.max_sub_steps(), 2);
}
