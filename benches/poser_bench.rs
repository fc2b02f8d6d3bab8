//! Posing throughput: a humanoid-sized chain with two leg IK chains, played
//! from a looping motion.

use std::f32::consts::PI;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Quat, Vec3};

use mmd_motion::animation::{Motion, MotionPlayer};
use mmd_motion::poser::Poser;
use mmd_motion::skeleton::{Bone, IkDescriptor, IkLink, Skeleton};

const SPINE_BONES: usize = 120;

fn rig() -> Arc<Skeleton> {
    let mut bones = vec![Bone::new("center", Vec3::new(0.0, 10.0, 0.0))];
    for i in 1..SPINE_BONES {
        bones.push(Bone::new(format!("spine{i}"), Vec3::new(0.0, 10.0 + i as f32 * 0.1, 0.0)).with_parent(i - 1));
    }
    for (side, x) in [("L", 1.0), ("R", -1.0)] {
        let hip = bones.len();
        bones.push(Bone::new(format!("leg_{side}"), Vec3::new(x, 10.0, 0.0)).with_parent(0));
        bones.push(Bone::new(format!("knee_{side}"), Vec3::new(x, 5.0, 0.0)).with_parent(hip));
        bones.push(Bone::new(format!("ankle_{side}"), Vec3::new(x, 1.0, 0.0)).with_parent(hip + 1));
        bones.push(
            Bone::new(format!("leg IK_{side}"), Vec3::new(x, 1.0, 0.5))
                .with_level(1)
                .with_ik(IkDescriptor {
                    target: hip + 2,
                    links: vec![
                        IkLink::limited(hip + 1, Vec3::new(-PI, 0.0, 0.0), Vec3::new(-0.01, 0.0, 0.0)),
                        IkLink::free(hip),
                    ],
                    iterations: 40,
                    angle_limit: 2.0,
                }),
        );
    }
    Arc::new(Skeleton::new("bench", bones, Vec::new()))
}

fn motion() -> Arc<Motion> {
    let mut builder = Motion::builder("sway");
    for i in 0..SPINE_BONES {
        let name = if i == 0 { "center".to_owned() } else { format!("spine{i}") };
        builder
            .add_linear_bone_key(&name, 0, Vec3::ZERO, Quat::IDENTITY)
            .add_linear_bone_key(&name, 30, Vec3::ZERO, Quat::from_rotation_z(0.02))
            .add_linear_bone_key(&name, 60, Vec3::ZERO, Quat::IDENTITY);
    }
    builder.add_linear_bone_key("leg IK_L", 0, Vec3::ZERO, Quat::IDENTITY).add_linear_bone_key(
        "leg IK_L",
        60,
        Vec3::new(0.0, 2.0, 1.0),
        Quat::IDENTITY,
    );
    Arc::new(builder.build())
}

fn bench_posing(c: &mut Criterion) {
    let skeleton = rig();
    let player = MotionPlayer::new(motion(), &skeleton);
    let mut poser = Poser::new(skeleton);
    let mut frame = 0.0_f32;

    c.bench_function("seek_and_pose", |b| {
        b.iter(|| {
            frame = (frame + 0.5) % 60.0;
            player.seek_frame(&mut poser, frame);
            poser.pre_physics_posing(true);
            poser.post_physics_posing();
            black_box(poser.skinning_matrix(0));
        });
    });
}

criterion_group!(benches, bench_posing);
criterion_main!(benches);
