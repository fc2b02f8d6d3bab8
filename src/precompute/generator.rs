use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::animation::{Motion, MotionPlayer};
use crate::config::GeneratorSettings;
use crate::errors::{MotionError, Result};
use crate::physics::PhysicsReactor;
use crate::poser::Poser;
use crate::precompute::cache::{CacheHeader, write_frame};
use crate::skeleton::Skeleton;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateStatus {
    Ready,
    Preparing,
    CalculatingFrames,
    Finished,
    Failed,
    Canceled,
}

/// Bakes a motion played on a skeleton, physics included, into a pose cache.
///
/// Progress and status can be polled from other threads while a generation
/// runs. [`cancel`](Self::cancel) stops it after the current frame. A
/// generator runs once; a canceled generator stays canceled.
#[derive(Debug)]
pub struct PoseCacheGenerator {
    status: Mutex<GenerateStatus>,
    total_frames: AtomicU32,
    calculated_frames: AtomicU32,
    canceled: AtomicBool,
}

impl Default for PoseCacheGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseCacheGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: Mutex::new(GenerateStatus::Ready),
            total_frames: AtomicU32::new(0),
            calculated_frames: AtomicU32::new(0),
            canceled: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn status(&self) -> GenerateStatus {
        *self.status.lock()
    }

    #[must_use]
    pub fn total_frames(&self) -> u32 {
        self.total_frames.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn calculated_frames(&self) -> u32 {
        self.calculated_frames.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    fn set_status(&self, status: GenerateStatus) {
        *self.status.lock() = status;
    }

    /// Number of frames a generation of `motion` will store.
    #[must_use]
    pub fn frame_count(motion: &Motion, settings: &GeneratorSettings) -> u32 {
        let total = motion.length_seconds() + f64::from(settings.time_after_motion_finish);
        let steps = ((total / f64::from(settings.frame_step_length)) as u32).saturating_add(1);
        steps.saturating_add(1)
    }

    /// Generates the cache file at `path`. The file is removed unless the
    /// generation finishes.
    pub fn generate(
        &self,
        skeleton: Arc<Skeleton>,
        motion: Arc<Motion>,
        reactor: &mut dyn PhysicsReactor,
        path: &Path,
        settings: &GeneratorSettings,
    ) -> Result<GenerateStatus> {
        if let Err(err) = settings.validate() {
            log::error!("Refusing to generate pose cache {}: {err}", path.display());
            self.set_status(GenerateStatus::Failed);
            return Err(err);
        }
        let file = match File::create(path) {
            Ok(file) => file,
            Err(err) => {
                log::error!("Could not create pose cache {}: {err}", path.display());
                self.set_status(GenerateStatus::Failed);
                return Err(MotionError::from(err));
            }
        };
        let result = self.generate_to(skeleton, motion, reactor, BufWriter::new(file), settings);

        if !matches!(result, Ok(GenerateStatus::Finished))
            && let Err(err) = fs::remove_file(path)
        {
            log::warn!("Could not remove partial pose cache {}: {err}", path.display());
        }
        result
    }

    /// Generates into any writer.
    pub fn generate_to<W: Write>(
        &self,
        skeleton: Arc<Skeleton>,
        motion: Arc<Motion>,
        reactor: &mut dyn PhysicsReactor,
        mut writer: W,
        settings: &GeneratorSettings,
    ) -> Result<GenerateStatus> {
        self.set_status(GenerateStatus::Preparing);
        let result = self.run(skeleton, motion, reactor, &mut writer, settings);
        let status = match &result {
            Ok(status) => *status,
            Err(err) => {
                log::error!("Pose cache generation failed: {err}");
                GenerateStatus::Failed
            }
        };
        self.set_status(status);
        result
    }

    fn run<W: Write>(
        &self,
        skeleton: Arc<Skeleton>,
        motion: Arc<Motion>,
        reactor: &mut dyn PhysicsReactor,
        writer: &mut W,
        settings: &GeneratorSettings,
    ) -> Result<GenerateStatus> {
        settings.validate()?;
        let frame_step = settings.frame_step_length;
        let physics_step = settings.effective_physics_step();
        let max_sub_steps = settings.max_sub_steps();
        let frame_count = Self::frame_count(&motion, settings);

        let player = MotionPlayer::new(motion, &skeleton);
        let mut poser = Poser::new(Arc::clone(&skeleton));

        CacheHeader::for_skeleton(&skeleton, frame_count, frame_step).write(writer)?;
        self.total_frames.store(frame_count, Ordering::Relaxed);
        self.calculated_frames.store(0, Ordering::Relaxed);
        self.set_status(GenerateStatus::CalculatingFrames);
        log::info!("Generating pose cache for '{}': {frame_count} frames", skeleton.name);

        reactor.add_poser(&poser);
        player.seek_frame(&mut poser, 0.0);
        poser.pre_physics_posing(true);
        reactor.reset(&mut poser);
        poser.post_physics_posing();
        write_frame(writer, poser.bone_transforms())?;
        self.calculated_frames.store(1, Ordering::Relaxed);

        let mut time = 0.0_f64;
        for frame in 1..frame_count {
            if self.canceled.load(Ordering::Relaxed) {
                reactor.remove_poser(&poser);
                log::info!("Pose cache generation canceled at frame {frame}");
                return Ok(GenerateStatus::Canceled);
            }
            time += f64::from(frame_step);
            player.seek_time(&mut poser, time);
            poser.pre_physics_posing(true);
            reactor.react(&mut poser, frame_step, max_sub_steps, physics_step);
            poser.post_physics_posing();
            write_frame(writer, poser.bone_transforms())?;
            self.calculated_frames.store(frame + 1, Ordering::Relaxed);
        }
        reactor.remove_poser(&poser);
        writer.flush()?;
        Ok(GenerateStatus::Finished)
    }

    /// Runs [`generate`](Self::generate) on a new thread. The returned
    /// generator can be polled or canceled while it runs.
    pub fn spawn(
        skeleton: Arc<Skeleton>,
        motion: Arc<Motion>,
        mut reactor: Box<dyn PhysicsReactor>,
        path: PathBuf,
        settings: GeneratorSettings,
    ) -> Result<(Arc<Self>, JoinHandle<Result<GenerateStatus>>)> {
        let generator = Arc::new(Self::new());
        let worker = Arc::clone(&generator);
        let handle = thread::Builder::new()
            .name("pose-cache-generator".into())
            .spawn(move || worker.generate(skeleton, motion, reactor.as_mut(), &path, &settings))?;
        Ok((generator, handle))
    }
}
