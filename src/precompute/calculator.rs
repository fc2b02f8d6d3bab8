use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use flume::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::animation::{MotionPlayer, StaticPose};
use crate::config::PrecomputeSettings;
use crate::errors::{MotionError, Result};
use crate::physics::PhysicsReactor;
use crate::poser::{BoneTransform, Poser};

/// Bone transforms of one pre-computed instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    /// Seconds since the start of the motion.
    pub time: f64,
    pub bones: Vec<BoneTransform>,
}

impl PoseFrame {
    #[must_use]
    pub fn capture(poser: &Poser, time: f64) -> Self {
        Self {
            time,
            bones: poser.bone_transforms().collect(),
        }
    }
}

/// What drives the pre-calculator's poser.
#[derive(Debug)]
pub enum PoseSource {
    /// Play a motion from the start time onwards.
    Motion(MotionPlayer),
    /// Hold a single pose and let physics settle around it.
    Pose(StaticPose),
}

/// Result of [`PreCalculator::take`].
#[derive(Debug, Clone)]
pub enum Take {
    Ready(Arc<PoseFrame>),
    /// The producer has not reached the requested time yet. Carries the most
    /// recent frame taken so far, if any.
    NotReady { fallback: Option<Arc<PoseFrame>> },
    /// The request is earlier than a frame already taken.
    Stale,
}

/// State shared between the consumer and the worker thread.
#[derive(Debug)]
struct Shared {
    stop: AtomicBool,
    /// `f64` bits of the latest time a consumer asked for and missed.
    last_missed: AtomicU64,
}

impl Shared {
    fn last_missed(&self) -> f64 {
        f64::from_bits(self.last_missed.load(Ordering::Acquire))
    }
}

#[derive(Debug)]
struct Consumed {
    time: f64,
    latest: Option<Arc<PoseFrame>>,
}

struct Producer {
    poser: Poser,
    source: PoseSource,
    reactor: Box<dyn PhysicsReactor>,
    settings: PrecomputeSettings,
    time: f64,
    shared: Arc<Shared>,
}

impl Producer {
    /// Poses the start frame and snaps physics onto it.
    fn start(&mut self) -> PoseFrame {
        self.reactor.add_poser(&self.poser);
        match &self.source {
            PoseSource::Motion(player) => player.seek_time(&mut self.poser, self.time),
            PoseSource::Pose(pose) => {
                self.poser.reset_posing();
                pose.apply(&mut self.poser);
            }
        }
        self.poser.pre_physics_posing(true);
        self.reactor.reset(&mut self.poser);
        self.poser.post_physics_posing();
        PoseFrame::capture(&self.poser, self.time)
    }

    fn step(&mut self) -> PoseFrame {
        let mut step = f64::from(self.settings.step_length);
        self.time += step;

        let missed = self.shared.last_missed();
        if self.settings.auto_step_length && self.time < missed {
            log::debug!("Pre-calculator jumping from {:.3}s to {missed:.3}s", self.time);
            step += missed - self.time;
            self.time = missed;
        }

        if let PoseSource::Motion(player) = &self.source {
            player.seek_time(&mut self.poser, self.time);
        }
        self.poser.pre_physics_posing(true);
        self.reactor
            .react(&mut self.poser, step as f32, self.settings.max_sub_steps, step as f32);
        self.poser.post_physics_posing();
        PoseFrame::capture(&self.poser, self.time)
    }

    fn run(mut self, sender: &Sender<Arc<PoseFrame>>) {
        while !self.shared.stop.load(Ordering::Acquire) {
            let frame = Arc::new(self.step());
            if sender.send(frame).is_err() {
                break;
            }
        }
        self.reactor.remove_poser(&self.poser);
        log::debug!("Pre-calculator stopped at {:.3}s", self.time);
    }
}

/// Computes poses ahead of playback on a background thread.
///
/// The worker stays at most `cache_size` frames ahead: once the queue is full
/// it blocks until the consumer takes a frame. Dropping the calculator stops
/// and joins the worker.
pub struct PreCalculator {
    receiver: Option<Receiver<Arc<PoseFrame>>>,
    shared: Arc<Shared>,
    consumed: Mutex<Consumed>,
    worker: Option<JoinHandle<()>>,
    step_length: f32,
}

impl PreCalculator {
    /// Poses the frame at `start_time` synchronously, then starts the worker.
    pub fn new(
        poser: Poser,
        source: PoseSource,
        reactor: Box<dyn PhysicsReactor>,
        start_time: f64,
        settings: PrecomputeSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            last_missed: AtomicU64::new((-1.0_f64).to_bits()),
        });
        let (sender, receiver) = flume::bounded(settings.cache_size.max(1));

        let mut producer = Producer {
            poser,
            source,
            reactor,
            settings,
            time: start_time,
            shared: Arc::clone(&shared),
        };
        let first = producer.start();
        sender
            .send(Arc::new(first))
            .map_err(|_| MotionError::Worker("pose queue closed before start".into()))?;

        let worker = thread::Builder::new()
            .name("pose-precalculator".into())
            .spawn(move || producer.run(&sender))?;

        Ok(Self {
            receiver: Some(receiver),
            shared,
            consumed: Mutex::new(Consumed {
                time: f64::NEG_INFINITY,
                latest: None,
            }),
            worker: Some(worker),
            step_length: settings.step_length,
        })
    }

    #[inline]
    #[must_use]
    pub fn step_length(&self) -> f32 {
        self.step_length
    }

    /// Frames waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.receiver.as_ref().map_or(0, Receiver::len)
    }

    /// Takes the frame for `time` seconds.
    ///
    /// Frames more than half a step older than `time` are discarded on the
    /// way. Never blocks.
    pub fn take(&self, time: f64) -> Take {
        let mut consumed = self.consumed.lock();
        if time < consumed.time {
            return Take::Stale;
        }
        let Some(receiver) = &self.receiver else {
            return Take::NotReady {
                fallback: consumed.latest.clone(),
            };
        };

        let half_step = f64::from(self.step_length) / 2.0;
        loop {
            match receiver.try_recv() {
                Ok(frame) => {
                    consumed.time = frame.time;
                    consumed.latest = Some(Arc::clone(&frame));
                    if frame.time + half_step >= time {
                        return Take::Ready(frame);
                    }
                }
                Err(err) => {
                    if matches!(err, TryRecvError::Disconnected) {
                        log::error!("Pre-calculator worker is gone");
                    } else {
                        log::warn!("Pose for {time:.3}s not computed yet");
                    }
                    self.shared.last_missed.store(time.to_bits(), Ordering::Release);
                    return Take::NotReady {
                        fallback: consumed.latest.clone(),
                    };
                }
            }
        }
    }

    /// Stops the worker and waits for it to exit.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.stop.store(true, Ordering::Release);
        // Unblocks a worker waiting on a full queue.
        self.receiver = None;
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| MotionError::Worker("pre-calculator thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for PreCalculator {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("{err}");
        }
    }
}

impl std::fmt::Debug for PreCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreCalculator")
            .field("step_length", &self.step_length)
            .field("queued", &self.queued())
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}
