//! Pose cache file.
//!
//! Layout, little-endian:
//!
//! ```text
//! offset  size  field
//!      0     4  magic "VBP "
//!      4     2  i16 major version (1)
//!      6     2  i16 minor version (0)
//!      8     4  i32 bone count
//!     12     4  i32 frame count
//!     16     4  f32 step length, seconds
//!     20    16  skeleton content hash
//!     36     …  frame_count × bone_count × record
//! record: 3 × f32 position, 3 × f32 Euler angles in degrees (Y, X, Z order)
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{EulerRot, Quat, Vec3};

use crate::errors::{MotionError, Result};
use crate::poser::BoneTransform;
use crate::skeleton::Skeleton;

pub const MAGIC: [u8; 4] = *b"VBP ";
pub const VERSION_MAJOR: i16 = 1;
pub const VERSION_MINOR: i16 = 0;
pub const HEADER_SIZE: u64 = 36;
/// Bytes per bone per frame.
pub const RECORD_SIZE: u64 = 24;

/// Frames closer than this many bytes ahead are reached by reading through
/// instead of seeking.
const READ_AHEAD_BYTES: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheHeader {
    pub bone_count: u32,
    pub frame_count: u32,
    pub step_length: f32,
    pub hash: [u8; 16],
}

impl CacheHeader {
    #[must_use]
    pub fn for_skeleton(skeleton: &Skeleton, frame_count: u32, step_length: f32) -> Self {
        Self {
            bone_count: skeleton.bones.len() as u32,
            frame_count,
            step_length,
            hash: skeleton.content_hash(),
        }
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| MotionError::from_read(e, "header"))?;
        if magic != MAGIC {
            return Err(MotionError::Format(format!("bad magic {magic:?}")));
        }

        let mut read_header = || -> std::io::Result<(i16, i16, i32, i32, f32, [u8; 16])> {
            let major = reader.read_i16::<LittleEndian>()?;
            let minor = reader.read_i16::<LittleEndian>()?;
            let bone_count = reader.read_i32::<LittleEndian>()?;
            let frame_count = reader.read_i32::<LittleEndian>()?;
            let step_length = reader.read_f32::<LittleEndian>()?;
            let mut hash = [0u8; 16];
            reader.read_exact(&mut hash)?;
            Ok((major, minor, bone_count, frame_count, step_length, hash))
        };
        let (major, minor, bone_count, frame_count, step_length, hash) =
            read_header().map_err(|e| MotionError::from_read(e, "header"))?;

        if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) {
            return Err(MotionError::Format(format!("unsupported version {major}.{minor}")));
        }
        let bone_count =
            u32::try_from(bone_count).map_err(|_| MotionError::Format(format!("negative bone count {bone_count}")))?;
        let frame_count = u32::try_from(frame_count)
            .map_err(|_| MotionError::Format(format!("negative frame count {frame_count}")))?;
        if frame_count == 0 {
            return Err(MotionError::Format("pose cache holds no frames".into()));
        }
        if step_length.is_nan() || step_length <= 0.0 {
            return Err(MotionError::Format(format!("invalid step length {step_length}")));
        }

        Ok(Self {
            bone_count,
            frame_count,
            step_length,
            hash,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_i16::<LittleEndian>(VERSION_MAJOR)?;
        writer.write_i16::<LittleEndian>(VERSION_MINOR)?;
        writer.write_i32::<LittleEndian>(self.bone_count as i32)?;
        writer.write_i32::<LittleEndian>(self.frame_count as i32)?;
        writer.write_f32::<LittleEndian>(self.step_length)?;
        writer.write_all(&self.hash)?;
        Ok(())
    }

    /// Byte offset of frame `frame` from the start of the file.
    #[inline]
    #[must_use]
    pub fn frame_offset(&self, frame: u32) -> u64 {
        HEADER_SIZE + u64::from(frame) * self.frame_size()
    }

    #[inline]
    #[must_use]
    pub fn frame_size(&self) -> u64 {
        u64::from(self.bone_count) * RECORD_SIZE
    }

    /// Fails with [`MotionError::Unsuitable`] when the cache was produced for
    /// another skeleton.
    pub fn check(&self, skeleton: &Skeleton) -> Result<()> {
        if self.bone_count as usize != skeleton.bones.len() {
            return Err(MotionError::Unsuitable(format!(
                "cache has {} bones, skeleton '{}' has {}",
                self.bone_count,
                skeleton.name,
                skeleton.bones.len()
            )));
        }
        if self.hash != skeleton.content_hash() {
            return Err(MotionError::Unsuitable(format!(
                "content hash does not match skeleton '{}'",
                skeleton.name
            )));
        }
        Ok(())
    }
}

/// Writes one frame of bone records.
pub fn write_frame<W: Write>(writer: &mut W, bones: impl IntoIterator<Item = BoneTransform>) -> Result<()> {
    for bone in bones {
        let (y, x, z) = bone.rotation.to_euler(EulerRot::YXZ);
        let euler = Vec3::new(x, y, z) * (180.0 / std::f32::consts::PI);
        for v in bone.position.to_array().into_iter().chain(euler.to_array()) {
            writer.write_f32::<LittleEndian>(v)?;
        }
    }
    Ok(())
}

fn read_frame<R: Read>(reader: &mut R, bone_count: u32) -> Result<Vec<BoneTransform>> {
    let read_vec3 = |r: &mut R| -> std::io::Result<Vec3> {
        Ok(Vec3::new(
            r.read_f32::<LittleEndian>()?,
            r.read_f32::<LittleEndian>()?,
            r.read_f32::<LittleEndian>()?,
        ))
    };
    (0..bone_count)
        .map(|_| {
            let position = read_vec3(reader).map_err(|e| MotionError::from_read(e, "frame"))?;
            let euler = read_vec3(reader).map_err(|e| MotionError::from_read(e, "frame"))? * (std::f32::consts::PI / 180.0);
            Ok(BoneTransform {
                position,
                rotation: Quat::from_euler(EulerRot::YXZ, euler.y, euler.x, euler.z),
            })
        })
        .collect()
}

/// Random access to the frames of a pose cache.
///
/// Reading is optimised for playback: frames shortly after the last one read
/// are reached by reading through, anything else seeks.
#[derive(Debug)]
pub struct PoseCacheReader<R = BufReader<File>> {
    reader: R,
    header: CacheHeader,
    /// Index of the next frame the reader sits on.
    cursor: u32,
    last_frame: Option<Vec<BoneTransform>>,
}

impl PoseCacheReader<BufReader<File>> {
    /// Opens a cache file and checks it against `skeleton`.
    pub fn open(path: impl AsRef<Path>, skeleton: &Skeleton) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::with_capacity(READ_AHEAD_BYTES as usize, file), skeleton)
    }
}

impl<R: Read + Seek> PoseCacheReader<R> {
    pub fn new(mut reader: R, skeleton: &Skeleton) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = CacheHeader::read(&mut reader)?;
        header.check(skeleton)?;
        log::debug!(
            "Pose cache for '{}': {} frames of {} bones, step {}s",
            skeleton.name,
            header.frame_count,
            header.bone_count,
            header.step_length
        );
        Ok(Self {
            reader,
            header,
            cursor: 0,
            last_frame: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    /// Duration covered by the cache, in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        f64::from(self.header.frame_count - 1) * f64::from(self.header.step_length)
    }

    /// Bone transforms of the frame nearest to `time` seconds. Times past the
    /// end return the last frame.
    pub fn pose_at(&mut self, time: f64) -> Result<Vec<BoneTransform>> {
        let nearest = (time / f64::from(self.header.step_length)).round().max(0.0);
        let last = self.header.frame_count - 1;
        if nearest >= f64::from(last) {
            if let Some(frame) = &self.last_frame {
                return Ok(frame.clone());
            }
            let frame = self.read_at(last)?;
            self.last_frame = Some(frame.clone());
            return Ok(frame);
        }
        self.read_at(nearest as u32)
    }

    fn read_at(&mut self, frame: u32) -> Result<Vec<BoneTransform>> {
        let gap = u64::from(frame.saturating_sub(self.cursor)) * self.header.frame_size();
        if frame < self.cursor || gap > READ_AHEAD_BYTES {
            log::trace!("Pose cache seek to frame {frame}");
            self.reader.seek(SeekFrom::Start(self.header.frame_offset(frame)))?;
            self.cursor = frame;
        }
        let mut bones = Vec::new();
        while self.cursor <= frame {
            bones = read_frame(&mut self.reader, self.header.bone_count).inspect_err(|_| {
                // Position unknown after a partial read; force a seek next time.
                self.cursor = u32::MAX;
            })?;
            self.cursor += 1;
        }
        Ok(bones)
    }
}
