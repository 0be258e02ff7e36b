//! # FLV Muxer
//!
//! The stateful orchestrator for live FLV capture: owns the open output
//! file, a dedicated single-worker write queue, running statistics and the
//! timestamp-synthesis policy.
//!
//! ## Design Pattern:
//!
//! All file mutation happens on one worker thread that owns the
//! [`TagWriter`] and the write cursor. Every operation, synchronous or
//! asynchronous, travels through the same FIFO channel, so tags are never
//! interleaved or torn at the byte level. A synchronous call attaches a
//! one-shot reply channel and blocks until its turn; an asynchronous call
//! returns immediately and delivers failures through the error hook
//! installed at open time.
//!
//! Backpressure is deliberately absent: the queue is unbounded and callers
//! that outpace storage must rate-limit externally.

use std::cmp;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use tracing::{debug, error, info, warn};

use crate::error::MuxError;
use crate::frame::{AudioFrame, VideoFrame};
use crate::metadata::{MetadataConfig, build_metadata, patch_metadata};
use crate::tag::FlvTagType;
use crate::writer::TagWriter;
use crate::{aac, avc};

/// Callback invoked once per failed queued operation.
pub type ErrorHook = Box<dyn Fn(&MuxError) + Send + Sync + 'static>;

/// Timestamp-synthesis and pacing options.
#[derive(Debug, Clone, Copy)]
pub struct MuxerOptions {
    /// When set, caller-supplied frame timestamps are ignored and each
    /// stream gets evenly spaced, strictly increasing timestamps.
    pub auto_timestamp: bool,
    /// Synthesized video frame spacing in milliseconds (40 = 25 fps).
    pub video_frame_interval_ms: u32,
    /// Synthesized audio frame spacing in milliseconds (23 ≈ one 1024-sample
    /// AAC frame at 44.1 kHz).
    pub audio_frame_interval_ms: u32,
    /// When set, the worker flushes to durable storage whenever this many
    /// milliseconds have passed since the last flush, without waiting for an
    /// explicit [`FlvMuxer::flush`] call.
    pub flush_interval_ms: Option<u32>,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            auto_timestamp: false,
            video_frame_interval_ms: 40,
            audio_frame_interval_ms: 23,
            flush_interval_ms: None,
        }
    }
}

/// Read-only statistics snapshot.
///
/// Safe to read concurrently with writes; eventually consistent with
/// operations still sitting in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MuxerStats {
    pub video_frames: u64,
    pub audio_frames: u64,
    /// Total tags written, including metadata and sequence-header tags.
    pub tags: u64,
    /// Bytes appended so far, file header included.
    pub file_size: u64,
    pub last_video_timestamp_ms: u32,
    pub last_audio_timestamp_ms: u32,
}

#[derive(Default)]
struct SharedStats {
    video_frames: AtomicU64,
    audio_frames: AtomicU64,
    tags: AtomicU64,
    file_size: AtomicU64,
    last_video_timestamp_ms: AtomicU32,
    last_audio_timestamp_ms: AtomicU32,
}

impl SharedStats {
    fn snapshot(&self) -> MuxerStats {
        MuxerStats {
            video_frames: self.video_frames.load(Ordering::Acquire),
            audio_frames: self.audio_frames.load(Ordering::Acquire),
            tags: self.tags.load(Ordering::Acquire),
            file_size: self.file_size.load(Ordering::Acquire),
            last_video_timestamp_ms: self.last_video_timestamp_ms.load(Ordering::Acquire),
            last_audio_timestamp_ms: self.last_audio_timestamp_ms.load(Ordering::Acquire),
        }
    }
}

enum Command {
    WriteVideo(VideoFrame),
    WriteAudio(AudioFrame),
    VideoSequenceHeader {
        sps: Bytes,
        pps: Bytes,
        timestamp_ms: u32,
    },
    AudioSequenceHeader {
        audio_specific_config: Bytes,
        timestamp_ms: u32,
    },
    WriteMetadata(MetadataConfig),
    RewriteMetadata(MetadataConfig),
    Flush,
    Close(MetadataConfig),
}

struct Job {
    command: Command,
    reply: Option<Sender<Result<(), MuxError>>>,
}

/// Compute the timestamp to emit for the next frame of one stream.
///
/// Auto mode ignores the caller's value entirely: the first frame of a
/// stream starts at 0 and every later frame is exactly one interval after
/// the previous one. Manual mode writes the caller's value verbatim but
/// flags regressions.
fn next_timestamp(
    last: &mut Option<u32>,
    frame_ts: u32,
    interval_ms: u32,
    auto: bool,
    stream: &'static str,
) -> u32 {
    let ts = if auto {
        // Timestamps are 32 bits on the wire; wrap the way the container does.
        last.map_or(0, |prev| prev.wrapping_add(interval_ms))
    } else {
        if let Some(prev) = *last {
            if frame_ts <= prev {
                warn!(
                    stream,
                    previous = prev,
                    current = frame_ts,
                    "non-monotonic frame timestamp, writing as given"
                );
            }
        }
        frame_ts
    };
    *last = Some(ts);
    ts
}

struct Worker {
    writer: Option<TagWriter<BufWriter<File>>>,
    /// Byte offset of the initial metadata tag, recorded at open time.
    meta_offset: u64,
    /// Mirror of the metadata tag bytes currently on disk at `meta_offset`.
    /// Kept in sync after every successful patch so the next patch scans
    /// exactly what the file contains.
    meta_tag: Vec<u8>,
    options: MuxerOptions,
    sound_flags: aac::SoundFlags,
    stats: Arc<SharedStats>,
    error_hook: Option<ErrorHook>,
    last_video_ts: Option<u32>,
    last_audio_ts: Option<u32>,
    last_flush: Instant,
}

impl Worker {
    fn run(mut self, rx: Receiver<Job>) {
        loop {
            let job = match self.time_until_flush() {
                Some(remaining) if remaining.is_zero() => {
                    self.periodic_flush();
                    continue;
                }
                Some(remaining) => match rx.recv_timeout(remaining) {
                    Ok(job) => job,
                    Err(RecvTimeoutError::Timeout) => {
                        self.periodic_flush();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            let result = self.handle(job.command);
            match job.reply {
                Some(reply) => {
                    // The submitter may have given up waiting; that is fine.
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(err) = result {
                        self.report(&err);
                    }
                }
            }
        }

        // Queue disconnected without an explicit close: the muxer was
        // dropped. Flush what was accepted; the duration stays a
        // placeholder because the final patch never ran.
        if let Some(mut writer) = self.writer.take() {
            warn!("muxer dropped without close; final duration was not backfilled");
            if let Err(err) = writer.flush() {
                self.report(&err);
            }
        }
    }

    /// Time left until the next periodic flush is due, or `None` when
    /// periodic flushing is disabled.
    fn time_until_flush(&self) -> Option<Duration> {
        let interval = Duration::from_millis(self.options.flush_interval_ms? as u64);
        Some(interval.saturating_sub(self.last_flush.elapsed()))
    }

    fn periodic_flush(&mut self) {
        self.last_flush = Instant::now();
        if self.writer.is_some() {
            debug!("periodic flush interval elapsed");
            if let Err(err) = self.flush() {
                self.report(&err);
            }
        }
    }

    fn report(&self, err: &MuxError) {
        error!(error = %err, code = err.code(), "queued write operation failed");
        if let Some(hook) = &self.error_hook {
            hook(err);
        }
    }

    fn handle(&mut self, command: Command) -> Result<(), MuxError> {
        match command {
            Command::WriteVideo(frame) => self.write_video(frame),
            Command::WriteAudio(frame) => self.write_audio(frame),
            Command::VideoSequenceHeader {
                sps,
                pps,
                timestamp_ms,
            } => {
                let body = avc::sequence_header_body(&sps, &pps)?;
                self.append_tag(FlvTagType::Video, &body, timestamp_ms)?;
                Ok(())
            }
            Command::AudioSequenceHeader {
                audio_specific_config,
                timestamp_ms,
            } => {
                let body = aac::sequence_header_body(self.sound_flags, &audio_specific_config);
                self.append_tag(FlvTagType::Audio, &body, timestamp_ms)?;
                Ok(())
            }
            Command::WriteMetadata(config) => self.write_metadata(&config),
            Command::RewriteMetadata(config) => self.rewrite_metadata(&config),
            Command::Flush => self.flush(),
            Command::Close(config) => self.close(config),
        }
    }

    fn writer_mut(&mut self) -> Result<&mut TagWriter<BufWriter<File>>, MuxError> {
        self.writer
            .as_mut()
            .ok_or(MuxError::InvalidState("writer is closed"))
    }

    /// Append one tag and account for it in the shared stats.
    fn append_tag(
        &mut self,
        tag_type: FlvTagType,
        body: &[u8],
        timestamp_ms: u32,
    ) -> Result<usize, MuxError> {
        let writer = self.writer_mut()?;
        let written = writer.write_tag(tag_type, body, timestamp_ms)?;
        self.stats.tags.fetch_add(1, Ordering::AcqRel);
        self.stats
            .file_size
            .fetch_add(written as u64, Ordering::AcqRel);
        Ok(written)
    }

    fn write_video(&mut self, frame: VideoFrame) -> Result<(), MuxError> {
        if self.writer.is_none() {
            return Err(MuxError::InvalidState("writer is closed"));
        }

        let ts = next_timestamp(
            &mut self.last_video_ts,
            frame.timestamp_ms,
            self.options.video_frame_interval_ms,
            self.options.auto_timestamp,
            "video",
        );

        // A frame carrying parameter sets asks for its sequence header to be
        // (re)emitted right before it.
        if let (Some(sps), Some(pps)) = (&frame.sps, &frame.pps) {
            let body = avc::sequence_header_body(sps, pps)?;
            self.append_tag(FlvTagType::Video, &body, ts)?;
        }

        let body = avc::nalu_body(frame.is_keyframe, &frame.data);
        self.append_tag(FlvTagType::Video, &body, ts)?;

        self.stats.video_frames.fetch_add(1, Ordering::AcqRel);
        self.stats
            .last_video_timestamp_ms
            .store(ts, Ordering::Release);
        Ok(())
    }

    fn write_audio(&mut self, frame: AudioFrame) -> Result<(), MuxError> {
        if self.writer.is_none() {
            return Err(MuxError::InvalidState("writer is closed"));
        }

        let ts = next_timestamp(
            &mut self.last_audio_ts,
            frame.timestamp_ms,
            self.options.audio_frame_interval_ms,
            self.options.auto_timestamp,
            "audio",
        );

        if let Some(asc) = &frame.audio_specific_config {
            let body = aac::sequence_header_body(self.sound_flags, asc);
            self.append_tag(FlvTagType::Audio, &body, ts)?;
        }

        let body = aac::raw_body(self.sound_flags, &frame.data);
        self.append_tag(FlvTagType::Audio, &body, ts)?;

        self.stats.audio_frames.fetch_add(1, Ordering::AcqRel);
        self.stats
            .last_audio_timestamp_ms
            .store(ts, Ordering::Release);
        Ok(())
    }

    /// Append a fresh metadata tag at the current end-of-file. Downstream
    /// readers take the last such tag as authoritative.
    fn write_metadata(&mut self, config: &MetadataConfig) -> Result<(), MuxError> {
        let tag = build_metadata(config)?;
        let writer = self.writer_mut()?;
        let written = writer.write_prebuilt_tag(&tag)?;
        self.stats.tags.fetch_add(1, Ordering::AcqRel);
        self.stats
            .file_size
            .fetch_add(written as u64, Ordering::AcqRel);
        Ok(())
    }

    /// Patch the initial metadata tag in place, then restore the append
    /// cursor. On patch failure the file is left untouched.
    fn rewrite_metadata(&mut self, config: &MetadataConfig) -> Result<(), MuxError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(MuxError::InvalidState("writer is closed"))?;
        let patched = patch_metadata(&self.meta_tag, config)?;
        writer.rewrite_at(self.meta_offset, &patched)?;
        self.meta_tag = patched;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), MuxError> {
        let writer = self.writer_mut()?;
        writer.flush()?;
        writer.get_mut().get_ref().sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Backfill the true duration into the initial metadata tag, flush and
    /// release the file.
    fn close(&mut self, mut config: MetadataConfig) -> Result<(), MuxError> {
        let mut writer = self
            .writer
            .take()
            .ok_or(MuxError::InvalidState("writer is closed"))?;

        let last_ms = cmp::max(
            self.stats.last_video_timestamp_ms.load(Ordering::Acquire),
            self.stats.last_audio_timestamp_ms.load(Ordering::Acquire),
        );
        config.duration = last_ms as f64 / 1000.0;

        let patch_result = patch_metadata(&self.meta_tag, &config)
            .and_then(|patched| {
                writer.rewrite_at(self.meta_offset, &patched)?;
                self.meta_tag = patched;
                Ok(())
            });

        let flush_result = writer.flush().and_then(|()| {
            writer.get_mut().get_ref().sync_all()?;
            Ok(())
        });
        drop(writer);

        info!(
            duration_s = config.duration,
            stats = ?self.stats.snapshot(),
            "closed FLV output"
        );
        patch_result.and(flush_result)
    }
}

/// Streaming FLV writer front end.
///
/// Construction opens the file, writes the header and the initial metadata
/// tag, and spawns the worker thread that owns the file from then on. All
/// methods are safe to call from the owning thread; sharing a muxer across
/// producer threads requires external synchronization, except for
/// [`FlvMuxer::stats`], which is always safe.
pub struct FlvMuxer {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<SharedStats>,
}

impl FlvMuxer {
    /// Create (or truncate) `path` and open a muxer over it.
    ///
    /// Writes the FLV header and the initial `onMetaData` tag built from
    /// `config` before returning, recording the tag's offset for the final
    /// duration backfill.
    pub fn create(
        path: impl AsRef<Path>,
        config: &MetadataConfig,
        options: MuxerOptions,
        error_hook: Option<ErrorHook>,
    ) -> Result<Self, MuxError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())
            .map_err(MuxError::FileOpen)?;

        let mut writer = TagWriter::new(BufWriter::new(file));
        let stream_type = config.stream_type;
        let header_len = writer.write_header(stream_type.has_audio(), stream_type.has_video())?;

        let meta_offset = writer.position();
        let meta_tag = build_metadata(config)?;
        writer.write_prebuilt_tag(&meta_tag)?;

        let stats = Arc::new(SharedStats::default());
        stats.tags.store(1, Ordering::Release);
        stats
            .file_size
            .store(header_len as u64 + meta_tag.len() as u64, Ordering::Release);

        debug!(
            path = %path.as_ref().display(),
            meta_offset,
            meta_len = meta_tag.len(),
            "opened FLV output"
        );

        let worker = Worker {
            writer: Some(writer),
            meta_offset,
            meta_tag: meta_tag.to_vec(),
            options,
            sound_flags: aac::SoundFlags::from_config(
                config.audio_sample_rate,
                config.audio_sample_size,
                config.stereo,
            ),
            stats: Arc::clone(&stats),
            error_hook,
            last_video_ts: None,
            last_audio_ts: None,
            last_flush: Instant::now(),
        };

        let (tx, rx) = unbounded();
        let handle = std::thread::Builder::new()
            .name("flv-mux-writer".to_string())
            .spawn(move || worker.run(rx))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(handle),
            stats,
        })
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> MuxerStats {
        self.stats.snapshot()
    }

    fn submit_sync(&self, command: Command) -> Result<(), MuxError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or(MuxError::InvalidState("writer is closed"))?;
        let (reply_tx, reply_rx) = bounded(1);
        tx.send(Job {
            command,
            reply: Some(reply_tx),
        })
        .map_err(|_| MuxError::QueueClosed)?;
        reply_rx.recv().map_err(|_| MuxError::QueueClosed)?
    }

    fn submit_async(&self, command: Command) -> Result<(), MuxError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or(MuxError::InvalidState("writer is closed"))?;
        tx.send(Job {
            command,
            reply: None,
        })
        .map_err(|_| MuxError::QueueClosed)
    }

    /// Write one video frame, blocking until it reaches the file buffer.
    pub fn write_video_frame(&self, frame: VideoFrame) -> Result<(), MuxError> {
        self.submit_sync(Command::WriteVideo(frame))
    }

    /// Write one audio frame, blocking until it reaches the file buffer.
    pub fn write_audio_frame(&self, frame: AudioFrame) -> Result<(), MuxError> {
        self.submit_sync(Command::WriteAudio(frame))
    }

    /// Queue one video frame and return immediately. Failures surface
    /// through the error hook.
    pub fn write_video_frame_async(&self, frame: VideoFrame) -> Result<(), MuxError> {
        self.submit_async(Command::WriteVideo(frame))
    }

    /// Queue one audio frame and return immediately. Failures surface
    /// through the error hook.
    pub fn write_audio_frame_async(&self, frame: AudioFrame) -> Result<(), MuxError> {
        self.submit_async(Command::WriteAudio(frame))
    }

    /// Emit an AVC sequence-header tag built from raw SPS and PPS. Must
    /// precede the first keyframe tag that depends on it.
    pub fn write_video_sequence_header(
        &self,
        sps: Bytes,
        pps: Bytes,
        timestamp_ms: u32,
    ) -> Result<(), MuxError> {
        self.submit_sync(Command::VideoSequenceHeader {
            sps,
            pps,
            timestamp_ms,
        })
    }

    /// Emit an AAC sequence-header tag carrying the raw AudioSpecificConfig.
    /// Must precede dependent raw AAC tags.
    pub fn write_audio_sequence_header(
        &self,
        audio_specific_config: Bytes,
        timestamp_ms: u32,
    ) -> Result<(), MuxError> {
        self.submit_sync(Command::AudioSequenceHeader {
            audio_specific_config,
            timestamp_ms,
        })
    }

    /// Append a fresh metadata tag at end-of-file from a config snapshot.
    pub fn write_metadata(&self, config: &MetadataConfig) -> Result<(), MuxError> {
        self.submit_sync(Command::WriteMetadata(config.clone()))
    }

    /// Patch the initial metadata tag in place with values from `config`.
    /// The tag's byte length never changes; on failure the file is left as
    /// it was.
    pub fn rewrite_metadata(&self, config: &MetadataConfig) -> Result<(), MuxError> {
        self.submit_sync(Command::RewriteMetadata(config.clone()))
    }

    /// Force previously appended bytes to durable storage. Serialized
    /// through the write queue so it can never land mid-tag.
    pub fn flush(&self) -> Result<(), MuxError> {
        self.submit_sync(Command::Flush)
    }

    /// Drain all pending operations, backfill the final duration into the
    /// initial metadata tag, flush and release the file.
    ///
    /// The muxer transitions to its terminal state; any later call returns
    /// [`MuxError::InvalidState`].
    pub fn close(&mut self, config: &MetadataConfig) -> Result<(), MuxError> {
        let result = self.submit_sync(Command::Close(config.clone()));
        // Disconnect the queue and wait for the worker to finish, whether
        // or not the final patch succeeded.
        self.tx.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        result
    }
}

impl Drop for FlvMuxer {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
