//! # FLV Streaming Muxer
//!
//! Assembles already-encoded video and audio frames into a valid, appendable
//! FLV file for live/continuous capture pipelines.
//!
//! ## Features
//!
//! - Creating FLV files with proper headers and an `onMetaData` script tag
//! - Writing AVC/H.264 video tags and AAC audio tags with sequence headers
//! - In-place metadata backfilling (final duration) without resizing the tag
//! - A dedicated single-worker write queue so producers never block on disk
//! - Automatic per-stream timestamp synthesis for jittery sources
//!
//! ## Usage
//!
//! ```no_run
//! use flv_mux::metadata::{MetadataConfig, StreamType};
//! use flv_mux::muxer::{FlvMuxer, MuxerOptions};
//!
//! # fn main() -> Result<(), flv_mux::error::MuxError> {
//! let mut config = MetadataConfig::new(StreamType::AudioVideo);
//! config.width = 1280;
//! config.height = 720;
//!
//! let mut muxer = FlvMuxer::create("output.flv", &config, MuxerOptions::default(), None)?;
//! // feed frames ...
//! muxer.close(&config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! MIT License

pub mod aac;
pub mod avc;
pub mod error;
pub mod frame;
pub mod inspect;
pub mod metadata;
pub mod muxer;
pub mod tag;
pub mod writer;

/// The script tag name every metadata tag in this crate is keyed by.
pub const AMF0_ON_METADATA: &str = "onMetaData";

pub use error::MuxError;
pub use frame::{AudioFrame, VideoFrame};
pub use metadata::{MetaValue, MetadataConfig, StreamType};
pub use muxer::{FlvMuxer, MuxerOptions, MuxerStats};
