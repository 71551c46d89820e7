//! Common test infrastructure
//!
//! Integration suites only import from this module. Everything runs
//! against fake media and download engines, so no ffmpeg or yt-dlp
//! binary is needed.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{fake_audio, pro_user, TestPipeline};
//!
//! #[tokio::test]
//! async fn test_upload() {
//!     let harness = TestPipeline::new().await;
//!     let staged = harness.upload(&pro_user(), "song.mp3", 60.0).await;
//!     assert_eq!(staged.duration_seconds, Some(60.0));
//! }
//! ```
#![allow(dead_code)]

mod constants;
mod fakes;
mod harness;
mod upstream;

pub use constants::*;
pub use fakes::{
    fake_audio, fake_duration, FakeMediaEngine, FakeVideoEngine, ImageDroppingContainer,
};
pub use harness::{TestPipeline, VIDEO_TRACK_SECS};
pub use upstream::{spawn_upstream, spawn_upstream_with};
