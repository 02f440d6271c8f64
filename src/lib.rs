#![forbid(unsafe_code)]
//! Real-time stitching of 1 to 4 video sources into one wide composite.
//!
//! A [`FrameCycle`] pulls one frame per source from a [`FeedSet`], merges them through a
//! [`CompositionTree`] of homography-caching [`PairAligner`]s, and hands the composite to a
//! [`FanOut`] that previews, records and streams it.

pub mod align;
pub mod compose;
pub mod config;
pub mod correct;
pub mod cycle;
pub mod feed;
pub mod foundation;
pub mod logging;
pub mod pipeline;
pub mod sink;

pub use align::aligner::{
    AlignOutcome, AlignParams, CorrespondenceAligner, FixedAligner, ImageAligner, KNN_NEIGHBORS,
    KeypointMatcher, MatchCandidate,
};
pub use align::homography::Homography;
pub use align::pair::{AlignmentFailure, FailureKind, PairAligner, PairState, StitchOutcome};
pub use compose::tree::{CompositionTree, MAX_INPUTS};
pub use config::{
    AlignConfig, AlignerConfig, CorrectionConfig, LoggingConfig, OutputConfig, PreviewConfig,
    RecordConfig, SourceDescriptor, StitchConfig, StreamConfig,
};
pub use correct::{Corrector, RadialCorrector};
pub use cycle::{CancelToken, CycleState, FrameCycle, RunReport, StopReason, Tick};
pub use feed::device::LiveDeviceFeed;
pub use feed::file::FileFeed;
pub use feed::probe_video_size;
pub use feed::set::FeedSet;
pub use feed::source::{Feed, FrameSource};
pub use foundation::core::{CHANNELS, Fps, Frame, Resolution, SourceTag};
pub use foundation::error::{StitchError, StitchResult};
pub use logging::init_logging;
pub use pipeline::{build_cycle, build_cycle_with, build_fanout};
pub use sink::fanout::{DeliveryStatus, DispatchReport, FanOut};
pub use sink::ffmpeg::{FfmpegOutput, FfmpegSink, ensure_parent_dir, is_ffmpeg_on_path};
pub use sink::preview::{Preview, PreviewKey, SnapshotPreview};
pub use sink::{FrameSink, InMemorySink, SinkConfig};
