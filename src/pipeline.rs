//! Assembly of a [`FrameCycle`] from a validated [`StitchConfig`].

use crate::align::aligner::{FixedAligner, ImageAligner};
use crate::align::homography::Homography;
use crate::compose::tree::CompositionTree;
use crate::config::{AlignerConfig, StitchConfig};
use crate::correct::RadialCorrector;
use crate::cycle::{CancelToken, FrameCycle};
use crate::feed::set::FeedSet;
use crate::feed::source::Feed;
use crate::foundation::error::{StitchError, StitchResult};
use crate::sink::fanout::FanOut;
use crate::sink::ffmpeg::FfmpegSink;
use crate::sink::preview::SnapshotPreview;

/// Build a cycle using the aligner selected in the config.
///
/// `correspondence` aligners need a keypoint matcher that only library callers can supply; use
/// [`build_cycle_with`] for those.
pub fn build_cycle(config: &StitchConfig, cancel: CancelToken) -> StitchResult<FrameCycle> {
    match &config.align.aligner {
        AlignerConfig::Fixed { homographies } => {
            let homographies = homographies
                .iter()
                .map(|h| Homography::from_row_major(*h))
                .collect::<StitchResult<Vec<_>>>()?;
            build_cycle_with(config, cancel, |node| {
                let h = homographies
                    .get(node)
                    .copied()
                    .unwrap_or_else(Homography::identity);
                Box::new(FixedAligner::new(h))
            })
        }
        AlignerConfig::Correspondence => Err(StitchError::config(
            "the correspondence aligner needs a keypoint matcher; build the cycle with build_cycle_with",
        )),
    }
}

/// Build a cycle whose merge nodes get their aligners from `make_aligner` (called with the node
/// index).
pub fn build_cycle_with(
    config: &StitchConfig,
    cancel: CancelToken,
    make_aligner: impl FnMut(usize) -> Box<dyn ImageAligner>,
) -> StitchResult<FrameCycle> {
    config.validate()?;

    let feeds = config
        .sources
        .iter()
        .enumerate()
        .map(|(idx, desc)| Feed::from_descriptor(idx, desc))
        .collect::<StitchResult<Vec<_>>>()?;
    let tree = CompositionTree::new(feeds.len(), make_aligner, config.align.params)?;
    let feeds = FeedSet::new(feeds)?;
    let fanout = build_fanout(config)?;

    let cycle = FrameCycle::new(feeds, tree, fanout, cancel)?;
    Ok(match &config.correction {
        Some(c) => cycle.with_corrector(Box::new(RadialCorrector::new(c))),
        None => cycle,
    })
}

/// The fan-out described by the config's preview, record and stream sections.
pub fn build_fanout(config: &StitchConfig) -> StitchResult<FanOut> {
    let mut fanout = FanOut::new(config.output.resolution()?, config.output.fps);
    if config.preview.enabled {
        fanout = fanout.with_preview(Box::new(SnapshotPreview::new(&config.preview)?));
    }
    if let Some(record) = &config.record {
        fanout = fanout.with_recorder(Box::new(FfmpegSink::recorder(record)));
    }
    if let Some(stream) = &config.stream {
        fanout = fanout.with_stream(Box::new(FfmpegSink::stream(stream)));
    }
    Ok(fanout)
}
