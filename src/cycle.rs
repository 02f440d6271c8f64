//! The per-tick driver: gate on every feed, merge, fan out, repeat until told to stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::align::pair::{AlignmentFailure, StitchOutcome};
use crate::compose::tree::CompositionTree;
use crate::correct::Corrector;
use crate::feed::set::FeedSet;
use crate::feed::source::{Feed, FrameSource};
use crate::foundation::error::{StitchError, StitchResult};
use crate::sink::fanout::{DispatchReport, FanOut};

/// Cooperative stop flag, checked once per tick.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next tick boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel on SIGINT/SIGTERM. Repeated signals only set the flag again, so cleanup always
    /// runs to completion.
    pub fn register_signals(&self) -> StitchResult<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        for sig in [SIGINT, SIGTERM] {
            signal_hook::flag::register(sig, Arc::clone(&self.0))?;
        }
        Ok(())
    }
}

/// Lifecycle of a [`FrameCycle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    /// Built, sources not yet checked.
    Starting,
    /// Ticking.
    Running,
    /// A stop was decided; cleanup has not run yet.
    Stopping,
    /// Cleanup done. Terminal.
    Stopped,
}

/// Why a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A source failed its startup probe.
    FeedsInvalid,
    /// A source ran out of frames.
    FeedExhausted,
    /// The cancel token fired.
    Cancelled,
    /// The preview asked to quit.
    QuitRequested,
    /// An unrecoverable error.
    Failed(String),
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Cycles in which every source delivered a frame.
    pub ticks: u64,
    /// Composites handed to the fan-out.
    pub composites: u64,
    /// Cycles skipped because alignment failed.
    pub skipped: u64,
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// Errors raised while releasing sources and sinks.
    pub cleanup_errors: Vec<String>,
}

/// Result of one [`FrameCycle::tick`].
#[derive(Clone, Debug, PartialEq)]
pub enum Tick {
    /// A composite was dispatched.
    Composited(DispatchReport),
    /// Alignment failed; nothing was dispatched.
    Skipped(AlignmentFailure),
    /// The cycle is no longer running.
    Stopped(StopReason),
}

/// Drives feeds, composition tree and fan-out through `Starting → Running → Stopping → Stopped`.
pub struct FrameCycle<S: FrameSource = Feed> {
    state: CycleState,
    feeds: FeedSet<S>,
    tree: CompositionTree,
    corrector: Option<Box<dyn Corrector>>,
    fanout: FanOut,
    cancel: CancelToken,
    ticks: u64,
    composites: u64,
    skipped: u64,
    stop_reason: Option<StopReason>,
    cleanup_errors: Vec<String>,
}

impl<S: FrameSource> FrameCycle<S> {
    /// Assemble a cycle. The tree must be sized to the feed set.
    pub fn new(
        feeds: FeedSet<S>,
        tree: CompositionTree,
        fanout: FanOut,
        cancel: CancelToken,
    ) -> StitchResult<Self> {
        if tree.inputs() != feeds.len() {
            return Err(StitchError::validation(format!(
                "composition tree expects {} inputs but the feed set has {}",
                tree.inputs(),
                feeds.len()
            )));
        }
        Ok(Self {
            state: CycleState::Starting,
            feeds,
            tree,
            corrector: None,
            fanout,
            cancel,
            ticks: 0,
            composites: 0,
            skipped: 0,
            stop_reason: None,
            cleanup_errors: Vec::new(),
        })
    }

    /// Apply `corrector` to every raw frame before merging.
    pub fn with_corrector(mut self, corrector: Box<dyn Corrector>) -> Self {
        self.corrector = Some(corrector);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// The composition tree.
    pub fn tree(&self) -> &CompositionTree {
        &self.tree
    }

    /// Forget every cached homography (scene cut, camera moved).
    pub fn reset_alignment(&mut self) {
        self.tree.reset();
    }

    /// The token this cycle observes.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Check every source and open the encoder pipe. Falls through to `Stopping` when a source
    /// is invalid or the pipe cannot be opened.
    pub fn start(&mut self) -> StitchResult<()> {
        if self.state != CycleState::Starting {
            return Err(StitchError::validation(format!(
                "start called in state {:?}",
                self.state
            )));
        }
        if !self.feeds.all_valid() {
            tracing::error!("not every source is valid, stopping");
            self.stop(StopReason::FeedsInvalid);
            return Ok(());
        }
        if let Err(e) = self.fanout.start() {
            tracing::error!(error = %e, "failed to start sinks");
            self.stop(StopReason::Failed(e.to_string()));
            return Ok(());
        }
        tracing::info!(sources = self.feeds.len(), "pipeline running");
        self.state = CycleState::Running;
        Ok(())
    }

    /// Run one cycle: readiness check, pull, correct, merge, dispatch.
    ///
    /// Errors also move the cycle to `Stopping`; alignment failures only skip the tick.
    pub fn tick(&mut self) -> StitchResult<Tick> {
        match self.state {
            CycleState::Running => {}
            CycleState::Starting => {
                return Err(StitchError::validation("tick called before start"));
            }
            CycleState::Stopping | CycleState::Stopped => {
                return Ok(Tick::Stopped(self.current_reason()));
            }
        }

        if self.cancel.is_cancelled() {
            tracing::info!("cancel requested");
            self.stop(StopReason::Cancelled);
            return Ok(Tick::Stopped(StopReason::Cancelled));
        }

        match self.step() {
            Ok(tick) => Ok(tick),
            Err(e) => {
                tracing::error!(error = %e, "cycle failed");
                self.stop(StopReason::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn step(&mut self) -> StitchResult<Tick> {
        if !self.feeds.all_have_next()? {
            self.stop(StopReason::FeedExhausted);
            return Ok(Tick::Stopped(StopReason::FeedExhausted));
        }
        let mut frames = self.feeds.pull_all()?;
        if let Some(c) = &self.corrector {
            frames = frames.par_iter().map(|f| c.correct(f)).collect();
        }
        self.ticks += 1;

        match self.tree.merge(frames)? {
            StitchOutcome::Composite(composite) => {
                let report = self.fanout.dispatch(&composite);
                self.composites += 1;
                tracing::debug!(
                    tick = self.ticks,
                    size = %composite.resolution(),
                    ?report,
                    "composite dispatched"
                );
                if report.quit_requested {
                    self.stop(StopReason::QuitRequested);
                }
                Ok(Tick::Composited(report))
            }
            StitchOutcome::Skipped(failure) => {
                self.skipped += 1;
                tracing::warn!(tick = self.ticks, %failure, "alignment failed, skipping tick");
                Ok(Tick::Skipped(failure))
            }
        }
    }

    fn stop(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            tracing::info!(?reason, "stopping");
            self.stop_reason = Some(reason);
        }
        if self.state != CycleState::Stopped {
            self.state = CycleState::Stopping;
        }
    }

    fn current_reason(&self) -> StopReason {
        self.stop_reason.clone().unwrap_or(StopReason::Cancelled)
    }

    /// Release sources, close the preview, finalize the recorder and close the encoder pipe, in
    /// that order. Every step runs even if an earlier one fails. Runs once; later calls return
    /// the same report.
    pub fn shutdown(&mut self) -> RunReport {
        if self.state != CycleState::Stopped {
            if self.stop_reason.is_none() {
                self.stop(StopReason::Cancelled);
            }
            let steps: [(&str, StitchResult<()>); 4] = [
                ("sources", self.feeds.close()),
                ("preview", self.fanout.close_preview()),
                ("recorder", self.fanout.finish_record()),
                ("encoder pipe", self.fanout.finish_stream()),
            ];
            for (what, result) in steps {
                if let Err(e) = result {
                    tracing::error!(step = what, error = %e, "cleanup failed");
                    self.cleanup_errors.push(format!("{what}: {e}"));
                }
            }
            self.state = CycleState::Stopped;
            tracing::info!(
                ticks = self.ticks,
                composites = self.composites,
                skipped = self.skipped,
                "pipeline stopped"
            );
        }
        RunReport {
            ticks: self.ticks,
            composites: self.composites,
            skipped: self.skipped,
            stop_reason: self.current_reason(),
            cleanup_errors: self.cleanup_errors.clone(),
        }
    }

    /// Start (if needed), tick until stopped, then clean up.
    pub fn run(mut self) -> RunReport {
        if self.state == CycleState::Starting
            && let Err(e) = self.start()
        {
            self.stop(StopReason::Failed(e.to_string()));
        }
        while self.state == CycleState::Running {
            // Errors already moved the cycle to `Stopping`.
            let _ = self.tick();
        }
        self.shutdown()
    }
}

impl<S: FrameSource> Drop for FrameCycle<S> {
    fn drop(&mut self) {
        if self.state != CycleState::Stopped {
            self.shutdown();
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/cycle.rs"]
mod tests;
