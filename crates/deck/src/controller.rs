//! Screen controller: owns the selection, the playback session and the progress poller.
//!
//! All methods run on the UI thread. The session is held as `Option<S>`; a new selection
//! releases the old one before creating the next, and dropping the controller releases
//! whatever is left.

use std::time::Duration;

use audio_player::{PlaybackEngine, PlaybackError, PlaybackSession};
use crossbeam_channel::Sender;

use crate::media_ref::MediaRef;
use crate::poller::{self, PollerHandle, ProgressSample};
use crate::resolver::{self, MetadataProvider, TrackTags};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

/// Which actions are currently enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
}

impl Controls {
    pub fn derive(has_selection: bool, playing: bool) -> Self {
        Self {
            play: has_selection && !playing,
            pause: has_selection && playing,
            stop: has_selection,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// The action was disabled or the input was stale; nothing changed.
    Ignored,
}

pub struct Controller<E: PlaybackEngine, M: MetadataProvider> {
    engine: E,
    metadata: M,
    selected: Option<MediaRef>,
    display_name: Option<String>,
    tags: TrackTags,
    session: Option<E::Session>,
    state: PlaybackState,
    progress: f64,
    position_ms: u64,
    duration_ms: Option<u64>,
    notice: Option<String>,
    poller: Option<PollerHandle>,
    generation: u64,
    progress_tx: Sender<ProgressSample>,
    poll_interval: Duration,
}

impl<E: PlaybackEngine, M: MetadataProvider> Controller<E, M> {
    pub fn new(
        engine: E,
        metadata: M,
        progress_tx: Sender<ProgressSample>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            metadata,
            selected: None,
            display_name: None,
            tags: TrackTags::default(),
            session: None,
            state: PlaybackState::Idle,
            progress: 0.0,
            position_ms: 0,
            duration_ms: None,
            notice: None,
            poller: None,
            generation: 0,
            progress_tx,
            poll_interval,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn controls(&self) -> Controls {
        Controls::derive(
            self.selected.is_some() && self.session.is_some(),
            self.state == PlaybackState::Playing,
        )
    }

    /// Last published progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn selected(&self) -> Option<&MediaRef> {
        self.selected.as_ref()
    }

    /// Name of the last picked file, kept even when it could not be played.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn tags(&self) -> &TrackTags {
        &self.tags
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Generation of the running poller, if any.
    pub fn poll_generation(&self) -> Option<u64> {
        self.poller.as_ref().map(PollerHandle::generation)
    }

    /// Replace the selection with `media` and start playing it.
    ///
    /// On failure the old session is still gone, the name stays visible and state is Idle.
    pub fn select(&mut self, media: MediaRef) -> ActionOutcome {
        self.cancel_poller();
        self.release_session();

        self.display_name = Some(resolver::display_name_or_placeholder(&self.metadata, &media));
        self.tags = resolver::probe_tags(&media);
        self.progress = 0.0;
        self.position_ms = 0;
        self.duration_ms = None;
        self.notice = None;

        match self.engine.create_and_start(media.path()) {
            Ok(session) => {
                self.duration_ms = session.duration_ms();
                self.session = Some(session);
                self.selected = Some(media);
                self.state = PlaybackState::Playing;
                self.start_poller();
                tracing::info!(
                    name = self.display_name.as_deref().unwrap_or_default(),
                    duration_ms = ?self.duration_ms,
                    "playing"
                );
            }
            Err(e) => {
                tracing::warn!(media = %media, "selection not playable: {e}");
                self.selected = None;
                self.state = PlaybackState::Idle;
                self.notice = Some(notice_for(&e));
            }
        }
        ActionOutcome::Applied
    }

    pub fn play(&mut self) -> ActionOutcome {
        if !self.controls().play {
            return ActionOutcome::Ignored;
        }
        let Some(session) = self.session.as_mut() else {
            return ActionOutcome::Ignored;
        };
        session.resume();
        self.state = PlaybackState::Playing;
        self.notice = None;
        self.start_poller();
        tracing::info!("resumed");
        ActionOutcome::Applied
    }

    pub fn pause(&mut self) -> ActionOutcome {
        if !self.controls().pause {
            return ActionOutcome::Ignored;
        }
        let Some(session) = self.session.as_mut() else {
            return ActionOutcome::Ignored;
        };
        if session.is_finished() {
            // The end-of-stream sample has not arrived yet.
            self.stop_session();
            return ActionOutcome::Applied;
        }
        session.pause();
        if let Some(ratio) = session.position_ratio() {
            self.progress = ratio.max(self.progress).clamp(0.0, 1.0);
        }
        self.position_ms = self.position_ms.max(session.position_ms());
        self.cancel_poller();
        self.state = PlaybackState::Paused;
        tracing::info!(position_ms = self.position_ms, "paused");
        ActionOutcome::Applied
    }

    pub fn stop(&mut self) -> ActionOutcome {
        if !self.controls().stop {
            return ActionOutcome::Ignored;
        }
        self.stop_session();
        ActionOutcome::Applied
    }

    /// Apply a poller sample. Samples from a cancelled poller, or arriving outside Playing,
    /// are ignored.
    pub fn on_progress(&mut self, sample: ProgressSample) -> ActionOutcome {
        if self.state != PlaybackState::Playing || self.poll_generation() != Some(sample.generation)
        {
            tracing::trace!(generation = sample.generation, "stale progress sample");
            return ActionOutcome::Ignored;
        }
        if let Some(ratio) = sample.ratio {
            self.progress = ratio.max(self.progress).clamp(0.0, 1.0);
        }
        self.position_ms = self.position_ms.max(sample.position_ms);
        if sample.duration_ms.is_some() {
            self.duration_ms = sample.duration_ms;
        }
        if sample.finished {
            tracing::info!("end of stream");
            self.stop_session();
        }
        ActionOutcome::Applied
    }

    /// Cancel the poller and release the session. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.cancel_poller();
        self.release_session();
    }

    fn stop_session(&mut self) {
        self.cancel_poller();
        self.progress = 0.0;
        self.position_ms = 0;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.stop() {
            Ok(()) => {
                self.state = PlaybackState::Stopped;
                tracing::info!("stopped");
            }
            Err(e) => {
                tracing::warn!("stop failed, dropping session: {e}");
                self.release_session();
                self.selected = None;
                self.state = PlaybackState::Idle;
                self.notice = Some(notice_for(&e));
            }
        }
    }

    fn start_poller(&mut self) {
        self.cancel_poller();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        self.generation += 1;
        match poller::start(
            session.clock(),
            self.poll_interval,
            self.generation,
            self.progress_tx.clone(),
        ) {
            Ok(handle) => self.poller = Some(handle),
            Err(e) => tracing::warn!("progress updates unavailable: {e:#}"),
        }
    }

    fn cancel_poller(&mut self) {
        if let Some(mut handle) = self.poller.take() {
            handle.cancel();
        }
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }
}

impl<E: PlaybackEngine, M: MetadataProvider> Drop for Controller<E, M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn notice_for(err: &PlaybackError) -> String {
    match err {
        PlaybackError::Unplayable { reason, .. } => format!("Cannot play this file: {reason}"),
        PlaybackError::Output(reason) => format!("Audio output unavailable: {reason}"),
    }
}
