use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use audio_player::{LocalEngine, PlaybackEngine};
use crossbeam_channel::{Receiver, unbounded};
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, widgets::ListState};

use crate::config::Settings;
use crate::controller::{ActionOutcome, Controller, PlaybackState};
use crate::media_ref::MediaRef;
use crate::picker::{AUDIO_FILTER, FilePicker, PickerOutcome};
use crate::poller::ProgressSample;
use crate::resolver::{FsMetadataProvider, MetadataProvider};

use super::render;

const LOG_CAP: usize = 500;

/// Build the controller, open the terminal and drive the event loop until quit.
pub(crate) fn run_tui(settings: Settings, log_rx: Receiver<String>) -> Result<()> {
    let engine = LocalEngine::new(settings.device.clone(), settings.playback.clone());
    let (progress_tx, progress_rx) = unbounded::<ProgressSample>();
    let controller = Controller::new(
        engine,
        FsMetadataProvider,
        progress_tx,
        settings.poll_interval,
    );
    let mut app = App::new(
        controller,
        progress_rx,
        log_rx,
        settings.start_dir.clone(),
        settings.device.clone(),
    );

    if let Some(file) = settings.initial_file.as_ref() {
        match MediaRef::from_path(file) {
            Ok(media) => app.select(media),
            Err(e) => app.status = format!("Cannot open {}: {e:#}", file.display()),
        }
    }

    let mut term = init_terminal()?;
    let result = ui_loop(&mut term, &mut app);

    app.controller.shutdown();
    restore_terminal(&mut term)?;
    result
}

/// In-memory UI state for rendering + interaction.
pub(crate) struct App<E: PlaybackEngine, M: MetadataProvider> {
    pub(crate) controller: Controller<E, M>,
    progress_rx: Receiver<ProgressSample>,
    pub(crate) browse_dir: PathBuf,
    pub(crate) device: Option<String>,

    pub(crate) picker: Option<FilePicker>,
    pub(crate) picker_state: ListState,

    pub(crate) status: String,
    pub(crate) help_open: bool,
    pub(crate) logs_open: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) logs_scroll: usize,
    last_status_snapshot: String,
    log_rx: Receiver<String>,
}

impl<E: PlaybackEngine, M: MetadataProvider> App<E, M> {
    pub(crate) fn new(
        controller: Controller<E, M>,
        progress_rx: Receiver<ProgressSample>,
        log_rx: Receiver<String>,
        browse_dir: PathBuf,
        device: Option<String>,
    ) -> Self {
        Self {
            controller,
            progress_rx,
            browse_dir,
            device,
            picker: None,
            picker_state: ListState::default(),
            status: "Press o to select a file".into(),
            help_open: false,
            logs_open: false,
            logs: VecDeque::new(),
            logs_scroll: 0,
            last_status_snapshot: String::new(),
            log_rx,
        }
    }

    /// Handle one key press. Returns `true` when the app should quit.
    pub(crate) fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.picker.is_some() {
            self.handle_picker_key(code);
            return false;
        }
        if self.logs_open {
            match code {
                KeyCode::Char('q') => return true,
                KeyCode::Esc | KeyCode::Char('l') => self.toggle_logs(),
                KeyCode::Up => self.scroll_logs_up(),
                KeyCode::Down => self.scroll_logs_down(),
                _ => {}
            }
            return false;
        }
        if self.help_open {
            match code {
                KeyCode::Char('q') => return true,
                KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('?') => self.help_open = false,
                _ => {}
            }
            return false;
        }
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('o') => self.open_picker(),
            KeyCode::Char('p') => self.play(),
            KeyCode::Char(' ') => self.pause(),
            KeyCode::Char('s') => self.stop(),
            KeyCode::Char('l') => self.toggle_logs(),
            KeyCode::Char('h') | KeyCode::Char('?') => self.help_open = true,
            _ => {}
        }
        false
    }

    fn handle_picker_key(&mut self, code: KeyCode) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };
        let outcome = match code {
            KeyCode::Esc => picker.cancel(),
            KeyCode::Up => {
                picker.select_prev();
                PickerOutcome::Browsing
            }
            KeyCode::Down => {
                picker.select_next();
                PickerOutcome::Browsing
            }
            KeyCode::Left | KeyCode::Backspace => {
                picker.go_parent();
                PickerOutcome::Browsing
            }
            KeyCode::Enter | KeyCode::Right => picker.activate(),
            _ => PickerOutcome::Browsing,
        };
        match outcome {
            PickerOutcome::Browsing => {}
            PickerOutcome::Cancelled => {
                self.close_picker();
                self.status = "Selection cancelled".into();
            }
            PickerOutcome::Picked(media) => {
                self.close_picker();
                self.select(media);
            }
        }
    }

    fn open_picker(&mut self) {
        match FilePicker::open(&self.browse_dir, AUDIO_FILTER) {
            Ok(picker) => {
                self.picker_state.select(picker.selected());
                self.picker = Some(picker);
                self.status = "Select an audio file".into();
            }
            Err(e) => self.status = format!("Cannot browse: {e:#}"),
        }
    }

    fn close_picker(&mut self) {
        if let Some(picker) = self.picker.take() {
            // Reopen where the user left off.
            self.browse_dir = picker.dir().to_path_buf();
        }
    }

    pub(crate) fn select(&mut self, media: MediaRef) {
        self.controller.select(media);
        self.status = match (self.controller.state(), self.controller.notice()) {
            (PlaybackState::Playing, _) => {
                format!("Playing {}", self.controller.display_name().unwrap_or("-"))
            }
            (_, Some(notice)) => notice.to_string(),
            _ => "Not playing".into(),
        };
    }

    fn play(&mut self) {
        if self.controller.play() == ActionOutcome::Applied {
            self.status = "Playing".into();
        }
    }

    fn pause(&mut self) {
        if self.controller.pause() == ActionOutcome::Applied {
            self.status = "Paused".into();
        }
    }

    fn stop(&mut self) {
        if self.controller.stop() == ActionOutcome::Applied {
            self.status = match self.controller.notice() {
                Some(notice) => notice.to_string(),
                None => "Stopped".into(),
            };
        }
    }

    pub(crate) fn drain_progress(&mut self) {
        while let Ok(sample) = self.progress_rx.try_recv() {
            let applied = self.controller.on_progress(sample) == ActionOutcome::Applied;
            if applied && sample.finished {
                self.status = "Finished".into();
            }
        }
    }

    fn toggle_logs(&mut self) {
        self.logs_open = !self.logs_open;
        if !self.logs_open {
            self.logs_scroll = 0;
        }
    }

    fn scroll_logs_up(&mut self) {
        let max = self.logs.len().saturating_sub(1);
        self.logs_scroll = (self.logs_scroll + 1).min(max);
    }

    fn scroll_logs_down(&mut self) {
        self.logs_scroll = self.logs_scroll.saturating_sub(1);
    }

    pub(crate) fn push_log_line(&mut self, line: String) {
        if self.logs.len() >= LOG_CAP {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    fn note_status_change(&mut self) {
        if self.last_status_snapshot == self.status {
            return;
        }
        self.last_status_snapshot = self.status.clone();
        self.push_log_line(format!("status: {}", self.status));
    }

    fn drain_logs(&mut self) {
        while let Ok(line) = self.log_rx.try_recv() {
            self.push_log_line(line);
        }
    }
}

fn ui_loop<E: PlaybackEngine, M: MetadataProvider>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<E, M>,
) -> Result<()> {
    let tick = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        app.drain_progress();
        app.drain_logs();
        terminal.draw(|f| render::draw(f, app))?;

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                if k.kind == KeyEventKind::Press && app.handle_key(k.code) {
                    return Ok(());
                }
            }
        }

        app.note_status_change();

        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::controller::tests::FakeEngine;
    use crate::poller;
    use audio_player::PlaybackClock;
    use crossbeam_channel::Sender;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub(crate) type TestApp = App<FakeEngine, FsMetadataProvider>;

    pub(crate) struct Harness {
        pub(crate) dir: tempfile::TempDir,
        pub(crate) app: TestApp,
        pub(crate) log_tx: Sender<String>,
        pub(crate) progress_tx: Sender<ProgressSample>,
        clocks: Rc<RefCell<Vec<PlaybackClock>>>,
    }

    pub(crate) fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let (progress_tx, progress_rx) = unbounded();
        let (log_tx, log_rx) = unbounded();
        let engine = FakeEngine::default();
        let clocks = engine.clocks.clone();
        // Long interval: samples are fed by hand.
        let controller = Controller::new(
            engine,
            FsMetadataProvider,
            progress_tx.clone(),
            Duration::from_secs(3600),
        );
        let app = App::new(
            controller,
            progress_rx,
            log_rx,
            dir.path().to_path_buf(),
            None,
        );
        Harness {
            dir,
            app,
            log_tx,
            progress_tx,
            clocks,
        }
    }

    impl Harness {
        pub(crate) fn file(&self, name: &str) -> MediaRef {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            MediaRef::from_path(path).unwrap()
        }

        /// Clock of the most recently started session.
        pub(crate) fn clock(&self) -> PlaybackClock {
            self.clocks.borrow().last().unwrap().clone()
        }
    }

    #[test]
    fn picker_flow_selects_and_plays() {
        let mut h = harness();
        h.file("song.flac");
        h.file("notes.txt");

        assert!(!h.app.handle_key(KeyCode::Char('o')));
        let picker = h.app.picker.as_ref().unwrap();
        let names: Vec<&str> = picker.entries().iter().map(|e| e.name()).collect();
        assert!(names.contains(&"song.flac"));
        assert!(!names.contains(&"notes.txt"));

        h.app.handle_key(KeyCode::Enter);
        assert!(h.app.picker.is_none());
        assert_eq!(h.app.controller.state(), PlaybackState::Playing);
        assert_eq!(h.app.status, "Playing song.flac");
    }

    #[test]
    fn cancelling_the_picker_keeps_state() {
        let mut h = harness();
        h.file("song.flac");
        h.app.handle_key(KeyCode::Char('o'));
        h.app.handle_key(KeyCode::Esc);
        assert!(h.app.picker.is_none());
        assert_eq!(h.app.controller.state(), PlaybackState::Idle);
        assert_eq!(h.app.status, "Selection cancelled");
    }

    #[test]
    fn playback_keys_drive_the_controller() {
        let mut h = harness();
        let media = h.file("song.flac");
        h.app.select(media);

        h.app.handle_key(KeyCode::Char(' '));
        assert_eq!(h.app.controller.state(), PlaybackState::Paused);
        h.app.handle_key(KeyCode::Char('p'));
        assert_eq!(h.app.controller.state(), PlaybackState::Playing);
        h.app.handle_key(KeyCode::Char('s'));
        assert_eq!(h.app.controller.state(), PlaybackState::Stopped);
        assert_eq!(h.app.status, "Stopped");

        // Disabled: nothing changes.
        h.app.handle_key(KeyCode::Char(' '));
        assert_eq!(h.app.controller.state(), PlaybackState::Stopped);
        assert_eq!(h.app.status, "Stopped");
    }

    #[test]
    fn unplayable_selection_reports_notice() {
        let mut h = harness();
        let media = h.file("broken.flac");
        h.app.select(media);
        assert_eq!(h.app.controller.state(), PlaybackState::Idle);
        assert!(h.app.status.starts_with("Cannot play this file"));
    }

    #[test]
    fn progress_samples_update_the_controller() {
        let mut h = harness();
        let media = h.file("A long.flac");
        h.app.select(media);
        let generation = h.app.controller.poll_generation().unwrap();
        let clock = h.clock();
        clock.advance(2_500);

        let sample = poller::sample_clock(&clock, generation).unwrap();
        let stale = ProgressSample {
            generation: generation + 10,
            ..sample
        };
        h.progress_tx.send(stale).unwrap();
        h.progress_tx.send(sample).unwrap();
        h.app.drain_progress();
        assert!((h.app.controller.progress() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn logs_are_capped_and_modal_keys_are_scoped() {
        let mut h = harness();
        for i in 0..(LOG_CAP + 20) {
            h.log_tx.send(format!("line {i}")).unwrap();
        }
        h.app.drain_logs();
        assert_eq!(h.app.logs.len(), LOG_CAP);
        assert_eq!(h.app.logs.front().map(String::as_str), Some("line 20"));

        h.app.handle_key(KeyCode::Char('l'));
        assert!(h.app.logs_open);
        h.app.handle_key(KeyCode::Up);
        assert_eq!(h.app.logs_scroll, 1);
        // Playback keys are inert while the panel is open.
        h.app.handle_key(KeyCode::Char('o'));
        assert!(h.app.picker.is_none());
        h.app.handle_key(KeyCode::Esc);
        assert!(!h.app.logs_open);
        assert_eq!(h.app.logs_scroll, 0);
        assert!(h.app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn status_changes_are_mirrored_into_logs() {
        let mut h = harness();
        h.app.note_status_change();
        h.app.note_status_change();
        assert_eq!(h.app.logs.len(), 1);
        assert_eq!(
            h.app.logs.back().map(String::as_str),
            Some("status: Press o to select a file")
        );
    }
}
