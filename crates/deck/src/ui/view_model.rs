//! UI view-models for the TUI.
//!
//! Turns `App` state into render-ready strings so `render.rs` stays layout-focused.

use audio_player::PlaybackEngine;

use crate::controller::PlaybackState;
use crate::picker::PickerEntry;
use crate::resolver::MetadataProvider;
use crate::ui::app::App;

pub(crate) struct UiView {
    pub(crate) header_lines: Vec<String>,
    pub(crate) now_playing_lines: Vec<String>,
    pub(crate) gauge: Option<(f64, String)>,
    pub(crate) buttons: Vec<Button>,
    pub(crate) status_line: String,
    pub(crate) keys_line: String,
    pub(crate) active_modal: Option<UiModal>,
}

pub(crate) struct Button {
    pub(crate) label: String,
    pub(crate) enabled: bool,
}

pub(crate) enum UiModal {
    Picker {
        title: String,
        items: Vec<String>,
        error: Option<String>,
        layout: ModalLayout,
    },
    Help { title: String, body: String, layout: ModalLayout },
    Logs { title: String, empty: bool, layout: ModalLayout },
}

pub(crate) struct ModalLayout {
    pub(crate) width_pct: u16,
    pub(crate) height_pct: u16,
}

impl UiView {
    pub(crate) fn from_app<E: PlaybackEngine, M: MetadataProvider>(app: &App<E, M>) -> Self {
        let output = app.device.as_deref().unwrap_or("default");
        let header_lines = vec![
            format!("dir: {}", app.browse_dir.display()),
            format!("output: {output}"),
        ];
        let status_line = match app.controller.notice() {
            Some(notice) if app.controller.state() == PlaybackState::Idle => {
                format!("status: {notice}")
            }
            _ => format!("status: {}", app.status),
        };

        Self {
            header_lines,
            now_playing_lines: build_now_playing_lines(app),
            gauge: build_gauge(app),
            buttons: build_buttons(app),
            status_line,
            keys_line: "keys: o select | p play | Space pause | s stop | l logs | h help | q quit"
                .to_string(),
            active_modal: build_active_modal(app),
        }
    }
}

fn build_now_playing_lines<E: PlaybackEngine, M: MetadataProvider>(app: &App<E, M>) -> Vec<String> {
    let c = &app.controller;
    let mut lines = vec![format!("file: {}", c.display_name().unwrap_or("-"))];
    let tags = c.tags();
    if let Some(title) = tags.title.as_deref() {
        lines.push(format!("title: {title}"));
    }
    if let Some(artist) = tags.artist.as_deref() {
        lines.push(format!("artist: {artist}"));
    }
    if let Some(album) = tags.album.as_deref() {
        lines.push(format!("album: {album}"));
    }
    lines.push(format!("state: {}", c.state().label()));
    lines
}

/// Gauge ratio plus an elapsed/total label; absent while there is no session.
fn build_gauge<E: PlaybackEngine, M: MetadataProvider>(app: &App<E, M>) -> Option<(f64, String)> {
    let c = &app.controller;
    if !c.has_session() {
        return None;
    }
    let elapsed = format_duration_ms(c.position_ms());
    let label = match c.duration_ms() {
        Some(total) if total > 0 => format!("{elapsed} / {}", format_duration_ms(total)),
        _ => format!("{elapsed} / -"),
    };
    Some((c.progress().clamp(0.0, 1.0), label))
}

fn build_buttons<E: PlaybackEngine, M: MetadataProvider>(app: &App<E, M>) -> Vec<Button> {
    let controls = app.controller.controls();
    vec![
        Button {
            label: "[o] Select".into(),
            enabled: app.picker.is_none(),
        },
        Button {
            label: "[p] Play".into(),
            enabled: controls.play,
        },
        Button {
            label: "[Space] Pause".into(),
            enabled: controls.pause,
        },
        Button {
            label: "[s] Stop".into(),
            enabled: controls.stop,
        },
    ]
}

fn build_picker_labels(entries: &[PickerEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match entry {
            PickerEntry::Dir { name, .. } => format!("{name}/"),
            PickerEntry::File { name, .. } => name.clone(),
        })
        .collect()
}

fn build_help_lines() -> Vec<String> {
    vec![
        "Playback".to_string(),
        "  o            select a file".to_string(),
        "  p            play / resume".to_string(),
        "  Space        pause".to_string(),
        "  s            stop (rewinds to start)".to_string(),
        "".to_string(),
        "File picker".to_string(),
        "  ↑/↓          move".to_string(),
        "  Enter / →    open dir or pick file".to_string(),
        "  ← / Bksp     parent dir".to_string(),
        "  Esc          cancel".to_string(),
        "".to_string(),
        "Other".to_string(),
        "  l            logs".to_string(),
        "  h or ?       help".to_string(),
        "  q            quit".to_string(),
        "  Esc          close modal".to_string(),
    ]
}

fn build_active_modal<E: PlaybackEngine, M: MetadataProvider>(app: &App<E, M>) -> Option<UiModal> {
    if let Some(picker) = app.picker.as_ref() {
        return Some(UiModal::Picker {
            title: format!("Select audio file: {} (Esc to cancel)", picker.dir().display()),
            items: build_picker_labels(picker.entries()),
            error: picker.error.clone(),
            layout: ModalLayout { width_pct: 70, height_pct: 70 },
        });
    }
    if app.logs_open {
        return Some(UiModal::Logs {
            title: "Logs (Esc to close, ↑/↓ scroll)".to_string(),
            empty: app.logs.is_empty(),
            layout: ModalLayout { width_pct: 90, height_pct: 80 },
        });
    }
    if app.help_open {
        return Some(UiModal::Help {
            title: "Help".to_string(),
            body: build_help_lines().join("\n"),
            layout: ModalLayout { width_pct: 60, height_pct: 70 },
        });
    }
    None
}

pub(crate) fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{mins}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::app::tests::harness;
    use crossterm::event::KeyCode;

    fn enabled(view: &UiView) -> Vec<bool> {
        view.buttons.iter().map(|b| b.enabled).collect()
    }

    #[test]
    fn idle_screen_has_no_gauge_and_only_select_enabled() {
        let h = harness();
        let view = UiView::from_app(&h.app);
        assert!(view.gauge.is_none());
        assert_eq!(enabled(&view), vec![true, false, false, false]);
        assert_eq!(view.now_playing_lines[0], "file: -");
        assert!(view.active_modal.is_none());
    }

    #[test]
    fn playing_screen_shows_name_and_progress() {
        let mut h = harness();
        let media = h.file("A long.flac");
        h.app.select(media);
        let view = UiView::from_app(&h.app);
        assert_eq!(view.now_playing_lines[0], "file: A long.flac");
        assert!(view.now_playing_lines.contains(&"state: playing".to_string()));
        assert_eq!(view.gauge, Some((0.0, "0:00 / 0:10".to_string())));
        assert_eq!(enabled(&view), vec![true, false, true, true]);

        h.app.handle_key(KeyCode::Char('s'));
        let view = UiView::from_app(&h.app);
        assert_eq!(enabled(&view), vec![true, true, false, true]);
    }

    #[test]
    fn unplayable_file_notice_reaches_status_line() {
        let mut h = harness();
        let media = h.file("broken.flac");
        h.app.select(media);
        let view = UiView::from_app(&h.app);
        assert_eq!(view.now_playing_lines[0], "file: broken.flac");
        assert_eq!(
            view.status_line,
            "status: Cannot play this file: no decodable track"
        );
        assert!(view.gauge.is_none());
    }

    #[test]
    fn picker_modal_lists_dirs_with_slash() {
        let mut h = harness();
        std::fs::create_dir(h.dir.path().join("Albums")).unwrap();
        h.file("b.mp3");
        h.app.handle_key(KeyCode::Char('o'));
        match UiView::from_app(&h.app).active_modal {
            Some(UiModal::Picker { items, error, .. }) => {
                assert_eq!(items, vec!["../", "Albums/", "b.mp3"]);
                assert!(error.is_none());
            }
            _ => panic!("picker modal expected"),
        }
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration_ms(0), "0:00");
        assert_eq!(format_duration_ms(61_999), "1:01");
        assert_eq!(format_duration_ms(600_000), "10:00");
    }
}
