//! Ratatui screen.
//!
//! Keys:
//! - o: select a file (opens the picker)
//! - p: play / resume
//! - Space: pause
//! - s: stop
//! - l: logs
//! - h or ?: help
//! - q: quit
//!
//! Inside the picker: Up/Down move, Enter opens a dir or picks a file, Left/Backspace goes
//! to the parent, Esc cancels.

mod app;
mod render;
mod view_model;
mod widgets;

pub(crate) use app::run_tui;
