use audio_player::PlaybackEngine;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Gauge, ListItem, Paragraph},
};

use crate::resolver::MetadataProvider;

use super::app::App;
use super::view_model::{ModalLayout, UiModal, UiView};
use super::widgets::{button_row, draw_list_panel, draw_modal_text, modal_block};

pub(crate) fn draw<E: PlaybackEngine, M: MetadataProvider>(f: &mut ratatui::Frame, app: &mut App<E, M>) {
    let view = UiView::from_app(&*app);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(7),
            Constraint::Length(5),
            Constraint::Length(4),
        ])
        .split(f.area());

    let header_lines: Vec<Line> = view.header_lines.iter().cloned().map(Line::from).collect();
    let header = Paragraph::new(header_lines)
        .block(Block::default().borders(Borders::ALL).title("deck"));
    f.render_widget(header, chunks[0]);

    let now_playing_lines: Vec<Line> = view
        .now_playing_lines
        .iter()
        .cloned()
        .map(Line::from)
        .collect();
    let now_playing = Paragraph::new(now_playing_lines)
        .block(Block::default().borders(Borders::ALL).title("Now Playing"));
    f.render_widget(now_playing, chunks[1]);

    draw_transport(f, &view, chunks[2]);

    let footer_block = Block::default().borders(Borders::ALL).title("Status");
    let footer_inner = footer_block.inner(chunks[3]);
    f.render_widget(footer_block, chunks[3]);
    let footer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(footer_inner);
    f.render_widget(
        Paragraph::new(Line::from(view.status_line.as_str())),
        footer_chunks[0],
    );
    f.render_widget(
        Paragraph::new(Line::from(view.keys_line.as_str())),
        footer_chunks[1],
    );

    if let Some(modal) = view.active_modal.as_ref() {
        draw_modal(f, app, modal);
    }
}

fn draw_transport(f: &mut ratatui::Frame, view: &UiView, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Playback");
    let inner = block.inner(area);
    f.render_widget(block, area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    match view.gauge.as_ref() {
        Some((ratio, label)) => {
            let gauge_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(10), Constraint::Length(16)])
                .split(rows[0]);
            let gauge = Gauge::default()
                .ratio(*ratio)
                .label("")
                .style(Style::default().fg(Color::Black).bg(Color::White))
                .gauge_style(Style::default().fg(Color::White).bg(Color::Black));
            f.render_widget(gauge, gauge_chunks[0]);
            f.render_widget(
                Paragraph::new(Line::from(label.as_str())).alignment(Alignment::Right),
                gauge_chunks[1],
            );
        }
        None => f.render_widget(Paragraph::new(Line::from("progress: -")), rows[0]),
    }
    f.render_widget(Paragraph::new(button_row(&view.buttons)), rows[2]);
}

fn draw_modal<E: PlaybackEngine, M: MetadataProvider>(
    f: &mut ratatui::Frame,
    app: &mut App<E, M>,
    modal: &UiModal,
) {
    match modal {
        UiModal::Picker {
            title,
            items,
            error,
            layout,
        } => {
            let area = centered_rect(layout, f.area());
            f.render_widget(Clear, area);
            let mut list_items: Vec<ListItem> = Vec::new();
            if let Some(err) = error.as_ref() {
                list_items.push(ListItem::new(format!("error: {err}")));
            }
            let offset = list_items.len();
            if items.is_empty() {
                list_items.push(ListItem::new("<no audio files>"));
            } else {
                list_items.extend(items.iter().cloned().map(ListItem::new));
            }
            let selected = app.picker.as_ref().and_then(|p| p.selected());
            app.picker_state.select(selected.map(|i| i + offset));
            let list = draw_list_panel(title, list_items, true);
            f.render_stateful_widget(list, area, &mut app.picker_state);
        }
        UiModal::Help { title, body, layout } => {
            let area = centered_rect(layout, f.area());
            f.render_widget(Clear, area);
            f.render_widget(draw_modal_text(title, body), area);
        }
        UiModal::Logs { title, empty, layout } => {
            let area = centered_rect(layout, f.area());
            f.render_widget(Clear, area);
            let block = modal_block(title);
            let height = block.inner(area).height as usize;
            let total = app.logs.len();
            let end = total.saturating_sub(app.logs_scroll);
            let start = end.saturating_sub(height);
            let mut items: Vec<ListItem> = app
                .logs
                .iter()
                .skip(start)
                .take(end.saturating_sub(start))
                .map(|line| ListItem::new(line.clone()))
                .collect();
            if *empty || items.is_empty() {
                items = vec![ListItem::new("<no logs>")];
            }
            f.render_widget(draw_list_panel(title, items, false), area);
        }
    }
}

fn centered_rect(layout: &ModalLayout, r: Rect) -> Rect {
    let (percent_x, percent_y) = (layout.width_pct, layout.height_pct);
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::app::tests::harness;
    use crossterm::event::KeyCode;
    use ratatui::{Terminal, backend::TestBackend};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn draws_main_screen_and_picker() {
        let mut h = harness();
        let media = h.file("song.flac");
        h.app.select(media);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        terminal.draw(|f| draw(f, &mut h.app)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("file: song.flac"));
        assert!(text.contains("[Space] Pause"));
        assert!(text.contains("0:00 / 0:04"));

        h.app.handle_key(KeyCode::Char('o'));
        terminal.draw(|f| draw(f, &mut h.app)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Select audio file"));
        assert!(text.contains("song.flac"));
    }
}
