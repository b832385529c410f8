use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use super::view_model::Button;

pub(crate) fn modal_block(title: &str) -> Block<'_> {
    Block::default().title(title).borders(Borders::ALL)
}

pub(crate) fn draw_modal_text<'a>(title: &'a str, body: &'a str) -> Paragraph<'a> {
    Paragraph::new(body).block(modal_block(title))
}

pub(crate) fn draw_list_panel<'a>(title: &'a str, items: Vec<ListItem<'a>>, highlight: bool) -> List<'a> {
    let mut list = List::new(items).block(modal_block(title));
    if highlight {
        list = list
            .highlight_style(Style::default().add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");
    }
    list
}

/// One line of action buttons; disabled ones are dimmed.
pub(crate) fn button_row(buttons: &[Button]) -> Line<'_> {
    let mut spans = Vec::with_capacity(buttons.len() * 2);
    for (i, button) in buttons.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        let style = if button.enabled {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(button.label.as_str(), style));
    }
    Line::from(spans)
}
