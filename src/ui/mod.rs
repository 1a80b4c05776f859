use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::app::screen::EditorScreen;
use crate::app::state::{Overlay, UiState};
use crate::app::NoticeLevel;
use crate::cache::{now_millis, CacheSlot};
use crate::editor::{describe_mood, EditorState, Focus, Mood, TextBuffer};
use crate::journaling::RecoveryPrompt;
use crate::storage::KeyValueStore;

pub fn draw_app<S: KeyValueStore>(frame: &mut Frame, screen: &EditorScreen<S>, ui: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let editor = screen.editor();
    let editable = !screen.is_recovering()
        && !screen.is_restoring()
        && !screen.is_confirming_exit()
        && ui.overlay().is_none();

    frame.render_widget(header(screen.slot(), editor, ui), rows[0]);
    draw_title(frame, editor, rows[1], editable);
    draw_body(frame, editor, rows[2], editable);
    frame.render_widget(Paragraph::new(status_line(screen, ui)), rows[3]);

    if let Some(prompt) = screen.recovery_prompt(now_millis()) {
        draw_recovery_modal(frame, &prompt, screen.is_busy());
    } else if screen.is_confirming_exit() {
        draw_exit_modal(frame, screen.is_busy());
    } else if let Some(overlay) = ui.overlay() {
        draw_overlay(frame, overlay, editor, ui);
    }
    draw_toasts(frame, ui);
}

fn header(slot: CacheSlot, editor: &EditorState, ui: &UiState) -> Paragraph<'static> {
    let label = match slot {
        CacheSlot::New => "New entry".to_string(),
        CacheSlot::Editing(id) => format!("Editing diary #{id}"),
    };
    let notebook = match editor.notebook_id() {
        Some(id) => ui
            .notebook_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Notebook #{id}")),
        None => "No notebook".to_string(),
    };
    let notebook_style = if editor.notebook_id().is_some() {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC)
    };

    let mut spans = vec![
        Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(notebook, notebook_style),
    ];
    if let Some(mood) = editor.mood().and_then(describe_mood) {
        spans.push(Span::raw("  "));
        spans.push(Span::raw(mood));
    }
    if let Some(place) = editor
        .location()
        .and_then(|loc| loc.get("name"))
        .and_then(|name| name.as_str())
    {
        spans.push(Span::raw("  📍 "));
        spans.push(Span::raw(place.to_string()));
    }
    for tag in editor.tags() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("#{tag}"),
            Style::default().fg(Color::Magenta),
        ));
    }
    Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Journey"))
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn draw_title(frame: &mut Frame, editor: &EditorState, area: Rect, editable: bool) {
    let focused = editor.focus() == Focus::Title;
    let text = editor.title().text();
    let content = if text.is_empty() && !focused {
        Line::from(Span::styled("Untitled", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(
            text.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ))
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Title")
        .border_style(focus_style(focused));
    frame.render_widget(Paragraph::new(content).block(block), area);
    if focused && editable {
        place_cursor(frame, editor.title(), area, 0);
    }
}

fn draw_body(frame: &mut Frame, editor: &EditorState, area: Rect, editable: bool) {
    let focused = editor.focus() == Focus::Body;
    let body = editor.body();
    let inner_height = area.height.saturating_sub(2);
    let (line, _) = body.cursor_position();
    let scroll = (line as u16).saturating_sub(inner_height.saturating_sub(1));
    let title = if editor.body_is_read_only() {
        "Entry (read-only)"
    } else {
        "Entry"
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(focus_style(focused));
    let paragraph = Paragraph::new(Text::raw(body.text().to_string()))
        .block(block)
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
    if focused && editable {
        place_cursor(frame, body, area, scroll);
    }
}

fn place_cursor(frame: &mut Frame, buffer: &TextBuffer, area: Rect, scroll: u16) {
    let inner_width = area.width.saturating_sub(2);
    if inner_width == 0 || area.height < 3 {
        return;
    }
    let (line, column) = buffer.cursor_position();
    let row = (line as u16).saturating_sub(scroll);
    let col = (column as u16).min(inner_width - 1);
    frame.set_cursor(area.x + 1 + col, area.y + 1 + row);
}

fn status_line<S: KeyValueStore>(screen: &EditorScreen<S>, ui: &UiState) -> Line<'static> {
    let mut spans = Vec::new();
    if let Some(label) = ui.in_flight {
        spans.push(Span::styled(
            label,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" | "));
    }
    let driver = screen.driver();
    let autosave = if driver.is_restoring() {
        Span::styled("Restoring…", Style::default().fg(Color::Cyan))
    } else if !driver.is_enabled() {
        Span::styled("Autosave off", Style::default().fg(Color::DarkGray))
    } else if let Some(label) = screen.last_cached_label() {
        Span::styled(format!("Cached {label}"), Style::default().fg(Color::Green))
    } else {
        Span::styled("Nothing cached", Style::default().fg(Color::DarkGray))
    };
    spans.push(autosave);
    if screen.has_unsaved_changes() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("Unsaved", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(
        "  Ctrl-s save • Esc leave • Ctrl-n notebook • Ctrl-e mood • Ctrl-t tag • F1 help",
        Style::default().fg(Color::DarkGray),
    ));
    Line::from(spans)
}

fn draw_recovery_modal(frame: &mut Frame, prompt: &RecoveryPrompt, saving: bool) {
    let area = centered_rect(60, 50, frame.size());
    frame.render_widget(Clear, area);

    let mut title_spans = Vec::new();
    if let Some(emoji) = &prompt.mood_emoji {
        title_spans.push(Span::raw(format!("{emoji} ")));
    }
    title_spans.push(Span::styled(
        prompt.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ));

    let mut tag_spans: Vec<Span> = prompt
        .tags
        .iter()
        .map(|tag| Span::styled(format!("#{tag} "), Style::default().fg(Color::Magenta)))
        .collect();
    if prompt.extra_tags > 0 {
        tag_spans.push(Span::styled(
            format!("+{} more", prompt.extra_tags),
            Style::default().fg(Color::Gray),
        ));
    }

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Cached {}", prompt.relative_time),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(""),
        Line::from(title_spans),
        Line::from(Span::styled(
            prompt.subtitle.clone(),
            Style::default().fg(Color::Gray),
        )),
    ];
    if !tag_spans.is_empty() {
        lines.push(Line::from(tag_spans));
    }
    lines.push(Line::from(""));
    if saving {
        lines.push(Line::from(Span::styled(
            "Saving draft…",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        lines.push(Line::from(
            "Enter continue editing • s save as draft • d discard • Esc decide later",
        ));
    }

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(prompt.heading)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );
    frame.render_widget(paragraph, area);
}

fn draw_exit_modal(frame: &mut Frame, saving: bool) {
    let area = centered_rect(50, 30, frame.size());
    frame.render_widget(Clear, area);
    let action_line = if saving {
        Line::from(Span::styled(
            "Saving draft…",
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from("s Save as Draft • d Discard & Exit • Esc Continue Editing")
    };
    let paragraph = Paragraph::new(vec![
        Line::from("You have unsaved changes. What would you like to do?"),
        Line::from(""),
        action_line,
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title("Unsaved Changes")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(paragraph, area);
}

fn draw_overlay(frame: &mut Frame, overlay: &Overlay, editor: &EditorState, ui: &UiState) {
    match overlay {
        Overlay::NotebookPicker { selected } => {
            let items: Vec<ListItem> = ui
                .notebooks()
                .iter()
                .map(|notebook| {
                    let mut spans = vec![Span::raw(notebook.name.clone())];
                    if let Some(description) = notebook.description.as_deref().filter(|d| !d.is_empty()) {
                        spans.push(Span::styled(
                            format!("  {description}"),
                            Style::default().fg(Color::Gray),
                        ));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect();
            draw_picker(frame, "Notebook", items, *selected, "Enter select • Esc cancel");
        }
        Overlay::MoodPicker { selected } => {
            let items: Vec<ListItem> = Mood::all()
                .into_iter()
                .map(|mood| ListItem::new(format!("{} {}", mood.emoji(), mood.label())))
                .collect();
            draw_picker(frame, "Mood", items, *selected, "Enter select • x clear • Esc cancel");
        }
        Overlay::TagInput { input } => {
            let area = centered_rect(50, 20, frame.size());
            frame.render_widget(Clear, area);
            let tags = editor
                .tags()
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");
            let mut display = input.clone();
            display.push('▌');
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(tags, Style::default().fg(Color::Magenta))),
                Line::from(display),
                Line::from(Span::styled(
                    "Enter add • Backspace on empty removes last • Esc cancel",
                    Style::default().fg(Color::Gray),
                )),
            ])
            .block(
                Block::default()
                    .title("Add tag")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
        Overlay::Help => {
            let area = centered_rect(60, 60, frame.size());
            frame.render_widget(Clear, area);
            let lines: Vec<Line> = HELP_LINES.iter().map(|line| Line::from(*line)).collect();
            let paragraph = Paragraph::new(lines).block(
                Block::default()
                    .title("Keys")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(paragraph, area);
        }
    }
}

const HELP_LINES: &[&str] = &[
    "Tab          switch between title and entry",
    "Ctrl-s       save entry to the server",
    "Esc          leave (asks when there are unsaved changes)",
    "Ctrl-q       quit now, keeping changes cached for recovery",
    "Ctrl-n       choose notebook",
    "Ctrl-e       choose mood",
    "Ctrl-t       add tag",
    "Ctrl-z / y   undo / redo",
    "Ctrl-←/→     move by word",
];

fn draw_picker(frame: &mut Frame, title: &str, items: Vec<ListItem>, selected: usize, hint: &str) {
    let area = centered_rect(40, 60, frame.size());
    frame.render_widget(Clear, area);
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let list = List::new(items)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("➤ ");
    let mut state = ListState::default();
    state.select(Some(selected));
    frame.render_stateful_widget(list, sections[0], &mut state);
    frame.render_widget(
        Paragraph::new(Span::styled(hint.to_string(), Style::default().fg(Color::Gray))),
        sections[1],
    );
}

fn draw_toasts(frame: &mut Frame, ui: &UiState) {
    let area = frame.size();
    for (idx, toast) in ui.toasts.iter().enumerate() {
        let width = (toast.message.width() as u16 + 4).min(area.width);
        let y = area.y + 1 + (idx as u16) * 3;
        if y + 3 > area.height {
            break;
        }
        let rect = Rect::new(area.x + area.width - width, y, width, 3);
        let color = match toast.level {
            NoticeLevel::Info => Color::Green,
            NoticeLevel::Error => Color::Red,
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(toast.message.clone())
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color))),
            rect,
        );
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
