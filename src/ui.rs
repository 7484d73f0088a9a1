use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use crate::models::EntryList;
use crate::scenes::{Feedback, Scene, Session};

/// Rows visible at once in the List scene, matching the device screen.
pub const LIST_ROWS: usize = 4;

pub struct ViewState<'a> {
    pub session: &'a Session,
    pub list: &'a EntryList,
    pub status: String,
    pub feedback: Option<Feedback>,
}

pub fn scene_title(scene: Scene) -> &'static str {
    match scene {
        Scene::Main => "Passdeck",
        Scene::List => "Passwords",
        Scene::View => "Password",
        Scene::Edit => "New entry",
        Scene::Help => "Help",
    }
}

/// The text content of the current scene, top to bottom.
///
/// This is the whole renderer as far as the state machine is concerned;
/// `draw` only puts these lines on screen.
pub fn screen_lines(session: &Session, list: &EntryList) -> Vec<String> {
    match session.scene {
        Scene::Main => vec![
            format!("Stored passwords: {}", list.len()),
            String::new(),
            "Ok: open the list".to_string(),
            "Right: help".to_string(),
            "Back: quit".to_string(),
        ],
        Scene::List => {
            if list.is_empty() {
                return vec![
                    "No passwords yet".to_string(),
                    String::new(),
                    "Long Ok: add a new entry".to_string(),
                ];
            }
            let start = list_window_start(session.selected);
            let mut lines: Vec<String> = list
                .iter()
                .enumerate()
                .skip(start)
                .take(LIST_ROWS)
                .map(|(i, entry)| {
                    let marker = if i == session.selected { '>' } else { ' ' };
                    format!("{marker} {}", entry.name)
                })
                .collect();
            lines.push(String::new());
            lines.push("Ok: view   Long Ok: add".to_string());
            lines
        }
        Scene::View => match list.get(session.selected) {
            Some(entry) => vec![
                format!("Name: {}", entry.name),
                format!("Password: {}", entry.password),
                String::new(),
                "Ok: type over USB".to_string(),
                "Long Ok: delete".to_string(),
            ],
            None => vec!["Error: invalid selection".to_string()],
        },
        Scene::Edit => {
            let name_marker = if session.editing_password { ' ' } else { '>' };
            let password_marker = if session.editing_password { '>' } else { ' ' };
            vec![
                format!("{name_marker} Name: {}", session.name_buffer),
                format!("{password_marker} Password: {}", session.password_buffer),
                String::new(),
                "Long Ok: switch field".to_string(),
                "Long Back: save".to_string(),
                "Back: cancel".to_string(),
            ]
        }
        Scene::Help => vec![
            "Pocket deck that types stored".to_string(),
            "passwords over a USB keyboard".to_string(),
            "link.".to_string(),
            String::new(),
            "Enter: Ok    Tab: long Ok".to_string(),
            "Esc: Back    Ctrl-S: long Back".to_string(),
        ],
    }
}

/// First visible row of the list window; the cursor stays on the third
/// row once the selection moves past it.
fn list_window_start(selected: usize) -> usize {
    selected.saturating_sub(2)
}

pub fn draw(f: &mut Frame<'_>, state: &ViewState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.size());

    let lines = screen_lines(state.session, state.list);
    let area = device_panel_area(layout[0], &lines);
    let body = Paragraph::new(
        lines
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect::<Vec<Line>>(),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(scene_title(state.session.scene)),
    );
    f.render_widget(body, area);

    let footer_style = match state.feedback {
        Some(feedback) => Style::default()
            .fg(feedback_color(feedback))
            .add_modifier(Modifier::BOLD),
        None => Style::default(),
    };
    let footer = Paragraph::new(Line::from(Span::styled(state.status.clone(), footer_style)))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[1]);
}

/// Colors stand in for the device's notification blink patterns.
fn feedback_color(feedback: Feedback) -> Color {
    match feedback {
        Feedback::Sent | Feedback::Added => Color::Green,
        Feedback::Removed | Feedback::Rejected => Color::Red,
    }
}

/// Centered panel standing in for the small device screen.
fn device_panel_area(area: Rect, lines: &[String]) -> Rect {
    let width = (lines.iter().map(|s| s.chars().count()).max().unwrap_or(0) as u16 + 4).max(34);
    let height = lines.len() as u16 + 2;
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}
