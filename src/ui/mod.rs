use chrono::{DateTime, Datelike, Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, Screen};
use crate::store::MessageKind;

pub fn draw(f: &mut Frame<'_>, app: &App) {
    match app.screen {
        Screen::Login => draw_login(f, app),
        Screen::Register => draw_register(f, app),
        Screen::Forgot => draw_forgot(f, app),
        Screen::Chat => draw_chat(f, app),
    }
}

// --- Auth screens ---

fn draw_login(f: &mut Frame<'_>, app: &App) {
    let area = centered_rect(60, 16, f.size());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Chatterm - Sign In ")
        .style(Style::default().fg(Color::Green));

    let form = &app.login_form;
    let mut lines = vec![
        Line::from(""),
        field_line("Email", &form.email, form.focus == 0, false),
        field_line("Password", &form.password, form.focus == 1, true),
        Line::from(""),
    ];
    lines.extend(error_lines(app));
    lines.push(Line::from(Span::styled(
        "Enter=sign in  Tab=next field  Ctrl+R=register  Ctrl+F=forgot  Esc=quit",
        Style::default().fg(Color::Gray),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Demo credentials: demo@example.com / demo123",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_register(f: &mut Frame<'_>, app: &App) {
    let area = centered_rect(60, 16, f.size());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Chatterm - Create Account ")
        .style(Style::default().fg(Color::Green));

    let form = &app.register_form;
    let mut lines = vec![
        Line::from(""),
        field_line("Full Name", &form.name, form.focus == 0, false),
        field_line("Email", &form.email, form.focus == 1, false),
        field_line("Password", &form.password, form.focus == 2, true),
        field_line("Confirm", &form.confirm, form.focus == 3, true),
        Line::from(""),
    ];
    lines.extend(error_lines(app));
    lines.push(Line::from(Span::styled(
        "Enter=create account  Tab=next field  Ctrl+L/Esc=back to login",
        Style::default().fg(Color::Gray),
    )));

    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_forgot(f: &mut Frame<'_>, app: &App) {
    let area = centered_rect(60, 12, f.size());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Chatterm - Forgot Password ")
        .style(Style::default().fg(Color::Green));

    let form = &app.forgot_form;
    let mut lines = Vec::new();
    if form.sent {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Check your email",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(format!(
            "We've sent a password reset link to {}",
            form.email
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press any key to go back to login",
            Style::default().fg(Color::Gray),
        )));
    } else {
        lines.push(Line::from(""));
        lines.push(Line::from(
            "Enter your email address and we'll send you a reset link.",
        ));
        lines.push(Line::from(""));
        lines.push(field_line("Email", &form.email, true, false));
        lines.push(Line::from(""));
        lines.extend(error_lines(app));
        lines.push(Line::from(Span::styled(
            "Enter=send reset link  Esc=back to login",
            Style::default().fg(Color::Gray),
        )));
    }

    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool, mask: bool) -> Line<'a> {
    let shown = if mask { "*".repeat(value.len()) } else { value.to_string() };
    let marker = if focused { "> " } else { "  " };
    let value_style = if focused {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Line::from(vec![
        Span::styled(marker, Style::default().fg(Color::Green)),
        Span::styled(format!("{:>10}: ", label), Style::default().fg(Color::Cyan)),
        Span::styled(shown, value_style),
        Span::styled(if focused { "_" } else { "" }, value_style),
    ])
}

fn error_lines(app: &App) -> Vec<Line<'_>> {
    match &app.form_error {
        Some(err) => vec![
            Line::from(Span::styled(err.as_str(), Style::default().fg(Color::Red))),
            Line::from(""),
        ],
        None => Vec::new(),
    }
}

// --- Chat screen ---

fn draw_chat(f: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status line
            Constraint::Length(3), // Input area
        ])
        .split(f.size());

    draw_title_bar(f, app, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30), // Contact sidebar
            Constraint::Percentage(70), // Conversation
        ])
        .split(chunks[1]);

    draw_sidebar(f, app, main_chunks[0]);
    draw_conversation(f, app, main_chunks[1]);
    draw_status_line(f, app, chunks[2]);
    draw_input_area(f, app, chunks[3]);
}

fn draw_title_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let me = app
        .current_user
        .as_ref()
        .map(|u| u.name.as_str())
        .unwrap_or("not signed in");
    let contact = match app.selected_contact_user() {
        Some(c) => format!("{} ({})", c.name, presence_label(c.is_online, c.last_seen)),
        None => "no contact selected".to_string(),
    };

    let title = format!(" Chatterm v0.1.0 | {} | {} ", me, contact);
    let title_block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green))
        .title(" Chatterm ");

    f.render_widget(
        Paragraph::new(title).block(title_block).alignment(Alignment::Center),
        area,
    );
}

fn draw_sidebar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let title = if app.search_query.is_empty() {
        " Contacts ".to_string()
    } else {
        format!(" Contacts (filter: {}) ", app.search_query)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Blue));

    let me = app.current_user.as_ref().map(|u| u.id.clone()).unwrap_or_default();
    let contacts = app.visible_contacts();

    if contacts.is_empty() {
        let hint = if app.search_query.is_empty() {
            "No contacts available"
        } else {
            "No contacts found"
        };
        let paragraph = Paragraph::new(Span::styled(
            hint,
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        ))
        .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = contacts
        .iter()
        .enumerate()
        .map(|(i, contact)| {
            let selected = i == app.selected_contact;
            let indicator = if contact.is_online { "●" } else { "○" };
            let indicator_color = if contact.is_online { Color::Green } else { Color::DarkGray };
            let name_style = if selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let unread = app.unread_for(&contact.id);
            let mut header = vec![
                Span::styled(format!("{} ", indicator), Style::default().fg(indicator_color)),
                Span::styled(contact.name.as_str(), name_style),
            ];
            if unread > 0 {
                header.push(Span::styled(
                    format!(" ({})", unread),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ));
            }

            let preview = match app.store.last_message_with(&me, &contact.id) {
                Some(last) => Line::from(vec![
                    Span::styled(
                        format!("  {} ", format_relative(Some(last.timestamp), Utc::now())),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(truncated(&last.content, 32), Style::default().fg(Color::Gray)),
                ]),
                None => Line::from(Span::styled(
                    "  No messages yet",
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )),
            };

            ListItem::new(Text::from(vec![Line::from(header), preview]))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn draw_conversation(f: &mut Frame<'_>, app: &App, area: Rect) {
    let title = match app.selected_contact_user() {
        Some(c) => format!(" {} ", c.name),
        None => " Conversation ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let me = app.current_user.as_ref().map(|u| u.id.clone()).unwrap_or_default();
    let my_name = app.current_user.as_ref().map(|u| u.name.as_str()).unwrap_or("me");
    let contact_name = app
        .selected_contact_user()
        .map(|c| c.name.as_str())
        .unwrap_or("contact");

    let mut lines = Vec::new();
    let mut previous_day: Option<String> = None;

    for message in app.visible_messages(inner.height as usize) {
        let local = message.timestamp.with_timezone(&Local);
        let day = format_day(local.date_naive(), Local::now().date_naive());
        if previous_day.as_deref() != Some(day.as_str()) {
            lines.push(Line::from(Span::styled(
                format!("--- {} ---", day),
                Style::default().fg(Color::DarkGray),
            )));
            previous_day = Some(day);
        }

        let is_own = message.sender_id == me;
        let (name, name_color) = if is_own {
            (my_name, Color::Green)
        } else {
            (contact_name, Color::Magenta)
        };

        let mut spans = vec![
            Span::styled(
                format!("[{}] ", local.format("%I:%M %p")),
                Style::default().fg(Color::Gray),
            ),
            Span::styled(format!("<{}> ", name), Style::default().fg(name_color)),
        ];
        if let Some(tag) = kind_tag(message.kind) {
            spans.push(Span::styled(tag, Style::default().fg(Color::Yellow)));
        }
        spans.push(Span::raw(message.content.as_str()));
        lines.push(Line::from(spans));
    }

    if lines.is_empty() {
        let hint = if app.selected_contact_user().is_some() {
            "No messages yet. Press 'i' and type a message to start the conversation."
        } else {
            "Select a contact to start messaging."
        };
        lines.push(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_status_line(f: &mut Frame<'_>, app: &App, area: Rect) {
    let status = app.status_messages.last().map(String::as_str).unwrap_or("");
    f.render_widget(
        Paragraph::new(Span::styled(status, Style::default().fg(Color::DarkGray))),
        area,
    );
}

fn draw_input_area(f: &mut Frame<'_>, app: &App, area: Rect) {
    let input_style = match app.input_mode {
        InputMode::Normal => Style::default().fg(Color::White),
        InputMode::Editing => Style::default().fg(Color::Green),
    };

    let mode_indicator = match app.input_mode {
        InputMode::Normal => "[NORMAL] Press 'i' to enter input mode",
        InputMode::Editing => "[INPUT] ESC=normal, ENTER=send, /help for commands",
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(mode_indicator)
        .style(input_style);

    let input_text = if app.input_mode == InputMode::Editing {
        app.input.as_str()
    } else {
        ""
    };

    f.render_widget(
        Paragraph::new(input_text).block(input_block).wrap(Wrap { trim: false }),
        area,
    );

    if app.input_mode == InputMode::Editing {
        f.set_cursor(area.x + app.cursor_position as u16 + 1, area.y + 1);
    }
}

// --- Formatting helpers ---

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}

fn presence_label(is_online: bool, last_seen: Option<DateTime<Utc>>) -> String {
    if is_online {
        "Online".to_string()
    } else {
        format!("Last seen {}", format_relative(last_seen, Utc::now()))
    }
}

fn kind_tag(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::Text => None,
        MessageKind::Image => Some("[image] "),
        MessageKind::File => Some("[file] "),
        MessageKind::Audio => Some("[audio] "),
        MessageKind::Video => Some("[video] "),
    }
}

fn truncated(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Compact relative age: "now", minutes, hours, then days. A missing
/// timestamp (stale records from older layouts) shows as "unknown".
fn format_relative(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return "unknown".to_string();
    };

    let elapsed = now - timestamp;
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "now".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }
    format!("{}d", elapsed.num_days())
}

/// "Today", "Yesterday", or a short date (with year when it differs).
fn format_day(day: chrono::NaiveDate, today: chrono::NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if day == today.pred_opt().unwrap_or(today) {
        "Yesterday".to_string()
    } else if day.year() == today.year() {
        day.format("%b %-d").to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    #[test]
    fn relative_format_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        assert_eq!(format_relative(Some(now), now), "now");
        assert_eq!(format_relative(Some(now - Duration::minutes(5)), now), "5m");
        assert_eq!(format_relative(Some(now - Duration::hours(3)), now), "3h");
        assert_eq!(format_relative(Some(now - Duration::days(2)), now), "2d");
        assert_eq!(format_relative(None, now), "unknown");
        // Future timestamps read as "now" rather than going negative.
        assert_eq!(format_relative(Some(now + Duration::minutes(10)), now), "now");
    }

    #[test]
    fn day_format_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert_eq!(format_day(today, today), "Today");
        assert_eq!(
            format_day(NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(), today),
            "Yesterday"
        );
        assert_eq!(
            format_day(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), today),
            "Mar 2"
        );
        assert_eq!(
            format_day(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), today),
            "Dec 31, 2023"
        );
    }

    #[test]
    fn truncation_keeps_short_previews() {
        assert_eq!(truncated("hello", 32), "hello");
        let long = "a".repeat(40);
        let cut = truncated(&long, 32);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 35);
    }
}
