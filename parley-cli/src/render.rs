//! Terminal rendering of the view projection

use chrono::Local;
use console::style;
use parley_core::session::{Role, SessionId};
use parley_core::view::{TranscriptEntry, ViewProjection};

/// Shown in place of an empty transcript
pub const GREETING: &str = "How can I help you today?";

/// Label printed above assistant turns
pub const ASSISTANT_LABEL: &str = "Parley";

/// Numbered session list, active entry marked
pub fn sidebar(view: &ViewProjection) -> String {
    let mut out = String::new();
    for (idx, entry) in view.sidebar.iter().enumerate() {
        let marker = if entry.is_active { "*" } else { " " };
        let title = if entry.is_active {
            style(&entry.title).bold().to_string()
        } else {
            entry.title.clone()
        };
        out.push_str(&format!(
            "{} {:>2}. {}  {}\n",
            marker,
            idx + 1,
            title,
            style(entry.id.as_str()).dim()
        ));
    }
    out
}

/// The active transcript, or the greeting if it is empty
pub fn transcript(view: &ViewProjection) -> String {
    if view.transcript.is_empty() {
        return format!("{}\n", style(GREETING).cyan());
    }
    view.transcript.iter().map(entry).collect()
}

/// A single transcript entry
pub fn entry(entry: &TranscriptEntry) -> String {
    let time = entry.timestamp.with_timezone(&Local).format("%H:%M");
    match entry.role {
        Role::User => format!(
            "{} {}\n{}\n",
            style("You").bold().green(),
            style(time).dim(),
            entry.content
        ),
        Role::Assistant => format!(
            "{} {}\n{}\n",
            style(ASSISTANT_LABEL).bold().cyan(),
            style(time).dim(),
            entry.content
        ),
    }
}

/// Resolve a 1-based sidebar position or a session id
pub fn resolve_target(view: &ViewProjection, target: &str) -> Option<SessionId> {
    let target = target.trim();
    if let Ok(position) = target.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|idx| view.sidebar.get(idx))
            .map(|entry| entry.id.clone());
    }
    view.sidebar
        .iter()
        .find(|entry| entry.id.as_str() == target)
        .map(|entry| entry.id.clone())
}

/// Sidebar title of `id`, or the id itself if it is not listed
pub fn title_of(view: &ViewProjection, id: &SessionId) -> String {
    view.sidebar
        .iter()
        .find(|entry| &entry.id == id)
        .map(|entry| entry.title.clone())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::view::SidebarEntry;

    fn view() -> ViewProjection {
        ViewProjection {
            sidebar: vec![
                SidebarEntry {
                    id: SessionId::from("chat-2"),
                    title: "Newer".to_string(),
                    is_active: true,
                },
                SidebarEntry {
                    id: SessionId::from("chat-1"),
                    title: "Older".to_string(),
                    is_active: false,
                },
            ],
            transcript: Vec::new(),
            pending: false,
        }
    }

    #[test]
    fn test_resolve_by_position_and_id() {
        let view = view();
        assert_eq!(resolve_target(&view, "1"), Some(SessionId::from("chat-2")));
        assert_eq!(resolve_target(&view, "chat-1"), Some(SessionId::from("chat-1")));
        assert_eq!(resolve_target(&view, "0"), None);
        assert_eq!(resolve_target(&view, "3"), None);
        assert_eq!(resolve_target(&view, "chat-9"), None);
    }

    #[test]
    fn test_title_of() {
        let view = view();
        assert_eq!(title_of(&view, &SessionId::from("chat-1")), "Older");
        assert_eq!(title_of(&view, &SessionId::from("chat-9")), "chat-9");
    }

    #[test]
    fn test_sidebar_lists_in_order() {
        let text = console::strip_ansi_codes(&sidebar(&view())).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("*  1. Newer"));
        assert!(lines[1].starts_with("   2. Older"));
    }

    #[test]
    fn test_empty_transcript_shows_greeting() {
        let text = console::strip_ansi_codes(&transcript(&view())).to_string();
        assert_eq!(text.trim(), GREETING);
    }

    #[test]
    fn test_transcript_labels_roles() {
        let mut view = view();
        view.transcript = vec![
            TranscriptEntry {
                role: Role::User,
                content: "Hi".to_string(),
                timestamp: Utc::now(),
            },
            TranscriptEntry {
                role: Role::Assistant,
                content: "Hello!".to_string(),
                timestamp: Utc::now(),
            },
        ];

        let text = console::strip_ansi_codes(&transcript(&view)).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("You "));
        assert_eq!(lines[1], "Hi");
        assert!(lines[2].starts_with("Parley "));
        assert_eq!(lines[3], "Hello!");
    }
}
