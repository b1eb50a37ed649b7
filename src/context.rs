//! Context formatting: recent-window rendering and hybrid assembly.
//!
//! The hybrid context combines recency, semantic relevance, participant
//! activity and long-term facts into one prompt-ready string. Sections keep
//! a fixed order and are dropped entirely (header included) when empty; no
//! deduplication happens across sections, overlap between recency and
//! relevance is tolerated.

use crate::indexer::SearchHit;
use crate::window::MessageWindow;

/// Renders the most recent `limit` window entries as `"[author]: content"`
/// lines, oldest first, with bot-authored messages excluded.
pub fn format_recent_window(window: &MessageWindow, limit: usize) -> String {
    let messages: Vec<_> = window.iter().collect();
    let start = messages.len().saturating_sub(limit);
    messages[start..]
        .iter()
        .filter(|m| !m.is_bot)
        .map(|m| format!("[{}]: {}", m.author_name, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw material for one hybrid context string.
#[derive(Default)]
pub struct ContextSections {
    pub recent: String,
    pub relevant: Vec<SearchHit>,
    pub participants: String,
    pub facts: Vec<String>,
}

/// Joins the populated sections with blank lines, in fixed order:
/// recent conversation, relevant history, participants, channel facts.
pub fn assemble(sections: ContextSections) -> String {
    let mut parts = Vec::new();

    if !sections.recent.is_empty() {
        parts.push(format!("Recent channel conversation:\n{}", sections.recent));
    }

    if !sections.relevant.is_empty() {
        let lines: Vec<String> = sections
            .relevant
            .iter()
            .map(|hit| format!("[{}]: {}", hit.author_name, hit.content))
            .collect();
        parts.push(format!("Relevant past discussion:\n{}", lines.join("\n")));
    }

    if !sections.participants.is_empty() {
        parts.push(sections.participants);
    }

    if !sections.facts.is_empty() {
        parts.push(format!("About this channel:\n{}", sections.facts.join("\n")));
    }

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChannelMessage;
    use chrono::Utc;

    fn mock_message(id: u64, author: &str, content: &str, is_bot: bool) -> ChannelMessage {
        ChannelMessage {
            id,
            channel_id: 100,
            guild_id: 1,
            author_id: id,
            author_name: author.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            is_bot,
            reply_to_id: None,
        }
    }

    fn mock_hit(author: &str, content: &str, score: f32) -> SearchHit {
        SearchHit {
            author_name: author.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            score,
        }
    }

    #[test]
    fn test_format_recent_excludes_bots() {
        let mut window = MessageWindow::new(20);
        window.push(mock_message(1, "User1", "Hello", false));
        window.push(mock_message(2, "Bot", "Reply", true));

        assert_eq!(format_recent_window(&window, 5), "[User1]: Hello");
    }

    #[test]
    fn test_format_recent_takes_last_limit() {
        let mut window = MessageWindow::new(20);
        for i in 1..=10 {
            window.push(mock_message(i, "User", &format!("msg {}", i), false));
        }

        let text = format_recent_window(&window, 3);
        assert_eq!(text, "[User]: msg 8\n[User]: msg 9\n[User]: msg 10");
    }

    #[test]
    fn test_format_recent_empty_window() {
        let window = MessageWindow::new(20);
        assert_eq!(format_recent_window(&window, 5), "");
    }

    #[test]
    fn test_assemble_empty_sections() {
        assert_eq!(assemble(ContextSections::default()), "");
    }

    #[test]
    fn test_assemble_section_order_and_omission() {
        let text = assemble(ContextSections {
            recent: "[Alice]: hi".to_string(),
            relevant: vec![mock_hit("Bob", "we discussed this before", 0.8)],
            participants: String::new(),
            facts: vec!["This channel is about Rust".to_string()],
        });

        let expected = "Recent channel conversation:\n[Alice]: hi\n\n\
                        Relevant past discussion:\n[Bob]: we discussed this before\n\n\
                        About this channel:\nThis channel is about Rust";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_assemble_participants_line_verbatim() {
        let text = assemble(ContextSections {
            participants: "Active participants: Bob (3 messages)".to_string(),
            ..Default::default()
        });
        assert_eq!(text, "Active participants: Bob (3 messages)");
    }
}
