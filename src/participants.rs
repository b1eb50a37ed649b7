use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Activity record for one user within a channel.
#[derive(Debug, Clone)]
pub struct Participant {
    pub username: String,
    pub message_count: u64,
    pub last_seen: DateTime<Utc>,
    /// First-seen sequence number, used as the deterministic tie-break
    /// when two participants have equal message counts.
    seq: u64,
}

/// Per-channel participant activity table.
///
/// Independent of the message window: it survives window eviction and only
/// forgets participants when the channel itself is dropped.
#[derive(Default)]
pub struct ParticipantTable {
    entries: HashMap<u64, Participant>,
    next_seq: u64,
}

impl ParticipantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one message from `user_id`. Inserts with a count of 1 on
    /// first sight; otherwise increments the count, refreshes `last_seen`
    /// and overwrites the username (last write wins).
    pub fn touch(&mut self, user_id: u64, username: &str) {
        self.touch_at(user_id, username, Utc::now());
    }

    fn touch_at(&mut self, user_id: u64, username: &str, when: DateTime<Utc>) {
        match self.entries.get_mut(&user_id) {
            Some(p) => {
                p.message_count += 1;
                p.username = username.to_string();
                p.last_seen = when;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(
                    user_id,
                    Participant {
                        username: username.to_string(),
                        message_count: 1,
                        last_seen: when,
                        seq,
                    },
                );
            }
        }
    }

    /// Participants seen within the last `window_minutes`, most talkative
    /// first. Ties keep first-seen order.
    pub fn active(&self, window_minutes: i64) -> Vec<Participant> {
        self.active_since(Utc::now() - Duration::minutes(window_minutes))
    }

    fn active_since(&self, cutoff: DateTime<Utc>) -> Vec<Participant> {
        let mut active: Vec<Participant> = self
            .entries
            .values()
            .filter(|p| p.last_seen >= cutoff)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.message_count
                .cmp(&a.message_count)
                .then(a.seq.cmp(&b.seq))
        });
        active
    }

    /// Human-readable summary like
    /// `"Active participants: Bob (3 messages), Alice (1 message)"`.
    /// Empty string when nobody is active.
    pub fn format_summary(&self, window_minutes: i64) -> String {
        let active = self.active(window_minutes);
        if active.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = active
            .iter()
            .map(|p| {
                let noun = if p.message_count == 1 {
                    "message"
                } else {
                    "messages"
                };
                format!("{} ({} {})", p.username, p.message_count, noun)
            })
            .collect();

        format!("Active participants: {}", parts.join(", "))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_counts_and_username_overwrite() {
        let mut table = ParticipantTable::new();
        table.touch(1, "alice");
        table.touch(1, "alice");
        table.touch(1, "Alice");

        let active = table.active(60);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message_count, 3);
        assert_eq!(active[0].username, "Alice");
    }

    #[test]
    fn test_active_sorted_by_count_desc() {
        let mut table = ParticipantTable::new();
        table.touch(1, "Alice");
        table.touch(2, "Bob");
        table.touch(2, "Bob");
        table.touch(2, "Bob");

        let active = table.active(60);
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].username, "Bob");
        assert_eq!(active[0].message_count, 3);
        assert_eq!(active[1].username, "Alice");
        assert_eq!(active[1].message_count, 1);
    }

    #[test]
    fn test_tie_break_keeps_first_seen_order() {
        let mut table = ParticipantTable::new();
        table.touch(10, "Carol");
        table.touch(20, "Dave");

        let active = table.active(60);
        assert_eq!(active[0].username, "Carol");
        assert_eq!(active[1].username, "Dave");
    }

    #[test]
    fn test_activity_window_excludes_stale() {
        let mut table = ParticipantTable::new();
        table.touch_at(1, "Old", Utc::now() - Duration::minutes(90));
        table.touch(2, "Fresh");

        let active = table.active(30);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].username, "Fresh");

        // A wider window picks both up again.
        assert_eq!(table.active(120).len(), 2);
    }

    #[test]
    fn test_format_summary() {
        let mut table = ParticipantTable::new();
        table.touch(1, "Alice");
        table.touch(2, "Bob");
        table.touch(2, "Bob");
        table.touch(2, "Bob");

        assert_eq!(
            table.format_summary(60),
            "Active participants: Bob (3 messages), Alice (1 message)"
        );
    }

    #[test]
    fn test_format_summary_empty() {
        let table = ParticipantTable::new();
        assert_eq!(table.format_summary(60), "");
    }
}
