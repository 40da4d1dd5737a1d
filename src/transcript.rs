//! Per-turn transcript with partial/final reconciliation.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptLine {
    pub role: Role,
    pub text: String,
}

impl TranscriptLine {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptMode {
    /// In-progress text that supersedes the previous partial.
    Partial,
    /// Settled text for an utterance.
    Final,
}

/// Ordered transcript. Adjacent lines always belong to different speakers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn last(&self) -> Option<&TranscriptLine> {
        self.lines.last()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Merges `line` into the transcript. Only the last line is ever
    /// rewritten; a role change starts a new line.
    pub fn append(&mut self, line: TranscriptLine, mode: TranscriptMode) {
        let Some(last) = self.lines.last_mut() else {
            self.lines.push(line);
            return;
        };
        if last.role != line.role {
            self.lines.push(line);
            return;
        }
        match mode {
            TranscriptMode::Partial => last.text = line.text,
            TranscriptMode::Final => {
                let last_text = last.text.trim();
                let new_text = line.text.trim();
                last.text = if new_text.starts_with(last_text) {
                    new_text.to_string()
                } else {
                    format!("{} {}", last_text, new_text)
                };
            }
        }
    }

    /// Replaces the text of the line at `index` when it belongs to `role`.
    /// Used for an utterance still streaming after another speaker's line
    /// landed below it.
    pub fn revise(&mut self, index: usize, role: Role, text: impl Into<String>) -> bool {
        match self.lines.get_mut(index) {
            Some(line) if line.role == role => {
                line.text = text.into();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(transcript: &Transcript) -> Vec<(Role, &str)> {
        transcript.lines().iter().map(|l| (l.role, l.text.as_str())).collect()
    }

    #[test]
    fn partial_supersedes() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::Assistant, "Hel"), TranscriptMode::Partial);
        t.append(TranscriptLine::new(Role::Assistant, "Hello"), TranscriptMode::Partial);
        assert_eq!(texts(&t), vec![(Role::Assistant, "Hello")]);
    }

    #[test]
    fn final_prefix_supersedes() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::User, "Hello"), TranscriptMode::Final);
        t.append(TranscriptLine::new(Role::User, "Hello there"), TranscriptMode::Final);
        assert_eq!(texts(&t), vec![(Role::User, "Hello there")]);
    }

    #[test]
    fn final_equal_text_does_not_duplicate() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::Assistant, "Sure, pasta."), TranscriptMode::Partial);
        t.append(TranscriptLine::new(Role::Assistant, "Sure, pasta."), TranscriptMode::Final);
        assert_eq!(texts(&t), vec![(Role::Assistant, "Sure, pasta.")]);
    }

    #[test]
    fn final_unrelated_text_concatenates() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::User, "Hi"), TranscriptMode::Final);
        t.append(TranscriptLine::new(Role::User, "Bye"), TranscriptMode::Final);
        assert_eq!(texts(&t), vec![(Role::User, "Hi Bye")]);
    }

    #[test]
    fn role_change_starts_a_new_line() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::User, "Any pasta?"), TranscriptMode::Final);
        t.append(TranscriptLine::new(Role::Assistant, "Let me"), TranscriptMode::Partial);
        t.append(TranscriptLine::new(Role::Assistant, "Let me check"), TranscriptMode::Final);
        t.append(TranscriptLine::new(Role::User, "Thanks"), TranscriptMode::Final);
        assert_eq!(
            texts(&t),
            vec![
                (Role::User, "Any pasta?"),
                (Role::Assistant, "Let me check"),
                (Role::User, "Thanks"),
            ]
        );
    }

    #[test]
    fn final_is_trimmed() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::User, " Hi "), TranscriptMode::Final);
        t.append(TranscriptLine::new(Role::User, " there "), TranscriptMode::Final);
        assert_eq!(texts(&t), vec![(Role::User, "Hi there")]);
    }

    // linear congruential walk over roles, modes and texts
    #[test]
    fn adjacent_lines_never_share_a_role() {
        let words = ["a", "ab", "abc", "b", "", " c"];
        let mut seed: u32 = 7;
        for _ in 0..200 {
            let mut t = Transcript::new();
            let mut previous_len = 0;
            for _ in 0..30 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let role = if (seed >> 16) & 1 == 0 { Role::User } else { Role::Assistant };
                let mode = if (seed >> 17) & 1 == 0 { TranscriptMode::Partial } else { TranscriptMode::Final };
                let text = words[(seed >> 20) as usize % words.len()];
                t.append(TranscriptLine::new(role, text), mode);
                assert!(t.len() >= previous_len);
                previous_len = t.len();
            }
            for pair in t.lines().windows(2) {
                assert_ne!(pair[0].role, pair[1].role);
            }
        }
    }

    #[test]
    fn revise_rewrites_an_earlier_line() {
        let mut t = Transcript::new();
        t.append(TranscriptLine::new(Role::Assistant, "Sure"), TranscriptMode::Partial);
        t.append(TranscriptLine::new(Role::User, "pasta please"), TranscriptMode::Final);
        assert!(t.revise(0, Role::Assistant, "Sure thing"));
        assert!(!t.revise(1, Role::Assistant, "wrong speaker"));
        assert!(!t.revise(5, Role::Assistant, "out of range"));
        assert_eq!(
            texts(&t),
            vec![(Role::Assistant, "Sure thing"), (Role::User, "pasta please")]
        );
    }
}
