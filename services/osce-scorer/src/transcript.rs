//! Transcript assembly from chat turns and condensation for prompt-size control.

use std::borrow::Cow;
use std::fmt;

use shared::dto::ChatTurn;
use strum_macros::EnumString;
use tracing::debug;

pub const DEFAULT_CONDENSE_LIMIT: usize = 40;

/// Rendered in place of a chat with no turns at all.
pub const EMPTY_TRANSCRIPT: &str = "No conversation recorded.";

/// Label used for a chat turn that carries no role.
const UNKNOWN_ROLE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Speaker {
    Student,
    Patient,
    /// Any other role, labelled with the role name as recorded.
    #[strum(default)]
    Other(String),
}

impl Speaker {
    /// Maps chat roles onto exam speakers: `user` is the student, `assistant`
    /// the simulated patient. Speaker names are accepted as roles too.
    pub fn from_role(role: &str) -> Self {
        let role = role.trim();
        if role.is_empty() {
            return Speaker::Other(UNKNOWN_ROLE.to_string());
        }
        match role.to_ascii_lowercase().as_str() {
            "user" => Speaker::Student,
            "assistant" => Speaker::Patient,
            _ => role
                .parse()
                .unwrap_or_else(|_| Speaker::Other(role.to_string())),
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Student => f.write_str("Student"),
            Speaker::Patient => f.write_str("Patient"),
            Speaker::Other(role) => f.write_str(role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.utterances.push(Utterance {
            speaker,
            text: text.into(),
        });
    }

    /// Builds a transcript from recorded chat turns, skipping turns without content.
    pub fn from_chat(turns: &[ChatTurn]) -> Self {
        let mut transcript = Transcript::default();
        for turn in turns {
            if turn.content.trim().is_empty() {
                debug!(role = %turn.role, "skipping empty chat turn");
                continue;
            }
            transcript.push(Speaker::from_role(&turn.role), turn.content.as_str());
        }
        transcript
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    /// Newline-delimited `Speaker: text` lines.
    pub fn render(&self) -> String {
        self.utterances
            .iter()
            .map(|u| format!("{}: {}", u.speaker, u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Transcript text for a recorded chat. Only a chat without any turns gets
/// [`EMPTY_TRANSCRIPT`]; a chat whose turns are all blank renders empty.
pub fn render_chat(turns: &[ChatTurn]) -> String {
    if turns.is_empty() {
        return EMPTY_TRANSCRIPT.to_string();
    }
    Transcript::from_chat(turns).render()
}

/// Bare `\r` line breaks become `\n` so that [`str::lines`] sees them.
fn unify_line_breaks(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Number of lines once surrounding whitespace is removed; an empty
/// transcript has zero lines.
pub fn line_count(raw: &str) -> usize {
    unify_line_breaks(raw).trim().lines().count()
}

/// Keep at most `limit` lines, each trimmed, in their original order.
pub fn condense(raw: &str, limit: usize) -> String {
    let raw = unify_line_breaks(raw);
    let out: Vec<&str> = raw.lines().take(limit).map(str::trim).collect();
    debug!(lines = out.len(), "condensed transcript");
    out.join("\n")
}
