//! Mention text grammar: `landing <name> | <description> | <purpose>`, `help`, `commands`.

const LANDING_KEYWORD: &str = "landing";
const FIELD_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingRequest {
    pub name: String,
    pub description: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionCommand {
    Generate(LandingRequest),
    /// `landing` keyword without three non-empty fields.
    MalformedGenerate,
    Help,
    /// Anything else; never answered.
    Unrecognized,
}

impl MentionCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate(_) => "generate",
            Self::MalformedGenerate => "malformed_generate",
            Self::Help => "help",
            Self::Unrecognized => "unrecognized",
        }
    }
}

pub fn parse_mention_command(text: &str, bot_handle: &str) -> MentionCommand {
    let normalized = strip_leading_mention(text.trim(), bot_handle)
        .trim()
        .to_lowercase();

    if let Some(arguments) = normalized.strip_prefix(LANDING_KEYWORD) {
        let fields = arguments
            .split(FIELD_SEPARATOR)
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .take(3)
            .collect::<Vec<_>>();
        return match fields.as_slice() {
            [name, description, purpose] => MentionCommand::Generate(LandingRequest {
                name: (*name).to_string(),
                description: (*description).to_string(),
                purpose: (*purpose).to_string(),
            }),
            _ => MentionCommand::MalformedGenerate,
        };
    }

    if normalized.contains("help") || normalized.contains("commands") {
        return MentionCommand::Help;
    }
    MentionCommand::Unrecognized
}

fn strip_leading_mention<'a>(text: &'a str, bot_handle: &str) -> &'a str {
    let handle = bot_handle.trim().trim_start_matches('@');
    if handle.is_empty() {
        return text;
    }
    let token_len = handle.len() + 1;
    let Some(token) = text.get(..token_len) else {
        return text;
    };
    if !token.starts_with('@') || !token[1..].eq_ignore_ascii_case(handle) {
        return text;
    }

    let rest = &text[token_len..];
    match rest.chars().next() {
        Some(next) if is_handle_char(next) => text,
        _ => rest,
    }
}

fn is_handle_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.'
}
