//! Line-level predicates for loosely formatted screenplay text.
//!
//! [`classify`] applies the predicates in a fixed precedence order; the first
//! match wins. The reformatter reuses [`is_character_header`] so both tools
//! agree on what a character cue looks like.

use std::sync::LazyLock;

use regex::Regex;

/// `NAME` or `NAME (ANNOTATION)`, uppercase letters and spaces only in the name.
static CHARACTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\p{Lu}[\p{Lu} \t]+?)(?:\s*\([^()]*\))?$").expect("valid character pattern")
});

static VOICE_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\((?:V\.O\.|O\.S\.)\)\s*$").expect("valid annotation pattern")
});

static TRAILING_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\([^()]*\)\s*$").expect("valid annotation pattern")
});

static ACTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z].*[.,]").expect("valid action pattern")
});

const SCRIPT_MARKERS: [&str; 2] = ["FULL SCRIPT", "SCREENPLAY"];
const SEPARATOR_PREFIXES: [&str; 2] = ["===", "---"];
const HEADER_EXCLUDED_PREFIXES: [&str; 5] = ["INT.", "EXT.", "FADE", "CUT", "SCENE"];
const SCENE_HEADING_PREFIXES: [&str; 5] = ["INT.", "EXT.", "SCENE", "LOCATION:", "FADE"];
const MAX_HEADER_CHARS: usize = 40;

/// What a single raw line is, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    ScriptMarker,
    Blank,
    /// Trimmed header text, annotation included.
    CharacterHeader(&'a str),
    SceneHeading(&'a str),
    Parenthetical,
    /// Text with surrounding quotes removed.
    QuotedDialogue(&'a str),
    Continuation(&'a str),
    Action(&'a str),
    Unclassified,
}

/// Classifies one raw line. `has_speaker` tells whether a character is
/// currently speaking, which is the only context indented continuations need.
pub fn classify(raw: &str, has_speaker: bool) -> LineKind<'_> {
    let trimmed = raw.trim();

    if is_script_marker(trimmed) {
        return LineKind::ScriptMarker;
    }
    if is_blank_or_separator(trimmed) {
        return LineKind::Blank;
    }
    if is_character_header(trimmed) {
        return LineKind::CharacterHeader(trimmed);
    }
    if is_scene_heading(trimmed) {
        return LineKind::SceneHeading(trimmed);
    }
    if is_parenthetical(trimmed) {
        return LineKind::Parenthetical;
    }
    if let Some(text) = unquote(trimmed) {
        return LineKind::QuotedDialogue(text);
    }

    let indented = is_indented(raw);
    if indented && has_speaker {
        return LineKind::Continuation(trimmed);
    }
    if !indented && is_action_line(trimmed) {
        return LineKind::Action(trimmed);
    }

    LineKind::Unclassified
}

pub fn is_script_marker(line: &str) -> bool {
    let upper = line.to_uppercase();
    SCRIPT_MARKERS.iter().any(|marker| upper.contains(marker))
}

pub fn is_blank_or_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || SEPARATOR_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
}

/// True when the line names who speaks next, e.g. `MARCUS` or `ALEX (V.O.)`.
pub fn is_character_header(line: &str) -> bool {
    let trimmed = line.trim();

    trimmed.chars().count() < MAX_HEADER_CHARS
        && trimmed == trimmed.to_uppercase()
        && CHARACTER_PATTERN.is_match(trimmed)
        && !strip_voice_annotation(trimmed).contains([',', '.'])
        && !HEADER_EXCLUDED_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
}

/// Removes a trailing `(V.O.)` or `(O.S.)`.
pub fn strip_voice_annotation(header: &str) -> &str {
    match VOICE_ANNOTATION.find(header) {
        Some(m) => &header[..m.start()],
        None => header,
    }
}

/// Header text without any trailing parenthetical annotation.
pub fn base_character_name(header: &str) -> &str {
    let trimmed = header.trim();
    match TRAILING_ANNOTATION.find(trimmed) {
        Some(m) if m.start() > 0 => trimmed[..m.start()].trim_end(),
        _ => trimmed,
    }
}

pub fn is_scene_heading(line: &str) -> bool {
    let trimmed = line.trim();
    SCENE_HEADING_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
}

pub fn is_parenthetical(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('(') && trimmed.ends_with(')')
}

/// Strips quote characters from both ends of a line that starts with one.
pub fn unquote(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with(['"', '\'']) {
        Some(trimmed.trim_matches(|c| c == '"' || c == '\''))
    } else {
        None
    }
}

pub fn is_indented(raw: &str) -> bool {
    raw.starts_with([' ', '\t'])
}

/// Narrative line: capitalised and punctuated. Indentation is checked by the caller.
pub fn is_action_line(line: &str) -> bool {
    let trimmed = line.trim();
    let starts_upper = trimmed.chars().next().is_some_and(char::is_uppercase);

    starts_upper && (ACTION_PATTERN.is_match(trimmed) || trimmed.contains([',', '.']))
}
