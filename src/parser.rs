//! Single-pass screenplay parser: classifies each line and merges consecutive
//! dialogue lines into utterances.

use std::fs;
use std::path::Path;

use crate::classifier::{self, LineKind};
use crate::error::ScreenplayError;
use crate::types::Utterance;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Emit one utterance per dialogue line instead of merging a speaker's block.
    pub line_by_line: bool,
    /// Discard everything before the first `SCREENPLAY` / `FULL SCRIPT` line.
    pub require_script_marker: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            line_by_line: false,
            require_script_marker: true,
        }
    }
}

#[derive(Debug)]
struct PendingDialogue {
    fragments: Vec<String>,
    start_line: usize,
}

impl PendingDialogue {
    /// Fragments joined with single spaces, whitespace runs collapsed.
    fn joined(&self) -> String {
        self.fragments
            .iter()
            .flat_map(|fragment| fragment.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Per-file parser state. Feed lines in order, then call [`finish`](Self::finish).
#[derive(Debug)]
pub struct ScreenplayParser {
    options: ParseOptions,
    script_started: bool,
    current_speaker: Option<String>,
    pending: Option<PendingDialogue>,
    utterances: Vec<Utterance>,
}

impl Default for ScreenplayParser {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

impl ScreenplayParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            script_started: !options.require_script_marker,
            current_speaker: None,
            pending: None,
            utterances: Vec::new(),
        }
    }

    pub fn current_speaker(&self) -> Option<&str> {
        self.current_speaker.as_deref()
    }

    /// Processes one raw line. `line_number` is 1-based.
    pub fn feed_line(&mut self, line_number: usize, raw: &str) {
        let kind = classifier::classify(raw, self.current_speaker.is_some());

        if kind == LineKind::ScriptMarker {
            log::debug!("Line {}: script marker: {}", line_number, raw.trim());
            self.script_started = true;
            return;
        }
        if !self.script_started {
            return;
        }

        match kind {
            LineKind::ScriptMarker | LineKind::Blank | LineKind::Parenthetical | LineKind::Unclassified => {},
            LineKind::CharacterHeader(header) => {
                self.flush();
                log::debug!("Line {}: character: '{}'", line_number, header);
                self.current_speaker = Some(header.to_string());
            },
            LineKind::SceneHeading(text) => {
                self.flush();
                log::debug!("Line {}: scene heading: {}", line_number, text);
                self.utterances.push(Utterance::action(text, line_number));
                self.current_speaker = None;
            },
            LineKind::Action(text) => {
                self.flush();
                log::debug!("Line {}: action: {}", line_number, text);
                self.utterances.push(Utterance::action(text, line_number));
                self.current_speaker = None;
            },
            LineKind::QuotedDialogue(text) if text.is_empty() => {},
            LineKind::QuotedDialogue(text) => {
                if self.current_speaker.is_some() {
                    self.dialogue(line_number, text);
                } else {
                    log::debug!("Line {}: quoted text without speaker: {}", line_number, text);
                    self.utterances.push(Utterance::action(text, line_number));
                }
            },
            LineKind::Continuation(text) => self.dialogue(line_number, text),
        }
    }

    fn dialogue(&mut self, line_number: usize, text: &str) {
        let Some(speaker) = self.current_speaker.as_deref() else {
            return;
        };

        if self.options.line_by_line {
            log::debug!("Line {}: dialogue for '{}': {}", line_number, speaker, text);
            self.utterances.push(Utterance::dialogue(speaker, text, line_number));
            return;
        }

        self.pending
            .get_or_insert_with(|| PendingDialogue {
                fragments: Vec::new(),
                start_line: line_number,
            })
            .fragments
            .push(text.to_string());
    }

    /// Emits the accumulated dialogue block, if any, for the current speaker.
    fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match &self.current_speaker {
            Some(speaker) => {
                let text = pending.joined();
                log::debug!("Line {}: combined dialogue for '{}': {}", pending.start_line, speaker, text);
                self.utterances.push(Utterance::dialogue(speaker.as_str(), text, pending.start_line));
            },
            None => {
                log::debug!("Line {}: discarding dialogue without a speaker", pending.start_line);
            },
        }
    }

    /// Flushes pending dialogue and returns the utterances in source order.
    pub fn finish(mut self) -> Vec<Utterance> {
        self.flush();
        self.utterances
    }
}

pub fn parse_lines<'a, I>(lines: I, options: ParseOptions) -> Vec<Utterance>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parser = ScreenplayParser::new(options);
    for (index, line) in lines.into_iter().enumerate() {
        parser.feed_line(index + 1, line);
    }
    parser.finish()
}

pub fn parse_str(content: &str, options: ParseOptions) -> Vec<Utterance> {
    parse_lines(content.lines(), options)
}

pub fn parse_file<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Vec<Utterance>, ScreenplayError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ScreenplayError::read(path, e))?;
    Ok(parse_str(&content, options))
}
