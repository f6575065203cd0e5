//! Re-lays out screenplay dialogue: centred character cues, indented dialogue,
//! and parentheticals turned into short action sentences.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use textwrap::{Options as WrapOptions, WordSeparator, WordSplitter};

use crate::classifier::{base_character_name, is_character_header, is_parenthetical, is_scene_heading, is_script_marker};
use crate::error::ScreenplayError;

pub const CHARACTER_INDENT: usize = 20;
pub const DIALOGUE_INDENT: usize = 10;
pub const MAX_LINE_WIDTH: usize = 121;

pub fn format_screenplay(content: &str) -> String {
    let lines = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect::<Vec<_>>();
    let cast = lines
        .iter()
        .filter(|line| !is_script_marker(line) && is_character_header(line))
        .map(|line| base_character_name(line))
        .collect::<HashSet<_>>();
    let mut formatted = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_script_marker(line) || !is_character_header(line) {
            formatted.push(capitalize_leading_names(line, &cast));
            i += 1;
            continue;
        }

        let header = line.trim();
        i += 1;

        if let Some(next) = lines.get(i).filter(|next| is_parenthetical(next)) {
            let cue = next.trim();
            let cue = &cue[1..cue.len() - 1];
            if !cue.trim().is_empty() {
                formatted.push(parenthetical_to_action(header, cue));
                formatted.push(String::new());
            }
            i += 1;
        }

        formatted.push(format!("{:width$}{}", "", header, width = CHARACTER_INDENT));

        while let Some(dialogue) = lines.get(i) {
            if dialogue.trim().is_empty() {
                formatted.push(String::new());
                i += 1;
                break;
            }
            if is_character_header(dialogue) || is_scene_heading(dialogue) {
                break;
            }
            formatted.push(format!("{:width$}{}", "", dialogue.trim_start(), width = DIALOGUE_INDENT));
            i += 1;
        }
    }

    formatted
        .iter()
        .flat_map(|line| wrap_line(line, MAX_LINE_WIDTH))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns a parenthetical cue into an action sentence about the character.
pub fn parenthetical_to_action(header: &str, parenthetical: &str) -> String {
    let name = title_case(base_character_name(header));
    let cue = parenthetical.trim();
    let lower = cue.to_lowercase();

    if lower.starts_with("to ") {
        return format!("{} turns to {}.", name, cue[3..].trim());
    }

    match lower.as_str() {
        "quietly" | "whispered" | "whispers" => return format!("{}, quietly.", name),
        "shouting" | "yelling" | "shouts" => return format!("{} shouts.", name),
        "firmly" | "firm" => return format!("{}, firm.", name),
        "sharply" | "sharp" => return format!("{}, sharp.", name),
        _ => {},
    }

    if contains_any(&lower, &["moving", "walks", "walking"]) {
        format!("{} {}.", name, cue)
    } else if contains_any(&lower, &["smirk"]) {
        format!("{} smirks.", name)
    } else if contains_any(&lower, &["smile", "smiling"]) {
        format!("{} smiles.", name)
    } else if contains_any(&lower, &["laugh"]) {
        format!("{} laughs.", name)
    } else if contains_any(&lower, &["nod"]) {
        format!("{} nods.", name)
    } else if contains_any(&lower, &["shake", "shaking"]) {
        format!("{} shakes their head.", name)
    } else if cue.ends_with('.') {
        format!("{}, {}", name, cue)
    } else {
        format!("{}, {}.", name, cue)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// `MARCUS turns, annoyed.` becomes `Marcus turns, annoyed.` when `MARCUS` is in
/// `cast`. The longest leading run of ALL-CAPS words naming a cast member is
/// converted; other capitalised words (`FBI`, `OK`) are left alone.
fn capitalize_leading_names(line: &str, cast: &HashSet<&str>) -> String {
    let body = line.trim_start();
    let is_prose = body.chars().any(char::is_lowercase) && !is_scene_heading(body);
    if !is_prose || cast.is_empty() {
        return line.to_string();
    }

    let indent = &line[..line.len() - body.len()];
    let words = body.split(' ').collect::<Vec<_>>();
    let caps_run = words
        .iter()
        .take_while(|word| {
            let name = word.trim_end_matches([',', '.']);
            name.chars().count() >= 2 && name.chars().all(char::is_uppercase)
        })
        .count();

    let named = (1..=caps_run).rev().find(|&len| {
        let candidate = words[..len].join(" ");
        cast.contains(candidate.trim_end_matches([',', '.']))
    });
    let Some(len) = named else {
        return line.to_string();
    };

    // Punctuation may only follow the last word of the name.
    if words[..len - 1].iter().any(|word| word.ends_with([',', '.'])) {
        return line.to_string();
    }

    let last = words[len - 1];
    let name = words[..len].join(" ");
    let name = name.trim_end_matches([',', '.']);
    let punctuation = &last[last.trim_end_matches([',', '.']).len()..];

    let mut rebuilt = format!("{}{}{}", indent, title_case(name), punctuation);
    for word in &words[len..] {
        rebuilt.push(' ');
        rebuilt.push_str(word);
    }
    rebuilt
}

fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wraps to `max_width` columns without splitting words, repeating the line's indentation.
pub fn wrap_line(line: &str, max_width: usize) -> Vec<String> {
    if line.chars().count() <= max_width {
        return vec![line.to_string()];
    }

    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];
    let options = WrapOptions::new(max_width)
        .initial_indent(indent)
        .subsequent_indent(indent)
        .break_words(false)
        .word_separator(WordSeparator::AsciiSpace)
        .word_splitter(WordSplitter::NoHyphenation);

    textwrap::wrap(body, options)
        .into_iter()
        .map(|cow| cow.into_owned())
        .collect()
}

/// Reformats a file in place, or only returns the result when `dry_run` is set.
pub fn format_file<P: AsRef<Path>>(path: P, dry_run: bool) -> Result<String, ScreenplayError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ScreenplayError::read(path, e))?;
    let formatted = format_screenplay(&content);

    if !dry_run {
        fs::write(path, &formatted).map_err(|e| ScreenplayError::write(path, e))?;
    }

    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indent(n: usize, text: &str) -> String {
        format!("{}{}", " ".repeat(n), text)
    }

    #[test]
    fn lays_out_cue_and_dialogue() {
        let input = "ALEX\n(moving toward window)\nWe need to leave now.\n\nMARCUS turns, annoyed.\nMARCUS\nFine.";
        let expected = [
            "Alex moving toward window.".to_string(),
            String::new(),
            indent(20, "ALEX"),
            indent(10, "We need to leave now."),
            String::new(),
            "Marcus turns, annoyed.".to_string(),
            indent(20, "MARCUS"),
            indent(10, "Fine."),
        ]
        .join("\n");
        assert_eq!(format_screenplay(input), expected);
    }

    #[test]
    fn dialogue_block_ends_at_next_cue() {
        let input = "LEA\n  Go.\nJOSH\n     Now?";
        let expected = [indent(20, "LEA"), indent(10, "Go."), indent(20, "JOSH"), indent(10, "Now?")].join("\n");
        assert_eq!(format_screenplay(input), expected);
    }

    #[test]
    fn formatting_is_idempotent() {
        let input = "SCREENPLAY\nINT. LAB - DAY\nSOFIA (V.O.)\n(to Marcus)\nHold still.\n\nSofia waits.\n";
        let once = format_screenplay(input);
        assert_eq!(format_screenplay(&once), once);
    }

    #[test]
    fn parenthetical_rules() {
        assert_eq!(parenthetical_to_action("MARCUS", "to Lea"), "Marcus turns to Lea.");
        assert_eq!(parenthetical_to_action("MARCUS", "Quietly"), "Marcus, quietly.");
        assert_eq!(parenthetical_to_action("MARCUS", "yelling"), "Marcus shouts.");
        assert_eq!(parenthetical_to_action("MARCUS", "firm"), "Marcus, firm.");
        assert_eq!(parenthetical_to_action("MARCUS", "sharply"), "Marcus, sharp.");
        assert_eq!(parenthetical_to_action("ALEX (V.O.)", "smiling warmly"), "Alex smiles.");
        assert_eq!(parenthetical_to_action("ALEX", "smirking"), "Alex smirks.");
        assert_eq!(parenthetical_to_action("ALEX", "laughing"), "Alex laughs.");
        assert_eq!(parenthetical_to_action("ALEX", "nodding"), "Alex nods.");
        assert_eq!(parenthetical_to_action("ALEX", "shaking head"), "Alex shakes their head.");
        assert_eq!(parenthetical_to_action("REGULAR CUSTOMER", "beat"), "Regular Customer, beat.");
        assert_eq!(parenthetical_to_action("ALEX", "under breath."), "Alex, under breath.");
    }

    #[test]
    fn leading_cast_names_become_title_case() {
        let cast = HashSet::from(["MARCUS", "REGULAR CUSTOMER"]);
        assert_eq!(capitalize_leading_names("MARCUS, exhausted, sits.", &cast), "Marcus, exhausted, sits.");
        assert_eq!(capitalize_leading_names("REGULAR CUSTOMER walks in.", &cast), "Regular Customer walks in.");
        assert_eq!(capitalize_leading_names("  MARCUS nods.", &cast), "  Marcus nods.");
        assert_eq!(capitalize_leading_names("INT. LAB - DAY", &cast), "INT. LAB - DAY");
        assert_eq!(capitalize_leading_names("I think so.", &cast), "I think so.");
        assert_eq!(capitalize_leading_names("CUT TO BLACK.", &cast), "CUT TO BLACK.");
    }

    #[test]
    fn acronyms_outside_the_cast_keep_their_case() {
        let input = "SCREENPLAY\nFBI agents storm the lab.\nOK, nobody move.\nMARCUS\n  Run.";
        let formatted = format_screenplay(input);
        let lines = formatted.lines().collect::<Vec<_>>();
        assert_eq!(lines[1], "FBI agents storm the lab.");
        assert_eq!(lines[2], "OK, nobody move.");

        let cast = HashSet::from(["MARCUS"]);
        assert_eq!(capitalize_leading_names("MARCUS FBI agents wait.", &cast), "Marcus FBI agents wait.");
    }

    #[test]
    fn wraps_without_breaking_words() {
        let line = format!("{}{}", " ".repeat(10), "word ".repeat(40).trim_end());
        let wrapped = wrap_line(&line, 60);
        assert!(wrapped.len() > 1);
        for piece in &wrapped {
            assert!(piece.chars().count() <= 60);
            assert!(piece.starts_with(&" ".repeat(10)));
            assert!(piece.trim().split(' ').all(|w| w == "word"));
        }
    }

    #[test]
    fn short_lines_are_untouched() {
        assert_eq!(wrap_line("  short-line", 121), vec!["  short-line".to_string()]);
    }
}
