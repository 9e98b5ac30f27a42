//! Markdown clean-up applied to accumulated stream text before every emit.
//!
//! Streamed model output tends to lose or mangle line structure at fragment
//! boundaries. [`normalize`] runs an ordered list of [`Stage`]s over the text;
//! later stages expect the whitespace shape produced by the earlier ones, so
//! the order in [`STAGES`] is fixed. Every stage is a pure function.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// One named normalization step.
#[derive(Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The pipeline, in application order.
pub const STAGES: &[Stage] = &[
    Stage {
        name: "collapse_whitespace",
        apply: collapse_whitespace,
    },
    Stage {
        name: "trim",
        apply: trim,
    },
    Stage {
        name: "space_headings",
        apply: space_headings,
    },
    Stage {
        name: "split_bullets",
        apply: split_bullets,
    },
    Stage {
        name: "break_ordered_items",
        apply: break_ordered_items,
    },
    Stage {
        name: "trim_emphasis",
        apply: trim_emphasis,
    },
    Stage {
        name: "break_blockquotes",
        apply: break_blockquotes,
    },
    Stage {
        name: "collapse_blank_lines",
        apply: collapse_blank_lines,
    },
];

/// Runs every stage of [`STAGES`] over `text`.
///
/// ```
/// use brandvoice_stream::normalize::normalize;
///
/// assert_eq!(
///     normalize("Intro text# Heading\nBody"),
///     "Intro text\n\n# Heading\nBody"
/// );
/// assert_eq!(normalize("Items:-first-second"), "Items:\n- first\n- second");
/// ```
pub fn normalize(text: &str) -> String {
    STAGES
        .iter()
        .fold(text.to_owned(), |acc, stage| (stage.apply)(&acc))
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("normalization patterns are valid")
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| regex(r"\s+"));
static HEADING: Lazy<Regex> = Lazy::new(|| regex(r"\s*(#{1,6})[ \t]"));
static BULLET: Lazy<Regex> = Lazy::new(|| regex(r"(\s*)([-*])( ?)"));
static ORDERED: Lazy<Regex> = Lazy::new(|| regex(r"(\s*)(\d+)\. "));
static ORDERED_OPENER: Lazy<Regex> = Lazy::new(|| regex(r"(?:^|:)\s*\d+\. "));
// Bold comes first in the alternation so `**a**` is never read as italic.
static EMPHASIS: Lazy<Regex> = Lazy::new(|| {
    regex(concat!(
        r"\*\*[ \t]*([^*\s](?:[^*\n]*[^*\s])?)[ \t]*\*\*",
        r"|\*[ \t]*([^*\s](?:[^*\n]*[^*\s])?)[ \t]*\*",
        r"|`[ \t]*([^`\s](?:[^`\n]*[^`\s])?)[ \t]*`",
    ))
});
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| regex(r"(\s*)>( ?)"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| regex(r"\n{3,}"));
static LINE_END_PADDING: Lazy<Regex> = Lazy::new(|| regex(r"[ \t]+\n"));

/// Replaces each match of `re` with what `replace` returns, or keeps the
/// match when it returns `None`. `replace` also sees the text before the
/// match and the text after it, both taken from the unmodified input.
fn rewrite<F>(text: &str, re: &Regex, mut replace: F) -> String
where
    F: FnMut(&str, &Captures<'_>, &str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        match replace(&text[..whole.start()], &caps, &text[whole.end()..]) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

fn newline_count(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

fn line_break(lead: &str) -> &'static str {
    if newline_count(lead) >= 2 { "\n\n" } else { "\n" }
}

fn current_line(before: &str) -> &str {
    before.rsplit('\n').next().unwrap_or(before)
}

/// Whitespace runs become one space, one newline, or a paragraph break.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE
        .replace_all(text, |caps: &Captures<'_>| {
            match newline_count(group(caps, 0)) {
                0 => " ",
                1 => "\n",
                _ => "\n\n",
            }
        })
        .into_owned()
}

pub fn trim(text: &str) -> String {
    text.trim().to_owned()
}

/// Puts a blank line before every heading marker that does not open the text.
pub fn space_headings(text: &str) -> String {
    rewrite(text, &HEADING, |before, caps, _| {
        let marker = group(caps, 1);
        if before.ends_with('#') {
            None
        } else if before.is_empty() {
            Some(format!("{marker} "))
        } else {
            Some(format!("\n\n{marker} "))
        }
    })
}

/// Rewrites bullet markers to `\n- `.
///
/// A `-` or `*` at line start followed by a space is a bullet. A `-` glued
/// between a word and a preceding list opener (`Items:-a-b`) is one too; a
/// hyphen in running prose is left alone.
pub fn split_bullets(text: &str) -> String {
    rewrite(text, &BULLET, |before, caps, after| {
        let lead = group(caps, 1);
        let marker = group(caps, 2);
        let spaced = !group(caps, 3).is_empty();
        let next = after.chars().next();
        let at_line_start = before.is_empty() || newline_count(lead) > 0;

        let line_bullet = at_line_start
            && spaced
            && next.is_some_and(|c| !c.is_whitespace())
            && !(marker == "*" && next == Some('*'));
        let glued_bullet = marker == "-"
            && lead.is_empty()
            && !spaced
            && before
                .chars()
                .last()
                .is_some_and(|c| c.is_alphanumeric() || c == ':')
            && next.is_some_and(char::is_alphanumeric)
            && opens_list(current_line(before));

        if !(line_bullet || glued_bullet) {
            return None;
        }
        if before.is_empty() {
            Some("- ".to_owned())
        } else {
            Some("\n- ".to_owned())
        }
    })
}

fn opens_list(line: &str) -> bool {
    line.ends_with(':') || line.contains(":-")
}

/// Starts ordered items (`1. `) on their own line.
///
/// Items already at line start keep their break; items following a `:` or an
/// earlier item on the same line are moved to a new line.
pub fn break_ordered_items(text: &str) -> String {
    rewrite(text, &ORDERED, |before, caps, _| {
        let lead = group(caps, 1);
        let number = group(caps, 2);
        if before.is_empty() && lead.is_empty() {
            return None;
        }
        if newline_count(lead) > 0 {
            return Some(format!("{}{number}. ", line_break(lead)));
        }
        let line = current_line(before);
        let continues_list = !lead.is_empty() && ORDERED_OPENER.is_match(line);
        if before.ends_with(':') || continues_list {
            Some(format!("\n{number}. "))
        } else {
            None
        }
    })
}

/// Drops padding inside bold, italic and inline-code spans.
pub fn trim_emphasis(text: &str) -> String {
    rewrite(text, &EMPHASIS, |before, caps, after| {
        if let Some(inner) = caps.get(1) {
            return Some(format!("**{}**", inner.as_str()));
        }
        if let Some(inner) = caps.get(2) {
            if before.ends_with('*') || after.starts_with('*') {
                return None;
            }
            return Some(format!("*{}*", inner.as_str()));
        }
        let inner = caps.get(3)?;
        if before.ends_with('`') || after.starts_with('`') {
            return None;
        }
        Some(format!("`{}`", inner.as_str()))
    })
}

/// Normalizes `>` at line start to `\n> `.
pub fn break_blockquotes(text: &str) -> String {
    rewrite(text, &BLOCKQUOTE, |before, caps, after| {
        let lead = group(caps, 1);
        let at_line_start = before.is_empty() || newline_count(lead) > 0;
        if !at_line_start || !after.chars().next().is_some_and(|c| !c.is_whitespace()) {
            return None;
        }
        if before.is_empty() {
            Some("> ".to_owned())
        } else {
            Some(format!("{}> ", line_break(lead)))
        }
    })
}

/// Caps newline runs at one blank line and drops spaces left at line ends.
pub fn collapse_blank_lines(text: &str) -> String {
    let text = LINE_END_PADDING.replace_all(text, "\n");
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<_> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "collapse_whitespace",
                "trim",
                "space_headings",
                "split_bullets",
                "break_ordered_items",
                "trim_emphasis",
                "break_blockquotes",
                "collapse_blank_lines",
            ]
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn whitespace_runs_keep_line_structure() {
        assert_eq!(collapse_whitespace("a  \t b"), "a b");
        assert_eq!(collapse_whitespace("a \n b"), "a\nb");
        assert_eq!(collapse_whitespace("a\n \n\n\nb"), "a\n\nb");
        assert_eq!(collapse_whitespace("a\r\nb"), "a\nb");
    }

    #[test]
    fn heading_gets_blank_line() {
        assert_eq!(
            normalize("Intro text# Heading\nBody"),
            "Intro text\n\n# Heading\nBody"
        );
        assert_eq!(space_headings("## Top"), "## Top");
        assert_eq!(space_headings("a\n### b"), "a\n\n### b");
        assert_eq!(space_headings("C#sharp"), "C#sharp");
    }

    #[test]
    fn seven_hashes_are_not_a_heading() {
        assert_eq!(space_headings("a ####### b"), "a ####### b");
    }

    #[test]
    fn glued_bullets_are_split() {
        assert_eq!(normalize("Items:-first-second"), "Items:\n- first\n- second");
    }

    #[test]
    fn star_bullets_become_dashes() {
        assert_eq!(normalize("Tips\n* one\n\n* two"), "Tips\n- one\n- two");
    }

    #[test]
    fn hyphenated_prose_is_untouched() {
        assert_eq!(normalize("A well-known brand - really."), "A well-known brand - really.");
        assert_eq!(normalize("Due 2024-01-05"), "Due 2024-01-05");
    }

    #[test]
    fn ordered_items_start_new_lines() {
        assert_eq!(
            normalize("Steps: 1. Mix 2. Bake"),
            "Steps:\n1. Mix\n2. Bake"
        );
        assert_eq!(normalize("Intro\n\n1. a\n2. b"), "Intro\n\n1. a\n2. b");
        assert_eq!(normalize("Costs 3.5 dollars. 4. not a list"), "Costs 3.5 dollars. 4. not a list");
    }

    #[test]
    fn emphasis_padding_is_trimmed() {
        assert_eq!(trim_emphasis("** bold ** and * it * and ` x `"), "**bold** and *it* and `x`");
        assert_eq!(trim_emphasis("**a** and **b**"), "**a** and **b**");
        assert_eq!(trim_emphasis("```rust"), "```rust");
    }

    #[test]
    fn blockquotes_get_their_own_line() {
        assert_eq!(normalize("Quote:\n>wise words"), "Quote:\n> wise words");
        assert_eq!(normalize(">start"), "> start");
        assert_eq!(normalize("a > b"), "a > b");
    }

    #[test]
    fn blank_lines_are_capped() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n"), "a\n\nb");
    }

    #[test]
    fn empty_headings_leave_no_padding() {
        assert_eq!(normalize("## ## a"), "##\n\n## a");
        assert_eq!(normalize("# # ."), "#\n\n# .");
        assert_eq!(collapse_blank_lines("a \t\nb"), "a\nb");
    }

    #[test]
    fn trimmed_code_span_is_not_a_glued_bullet() {
        let once = normalize("x:- b` -b\t`");
        assert_eq!(once, "x:- b`-b`");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "Hello world",
            "Intro text# Heading\nBody",
            "Items:-first-second-third",
            "  # Title\n\n\n\nSome ** bold ** text with * emphasis * and ` code `.",
            "Steps: 1. Mix 2. Bake\n\n> quoted\n>another",
            "Tips\n* one\n\n* two\n- three",
            "## A\n### B\nC# and F# are languages",
            "Mixed -dash and - spaced and **a** and **b**",
            "- # heading in bullet\n>> nested",
            "Costs 3.5 dollars. 4. not a list",
            "## ## a",
            "# # .",
            "***Hello`x:a#* 1. :-\t-- b` -b\t` -\n> -`\t1. ",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    fn markdownish() -> impl Strategy<Value = String> {
        let pieces = prop::sample::select(vec![
            "a", "b", "Hello", "3", ".", " ", "\t", "\n", "\n\n", "-", "*", "**", "#",
            "## ", "# ", "1. ", "2.", ":", "x:", ">", "> ", "`", "` ", "- ", "* ",
        ]);
        prop::collection::vec(pieces, 0..40).prop_map(|parts| parts.concat())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2048))]

        #[test]
        fn normalize_is_idempotent_for_markdownish_text(text in markdownish()) {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_for_ascii_text(text in "[a-z #*>`:.0-9\\n\\t-]{0,60}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn normalize_is_pure() {
        let input = "Intro# A\n* b";
        assert_eq!(normalize(input), normalize(input));
    }
}
