//! Textual macro expansion
//!
//! Handles `\def`, `\newcommand`, `\renewcommand` and `\providecommand`
//! definitions and their invocations. Expansion runs before parsing, on an
//! explicit work-list of frames, so recursion depth is a counter rather than
//! the call stack.
//!
//! Loop variables bound by `\foreach` are left alone inside their loop,
//! even when a macro of the same name is defined.

use std::collections::HashMap;

use crate::errors::ExpandError;
use crate::log::{debug, trace};

pub const MAX_EXPANSION_DEPTH: usize = 20;

/// Control words the parser owns. They pass through even if a macro of the
/// same name is defined.
const STRUCTURAL: &[&str] = &[
    "begin",
    "end",
    "draw",
    "fill",
    "filldraw",
    "clip",
    "path",
    "node",
    "coordinate",
    "foreach",
    "tikzset",
    "pgfmathsetmacro",
    "pgfmathtruncatemacro",
    "pgfdeclarelayer",
    "pgfsetlayers",
    "def",
    "newcommand",
    "renewcommand",
    "providecommand",
];

/// A user-defined macro
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDefinition {
    /// Number of `{...}` argument groups
    pub params: usize,
    /// Body with `#1`..`#9` placeholders
    pub body: String,
}

/// Text being scanned, and how deep in expansion it was produced
struct Frame {
    text: String,
    pos: usize,
    depth: usize,
}

/// Names bound by a loop, covering `frame` text up to `end` and every
/// frame expanded from inside that range
struct Shield {
    names: Vec<String>,
    frame: usize,
    end: usize,
}

impl Shield {
    fn covers(&self, name: &str, top: usize, pos: usize) -> bool {
        (self.frame < top || pos < self.end) && self.names.iter().any(|n| n == name)
    }
}

#[derive(Debug, Default)]
pub struct MacroExpander {
    macros: HashMap<String, MacroDefinition>,
}

impl MacroExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, params: usize, body: impl Into<String>) {
        self.macros.insert(
            name.into(),
            MacroDefinition {
                params,
                body: body.into(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    /// Consume definitions in `source` and expand every invocation.
    ///
    /// Definitions are removed from the output. A definition only affects
    /// text after it.
    pub fn expand(&mut self, source: &str) -> Result<String, ExpandError> {
        let mut out = String::with_capacity(source.len());
        let mut stack = vec![Frame {
            text: source.to_string(),
            pos: 0,
            depth: 0,
        }];
        let mut shields: Vec<Shield> = Vec::new();

        while let Some(top) = stack.len().checked_sub(1) {
            shields.retain(|s| stack.get(s.frame).is_some_and(|f| f.pos < s.end));
            let frame = &mut stack[top];
            let rest = &frame.text[frame.pos..];
            let Some(offset) = rest.find('\\') else {
                out.push_str(rest);
                stack.pop();
                continue;
            };
            out.push_str(&rest[..offset]);
            let inline_loop = ends_with_word(&rest[..offset], "foreach");
            frame.pos += offset;
            if inline_loop {
                // inline loop on a path
                if let Some((names, end)) = loop_extent(&frame.text, frame.pos) {
                    trace!(?names, "inline loop variables");
                    shields.push(Shield { names, frame: top, end });
                }
            }

            let start = frame.pos;
            let word = control_word(&frame.text[start + 1..]);
            if word.is_empty() {
                // control symbol: copy `\` and the following character
                let len = frame.text[start + 1..].chars().next().map_or(0, char::len_utf8);
                out.push_str(&frame.text[start..start + 1 + len]);
                frame.pos = start + 1 + len;
                continue;
            }
            let word = word.to_string();
            let after = start + 1 + word.len();

            match word.as_str() {
                "def" => {
                    frame.pos = self.read_def(&frame.text, after)?;
                }
                "newcommand" | "renewcommand" | "providecommand" => {
                    frame.pos = self.read_newcommand(&word, &frame.text, after)?;
                }
                "foreach" => {
                    if let Some((names, end)) = loop_extent(&frame.text, after) {
                        trace!(?names, "loop variables");
                        shields.push(Shield { names, frame: top, end });
                    }
                    out.push_str("\\foreach");
                    frame.pos = after;
                }
                _ => {
                    let shielded = shields.iter().any(|s| s.covers(&word, top, start));
                    let definition = match self.macros.get(&word) {
                        Some(def) if !shielded && !STRUCTURAL.contains(&word.as_str()) => def.clone(),
                        _ => {
                            out.push('\\');
                            out.push_str(&word);
                            frame.pos = after;
                            continue;
                        }
                    };

                    let depth = frame.depth + 1;
                    if depth > MAX_EXPANSION_DEPTH {
                        return Err(ExpandError::ExpansionTooDeep {
                            name: word,
                            max: MAX_EXPANSION_DEPTH,
                        });
                    }

                    let mut args = Vec::with_capacity(definition.params);
                    let mut pos = after;
                    while args.len() < definition.params {
                        match read_group(&frame.text, pos)? {
                            Some((arg, end)) => {
                                args.push(arg);
                                pos = end;
                            }
                            None => {
                                return Err(ExpandError::MissingArgument {
                                    name: word,
                                    expected: definition.params,
                                    found: args.len(),
                                });
                            }
                        }
                    }
                    frame.pos = pos;

                    trace!(name = %word, depth, "expanding macro");
                    stack.push(Frame {
                        text: fill_placeholders(&definition.body, &args),
                        pos: 0,
                        depth,
                    });
                }
            }
        }

        debug!(macros = self.macros.len(), "macro expansion done");
        Ok(out)
    }

    /// `\def\name#1#2{body}`; returns the position after the body.
    fn read_def(&mut self, text: &str, pos: usize) -> Result<usize, ExpandError> {
        let malformed = || ExpandError::MalformedDefinition {
            command: "def".to_string(),
        };
        let pos = skip_whitespace(text, pos);
        let name = text[pos..]
            .strip_prefix('\\')
            .map(control_word)
            .filter(|n| !n.is_empty())
            .ok_or_else(malformed)?
            .to_string();
        let mut pos = pos + 1 + name.len();

        let mut params = 0;
        let bytes = text.as_bytes();
        while pos + 1 < bytes.len() && bytes[pos] == b'#' && bytes[pos + 1].is_ascii_digit() {
            params += 1;
            pos += 2;
        }

        let (body, end) = read_group(text, pos)?.ok_or_else(malformed)?;
        debug!(name = %name, params, "\\def");
        self.define(name, params, body);
        Ok(end)
    }

    /// `\newcommand{\name}[N]{body}` and `\newcommand\name{body}`, plus the
    /// `renew` and `provide` variants.
    fn read_newcommand(&mut self, command: &str, text: &str, pos: usize) -> Result<usize, ExpandError> {
        let malformed = || ExpandError::MalformedDefinition {
            command: command.to_string(),
        };
        let mut pos = skip_whitespace(text, pos);

        let name = if text[pos..].starts_with('{') {
            let (inner, end) = read_group(text, pos)?.ok_or_else(malformed)?;
            pos = end;
            inner.trim().strip_prefix('\\').ok_or_else(malformed)?.to_string()
        } else {
            let name = text[pos..]
                .strip_prefix('\\')
                .map(control_word)
                .ok_or_else(malformed)?
                .to_string();
            pos += 1 + name.len();
            name
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(malformed());
        }

        let mut params = 0;
        let after_name = skip_whitespace(text, pos);
        if text[after_name..].starts_with('[') {
            let close = text[after_name..].find(']').ok_or_else(malformed)?;
            params = text[after_name + 1..after_name + close]
                .trim()
                .parse::<usize>()
                .map_err(|_| malformed())?;
            pos = after_name + close + 1;
        }

        let (body, end) = read_group(text, pos)?.ok_or_else(malformed)?;
        if command == "providecommand" && self.macros.contains_key(&name) {
            return Ok(end);
        }
        debug!(name = %name, params, "\\{}", command);
        self.define(name, params, body);
        Ok(end)
    }
}

/// The run of ASCII letters at the start of `text`
fn control_word(text: &str) -> &str {
    let len = text
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    &text[..len]
}

/// Whether `text` ends with the whole word `word`, ignoring trailing
/// whitespace.
fn ends_with_word(text: &str, word: &str) -> bool {
    text.trim_end()
        .strip_suffix(word)
        .is_some_and(|before| !before.ends_with(|c: char| c.is_ascii_alphabetic() || c == '\\'))
}

/// Variables bound by the loop header at `pos` (just after `foreach`) and
/// the position where the loop body ends.
///
/// `None` if the header does not have the `\a/\b [options] in {list}` shape.
fn loop_extent(text: &str, pos: usize) -> Option<(Vec<String>, usize)> {
    let mut names = Vec::new();
    let mut pos = skip_whitespace(text, pos);
    loop {
        let name = control_word(text[pos..].strip_prefix('\\')?);
        if name.is_empty() {
            return None;
        }
        names.push(name.to_string());
        pos = skip_whitespace(text, pos + 1 + name.len());
        match text[pos..].strip_prefix('/') {
            Some(_) => pos = skip_whitespace(text, pos + 1),
            None => break,
        }
    }

    if text[pos..].starts_with('[') {
        let close = pos + text[pos..].find(']')?;
        names.extend(bound_in_options(&text[pos + 1..close]));
        pos = skip_whitespace(text, close + 1);
    }

    if !text[pos..].starts_with("in") {
        return None;
    }
    let (_, after_list) = read_group(text, pos + 2).ok()??;
    let body = skip_whitespace(text, after_list);

    let end = if text[body..].starts_with('{') {
        read_group(text, body).ok()??.1
    } else if text[body..].starts_with("\\foreach") {
        loop_extent(text, body + "\\foreach".len())?.1
    } else {
        statement_end(text, body)
    };
    Some((names, end))
}

/// Names introduced by `evaluate=\x as \y` and `count=\c` options
fn bound_in_options(options: &str) -> Vec<String> {
    let mut names = Vec::new();
    for (i, _) in options.match_indices('\\') {
        let before = options[..i].trim_end();
        let binds = match before.strip_suffix('=') {
            Some(key) => key.trim_end().ends_with("count"),
            None => ends_with_word(&options[..i], "as"),
        };
        let name = control_word(&options[i + 1..]);
        if binds && !name.is_empty() {
            names.push(name.to_string());
        }
    }
    names
}

/// Position after the first `;` outside braces, or the end of `text`.
fn statement_end(text: &str, pos: usize) -> usize {
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text[pos..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return pos + i + 1,
            _ => {}
        }
    }
    text.len()
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    pos + (rest.len() - rest.trim_start().len())
}

/// Read a balanced `{...}` group after optional whitespace.
///
/// Returns the inner text and the position after the closing brace, or
/// `None` if the next character does not open a group.
fn read_group(text: &str, pos: usize) -> Result<Option<(String, usize)>, ExpandError> {
    let open = skip_whitespace(text, pos);
    if !text[open..].starts_with('{') {
        return Ok(None);
    }
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let inner = text[open + 1..open + i].to_string();
                    return Ok(Some((inner, open + i + 1)));
                }
            }
            _ => {}
        }
    }
    Err(ExpandError::UnbalancedGroup { offset: open })
}

/// Replace `#1`..`#9` with arguments and `##` with `#`.
fn fill_placeholders(body: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('#') => {
                chars.next();
                out.push('#');
            }
            Some(d @ '1'..='9') => {
                chars.next();
                let index = d as usize - '1' as usize;
                if let Some(arg) = args.get(index) {
                    out.push_str(arg);
                }
            }
            _ => out.push('#'),
        }
    }
    out
}
