//! Source cleanup before macro expansion and parsing

const BEGIN: &str = "\\begin{tikzpicture}";
const END: &str = "\\end{tikzpicture}";

/// Remove `%` comments up to the end of the line. `\%` is kept.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let mut escaped = false;
        let mut cut = None;
        for (pos, c) in line.char_indices() {
            match c {
                '\\' => escaped = !escaped,
                '%' if !escaped => {
                    cut = Some(pos);
                    break;
                }
                _ => escaped = false,
            }
        }
        match cut {
            Some(pos) => {
                out.push_str(&line[..pos]);
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    out
}

/// Every `tikzpicture` environment in `source`, in order. A source without
/// one is treated as a single bare picture body.
pub fn extract_pictures(source: &str) -> Vec<&str> {
    let mut pictures = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find(BEGIN) {
        let Some(len) = rest[start..].find(END) else {
            break;
        };
        let end = start + len + END.len();
        pictures.push(&rest[start..end]);
        rest = &rest[end..];
    }
    if pictures.is_empty() {
        pictures.push(source);
    }
    pictures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_stripped_per_line() {
        let src = "\\draw (0,0) -- (1,1); % diagonal\n% whole line\n\\node at (0,0) {50\\%};";
        assert_eq!(
            strip_comments(src),
            "\\draw (0,0) -- (1,1); \n\n\\node at (0,0) {50\\%};"
        );
    }

    #[test]
    fn escaped_backslash_before_percent_starts_a_comment() {
        assert_eq!(strip_comments("a\\\\% gone"), "a\\\\");
    }

    #[test]
    fn pictures_are_extracted_in_order() {
        let src = "\\documentclass{article}\n\\begin{tikzpicture}A\\end{tikzpicture}\ntext\n\\begin{tikzpicture}[scale=2]B\\end{tikzpicture}";
        let pics = extract_pictures(src);
        assert_eq!(pics.len(), 2);
        assert!(pics[0].contains('A'));
        assert!(pics[1].starts_with("\\begin{tikzpicture}[scale=2]"));
    }

    #[test]
    fn bare_body_is_one_picture() {
        let src = "\\draw (0,0) -- (1,0);";
        assert_eq!(extract_pictures(src), vec![src]);
    }
}
