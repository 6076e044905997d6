//! Snapshot tests over `tests/fixtures/*.tikz`.
//!
//! Each fixture is converted with the default canvas. The SVG is sanity
//! checked, then reduced to one line per painted element and compared with
//! the stored snapshot.

use datatest_stable::Utf8Path;
use regex_lite::Regex;
use tikzsvg::{RenderConfig, convert_document};

/// Structural checks that hold for every document we emit.
fn check_structure(svg: &str) -> Result<(), String> {
    let root = Regex::new(r#"^<svg[^>]* viewBox="0 0 \d+ \d+""#).unwrap();
    if !root.is_match(svg.trim_start()) {
        return Err("document does not start with an <svg> root carrying a viewBox".into());
    }
    if !svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#) {
        return Err("missing SVG namespace".into());
    }
    if !svg.trim_end().ends_with("</svg>") {
        return Err("document is not closed".into());
    }
    let data = Regex::new(r#" d="([^"]*)""#).unwrap();
    let valid = Regex::new(r"^[MLQCAZ0-9. -]*$").unwrap();
    for caps in data.captures_iter(svg) {
        if !valid.is_match(&caps[1]) {
            return Err(format!("unexpected path data: {}", &caps[1]));
        }
    }
    Ok(())
}

/// One line per `<path>` and `<text>` outside `<defs>`, in paint order.
fn summarize(svg: &str) -> Vec<String> {
    let defs = Regex::new(r"(?s)<defs>.*?</defs>").unwrap();
    let body = defs.replace_all(svg, "");
    let element = Regex::new(r"(?s)<path([^>]*)>|<text[^>]*>(.*?)</text>").unwrap();
    let attr = Regex::new(r#"([a-z-]+)="([^"]*)""#).unwrap();

    element
        .captures_iter(&body)
        .map(|caps| {
            if let Some(attrs) = caps.get(1) {
                let get = |name: &str| {
                    attr.captures_iter(attrs.as_str())
                        .find(|a| &a[1] == name)
                        .map(|a| a[2].to_string())
                        .unwrap_or_default()
                };
                format!("path fill={} stroke={} d={}", get("fill"), get("stroke"), get("d"))
            } else {
                let text = caps.get(2).map_or("", |m| m.as_str());
                format!("text {}", text.trim())
            }
        })
        .collect()
}

/// Print an inline diff between two renderings of the same fixture
fn inline_diff(expected: &str, actual: &str) -> String {
    use dissimilar::Chunk;

    let mut out = String::new();
    for chunk in dissimilar::diff(expected, actual) {
        match chunk {
            Chunk::Equal(s) => out.push_str(s),
            Chunk::Delete(s) => out.push_str(&format!("\x1b[31m{s}\x1b[0m")),
            Chunk::Insert(s) => out.push_str(&format!("\x1b[32m{s}\x1b[0m")),
        }
    }
    out
}

fn test_fixture(path: &Utf8Path) -> datatest_stable::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let svgs = convert_document(&source, &RenderConfig::default())
        .map_err(|e| format!("{path}: {e:?}"))?;

    let mut lines = Vec::new();
    for (index, svg) in svgs.iter().enumerate() {
        check_structure(svg).map_err(|e| format!("{path}: {e}\n{svg}"))?;
        if svgs.len() > 1 {
            lines.push(format!("# picture {}", index + 1));
        }
        lines.extend(summarize(svg));
    }

    // output must not depend on anything but the input
    let again = convert_document(&source, &RenderConfig::default())
        .map_err(|e| format!("{path}: {e:?}"))?;
    if again != svgs {
        return Err(format!(
            "{path}: second conversion differs:\n{}",
            inline_diff(&svgs.join("\n"), &again.join("\n"))
        )
        .into());
    }

    let name = path.file_stem().unwrap_or("fixture");
    let summary = lines.join("\n");
    insta::assert_snapshot!(name, summary);
    Ok(())
}

datatest_stable::harness! {
    { test = test_fixture, root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"), pattern = r"\.tikz$" },
}
