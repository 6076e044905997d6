//! End-to-end behaviour of the public conversion API.

use regex_lite::Regex;
use tikzsvg::errors::ExpandError;
use tikzsvg::macros::{MAX_EXPANSION_DEPTH, MacroExpander};
use tikzsvg::{RenderConfig, convert, convert_with_config};

/// The `d` attribute of every `<path>`, in document order.
fn path_data(svg: &str) -> Vec<String> {
    let re = Regex::new(r#"<path[^>]* d="([^"]*)""#).unwrap();
    re.captures_iter(svg).map(|c| c[1].to_string()).collect()
}

/// Endpoint of a two-point path `M x y L x y`.
fn line_end(d: &str) -> (f64, f64) {
    let nums: Vec<f64> = d
        .split_whitespace()
        .filter_map(|t| t.parse().ok())
        .collect();
    (nums[2], nums[3])
}

/// Like `assert_eq!` on path data, with an inline diff on failure.
fn assert_paths(actual: &[String], expected: &[&str]) {
    let actual = actual.join("\n");
    let expected = expected.join("\n");
    if actual != expected {
        let mut diff = String::new();
        for chunk in dissimilar::diff(&expected, &actual) {
            match chunk {
                dissimilar::Chunk::Equal(s) => diff.push_str(s),
                dissimilar::Chunk::Delete(s) => diff.push_str(&format!("[-{s}-]")),
                dissimilar::Chunk::Insert(s) => diff.push_str(&format!("{{+{s}+}}")),
            }
        }
        panic!("path data mismatch:\n{diff}");
    }
}

fn paths_of(source: &str) -> Vec<String> {
    path_data(&convert(source).unwrap())
}

// =============================================================================
// Coordinate transform
// =============================================================================

#[test]
fn default_canvas_maps_user_space() {
    assert_paths(
        &paths_of(r"\draw (0,0) -- (2,2); \draw (0,0) -- (4,0);"),
        &["M 250.00 250.00 L 306.70 193.30", "M 250.00 250.00 L 363.40 250.00"],
    );
}

#[test]
fn config_changes_origin_and_scale() {
    let config = RenderConfig::new().with_size(200, 100).with_scale(10.0);
    let svg = convert_with_config(r"\draw (0,0) -- (1,1);", &config).unwrap();
    assert_paths(&path_data(&svg), &["M 100.00 50.00 L 110.00 40.00"]);
    assert!(svg.contains(r#"viewBox="0 0 200 100""#), "{svg}");
}

#[test]
fn non_finite_scale_is_rejected() {
    let config = RenderConfig::new().with_scale(f64::NAN);
    assert!(convert_with_config(r"\draw (0,0) -- (1,1);", &config).is_err());
}

// =============================================================================
// Macros
// =============================================================================

#[test]
fn def_applies_to_later_text_only() {
    let out = MacroExpander::new()
        .expand(r"\def\c{1}(\c,0) \def\c{2}(\c,0)")
        .unwrap();
    assert_eq!(out, "(1,0) (2,0)");
}

#[test]
fn newcommand_arguments() {
    let out = MacroExpander::new()
        .expand(r"\newcommand{\f}[2]{A=#1 B=#2}\f{1}{2}")
        .unwrap();
    assert_eq!(out, "A=1 B=2");
}

#[test]
fn mutual_recursion_is_bounded() {
    let err = convert(r"\def\a{\b}\def\b{\a}\draw (0,0) -- (\a,0);").unwrap_err();
    let err = err
        .downcast_ref::<ExpandError>()
        .expect("expansion error");
    assert!(
        matches!(err, ExpandError::ExpansionTooDeep { max, .. } if *max == MAX_EXPANSION_DEPTH),
        "{err:?}"
    );
}

#[test]
fn macros_feed_coordinates() {
    assert_paths(
        &paths_of(r"\newcommand{\side}{2} \draw (0,0) -- (\side,\side);"),
        &["M 250.00 250.00 L 306.70 193.30"],
    );
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn ellipsis_range_counts_up() {
    let paths = paths_of(r"\foreach \x in {0,...,4} \draw (0,0) -- (\x,0);");
    let xs: Vec<f64> = paths.iter().map(|d| line_end(d).0).collect();
    assert_eq!(xs, vec![250.0, 278.35, 306.7, 335.05, 363.4]);
}

#[test]
fn ellipsis_range_with_step() {
    let paths = paths_of(r"\foreach \x in {0,2,...,8} \draw (0,0) -- (\x,0);");
    assert_eq!(paths.len(), 5);
    let last = line_end(&paths[4]);
    assert!((last.0 - (250.0 + 8.0 * 28.35)).abs() < 0.01, "{last:?}");
}

#[test]
fn evaluate_clause_binds_derived_values() {
    assert_paths(
        &paths_of(r"\foreach \i [evaluate=\i as \j using \i*2] in {0,1,2} \draw (0,0) -- (\i,\j);"),
        &[
            "M 250.00 250.00 L 250.00 250.00",
            "M 250.00 250.00 L 278.35 193.30",
            "M 250.00 250.00 L 306.70 136.60",
        ],
    );
}

#[test]
fn inner_loop_shadows_without_clobbering() {
    assert_paths(
        &paths_of(
            r"\foreach \x in {1} {
                \foreach \x in {3} { \draw (0,0) -- (\x,0); }
                \draw (0,0) -- (\x,0);
              }",
        ),
        &["M 250.00 250.00 L 335.05 250.00", "M 250.00 250.00 L 278.35 250.00"],
    );
}

#[test]
fn loop_variable_wins_over_macro_of_same_name() {
    assert_paths(
        &paths_of(r"\def\x{1} \foreach \x in {0,2} {\draw (\x,0) -- (\x,1);} \draw (0,0) -- (\x,0);"),
        &[
            "M 250.00 250.00 L 250.00 221.65",
            "M 306.70 250.00 L 306.70 221.65",
            "M 250.00 250.00 L 278.35 250.00",
        ],
    );
}

#[test]
fn large_loops_are_not_capped() {
    let paths = paths_of(r"\foreach \i in {1,...,2000} \draw (0,0) -- (\i,0);");
    assert_eq!(paths.len(), 2000);
}

// =============================================================================
// Named coordinates and path shapes
// =============================================================================

#[test]
fn named_coordinate_matches_literal() {
    let named = paths_of(r"\coordinate (A) at (1,1); \draw (0,0) -- (A);");
    let literal = paths_of(r"\draw (0,0) -- (1,1);");
    assert_eq!(named, literal);
}

#[test]
fn undefined_name_falls_back_to_origin() {
    assert_paths(
        &paths_of(r"\draw (2,0) -- (nowhere);"),
        &["M 306.70 250.00 L 250.00 250.00"],
    );
}

#[test]
fn single_control_point_gives_quadratic() {
    let paths = paths_of(r"\draw (0,0) .. controls (1,0) .. (2,0);");
    assert_paths(&paths, &["M 250.00 250.00 Q 278.35 250.00 306.70 250.00"]);
    assert_eq!(paths[0].matches('Q').count(), 1);
}

#[test]
fn circle_is_two_arcs() {
    let paths = paths_of(r"\draw (1,1) circle (1);");
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].matches('A').count(), 2, "{}", paths[0]);
}

// =============================================================================
// Style inheritance
// =============================================================================

#[test]
fn scope_color_inherits_and_statement_overrides() {
    let svg = convert(
        r"\begin{scope}[color=red]
            \draw (0,0) -- (1,0);
            \draw[color=blue] (0,0) -- (0,1);
          \end{scope}
          \draw (0,0) -- (1,1);",
    )
    .unwrap();
    let strokes: Vec<&str> = Regex::new(r#"<path[^>]* stroke="([^"]*)""#)
        .unwrap()
        .captures_iter(&svg)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .collect();
    assert_eq!(strokes, vec!["#FF0000", "#0000FF", "#000000"], "{svg}");
}

#[test]
fn no_current_position_is_fatal() {
    assert!(convert(r"\draw ++(1,0) -- (2,0);").is_err());
}
