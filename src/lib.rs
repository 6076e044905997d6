//! Convert a practical subset of TikZ to standalone SVG.
//!
//! The pipeline runs comment stripping, macro expansion, parsing and
//! rendering, in that order. Each `tikzpicture` environment in the input
//! becomes one SVG document.

use pest_derive::Parser;

pub mod ast;
pub mod config;
pub mod errors;
pub mod eval;
pub mod log;
pub mod loops;
pub mod macros;
pub mod parse;
pub mod preprocess;
pub mod render;
pub mod types;

pub use config::RenderConfig;

#[cfg(feature = "tracing")]
use crate::log::debug;

#[derive(Parser)]
#[grammar = "tikz.pest"]
pub struct TikzParser;

/// Convert TikZ source to SVG with the default canvas.
///
/// When the source holds several pictures only the first is returned; see
/// [`convert_document`] for all of them.
pub fn convert(source: &str) -> Result<String, miette::Report> {
    convert_with_config(source, &RenderConfig::default())
}

/// Convert TikZ source to SVG with explicit canvas settings.
pub fn convert_with_config(source: &str, config: &RenderConfig) -> Result<String, miette::Report> {
    convert_document(source, config)?
        .into_iter()
        .next()
        .ok_or_else(|| miette::miette!("no tikzpicture found"))
}

/// Convert every picture in `source`, in document order.
///
/// Macros defined anywhere in the document are visible to every picture
/// that follows the definition.
pub fn convert_document(source: &str, config: &RenderConfig) -> Result<Vec<String>, miette::Report> {
    let cleaned = preprocess::strip_comments(source);
    let expanded = macros::MacroExpander::new().expand(&cleaned)?;
    let pictures = preprocess::extract_pictures(&expanded);
    debug!(pictures = pictures.len(), "extracted pictures");

    pictures
        .into_iter()
        .enumerate()
        .map(|(index, body)| {
            let picture = parse::parse_named(&format!("picture {}", index + 1), body)?;
            render::render(&picture, config)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pest::Parser;

    #[test]
    fn parse_simple_draw() {
        let input = r"\draw (0,0) -- (1,1);";
        let result = TikzParser::parse(Rule::picture, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_environment() {
        let input = r"\begin{tikzpicture}[scale=2]
            \draw[thick, ->] (0,0) -- (1,0);
        \end{tikzpicture}";
        let result = TikzParser::parse(Rule::picture, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_node_with_anchor_reference() {
        let input = r"\node[draw] (a) at (0,0) {A}; \draw (a.north east) -- ++(1,1);";
        let result = TikzParser::parse(Rule::picture, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_nested_foreach() {
        let input = r"
            \foreach \x in {0,...,3} {
                \foreach \y [evaluate=\y as \z using \y*2] in {0,1} {
                    \fill (\x,\z) circle (2pt);
                }
            }";
        let result = TikzParser::parse(Rule::picture, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_curves_and_arcs() {
        let input = r"\draw (0,0) .. controls (1,1) and (2,1) .. (3,0) arc (0:180:1) -- cycle;";
        let result = TikzParser::parse(Rule::picture, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_layers() {
        let input = r"
            \pgfdeclarelayer{background}
            \pgfsetlayers{background,main}
            \begin{pgfonlayer}{background}
                \fill[gray!20] (0,0) rectangle (2,2);
            \end{pgfonlayer}";
        let result = TikzParser::parse(Rule::picture, input);
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    }

    #[test]
    fn parse_tree_names_the_statement() {
        let pairs = TikzParser::parse(Rule::picture, r"\draw (0,0) -- (1,0);").unwrap();
        let tree = pest_ascii_tree::into_ascii_tree(pairs).unwrap();
        assert!(tree.contains("draw_stmt"), "{tree}");
        assert!(tree.contains("line_to"), "{tree}");
    }

    #[test]
    fn rejects_unterminated_statement() {
        let result = TikzParser::parse(Rule::picture, r"\draw (0,0) -- (1,1)");
        assert!(result.is_err());
    }

    #[test]
    fn convert_expands_macros_before_parsing() {
        let svg = convert(r"\def\len{2} \draw (0,0) -- (\len,\len);").unwrap();
        assert!(svg.contains("d=\"M 250.00 250.00 L 306.70 193.30\""), "{svg}");
    }

    #[test]
    fn convert_document_yields_one_svg_per_picture() {
        let source = r"
            \newcommand{\side}{1}
            \begin{tikzpicture} \draw (0,0) -- (\side,0); \end{tikzpicture}
            Some prose in between.
            \begin{tikzpicture} \draw (0,0) circle (\side); \end{tikzpicture}";
        let svgs = convert_document(source, &RenderConfig::default()).unwrap();
        assert_eq!(svgs.len(), 2);
        assert!(svgs[1].contains(" A "), "{}", svgs[1]);
    }

    #[test]
    fn conversions_do_not_share_state() {
        convert(r"\coordinate (A) at (1,1);").unwrap();
        let svg = convert(r"\draw (0,0) -- (A);").unwrap();
        assert!(svg.contains("L 250.00 250.00"), "{svg}");
    }

    #[test]
    fn invalid_canvas_is_reported() {
        let config = RenderConfig::new().with_size(0, 100);
        assert!(convert_with_config(r"\draw (0,0) -- (1,1);", &config).is_err());
    }
}
