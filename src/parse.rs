//! Parse pest pairs into AST nodes

use miette::SourceSpan;
use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;

use crate::ast::*;
use crate::errors::{EvalError, ParseError, SourceContext};
use crate::log::debug;
use crate::types::Unit;
use crate::{Rule, TikzParser};

/// Parse picture source into an AST
pub fn parse(source: &str) -> Result<Picture, miette::Report> {
    parse_named("<input>", source)
}

/// Parse picture source, naming it in diagnostics
pub fn parse_named(name: &str, source: &str) -> Result<Picture, miette::Report> {
    let pairs = TikzParser::parse(Rule::picture, source)
        .map_err(|e| syntax_error(&SourceContext::new(name, source), e))?;

    let mut picture = Picture::default();
    for pair in pairs {
        if pair.as_rule() != Rule::picture {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::begin_picture => {
                    if let Some(options) = inner.into_inner().next() {
                        picture.options = parse_options(options)?;
                    }
                }
                Rule::statement_list => picture.statements = parse_statement_list(inner)?,
                _ => {}
            }
        }
    }

    debug!(statements = picture.statements.len(), "parsed picture");
    Ok(picture)
}

fn syntax_error(ctx: &SourceContext, err: pest::error::Error<Rule>) -> ParseError {
    let span: SourceSpan = match err.location {
        InputLocation::Pos(pos) => (pos, 0).into(),
        InputLocation::Span((start, end)) => (start, end.saturating_sub(start)).into(),
    };
    ParseError::Syntax {
        message: err.variant.message().into_owned(),
        src: ctx.named_source(),
        span,
    }
}

fn expect<'i>(pair: Option<Pair<'i, Rule>>, what: &str) -> Result<Pair<'i, Rule>, miette::Report> {
    pair.ok_or_else(|| miette::miette!("Missing {} in parse tree", what))
}

fn parse_statement_list(pair: Pair<Rule>) -> Result<Vec<Statement>, miette::Report> {
    let mut statements = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::statement {
            parse_statement(inner, &mut statements)?;
        }
    }
    Ok(statements)
}

fn parse_statement(pair: Pair<Rule>, out: &mut Vec<Statement>) -> Result<(), miette::Report> {
    let inner = expect(pair.into_inner().next(), "statement body")?;
    match inner.as_rule() {
        Rule::draw_stmt => out.push(Statement::Draw(parse_draw(inner)?)),
        Rule::node_stmt => out.push(Statement::Node(parse_node(inner)?)),
        Rule::coordinate_stmt => out.push(Statement::Coordinate(parse_coordinate_stmt(inner)?)),
        Rule::scope_block => out.push(Statement::Scope(parse_scope(inner)?)),
        Rule::layer_block => out.push(Statement::LayerBlock(parse_layer_block(inner)?)),
        Rule::foreach_stmt => out.push(Statement::Foreach(parse_foreach(inner)?)),
        Rule::layer_decl => {
            let name = expect(inner.into_inner().next(), "layer name")?;
            out.push(Statement::LayerDeclaration(name.as_str().to_string()));
        }
        Rule::layer_order => {
            let names = inner.into_inner().map(|p| p.as_str().to_string()).collect();
            out.push(Statement::LayerOrder(names));
        }
        Rule::style_def => {
            if let Some(list) = inner.into_inner().next() {
                let options = parse_option_list(list)?;
                out.extend(style_definitions(&options)?.into_iter().map(Statement::StyleDefinition));
            }
        }
        Rule::setmacro_stmt => out.push(Statement::Variable(parse_setmacro(inner)?)),
        Rule::empty_stmt => {}
        _ => {
            return Err(miette::miette!(
                "Unexpected rule in statement: {:?}",
                inner.as_rule()
            ));
        }
    }
    Ok(())
}

fn parse_draw(pair: Pair<Rule>) -> Result<DrawStatement, miette::Report> {
    let mut command = Command::Draw;
    let mut options = Options::default();
    let mut path = Path::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::draw_cmd => command = parse_command(inner.as_str())?,
            Rule::options => options = parse_options(inner)?,
            Rule::path => path = parse_path(inner)?,
            _ => {}
        }
    }
    Ok(DrawStatement {
        command,
        options,
        path,
    })
}

fn parse_command(s: &str) -> Result<Command, miette::Report> {
    match s {
        "\\draw" => Ok(Command::Draw),
        "\\fill" => Ok(Command::Fill),
        "\\filldraw" => Ok(Command::FillDraw),
        "\\clip" => Ok(Command::Clip),
        "\\path" => Ok(Command::Path),
        _ => Err(miette::miette!("Invalid drawing command: {}", s)),
    }
}

/// Shared by `\node` statements and inline `node` path operations
fn parse_node(pair: Pair<Rule>) -> Result<Node, miette::Report> {
    let mut node = Node::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::options => node.options.0.extend(parse_options(inner)?.0),
            Rule::node_name => node.name = Some(parse_node_name(inner)?),
            Rule::node_at => {
                let coord = expect(inner.into_inner().next(), "node position")?;
                node.position = Some(parse_coordinate(coord)?);
            }
            Rule::node_text => {
                node.text = inner
                    .into_inner()
                    .next()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default();
            }
            _ => {}
        }
    }
    Ok(node)
}

fn parse_node_name(pair: Pair<Rule>) -> Result<String, miette::Report> {
    let name = expect(pair.into_inner().next(), "node name")?;
    Ok(name.as_str().trim().to_string())
}

fn parse_coordinate_stmt(pair: Pair<Rule>) -> Result<CoordinateDefinition, miette::Report> {
    let mut name = None;
    let mut position = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::node_name => name = Some(parse_node_name(inner)?),
            Rule::coordinate => position = Some(parse_coordinate(inner)?),
            _ => {}
        }
    }
    Ok(CoordinateDefinition {
        name: name.ok_or_else(|| miette::miette!("\\coordinate without a name"))?,
        position: position.ok_or_else(|| miette::miette!("\\coordinate without a position"))?,
    })
}

fn parse_scope(pair: Pair<Rule>) -> Result<Scope, miette::Report> {
    let mut options = Options::default();
    let mut body = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::begin_scope => {
                if let Some(opts) = inner.into_inner().next() {
                    options = parse_options(opts)?;
                }
            }
            Rule::statement_list => body = parse_statement_list(inner)?,
            _ => {}
        }
    }
    Ok(Scope { options, body })
}

fn parse_layer_block(pair: Pair<Rule>) -> Result<LayerBlock, miette::Report> {
    let mut name = String::new();
    let mut body = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::layer_name => name = inner.as_str().to_string(),
            Rule::statement_list => body = parse_statement_list(inner)?,
            _ => {}
        }
    }
    Ok(LayerBlock { name, body })
}

fn parse_setmacro(pair: Pair<Rule>) -> Result<VariableDefinition, miette::Report> {
    let mut truncate = false;
    let mut name = String::new();
    let mut expression = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::setmacro_cmd => truncate = inner.as_str() == "\\pgfmathtruncatemacro",
            Rule::var_name => name = variable_name(inner.as_str()),
            Rule::brace_text => expression = inner.as_str().trim().to_string(),
            _ => {}
        }
    }
    Ok(VariableDefinition {
        name,
        expression,
        truncate,
    })
}

fn variable_name(raw: &str) -> String {
    raw.trim().trim_start_matches('\\').to_string()
}

// ============================================================================
// Loops
// ============================================================================

fn parse_foreach(pair: Pair<Rule>) -> Result<ForeachLoop, miette::Report> {
    let mut header = ForeachHeader::default();
    let mut body = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::foreach_header => header = parse_foreach_header(inner)?,
            Rule::foreach_body => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::statement_list => body = parse_statement_list(part)?,
                        Rule::statement => parse_statement(part, &mut body)?,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(ForeachLoop { header, body })
}

fn parse_foreach_header(pair: Pair<Rule>) -> Result<ForeachHeader, miette::Report> {
    let mut header = ForeachHeader::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::foreach_vars => {
                header.variables = inner.into_inner().map(|v| variable_name(v.as_str())).collect();
            }
            Rule::foreach_options => {
                for clause in inner.into_inner() {
                    match clause.as_rule() {
                        Rule::evaluate_clause => {
                            let mut parts = clause.into_inner();
                            let source = variable_name(expect(parts.next(), "evaluate source")?.as_str());
                            let target = variable_name(expect(parts.next(), "evaluate target")?.as_str());
                            let expression = expect(parts.next(), "evaluate expression")?.as_str().trim().to_string();
                            header.evaluate.push(EvaluateClause {
                                source,
                                target,
                                expression,
                            });
                        }
                        Rule::count_clause => {
                            let mut parts = clause.into_inner();
                            let variable = variable_name(expect(parts.next(), "count variable")?.as_str());
                            let start = parts.next().map(|p| p.as_str().trim().to_string());
                            header.count = Some(CountClause { variable, start });
                        }
                        _ => {}
                    }
                }
            }
            Rule::foreach_list => {
                header.items = inner.into_inner().map(|i| i.as_str().trim().to_string()).collect();
            }
            _ => {}
        }
    }
    Ok(header)
}

// ============================================================================
// Paths
// ============================================================================

fn parse_path(pair: Pair<Rule>) -> Result<Path, miette::Report> {
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        items.push(parse_path_item(inner)?);
    }
    Ok(Path { items })
}

fn parse_path_item(pair: Pair<Rule>) -> Result<PathItem, miette::Report> {
    let rule = pair.as_rule();
    match rule {
        Rule::move_to => {
            let coord = expect(pair.into_inner().next(), "coordinate")?;
            Ok(PathItem::MoveTo(parse_coordinate(coord)?))
        }
        Rule::line_to | Rule::hv_to | Rule::vh_to | Rule::to_op => {
            let target = pair
                .into_inner()
                .filter(|p| p.as_rule() != Rule::options)
                .last();
            let target = parse_target(expect(target, "connector target")?)?;
            Ok(match rule {
                Rule::hv_to => PathItem::HorizontalVertical(target),
                Rule::vh_to => PathItem::VerticalHorizontal(target),
                _ => PathItem::LineTo(target),
            })
        }
        Rule::curve_to => {
            let mut parts: Vec<Pair<Rule>> = pair.into_inner().collect();
            let target = parse_target(expect(parts.pop(), "curve target")?)?;
            let controls = parts
                .into_iter()
                .map(parse_coordinate)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PathItem::CurveTo {
                controls,
                to: target,
            })
        }
        Rule::rect_to => {
            let coord = expect(pair.into_inner().next(), "rectangle corner")?;
            Ok(PathItem::Rectangle(parse_coordinate(coord)?))
        }
        Rule::grid_to => {
            let mut options = Options::default();
            let mut corner = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::options => options = parse_options(inner)?,
                    Rule::coordinate => corner = Some(parse_coordinate(inner)?),
                    _ => {}
                }
            }
            Ok(PathItem::Grid {
                options,
                corner: corner.ok_or_else(|| miette::miette!("grid without a corner"))?,
            })
        }
        Rule::circle_op => {
            let mut options = Options::default();
            let mut radius = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::options => options = parse_options(inner)?,
                    Rule::radius_spec => {
                        radius = inner.into_inner().next().map(|r| r.as_str().trim().to_string());
                    }
                    _ => {}
                }
            }
            Ok(PathItem::Circle { options, radius })
        }
        Rule::ellipse_op => {
            let mut options = Options::default();
            let mut radii = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::options => options = parse_options(inner)?,
                    Rule::ellipse_radii => {
                        let mut parts = inner.into_inner();
                        let rx = expect(parts.next(), "x radius")?.as_str().trim().to_string();
                        let ry = expect(parts.next(), "y radius")?.as_str().trim().to_string();
                        radii = Some((rx, ry));
                    }
                    _ => {}
                }
            }
            Ok(PathItem::Ellipse { options, radii })
        }
        Rule::arc_op => {
            let mut options = Options::default();
            let mut angles = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::options => options = parse_options(inner)?,
                    Rule::arc_spec => {
                        let mut parts = inner.into_inner().map(|p| p.as_str().trim().to_string());
                        let start = parts.next().unwrap_or_default();
                        let end = parts.next().unwrap_or_default();
                        let radius = parts.next().unwrap_or_default();
                        angles = Some((start, end, radius));
                    }
                    _ => {}
                }
            }
            Ok(PathItem::Arc(ArcSpec { options, angles }))
        }
        Rule::inline_node => Ok(PathItem::Node(parse_node(pair)?)),
        Rule::inline_coordinate => {
            let name = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::node_name)
                .map(parse_node_name)
                .transpose()?;
            Ok(PathItem::Coordinate(name.unwrap_or_default()))
        }
        Rule::inline_foreach => {
            let mut header = ForeachHeader::default();
            let mut items = Vec::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::foreach_header => header = parse_foreach_header(inner)?,
                    Rule::path => items = parse_path(inner)?.items,
                    _ => {}
                }
            }
            Ok(PathItem::Foreach { header, items })
        }
        _ => Err(miette::miette!("Unexpected rule in path: {:?}", rule)),
    }
}

fn parse_target(pair: Pair<Rule>) -> Result<Target, miette::Report> {
    match pair.as_rule() {
        Rule::cycle => Ok(Target::Cycle),
        Rule::coordinate => Ok(Target::Point(parse_coordinate(pair)?)),
        other => Err(miette::miette!("Unexpected connector target: {:?}", other)),
    }
}

fn parse_coordinate(pair: Pair<Rule>) -> Result<Coordinate, miette::Report> {
    let mut persistent = None;
    let mut coord = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::rel_prefix => persistent = Some(inner.as_str() == "++"),
            Rule::cartesian => {
                let mut parts = inner.into_inner();
                let x = expect(parts.next(), "x component")?.as_str().trim().to_string();
                let y = expect(parts.next(), "y component")?.as_str().trim().to_string();
                coord = Some(Coordinate::Cartesian { x, y });
            }
            Rule::polar => {
                let mut parts = inner.into_inner();
                let angle = expect(parts.next(), "angle")?.as_str().trim().to_string();
                let radius = expect(parts.next(), "radius")?.as_str().trim().to_string();
                coord = Some(Coordinate::Polar { angle, radius });
            }
            Rule::named => coord = Some(named_coordinate(inner.as_str())),
            _ => {}
        }
    }
    let coord = coord.ok_or_else(|| miette::miette!("Empty coordinate"))?;
    Ok(match persistent {
        Some(persistent) => Coordinate::Relative {
            delta: Box::new(coord),
            persistent,
        },
        None => coord,
    })
}

/// Split `name.anchor` at the first dot
pub fn named_coordinate(text: &str) -> Coordinate {
    let text = text.trim();
    match text.split_once('.') {
        Some((name, anchor)) if !name.is_empty() && !anchor.trim().is_empty() => Coordinate::Named {
            name: name.trim().to_string(),
            anchor: Some(anchor.trim().to_string()),
        },
        _ => Coordinate::Named {
            name: text.to_string(),
            anchor: None,
        },
    }
}

// ============================================================================
// Options
// ============================================================================

fn parse_options(pair: Pair<Rule>) -> Result<Options, miette::Report> {
    match pair.into_inner().next() {
        Some(list) => parse_option_list(list),
        None => Ok(Options::default()),
    }
}

fn parse_option_list(pair: Pair<Rule>) -> Result<Options, miette::Report> {
    let mut options = Vec::new();
    for option in pair.into_inner() {
        let mut parts = option.into_inner();
        let key = expect(parts.next(), "option key")?.as_str().trim().to_string();
        let value = parts.next().map(|v| strip_braces(v.as_str().trim()).to_string());
        options.push(RawOption { key, value });
    }
    Ok(Options(options))
}

/// Parse a bare option list such as the body of a `/.style={...}`
pub fn parse_option_text(text: &str) -> Result<Options, miette::Report> {
    let pairs = TikzParser::parse(Rule::option_input, text)
        .map_err(|e| syntax_error(&SourceContext::new("<options>", text), e))?;
    for pair in pairs {
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::option_list {
                return parse_option_list(inner);
            }
        }
    }
    Ok(Options::default())
}

/// Pull `name/.style={...}` entries out of an option list
pub fn style_definitions(options: &Options) -> Result<Vec<StyleDefinition>, miette::Report> {
    let mut styles = Vec::new();
    for option in options.iter() {
        let Some(name) = option.key.strip_suffix("/.style") else {
            debug!(key = %option.key, "ignoring non-style key in style list");
            continue;
        };
        let body = option.value.as_deref().unwrap_or("");
        styles.push(StyleDefinition {
            name: name.trim().to_string(),
            options: parse_option_text(body)?,
        });
    }
    Ok(styles)
}

/// Remove one level of enclosing braces when they wrap the whole value
pub fn strip_braces(text: &str) -> &str {
    let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return text;
    };
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return text;
                }
            }
            _ => {}
        }
    }
    if depth == 0 { inner.trim() } else { text }
}

// ============================================================================
// Expressions
// ============================================================================

/// Parse an arithmetic expression
pub fn parse_expression(text: &str) -> Result<Expr, EvalError> {
    let syntax = |message: String| EvalError::Syntax {
        expression: text.trim().to_string(),
        message,
    };
    let pairs = TikzParser::parse(Rule::expression, text)
        .map_err(|e| syntax(e.variant.message().into_owned()))?;
    let expr = pairs
        .flat_map(|p| p.into_inner())
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| syntax("empty expression".to_string()))?;
    build_expr(expr).map_err(syntax)
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::expr | Rule::term => {
            let mut inner = pair.into_inner();
            let mut lhs = build_expr(inner.next().ok_or("missing operand")?)?;
            while let Some(op) = inner.next() {
                let op = match op.as_str() {
                    "+" => BinaryOp::Add,
                    "-" => BinaryOp::Sub,
                    "*" => BinaryOp::Mul,
                    "/" => BinaryOp::Div,
                    other => return Err(format!("unknown operator {other}")),
                };
                let rhs = build_expr(inner.next().ok_or("missing right operand")?)?;
                lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
            }
            Ok(lhs)
        }
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = inner.next().ok_or("missing operand")?;
            if first.as_rule() == Rule::neg_op {
                let operand = build_expr(inner.next().ok_or("missing operand after `-`")?)?;
                Ok(Expr::Neg(Box::new(operand)))
            } else {
                build_expr(first)
            }
        }
        Rule::power => {
            let mut inner = pair.into_inner();
            let base = build_expr(inner.next().ok_or("missing base")?)?;
            match inner.next() {
                Some(exponent) => Ok(Expr::Binary(
                    Box::new(base),
                    BinaryOp::Pow,
                    Box::new(build_expr(exponent)?),
                )),
                None => Ok(base),
            }
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let value = build_expr(inner.next().ok_or("missing value")?)?;
            match inner.next() {
                Some(unit) => {
                    let unit = Unit::from_suffix(unit.as_str())
                        .ok_or_else(|| format!("unknown unit {}", unit.as_str()))?;
                    Ok(Expr::WithUnit(Box::new(value), unit))
                }
                None => Ok(value),
            }
        }
        Rule::number => pair
            .as_str()
            .parse::<f64>()
            .map(Expr::Number)
            .map_err(|e| format!("invalid number {}: {e}", pair.as_str())),
        Rule::constant => match pair.as_str() {
            "pi" => Ok(Expr::Constant(std::f64::consts::PI)),
            _ => Ok(Expr::Constant(std::f64::consts::E)),
        },
        Rule::variable => Ok(Expr::Variable(variable_name(pair.as_str()))),
        Rule::func_call => {
            let mut inner = pair.into_inner();
            let name = inner.next().ok_or("missing function name")?.as_str().to_string();
            let args = inner.map(build_expr).collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Call(name, args))
        }
        other => Err(format!("unexpected {other:?} in expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(src: &str) -> Vec<Statement> {
        parse(src).unwrap().statements
    }

    fn only_path(src: &str) -> Vec<PathItem> {
        match statements(src).into_iter().next() {
            Some(Statement::Draw(d)) => d.path.items,
            other => panic!("expected a draw statement, got {other:?}"),
        }
    }

    #[test]
    fn draw_with_options() {
        let stmts = statements(r"\draw[->, thick, color=red!50] (0,0) -- (1,2);");
        let Statement::Draw(draw) = &stmts[0] else {
            panic!("not a draw")
        };
        assert_eq!(draw.command, Command::Draw);
        assert_eq!(
            draw.options.0,
            vec![
                RawOption::flag("->"),
                RawOption::flag("thick"),
                RawOption::pair("color", "red!50"),
            ]
        );
        assert_eq!(draw.path.items.len(), 2);
    }

    #[test]
    fn picture_environment_options() {
        let pic = parse("\\begin{tikzpicture}[scale=2]\n\\draw (0,0) -- (1,1);\n\\end{tikzpicture}").unwrap();
        assert_eq!(pic.options.value("scale"), Some("2"));
        assert_eq!(pic.statements.len(), 1);
    }

    #[test]
    fn coordinate_variants() {
        let items = only_path(r"\draw (1cm, {2*\x}) -- (30:2) -- (A.north east) -- ++(1,0) -- +(0,1);");
        let coords: Vec<Coordinate> = items
            .into_iter()
            .map(|item| match item {
                PathItem::MoveTo(c) | PathItem::LineTo(Target::Point(c)) => c,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            coords[0],
            Coordinate::Cartesian {
                x: "1cm".into(),
                y: "{2*\\x}".into()
            }
        );
        assert_eq!(
            coords[1],
            Coordinate::Polar {
                angle: "30".into(),
                radius: "2".into()
            }
        );
        assert_eq!(
            coords[2],
            Coordinate::Named {
                name: "A".into(),
                anchor: Some("north east".into())
            }
        );
        assert!(matches!(&coords[3], Coordinate::Relative { persistent: true, .. }));
        assert!(matches!(&coords[4], Coordinate::Relative { persistent: false, .. }));
    }

    #[test]
    fn curve_with_one_and_two_controls() {
        let items = only_path(r"\draw (0,0) .. controls (1,0) .. (2,0) .. controls (3,1) and (4,1) .. (5,0);");
        let counts: Vec<usize> = items
            .iter()
            .filter_map(|i| match i {
                PathItem::CurveTo { controls, .. } => Some(controls.len()),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn shapes_and_cycle() {
        let items = only_path(
            r"\draw (0,0) circle (1cm) ellipse (2 and 1) arc (0:90:1) rectangle (2,2) grid[step=0.5] (3,3) -| (4,4) |- (5,5) -- cycle;",
        );
        assert!(matches!(&items[1], PathItem::Circle { radius: Some(r), .. } if r == "1cm"));
        assert!(matches!(&items[2], PathItem::Ellipse { radii: Some((a, b)), .. } if a == "2" && b == "1"));
        assert!(matches!(&items[3], PathItem::Arc(ArcSpec { angles: Some(_), .. })));
        assert!(matches!(&items[4], PathItem::Rectangle(_)));
        assert!(matches!(&items[5], PathItem::Grid { options, .. } if options.value("step") == Some("0.5")));
        assert!(matches!(&items[6], PathItem::HorizontalVertical(_)));
        assert!(matches!(&items[7], PathItem::VerticalHorizontal(_)));
        assert!(matches!(&items[8], PathItem::LineTo(Target::Cycle)));
    }

    #[test]
    fn node_parts_in_any_order() {
        let stmts = statements(r"\node at (1,1) [above, draw] (A) {$x^2$};");
        let Statement::Node(node) = &stmts[0] else {
            panic!("not a node")
        };
        assert_eq!(node.name.as_deref(), Some("A"));
        assert_eq!(node.text, "$x^2$");
        assert_eq!(node.options.0.len(), 2);
        assert!(node.position.is_some());
    }

    #[test]
    fn inline_node_and_coordinate() {
        let items = only_path(r"\draw (0,0) coordinate (O) -- (1,0) node[right] {end};");
        assert!(matches!(&items[1], PathItem::Coordinate(n) if n == "O"));
        assert!(matches!(&items[3], PathItem::Node(n) if n.text == "end"));
    }

    #[test]
    fn foreach_header_parts() {
        let stmts = statements(r"\foreach \x/\c [evaluate=\x as \y using \x*2, count=\n] in {1/red, 2/blue} \draw[\c] (\x,\y) circle (0.1);");
        let Statement::Foreach(lp) = &stmts[0] else {
            panic!("not a loop")
        };
        assert_eq!(lp.header.variables, vec!["x", "c"]);
        assert_eq!(lp.header.items, vec!["1/red", "2/blue"]);
        assert_eq!(lp.header.evaluate[0].target, "y");
        assert_eq!(lp.header.evaluate[0].expression, "\\x*2");
        assert_eq!(lp.header.count.as_ref().map(|c| c.variable.as_str()), Some("n"));
        assert_eq!(lp.body.len(), 1);
    }

    #[test]
    fn braced_foreach_body() {
        let stmts = statements(r"\foreach \i in {0,...,3} { \draw (\i,0) -- (\i,1); \fill (\i,0) circle (2pt); }");
        let Statement::Foreach(lp) = &stmts[0] else {
            panic!("not a loop")
        };
        assert_eq!(lp.header.items, vec!["0", "...", "3"]);
        assert_eq!(lp.body.len(), 2);
    }

    #[test]
    fn inline_foreach_in_path() {
        let items = only_path(r"\draw (0,0) foreach \i in {1,2,3} { -- (\i,\i) };");
        assert!(matches!(&items[1], PathItem::Foreach { items, .. } if items.len() == 1));
    }

    #[test]
    fn tikzset_styles() {
        let stmts = statements(r"\tikzset{help/.style={gray, very thin}, dot/.style={fill=black}}");
        assert_eq!(stmts.len(), 2);
        let Statement::StyleDefinition(style) = &stmts[0] else {
            panic!("not a style")
        };
        assert_eq!(style.name, "help");
        assert_eq!(style.options.0, vec![RawOption::flag("gray"), RawOption::flag("very thin")]);
    }

    #[test]
    fn layers_and_setmacro() {
        let stmts = statements(
            r"\pgfdeclarelayer{bg} \pgfsetlayers{bg,main} \pgfmathsetmacro{\r}{sqrt(2)} \begin{pgfonlayer}{bg} \fill (0,0) circle (1); \end{pgfonlayer}",
        );
        assert!(matches!(&stmts[0], Statement::LayerDeclaration(n) if n == "bg"));
        assert!(matches!(&stmts[1], Statement::LayerOrder(v) if v == &["bg", "main"]));
        assert!(matches!(&stmts[2], Statement::Variable(v) if v.name == "r" && v.expression == "sqrt(2)"));
        assert!(matches!(&stmts[3], Statement::LayerBlock(b) if b.name == "bg" && b.body.len() == 1));
    }

    #[test]
    fn syntax_error_has_span() {
        let err = parse(r"\draw (0,0) -- ;").unwrap_err();
        let parse_err = err.downcast_ref::<ParseError>().unwrap();
        assert!(matches!(parse_err, ParseError::Syntax { .. }));
    }

    #[test]
    fn expression_precedence() {
        let expr = parse_expression("1 + 2 * 3 ^ 2").unwrap();
        let Expr::Binary(_, BinaryOp::Add, rhs) = expr else {
            panic!("addition should be outermost")
        };
        assert!(matches!(*rhs, Expr::Binary(_, BinaryOp::Mul, _)));
    }

    #[test]
    fn expression_units_and_calls() {
        assert!(parse_expression("2cm").unwrap().has_unit());
        assert!(parse_expression(r"\r pt").unwrap().has_unit());
        assert!(!parse_expression(r"sin(\x) * 2").unwrap().has_unit());
        assert!(matches!(parse_expression("max(1, 2, 3)").unwrap(), Expr::Call(name, args) if name == "max" && args.len() == 3));
    }

    #[test]
    fn expression_syntax_error() {
        assert!(matches!(parse_expression("1 +"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse_expression("red"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn strips_outer_braces_only_when_balanced() {
        assert_eq!(strip_braces("{red!20}"), "red!20");
        assert_eq!(strip_braces("{a}{b}"), "{a}{b}");
        assert_eq!(strip_braces("plain"), "plain");
    }
}
