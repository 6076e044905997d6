//! SVG rendering for TikZ pictures
//!
//! This module is organized into submodules:
//! - `color`: xcolor names, hex literals and mixes
//! - `style`: option evaluation, named styles and paint resolution
//! - `coords`: coordinate resolution and the named-coordinate registry
//! - `path`: path primitives and the pen-tracking path renderer
//! - `text`: node text cleanup, sizing and placement
//! - `layers`: scope frames, clip groups and paint layers
//! - `document`: the `<svg>` root, markers and clip paths

pub mod color;
pub mod coords;
pub mod document;
pub mod layers;
pub mod path;
pub mod style;
pub mod text;

use glam::DVec2;
use svg::node::element::Path as SvgPath;

use crate::ast::{
    Command, CoordinateDefinition, DrawStatement, ForeachLoop, LayerBlock, Node, Options, Picture,
    RawOption, Scope, Statement, VariableDefinition,
};
use crate::config::RenderConfig;
use crate::eval::{EvalContext, Evaluator, ScopeId, Value};
use crate::log::debug;
use crate::loops::{bind_iteration, iterations};
use crate::types::Canvas;

pub use coords::{Anchored, CoordinateResolver, NamedCoordinates};
pub use path::{PathData, PathRenderer, Primitive};
pub use style::{OptionMap, OptionValue, Style, StyleTable};

use document::{Defs, build_document};
use layers::{FrameStack, LayerManager};
use path::PendingNode;
use style::{EVERY_NODE, OptionProcessor, parse_arrows, scope_attributes};

/// Render a parsed picture to an SVG string.
pub fn render(picture: &Picture, config: &RenderConfig) -> Result<String, miette::Report> {
    let canvas = config.canvas()?;
    let mut emitter = Emitter::new(canvas);
    emitter.picture(picture)?;
    Ok(emitter.finish())
}

/// Owns all per-conversion state while statements are walked.
struct Emitter {
    canvas: Canvas,
    ctx: EvalContext,
    registry: NamedCoordinates,
    styles: StyleTable,
    layers: LayerManager,
    frames: FrameStack,
    /// Inherited options, innermost scope last
    inherited: Vec<OptionMap>,
    defs: Defs,
}

impl Emitter {
    fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            ctx: EvalContext::new(),
            registry: NamedCoordinates::new(),
            styles: StyleTable::new(),
            layers: LayerManager::new(),
            frames: FrameStack::new(),
            inherited: vec![OptionMap::new()],
            defs: Defs::new(),
        }
    }

    fn picture(&mut self, picture: &Picture) -> Result<(), miette::Report> {
        let root = self.ctx.root();
        if picture.options.is_empty() {
            return self.statements(&picture.statements, root);
        }
        // picture options behave like an outermost scope
        self.scope(
            &Scope {
                options: picture.options.clone(),
                body: Vec::new(),
            },
            &picture.statements,
            root,
        )
    }

    fn finish(self) -> String {
        let order = self.layers.paint_order();
        let content = self.frames.finish(&order);
        debug!(nodes = content.len(), layers = order.len(), "assembled document");
        build_document(&self.canvas, self.defs, content).to_string()
    }

    fn options_in(&self, options: &Options, scope: ScopeId) -> OptionMap {
        OptionProcessor::new(&self.styles, Evaluator::new(&self.ctx, scope)).process(options)
    }

    fn inherited(&self) -> &OptionMap {
        // the stack always holds the root entry
        &self.inherited[self.inherited.len() - 1]
    }

    fn statements(&mut self, statements: &[Statement], scope: ScopeId) -> Result<(), miette::Report> {
        for statement in statements {
            self.statement(statement, scope)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement, scope: ScopeId) -> Result<(), miette::Report> {
        match statement {
            Statement::Draw(draw) => self.draw(draw, scope),
            Statement::Node(node) => self.node(node, scope),
            Statement::Coordinate(def) => self.coordinate(def, scope),
            Statement::Scope(block) => self.scope(block, &block.body, scope),
            Statement::Foreach(lp) => self.foreach(lp, scope),
            Statement::LayerDeclaration(name) => {
                self.layers.declare(name);
                Ok(())
            }
            Statement::LayerOrder(names) => {
                self.layers.set_order(names);
                Ok(())
            }
            Statement::LayerBlock(block) => self.layer_block(block, scope),
            Statement::StyleDefinition(def) => {
                self.styles.define(def.name.clone(), def.options.clone());
                Ok(())
            }
            Statement::Variable(var) => self.variable(var, scope),
        }
    }

    fn draw(&mut self, draw: &DrawStatement, scope: ScopeId) -> Result<(), miette::Report> {
        self.styles.absorb(&draw.options)?;
        let own = self.options_in(&draw.options, scope);
        let options = self.inherited().merged(&own);
        let style = Style::resolve(&options, draw.command, &self.canvas);

        let traced = PathRenderer::new(&self.canvas, &mut self.ctx, &mut self.registry, &self.styles, scope)
            .with_command_options(&draw.options)
            .trace(&draw.path)?;

        if draw.command == Command::Clip {
            if traced.data.has_segments() {
                let id = self.defs.add_clip(&traced.data);
                debug!(id = %id, "opened clip");
                self.frames.push_clip(id);
            }
        } else if traced.data.has_segments() && (style.stroke.is_some() || style.fill.is_some()) {
            let mut element = SvgPath::new().set("d", traced.data.to_string());
            for (name, value) in style.path_attributes() {
                element = element.set(name, value);
            }
            if style.stroke.is_some() {
                if let Some(tip) = style.arrows.start {
                    self.defs.use_marker(tip.marker_id(true));
                }
                if let Some(tip) = style.arrows.end {
                    self.defs.use_marker(tip.marker_id(false));
                }
            }
            self.frames.add(self.layers.current(), element);
        }

        for pending in traced.nodes {
            self.place_inline_node(pending, &options, scope);
        }
        Ok(())
    }

    fn node(&mut self, node: &Node, scope: ScopeId) -> Result<(), miette::Report> {
        self.styles.absorb(&node.options)?;
        let at = match &node.position {
            Some(coord) => self.resolver(scope).resolve(coord, None)?,
            None => self.canvas.origin,
        };
        let eval = Evaluator::new(&self.ctx, scope);
        let text = eval.substitute(&node.text);
        let name = node.name.as_deref().map(|n| eval.substitute(n));
        let own = self.options_in(&node.options, scope);
        let inherited = node_inheritance(self.inherited());
        self.place_node(&text, name, &inherited, &own, at, scope);
        Ok(())
    }

    fn place_inline_node(&mut self, pending: PendingNode, path_options: &OptionMap, scope: ScopeId) {
        let inherited = node_inheritance(path_options);
        self.place_node(
            &pending.node.text,
            pending.node.name,
            &inherited,
            &pending.options,
            pending.at,
            scope,
        );
    }

    /// Lay out and paint a node. `text` and `name` are already substituted.
    fn place_node(
        &mut self,
        text: &str,
        name: Option<String>,
        inherited: &OptionMap,
        own: &OptionMap,
        at: DVec2,
        scope: ScopeId,
    ) {
        let mut options = inherited.clone();
        if self.styles.get(EVERY_NODE).is_some() {
            let every = self.options_in(&Options(vec![RawOption::flag(EVERY_NODE)]), scope);
            options = options.merged(&every);
        }
        let options = options.merged(own);

        let style = Style::resolve(&options, Command::Path, &self.canvas);
        let text = text::clean_text(text);
        let placed = text::layout(&text, &options, &style, at, &self.canvas);
        if let Some(name) = name {
            self.registry.store(name, placed.anchored());
        }
        for element in text::render(&text, &placed, &style) {
            self.frames.add(self.layers.current(), element);
        }
    }

    fn coordinate(&mut self, def: &CoordinateDefinition, scope: ScopeId) -> Result<(), miette::Report> {
        let at = self.resolver(scope).resolve(&def.position, None)?;
        let name = Evaluator::new(&self.ctx, scope).substitute(&def.name);
        self.registry.store(name, Anchored::point(at));
        Ok(())
    }

    fn resolver(&self, scope: ScopeId) -> CoordinateResolver<'_> {
        CoordinateResolver::new(&self.canvas, &self.registry, Evaluator::new(&self.ctx, scope))
    }

    /// Enter a scope with `block`'s options, walk `body`, then close it.
    fn scope(&mut self, block: &Scope, body: &[Statement], parent: ScopeId) -> Result<(), miette::Report> {
        self.styles.absorb(&block.options)?;
        let own = self.options_in(&block.options, parent);
        let merged = self.inherited().merged(&own);
        let attrs = scope_attributes(&own, &self.canvas);

        self.inherited.push(merged);
        self.frames.push_scope(attrs);
        let child = self.ctx.enter(parent);
        let result = self.statements(body, child);
        self.ctx.leave(child);
        self.frames.pop_scope();
        self.inherited.pop();
        result
    }

    fn foreach(&mut self, lp: &ForeachLoop, scope: ScopeId) -> Result<(), miette::Report> {
        let tuples = iterations(&lp.header, &Evaluator::new(&self.ctx, scope))?;
        debug!(iterations = tuples.len(), "running loop");
        for (index, values) in tuples.iter().enumerate() {
            let iteration = bind_iteration(&mut self.ctx, scope, &lp.header, index, values)?;
            let result = self.statements(&lp.body, iteration);
            self.ctx.leave(iteration);
            result?;
        }
        Ok(())
    }

    fn layer_block(&mut self, block: &LayerBlock, scope: ScopeId) -> Result<(), miette::Report> {
        let previous = self.layers.enter(&block.name);
        let child = self.ctx.enter(scope);
        let result = self.statements(&block.body, child);
        self.ctx.leave(child);
        self.layers.restore(previous);
        result
    }

    fn variable(&mut self, var: &VariableDefinition, scope: ScopeId) -> Result<(), miette::Report> {
        let value = Evaluator::new(&self.ctx, scope).eval_str(&var.expression)?;
        let value = if var.truncate { value.trunc() } else { value };
        debug!(name = %var.name, value, "set macro");
        self.ctx.set(scope, var.name.clone(), Value::Number(value));
        Ok(())
    }
}

/// What a node takes from the path or scope around it: colors, fonts and
/// opacity, but not whether to paint a border.
fn node_inheritance(options: &OptionMap) -> OptionMap {
    let mut out = OptionMap::new();
    for (key, value) in options.iter() {
        let painting = matches!(key, "draw" | "fill" | "arrows")
            || (matches!(value, OptionValue::Flag) && parse_arrows(key).is_some());
        if !painting {
            out.insert(key, value.clone());
        }
    }
    out
}
