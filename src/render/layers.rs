//! Scope frames, clip groups and paint layers

use svg::Node;
use svg::node::element::Group;

use crate::log::{debug, warn};

pub const MAIN_LAYER: &str = "main";

type Content = Vec<Box<dyn Node>>;

/// Declared layers and their paint order
#[derive(Debug)]
pub struct LayerManager {
    declared: Vec<String>,
    order: Vec<String>,
    /// Layers used without being declared, in first-use order
    undeclared: Vec<String>,
    current: String,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self {
            declared: Vec::new(),
            order: vec![MAIN_LAYER.to_string()],
            undeclared: Vec::new(),
            current: MAIN_LAYER.to_string(),
        }
    }
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `\pgfdeclarelayer{name}`
    pub fn declare(&mut self, name: &str) {
        if !self.declared.iter().any(|d| d == name) {
            debug!(layer = name, "declared layer");
            self.declared.push(name.to_string());
        }
    }

    /// `\pgfsetlayers{a,main,b}`; `main` is added at the end if missing.
    pub fn set_order(&mut self, names: &[String]) {
        self.order = names.to_vec();
        if !self.order.iter().any(|n| n == MAIN_LAYER) {
            self.order.push(MAIN_LAYER.to_string());
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Switch to `name`, returning the layer to restore afterwards.
    pub fn enter(&mut self, name: &str) -> String {
        let known = name == MAIN_LAYER || self.declared.iter().any(|d| d == name);
        if !known && !self.undeclared.iter().any(|u| u == name) {
            warn!(layer = name, "layer used without \\pgfdeclarelayer; painting it last");
            self.undeclared.push(name.to_string());
        }
        std::mem::replace(&mut self.current, name.to_string())
    }

    pub fn restore(&mut self, previous: String) {
        self.current = previous;
    }

    /// Every layer in the order it is painted
    pub fn paint_order(&self) -> Vec<String> {
        let mut order = self.order.clone();
        for name in self.declared.iter().chain(&self.undeclared) {
            if !order.contains(name) {
                order.push(name.clone());
            }
        }
        order
    }
}

#[derive(Debug)]
enum FrameKind {
    Root,
    /// A `scope` environment with its `<g>` attributes
    Scope { attrs: Vec<(&'static str, String)> },
    /// Content after a `\clip`, until the enclosing scope ends
    Clip { id: String },
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    layers: Vec<(String, Content)>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            layers: Vec::new(),
        }
    }

    fn buffer(&mut self, layer: &str) -> &mut Content {
        let index = match self.layers.iter().position(|(name, _)| name == layer) {
            Some(index) => index,
            None => {
                self.layers.push((layer.to_string(), Vec::new()));
                self.layers.len() - 1
            }
        };
        &mut self.layers[index].1
    }
}

/// Output buffers for nested scopes and clips, one buffer per layer
#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl Default for FrameStack {
    fn default() -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Root)],
        }
    }
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self, attrs: Vec<(&'static str, String)>) {
        self.frames.push(Frame::new(FrameKind::Scope { attrs }));
    }

    /// Route everything until the end of the current scope through a clip group.
    pub fn push_clip(&mut self, id: impl Into<String>) {
        self.frames.push(Frame::new(FrameKind::Clip { id: id.into() }));
    }

    pub fn add(&mut self, layer: &str, node: impl Into<Box<dyn Node>>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.buffer(layer).push(node.into());
        }
    }

    /// Close the innermost scope, along with any clips opened inside it.
    pub fn pop_scope(&mut self) {
        while matches!(self.frames.last().map(|f| &f.kind), Some(FrameKind::Clip { .. })) {
            self.close_top();
        }
        if matches!(self.frames.last().map(|f| &f.kind), Some(FrameKind::Scope { .. })) {
            self.close_top();
        }
    }

    /// Wrap the top frame's buffers in groups and hand them to the parent.
    fn close_top(&mut self) {
        if self.frames.len() < 2 {
            return;
        }
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let Some(parent) = self.frames.last_mut() else {
            return;
        };
        for (layer, content) in frame.layers {
            if content.is_empty() {
                continue;
            }
            let mut group = Group::new();
            match &frame.kind {
                FrameKind::Scope { attrs } => {
                    for (name, value) in attrs {
                        group = group.set(*name, value.as_str());
                    }
                }
                FrameKind::Clip { id } => {
                    group = group.set("clip-path", format!("url(#{id})"));
                }
                FrameKind::Root => {}
            }
            for node in content {
                group = group.add(node);
            }
            parent.buffer(&layer).push(Box::new(group));
        }
    }

    /// Close everything and return the root content in paint order.
    pub fn finish(mut self, order: &[String]) -> Content {
        while self.frames.len() > 1 {
            self.close_top();
        }
        let Some(root) = self.frames.pop() else {
            return Vec::new();
        };
        let mut layers = root.layers;
        let mut out = Vec::new();
        for name in order {
            if let Some(index) = layers.iter().position(|(layer, _)| layer == name) {
                out.extend(layers.remove(index).1);
            }
        }
        // layers that were never ordered still get painted
        for (_, content) in layers {
            out.extend(content);
        }
        out
    }
}
