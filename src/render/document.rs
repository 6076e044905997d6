//! Document assembly: the `<svg>` root, markers and clip paths

use svg::Document;
use svg::Node;
use svg::node::element::{ClipPath, Definitions, Marker, Path};

use crate::types::Canvas;

use super::path::PathData;

/// Everything that ends up in `<defs>`
#[derive(Debug, Default)]
pub struct Defs {
    /// Marker ids in first-use order
    markers: Vec<&'static str>,
    clips: Vec<ClipPath>,
}

impl Defs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_marker(&mut self, id: &'static str) {
        if !self.markers.contains(&id) {
            self.markers.push(id);
        }
    }

    /// Register a clip region, returning its id.
    pub fn add_clip(&mut self, data: &PathData) -> String {
        let id = format!("clip{}", self.clips.len());
        let clip = ClipPath::new()
            .set("id", id.as_str())
            .add(Path::new().set("d", data.to_string()));
        self.clips.push(clip);
        id
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.clips.is_empty()
    }

    fn into_definitions(self) -> Definitions {
        let mut defs = Definitions::new();
        for id in self.markers {
            if let Some(marker) = marker(id) {
                defs = defs.add(marker);
            }
        }
        for clip in self.clips {
            defs = defs.add(clip);
        }
        defs
    }
}

/// Arrow tip markers, painted in the stroke color of the path using them.
fn marker(id: &str) -> Option<Marker> {
    let (view_box, ref_x, width, d) = match id {
        "arrow-end" => ("0 0 10 10", "9", "6", "M 0 0 L 10 5 L 0 10 z"),
        "arrow-start" => ("0 0 10 10", "1", "6", "M 10 0 L 0 5 L 10 10 z"),
        "bar" => ("0 0 2 10", "1", "2", "M 0 0 L 2 0 L 2 10 L 0 10 z"),
        _ => return None,
    };
    Some(
        Marker::new()
            .set("id", id)
            .set("viewBox", view_box)
            .set("refX", ref_x)
            .set("refY", "5")
            .set("markerWidth", width)
            .set("markerHeight", "6")
            .set("orient", "auto-start-reverse")
            .add(Path::new().set("d", d).set("fill", "context-stroke")),
    )
}

/// Wrap painted content in the `<svg>` root.
pub fn build_document(canvas: &Canvas, defs: Defs, content: Vec<Box<dyn Node>>) -> Document {
    let mut doc = Document::new()
        .set("xmlns", "http://www.w3.org/2000/svg")
        .set("width", canvas.width.to_string())
        .set("height", canvas.height.to_string())
        .set("viewBox", format!("0 0 {} {}", canvas.width, canvas.height));

    if !defs.is_empty() {
        doc = doc.add(defs.into_definitions());
    }
    for node in content {
        doc = doc.add(node);
    }
    doc
}
