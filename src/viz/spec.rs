//! Renderer-agnostic chart description.
//!
//! The shape follows the trace + layout convention of common web plotting
//! libraries so a front end can pass it through with little or no mapping.

use serde::{Deserialize, Serialize};

/// Colours assigned to groups in sorted group order.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// Colour of the `index`-th group.
pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Overall chart shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Box,
    Scatter,
    Scatter3d,
    Line,
    Heatmap,
    Pie,
    StackedBar,
    /// Nothing to draw; the layout title carries the reason.
    Empty,
}

/// Kind of a single trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    Box,
    Scatter,
    Scatter3d,
    Heatmap,
    Pie,
    Bar,
}

/// Data of one trace dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Series {
    Numbers(Vec<f64>),
    Labels(Vec<String>),
    Matrix(Vec<Vec<f64>>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// `"solid"`, `"dash"`, `"dot"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
}

/// One drawable series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: TraceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Series>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Series>,
    /// Pie slice labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    /// Pie slice values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    /// Hover text, one per point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    /// `"markers"`, `"lines"`, `"lines+markers"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
}

impl Trace {
    pub fn new(trace_type: TraceType) -> Self {
        Self {
            trace_type,
            name: None,
            x: None,
            y: None,
            z: None,
            labels: None,
            values: None,
            text: None,
            mode: None,
            marker: None,
            line: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn x(mut self, x: Series) -> Self {
        self.x = Some(x);
        self
    }

    pub fn y(mut self, y: Series) -> Self {
        self.y = Some(y);
        self
    }

    pub fn z(mut self, z: Series) -> Self {
        self.z = Some(z);
        self
    }

    pub fn text(mut self, text: Vec<String>) -> Self {
        self.text = Some(text);
        self
    }

    pub fn mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.marker = Some(Marker {
            color: Some(color.to_string()),
            ..self.marker.unwrap_or_default()
        });
        self
    }

    pub fn line(mut self, line: LineStyle) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub title: String,
}

impl Axis {
    pub fn titled(title: impl Into<String>) -> Option<Self> {
        Some(Self { title: title.into() })
    }
}

/// Free-floating text on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    /// Position in paper coordinates (0..1).
    pub x: f64,
    pub y: f64,
    pub xref: String,
    pub yref: String,
    pub showarrow: bool,
}

impl Annotation {
    /// Annotation anchored in paper coordinates.
    pub fn paper(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            xref: "paper".to_string(),
            yref: "paper".to_string(),
            showarrow: false,
        }
    }
}

/// Straight line drawn in data or paper coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub shape_type: String,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub xref: String,
    pub yref: String,
    pub line: LineStyle,
}

impl Shape {
    /// Vertical line at `x` across the full plot height.
    pub fn vertical_line(x: f64, line: LineStyle) -> Self {
        Self {
            shape_type: "line".to_string(),
            x0: x,
            x1: x,
            y0: 0.0,
            y1: 1.0,
            xref: "x".to_string(),
            yref: "paper".to_string(),
            line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
    /// Third axis of 3D scatter plots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub annotations: Vec<Annotation>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub shapes: Vec<Shape>,
    /// `"stack"` for stacked bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barmode: Option<String>,
    pub showlegend: bool,
}

impl Layout {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            showlegend: true,
            ..Default::default()
        }
    }
}

/// A complete chart: kind, traces in drawing order, layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSpec {
    pub kind: ChartKind,
    pub traces: Vec<Trace>,
    pub layout: Layout,
}

impl VisualizationSpec {
    pub fn new(kind: ChartKind, traces: Vec<Trace>, layout: Layout) -> Self {
        Self { kind, traces, layout }
    }

    /// Spec with nothing to draw.
    pub fn empty(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            kind: ChartKind::Empty,
            traces: Vec::new(),
            layout: Layout {
                title: reason.clone(),
                annotations: vec![Annotation::paper(reason, 0.5, 0.5)],
                showlegend: false,
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ChartKind::Empty
    }
}
