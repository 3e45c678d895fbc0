//! Visualization specs for analysis results.

pub mod builders;
pub mod spec;

pub use builders::Visualize;
pub use spec::{
    palette_color, Annotation, Axis, ChartKind, Layout, LineStyle, Marker, Series, Shape, Trace,
    TraceType, VisualizationSpec, PALETTE,
};
