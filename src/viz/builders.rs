//! Result type -> chart spec mappings.

use super::spec::{
    palette_color, Annotation, Axis, ChartKind, Layout, LineStyle, Series, Shape, Trace,
    TraceType, VisualizationSpec,
};
use crate::alpha::{AlphaAnalysis, DiversityProfile};
use crate::beta::{BetaAnalysis, DistanceMatrix, EigenAxis, OrdinationResult};
use crate::config::VisualizationConfig;
use crate::rarefaction::RarefactionCurve;
use crate::taxonomy::{TaxonomyComposition, TaxonomySummary, UNASSIGNED};
use crate::test::ComparisonResult;
use std::collections::BTreeMap;

/// Build a chart description from an analysis result.
///
/// Implementations never fail: results with nothing to draw map to
/// [`VisualizationSpec::empty`].
pub trait Visualize {
    fn visualize(&self, config: &VisualizationConfig) -> VisualizationSpec;
}

impl Visualize for DiversityProfile {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        if self.is_empty() {
            return VisualizationSpec::empty("No samples to display");
        }
        let name = self.metric.display_name();
        let trace = Trace::new(TraceType::Box)
            .name(name)
            .y(Series::Numbers(self.raw_values()))
            .text(self.values.iter().map(|v| v.sample_id.clone()).collect())
            .color(palette_color(0));

        let mut layout = Layout::titled(format!("Alpha diversity ({})", name));
        layout.yaxis = Axis::titled(name);
        layout.showlegend = false;
        VisualizationSpec::new(ChartKind::Box, vec![trace], layout)
    }
}

impl Visualize for ComparisonResult {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        if self.groups.is_empty() {
            return VisualizationSpec::empty("No groups to compare");
        }
        let traces = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let values = self.values_by_group.get(label).cloned().unwrap_or_default();
                Trace::new(TraceType::Box)
                    .name(label.clone())
                    .y(Series::Numbers(values))
                    .color(palette_color(i))
            })
            .collect();

        let metric = self.metric.as_deref().unwrap_or("value");
        let mut layout = Layout::titled(format!(
            "{} by group ({}, p = {:.4})",
            metric,
            self.test.display_name(),
            self.p_value
        ));
        layout.xaxis = Axis::titled("Group");
        layout.yaxis = Axis::titled(metric);
        if !self.unassigned.is_empty() {
            layout.annotations.push(Annotation::paper(
                format!("{} samples without a group", self.unassigned.len()),
                1.0,
                1.05,
            ));
        }
        VisualizationSpec::new(ChartKind::Box, traces, layout)
    }
}

impl Visualize for AlphaAnalysis {
    fn visualize(&self, config: &VisualizationConfig) -> VisualizationSpec {
        match &self.comparison {
            Some(comparison) => comparison.visualize(config),
            None => self.profile.visualize(config),
        }
    }
}

impl Visualize for DistanceMatrix {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        if self.is_empty() {
            return VisualizationSpec::empty("No samples to display");
        }
        let trace = Trace::new(TraceType::Heatmap)
            .x(Series::Labels(self.sample_ids.clone()))
            .y(Series::Labels(self.sample_ids.clone()))
            .z(Series::Matrix(self.distances.clone()));
        let mut layout = Layout::titled(format!("{} distances", self.metric.display_name()));
        layout.showlegend = false;
        VisualizationSpec::new(ChartKind::Heatmap, vec![trace], layout)
    }
}

/// Scatter of the plotted axes, one trace per group in sorted order.
fn ordination_spec(
    ordination: &OrdinationResult,
    groups: &BTreeMap<String, String>,
) -> VisualizationSpec {
    if ordination.sample_ids.is_empty() {
        return VisualizationSpec::empty("No samples to display");
    }
    let axes = ordination.plotted_axes();
    let (Some(x_axis), Some(y_axis)) = (axes.first(), axes.get(1)) else {
        return VisualizationSpec::empty("Ordination has fewer than 2 axes");
    };
    let z_axis = axes.get(2);
    let n = ordination.sample_ids.len();
    if axes.iter().any(|a| a.coordinates.len() != n) {
        return VisualizationSpec::empty("Ordination coordinates do not match the samples");
    }

    // Group label -> sample indices; samples without a label go last
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut unlabelled = Vec::new();
    for (i, sample_id) in ordination.sample_ids.iter().enumerate() {
        match groups.get(sample_id) {
            Some(label) => members.entry(label.as_str()).or_default().push(i),
            None => unlabelled.push(i),
        }
    }
    let mut sets: Vec<(&str, Vec<usize>)> = members.into_iter().collect();
    if !unlabelled.is_empty() {
        let name = if groups.is_empty() { "Samples" } else { UNASSIGNED };
        sets.push((name, unlabelled));
    }

    let traces = sets
        .iter()
        .enumerate()
        .map(|(color, (name, indices))| {
            let coords = |axis: &EigenAxis| -> Series {
                Series::Numbers(indices.iter().map(|&i| axis.coordinates[i]).collect())
            };
            let kind = if z_axis.is_some() { TraceType::Scatter3d } else { TraceType::Scatter };
            let mut trace = Trace::new(kind)
                .name(*name)
                .x(coords(x_axis))
                .y(coords(y_axis))
                .mode("markers")
                .text(indices.iter().map(|&i| ordination.sample_ids[i].clone()).collect())
                .color(palette_color(color));
            if let Some(z) = z_axis {
                trace = trace.z(coords(z));
            }
            trace
        })
        .collect();

    let mut layout = Layout::titled(format!(
        "PCoA ({})",
        ordination.metric.display_name()
    ));
    layout.xaxis = Axis::titled(x_axis.label());
    layout.yaxis = Axis::titled(y_axis.label());
    if let Some(z) = z_axis {
        layout.zaxis = Axis::titled(z.label());
    }
    let explained: f64 = axes.iter().map(|a| a.proportion_explained).sum();
    layout.annotations.push(Annotation::paper(
        format!("Variance explained by plotted axes: {:.1}%", explained * 100.0),
        0.0,
        1.05,
    ));
    if let Some(degenerate) = &ordination.degenerate {
        layout
            .annotations
            .push(Annotation::paper(degenerate.message(), 0.0, -0.15));
    }

    VisualizationSpec::new(
        if z_axis.is_some() { ChartKind::Scatter3d } else { ChartKind::Scatter },
        traces,
        layout,
    )
}

impl Visualize for OrdinationResult {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        ordination_spec(self, &BTreeMap::new())
    }
}

impl Visualize for BetaAnalysis {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        ordination_spec(&self.ordination, &self.groups)
    }
}

impl Visualize for RarefactionCurve {
    fn visualize(&self, config: &VisualizationConfig) -> VisualizationSpec {
        if self.samples.is_empty() || self.depths.is_empty() {
            return VisualizationSpec::empty("No rarefaction curves to display");
        }
        let traces: Vec<Trace> = self
            .samples
            .iter()
            .take(config.max_curves)
            .enumerate()
            .map(|(i, sample)| {
                Trace::new(TraceType::Scatter)
                    .name(sample.sample_id.clone())
                    .x(Series::Numbers(sample.points.iter().map(|p| p.depth as f64).collect()))
                    .y(Series::Numbers(sample.points.iter().map(|p| p.expected).collect()))
                    .mode("lines")
                    .line(LineStyle {
                        color: Some(palette_color(i).to_string()),
                        width: Some(2.0),
                        dash: None,
                    })
            })
            .collect();

        let mut layout = Layout::titled("Rarefaction curves");
        layout.xaxis = Axis::titled("Sequencing depth");
        layout.yaxis = Axis::titled("Expected observed features");
        layout.shapes.push(Shape::vertical_line(
            self.recommended.depth as f64,
            LineStyle {
                color: Some("#d62728".to_string()),
                width: Some(2.0),
                dash: Some("dash".to_string()),
            },
        ));
        layout.annotations.push(Annotation::paper(
            format!("Recommended depth: {}", self.recommended.depth),
            1.0,
            1.05,
        ));
        if self.samples.len() > config.max_curves {
            layout.annotations.push(Annotation::paper(
                format!("Showing {} of {} samples", config.max_curves, self.samples.len()),
                0.0,
                1.05,
            ));
        }
        VisualizationSpec::new(ChartKind::Line, traces, layout)
    }
}

impl Visualize for TaxonomySummary {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        if self.top_taxa.is_empty() {
            return VisualizationSpec::empty("No taxonomy assignments");
        }
        let mut trace = Trace::new(TraceType::Pie);
        trace.labels = Some(self.top_taxa.iter().map(|t| t.taxon.clone()).collect());
        trace.values = Some(self.top_taxa.iter().map(|t| t.count as f64).collect());
        let layout = Layout::titled(format!(
            "Taxonomic composition: {} (top {})",
            self.rank,
            self.top_taxa.len()
        ));
        VisualizationSpec::new(ChartKind::Pie, vec![trace], layout)
    }
}

impl Visualize for TaxonomyComposition {
    fn visualize(&self, _config: &VisualizationConfig) -> VisualizationSpec {
        if self.taxa.is_empty() || self.sample_ids.is_empty() {
            return VisualizationSpec::empty("No taxonomy assignments");
        }
        let traces = self
            .taxa
            .iter()
            .zip(&self.abundances)
            .enumerate()
            .map(|(i, (taxon, values))| {
                Trace::new(TraceType::Bar)
                    .name(taxon.clone())
                    .x(Series::Labels(self.sample_ids.clone()))
                    .y(Series::Numbers(values.clone()))
                    .color(palette_color(i))
            })
            .collect();
        let mut layout = Layout::titled(format!("Taxonomic composition per sample: {}", self.rank));
        layout.xaxis = Axis::titled("Sample");
        layout.yaxis = Axis::titled("Abundance");
        layout.barmode = Some("stack".to_string());
        VisualizationSpec::new(ChartKind::StackedBar, traces, layout)
    }
}
