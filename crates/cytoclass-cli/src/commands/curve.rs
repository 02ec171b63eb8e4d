use std::path::Path;

use anyhow::{Context, Result};
use maud::html;

use cytoclass_classifiers::config::ParamValue;
use cytoclass_classifiers::curve::{accuracy_curve, AccuracyCurve};
use cytoclass_classifiers::io::read_delimited_with_config;
use cytoclass_classifiers::preprocessing::{encode_labels, name_degenerate};
use cytoclass_classifiers::report::plots::plot_accuracy_curve;
use cytoclass_classifiers::report::{Report, ReportSection};
use cytoclass_classifiers::split::train_test_split;

use crate::config::RunConfig;

/// Parse a comma separated list of parameter values.
///
/// Numbers become `Int`/`Float`, bracketed lists such as `[64,32]` become
/// layer sizes and anything else is kept as text. Commas inside brackets do
/// not separate values.
pub fn parse_param_values(raw: &str) -> Result<Vec<ParamValue>> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in raw.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);

    let values: Vec<ParamValue> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| serde_json::from_str::<ParamValue>(t).unwrap_or_else(|_| ParamValue::Text(t.to_string())))
        .collect();
    if values.is_empty() {
        anyhow::bail!("No parameter values given in '{}'", raw);
    }
    Ok(values)
}

/// Vary `parameter` of the configured model over `values` on the pipeline's
/// train/test partition.
pub fn run_curve(config: &RunConfig, parameter: &str, values: &[ParamValue]) -> Result<AccuracyCurve> {
    let pipeline = &config.pipeline;
    let mut dataset = read_delimited_with_config(&config.data, &pipeline.loader)
        .with_context(|| format!("Failed to load data: {}", config.data))?;
    if let Some(names) = &pipeline.features {
        dataset = dataset.select_features(names)?;
    }
    let (y, _) = encode_labels(&dataset.labels)?;
    let split = train_test_split(&dataset.x, &y, pipeline.test_fraction, pipeline.seed)?;

    let curve = accuracy_curve(&pipeline.model, parameter, values, &split, pipeline.degenerate_policy)
        .map_err(|e| name_degenerate(e, &dataset.feature_names))?;
    Ok(curve)
}

pub fn write_curve_report(curve: &AccuracyCurve, path: &Path) -> Result<()> {
    let mut report = Report::new(
        "cytoclass",
        env!("CARGO_PKG_VERSION"),
        &format!("Cytoclass {} accuracy curve", curve.model),
    );
    let mut section = ReportSection::new("Accuracy Curve");
    section.add_content(html! {
        table {
            tr { th { (curve.parameter) } th { "train accuracy" } th { "test accuracy" } }
            @for p in &curve.points {
                tr {
                    td { (p.value.to_string()) }
                    td { (format!("{:.4}", p.train_accuracy)) }
                    td { (format!("{:.4}", p.test_accuracy)) }
                }
            }
        }
        @if let Some(best) = curve.best_point() {
            p { "Best test accuracy " (format!("{:.4}", best.test_accuracy)) " at " (curve.parameter) "=" (best.value.to_string()) }
        }
    });
    section.add_plot(plot_accuracy_curve(curve));
    report.add_section(section);
    report.save_to_file(path)
}
