use std::collections::BTreeMap;

use itertools_num::linspace;
use ndarray::{Array1, Array2, Axis as NdAxis};
use plotly::common::Mode;
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Contour, HeatMap, Histogram, Plot, Scatter};

use crate::config::ModelType;
use crate::curve::AccuracyCurve;
use crate::data_handling::Dataset;
use crate::error::{PipelineError, Result};
use crate::metrics::ClassificationReport;
use crate::models::{ClassifierModel, ScaledClassifier};
use crate::preprocessing::DegeneratePolicy;
use crate::search::SearchResult;

/// Train and test accuracy against the varied parameter.
pub fn plot_accuracy_curve(curve: &AccuracyCurve) -> Plot {
    let x: Vec<String> = curve.points.iter().map(|p| p.value.to_string()).collect();
    let train: Vec<f64> = curve.points.iter().map(|p| p.train_accuracy).collect();
    let test: Vec<f64> = curve.points.iter().map(|p| p.test_accuracy).collect();

    let mut plot = Plot::new();
    plot.add_trace(Scatter::new(x.clone(), train).mode(Mode::LinesMarkers).name("Train"));
    plot.add_trace(Scatter::new(x, test).mode(Mode::LinesMarkers).name("Test"));
    plot.set_layout(
        Layout::new()
            .title(format!("{} accuracy vs {}", curve.model, curve.parameter).as_str())
            .x_axis(Axis::new().title(curve.parameter.as_str()))
            .y_axis(Axis::new().title("Accuracy")),
    );
    plot
}

/// Mean cross-validated accuracy of every candidate, in evaluation order.
pub fn plot_search_candidates(result: &SearchResult) -> Plot {
    let labels: Vec<String> = result
        .candidates
        .iter()
        .map(|c| crate::config::format_params(&c.params))
        .collect();
    let index: Vec<usize> = (1..=result.candidates.len()).collect();
    let means: Vec<f64> = result.candidates.iter().map(|c| c.mean_score).collect();

    let trace = Scatter::new(index, means)
        .mode(Mode::Markers)
        .name("Mean CV accuracy")
        .text_array(labels);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(format!("{} {} search", result.model, result.strategy).as_str())
            .x_axis(Axis::new().title("Candidate"))
            .y_axis(Axis::new().title("Mean CV accuracy")),
    );
    plot
}

/// Mean CV accuracy over two searched parameters. When other parameters
/// vary too, each cell shows the best mean among matching candidates.
pub fn plot_search_heatmap(result: &SearchResult, x_param: &str, y_param: &str) -> Result<Plot> {
    let mut x_values: Vec<String> = Vec::new();
    let mut y_values: Vec<String> = Vec::new();
    let mut cells: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    for candidate in &result.candidates {
        let (xv, yv) = match (candidate.params.get(x_param), candidate.params.get(y_param)) {
            (Some(xv), Some(yv)) => (xv.to_string(), yv.to_string()),
            _ => {
                return Err(PipelineError::Configuration(format!(
                    "search did not vary both '{}' and '{}'",
                    x_param, y_param
                )))
            }
        };
        let xi = position_or_push(&mut x_values, xv);
        let yi = position_or_push(&mut y_values, yv);
        let cell = cells.entry((yi, xi)).or_insert(f64::NEG_INFINITY);
        *cell = cell.max(candidate.mean_score);
    }

    let z: Vec<Vec<Option<f64>>> = (0..y_values.len())
        .map(|yi| (0..x_values.len()).map(|xi| cells.get(&(yi, xi)).copied()).collect())
        .collect();

    let mut plot = Plot::new();
    plot.add_trace(HeatMap::new(x_values, y_values, z).name("Mean CV accuracy"));
    plot.set_layout(
        Layout::new()
            .title(format!("{} grid: mean CV accuracy", result.model).as_str())
            .x_axis(Axis::new().title(x_param))
            .y_axis(Axis::new().title(y_param)),
    );
    Ok(plot)
}

fn position_or_push(values: &mut Vec<String>, value: String) -> usize {
    match values.iter().position(|v| *v == value) {
        Some(i) => i,
        None => {
            values.push(value);
            values.len() - 1
        }
    }
}

/// Confusion counts with true classes on the y axis.
pub fn plot_confusion_matrix(report: &ClassificationReport, title: &str) -> Plot {
    let labels: Vec<String> = report.per_class.iter().map(|m| m.label.clone()).collect();
    let z: Vec<Vec<usize>> = report.confusion.clone();

    let mut plot = Plot::new();
    plot.add_trace(HeatMap::new(labels.clone(), labels, z));
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Predicted"))
            .y_axis(Axis::new().title("True")),
    );
    plot
}

/// Overlaid per-class histograms of one feature.
pub fn plot_feature_histogram(dataset: &Dataset, feature: &str) -> Result<Plot> {
    let column = dataset.feature_index(feature)?;
    let mut by_class: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (value, label) in dataset.x.column(column).iter().zip(dataset.labels.iter()) {
        by_class.entry(label.as_str()).or_default().push(*value);
    }

    let mut plot = Plot::new();
    for (label, values) in by_class {
        plot.add_trace(Histogram::new(values).name(label).opacity(0.6));
    }
    plot.set_layout(
        Layout::new()
            .title(format!("Distribution of {}", feature).as_str())
            .bar_mode(BarMode::Overlay)
            .x_axis(Axis::new().title(feature))
            .y_axis(Axis::new().title("Count")),
    );
    Ok(plot)
}

/// Range of column `col` over both partitions, padded by 5% on each side.
fn mesh_bounds(x_train: &Array2<f64>, x_test: &Array2<f64>, col: usize) -> (f64, f64) {
    let train_column = x_train.column(col);
    let test_column = x_test.column(col);
    let (lo, hi) = train_column
        .iter()
        .chain(test_column.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad, hi + pad)
}

/// Decision regions of `model_type` trained on two feature columns.
///
/// The model (with its own scaler) is fitted on `x_train`, which must have
/// exactly two columns, and evaluated on a `resolution` x `resolution` mesh
/// spanning the training and test points with a small margin.
#[allow(clippy::too_many_arguments)]
pub fn plot_decision_boundary(
    model_type: &ModelType,
    x_train: &Array2<f64>,
    y_train: &Array1<usize>,
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
    feature_names: [&str; 2],
    class_names: &[String],
    resolution: usize,
) -> Result<Plot> {
    if x_train.ncols() != 2 || x_test.ncols() != 2 {
        return Err(PipelineError::Configuration(
            "decision boundaries need exactly two feature columns".to_string(),
        ));
    }
    if resolution < 2 {
        return Err(PipelineError::Configuration("mesh resolution must be at least 2".to_string()));
    }

    let mut model = ScaledClassifier::from_model_type(model_type, DegeneratePolicy::Zero)?;
    model.fit(x_train, y_train)?;

    let (x0, x1) = mesh_bounds(x_train, x_test, 0);
    let (y0, y1) = mesh_bounds(x_train, x_test, 1);
    let xs: Vec<f64> = linspace(x0, x1, resolution).collect();
    let ys: Vec<f64> = linspace(y0, y1, resolution).collect();

    let grid = Array2::from_shape_fn((resolution * resolution, 2), |(i, c)| {
        if c == 0 {
            xs[i % resolution]
        } else {
            ys[i / resolution]
        }
    });
    let predicted = model.predict(&grid)?;
    let z: Vec<Vec<f64>> = predicted
        .mapv(|code| code as f64)
        .into_shape((resolution, resolution))
        .map_err(|e| PipelineError::Model(e.to_string()))?
        .axis_iter(NdAxis(0))
        .map(|row| row.to_vec())
        .collect();

    let mut plot = Plot::new();
    plot.add_trace(
        Contour::new(xs, ys, z)
            .name("Decision regions")
            .opacity(0.4)
            .show_scale(false),
    );

    for (partition, x, y) in [("train", x_train, y_train), ("test", x_test, y_test)] {
        for (code, class) in class_names.iter().enumerate() {
            let rows: Vec<usize> = y.iter().enumerate().filter(|(_, c)| **c == code).map(|(i, _)| i).collect();
            if rows.is_empty() {
                continue;
            }
            let points = x.select(NdAxis(0), &rows);
            plot.add_trace(
                Scatter::new(points.column(0).to_vec(), points.column(1).to_vec())
                    .mode(Mode::Markers)
                    .name(&format!("{} ({})", class, partition)),
            );
        }
    }

    plot.set_layout(
        Layout::new()
            .title(format!("{} decision boundary", model.name()).as_str())
            .x_axis(Axis::new().title(feature_names[0]))
            .y_axis(Axis::new().title(feature_names[1])),
    );
    Ok(plot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnnConfig;
    use ndarray::array;

    #[test]
    fn decision_boundary_rejects_wrong_width() {
        let x = array![[0.0, 1.0, 2.0]];
        let y = array![0usize];
        let result = plot_decision_boundary(
            &ModelType::default(),
            &x,
            &y,
            &x,
            &y,
            ["a", "b"],
            &["A".to_string()],
            10,
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn mesh_spans_both_partitions() {
        let train = array![[0.0, 5.0], [10.0, 6.0]];
        let test = array![[-10.0, 7.0]];
        let (lo, hi) = mesh_bounds(&train, &test, 0);
        assert!((lo - (-11.0)).abs() < 1e-9);
        assert!((hi - 11.0).abs() < 1e-9);
        let (lo, hi) = mesh_bounds(&train, &test, 1);
        assert!((lo - 4.9).abs() < 1e-9);
        assert!((hi - 7.1).abs() < 1e-9);
    }

    #[test]
    fn decision_boundary_renders() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [10.0, 10.0], [9.0, 10.0]];
        let y = array![0usize, 0, 1, 1];
        let model = ModelType::Knn(KnnConfig {
            n_neighbors: 1,
            ..KnnConfig::default()
        });
        let plot = plot_decision_boundary(
            &model,
            &x,
            &y,
            &x,
            &y,
            ["a", "b"],
            &["A".to_string(), "B".to_string()],
            20,
        )
        .unwrap();
        let html = plot.to_inline_html(Some("boundary"));
        assert!(html.contains("boundary"));
        assert!(html.contains("contour"));
    }
}
