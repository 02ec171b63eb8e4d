//! Report sections shared by several commands.
use maud::{html, Markup};

use cytoclass_classifiers::config::format_params;
use cytoclass_classifiers::data_handling::Dataset;
use cytoclass_classifiers::metrics::ClassificationReport;
use cytoclass_classifiers::report::plots::{
    plot_confusion_matrix, plot_feature_histogram, plot_search_candidates, plot_search_heatmap,
};
use cytoclass_classifiers::report::ReportSection;
use cytoclass_classifiers::search::SearchResult;

pub fn metrics_table(report: &ClassificationReport) -> Markup {
    html! {
        table {
            tr { th { "class" } th { "precision" } th { "recall" } th { "f1" } th { "support" } }
            @for m in &report.per_class {
                tr {
                    td { (m.label) }
                    td { (format!("{:.4}", m.precision)) }
                    td { (format!("{:.4}", m.recall)) }
                    td { (format!("{:.4}", m.f1)) }
                    td { (m.support) }
                }
            }
            tr {
                td { "macro avg" }
                td { (format!("{:.4}", report.macro_avg.precision)) }
                td { (format!("{:.4}", report.macro_avg.recall)) }
                td { (format!("{:.4}", report.macro_avg.f1)) }
                td { (report.n_samples) }
            }
            tr {
                td { "weighted avg" }
                td { (format!("{:.4}", report.weighted_avg.precision)) }
                td { (format!("{:.4}", report.weighted_avg.recall)) }
                td { (format!("{:.4}", report.weighted_avg.f1)) }
                td { (report.n_samples) }
            }
        }
        p { "Accuracy: " strong { (format!("{:.4}", report.accuracy)) } }
    }
}

pub fn metrics_section(report: &ClassificationReport) -> ReportSection {
    let mut section = ReportSection::new("Model Metrics");
    section.add_content(metrics_table(report));
    section.add_plot(plot_confusion_matrix(report, "Confusion matrix (test set)"));
    section
}

/// Ranked candidates, a scatter of their scores and, for searches over
/// exactly two parameters, a heatmap of the mean scores.
pub fn search_section(result: &SearchResult) -> ReportSection {
    let mut section = ReportSection::new("Hyperparameter Search");
    section.add_content(html! {
        p {
            (result.strategy) " search over " (result.n_evaluations) " candidates with "
            (result.n_splits) "-fold cross-validation. Best: "
            strong { (format_params(&result.best_params)) }
            " (mean accuracy " (format!("{:.4}", result.best_score)) ")"
        }
        table {
            tr { th { "rank" } th { "parameters" } th { "mean" } th { "std" } }
            @for c in result.ranked() {
                tr {
                    td { (c.rank) }
                    td { (format_params(&c.params)) }
                    td { (format!("{:.4}", c.mean_score)) }
                    td { (format!("{:.4}", c.std_score)) }
                }
            }
        }
    });
    section.add_plot(plot_search_candidates(result));

    let names: Vec<&String> = result.best_params.keys().collect();
    if names.len() == 2 {
        match plot_search_heatmap(result, names[0], names[1]) {
            Ok(plot) => section.add_plot(plot),
            Err(e) => log::warn!("Skipping search heatmap: {}", e),
        }
    }
    section
}

pub fn histogram_section(dataset: &Dataset, features: &[String]) -> ReportSection {
    let mut section = ReportSection::new("Feature Distributions");
    for feature in features {
        match plot_feature_histogram(dataset, feature) {
            Ok(plot) => section.add_plot(plot),
            Err(e) => log::warn!("Skipping histogram of '{}': {}", feature, e),
        }
    }
    section
}
