use std::path::Path;

use anyhow::{Context, Result};
use maud::html;

use cytoclass_classifiers::data_handling::Dataset;
use cytoclass_classifiers::io::{read_delimited_with_config, LoaderConfig};
use cytoclass_classifiers::report::{Report, ReportSection};
use cytoclass_classifiers::stats::{correlation_matrix, strongest_correlations, DatasetSummary};

use super::sections::histogram_section;

const N_CORRELATIONS: usize = 10;
const N_HISTOGRAMS: usize = 6;

/// Load `data` and compute its exploratory summary.
pub fn describe_data(data: &Path, loader: &LoaderConfig) -> Result<(Dataset, DatasetSummary)> {
    let dataset = read_delimited_with_config(data, loader)
        .with_context(|| format!("Failed to load data: {}", data.display()))?;
    dataset.log_input_data_summary();
    let summary = dataset.describe();
    Ok((dataset, summary))
}

/// Features ordered by how far apart their class means lie, in units of
/// the overall standard deviation.
fn most_separating_features(summary: &DatasetSummary, n: usize) -> Vec<String> {
    let mut scored: Vec<(String, f64)> = summary
        .features
        .iter()
        .map(|f| {
            let (lo, hi) = f
                .class_means
                .values()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)));
            let separation = if f.std > 0.0 && f.std.is_finite() { (hi - lo) / f.std } else { 0.0 };
            (f.name.clone(), separation)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(n).map(|(name, _)| name).collect()
}

pub fn write_describe_report(dataset: &Dataset, summary: &DatasetSummary, path: &Path) -> Result<()> {
    let mut report = Report::new("cytoclass", env!("CARGO_PKG_VERSION"), "Cytoclass dataset summary");

    let mut overview = ReportSection::new("Overview");
    overview.add_content(html! {
        p { (summary.n_samples) " samples, " (summary.n_features) " features." }
        table {
            tr { th { "class" } th { "samples" } }
            @for (label, count) in &summary.class_counts {
                tr { td { (label) } td { (count) } }
            }
        }
    });
    report.add_section(overview);

    let mut features = ReportSection::new("Feature Statistics");
    features.add_content(html! {
        table {
            tr {
                th { "feature" } th { "mean" } th { "std" } th { "min" } th { "median" } th { "max" }
                @for label in summary.class_counts.keys() { th { "mean (" (label) ")" } }
            }
            @for f in &summary.features {
                tr {
                    td { (f.name) }
                    td { (format!("{:.4}", f.mean)) }
                    td { (format!("{:.4}", f.std)) }
                    td { (format!("{:.4}", f.min)) }
                    td { (format!("{:.4}", f.median)) }
                    td { (format!("{:.4}", f.max)) }
                    @for label in summary.class_counts.keys() {
                        td { (f.class_means.get(label).map(|m| format!("{:.4}", m)).unwrap_or_default()) }
                    }
                }
            }
        }
    });
    report.add_section(features);

    let corr = correlation_matrix(&dataset.x);
    let pairs = strongest_correlations(&corr, &dataset.feature_names, N_CORRELATIONS);
    let mut correlations = ReportSection::new("Correlations");
    correlations.add_content(html! {
        table {
            tr { th { "feature" } th { "feature" } th { "pearson r" } }
            @for (a, b, r) in &pairs {
                tr { td { (a) } td { (b) } td { (format!("{:.4}", r)) } }
            }
        }
    });
    report.add_section(correlations);

    report.add_section(histogram_section(dataset, &most_separating_features(summary, N_HISTOGRAMS)));
    report.save_to_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cytoclass_classifiers::io::read_delimited_str;

    #[test]
    fn separating_features_come_first() {
        let content = "1,B,1.0,5.0\n2,B,2.0,5.5\n3,M,1.5,9.0\n4,M,1.2,9.5\n";
        let dataset = read_delimited_str(content, &LoaderConfig::default()).unwrap();
        let summary = dataset.describe();
        let order = most_separating_features(&summary, 2);
        assert_eq!(order, vec!["feature_2".to_string(), "feature_1".to_string()]);
    }
}
