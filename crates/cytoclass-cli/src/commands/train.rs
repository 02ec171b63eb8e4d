use std::path::Path;

use anyhow::{Context, Result};
use maud::html;

use cytoclass_classifiers::config::ModelType;
use cytoclass_classifiers::io::read_delimited_with_config;
use cytoclass_classifiers::pipeline::{self, PipelineOutcome};
use cytoclass_classifiers::preprocessing::encode_labels;
use cytoclass_classifiers::report::plots::plot_decision_boundary;
use cytoclass_classifiers::report::{Report, ReportSection};
use cytoclass_classifiers::split::train_test_split;

use super::sections::{histogram_section, metrics_section, search_section};
use crate::config::RunConfig;

const BOUNDARY_RESOLUTION: usize = 100;

/// Run the full pipeline described by `config`.
pub fn run_train(config: &RunConfig) -> Result<PipelineOutcome> {
    log::info!("Training {} on {}", config.pipeline.model.name(), config.data);
    let outcome = pipeline::run(&config.data, &config.pipeline)
        .with_context(|| format!("Pipeline failed on {}", config.data))?;
    Ok(outcome)
}

/// Run the pipeline with its hyperparameter search enabled.
pub fn run_search(config: &RunConfig) -> Result<PipelineOutcome> {
    if config.pipeline.search.is_none() {
        anyhow::bail!("The configuration has no `pipeline.search` block to run");
    }
    run_train(config)
}

/// Decision regions over the two configured features, fitted on the same
/// train/test partition the pipeline used.
fn boundary_section(config: &RunConfig, model: &ModelType, features: &[String]) -> Result<ReportSection> {
    if features.len() != 2 {
        anyhow::bail!(
            "boundary_features must name exactly two features, got {}",
            features.len()
        );
    }
    let dataset = read_delimited_with_config(&config.data, &config.pipeline.loader)?
        .select_features(features)?;
    let (y, encoder) = encode_labels(&dataset.labels)?;
    let split = train_test_split(&dataset.x, &y, config.pipeline.test_fraction, config.pipeline.seed)?;
    let plot = plot_decision_boundary(
        model,
        &split.x_train,
        &split.y_train,
        &split.x_test,
        &split.y_test,
        [features[0].as_str(), features[1].as_str()],
        encoder.classes(),
        BOUNDARY_RESOLUTION,
    )?;

    let mut section = ReportSection::new("Decision Boundary");
    section.add_plot(plot);
    Ok(section)
}

/// Write the HTML report of a `train` or `search` run.
pub fn write_run_report(config: &RunConfig, outcome: &PipelineOutcome, path: &Path) -> Result<()> {
    let mut report = Report::new(
        "cytoclass",
        env!("CARGO_PKG_VERSION"),
        &format!("Cytoclass {} report", outcome.model.name()),
    );

    let mut summary = ReportSection::new("Run Summary");
    summary.add_content(html! {
        ul {
            li { "Data: " (config.data) }
            li { "Classes: " (outcome.classes.join(", ")) }
            li { "Features: " (outcome.feature_names.len()) }
            li { "Training samples: " (outcome.n_train) ", test samples: " (outcome.n_test) }
            li { "Training accuracy: " (format!("{:.4}", outcome.train_accuracy)) }
            li { "Test accuracy: " (format!("{:.4}", outcome.report.accuracy)) }
        }
    });
    summary.add_preformatted(&serde_json::to_string_pretty(&outcome.model)?);
    report.add_section(summary);

    report.add_section(metrics_section(&outcome.report));

    if let Some(search) = &outcome.search {
        report.add_section(search_section(search));
    }

    if let Some(features) = &config.boundary_features {
        report.add_section(
            boundary_section(config, &outcome.model, features)
                .context("Failed to draw the decision boundary")?,
        );
    }

    if !config.histogram_features.is_empty() {
        let dataset = read_delimited_with_config(&config.data, &config.pipeline.loader)?;
        report.add_section(histogram_section(&dataset, &config.histogram_features));
    }

    report.save_to_file(path)
}
