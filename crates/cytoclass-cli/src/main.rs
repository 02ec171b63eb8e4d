use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::collections::BTreeMap;
use std::path::PathBuf;

use cytoclass_classifiers::config::{format_params, ModelType, ParamValue, SvmConfig};
use cytoclass_classifiers::io::LoaderConfig;
use cytoclass_classifiers::pipeline::{PipelineOutcome, SearchConfig};
use cytoclass_cli::commands::{
    describe_data, parse_param_values, run_curve, run_search, run_train, write_curve_report,
    write_describe_report, write_run_report,
};
use cytoclass_cli::config::{write_json, RunConfig};

const MODEL_NAMES: [&str; 4] = ["knn", "svm", "logistic", "mlp"];

fn config_arg() -> Arg {
    Arg::new("config")
        .help("Path to the JSON run configuration. Prints a template when omitted.")
        .required(false)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn data_arg() -> Arg {
    Arg::new("data")
        .short('d')
        .long("data")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help("Path to the sample file. Overrides the data file specified in the configuration file.")
        .value_hint(ValueHint::FilePath)
}

fn output_arg() -> Arg {
    Arg::new("output_file")
        .short('o')
        .long("output")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help("JSON file the run outcome is written to. Overrides the configuration file.")
        .value_hint(ValueHint::FilePath)
}

fn no_report_arg() -> Arg {
    Arg::new("no_report")
        .long("no-report")
        .help("Disable HTML report generation.")
        .action(ArgAction::SetTrue)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CYTOCLASS_LOG", "error,cytoclass=info"))
        .init();

    let matches = Command::new("cytoclass")
        .version(clap::crate_version!())
        .about("Classical classifiers and hyperparameter search for tabular cytology data")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("describe")
                .about("Summarize a sample file: class balance, feature statistics, correlations")
                .arg(
                    Arg::new("data")
                        .help("Path to the headerless sample file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("report")
                        .short('r')
                        .long("report")
                        .help("Write an HTML report of the summary to this path")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("train")
                .about("Split, fit and evaluate one classifier")
                .arg(config_arg())
                .arg(data_arg())
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .help(
                            "Model to train with default hyperparameters. \
                             Overrides the model specified in the configuration file.",
                        )
                        .value_parser(MODEL_NAMES),
                )
                .arg(output_arg())
                .arg(no_report_arg()),
        )
        .subcommand(
            Command::new("search")
                .about("Run the configured grid or randomized hyperparameter search, then fit the best model")
                .arg(config_arg())
                .arg(data_arg())
                .arg(output_arg())
                .arg(no_report_arg()),
        )
        .subcommand(
            Command::new("curve")
                .about("Train and test accuracy while one hyperparameter varies")
                .arg(config_arg())
                .arg(data_arg())
                .arg(
                    Arg::new("param")
                        .long("param")
                        .help("Name of the hyperparameter to vary, e.g. n_neighbors")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("values")
                        .long("values")
                        .help("Comma separated values, e.g. 1,3,5 or [64],[64,32]")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("report")
                        .short('o')
                        .long("report")
                        .help("HTML report path")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let (name, sub_m) = match matches.subcommand() {
        Some(pair) => pair,
        None => unreachable!("Subcommand is required by CLI configuration"),
    };
    let result = match name {
        "describe" => handle_describe(sub_m),
        "train" => handle_train(sub_m),
        "search" => handle_search(sub_m),
        "curve" => handle_curve(sub_m),
        _ => unreachable!(),
    };
    if let Err(e) = result {
        log::error!("{} failed: {:#}", name, e);
        std::process::exit(1);
    }
    Ok(())
}

/// Print a template configuration when no config file was passed.
/// Returns the loaded configuration otherwise.
fn load_or_template(matches: &ArgMatches, template: RunConfig) -> Result<Option<RunConfig>> {
    match matches.get_one::<PathBuf>("config") {
        Some(config_path) => {
            log::info!("[cytoclass] Using config: {:?}", config_path);
            Ok(Some(RunConfig::from_arguments(config_path, matches)?))
        }
        None => {
            eprintln!("[cytoclass] No config file provided. Template configuration:");
            println!("{}", serde_json::to_string_pretty(&template)?);
            Ok(None)
        }
    }
}

fn search_template() -> RunConfig {
    let mut grid = BTreeMap::new();
    grid.insert(
        "c".to_string(),
        vec![ParamValue::Float(0.1), ParamValue::Float(1.0), ParamValue::Float(10.0)],
    );
    grid.insert(
        "kernel".to_string(),
        vec![ParamValue::Text("linear".to_string()), ParamValue::Text("rbf".to_string())],
    );
    let mut config = RunConfig::default();
    config.pipeline.model = ModelType::Svm(SvmConfig::default());
    config.pipeline.search = Some(SearchConfig {
        grid,
        ..SearchConfig::default()
    });
    config
}

fn finish_run(config: &RunConfig, outcome: &PipelineOutcome, command: &str, no_report: bool) -> Result<()> {
    println!("{}", outcome.report);
    if let Some(output_file) = &config.output_file {
        write_json(outcome, output_file)?;
    }
    if !no_report {
        write_run_report(config, outcome, &config.report_path(command))?;
    }
    Ok(())
}

fn handle_describe(matches: &ArgMatches) -> Result<()> {
    let data: &PathBuf = matches
        .get_one("data")
        .ok_or_else(|| anyhow::anyhow!("a data file is required"))?;
    let (dataset, summary) = describe_data(data, &LoaderConfig::default())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if let Some(report) = matches.get_one::<PathBuf>("report") {
        write_describe_report(&dataset, &summary, report)?;
    }
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config = match load_or_template(matches, RunConfig::default())? {
        Some(config) => config,
        None => return Ok(()),
    };
    let outcome = run_train(&config)?;
    finish_run(&config, &outcome, "train", matches.get_flag("no_report"))
}

fn handle_search(matches: &ArgMatches) -> Result<()> {
    let config = match load_or_template(matches, search_template())? {
        Some(config) => config,
        None => return Ok(()),
    };
    let outcome = run_search(&config)?;
    if let Some(search) = &outcome.search {
        for candidate in search.ranked() {
            println!(
                "{:>3}  {:.4} +/- {:.4}  {}",
                candidate.rank,
                candidate.mean_score,
                candidate.std_score,
                format_params(&candidate.params)
            );
        }
    }
    finish_run(&config, &outcome, "search", matches.get_flag("no_report"))
}

fn handle_curve(matches: &ArgMatches) -> Result<()> {
    let config = match load_or_template(matches, RunConfig::default())? {
        Some(config) => config,
        None => return Ok(()),
    };
    let parameter = matches
        .get_one::<String>("param")
        .ok_or_else(|| anyhow::anyhow!("--param is required when a config is given"))?;
    let raw_values = matches
        .get_one::<String>("values")
        .ok_or_else(|| anyhow::anyhow!("--values is required when a config is given"))?;
    let values = parse_param_values(raw_values)?;

    let curve = run_curve(&config, parameter, &values)?;
    println!("{:>12}  {:>8}  {:>8}", parameter, "train", "test");
    for point in &curve.points {
        println!(
            "{:>12}  {:>8.4}  {:>8.4}",
            point.value.to_string(),
            point.train_accuracy,
            point.test_accuracy
        );
    }

    let report_path = match matches.get_one::<PathBuf>("report") {
        Some(path) => path.clone(),
        None => PathBuf::from(format!("cytoclass_curve_{}_{}.html", curve.model, parameter)),
    };
    write_curve_report(&curve, &report_path)
}
