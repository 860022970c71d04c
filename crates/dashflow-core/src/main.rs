use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dashflow_config::ConfigGenerator;
use dashflow_core::telemetry::init_tracing;
use dashflow_core::{DashboardRuntime, RuntimeSettings, WidgetDefinition};
use dashflow_types::{ContentHash, DataSourceConfig};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn cli() -> Command {
    Command::new("dashflow")
        .version(dashflow_core::VERSION)
        .about("Widget data pipeline runner")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("run")
                .about("Run widget pipelines and print their payloads")
                .arg(
                    Arg::new("widget")
                        .long("widget")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Widget definition file (JSON)"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_parser(value_parser!(PathBuf))
                        .help("Runtime settings file (TOML)"),
                )
                .arg(
                    Arg::new("watch")
                        .long("watch")
                        .action(ArgAction::SetTrue)
                        .help("Keep polling and print payloads as they change"),
                ),
        )
        .subcommand(
            Command::new("generate")
                .about("Print the data source configs generated for widgets")
                .arg(
                    Arg::new("widget")
                        .long("widget")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Widget definition file (JSON)"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a data source config")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Data source config file (JSON)"),
                ),
        )
}

fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("--{name} is required"))
}

fn read_widgets(args: &ArgMatches) -> anyhow::Result<Vec<WidgetDefinition>> {
    let path = path_arg(args, "widget")?;
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    WidgetDefinition::parse_many(&text).with_context(|| format!("parsing {}", path.display()))
}

async fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let settings = match args.get_one::<PathBuf>("settings") {
        Some(path) => RuntimeSettings::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeSettings::default(),
    };
    let widgets = read_widgets(args)?;
    let runtime = DashboardRuntime::create(settings)?;
    runtime.initialize()?;

    let mut payloads = Map::new();
    for widget in widgets {
        let component = widget.component_id().clone();
        runtime
            .add_widget(widget)
            .with_context(|| format!("adding widget {component}"))?;
        let payload = runtime.execute(component.as_str()).await?;
        payloads.insert(component.to_string(), payload.into_value());
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(payloads))?);

    if args.get_flag("watch") {
        watch(&runtime).await?;
    }
    runtime.dispose();
    Ok(())
}

async fn watch(runtime: &DashboardRuntime) -> anyhow::Result<()> {
    let mut seen: HashMap<String, ContentHash> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                for component in runtime.widget_ids() {
                    let Some(payload) = runtime.payload(component.as_str()) else { continue };
                    let value = payload.into_value();
                    let hash = ContentHash::of_value(&value);
                    if seen.insert(component.to_string(), hash) != Some(hash) {
                        println!("{}", serde_json::json!({ "component": component, "payload": value }));
                    }
                }
            }
        }
    }
}

fn generate(args: &ArgMatches) -> anyhow::Result<()> {
    let generator = ConfigGenerator::default();
    let mut configs = Vec::new();
    for widget in read_widgets(args)? {
        configs.push(generator.generate_config(&widget.requirement, &widget.inputs)?);
    }
    println!("{}", serde_json::to_string_pretty(&configs)?);
    Ok(())
}

fn validate(args: &ArgMatches) -> anyhow::Result<bool> {
    let path = path_arg(args, "config")?;
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: DataSourceConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let report = ConfigGenerator::default().validate_config(&config);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.valid)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("run", args)) => run(args).await,
        Some(("generate", args)) => generate(args),
        Some(("validate", args)) => {
            if !validate(args)? {
                std::process::exit(1);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
