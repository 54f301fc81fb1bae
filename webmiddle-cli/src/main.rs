// webmiddle CLI
// Evaluates one registered service and prints the resulting resource

mod services;

use anyhow::Context as _;
use clap::Parser;
use indexmap::IndexMap;
use tokio::task::LocalSet;
use tracing::{info, warn};
use webmiddle::serialization::json_to_value;
use webmiddle::{create_context, Inspect, LazySerializer, Options, RootSource, Settings, Value};

#[derive(Parser, Debug)]
#[command(name = "webmiddle")]
#[command(about = "Evaluate a webmiddle service and print its resource")]
struct Args {
    /// Path to settings file (TOML format)
    #[arg(long, env = "WEBMIDDLE_CONFIG")]
    config: Option<String>,

    /// Service path to evaluate
    #[arg(long, default_value = "resource")]
    service: String,

    /// Service props as a JSON object
    #[arg(long, default_value = "{}")]
    props: String,

    /// Record and print the call tree
    #[arg(long, env = "WEBMIDDLE_DEBUG")]
    debug: bool,

    /// Depth budget of the printed call tree
    #[arg(long)]
    depth: Option<usize>,

    /// Settings resolved from the config file and flags
    #[arg(skip)]
    settings: Settings,
}

impl Args {
    /// Merge with the settings file if one is given.
    /// Flags take precedence over file values.
    fn merge_with_config(mut self) -> anyhow::Result<Self> {
        if let Some(path) = &self.config {
            self.settings = Settings::load(path)
                .with_context(|| format!("failed to load settings from {}", path))?;
            info!("Loaded settings from: {}", path);
        }
        if self.debug {
            self.settings.evaluation.debug = true;
        }
        if let Some(depth) = self.depth {
            self.settings.serialization.max_depth = depth;
        }
        Ok(self)
    }

    fn attributes(&self) -> anyhow::Result<IndexMap<String, Value>> {
        let raw: serde_json::Value =
            serde_json::from_str(&self.props).context("--props must be valid JSON")?;
        match json_to_value(raw) {
            Value::Object(attributes) => Ok(attributes),
            other => anyhow::bail!("--props must be a JSON object, got {}", other.type_name()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("webmiddle=info".parse()?),
        )
        .with_ansi(false)
        .init();

    let args = Args::parse().merge_with_config()?;
    let attributes = args.attributes()?;
    let settings = args.settings.clone();
    let inspector = LazySerializer::from_settings(&settings.serialization);
    let debug = settings.evaluation.debug;

    let source = RootSource::new(services::builtin())
        .with_settings(settings)
        .with_path("cli");
    let context = create_context(source, Options::new());
    info!("Evaluating service: {}", args.service);

    // combinators spawn their children as local tasks
    let outcome = LocalSet::new()
        .run_until(context.evaluate_service(&args.service, attributes))
        .await;

    if debug {
        let tree = inspector.serialize(&Inspect::CallNodes(context.call_state()));
        eprintln!("{}", serde_json::to_string_pretty(&tree)?);
    }

    let value = outcome.with_context(|| format!("service '{}' failed", args.service))?;
    match value.as_resource() {
        Some(resource) => println!("{}", context.stringify_resource(resource)?),
        None => {
            warn!("Service returned a {} rather than a resource", value.type_name());
            let rendered = inspector.serialize(&Inspect::Value(value.clone()));
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }
    Ok(())
}
