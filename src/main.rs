use serde::Serialize;
use tracing_subscriber::EnvFilter;

use chainwatch_risk::config::Config;
use chainwatch_risk::ingest;
use chainwatch_risk::pipeline::RiskPipeline;
use chainwatch_risk::registry::ExploitFilter;
use chainwatch_risk::tx::Address;

const USAGE: &str = "usage: chainwatch-risk <config.toml> <command> [args]

commands:
  analyze <tx.json>                 score one transaction
  batch <txs.json|txs.csv>          score every transaction in a file
  address <0x...> [history]         registry, behavioral and cluster report
  exploits [chain]                  list the known-exploit catalogue
  rules                             list the signature rules
  model                             anomaly model info and feature importance";

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so stdout stays machine-readable (set RUST_LOG=debug for detail)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command) = match (args.first(), args.get(1)) {
        (Some(config), Some(command)) => (config.as_str(), command.as_str()),
        _ => return Err(eyre::eyre!("{}", USAGE)),
    };
    let rest = &args[2..];

    let config = Config::load(config_path)?;
    tracing::info!("Configuration loaded from {}", config_path);

    let pipeline = RiskPipeline::init(&config)?;

    match command {
        "analyze" => {
            let path = required(rest, 0, "analyze <tx.json>")?;
            let tx = ingest::read_transaction_json(path)?;
            print_json(&pipeline.analyze_transaction(&tx, &[]))
        }
        "batch" => {
            let path = required(rest, 0, "batch <txs.json|txs.csv>")?;
            let ingested = ingest::read_transactions(path)?;
            if !ingested.rejected.is_empty() {
                tracing::warn!(rejected = ingested.rejected.len(), "Some rows were skipped");
            }
            // Each transaction is scored against the whole file as history
            print_json(&pipeline.analyze_batch(&ingested.records, &ingested.records))
        }
        "address" => {
            let raw = required(rest, 0, "address <0x...> [history]")?;
            let address = Address::parse(raw)?;
            let history = match rest.get(1) {
                Some(path) => Some(ingest::read_transactions(path)?.records),
                None => None,
            };
            print_json(&pipeline.assess_address(&address, history.as_deref(), None))
        }
        "exploits" => {
            let filter = ExploitFilter {
                chain: rest.first().cloned(),
                attack_type: None,
            };
            print_json(&pipeline.registry.known_exploits(&filter))
        }
        "rules" => print_json(&pipeline.engine.rules().rule_catalog()),
        "model" => match pipeline.engine.scorer() {
            Some(scorer) => {
                print_json(&scorer.model_info())?;
                print_json(&scorer.feature_importance()?)
            }
            None => print_json(&serde_json::json!({ "is_trained": false })),
        },
        other => Err(eyre::eyre!("unknown command '{}'\n\n{}", other, USAGE)),
    }
}

fn required<'a>(args: &'a [String], idx: usize, usage: &str) -> eyre::Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| eyre::eyre!("missing argument: {}", usage))
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| eyre::eyre!("Failed to serialize output: {}", e))?;
    println!("{}", out);
    Ok(())
}
