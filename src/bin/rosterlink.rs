use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use rosterlink::config::{
    ConfigOverrides, InputsOverrides, MatchingOverrides, RosterConfig, ENV_CONFIG_PATH,
};
use rosterlink::{ErrorReport, PipelineOutput};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn print_help() {
    eprintln!(
        r#"rosterlink - provider roster deduplication and registry linkage

USAGE:
    rosterlink [OPTIONS]

OPTIONS:
    -c, --config <FILE>        Path to config file (TOML)
    -r, --roster <FILE>        Corrected roster (JSON array of objects)
        --corrections <FILE>   Correction report (JSON object field -> count)
        --identifiers <FILE>   Identifier registry (JSON array)
        --primary-key <FIELD>  Roster primary key [default: provider_id]
    -o, --output-dir <DIR>     Write canonical, duplicate and linked datasets here
    -h, --help                 Print help

ENVIRONMENT:
    ROSTERLINK_CONFIG                   Path to config file
    ROSTERLINK_INPUTS__ROSTER           Roster path
    ROSTERLINK_MATCHING__PRIMARY_KEY    Roster primary key
    RUST_LOG                            Log filter [default: info]

CONFIG FILE (rosterlink.toml):
    [inputs]
    roster = "roster.json"
    corrections = "corrections.json"
    identifiers = "npi.json"

    [inputs.registries]
    CA = "ca_registry.json"
    NY = "ny_registry.json"
"#
    );
}

fn build_overrides() -> ConfigOverrides {
    let mut overrides = ConfigOverrides::default();

    let inputs = InputsOverrides {
        roster: parse_arg("--roster")
            .or_else(|| parse_arg("-r"))
            .map(PathBuf::from),
        corrections: parse_arg("--corrections").map(PathBuf::from),
        identifiers: parse_arg("--identifiers").map(PathBuf::from),
    };
    if inputs.roster.is_some() || inputs.corrections.is_some() || inputs.identifiers.is_some() {
        overrides.inputs = Some(inputs);
    }

    if let Some(primary_key) = parse_arg("--primary-key") {
        overrides.matching = Some(MatchingOverrides {
            primary_key: Some(primary_key),
        });
    }
    overrides
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(&path, raw).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "wrote dataset");
    Ok(())
}

fn write_outputs(dir: &Path, output: &PipelineOutput) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    write_json(dir, "canonical.json", &output.resolution.canonical_table())?;
    write_json(dir, "duplicates.json", &output.resolution.duplicates_table())?;
    for dataset in &output.linked {
        let name = format!("{}_linked.json", dataset.jurisdiction.to_lowercase());
        write_json(dir, &name, &dataset.records)?;
    }
    Ok(())
}

fn run() -> Result<()> {
    // Load config: CLI > Env > File > Defaults
    let config_path = parse_arg("--config")
        .or_else(|| parse_arg("-c"))
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok())
        .map(PathBuf::from);
    let config = RosterConfig::load(config_path.as_deref(), build_overrides())?;

    let inputs = config.inputs.load()?;
    info!(
        records = inputs.roster.len(),
        registries = inputs.registries.len(),
        "inputs loaded"
    );

    let output = config.pipeline().execute(&inputs)?;

    if let Some(dir) = parse_arg("--output-dir").or_else(|| parse_arg("-o")) {
        write_outputs(Path::new(&dir), &output)?;
    }

    println!("{}", serde_json::to_string_pretty(&output.report())?);
    Ok(())
}

fn main() -> ExitCode {
    if has_flag("-h") || has_flag("--help") {
        print_help();
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = ErrorReport::from(&err);
            match serde_json::to_string(&report) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
