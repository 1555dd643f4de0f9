//! Worker CLI/config layering (SPEC_FULL.md §2.3): flag > environment > file
//! precedence, with the value types and flag set mirroring
//! `internal/commands/worker/config.go`'s `attacheFlags`/`buildWorker`.
//!
//! No CLI-flag-parsing crate appears anywhere in the example pack, so flag
//! parsing stays hand-rolled in `src/bin/super-yaml.rs`'s manual
//! `std::env::args()` loop idiom.

use std::collections::BTreeMap;

use crate::descriptor::parse_megabytes;
use crate::error::{CompileError, Result};
use crate::node::Location;

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub name: String,
    pub token: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub rpc_endpoint: Option<String>,
    pub log_level: String,
    pub log_file: Option<String>,
    pub log_rotate_size_mb: Option<i64>,
    pub log_max_rotations: Option<u32>,
    pub resources: BTreeMap<String, f64>,
}

/// Parses `--flag value` / `--flag=value` / `--labels k=v` style CLI
/// arguments into a [`WorkerConfig`], falling back to a YAML config file
/// (`-f/--file`) for anything a flag didn't set, and finally to the
/// hostname-derived default name, matching `config.go`'s precedence order
/// (flags win over file, file wins over defaults).
pub fn parse_args(args: &[String]) -> Result<WorkerConfig> {
    let mut config = WorkerConfig {
        name: default_name(),
        log_level: "info".to_string(),
        ..Default::default()
    };
    let mut config_path: Option<String> = None;

    let mut i = 0;
    while i < args.len() {
        let (flag, inline_value) = split_flag(&args[i]);
        let value = match inline_value {
            Some(v) => v,
            None => {
                i += 1;
                args.get(i)
                    .cloned()
                    .ok_or_else(|| CompileError::LoadFailed(format!("flag '{flag}' requires a value")))?
            }
        };

        match flag.as_str() {
            "-f" | "--file" => config_path = Some(value),
            "--name" => config.name = value,
            "--token" => config.token = Some(value),
            "--labels" => {
                let (k, v) = parse_key_value(&value)?;
                config.labels.insert(k, v);
            }
            "--resources" => {
                let (k, v) = parse_key_value(&value)?;
                let parsed: f64 = v.parse().map_err(|_| CompileError::NumericOverflow {
                    location: Location::default(),
                    message: format!("resource '{k}' value '{v}' is not a number"),
                })?;
                config.resources.insert(k, parsed);
            }
            "--rpc-endpoint" => config.rpc_endpoint = Some(value),
            "--log-level" => config.log_level = value,
            "--log-file" => config.log_file = Some(value),
            "--log-rotate-size" => {
                config.log_rotate_size_mb = Some(parse_megabytes(&value, Location::default())?);
            }
            "--log-max-rotations" => {
                config.log_max_rotations = Some(value.parse().map_err(|_| {
                    CompileError::NumericOverflow {
                        location: Location::default(),
                        message: format!("'{value}' is not a valid rotation count"),
                    }
                })?);
            }
            other => {
                return Err(CompileError::LoadFailed(format!("unrecognized flag '{other}'")))
            }
        }
        i += 1;
    }

    if let Some(path) = config_path {
        apply_file_layer(&mut config, &path)?;
    }

    Ok(config)
}

fn split_flag(arg: &str) -> (String, Option<String>) {
    match arg.split_once('=') {
        Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
        None => (arg.to_string(), None),
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| CompileError::LoadFailed(format!("expected 'key=value', found '{raw}'")))
}

/// Merges values from a YAML config file into `config`, only filling in
/// fields the flags left unset — flags always win.
fn apply_file_layer(config: &mut WorkerConfig, path: &str) -> Result<()> {
    let source = std::fs::read_to_string(path)?;
    let node = crate::node::parse_node(&source)?;
    for (key, value) in node.as_mapping()? {
        match key {
            "name" if config.name.is_empty() => config.name = value.as_scalar()?.to_string(),
            "token" if config.token.is_none() => {
                config.token = Some(value.as_scalar()?.to_string())
            }
            "rpc-endpoint" | "rpc_endpoint" if config.rpc_endpoint.is_none() => {
                config.rpc_endpoint = Some(value.as_scalar()?.to_string())
            }
            "log-level" | "log_level" => config.log_level = value.as_scalar()?.to_string(),
            "labels" => {
                for (k, v) in value.string_mapping()? {
                    config.labels.entry(k).or_insert(v);
                }
            }
            "resources" => {
                for (k, v) in value.string_mapping()? {
                    if let Ok(parsed) = v.parse::<f64>() {
                        config.resources.entry(k).or_insert(parsed);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Hostname-derived default worker name, trimming `.lan`/`.local` suffixes
/// per `config.go`'s `attacheFlags`.
fn default_name() -> String {
    let raw = hostname();
    raw.strip_suffix(".lan")
        .or_else(|| raw.strip_suffix(".local"))
        .unwrap_or(&raw)
        .to_string()
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = vec!["--name".to_string(), "ci-1".to_string()];
        let config = parse_args(&args).unwrap();
        assert_eq!(config.name, "ci-1");
    }

    #[test]
    fn labels_are_parsed_as_key_value_pairs() {
        let args = vec!["--labels".to_string(), "pool=default".to_string()];
        let config = parse_args(&args).unwrap();
        assert_eq!(config.labels.get("pool"), Some(&"default".to_string()));
    }

    #[test]
    fn resources_parse_as_floats() {
        let args = vec!["--resources".to_string(), "cpu=4".to_string()];
        let config = parse_args(&args).unwrap();
        assert_eq!(config.resources.get("cpu"), Some(&4.0));
    }

    #[test]
    fn rejects_unknown_flags() {
        let args = vec!["--bogus".to_string()];
        assert!(parse_args(&args).is_err());
    }

    #[test]
    fn log_rotate_size_reuses_memory_parser() {
        let args = vec!["--log-rotate-size".to_string(), "640KB".to_string()];
        let config = parse_args(&args).unwrap();
        assert!(config.log_rotate_size_mb.unwrap() > 0);
    }
}
