//! Docker-builder task kind (SPEC_FULL.md §3.3): a second, fixed-schema
//! parser alongside the generic Proto-Reflective Parser, sharing the Node
//! Model, Environment Expander and Boolean Evaluator.
//!
//! Ported from `pkg/parser/task/dockerbuilder.go`.

use crate::boolevator::Boolevator;
use crate::error::{CompileError, Result};
use crate::node::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsVersion {
    V2019,
    V1709,
    V1803,
}

#[derive(Debug, Clone, Default)]
pub struct DockerBuilder {
    pub alias: Option<String>,
    pub depends_on: Vec<String>,
    pub only_if: Option<String>,
    /// Accepted and parsed, but intentionally a no-op — see
    /// `dockerbuilder.go`'s `use_static_ip` field. Preserved as a documented
    /// no-op rather than silently dropped.
    pub use_static_ip: Option<bool>,
    pub platform: Option<Platform>,
    pub os_version: Option<OsVersion>,
    pub environment: Vec<(String, String)>,
}

/// Parses a `docker_builder` task mapping into a [`DockerBuilder`].
/// `environment` is pre-seeded with `CIRRUS_OS=linux`, overridden to
/// `windows` as a side effect of the `platform` field, matching the Go
/// original's `proto.Environment["CIRRUS_OS"] = platformName` write.
pub fn parse_docker_builder(node: &Node, env: &[(String, String)]) -> Result<DockerBuilder> {
    let mut builder = DockerBuilder { environment: vec![("CIRRUS_OS".to_string(), "linux".to_string())], ..Default::default() };

    for (key, value) in node.as_mapping()? {
        match key {
            "alias" => builder.alias = Some(value.expanded_string(env)?),
            "depends_on" => {
                builder.depends_on = match value {
                    Node::Scalar(..) => vec![value.expanded_string(env)?],
                    Node::Sequence(..) => value.slice_of_expanded_strings(env)?,
                    Node::Mapping(..) => {
                        return Err(CompileError::SchemaMismatch {
                            location: value.location(),
                            message: "depends_on must be a string or list of strings".to_string(),
                        })
                    }
                }
            }
            "only_if" => builder.only_if = Some(value.expanded_string(env)?),
            "use_static_ip" => {
                builder.use_static_ip = Some(value.bool_value(env, &Boolevator::new())?)
            }
            "platform" => {
                let raw = value.expanded_string(env)?;
                let platform = match raw.to_ascii_lowercase().as_str() {
                    "linux" => Platform::Linux,
                    "windows" => Platform::Windows,
                    other => {
                        return Err(CompileError::EnumOutOfRange {
                            value: other.to_string(),
                            allowed: "linux, windows".to_string(),
                            location: value.location(),
                        })
                    }
                };
                builder
                    .environment
                    .retain(|(k, _)| k != "CIRRUS_OS");
                builder.environment.push((
                    "CIRRUS_OS".to_string(),
                    raw.to_ascii_lowercase(),
                ));
                builder.platform = Some(platform);
            }
            "os_version" => {
                let raw = value.expanded_string(env)?;
                builder.os_version = Some(match raw.as_str() {
                    "2019" => OsVersion::V2019,
                    "1709" => OsVersion::V1709,
                    "1803" => OsVersion::V1803,
                    other => {
                        return Err(CompileError::EnumOutOfRange {
                            value: other.to_string(),
                            allowed: "2019, 1709, 1803".to_string(),
                            location: value.location(),
                        })
                    }
                });
            }
            other => {
                return Err(CompileError::UnknownField {
                    key: other.to_string(),
                    location: value.location(),
                })
            }
        }
    }

    Ok(builder)
}

/// Evaluates `only_if` (defaulting to `true` when absent), matching
/// `dockerbuilder.go`'s `Enabled`.
pub fn enabled(builder: &DockerBuilder, env: &[(String, String)], boolevator: &Boolevator) -> Result<bool> {
    match &builder.only_if {
        None => Ok(true),
        Some(expr) if expr.is_empty() => Ok(true),
        Some(expr) => boolevator.eval(expr, env).map_err(|message| CompileError::EvalError {
            location: crate::node::Location::default(),
            message,
        }),
    }
}
