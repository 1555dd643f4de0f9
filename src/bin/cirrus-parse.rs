use std::{collections::HashSet, env, path::PathBuf, process::ExitCode, time::Duration};

use cirrus_parse::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};
use cirrus_parse::vfs::{CachingFs, DummyFs, LocalFs};
use cirrus_parse::vm::CancelToken;
use cirrus_parse::{collect_env, compile_script, compile_yaml, EnvProvider, ProcessEnvProvider};

#[derive(Clone, Copy, Debug)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug)]
enum InputKind {
    Yaml,
    Script,
}

#[derive(Debug)]
struct CompileOptions {
    pretty: bool,
    format: OutputFormat,
    input_kind: InputKind,
    load_root: Option<PathBuf>,
    allowed_env_keys: Vec<String>,
}

/// Env provider that allows only explicitly listed process env keys, so a
/// script's environment stays hermetic (invariant I4) unless the caller
/// opts a key in.
struct AllowListEnvProvider {
    allowed_env_keys: HashSet<String>,
    process_env: ProcessEnvProvider,
}

impl AllowListEnvProvider {
    fn new(allowed_env_keys: HashSet<String>) -> Self {
        Self { allowed_env_keys, process_env: ProcessEnvProvider }
    }
}

impl EnvProvider for AllowListEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        if self.allowed_env_keys.contains(key) {
            self.process_env.get(key)
        } else {
            None
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    if args.len() < 4 {
        return Err("not enough arguments".to_string());
    }

    let command = args[1].as_str();
    let descriptor_file = PathBuf::from(&args[2]);
    let source_file = PathBuf::from(&args[3]);

    match command {
        "validate" | "compile" => {
            let options = parse_compile_options(&args[4..])?;
            let descriptor = load_descriptor(&descriptor_file)?;
            let allowed: HashSet<String> = options.allowed_env_keys.iter().cloned().collect();
            let env_provider = AllowListEnvProvider::new(allowed);
            let env = collect_env(&env_provider, &options.allowed_env_keys);
            let source = std::fs::read_to_string(&source_file).map_err(|e| e.to_string())?;

            let message = match options.input_kind {
                InputKind::Yaml => compile_yaml(&source, &descriptor, &env).map_err(|e| e.to_string())?,
                InputKind::Script => {
                    let fs: Box<dyn cirrus_parse::vfs::FileSystem> = match &options.load_root {
                        Some(root) => Box::new(CachingFs::wrap(Box::new(LocalFs::new(root.clone())))),
                        None => Box::new(DummyFs::new()),
                    };
                    compile_script(&source, &descriptor, &env, fs, CancelToken::new(), Duration::from_millis(50))
                        .map_err(|e| e.to_string())?
                        .message
                }
            };

            if command == "validate" {
                println!("OK");
                return Ok(());
            }

            let rendered = message.to_json();
            let output = match options.format {
                OutputFormat::Json if options.pretty => {
                    serde_json::to_string_pretty(&rendered).map_err(|e| e.to_string())?
                }
                OutputFormat::Json => serde_json::to_string(&rendered).map_err(|e| e.to_string())?,
                OutputFormat::Yaml => cirrus_parse::yaml_writer::to_yaml_string(&rendered),
            };
            println!("{output}");
            Ok(())
        }
        _ => Err(format!("unknown command '{command}'")),
    }
}

/// Loads a minimal descriptor document: a mapping of field name to a kind
/// tag (`string`, `int64`, `uint64`, `int32`, `uint32`, `float`, `double`,
/// `bool`, `{enum: [a, b]}`, `{message: repeated}`/`{message: map}`/
/// `{message: singular}`). This is the CLI's own on-disk stand-in for the
/// "target protobuf message descriptor set" spec.md §6 names as an external
/// input — the core library itself is reflective and descriptor-agnostic.
fn load_descriptor(path: &PathBuf) -> Result<MessageDescriptor, String> {
    let source = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let node = cirrus_parse::node::parse_node(&source).map_err(|e| e.to_string())?;
    let mut descriptor = MessageDescriptor::new();
    for (name, value) in node.as_mapping().map_err(|e| e.to_string())? {
        let (kind, cardinality) = match value {
            cirrus_parse::node::Node::Scalar(..) => {
                (scalar_kind(value.as_scalar().map_err(|e| e.to_string())?)?, Cardinality::Singular)
            }
            cirrus_parse::node::Node::Mapping(..) => {
                let fields = value.as_mapping().map_err(|e| e.to_string())?;
                if let Some((_, enum_values)) = fields.iter().find(|(k, _)| *k == "enum") {
                    let values = enum_values.slice_of_expanded_strings(&[]).map_err(|e| e.to_string())?;
                    (FieldKind::Enum(values), Cardinality::Singular)
                } else if let Some((_, cardinality_node)) = fields.iter().find(|(k, _)| *k == "message") {
                    let cardinality = match cardinality_node.as_scalar().map_err(|e| e.to_string())? {
                        "repeated" => Cardinality::Repeated,
                        "map" => Cardinality::Map,
                        _ => Cardinality::Singular,
                    };
                    (FieldKind::Message(Box::new(MessageDescriptor::new())), cardinality)
                } else {
                    return Err(format!("field '{name}' has an unrecognized descriptor shape"));
                }
            }
            cirrus_parse::node::Node::Sequence(..) => {
                return Err(format!("field '{name}' has an unrecognized descriptor shape"))
            }
        };
        descriptor.push(FieldDescriptor { name: name.to_string(), kind, cardinality });
    }
    Ok(descriptor)
}

fn scalar_kind(tag: &str) -> Result<FieldKind, String> {
    Ok(match tag {
        "string" => FieldKind::String,
        "int64" => FieldKind::Int64,
        "uint64" => FieldKind::Uint64,
        "int32" => FieldKind::Int32,
        "uint32" => FieldKind::Uint32,
        "float" => FieldKind::Float,
        "double" => FieldKind::Double,
        "bool" => FieldKind::Bool,
        other => return Err(format!("unrecognized descriptor kind '{other}'")),
    })
}

fn parse_compile_options(args: &[String]) -> Result<CompileOptions, String> {
    let mut pretty = false;
    let mut format = OutputFormat::Json;
    let mut input_kind = InputKind::Yaml;
    let mut load_root = None;
    let mut allowed_env_keys = Vec::new();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--pretty" => {
                pretty = true;
                i += 1;
            }
            "--yaml" => {
                format = OutputFormat::Yaml;
                i += 1;
            }
            "--json" => {
                format = OutputFormat::Json;
                i += 1;
            }
            "--script" => {
                input_kind = InputKind::Script;
                i += 1;
            }
            "--load-root" => {
                if i + 1 >= args.len() {
                    return Err("missing value for --load-root".to_string());
                }
                load_root = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--allow-env" => {
                if i + 1 >= args.len() {
                    return Err(
                        "missing value for --allow-env (expected environment variable name)".to_string(),
                    );
                }
                let key = args[i + 1].trim();
                if key.is_empty() {
                    return Err("--allow-env value must be non-empty".to_string());
                }
                allowed_env_keys.push(key.to_string());
                i += 2;
            }
            other => return Err(format!("unknown option '{other}'")),
        }
    }

    Ok(CompileOptions { pretty, format, input_kind, load_root, allowed_env_keys })
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  cirrus-parse validate <descriptor.yaml> <source> [--script] [--allow-env KEY]...");
    eprintln!(
        "  cirrus-parse compile <descriptor.yaml> <source> [--pretty] [--json|--yaml] [--script] [--load-root DIR] [--allow-env KEY]..."
    );
    eprintln!(
        "note: environment access is disabled by default; use --allow-env to permit specific keys."
    );
}

#[cfg(test)]
mod tests {
    use super::{parse_compile_options, OutputFormat};

    #[test]
    fn parse_compile_yaml_format() {
        let args = vec!["--yaml".to_string()];
        let options = parse_compile_options(&args).unwrap();
        assert!(!options.pretty);
        assert!(matches!(options.format, OutputFormat::Yaml));
        assert!(options.allowed_env_keys.is_empty());
    }

    #[test]
    fn parse_compile_script_flag() {
        let args = vec!["--script".to_string()];
        let options = parse_compile_options(&args).unwrap();
        assert!(matches!(options.input_kind, super::InputKind::Script));
    }

    #[test]
    fn parse_compile_allow_env_repeatable() {
        let args = vec![
            "--allow-env".to_string(),
            "CPU_CORES".to_string(),
            "--allow-env".to_string(),
            "DB_HOST".to_string(),
        ];
        let options = parse_compile_options(&args).unwrap();
        assert!(options.allowed_env_keys.contains(&"CPU_CORES".to_string()));
        assert!(options.allowed_env_keys.contains(&"DB_HOST".to_string()));
    }

    #[test]
    fn parse_allow_env_requires_value() {
        let args = vec!["--allow-env".to_string()];
        let err = parse_compile_options(&args).unwrap_err();
        assert!(err.contains("missing value for --allow-env"));
    }

    #[test]
    fn parse_load_root() {
        let args = vec!["--load-root".to_string(), "scripts/".to_string()];
        let options = parse_compile_options(&args).unwrap();
        assert_eq!(options.load_root, Some(std::path::PathBuf::from("scripts/")));
    }
}
