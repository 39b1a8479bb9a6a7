use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use glob::glob;
use layerforge_core::packet::Value;
use layerforge_core::packet::value::{from_hex, to_hex};
use layerforge_core::protocols::knx::layout::{
    CONNECTION_TYPES, DESCRIPTION_TYPES, HOST_PROTOCOLS, KNX_MEDIUMS, MESSAGE_CODES, SERVICES,
};
use layerforge_core::{CodeTable, Descriptor, FrameError, InspectReport, KNX_PORT, KnxFrame};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("LAYERFORGE_BUILD_COMMIT"),
    ", built ",
    env!("LAYERFORGE_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "layerforge")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Build, decode and inspect KNXnet/IP frames without hand-encoding bytes.",
    long_about = None,
    after_help = "Examples:\n  layerforge build DESCRIPTION_REQUEST --set port=60000\n  layerforge build TUNNELING_REQUEST --cemi L_Data.req --set data=4 --format json\n  layerforge decode 06100203000e0801000000000000\n  layerforge inspect capture.pcapng -o report.json"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a frame from a service name or code and print its bytes.
    #[command(
        after_help = "Values are integers (decimal or 0x-prefixed) or text; addresses such as\n192.168.1.1, 1.1.5 and 1/2/3 are converted by the field they are assigned to."
    )]
    Build {
        /// Service name (e.g. "DESCRIPTION REQUEST") or code (e.g. 0x0203)
        service: String,

        /// cEMI message name (e.g. L_Data.req) or code
        #[arg(long)]
        cemi: Option<String>,

        /// Assign a field, NAME=VALUE (repeatable, applied in order)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        sets: Vec<String>,

        /// Assign raw wire bytes to a field, NAME=HEX (repeatable, applied in
        /// command-line order together with --set)
        #[arg(long = "raw", value_name = "NAME=HEX")]
        raws: Vec<String>,

        #[arg(long, value_enum, default_value = "hex")]
        format: OutputFormat,
    },
    /// Decode a hex-encoded KNXnet/IP frame and print it as JSON.
    Decode {
        /// Frame bytes as hex (whitespace and ':' separators allowed)
        hex: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Decode every KNXnet/IP datagram of a capture into a JSON report.
    #[command(
        after_help = "Examples:\n  layerforge inspect capture.pcapng -o report.json\n  layerforge inspect 'captures/*.pcap' --stdout --pretty"
    )]
    Inspect {
        /// Path to a .pcap or .pcapng file (glob patterns must match one file)
        input: PathBuf,

        /// Output report path (JSON)
        #[arg(short = 'o', long, required_unless_present = "stdout")]
        report: Option<PathBuf>,

        /// Write JSON report to stdout
        #[arg(long, conflicts_with = "report")]
        stdout: bool,

        /// UDP port carrying KNXnet/IP traffic
        #[arg(long, default_value_t = KNX_PORT)]
        port: u16,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,
    },
    /// List known type names and codes.
    Types {
        #[arg(value_enum, default_value = "services")]
        table: TypeTable,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Hex,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TypeTable {
    Services,
    Cemi,
    HostProtocols,
    DescriptionTypes,
    ConnectionTypes,
    Mediums,
}

impl TypeTable {
    fn table(self) -> &'static CodeTable {
        match self {
            TypeTable::Services => &SERVICES,
            TypeTable::Cemi => &MESSAGE_CODES,
            TypeTable::HostProtocols => &HOST_PROTOCOLS,
            TypeTable::DescriptionTypes => &DESCRIPTION_TYPES,
            TypeTable::ConnectionTypes => &CONNECTION_TYPES,
            TypeTable::Mediums => &KNX_MEDIUMS,
        }
    }
}

fn main() -> ExitCode {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    let build_matches = matches.subcommand_matches("build");

    let result = setup_logging(&cli.log_level, cli.json_logs)
        .map_err(|err| {
            CliError::new(
                err.to_string(),
                Some("use trace, debug, info, warn or error".to_string()),
            )
        })
        .and_then(|()| match cli.command {
            Commands::Build {
                service,
                cemi,
                sets,
                raws,
                format,
            } => {
                let assignments = build_matches
                    .map(|matches| ordered_assignments(matches, sets, raws))
                    .unwrap_or_default();
                cmd_build(&service, cemi.as_deref(), &assignments, format)
            }
            Commands::Decode { hex, pretty } => cmd_decode(&hex, pretty),
            Commands::Inspect {
                input,
                report,
                stdout,
                port,
                pretty,
                quiet,
            } => cmd_inspect(input, report, stdout, port, pretty, quiet),
            Commands::Types { table } => {
                cmd_types(table);
                Ok(())
            }
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install logger")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install logger")?;
    }

    Ok(())
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<FrameError> for CliError {
    fn from(err: FrameError) -> Self {
        let hint = match &err {
            FrameError::InvalidType(_) | FrameError::UnknownType { .. } => {
                Some("run `layerforge types` (or `layerforge types cemi`) for known names".to_string())
            }
            FrameError::IncompatibleSubtype { .. } => Some(
                "only CONFIGURATION_REQUEST and TUNNELING_REQUEST carry a cEMI message".to_string(),
            ),
            FrameError::FieldNotFound { .. } => {
                Some("use --format json to list the frame's fields".to_string())
            }
            _ => None,
        };
        CliError::new(err.to_string(), hint)
    }
}

/// One `--set` or `--raw` flag, kept in command-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Assignment {
    Value(String),
    Raw(String),
}

/// Merge `--set` and `--raw` values by their position on the command line.
fn ordered_assignments(
    matches: &ArgMatches,
    sets: Vec<String>,
    raws: Vec<String>,
) -> Vec<Assignment> {
    let indices = |id: &str| -> Vec<usize> {
        matches
            .indices_of(id)
            .map(|indices| indices.collect())
            .unwrap_or_default()
    };
    let mut ordered: Vec<(usize, Assignment)> = indices("sets")
        .into_iter()
        .zip(sets.into_iter().map(Assignment::Value))
        .chain(
            indices("raws")
                .into_iter()
                .zip(raws.into_iter().map(Assignment::Raw)),
        )
        .collect();
    ordered.sort_by_key(|(index, _)| *index);
    ordered.into_iter().map(|(_, assignment)| assignment).collect()
}

fn cmd_build(
    service: &str,
    cemi: Option<&str>,
    assignments: &[Assignment],
    format: OutputFormat,
) -> Result<(), CliError> {
    let mut builder = KnxFrame::builder().service(parse_descriptor(service));
    if let Some(cemi) = cemi {
        builder = builder.cemi(parse_descriptor(cemi));
    }
    for assignment in assignments {
        builder = match assignment {
            Assignment::Value(assignment) => {
                let (name, value) = split_assignment(assignment, "--set")?;
                builder.field(name, parse_value(value))
            }
            Assignment::Raw(assignment) => {
                let (name, hex) = split_assignment(assignment, "--raw")?;
                let bytes = from_hex(hex).ok_or_else(|| {
                    CliError::new(
                        format!("invalid hex for field '{name}': {hex}"),
                        Some("use an even number of hex digits, e.g. c0a8012a".to_string()),
                    )
                })?;
                builder.raw_field(name, bytes)
            }
        };
    }
    let frame = builder.build()?;
    let bytes = frame.to_bytes()?;
    tracing::info!(frame = %frame.summary(), bytes = bytes.len(), "frame built");
    match format {
        OutputFormat::Hex => println!("{}", to_hex(&bytes)),
        OutputFormat::Json => println!("{}", frame_json(&frame, &bytes, true)?),
    }
    Ok(())
}

fn cmd_decode(hex: &str, pretty: bool) -> Result<(), CliError> {
    let bytes = from_hex(hex).ok_or_else(|| {
        CliError::new(
            format!("invalid hex input: {hex}"),
            Some("use an even number of hex digits, e.g. 0610020300".to_string()),
        )
    })?;
    let frame = KnxFrame::from_bytes(&bytes)?;
    println!("{}", frame_json(&frame, &bytes, pretty)?);
    Ok(())
}

/// JSON view of a built or decoded frame.
#[derive(Serialize)]
struct FrameView<'a> {
    #[serde(rename = "type")]
    type_name: &'a str,
    summary: String,
    length: usize,
    bytes: String,
    layers: &'a KnxFrame,
}

fn frame_json(frame: &KnxFrame, bytes: &[u8], pretty: bool) -> Result<String, CliError> {
    let view = FrameView {
        type_name: frame.type_name(),
        summary: frame.summary(),
        length: bytes.len(),
        bytes: to_hex(bytes),
        layers: frame,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&view)
    } else {
        serde_json::to_string(&view)
    };
    json.context("JSON serialization failed").map_err(Into::into)
}

fn cmd_types(table: TypeTable) {
    for (code, name) in table.table().iter() {
        println!("{code:#06x}  {name}");
    }
}

fn cmd_inspect(
    input: PathBuf,
    report: Option<PathBuf>,
    stdout: bool,
    port: u16,
    pretty: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;
    let report = if stdout {
        None
    } else {
        let report = report.ok_or_else(|| {
            CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            )
        })?;
        ensure_distinct_output(&report, &input_abs)?;
        Some(report)
    };

    let rep = layerforge_core::inspect_capture_file(&resolved_input, port)
        .context("capture inspection failed")?;
    let json = serialize_report(&rep, pretty)?;

    let Some(report) = report else {
        print!("{}", json);
        return Ok(());
    };
    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(&report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;
    if !quiet {
        eprintln!("OK: report written -> {}", report.display());
    }
    Ok(())
}

fn ensure_distinct_output(report: &Path, input_abs: &Path) -> Result<(), CliError> {
    let Some(parent) = report.parent() else {
        return Ok(());
    };
    let dir = if parent.as_os_str().is_empty() {
        fs::canonicalize(".")
    } else {
        fs::canonicalize(parent)
    };
    // A parent that does not exist yet cannot hold the input.
    let Ok(dir) = dir else {
        return Ok(());
    };
    let file_name = report
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path: {}", report.display()))?;
    if dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!("report path must differ from input: {}", report.display()),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(rep: &InspectReport, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(rep)
    } else {
        serde_json::to_string(rep)
    };
    json.context("JSON serialization failed").map_err(Into::into)
}

fn split_assignment<'a>(assignment: &'a str, flag: &str) -> Result<(&'a str, &'a str), CliError> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => Err(CliError::new(
            format!("invalid {flag} argument '{assignment}'"),
            Some(format!("expected NAME=VALUE, e.g. {flag} port=3671")),
        )),
    }
}

fn parse_int(text: &str) -> Option<u64> {
    let text = text.trim();
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn parse_descriptor(text: &str) -> Descriptor {
    match parse_int(text) {
        Some(code) => Descriptor::Code(code),
        None => Descriptor::from(text),
    }
}

fn parse_value(text: &str) -> Value {
    match parse_int(text) {
        Some(value) => Value::Int(value),
        None => Value::from(text),
    }
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "pcap" && ext != "pcapng" {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap or .pcapng file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected .pcap or .pcapng".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        count => {
            let mut listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            if count > 3 {
                listed.push_str(", ...");
            }
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({count} matches); matches: {listed}"),
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
