use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use framekit_core::codec::hex_pairs;
use framekit_core::{
    ChecksumAlgorithm, DEFAULT_CHUNK_SIZE, DecodeOptions, DecodeReport, FieldValue, FieldValues,
    Protocol, ProtocolRegistry, RegistryError, SyncConfig, checksum, decode_file, encode,
    validate,
};
use glob::glob;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("FRAMEKIT_BUILD_COMMIT"),
    " ",
    env!("FRAMEKIT_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "framekit")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Protocol-driven binary frame decoder and encoder for captured serial streams.",
    long_about = None,
    after_help = "Examples:\n  framekit decode capture.hex -p telemetry.json -o report.json\n  framekit encode -p telemetry.json --set id=1 --set rpm=1200 --hex\n  framekit validate telemetry.json\n  framekit checksum crc16 \"01 03 00 00 00 0A\"\n\nLogging: set FRAMEKIT_LOG (e.g. FRAMEKIT_LOG=debug) or pass -v."
)]
struct Cli {
    /// Log decoder activity to stderr (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a captured byte stream into a versioned JSON report.
    #[command(alias = "parse")]
    #[command(
        after_help = "Inputs ending in .hex or .txt are read as hex text ('#' starts a comment);\nanything else is read as raw bytes.\n\nExamples:\n  framekit decode capture.hex -p telemetry.json -o report.json\n  framekit parse capture.bin -p telemetry.json --stdout --pretty"
    )]
    Decode(DecodeArgs),
    /// Build one frame from field values.
    Encode(EncodeArgs),
    /// Check a protocol description for structural problems.
    Validate {
        /// Protocol description (JSON)
        protocol: PathBuf,
    },
    /// Compute a checksum over hex bytes.
    Checksum {
        /// sum8, sum16, xor8, crc8, crc16 or crc32
        algorithm: String,
        /// Input bytes as hex ("01 03 00 0A" or "0103000A")
        hex: String,
    },
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Capture file (.hex/.txt text or raw binary); glob patterns must match one file
    input: PathBuf,

    /// Protocol description (JSON)
    #[arg(short, long)]
    protocol: PathBuf,

    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Exit with a non-zero code if any frame is invalid
    #[arg(long)]
    strict: bool,

    /// List invalid frames after decoding
    #[arg(long)]
    list_invalid: bool,

    /// Bytes read per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Garbage bytes scanned before a framing diagnostic
    #[arg(long)]
    max_scan_window: Option<usize>,

    /// Longest frame kept while its end is unknown
    #[arg(long)]
    max_frame_len: Option<usize>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Protocol description (JSON)
    #[arg(short, long)]
    protocol: PathBuf,

    /// Field value as name=value (repeatable); integers accept 0x hex
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// JSON object of field values, applied before --set
    #[arg(long)]
    values: Option<PathBuf>,

    /// Write the frame bytes to a file
    #[arg(short = 'o', long, required_unless_present = "hex")]
    output: Option<PathBuf>,

    /// Print the frame as hex pairs on stdout
    #[arg(long, conflicts_with = "output")]
    hex: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let quiet = matches!(&cli.command, Commands::Decode(args) if args.quiet);
    init_tracing(cli.verbose, quiet);

    let result = match cli.command {
        Commands::Decode(args) => cmd_decode(args),
        Commands::Encode(args) => cmd_encode(args),
        Commands::Validate { protocol } => cmd_validate(&protocol),
        Commands::Checksum { algorithm, hex } => cmd_checksum(&algorithm, &hex),
    };

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

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_env("FRAMEKIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
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

fn cmd_decode(args: DecodeArgs) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    let protocol = load_protocol(&args.protocol)?;

    let report_path = match (&args.report, args.stdout) {
        (_, true) => None,
        (Some(path), false) => {
            ensure_distinct_output(&resolved_input, path)?;
            Some(path.clone())
        }
        (None, false) => {
            return Err(CliError::new(
                "missing output path",
                Some("use -o/--report or --stdout".to_string()),
            ));
        }
    };

    let defaults = SyncConfig::default();
    let options = DecodeOptions {
        sync: SyncConfig {
            max_scan_window: args.max_scan_window.unwrap_or(defaults.max_scan_window),
            max_frame_len: args.max_frame_len.unwrap_or(defaults.max_frame_len),
        },
        chunk_size: args.chunk_size.max(1),
        keep_frames: true,
    };
    debug!(
        input = %resolved_input.display(),
        protocol = %protocol.name,
        chunk_size = options.chunk_size,
        "decoding capture"
    );
    let rep = decode_file(protocol, &resolved_input, options).context("frame decoding failed")?;
    let json = serialize_report(&rep, args.pretty, args.compact)?;

    match report_path {
        None => print!("{}", json),
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory: {}", parent.display())
                    })?;
                }
            }
            fs::write(&path, json)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            if !args.quiet {
                eprintln!(
                    "OK: {} frames ({} invalid) -> {}",
                    rep.summary.frames_total,
                    rep.summary.frames_invalid,
                    path.display()
                );
            }
        }
    }

    if args.list_invalid && !args.quiet {
        print_invalid(&rep);
    }
    if args.strict && rep.summary.frames_invalid > 0 {
        return Err(CliError::new(
            format!("{} invalid frames detected", rep.summary.frames_invalid),
            Some("use --list-invalid to inspect".to_string()),
        ));
    }
    Ok(())
}

fn cmd_encode(args: EncodeArgs) -> Result<(), CliError> {
    let protocol = load_protocol(&args.protocol)?;
    let mut values = match &args.values {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read values: {}", path.display()))?;
            serde_json::from_str::<FieldValues>(&json)
                .with_context(|| format!("Invalid values JSON: {}", path.display()))?
        }
        None => FieldValues::new(),
    };
    for assignment in &args.set {
        let (name, value) = parse_assignment(&protocol, assignment)?;
        values.insert(name, value);
    }

    let frame = encode(&protocol, &values).map_err(|err| {
        CliError::new(
            format!("encoding failed: {err}"),
            Some(format!("fields: {}", field_names(&protocol))),
        )
    })?;

    match args.output {
        Some(path) => {
            fs::write(&path, &frame)
                .with_context(|| format!("Failed to write frame: {}", path.display()))?;
            eprintln!("OK: {} bytes -> {}", frame.len(), path.display());
        }
        None => println!("{}", hex_pairs(&frame)),
    }
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<(), CliError> {
    let protocol = read_protocol(path)?;
    let errors = validate(&protocol);
    if errors.is_empty() {
        println!("OK: protocol '{}' is valid", protocol.name);
        return Ok(());
    }
    eprintln!("Problems in {}:", path.display());
    for error in &errors {
        eprintln!("  {}", error);
    }
    Err(CliError::new(
        format!(
            "protocol '{}' is invalid ({} problems)",
            protocol.name,
            errors.len()
        ),
        Some("fix the listed fields and run validate again".to_string()),
    ))
}

fn cmd_checksum(algorithm: &str, input: &str) -> Result<(), CliError> {
    let algorithm: ChecksumAlgorithm = algorithm.parse().map_err(|err| {
        CliError::new(
            format!("{err}"),
            Some(format!("expected one of: {}", algorithm_names())),
        )
    })?;
    let digits: String = input.split_whitespace().collect();
    let bytes = hex::decode(&digits).map_err(|err| {
        CliError::new(
            format!("invalid hex input: {err}"),
            Some("pass bytes as hex pairs, e.g. \"01 03 00 0A\"".to_string()),
        )
    })?;
    println!("{}", hex_pairs(&checksum::compute(algorithm, &bytes)));
    Ok(())
}

fn read_protocol(path: &Path) -> Result<Protocol, CliError> {
    let json = fs::read_to_string(path).map_err(|err| {
        CliError::new(
            format!("cannot read protocol {}: {}", path.display(), err),
            Some("pass a protocol description with -p/--protocol".to_string()),
        )
    })?;
    Protocol::from_json(&json).map_err(|err| {
        CliError::new(
            format!("invalid protocol JSON {}: {}", path.display(), err),
            Some("fields use camelCase keys: fieldType, byteOrder, ...".to_string()),
        )
    })
}

fn load_protocol(path: &Path) -> Result<Arc<Protocol>, CliError> {
    let mut registry = ProtocolRegistry::new();
    registry
        .register(read_protocol(path)?)
        .map_err(|err| match err {
            RegistryError::Invalid { .. } => CliError::new(
                err.to_string(),
                Some(format!("run `framekit validate {}`", path.display())),
            ),
            other => CliError::new(other.to_string(), None),
        })
}

fn parse_assignment(
    protocol: &Protocol,
    assignment: &str,
) -> Result<(String, FieldValue), CliError> {
    let (name, raw) = assignment.split_once('=').ok_or_else(|| {
        CliError::new(
            format!("invalid assignment '{assignment}'"),
            Some("use --set name=value".to_string()),
        )
    })?;
    let field = protocol.field(name.trim()).ok_or_else(|| {
        CliError::new(
            format!("unknown field '{}'", name.trim()),
            Some(format!("fields: {}", field_names(protocol))),
        )
    })?;
    let value =
        FieldValue::parse_for(field, raw).map_err(|err| CliError::new(err.to_string(), None))?;
    Ok((field.name.clone(), value))
}

fn field_names(protocol: &Protocol) -> String {
    protocol
        .fields
        .iter()
        .map(|field| format!("{} ({})", field.name, field.field_type))
        .collect::<Vec<_>>()
        .join(", ")
}

fn algorithm_names() -> String {
    ChecksumAlgorithm::ALL
        .iter()
        .map(|algorithm| algorithm.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn serialize_report(rep: &DecodeReport, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn print_invalid(rep: &DecodeReport) {
    eprintln!("Invalid frames:");
    for (index, frame) in rep.frames.iter().enumerate().filter(|(_, f)| !f.valid) {
        eprintln!(
            "  #{} {}: {}",
            index,
            hex_pairs(&frame.raw_data),
            frame.error.as_deref().unwrap_or("invalid")
        );
    }
}

fn ensure_distinct_output(input: &Path, report: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    let parent = match report.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(report_dir) = fs::canonicalize(parent) else {
        return Ok(());
    };
    let file_name = report
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!("report path must differ from input: {}", report.display()),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass a .hex/.txt hex capture or a raw binary capture".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("pass a single capture file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
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
            Some("check the path or quote the pattern".to_string()),
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
