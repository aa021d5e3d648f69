//! Purpose: `coltab` CLI entry point and command definitions.
//! Role: Binary crate root; parses args, runs commands, emits text or JSON on stdout.
//! Invariants: `show` writes table text to stdout; other commands emit JSON.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Recovered ingestion failures are reported as notices, never as errors.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use coltab::api::{
    Column, ColumnType, DEFAULT_DELIMITER, DEFAULT_MAX_OPEN_ENTITIES, Error, ErrorKind,
    FieldFailure, ReadOptions, Table, to_exit_code,
};
use coltab::notice::{Notice, field_failures_notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, color_mode)
        .map_err(add_schema_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "coltab",
    version,
    about = "Typed columnar tables from delimited text, split into per-entity record files",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Columns are text unless declared otherwise. Declared types: text, double, date.

Mental model:
  - `show` reads a CSV into a table and prints it
  - `split` writes one directory per entity with one `.data` file per column
  - `decode` reads a `.data` file back
"#,
    after_help = r#"EXAMPLES
  $ coltab show covid.csv --column date:date --column total_cases:double --aligned
  $ coltab split covid.csv --out data --key location --skip iso_code --schema schema.json
  $ coltab decode data/Chad/total_cases.data --kind double --mode series

  $ coltab <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RecordKind {
    Date,
    Double,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DecodeMode {
    /// Every record, absent ones as null.
    Raw,
    /// Forward-filled values; absent before the first value becomes 0.
    Series,
    /// The last present value.
    Final,
}

impl DecodeMode {
    fn as_str(self) -> &'static str {
        match self {
            DecodeMode::Raw => "raw",
            DecodeMode::Series => "series",
            DecodeMode::Final => "final",
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct SchemaArgs {
    #[arg(
        long = "column",
        value_name = "NAME:TYPE",
        help = "Declare a typed column (repeatable); TYPE is text, double or date"
    )]
    columns: Vec<String>,
    #[arg(
        long,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        help = "JSON column declarations: {\"columns\":[{\"name\":..,\"type\":..}]}"
    )]
    schema: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = DEFAULT_DELIMITER,
        value_parser = parse_delimiter,
        help = "Field delimiter (a single character)"
    )]
    delimiter: char,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Read a CSV file into a table and print it",
        long_about = r#"Read a delimited text file into a typed table and print it to stdout.

Header fields without a declared column become text columns. Fields that fail
to parse are left empty and summarized in a notice on stderr."#,
        after_help = r#"EXAMPLES
  $ coltab show covid.csv
  $ coltab show covid.csv --column date:date --lines 10 --aligned"#
    )]
    Show {
        #[arg(help = "Delimited text file with a header line", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[command(flatten)]
        schema: SchemaArgs,
        #[arg(long, value_name = "N", help = "Stop after N data lines")]
        lines: Option<usize>,
        #[arg(long, help = "Pad cells so columns line up")]
        aligned: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Split a CSV file into per-entity record files",
        long_about = r#"Read a delimited text file and write `<out>/<key>/<column>.data` files.

Date columns are written as 5-byte records, double columns as 9-byte records,
and text columns as one line per row. The key column and skipped columns are
not written."#,
        after_help = r#"EXAMPLES
  $ coltab split covid.csv --out data --key location --skip iso_code \
      --column date:date --column total_cases:double
  $ coltab split covid.csv --out data --key location --entities countries.txt"#
    )]
    Split {
        #[arg(help = "Delimited text file with a header line", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[arg(long, help = "Output directory", value_hint = ValueHint::DirPath)]
        out: PathBuf,
        #[arg(long, value_name = "NAME", help = "Text column naming each row's entity")]
        key: String,
        #[arg(long, value_name = "NAME", help = "Column not to write (repeatable)")]
        skip: Vec<String>,
        #[arg(
            long,
            value_name = "FILE",
            value_hint = ValueHint::FilePath,
            help = "Known entity names, one per line; unknown keys are reported"
        )]
        entities: Option<PathBuf>,
        #[arg(
            long,
            default_value_t = DEFAULT_MAX_OPEN_ENTITIES,
            help = "Entities whose files stay open at once"
        )]
        max_open: usize,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    #[command(
        arg_required_else_help = true,
        about = "Decode a .data record file",
        after_help = r#"EXAMPLES
  $ coltab decode data/Chad/date.data --kind date
  $ coltab decode data/Chad/total_cases.data --kind double --mode final"#
    )]
    Decode {
        #[arg(help = "Record file", value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, value_enum, help = "Record layout")]
        kind: RecordKind,
        #[arg(long, value_enum, default_value = "raw", help = "Output shape")]
        mode: DecodeMode,
    },
    #[command(about = "Print version info")]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ coltab completion bash > ~/.local/share/bash-completion/completions/coltab
  $ coltab completion zsh > ~/.zfunc/_coltab"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn parse_delimiter(input: &str) -> Result<char, String> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch != '\n' && ch != '\r' => Ok(ch),
        _ => Err("delimiter must be exactly one character".to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    columns: Vec<SchemaColumn>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaColumn {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

fn parse_column_type(input: &str) -> Result<ColumnType, Error> {
    match input.trim().to_ascii_lowercase().as_str() {
        "text" => Ok(ColumnType::Text),
        "double" | "float64" => Ok(ColumnType::Float64),
        "date" => Ok(ColumnType::Date),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unknown column type '{input}'"))
            .with_hint("Use one of: text, double, date.")),
    }
}

fn parse_column_decl(input: &str) -> Result<(String, ColumnType), Error> {
    let Some((name, column_type)) = input.rsplit_once(':') else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("column declaration '{input}' is missing a type"))
            .with_hint("Use NAME:TYPE, for example `--column date:date`."));
    };
    if name.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("column declaration '{input}' has an empty name")));
    }
    Ok((name.to_string(), parse_column_type(column_type)?))
}

fn read_schema_file(path: &Path) -> Result<Vec<(String, ColumnType)>, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::from_io(err, path).with_message("schema file is not readable"))?;
    let schema: SchemaFile = serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("schema file is not valid")
            .with_hint(r#"Expected {"columns":[{"name":"date","type":"date"}]}."#)
            .with_path(path)
            .with_source(err)
    })?;
    schema
        .columns
        .into_iter()
        .map(|column| Ok((column.name, parse_column_type(&column.column_type)?)))
        .collect()
}

/// Schema-file columns first, then `--column` flags, in the order given.
fn column_decls(args: &SchemaArgs) -> Result<Vec<(String, ColumnType)>, Error> {
    let mut decls = match &args.schema {
        Some(path) => read_schema_file(path)?,
        None => Vec::new(),
    };
    for raw in &args.columns {
        decls.push(parse_column_decl(raw)?);
    }
    Ok(decls)
}

struct Ingested {
    table: Table,
    failed: u64,
    failures: Vec<FieldFailure>,
}

/// Failures kept for the stderr notice; the rest are only counted.
const MAX_KEPT_FAILURES: usize = 256;

fn ingest_csv(path: &Path, args: &SchemaArgs, lines: Option<usize>) -> Result<Ingested, Error> {
    let mut table = Table::open(path)?;
    table.add_columns(
        column_decls(args)?
            .into_iter()
            .map(|(name, column_type)| Column::of_type(name, column_type))
            .collect(),
    )?;

    let mut options = ReadOptions::default().with_delimiter(args.delimiter);
    if let Some(lines) = lines {
        options = options.with_lines_to_read(lines);
    }
    let mut failures = Vec::new();
    let outcome = table.begin_read_with(
        &options,
        |_| {},
        |failure| {
            if failures.len() < MAX_KEPT_FAILURES {
                failures.push(failure);
            }
        },
    )?;
    Ok(Ingested {
        table,
        failed: outcome.failed,
        failures,
    })
}

fn emit_failures_notice(cmd: &str, path: &Path, ingested: &Ingested, color_mode: ColorMode) {
    if ingested.failed == 0 {
        return;
    }
    let notice = field_failures_notice(
        cmd,
        &path.display().to_string(),
        notice_time_now().unwrap_or_default(),
        ingested.failed,
        &ingested.failures,
    );
    emit_notice(&notice, color_mode);
}

fn unknown_entities_notice(path: &Path, missing: &[String]) -> Notice {
    let mut details = Map::new();
    details.insert("entities".to_string(), json!(missing));
    Notice {
        kind: "unknown_entities".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: "split".to_string(),
        source: path.display().to_string(),
        message: format!("{} entity key(s) are not in the names file", missing.len()),
        details,
    }
}

fn stdout_write_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write to stdout")
        .with_source(err)
}

fn emit_table(table: &Table, delimiter: char, aligned: bool) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if aligned {
        table.write_aligned(&mut out, delimiter)?;
    } else {
        table.write_delimited(&mut out, delimiter)?;
    }
    out.flush().map_err(stdout_write_error)
}

fn add_schema_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::SchemaMismatch => {
            err.with_hint("Check the header line and the declared --column names.")
        }
        ErrorKind::AlreadyExists => err.with_hint("Each column name may be declared once."),
        ErrorKind::UnexpectedEof | ErrorKind::Corrupt => {
            err.with_hint("Check that --kind matches the layout the file was written with.")
        }
        _ => err,
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::NotFound if err.path().is_some() => {
            err.with_hint("Check the path; it must name an existing file.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_version_output(color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("coltab {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(
            json!({
                "name": "coltab",
                "version": env!("CARGO_PKG_VERSION"),
            }),
            color_mode,
        );
    }
}

fn emit_json(value: serde_json::Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {} (source: {})", notice.message, notice.source);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::NotFound => "not found",
        ErrorKind::AlreadyExists => "already exists",
        ErrorKind::Parse => "field could not be parsed",
        ErrorKind::SchemaMismatch => "header does not match the declared columns",
        ErrorKind::IndexOutOfRange => "index out of range",
        ErrorKind::LengthMismatch => "column length does not match the table",
        ErrorKind::TypeMismatch => "column has a different type",
        ErrorKind::UnexpectedEof => "file ends inside a record",
        ErrorKind::Corrupt => "corrupt data",
        ErrorKind::Io => "i/o error",
    }
    .to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    if let Some(row) = err.row() {
        inner.insert("row".to_string(), json!(row));
    }
    if let Some(value) = err.value() {
        inner.insert("value".to_string(), json!(value));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(row) = err.row() {
        lines.push(format!(
            "{} {row}",
            colorize_label("row:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!(
            "{} {offset}",
            colorize_label("offset:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `coltab --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "coltab") else {
        return "Try `coltab --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `coltab --help`.".to_string();
    }
    format!("Try `coltab {} --help`.", parts.join(" "))
}
