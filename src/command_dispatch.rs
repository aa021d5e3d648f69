//! Purpose: Hold top-level CLI command dispatch for `coltab`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command returns a `RunOutcome` or an `Error`; exit codes come from the error kind.
//! Invariants: Helpers in `main.rs` remain the source of shared CLI logic.

use super::*;

use coltab::api::{Dataset, EntityNames, SplitOptions, record};
use coltab::core::scalar::format_date;
use std::fs::File;

pub(super) fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "coltab", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output(color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Show {
            csv,
            schema,
            lines,
            aligned,
        } => {
            let ingested = ingest_csv(&csv, &schema, lines)?;
            emit_failures_notice("show", &csv, &ingested, color_mode);
            emit_table(&ingested.table, schema.delimiter, aligned)?;
            Ok(RunOutcome::ok())
        }
        Command::Split {
            csv,
            out,
            key,
            skip,
            entities,
            max_open,
            schema,
        } => {
            let names = entities.as_deref().map(EntityNames::load).transpose()?;
            let ingested = ingest_csv(&csv, &schema, None)?;
            emit_failures_notice("split", &csv, &ingested, color_mode);

            std::fs::create_dir_all(&out).map_err(|err| Error::from_io(err, &out))?;
            let options = SplitOptions::new(key)
                .with_skip_columns(skip)
                .with_max_open_entities(max_open);
            let outcome = Dataset::new(&out).split(&ingested.table, &options)?;

            if let (Some(names), Some(path)) = (&names, entities.as_deref()) {
                let missing = names.missing_from(&outcome.entities);
                if !missing.is_empty() {
                    emit_notice(&unknown_entities_notice(path, &missing), color_mode);
                }
            }

            emit_json(
                json!({
                    "out": out.display().to_string(),
                    "rows": outcome.rows,
                    "failed": ingested.failed,
                    "fields": outcome.fields,
                    "entities": outcome.entities,
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Decode { file, kind, mode } => {
            let value = decode_file(&file, kind, mode)?;
            emit_json(value, color_mode);
            Ok(RunOutcome::ok())
        }
    }
}

fn decode_file(path: &Path, kind: RecordKind, mode: DecodeMode) -> Result<Value, Error> {
    let open = || -> Result<io::BufReader<File>, Error> {
        File::open(path)
            .map(io::BufReader::new)
            .map_err(|err| Error::from_io(err, path))
    };
    let with_path = |err: Error| err.with_path(path);

    let decoded = match (kind, mode) {
        (RecordKind::Date, DecodeMode::Raw) => {
            let dates = record::decode_all::<record::DateRecord, _>(open()?).map_err(with_path)?;
            json!(
                dates
                    .into_iter()
                    .map(|date| date.map(format_date))
                    .collect::<Vec<_>>()
            )
        }
        (RecordKind::Date, _) => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("--mode {} applies to double records only", mode.as_str()))
                .with_hint("Use `--mode raw` with `--kind date`."));
        }
        (RecordKind::Double, DecodeMode::Raw) => {
            json!(record::decode_all::<record::DoubleRecord, _>(open()?).map_err(with_path)?)
        }
        (RecordKind::Double, DecodeMode::Series) => {
            json!(record::decode_time_series(open()?).map_err(with_path)?)
        }
        (RecordKind::Double, DecodeMode::Final) => {
            json!(record::decode_final_value(open()?).map_err(with_path)?)
        }
    };

    let key = if mode == DecodeMode::Final { "value" } else { "values" };
    let mut out = Map::new();
    out.insert("path".to_string(), json!(path.display().to_string()));
    out.insert(
        "kind".to_string(),
        json!(match kind {
            RecordKind::Date => "date",
            RecordKind::Double => "double",
        }),
    );
    out.insert("mode".to_string(), json!(mode.as_str()));
    if let Some(count) = decoded.as_array().map(Vec::len) {
        out.insert("count".to_string(), json!(count));
    }
    out.insert(key.to_string(), decoded);
    Ok(Value::Object(out))
}
