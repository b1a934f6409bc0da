use super::io::IO;
use super::Format;
use crate::response::{render, Outcome};
use crate::{HostError, Record, Result, ServiceError};

use colored::Colorize;
use log::trace;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

/// Line-oriented console host: one envelope per input line, one response per output line
pub struct Cli<R, W> {
    reader: R,
    writer: W,
    format: Format,
}

impl Cli<Box<dyn BufRead>, io::Stdout> {
    #[must_use]
    pub fn stdin(format: Format) -> Self {
        Self::new(Box::new(io::stdin().lock()), io::stdout(), format)
    }

    /// Reads envelopes from a file
    ///
    /// # Errors
    ///
    /// Returns `HostError::InputOpenError` if the file cannot be opened
    pub fn from_file(path: &Path, format: Format) -> std::result::Result<Self, HostError> {
        let file = File::open(path).map_err(|source| HostError::InputOpenError {
            path: path.to_path_buf(),
            source,
        })?;
        trace!("Reading envelopes from {}", path.display());
        Ok(Self::new(
            Box::new(BufReader::new(file)),
            io::stdout(),
            format,
        ))
    }
}

impl<R: BufRead, W: Write> Cli<R, W> {
    pub const fn new(reader: R, writer: W, format: Format) -> Self {
        Self {
            reader,
            writer,
            format,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> IO for Cli<R, W> {
    /// Reads a single line and strips the trailing newline.
    /// A line that is not UTF-8 is a malformed request, not a read failure.
    fn next_envelope(&mut self) -> std::result::Result<Option<Result<String>>, HostError> {
        let mut bytes = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut bytes)
            .map_err(HostError::InputReadError)?;
        if read == 0 {
            return Ok(None);
        }
        let line = String::from_utf8(bytes)
            .map(|line| line.trim_end_matches(['\r', '\n']).to_string())
            .map_err(|e| ServiceError::malformed(format!("request is not valid UTF-8: {e}")));
        Ok(Some(line))
    }

    fn show_result(&mut self, result: &Result<Outcome>) -> std::result::Result<(), HostError> {
        let text = match self.format {
            Format::Json => render(result).to_string(),
            Format::Table => render_table(result),
        };
        writeln!(self.writer, "{text}").map_err(HostError::OutputWriteError)?;
        self.writer.flush().map_err(HostError::OutputWriteError)
    }
}

/// Renders a result for humans: records as a `psql` style table, ids as
/// plain text, failures as `Kind: message`
#[must_use]
pub fn render_table(result: &Result<Outcome>) -> String {
    match result {
        Ok(Outcome::Record(record)) => records_table(std::slice::from_ref(record)),
        Ok(Outcome::Records(records)) if records.is_empty() => "(no records)".to_string(),
        Ok(Outcome::Records(records)) => records_table(records),
        Ok(Outcome::Id(id)) => id.clone(),
        Err(e) => format!("{}: {e}", e.kind().red().bold()),
    }
}

// Columns are `id` followed by every other attribute in first-seen order
fn records_table(records: &[Record]) -> String {
    let mut columns: Vec<&str> = vec![Record::ID];
    for record in records {
        for (name, _) in record.attributes() {
            if !columns.contains(&name.as_str()) {
                columns.push(name);
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(ToString::to_string));
    for record in records {
        builder.push_record(
            columns
                .iter()
                .map(|column| record.get(column).map_or_else(String::new, cell)),
        );
    }

    let mut table = builder.build();
    table.with(Style::psql());
    table.to_string()
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use serde_json::json;
    use std::io::Cursor;

    fn next_line<R: BufRead>(cli: &mut Cli<R, Vec<u8>>) -> Option<String> {
        cli.next_envelope().unwrap().map(|line| line.unwrap())
    }

    #[test]
    fn reads_lines_until_eof() {
        let mut cli = Cli::new(Cursor::new("first\r\nsecond\n"), Vec::new(), Format::Json);
        assert_eq!(next_line(&mut cli).as_deref(), Some("first"));
        assert_eq!(next_line(&mut cli).as_deref(), Some("second"));
        assert_eq!(next_line(&mut cli), None);
    }

    #[test]
    fn non_utf8_line_is_malformed_and_reading_continues() {
        let mut cli = Cli::new(Cursor::new(&b"\xff\xfe\nnext"[..]), Vec::new(), Format::Json);
        let err = cli.next_envelope().unwrap().unwrap().unwrap_err();
        assert_eq!(err.kind(), "MalformedRequest");
        assert_eq!(next_line(&mut cli).as_deref(), Some("next"));
        assert_eq!(next_line(&mut cli), None);
    }

    #[test]
    fn json_format_writes_one_line_per_result() {
        let mut cli = Cli::new(Cursor::new(""), Vec::new(), Format::Json);
        cli.show_result(&Ok(Outcome::Id("7".into()))).unwrap();
        cli.show_result(&Err(ServiceError::InvalidOperation("x".into())))
            .unwrap();

        let written = String::from_utf8(cli.into_writer()).unwrap();
        let lines: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0], json!("7"));
        assert_eq!(lines[1]["errorType"], "InvalidOperation");
    }

    #[test]
    fn table_lists_union_of_columns() {
        let records = vec![
            Record::new("1").with("name", json!("a")),
            Record::new("2").with("completed", json!(true)),
        ];
        let table = render_table(&Ok(Outcome::Records(records)));

        let header = table.lines().next().unwrap();
        let columns: Vec<&str> = header.split('|').map(str::trim).collect();
        assert_eq!(columns, ["id", "name", "completed"]);
        assert!(table.contains("true"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn table_handles_empty_lists_and_errors() {
        assert_eq!(render_table(&Ok(Outcome::Records(vec![]))), "(no records)");
        let rendered = render_table(&Err(ServiceError::malformed("`id` is missing")));
        assert!(rendered.contains("MalformedRequest"));
        assert!(rendered.ends_with("Malformed request: `id` is missing"));
    }
}
