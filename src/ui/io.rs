use crate::app::RecordService;
use crate::request::Operation;
use crate::response::Outcome;
use crate::setup::{arguments, logging};
use crate::ui::cli::Cli;
use crate::{HostError, Result};

use log::{info, trace, warn};

/// Abstraction for input/output
pub trait IO {
    /// Read the next raw request envelope, `None` at end of input.
    /// A line that cannot be a request at all comes back as its own `Err`.
    ///
    /// # Errors
    ///
    /// Returns `HostError::InputReadError` if the input cannot be read
    fn next_envelope(&mut self) -> std::result::Result<Option<Result<String>>, HostError>;

    /// Write the response for one request
    ///
    /// # Errors
    ///
    /// Returns `HostError::OutputWriteError` if the output cannot be written
    fn show_result(&mut self, result: &Result<Outcome>) -> std::result::Result<(), HostError>;
}

/// Counts of handled requests, logged when input runs out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub handled: usize,
    pub failed: usize,
}

/// Initialize logging, parse args, and serve every envelope of the input
///
/// # Errors
///
/// Returns a `HostError` if the store cannot be opened or input/output fails.
/// Failed requests are reported in their response and never end the loop.
pub fn run() -> std::result::Result<(), HostError> {
    let args = arguments::handle_args();
    logging::setup_log(args.log_level());
    let service = arguments::build_service(&args)?;

    let summary = match &args.input {
        Some(path) => serve(&mut Cli::from_file(path, args.format)?, &service)?,
        None => serve(&mut Cli::stdin(args.format), &service)?,
    };
    info!(
        "Handled {} requests, {} failed",
        summary.handled, summary.failed
    );
    Ok(())
}

/// Decode, dispatch and answer envelopes until the input is exhausted.
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns a `HostError` if reading input or writing output fails
pub fn serve(io: &mut impl IO, service: &RecordService) -> std::result::Result<Summary, HostError> {
    let mut summary = Summary::default();

    while let Some(line) = io.next_envelope()? {
        let envelope = match line {
            Ok(envelope) if envelope.trim().is_empty() => continue,
            other => other,
        };

        let operation = envelope.and_then(|envelope| {
            trace!("Got envelope: {envelope}");
            Operation::parse(&envelope)
        });
        let result = match operation {
            Ok(operation) => service.handle(operation),
            Err(e) => {
                warn!("Rejected request: {e}");
                Err(e)
            }
        };

        summary.handled += 1;
        if result.is_err() {
            summary.failed += 1;
        }
        io.show_result(&result)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Tables;
    use crate::backends::MemoryBackend;
    use crate::ui::Format;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::io::Cursor;

    // Feeds canned envelopes and keeps rendered responses
    struct ScriptedIo {
        input: VecDeque<String>,
        output: Vec<Value>,
    }

    impl ScriptedIo {
        fn new(envelopes: &[Value]) -> Self {
            Self {
                input: envelopes.iter().map(Value::to_string).collect(),
                output: Vec::new(),
            }
        }
    }

    impl IO for ScriptedIo {
        fn next_envelope(&mut self) -> std::result::Result<Option<Result<String>>, HostError> {
            Ok(self.input.pop_front().map(Ok))
        }

        fn show_result(&mut self, result: &Result<Outcome>) -> std::result::Result<(), HostError> {
            self.output.push(crate::response::render(result));
            Ok(())
        }
    }

    fn service() -> RecordService {
        RecordService::new(
            Box::new(MemoryBackend::new()),
            Tables {
                notes: "notes".into(),
                users: None,
            },
        )
    }

    #[test]
    fn serves_a_note_lifecycle() {
        let mut io = ScriptedIo::new(&[
            json!({"info": {"fieldName": "createNote"},
                   "arguments": {"note": {"id": "1", "name": "a", "completed": false}}}),
            json!({"info": {"fieldName": "updateNote"},
                   "arguments": {"note": {"id": "1", "completed": true}}}),
            json!({"info": {"fieldName": "getNoteById"}, "arguments": {"noteId": "1"}}),
            json!({"info": {"fieldName": "deleteNote"}, "arguments": {"noteId": "1"}}),
            json!({"info": {"fieldName": "getNoteById"}, "arguments": {"noteId": "1"}}),
        ]);

        let summary = serve(&mut io, &service()).unwrap();
        assert_eq!(summary, Summary { handled: 5, failed: 1 });
        assert_eq!(
            io.output[..4],
            [
                json!({"id": "1", "name": "a", "completed": false}),
                json!({"id": "1", "completed": true}),
                json!({"id": "1", "name": "a", "completed": true}),
                json!("1"),
            ]
        );
        assert_eq!(io.output[4]["errorType"], "NotFound");
    }

    #[test]
    fn bad_requests_do_not_stop_the_loop() {
        let mut io = ScriptedIo::new(&[
            json!({"info": {"fieldName": "renameNote"}}),
            json!({"info": {"fieldName": "updateNote"}, "arguments": {"note": {"id": "1"}}}),
            json!({"info": {"fieldName": "listUsers"}}),
            json!({"info": {"fieldName": "listNotes"}}),
        ]);
        io.input.push_front("   ".to_string());
        io.input.push_front("not json".to_string());

        let summary = serve(&mut io, &service()).unwrap();
        assert_eq!(summary, Summary { handled: 5, failed: 4 });

        let kinds: Vec<Value> = io.output[..4]
            .iter()
            .map(|r| r["errorType"].clone())
            .collect();
        assert_eq!(
            kinds,
            [
                "MalformedRequest",
                "InvalidOperation",
                "MalformedRequest",
                "InvalidOperation"
            ]
        );
        assert_eq!(io.output[4], json!([]));
    }

    #[test]
    fn undecodable_bytes_get_their_own_response() {
        let input = b"\xff\xfe\n{\"info\":{\"fieldName\":\"listNotes\"}}\n";
        let mut cli = Cli::new(Cursor::new(&input[..]), Vec::new(), Format::Json);

        let summary = serve(&mut cli, &service()).unwrap();
        assert_eq!(summary, Summary { handled: 2, failed: 1 });

        let written = String::from_utf8(cli.into_writer()).unwrap();
        let responses: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["errorType"], "MalformedRequest");
        assert_eq!(responses[1], json!([]));
    }
}
