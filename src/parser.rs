//! JSON-lines ingestion.
//!
//! One ticket per line, with the fields `id`, `client`, `operation`, `operator`,
//! `pickup_at`, `service_start_at`, `service_end_at` and `status`. Timestamps are
//! strings in any layout [`TimestampParser`] accepts. Blank lines are ignored and
//! malformed lines are skipped with a warning; they never abort a load.

use crate::models::{RawTicket, ShiftBands, TicketEvent, TicketStatus};
use crate::timestamp_parser::TimestampParser;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Wire shape of one line, before timestamp parsing.
#[derive(Debug, Deserialize)]
struct TicketLine {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    client: String,
    operation: String,
    operator: String,
    pickup_at: String,
    service_start_at: String,
    service_end_at: String,
    status: String,
}

fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl TicketLine {
    fn into_raw(self) -> Result<RawTicket> {
        Ok(RawTicket {
            pickup_at: TimestampParser::parse(&self.pickup_at).context("pickup_at")?,
            service_start_at: TimestampParser::parse(&self.service_start_at)
                .context("service_start_at")?,
            service_end_at: TimestampParser::parse(&self.service_end_at)
                .context("service_end_at")?,
            id: self.id,
            client: self.client,
            operation: self.operation,
            operator: self.operator,
            status: TicketStatus::from(self.status),
        })
    }
}

/// Trait for custom JSONL processing
pub trait JsonlProcessor {
    type Output;

    fn process_entry(&mut self, ticket: RawTicket, line_number: usize) -> Result<()>;
    fn finalize(self) -> Result<Self::Output>;
}

/// Result of a load, with the number of lines that could not be used.
#[derive(Debug)]
pub struct Parsed<T> {
    pub output: T,
    pub lines_read: usize,
    pub skipped_lines: usize,
}

pub struct TicketFileParser {
    bands: ShiftBands,
}

impl TicketFileParser {
    pub fn new(bands: ShiftBands) -> Self {
        Self { bands }
    }

    pub fn load_events(&self, file_path: &Path) -> Result<Parsed<Vec<TicketEvent>>> {
        self.process_jsonl_file(file_path, EventCollector::new(self.bands))
    }

    pub fn process_jsonl_file<P: JsonlProcessor>(
        &self,
        file_path: &Path,
        processor: P,
    ) -> Result<Parsed<P::Output>> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open ticket file: {}", file_path.display()))?;
        let parsed = self.process_reader(BufReader::new(file), processor)?;

        debug!(
            file = %file_path.display(),
            lines = parsed.lines_read,
            skipped = parsed.skipped_lines,
            "Ticket file loaded"
        );
        Ok(parsed)
    }

    pub fn process_reader<R: BufRead, P: JsonlProcessor>(
        &self,
        reader: R,
        mut processor: P,
    ) -> Result<Parsed<P::Output>> {
        let mut lines_read = 0;
        let mut skipped_lines = 0;

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.with_context(|| format!("Failed to read line {}", line_number))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            lines_read += 1;

            let raw = serde_json::from_str::<TicketLine>(line)
                .map_err(anyhow::Error::from)
                .and_then(TicketLine::into_raw);
            match raw {
                Ok(ticket) => processor.process_entry(ticket, line_number)?,
                Err(e) => {
                    skipped_lines += 1;
                    warn!(line = line_number, error = %format!("{:#}", e), "Skipping malformed line");
                }
            }
        }

        Ok(Parsed {
            output: processor.finalize()?,
            lines_read,
            skipped_lines,
        })
    }
}

impl Default for TicketFileParser {
    fn default() -> Self {
        Self::new(ShiftBands::default())
    }
}

/// Derives and collects every ticket.
pub struct EventCollector {
    bands: ShiftBands,
    events: Vec<TicketEvent>,
}

impl EventCollector {
    pub fn new(bands: ShiftBands) -> Self {
        Self {
            bands,
            events: Vec::new(),
        }
    }
}

impl JsonlProcessor for EventCollector {
    type Output = Vec<TicketEvent>;

    fn process_entry(&mut self, ticket: RawTicket, _line_number: usize) -> Result<()> {
        self.events.push(ticket.into_event(&self.bands));
        Ok(())
    }

    fn finalize(self) -> Result<Self::Output> {
        Ok(self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shift;
    use std::io::Cursor;

    const GOOD: &str = r#"{"id":"t1","client":"ACME","operation":"LOAD","operator":"op1","pickup_at":"2024-03-05 08:00:00","service_start_at":"2024-03-05 08:05:00","service_end_at":"2024-03-05 08:15:00","status":"SERVED"}"#;

    #[test]
    fn test_parse_valid_line() {
        let parsed = TicketFileParser::default()
            .process_reader(Cursor::new(GOOD), EventCollector::new(ShiftBands::default()))
            .unwrap();

        assert_eq!(parsed.skipped_lines, 0);
        let event = &parsed.output[0];
        assert_eq!(event.wait_seconds, 300);
        assert_eq!(event.service_seconds, 600);
        assert_eq!(event.shift, Shift::A);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let input = format!(
            "{}\n\nnot json\n{}\n",
            GOOD,
            GOOD.replace("2024-03-05 08:00:00", "yesterday")
        );
        let parsed = TicketFileParser::default()
            .process_reader(Cursor::new(input), EventCollector::new(ShiftBands::default()))
            .unwrap();

        assert_eq!(parsed.output.len(), 1);
        assert_eq!(parsed.lines_read, 3);
        assert_eq!(parsed.skipped_lines, 2);
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let input = GOOD.replace(r#""id":"t1""#, r#""id":42"#);
        let parsed = TicketFileParser::default()
            .process_reader(Cursor::new(input), EventCollector::new(ShiftBands::default()))
            .unwrap();
        assert_eq!(parsed.output[0].id, "42");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = TicketFileParser::default().load_events(Path::new("/nonexistent/tickets.jsonl"));
        assert!(result.is_err());
    }
}
