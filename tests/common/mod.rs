#![allow(dead_code)]

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use ticket_analytics::{RawTicket, ShiftBands, TicketEvent, TicketStatus};

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Fluent builder for a single ticket.
#[derive(Clone)]
pub struct TicketBuilder {
    raw: RawTicket,
}

impl TicketBuilder {
    /// Served ticket pulled at `pickup`, 2 minutes of wait and 5 of service.
    pub fn at(pickup: &str) -> Self {
        let pickup_at = ts(pickup);
        Self {
            raw: RawTicket {
                id: pickup.to_string(),
                client: "ACME".to_string(),
                operation: "LOAD".to_string(),
                operator: "op1".to_string(),
                pickup_at,
                service_start_at: pickup_at + Duration::minutes(2),
                service_end_at: pickup_at + Duration::minutes(7),
                status: TicketStatus::Served,
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.raw.id = id.to_string();
        self
    }

    pub fn client(mut self, client: &str) -> Self {
        self.raw.client = client.to_string();
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.raw.operation = operation.to_string();
        self
    }

    pub fn operator(mut self, operator: &str) -> Self {
        self.raw.operator = operator.to_string();
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.raw.status = TicketStatus::from(status);
        self
    }

    pub fn wait_secs(mut self, secs: i64) -> Self {
        let service = self.raw.service_end_at - self.raw.service_start_at;
        self.raw.service_start_at = self.raw.pickup_at + Duration::seconds(secs);
        self.raw.service_end_at = self.raw.service_start_at + service;
        self
    }

    pub fn service_secs(mut self, secs: i64) -> Self {
        self.raw.service_end_at = self.raw.service_start_at + Duration::seconds(secs);
        self
    }

    pub fn raw(self) -> RawTicket {
        self.raw
    }

    pub fn build(self) -> TicketEvent {
        self.raw.into_event(&ShiftBands::default())
    }
}

pub fn refs(events: &[TicketEvent]) -> Vec<&TicketEvent> {
    events.iter().collect()
}

/// One JSON line in the ingestion format.
pub fn jsonl_line(raw: &RawTicket) -> String {
    let fmt = "%Y-%m-%d %H:%M:%S";
    serde_json::json!({
        "id": raw.id,
        "client": raw.client,
        "operation": raw.operation,
        "operator": raw.operator,
        "pickup_at": raw.pickup_at.format(fmt).to_string(),
        "service_start_at": raw.service_start_at.format(fmt).to_string(),
        "service_end_at": raw.service_end_at.format(fmt).to_string(),
        "status": String::from(raw.status.clone()),
    })
    .to_string()
}

pub fn create_test_jsonl(dir: &Path, filename: &str, tickets: &[RawTicket]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    let content: Vec<String> = tickets.iter().map(jsonl_line).collect();
    fs::write(&file_path, content.join("\n") + "\n")?;
    Ok(file_path)
}

/// Two months of tickets for two clients, used by the CLI and engine tests.
///
/// January: ACME 2 tickets at 600s service, BETA 1 at 300s.
/// February: ACME 3 tickets at 500s service, plus one too-short ticket.
pub fn two_month_sample() -> Vec<RawTicket> {
    vec![
        TicketBuilder::at("2024-01-10 08:00:00").id("j1").service_secs(600).raw(),
        TicketBuilder::at("2024-01-10 09:00:00").id("j2").service_secs(600).raw(),
        TicketBuilder::at("2024-01-11 10:00:00")
            .id("j3")
            .client("BETA")
            .operator("op2")
            .service_secs(300)
            .raw(),
        TicketBuilder::at("2024-02-10 08:00:00").id("f1").service_secs(500).raw(),
        TicketBuilder::at("2024-02-10 09:00:00")
            .id("f2")
            .operator("op2")
            .service_secs(500)
            .raw(),
        TicketBuilder::at("2024-02-12 09:00:00")
            .id("f3")
            .operator("op2")
            .service_secs(500)
            .raw(),
        TicketBuilder::at("2024-02-12 09:30:00")
            .id("f4")
            .operator("op2")
            .service_secs(10)
            .raw(),
    ]
}
