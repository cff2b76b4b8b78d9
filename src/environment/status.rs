// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Compose status parsing
//!
//! `compose ps --format json` prints either one JSON array or one JSON
//! object per line depending on the compose version; both are accepted.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

use super::{EnvironmentState, PortMapping, ServiceInfo, ServiceStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsRecord {
    #[serde(default, rename = "ID")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    health: String,
    #[serde(default)]
    publishers: Option<Vec<Publisher>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Publisher {
    #[serde(default)]
    target_port: u16,
    #[serde(default)]
    published_port: u16,
    #[serde(default)]
    protocol: String,
}

impl PsRecord {
    fn into_service_info(self) -> Option<ServiceInfo> {
        let service = if self.service.is_empty() {
            self.name.clone()
        } else {
            self.service
        };
        if service.is_empty() {
            return None;
        }

        let text = format!("{} {} {}", self.state, self.health, self.status);
        let ports = self
            .publishers
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.published_port != 0)
            .map(|p| PortMapping {
                container_port: p.target_port,
                host_port: p.published_port,
                protocol: if p.protocol.is_empty() {
                    "tcp".to_string()
                } else {
                    p.protocol
                },
            })
            .collect();

        Some(ServiceInfo {
            service,
            id: self.id,
            name: self.name,
            status: ServiceStatus::from_status_text(&text),
            ports,
        })
    }
}

/// Build an [`EnvironmentState`] from `compose ps --format json` output
///
/// Records that cannot be parsed are skipped with a warning. When several
/// containers back one service, the least ready status wins.
pub fn parse_status_output(project: &str, output: &str) -> EnvironmentState {
    let trimmed = output.trim();

    let records: Vec<PsRecord> = if trimmed.starts_with('[') {
        match serde_json::from_str(trimmed) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "unparseable status array");
                Vec::new()
            }
        }
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str::<PsRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, line, "skipping unparseable status record");
                    None
                }
            })
            .collect()
    };

    let mut services: BTreeMap<String, ServiceInfo> = BTreeMap::new();
    for info in records.into_iter().filter_map(PsRecord::into_service_info) {
        match services.get_mut(&info.service) {
            Some(existing) => {
                if info.status.readiness_rank() < existing.status.readiness_rank() {
                    existing.status = info.status;
                }
                existing.ports.extend(info.ports);
            }
            None => {
                services.insert(info.service.clone(), info);
            }
        }
    }

    EnvironmentState {
        project: project.to_string(),
        services,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NDJSON: &str = r#"
{"ID":"a1","Name":"app-it-db-1","Service":"db","State":"running","Health":"healthy","Status":"Up 20 seconds (healthy)","Publishers":[{"URL":"0.0.0.0","TargetPort":5432,"PublishedPort":49153,"Protocol":"tcp"}]}
{"ID":"b2","Name":"app-it-web-1","Service":"web","State":"running","Health":"","Status":"Up 18 seconds","Publishers":[{"URL":"","TargetPort":9000,"PublishedPort":0,"Protocol":"tcp"}]}
{"ID":"c3","Name":"app-it-migrate-1","Service":"migrate","State":"exited","Health":"","Status":"Exited (0) 5 seconds ago","Publishers":null}
"#;

    #[test]
    fn test_parse_ndjson() {
        let state = parse_status_output("app-it", NDJSON);
        assert_eq!(state.project, "app-it");
        assert_eq!(state.services.len(), 3);

        let db = &state.services["db"];
        assert_eq!(db.status, ServiceStatus::Healthy);
        assert_eq!(db.id, "a1");
        assert_eq!(db.ports.len(), 1);
        assert_eq!(state.host_port("db", 5432), Some(49153));

        let web = &state.services["web"];
        assert_eq!(web.status, ServiceStatus::Running);
        assert!(web.ports.is_empty());

        assert_eq!(state.services["migrate"].status, ServiceStatus::Stopped);
    }

    #[test]
    fn test_parse_array_format() {
        let output = r#"[{"Name":"p-db-1","Service":"db","State":"restarting","Status":"Restarting (1) 2 seconds ago"}]"#;
        let state = parse_status_output("p", output);
        assert_eq!(state.services["db"].status, ServiceStatus::Restarting);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let output = "not json\n{\"Service\":\"db\",\"State\":\"running\"}\n";
        let state = parse_status_output("p", output);
        assert_eq!(state.services.len(), 1);
        assert_eq!(state.services["db"].status, ServiceStatus::Running);
    }

    #[test]
    fn test_scaled_service_uses_least_ready_status() {
        let output = concat!(
            "{\"Name\":\"p-web-1\",\"Service\":\"web\",\"State\":\"running\",\"Status\":\"Up (healthy)\"}\n",
            "{\"Name\":\"p-web-2\",\"Service\":\"web\",\"State\":\"restarting\",\"Status\":\"Restarting\"}\n",
        );
        let state = parse_status_output("p", output);
        assert_eq!(state.services["web"].status, ServiceStatus::Restarting);
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_status_output("p", "").services.is_empty());
        assert!(parse_status_output("p", "[]").services.is_empty());
    }
}
