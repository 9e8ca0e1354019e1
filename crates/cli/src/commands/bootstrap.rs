//! Bootstrap configuration commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use lwm2m_console_common::adapter::{to_rest, to_ui, to_ui_list};
use lwm2m_console_common::hex::to_hex;
use lwm2m_console_common::types::{BootstrapConfig, GroupedConfig, ServerSecurity};
use lwm2m_console_common::validate::validate;
use lwm2m_console_common::Error;

use crate::client::ConsoleClient;
use crate::output::{print_json, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum BootstrapCommands {
    /// List endpoints with a bootstrap configuration
    List,

    /// Show the configuration of an endpoint
    Show {
        /// Endpoint name
        endpoint: String,
    },

    /// Export the grouped configuration of an endpoint as JSON
    Export {
        /// Endpoint name
        endpoint: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate and store a grouped configuration read from a JSON file
    Apply {
        /// Endpoint name
        endpoint: String,

        /// Grouped configuration file
        file: PathBuf,

        /// Print the payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete the configuration of an endpoint
    Delete {
        /// Endpoint name
        endpoint: String,
    },
}

/// One line of `bootstrap list`
#[derive(Serialize)]
pub struct ConfigSummary {
    pub endpoint: String,
    pub bootstrap_servers: Vec<String>,
    pub dm_servers: Vec<u16>,
    pub oscore: bool,
}

impl From<&GroupedConfig> for ConfigSummary {
    fn from(grouped: &GroupedConfig) -> Self {
        Self {
            endpoint: grouped.endpoint.clone().unwrap_or_default(),
            bootstrap_servers: grouped
                .bs
                .iter()
                .filter_map(|e| e.security.uri.clone())
                .collect(),
            dm_servers: grouped.dm.iter().map(|s| s.server.short_id).collect(),
            oscore: grouped.uses_oscore(),
        }
    }
}

impl TableDisplay for ConfigSummary {
    fn headers() -> Vec<&'static str> {
        vec!["Endpoint", "Bootstrap Server", "DM Servers", "OSCORE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.endpoint.clone(),
            self.bootstrap_servers.join(", "),
            self.dm_servers
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            self.oscore.to_string(),
        ]
    }
}

/// One security entry of `bootstrap show`
#[derive(Serialize)]
pub struct EntryDisplay {
    pub role: &'static str,
    pub short_id: Option<u16>,
    pub uri: String,
    pub security_mode: String,
    pub identity: String,
    pub lifetime: Option<u64>,
    pub oscore: bool,
}

impl EntryDisplay {
    fn new(
        role: &'static str,
        security: &ServerSecurity,
        short_id: Option<u16>,
        lifetime: Option<u64>,
        oscore: bool,
    ) -> Self {
        Self {
            role,
            short_id,
            uri: security.uri.clone().unwrap_or_default(),
            security_mode: security
                .security_mode
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
            identity: to_hex(&security.public_key_or_id),
            lifetime,
            oscore,
        }
    }
}

impl TableDisplay for EntryDisplay {
    fn headers() -> Vec<&'static str> {
        vec![
            "Role",
            "Short ID",
            "URI",
            "Mode",
            "Identity (hex)",
            "Lifetime",
            "OSCORE",
        ]
    }

    fn row(&self) -> Vec<String> {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        vec![
            self.role.to_string(),
            opt(self.short_id.map(|id| id.to_string())),
            self.uri.clone(),
            self.security_mode.clone(),
            self.identity.clone(),
            opt(self.lifetime.map(|l| format!("{}s", l))),
            self.oscore.to_string(),
        ]
    }
}

/// Table rows for a grouped configuration, bootstrap entries first
pub fn entries(grouped: &GroupedConfig) -> Vec<EntryDisplay> {
    let bs = grouped
        .bs
        .iter()
        .map(|e| EntryDisplay::new("bootstrap", &e.security, None, None, e.oscore.is_some()));
    let dm = grouped.dm.iter().map(|s| {
        EntryDisplay::new(
            "dm",
            &s.security,
            Some(s.server.short_id),
            s.server.lifetime(),
            s.oscore.is_some(),
        )
    });
    bs.chain(dm).collect()
}

async fn fetch_grouped(client: &ConsoleClient, endpoint: &str) -> Result<GroupedConfig> {
    let flat = client.get_bootstrap_config(endpoint).await?;
    Ok(group_for_endpoint(endpoint, flat)?)
}

/// Grouped view of an endpoint's configuration, tagged with the endpoint
fn group_for_endpoint(
    endpoint: &str,
    flat: Option<BootstrapConfig>,
) -> lwm2m_console_common::Result<GroupedConfig> {
    let flat = flat.ok_or_else(|| Error::UnknownEndpoint(endpoint.to_string()))?;
    let mut grouped = to_ui(&flat);
    grouped.endpoint = Some(endpoint.to_string());
    Ok(grouped)
}

pub async fn execute(
    cmd: BootstrapCommands,
    client: ConsoleClient,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        BootstrapCommands::List => {
            let configs = client.list_bootstrap_configs().await?;
            let grouped = to_ui_list(&configs);
            match format {
                OutputFormat::Json => print_json(&grouped),
                _ => {
                    let summaries: Vec<ConfigSummary> =
                        grouped.iter().map(ConfigSummary::from).collect();
                    print_list(&summaries, format);
                }
            }
        }

        BootstrapCommands::Show { endpoint } => {
            let grouped = fetch_grouped(&client, &endpoint).await?;
            match format {
                OutputFormat::Json => print_json(&grouped),
                _ => print_list(&entries(&grouped), format),
            }
        }

        BootstrapCommands::Export { endpoint, output } => {
            let grouped = fetch_grouped(&client, &endpoint).await?;
            let json = serde_json::to_string_pretty(&grouped)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    print_success(&format!(
                        "Configuration of '{}' written to {}",
                        endpoint,
                        path.display()
                    ));
                }
                None => println!("{}", json),
            }
        }

        BootstrapCommands::Apply { endpoint, file, dry_run } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let grouped: GroupedConfig = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;

            let flat = to_rest(&grouped);
            validate(&flat)?;

            if dry_run {
                print_json(&flat);
            } else {
                client.put_bootstrap_config(&endpoint, &flat).await?;
                print_success(&format!(
                    "Bootstrap configuration of '{}' stored ({} security entries)",
                    endpoint,
                    flat.security.len()
                ));
            }
        }

        BootstrapCommands::Delete { endpoint } => {
            client.delete_bootstrap_config(&endpoint).await?;
            print_success(&format!("Bootstrap configuration of '{}' deleted", endpoint));
        }
    }

    Ok(())
}
