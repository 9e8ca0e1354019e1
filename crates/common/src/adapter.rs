//! Conversion between the flat bootstrap configuration served over REST and
//! the grouped form operators edit.
//!
//! The flat form addresses Security, Server and OSCORE object instances by
//! instance id and links them through `serverId`/`shortId` and
//! `oscoreSecurityMode`. The grouped form puts the bootstrap server's own
//! credentials in `bs` and hangs each DM server's security and OSCORE entries
//! directly off the server record in `dm`.
//!
//! Both directions are total: references that do not resolve are dropped,
//! never reported. Run [`crate::validate::validate`] first when completeness
//! matters.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::{
    BootstrapConfig, BootstrapEntry, DmServer, GroupedConfig, InstanceId, OSCORE_OBJECT_ID,
    SECURITY_OBJECT_ID, SERVER_OBJECT_ID,
};

/// Paths always cleared before a configuration is written
pub fn default_paths_to_delete() -> Vec<String> {
    vec![
        format!("/{}", SECURITY_OBJECT_ID),
        format!("/{}", SERVER_OBJECT_ID),
    ]
}

/// Root path of the OSCORE object
pub fn oscore_root_path() -> String {
    format!("/{}", OSCORE_OBJECT_ID)
}

/// Group a flat configuration for display and editing
pub fn to_ui(flat: &BootstrapConfig) -> GroupedConfig {
    let mut grouped = GroupedConfig {
        endpoint: None,
        bs: Vec::new(),
        dm: Vec::new(),
        to_delete: flat.to_delete.clone(),
        auto_id_for_security_object: flat.auto_id_for_security_object,
    };

    for (id, security) in &flat.security {
        let oscore = security
            .oscore_security_mode
            .and_then(|oscore_id| flat.oscore.get(&oscore_id))
            .cloned();

        if security.bootstrap_server {
            grouped.bs.push(BootstrapEntry {
                security: security.clone(),
                oscore,
            });
            continue;
        }

        let server = security.server_id.and_then(|server_id| {
            flat.servers
                .values()
                .find(|server| server.short_id == server_id)
        });

        match server {
            Some(server) => grouped.dm.push(DmServer {
                server: server.clone(),
                security: security.clone(),
                oscore,
            }),
            None => debug!(
                security_id = id,
                server_id = ?security.server_id,
                "dropping security entry without matching server"
            ),
        }
    }

    grouped
}

/// Group every configuration of an endpoint-keyed map, keeping the keys
pub fn to_ui_map(configs: &BTreeMap<String, BootstrapConfig>) -> BTreeMap<String, GroupedConfig> {
    configs
        .iter()
        .map(|(endpoint, flat)| (endpoint.clone(), to_ui(flat)))
        .collect()
}

/// Group every configuration of an endpoint-keyed collection into a list,
/// recording each key as the grouped record's `endpoint`
pub fn to_ui_list<'a, I>(configs: I) -> Vec<GroupedConfig>
where
    I: IntoIterator<Item = (&'a String, &'a BootstrapConfig)>,
{
    configs
        .into_iter()
        .map(|(endpoint, flat)| {
            let mut grouped = to_ui(flat);
            grouped.endpoint = Some(endpoint.clone());
            grouped
        })
        .collect()
}

/// Flatten a grouped configuration into the shape the server stores.
///
/// Bootstrap entries take instance ids from 0; DM servers follow. Instance
/// id 0 is never given to a DM server, so with no bootstrap entry DM ids
/// start at 1. OSCORE instances share the id of the security entry they
/// belong to.
pub fn to_rest(grouped: &GroupedConfig) -> BootstrapConfig {
    let mut flat = BootstrapConfig {
        auto_id_for_security_object: grouped.auto_id_for_security_object,
        ..Default::default()
    };

    let mut next: InstanceId = 0;
    for entry in &grouped.bs {
        let mut security = entry.security.clone();
        security.oscore_security_mode = None;
        if let Some(oscore) = &entry.oscore {
            flat.oscore.insert(next, oscore.clone());
            security.oscore_security_mode = Some(next);
        }
        flat.security.insert(next, security);
        next += 1;
    }

    if next == 0 {
        next = 1;
    }

    for dm in &grouped.dm {
        let mut security = dm.security.clone();
        security.oscore_security_mode = None;
        if let Some(oscore) = &dm.oscore {
            flat.oscore.insert(next, oscore.clone());
            security.oscore_security_mode = Some(next);
        }
        flat.security.insert(next, security);
        flat.servers.insert(next, dm.server.clone());
        next += 1;
    }

    flat.to_delete = default_paths_to_delete();
    if !flat.oscore.is_empty() {
        flat.to_delete.push(oscore_root_path());
    }

    flat
}
