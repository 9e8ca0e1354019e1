use std::collections::BTreeMap;

use lwm2m_console_common::adapter::{to_rest, to_ui, to_ui_list, to_ui_map};
use lwm2m_console_common::types::{
    BootstrapConfig, BootstrapEntry, DmServer, GroupedConfig, OscoreObject, SecurityMode,
    ServerConfig, ServerSecurity,
};
use serde_json::json;

fn oscore(secret: u8) -> OscoreObject {
    OscoreObject {
        oscore_master_secret: Some(vec![secret; 16]),
        oscore_sender_id: Some(vec![0x01]),
        ..Default::default()
    }
}

/// Bootstrap server with OSCORE at 0, two DM servers at 3 and 7, one with
/// OSCORE stored under an unrelated instance id.
fn sample_flat() -> BootstrapConfig {
    serde_json::from_value(json!({
        "servers": {
            "3": { "shortId": 123, "lifetime": 300, "binding": ["U"] },
            "7": { "shortId": 456, "lifetime": 600, "notifIfDisabled": true }
        },
        "security": {
            "0": { "uri": "coap://bs:5683", "bootstrapServer": true,
                   "securityMode": "NO_SEC", "oscoreSecurityMode": 0 },
            "3": { "uri": "coaps://dm1:5684", "bootstrapServer": false, "securityMode": "PSK",
                   "serverId": 123, "publicKeyOrId": [99, 108], "secretKey": [1, 2, 3] },
            "7": { "uri": "coap://dm2:5683", "bootstrapServer": false, "securityMode": "NO_SEC",
                   "serverId": 456, "oscoreSecurityMode": 12 }
        },
        "oscore": {
            "0": { "oscoreMasterSecret": [9, 9], "oscoreSenderId": [1] },
            "12": { "oscoreMasterSecret": [8, 8], "oscoreRecipientId": [2] }
        },
        "toDelete": ["/0", "/1", "/21"]
    }))
    .unwrap()
}

/// (security without its OSCORE link, server, oscore) triples, order-independent
fn triples(flat: &BootstrapConfig) -> Vec<String> {
    let mut out: Vec<String> = flat
        .security
        .values()
        .map(|security| {
            let server = security
                .server_id
                .and_then(|sid| flat.servers.values().find(|s| s.short_id == sid));
            let oscore = security
                .oscore_security_mode
                .and_then(|oid| flat.oscore.get(&oid));
            let mut unlinked = security.clone();
            unlinked.oscore_security_mode = None;
            serde_json::to_string(&(unlinked, server, oscore)).unwrap()
        })
        .collect();
    out.sort();
    out
}

#[test]
fn round_trip_preserves_members() {
    let flat = sample_flat();
    let rebuilt = to_rest(&to_ui(&flat));

    assert_eq!(triples(&rebuilt), triples(&flat));
    assert_eq!(rebuilt.servers.len(), 2);
    for security in rebuilt.security.values() {
        if let Some(oscore_id) = security.oscore_security_mode {
            assert!(rebuilt.oscore.contains_key(&oscore_id));
        }
    }
}

#[test]
fn grouping_is_stable_after_one_round_trip() {
    let once = to_ui(&to_rest(&to_ui(&sample_flat())));
    let twice = to_ui(&to_rest(&once));
    assert_eq!(once, twice);
}

#[test]
fn dm_entries_never_take_instance_zero() {
    let grouped = GroupedConfig {
        dm: vec![DmServer {
            server: ServerConfig::new(1),
            security: ServerSecurity::for_server("coap://dm", SecurityMode::NoSec, 1),
            oscore: None,
        }],
        ..Default::default()
    };

    let flat = to_rest(&grouped);
    assert!(!flat.security.contains_key(&0));
    assert!(!flat.servers.contains_key(&0));
    assert_eq!(flat.servers.keys().copied().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn to_rest_leaves_input_untouched() {
    let grouped = to_ui(&sample_flat());
    let before = grouped.clone();
    let _ = to_rest(&grouped);
    assert_eq!(grouped, before);
}

#[test]
fn bootstrap_entry_carries_its_oscore() {
    let mut flat = BootstrapConfig::default();
    let mut security = ServerSecurity::bootstrap("coap://bs", SecurityMode::NoSec);
    security.oscore_security_mode = Some(0);
    flat.security.insert(0, security);
    flat.oscore.insert(0, oscore(7));

    let grouped = to_ui(&flat);
    assert_eq!(grouped.bs.len(), 1);
    assert!(grouped.bs[0].security.bootstrap_server);
    assert_eq!(grouped.bs[0].oscore, Some(oscore(7)));
    assert!(grouped.dm.is_empty());
}

#[test]
fn dm_server_gets_its_security_attached() {
    let mut flat = BootstrapConfig::default();
    flat.servers.insert(0, ServerConfig::new(123));
    let security = ServerSecurity::for_server("coap://dm", SecurityMode::NoSec, 123);
    flat.security.insert(1, security.clone());

    let grouped = to_ui(&flat);
    assert_eq!(
        grouped.dm,
        vec![DmServer {
            server: ServerConfig::new(123),
            security,
            oscore: None,
        }]
    );
}

#[test]
fn oscore_root_is_deleted_only_when_oscore_is_written() {
    let bs_only = GroupedConfig {
        bs: vec![BootstrapEntry {
            security: ServerSecurity::bootstrap("coap://bs", SecurityMode::NoSec),
            oscore: None,
        }],
        ..Default::default()
    };
    assert_eq!(to_rest(&bs_only).to_delete, vec!["/0", "/1"]);

    let mut with_oscore = bs_only.clone();
    with_oscore.bs[0].oscore = Some(oscore(1));
    assert_eq!(to_rest(&with_oscore).to_delete, vec!["/0", "/1", "/21"]);

    let mut dm_oscore = GroupedConfig::default();
    dm_oscore.dm.push(DmServer {
        server: ServerConfig::new(9),
        security: ServerSecurity::for_server("coap://dm", SecurityMode::NoSec, 9),
        oscore: Some(oscore(2)),
    });
    assert_eq!(to_rest(&dm_oscore).to_delete, vec!["/0", "/1", "/21"]);
}

#[test]
fn dangling_server_reference_is_dropped() {
    let mut flat = BootstrapConfig::default();
    flat.servers.insert(0, ServerConfig::new(123));
    flat.security.insert(
        1,
        ServerSecurity::for_server("coap://dm", SecurityMode::NoSec, 999),
    );
    flat.security.insert(
        2,
        ServerSecurity::for_server("coap://dm", SecurityMode::NoSec, 123),
    );

    let grouped = to_ui(&flat);
    assert_eq!(grouped.dm.len(), 1);
    assert_eq!(grouped.dm[0].server.short_id, 123);
}

#[test]
fn dm_security_without_server_id_is_dropped() {
    let mut flat = BootstrapConfig::default();
    flat.servers.insert(0, ServerConfig::new(123));
    let mut orphan = ServerSecurity::for_server("coap://orphan", SecurityMode::NoSec, 123);
    orphan.server_id = None;
    flat.security.insert(1, orphan);

    let grouped = to_ui(&flat);
    assert!(grouped.bs.is_empty());
    assert!(grouped.dm.is_empty());
    assert!(to_rest(&grouped).servers.is_empty());
}

#[test]
fn securities_sharing_a_short_id_each_get_the_server() {
    let mut flat = BootstrapConfig::default();
    flat.servers.insert(0, ServerConfig::new(123));
    flat.security.insert(
        1,
        ServerSecurity::for_server("coap://first", SecurityMode::NoSec, 123),
    );
    flat.security.insert(
        2,
        ServerSecurity::for_server("coap://second", SecurityMode::NoSec, 123),
    );

    let grouped = to_ui(&flat);
    let uris: Vec<_> = grouped
        .dm
        .iter()
        .map(|s| s.security.uri.as_deref().unwrap())
        .collect();
    assert_eq!(uris, vec!["coap://first", "coap://second"]);
    assert!(grouped.dm.iter().all(|s| s.server.short_id == 123));

    let rebuilt = to_rest(&grouped);
    assert_eq!(rebuilt.security.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(rebuilt.servers.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn empty_input_groups_to_nothing() {
    let flat: BootstrapConfig = serde_json::from_value(json!({})).unwrap();
    let grouped = to_ui(&flat);
    assert!(grouped.bs.is_empty());
    assert!(grouped.dm.is_empty());
}

#[test]
fn batch_conversions_keep_endpoints() {
    let mut configs = BTreeMap::new();
    configs.insert("sensor-a".to_string(), sample_flat());
    configs.insert("sensor-b".to_string(), BootstrapConfig::default());

    let by_endpoint = to_ui_map(&configs);
    assert_eq!(by_endpoint.len(), 2);
    assert_eq!(by_endpoint["sensor-a"].dm.len(), 2);
    assert!(by_endpoint["sensor-a"].endpoint.is_none());

    let list = to_ui_list(&configs);
    let endpoints: Vec<_> = list.iter().map(|g| g.endpoint.clone().unwrap()).collect();
    assert_eq!(endpoints, vec!["sensor-a", "sensor-b"]);
}

#[test]
fn grouped_json_shape() {
    let grouped = to_ui(&sample_flat());
    let value = serde_json::to_value(&grouped).unwrap();

    assert_eq!(value["bs"][0]["security"]["uri"], json!("coap://bs:5683"));
    assert_eq!(value["bs"][0]["oscore"]["oscoreMasterSecret"], json!([9, 9]));
    assert_eq!(value["dm"][0]["shortId"], json!(123));
    assert_eq!(value["dm"][0]["lifetime"], json!(300));
    assert_eq!(value["dm"][1]["security"]["serverId"], json!(456));
    assert_eq!(value["dm"][1]["oscore"]["oscoreRecipientId"], json!([2]));

    let parsed: GroupedConfig = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, grouped);
}
