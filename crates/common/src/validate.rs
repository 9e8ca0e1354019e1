//! Consistency checks run before a bootstrap configuration is submitted

use crate::types::{BootstrapConfig, OscoreObject, SecurityMode, ServerSecurity};
use crate::{Error, Result};

/// Check a flat configuration the way the bootstrap server will.
///
/// Returns the first violation found.
pub fn validate(config: &BootstrapConfig) -> Result<()> {
    for (id, security) in &config.security {
        check_security(*id, security, config)?;
    }

    for (id, server) in &config.servers {
        if server.short_id == 0 {
            return Err(invalid(format!("server {}: short ID must not be 0", id)));
        }

        let security = config
            .security
            .values()
            .find(|s| s.server_id == Some(server.short_id))
            .ok_or_else(|| invalid(format!("no security entry for server instance {}", id)))?;

        if security.bootstrap_server {
            return Err(invalid(format!(
                "the security entry for server {} should not be a bootstrap server",
                id
            )));
        }
    }

    Ok(())
}

fn check_security(id: u16, sec: &ServerSecurity, config: &BootstrapConfig) -> Result<()> {
    let oscore = if sec.bootstrap_server {
        sec.oscore_security_mode
            .and_then(|oscore_id| config.oscore.get(&oscore_id))
    } else {
        None
    };

    if let Some(oscore) = oscore {
        check_oscore(id, oscore)?;
    }

    if sec.uri.as_deref().map_or(true, str::is_empty) {
        return Err(invalid(format!("security {}: LwM2M Server URI is mandatory", id)));
    }
    let mode = sec
        .security_mode
        .ok_or_else(|| invalid(format!("security {}: Security Mode is mandatory", id)))?;

    // OSCORE replaces the (D)TLS credentials
    if oscore.is_some() {
        return Ok(());
    }

    let label = match mode {
        SecurityMode::NoSec => {
            require(sec.secret_key.is_empty(), id, "NO-SEC mode, secret key must be empty")?;
            require(
                sec.public_key_or_id.is_empty(),
                id,
                "NO-SEC mode, public key or ID must be empty",
            )?;
            require(
                sec.server_public_key.is_empty(),
                id,
                "NO-SEC mode, server public key must be empty",
            )?;
            return Ok(());
        }
        SecurityMode::Psk => {
            require(
                !sec.secret_key.is_empty(),
                id,
                "pre-shared-key mode, secret key must not be empty",
            )?;
            require(
                !sec.public_key_or_id.is_empty(),
                id,
                "pre-shared-key mode, public key or id must not be empty",
            )?;
            return Ok(());
        }
        SecurityMode::Rpk => "raw-public-key",
        SecurityMode::X509 => "x509",
        SecurityMode::Est => return Ok(()),
    };

    require(
        !sec.secret_key.is_empty(),
        id,
        &format!("{} mode, secret key must not be empty", label),
    )?;
    require(
        !sec.public_key_or_id.is_empty(),
        id,
        &format!("{} mode, public key or id must not be empty", label),
    )?;
    require(
        !sec.server_public_key.is_empty(),
        id,
        &format!("{} mode, server public key must not be empty", label),
    )
}

fn check_oscore(id: u16, oscore: &OscoreObject) -> Result<()> {
    let empty = |bytes: &Option<Vec<u8>>| bytes.as_ref().map_or(true, Vec::is_empty);
    require(!empty(&oscore.oscore_master_secret), id, "master secret must not be empty")?;
    require(
        !(empty(&oscore.oscore_sender_id) && empty(&oscore.oscore_recipient_id)),
        id,
        "either sender ID or recipient ID must be filled",
    )
}

fn require(condition: bool, id: u16, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(invalid(format!("security {}: {}", id, message)))
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}
