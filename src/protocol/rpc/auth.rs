//! The authentication dispatcher.
//!
//! Given the credential and verifier fields of an RPC call header, this
//! module produces a [`Principal`]: the identity every downstream check
//! (export gate, quota, file permissions) operates on. Failures map to an
//! [`crate::xdr::rpc::auth_stat`] that the wire layer turns into a
//! `MSG_DENIED / AUTH_ERROR` reply.
//!
//! AUTH_NONE and AUTH_SYS are fully supported. AUTH_DH and RPCSEC_GSS are
//! structural frameworks: their credential shapes are decoded and
//! validated, then rejected with AUTH_TOOWEAK because no cryptographic
//! backend is wired in. They are never silently accepted.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::protocol::xdr::rpc::{
    auth_dh_cred, auth_flavor, auth_stat, auth_sys_parms, opaque_auth, rpcsec_gss_cred,
    AUTH_SYS_MAX_GIDS, RPCSEC_GSS_DATA, RPCSEC_GSS_DESTROY, RPCSEC_GSS_VERSION,
};
use crate::protocol::xdr::{deserialize, Deserialize};

/// Authentication failure reason, surfaced as `AUTH_ERROR` on the wire.
pub type AuthError = auth_stat;

/// What the server knows about the caller after authentication.
#[derive(Clone, Debug)]
pub struct Principal {
    /// False for the anonymous principal produced by AUTH_NONE
    pub authenticated: bool,
    /// The flavor that produced this principal
    pub flavor: auth_flavor,
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups, at most 16
    pub gids: Vec<u32>,
    /// Client machine name as presented, or "anonymous"
    pub machine: String,
}

impl Principal {
    /// The anonymous identity used for AUTH_NONE and squashed callers.
    pub fn anonymous(anon_uid: u32, anon_gid: u32) -> Principal {
        Principal {
            authenticated: false,
            flavor: auth_flavor::AUTH_NONE,
            uid: anon_uid,
            gid: anon_gid,
            gids: vec![anon_gid],
            machine: "anonymous".to_string(),
        }
    }
}

impl Default for Principal {
    fn default() -> Principal {
        Principal::anonymous(crate::exports::ANON_UID, crate::exports::ANON_GID)
    }
}

/// Monotonic counters feeding the statistics snapshot and audit log.
#[derive(Debug, Default)]
pub struct AuthCounters {
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
}

/// The flavor dispatcher and server-default squash policy.
///
/// Export options may re-squash a principal later; the dispatcher applies
/// the server-wide defaults so a principal is safe to use even before an
/// export has been selected.
pub struct Authenticator {
    allow_none: bool,
    allow_sys: bool,
    allow_dh: bool,
    allow_gss: bool,
    root_squash: bool,
    all_squash: bool,
    anon_uid: u32,
    anon_gid: u32,
    pub counters: AuthCounters,
}

impl Authenticator {
    pub fn from_config(config: &ServerConfig) -> Authenticator {
        Authenticator {
            allow_none: config.flavor_enabled("none"),
            allow_sys: config.flavor_enabled("sys"),
            allow_dh: config.flavor_enabled("dh"),
            allow_gss: config.flavor_enabled("gss"),
            root_squash: config.root_squash,
            all_squash: config.all_squash,
            anon_uid: config.anon_uid,
            anon_gid: config.anon_gid,
            counters: AuthCounters::default(),
        }
    }

    /// Authenticates one call. The verifier is structurally present but
    /// carries nothing for the flavors served here.
    pub fn authenticate(
        &self,
        cred: &opaque_auth,
        _verf: &opaque_auth,
        client: &SocketAddr,
    ) -> Result<Principal, AuthError> {
        let outcome = self.dispatch(cred);
        match &outcome {
            Ok(principal) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                info!(
                    target: "audit",
                    client = %client,
                    username = %principal.machine,
                    uid = principal.uid,
                    operation = "AUTHENTICATION",
                    success = true,
                    detail = ?principal.flavor,
                );
            }
            Err(stat) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                info!(
                    target: "audit",
                    client = %client,
                    username = "",
                    operation = "AUTHENTICATION",
                    success = false,
                    detail = ?stat,
                );
            }
        }
        outcome
    }

    fn dispatch(&self, cred: &opaque_auth) -> Result<Principal, AuthError> {
        match cred.flavor {
            auth_flavor::AUTH_NONE => {
                if !self.allow_none {
                    return Err(auth_stat::AUTH_TOOWEAK);
                }
                Ok(Principal::anonymous(self.anon_uid, self.anon_gid))
            }
            auth_flavor::AUTH_SYS => {
                if !self.allow_sys {
                    return Err(auth_stat::AUTH_TOOWEAK);
                }
                self.auth_sys(&cred.body)
            }
            auth_flavor::AUTH_DH => {
                if !self.allow_dh {
                    return Err(auth_stat::AUTH_TOOWEAK);
                }
                self.auth_dh(&cred.body)
            }
            auth_flavor::RPCSEC_GSS => {
                if !self.allow_gss {
                    return Err(auth_stat::AUTH_TOOWEAK);
                }
                self.rpcsec_gss(&cred.body)
            }
            _ => Err(auth_stat::AUTH_REJECTEDCRED),
        }
    }

    fn auth_sys(&self, body: &[u8]) -> Result<Principal, AuthError> {
        let mut cursor = Cursor::new(body);
        let mut parms = auth_sys_parms::default();
        parms.deserialize(&mut cursor).map_err(|e| {
            debug!("malformed AUTH_SYS credential: {e}");
            auth_stat::AUTH_BADCRED
        })?;
        if parms.machinename.is_empty() || parms.machinename.len() > 255 {
            return Err(auth_stat::AUTH_BADCRED);
        }
        if parms.gids.len() > AUTH_SYS_MAX_GIDS {
            return Err(auth_stat::AUTH_BADCRED);
        }

        let machine = String::from_utf8_lossy(&parms.machinename).into_owned();
        let squashed = self.all_squash || (self.root_squash && parms.uid == 0);
        if squashed {
            let mut principal = Principal::anonymous(self.anon_uid, self.anon_gid);
            principal.authenticated = true;
            principal.flavor = auth_flavor::AUTH_SYS;
            principal.machine = machine;
            return Ok(principal);
        }
        Ok(Principal {
            authenticated: true,
            flavor: auth_flavor::AUTH_SYS,
            uid: parms.uid,
            gid: parms.gid,
            gids: parms.gids,
            machine,
        })
    }

    /// Decode-and-reject: the DH shape is validated but the server holds
    /// no keys, so the credential cannot be verified.
    fn auth_dh(&self, body: &[u8]) -> Result<Principal, AuthError> {
        let mut cursor = Cursor::new(body);
        let cred = deserialize::<auth_dh_cred>(&mut cursor).map_err(|e| {
            debug!("malformed AUTH_DH credential: {e}");
            auth_stat::AUTH_BADCRED
        })?;
        if cred.client_name.is_empty() {
            return Err(auth_stat::AUTH_BADCRED);
        }
        debug!("AUTH_DH credential from {:?} rejected: no DH backend", cred.client_name);
        Err(auth_stat::AUTH_TOOWEAK)
    }

    /// Decode-and-reject: the GSS control shape is validated but no GSS
    /// context can be established.
    fn rpcsec_gss(&self, body: &[u8]) -> Result<Principal, AuthError> {
        let mut cursor = Cursor::new(body);
        let cred = deserialize::<rpcsec_gss_cred>(&mut cursor).map_err(|e| {
            debug!("malformed RPCSEC_GSS credential: {e}");
            auth_stat::AUTH_BADCRED
        })?;
        if cred.version != RPCSEC_GSS_VERSION {
            return Err(auth_stat::AUTH_BADCRED);
        }
        if !(RPCSEC_GSS_DATA..=RPCSEC_GSS_DESTROY).contains(&cred.procedure) {
            return Err(auth_stat::AUTH_BADCRED);
        }
        debug!("RPCSEC_GSS procedure {} rejected: no GSS backend", cred.procedure);
        Err(auth_stat::AUTH_TOOWEAK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::xdr::rpc::RPCSEC_GSS_INIT;
    use crate::xdr::serialize_to_vec;
    use crate::xdr::Serialize;

    fn client() -> SocketAddr {
        "192.0.2.1:700".parse().unwrap()
    }

    fn authenticator(config: &ServerConfig) -> Authenticator {
        Authenticator::from_config(config)
    }

    fn sys_cred(uid: u32, gid: u32, gids: Vec<u32>, machine: &[u8]) -> opaque_auth {
        let parms = auth_sys_parms {
            stamp: 0,
            machinename: machine.to_vec(),
            uid,
            gid,
            gids,
        };
        opaque_auth { flavor: auth_flavor::AUTH_SYS, body: serialize_to_vec(&parms).unwrap() }
    }

    #[test]
    fn auth_none_yields_anonymous() {
        let auth = authenticator(&ServerConfig::default());
        let principal = auth
            .authenticate(&opaque_auth::default(), &opaque_auth::default(), &client())
            .unwrap();
        assert!(!principal.authenticated);
        assert_eq!(principal.uid, crate::exports::ANON_UID);
        assert_eq!(principal.machine, "anonymous");
    }

    #[test]
    fn auth_none_disabled_is_too_weak() {
        let config = ServerConfig {
            security_mode: vec!["sys".to_string()],
            ..ServerConfig::default()
        };
        let auth = authenticator(&config);
        let err = auth
            .authenticate(&opaque_auth::default(), &opaque_auth::default(), &client())
            .unwrap_err();
        assert_eq!(err, auth_stat::AUTH_TOOWEAK);
    }

    #[test]
    fn auth_sys_decodes_identity() {
        let config = ServerConfig { root_squash: false, ..ServerConfig::default() };
        let auth = authenticator(&config);
        let cred = sys_cred(1000, 100, vec![100, 200], b"wkstn");
        let principal =
            auth.authenticate(&cred, &opaque_auth::default(), &client()).unwrap();
        assert!(principal.authenticated);
        assert_eq!(principal.uid, 1000);
        assert_eq!(principal.gid, 100);
        assert_eq!(principal.gids, vec![100, 200]);
        assert_eq!(principal.machine, "wkstn");
    }

    #[test]
    fn root_squash_remaps_uid_zero() {
        let auth = authenticator(&ServerConfig::default());
        let cred = sys_cred(0, 0, vec![], b"client");
        let principal =
            auth.authenticate(&cred, &opaque_auth::default(), &client()).unwrap();
        assert_eq!(principal.uid, crate::exports::ANON_UID);
        assert_eq!(principal.gid, crate::exports::ANON_GID);
        assert!(principal.authenticated);
    }

    #[test]
    fn empty_machine_name_is_bad_cred() {
        let auth = authenticator(&ServerConfig::default());
        let cred = sys_cred(1000, 100, vec![], b"");
        let err = auth.authenticate(&cred, &opaque_auth::default(), &client()).unwrap_err();
        assert_eq!(err, auth_stat::AUTH_BADCRED);
    }

    #[test]
    fn too_many_gids_is_bad_cred() {
        let auth = authenticator(&ServerConfig::default());
        let cred = sys_cred(1000, 100, (0..17).collect(), b"client");
        let err = auth.authenticate(&cred, &opaque_auth::default(), &client()).unwrap_err();
        assert_eq!(err, auth_stat::AUTH_BADCRED);
    }

    #[test]
    fn truncated_sys_cred_is_bad_cred() {
        let auth = authenticator(&ServerConfig::default());
        let cred = opaque_auth { flavor: auth_flavor::AUTH_SYS, body: vec![0, 0, 0] };
        let err = auth.authenticate(&cred, &opaque_auth::default(), &client()).unwrap_err();
        assert_eq!(err, auth_stat::AUTH_BADCRED);
    }

    #[test]
    fn auth_dh_framework_rejects() {
        let config = ServerConfig {
            security_mode: vec!["dh".to_string()],
            ..ServerConfig::default()
        };
        let auth = authenticator(&config);
        let dh = auth_dh_cred {
            client_name: b"unix.client.example.com".to_vec(),
            netname: b"client.example.com".to_vec(),
            pubkey: vec![1; 48],
            enc_timestamp: vec![2; 8],
            window: 300,
        };
        let mut body = Vec::new();
        dh.serialize(&mut body).unwrap();
        let cred = opaque_auth { flavor: auth_flavor::AUTH_DH, body };
        let err = auth.authenticate(&cred, &opaque_auth::default(), &client()).unwrap_err();
        assert_eq!(err, auth_stat::AUTH_TOOWEAK);
    }

    #[test]
    fn gss_framework_validates_version_and_proc() {
        let config = ServerConfig {
            security_mode: vec!["gss".to_string()],
            ..ServerConfig::default()
        };
        let auth = authenticator(&config);
        let make = |version, procedure| {
            let gss = rpcsec_gss_cred {
                version,
                procedure,
                sequence: 1,
                service: 1,
                handle: vec![],
                token: vec![],
            };
            let mut body = Vec::new();
            gss.serialize(&mut body).unwrap();
            opaque_auth { flavor: auth_flavor::RPCSEC_GSS, body }
        };
        // valid shape, no backend: TOOWEAK
        let err = auth
            .authenticate(&make(1, RPCSEC_GSS_INIT), &opaque_auth::default(), &client())
            .unwrap_err();
        assert_eq!(err, auth_stat::AUTH_TOOWEAK);
        // bad version or procedure: BADCRED
        let err = auth
            .authenticate(&make(2, RPCSEC_GSS_INIT), &opaque_auth::default(), &client())
            .unwrap_err();
        assert_eq!(err, auth_stat::AUTH_BADCRED);
        let err = auth
            .authenticate(&make(1, 9), &opaque_auth::default(), &client())
            .unwrap_err();
        assert_eq!(err, auth_stat::AUTH_BADCRED);
    }
}
