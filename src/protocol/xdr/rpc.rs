//! Data structures for the Remote Procedure Call (RPC) protocol as defined
//! in RFC 5531. These structures handle serialization and deserialization
//! of RPC messages between client and server, including the credential
//! bodies of the authentication flavors this server understands.

// The full RFC surface is implemented even where the server only consumes
// a subset of it.
#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    deserialize, Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum,
    SerializeStruct,
};

/// The RPC protocol version spoken by this server. Always 2.
pub const RPC_VERSION: u32 = 2;

/// Authentication status codes indicating why authentication failed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    /// Success (placeholder; never sent in a rejection)
    AUTH_OK = 0,
    /// Invalid credentials provided by the client
    #[default]
    AUTH_BADCRED = 1,
    /// Credentials rejected; the client must begin a new session
    AUTH_REJECTEDCRED = 2,
    /// Invalid verifier provided by the client
    AUTH_BADVERF = 3,
    /// Verifier rejected (expired or replayed)
    AUTH_REJECTEDVERF = 4,
    /// Authentication mechanism too weak for the requested operation
    AUTH_TOOWEAK = 5,
    /// Invalid response verifier
    AUTH_INVALIDRESP = 6,
    /// Unknown failure
    AUTH_FAILED = 7,
}
SerializeEnum!(auth_stat);
DeserializeEnum!(auth_stat);

/// Authentication flavor (mechanism) identifiers for RPC.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum auth_flavor {
    /// No authentication; anonymous caller
    #[default]
    AUTH_NONE = 0,
    /// UNIX-style authentication (uid/gid/gids)
    AUTH_SYS = 1,
    /// Short-hand credential issued by the server
    AUTH_SHORT = 2,
    /// Diffie-Hellman public key authentication
    AUTH_DH = 3,
    /// RPCSEC_GSS security (RFC 2203)
    RPCSEC_GSS = 6,
}
SerializeEnum!(auth_flavor);
DeserializeEnum!(auth_flavor);

/// UNIX-style credential body carried by AUTH_SYS calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct auth_sys_parms {
    /// Arbitrary client-chosen stamp
    pub stamp: u32,
    /// Name of the calling machine
    pub machinename: Vec<u8>,
    /// Effective user id of the caller
    pub uid: u32,
    /// Effective group id of the caller
    pub gid: u32,
    /// Supplementary group ids, at most 16
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_sys_parms, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_sys_parms, stamp, machinename, uid, gid, gids);

/// Maximum number of supplementary gids in an AUTH_SYS credential.
pub const AUTH_SYS_MAX_GIDS: usize = 16;

/// AUTH_DH full-network-name credential shape.
///
/// Only the structure is modeled; the cryptographic exchange is not wired,
/// so the auth dispatcher rejects these after decoding.
#[derive(Clone, Debug, Default)]
pub struct auth_dh_cred {
    /// Claimed client identity
    pub client_name: Vec<u8>,
    /// Operating-system network name
    pub netname: Vec<u8>,
    /// Client public key material
    pub pubkey: Vec<u8>,
    /// Encrypted conversation timestamp
    pub enc_timestamp: Vec<u8>,
    /// Credential lifetime window in seconds
    pub window: u32,
}
DeserializeStruct!(auth_dh_cred, client_name, netname, pubkey, enc_timestamp, window);
SerializeStruct!(auth_dh_cred, client_name, netname, pubkey, enc_timestamp, window);

/// RPCSEC_GSS control procedures (RFC 2203 section 5).
pub const RPCSEC_GSS_DATA: u32 = 0;
pub const RPCSEC_GSS_INIT: u32 = 1;
pub const RPCSEC_GSS_CONTINUE_INIT: u32 = 2;
pub const RPCSEC_GSS_DESTROY: u32 = 3;

/// The only RPCSEC_GSS version this server recognizes.
pub const RPCSEC_GSS_VERSION: u32 = 1;

/// RPCSEC_GSS credential shape (RFC 2203 section 5.3.2).
///
/// Structure-only, like [`auth_dh_cred`]: decoded, validated and rejected
/// until a GSS implementation is wired in.
#[derive(Clone, Debug, Default)]
pub struct rpcsec_gss_cred {
    /// Must be [`RPCSEC_GSS_VERSION`]
    pub version: u32,
    /// One of the `RPCSEC_GSS_*` control procedures
    pub procedure: u32,
    /// Anti-replay sequence number
    pub sequence: u32,
    /// Requested service level (none/integrity/privacy)
    pub service: u32,
    /// Established context handle
    pub handle: Vec<u8>,
    /// Context token for INIT/CONTINUE_INIT
    pub token: Vec<u8>,
}
DeserializeStruct!(rpcsec_gss_cred, version, procedure, sequence, service, handle, token);
SerializeStruct!(rpcsec_gss_cred, version, procedure, sequence, service, handle, token);

/// An authentication field as carried by every call and reply: a flavor
/// identifier plus up to 400 bytes of flavor-specific body.
#[derive(Clone, Debug)]
pub struct opaque_auth {
    /// The authentication mechanism being used
    pub flavor: auth_flavor,
    /// Opaque body, interpreted per flavor
    pub body: Vec<u8>,
}

/// Upper bound on the body of an [`opaque_auth`] (RFC 5531 section 8.2).
pub const MAX_AUTH_BYTES: usize = 400;

impl Default for opaque_auth {
    fn default() -> opaque_auth {
        opaque_auth { flavor: auth_flavor::AUTH_NONE, body: Vec::new() }
    }
}

impl Serialize for opaque_auth {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.flavor.serialize(dest)?;
        self.body.serialize(dest)
    }
}
impl Deserialize for opaque_auth {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.flavor.deserialize(src)?;
        self.body.deserialize(src)?;
        if self.body.len() > MAX_AUTH_BYTES {
            return Err(super::invalid_data(format!(
                "auth body of {} bytes exceeds the 400-byte limit",
                self.body.len()
            )));
        }
        Ok(())
    }
}

/// A complete RPC message: transaction id plus a call or reply body.
///
/// The xid ties replies to calls and lets servers detect retransmissions;
/// it is echoed verbatim, never interpreted as a sequence number.
#[derive(Clone, Debug, Default)]
pub struct rpc_msg {
    /// Transaction identifier used to match calls and replies
    pub xid: u32,
    /// The body of the RPC message (call or reply)
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

/// The body of an RPC message, either a call or a reply.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
#[repr(u32)]
pub enum rpc_body {
    /// A call to a remote procedure
    CALL(call_body),
    /// A reply from a remote procedure
    REPLY(reply_body),
}

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

impl Serialize for rpc_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rpc_body::CALL(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rpc_body::REPLY(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for rpc_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rpc_body::CALL(deserialize(src)?),
            1 => *self = rpc_body::REPLY(deserialize(src)?),
            msg_type => {
                return Err(super::invalid_data(format!("invalid rpc message type {msg_type}")))
            }
        }
        Ok(())
    }
}

/// The body of an RPC call: program coordinates plus authentication.
#[derive(Clone, Debug, Default)]
pub struct call_body {
    /// RPC protocol version, must be 2
    pub rpcvers: u32,
    /// The program to call
    pub prog: u32,
    /// The version of the program
    pub vers: u32,
    /// The procedure within the program
    pub proc: u32,
    /// Caller credentials
    pub cred: opaque_auth,
    /// Caller verifier
    pub verf: opaque_auth,
    /* procedure-specific parameters follow on the wire */
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

/// The body of an RPC reply: accepted or denied.
#[derive(Clone, Debug)]
pub enum reply_body {
    /// The call was accepted (though it may still have failed)
    MSG_ACCEPTED(accepted_reply),
    /// The call was denied outright
    MSG_DENIED(rejected_reply),
}

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

impl Serialize for reply_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            reply_body::MSG_ACCEPTED(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            reply_body::MSG_DENIED(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for reply_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = reply_body::MSG_ACCEPTED(deserialize(src)?),
            1 => *self = reply_body::MSG_DENIED(deserialize(src)?),
            reply_stat => {
                return Err(super::invalid_data(format!("invalid reply_stat {reply_stat}")))
            }
        }
        Ok(())
    }
}

/// Supported version range reported on a version mismatch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct mismatch_info {
    /// Lowest version supported
    pub low: u32,
    /// Highest version supported
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// Reply to an accepted RPC call: server verifier plus the result union.
#[derive(Clone, Debug, Default)]
pub struct accepted_reply {
    /// Authentication verifier from the server
    pub verf: opaque_auth,
    /// Result union discriminated by accept_stat
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

/// Result of an accepted RPC call, discriminated by accept_stat.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default)]
#[repr(u32)]
pub enum accept_body {
    /// Call completed; protocol-specific results follow on the wire
    #[default]
    SUCCESS,
    /// Program is not served here
    PROG_UNAVAIL,
    /// Program version out of range; carries the supported range
    PROG_MISMATCH(mismatch_info),
    /// Procedure number unknown to this program
    PROC_UNAVAIL,
    /// Arguments could not be decoded
    GARBAGE_ARGS,
    /// Internal server failure
    SYSTEM_ERR,
}

impl Serialize for accept_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            accept_body::SUCCESS => 0_u32.serialize(dest),
            accept_body::PROG_UNAVAIL => 1_u32.serialize(dest),
            accept_body::PROG_MISMATCH(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
            accept_body::PROC_UNAVAIL => 3_u32.serialize(dest),
            accept_body::GARBAGE_ARGS => 4_u32.serialize(dest),
            accept_body::SYSTEM_ERR => 5_u32.serialize(dest),
        }
    }
}
impl Deserialize for accept_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = accept_body::SUCCESS,
            1 => *self = accept_body::PROG_UNAVAIL,
            2 => *self = accept_body::PROG_MISMATCH(deserialize(src)?),
            3 => *self = accept_body::PROC_UNAVAIL,
            4 => *self = accept_body::GARBAGE_ARGS,
            5 => *self = accept_body::SYSTEM_ERR,
            accept_stat => {
                return Err(super::invalid_data(format!("invalid accept_stat {accept_stat}")))
            }
        }
        Ok(())
    }
}

/// Reply sent when an RPC call is rejected: either the RPC protocol
/// version is unsupported or authentication failed.
#[derive(Clone, Debug)]
pub enum rejected_reply {
    /// RPC version mismatch, with the supported version range
    RPC_MISMATCH(mismatch_info),
    /// Authentication failed, with the specific reason
    AUTH_ERROR(auth_stat),
}

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

impl Serialize for rejected_reply {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rejected_reply::RPC_MISMATCH(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rejected_reply::AUTH_ERROR(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}
impl Deserialize for rejected_reply {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rejected_reply::RPC_MISMATCH(deserialize(src)?),
            1 => *self = rejected_reply::AUTH_ERROR(deserialize(src)?),
            reject_stat => {
                return Err(super::invalid_data(format!("invalid reject_stat {reject_stat}")))
            }
        }
        Ok(())
    }
}

/// Creates a reply indicating the requested procedure does not exist.
pub fn proc_unavail_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::PROC_UNAVAIL,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a reply indicating the requested program is not served here.
pub fn prog_unavail_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::PROG_UNAVAIL,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a reply carrying the supported version range for a program.
pub fn prog_mismatch_reply_message(xid: u32, low: u32, high: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::PROG_MISMATCH(mismatch_info { low, high }),
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a reply indicating the call arguments could not be decoded.
pub fn garbage_args_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::GARBAGE_ARGS,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a reply indicating an internal server failure.
pub fn system_err_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::SYSTEM_ERR,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a MSG_DENIED reply for an unsupported RPC protocol version.
pub fn rpc_mismatch_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(mismatch_info {
        low: RPC_VERSION,
        high: RPC_VERSION,
    }));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a MSG_DENIED reply for a failed authentication.
pub fn auth_error_reply_message(xid: u32, stat: auth_stat) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Creates a successful accepted reply; procedure results follow it.
pub fn make_success_reply(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::SUCCESS,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdr::serialize_to_vec;

    #[test]
    fn call_round_trip() {
        let msg = rpc_msg {
            xid: 0x11111111,
            body: rpc_body::CALL(call_body {
                rpcvers: 2,
                prog: 100003,
                vers: 3,
                proc: 0,
                cred: opaque_auth::default(),
                verf: opaque_auth::default(),
            }),
        };
        let buf = serialize_to_vec(&msg).unwrap();
        let decoded = deserialize::<rpc_msg>(&mut &buf[..]).unwrap();
        assert_eq!(decoded.xid, 0x11111111);
        match decoded.body {
            rpc_body::CALL(call) => {
                assert_eq!(call.prog, 100003);
                assert_eq!(call.vers, 3);
                assert_eq!(call.proc, 0);
            }
            rpc_body::REPLY(_) => panic!("decoded a reply from call bytes"),
        }
    }

    #[test]
    fn oversized_auth_body_is_rejected() {
        let auth = opaque_auth { flavor: auth_flavor::AUTH_SYS, body: vec![0; 401] };
        let buf = serialize_to_vec(&auth).unwrap();
        assert!(deserialize::<opaque_auth>(&mut &buf[..]).is_err());
    }

    #[test]
    fn success_reply_wire_shape() {
        // MSG_ACCEPTED + AUTH_NONE verifier + SUCCESS is a fixed 24-byte shape
        let buf = serialize_to_vec(&make_success_reply(7)).unwrap();
        assert_eq!(
            buf,
            [
                0, 0, 0, 7, // xid
                0, 0, 0, 1, // REPLY
                0, 0, 0, 0, // MSG_ACCEPTED
                0, 0, 0, 0, // verf flavor AUTH_NONE
                0, 0, 0, 0, // verf length 0
                0, 0, 0, 0, // SUCCESS
            ]
        );
    }
}
