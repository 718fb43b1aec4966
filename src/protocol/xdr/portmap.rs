//! Portmap protocol (RFC 1833, historically RFC 1057 Appendix A) wire
//! types. The portmapper translates `(program, version, protocol)` triples
//! into the port number a service listens on.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum, SerializeStruct,
};

/// Portmap RPC program number.
pub const PROGRAM: u32 = 100000;
/// Portmap RPC version number.
pub const VERSION: u32 = 2;

/// Protocol number for TCP/IP.
pub const IPPROTO_TCP: u32 = 6;
/// Protocol number for UDP/IP.
pub const IPPROTO_UDP: u32 = 17;

/// A binding between an RPC program and a network port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct mapping {
    /// The RPC program number
    pub prog: u32,
    /// The RPC program version number
    pub vers: u32,
    /// The transport protocol (see `IPPROTO_*`)
    pub prot: u32,
    /// The port number where the service is listening
    pub port: u32,
}
DeserializeStruct!(mapping, prog, vers, prot, port);
SerializeStruct!(mapping, prog, vers, prot, port);

/// One node of the linked list returned by DUMP. The list is terminated on
/// the wire by a zero discriminant, which maps to `next: None`.
#[derive(Clone, Debug, Default)]
pub struct pmaplist {
    /// The mapping stored at this node
    pub map: mapping,
    /// The rest of the list
    pub next: Option<Box<pmaplist>>,
}
DeserializeStruct!(pmaplist, map, next);
SerializeStruct!(pmaplist, map, next);

/// Arguments of the CALLIT procedure: an indirect call request.
#[derive(Clone, Debug, Default)]
pub struct call_args {
    /// Target program number
    pub prog: u32,
    /// Target program version
    pub vers: u32,
    /// Target procedure number
    pub proc: u32,
    /// Already-encoded arguments for the target procedure
    pub args: Vec<u8>,
}
DeserializeStruct!(call_args, prog, vers, proc, args);
SerializeStruct!(call_args, prog, vers, proc, args);

/// Result of the CALLIT procedure: the port the call was relayed to (zero
/// when nothing was forwarded) and the remote results.
#[derive(Clone, Debug, Default)]
pub struct call_result {
    /// Port of the target service, 0 if the call was not forwarded
    pub port: u32,
    /// Encoded results from the target procedure
    pub res: Vec<u8>,
}
DeserializeStruct!(call_result, port, res);
SerializeStruct!(call_result, port, res);

/// Procedure numbers for the portmap service.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum PortmapProcedure {
    /// Null procedure for service availability testing
    PMAPPROC_NULL = 0,
    /// Register a program-to-port mapping
    PMAPPROC_SET = 1,
    /// Remove a program-to-port mapping
    PMAPPROC_UNSET = 2,
    /// Look up the port for a program
    PMAPPROC_GETPORT = 3,
    /// List all registered mappings
    PMAPPROC_DUMP = 4,
    /// Relay a call to another registered service
    PMAPPROC_CALLIT = 5,
    /// Sentinel for unknown procedure numbers
    INVALID,
}
SerializeEnum!(PortmapProcedure);
DeserializeEnum!(PortmapProcedure);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdr::{deserialize, serialize_to_vec};

    #[test]
    fn pmaplist_terminates_with_zero_discriminant() {
        let list = pmaplist {
            map: mapping { prog: 100003, vers: 3, prot: IPPROTO_TCP, port: 2049 },
            next: Some(Box::new(pmaplist {
                map: mapping { prog: 100000, vers: 2, prot: IPPROTO_UDP, port: 111 },
                next: None,
            })),
        };
        let buf = serialize_to_vec(&Some(Box::new(list))).unwrap();
        // two nodes of (bool + 4 u32) plus the final zero discriminant
        assert_eq!(buf.len(), 2 * 20 + 4);
        assert_eq!(&buf[buf.len() - 4..], &[0, 0, 0, 0]);

        let mut decoded = deserialize::<Option<Box<pmaplist>>>(&mut &buf[..]).unwrap();
        let first = decoded.take().expect("first node");
        assert_eq!(first.map.port, 2049);
        let second = first.next.expect("second node");
        assert_eq!(second.map.port, 111);
        assert!(second.next.is_none());
    }
}
