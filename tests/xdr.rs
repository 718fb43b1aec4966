//! Codec-level tests: bijection of the XDR primitives, padding
//! discipline and defense against length bombs.

use std::fmt::Debug;

use simple_nfsd::xdr::nfs3::{fattr3, nfs_fh3, nfsstat3, nfstime3, specdata3, wcc_attr};
use simple_nfsd::xdr::portmap::mapping;
use simple_nfsd::xdr::rpc::{auth_sys_parms, mismatch_info};
use simple_nfsd::xdr::{deserialize, serialize_to_vec, Deserialize, Serialize, MAX_OPAQUE_LEN};

fn check<T>(value: T)
where
    T: Serialize + Deserialize + Default + PartialEq + Debug,
{
    let buf = serialize_to_vec(&value).expect("serialize");
    assert_eq!(buf.len() % 4, 0, "{value:?} did not encode 4-byte aligned");
    let decoded = deserialize::<T>(&mut &buf[..]).expect("deserialize");
    assert_eq!(value, decoded);
    // encoding a decoded value reproduces the original bytes
    assert_eq!(serialize_to_vec(&decoded).unwrap(), buf);
}

#[test]
fn scalars_round_trip() {
    check(false);
    check(true);
    check(0u32);
    check(u32::MAX);
    check(i32::MIN);
    check(0u64);
    check(u64::MAX);
    check(i64::MIN);
}

#[test]
fn opaques_round_trip_with_padding() {
    for len in 0..=9 {
        let value: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(7)).collect();
        let buf = serialize_to_vec(&value).unwrap();
        // length prefix + payload + zero padding to alignment
        assert_eq!(buf.len(), 4 + len + (4 - len % 4) % 4);
        check(value);
    }
}

#[test]
fn strings_round_trip() {
    check(String::new());
    check("x".to_string());
    check("path/with/⊕-unicode".to_string());
}

#[test]
fn options_round_trip() {
    check::<Option<u32>>(None);
    check(Some(17u32));
    check::<Option<Vec<u8>>>(Some(vec![1, 2, 3]));
}

#[test]
fn structs_round_trip() {
    check(mismatch_info { low: 2, high: 4 });
    check(mapping { prog: 100003, vers: 3, prot: 6, port: 2049 });
    check(auth_sys_parms {
        stamp: 7,
        machinename: b"client".to_vec(),
        uid: 1000,
        gid: 100,
        gids: vec![100, 200, 300],
    });
    check(nfs_fh3 { data: vec![0xab; 64] });
    check(fattr3 {
        ftype: simple_nfsd::xdr::nfs3::ftype3::NF3REG,
        mode: 0o644,
        nlink: 1,
        uid: 1000,
        gid: 100,
        size: 12,
        used: 4096,
        rdev: specdata3::default(),
        fsid: 0x42,
        fileid: 1234,
        atime: nfstime3 { seconds: 1, nseconds: 2 },
        mtime: nfstime3 { seconds: 3, nseconds: 4 },
        ctime: nfstime3 { seconds: 5, nseconds: 6 },
    });
    check(wcc_attr { size: 9, ..wcc_attr::default() });
}

#[test]
fn enum_discriminants_are_validated() {
    // 9999 is not an nfsstat3 value
    let buf = serialize_to_vec(&9999u32).unwrap();
    assert!(deserialize::<nfsstat3>(&mut &buf[..]).is_err());
}

#[test]
fn length_at_buffer_end_is_valid_one_past_is_not() {
    // exactly enough bytes for the advertised length
    let buf = [0, 0, 0, 4, b'a', b'b', b'c', b'd'];
    assert_eq!(deserialize::<Vec<u8>>(&mut &buf[..]).unwrap(), b"abcd");
    // one byte longer than the buffer carries
    let buf = [0, 0, 0, 5, b'a', b'b', b'c', b'd'];
    assert!(deserialize::<Vec<u8>>(&mut &buf[..]).is_err());
}

#[test]
fn length_bomb_is_rejected_before_allocation() {
    let mut buf = Vec::new();
    ((MAX_OPAQUE_LEN as u32) + 1).serialize(&mut buf).unwrap();
    assert!(deserialize::<Vec<u8>>(&mut &buf[..]).is_err());
    // a u32 array bomb is refused too
    let mut buf = Vec::new();
    (u32::MAX).serialize(&mut buf).unwrap();
    assert!(deserialize::<Vec<u32>>(&mut &buf[..]).is_err());
}

#[test]
fn unaligned_name_payload_is_rejected() {
    // 3 bytes of name but no pad bytes behind them
    let buf = [0, 0, 0, 3, b'a', b'b', b'c'];
    assert!(deserialize::<Vec<u8>>(&mut &buf[..]).is_err());
}
