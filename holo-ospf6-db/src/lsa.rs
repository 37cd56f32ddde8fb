//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;
use std::sync::atomic::{self, AtomicU32};
use std::time::Instant;

use bitflags::bitflags;
use bytes::Bytes;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::table::TrieKey;

// LSA header length.
pub const LSA_HDR_SIZE: u16 = 20;
// Maximum LSA age.
pub const LSA_MAX_AGE: u16 = 3600;
// Maximum age difference for two instances of the same LSA to be considered
// identical.
pub const LSA_MAX_AGE_DIFF: u16 = 900;
// LSA sequence numbers.
pub const LSA_INIT_SEQ_NO: u32 = 0x80000001;
pub const LSA_MAX_SEQ_NO: u32 = 0x7fffffff;
// Never used by any LSA instance. Storing it in a wrapped LSA makes the next
// allocated sequence number wrap around to `LSA_INIT_SEQ_NO`.
pub const LSA_RESERVED_SEQ_NO: u32 = 0x80000000;

// OSPFv3 LSA type.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct LsaType(pub u16);

// OSPFv3 LSA flooding scope.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum LsaScope {
    Link,
    Area,
    As,
    Reserved,
}

//
// OSPFv3 LSA header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           LS Age              |           LS Type             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Link State ID                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Advertising Router                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    LS Sequence Number                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |        LS Checksum            |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaHdr {
    pub age: u16,
    pub lsa_type: LsaType,
    pub lsa_id: Ipv4Addr,
    pub adv_rtr: Ipv4Addr,
    pub seq_no: u32,
    pub cksum: u16,
    pub length: u16,
}

// LSA database key.
//
// The field order matters: it defines the table key layout, and scoped
// lookups by type or by type and advertising router rely on it.
#[derive(Clone, Copy, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LsaKey {
    pub lsa_type: LsaType,
    pub adv_rtr: Ipv4Addr,
    pub lsa_id: Ipv4Addr,
}

// OSPFv3 LSA.
//
// Decoding and checksum computation happen elsewhere; the body is kept as
// opaque bytes.
#[derive(Debug)]
#[derive(Deserialize, Serialize)]
pub struct Lsa {
    pub hdr: LsaHdr,
    pub body: Bytes,
    // Time the LSA was created or received.
    #[serde(skip)]
    pub base_time: Option<Instant>,
    // Number of neighbors that have this LSA in their retransmission lists.
    #[serde(skip)]
    rxmt_count: AtomicU32,
}

bitflags! {
    // Router-LSA flags.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct LsaRouterFlags: u8 {
        const B = 0x01;
        const E = 0x02;
        const V = 0x04;
        const W = 0x08;
        const NT = 0x10;
    }
}

bitflags! {
    // OSPFv3 options.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct Options: u16 {
        const V6 = 0x0001;
        const E = 0x0002;
        const N = 0x0008;
        const R = 0x0010;
        const DC = 0x0020;
        const AF = 0x0100;
        const L = 0x0200;
        const AT = 0x0400;
    }
}

bitflags! {
    // OSPFv3 prefix options.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct PrefixOptions: u8 {
        const NU = 0x01;
        const LA = 0x02;
        const P = 0x08;
        const DN = 0x10;
        const N = 0x20;
    }
}

// ===== impl LsaType =====

impl LsaType {
    pub const ROUTER: LsaType = LsaType(0x2001);
    pub const NETWORK: LsaType = LsaType(0x2002);
    pub const INTER_AREA_PREFIX: LsaType = LsaType(0x2003);
    pub const INTER_AREA_ROUTER: LsaType = LsaType(0x2004);
    pub const AS_EXTERNAL: LsaType = LsaType(0x4005);
    pub const LINK: LsaType = LsaType(0x0008);
    pub const INTRA_AREA_PREFIX: LsaType = LsaType(0x2009);

    const U_BIT_MASK: u16 = 0x8000;
    const SCOPE_MASK: u16 = 0x6000;
    const FUNCTION_CODE_MASK: u16 = 0x1fff;

    // The U-bit indicates how the LSA should be handled by a router that
    // does not recognize its function code.
    pub fn u_bit(&self) -> bool {
        self.0 & Self::U_BIT_MASK != 0
    }

    pub fn scope(&self) -> LsaScope {
        match self.0 & Self::SCOPE_MASK {
            0x0000 => LsaScope::Link,
            0x2000 => LsaScope::Area,
            0x4000 => LsaScope::As,
            _ => LsaScope::Reserved,
        }
    }

    pub fn function_code(&self) -> u16 {
        self.0 & Self::FUNCTION_CODE_MASK
    }

    // Returns the table key covering all LSAs of this type.
    pub fn trie_key(&self) -> TrieKey {
        TrieKey::new(u128::from(self.0) << 112, 16)
    }
}

impl std::fmt::Display for LsaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            LsaType::ROUTER => write!(f, "Router"),
            LsaType::NETWORK => write!(f, "Network"),
            LsaType::INTER_AREA_PREFIX => write!(f, "Inter-Area-Prefix"),
            LsaType::INTER_AREA_ROUTER => write!(f, "Inter-Area-Router"),
            LsaType::AS_EXTERNAL => write!(f, "AS-External"),
            LsaType::LINK => write!(f, "Link"),
            LsaType::INTRA_AREA_PREFIX => write!(f, "Intra-Area-Prefix"),
            LsaType(value) => write!(f, "Unknown(0x{value:04x})"),
        }
    }
}

impl From<u16> for LsaType {
    fn from(value: u16) -> LsaType {
        LsaType(value)
    }
}

// ===== impl LsaHdr =====

impl LsaHdr {
    pub fn key(&self) -> LsaKey {
        LsaKey::new(self.lsa_type, self.adv_rtr, self.lsa_id)
    }

    pub fn is_maxage(&self) -> bool {
        self.age == LSA_MAX_AGE
    }
}

// ===== impl LsaKey =====

impl LsaKey {
    // Returns the 80-bit table key: type, advertising router and LS-ID, in
    // this order.
    pub fn trie_key(&self) -> TrieKey {
        let bits = (u128::from(self.lsa_type.0) << 112)
            | (u128::from(u32::from(self.adv_rtr)) << 80)
            | (u128::from(u32::from(self.lsa_id)) << 48);
        TrieKey::new(bits, 80)
    }

    // Returns the table key covering all LSAs of the given type originated by
    // the given router.
    pub fn type_advrtr_trie_key(
        lsa_type: LsaType,
        adv_rtr: Ipv4Addr,
    ) -> TrieKey {
        LsaKey::new(lsa_type, adv_rtr, Ipv4Addr::UNSPECIFIED)
            .trie_key()
            .truncate(48)
    }
}

impl std::fmt::Display for LsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} id {} adv-rtr {}]",
            self.lsa_type, self.lsa_id, self.adv_rtr
        )
    }
}

// ===== impl Lsa =====

impl Lsa {
    pub fn new(
        age: u16,
        lsa_type: LsaType,
        lsa_id: Ipv4Addr,
        adv_rtr: Ipv4Addr,
        seq_no: u32,
        cksum: u16,
        body: Bytes,
    ) -> Result<Lsa, Error> {
        // The length field covers both the header and the body.
        let length = u16::try_from(body.len())
            .ok()
            .and_then(|len| len.checked_add(LSA_HDR_SIZE))
            .ok_or(Error::LsaTooLarge(body.len()))?;
        let hdr = LsaHdr {
            age,
            lsa_type,
            lsa_id,
            adv_rtr,
            seq_no,
            cksum,
            length,
        };
        Ok(Lsa::from_parts(hdr, body))
    }

    pub fn from_parts(hdr: LsaHdr, body: Bytes) -> Lsa {
        Lsa {
            hdr,
            body,
            base_time: lsa_base_time(),
            rxmt_count: AtomicU32::new(0),
        }
    }

    pub fn key(&self) -> LsaKey {
        self.hdr.key()
    }

    // Returns the current LSA age.
    pub fn age(&self) -> u16 {
        match self.base_time {
            Some(base_time) => {
                let elapsed = u16::try_from(base_time.elapsed().as_secs())
                    .unwrap_or(u16::MAX);
                std::cmp::min(self.hdr.age.saturating_add(elapsed), LSA_MAX_AGE)
            }
            None => self.hdr.age,
        }
    }

    pub fn is_maxage(&self) -> bool {
        self.age() == LSA_MAX_AGE
    }

    // Sets the LSA age to MaxAge (premature aging).
    pub fn set_maxage(&mut self) {
        self.hdr.age = LSA_MAX_AGE;
        self.base_time = None;
    }

    pub fn rxmt_count(&self) -> u32 {
        self.rxmt_count.load(atomic::Ordering::Relaxed)
    }

    pub fn rxmt_inc(&self) {
        self.rxmt_count.fetch_add(1, atomic::Ordering::Relaxed);
    }

    pub fn rxmt_dec(&self) {
        let _ = self.rxmt_count.fetch_update(
            atomic::Ordering::Relaxed,
            atomic::Ordering::Relaxed,
            |count| count.checked_sub(1),
        );
    }

    pub(crate) fn rxmt_set(&self, count: u32) {
        self.rxmt_count.store(count, atomic::Ordering::Relaxed);
    }
}

impl Clone for Lsa {
    fn clone(&self) -> Lsa {
        Lsa {
            hdr: self.hdr,
            body: self.body.clone(),
            base_time: self.base_time,
            rxmt_count: AtomicU32::new(self.rxmt_count()),
        }
    }
}

impl PartialEq for Lsa {
    fn eq(&self, other: &Lsa) -> bool {
        self.hdr == other.hdr && self.body == other.body
    }
}

impl Eq for Lsa {}

// ===== global functions =====

// Returns whether two instances of the same LSA differ in a way that matters
// to the routing table calculation.
pub fn lsa_is_changed(a: &Lsa, b: &Lsa) -> bool {
    if a.is_maxage() ^ b.is_maxage() {
        return true;
    }

    if a.hdr.length != b.hdr.length {
        return true;
    }

    a.body != b.body
}

// Compares two instances of the same LSA according to the rules specified in
// Section 13.1 of RFC 2328. `Ordering::Greater` means `a` is more recent.
pub fn lsa_compare(a: &Lsa, b: &Lsa) -> Ordering {
    let a_seq_no = a.hdr.seq_no as i32;
    let b_seq_no = b.hdr.seq_no as i32;
    let cmp = a_seq_no.cmp(&b_seq_no);
    if cmp != Ordering::Equal {
        return cmp;
    }

    let cmp = a.hdr.cksum.cmp(&b.hdr.cksum);
    if cmp != Ordering::Equal {
        return cmp;
    }

    if a.is_maxage() && !b.is_maxage() {
        return Ordering::Greater;
    } else if !a.is_maxage() && b.is_maxage() {
        return Ordering::Less;
    }

    if a.age().abs_diff(b.age()) > LSA_MAX_AGE_DIFF {
        return b.age().cmp(&a.age());
    }

    Ordering::Equal
}

// ===== helper functions =====

fn lsa_base_time() -> Option<Instant> {
    #[cfg(not(feature = "testing"))]
    {
        Some(Instant::now())
    }
    #[cfg(feature = "testing")]
    {
        None
    }
}
