//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use tracing::{debug, debug_span};

use crate::lsa::LsaHdr;
use crate::lsdb::LsdbId;

// LSDB and route table debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // LSDB
    LsaAdd(&'a LsdbId, &'a LsaHdr),
    LsaAddDuplicate(&'a LsdbId, &'a LsaHdr),
    LsaReplace(&'a LsdbId, &'a LsaHdr, bool),
    LsaRemove(&'a LsdbId, &'a LsaHdr),
    LsaSeqNoWrapped(&'a LsdbId, &'a LsaHdr),
    LsaMaxAgeRemove(&'a LsdbId, &'a LsaHdr),
    LsaMaxAgeRefresh(&'a LsdbId, &'a LsaHdr),
    LsaMaxAgeRxmtPending(&'a LsdbId, &'a LsaHdr, u32),
    LsdbMaxAgeSweepStart(&'a LsdbId),
    LsdbMaxAgeSweepStop(&'a LsdbId),
    // Route table
    RouteAddNeedless(&'a str, &'a Ipv6Network),
    RouteUpdate(&'a str, &'a Ipv6Network, bool),
    RouteAddPath(&'a str, &'a Ipv6Network, bool),
    RouteAddDestination(&'a str, &'a Ipv6Network),
    RouteRemove(&'a str, &'a Ipv6Network, bool),
    RoutePromote(&'a str, &'a Ipv6Network),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::LsaAdd(lsdb_id, lsa_hdr)
            | Debug::LsaAddDuplicate(lsdb_id, lsa_hdr)
            | Debug::LsaRemove(lsdb_id, lsa_hdr)
            | Debug::LsaSeqNoWrapped(lsdb_id, lsa_hdr)
            | Debug::LsaMaxAgeRemove(lsdb_id, lsa_hdr)
            | Debug::LsaMaxAgeRefresh(lsdb_id, lsa_hdr) => {
                debug_span!("lsdb", %lsdb_id).in_scope(|| {
                    debug!(?lsa_hdr, "{}", self);
                })
            }
            Debug::LsaReplace(lsdb_id, lsa_hdr, changed) => {
                debug_span!("lsdb", %lsdb_id).in_scope(|| {
                    debug!(?lsa_hdr, %changed, "{}", self);
                })
            }
            Debug::LsaMaxAgeRxmtPending(lsdb_id, lsa_hdr, rxmt_count) => {
                debug_span!("lsdb", %lsdb_id).in_scope(|| {
                    debug!(?lsa_hdr, %rxmt_count, "{}", self);
                })
            }
            Debug::LsdbMaxAgeSweepStart(lsdb_id)
            | Debug::LsdbMaxAgeSweepStop(lsdb_id) => {
                debug_span!("lsdb", %lsdb_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::RouteAddNeedless(name, prefix)
            | Debug::RouteAddDestination(name, prefix)
            | Debug::RoutePromote(name, prefix) => {
                debug_span!("route-table", %name).in_scope(|| {
                    debug!(%prefix, "{}", self);
                })
            }
            Debug::RouteUpdate(name, prefix, best)
            | Debug::RouteAddPath(name, prefix, best)
            | Debug::RouteRemove(name, prefix, best) => {
                debug_span!("route-table", %name).in_scope(|| {
                    debug!(%prefix, %best, "{}", self);
                })
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::LsaAdd(..) => {
                write!(f, "LSA added")
            }
            Debug::LsaAddDuplicate(..) => {
                write!(f, "LSA already present, nothing to update")
            }
            Debug::LsaReplace(..) => {
                write!(f, "LSA replaced")
            }
            Debug::LsaRemove(..) => {
                write!(f, "LSA removed")
            }
            Debug::LsaSeqNoWrapped(..) => {
                write!(f, "LSA sequence number wrapped")
            }
            Debug::LsaMaxAgeRemove(..) => {
                write!(f, "removing MaxAge LSA")
            }
            Debug::LsaMaxAgeRefresh(..) => {
                write!(f, "refreshing MaxAge LSA with wrapped sequence number")
            }
            Debug::LsaMaxAgeRxmtPending(..) => {
                write!(f, "MaxAge LSA still pending retransmission")
            }
            Debug::LsdbMaxAgeSweepStart(..) => {
                write!(f, "starting MaxAge sweeper")
            }
            Debug::LsdbMaxAgeSweepStop(..) => {
                write!(f, "stopping MaxAge sweeper")
            }
            Debug::RouteAddNeedless(..) => {
                write!(f, "route already present, nothing to update")
            }
            Debug::RouteUpdate(..) => {
                write!(f, "route updated")
            }
            Debug::RouteAddPath(..) => {
                write!(f, "another path added")
            }
            Debug::RouteAddDestination(..) => {
                write!(f, "route added to a new destination")
            }
            Debug::RouteRemove(..) => {
                write!(f, "route removed")
            }
            Debug::RoutePromote(..) => {
                write!(f, "alternate path promoted to best")
            }
        }
    }
}
