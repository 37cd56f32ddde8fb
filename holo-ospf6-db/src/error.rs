//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::Ipv6Network;
use tracing::{warn, warn_span};

use crate::lsa::LsaKey;
use crate::lsdb::LsdbId;

// LSDB and route table errors.
#[derive(Debug)]
pub enum Error {
    // LSDB
    LsaTooLarge(usize),
    LsaNotPresent(LsdbId, LsaKey),
    LsdbFull(LsdbId, usize),
    // Route table
    RouteNotPresent(String, Ipv6Network),
    RouteHandleInvalid(String),
    RouteTableFull(String, usize),
    // Consistency checks
    LsdbCountMismatch(LsdbId, usize, usize),
    LsdbChainBroken(LsdbId, LsaKey),
    RouteCountMismatch(String, usize, usize),
    RouteChainBroken(String, Ipv6Network),
    RouteBestMismatch(String, Ipv6Network),
    // Configuration
    ConfigParseError(toml::de::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::LsaTooLarge(body_len) => {
                warn!(%body_len, "{}", self);
            }
            Error::LsaNotPresent(lsdb_id, lsa_key)
            | Error::LsdbChainBroken(lsdb_id, lsa_key) => {
                warn_span!("lsdb", %lsdb_id).in_scope(|| {
                    warn!(%lsa_key, "{}", self);
                })
            }
            Error::LsdbFull(lsdb_id, max) => {
                warn_span!("lsdb", %lsdb_id).in_scope(|| {
                    warn!(%max, "{}", self);
                })
            }
            Error::LsdbCountMismatch(lsdb_id, expected, actual) => {
                warn_span!("lsdb", %lsdb_id).in_scope(|| {
                    warn!(%expected, %actual, "{}", self);
                })
            }
            Error::RouteNotPresent(name, prefix)
            | Error::RouteChainBroken(name, prefix)
            | Error::RouteBestMismatch(name, prefix) => {
                warn_span!("route-table", %name).in_scope(|| {
                    warn!(%prefix, "{}", self);
                })
            }
            Error::RouteHandleInvalid(name) => {
                warn_span!("route-table", %name).in_scope(|| {
                    warn!("{}", self);
                })
            }
            Error::RouteTableFull(name, max) => {
                warn_span!("route-table", %name).in_scope(|| {
                    warn!(%max, "{}", self);
                })
            }
            Error::RouteCountMismatch(name, expected, actual) => {
                warn_span!("route-table", %name).in_scope(|| {
                    warn!(%expected, %actual, "{}", self);
                })
            }
            Error::ConfigParseError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::LsaTooLarge(..) => {
                write!(f, "LSA body exceeds the maximum LSA length")
            }
            Error::LsaNotPresent(..) => {
                write!(f, "LSA not present in the database")
            }
            Error::LsdbFull(..) => {
                write!(f, "maximum number of LSAs reached")
            }
            Error::RouteNotPresent(..) => {
                write!(f, "route not present in the routing table")
            }
            Error::RouteHandleInvalid(..) => {
                write!(f, "invalid or stale route handle")
            }
            Error::RouteTableFull(..) => {
                write!(f, "maximum number of routes reached")
            }
            Error::LsdbCountMismatch(..) | Error::RouteCountMismatch(..) => {
                write!(f, "entry count mismatch")
            }
            Error::LsdbChainBroken(..) | Error::RouteChainBroken(..) => {
                write!(f, "inconsistent ordered chain")
            }
            Error::RouteBestMismatch(..) => {
                write!(f, "destination doesn't have exactly one best route")
            }
            Error::ConfigParseError(..) => {
                write!(f, "failed to parse configuration")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigParseError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Error {
        Error::ConfigParseError(error)
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
