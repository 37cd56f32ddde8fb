//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::Error;
use crate::route::MULTI_PATH_LIMIT;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub lsdb: LsdbCfg,
    pub route_table: RouteTableCfg,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LsdbCfg {
    // Maximum number of LSAs per database (unlimited when unset).
    pub max_lsas: Option<usize>,
    // Interval, in seconds, between MaxAge sweeps.
    pub maxage_sweep_interval: u16,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteTableCfg {
    // Maximum number of nexthops per route.
    pub max_paths: usize,
    // Maximum number of routes per table (unlimited when unset).
    pub max_routes: Option<usize>,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/holo-ospf6-db.toml";

    // Loads the configuration from the given TOML file.
    //
    // Falls back to the default configuration when the file can't be read.
    pub fn load(config_file: Option<&str>) -> Result<Config, Error> {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => config_str.parse(),
            Err(error) => {
                warn!(%config_file, %error, "failed to load configuration file");
                warn!("falling back to default configuration");
                Ok(Config::default())
            }
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Config, Error> {
        let config = toml::from_str(s)?;
        Ok(config)
    }
}

// ===== impl LsdbCfg =====

impl LsdbCfg {
    pub fn maxage_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.maxage_sweep_interval.into())
    }
}

impl Default for LsdbCfg {
    fn default() -> LsdbCfg {
        LsdbCfg {
            max_lsas: None,
            maxage_sweep_interval: 5,
        }
    }
}

// ===== impl RouteTableCfg =====

impl RouteTableCfg {
    // Returns the effective nexthop limit.
    pub fn max_paths(&self) -> usize {
        self.max_paths.clamp(1, MULTI_PATH_LIMIT)
    }
}

impl Default for RouteTableCfg {
    fn default() -> RouteTableCfg {
        RouteTableCfg {
            max_paths: MULTI_PATH_LIMIT,
            max_routes: None,
        }
    }
}
