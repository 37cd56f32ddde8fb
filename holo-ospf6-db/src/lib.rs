//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(feature = "testing", allow(dead_code, unused_imports))]

pub mod collections;
pub mod config;
pub mod debug;
pub mod error;
pub mod lsa;
pub mod lsdb;
pub mod route;
pub mod table;
pub mod task;
pub mod tasks;
