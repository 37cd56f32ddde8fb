//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tracing::debug_span;

use crate::lsdb::LsdbId;
use crate::task::IntervalTask;

//
// LSDB tasks diagram:
//
//                                    +--------------+
//                                    |    owner     |
//                                    |  (instance)  |
//                                    +--------------+
//                                           ^
//                                           | (1x) lsdb_maxage_sweep_rx
//                                           |
// lsdb_maxage_sweep_interval (Nx) ----------+
//

// Inter-task message types.
pub mod messages {
    use serde::{Deserialize, Serialize};

    use crate::lsdb::LsdbId;

    #[derive(Clone, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub struct LsdbMaxAgeSweepMsg {
        pub lsdb_id: LsdbId,
    }
}

// ===== LSDB tasks =====

// LSDB MaxAge sweeper interval task.
//
// The sweep itself runs on the LSDB owner upon reception of the message, so
// that all database mutations happen on a single task.
pub(crate) fn lsdb_maxage_sweep_interval(
    lsdb_id: LsdbId,
    interval: Duration,
    lsdb_maxage_sweep_tx: &Sender<messages::LsdbMaxAgeSweepMsg>,
) -> IntervalTask {
    let lsdb_maxage_sweep_tx = lsdb_maxage_sweep_tx.clone();
    let span = debug_span!("lsdb", %lsdb_id);
    let _span_guard = span.enter();

    IntervalTask::new(interval, false, move || {
        let lsdb_maxage_sweep_tx = lsdb_maxage_sweep_tx.clone();
        async move {
            let msg = messages::LsdbMaxAgeSweepMsg { lsdb_id };
            let _ = lsdb_maxage_sweep_tx.send(msg).await;
        }
    })
}
