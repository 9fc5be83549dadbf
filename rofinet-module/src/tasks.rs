//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use rofinet_utils::Sender;
use rofinet_utils::task::IntervalTask;

//
// Module tasks diagram:
//
//               link drivers (Nx) -> +--------------+
//           announce_interval (1x) ->|              |
//           progress_interval (1x) ->|  scheduler   | -> (Nx) link drivers
//                                    |              |
//                                    +--------------+
//

// Module inter-task message types.
pub mod messages {
    // Input messages (child task -> scheduler).
    pub mod input {
        #[derive(Debug)]
        pub struct AnnounceTickMsg {}

        #[derive(Debug)]
        pub struct ProgressTickMsg {}
    }
}

// ===== module tasks =====

// Periodic firmware announce timer.
pub(crate) fn announce_interval(
    interval: Duration,
    announce_tickp: &Sender<messages::input::AnnounceTickMsg>,
) -> IntervalTask {
    #[cfg(not(feature = "testing"))]
    {
        let announce_tickp = announce_tickp.clone();
        IntervalTask::new(interval, false, move || {
            let announce_tickp = announce_tickp.clone();
            async move {
                let msg = messages::input::AnnounceTickMsg {};
                let _ = announce_tickp.send(msg).await;
            }
        })
    }
    #[cfg(feature = "testing")]
    {
        IntervalTask {}
    }
}

// Update progress check timer.
pub(crate) fn progress_interval(
    interval: Duration,
    progress_tickp: &Sender<messages::input::ProgressTickMsg>,
) -> IntervalTask {
    #[cfg(not(feature = "testing"))]
    {
        let progress_tickp = progress_tickp.clone();
        IntervalTask::new(interval, false, move || {
            let progress_tickp = progress_tickp.clone();
            async move {
                let msg = messages::input::ProgressTickMsg {};
                let _ = progress_tickp.send(msg).await;
            }
        })
    }
    #[cfg(feature = "testing")]
    {
        IntervalTask {}
    }
}
