// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the control socket's `STOP`/`RELOAD` commands (§6) to the main
//! loop's shutdown watch and a reload notification.

use std::sync::Arc;

use flowlog_control::ControlActions;
use tokio::sync::{watch, Notify};

pub struct DaemonActions {
    shutdown_tx: watch::Sender<bool>,
    reload_notify: Arc<Notify>,
}

impl DaemonActions {
    pub fn new(shutdown_tx: watch::Sender<bool>, reload_notify: Arc<Notify>) -> Self {
        DaemonActions { shutdown_tx, reload_notify }
    }
}

impl ControlActions for DaemonActions {
    fn request_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn request_reload(&self) {
        self.reload_notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_stop_flips_the_watch() {
        let (tx, rx) = watch::channel(false);
        let actions = DaemonActions::new(tx, Arc::new(Notify::new()));
        actions.request_stop();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn request_reload_wakes_a_waiter() {
        let (tx, _rx) = watch::channel(false);
        let notify = Arc::new(Notify::new());
        let actions = DaemonActions::new(tx, Arc::clone(&notify));
        actions.request_reload();
        notify.notified().await;
    }
}
