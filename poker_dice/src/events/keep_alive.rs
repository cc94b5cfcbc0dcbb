//! Idle keep-alive ticker.

use log::debug;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep_until};

use super::{channel::EventChannel, models::KeepAlive};
use crate::clock::Clock;

/// Spawn a task that pushes [`KeepAlive`] to every subscriber whenever the
/// channel has been idle for `interval`. The task ends when the channel
/// closes.
pub fn spawn_keep_alive(
    channel: EventChannel,
    interval: Duration,
    clock: Arc<dyn Clock>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep_until(channel.last_activity() + interval).await;
            if channel.is_closed() {
                break;
            }
            if channel.last_activity().elapsed() < interval {
                continue;
            }
            if channel.emit(KeepAlive { at: clock.now() }).is_err() {
                break;
            }
        }
        debug!("Keep-alive ticker stopped");
    })
}
