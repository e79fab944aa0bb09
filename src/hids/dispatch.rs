use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::att::Handle;
use crate::config::RetryPolicy;
use crate::conn::ReportBuf;
use crate::gatt::Characteristic;
use crate::le::Addr;
use crate::transport::Transport;
use crate::SyncMutex;

type Key = (Addr, Handle);
type Queue = mpsc::UnboundedSender<(ReportBuf, oneshot::Sender<bool>)>;

/// Report notification dispatcher. Owns the per-peer notification flags and
/// sends report notifications with a bounded retry.
///
/// Each peer and characteristic has its own send queue served by one task.
/// Reports are sent in the order in which they were queued. A send that is
/// waiting to retry delays only its own queue, so other characteristics and
/// transport callbacks are not blocked.
#[derive(Debug)]
pub struct Dispatcher<T> {
    transport: Arc<T>,
    retry: RetryPolicy,
    rt: tokio::runtime::Handle,
    enabled: SyncMutex<BTreeSet<Key>>,
    queues: SyncMutex<BTreeMap<Key, Queue>>,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a new dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(transport: Arc<T>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            rt: tokio::runtime::Handle::current(),
            enabled: SyncMutex::default(),
            queues: SyncMutex::default(),
        }
    }

    /// Updates the notification state of the report characteristic `hdl`.
    /// Returns `true` if notifications were disabled before, in which case the
    /// caller should push the current value.
    pub fn set_notifications_enabled(&self, peer: Addr, hdl: Handle, enabled: bool) -> bool {
        let mut f = self.enabled.lock();
        let first = if enabled {
            f.insert((peer, hdl))
        } else {
            f.remove(&(peer, hdl));
            false
        };
        debug!("{peer} notifications for {hdl}: {enabled}");
        first
    }

    /// Returns whether the peer enabled notifications for `hdl`.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, peer: Addr, hdl: Handle) -> bool {
        self.enabled.lock().contains(&(peer, hdl))
    }

    /// Queues a report notification without waiting for it to be sent. The
    /// returned receiver resolves to `false` if all attempts failed, in which
    /// case the report is dropped. Reports queued for the same peer and
    /// characteristic are sent in call order.
    pub fn queue(&self, peer: Addr, hdl: Handle, v: &[u8]) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let mut qs = self.queues.lock();
        let q = (qs.entry((peer, hdl))).or_insert_with(|| self.spawn_queue(peer, hdl));
        if q.send((ReportBuf::from_slice(v), tx)).is_err() {
            warn!("Send queue for {hdl} closed");
            qs.remove(&(peer, hdl));
        }
        rx
    }

    /// Sends a report notification, retrying according to the retry policy.
    /// Returns `false` if all attempts failed. The report is dropped in that
    /// case.
    pub async fn send(&self, peer: Addr, hdl: Handle, v: &[u8]) -> bool {
        self.queue(peer, hdl, v).await.unwrap_or(false)
    }

    /// Sends zeroed reports in the specified order so that the host learns the
    /// device capabilities. Returns the number of reports sent.
    pub async fn send_initial_reports(&self, peer: Addr, reports: &[(Handle, usize)]) -> usize {
        let mut sent = 0;
        for &(hdl, len) in reports {
            if self.send(peer, hdl, &ReportBuf::from_elem(0, len)).await {
                sent += 1;
            }
        }
        debug!("Sent {sent}/{} initial reports to {peer}", reports.len());
        sent
    }

    /// Removes all notification flags and send queues of the peer. Reports
    /// that were already queued are still sent.
    pub fn clear(&self, peer: Addr) {
        self.enabled.lock().retain(|&(p, _)| p != peer);
        self.queues.lock().retain(|&(p, _), _| p != peer);
    }

    /// Spawns the task serving the send queue of `hdl`. The task exits when
    /// the queue is removed.
    fn spawn_queue(&self, peer: Addr, hdl: Handle) -> Queue {
        let (tx, mut rx) = mpsc::unbounded_channel::<(ReportBuf, oneshot::Sender<bool>)>();
        let (t, retry) = (Arc::clone(&self.transport), self.retry);
        self.rt.spawn(async move {
            while let Some((v, done)) = rx.recv().await {
                let _ = done.send(notify(&*t, retry, peer, hdl, &v).await);
            }
            trace!("{peer} send queue for {hdl} closed");
        });
        tx
    }
}

async fn notify<T: Transport>(
    t: &T,
    retry: RetryPolicy,
    peer: Addr,
    hdl: Handle,
    v: &[u8],
) -> bool {
    let uuid = Characteristic::Report.uuid();
    let mut ok = t.notify(peer, hdl, uuid, v);
    let mut n = 0;
    while !ok && n < retry.attempts {
        n += 1;
        trace!("Notification for {hdl} failed, retry {n}");
        tokio::time::sleep(retry.delay()).await;
        ok = t.notify(peer, hdl, uuid, v);
    }
    if ok {
        trace!("{peer} {hdl} <- {v:02X?}");
    } else {
        warn!("Dropped report for {hdl} after {} attempt(s)", n + 1);
    }
    ok
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::transport::mock::MockTransport;

    use super::*;

    fn dispatcher(attempts: u8) -> (Arc<MockTransport>, Dispatcher<MockTransport>) {
        let t = Arc::new(MockTransport::default());
        let retry = RetryPolicy {
            attempts,
            delay_ms: 10,
        };
        (Arc::clone(&t), Dispatcher::new(t, retry))
    }

    fn h(v: u16) -> Handle {
        Handle::new(v).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn retry_once() {
        let (t, d) = dispatcher(1);
        let p = Addr::default();

        t.fail_notify(1);
        let start = tokio::time::Instant::now();
        assert!(d.send(p, h(1), &[1]).await);
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(t.notified(), [(h(1), vec![1])]);

        t.fail_notify(2);
        assert!(!d.send(p, h(1), &[2]).await);
        assert_eq!(t.notified().len(), 1);

        assert!(d.send(p, h(1), &[3]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn no_retry() {
        let (t, d) = dispatcher(0);
        t.fail_notify(1);
        assert!(!d.send(Addr::default(), h(1), &[1]).await);
        assert!(d.send(Addr::default(), h(1), &[1]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn serialized() {
        let (t, d) = dispatcher(1);
        let p = Addr::default();
        t.fail_notify(1);
        let (a, b) = tokio::join!(d.send(p, h(1), &[1]), d.send(p, h(1), &[2]));
        assert!(a && b);
        assert_eq!(t.notified(), [(h(1), vec![1]), (h(1), vec![2])]);
    }

    #[tokio::test]
    async fn flags() {
        let (_, d) = dispatcher(1);
        let (p1, p2) = (Addr::default(), Addr::Random([1; 6].into()));
        assert!(!d.is_enabled(p1, h(5)));
        assert!(d.set_notifications_enabled(p1, h(5), true));
        assert!(!d.set_notifications_enabled(p1, h(5), true));
        assert!(d.set_notifications_enabled(p2, h(5), true));
        assert!(d.is_enabled(p1, h(5)));
        assert!(!d.set_notifications_enabled(p1, h(5), false));
        assert!(!d.is_enabled(p1, h(5)));
        assert!(d.set_notifications_enabled(p1, h(5), true));

        d.clear(p1);
        assert!(!d.is_enabled(p1, h(5)));
        assert!(d.is_enabled(p2, h(5)));
        assert!(d.set_notifications_enabled(p1, h(5), true));
    }

    #[tokio::test(start_paused = true)]
    async fn independent() {
        let (t, d) = dispatcher(1);
        let p = Addr::default();
        t.fail_notify(1);
        let start = tokio::time::Instant::now();
        let (a, b) = tokio::join!(d.send(p, h(1), &[1]), async {
            let ok = d.send(p, h(2), &[2]).await;
            assert!(start.elapsed() < Duration::from_millis(10));
            ok
        });
        assert!(a && b);
        assert_eq!(t.notified(), [(h(2), vec![2]), (h(1), vec![1])]);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_order() {
        let (t, d) = dispatcher(1);
        let p = Addr::default();
        t.fail_notify(1);
        let rx: Vec<_> = (1..=3).map(|v| d.queue(p, h(1), &[v])).collect();
        for rx in rx {
            assert!(rx.await.unwrap());
        }
        assert_eq!(
            t.notified(),
            [(h(1), vec![1]), (h(1), vec![2]), (h(1), vec![3])]
        );

        d.clear(p);
        assert!(d.send(p, h(1), &[4]).await);
    }

    #[tokio::test]
    async fn initial_reports() {
        let (t, d) = dispatcher(1);
        let n = (d.send_initial_reports(Addr::default(), &[(h(9), 1), (h(7), 4), (h(3), 8)])).await;
        assert_eq!(n, 3);
        assert_eq!(
            t.notified(),
            [(h(9), vec![0]), (h(7), vec![0; 4]), (h(3), vec![0; 8])]
        );
    }
}
