//! HID peripheral connection and advertising state machine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use hidpad_hid::kbd::{self, KeyMod, Led};
use hidpad_hid::media::{self, MediaKey};
use hidpad_hid::mouse::{self, Button, MouseReport};
use hidpad_hid::{combined, ReportType};

use crate::att::{ErrorCode, Handle};
use crate::config::Config;
use crate::conn::{ConnectionInfo, Connection, InputState, ReportBuf};
use crate::gatt::{Cccd, IoResult, ReadReq, Service, ServiceDef, WriteReq, DEFAULT_MTU};
use crate::hids::{DescriptorTable, Dispatcher, HidService, ReportKind, Topology, WriteEffect};
use crate::le::Addr;
use crate::transport::{AdapterState, AdvError, AdvParams, Transport};
use crate::{Error, Result, SyncMutex};

/// Peripheral state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum State {
    #[default]
    Idle,
    Advertising,
    Connected(Addr),
}

/// Advertising counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct AdvStats {
    /// Number of advertising start requests passed to the transport.
    pub attempts: u32,
    pub started: u32,
    pub failed: u32,
    /// Most recent advertising failure.
    pub last_error: Option<AdvError>,
}

/// Transport event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Event {
    Connected(Addr),
    Disconnected(Addr),
    MtuChanged(Addr, u16),
    RssiRead(Addr, i8),
    ConnParams {
        peer: Addr,
        interval: u16,
        latency: u16,
        timeout: u16,
    },
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    /// Advertising was requested and not stopped.
    want_adv: bool,
    registered: bool,
    conn: Option<Connection>,
    stats: AdvStats,
}

/// BLE HID peripheral. Owns the HID service, the connection state, and the
/// report dispatcher. All state mutations, whether triggered by transport
/// callbacks or by input methods, are serialized by one lock that is never
/// held across an await.
#[derive(Debug)]
pub struct Peripheral<T: Transport> {
    transport: Arc<T>,
    cfg: Config,
    hid: HidService,
    dispatch: Arc<Dispatcher<T>>,
    rt: tokio::runtime::Handle,
    inner: SyncMutex<Inner>,
}

impl<T: Transport> Peripheral<T> {
    /// Creates a new peripheral.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(transport: Arc<T>, cfg: Config) -> Arc<Self> {
        let table = DescriptorTable::new(cfg.topology, cfg.security);
        Arc::new(Self {
            dispatch: Arc::new(Dispatcher::new(Arc::clone(&transport), cfg.retry)),
            transport,
            hid: HidService::new(Arc::new(table)),
            cfg,
            rt: tokio::runtime::Handle::current(),
            inner: SyncMutex::default(),
        })
    }

    /// Returns the configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the HID service.
    #[inline(always)]
    #[must_use]
    pub const fn service(&self) -> &HidService {
        &self.hid
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Returns the advertising counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> AdvStats {
        self.inner.lock().stats
    }

    /// Returns information about the connected host.
    #[must_use]
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.inner.lock().conn.as_ref().map(Connection::info)
    }

    /// Returns the keyboard LED state set by the host.
    #[must_use]
    pub fn leds(&self) -> Led {
        (self.inner.lock().conn.as_ref()).map_or_else(Led::empty, |c| c.led)
    }

    /// Returns whether the host suspended the device via the HID Control
    /// Point.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        (self.inner.lock().conn.as_ref()).map_or(false, |c| c.suspended)
    }

    /// Registers the HID service with the transport. Returns the registered
    /// definition without registering again if the service is already open.
    pub fn open(&self) -> Result<Arc<ServiceDef>> {
        self.register(&mut self.inner.lock())
    }

    fn register(&self, s: &mut Inner) -> Result<Arc<ServiceDef>> {
        let def = self.hid.def();
        if !s.registered {
            self.transport.add_service(def)?;
            s.registered = true;
            info!(
                "Registered HID service {}..{}",
                def.handle(),
                def.end_handle()
            );
        }
        Ok(Arc::clone(def))
    }

    /// Stops advertising, drops the connection, and removes the HID service.
    /// Safe to call in any state.
    pub fn close(&self) {
        let mut s = self.inner.lock();
        s.want_adv = false;
        match s.state {
            State::Idle => {}
            State::Advertising => self.transport.stop_advertising(),
            State::Connected(peer) => self.drop_conn(&mut s, peer),
        }
        s.state = State::Idle;
        if s.registered {
            self.transport.remove_service(self.hid.def());
            s.registered = false;
            info!("HID service closed");
        }
    }

    /// Starts advertising, registering the HID service first if needed. Does
    /// nothing if already advertising or connected.
    pub fn start(&self) -> Result<()> {
        match self.transport.adapter_state() {
            AdapterState::Ready => {}
            AdapterState::Missing => return Err(Error::NoAdapter),
            AdapterState::Disabled => return Err(Error::BluetoothDisabled),
            AdapterState::NoPeripheralMode => return Err(Error::PeripheralModeUnsupported),
        }
        let mut s = self.inner.lock();
        s.want_adv = true;
        if s.state != State::Idle {
            debug!("Advertising not started in {:?} state", s.state);
            return Ok(());
        }
        self.register(&mut s)?;
        s.stats.attempts += 1;
        match self.transport.start_advertising(&self.adv_params()) {
            Ok(()) => {
                s.stats.started += 1;
                s.state = State::Advertising;
                info!("Advertising as {:?}", self.cfg.name);
                Ok(())
            }
            Err(e) => {
                s.stats.failed += 1;
                s.stats.last_error = Some(e);
                warn!("Failed to start advertising: {e}");
                Err(Error::Advertise(e))
            }
        }
    }

    /// Stops advertising. Safe to call in any state. A connected host stays
    /// connected, but advertising is not restarted when it disconnects.
    pub fn stop(&self) {
        let mut s = self.inner.lock();
        s.want_adv = false;
        if s.state == State::Advertising {
            self.transport.stop_advertising();
            s.state = State::Idle;
            info!("Advertising stopped");
        }
    }

    fn adv_params(&self) -> AdvParams {
        AdvParams {
            service: Service::HumanInterfaceDevice.uuid(),
            name: self.cfg.name.clone(),
            appearance: self.cfg.appearance,
            tx_power: self.cfg.tx_power,
            connectable: self.cfg.connectable,
        }
    }

    /// Handles a transport event.
    pub fn handle(&self, e: Event) {
        match e {
            Event::Connected(peer) => self.on_connected(peer),
            Event::Disconnected(peer) => self.on_disconnected(peer),
            Event::MtuChanged(peer, mtu) => self.on_mtu_changed(peer, mtu),
            Event::RssiRead(peer, rssi) => self.on_rssi_read(peer, rssi),
            Event::ConnParams {
                peer,
                interval,
                latency,
                timeout,
            } => self.on_conn_params(peer, interval, latency, timeout),
        }
    }

    /// Spawns a task that handles transport events until the channel is
    /// closed. The task is canceled when the returned future is dropped.
    #[must_use]
    pub fn event_loop(self: &Arc<Self>, rx: mpsc::UnboundedReceiver<Event>) -> EventLoop {
        let c = CancellationToken::new();
        EventLoop {
            h: self.rt.spawn(EventLoop::run(Arc::clone(self), rx, c.clone())),
            c: c.clone(),
            _g: c.drop_guard(),
        }
    }

    /// Handles a new host connection. Connections from another peer while
    /// connected are ignored.
    pub fn on_connected(&self, peer: Addr) {
        let mut s = self.inner.lock();
        match s.state {
            State::Connected(p) => {
                if p != peer {
                    warn!("Ignoring connection from {peer} while connected to {p}");
                }
                return;
            }
            State::Advertising => self.transport.stop_advertising(),
            State::Idle => {}
        }
        info!("Connected to {peer}");
        s.state = State::Connected(peer);
        let mut conn = Connection::new(peer);
        if self.cfg.client_probe {
            if self.transport.connect_client(peer) {
                conn.set_client(true);
            } else {
                warn!("Failed to open client connection to {peer}");
            }
        }
        s.conn = Some(conn);
        drop(s);
        if self.cfg.initial_reports {
            let reports: Vec<_> = (self.hid.initial_reports().into_iter())
                .map(|(h, r)| (h, r.len))
                .collect();
            let d = Arc::clone(&self.dispatch);
            self.rt.spawn(async move {
                d.send_initial_reports(peer, &reports).await;
            });
        }
    }

    /// Handles a host disconnection and restarts advertising if configured.
    pub fn on_disconnected(&self, peer: Addr) {
        let mut s = self.inner.lock();
        if s.state != State::Connected(peer) {
            debug!("Ignoring disconnect from {peer}");
            return;
        }
        self.drop_conn(&mut s, peer);
        s.state = State::Idle;
        info!("Disconnected from {peer}");
        let restart = self.cfg.readvertise && s.want_adv;
        drop(s);
        if restart {
            if let Err(e) = self.start() {
                warn!("Failed to restart advertising: {e}");
            }
        }
    }

    fn drop_conn(&self, s: &mut Inner, peer: Addr) {
        if let Some(c) = s.conn.take() {
            if c.has_client() {
                self.transport.disconnect_client(peer);
            }
        }
        self.dispatch.clear(peer);
    }

    /// Records the negotiated ATT MTU.
    pub fn on_mtu_changed(&self, peer: Addr, mtu: u16) {
        self.with_conn(peer, |c| {
            c.params.mtu = mtu.max(DEFAULT_MTU);
            debug!("{peer} MTU: {}", c.params.mtu);
        });
    }

    /// Records the signal strength read over the client connection.
    pub fn on_rssi_read(&self, peer: Addr, rssi: i8) {
        self.with_conn(peer, |c| c.params.rssi = Some(rssi));
    }

    /// Records the connection parameters.
    pub fn on_conn_params(&self, peer: Addr, interval: u16, latency: u16, timeout: u16) {
        self.with_conn(peer, |c| {
            c.params.interval = Some(interval);
            c.params.latency = Some(latency);
            c.params.timeout = Some(timeout);
            debug!("{peer} connection parameters: {:?}", c.params);
        });
    }

    fn with_conn(&self, peer: Addr, f: impl FnOnce(&mut Connection)) {
        match self.inner.lock().conn.as_mut() {
            Some(c) if c.peer() == peer => f(c),
            _ => trace!("Ignoring event for {peer}"),
        }
    }

    /// Handles a characteristic read request. Returns the value starting at
    /// `off`, limited to the connection MTU.
    pub fn on_read(
        &self,
        peer: Addr,
        hdl: Handle,
        off: u16,
    ) -> std::result::Result<Vec<u8>, ErrorCode> {
        let s = self.inner.lock();
        let conn = s.conn.as_ref().filter(|c| c.peer() == peer);
        let mut req = ReadReq::new(hdl, off, conn.map_or(DEFAULT_MTU, |c| c.params.mtu));
        self.hid.read(conn, &mut req).map_err(|e| {
            warn!("Read of {hdl} from {peer} failed: {e}");
            e
        })?;
        Ok(req.value().to_vec())
    }

    /// Handles a descriptor read request.
    pub fn on_descriptor_read(
        &self,
        peer: Addr,
        hdl: Handle,
        off: u16,
    ) -> std::result::Result<Vec<u8>, ErrorCode> {
        let Some(val) = self.hid.cccd_target(hdl) else {
            return self.on_read(peer, hdl, off);
        };
        let c = if self.dispatch.is_enabled(peer, val) {
            Cccd::NOTIFY
        } else {
            Cccd::empty()
        };
        let mut req = ReadReq::new(hdl, off, DEFAULT_MTU);
        req.complete(c.to_value())?;
        Ok(req.value().to_vec())
    }

    /// Handles a characteristic write request.
    pub fn on_write(&self, peer: Addr, hdl: Handle, off: u16, v: &[u8]) -> IoResult {
        let mut s = self.inner.lock();
        let Some(conn) = s.conn.as_mut().filter(|c| c.peer() == peer) else {
            warn!("Write of {hdl} from unknown peer {peer}");
            return Err(ErrorCode::UnlikelyError);
        };
        let effect = self.hid.write(conn, &WriteReq::new(hdl, off, v)).map_err(|e| {
            warn!("Write of {hdl} from {peer} rejected: {e}");
            e
        })?;
        match effect {
            WriteEffect::None => {}
            WriteEffect::Notify { hdl, enabled } => {
                if !self.dispatch.set_notifications_enabled(peer, hdl, enabled) {
                    return Ok(());
                }
                if let Some(v) = self.hid.value(Some(&*conn), hdl) {
                    drop(self.dispatch.queue(peer, hdl, &v));
                }
            }
            WriteEffect::Led(led) => debug!("{peer} keyboard LEDs: {led:?}"),
            WriteEffect::Suspend(on) => info!("{peer} suspend: {on}"),
        }
        Ok(())
    }

    /// Handles a descriptor write request.
    #[inline]
    pub fn on_descriptor_write(&self, peer: Addr, hdl: Handle, off: u16, v: &[u8]) -> IoResult {
        self.on_write(peer, hdl, off, v)
    }

    /// Moves the pointer. Movements outside of `[-127, 127]` are split into
    /// several reports. Returns whether all reports were delivered.
    pub async fn move_pointer(&self, dx: i32, dy: i32) -> Result<bool> {
        let mut all = true;
        for (dx, dy) in mouse::split_move(dx, dy) {
            all &= self.update(ReportKind::Mouse, (dx, dy, 0), |_| Ok(())).await?;
        }
        Ok(all)
    }

    /// Presses mouse buttons.
    pub async fn press_buttons(&self, b: Button) -> Result<bool> {
        (self.update(ReportKind::Mouse, (0, 0, 0), |i| {
            i.buttons |= b;
            Ok(())
        }))
        .await
    }

    /// Releases mouse buttons.
    pub async fn release_buttons(&self, b: Button) -> Result<bool> {
        (self.update(ReportKind::Mouse, (0, 0, 0), |i| {
            i.buttons.remove(b);
            Ok(())
        }))
        .await
    }

    /// Presses and releases mouse buttons.
    pub async fn click(&self, b: Button) -> Result<bool> {
        let pressed = self.press_buttons(b).await?;
        Ok(self.release_buttons(b).await? && pressed)
    }

    /// Scrolls the wheel. Not available with the combined report, which has no
    /// wheel.
    pub async fn scroll(&self, dv: i32) -> Result<bool> {
        if self.hid.table().topology() == Topology::Combined {
            return Err(Error::Unsupported("wheel"));
        }
        let mut all = true;
        for (dv, _) in mouse::split_move(dv, 0) {
            all &= self.update(ReportKind::Mouse, (0, 0, dv), |_| Ok(())).await?;
        }
        Ok(all)
    }

    /// Presses a key and its modifiers. Fails with [`Error::ReportFull`] if six
    /// keys are already held.
    pub async fn press_key(&self, k: kbd::Key) -> Result<bool> {
        (self.update(ReportKind::Keyboard, (0, 0, 0), |i| {
            i.kbd.press_key(k).map_err(|_| Error::ReportFull)
        }))
        .await
    }

    /// Releases a key and its modifiers.
    pub async fn release_key(&self, k: kbd::Key) -> Result<bool> {
        (self.update(ReportKind::Keyboard, (0, 0, 0), |i| {
            i.kbd.release(k.usage());
            let m = i.kbd.modifiers().difference(k.modifiers());
            i.kbd.set_modifiers(m);
            Ok(())
        }))
        .await
    }

    /// Presses and releases a key. Modifiers that were already held before the
    /// press stay held.
    pub async fn tap_key(&self, k: kbd::Key) -> Result<bool> {
        let mut added = KeyMod::empty();
        let pressed = (self.update(ReportKind::Keyboard, (0, 0, 0), |i| {
            added = k.modifiers().difference(i.kbd.modifiers());
            i.kbd.press_key(k).map_err(|_| Error::ReportFull)
        }))
        .await?;
        let k = kbd::Key::from(k.usage()).with(added);
        Ok(self.release_key(k).await? && pressed)
    }

    /// Types text using the US keyboard layout. Each character is sent as a
    /// press report followed by a release report. Characters without a key
    /// mapping are skipped. Returns the number of characters typed.
    pub async fn type_text(&self, text: &str) -> Result<usize> {
        let mut n = 0;
        for c in text.chars() {
            let Some(k) = kbd::char_to_key(c) else {
                debug!("Skipping unsupported character {c:?}");
                continue;
            };
            self.tap_key(k).await?;
            n += 1;
        }
        Ok(n)
    }

    /// Presses media keys.
    pub async fn press_media(&self, m: MediaKey) -> Result<bool> {
        (self.update(ReportKind::Media, (0, 0, 0), |i| {
            i.media |= m;
            Ok(())
        }))
        .await
    }

    /// Releases media keys.
    pub async fn release_media(&self, m: MediaKey) -> Result<bool> {
        (self.update(ReportKind::Media, (0, 0, 0), |i| {
            i.media.remove(m);
            Ok(())
        }))
        .await
    }

    /// Presses and releases media keys.
    pub async fn tap_media(&self, m: MediaKey) -> Result<bool> {
        let pressed = self.press_media(m).await?;
        Ok(self.release_media(m).await? && pressed)
    }

    /// Releases all keys and buttons.
    pub async fn release_all(&self) -> Result<bool> {
        let kinds: &[ReportKind] = match self.hid.table().topology() {
            Topology::Combined => &[ReportKind::Combined],
            _ => &[ReportKind::Keyboard, ReportKind::Mouse, ReportKind::Media],
        };
        let mut all = true;
        for (n, &kind) in kinds.iter().enumerate() {
            all &= (self.update(kind, (0, 0, 0), |i| {
                if n == 0 {
                    *i = InputState::default();
                }
                Ok(())
            }))
            .await?;
        }
        Ok(all)
    }

    /// Applies `f` to the input state and sends the resulting report if the
    /// host enabled notifications for it. Returns `Ok(false)` if the report
    /// was not delivered.
    async fn update(
        &self,
        kind: ReportKind,
        mv: (i8, i8, i8),
        f: impl FnOnce(&mut InputState) -> Result<()>,
    ) -> Result<bool> {
        let sent = {
            let mut s = self.inner.lock();
            let conn = s.conn.as_mut().ok_or(Error::NotConnected)?;
            f(&mut conn.input)?;
            let (hdl, v) = self.encode(kind, &conn.input, mv)?;
            conn.set_value(hdl, &v);
            let peer = conn.peer();
            if !self.dispatch.is_enabled(peer, hdl) {
                trace!("Notifications for {hdl} disabled, report dropped");
                return Ok(false);
            }
            // Queued under the state lock so that reports leave in the order
            // in which their state was computed.
            self.dispatch.queue(peer, hdl, &v)
        };
        Ok(sent.await.unwrap_or(false))
    }

    /// Encodes the report carrying `kind` input state.
    fn encode(
        &self,
        kind: ReportKind,
        i: &InputState,
        (dx, dy, wheel): (i8, i8, i8),
    ) -> Result<(Handle, ReportBuf)> {
        let kind = match self.hid.table().topology() {
            Topology::Combined => ReportKind::Combined,
            _ => kind,
        };
        let hdl = (self.hid.report_handle(kind, ReportType::Input))
            .ok_or(Error::Unsupported("report kind"))?;
        let v = match kind {
            ReportKind::Keyboard => ReportBuf::from_slice(&i.kbd.encode()),
            ReportKind::Mouse => ReportBuf::from_slice(
                &MouseReport {
                    buttons: i.buttons,
                    dx,
                    dy,
                    wheel,
                }
                .encode(),
            ),
            ReportKind::Media => ReportBuf::from_slice(&media::encode_media(i.media)),
            ReportKind::Combined => ReportBuf::from_slice(&combined::encode_combined(
                i.media,
                i.buttons,
                dx.into(),
                dy.into(),
                &i.kbd,
            )),
        };
        Ok((hdl, v))
    }

    /// Returns the keyboard state of the connected host.
    #[cfg(test)]
    fn keyboard(&self) -> Option<kbd::KeyboardReport> {
        self.inner.lock().conn.as_ref().map(|c| c.input.kbd)
    }
}

/// Future that handles transport events.
#[derive(Debug)]
pub struct EventLoop {
    h: tokio::task::JoinHandle<()>,
    c: CancellationToken,
    _g: tokio_util::sync::DropGuard,
}

impl EventLoop {
    /// Stops event processing.
    #[inline]
    pub async fn stop(self) {
        self.c.cancel();
        if let Err(e) = self.h.await {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
    }

    async fn run<T: Transport>(
        p: Arc<Peripheral<T>>,
        mut rx: mpsc::UnboundedReceiver<Event>,
        c: CancellationToken,
    ) {
        debug!("Event loop started");
        loop {
            let e = tokio::select! {
                e = rx.recv() => e,
                _ = c.cancelled() => None,
            };
            let Some(e) = e else {
                debug!("Event loop terminating");
                return;
            };
            trace!("{e:?}");
            p.handle(e);
        }
    }
}

impl Future for EventLoop {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Err(e) = ready!(Pin::new(&mut self.h).poll(cx)) {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
        Poll::Ready(())
    }
}
