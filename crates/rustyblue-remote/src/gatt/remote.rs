//! Remote attribute accessor
//!
//! Turns the transport's issue-and-callback primitives into blocking
//! `read` / `write` calls for one remote descriptor or characteristic
//! value. Each call holds the matching completion gate for the length of
//! one attempt, so a read and a write may be in flight together but never
//! two reads or two writes on the same attribute.

use super::fragment::{frame_mode, single_frame_ceiling, FrameMode};
use super::gate::{CompletionGate, Signaller};
use super::policy::{read_action, write_action, ReadAction, RetryBudget, WriteAction};
use super::status::CompletionStatus;
use super::transport::{ConnectionId, GattTransport, ReadCallback, ReadEvent, WriteCallback};
use super::types::{AccessorConfig, AttributeKind};
use crate::error::{RemoteError, RemoteResult};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, error, info, trace, warn};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Blocking accessor for one attribute on a connected peer
pub struct RemoteAttribute<T: GattTransport> {
    kind: AttributeKind,
    /// Attribute handle on the peer
    handle: u16,
    transport: Arc<T>,
    config: RwLock<AccessorConfig>,
    read_gate: CompletionGate,
    write_gate: CompletionGate,
    /// Value returned by the last successful read
    value: Mutex<Vec<u8>>,
}

impl<T: GattTransport> RemoteAttribute<T> {
    /// Create an accessor with the default configuration
    pub fn new(kind: AttributeKind, handle: u16, transport: Arc<T>) -> Self {
        Self::with_config(kind, handle, transport, AccessorConfig::default())
    }

    pub fn with_config(
        kind: AttributeKind,
        handle: u16,
        transport: Arc<T>,
        config: AccessorConfig,
    ) -> Self {
        Self {
            kind,
            handle,
            transport,
            config: RwLock::new(config),
            read_gate: CompletionGate::new(kind.read_label()),
            write_gate: CompletionGate::new(kind.write_label()),
            value: Mutex::new(Vec::new()),
        }
    }

    /// Accessor for a characteristic descriptor
    pub fn descriptor(handle: u16, transport: Arc<T>) -> Self {
        Self::new(AttributeKind::Descriptor, handle, transport)
    }

    /// Accessor for a characteristic value
    pub fn characteristic(handle: u16, transport: Arc<T>) -> Self {
        Self::new(AttributeKind::Characteristic, handle, transport)
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    /// Set accessor configuration; applies from the next call
    pub fn set_config(&self, config: AccessorConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Get accessor configuration
    pub fn config(&self) -> AccessorConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn read_gate(&self) -> &CompletionGate {
        &self.read_gate
    }

    pub fn write_gate(&self) -> &CompletionGate {
        &self.write_gate
    }

    /// Copy of the value returned by the last successful read
    pub fn last_value(&self) -> Vec<u8> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read the attribute value.
    ///
    /// Returns an empty value on any failure; use [`try_read`](Self::try_read)
    /// to tell a failure from a zero-length attribute.
    pub fn read(&self) -> Vec<u8> {
        self.try_read().unwrap_or_else(|e| {
            error!("Failed to read {}: {}", self, e);
            Vec::new()
        })
    }

    /// Read the attribute value with a long read.
    ///
    /// A peer that refuses long reads yields whatever arrived before the
    /// refusal. An insufficient-security status is retried once after a
    /// security upgrade when the link supports one.
    pub fn try_read(&self) -> RemoteResult<Vec<u8>> {
        debug!("Reading {}", self);

        let config = self.config();
        let mut budget = RetryBudget::new(&config);

        let value = loop {
            if !self.transport.is_connected() {
                error!("Cannot read {}: disconnected", self);
                return Err(RemoteError::NotConnected);
            }

            let attempt = budget.begin_attempt();
            let buffer = Arc::new(Mutex::new(Vec::new()));
            let (ticket, signaller) = self.read_gate.acquire();
            // The link may have dropped while queued behind another read
            if !self.transport.is_connected() {
                error!("Cannot read {}: disconnected while waiting", self);
                ticket.release();
                return Err(RemoteError::NotConnected);
            }
            let conn = self.transport.connection_id();

            let callback = read_callback(conn, Arc::clone(&buffer), signaller);
            if let Err(e) = self.transport.read_long(conn, self.handle, 0, callback) {
                error!("Failed to issue read of {}: {}", self, e);
                ticket.release();
                return Err(RemoteError::IssueFailed(e));
            }

            let status = ticket.wait();
            debug!(
                "Read of {} complete; attempt={} status={} ({})",
                self,
                attempt,
                status.raw(),
                status
            );

            match read_action(status, &mut budget, || self.upgrade_security()) {
                ReadAction::Accept => break take_buffer(&buffer),
                ReadAction::AcceptPartial => {
                    let value = take_buffer(&buffer);
                    info!("{} is not long; keeping {} bytes", self, value.len());
                    break value;
                }
                ReadAction::RetryAfterUpgrade => {
                    warn!("Retrying read of {} after security upgrade", self);
                }
                ReadAction::FailSecurity => {
                    return Err(RemoteError::InsufficientSecurity(status));
                }
                ReadAction::Fail => return Err(failure(status)),
            }
        };

        debug!("Read {} bytes from {}", value.len(), self);
        trace!("{} value: {}", self, hex::encode(&value));

        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value.clone();
        Ok(value)
    }

    /// Read and decode a little-endian unsigned integer of `width` bytes.
    ///
    /// Returns 0 if `width` is not in `1..=8` or the value is shorter than
    /// `width`.
    pub fn read_uint(&self, width: usize) -> u64 {
        if width == 0 || width > 8 {
            warn!("Invalid integer width {} for {}", width, self);
            return 0;
        }

        let value = self.read();
        if value.len() < width {
            return 0;
        }
        LittleEndian::read_uint(&value, width)
    }

    pub fn read_u8(&self) -> u8 {
        self.read_uint(1) as u8
    }

    pub fn read_u16(&self) -> u16 {
        self.read_uint(2) as u16
    }

    pub fn read_u32(&self) -> u32 {
        self.read_uint(4) as u32
    }

    /// Write `value` to the attribute, returning whether it succeeded
    pub fn write(&self, value: &[u8], response: bool) -> bool {
        match self.try_write(value, response) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write {}: {}", self, e);
                false
            }
        }
    }

    pub fn write_u8(&self, value: u8, response: bool) -> bool {
        self.write(&[value], response)
    }

    pub fn write_str(&self, value: &str, response: bool) -> bool {
        self.write(value.as_bytes(), response)
    }

    /// Write `value` to the attribute.
    ///
    /// A value that fits in one frame and needs no response goes out as a
    /// write command and never waits. Anything else waits for the peer:
    /// values longer than one frame use a long write, and a peer that
    /// refuses long writes gets the value truncated to one frame.
    pub fn try_write(&self, value: &[u8], response: bool) -> RemoteResult<()> {
        debug!(
            "Writing {} bytes to {}; response={}",
            value.len(),
            self,
            response
        );
        trace!("{} write: {}", self, hex::encode(value));

        if !self.transport.is_connected() {
            error!("Cannot write {}: disconnected", self);
            return Err(RemoteError::NotConnected);
        }

        let mtu = self.transport.mtu();
        let ceiling = single_frame_ceiling(mtu);

        if !response && frame_mode(value.len(), mtu) == FrameMode::Single {
            let conn = self.transport.connection_id();
            return self
                .transport
                .write_no_response(conn, self.handle, value)
                .map_err(|e| {
                    error!("Failed to issue write command to {}: {}", self, e);
                    RemoteError::IssueFailed(e)
                });
        }

        let config = self.config();
        let mut budget = RetryBudget::new(&config);
        let mut len = value.len();

        loop {
            if !self.transport.is_connected() {
                error!("Cannot write {}: disconnected", self);
                return Err(RemoteError::NotConnected);
            }

            let attempt = budget.begin_attempt();
            let payload = &value[..len];
            let (ticket, signaller) = self.write_gate.acquire();
            if !self.transport.is_connected() {
                error!("Cannot write {}: disconnected while waiting", self);
                ticket.release();
                return Err(RemoteError::NotConnected);
            }
            let conn = self.transport.connection_id();
            let callback = write_callback(conn, signaller);

            let issued = match frame_mode(payload.len(), mtu) {
                FrameMode::Long => {
                    info!("Long write of {} bytes to {}", payload.len(), self);
                    self.transport
                        .write_long(conn, self.handle, 0, payload, callback)
                }
                FrameMode::Single => self.transport.write(conn, self.handle, payload, callback),
            };
            if let Err(e) = issued {
                error!("Failed to issue write to {}: {}", self, e);
                ticket.release();
                return Err(RemoteError::IssueFailed(e));
            }

            let status = ticket.wait();
            debug!(
                "Write to {} complete; attempt={} status={} ({})",
                self,
                attempt,
                status.raw(),
                status
            );

            match write_action(status, &mut budget, &config, ceiling, || {
                self.upgrade_security()
            }) {
                WriteAction::Done => return Ok(()),
                WriteAction::Truncate(max) => {
                    warn!(
                        "Long write not supported by peer; truncating {} to {} bytes",
                        self, max
                    );
                    len = len.min(max);
                }
                WriteAction::RetryAfterUpgrade => {
                    warn!("Retrying write to {} after security upgrade", self);
                }
                WriteAction::FailSecurity => {
                    return Err(RemoteError::InsufficientSecurity(status));
                }
                WriteAction::FailNotLong => return Err(RemoteError::NotLong),
                WriteAction::Fail => return Err(failure(status)),
            }
        }
    }

    /// Wake any caller blocked on this attribute.
    ///
    /// Called by disconnect handling: the transport will not complete the
    /// outstanding requests, so both gates are released with
    /// [`CompletionStatus::Released`].
    pub fn force_release_all(&self) {
        let read = self.read_gate.force_release(CompletionStatus::Released);
        let write = self.write_gate.force_release(CompletionStatus::Released);
        if read || write {
            info!(
                "Released pending operations on {}; read={} write={}",
                self, read, write
            );
        }
    }

    fn upgrade_security(&self) -> bool {
        if !self.transport.can_upgrade_security() {
            debug!("Security upgrade not available for {}", self);
            return false;
        }

        warn!("Insufficient security for {}; upgrading link", self);
        let upgraded = self.transport.upgrade_security();
        if !upgraded {
            error!("Security upgrade failed for {}", self);
        }
        upgraded
    }
}

impl<T: GattTransport> fmt::Display for RemoteAttribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: handle: 0x{:04X}", self.kind, self.handle)
    }
}

impl<T: GattTransport> fmt::Debug for RemoteAttribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAttribute")
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .field("read_gate", &self.read_gate)
            .field("write_gate", &self.write_gate)
            .finish()
    }
}

fn read_callback(
    issued_on: ConnectionId,
    buffer: Arc<Mutex<Vec<u8>>>,
    signaller: Signaller,
) -> ReadCallback {
    Box::new(move |conn: ConnectionId, event: ReadEvent<'_>| {
        if conn != issued_on {
            warn!(
                "Ignoring read event for connection {} (issued on {})",
                conn, issued_on
            );
            return;
        }

        match event {
            ReadEvent::Data(bytes) => {
                trace!("Got {} bytes", bytes.len());
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(bytes);
            }
            ReadEvent::Complete(status) => {
                signaller.signal(status);
            }
        }
    })
}

/// A write completes exactly once, so a completion for another connection
/// drops the signaller and the waiter resolves as released.
fn write_callback(issued_on: ConnectionId, signaller: Signaller) -> WriteCallback {
    Box::new(move |conn: ConnectionId, status: CompletionStatus| {
        if conn != issued_on {
            warn!(
                "Ignoring write completion for connection {} (issued on {})",
                conn, issued_on
            );
            return;
        }
        signaller.signal(status);
    })
}

fn take_buffer(buffer: &Mutex<Vec<u8>>) -> Vec<u8> {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner))
}

fn failure(status: CompletionStatus) -> RemoteError {
    match status {
        CompletionStatus::Released => RemoteError::Released,
        status => RemoteError::Status(status),
    }
}
