//! Completion gate
//!
//! A single-slot primitive that lets one blocking caller wait on the
//! terminal callback of an asynchronous transport request.
//!
//! Acquiring the gate gives the caller a [`GateTicket`] and a
//! [`Signaller`] for the transport callback. The ticket owns the slot until
//! it is dropped, so at most one operation per gate is outstanding at a
//! time. Each acquisition creates a fresh one-shot channel: a signal left
//! over from a previous operation can never wake the next one.

use super::status::CompletionStatus;
use futures::channel::oneshot;
use futures::executor::block_on;
use log::{trace, warn};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};

/// Sending half of one operation's completion channel
struct Signal {
    tx: Mutex<Option<oneshot::Sender<CompletionStatus>>>,
}

impl Signal {
    fn send(&self, status: CompletionStatus) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => tx.send(status).is_ok(),
            None => false,
        }
    }
}

/// Handle given to the transport callback so it can complete the operation.
///
/// The first signal wins; any later signal is ignored. Dropping every
/// signaller without signalling resolves the wait as
/// [`CompletionStatus::Released`].
#[derive(Clone)]
pub struct Signaller {
    signal: Arc<Signal>,
}

impl Signaller {
    /// Complete the operation with `status`.
    ///
    /// Returns `false` if the operation was already completed or its waiter
    /// has gone away.
    pub fn signal(&self, status: CompletionStatus) -> bool {
        self.signal.send(status)
    }
}

#[derive(Default)]
struct Slot {
    held: bool,
    acquisitions: u64,
    pending: Option<Weak<Signal>>,
}

/// Single-slot wait/signal gate
pub struct CompletionGate {
    label: &'static str,
    slot: Mutex<Slot>,
    freed: Condvar,
}

impl CompletionGate {
    /// Create a new, free gate
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slot: Mutex::new(Slot::default()),
            freed: Condvar::new(),
        }
    }

    /// Label used in diagnostics
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Whether an operation currently owns the gate
    pub fn is_held(&self) -> bool {
        self.lock_slot().held
    }

    /// Number of times the gate has been acquired
    pub fn acquisitions(&self) -> u64 {
        self.lock_slot().acquisitions
    }

    /// Block until the gate is free, then take ownership of it.
    ///
    /// Never fails, it only delays. The returned signaller completes this
    /// acquisition only.
    pub fn acquire(&self) -> (GateTicket<'_>, Signaller) {
        let mut slot = self.lock_slot();
        while slot.held {
            trace!("{}: waiting for gate", self.label);
            slot = self
                .freed
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let (tx, rx) = oneshot::channel();
        let signal = Arc::new(Signal {
            tx: Mutex::new(Some(tx)),
        });

        slot.held = true;
        slot.acquisitions += 1;
        slot.pending = Some(Arc::downgrade(&signal));
        trace!("{}: acquired", self.label);

        let ticket = GateTicket { gate: self, rx };
        (ticket, Signaller { signal })
    }

    /// Complete the current holder's operation with `status`, if there is one.
    ///
    /// Used by teardown paths where the transport will never deliver the
    /// terminal callback. Returns `true` if a waiting operation was woken.
    pub fn force_release(&self, status: CompletionStatus) -> bool {
        let pending = self.lock_slot().pending.as_ref().and_then(Weak::upgrade);
        match pending {
            Some(signal) => {
                let woken = signal.send(status);
                if woken {
                    warn!("{}: force released with {}", self.label, status);
                }
                woken
            }
            None => false,
        }
    }

    fn free(&self) {
        let mut slot = self.lock_slot();
        slot.held = false;
        slot.pending = None;
        drop(slot);
        trace!("{}: released", self.label);
        self.freed.notify_one();
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CompletionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGate")
            .field("label", &self.label)
            .field("held", &self.is_held())
            .finish()
    }
}

/// Ownership of a [`CompletionGate`] for one operation.
///
/// Dropping the ticket frees the gate, on every path.
pub struct GateTicket<'a> {
    gate: &'a CompletionGate,
    rx: oneshot::Receiver<CompletionStatus>,
}

impl GateTicket<'_> {
    /// Free the gate without waiting, e.g. when the request could not be issued
    pub fn release(self) {}

    /// Block until the operation's terminal status arrives, then free the gate
    pub fn wait(mut self) -> CompletionStatus {
        trace!("{}: waiting for completion", self.gate.label);

        match block_on(&mut self.rx) {
            Ok(status) => status,
            Err(oneshot::Canceled) => {
                warn!(
                    "{}: completion dropped without a status",
                    self.gate.label
                );
                CompletionStatus::Released
            }
        }
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        self.gate.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_signal_wakes_waiter() {
        let gate = CompletionGate::new("test");
        let (ticket, signaller) = gate.acquire();
        assert!(gate.is_held());

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaller.signal(CompletionStatus::Done)
        });

        assert_eq!(ticket.wait(), CompletionStatus::Done);
        assert!(handle.join().unwrap());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_first_signal_wins() {
        let gate = CompletionGate::new("test");
        let (ticket, signaller) = gate.acquire();

        assert!(signaller.signal(CompletionStatus::Success));
        assert!(!signaller.signal(CompletionStatus::Host(6)));
        assert!(!gate.force_release(CompletionStatus::Released));

        assert_eq!(ticket.wait(), CompletionStatus::Success);
    }

    #[test]
    fn test_signal_before_wait_is_kept() {
        let gate = CompletionGate::new("test");
        let (ticket, signaller) = gate.acquire();
        signaller.signal(CompletionStatus::Host(3));

        assert_eq!(ticket.wait(), CompletionStatus::Host(3));
    }

    #[test]
    fn test_dropped_signaller_releases() {
        let gate = CompletionGate::new("test");
        let (ticket, signaller) = gate.acquire();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            drop(signaller);
        });

        assert_eq!(ticket.wait(), CompletionStatus::Released);
        handle.join().unwrap();
    }

    #[test]
    fn test_force_release() {
        let gate = Arc::new(CompletionGate::new("test"));
        assert!(!gate.force_release(CompletionStatus::Released));

        let releaser = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            // Keep trying until the waiter below owns the gate
            while !releaser.force_release(CompletionStatus::Released) {
                thread::sleep(Duration::from_millis(1));
            }
        });

        let (ticket, _signaller) = gate.acquire();
        assert_eq!(ticket.wait(), CompletionStatus::Released);
        handle.join().unwrap();
        assert!(!gate.is_held());
    }

    #[test]
    fn test_fresh_channel_per_acquire() {
        let gate = CompletionGate::new("test");

        let (ticket, stale) = gate.acquire();
        stale.signal(CompletionStatus::Success);
        assert_eq!(ticket.wait(), CompletionStatus::Success);

        let (ticket, current) = gate.acquire();
        // The previous operation's signaller cannot complete this one
        assert!(!stale.signal(CompletionStatus::Host(9)));
        current.signal(CompletionStatus::Done);
        assert_eq!(ticket.wait(), CompletionStatus::Done);
        assert_eq!(gate.acquisitions(), 2);
    }

    #[test]
    fn test_release_without_wait() {
        let gate = CompletionGate::new("test");
        let (ticket, signaller) = gate.acquire();
        ticket.release();

        assert!(!gate.is_held());
        assert!(!signaller.signal(CompletionStatus::Success));
    }

    #[test]
    fn test_acquire_blocks_until_free() {
        let gate = Arc::new(CompletionGate::new("test"));
        let (ticket, _signaller) = gate.acquire();

        let contender = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            let (ticket, _signaller) = contender.acquire();
            ticket.release();
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(gate.acquisitions(), 1);
        ticket.release();

        handle.join().unwrap();
        assert_eq!(gate.acquisitions(), 2);
        assert!(!gate.is_held());
    }
}
