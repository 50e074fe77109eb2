use log::LevelFilter;
use rustyblue_remote::att::{AttErrorCode, ATT_DEFAULT_MTU};
use rustyblue_remote::{
    CompletionStatus, ConnectionId, GattTransport, IssueError, ReadCallback, ReadEvent,
    RemoteAttribute, WriteCallback,
};
use simplelog::{Config, SimpleLogger};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// In-memory peer: answers requests from a background thread, like a host
/// stack would from its own task.
struct LoopbackPeer {
    conn: ConnectionId,
    mtu: u16,
    /// Handles that refuse long writes
    short_only: Vec<u16>,
    encrypted: AtomicBool,
    /// Handles that require an encrypted link
    protected: Vec<u16>,
    values: Arc<Mutex<HashMap<u16, Vec<u8>>>>,
}

impl LoopbackPeer {
    fn new() -> Self {
        Self {
            conn: ConnectionId::new(0x0040, 1),
            mtu: ATT_DEFAULT_MTU,
            short_only: vec![0x0031],
            encrypted: AtomicBool::new(false),
            protected: vec![0x0032],
            values: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn refuse_insecure(&self, handle: u16) -> Option<CompletionStatus> {
        if self.protected.contains(&handle) && !self.encrypted.load(Ordering::SeqCst) {
            Some(CompletionStatus::Att(AttErrorCode::InsufficientEncryption))
        } else {
            None
        }
    }

    fn store(&self, handle: u16, value: &[u8], callback: WriteCallback) {
        let conn = self.conn;
        let status = self.refuse_insecure(handle).unwrap_or(CompletionStatus::Success);
        if status.is_success() {
            self.values.lock().unwrap().insert(handle, value.to_vec());
        }
        thread::spawn(move || callback(conn, status));
    }
}

impl GattTransport for LoopbackPeer {
    fn is_connected(&self) -> bool {
        true
    }

    fn connection_id(&self) -> ConnectionId {
        self.conn
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }

    fn read_long(
        &self,
        conn: ConnectionId,
        handle: u16,
        _offset: u16,
        mut callback: ReadCallback,
    ) -> Result<(), IssueError> {
        let refused = self.refuse_insecure(handle);
        let value = self.values.lock().unwrap().get(&handle).cloned();
        let chunk = self.mtu as usize - 1;

        thread::spawn(move || match (refused, value) {
            (Some(status), _) => callback(conn, ReadEvent::Complete(status)),
            (None, Some(value)) => {
                for fragment in value.chunks(chunk) {
                    callback(conn, ReadEvent::Data(fragment));
                }
                callback(conn, ReadEvent::Complete(CompletionStatus::Done));
            }
            (None, None) => callback(
                conn,
                ReadEvent::Complete(CompletionStatus::Att(AttErrorCode::InvalidHandle)),
            ),
        });
        Ok(())
    }

    fn write_no_response(
        &self,
        _conn: ConnectionId,
        handle: u16,
        value: &[u8],
    ) -> Result<(), IssueError> {
        self.values.lock().unwrap().insert(handle, value.to_vec());
        Ok(())
    }

    fn write(
        &self,
        _conn: ConnectionId,
        handle: u16,
        value: &[u8],
        callback: WriteCallback,
    ) -> Result<(), IssueError> {
        self.store(handle, value, callback);
        Ok(())
    }

    fn write_long(
        &self,
        conn: ConnectionId,
        handle: u16,
        _offset: u16,
        value: &[u8],
        callback: WriteCallback,
    ) -> Result<(), IssueError> {
        if self.short_only.contains(&handle) {
            let status = CompletionStatus::Att(AttErrorCode::AttributeNotLong);
            thread::spawn(move || callback(conn, status));
            return Ok(());
        }
        self.store(handle, value, callback);
        Ok(())
    }

    fn can_upgrade_security(&self) -> bool {
        true
    }

    fn upgrade_security(&self) -> bool {
        println!("  (pairing with peer)");
        self.encrypted.store(true, Ordering::SeqCst);
        true
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::init(LevelFilter::Info, Config::default())?;

    let peer = Arc::new(LoopbackPeer::new());

    // A long value goes out as a prepared write and comes back in fragments
    let user_description = RemoteAttribute::descriptor(0x0030, Arc::clone(&peer));
    let text = "A user description longer than a single ATT frame";
    println!("Writing {} bytes: {}", text.len(), user_description.write_str(text, true));
    let value = user_description.read();
    println!("Read back: {}", String::from_utf8_lossy(&value));

    // A peer without long write support gets the value truncated
    let short_only = RemoteAttribute::descriptor(0x0031, Arc::clone(&peer));
    println!("Writing to short-only descriptor: {}", short_only.write_str(text, true));
    println!("Stored: {}", String::from_utf8_lossy(&short_only.read()));

    // Encryption is raised on demand, once
    let protected = RemoteAttribute::characteristic(0x0032, Arc::clone(&peer));
    println!("Protected write: {}", protected.write(&0x1234u16.to_le_bytes(), true));
    println!("Protected value: 0x{:04X}", protected.read_u16());

    // Unknown handles fail with an empty value
    let missing = RemoteAttribute::descriptor(0x00FF, peer);
    match missing.try_read() {
        Ok(value) => println!("Unexpected value: {:?}", value),
        Err(e) => println!("Missing attribute: {}", e),
    }

    Ok(())
}
