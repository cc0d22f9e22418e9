use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use ahash::AHashMap;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct SessionCounts {
    pub received_bytes: u64,
    pub send_bytes: u64,
    pub received_messages: u64,
    pub send_messages: u64,
    pub error_frames: u64,
}

/// The type of information passed in the statistics channel.
///
/// "Received" counts client-to-database traffic, "send" counts
/// database-to-client traffic.
#[derive(Debug, Clone, Copy)]
pub enum Stats {
    ReceivedBytes(u64),
    SendBytes(u64),
    ReceivedMessages(u64),
    SendMessages(u64),
    ErrorFrames(u64),
}

#[derive(Default)]
struct Count(AtomicU64);

impl Count {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Connection independent statistics.
#[derive(Default)]
struct Counts {
    received_bytes: Count,
    send_bytes: Count,
    received_messages: Count,
    send_messages: Count,
    error_frames: Count,
}

impl Counts {
    fn add(&self, payload: &Stats) {
        match payload {
            Stats::ReceivedBytes(v) => self.received_bytes.add(*v),
            Stats::ReceivedMessages(v) => self.received_messages.add(*v),
            Stats::SendBytes(v) => self.send_bytes.add(*v),
            Stats::SendMessages(v) => self.send_messages.add(*v),
            Stats::ErrorFrames(v) => self.error_frames.add(*v),
        }
    }
}

/// Per-connection traffic counters, keyed by the client address.
#[derive(Default, Clone)]
pub struct Statistics(Arc<RwLock<AHashMap<SocketAddr, Counts>>>);

impl Statistics {
    /// Get a reporter handle for the connection tasks.
    ///
    /// # Example
    ///
    /// ```
    /// use std::net::SocketAddr;
    /// use wsgate_server::statistics::*;
    ///
    /// let addr = "127.0.0.1:8080".parse::<SocketAddr>().unwrap();
    /// let statistics = Statistics::default();
    /// let reporter = statistics.get_reporter();
    ///
    /// statistics.set(addr);
    /// reporter.send(&addr, &[Stats::ReceivedBytes(100)]);
    ///
    /// assert_eq!(statistics.get(&addr).unwrap().received_bytes, 100);
    /// ```
    pub fn get_reporter(&self) -> StatisticsReporter {
        StatisticsReporter(self.0.clone())
    }

    /// Add a connection to the watch list.
    ///
    /// # Example
    ///
    /// ```
    /// use std::net::SocketAddr;
    /// use wsgate_server::statistics::*;
    ///
    /// let addr = "127.0.0.1:8080".parse::<SocketAddr>().unwrap();
    /// let statistics = Statistics::default();
    ///
    /// statistics.set(addr);
    /// assert!(statistics.get(&addr).is_some());
    /// ```
    pub fn set(&self, addr: SocketAddr) {
        self.0.write().insert(addr, Counts::default());
    }

    /// Remove a connection from the watch list.
    ///
    /// # Example
    ///
    /// ```
    /// use std::net::SocketAddr;
    /// use wsgate_server::statistics::*;
    ///
    /// let addr = "127.0.0.1:8080".parse::<SocketAddr>().unwrap();
    /// let statistics = Statistics::default();
    ///
    /// statistics.set(addr);
    /// statistics.delete(&addr);
    /// assert!(statistics.get(&addr).is_none());
    /// ```
    pub fn delete(&self, addr: &SocketAddr) {
        self.0.write().remove(addr);
    }

    /// Read the counters of one connection.
    pub fn get(&self, addr: &SocketAddr) -> Option<SessionCounts> {
        self.0.read().get(addr).map(|counts| SessionCounts {
            received_bytes: counts.received_bytes.get(),
            received_messages: counts.received_messages.get(),
            send_bytes: counts.send_bytes.get(),
            send_messages: counts.send_messages.get(),
            error_frames: counts.error_frames.get(),
        })
    }
}

/// Statistics reporter.
///
/// It is held by each connection task; traffic updates sent through it
/// land in the counters of the connection they belong to. Reports for a
/// connection that has already been removed are discarded.
#[derive(Clone)]
pub struct StatisticsReporter(Arc<RwLock<AHashMap<SocketAddr, Counts>>>);

impl StatisticsReporter {
    pub fn send(&self, addr: &SocketAddr, reports: &[Stats]) {
        if let Some(counts) = self.0.read().get(addr) {
            for item in reports {
                counts.add(item);
            }
        }
    }
}
