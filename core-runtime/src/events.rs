//! # Idle Events
//!
//! Clients of the daemon wait for "something changed" notifications
//! (`idle` in the client protocol). Every subsystem raises [`IdleFlags`] when
//! its state changes; the [`IdleBus`] folds bursts of those flags into one
//! notification per reactor iteration and republishes the union to every
//! subscriber.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  emit(PLAYER)
//! │ Player thread├──────────────┐
//! └──────────────┘              │     ┌─────────────┐          ┌──────────┐
//!                               ├────>│ MaskMonitor ├─ reactor ┤broadcast │──> subscribers
//! ┌──────────────┐  emit(MIXER) │     │  (AtomicU32)│          └──────────┘
//! │ Mixer thread ├──────────────┘     └─────────────┘
//! └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_event::EventLoop;
//! use core_runtime::events::{IdleBus, IdleFlags};
//!
//! let event_loop = EventLoop::start("io").unwrap();
//! let bus = IdleBus::new(event_loop.handle());
//! let mut idle = bus.subscribe();
//!
//! bus.emit(IdleFlags::PLAYER);
//! bus.emit(IdleFlags::MIXER);
//! event_loop.handle().blocking_call(|| ());
//!
//! // usually one notification, two if the reactor ran between the emits
//! let mut seen = IdleFlags::empty();
//! while let Ok(flags) = idle.try_recv() {
//!     seen |= flags;
//! }
//! assert_eq!(seen, IdleFlags::PLAYER | IdleFlags::MIXER);
//! ```
//!
//! ## Error Handling
//!
//! The bus uses `tokio::sync::broadcast`. A subscriber that falls more than
//! [`DEFAULT_IDLE_BUFFER_SIZE`] notifications behind receives
//! `RecvError::Lagged` and should treat it as "everything changed".

use bitflags::bitflags;
use core_event::{EventLoopHandle, MaskMonitor};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the idle broadcast channel.
pub const DEFAULT_IDLE_BUFFER_SIZE: usize = 64;

bitflags! {
    /// Subsystems whose state a client can wait on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IdleFlags: u32 {
        /// The song database has been modified
        const DATABASE = 0x1;
        /// A stored playlist has been modified
        const STORED_PLAYLIST = 0x2;
        /// The queue has been modified
        const PLAYLIST = 0x4;
        /// The player state has changed: play, stop, seek, ...
        const PLAYER = 0x8;
        /// The volume has been modified
        const MIXER = 0x10;
        /// An audio output device has been enabled or disabled
        const OUTPUT = 0x20;
        /// Options have changed: crossfade, random, repeat, ...
        const OPTIONS = 0x40;
        const STICKER = 0x80;
        /// A client has subscribed to or unsubscribed from a channel
        const SUBSCRIPTION = 0x100;
        /// A message on a subscribed channel was received
        const MESSAGE = 0x200;
        /// A neighbor was found or lost
        const NEIGHBOR = 0x400;
        /// The mount list has changed
        const MOUNT = 0x800;
    }
}

const IDLE_NAMES: &[(IdleFlags, &str)] = &[
    (IdleFlags::DATABASE, "database"),
    (IdleFlags::STORED_PLAYLIST, "stored_playlist"),
    (IdleFlags::PLAYLIST, "playlist"),
    (IdleFlags::PLAYER, "player"),
    (IdleFlags::MIXER, "mixer"),
    (IdleFlags::OUTPUT, "output"),
    (IdleFlags::OPTIONS, "options"),
    (IdleFlags::STICKER, "sticker"),
    (IdleFlags::SUBSCRIPTION, "subscription"),
    (IdleFlags::MESSAGE, "message"),
    (IdleFlags::NEIGHBOR, "neighbor"),
    (IdleFlags::MOUNT, "mount"),
];

impl IdleFlags {
    /// Protocol names of the flags set in `self`, lowest bit first.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        IDLE_NAMES
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }

    /// Looks up a single flag by its protocol name (case-insensitive).
    pub fn parse_name(name: &str) -> Option<Self> {
        IDLE_NAMES
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
            .map(|(flag, _)| *flag)
    }
}

impl fmt::Display for IdleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Coalescing publisher of [`IdleFlags`].
///
/// `emit` is lock-free and callable from any thread. Subscribers receive at
/// most one notification per reactor turn carrying every flag raised since
/// the previous one.
pub struct IdleBus {
    monitor: MaskMonitor,
    sender: broadcast::Sender<IdleFlags>,
}

impl IdleBus {
    pub fn new(event_loop: EventLoopHandle) -> Self {
        Self::with_capacity(event_loop, DEFAULT_IDLE_BUFFER_SIZE)
    }

    pub fn with_capacity(event_loop: EventLoopHandle, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        let publisher = sender.clone();
        let monitor = MaskMonitor::new(event_loop, move |mask| {
            let flags = IdleFlags::from_bits_truncate(mask);
            match publisher.send(flags) {
                Ok(receivers) => trace!(idle = %flags, receivers, "Published idle event"),
                Err(_) => trace!(idle = %flags, "No idle subscribers"),
            }
        });

        Self { monitor, sender }
    }

    /// Raises `flags`. Never blocks.
    pub fn emit(&self, flags: IdleFlags) {
        if !flags.is_empty() {
            self.monitor.signal(flags.bits());
        }
    }

    /// Creates a receiver for all notifications published from now on.
    pub fn subscribe(&self) -> Receiver<IdleFlags> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Flags raised but not yet published.
    pub fn pending(&self) -> IdleFlags {
        IdleFlags::from_bits_truncate(self.monitor.pending())
    }
}

impl fmt::Debug for IdleBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleBus")
            .field("pending", &self.pending())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
