//! In-memory representation of the CAN / CAN-FD frames moved through the
//! routing bus: validated headers, length-class payloads, and the receive
//! and transmit value types.
use embassy_time::Instant;
use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::FrameError;

//==================================================================================MTU

/// Maximum transmission unit of a port, fixed at `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mtu {
    /// Classic CAN, 8 data bytes.
    Classic,
    /// CAN-FD, 64 data bytes.
    Fd,
}

impl From<Mtu> for usize {
    fn from(value: Mtu) -> Self {
        match value {
            Mtu::Classic => 8,
            Mtu::Fd => 64,
        }
    }
}

//==================================================================================FRAME_KIND

/// Identifier width crossed with frame purpose, the four wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    StandardData,
    ExtendedData,
    StandardRemote,
    ExtendedRemote,
}

impl FrameKind {
    /// True for the 29-bit identifier formats.
    pub const fn is_extended(self) -> bool {
        matches!(self, FrameKind::ExtendedData | FrameKind::ExtendedRemote)
    }

    /// True for remote (request) frames, which carry a length but no data.
    pub const fn is_remote(self) -> bool {
        matches!(self, FrameKind::StandardRemote | FrameKind::ExtendedRemote)
    }

    /// Maximum payload length for this kind on a port with the given MTU.
    /// Remote frames are classic-only and cap at 8 regardless of MTU.
    pub const fn max_payload(self, mtu: Mtu) -> usize {
        if self.is_remote() {
            8
        } else {
            match mtu {
                Mtu::Classic => 8,
                Mtu::Fd => 64,
            }
        }
    }
}

//==================================================================================LENGTH_CLASS

/// Validated on-wire data length.
///
/// The hardware length code is linear up to 8 bytes; above that only the
/// quantized classes 12, 16, 20, 24, 32, 48 and 64 exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LengthClass(u8);

impl LengthClass {
    pub const MAX: usize = 64;

    /// Accepts `value` only if it is exactly representable on the wire.
    pub const fn new(value: usize) -> Option<Self> {
        match Self::new_ceil(value) {
            Some(class) => {
                if class.0 as usize == value {
                    Some(class)
                } else {
                    None
                }
            }
            None => None,
        }
    }

    /// Rounds `value` up to the next representable length. The transmit path
    /// uses this and zero-pads the gap. `None` above [`Self::MAX`].
    pub const fn new_ceil(value: usize) -> Option<Self> {
        let class = match value {
            0..=8 => value,
            9..=12 => 12,
            13..=16 => 16,
            17..=20 => 20,
            21..=24 => 24,
            25..=32 => 32,
            33..=48 => 48,
            49..=64 => 64,
            _ => return None,
        };
        Some(Self(class as u8))
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

//==================================================================================PAYLOAD

/// Fixed-size payload buffer carrying a length-class-valid number of bytes.
///
/// Dereferences to the valid prefix. Copied by value into and out of queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    len: u8,
    bytes: [u8; LengthClass::MAX],
}

impl Payload {
    /// Wraps `data` whose length is already a valid length class.
    pub fn new(data: &[u8]) -> Result<Self, FrameError> {
        let class = LengthClass::new(data.len())
            .ok_or(FrameError::NotALengthClass { len: data.len() })?;
        Ok(Self::from_parts(class, data))
    }

    /// Wraps `data`, rounding the length up to the next class and zero-padding
    /// the gap. This is the transmit-path constructor.
    pub fn new_padded(data: &[u8]) -> Result<Self, FrameError> {
        let class = LengthClass::new_ceil(data.len()).ok_or(FrameError::LengthTooLong {
            len: data.len(),
            max: LengthClass::MAX,
        })?;
        Ok(Self::from_parts(class, data))
    }

    pub const fn empty() -> Self {
        Self {
            len: 0,
            bytes: [0; LengthClass::MAX],
        }
    }

    fn from_parts(class: LengthClass, data: &[u8]) -> Self {
        let mut bytes = [0; LengthClass::MAX];
        bytes[..data.len()].copy_from_slice(data);
        Self {
            len: class.as_usize() as u8,
            bytes,
        }
    }

    /// On-wire length class of this payload.
    pub fn class(&self) -> LengthClass {
        // The constructors only store class-valid lengths.
        LengthClass(self.len)
    }
}

impl core::ops::Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..self.len as usize]
    }
}

//==================================================================================HEADER

/// Validated frame header: wire identifier plus the remote flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    id: Id,
    remote: bool,
}

impl FrameHeader {
    /// Builds a header for `kind`, rejecting identifiers that do not fit the
    /// requested width (11 bits standard, 29 bits extended).
    pub fn new(kind: FrameKind, raw_id: u32) -> Result<Self, FrameError> {
        let id = if kind.is_extended() {
            ExtendedId::new(raw_id)
                .map(Id::Extended)
                .ok_or(FrameError::IdOutOfRange { raw: raw_id })?
        } else {
            u16::try_from(raw_id)
                .ok()
                .and_then(StandardId::new)
                .map(Id::Standard)
                .ok_or(FrameError::IdOutOfRange { raw: raw_id })?
        };
        Ok(Self {
            id,
            remote: kind.is_remote(),
        })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Raw identifier bits, right-aligned.
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => u32::from(id.as_raw()),
            Id::Extended(id) => id.as_raw(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match (self.id, self.remote) {
            (Id::Standard(_), false) => FrameKind::StandardData,
            (Id::Extended(_), false) => FrameKind::ExtendedData,
            (Id::Standard(_), true) => FrameKind::StandardRemote,
            (Id::Extended(_), true) => FrameKind::ExtendedRemote,
        }
    }
}

//==================================================================================FRAMES

/// Raw frame as popped from a hardware receive FIFO by the adapter.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedFrame {
    pub header: FrameHeader,
    pub data: Payload,
}

/// Frame accepted by the transmit arbiter. Entering the software ring is a
/// move; leaving it (on a mailbox refill) is a move into the adapter.
#[derive(Debug, Clone, Copy)]
pub struct TxFrame {
    pub header: FrameHeader,
    pub data: Payload,
}

impl TxFrame {
    /// Validates the arguments against the frame kind and the port MTU, then
    /// builds the frame with its length rounded up to a wire class.
    pub fn new(kind: FrameKind, raw_id: u32, data: &[u8], mtu: Mtu) -> Result<Self, FrameError> {
        let max = kind.max_payload(mtu);
        if data.len() > max {
            return Err(FrameError::LengthTooLong {
                len: data.len(),
                max,
            });
        }
        Ok(Self {
            header: FrameHeader::new(kind, raw_id)?,
            data: Payload::new_padded(data)?,
        })
    }
}

/// Transmit-complete record drained from the adapter's event FIFO. The
/// marker is whatever the adapter wrote when the frame was queued.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxEvent {
    pub marker: u8,
}

/// Routed message as delivered to a subscriber queue.
///
/// Immutable once constructed; copied by value through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub header: FrameHeader,
    /// Normalized routing key the message was delivered under. May differ
    /// from the raw identifier when a custom normalizer is installed.
    pub key: u32,
    pub data: Payload,
    /// Arrival time, stamped when the dispatcher popped the frame.
    pub timestamp: Instant,
}

impl Message {
    pub fn kind(&self) -> FrameKind {
        self.header.kind()
    }

    pub fn raw_id(&self) -> u32 {
        self.header.raw_id()
    }
}
