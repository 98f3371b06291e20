//! The payload record exchanged between the engine and its application.

/// Maximum payload length supported by either protocol variant.
///
/// The on-air length field is 6 bits wide when `MAX_PAYLOAD <= 32` and 8 bits wide otherwise
/// (see [`crate::packet`]), so this constant also picks the wire format.
pub const MAX_PAYLOAD: usize = 32;

/// Capacity of the TX FIFO, in payload slots.
pub const TX_FIFO_SIZE: usize = 8;

/// Capacity of the RX FIFO, in payload slots.
pub const RX_FIFO_SIZE: usize = 8;

/// Number of logical pipes (address endpoints) the engine supports.
pub const NUM_PIPES: usize = 8;

/// One payload moving through the TX or RX FIFO.
///
/// `pid` wraps modulo 4 and is assigned by the engine on enqueue (the caller-supplied value is
/// ignored on the way in); on the way out it reflects the PID that was actually transmitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    /// Logical pipe (address endpoint) this payload is associated with.
    pub pipe: u8,
    /// Number of valid bytes in `data`.
    pub length: u8,
    /// 2-bit packet identifier, wraps modulo 4.
    pub pid: u8,
    /// Signal strength sampled by the radio when this payload was received. Only meaningful for
    /// payloads that came out of the RX FIFO.
    pub rssi: i8,
    /// Whether the sender did not request an acknowledgement for this payload.
    pub noack: bool,
    /// Payload bytes. Only the first `length` bytes are valid.
    pub data: [u8; MAX_PAYLOAD],
}

impl Payload {
    /// An empty payload on pipe 0, used to seed FIFO storage and as the default ACK body.
    pub const EMPTY: Self = Payload {
        pipe: 0,
        length: 0,
        pid: 0,
        rssi: 0,
        noack: false,
        data: [0; MAX_PAYLOAD],
    };

    /// Returns the valid portion of `data`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length as usize]
    }
}
