//! Radio abstraction consumed by the engine.
//!
//! This is the hardware interface a binding crate (the nRF5-series binding lives in a sibling
//! crate) must implement. It hides the radio's shorts, PPI/DPPI routing and timer compare
//! channels behind a small set of operations; the engine only ever asks the radio to arm a
//! transmit or receive and to reprogram the ACK-wait timer, and reads back status after a
//! `DISABLED` event.

/// Bitrate the radio is configured for. Determines `wait_for_ack_timeout_us` (§4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bitrate {
    Kbps250,
    Mbps1,
    Mbps1Ble,
    Mbps2,
    Mbps2Ble,
}

impl Bitrate {
    /// Time to wait for an ACK's address match before giving up and retransmitting.
    pub const fn wait_for_ack_timeout_us(self) -> u32 {
        match self {
            Bitrate::Mbps2 | Bitrate::Mbps2Ble => 160,
            Bitrate::Mbps1 | Bitrate::Kbps250 | Bitrate::Mbps1Ble => 300,
        }
    }
}

/// On-air CRC width. Determines the polynomial and initial value the radio peripheral is
/// programmed with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Crc {
    Disabled,
    Bits8,
    Bits16,
}

impl Crc {
    /// `(polynomial, initial value)` for the radio's `CRCPOLY`/`CRCINIT` registers.
    pub const fn poly_init(self) -> Option<(u32, u32)> {
        match self {
            Crc::Disabled => None,
            Crc::Bits8 => Some((0x107, 0xFF)),
            Crc::Bits16 => Some((0x1_1021, 0xFFFF)),
        }
    }
}

/// Transmit power level. Named after the nRF5-series `TXPOWER` register values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxPower {
    Pos4dBm,
    Pos3dBm,
    ZerodBm,
    Neg4dBm,
    Neg8dBm,
    Neg12dBm,
    Neg16dBm,
    Neg20dBm,
    Neg30dBm,
    Neg40dBm,
}

/// Address book programmed into the radio's base-address and prefix registers (§3).
#[derive(Copy, Clone, Debug)]
pub struct Addresses {
    pub base_addr_0: [u8; 4],
    pub base_addr_1: [u8; 4],
    pub prefixes: [u8; 8],
    pub address_length: u8,
}

/// Parameters programmed into the radio's packet-format and CRC registers by
/// [`Radio::configure`].
#[derive(Copy, Clone, Debug)]
pub struct RadioParams {
    pub protocol: crate::packet::Protocol,
    pub crc: Crc,
    pub bitrate: Bitrate,
    pub address_length: u8,
    /// Fixed payload length (`Protocol::Esb` only; ignored for `EsbDpl`).
    pub fixed_payload_length: u8,
}

/// Hardware interface the engine drives.
///
/// Implementations own the radio peripheral, its TX/RX buffers, and the timer/PPI fabric used to
/// schedule the ACK-wait timeout and the retransmit re-arm (§5). `arm_tx`/`arm_rx` install the
/// shorts appropriate to the requested turnaround direction; `READY->START`, `END->DISABLE`,
/// `ADDRESS->RSSISTART` and `DISABLED->RSSISTOP` are always active and are not exposed here.
pub trait Radio {
    /// Programs packet format, CRC and bitrate. Only valid while the engine is `Idle`.
    fn configure(&mut self, params: &RadioParams);

    /// Programs the base addresses and prefixes. Only valid while the engine is `Idle`.
    fn set_addresses(&mut self, addresses: &Addresses);

    /// Selects the RF channel (0..100).
    fn set_channel(&mut self, channel: u8);

    /// Selects the transmit power level.
    fn set_tx_power(&mut self, power: TxPower);

    /// Arms a transmission of the bytes already written to [`Radio::tx_payload_buf`].
    ///
    /// When `expect_ack` is set, the `DISABLED -> RXEN` short is installed so the radio turns
    /// around into receive the instant the transmission ends, and the caller should follow up
    /// with [`Radio::arm_ack_timer`] once the turnaround has begun.
    fn arm_tx(&mut self, len: usize, pipe: u8, expect_ack: bool);

    /// Arms the radio to receive on the pipes selected by `rx_pipes_mask`, with the
    /// `DISABLED -> TXEN` short installed so an accepted packet is immediately followed by
    /// transmitting whatever is in the TX buffer as its ACK.
    fn arm_rx(&mut self, rx_pipes_mask: u8);

    /// Disables the radio. Used both to abort an in-flight operation and, via the configured
    /// shorts, as the event the engine's interrupt handler reacts to.
    fn disable(&mut self);

    /// Arms the two-compare-channel ACK-wait timer: `timeout_us` aborts the receive via PPI if no
    /// address match occurs, `retransmit_at_us` re-triggers `TXEN` via PPI for the next attempt.
    /// The timer is cleared automatically by the radio's `ADDRESS` event.
    fn arm_ack_timer(&mut self, timeout_us: u32, retransmit_at_us: u32);

    /// Whether the last received packet passed its CRC check.
    fn crc_ok(&self) -> bool;

    /// The raw CRC value computed for the last received packet, used for duplicate detection
    /// alongside the packet ID (§4.4).
    fn rx_crc(&self) -> u16;

    /// Which pipe the last received packet matched, if any.
    fn matched_pipe(&self) -> Option<u8>;

    /// RSSI sampled for the last received packet, in dBm.
    fn rssi(&self) -> i8;

    /// Mutable access to the radio's TX buffer, for the codec to write into.
    fn tx_payload_buf(&mut self) -> &mut [u8];

    /// Read-only access to the radio's RX buffer, for the codec to parse.
    fn rx_payload_buf(&self) -> &[u8];
}
