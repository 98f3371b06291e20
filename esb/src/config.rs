//! Engine configuration: the hardware-binding trait and the protocol configuration it is driven
//! by.

use crate::packet::Protocol;
use crate::radio::{Bitrate, Crc, Radio, TxPower};
use crate::time::Timer;
use crate::Error;

/// Trait for engine configurations.
///
/// This trait ties together the hardware-specific types a binding crate supplies: a microsecond
/// time source and the radio/timer/PPI binding itself. Every application binds one concrete type
/// implementing this trait to its [`crate::Engine`].
pub trait Config {
    /// A time source with microsecond resolution.
    type Timer: Timer;

    /// The radio peripheral binding.
    type Radio: Radio;
}

/// Which role the engine plays on the air.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Primary transmitter: initiates exchanges.
    Ptx,
    /// Primary receiver: responds to exchanges.
    Prx,
}

/// Whether `write_payload` should kick off a transmission by itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxMode {
    /// Enqueuing a payload while `Idle` in `Ptx` mode starts a transaction automatically.
    Auto,
    /// The caller must call `start_tx` explicitly.
    Manual,
}

/// Protocol and radio configuration (§3 "Configuration").
#[derive(Copy, Clone, Debug)]
pub struct EsbConfig {
    pub protocol: Protocol,
    pub mode: Mode,
    pub bitrate: Bitrate,
    pub crc: Crc,
    pub tx_power: TxPower,
    /// Fixed payload length, `Protocol::Esb` only.
    pub payload_length: u8,
    pub retransmit_delay_us: u32,
    pub retransmit_count: u16,
    pub tx_mode: TxMode,
    pub selective_auto_ack: bool,
}

impl EsbConfig {
    /// Validates the configuration, enforcing the hardware floor on `retransmit_delay_us` and
    /// the fixed-payload-length bound required by `Protocol::Esb` (§7 "Fatal conditions").
    pub fn validate(&self) -> Result<(), Error> {
        if self.retransmit_delay_us < crate::time::Duration::RETRANSMIT_DELAY_MIN.as_micros() {
            error!(
                "retransmit delay {}us is below the hardware floor of {}us",
                self.retransmit_delay_us,
                crate::time::Duration::RETRANSMIT_DELAY_MIN.as_micros()
            );
            return Err(Error::InvalidArgument);
        }
        if self.protocol == Protocol::Esb
            && (self.payload_length == 0 || self.payload_length as usize > crate::payload::MAX_PAYLOAD)
        {
            error!(
                "fixed payload length {} is invalid for the Esb protocol",
                self.payload_length
            );
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for EsbConfig {
    fn default() -> Self {
        EsbConfig {
            protocol: Protocol::EsbDpl,
            mode: Mode::Ptx,
            bitrate: Bitrate::Mbps2,
            crc: Crc::Bits16,
            tx_power: TxPower::ZerodBm,
            payload_length: 32,
            retransmit_delay_us: 600,
            retransmit_count: 3,
            tx_mode: TxMode::Auto,
            selective_auto_ack: false,
        }
    }
}
