//! A hardware-agnostic Enhanced ShockBurst (ESB) protocol engine.
//!
//! ESB is a half-duplex, addressed, acknowledged-datagram link layer compatible with a widely
//! deployed family of 2.4 GHz packet radios. This crate implements the protocol engine only: the
//! primary/secondary role state machine, retransmit and ACK-timeout handling, the per-pipe
//! duplicate filter, the TX/RX FIFOs, and the ACK-with-payload bookkeeping for the secondary
//! role.
//!
//! # Using the engine
//!
//! This crate is runtime and hardware-agnostic: it does not need an RTOS and provides hardware
//! interfaces that need to be implemented once for every supported radio. You have to provide it
//! with:
//! * A microsecond-precision [`Timer`].
//! * A [`Radio`] binding that can arm transmissions and receptions and report status after a
//!   `DISABLED` event.
//!
//! A binding crate wires a concrete [`Config`] to its chip's radio peripheral, timer and
//! PPI/DPPI fabric, and calls [`Engine::on_radio_disabled`] from its `RADIO` interrupt handler.
//!
//! [`Timer`]: time::Timer
//! [`Radio`]: radio::Radio
//! [`Config`]: config::Config
//! [`Engine`]: engine::Engine

#![no_std]

#[macro_use]
mod log;
pub mod ack;
pub mod config;
pub mod engine;
mod error;
pub mod fifo;
pub mod packet;
pub mod payload;
pub mod pipe;
pub mod radio;
pub mod time;
mod utils;

pub use self::config::Config;
pub use self::engine::Engine;
pub use self::error::Error;
pub use self::payload::Payload;
pub use self::radio::Radio;
pub use self::time::Timer;
