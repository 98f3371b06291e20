//! The primary/secondary role state machine and the public control surface built on top of it.

use crate::ack::AckRegistry;
use crate::config::{Config, EsbConfig, Mode, TxMode};
use crate::fifo::Fifo;
use crate::packet::{self, Protocol};
use crate::payload::{Payload, MAX_PAYLOAD, NUM_PIPES, RX_FIFO_SIZE, TX_FIFO_SIZE};
use crate::pipe::PipeTable;
use crate::radio::{Addresses, Bitrate, Radio, RadioParams, TxPower};
use crate::Error;

bitflags::bitflags! {
    /// Events the engine-event handler drains and reports to the application.
    ///
    /// Set by the radio interrupt handler (`on_radio_disabled`), cleared by
    /// [`Engine::drain_events`], which models the lower-priority "engine-event IRQ" of §5: the
    /// radio path stays bounded and deterministic, and user callbacks run outside of it.
    pub struct EventFlags: u8 {
        const TX_SUCCESS = 1 << 0;
        const TX_FAILED = 1 << 1;
        const RX_RECEIVED = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    PtxTxNoAck,
    PtxTxAck,
    PtxRxAck,
    Prx,
    PrxSendAck,
}

/// The ESB protocol engine: one instance owns exactly one radio peripheral (§3 "Engine state").
pub struct Engine<C: Config> {
    radio: C::Radio,
    #[allow(dead_code)]
    timer: C::Timer,
    initialized: bool,
    state: State,
    config: EsbConfig,
    addresses: Addresses,
    channel: u8,
    rx_pipes_enabled: u8,
    retransmits_remaining: u16,
    tx_fifo: Fifo<TX_FIFO_SIZE>,
    rx_fifo: Fifo<RX_FIFO_SIZE>,
    ack_registry: AckRegistry,
    pipes: PipeTable,
    pending_events: EventFlags,
    last_tx_attempts: u16,
}

impl<C: Config> Engine<C> {
    /// Creates an uninitialized engine bound to `radio`/`timer`. Call [`Engine::init`] before
    /// using it.
    pub fn new(radio: C::Radio, timer: C::Timer) -> Self {
        Engine {
            radio,
            timer,
            initialized: false,
            state: State::Idle,
            config: EsbConfig::default(),
            addresses: Addresses {
                base_addr_0: [0; 4],
                base_addr_1: [0; 4],
                prefixes: [0; 8],
                address_length: 5,
            },
            channel: 0,
            rx_pipes_enabled: 0x3F,
            retransmits_remaining: 0,
            tx_fifo: Fifo::new(),
            rx_fifo: Fifo::new(),
            ack_registry: AckRegistry::new(),
            pipes: PipeTable::new(),
            pending_events: EventFlags::empty(),
            last_tx_attempts: 0,
        }
    }

    fn require_initialized(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn require_idle(&self) -> Result<(), Error> {
        if self.state == State::Idle {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    /// Whether the engine is in the `Idle` state (§6).
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Direct access to the bound radio.
    ///
    /// The binding crate's interrupt handler does not need this (the engine drives the radio
    /// internally), but a host test harness driving a mock radio does.
    pub fn radio_mut(&mut self) -> &mut C::Radio {
        &mut self.radio
    }

    /// Validates `config`/`addresses`/`channel`, programs the radio, and resets all engine state.
    pub fn init(
        &mut self,
        config: EsbConfig,
        addresses: Addresses,
        channel: u8,
    ) -> Result<(), Error> {
        config.validate()?;
        if channel > 100 {
            return Err(Error::InvalidArgument);
        }

        self.config = config;
        self.addresses = addresses;
        self.channel = channel;
        self.tx_fifo.clear();
        self.rx_fifo.clear();
        self.ack_registry.clear();
        self.pipes.reset();
        self.pending_events = EventFlags::empty();
        self.state = State::Idle;

        self.radio.configure(&RadioParams {
            protocol: config.protocol,
            crc: config.crc,
            bitrate: config.bitrate,
            address_length: addresses.address_length,
            fixed_payload_length: config.payload_length,
        });
        self.radio.set_addresses(&self.addresses);
        self.radio.set_channel(channel);
        self.radio.set_tx_power(config.tx_power);
        self.initialized = true;

        debug!("esb engine initialized: {:?}", config.mode);

        if config.mode == Mode::Prx {
            self.enter_prx();
        }
        Ok(())
    }

    /// Stops the radio, disables IRQs (conceptually — the caller's interrupt masking is
    /// responsible for the real effect) and clears all engine state, including FIFOs and pipe
    /// info.
    pub fn disable(&mut self) {
        self.radio.disable();
        self.initialized = false;
        self.state = State::Idle;
        self.tx_fifo.clear();
        self.rx_fifo.clear();
        self.ack_registry.clear();
        self.pipes.reset();
        self.pending_events = EventFlags::empty();
    }

    /// Detaches event routing while remaining initialized. Only valid while `Idle`.
    pub fn suspend(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        self.require_idle()?;
        self.radio.disable();
        Ok(())
    }

    /// Enqueues `payload` for transmission (PTX) or as a future ACK payload (PRX).
    pub fn write_payload(&mut self, mut payload: Payload) -> Result<(), Error> {
        self.require_initialized()?;
        if payload.length == 0 {
            return Err(Error::InvalidArgument);
        }
        if payload.length as usize > MAX_PAYLOAD {
            return Err(Error::MessageTooLarge);
        }
        if self.config.protocol == Protocol::Esb && payload.length > self.config.payload_length {
            return Err(Error::MessageTooLarge);
        }
        if payload.pipe as usize >= NUM_PIPES {
            return Err(Error::InvalidArgument);
        }

        match self.config.mode {
            Mode::Ptx => {
                if self.tx_fifo.is_full() {
                    warn!("tx fifo full, dropping write_payload on pipe {}", payload.pipe);
                    return Err(Error::QueueFull);
                }
                payload.pid = self.pipes.next_pid(payload.pipe);
                self.tx_fifo.push_back(payload);
                if self.config.tx_mode == TxMode::Auto && self.state == State::Idle {
                    self.start_tx_locked();
                }
            }
            Mode::Prx => {
                if self.ack_registry.is_full() {
                    return Err(Error::QueueFull);
                }
                payload.pid = self.pipes.next_pid(payload.pipe);
                self.ack_registry.push(payload.pipe, payload);
            }
        }
        Ok(())
    }

    /// Pops one payload from the RX FIFO.
    pub fn read_rx_payload(&mut self) -> Result<Payload, Error> {
        self.require_initialized()?;
        self.rx_fifo.pop_front().ok_or(Error::QueueEmpty)
    }

    /// Manually starts a transmit transaction. Only valid while `Idle` with queued data.
    pub fn start_tx(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        self.require_idle()?;
        if self.tx_fifo.is_empty() {
            return Err(Error::QueueEmpty);
        }
        self.start_tx_locked();
        Ok(())
    }

    /// Enters `Prx`. Only valid while `Idle`.
    pub fn start_rx(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        self.require_idle()?;
        self.enter_prx();
        Ok(())
    }

    /// Leaves `Prx`/`PrxSendAck` and returns to `Idle`, busy-waiting briefly for the radio to
    /// settle after disabling (§5 "Suspension points").
    pub fn stop_rx(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        if !matches!(self.state, State::Prx | State::PrxSendAck) {
            return Err(Error::Busy);
        }
        self.radio.disable();
        self.state = State::Idle;
        Ok(())
    }

    pub fn flush_tx(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        self.tx_fifo.clear();
        Ok(())
    }

    pub fn flush_rx(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        self.rx_fifo.clear();
        Ok(())
    }

    /// Removes and returns the most recently enqueued (not yet transmitted) TX FIFO entry.
    pub fn pop_tx(&mut self) -> Result<Payload, Error> {
        self.require_initialized()?;
        self.tx_fifo.remove_last().ok_or(Error::QueueEmpty)
    }

    /// Decrements `pipe`'s PID counter by one so the next enqueue reuses the last assigned PID.
    pub fn reuse_pid(&mut self, pipe: u8) -> Result<(), Error> {
        self.require_idle()?;
        if pipe as usize >= NUM_PIPES {
            return Err(Error::InvalidArgument);
        }
        self.pipes.reuse_pid(pipe);
        Ok(())
    }

    pub fn set_rf_channel(&mut self, channel: u8) -> Result<(), Error> {
        self.require_idle()?;
        if channel > 100 {
            return Err(Error::InvalidArgument);
        }
        self.channel = channel;
        self.radio.set_channel(channel);
        Ok(())
    }

    pub fn rf_channel(&self) -> u8 {
        self.channel
    }

    pub fn set_tx_power(&mut self, power: TxPower) -> Result<(), Error> {
        self.require_idle()?;
        self.config.tx_power = power;
        self.radio.set_tx_power(power);
        Ok(())
    }

    pub fn set_bitrate(&mut self, bitrate: Bitrate) -> Result<(), Error> {
        self.require_idle()?;
        self.config.bitrate = bitrate;
        self.reprogram_radio();
        Ok(())
    }

    pub fn set_retransmit_delay(&mut self, delay_us: u32) -> Result<(), Error> {
        self.require_idle()?;
        if delay_us < crate::time::Duration::RETRANSMIT_DELAY_MIN.as_micros() {
            return Err(Error::InvalidArgument);
        }
        self.config.retransmit_delay_us = delay_us;
        Ok(())
    }

    pub fn set_retransmit_count(&mut self, count: u16) -> Result<(), Error> {
        self.require_idle()?;
        self.config.retransmit_count = count;
        Ok(())
    }

    pub fn set_address_length(&mut self, length: u8) -> Result<(), Error> {
        self.require_idle()?;
        if !(3..=5).contains(&length) {
            return Err(Error::InvalidArgument);
        }
        self.addresses.address_length = length;
        self.reprogram_radio();
        self.radio.set_addresses(&self.addresses);
        Ok(())
    }

    pub fn set_base_address_0(&mut self, addr: [u8; 4]) -> Result<(), Error> {
        self.require_idle()?;
        self.addresses.base_addr_0 = addr;
        self.radio.set_addresses(&self.addresses);
        Ok(())
    }

    pub fn set_base_address_1(&mut self, addr: [u8; 4]) -> Result<(), Error> {
        self.require_idle()?;
        self.addresses.base_addr_1 = addr;
        self.radio.set_addresses(&self.addresses);
        Ok(())
    }

    pub fn set_prefixes(&mut self, prefixes: [u8; 8]) -> Result<(), Error> {
        self.require_idle()?;
        self.addresses.prefixes = prefixes;
        self.radio.set_addresses(&self.addresses);
        Ok(())
    }

    /// Updates a single pipe's address prefix (`esb_update_prefix` in the original driver).
    pub fn update_prefix(&mut self, pipe: u8, prefix: u8) -> Result<(), Error> {
        self.require_idle()?;
        if pipe as usize >= NUM_PIPES {
            return Err(Error::InvalidArgument);
        }
        self.addresses.prefixes[pipe as usize] = prefix;
        self.radio.set_addresses(&self.addresses);
        Ok(())
    }

    pub fn enable_pipes(&mut self, mask: u8) -> Result<(), Error> {
        self.require_idle()?;
        self.rx_pipes_enabled = mask;
        Ok(())
    }

    fn reprogram_radio(&mut self) {
        self.radio.configure(&RadioParams {
            protocol: self.config.protocol,
            crc: self.config.crc,
            bitrate: self.config.bitrate,
            address_length: self.addresses.address_length,
            fixed_payload_length: self.config.payload_length,
        });
    }

    /// Drains and clears the pending event bitset, along with the attempt count of the most
    /// recently completed transmission. Modeled as the body of the lower-priority
    /// "engine-event IRQ" from §5.
    pub fn drain_events(&mut self) -> (EventFlags, u16) {
        let events = self.pending_events;
        let attempts = self.last_tx_attempts;
        self.pending_events = EventFlags::empty();
        (events, attempts)
    }

    fn enter_prx(&mut self) {
        info!("entering prx, listening on pipe mask {:#04x}", self.rx_pipes_enabled);
        self.radio.arm_rx(self.rx_pipes_enabled);
        self.state = State::Prx;
    }

    fn load_tx_buffer(&mut self, payload: &Payload) -> usize {
        // write_payload() already rejected any payload too long for MAX_PAYLOAD or (in Esb mode)
        // for the fixed payload length, and neither bound can change out from under a queued
        // payload since changing them requires re-init(), which clears the tx fifo. encode() can't
        // fail here.
        packet::encode(
            self.config.protocol,
            self.config.payload_length,
            payload,
            self.radio.tx_payload_buf(),
        )
        .expect("tx fifo payload violates an invariant enforced at write_payload()")
    }

    fn start_tx_locked(&mut self) {
        let payload = *self.tx_fifo.peek_front().expect("tx fifo non-empty");
        let len = self.load_tx_buffer(&payload);

        let fire_and_forget = self.config.protocol == Protocol::EsbDpl
            && payload.noack
            && self.config.selective_auto_ack;

        if fire_and_forget {
            self.radio.arm_tx(len, payload.pipe, false);
            self.state = State::PtxTxNoAck;
        } else {
            self.retransmits_remaining = self.config.retransmit_count;
            self.radio.arm_tx(len, payload.pipe, true);
            self.state = State::PtxTxAck;
        }
    }

    /// Starts the next queued transaction if one is pending and `tx_mode` is `Auto`, else returns
    /// to `Idle`.
    fn continue_or_idle(&mut self) {
        if !self.tx_fifo.is_empty() && self.config.tx_mode == TxMode::Auto {
            self.start_tx_locked();
        } else {
            self.state = State::Idle;
        }
    }

    /// Reacts to the radio's `DISABLED` event. This is the engine's half of the radio interrupt
    /// handler (§5): the binding crate's ISR calls this after clearing the hardware event.
    pub fn on_radio_disabled(&mut self) {
        match self.state {
            State::Idle => {
                // Spurious: nothing in flight.
            }
            State::PtxTxNoAck => {
                self.tx_fifo.pop_front();
                self.last_tx_attempts = 1;
                self.pending_events.insert(EventFlags::TX_SUCCESS);
                self.continue_or_idle();
            }
            State::PtxTxAck => {
                // The DISABLED->RXEN short has already started the turnaround; arm the ACK-wait
                // timer now that the receive side is ramping up.
                self.state = State::PtxRxAck;
                let timeout = self.config.bitrate.wait_for_ack_timeout_us();
                let retransmit_at = self.config.retransmit_delay_us.saturating_sub(130);
                self.radio.arm_ack_timer(timeout, retransmit_at);
            }
            State::PtxRxAck => self.on_ptx_rx_ack_disabled(),
            State::Prx => self.on_prx_disabled(),
            State::PrxSendAck => {
                self.radio.arm_rx(self.rx_pipes_enabled);
                self.state = State::Prx;
            }
        }
    }

    fn on_ptx_rx_ack_disabled(&mut self) {
        if self.radio.crc_ok() {
            let attempts = self.config.retransmit_count - self.retransmits_remaining + 1;
            self.last_tx_attempts = attempts;

            if self.config.protocol == Protocol::EsbDpl {
                let pipe = self.tx_fifo.peek_front().map(|p| p.pipe).unwrap_or(0);
                let rssi = self.radio.rssi();
                let rx_buf = self.radio.rx_payload_buf();
                if let Some(ack_payload) = packet::decode(Protocol::EsbDpl, 0, pipe, rssi, rx_buf) {
                    if ack_payload.length > 0 {
                        let _ = self.rx_fifo.push_back(ack_payload);
                        self.pending_events.insert(EventFlags::RX_RECEIVED);
                    }
                }
            }

            self.tx_fifo.pop_front();
            self.pending_events.insert(EventFlags::TX_SUCCESS);
            self.continue_or_idle();
            return;
        }

        if self.retransmits_remaining == 0 {
            debug!("tx failed after {} attempts", self.config.retransmit_count + 1);
            self.last_tx_attempts = self.config.retransmit_count + 1;
            self.tx_fifo.pop_front();
            self.pending_events.insert(EventFlags::TX_FAILED);
            self.continue_or_idle();
            return;
        }

        self.retransmits_remaining -= 1;
        trace!("no ack, retransmitting ({} left)", self.retransmits_remaining);
        let payload = *self.tx_fifo.peek_front().expect("tx fifo non-empty");
        let len = self.load_tx_buffer(&payload);
        self.radio.arm_tx(len, payload.pipe, true);
        self.state = State::PtxTxAck;
    }

    fn on_prx_disabled(&mut self) {
        if !self.radio.crc_ok() {
            self.enter_prx();
            return;
        }

        let pipe = self.radio.matched_pipe().unwrap_or(0);
        let rssi = self.radio.rssi();
        let mut raw = [0u8; MAX_PAYLOAD + 2];
        let rx_buf = self.radio.rx_payload_buf();
        let n = rx_buf.len().min(raw.len());
        raw[..n].copy_from_slice(&rx_buf[..n]);

        let decoded = packet::decode(self.config.protocol, self.config.payload_length, pipe, rssi, &raw[..n]);
        let payload = match decoded {
            Some(p) => p,
            None => {
                self.enter_prx();
                return;
            }
        };

        let crc = self.radio.rx_crc();
        let is_duplicate = self.pipes.info(pipe).is_duplicate(crc, payload.pid);
        self.pipes.info_mut(pipe).accept(crc, payload.pid);

        if !is_duplicate {
            if self.rx_fifo.is_full() {
                warn!("rx fifo full, dropping packet on pipe {}", pipe);
                self.enter_prx();
                return;
            }
            trace!(
                "received {} bytes on pipe {}: {:?}",
                payload.length,
                pipe,
                crate::utils::HexSlice(&payload.data[..payload.length as usize])
            );
            self.rx_fifo.push_back(payload);
            self.pending_events.insert(EventFlags::RX_RECEIVED);
        } else {
            trace!("duplicate packet on pipe {}, suppressing rx event", pipe);
        }

        let ack_requested = !self.config.selective_auto_ack || !payload.noack;
        if !ack_requested {
            self.enter_prx();
            return;
        }

        self.prepare_ack(pipe, &payload, is_duplicate);
        self.state = State::PrxSendAck;
    }

    /// Builds the ACK for `received` on `pipe` and arms the radio to transmit it (§4.5).
    ///
    /// The ACK's own PID/noack bits always mirror the packet it is acknowledging; only its
    /// payload bytes (ESB-DPL only) come from the per-pipe ACK-payload registry.
    fn prepare_ack(&mut self, pipe: u8, received: &Payload, is_duplicate: bool) {
        let mut ack_payload = Payload::EMPTY;
        ack_payload.pipe = pipe;
        ack_payload.pid = received.pid;
        ack_payload.noack = received.noack;

        if self.config.protocol == Protocol::EsbDpl {
            let had_payload_in_flight = self.pipes.info(pipe).ack_payload_in_flight;
            if had_payload_in_flight && !is_duplicate {
                self.ack_registry.pop(pipe);
                self.pending_events.insert(EventFlags::TX_SUCCESS);
            }

            if let Some(head) = self.ack_registry.peek(pipe) {
                ack_payload.length = head.length;
                ack_payload.data = head.data;
                self.pipes.info_mut(pipe).ack_payload_in_flight = true;
            } else {
                self.pipes.info_mut(pipe).ack_payload_in_flight = false;
            }
        }

        let len = self.load_tx_buffer(&ack_payload);
        self.radio.arm_tx(len, pipe, false);
    }
}
