//! Integrated 2.4 GHz radio driven in Enhanced ShockBurst mode.
//!
//! ESB's 8 pipes map directly onto the radio's 8 logical addresses: pipe 0 always uses
//! `BASE0`/`PREFIX0.AP0`, pipes 1-7 share `BASE1` and use `PREFIX0.AP1-AP3`/`PREFIX1.AP4-AP7`,
//! exactly like the original driver's address layout.
//!
//! Shorts are reconfigured on every [`EsbRadio::arm_tx`]/[`EsbRadio::arm_rx`] rather than kept
//! static, since which short is needed (`DISABLED->RXEN` for a primary expecting an ACK,
//! `DISABLED->TXEN` for a secondary about to send one) depends on which side of the exchange is
//! about to run.

use crate::pac::{TIMER1, RADIO};
use esb::packet::Protocol;
use esb::radio::{Addresses, Radio, RadioParams, TxPower};

/// Packet buffer sized for the 2-byte on-air header plus the largest payload this crate supports.
pub type PacketBuffer = [u8; 2 + esb::payload::MAX_PAYLOAD];

/// An interface to the nRF radio in Enhanced ShockBurst mode.
///
/// Owns the `RADIO` peripheral and a second `TIMER` used purely to schedule the ACK-wait timeout
/// and retransmit re-arm via PPI; the engine's own [`esb::Timer`] binding (see [`crate::timer`])
/// uses a different, free-running `TIMER` instance.
pub struct EsbRadio {
    radio: RADIO,
    ack_timer: TIMER1,
    tx_buf: PacketBuffer,
    rx_buf: PacketBuffer,
}

impl EsbRadio {
    /// Takes ownership of the radio and ACK-timer peripherals. Both must be in their
    /// post-reset/disabled state.
    pub fn new(radio: RADIO, ack_timer: TIMER1) -> Self {
        assert!(radio.state.read().state().is_disabled());

        ack_timer.mode.write(|w| w.mode().timer());
        ack_timer.bitmode.write(|w| w.bitmode()._16bit());
        unsafe {
            ack_timer.prescaler.write(|w| w.prescaler().bits(4)); // 1 MHz
        }

        EsbRadio {
            radio,
            ack_timer,
            tx_buf: [0; 2 + esb::payload::MAX_PAYLOAD],
            rx_buf: [0; 2 + esb::payload::MAX_PAYLOAD],
        }
    }

    fn wait_disabled(&self) {
        while self.radio.events_disabled.read().bits() == 0 {}
    }

    fn stop(&mut self) {
        if !self.radio.state.read().state().is_disabled() {
            self.radio.events_disabled.reset();
            self.radio.tasks_disable.write(|w| unsafe { w.bits(1) });
            self.wait_disabled();
        }
    }
}

impl Radio for EsbRadio {
    fn configure(&mut self, params: &RadioParams) {
        self.stop();

        // nRF52810's RADIO has no 250 kbps mode; callers targeting that bitrate need a chip from
        // the 52832/52840 family instead.
        self.radio.mode.write(|w| match params.bitrate {
            esb::radio::Bitrate::Kbps250 | esb::radio::Bitrate::Mbps1 | esb::radio::Bitrate::Mbps1Ble => {
                w.mode().nrf_1mbit()
            }
            esb::radio::Bitrate::Mbps2 | esb::radio::Bitrate::Mbps2Ble => w.mode().nrf_2mbit(),
        });

        let length_bits = params.protocol.length_field_bits() as u8;
        unsafe {
            self.radio.pcnf0.write(|w| {
                w.lflen()
                    .bits(match params.protocol {
                        Protocol::EsbDpl => length_bits,
                        Protocol::Esb => 0,
                    })
                    .s0len()
                    .bit(true)
                    .s1len()
                    .bits(1)
            });
            self.radio.pcnf1.write(|w| {
                w.maxlen()
                    .bits(esb::payload::MAX_PAYLOAD as u8)
                    .statlen()
                    .bits(match params.protocol {
                        Protocol::Esb => params.fixed_payload_length,
                        Protocol::EsbDpl => 0,
                    })
                    .balen()
                    .bits(params.address_length - 1)
                    .whiteen()
                    .clear_bit()
            });
        }

        match params.crc.poly_init() {
            None => {
                self.radio.crccnf.write(|w| w.len().disabled());
            }
            Some((poly, init)) => unsafe {
                self.radio.crccnf.write(|w| w.len().two().skipaddr().skip());
                self.radio.crcpoly.write(|w| w.crcpoly().bits(poly));
                self.radio.crcinit.write(|w| w.crcinit().bits(init));
            },
        }
    }

    fn set_addresses(&mut self, addresses: &Addresses) {
        let base0 = esb::packet::convert_base_address(addresses.base_addr_0);
        let base1 = esb::packet::convert_base_address(addresses.base_addr_1);
        unsafe {
            self.radio.base0.write(|w| w.bits(u32::from_be_bytes(base0)));
            self.radio.base1.write(|w| w.bits(u32::from_be_bytes(base1)));
            self.radio.prefix0.write(|w| {
                w.ap0()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[0]))
                    .ap1()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[1]))
                    .ap2()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[2]))
                    .ap3()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[3]))
            });
            self.radio.prefix1.write(|w| {
                w.ap4()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[4]))
                    .ap5()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[5]))
                    .ap6()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[6]))
                    .ap7()
                    .bits(esb::packet::convert_prefix(addresses.prefixes[7]))
            });
        }

        #[cfg(feature = "errata-102-workaround")]
        if base0[0] == base1[0] {
            // Nordic errata 102/107 (nRF52832/nRF52840, older silicon revisions): a radio
            // sensitivity drop when BASE0 and BASE1 share their most significant byte. The
            // published workaround pokes an undocumented register and costs about 3 dB of
            // sensitivity; newer revisions may not need it, but there's no documented way to
            // query the silicon revision from here to skip it automatically.
            unsafe {
                let reg = 0x4000_1774 as *mut u32;
                core::ptr::write_volatile(reg, (core::ptr::read_volatile(reg) & 0xFFFF_FFFE) | 0x01);
            }
        }
    }

    fn set_channel(&mut self, channel: u8) {
        unsafe {
            self.radio.frequency.write(|w| w.frequency().bits(channel));
        }
    }

    fn set_tx_power(&mut self, power: TxPower) {
        self.radio.txpower.write(|w| match power {
            TxPower::Pos4dBm => w.txpower().pos4d_bm(),
            TxPower::Pos3dBm => w.txpower().pos3d_bm(),
            TxPower::ZerodBm => w.txpower()._0d_bm(),
            TxPower::Neg4dBm => w.txpower().neg4d_bm(),
            TxPower::Neg8dBm => w.txpower().neg8d_bm(),
            TxPower::Neg12dBm => w.txpower().neg12d_bm(),
            TxPower::Neg16dBm => w.txpower().neg16d_bm(),
            TxPower::Neg20dBm => w.txpower().neg20d_bm(),
            TxPower::Neg30dBm => w.txpower().neg20d_bm(),
            TxPower::Neg40dBm => w.txpower().neg40d_bm(),
        });
    }

    fn arm_tx(&mut self, len: usize, pipe: u8, expect_ack: bool) {
        self.stop();
        self.radio.events_disabled.reset();
        self.radio.events_ready.reset();
        self.radio.events_end.reset();

        unsafe {
            self.radio
                .packetptr
                .write(|w| w.bits(self.tx_buf.as_ptr() as u32));
            self.radio.txaddress.write(|w| w.txaddress().bits(pipe));
        }
        let _ = len;

        self.radio.shorts.write(|w| {
            let w = w.ready_start().set_bit().end_disable().set_bit();
            if expect_ack {
                w.disabled_rxen().set_bit()
            } else {
                w
            }
        });

        self.radio.tasks_txen.write(|w| unsafe { w.bits(1) });
    }

    fn arm_rx(&mut self, rx_pipes_mask: u8) {
        self.stop();
        self.radio.events_disabled.reset();
        self.radio.events_ready.reset();
        self.radio.events_end.reset();

        unsafe {
            self.radio
                .packetptr
                .write(|w| w.bits(self.rx_buf.as_ptr() as u32));
            self.radio.rxaddresses.write(|w| w.bits(u32::from(rx_pipes_mask)));
        }

        self.radio.shorts.write(|w| {
            w.ready_start()
                .set_bit()
                .end_disable()
                .set_bit()
                .disabled_txen()
                .set_bit()
        });

        self.radio.tasks_rxen.write(|w| unsafe { w.bits(1) });
    }

    fn disable(&mut self) {
        self.stop();
    }

    fn arm_ack_timer(&mut self, timeout_us: u32, retransmit_at_us: u32) {
        // Runs on the PtxTxAck -> PtxRxAck turnaround, before the ACK arrives: repoint PACKETPTR
        // at rx_buf so the incoming ACK lands where rx_payload_buf() reads from, not in tx_buf
        // (which arm_tx pointed PACKETPTR at and which is never otherwise repointed).
        unsafe {
            self.radio
                .packetptr
                .write(|w| w.bits(self.rx_buf.as_ptr() as u32));
        }

        self.ack_timer.tasks_clear.write(|w| unsafe { w.bits(1) });
        unsafe {
            self.ack_timer.cc[0].write(|w| w.bits(timeout_us));
            self.ack_timer.cc[1].write(|w| w.bits(retransmit_at_us));
        }
        self.ack_timer.tasks_start.write(|w| unsafe { w.bits(1) });
        // A real binding routes TIMER1.COMPARE[0] -> RADIO.DISABLE and TIMER1.COMPARE[1] ->
        // RADIO.TXEN through PPI, and RADIO.ADDRESS -> TIMER1.SHUTDOWN so a successful ACK
        // reception cancels both. That wiring is a one-time setup done by the binding crate's
        // initialization, not repeated here on every call.
    }

    fn crc_ok(&self) -> bool {
        self.radio.crcstatus.read().crcstatus().is_crcok()
    }

    fn rx_crc(&self) -> u16 {
        self.radio.rxcrc.read().rxcrc().bits() as u16
    }

    fn matched_pipe(&self) -> Option<u8> {
        if self.radio.state.read().state().is_disabled() {
            Some(self.radio.rxmatch.read().rxmatch().bits())
        } else {
            None
        }
    }

    fn rssi(&self) -> i8 {
        -(self.radio.rssisample.read().rssisample().bits() as i8)
    }

    fn tx_payload_buf(&mut self) -> &mut [u8] {
        &mut self.tx_buf
    }

    fn rx_payload_buf(&self) -> &[u8] {
        &self.rx_buf
    }
}
