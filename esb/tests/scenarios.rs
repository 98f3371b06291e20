//! End-to-end scenario tests driving a pair of engines against a simulated air interface.
//!
//! Each test instantiates a primary (`Ptx`) and/or secondary (`Prx`) [`esb::Engine`] bound to a
//! [`MockRadio`] and steps them by hand: capture whatever the engine wrote into its radio's TX
//! buffer, hand those bytes to the other side's RX buffer (or drop them, to simulate a lost
//! packet), and call `on_radio_disabled` to let the state machine react — exactly the sequence a
//! real `RADIO` interrupt handler would drive, minus the hardware.
//!
//! A full transmit attempt is two `on_radio_disabled` calls: the first reacts to the transmit
//! ending (arms the ACK-wait timer), the second reacts to either the ACK's reception or the
//! timeout.

use esb::ack::AckRegistry;
use esb::config::{Config, EsbConfig, Mode, TxMode};
use esb::engine::{Engine, EventFlags};
use esb::packet::Protocol;
use esb::payload::Payload;
use esb::radio::{Addresses, Bitrate, Crc, Radio, RadioParams, TxPower};
use esb::time::{Instant, Timer};

struct MockRadio {
    tx_buf: [u8; 34],
    rx_buf: [u8; 34],
    tx_len: usize,
    crc_ok: bool,
    rx_crc: u16,
    matched_pipe: Option<u8>,
    rssi: i8,
}

impl MockRadio {
    fn new() -> Self {
        MockRadio {
            tx_buf: [0; 34],
            rx_buf: [0; 34],
            tx_len: 0,
            crc_ok: false,
            rx_crc: 0,
            matched_pipe: None,
            rssi: -40,
        }
    }
}

impl Radio for MockRadio {
    fn configure(&mut self, _params: &RadioParams) {}
    fn set_addresses(&mut self, _addresses: &Addresses) {}
    fn set_channel(&mut self, _channel: u8) {}
    fn set_tx_power(&mut self, _power: TxPower) {}

    fn arm_tx(&mut self, len: usize, _pipe: u8, _expect_ack: bool) {
        self.tx_len = len;
    }

    fn arm_rx(&mut self, _rx_pipes_mask: u8) {}
    fn disable(&mut self) {}
    fn arm_ack_timer(&mut self, _timeout_us: u32, _retransmit_at_us: u32) {}

    fn crc_ok(&self) -> bool {
        self.crc_ok
    }

    fn rx_crc(&self) -> u16 {
        self.rx_crc
    }

    fn matched_pipe(&self) -> Option<u8> {
        self.matched_pipe
    }

    fn rssi(&self) -> i8 {
        self.rssi
    }

    fn tx_payload_buf(&mut self) -> &mut [u8] {
        &mut self.tx_buf
    }

    fn rx_payload_buf(&self) -> &[u8] {
        &self.rx_buf
    }
}

struct MockTimer;

impl Timer for MockTimer {
    fn now(&self) -> Instant {
        Instant::from_raw_micros(0)
    }
}

struct TestConfig;

impl Config for TestConfig {
    type Timer = MockTimer;
    type Radio = MockRadio;
}

/// Stand-in for the radio's hardware CRC, used only so the test harness can feed a duplicate
/// filter realistic "did these bytes change" values. The exact polynomial is irrelevant.
fn fake_crc(buf: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in buf {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn addresses() -> Addresses {
    Addresses {
        base_addr_0: [0xE7, 0xE7, 0xE7, 0xE7],
        base_addr_1: [0xC2, 0xC2, 0xC2, 0xC2],
        prefixes: [0xE7, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8],
        address_length: 5,
    }
}

fn config(
    protocol: Protocol,
    mode: Mode,
    retransmit_count: u16,
    retransmit_delay_us: u32,
) -> EsbConfig {
    EsbConfig {
        protocol,
        mode,
        bitrate: Bitrate::Mbps2,
        crc: Crc::Bits16,
        tx_power: TxPower::ZerodBm,
        payload_length: 8,
        retransmit_delay_us,
        retransmit_count,
        tx_mode: TxMode::Auto,
        selective_auto_ack: false,
    }
}

fn make_payload(pipe: u8, data: &[u8]) -> Payload {
    let mut p = Payload::EMPTY;
    p.pipe = pipe;
    p.length = data.len() as u8;
    p.data[..data.len()].copy_from_slice(data);
    p
}

/// Delivers the bytes currently sitting in `from`'s TX buffer to `to`'s RX buffer as a
/// good-CRC reception matched on `pipe`.
fn deliver(from: &mut Engine<TestConfig>, to: &mut Engine<TestConfig>, pipe: u8) {
    let (buf, len) = {
        let r = from.radio_mut();
        (r.tx_buf, r.tx_len)
    };
    let r = to.radio_mut();
    r.rx_buf[..len].copy_from_slice(&buf[..len]);
    r.crc_ok = true;
    r.rx_crc = fake_crc(&buf[..len]);
    r.matched_pipe = Some(pipe);
}

/// S1: ACK never arrives. Exactly `retransmit_count + 1` attempts occur and exactly one
/// TX_FAILED fires with `tx_attempts = retransmit_count + 1`.
#[test]
fn s1_exhausts_retransmits_and_reports_tx_failed() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::EsbDpl, Mode::Ptx, 2, 600), addresses(), 40)
        .unwrap();
    ptx.write_payload(make_payload(0, &[0xAA, 0xBB, 0xCC])).unwrap();

    let mut attempts = 0;
    loop {
        attempts += 1;
        ptx.on_radio_disabled(); // TX ends, ACK-wait timer armed
        ptx.radio_mut().crc_ok = false; // ACK never arrives
        ptx.on_radio_disabled(); // ACK-wait times out
        let (events, tx_attempts) = ptx.drain_events();
        if !events.is_empty() {
            assert_eq!(events, EventFlags::TX_FAILED);
            assert_eq!(tx_attempts, 3);
            break;
        }
        assert!(attempts <= 10, "runaway retransmit loop");
    }
    assert_eq!(attempts, 3);
    assert!(ptx.is_idle());
}

/// S2: secondary ACKs with an empty payload on the second receive attempt. Two transmissions
/// occur; one TX_SUCCESS fires with `tx_attempts = 2`.
#[test]
fn s2_success_on_second_attempt() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::EsbDpl, Mode::Ptx, 2, 600), addresses(), 40)
        .unwrap();
    ptx.write_payload(make_payload(0, &[1, 2, 3])).unwrap();

    let mut attempts = 0;
    loop {
        attempts += 1;
        ptx.on_radio_disabled();
        if attempts == 2 {
            let r = ptx.radio_mut();
            r.crc_ok = true;
            r.rx_buf[0] = 0; // empty ACK payload (length byte 0)
            r.rx_buf[1] = 0;
        } else {
            ptx.radio_mut().crc_ok = false;
        }
        ptx.on_radio_disabled();
        let (events, tx_attempts) = ptx.drain_events();
        if events.contains(EventFlags::TX_SUCCESS) {
            assert_eq!(tx_attempts, 2);
            break;
        }
        assert!(events.is_empty());
        assert!(attempts <= 5, "runaway retransmit loop");
    }
    assert_eq!(attempts, 2);
    assert!(ptx.is_idle());
}

/// S3: ESB fixed-length mode, full primary/secondary round trip, single attempt.
#[test]
fn s3_fixed_length_round_trip_single_attempt() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::Esb, Mode::Ptx, 2, 600), addresses(), 40)
        .unwrap();

    let mut prx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    prx.init(config(Protocol::Esb, Mode::Prx, 2, 600), addresses(), 40)
        .unwrap();

    let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
    ptx.write_payload(make_payload(2, &data)).unwrap();

    ptx.on_radio_disabled(); // TX ends -> PtxRxAck
    deliver(&mut ptx, &mut prx, 2);
    prx.on_radio_disabled(); // Prx -> PrxSendAck
    deliver(&mut prx, &mut ptx, 2);
    prx.on_radio_disabled(); // PrxSendAck -> Prx
    ptx.on_radio_disabled(); // PtxRxAck -> success

    let (events, attempts) = ptx.drain_events();
    assert_eq!(events, EventFlags::TX_SUCCESS);
    assert_eq!(attempts, 1);

    let (prx_events, _) = prx.drain_events();
    assert_eq!(prx_events, EventFlags::RX_RECEIVED);

    let received = prx.read_rx_payload().unwrap();
    assert_eq!(received.pipe, 2);
    assert_eq!(received.length, 8);
    assert_eq!(received.as_bytes(), &data);
}

/// S4: secondary pre-loads ACK payloads `[P1, P2]` on pipe 1; primary sends two packets, both
/// ACKed. A confirming third exchange (not spelled out in the two-packet scenario) is required
/// to pop the final registry entry — see the matching Open Question entry in DESIGN.md: an
/// ACK payload's delivery is confirmed only by the *next* non-duplicate reception, the same way
/// the original driver infers it, since there is no ACK-of-ACK.
#[test]
fn s4_preloaded_ack_payloads_delivered_in_order() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::EsbDpl, Mode::Ptx, 2, 600), addresses(), 40)
        .unwrap();
    let mut prx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    prx.init(config(Protocol::EsbDpl, Mode::Prx, 2, 600), addresses(), 40)
        .unwrap();

    prx.write_payload(make_payload(1, &[0xA1])).unwrap(); // P1
    prx.write_payload(make_payload(1, &[0xA2])).unwrap(); // P2

    let round = |ptx: &mut Engine<TestConfig>, prx: &mut Engine<TestConfig>, data: &[u8]| {
        ptx.write_payload(make_payload(1, data)).unwrap();
        ptx.on_radio_disabled();
        deliver(ptx, prx, 1);
        prx.on_radio_disabled();
        deliver(prx, ptx, 1);
        prx.on_radio_disabled();
        ptx.on_radio_disabled();
    };

    round(&mut ptx, &mut prx, &[1]);
    let received1 = ptx.read_rx_payload().unwrap();
    assert_eq!(received1.as_bytes(), &[0xA1]);

    round(&mut ptx, &mut prx, &[2]);
    let received2 = ptx.read_rx_payload().unwrap();
    assert_eq!(received2.as_bytes(), &[0xA2]);
    let (prx_events, _) = prx.drain_events();
    assert!(prx_events.contains(EventFlags::TX_SUCCESS));

    round(&mut ptx, &mut prx, &[3]);
    assert!(ptx.read_rx_payload().is_err()); // third ACK carries no payload
    let (prx_events, _) = prx.drain_events();
    assert!(prx_events.contains(EventFlags::TX_SUCCESS));
}

/// S5: secondary has ACK payload P1 on pipe 0; the first ACK is lost, the retransmission's ACK
/// arrives. The secondary sees one RX_RECEIVED (the duplicate is suppressed); the primary sees
/// one RX_RECEIVED of P1.
#[test]
fn s5_duplicate_suppressed_ack_payload_redelivered_on_retransmit() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::EsbDpl, Mode::Ptx, 3, 600), addresses(), 40)
        .unwrap();
    let mut prx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    prx.init(config(Protocol::EsbDpl, Mode::Prx, 3, 600), addresses(), 40)
        .unwrap();

    prx.write_payload(make_payload(0, &[0xAA])).unwrap(); // P1

    ptx.write_payload(make_payload(0, &[7])).unwrap();

    // Attempt 1: ACK (with P1) is lost.
    ptx.on_radio_disabled();
    deliver(&mut ptx, &mut prx, 0);
    prx.on_radio_disabled();
    let (prx_events, _) = prx.drain_events();
    assert!(prx_events.contains(EventFlags::RX_RECEIVED));
    // Don't deliver the ACK back; the primary's wait simply times out.
    prx.on_radio_disabled(); // PrxSendAck -> Prx (ack "transmitted", but lost in the air)
    ptx.radio_mut().crc_ok = false;
    ptx.on_radio_disabled(); // timeout, retransmit with the same PID

    // Attempt 2: same packet (duplicate on the secondary); this time the ACK arrives.
    ptx.on_radio_disabled();
    deliver(&mut ptx, &mut prx, 0);
    prx.on_radio_disabled();
    let (prx_events, _) = prx.drain_events();
    assert!(prx_events.is_empty(), "duplicate must not raise a second RX_RECEIVED");
    deliver(&mut prx, &mut ptx, 0);
    prx.on_radio_disabled();
    ptx.on_radio_disabled();

    let (ptx_events, _) = ptx.drain_events();
    assert!(ptx_events.contains(EventFlags::TX_SUCCESS));
    assert!(ptx_events.contains(EventFlags::RX_RECEIVED));
    let ack_payload = ptx.read_rx_payload().unwrap();
    assert_eq!(ack_payload.as_bytes(), &[0xAA]);
    assert!(ptx.read_rx_payload().is_err(), "only one RX_RECEIVED of P1");

    // A following, genuinely new reception confirms delivery of P1 and pops it.
    ptx.write_payload(make_payload(0, &[8])).unwrap();
    ptx.on_radio_disabled();
    deliver(&mut ptx, &mut prx, 0);
    prx.on_radio_disabled();
    let (prx_events, _) = prx.drain_events();
    assert!(prx_events.contains(EventFlags::TX_SUCCESS));
}

/// S6: `write_payload` input validation.
#[test]
fn s6_rejects_zero_length_and_oversized_payloads() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::EsbDpl, Mode::Ptx, 2, 600), addresses(), 40)
        .unwrap();

    let mut zero = Payload::EMPTY;
    zero.pipe = 0;
    zero.length = 0;
    assert_eq!(ptx.write_payload(zero), Err(esb::Error::InvalidArgument));

    let mut oversized = Payload::EMPTY;
    oversized.pipe = 0;
    oversized.length = (esb::payload::MAX_PAYLOAD + 1) as u8;
    assert_eq!(ptx.write_payload(oversized), Err(esb::Error::MessageTooLarge));
}

/// In fixed-length `Esb` mode a payload longer than the configured fixed length is rejected at
/// enqueue time rather than silently truncated to a zero-length frame.
#[test]
fn s6b_rejects_payload_longer_than_fixed_length() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    ptx.init(config(Protocol::Esb, Mode::Ptx, 2, 600), addresses(), 40)
        .unwrap();

    let mut fits = Payload::EMPTY;
    fits.pipe = 0;
    fits.length = 8;
    assert_eq!(ptx.write_payload(fits), Ok(()));

    let mut too_long = Payload::EMPTY;
    too_long.pipe = 0;
    too_long.length = 9;
    assert_eq!(ptx.write_payload(too_long), Err(esb::Error::MessageTooLarge));
}

/// FIFO bound (universal invariant #6): once the TX FIFO holds `TX_FIFO_SIZE` elements, further
/// enqueues return `queue-full`.
#[test]
fn tx_fifo_rejects_once_full() {
    let mut ptx = Engine::<TestConfig>::new(MockRadio::new(), MockTimer);
    let mut cfg = config(Protocol::EsbDpl, Mode::Ptx, 2, 600);
    cfg.tx_mode = TxMode::Manual; // keep enqueues from draining the FIFO via auto-start
    ptx.init(cfg, addresses(), 40).unwrap();

    for pipe in 0..esb::payload::TX_FIFO_SIZE {
        ptx.write_payload(make_payload(0, &[pipe as u8])).unwrap();
    }
    assert_eq!(
        ptx.write_payload(make_payload(0, &[0xFF])),
        Err(esb::Error::QueueFull)
    );
}

#[test]
fn ack_registry_pops_only_on_explicit_pop() {
    let mut registry = AckRegistry::new();
    let mut p1 = Payload::EMPTY;
    p1.length = 1;
    p1.data[0] = 0xAA;
    assert!(registry.push(0, p1));
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.peek(0).unwrap().data[0], 0xAA);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.pop(0).unwrap().data[0], 0xAA);
    assert!(registry.is_empty());
}
