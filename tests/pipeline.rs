//! End-to-end pipeline tests: capture device through the wire to playback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use audiowire::device::{BlockCallback, CallbackHandle, CaptureDevice, PlaybackDevice};
use audiowire::{AudioConfig, AudioError, PacketSink, PlaybackSource, Player, Streamer};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ======================== Test doubles ========================

struct FakeMic {
    rate: u32,
    callback: Option<BlockCallback>,
}

impl FakeMic {
    fn new(rate: u32) -> Self {
        Self { rate, callback: None }
    }

    /// One device tick: deliver a fixed-size block to the wired callback.
    fn tick(&mut self, block: &[f32]) {
        if let Some(cb) = self.callback.as_mut() {
            cb(block);
        }
    }
}

impl CaptureDevice for FakeMic {
    fn sample_rate(&self) -> u32 {
        self.rate
    }
    fn register(&mut self, callback: BlockCallback) -> Result<CallbackHandle, AudioError> {
        self.callback = Some(callback);
        Ok(CallbackHandle::new(7))
    }
    fn unregister(&mut self, _handle: CallbackHandle) {
        self.callback = None;
    }
}

struct FakeSpeaker {
    rate: u32,
    source: Option<PlaybackSource>,
}

impl FakeSpeaker {
    fn new(rate: u32) -> Self {
        Self { rate, source: None }
    }

    /// One device tick: pull a fixed-size block.
    fn pull(&mut self, n: usize) -> (Vec<f32>, bool) {
        let mut out = vec![f32::NAN; n];
        let served = self
            .source
            .as_mut()
            .map(|s| s.pull(&mut out))
            .unwrap_or_else(|| {
                out.fill(0.0);
                false
            });
        (out, served)
    }
}

impl PlaybackDevice for FakeSpeaker {
    fn sample_rate(&self) -> u32 {
        self.rate
    }
    fn register(&mut self, source: PlaybackSource) -> Result<CallbackHandle, AudioError> {
        self.source = Some(source);
        Ok(CallbackHandle::new(8))
    }
    fn unregister(&mut self, _handle: CallbackHandle) {
        self.source = None;
    }
}

/// Transport double: collects sent packets so the test can deliver them to a
/// player in whatever order it likes.
#[derive(Clone, Default)]
struct WireTap {
    packets: Arc<Mutex<VecDeque<Bytes>>>,
    ready: Arc<AtomicBool>,
}

impl WireTap {
    fn new() -> Self {
        let tap = Self::default();
        tap.ready.store(true, Ordering::Relaxed);
        tap
    }

    fn drain(&self) -> Vec<Bytes> {
        self.packets.lock().unwrap().drain(..).collect()
    }
}

impl PacketSink for WireTap {
    fn try_send(&mut self, packet: Bytes) -> Result<(), AudioError> {
        if !self.ready.load(Ordering::Relaxed) {
            return Err(AudioError::TransportUnready);
        }
        self.packets.lock().unwrap().push_back(packet);
        Ok(())
    }
}

fn sine_block(n: usize, phase: &mut f32) -> Vec<f32> {
    (0..n)
        .map(|_| {
            *phase += 0.02;
            phase.sin() * 0.4
        })
        .collect()
}

// ======================== Scenarios ========================

#[test]
fn capture_side_matches_the_wire_contract() {
    // 24000 Hz wire, mono, 4096-sample blocks on the wire side; the capture
    // device runs at 48000 Hz with 8192-sample blocks. Every device block
    // halves to 4096 wire samples and fills at least one codec frame.
    init_logging();
    let mut mic = FakeMic::new(48000);
    let tap = WireTap::new();
    let mut streamer = Streamer::new(AudioConfig::default()).unwrap();
    streamer.start(&mut mic, Box::new(tap.clone())).unwrap();

    let mut phase = 0.0;
    mic.tick(&sine_block(8192, &mut phase));
    let first = tap.drain();
    assert!(!first.is_empty());
    assert_eq!(first.len(), 8); // 4096 wire samples / 480-sample frames

    mic.tick(&sine_block(8192, &mut phase));
    assert!(!tap.drain().is_empty());

    streamer.stop(&mut mic);
}

#[test]
fn loopback_mic_to_speaker() {
    // Full path with three different rates: 48 kHz mic, 24 kHz wire,
    // 44.1 kHz speaker.
    init_logging();
    let config = AudioConfig::default();
    let mut mic = FakeMic::new(48000);
    let mut speaker = FakeSpeaker::new(44100);
    let tap = WireTap::new();

    let mut streamer = Streamer::new(config.clone()).unwrap();
    let mut player = Player::new(config).unwrap();
    streamer.start(&mut mic, Box::new(tap.clone())).unwrap();
    player.start(&mut speaker).unwrap();

    let mut phase = 0.0;
    for _ in 0..4 {
        mic.tick(&sine_block(8192, &mut phase));
        for packet in tap.drain() {
            player.write_packet(&packet);
        }
    }
    assert!(player.buffered() > 0);

    let mut heard_audio = false;
    while player.buffered() >= 1024 {
        let (out, served) = speaker.pull(1024);
        assert!(served);
        assert!(out.iter().all(|s| s.is_finite()));
        heard_audio |= out.iter().any(|&s| s != 0.0);
    }
    assert!(heard_audio);

    // Once drained below a block, pulls degrade to silence, not errors.
    let (out, served) = speaker.pull(4096);
    assert!(!served);
    assert!(out.iter().all(|&s| s == 0.0));

    streamer.stop(&mut mic);
    player.stop(&mut speaker);
}

#[test]
fn playback_survives_loss_duplication_and_reordering() {
    init_logging();
    let config = AudioConfig::default();
    let mut mic = FakeMic::new(24000);
    let mut speaker = FakeSpeaker::new(24000);
    let tap = WireTap::new();

    let mut streamer = Streamer::new(config.clone()).unwrap();
    let mut player = Player::new(config).unwrap();
    streamer.start(&mut mic, Box::new(tap.clone())).unwrap();
    player.start(&mut speaker).unwrap();

    let mut phase = 0.0;
    mic.tick(&sine_block(480 * 12, &mut phase));
    let mut packets = tap.drain();
    assert_eq!(packets.len(), 12);

    // Lose every third packet, duplicate another, and swap a pair.
    packets.swap(0, 5);
    let survivors: Vec<Bytes> = packets
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, p)| p.clone())
        .collect();
    for packet in &survivors {
        player.write_packet(packet);
    }
    player.write_packet(&survivors[0]); // duplicate

    assert_eq!(player.buffered(), (survivors.len() + 1) * 480);
    let (out, served) = speaker.pull(480);
    assert!(served);
    assert!(out.iter().all(|s| s.is_finite()));

    streamer.stop(&mut mic);
    player.stop(&mut speaker);
}

#[test]
fn empty_queue_device_pull_is_pure_silence() {
    init_logging();
    let mut speaker = FakeSpeaker::new(24000);
    let mut player = Player::new(AudioConfig::default()).unwrap();
    player.start(&mut speaker).unwrap();

    let (out, served) = speaker.pull(4096);
    assert!(!served);
    assert_eq!(out.len(), 4096);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(player.buffered(), 0);

    player.stop(&mut speaker);
}

#[test]
fn stopping_unwires_callbacks_before_releasing_state() {
    init_logging();
    let mut mic = FakeMic::new(48000);
    let tap = WireTap::new();
    let mut streamer = Streamer::new(AudioConfig::default()).unwrap();
    streamer.start(&mut mic, Box::new(tap.clone())).unwrap();
    streamer.stop(&mut mic);

    // The device callback is gone: further ticks produce nothing.
    let mut phase = 0.0;
    mic.tick(&sine_block(8192, &mut phase));
    assert!(tap.drain().is_empty());
}

#[test]
fn mute_produces_silent_but_present_packets() {
    init_logging();
    let config = AudioConfig::default();
    let mut mic = FakeMic::new(24000);
    let mut speaker = FakeSpeaker::new(24000);
    let tap = WireTap::new();

    let mut streamer = Streamer::new(config.clone()).unwrap();
    let mut player = Player::new(config).unwrap();
    streamer.start(&mut mic, Box::new(tap.clone())).unwrap();
    player.start(&mut speaker).unwrap();

    streamer.mute();
    let mut phase = 0.0;
    mic.tick(&sine_block(480 * 4, &mut phase));
    let packets = tap.drain();
    assert_eq!(packets.len(), 4);

    for packet in &packets {
        player.write_packet(packet);
    }
    let (out, served) = speaker.pull(480 * 4);
    assert!(served);
    // Opus is lossy; muted audio decodes to near-silence rather than bit
    // zeros.
    assert!(out.iter().all(|s| s.abs() < 1e-3));

    streamer.stop(&mut mic);
    player.stop(&mut speaker);
}
