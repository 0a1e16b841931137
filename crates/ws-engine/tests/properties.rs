//! Engine-level behaviour checked through the public API.

use approx::assert_abs_diff_eq;
use ws_engine::{
    slot, Channel, Limiter, MasterControls, ResolvedInstrument, Reverb, ReverbPreset, RegionDirector, SynthConfig,
    Synthesizer, VoicePool, CEILING, CONTROL_BLOCK, MAX_VOICES,
};
use ws_model::{AudioBuffer, Instrument, LoopType, Oscillator, Patch, Performer, Sample, SampleData, Soundbank};

fn looped_bank() -> Soundbank {
    let mut bank = Soundbank::new("props");
    let mut s = Sample::new("tri");
    s.data = SampleData::Float((0..200).map(|i| (i as f32 / 100.0 - 1.0).abs() - 0.5).collect());
    s.loop_end = 200;
    s.loop_type = LoopType::Forward;
    let key = bank.add_sample(s);
    bank.add_instrument(
        Instrument::new("tri", Patch::new(0, 0)).with_performer(Performer::new(Oscillator::new(key, 60))),
    );
    bank
}

fn synth() -> Synthesizer {
    let synth = Synthesizer::new(SynthConfig::default()).unwrap();
    synth.load_soundbank(looped_bank());
    synth
}

#[test]
fn active_voices_never_exceed_cap() {
    let synth = synth();
    let mut stream = synth.open().unwrap();
    let mut buf = vec![0u8; CONTROL_BLOCK * 4];
    for round in 0..6u8 {
        for ch in 0..16u8 {
            for n in 0..20u8 {
                synth.channel(ch).note_on(20 + n * 3 + round, 100);
                assert!(synth.active_voice_count() <= MAX_VOICES);
            }
        }
        let len = buf.len();
        stream.read(&mut buf, 0, len);
        assert!(synth.active_voice_count() <= MAX_VOICES);
    }
}

#[test]
fn full_pool_steals_oldest_voice() {
    let synth = synth();
    let _stream = synth.open().unwrap();
    let ch = synth.channel(0);
    for n in 0..64u8 {
        ch.note_on(30 + n, 100);
    }
    let status = synth.voice_status();
    assert!(status.iter().all(|s| s.active && s.on));
    let mut ids: Vec<u64> = status.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..64).collect::<Vec<_>>());

    ch.note_on(20, 100);
    let stolen: Vec<_> = synth.voice_status().into_iter().filter(|s| s.pending_steal).collect();
    assert_eq!(stolen.len(), 1);
    assert_eq!(stolen[0].id, 0);
}

#[test]
fn stolen_slot_restarts_with_new_note() {
    let synth = synth();
    let mut stream = synth.open().unwrap();
    let ch = synth.channel(0);
    for n in 0..64u8 {
        ch.note_on(30 + n, 100);
    }
    ch.note_on(20, 100);
    let mut buf = vec![0u8; CONTROL_BLOCK * 4];
    for _ in 0..20 {
        let len = buf.len();
        stream.read(&mut buf, 0, len);
    }
    let status = synth.voice_status();
    assert!(status.iter().any(|s| s.active && s.note == 20));
    assert!(!status.iter().any(|s| s.active && s.note == 30));
    assert!(!status.iter().any(|s| s.pending_steal));
}

#[test]
fn region_tiles_cover_every_point() {
    let mut performers = Vec::new();
    for k in 0..4u8 {
        for v in 0..2u8 {
            let key_from = k * 32;
            let vel_from = v * 64;
            performers.push(Performer::default().keys(key_from, key_from + 31).velocities(vel_from, vel_from + 63));
        }
    }
    let director = RegionDirector::new(&performers);
    for key in 0..128u8 {
        for vel in 0..128u8 {
            let hits = director.lookup(key, vel);
            assert!(!hits.is_empty(), "no performer at {key}/{vel}");
            assert!(hits.iter().all(|&i| i < performers.len()));
        }
    }
}

#[test]
fn single_key_region() {
    let performers = [Performer::default().keys(60, 60).velocities(0, 127)];
    let director = RegionDirector::new(&performers);
    for vel in 0..128u8 {
        assert_eq!(director.lookup(60, vel), &[0]);
    }
    for key in (0..128u8).filter(|&k| k != 60) {
        assert!(director.lookup(key, 100).is_empty());
    }
}

#[test]
fn sustain_defers_release_once() {
    let synth = synth();
    let _stream = synth.open().unwrap();
    let ch = synth.channel(0);
    ch.note_on(60, 100);
    ch.control_change(64, 127);
    ch.note_off(60, 0);
    let voice = |synth: &Synthesizer| synth.voice_status().into_iter().find(|s| s.active && s.note == 60);
    assert!(voice(&synth).is_some_and(|s| s.on));

    ch.control_change(64, 0);
    let released = voice(&synth).unwrap();
    assert!(!released.on);

    ch.control_change(64, 127);
    ch.control_change(64, 0);
    let again = voice(&synth).unwrap();
    assert_eq!(again.id, released.id);
    assert!(!again.on);
}

#[test]
fn rpn_bend_range_gives_two_hundred_cents() {
    let bank = looped_bank();
    let inst = ResolvedInstrument::resolve(&bank.instruments[0], &bank);
    let config = SynthConfig::default();
    let mut ch = Channel::new(0, config.control_rate());
    ch.set_instrument(0, Some(inst));
    let mut pool = VoicePool::new(MAX_VOICES);
    let master = MasterControls::default();

    ch.note_on(&mut pool, &master, 60, 100);
    let base = pool.voices().iter().find(|v| v.active).unwrap().destination(slot::PITCH);
    for (cc, value) in [(101, 0), (100, 0), (6, 2), (38, 0)] {
        ch.control_change(&mut pool, &master, cc, value);
    }
    ch.set_pitch_bend(&mut pool, &master, 16383);
    let pitch = pool.voices().iter().find(|v| v.active).unwrap().destination(slot::PITCH);
    assert_abs_diff_eq!(pitch - base, 200.0, epsilon = 1e-9);
}

fn filled(value: f32) -> AudioBuffer {
    let mut b = AudioBuffer::new(CONTROL_BLOCK);
    b.data_mut().fill(value);
    b
}

#[test]
fn limiter_output_stays_below_full_scale() {
    let mut lim = Limiter::default();
    let mut held = [AudioBuffer::new(CONTROL_BLOCK), AudioBuffer::new(CONTROL_BLOCK)];
    for level in [0.5, 1.5, 8.0, 0.2, 3.0, 40.0, 0.0, 1.01] {
        let (mut l, mut r) = (filled(level), filled(-level));
        let [hl, hr] = &mut held;
        lim.process(&mut l, &mut r, hl, hr);
        assert!(l.peak() <= CEILING + 1e-6);
        assert!(r.peak() < 1.0);
    }
}

#[test]
fn reverb_tail_decays_to_idle() {
    let mut reverb = Reverb::new(44100, ReverbPreset::SmallRoom.params());
    let mut input = AudioBuffer::new(CONTROL_BLOCK);
    for (i, s) in input.data_mut().iter_mut().enumerate() {
        *s = if i % 7 == 0 { 0.8 } else { -0.1 };
    }
    for _ in 0..10 {
        let (mut l, mut r) = (AudioBuffer::new(CONTROL_BLOCK), AudioBuffer::new(CONTROL_BLOCK));
        reverb.process(&input, &mut l, &mut r);
    }

    let silence = AudioBuffer::new(CONTROL_BLOCK);
    let mut prev = f32::INFINITY;
    let mut blocks = 0;
    while !reverb.is_idle() {
        let (mut l, mut r) = (AudioBuffer::new(CONTROL_BLOCK), AudioBuffer::new(CONTROL_BLOCK));
        reverb.process(&silence, &mut l, &mut r);
        let peak = l.peak().max(r.peak());
        assert!(peak <= prev, "tail grew at block {blocks}: {prev} -> {peak}");
        prev = peak;
        blocks += 1;
        assert!(blocks < 10_000);
    }
}
