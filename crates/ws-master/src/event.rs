//! Channel events addressed to the synthesizer, optionally timestamped.

use ws_engine::Synthesizer;

/// A channel-level performance event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: u16 },
    ChannelPressure { channel: u8, value: u8 },
    PolyPressure { channel: u8, note: u8, value: u8 },
}

impl Event {
    pub fn channel(&self) -> u8 {
        match *self {
            Event::NoteOn { channel, .. }
            | Event::NoteOff { channel, .. }
            | Event::ControlChange { channel, .. }
            | Event::ProgramChange { channel, .. }
            | Event::PitchBend { channel, .. }
            | Event::ChannelPressure { channel, .. }
            | Event::PolyPressure { channel, .. } => channel,
        }
    }

    /// Deliver the event. A note-on starts `delay` frames into the next block.
    pub fn apply(&self, synth: &Synthesizer, delay: usize) {
        let ch = synth.channel(self.channel());
        match *self {
            Event::NoteOn { note, velocity, .. } => ch.note_on_delayed(note, velocity, delay),
            Event::NoteOff { note, .. } => ch.note_off(note, 0),
            Event::ControlChange { controller, value, .. } => ch.control_change(controller, value),
            Event::ProgramChange { program, .. } => ch.program_change(program),
            Event::PitchBend { value, .. } => ch.set_pitch_bend(value),
            Event::ChannelPressure { value, .. } => ch.set_channel_pressure(value),
            Event::PolyPressure { note, value, .. } => ch.set_poly_pressure(note, value),
        }
    }
}

/// An event at an absolute frame position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    pub frame: u64,
    pub event: Event,
}

impl TimedEvent {
    pub fn new(frame: u64, event: Event) -> Self {
        Self { frame, event }
    }
}
