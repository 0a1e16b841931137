//! VoicePool: fixed voice slots, allocation and stealing.

use tracing::trace;

use crate::controls::SourceContext;
use crate::voice::{NoteRequest, Voice, VoiceStatus};

/// Upper bound on simultaneous voices.
pub const MAX_VOICES: usize = 64;

/// Fixed array of voices plus allocation counters.
///
/// A note-on either lands in a free slot or parks its request on a victim
/// that is being shut off; the request starts once the victim goes silent.
pub struct VoicePool {
    voices: Vec<Voice>,
    /// Free-slot search start; reset per note-on.
    cursor: usize,
    next_id: u64,
    next_group: u64,
}

impl VoicePool {
    pub fn new(polyphony: usize) -> Self {
        let len = polyphony.clamp(1, MAX_VOICES);
        Self {
            voices: (0..len).map(|_| Voice::default()).collect(),
            cursor: 0,
            next_id: 0,
            next_group: 0,
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn next_group(&mut self) -> u64 {
        let group = self.next_group;
        self.next_group += 1;
        group
    }

    /// Start a new note-on: the free search restarts at slot 0.
    pub fn begin_note(&mut self) {
        self.cursor = 0;
    }

    fn find_free(&mut self) -> Option<usize> {
        let at = self.voices[self.cursor.min(self.voices.len())..]
            .iter()
            .position(|v| !v.active && v.pending.is_none())?;
        let slot = self.cursor + at;
        self.cursor = slot + 1;
        Some(slot)
    }

    /// Victim for a steal: the oldest released voice, else the oldest voice.
    /// Voices already carrying a deferred note are never picked.
    pub fn steal_candidate(&self) -> Option<usize> {
        let candidates = || {
            self.voices
                .iter()
                .enumerate()
                .filter(|(_, v)| v.active && v.pending.is_none())
        };
        candidates()
            .filter(|(_, v)| !v.on)
            .min_by_key(|(_, v)| v.id)
            .or_else(|| candidates().min_by_key(|(_, v)| v.id))
            .map(|(i, _)| i)
    }

    /// Place a note request. Returns the slot used, or `None` when every
    /// voice is busy and already stealing.
    pub fn request(&mut self, req: NoteRequest, ctx: &SourceContext) -> Option<usize> {
        if let Some(slot) = self.find_free() {
            self.voices[slot].start(req, ctx);
            return Some(slot);
        }
        let Some(slot) = self.steal_candidate() else {
            trace!(channel = req.channel, note = req.note, "no voice available, note dropped");
            return None;
        };
        let group = self.voices[slot].group;
        trace!(slot, victim = self.voices[slot].id, note = req.note, "stealing voice");
        self.voices[slot].pending = Some(req);
        for v in self.voices.iter_mut().filter(|v| v.active && v.group == group) {
            v.sound_off();
        }
        Some(slot)
    }

    /// Drop deferred notes for `(channel, note)`.
    pub fn cancel_pending(&mut self, channel: u8, note: u8) {
        for v in &mut self.voices {
            if v.pending.as_ref().is_some_and(|p| p.channel == channel && p.note == note) {
                v.pending = None;
            }
        }
    }

    /// Drop every deferred note for `channel`.
    pub fn cancel_channel(&mut self, channel: u8) {
        for v in &mut self.voices {
            if v.pending.as_ref().is_some_and(|p| p.channel == channel) {
                v.pending = None;
            }
        }
    }

    /// Advance every active voice one control cycle, then start deferred
    /// notes on voices that went silent. `ctx` yields the source context
    /// of a channel.
    pub fn control_pass<'a, F>(&mut self, ctx: F, dt: f64)
    where
        F: Fn(u8) -> SourceContext<'a>,
    {
        for v in &mut self.voices {
            if v.active {
                v.control(&ctx(v.channel), dt);
            }
        }
        for v in &mut self.voices {
            if v.active {
                continue;
            }
            if let Some(req) = v.pending.take() {
                let channel = req.channel;
                v.start(req, &ctx(channel));
            }
        }
    }

    /// Deactivate the voice in `slot` if it still carries `id`.
    pub fn end_voice(&mut self, slot: usize, id: u64) {
        if let Some(v) = self.voices.get_mut(slot) {
            if v.active && v.id == id {
                v.active = false;
                v.on = false;
            }
        }
    }

    /// Silence everything immediately, dropping deferred notes.
    pub fn clear(&mut self) {
        for v in &mut self.voices {
            v.active = false;
            v.on = false;
            v.pending = None;
        }
    }

    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    pub fn status(&self) -> Vec<VoiceStatus> {
        self.voices.iter().map(Voice::status).collect()
    }
}
