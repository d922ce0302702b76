use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::alarm::model::Alarm;

pub const NOTIFICATION_TITLE: &str = "N Clock";

/// Gain curve of the alarm beep: exponential attack from the floor to the
/// peak, a hold, then an exponential decay back to the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEnvelope {
    pub frequency_hz: f32,
    pub floor_gain: f32,
    pub peak_gain: f32,
    pub attack_secs: f32,
    pub decay_start_secs: f32,
    pub decay_secs: f32,
    pub stop_secs: f32,
}

impl Default for ToneEnvelope {
    fn default() -> Self {
        Self {
            frequency_hz: 880.0,
            floor_gain: 0.0001,
            peak_gain: 0.25,
            attack_secs: 0.01,
            decay_start_secs: 0.5,
            decay_secs: 0.3,
            stop_secs: 0.85,
        }
    }
}

impl ToneEnvelope {
    pub fn gain_at(&self, t_secs: f32) -> f32 {
        if !(0.0..self.stop_secs).contains(&t_secs) {
            return 0.0;
        }
        if t_secs < self.attack_secs {
            return exp_ramp(self.floor_gain, self.peak_gain, t_secs / self.attack_secs);
        }
        if t_secs < self.decay_start_secs {
            return self.peak_gain;
        }
        let progress = ((t_secs - self.decay_start_secs) / self.decay_secs).min(1.0);
        exp_ramp(self.peak_gain, self.floor_gain, progress)
    }

    /// Gain relative to the peak, for visual pulsing.
    pub fn level_at(&self, t_secs: f32) -> f32 {
        (self.gain_at(t_secs) / self.peak_gain).clamp(0.0, 1.0)
    }

    pub fn duration_secs(&self) -> f32 {
        self.stop_secs
    }
}

fn exp_ramp(from: f32, to: f32, progress: f32) -> f32 {
    from * (to / from).powf(progress.clamp(0.0, 1.0))
}

pub fn alarm_message(alarm: &Alarm) -> String {
    format!("Alarm {} is ringing", alarm.label())
}

/// Writes BEL to stderr; both hosts use it as the audible part of the tone.
pub fn ring_terminal_bell(envelope: &ToneEnvelope) -> Result<()> {
    debug!(frequency_hz = envelope.frequency_hz, "ringing terminal bell");
    let mut stderr = std::io::stderr();
    stderr
        .write_all(b"\x07")
        .and_then(|()| stderr.flush())
        .context("terminal bell unavailable")
}

/// Host-specific ways of getting an alarm noticed.
pub trait AlarmEffects {
    fn play_tone(&mut self, envelope: &ToneEnvelope) -> Result<()>;
    fn notify(&mut self, title: &str, body: &str) -> Result<()>;
    fn acknowledge(&mut self, message: String);
}

/// Runs every side effect for a fired alarm. A failing effect is skipped; the
/// firing itself has already been recorded by the matcher.
pub fn fire_alarm(effects: &mut dyn AlarmEffects, alarm: &Alarm, notifications_granted: bool) {
    info!(id = %alarm.id, time = %alarm.label(), "alarm fired");
    if let Err(err) = effects.play_tone(&ToneEnvelope::default()) {
        debug!(id = %alarm.id, "tone skipped: {err:#}");
    }
    if notifications_granted {
        let body = format!("Alarm {}", alarm.label());
        if let Err(err) = effects.notify(NOTIFICATION_TITLE, &body) {
            debug!(id = %alarm.id, "notification skipped: {err:#}");
        }
    }
    effects.acknowledge(alarm_message(alarm));
}

/// Terminal bell for the tone, a log line for the notification, and a
/// printed prompt.
pub struct TerminalEffects<W: Write> {
    out: W,
}

impl<W: Write> TerminalEffects<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> AlarmEffects for TerminalEffects<W> {
    fn play_tone(&mut self, envelope: &ToneEnvelope) -> Result<()> {
        ring_terminal_bell(envelope)
    }

    fn notify(&mut self, title: &str, body: &str) -> Result<()> {
        info!(title, body, "notification");
        Ok(())
    }

    fn acknowledge(&mut self, message: String) {
        if let Err(err) = writeln!(self.out, "{message}") {
            debug!("prompt not shown: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    #[derive(Default)]
    struct RecordingEffects {
        tone_fails: bool,
        tones: usize,
        notifications: Vec<(String, String)>,
        prompts: Vec<String>,
    }

    impl AlarmEffects for RecordingEffects {
        fn play_tone(&mut self, _envelope: &ToneEnvelope) -> Result<()> {
            if self.tone_fails {
                bail!("no audio device");
            }
            self.tones += 1;
            Ok(())
        }

        fn notify(&mut self, title: &str, body: &str) -> Result<()> {
            self.notifications.push((title.to_string(), body.to_string()));
            Ok(())
        }

        fn acknowledge(&mut self, message: String) {
            self.prompts.push(message);
        }
    }

    fn alarm() -> Alarm {
        Alarm {
            id: "a1".to_string(),
            hour: 7,
            minute: 5,
            enabled: true,
        }
    }

    #[test]
    fn envelope_shape() {
        let envelope = ToneEnvelope::default();
        assert!((envelope.gain_at(0.0) - 0.0001).abs() < 1e-7);
        assert!((envelope.gain_at(0.01) - 0.25).abs() < 1e-6);
        assert_eq!(envelope.gain_at(0.3), 0.25);
        let mid_decay = envelope.gain_at(0.65);
        assert!(mid_decay < 0.25 && mid_decay > 0.0001);
        assert!((envelope.gain_at(0.82) - 0.0001).abs() < 1e-6);
        assert_eq!(envelope.gain_at(0.9), 0.0);
        assert_eq!(envelope.gain_at(-0.1), 0.0);
        assert_eq!(envelope.level_at(0.2), 1.0);
    }

    #[test]
    fn notification_requires_permission() {
        let mut effects = RecordingEffects::default();
        fire_alarm(&mut effects, &alarm(), false);
        assert!(effects.notifications.is_empty());
        fire_alarm(&mut effects, &alarm(), true);
        assert_eq!(
            effects.notifications,
            vec![("N Clock".to_string(), "Alarm 07:05".to_string())]
        );
        assert_eq!(effects.tones, 2);
    }

    #[test]
    fn failing_tone_still_prompts() {
        let mut effects = RecordingEffects {
            tone_fails: true,
            ..Default::default()
        };
        fire_alarm(&mut effects, &alarm(), true);
        assert_eq!(effects.tones, 0);
        assert_eq!(effects.notifications.len(), 1);
        assert_eq!(effects.prompts, vec!["Alarm 07:05 is ringing".to_string()]);
    }

    #[test]
    fn terminal_tone_rings_the_shared_bell() {
        let envelope = ToneEnvelope::default();
        assert!(ring_terminal_bell(&envelope).is_ok());
        let mut effects = TerminalEffects::new(Vec::new());
        assert!(effects.play_tone(&envelope).is_ok());
        assert!(effects.out.is_empty());
    }

    #[test]
    fn terminal_prompt_is_written() {
        let mut buffer = Vec::new();
        TerminalEffects::new(&mut buffer).acknowledge("Alarm 07:05 is ringing".to_string());
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "Alarm 07:05 is ringing\n"
        );
    }
}
