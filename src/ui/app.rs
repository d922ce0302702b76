use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui::{
    self, Align, Align2, Color32, Layout, RichText, ScrollArea, TextEdit, TopBottomPanel, Ui,
};
use tracing::{info, warn};

use crate::alert::{AlarmEffects, ToneEnvelope, fire_alarm, ring_terminal_bell};
use crate::diagnostics::FrameStats;
use crate::engine::scale::{MAX_HOURS_PER_DAY, MIN_HOURS_PER_DAY};
use crate::error::CommandError;
use crate::scheduler::TickScheduler;
use crate::session::{Mode, Session};
use crate::time_provider::TimeProvider;

const ACCENT: Color32 = Color32::from_rgb(96, 228, 206);
const CLOCK_MAIN: Color32 = Color32::from_rgb(255, 214, 117);
const MUTED: Color32 = Color32::from_rgb(161, 180, 201);
const OK: Color32 = Color32::from_rgb(111, 228, 134);
const ALERT: Color32 = Color32::from_rgb(255, 101, 101);

pub struct GuiOptions {
    /// Fixed repaint interval; `None` follows the display refresh.
    pub fps: Option<u16>,
    pub notifications: bool,
}

pub fn run_gui(
    session: Session,
    provider: Box<dyn TimeProvider>,
    options: GuiOptions,
) -> Result<()> {
    let native_options = eframe::NativeOptions {
        vsync: options.fps.is_none(),
        viewport: egui::ViewportBuilder::default()
            .with_title("N Clock")
            .with_inner_size([420.0, 640.0])
            .with_min_inner_size([360.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "N Clock",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx);
            Ok(Box::new(NClockApp::new(
                session,
                provider,
                options,
                cc.egui_ctx.clone(),
            )))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch N Clock GUI: {err}"))?;

    Ok(())
}

fn configure_theme(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.override_text_color = Some(Color32::from_rgb(226, 234, 246));
    visuals.panel_fill = Color32::from_rgb(8, 16, 26);
    visuals.window_fill = Color32::from_rgb(12, 20, 32);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(16, 24, 38);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(26, 42, 62);
    visuals.widgets.active.bg_fill = Color32::from_rgb(34, 60, 88);
    visuals.selection.bg_fill = Color32::from_rgb(43, 148, 178);
    ctx.set_visuals(visuals);
}

/// Alarm side effects inside the window: terminal bell plus a pulsing
/// banner for the tone, a taskbar attention request for the notification,
/// and a queue of modal prompts.
struct GuiEffects {
    ctx: egui::Context,
    prompts: VecDeque<String>,
    ringing_since: Option<Instant>,
}

impl AlarmEffects for GuiEffects {
    fn play_tone(&mut self, envelope: &ToneEnvelope) -> Result<()> {
        self.ringing_since = Some(Instant::now());
        ring_terminal_bell(envelope)
    }

    fn notify(&mut self, title: &str, body: &str) -> Result<()> {
        info!(title, body, "notification");
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::RequestUserAttention(
                egui::UserAttentionType::Informational,
            ));
        Ok(())
    }

    fn acknowledge(&mut self, message: String) {
        self.prompts.push_back(message);
    }
}

struct NClockApp {
    session: Session,
    provider: Box<dyn TimeProvider>,
    scheduler: TickScheduler,
    repaint_interval: Option<Duration>,
    notifications: bool,
    effects: GuiEffects,
    envelope: ToneEnvelope,
    frame_stats: FrameStats,
    display: String,
    hours_input: u32,
    alarm_input: String,
    status_message: Option<(String, Instant)>,
}

impl NClockApp {
    fn new(
        session: Session,
        provider: Box<dyn TimeProvider>,
        options: GuiOptions,
        ctx: egui::Context,
    ) -> Self {
        let repaint_interval = options
            .fps
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps.max(1))));
        let first = provider.now();
        let mut scheduler = TickScheduler::new();
        scheduler.start(first.monotonic_ms);
        let display = session.render(&first.local);
        let hours_input = u32::from(session.hours_per_day());
        Self {
            session,
            provider,
            scheduler,
            repaint_interval,
            notifications: options.notifications,
            effects: GuiEffects {
                ctx,
                prompts: VecDeque::new(),
                ringing_since: None,
            },
            envelope: ToneEnvelope::default(),
            frame_stats: FrameStats::new(
                120,
                repaint_interval.unwrap_or(Duration::from_millis(16)),
            ),
            display,
            hours_input,
            alarm_input: String::new(),
            status_message: None,
        }
    }

    fn set_status(&mut self, text: impl Into<String>, ttl: Duration) {
        self.status_message = Some((text.into(), Instant::now() + ttl));
    }

    fn report_rejection(&mut self, err: CommandError) {
        warn!("input rejected: {err}");
        self.set_status(err.to_string(), Duration::from_secs(3));
    }

    fn run_tick(&mut self) {
        let sample = self.provider.now();
        let Some(tick) = self.scheduler.tick(sample.monotonic_ms) else {
            return;
        };
        self.frame_stats.record_frame(tick.dt_ms);
        let report = self.session.tick(&sample, tick.dt_ms);
        for alarm in &report.fired {
            fire_alarm(&mut self.effects, alarm, self.notifications);
        }
        self.display = report.display;
    }

    fn show_tabs(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            for mode in Mode::ALL {
                let selected = self.session.mode() == mode;
                if ui
                    .selectable_label(selected, RichText::new(mode.title()).size(18.0))
                    .clicked()
                {
                    self.session.set_mode(mode);
                }
            }
        });
    }

    fn show_display(&mut self, ui: &mut Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(12.0);
            ui.label(
                RichText::new(&self.display)
                    .size(64.0)
                    .monospace()
                    .color(CLOCK_MAIN)
                    .strong(),
            );
            ui.add_space(12.0);
        });
    }

    fn show_ringing_banner(&mut self, ui: &mut Ui) {
        let Some(since) = self.effects.ringing_since else {
            return;
        };
        let elapsed = since.elapsed().as_secs_f32();
        if elapsed >= self.envelope.duration_secs() && self.effects.prompts.is_empty() {
            self.effects.ringing_since = None;
            return;
        }
        let level = self
            .envelope
            .level_at(elapsed % self.envelope.duration_secs());
        let alpha = (80.0 + 175.0 * level) as u8;
        ui.vertical_centered(|ui| {
            ui.label(
                RichText::new("ALARM")
                    .size(24.0)
                    .strong()
                    .color(Color32::from_rgba_unmultiplied(255, 101, 101, alpha)),
            );
        });
    }

    fn show_clock_controls(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label("Day length");
            let changed = ui
                .add(
                    egui::Slider::new(
                        &mut self.hours_input,
                        u32::from(MIN_HOURS_PER_DAY)..=u32::from(MAX_HOURS_PER_DAY),
                    )
                    .suffix(" h"),
                )
                .changed();
            if changed && let Err(err) = self.session.set_hours_per_day(self.hours_input) {
                self.hours_input = u32::from(self.session.hours_per_day());
                self.report_rejection(err);
            }
        });
        ui.label(
            RichText::new(format!(
                "One real day shows as {} hours ({:.2}x speed)",
                self.session.hours_per_day(),
                24.0 / f64::from(self.session.hours_per_day())
            ))
            .color(MUTED),
        );
    }

    fn show_stopwatch_controls(&mut self, ui: &mut Ui) {
        let stopwatch = self.session.stopwatch();
        ui.horizontal(|ui| {
            let (label, fill) = if stopwatch.running {
                ("Stop", Color32::from_rgb(108, 32, 36))
            } else {
                ("Start", Color32::from_rgb(22, 78, 89))
            };
            if ui
                .add(
                    egui::Button::new(RichText::new(label).strong())
                        .fill(fill)
                        .min_size(egui::vec2(90.0, 28.0)),
                )
                .clicked()
            {
                self.session.toggle_stopwatch();
            }
            if ui
                .add_enabled(
                    stopwatch.running,
                    egui::Button::new("Lap").min_size(egui::vec2(90.0, 28.0)),
                )
                .clicked()
                && let Err(err) = self.session.record_lap()
            {
                self.report_rejection(err);
            }
            let can_reset = !stopwatch.running
                && (stopwatch.elapsed_ms > 0.0 || !self.session.laps().is_empty());
            if ui
                .add_enabled(
                    can_reset,
                    egui::Button::new("Reset").min_size(egui::vec2(90.0, 28.0)),
                )
                .clicked()
                && let Err(err) = self.session.reset_stopwatch()
            {
                self.report_rejection(err);
            }
        });

        ui.separator();
        if self.session.laps().is_empty() {
            ui.label(RichText::new("No laps").color(MUTED));
            return;
        }
        ScrollArea::vertical().id_salt("laps_scroll").show(ui, |ui| {
            egui::Grid::new("laps_grid")
                .striped(true)
                .num_columns(2)
                .show(ui, |ui| {
                    for (number, lap) in self.session.laps().numbered() {
                        ui.label(format!("Lap {number}"));
                        ui.label(RichText::new(lap).monospace());
                        ui.end_row();
                    }
                });
        });
    }

    fn show_alarm_controls(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label("Time");
            let response = ui.add(
                TextEdit::singleline(&mut self.alarm_input)
                    .hint_text("HH:MM")
                    .desired_width(90.0),
            );
            let submitted =
                response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            if ui.button("Set").clicked() || submitted {
                match self.session.add_alarm_from_input(&self.alarm_input) {
                    Ok(alarm) => {
                        self.alarm_input.clear();
                        self.set_status(
                            format!("Alarm set for {}", alarm.label()),
                            Duration::from_secs(2),
                        );
                    }
                    Err(err) => self.report_rejection(err),
                }
            }
        });

        ui.separator();
        if self.session.alarms().is_empty() {
            ui.label(RichText::new("No alarms").color(MUTED));
            return;
        }

        let rows: Vec<(String, String, bool)> = self
            .session
            .alarms()
            .iter()
            .map(|alarm| (alarm.id.clone(), alarm.label(), alarm.enabled))
            .collect();
        let mut toggled: Option<String> = None;
        let mut removed: Option<String> = None;
        ScrollArea::vertical().id_salt("alarms_scroll").show(ui, |ui| {
            egui::Grid::new("alarms_grid")
                .striped(true)
                .num_columns(3)
                .show(ui, |ui| {
                    for (id, label, enabled) in &rows {
                        ui.label(RichText::new(label).size(22.0).monospace());
                        let mut on = *enabled;
                        if ui.checkbox(&mut on, "On").changed() {
                            toggled = Some(id.clone());
                        }
                        if ui
                            .add(
                                egui::Button::new(RichText::new("Delete").color(ALERT))
                                    .fill(Color32::from_rgb(51, 20, 24)),
                            )
                            .clicked()
                        {
                            removed = Some(id.clone());
                        }
                        ui.end_row();
                    }
                });
        });

        if let Some(id) = toggled
            && let Err(err) = self.session.toggle_alarm(&id)
        {
            self.report_rejection(err);
        }
        if let Some(id) = removed {
            match self.session.delete_alarm(&id) {
                Ok(alarm) => self.set_status(
                    format!("Removed alarm {}", alarm.label()),
                    Duration::from_secs(2),
                ),
                Err(err) => self.report_rejection(err),
            }
        }
    }

    fn show_prompt(&mut self, ctx: &egui::Context) {
        let Some(message) = self.effects.prompts.front().cloned() else {
            return;
        };
        let mut acknowledged = false;
        egui::Window::new("Alarm")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(RichText::new(&message).size(20.0).strong());
                ui.add_space(8.0);
                ui.with_layout(Layout::right_to_left(Align::Min), |ui| {
                    acknowledged = ui.button("OK").clicked();
                });
            });
        if acknowledged {
            let _ = self.effects.prompts.pop_front();
        }
    }
}

impl eframe::App for NClockApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some((_, expires_at)) = &self.status_message
            && Instant::now() >= *expires_at
        {
            self.status_message = None;
        }

        self.run_tick();

        TopBottomPanel::top("tabs")
            .resizable(false)
            .show(ctx, |ui| self.show_tabs(ui));

        TopBottomPanel::bottom("footer")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.label(
                        RichText::new(format!(
                            "{} | {:.0} FPS",
                            self.provider.label(),
                            self.frame_stats.rolling_fps()
                        ))
                        .color(MUTED),
                    );
                    if let Some((msg, _)) = &self.status_message {
                        ui.separator();
                        ui.label(RichText::new(msg).color(OK).strong());
                    }
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_display(ui);
            self.show_ringing_banner(ui);
            ui.separator();
            match self.session.mode() {
                Mode::Clock => self.show_clock_controls(ui),
                Mode::Stopwatch => self.show_stopwatch_controls(ui),
                Mode::Alarm => self.show_alarm_controls(ui),
            }
            ui.add_space(4.0);
            ui.label(RichText::new("N Clock").color(ACCENT).small());
        });

        self.show_prompt(ctx);

        match self.repaint_interval {
            Some(interval) => ctx.request_repaint_after(interval),
            None => ctx.request_repaint(),
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.session.save_all();
    }
}
