//! egui rendering of the chat widget.
//!
//! Everything on screen is derived from a [`ViewModel`] snapshot each frame.
//! The only thing the view writes is the draft text owned by the input
//! field; user intent comes back as [`WidgetEvent`]s.

use egui::{Align, Align2, Color32, Layout, Margin, RichText};

use crate::config::{Position, WidgetConfig};
use crate::message::{Message, Role};

const EDGE_MARGIN: f32 = 20.0;
const TOGGLE_SIZE: f32 = 60.0;
const PANEL_SIZE: egui::Vec2 = egui::vec2(350.0, 500.0);
const HEADER_HEIGHT: f32 = 54.0;
const INPUT_HEIGHT: f32 = 52.0;
const ASSISTANT_FILL: Color32 = Color32::from_rgb(0xf1, 0xf1, 0xf1);
const ASSISTANT_TEXT: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);
const DOT_COLOR: Color32 = Color32::from_rgb(0x88, 0x88, 0x88);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetEvent {
    Toggle(Option<bool>),
    Send,
}

/// What one frame needs to know about the widget.
#[derive(Debug)]
pub struct ViewModel<'a> {
    pub config: &'a WidgetConfig,
    pub messages: &'a [Message],
    pub is_open: bool,
    pub is_loading: bool,
    pub focus_input: bool,
    pub scroll_to_latest: bool,
}

pub fn render(ctx: &egui::Context, model: &ViewModel<'_>, draft: &mut String) -> Vec<WidgetEvent> {
    let mut events = Vec::new();

    let (anchor, offset) = match model.config.position {
        Position::Right => (Align2::RIGHT_BOTTOM, egui::vec2(-EDGE_MARGIN, -EDGE_MARGIN)),
        Position::Left => (Align2::LEFT_BOTTOM, egui::vec2(EDGE_MARGIN, -EDGE_MARGIN)),
    };

    egui::Area::new(egui::Id::new("chat_widget"))
        .anchor(anchor, offset)
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            if model.is_open {
                panel(ui, model, draft, &mut events);
            } else {
                toggle_button(ui, model.config, &mut events);
            }
        });

    events
}

fn toggle_button(ui: &mut egui::Ui, config: &WidgetConfig, events: &mut Vec<WidgetEvent>) {
    let button = egui::Button::new(RichText::new("🗨").size(24.0).color(Color32::WHITE))
        .fill(config.primary_color)
        .rounding(TOGGLE_SIZE / 2.0)
        .min_size(egui::vec2(TOGGLE_SIZE, TOGGLE_SIZE));
    if ui.add(button).on_hover_text(config.widget_title.as_str()).clicked() {
        events.push(WidgetEvent::Toggle(None));
    }
}

fn panel(ui: &mut egui::Ui, model: &ViewModel<'_>, draft: &mut String, events: &mut Vec<WidgetEvent>) {
    let primary = model.config.primary_color;

    egui::Frame::window(ui.style())
        .fill(Color32::WHITE)
        .rounding(10.0)
        .inner_margin(0.0)
        .show(ui, |ui| {
            ui.set_width(PANEL_SIZE.x);
            ui.set_height(PANEL_SIZE.y);
            ui.spacing_mut().item_spacing.y = 0.0;

            // ── header ──
            egui::Frame::none().fill(primary).inner_margin(15.0).show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(model.config.widget_title.as_str())
                            .strong()
                            .size(16.0)
                            .color(Color32::WHITE),
                    );
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let close = egui::Button::new(RichText::new("×").size(24.0).color(Color32::WHITE))
                            .frame(false);
                        if ui.add(close).clicked() {
                            events.push(WidgetEvent::Toggle(Some(false)));
                        }
                    });
                });
            });

            // ── messages ──
            let list_height = PANEL_SIZE.y - HEADER_HEIGHT - INPUT_HEIGHT;
            ui.allocate_ui(egui::vec2(PANEL_SIZE.x, list_height), |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        egui::Frame::none().inner_margin(15.0).show(ui, |ui| {
                            ui.spacing_mut().item_spacing.y = 10.0;
                            for message in model.messages {
                                bubble(ui, message, primary);
                            }
                            if model.is_loading {
                                loading_bubble(ui);
                            }
                        });
                        if model.scroll_to_latest {
                            ui.scroll_to_cursor(Some(Align::BOTTOM));
                        }
                    });
            });

            ui.separator();

            // ── input ──
            egui::Frame::none().inner_margin(10.0).show(ui, |ui| {
                ui.horizontal(|ui| {
                    let send_width = 28.0;
                    let edit = egui::TextEdit::singleline(draft)
                        .hint_text(model.config.placeholder.as_str())
                        .desired_width(ui.available_width() - send_width - ui.spacing().item_spacing.x);
                    let response = ui.add(edit);
                    if model.focus_input {
                        response.request_focus();
                    }
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        events.push(WidgetEvent::Send);
                        response.request_focus();
                    }

                    let send = egui::Button::new(RichText::new("➤").size(18.0).color(primary)).frame(false);
                    if ui.add(send).clicked() {
                        events.push(WidgetEvent::Send);
                    }
                });
            });
        });
}

fn bubble(ui: &mut egui::Ui, message: &Message, primary: Color32) {
    let (fill, text, layout) = match message.role {
        Role::User => (primary, Color32::WHITE, Layout::right_to_left(Align::TOP)),
        Role::Assistant => (ASSISTANT_FILL, ASSISTANT_TEXT, Layout::left_to_right(Align::TOP)),
    };
    let max_width = ui.available_width() * 0.8;

    ui.with_layout(layout, |ui| {
        egui::Frame::none()
            .fill(fill)
            .rounding(18.0)
            .inner_margin(Margin::symmetric(15.0, 10.0))
            .show(ui, |ui| {
                ui.set_max_width(max_width);
                ui.add(egui::Label::new(RichText::new(message.content.as_str()).size(14.0).color(text)).wrap());
            });
    });
}

fn loading_bubble(ui: &mut egui::Ui) {
    let time = ui.input(|i| i.time);
    ui.with_layout(Layout::left_to_right(Align::TOP), |ui| {
        egui::Frame::none()
            .fill(ASSISTANT_FILL)
            .rounding(18.0)
            .inner_margin(Margin::symmetric(15.0, 10.0))
            .show(ui, |ui| {
                let (rect, _) = ui.allocate_exact_size(egui::vec2(36.0, 16.0), egui::Sense::hover());
                let painter = ui.painter();
                for index in 0..3 {
                    let center = egui::pos2(rect.left() + 6.0 + index as f32 * 12.0, rect.center().y);
                    painter.circle_filled(center, 4.0 * dot_scale(time, index), DOT_COLOR);
                }
            });
    });
    ui.ctx().request_repaint();
}

/// Size of loading dot `index` (0..3) at `time` seconds, in `0.0..=1.0`.
///
/// Each dot pulses on a 1.4 s cycle, peaking at 40 % and vanishing from
/// 80 %; earlier dots lead later ones by 0.16 s.
pub fn dot_scale(time: f64, index: usize) -> f32 {
    let lead = (2usize.saturating_sub(index)) as f64 * 0.16;
    let phase = ((time + lead) / 1.4).fract() as f32;
    if phase < 0.4 {
        phase / 0.4
    } else if phase < 0.8 {
        1.0 - (phase - 0.4) / 0.4
    } else {
        0.0
    }
}
