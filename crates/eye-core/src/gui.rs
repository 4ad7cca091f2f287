use egui;

use crate::{EmotionState, EyeConfig};

/// What the user asked for in this frame's panel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PanelResponse {
    pub requested_state: Option<EmotionState>,
    /// The edited config should replace the running one.
    pub apply_config: bool,
}

pub fn eye_control_panel(
    ctx: &egui::Context,
    current: EmotionState,
    config: &mut EyeConfig,
) -> PanelResponse {
    let mut response = PanelResponse::default();

    egui::SidePanel::right("eye_controls")
        .default_width(220.0)
        .show(ctx, |ui| {
            ui.heading("Eye State");
            ui.separator();

            for state in EmotionState::ALL {
                let label = if state.is_resting() {
                    state.name().to_string()
                } else {
                    format!("{} (still)", state.name())
                };
                if ui.selectable_label(state == current, label).clicked() && state != current {
                    response.requested_state = Some(state);
                }
            }

            ui.separator();

            egui::CollapsingHeader::new("Appearance")
                .default_open(false)
                .show(ui, |ui| {
                    ui.add(
                        egui::Slider::new(&mut config.pair.eye_spacing, 0.8..=2.5)
                            .text("Eye Spacing"),
                    );
                    ui.add(
                        egui::Slider::new(&mut config.geometry.segments, 4..=64)
                            .text("Segments"),
                    );
                    ui.add(
                        egui::Slider::new(&mut config.geometry.bob_offset, 0.0..=0.4)
                            .text("Bob Offset"),
                    );
                    ui.add(
                        egui::Slider::new(&mut config.animation.transition_ms, 50.0..=2000.0)
                            .text("Transition (ms)"),
                    );
                    ui.add(
                        egui::Slider::new(&mut config.animation.bob_period_ms, 200.0..=3000.0)
                            .text("Bob Period (ms)"),
                    );
                    ui.horizontal(|ui| {
                        ui.label("Eye Color");
                        color_edit_rgb(ui, &mut config.material.color);
                    });
                    ui.horizontal(|ui| {
                        ui.label("BG Color");
                        color_edit_rgb(ui, &mut config.material.bg_color);
                    });
                    if ui.button("Apply").clicked() {
                        response.apply_config = true;
                    }
                });

            ui.separator();

            if ui.button("Reset").clicked() {
                *config = EyeConfig::default();
                response.apply_config = true;
            }
        });

    response
}

fn color_edit_rgb(ui: &mut egui::Ui, color: &mut [f32; 3]) {
    let mut rgba = egui::Color32::from_rgb(
        (color[0] * 255.0) as u8,
        (color[1] * 255.0) as u8,
        (color[2] * 255.0) as u8,
    );
    if ui.color_edit_button_srgba(&mut rgba).changed() {
        color[0] = rgba.r() as f32 / 255.0;
        color[1] = rgba.g() as f32 / 255.0;
        color[2] = rgba.b() as f32 / 255.0;
    }
}
