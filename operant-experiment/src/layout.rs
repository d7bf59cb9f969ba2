use crate::state::SessionSummary;
use operant_core::surface::{BLACK, WHITE};
use operant_core::{Bounds, ClickAction, Rgba, Surface};

pub const CANVAS_WIDTH: f32 = 1024.0;
pub const CANVAS_HEIGHT: f32 = 768.0;

pub const BACKGROUND_TAG: &str = "bkgrd";
pub const KEY_TAG: &str = "key";
pub const REWARD_TAG: &str = "canvas";

/// The response key, ~192 px across
pub const KEY_BOUNDS: Bounds = Bounds::new(416.0, 288.0, 608.0, 480.0);
/// Black surround extending past the key
pub const KEY_OUTLINE: f32 = 20.0;
pub const MIDPOINT_DIAMETER: f32 = 10.0;
/// Stimulus images are scaled to this square
pub const KEY_PIXELS: f32 = 192.0;

pub const TEXT_CENTER: (f32, f32) = (512.0, 374.0);
pub const TEXT_SIZE: f32 = 25.0;

pub const DOT_DIAMETER: f32 = 24.0;
/// Paint colours the reward screen cycles through, one per peck
pub const DOT_COLORS: [Rgba; 6] = [
    [230, 25, 75, 255],
    [255, 225, 25, 255],
    [60, 180, 75, 255],
    [0, 130, 200, 255],
    [245, 130, 48, 255],
    [145, 30, 180, 255],
];

pub fn canvas_bounds() -> Bounds {
    Bounds::new(0.0, 0.0, CANVAS_WIDTH, CANVAS_HEIGHT)
}

/// Full-screen black rect catching every peck not on the key
pub fn draw_background<S: Surface>(surface: &mut S, action: ClickAction) {
    surface.draw_rect(canvas_bounds(), Some(BLACK), Some(BLACK), Some(BACKGROUND_TAG));
    surface.bind_click(BACKGROUND_TAG, action);
}

/// White square shown once before the first trial
pub fn draw_start_signal<S: Surface>(surface: &mut S) {
    surface.draw_rect(KEY_BOUNDS, Some(WHITE), Some(BLACK), Some(KEY_TAG));
    surface.bind_click(KEY_TAG, ClickAction::StartSignalPress);
}

/// Trial key: dark surround, stimulus image, inner ring, midpoint dot
pub fn draw_keys<S: Surface>(surface: &mut S, stimulus: Option<&str>) {
    let center = KEY_BOUNDS.center();
    surface.draw_oval(KEY_BOUNDS.inflate(KEY_OUTLINE), Some(BLACK), Some(BLACK), Some(KEY_TAG));
    if let Some(image) = stimulus {
        surface.draw_image(center, (KEY_PIXELS, KEY_PIXELS), image, Some(KEY_TAG));
    }
    surface.draw_oval(KEY_BOUNDS, None, Some(BLACK), Some(KEY_TAG));
    surface.draw_oval(
        Bounds::centered(center, MIDPOINT_DIAMETER, MIDPOINT_DIAMETER),
        Some(BLACK),
        Some(BLACK),
        Some(KEY_TAG),
    );
    surface.bind_click(KEY_TAG, ClickAction::KeyPeck);
}

pub fn draw_operator_text<S: Surface>(surface: &mut S, text: &str) {
    surface.draw_text(TEXT_CENTER, text, TEXT_SIZE, WHITE);
}

pub fn placement_text(experiment_id: &str, subject: &str, condition: &str) -> String {
    format!(
        "{experiment_id}\nPlace bird in box, then press space\n\
         Subject: {subject}\nCondition: {condition}"
    )
}

pub fn iti_text(iti_ms: u64) -> String {
    format!("ITI ({} sec.)", iti_ms / 1000)
}

pub fn reinforced_text(hopper_ms: u64) -> String {
    format!("Trial Reinforced\nFood accessible ({} s)", hopper_ms / 1000)
}

pub fn reward_text(summary: &SessionSummary) -> String {
    format!(
        "Session complete\nSubject: {}\nTrials: {} ({} reinforced)\nPress escape to exit",
        summary.subject, summary.trials_completed, summary.reinforced_trials
    )
}

/// Post-session paint screen: the whole canvas takes pecks
pub fn draw_reward_screen<S: Surface>(surface: &mut S, summary: &SessionSummary) {
    surface.draw_rect(canvas_bounds(), Some(BLACK), Some(BLACK), Some(REWARD_TAG));
    surface.bind_click(REWARD_TAG, ClickAction::RewardPeck);
    surface.draw_text((TEXT_CENTER.0, 60.0), &reward_text(summary), TEXT_SIZE, WHITE);
}

/// Leaves a dot where the `n`th reward-screen peck landed
pub fn paint_dot<S: Surface>(surface: &mut S, at: (f32, f32), n: usize) {
    let color = DOT_COLORS[n % DOT_COLORS.len()];
    surface.draw_oval(
        Bounds::centered(at, DOT_DIAMETER, DOT_DIAMETER),
        Some(color),
        Some(color),
        Some(REWARD_TAG),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use operant_core::DisplayList;

    #[test]
    fn key_screen_routes_pecks() {
        let mut dl = DisplayList::new();
        draw_background(&mut dl, ClickAction::BackgroundPeck);
        draw_keys(&mut dl, Some("red.png"));
        let (cx, cy) = KEY_BOUNDS.center();
        assert_eq!(dl.hit(cx, cy), Some(ClickAction::KeyPeck));
        // inside the dark surround but outside the image
        assert_eq!(dl.hit(cx, KEY_BOUNDS.y0 - 10.0), Some(ClickAction::KeyPeck));
        assert_eq!(dl.hit(20.0, 20.0), Some(ClickAction::BackgroundPeck));
    }

    #[test]
    fn start_signal_is_a_square() {
        let mut dl = DisplayList::new();
        draw_background(&mut dl, ClickAction::BackgroundPeck);
        draw_start_signal(&mut dl);
        assert_eq!(
            dl.hit(KEY_BOUNDS.x0 + 1.0, KEY_BOUNDS.y0 + 1.0),
            Some(ClickAction::StartSignalPress)
        );
    }

    #[test]
    fn reward_screen_takes_pecks_everywhere() {
        let mut dl = DisplayList::new();
        let summary = SessionSummary {
            subject: "Kurt".into(),
            trials_completed: 80,
            reinforced_trials: 31,
            data_file: None,
            reason: None,
        };
        draw_reward_screen(&mut dl, &summary);
        paint_dot(&mut dl, (100.0, 100.0), 7);
        assert_eq!(dl.hit(100.0, 100.0), Some(ClickAction::RewardPeck));
        assert_eq!(dl.hit(1000.0, 700.0), Some(ClickAction::RewardPeck));
        assert_eq!(dl.items().last().unwrap().fill, Some(DOT_COLORS[1]));
        assert!(dl.texts().next().unwrap().contains("Trials: 80 (31 reinforced)"));
    }

    #[test]
    fn captions() {
        assert_eq!(iti_text(30_000), "ITI (30 sec.)");
        assert_eq!(reinforced_text(4000), "Trial Reinforced\nFood accessible (4 s)");
        assert!(placement_text("P003Fc", "TEST", "INS").ends_with("Condition: INS"));
    }
}
