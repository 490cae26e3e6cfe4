use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use tracing::warn;
use xdose::engine::progress::{Progress, ProgressCallback};

const WEDGE_TEMPLATE: &str = "{prefix:<26} [{bar:30.cyan/blue}] {pos:>3}/{len:3} steps  {msg}";

/// Stacks one bar per exposed wedge on stderr, so earlier exposures stay visible
/// while later ones run.
#[derive(Clone)]
pub struct CliProgressHandler {
    view: Arc<Mutex<ExposureView>>,
}

struct ExposureView {
    bars: MultiProgress,
    wedges: Vec<ProgressBar>,
    label: Option<String>,
    voxels: usize,
}

impl ExposureView {
    fn apply(&mut self, event: Progress) {
        match event {
            Progress::PhaseStart { name } => self.note(format!("» {name}")),
            Progress::PhaseFinish => {}
            Progress::ExposureStart {
                index,
                total,
                energy_kev,
            } => {
                self.label = Some(format!(
                    "Exposure {}/{} @ {:.2} keV",
                    index + 1,
                    total,
                    energy_kev
                ));
            }
            Progress::WedgeStart {
                angle_steps,
                voxels,
            } => {
                let wedge = self.bars.add(ProgressBar::new(angle_steps));
                wedge.set_style(wedge_style());
                wedge.set_prefix(
                    self.label
                        .take()
                        .unwrap_or_else(|| format!("Wedge {}", self.wedges.len() + 1)),
                );
                wedge.set_message(format!("{voxels} voxels"));
                self.voxels = voxels;
                self.wedges.push(wedge);
            }
            Progress::AngleStepDone { angle_deg } => {
                if let Some(wedge) = self.wedges.last() {
                    wedge.inc(1);
                    wedge.set_message(format!("{} voxels, φ = {:.1}°", self.voxels, angle_deg));
                }
            }
            Progress::WedgeFinish => {
                if let Some(wedge) = self.wedges.last() {
                    wedge.finish_with_message(format!("{} voxels ✓", self.voxels));
                }
            }
            Progress::Message(text) => self.note(format!("  {text}")),
        }
    }

    fn note(&self, line: String) {
        let _ = self.bars.println(line);
    }
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            view: Arc::new(Mutex::new(ExposureView {
                bars: MultiProgress::with_draw_target(target),
                wedges: Vec::new(),
                label: None,
                voxels: 0,
            })),
        }
    }

    pub fn callback(&self) -> ProgressCallback<'static> {
        let view = Arc::clone(&self.view);
        Box::new(move |event: Progress| match view.lock() {
            Ok(mut view) => view.apply(event),
            Err(_) => warn!("Progress display lock was poisoned; dropping event."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn wedge_style() -> ProgressStyle {
    ProgressStyle::with_template(WEDGE_TEMPLATE)
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
