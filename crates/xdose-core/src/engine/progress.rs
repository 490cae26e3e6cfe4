/// Events emitted while a dose calculation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// Start of one (beam, wedge) exposure of a multi-exposure experiment.
    ExposureStart {
        index: usize,
        total: usize,
        energy_kev: f64,
    },

    /// A wedge is about to sweep `angle_steps` steps over `voxels` interior voxels.
    WedgeStart { angle_steps: u64, voxels: usize },
    /// Every voxel has been exposed at this angle.
    AngleStepDone { angle_deg: f64 },
    WedgeFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards progress events to an optional callback; silent without one.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
