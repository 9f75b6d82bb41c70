//! Sequential build pipeline.
//!
//! A pipeline is an explicit list of steps. Each step takes the site produced
//! by the previous one and returns a new site. The first failure halts the run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quire_content::ContentParseError;

use crate::deploy::DeployError;
use crate::feed::FeedError;
use crate::publisher::PublishError;
use crate::renderer::RenderError;
use crate::site::Site;

/// Shared flag used to ask a running pipeline to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One stage of the pipeline.
pub trait Step: Send + Sync {
    /// Step name used in logs and errors
    fn name(&self) -> &str;

    /// Run the step. Long-running steps should check `cancel` between units of work.
    fn run(&self, site: Site, cancel: &CancelFlag) -> Result<Site, StepError>;
}

/// A step built from a closure.
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(Site, &CancelFlag) -> Result<Site, StepError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Step for FnStep<F>
where
    F: Fn(Site, &CancelFlag) -> Result<Site, StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, site: Site, cancel: &CancelFlag) -> Result<Site, StepError> {
        (self.f)(site, cancel)
    }
}

/// Errors a step can report.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    ContentParse(#[from] ContentParseError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("Build cancelled")]
    Cancelled,
}

impl StepError {
    /// Short error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContentParse(_) => "content-parse",
            Self::Render(_) => "render",
            Self::Feed(_) => "feed",
            Self::Publish(PublishError::Cancelled { .. }) | Self::Cancelled => "cancelled",
            Self::Publish(_) => "publish",
            Self::Deploy(_) => "deploy",
        }
    }

    /// Output files written before a publish failure.
    pub fn written(&self) -> &[PathBuf] {
        match self {
            Self::Publish(e) => e.written(),
            _ => &[],
        }
    }
}

/// Where a pipeline is in its run.
#[derive(Debug, Clone, Default)]
pub enum PipelineState {
    #[default]
    NotStarted,
    Running {
        step: usize,
    },
    Failed {
        step: usize,
        error: Arc<StepError>,
    },
    Succeeded,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Succeeded)
    }
}

/// A failed pipeline run.
#[derive(Debug, thiserror::Error)]
#[error("Step {} '{}' failed ({}): {}", .index, .step, .source.kind(), .source)]
pub struct PipelineError {
    /// Index of the failing step
    pub index: usize,
    /// Name of the failing step
    pub step: String,
    #[source]
    pub source: Arc<StepError>,
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    pub fn written(&self) -> &[PathBuf] {
        self.source.written()
    }
}

/// Runs steps strictly in order.
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
    state: PipelineState,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            state: PipelineState::NotStarted,
            cancel: CancelFlag::new(),
        }
    }

    /// Use an externally owned cancel flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step from the beginning.
    ///
    /// A pipeline that already finished starts over from scratch.
    pub fn run(&mut self, site: Site) -> Result<Site, PipelineError> {
        self.state = PipelineState::NotStarted;
        let mut site = site;

        for (index, step) in self.steps.iter().enumerate() {
            self.state = PipelineState::Running { step: index };

            let result = if self.cancel.is_cancelled() {
                Err(StepError::Cancelled)
            } else {
                tracing::info!("[{}/{}] {}", index + 1, self.steps.len(), step.name());
                step.run(site, &self.cancel)
            };

            match result {
                Ok(next) => site = next,
                Err(error) => {
                    let error = Arc::new(error);
                    tracing::error!("Step '{}' failed: {}", step.name(), error);
                    for path in error.written() {
                        tracing::error!("  already written: {}", path.display());
                    }

                    self.state = PipelineState::Failed {
                        step: index,
                        error: Arc::clone(&error),
                    };
                    return Err(PipelineError {
                        index,
                        step: step.name().to_string(),
                        source: error,
                    });
                }
            }
        }

        self.state = PipelineState::Succeeded;
        Ok(site)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::site::{Document, SiteInfo};

    fn site() -> Site {
        let info = SiteInfo::new("Blog", "https://example.com/", "", "en").unwrap();
        Site::new(Arc::new(info))
    }

    fn recording(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Box<dyn Step> {
        Box::new(FnStep::new(name, move |site: Site, _: &CancelFlag| {
            log.lock().unwrap().push(name);
            Ok(site.with_document(Document::new(name, name)))
        }))
    }

    fn failing(name: &'static str) -> Box<dyn Step> {
        Box::new(FnStep::new(name, |_: Site, _: &CancelFlag| {
            Err(StepError::Feed(FeedError::Invalid("bad channel".to_string())))
        }))
    }

    #[test]
    fn runs_steps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new(vec![
            recording("first", Arc::clone(&log)),
            recording("second", Arc::clone(&log)),
        ]);
        assert!(matches!(pipeline.state(), PipelineState::NotStarted));

        let site = pipeline.run(site()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(site.documents.len(), 2);
        assert!(matches!(pipeline.state(), PipelineState::Succeeded));
        assert_eq!(pipeline.step_names(), vec!["first", "second"]);
    }

    #[test]
    fn halts_on_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new(vec![
            recording("first", Arc::clone(&log)),
            failing("broken"),
            recording("never", Arc::clone(&log)),
        ]);

        let err = pipeline.run(site()).unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["first"]);
        assert_eq!(err.index, 1);
        assert_eq!(err.step, "broken");
        assert_eq!(err.kind(), "feed");
        assert!(err.to_string().contains("Step 1 'broken' failed (feed)"));
        assert!(matches!(
            pipeline.state(),
            PipelineState::Failed { step: 1, error } if matches!(**error, StepError::Feed(_))
        ));
        assert!(pipeline.state().is_terminal());
    }

    #[test]
    fn empty_pipeline_succeeds() {
        let mut pipeline = Pipeline::new(vec![]);

        pipeline.run(site()).unwrap();

        assert!(matches!(pipeline.state(), PipelineState::Succeeded));
    }

    #[test]
    fn cancelled_pipeline_stops_before_next_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let cancelling: Box<dyn Step> = Box::new(FnStep::new("cancel", move |site: Site, _: &CancelFlag| {
            trigger.cancel();
            Ok(site)
        }));
        let mut pipeline =
            Pipeline::new(vec![cancelling, recording("never", Arc::clone(&log))])
                .with_cancel_flag(cancel);

        let err = pipeline.run(site()).unwrap_err();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(err.index, 1);
        assert_eq!(err.kind(), "cancelled");
    }

    #[test]
    fn rerun_starts_from_scratch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new(vec![recording("only", Arc::clone(&log))]);

        pipeline.run(site()).unwrap();
        pipeline.run(site()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["only", "only"]);
        assert!(matches!(pipeline.state(), PipelineState::Succeeded));
    }
}
