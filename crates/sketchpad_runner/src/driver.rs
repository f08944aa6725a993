use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sketchpad_events::{Event, InputValue};
use sketchpad_render::SurfaceHandle;

use crate::{EventSink, ExecutionStatus, HostEvent, Interpreter, Language};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// How long to keep stepping before giving the host a timer event.
    pub slice: Duration,
    /// The timeout, in seconds, for callers that don't have their own.
    pub default_timeout: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            slice: Duration::from_millis(14),
            default_timeout: 3.0,
        }
    }
}

/// Misuse of the driver. Problems with the program itself are reported as events.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RunError {
    #[error("invalid timeout {0}: must be a finite, non-negative number of seconds")]
    InvalidTimeout(f64),
}

/// Runs programs of one language. `run` takes `&mut self`, so a driver runs one program
/// at a time.
pub struct Driver<L> {
    language: L,
    config: RunnerConfig,
}

impl<L: Language> Driver<L> {
    pub fn new(language: L) -> Self {
        Driver::with_config(language, RunnerConfig::default())
    }

    pub fn with_config(language: L, config: RunnerConfig) -> Self {
        Driver { language, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Compile and run `source`, returning everything it produced.
    ///
    /// If compilation fails, the result is one [`Event::CompileError`] per diagnostic and
    /// nothing is executed. Otherwise the program runs until it halts or until
    /// `timeout_seconds` have passed, in which case the last event is [`Event::Timeout`].
    /// The clock starts once the program is compiled and reset.
    pub fn run(
        &mut self,
        source: &str,
        timeout_seconds: f64,
        pending_inputs: Vec<InputValue>,
        surface: Option<SurfaceHandle>,
    ) -> Result<Vec<Event>, RunError> {
        let timeout = Duration::try_from_secs_f64(timeout_seconds)
            .map_err(|_| RunError::InvalidTimeout(timeout_seconds))?;

        let program = match self.language.compile(source) {
            Ok(p) => p,
            Err(diagnostics) => {
                log::debug!("compilation failed: {} diagnostic(s)", diagnostics.len());
                return Ok(diagnostics.into_iter().map(Event::from).collect());
            }
        };

        let sink = EventSink::default();
        let mut interp = self
            .language
            .instantiate(program, pending_inputs.into(), sink.clone());
        if let Some(surface) = surface {
            interp.bind_canvas(surface);
        }
        interp.stop_thread();
        interp.reset();

        let start = Instant::now();
        // A deadline that doesn't fit in an `Instant` is as good as none.
        let deadline = start.checked_add(timeout);
        log::debug!("running with a timeout of {timeout:?}");

        loop {
            if deadline.map_or(false, |d| Instant::now() >= d) {
                log::debug!("timed out after {:?}", start.elapsed());
                sink.push(Event::Timeout);
                break;
            }
            if interp.status() == ExecutionStatus::Waiting {
                interp.set_status(ExecutionStatus::Running);
            }
            if interp.status() != ExecutionStatus::Running {
                break;
            }

            let slice_start = Instant::now();
            let mut steps = 0u64;
            while interp.status() == ExecutionStatus::Running
                && slice_start.elapsed() < self.config.slice
            {
                interp.exec_step();
                steps += 1;
                if interp.halt() {
                    break;
                }
            }
            log::trace!("slice: {steps} steps, {} events so far", sink.len());

            if interp.timer_token().is_none() {
                let token = interp.enqueue_event(HostEvent::Timer, Value::Null);
                interp.set_timer_token(token);
            }
        }

        log::debug!(
            "finished in {:?} with status {:?}",
            start.elapsed(),
            interp.status()
        );
        Ok(sink.take())
    }
}
