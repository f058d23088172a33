//! Step-by-step recording of task executions
//!
//! A task owns one [`TaskRecorder`] for the duration of its execution and
//! consumes it into an immutable [`TaskResult`] when it finishes.

use std::error::Error;
use std::sync::Arc;

/// Underlying cause of a failed step.
pub type StepCause = Arc<dyn Error + Send + Sync>;

/// Resolution of a single step.
#[derive(Debug, Clone)]
pub enum TaskStepResolution<E> {
    InProgress,
    Succeeded {
        message: String,
    },
    Failed {
        message: String,
        error: E,
        cause: Option<StepCause>,
    },
}

/// One recorded step of a task.
#[derive(Debug, Clone)]
pub struct TaskStep<E> {
    pub description: String,
    pub resolution: TaskStepResolution<E>,
}

impl<E> TaskStep<E> {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.resolution, TaskStepResolution::Failed { .. })
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(self.resolution, TaskStepResolution::InProgress)
    }

    /// Message of the resolution, empty while in progress.
    #[must_use]
    pub fn message(&self) -> &str {
        match &self.resolution {
            TaskStepResolution::InProgress => "",
            TaskStepResolution::Succeeded { message } | TaskStepResolution::Failed { message, .. } => {
                message
            }
        }
    }
}

/// Final outcome of a task.
#[derive(Debug, Clone)]
pub enum TaskResult<E, T> {
    Success { value: T, steps: Vec<TaskStep<E>> },
    Failure { steps: Vec<TaskStep<E>>, errors: Vec<E> },
}

impl<E, T> TaskResult<E, T> {
    #[must_use]
    pub fn steps(&self) -> &[TaskStep<E>] {
        match self {
            Self::Success { steps, .. } | Self::Failure { steps, .. } => steps,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Every recorded failure, most recent last. Empty for a success.
    #[must_use]
    pub fn errors(&self) -> &[E] {
        match self {
            Self::Success { .. } => &[],
            Self::Failure { errors, .. } => errors,
        }
    }

    /// The decisive failure of the task.
    #[must_use]
    pub fn last_error(&self) -> Option<&E> {
        self.errors().last()
    }

    /// Message of the last failed step.
    #[must_use]
    pub fn last_failure_message(&self) -> Option<&str> {
        self.steps()
            .iter()
            .rev()
            .find(|step| step.is_failed())
            .map(TaskStep::message)
    }
}

/// Accumulates the steps of one task execution.
#[derive(Debug)]
pub struct TaskRecorder<E> {
    steps: Vec<TaskStep<E>>,
    errors: Vec<E>,
}

impl<E: Clone> TaskRecorder<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Start a new step; it stays in progress until resolved.
    pub fn begin_new_step(&mut self, description: impl Into<String>) {
        let description = description.into();
        log::debug!("step: {description}");
        self.steps.push(TaskStep {
            description,
            resolution: TaskStepResolution::InProgress,
        });
    }

    pub fn current_step_succeeded(&mut self, message: impl Into<String>) {
        self.current_step_mut().resolution = TaskStepResolution::Succeeded {
            message: message.into(),
        };
    }

    /// Resolve the current step as failed and record `error`.
    pub fn current_step_failed(
        &mut self,
        message: impl Into<String>,
        error: E,
        cause: Option<StepCause>,
    ) {
        let message = message.into();
        log::debug!("step failed: {message}");
        self.errors.push(error.clone());
        self.current_step_mut().resolution = TaskStepResolution::Failed {
            message,
            error,
            cause,
        };
    }

    #[must_use]
    pub fn current_step(&self) -> Option<&TaskStep<E>> {
        self.steps.last()
    }

    #[must_use]
    pub fn steps(&self) -> &[TaskStep<E>] {
        &self.steps
    }

    /// Failures recorded so far, most recent last.
    #[must_use]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    #[must_use]
    pub fn finish_success<T>(self, value: T) -> TaskResult<E, T> {
        TaskResult::Success {
            value,
            steps: self.steps,
        }
    }

    #[must_use]
    pub fn finish_failure<T>(self) -> TaskResult<E, T> {
        TaskResult::Failure {
            steps: self.steps,
            errors: self.errors,
        }
    }

    fn current_step_mut(&mut self) -> &mut TaskStep<E> {
        let needs_step = self.steps.last().is_none_or(|step| !step.is_in_progress());
        if needs_step {
            log::warn!("step resolved without an open step; recording an unnamed step");
            self.steps.push(TaskStep {
                description: String::new(),
                resolution: TaskStepResolution::InProgress,
            });
        }
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }
}

impl<E: Clone> Default for TaskRecorder<E> {
    fn default() -> Self {
        Self::new()
    }
}
