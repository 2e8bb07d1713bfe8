//! Handle lifecycle: not started, running, stopped.
//!
//! `Stopped` is terminal. Every transition that the state machine does not
//! allow is reported as the matching [`SchedulerError`].

use super::error::SchedulerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    NotStarted,
    Running,
    Stopped,
}

impl LifecycleState {
    /// Fail unless running.
    pub fn ensure_running(&self) -> Result<(), SchedulerError> {
        match self {
            Self::Running => Ok(()),
            Self::NotStarted => Err(SchedulerError::NotStarted),
            Self::Stopped => Err(SchedulerError::Stopped),
        }
    }

    /// `NotStarted` to `Running`.
    pub fn begin(&mut self) -> Result<(), SchedulerError> {
        match self {
            Self::NotStarted => {
                *self = Self::Running;
                Ok(())
            }
            Self::Running => Err(SchedulerError::AlreadyStarted),
            Self::Stopped => Err(SchedulerError::Stopped),
        }
    }

    /// `Running` to `Stopped`.
    pub fn finish(&mut self) -> Result<(), SchedulerError> {
        self.ensure_running()?;
        *self = Self::Stopped;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self == Self::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut state = LifecycleState::default();
        assert_eq!(state, LifecycleState::NotStarted);
        state.begin().unwrap();
        assert!(state.is_running());
        state.ensure_running().unwrap();
        state.finish().unwrap();
        assert_eq!(state, LifecycleState::Stopped);
    }

    #[test]
    fn misuse_is_rejected() {
        let mut state = LifecycleState::NotStarted;
        assert!(matches!(state.ensure_running(), Err(SchedulerError::NotStarted)));
        assert!(matches!(state.finish(), Err(SchedulerError::NotStarted)));

        state.begin().unwrap();
        assert!(matches!(state.begin(), Err(SchedulerError::AlreadyStarted)));

        state.finish().unwrap();
        assert!(matches!(state.finish(), Err(SchedulerError::Stopped)));
        assert!(matches!(state.begin(), Err(SchedulerError::Stopped)));
        assert!(matches!(state.ensure_running(), Err(SchedulerError::Stopped)));
    }
}
