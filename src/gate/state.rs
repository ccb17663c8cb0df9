use crate::errors::GateError;

/// Mount lifecycle of a gate. Transitions only move forward:
/// `Placeholder -> Loading -> Mounted | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountState {
    /// Nothing requested yet; the placeholder is shown
    #[default]
    Placeholder,
    /// Proximity fired, the load waits for (or runs in) an idle period. Looks like `Placeholder`.
    Loading,
    /// The heavy visual is mounted
    Mounted,
    /// Loading failed; the placeholder stays for good
    Failed,
}

impl MountState {
    pub fn can_transition_to(self, next: MountState) -> bool {
        matches!(
            (self, next),
            (MountState::Placeholder, MountState::Loading)
                | (MountState::Loading, MountState::Mounted)
                | (MountState::Loading, MountState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MountState::Mounted | MountState::Failed)
    }

    /// Moves to `next` if that edge exists.
    pub fn transition(&mut self, next: MountState) -> Result<(), GateError> {
        if !self.can_transition_to(next) {
            return Err(GateError::InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }
}
