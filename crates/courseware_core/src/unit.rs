use std::fmt;

/// Lifecycle of one content unit inside the download driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UnitPhase {
    #[default]
    Discovered,
    Triggered,
    Retried,
    Completed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Target folder could not be created.
    Io(String),
    /// The unit itself could not be activated, even after re-locating it.
    Activation(String),
    /// The download control went stale twice.
    StaleControl,
    /// No download control and no page body to capture.
    EmptyPage,
    /// Browser failure while handling the unit.
    Browser(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Io(message) => write!(f, "target folder unavailable: {message}"),
            SkipReason::Activation(message) => write!(f, "unit could not be opened: {message}"),
            SkipReason::StaleControl => write!(f, "download control stale after retry"),
            SkipReason::EmptyPage => write!(f, "no download control and empty page"),
            SkipReason::Browser(message) => write!(f, "browser error: {message}"),
        }
    }
}

/// Observations the driver feeds into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    /// Unit opened and its control lookup is about to start.
    Activated,
    ControlClicked,
    /// Control reference outlived a page refresh.
    ControlStale,
    /// Re-located control clicked successfully.
    RetryClicked,
    RetryFailed,
    /// No download control on this unit.
    ControlMissing,
    /// Rendered page saved in place of a download.
    PageCaptured,
    PageEmpty,
    /// Settle wait elapsed.
    Settled,
    Failed(SkipReason),
}

/// Pure transition function. Events that do not apply to the current phase
/// leave it unchanged; terminal phases never change.
pub fn advance(phase: UnitPhase, event: UnitEvent) -> UnitPhase {
    use UnitEvent as E;
    use UnitPhase as P;

    match (phase, event) {
        (phase @ (P::Completed | P::Skipped(_)), _) => phase,
        (_, E::Failed(reason)) => P::Skipped(reason),
        (P::Discovered, E::Activated) => P::Discovered,
        (P::Discovered, E::ControlClicked) => P::Triggered,
        (P::Discovered, E::ControlStale) => P::Retried,
        (P::Discovered, E::ControlMissing) => P::Discovered,
        (P::Discovered, E::PageCaptured) => P::Triggered,
        (P::Discovered, E::PageEmpty) => P::Skipped(SkipReason::EmptyPage),
        // A retry only counts once the re-located control has been clicked.
        (P::Retried, E::RetryClicked) => P::Retried,
        (P::Retried, E::RetryFailed) => P::Skipped(SkipReason::StaleControl),
        (P::Triggered | P::Retried, E::Settled) => P::Completed,
        (phase, _) => phase,
    }
}

/// Convenience wrapper that records every phase a unit passes through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnitTrace {
    phase: UnitPhase,
    history: Vec<UnitPhase>,
}

impl UnitTrace {
    pub fn new() -> Self {
        Self {
            phase: UnitPhase::Discovered,
            history: vec![UnitPhase::Discovered],
        }
    }

    pub fn apply(&mut self, event: UnitEvent) -> &UnitPhase {
        let next = advance(self.phase.clone(), event);
        if next != self.phase {
            self.history.push(next.clone());
            self.phase = next;
        }
        &self.phase
    }

    pub fn phase(&self) -> &UnitPhase {
        &self.phase
    }

    pub fn history(&self) -> &[UnitPhase] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, UnitPhase::Completed | UnitPhase::Skipped(_))
    }

    pub fn was_retried(&self) -> bool {
        self.history.contains(&UnitPhase::Retried)
    }
}
