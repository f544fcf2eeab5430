//! Wizard state machine.
//!
//! Pure transition function over [`AppState`]: every user action and
//! collaborator callback is a [`WizardEvent`], and persistence work the
//! caller must perform comes back as [`WizardAction`]s. Usage counters are
//! only changed through [`WizardEvent::UsageSynced`], after the caller has
//! written them to storage.

use crate::policy::UsagePolicy;
use crate::share::ShareOutcome;
use crate::types::{
    AnalysisOptions, AnalysisResult, AttemptId, Gender, Language, UsageRecord, WizardStep,
};
use serde::Serialize;

/// Modal overlays. Independent of the step underneath.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Modals {
    pub privacy: bool,
    pub gender: bool,
    pub limit: bool,
}

impl Modals {
    pub fn any(&self) -> bool {
        self.privacy || self.gender || self.limit
    }
}

/// The analysis attempt opened by the last gender choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub id: AttemptId,
    /// Set once a limit check has passed for this attempt.
    pub permitted: bool,
}

/// Whole application state: step, overlays, usage snapshot and result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppState {
    pub step: WizardStep,
    pub modals: Modals,
    pub language: Language,
    pub selected_gender: Option<Gender>,
    pub attempt: Option<Attempt>,
    pub result: Option<AnalysisResult>,
    pub usage: UsageRecord,
    pub policy: UsagePolicy,
    next_attempt: u64,
}

impl AppState {
    /// Initial state: Welcome, nothing shown, usage as loaded from storage.
    pub fn new(usage: UsageRecord, policy: UsagePolicy, language: Language) -> Self {
        Self {
            step: WizardStep::Welcome,
            modals: Modals::default(),
            language,
            selected_gender: None,
            attempt: None,
            result: None,
            usage,
            policy,
            next_attempt: 1,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.policy.is_allowed(&self.usage)
    }

    pub fn remaining(&self) -> i64 {
        self.policy.remaining(&self.usage)
    }

    /// Options for the active attempt, if analysis is underway.
    pub fn analysis_options(&self) -> Option<AnalysisOptions> {
        match (self.step, self.selected_gender) {
            (WizardStep::Analysis, Some(gender)) => Some(AnalysisOptions::new(gender)),
            _ => None,
        }
    }

    fn is_active(&self, attempt: AttemptId) -> bool {
        self.step == WizardStep::Analysis && self.attempt.map(|a| a.id) == Some(attempt)
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    /// Start button on the welcome screen.
    Start,
    AgreePrivacy,
    CancelPrivacy,
    ChooseGender(Gender),
    /// Gender modal closed without a choice.
    DismissGender,
    /// The analysis collaborator asks whether it may run.
    CheckLimit { attempt: AttemptId },
    AnalysisCompleted {
        attempt: AttemptId,
        result: AnalysisResult,
    },
    /// An invite finished through any channel. Every outcome, cancelled
    /// or failed included, earns a credit.
    ShareFinished { outcome: ShareOutcome },
    /// Limit modal closed without sharing.
    DismissLimit,
    /// Result screen "try again": back to a clean welcome.
    Reset,
    SetLanguage(Language),
    /// Usage counters after the caller persisted a change.
    UsageSynced(UsageRecord),
}

/// Work the caller performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardAction {
    /// Limit check passed; the collaborator may run with these options.
    ProceedWithAnalysis {
        attempt: AttemptId,
        options: AnalysisOptions,
    },
    /// Persist one more analysis, then feed back `UsageSynced`.
    RecordAnalysis { attempt: AttemptId },
    /// Persist one more bonus credit, then feed back `UsageSynced`.
    GrantCredit,
    /// A completion did not match an open, permitted attempt and was dropped.
    DiscardCompletion { attempt: AttemptId },
}

/// Pure wizard state machine.
pub struct WizardMachine;

impl WizardMachine {
    pub fn transition(mut state: AppState, event: WizardEvent) -> (AppState, Vec<WizardAction>) {
        match event {
            WizardEvent::Start => {
                if state.step == WizardStep::Welcome && !state.modals.gender {
                    state.modals.privacy = true;
                }
                (state, Vec::new())
            }
            WizardEvent::AgreePrivacy => {
                if state.modals.privacy {
                    state.modals.privacy = false;
                    state.modals.gender = true;
                }
                (state, Vec::new())
            }
            WizardEvent::CancelPrivacy => {
                state.modals.privacy = false;
                (state, Vec::new())
            }
            WizardEvent::ChooseGender(gender) => {
                if !state.modals.gender {
                    return (state, Vec::new());
                }
                state.modals.gender = false;
                state.selected_gender = Some(gender);
                state.step = WizardStep::Analysis;
                state.attempt = Some(Attempt {
                    id: AttemptId(state.next_attempt),
                    permitted: false,
                });
                state.next_attempt += 1;
                (state, Vec::new())
            }
            WizardEvent::DismissGender => {
                state.modals.gender = false;
                (state, Vec::new())
            }
            WizardEvent::CheckLimit { attempt } => {
                if !state.is_active(attempt) {
                    return (state, Vec::new());
                }
                if !state.is_allowed() {
                    state.modals.limit = true;
                    return (state, Vec::new());
                }
                let Some(options) = state.analysis_options() else {
                    return (state, Vec::new());
                };
                state.attempt = Some(Attempt {
                    id: attempt,
                    permitted: true,
                });
                (
                    state,
                    vec![WizardAction::ProceedWithAnalysis { attempt, options }],
                )
            }
            WizardEvent::AnalysisCompleted { attempt, result } => {
                let permitted = state.attempt.map(|a| a.permitted).unwrap_or(false);
                if !state.is_active(attempt) || !permitted {
                    return (state, vec![WizardAction::DiscardCompletion { attempt }]);
                }
                state.attempt = None;
                state.result = Some(result);
                state.step = WizardStep::Result;
                (state, vec![WizardAction::RecordAnalysis { attempt }])
            }
            WizardEvent::ShareFinished { .. } => {
                state.modals.limit = false;
                (state, vec![WizardAction::GrantCredit])
            }
            WizardEvent::DismissLimit => {
                state.modals.limit = false;
                (state, Vec::new())
            }
            WizardEvent::Reset => {
                state.step = WizardStep::Welcome;
                state.modals = Modals::default();
                state.selected_gender = None;
                state.attempt = None;
                state.result = None;
                (state, Vec::new())
            }
            WizardEvent::SetLanguage(language) => {
                state.language = language;
                (state, Vec::new())
            }
            WizardEvent::UsageSynced(usage) => {
                state.usage = usage;
                (state, Vec::new())
            }
        }
    }
}
