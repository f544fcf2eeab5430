//! safecut-core — Session state for the SafeCut hairstyle simulator.
//!
//! Daily free-usage quota, bonus credits earned by sharing, and the
//! welcome → analysis → result wizard. Storage, clipboard and share sheet
//! are injected through the traits in [`kv`], [`clock`] and [`share`].

pub mod clock;
pub mod kv;
pub mod policy;
pub mod share;
pub mod types;
pub mod usage;
pub mod wizard;

pub use clock::{Clock, FixedClock, SystemClock};
pub use kv::{KeyValueStore, MemoryStore, StoreError};
pub use policy::{UsagePolicy, DAILY_LIMIT};
pub use share::{
    Clipboard, NativeShare, ShareChannel, ShareCompletion, ShareError, ShareOutcome,
    SharePayload, ShareStatus,
};
pub use types::{
    AnalysisOptions, AnalysisResult, AttemptId, CapturedImage, Gender, Language,
    StyleRecommendation, UsageRecord, WizardStep,
};
pub use usage::UsageStore;
pub use wizard::{AppState, Modals, WizardAction, WizardEvent, WizardMachine};
