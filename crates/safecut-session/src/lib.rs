//! safecut-session — Single-owner session controller.
//!
//! One OS thread owns the wizard state and the usage store; async callers
//! talk to it through a clone-safe [`SessionHandle`].

pub mod analysis;
pub mod config;
pub mod controller;

pub use analysis::{run_analysis, AnalysisOutput, AnalysisRequest, AnalysisRun, Analyzer, AnalyzerError};
pub use config::Config;
pub use controller::{
    spawn_session, LimitDecision, SessionError, SessionHandle, SessionParts, Transition,
};
