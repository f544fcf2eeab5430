use crate::config::Config;
use safecut_core::share;
use safecut_core::{
    AnalysisOptions, AnalysisResult, AppState, AttemptId, Clipboard, Clock, Gender,
    KeyValueStore, Language, NativeShare, ShareOutcome, SharePayload, SystemClock, UsagePolicy,
    UsageStore, WizardAction, WizardEvent, WizardMachine, WizardStep,
};
use safecut_platform::{open_usage_store, CommandShare, SystemClipboard};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to spawn session thread: {0}")]
    Spawn(std::io::Error),
    #[error("session thread exited")]
    ChannelClosed,
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Everything the session thread owns.
pub struct SessionParts {
    pub store: Box<dyn KeyValueStore>,
    pub clock: Box<dyn Clock>,
    pub policy: UsagePolicy,
    pub language: Language,
    pub app_url: String,
    pub native_share: Option<Box<dyn NativeShare>>,
    pub clipboard: Box<dyn Clipboard>,
}

impl SessionParts {
    /// Production wiring: SQLite storage, wall clock, system clipboard and
    /// the configured share command.
    pub fn from_config(config: &Config) -> Self {
        let native_share = config
            .share_command
            .as_deref()
            .and_then(CommandShare::from_command_line)
            .map(|c| {
                tracing::info!(program = c.program(), "share command configured");
                Box::new(c) as Box<dyn NativeShare>
            });

        Self {
            store: open_usage_store(&config.db_path),
            clock: Box::new(SystemClock),
            policy: UsagePolicy::new(config.daily_limit),
            language: config.language,
            app_url: config.app_url.clone(),
            native_share,
            clipboard: Box::new(SystemClipboard),
        }
    }
}

/// State after an event, plus the work the event triggered.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: AppState,
    pub actions: Vec<WizardAction>,
}

/// Answer to a collaborator's limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitDecision {
    /// Go ahead with these options.
    Allowed(AnalysisOptions),
    /// Quota used up; the limit modal is showing.
    Denied,
    /// The attempt is no longer the active one.
    Stale,
}

/// Messages sent from handles to the session thread.
enum SessionRequest {
    Dispatch {
        event: WizardEvent,
        reply: oneshot::Sender<Transition>,
    },
    Snapshot {
        reply: oneshot::Sender<AppState>,
    },
}

/// Share sheet and clipboard, driven outside the session thread so an open
/// sheet never holds up other requests.
struct Sharing {
    app_url: String,
    ports: Mutex<SharePorts>,
}

struct SharePorts {
    native: Option<Box<dyn NativeShare>>,
    clipboard: Box<dyn Clipboard>,
}

impl Sharing {
    fn invite(&self, language: Language) -> ShareOutcome {
        let payload = SharePayload::new(language, self.app_url.clone());
        let mut guard = self.ports.lock().unwrap_or_else(|e| e.into_inner());
        let ports = &mut *guard;
        share::invite(
            ports.native.as_deref_mut(),
            &mut *ports.clipboard,
            &payload,
            language,
        )
    }
}

/// Clone-safe handle to the session thread.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
    sharing: Arc<Sharing>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionRequest,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Feed one event through the wizard.
    pub async fn dispatch(&self, event: WizardEvent) -> Result<Transition, SessionError> {
        self.request(|reply| SessionRequest::Dispatch { event, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<AppState, SessionError> {
        self.request(|reply| SessionRequest::Snapshot { reply }).await
    }

    pub async fn start(&self) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::Start).await?.state)
    }

    pub async fn agree_privacy(&self) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::AgreePrivacy).await?.state)
    }

    pub async fn cancel_privacy(&self) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::CancelPrivacy).await?.state)
    }

    /// Choose a gender; returns the new attempt if analysis began.
    pub async fn choose_gender(&self, gender: Gender) -> Result<Option<AttemptId>, SessionError> {
        let t = self.dispatch(WizardEvent::ChooseGender(gender)).await?;
        if t.state.step != WizardStep::Analysis {
            return Ok(None);
        }
        Ok(t.state.attempt.map(|a| a.id))
    }

    pub async fn dismiss_gender(&self) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::DismissGender).await?.state)
    }

    /// The `check_limit` predicate handed to the analysis collaborator.
    pub async fn check_limit(&self, attempt: AttemptId) -> Result<LimitDecision, SessionError> {
        let t = self.dispatch(WizardEvent::CheckLimit { attempt }).await?;
        for action in t.actions {
            if let WizardAction::ProceedWithAnalysis { options, .. } = action {
                return Ok(LimitDecision::Allowed(options));
            }
        }
        let still_active = t.state.step == WizardStep::Analysis
            && t.state.attempt.map(|a| a.id) == Some(attempt);
        if still_active && t.state.modals.limit {
            Ok(LimitDecision::Denied)
        } else {
            Ok(LimitDecision::Stale)
        }
    }

    /// Deliver a collaborator result. Returns false if it was discarded.
    pub async fn complete_analysis(
        &self,
        attempt: AttemptId,
        result: AnalysisResult,
    ) -> Result<bool, SessionError> {
        let t = self
            .dispatch(WizardEvent::AnalysisCompleted { attempt, result })
            .await?;
        Ok(t
            .actions
            .iter()
            .any(|a| matches!(a, WizardAction::RecordAnalysis { .. })))
    }

    /// Run the invite flow. The share itself runs on the blocking pool; the
    /// credit is stored before this returns.
    pub async fn invite(&self) -> Result<(ShareOutcome, AppState), SessionError> {
        let language = self.snapshot().await?.language;
        let sharing = Arc::clone(&self.sharing);
        let outcome = tokio::task::spawn_blocking(move || sharing.invite(language)).await?;
        tracing::info!(channel = ?outcome.channel, status = ?outcome.status, "invite finished");

        let t = self
            .dispatch(WizardEvent::ShareFinished {
                outcome: outcome.clone(),
            })
            .await?;
        Ok((outcome, t.state))
    }

    pub async fn dismiss_limit(&self) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::DismissLimit).await?.state)
    }

    pub async fn reset(&self) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::Reset).await?.state)
    }

    pub async fn set_language(&self, language: Language) -> Result<AppState, SessionError> {
        Ok(self.dispatch(WizardEvent::SetLanguage(language)).await?.state)
    }
}

/// State owned by the session thread.
struct Session {
    state: AppState,
    usage: UsageStore<Box<dyn KeyValueStore>, Box<dyn Clock>>,
}

impl Session {
    fn new(
        store: Box<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
        policy: UsagePolicy,
        language: Language,
    ) -> Self {
        let usage = UsageStore::open(store, clock);
        let state = AppState::new(usage.record().clone(), policy, language);
        tracing::info!(
            count = state.usage.count,
            bonus_credits = state.usage.bonus_credits,
            remaining = state.remaining(),
            durable = usage.is_durable(),
            "session ready"
        );
        Self { state, usage }
    }

    fn feed(&mut self, event: WizardEvent) -> Vec<WizardAction> {
        let (next, actions) = WizardMachine::transition(self.state.clone(), event);
        self.state = next;
        actions
    }

    /// Pick up a day change that happened while the session was open.
    fn sync_usage(&mut self) {
        let record = self.usage.refresh();
        if record != self.state.usage {
            self.feed(WizardEvent::UsageSynced(record));
        }
    }

    fn dispatch(&mut self, event: WizardEvent) -> Transition {
        self.sync_usage();
        let limit_was_shown = self.state.modals.limit;
        let actions = self.feed(event);
        for action in &actions {
            self.apply(action);
        }
        if self.state.modals.limit && !limit_was_shown {
            tracing::info!(
                count = self.state.usage.count,
                bonus_credits = self.state.usage.bonus_credits,
                "daily limit reached"
            );
        }
        Transition {
            state: self.state.clone(),
            actions,
        }
    }

    /// Persist first, then let the wizard see the new counters.
    fn apply(&mut self, action: &WizardAction) {
        match action {
            WizardAction::RecordAnalysis { attempt } => {
                let record = self.usage.record_analysis();
                tracing::info!(%attempt, count = record.count, "analysis completed");
                self.feed(WizardEvent::UsageSynced(record));
            }
            WizardAction::GrantCredit => {
                let record = self.usage.grant_credit();
                self.feed(WizardEvent::UsageSynced(record));
            }
            WizardAction::ProceedWithAnalysis { attempt, options } => {
                tracing::debug!(%attempt, gender = %options.gender, "analysis permitted");
            }
            WizardAction::DiscardCompletion { attempt } => {
                tracing::debug!(%attempt, "dropping completion for inactive attempt");
            }
        }
    }
}

/// Spawn the session on a dedicated OS thread.
///
/// Loads usage from storage, then serves requests one at a time, so every
/// usage read-modify-write is serialized.
pub fn spawn_session(parts: SessionParts) -> Result<SessionHandle, SessionError> {
    let (tx, mut rx) = mpsc::channel::<SessionRequest>(16);
    let SessionParts {
        store,
        clock,
        policy,
        language,
        app_url,
        native_share,
        clipboard,
    } = parts;
    let sharing = Arc::new(Sharing {
        app_url,
        ports: Mutex::new(SharePorts {
            native: native_share,
            clipboard,
        }),
    });

    std::thread::Builder::new()
        .name("safecut-session".into())
        .spawn(move || {
            let mut session = Session::new(store, clock, policy, language);
            while let Some(req) = rx.blocking_recv() {
                match req {
                    SessionRequest::Dispatch { event, reply } => {
                        let _ = reply.send(session.dispatch(event));
                    }
                    SessionRequest::Snapshot { reply } => {
                        session.sync_usage();
                        let _ = reply.send(session.state.clone());
                    }
                }
            }
            tracing::debug!("session thread exiting");
        })
        .map_err(SessionError::Spawn)?;

    Ok(SessionHandle { tx, sharing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use safecut_core::usage::{CREDITS_KEY, DATE_KEY, USAGE_KEY};
    use safecut_core::{
        CapturedImage, FixedClock, MemoryStore, ShareChannel, ShareCompletion, ShareError,
        ShareStatus, StoreError, StyleRecommendation,
    };

    #[derive(Clone, Default)]
    struct SharedStore(Arc<Mutex<MemoryStore>>);

    impl SharedStore {
        fn value(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key).unwrap()
        }
    }

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.lock().unwrap().get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.lock().unwrap().set(key, value)
        }
    }

    #[derive(Clone, Default)]
    struct SharedClipboard(Arc<Mutex<Vec<String>>>);

    impl Clipboard for SharedClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), ShareError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct CancellingSheet;

    impl NativeShare for CancellingSheet {
        fn share(&mut self, _payload: &SharePayload) -> Result<ShareCompletion, ShareError> {
            Ok(ShareCompletion::Cancelled)
        }
    }

    /// Sheet that stays open until the test lets it close.
    struct HeldSheet {
        opened: Option<oneshot::Sender<()>>,
        close: std::sync::mpsc::Receiver<()>,
    }

    impl NativeShare for HeldSheet {
        fn share(&mut self, _payload: &SharePayload) -> Result<ShareCompletion, ShareError> {
            if let Some(opened) = self.opened.take() {
                let _ = opened.send(());
            }
            self.close.recv().unwrap();
            Ok(ShareCompletion::Completed)
        }
    }

    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    struct Fixture {
        store: SharedStore,
        clipboard: SharedClipboard,
        clock: FixedClock,
    }

    impl Fixture {
        fn new(store: MemoryStore) -> Self {
            Self {
                store: SharedStore(Arc::new(Mutex::new(store))),
                clipboard: SharedClipboard::default(),
                clock: FixedClock::new(june(10)),
            }
        }

        fn spawn(&self, native: Option<Box<dyn NativeShare>>) -> SessionHandle {
            spawn_session(SessionParts {
                store: Box::new(self.store.clone()),
                clock: Box::new(self.clock.clone()),
                policy: UsagePolicy::default(),
                language: Language::En,
                app_url: "https://example.test/safecut".into(),
                native_share: native,
                clipboard: Box::new(self.clipboard.clone()),
            })
            .unwrap()
        }
    }

    fn exhausted() -> MemoryStore {
        MemoryStore::with_entries([(DATE_KEY, "2025-06-10"), (USAGE_KEY, "5")])
    }

    fn result(gender: Gender) -> AnalysisResult {
        AnalysisResult {
            recommendation: StyleRecommendation(serde_json::json!({ "styles": ["layered bob"] })),
            image: Some(CapturedImage::new("image/png", vec![0x89, 0x50])),
            options: AnalysisOptions::new(gender),
        }
    }

    async fn enter_analysis(handle: &SessionHandle, gender: Gender) -> AttemptId {
        handle.start().await.unwrap();
        handle.agree_privacy().await.unwrap();
        handle.choose_gender(gender).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_full_flow_records_usage_once() {
        let fx = Fixture::new(MemoryStore::new());
        let handle = fx.spawn(None);

        let attempt = enter_analysis(&handle, Gender::Male).await;
        assert_eq!(
            handle.check_limit(attempt).await.unwrap(),
            LimitDecision::Allowed(AnalysisOptions::new(Gender::Male))
        );
        assert!(handle.complete_analysis(attempt, result(Gender::Male)).await.unwrap());
        assert!(!handle.complete_analysis(attempt, result(Gender::Male)).await.unwrap());

        let state = handle.snapshot().await.unwrap();
        assert_eq!(state.step, WizardStep::Result);
        assert_eq!(state.usage.count, 1);
        assert_eq!(state.result.unwrap().options.gender, Gender::Male);
        assert_eq!(fx.store.value(USAGE_KEY).as_deref(), Some("1"));

        let state = handle.reset().await.unwrap();
        assert_eq!(state.step, WizardStep::Welcome);
        assert!(state.result.is_none());
        assert!(!state.modals.any());
    }

    #[tokio::test]
    async fn test_limit_then_clipboard_invite_then_retry() {
        let fx = Fixture::new(exhausted());
        let handle = fx.spawn(None);

        let attempt = enter_analysis(&handle, Gender::Female).await;
        assert_eq!(handle.check_limit(attempt).await.unwrap(), LimitDecision::Denied);
        assert!(handle.snapshot().await.unwrap().modals.limit);
        assert_eq!(fx.store.value(USAGE_KEY).as_deref(), Some("5"));

        let (outcome, state) = handle.invite().await.unwrap();
        assert_eq!(outcome.channel, ShareChannel::Clipboard);
        assert!(outcome.notice.is_some());
        assert_eq!(
            fx.clipboard.0.lock().unwrap().as_slice(),
            ["https://example.test/safecut".to_string()]
        );
        assert!(!state.modals.limit);
        assert_eq!(state.step, WizardStep::Analysis);
        assert_eq!(state.usage.bonus_credits, 1);
        assert_eq!(fx.store.value(CREDITS_KEY).as_deref(), Some("1"));

        assert!(matches!(
            handle.check_limit(attempt).await.unwrap(),
            LimitDecision::Allowed(_)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_native_share_still_grants() {
        let fx = Fixture::new(MemoryStore::new());
        let handle = fx.spawn(Some(Box::new(CancellingSheet)));

        let (outcome, state) = handle.invite().await.unwrap();
        assert_eq!(outcome.channel, ShareChannel::Native);
        assert_eq!(outcome.status, ShareStatus::Cancelled);
        assert_eq!(state.usage.bonus_credits, 1);
        assert!(fx.clipboard.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_after_reset_is_ignored() {
        let fx = Fixture::new(MemoryStore::new());
        let handle = fx.spawn(None);

        let attempt = enter_analysis(&handle, Gender::Male).await;
        handle.check_limit(attempt).await.unwrap();
        handle.reset().await.unwrap();

        assert!(!handle.complete_analysis(attempt, result(Gender::Male)).await.unwrap());
        let state = handle.snapshot().await.unwrap();
        assert_eq!(state.step, WizardStep::Welcome);
        assert_eq!(state.usage.count, 0);
        assert_eq!(handle.check_limit(attempt).await.unwrap(), LimitDecision::Stale);
    }

    #[tokio::test]
    async fn test_yesterdays_usage_is_reset_on_start() {
        let fx = Fixture::new(MemoryStore::with_entries([
            (DATE_KEY, "2025-06-09"),
            (USAGE_KEY, "5"),
            (CREDITS_KEY, "2"),
        ]));
        let handle = fx.spawn(None);

        let state = handle.snapshot().await.unwrap();
        assert_eq!(state.usage.count, 0);
        assert_eq!(state.usage.bonus_credits, 2);
        assert!(state.is_allowed());
    }

    #[tokio::test]
    async fn test_day_change_while_open_restores_quota() {
        let fx = Fixture::new(exhausted());
        let handle = fx.spawn(None);

        let attempt = enter_analysis(&handle, Gender::Male).await;
        assert_eq!(handle.check_limit(attempt).await.unwrap(), LimitDecision::Denied);
        handle.dismiss_limit().await.unwrap();

        fx.clock.advance_days(1);
        assert!(matches!(
            handle.check_limit(attempt).await.unwrap(),
            LimitDecision::Allowed(_)
        ));
        assert_eq!(fx.store.value(DATE_KEY).as_deref(), Some("2025-06-11"));
    }

    #[tokio::test]
    async fn test_choose_gender_without_modal_returns_none() {
        let fx = Fixture::new(MemoryStore::new());
        let handle = fx.spawn(None);
        assert_eq!(handle.choose_gender(Gender::Male).await.unwrap(), None);

        handle.start().await.unwrap();
        let state = handle.cancel_privacy().await.unwrap();
        assert!(!state.modals.any());
    }

    #[tokio::test]
    async fn test_handles_share_one_session() {
        let fx = Fixture::new(MemoryStore::new());
        let handle = fx.spawn(None);
        let other = handle.clone();

        handle.set_language(Language::Ko).await.unwrap();
        assert_eq!(other.snapshot().await.unwrap().language, Language::Ko);
    }

    #[tokio::test]
    async fn test_open_share_sheet_does_not_block_session() {
        let fx = Fixture::new(MemoryStore::new());
        let (opened_tx, opened_rx) = oneshot::channel();
        let (close_tx, close_rx) = std::sync::mpsc::channel();
        let handle = fx.spawn(Some(Box::new(HeldSheet {
            opened: Some(opened_tx),
            close: close_rx,
        })));

        let inviter = handle.clone();
        let pending = tokio::spawn(async move { inviter.invite().await });
        opened_rx.await.unwrap();

        let state = handle.set_language(Language::Ko).await.unwrap();
        assert_eq!(state.language, Language::Ko);
        assert_eq!(state.usage.bonus_credits, 0);
        let state = handle.start().await.unwrap();
        assert!(state.modals.privacy);

        close_tx.send(()).unwrap();
        let (outcome, state) = pending.await.unwrap().unwrap();
        assert_eq!(outcome.status, ShareStatus::Completed);
        assert_eq!(state.usage.bonus_credits, 1);
        assert_eq!(fx.store.value(CREDITS_KEY).as_deref(), Some("1"));
    }
}
