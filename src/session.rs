//! In-memory triage session: one analysis in flight at a time.
//!
//! **Why this exists**: a submission is slow (the backend runs image and
//! language models) and the interactive front end must not fire a second
//! request while the first is pending. The session:
//! - rejects overlapping submissions with `SessionError::Busy`
//! - exposes the in-flight submission for display (`current_submission()`)
//! - owns the cancellation token of that submission (`cancel()`)
//! - remembers the last successful result so a follow-up can reference it
//!
//! Nothing here is persisted; dropping the session forgets everything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::triage::{AnalysisError, AnalysisResult, ImageUpload, TriageAnalyzer};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Snapshot of the submission currently in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveSubmission {
    /// Session-local identifier, for log correlation only.
    pub submission_id: Uuid,
    /// Prior case this submission follows up on.
    pub follow_up_case_id: Option<String>,
    /// When the submission started (ISO 8601).
    pub started_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("An analysis is already in progress")]
    Busy,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

// ═══════════════════════════════════════════════════════════
// TriageSession
// ═══════════════════════════════════════════════════════════

pub struct TriageSession {
    busy: AtomicBool,
    current: Mutex<Option<InFlight>>,
    last_result: Mutex<Option<AnalysisResult>>,
}

struct InFlight {
    submission: ActiveSubmission,
    cancel: CancellationToken,
}

impl TriageSession {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            current: Mutex::new(None),
            last_result: Mutex::new(None),
        }
    }

    /// Run one submission through `analyzer`.
    ///
    /// Fails immediately with `Busy` (and sends nothing) while another
    /// submission from this session is still pending.
    pub async fn submit<A>(
        &self,
        analyzer: &A,
        symptom_description: &str,
        image: ImageUpload,
        follow_up_case_id: Option<String>,
    ) -> Result<AnalysisResult, SessionError>
    where
        A: TriageAnalyzer + ?Sized,
    {
        let guard = self
            .try_begin(follow_up_case_id.clone())
            .ok_or(SessionError::Busy)?;

        let outcome = analyzer
            .analyze(symptom_description, image, follow_up_case_id, &guard.cancel)
            .await;
        drop(guard);

        let result = outcome?;
        if let Ok(mut last) = self.last_result.lock() {
            *last = Some(result.clone());
        }
        Ok(result)
    }

    /// Submit a follow-up to the last successful result. Falls back to a
    /// fresh case when there is none yet.
    pub async fn submit_follow_up<A>(
        &self,
        analyzer: &A,
        symptom_description: &str,
        image: ImageUpload,
    ) -> Result<AnalysisResult, SessionError>
    where
        A: TriageAnalyzer + ?Sized,
    {
        let case_id = self.last_case_id();
        self.submit(analyzer, symptom_description, image, case_id).await
    }

    /// Cancel the in-flight submission. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        match self.current.lock() {
            Ok(current) => match current.as_ref() {
                Some(in_flight) => {
                    tracing::info!(
                        submission_id = %in_flight.submission.submission_id,
                        "Cancelling analysis"
                    );
                    in_flight.cancel.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// What is in flight right now? `None` when idle.
    pub fn current_submission(&self) -> Option<ActiveSubmission> {
        let current = self.current.lock().ok()?;
        current.as_ref().map(|f| f.submission.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn last_result(&self) -> Option<AnalysisResult> {
        self.last_result.lock().ok()?.clone()
    }

    /// `case_id` of the most recent successful result.
    pub fn last_case_id(&self) -> Option<String> {
        self.last_result
            .lock()
            .ok()?
            .as_ref()
            .and_then(|r| r.case_id.clone())
    }

    // ── Internal ────────────────────────────────────────────

    fn try_begin(&self, follow_up_case_id: Option<String>) -> Option<SubmissionGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;

        let cancel = CancellationToken::new();
        let submission = ActiveSubmission {
            submission_id: Uuid::new_v4(),
            follow_up_case_id,
            started_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Ok(mut current) = self.current.lock() {
            *current = Some(InFlight {
                submission,
                cancel: cancel.clone(),
            });
        }
        Some(SubmissionGuard {
            session: self,
            cancel,
        })
    }

    fn finish(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl Default for TriageSession {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// SubmissionGuard: RAII in-flight marker
// ═══════════════════════════════════════════════════════════

/// Dropping the guard releases the session for the next submission, even
/// when the submitting future itself is dropped mid-flight.
struct SubmissionGuard<'a> {
    session: &'a TriageSession,
    cancel: CancellationToken,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.session.finish();
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
