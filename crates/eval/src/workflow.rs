//! Workflow dispatch: caller-registered side effects over an evaluation.
//!
//! Stages are strictly ordered and never reorder:
//! before_evaluation, then (after the evaluator has run) after_evaluation,
//! on_pass or on_fail, on_excellent (score >= 90) or on_good
//! (80 <= score < 90), conditional callbacks whose predicate matches, and
//! score-range callbacks whose bounds contain the score. All matching
//! callbacks at a stage run, in registration order.
//!
//! Two dispatch modes: Sync blocks the evaluation until the callback
//! returns; Queued hands the invocation to the injected task queue and
//! the engine's responsibility ends at enqueue.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::WorkflowConfig;
use crate::types::{EvalError, EvaluationResult};

/// One of the fixed dispatch points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    BeforeEvaluation,
    AfterEvaluation,
    OnPass,
    OnFail,
    OnExcellent,
    OnGood,
    Conditional,
    ScoreRange,
}

impl WorkflowStage {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStage::BeforeEvaluation => "before_evaluation",
            WorkflowStage::AfterEvaluation => "after_evaluation",
            WorkflowStage::OnPass => "on_pass",
            WorkflowStage::OnFail => "on_fail",
            WorkflowStage::OnExcellent => "on_excellent",
            WorkflowStage::OnGood => "on_good",
            WorkflowStage::Conditional => "conditional",
            WorkflowStage::ScoreRange => "score_range",
        }
    }
}

/// What a callback sees. `result` is None only at before_evaluation.
#[derive(Clone)]
pub struct CallbackContext {
    pub criteria_id: String,
    pub record: serde_json::Value,
    pub result: Option<EvaluationResult>,
}

/// Callback signature. An `Err` is a callback failure, handled per the
/// configured failure policy.
pub type CallbackFn = dyn Fn(&CallbackContext) -> Result<(), String> + Send + Sync;

/// Predicate for conditional callbacks.
pub type ConditionFn = dyn Fn(&EvaluationResult) -> bool + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sync,
    Queued,
}

/// A queued callback invocation: the message handed to the task queue.
pub struct CallbackJob {
    pub name: String,
    pub stage: WorkflowStage,
    pub context: CallbackContext,
    handler: Arc<CallbackFn>,
}

impl CallbackJob {
    pub fn run(&self) -> Result<(), String> {
        (self.handler)(&self.context)
    }
}

/// The queue seam. Ordering and retry of queued callbacks is the
/// queue's contract, not the engine's.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, job: CallbackJob) -> Result<(), String>;
}

/// Queue backed by `tokio::spawn`. Callback failures are logged; they
/// never propagate into the evaluation that enqueued them.
#[derive(Default)]
pub struct TokioTaskQueue;

impl TokioTaskQueue {
    pub fn new() -> TokioTaskQueue {
        TokioTaskQueue
    }
}

#[async_trait]
impl TaskQueue for TokioTaskQueue {
    async fn enqueue(&self, job: CallbackJob) -> Result<(), String> {
        tokio::spawn(async move {
            if let Err(message) = job.run() {
                tracing::warn!(
                    callback = %job.name,
                    stage = job.stage.name(),
                    %message,
                    "queued callback failed"
                );
            }
        });
        Ok(())
    }
}

/// Queue that records jobs without running them. For tests and for
/// embedders that drain jobs into their own worker.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<CallbackJob>>,
}

impl RecordingQueue {
    pub fn new() -> RecordingQueue {
        RecordingQueue::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) -> Vec<CallbackJob> {
        std::mem::take(&mut *self.jobs.lock().expect("queue poisoned"))
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, job: CallbackJob) -> Result<(), String> {
        self.jobs.lock().expect("queue poisoned").push(job);
        Ok(())
    }
}

/// Record of one callback dispatch, for audit.
#[derive(Debug, Clone)]
pub struct CallbackExecution {
    pub name: String,
    pub stage: &'static str,
    pub mode: DispatchMode,
    /// "ok", "queued", or "error: ...".
    pub outcome: String,
}

#[derive(Clone)]
struct Registered {
    name: String,
    mode: DispatchMode,
    handler: Arc<CallbackFn>,
    condition: Option<Arc<ConditionFn>>,
    range: Option<(Decimal, Decimal)>,
}

#[derive(Default)]
struct StageTable {
    before: Vec<Registered>,
    after: Vec<Registered>,
    on_pass: Vec<Registered>,
    on_fail: Vec<Registered>,
    excellent: Vec<Registered>,
    good: Vec<Registered>,
    conditional: Vec<Registered>,
    score_range: Vec<Registered>,
}

/// Callback registry plus stage dispatcher.
#[derive(Default)]
pub struct WorkflowManager {
    table: RwLock<StageTable>,
}

const EXCELLENT_FLOOR: Decimal = Decimal::from_parts(90, 0, 0, false, 0);
const GOOD_FLOOR: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

impl WorkflowManager {
    pub fn new() -> WorkflowManager {
        WorkflowManager::default()
    }

    pub fn before_evaluation<F>(&self, name: &str, mode: DispatchMode, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(|t| &mut t.before, name, mode, callback, None, None);
    }

    pub fn after_evaluation<F>(&self, name: &str, mode: DispatchMode, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(|t| &mut t.after, name, mode, callback, None, None);
    }

    pub fn on_pass<F>(&self, name: &str, mode: DispatchMode, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(|t| &mut t.on_pass, name, mode, callback, None, None);
    }

    pub fn on_fail<F>(&self, name: &str, mode: DispatchMode, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(|t| &mut t.on_fail, name, mode, callback, None, None);
    }

    pub fn on_excellent<F>(&self, name: &str, mode: DispatchMode, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(|t| &mut t.excellent, name, mode, callback, None, None);
    }

    pub fn on_good<F>(&self, name: &str, mode: DispatchMode, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(|t| &mut t.good, name, mode, callback, None, None);
    }

    pub fn on_condition<F, P>(&self, name: &str, mode: DispatchMode, predicate: P, callback: F)
    where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
        P: Fn(&EvaluationResult) -> bool + Send + Sync + 'static,
    {
        self.push(
            |t| &mut t.conditional,
            name,
            mode,
            callback,
            Some(Arc::new(predicate)),
            None,
        );
    }

    /// Bounds are inclusive at both ends.
    pub fn on_score_range<F>(
        &self,
        name: &str,
        mode: DispatchMode,
        min: impl Into<Decimal>,
        max: impl Into<Decimal>,
        callback: F,
    ) where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.push(
            |t| &mut t.score_range,
            name,
            mode,
            callback,
            None,
            Some((min.into(), max.into())),
        );
    }

    fn push<F>(
        &self,
        select: fn(&mut StageTable) -> &mut Vec<Registered>,
        name: &str,
        mode: DispatchMode,
        callback: F,
        condition: Option<Arc<ConditionFn>>,
        range: Option<(Decimal, Decimal)>,
    ) where
        F: Fn(&CallbackContext) -> Result<(), String> + Send + Sync + 'static,
    {
        let mut table = self.table.write().expect("workflow table poisoned");
        select(&mut table).push(Registered {
            name: name.to_string(),
            mode,
            handler: Arc::new(callback),
            condition,
            range,
        });
    }

    /// Dispatch the before_evaluation stage. `context.result` is None.
    pub async fn dispatch_before(
        &self,
        context: &CallbackContext,
        queue: &dyn TaskQueue,
        policy: &WorkflowConfig,
    ) -> Result<Vec<CallbackExecution>, EvalError> {
        let matched: Vec<Registered> = {
            let table = self.table.read().expect("workflow table poisoned");
            table.before.clone()
        };
        let staged = matched
            .into_iter()
            .map(|r| (WorkflowStage::BeforeEvaluation, r))
            .collect();
        self.run(staged, context, queue, policy).await
    }

    /// Dispatch every post-result stage in the fixed order.
    pub async fn dispatch_result(
        &self,
        context: &CallbackContext,
        queue: &dyn TaskQueue,
        policy: &WorkflowConfig,
    ) -> Result<Vec<CallbackExecution>, EvalError> {
        let result = context
            .result
            .as_ref()
            .expect("dispatch_result requires a result");
        let staged = {
            let table = self.table.read().expect("workflow table poisoned");
            let mut staged: Vec<(WorkflowStage, Registered)> = Vec::new();

            for r in &table.after {
                staged.push((WorkflowStage::AfterEvaluation, r.clone()));
            }
            if result.passed {
                for r in &table.on_pass {
                    staged.push((WorkflowStage::OnPass, r.clone()));
                }
            } else {
                for r in &table.on_fail {
                    staged.push((WorkflowStage::OnFail, r.clone()));
                }
            }
            if result.score >= EXCELLENT_FLOOR {
                for r in &table.excellent {
                    staged.push((WorkflowStage::OnExcellent, r.clone()));
                }
            } else if result.score >= GOOD_FLOOR {
                for r in &table.good {
                    staged.push((WorkflowStage::OnGood, r.clone()));
                }
            }
            for r in &table.conditional {
                let matches = r.condition.as_ref().map(|p| p(result)).unwrap_or(true);
                if matches {
                    staged.push((WorkflowStage::Conditional, r.clone()));
                }
            }
            for r in &table.score_range {
                if let Some((min, max)) = r.range {
                    if result.score >= min && result.score <= max {
                        staged.push((WorkflowStage::ScoreRange, r.clone()));
                    }
                }
            }
            staged
        };
        self.run(staged, context, queue, policy).await
    }

    async fn run(
        &self,
        staged: Vec<(WorkflowStage, Registered)>,
        context: &CallbackContext,
        queue: &dyn TaskQueue,
        policy: &WorkflowConfig,
    ) -> Result<Vec<CallbackExecution>, EvalError> {
        let mut executions = Vec::with_capacity(staged.len());
        for (stage, registered) in staged {
            match registered.mode {
                DispatchMode::Sync => match (registered.handler)(context) {
                    Ok(()) => executions.push(CallbackExecution {
                        name: registered.name,
                        stage: stage.name(),
                        mode: DispatchMode::Sync,
                        outcome: "ok".to_string(),
                    }),
                    Err(message) => {
                        if policy.fail_on_callback_error {
                            return Err(EvalError::Callback {
                                stage: stage.name().to_string(),
                                name: registered.name,
                                message,
                            });
                        }
                        if policy.log_callback_errors {
                            tracing::warn!(
                                callback = %registered.name,
                                stage = stage.name(),
                                %message,
                                "callback failed, continuing"
                            );
                        }
                        executions.push(CallbackExecution {
                            name: registered.name,
                            stage: stage.name(),
                            mode: DispatchMode::Sync,
                            outcome: format!("error: {}", message),
                        });
                    }
                },
                DispatchMode::Queued => {
                    let job = CallbackJob {
                        name: registered.name.clone(),
                        stage,
                        context: context.clone(),
                        handler: Arc::clone(&registered.handler),
                    };
                    match queue.enqueue(job).await {
                        Ok(()) => executions.push(CallbackExecution {
                            name: registered.name,
                            stage: stage.name(),
                            mode: DispatchMode::Queued,
                            outcome: "queued".to_string(),
                        }),
                        Err(message) => {
                            if policy.fail_on_callback_error {
                                return Err(EvalError::Queue { message });
                            }
                            if policy.log_callback_errors {
                                tracing::warn!(
                                    callback = %registered.name,
                                    stage = stage.name(),
                                    %message,
                                    "enqueue failed, continuing"
                                );
                            }
                            executions.push(CallbackExecution {
                                name: registered.name,
                                stage: stage.name(),
                                mode: DispatchMode::Queued,
                                outcome: format!("error: {}", message),
                            });
                        }
                    }
                }
            }
        }
        Ok(executions)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn result_with(score: i64, passed: bool) -> EvaluationResult {
        EvaluationResult {
            criteria_id: "c1".to_string(),
            criteria_slug: "c1".to_string(),
            passed,
            score: Decimal::from(score),
            threshold: Decimal::from(70),
            decision: if passed { "Approved" } else { "Rejected" }.to_string(),
            rule_outcomes: vec![],
            failed_rules: vec![],
            evaluated_at: "2026-01-01T00:00:00Z".to_string(),
            from_cache: false,
        }
    }

    fn context(score: i64, passed: bool) -> CallbackContext {
        CallbackContext {
            criteria_id: "c1".to_string(),
            record: serde_json::json!({}),
            result: Some(result_with(score, passed)),
        }
    }

    fn recorder(log: Arc<Mutex<Vec<String>>>, name: &'static str) -> impl Fn(&CallbackContext) -> Result<(), String> {
        move |_ctx| {
            log.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn stages_run_in_fixed_order() {
        let wf = WorkflowManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let policy = WorkflowConfig::default();
        let queue = RecordingQueue::new();

        wf.on_score_range("range", DispatchMode::Sync, 90, 100, recorder(log.clone(), "range"));
        wf.on_condition("cond", DispatchMode::Sync, |r| r.passed, recorder(log.clone(), "cond"));
        wf.on_excellent("excellent", DispatchMode::Sync, recorder(log.clone(), "excellent"));
        wf.on_pass("pass", DispatchMode::Sync, recorder(log.clone(), "pass"));
        wf.after_evaluation("after", DispatchMode::Sync, recorder(log.clone(), "after"));

        let executions = wf
            .dispatch_result(&context(95, true), &queue, &policy)
            .await
            .unwrap();

        // Registration order is scrambled above; stage order still holds.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["after", "pass", "excellent", "cond", "range"]
        );
        assert_eq!(executions.len(), 5);
    }

    #[tokio::test]
    async fn registration_order_within_a_stage() {
        let wf = WorkflowManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        wf.on_fail("first", DispatchMode::Sync, recorder(log.clone(), "first"));
        wf.on_fail("second", DispatchMode::Sync, recorder(log.clone(), "second"));

        wf.dispatch_result(&context(10, false), &RecordingQueue::new(), &WorkflowConfig::default())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn excellent_and_good_are_exclusive() {
        let wf = WorkflowManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        wf.on_excellent("excellent", DispatchMode::Sync, recorder(log.clone(), "excellent"));
        wf.on_good("good", DispatchMode::Sync, recorder(log.clone(), "good"));

        let queue = RecordingQueue::new();
        let policy = WorkflowConfig::default();
        wf.dispatch_result(&context(90, true), &queue, &policy).await.unwrap();
        wf.dispatch_result(&context(85, true), &queue, &policy).await.unwrap();
        wf.dispatch_result(&context(79, false), &queue, &policy).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["excellent", "good"]);
    }

    #[tokio::test]
    async fn score_range_bounds_inclusive() {
        let wf = WorkflowManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        wf.on_score_range("mid", DispatchMode::Sync, 60, 80, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let queue = RecordingQueue::new();
        let policy = WorkflowConfig::default();
        for score in [59, 60, 80, 81] {
            wf.dispatch_result(&context(score, false), &queue, &policy).await.unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_policy_log_and_continue() {
        let wf = WorkflowManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        wf.after_evaluation("boom", DispatchMode::Sync, |_| Err("kaput".to_string()));
        wf.after_evaluation("next", DispatchMode::Sync, recorder(log.clone(), "next"));

        let executions = wf
            .dispatch_result(&context(50, false), &RecordingQueue::new(), &WorkflowConfig::default())
            .await
            .unwrap();

        // The failing callback is recorded and the next one still ran.
        assert_eq!(executions[0].outcome, "error: kaput");
        assert_eq!(*log.lock().unwrap(), vec!["next"]);
    }

    #[tokio::test]
    async fn failure_policy_abort() {
        let wf = WorkflowManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        wf.after_evaluation("boom", DispatchMode::Sync, |_| Err("kaput".to_string()));
        wf.after_evaluation("next", DispatchMode::Sync, recorder(log.clone(), "next"));

        let policy = WorkflowConfig {
            fail_on_callback_error: true,
            log_callback_errors: false,
        };
        let err = wf
            .dispatch_result(&context(50, false), &RecordingQueue::new(), &policy)
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::Callback { name, .. } if name == "boom"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn queued_callbacks_enqueue_without_running() {
        let wf = WorkflowManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        wf.on_pass("notify", DispatchMode::Queued, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let queue = RecordingQueue::new();
        let executions = wf
            .dispatch_result(&context(100, true), &queue, &WorkflowConfig::default())
            .await
            .unwrap();

        assert_eq!(executions[0].outcome, "queued");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 1);

        // Draining runs the handler with the captured context.
        for job in queue.drain() {
            job.run().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn before_stage_sees_no_result() {
        let wf = WorkflowManager::new();
        let saw_result = Arc::new(Mutex::new(None));
        let s = saw_result.clone();
        wf.before_evaluation("probe", DispatchMode::Sync, move |ctx| {
            *s.lock().unwrap() = Some(ctx.result.is_some());
            Ok(())
        });

        let ctx = CallbackContext {
            criteria_id: "c1".to_string(),
            record: serde_json::json!({"income": 1}),
            result: None,
        };
        wf.dispatch_before(&ctx, &RecordingQueue::new(), &WorkflowConfig::default())
            .await
            .unwrap();
        assert_eq!(*saw_result.lock().unwrap(), Some(false));
    }
}
