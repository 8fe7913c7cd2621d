//! Eligo evaluation engine -- criteria + input record in, decision out.
//!
//! The engine orchestrates the full pipeline: resolve the criteria
//! through the storage collaborator, compile its rules, probe the result
//! cache, evaluate on a miss, fire workflow callbacks, and record
//! snapshots and audit entries. Evaluation itself is a pure computation;
//! everything stateful lives at the seams (store, cache, queue), which
//! is what lets concurrent evaluations run without coordination.

pub mod audit;
pub mod cache;
pub mod compile;
pub mod config;
pub mod evaluate;
pub mod numeric;
pub mod operator;
pub mod scoring;
pub mod snapshot;
pub mod types;
pub mod workflow;

use std::sync::Arc;

use eligo_core::{Criteria, CriteriaBuilder, RuleBuilder};
use eligo_storage::{CriteriaRecord, EligibilityStore, RuleRecord, SnapshotRecord, StorageError};

pub use audit::{redact, AuditEvent, AuditRecorder};
pub use cache::{evaluation_key, input_fingerprint, EvaluationCache, MemoryCache};
pub use compile::{compile, ruleset_fingerprint, CompilationCache, CompiledCriteria, CompiledRule};
pub use config::{AuditConfig, EngineConfig, EvaluationConfig, PerformanceConfig, WorkflowConfig};
pub use evaluate::evaluate_compiled;
pub use operator::{CustomOperatorFn, OperatorRegistry};
pub use snapshot::{canonical_json, checksum, verify as verify_snapshot};
pub use types::{EvalError, EvaluationResult, RuleOutcome};
pub use workflow::{
    CallbackContext, CallbackExecution, CallbackFn, CallbackJob, ConditionFn, DispatchMode,
    RecordingQueue, TaskQueue, TokioTaskQueue, WorkflowManager, WorkflowStage,
};

use crate::types::now_rfc3339;

/// Per-call evaluation options.
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    /// Cache bypass is explicit, never a silent default change.
    pub use_cache: bool,
    /// Snapshot subject reference (type, id). Defaults to the input
    /// record itself, addressed by its fingerprint.
    pub subject: Option<(String, String)>,
    /// Actor recorded on audit entries.
    pub actor: Option<String>,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        EvaluateOptions {
            use_cache: true,
            subject: None,
            actor: None,
        }
    }
}

/// The eligibility decision engine.
pub struct Engine {
    store: Arc<dyn EligibilityStore>,
    cache: Arc<dyn EvaluationCache>,
    queue: Arc<dyn TaskQueue>,
    registry: OperatorRegistry,
    workflow: WorkflowManager,
    compilation: CompilationCache,
    audit: AuditRecorder,
    config: EngineConfig,
}

impl Engine {
    /// Construct with the in-memory cache and a `tokio::spawn` queue.
    /// Swap either with [`Engine::with_cache`] / [`Engine::with_queue`].
    pub fn new(store: Arc<dyn EligibilityStore>, config: EngineConfig) -> Engine {
        let compilation = CompilationCache::new(config.compilation_ttl());
        let audit = AuditRecorder::new(Arc::clone(&store), config.audit.clone());
        Engine {
            store,
            cache: Arc::new(MemoryCache::new()),
            queue: Arc::new(TokioTaskQueue::new()),
            registry: OperatorRegistry::new(),
            workflow: WorkflowManager::new(),
            compilation,
            audit,
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn EvaluationCache>) -> Engine {
        self.cache = cache;
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Engine {
        self.queue = queue;
        self
    }

    /// The custom operator registry. Registration is idempotent.
    pub fn operators(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Convenience for [`OperatorRegistry::register`].
    pub fn register_operator<F>(&self, name: &str, callback: F)
    where
        F: Fn(&eligo_core::Value, &eligo_core::Value) -> bool + Send + Sync + 'static,
    {
        self.registry.register(name, callback);
    }

    /// The workflow callback registry.
    pub fn workflow(&self) -> &WorkflowManager {
        &self.workflow
    }

    // ── Evaluation ───────────────────────────────────────────────────────────

    pub async fn evaluate(
        &self,
        identifier: &str,
        record: &serde_json::Value,
    ) -> Result<EvaluationResult, EvalError> {
        self.evaluate_with(identifier, record, EvaluateOptions::default())
            .await
    }

    pub async fn evaluate_with(
        &self,
        identifier: &str,
        record: &serde_json::Value,
        options: EvaluateOptions,
    ) -> Result<EvaluationResult, EvalError> {
        let compiled = self.load_compiled(identifier).await?;
        self.evaluate_loaded(&compiled, record, &options).await
    }

    /// Evaluate many records against one criteria, sharing a single
    /// fetched and compiled rule set. Records are independent; they can
    /// be fanned out by the caller since no cross-record state exists.
    pub async fn evaluate_batch(
        &self,
        identifier: &str,
        records: &[serde_json::Value],
    ) -> Result<Vec<EvaluationResult>, EvalError> {
        let compiled = self.load_compiled(identifier).await?;
        let options = EvaluateOptions::default();
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.evaluate_loaded(&compiled, record, &options).await?);
        }
        Ok(results)
    }

    // ── Cache control ────────────────────────────────────────────────────────

    /// Pre-populate the result cache from sample inputs. Fires no
    /// callbacks and writes no audit entries. Returns the number of
    /// entries newly added.
    pub async fn warmup_cache(
        &self,
        identifier: &str,
        samples: &[serde_json::Value],
    ) -> Result<usize, EvalError> {
        if !self.config.evaluation.cache_enabled {
            return Ok(0);
        }
        let compiled = self.load_compiled(identifier).await?;
        let ttl = self.config.cache_ttl();
        let mut added = 0;
        for sample in samples {
            let key = evaluation_key(
                &compiled.id,
                &compiled.criteria_updated_at,
                &compiled.ruleset_fingerprint,
                &input_fingerprint(sample),
            );
            if self.cache.get(&key).await.is_some() {
                continue;
            }
            let result = evaluate_compiled(&compiled, sample, &self.registry, now_rfc3339())?;
            self.cache.put(&key, &compiled.id, result, ttl).await;
            added += 1;
        }
        tracing::debug!(criteria = %compiled.id, added, "cache warmed");
        Ok(added)
    }

    /// Evict all cached results and the compiled rule set for one criteria.
    pub async fn invalidate_cache(&self, identifier: &str) -> Result<usize, EvalError> {
        let criteria = self.get_criteria(identifier).await?;
        self.compilation.invalidate(&criteria.id);
        Ok(self.cache.invalidate_tag(&criteria.id).await)
    }

    pub async fn flush_cache(&self) {
        self.compilation.flush();
        self.cache.flush().await;
    }

    // ── Criteria management ──────────────────────────────────────────────────

    /// Persist a criteria and its rules (full upsert), touch freshness,
    /// audit the mutation, and invalidate caches.
    pub async fn save_criteria(
        &self,
        criteria: &Criteria,
        actor: Option<&str>,
    ) -> Result<(), EvalError> {
        for rule in &criteria.rules {
            rule.operator.validate_shape(&rule.value)?;
            if rule.weight == Some(0) {
                return Err(eligo_core::ModelError::InvalidWeight { weight: 0 }.into());
            }
        }

        let now = now_rfc3339();
        let old = match self.store.get_criteria(&criteria.id).await {
            Ok(record) => Some(record),
            Err(StorageError::CriteriaNotFound { .. }) => None,
            Err(err) => return Err(err.into()),
        };

        let record = criteria_to_record(criteria, &now);
        self.store.put_criteria(record.clone()).await?;

        let existing = match &old {
            Some(_) => self.store.get_rules_for(&criteria.id).await?,
            None => Vec::new(),
        };

        let mut kept_ids = Vec::new();
        for (index, rule) in criteria.rules.iter().enumerate() {
            let id = rule
                .id
                .clone()
                .unwrap_or_else(|| format!("{}-r{}", criteria.id, index + 1));
            kept_ids.push(id.clone());
            let row = RuleRecord {
                id: id.clone(),
                criteria_id: criteria.id.clone(),
                field: rule.field.clone(),
                operator: rule.operator.name(),
                value: rule.value.clone(),
                weight: self
                    .config
                    .resolve_weight(rule.weight, rule.priority.as_deref()),
                order: rule.order,
                is_active: rule.is_active,
                updated_at: now.clone(),
            };
            let previous = existing.iter().find(|r| r.id == id);
            self.store.put_rule(row.clone()).await?;
            let (event, old_state) = match previous {
                Some(previous) => (AuditEvent::RuleUpdated, json_of(previous)),
                None => (AuditEvent::RuleCreated, None),
            };
            self.audit_soft(
                event,
                "rule",
                &id,
                old_state,
                json_of(&row),
                serde_json::json!({"criteria_id": criteria.id}),
                actor,
            )
            .await;
        }

        for stale in existing.iter().filter(|r| !kept_ids.contains(&r.id)) {
            self.store.delete_rule(&criteria.id, &stale.id).await?;
            self.audit_soft(
                AuditEvent::RuleDeleted,
                "rule",
                &stale.id,
                json_of(stale),
                None,
                serde_json::json!({"criteria_id": criteria.id}),
                actor,
            )
            .await;
        }

        let event = match &old {
            Some(_) => AuditEvent::CriteriaUpdated,
            None => AuditEvent::CriteriaCreated,
        };
        self.audit_soft(
            event,
            "criteria",
            &criteria.id,
            old.as_ref().and_then(json_of),
            json_of(&record),
            serde_json::json!({}),
            actor,
        )
        .await;

        self.compilation.invalidate(&criteria.id);
        self.cache.invalidate_tag(&criteria.id).await;
        Ok(())
    }

    /// Append one rule to an existing criteria. Returns the rule id.
    pub async fn add_rule(
        &self,
        identifier: &str,
        rule: RuleBuilder,
        actor: Option<&str>,
    ) -> Result<String, EvalError> {
        let criteria = self.get_criteria(identifier).await?;
        let existing = self.store.get_rules_for(&criteria.id).await?;
        let rule = rule.build(existing.len() as u32)?;

        let id = rule
            .id
            .clone()
            .unwrap_or_else(|| next_rule_id(&criteria.id, &existing));
        let now = now_rfc3339();
        let row = RuleRecord {
            id: id.clone(),
            criteria_id: criteria.id.clone(),
            field: rule.field.clone(),
            operator: rule.operator.name(),
            value: rule.value.clone(),
            weight: self
                .config
                .resolve_weight(rule.weight, rule.priority.as_deref()),
            order: rule.order,
            is_active: rule.is_active,
            updated_at: now.clone(),
        };
        self.store.put_rule(row.clone()).await?;
        self.store.touch_criteria(&criteria.id, &now).await?;
        self.audit_soft(
            AuditEvent::RuleCreated,
            "rule",
            &id,
            None,
            json_of(&row),
            serde_json::json!({"criteria_id": criteria.id}),
            actor,
        )
        .await;

        self.compilation.invalidate(&criteria.id);
        self.cache.invalidate_tag(&criteria.id).await;
        Ok(id)
    }

    /// Delete one rule from a criteria.
    pub async fn remove_rule(
        &self,
        identifier: &str,
        rule_id: &str,
        actor: Option<&str>,
    ) -> Result<(), EvalError> {
        let criteria = self.get_criteria(identifier).await?;
        let existing = self.store.get_rules_for(&criteria.id).await?;
        let removed = existing.iter().find(|r| r.id == rule_id).cloned();

        self.store.delete_rule(&criteria.id, rule_id).await?;
        let now = now_rfc3339();
        self.store.touch_criteria(&criteria.id, &now).await?;
        self.audit_soft(
            AuditEvent::RuleDeleted,
            "rule",
            rule_id,
            removed.as_ref().and_then(json_of),
            None,
            serde_json::json!({"criteria_id": criteria.id}),
            actor,
        )
        .await;

        self.compilation.invalidate(&criteria.id);
        self.cache.invalidate_tag(&criteria.id).await;
        Ok(())
    }

    /// Soft activation toggle -- the preferred alternative to deleting a
    /// criteria that historical evaluations still reference.
    pub async fn set_criteria_active(
        &self,
        identifier: &str,
        active: bool,
        actor: Option<&str>,
    ) -> Result<(), EvalError> {
        let mut criteria = self.get_criteria(identifier).await?;
        let old = json_of(&criteria);
        criteria.is_active = active;
        criteria.updated_at = now_rfc3339();
        self.store.put_criteria(criteria.clone()).await?;

        let event = if active {
            AuditEvent::CriteriaActivated
        } else {
            AuditEvent::CriteriaDeactivated
        };
        self.audit_soft(
            event,
            "criteria",
            &criteria.id,
            old,
            json_of(&criteria),
            serde_json::json!({}),
            actor,
        )
        .await;

        self.compilation.invalidate(&criteria.id);
        self.cache.invalidate_tag(&criteria.id).await;
        Ok(())
    }

    // ── Snapshots & audit ────────────────────────────────────────────────────

    /// Capture a content-addressed snapshot for an arbitrary subject.
    pub async fn capture_snapshot(
        &self,
        subject_type: &str,
        subject_id: &str,
        data: &serde_json::Value,
    ) -> Result<SnapshotRecord, EvalError> {
        snapshot::capture(self.store.as_ref(), subject_type, subject_id, data, now_rfc3339()).await
    }

    /// Run the audit retention sweep. Returns the number of entries removed.
    pub async fn cleanup_audit(&self) -> Result<usize, EvalError> {
        self.audit.cleanup().await
    }

    // ── Internals ────────────────────────────────────────────────────────────

    async fn get_criteria(&self, identifier: &str) -> Result<CriteriaRecord, EvalError> {
        self.store
            .get_criteria(identifier)
            .await
            .map_err(|err| match err {
                StorageError::CriteriaNotFound { .. } => EvalError::UnknownCriteria {
                    identifier: identifier.to_string(),
                },
                other => EvalError::Storage(other),
            })
    }

    async fn load_compiled(&self, identifier: &str) -> Result<Arc<CompiledCriteria>, EvalError> {
        let criteria = self.get_criteria(identifier).await?;
        let rules = self.store.get_rules_for(&criteria.id).await?;
        let version = format!("{}|{}", criteria.updated_at, ruleset_fingerprint(&rules));

        if self.config.performance.compile_rules {
            if let Some(compiled) = self.compilation.get(&criteria.id, &version) {
                return Ok(compiled);
            }
        }
        let compiled = Arc::new(compile(
            &criteria,
            &rules,
            self.config.default_threshold(),
        )?);
        if self.config.performance.compile_rules {
            self.compilation.put(Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    async fn evaluate_loaded(
        &self,
        compiled: &CompiledCriteria,
        record: &serde_json::Value,
        options: &EvaluateOptions,
    ) -> Result<EvaluationResult, EvalError> {
        let before_ctx = CallbackContext {
            criteria_id: compiled.id.clone(),
            record: record.clone(),
            result: None,
        };
        let mut executions = self
            .workflow
            .dispatch_before(&before_ctx, self.queue.as_ref(), &self.config.workflow)
            .await?;

        let fingerprint = input_fingerprint(record);
        let key = evaluation_key(
            &compiled.id,
            &compiled.criteria_updated_at,
            &compiled.ruleset_fingerprint,
            &fingerprint,
        );
        let use_cache = self.config.evaluation.cache_enabled && options.use_cache;

        let result = if use_cache {
            match self.cache.get(&key).await {
                Some(mut hit) => {
                    tracing::debug!(criteria = %compiled.id, "evaluation cache hit");
                    hit.from_cache = true;
                    hit
                }
                None => {
                    tracing::debug!(criteria = %compiled.id, "evaluation cache miss");
                    let fresh =
                        evaluate_compiled(compiled, record, &self.registry, now_rfc3339())?;
                    self.cache
                        .put(&key, &compiled.id, fresh.clone(), self.config.cache_ttl())
                        .await;
                    fresh
                }
            }
        } else {
            evaluate_compiled(compiled, record, &self.registry, now_rfc3339())?
        };

        let snapshot_checksum = if self.audit.enabled() && self.config.audit.snapshots_enabled {
            let (subject_type, subject_id) = match &options.subject {
                Some((t, i)) => (t.clone(), i.clone()),
                None => ("record".to_string(), fingerprint[..12].to_string()),
            };
            match snapshot::capture(
                self.store.as_ref(),
                &subject_type,
                &subject_id,
                record,
                now_rfc3339(),
            )
            .await
            {
                Ok(snapshot) => Some(snapshot.checksum),
                Err(err) => {
                    tracing::warn!(criteria = %compiled.id, error = %err, "snapshot capture failed");
                    None
                }
            }
        } else {
            None
        };

        let result_ctx = CallbackContext {
            criteria_id: compiled.id.clone(),
            record: record.clone(),
            result: Some(result.clone()),
        };
        executions.extend(
            self.workflow
                .dispatch_result(&result_ctx, self.queue.as_ref(), &self.config.workflow)
                .await?,
        );

        self.audit_soft(
            AuditEvent::EvaluationCompleted,
            "criteria",
            &compiled.id,
            None,
            None,
            serde_json::json!({
                "passed": result.passed,
                "score": result.score.to_string(),
                "decision": result.decision,
                "failed_rules": result.failed_rules,
                "from_cache": result.from_cache,
                "snapshot_checksum": snapshot_checksum,
            }),
            options.actor.as_deref(),
        )
        .await;

        for execution in &executions {
            self.audit_soft(
                AuditEvent::CallbackExecuted,
                "criteria",
                &compiled.id,
                None,
                None,
                serde_json::json!({
                    "callback": execution.name,
                    "stage": execution.stage,
                    "outcome": execution.outcome,
                }),
                options.actor.as_deref(),
            )
            .await;
        }

        Ok(result)
    }

    /// Audit write isolated from the evaluation result: failures are
    /// logged, never propagated.
    #[allow(clippy::too_many_arguments)]
    async fn audit_soft(
        &self,
        event: AuditEvent,
        subject_type: &str,
        subject_id: &str,
        old_state: Option<serde_json::Value>,
        new_state: Option<serde_json::Value>,
        context: serde_json::Value,
        actor: Option<&str>,
    ) {
        if let Err(err) = self
            .audit
            .record(
                event,
                subject_type,
                subject_id,
                old_state,
                new_state,
                context,
                actor,
            )
            .await
        {
            tracing::warn!(event = event.name(), error = %err, "audit write failed");
        }
    }
}

fn json_of<T: serde::Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

fn next_rule_id(criteria_id: &str, existing: &[RuleRecord]) -> String {
    let prefix = format!("{}-r", criteria_id);
    let max = existing
        .iter()
        .filter_map(|r| r.id.strip_prefix(&prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{}", prefix, max + 1)
}

fn criteria_to_record(criteria: &Criteria, now: &str) -> CriteriaRecord {
    let mut metadata = match &criteria.metadata {
        serde_json::Value::Object(fields) => fields.clone(),
        _ => serde_json::Map::new(),
    };
    if !criteria.decision_bands.is_empty() {
        if let Ok(bands) = serde_json::to_value(&criteria.decision_bands) {
            metadata.insert("decision_bands".to_string(), bands);
        }
    }
    CriteriaRecord {
        id: criteria.id.clone(),
        name: criteria.name.clone(),
        slug: criteria.slug.clone(),
        is_active: criteria.is_active,
        kind: criteria.kind.clone(),
        group: criteria.group.clone(),
        category: criteria.category.clone(),
        metadata: serde_json::Value::Object(metadata),
        scoring_method: criteria.scoring_method.name().to_string(),
        passing_threshold: criteria.passing_threshold.map(|t| t.to_string()),
        updated_at: now.to_string(),
    }
}

/// Re-exported builder entry points so embedders can depend on this
/// crate alone.
pub fn criteria(name: &str) -> CriteriaBuilder {
    CriteriaBuilder::new(name)
}

pub fn rule(field: &str, operator: &str, value: serde_json::Value) -> RuleBuilder {
    RuleBuilder::new(field, operator, value)
}
