//! 分诊工作流引擎
//!
//! 协调分诊、分配、状态机和候诊队列回填的核心引擎。
//! 引擎本身不持有可变状态，所有记录都经由 `TriageStore` 读取并原子提交。

use crate::{
    capacity::{self, LoadRelease},
    classifier::{SeverityClassifier, TriageAssessment},
    config::WorkflowConfig,
    priority::PriorityPolicy,
    routing::{Assignment, AssignmentEngine},
    state_machine::{ensure_case_owner, CaseEvent, CaseStateMachine},
    worklist::{build_waiting_queue, DoctorWorklist, QueueEntry, SpecializationOverview},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use triage_core::utils::normalize_specialization;
use triage_core::{
    CaseMetadata, CaseStatus, ChangeSet, Doctor, NewDoctor, NursingNote, PatientCase, Result, TriageError,
    TriageStore, Vitals,
};
use uuid::Uuid;

/// 分诊工作流引擎
#[derive(Debug)]
pub struct TriageEngine<S: TriageStore> {
    store: Arc<S>,
    config: WorkflowConfig,
    classifier: SeverityClassifier,
    priority: PriorityPolicy,
    assignment: AssignmentEngine,
    state_machine: CaseStateMachine,
}

impl<S: TriageStore> TriageEngine<S> {
    /// 创建新的工作流引擎
    pub fn new(store: Arc<S>, config: WorkflowConfig) -> Self {
        let state_machine = if config.allow_direct_completion {
            CaseStateMachine::with_direct_completion()
        } else {
            CaseStateMachine::new()
        };

        Self {
            store,
            classifier: SeverityClassifier::new(config.min_symptom_length),
            priority: PriorityPolicy::new(config.wait_time_cap_minutes),
            assignment: AssignmentEngine::new(),
            state_machine,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// 只做分诊分析，不创建病例
    pub fn analyze_symptoms(&self, symptoms: Option<&str>) -> TriageAssessment {
        self.classifier.analyze(symptoms)
    }

    /// 版本冲突时判断是否继续重试
    fn retry_on_conflict(&self, err: &TriageError, attempt: &mut u32, operation: &str, id: Uuid) -> bool {
        if !err.is_conflict() || *attempt >= self.config.max_conflict_retries {
            return false;
        }
        *attempt += 1;
        tracing::warn!(
            "{} for {} hit a concurrent write ({}), retry {}/{}",
            operation,
            id,
            err,
            attempt,
            self.config.max_conflict_retries
        );
        true
    }

    async fn load_case(&self, case_id: Uuid) -> Result<PatientCase> {
        self.store
            .find_case_by_id(case_id)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("patient case {}", case_id)))
    }

    async fn load_doctor(&self, doctor_id: Uuid) -> Result<Doctor> {
        self.store
            .find_doctor_by_id(doctor_id)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("doctor {}", doctor_id)))
    }

    /// 原子提交一次分配
    async fn commit_assignment(&self, assignment: Assignment) -> Result<Assignment> {
        let mut committed = self
            .store
            .commit(ChangeSet::new().with_case(assignment.case).with_doctor(assignment.doctor))
            .await?;

        match (committed.take_case(), committed.take_doctor()) {
            (Some(case), Some(doctor)) => Ok(Assignment { case, doctor }),
            _ => Err(TriageError::Database("assignment commit returned incomplete records".to_string())),
        }
    }

    // ========== 医生管理 ==========

    /// 登记新医生
    pub async fn register_doctor(&self, request: NewDoctor) -> Result<Doctor> {
        let doctor = self.store.save_doctor(Doctor::new(request)?).await?;
        tracing::info!(
            "Registered doctor {} ({}, capacity {})",
            doctor.id,
            doctor.specialization,
            doctor.max_cases
        );
        Ok(doctor)
    }

    /// 设置医生在岗状态，不影响负载计数
    pub async fn set_doctor_duty(&self, doctor_id: Uuid, on_duty: bool) -> Result<Doctor> {
        let mut attempt = 0;
        loop {
            let result = async {
                let mut doctor = self.load_doctor(doctor_id).await?;
                doctor.on_duty = on_duty;
                doctor.updated_at = Utc::now();
                self.store.save_doctor(doctor).await
            }
            .await;

            match result {
                Err(err) if self.retry_on_conflict(&err, &mut attempt, "Duty change", doctor_id) => continue,
                other => return other,
            }
        }
    }

    // ========== 分诊与分配 ==========

    /// 创建病例、完成分诊并尝试立即分配
    pub async fn classify_and_route(&self, symptoms: &str, metadata: CaseMetadata) -> Result<PatientCase> {
        if symptoms.trim().is_empty() {
            return Err(TriageError::Validation("symptoms description is required".to_string()));
        }

        let assessment = self.classifier.analyze(Some(symptoms));
        let case = PatientCase::new(
            metadata,
            symptoms.trim(),
            assessment.severity,
            &assessment.specialization,
            Utc::now(),
        )?;
        let case = self.store.save_case(case).await?;

        tracing::info!(
            "Created case {} with severity {} routed to {}",
            case.id,
            case.severity,
            case.specialization
        );

        match self.assign_case(case.id).await? {
            Some(assignment) => Ok(assignment.case),
            None => Ok(case),
        }
    }

    /// 为候诊病例分配医生；无可分配医生时返回 `None`
    pub async fn assign_case(&self, case_id: Uuid) -> Result<Option<Assignment>> {
        let mut attempt = 0;
        loop {
            match self.try_assign(case_id).await {
                Err(err) if self.retry_on_conflict(&err, &mut attempt, "Assignment", case_id) => continue,
                other => return other,
            }
        }
    }

    async fn try_assign(&self, case_id: Uuid) -> Result<Option<Assignment>> {
        let case = self.load_case(case_id).await?;
        let doctors = self.store.find_doctors_by_specialization(&case.specialization).await?;

        match self.assignment.assign(&case, &doctors, Utc::now())? {
            Some(assignment) => self.commit_assignment(assignment).await.map(Some),
            None => Ok(None),
        }
    }

    /// 管理员把候诊病例指定给某位医生，不要求专科一致
    pub async fn assign_to_doctor(&self, case_id: Uuid, doctor_id: Uuid) -> Result<Assignment> {
        let mut attempt = 0;
        loop {
            match self.try_assign_to_doctor(case_id, doctor_id).await {
                Err(err) if self.retry_on_conflict(&err, &mut attempt, "Manual assignment", case_id) => continue,
                other => return other,
            }
        }
    }

    async fn try_assign_to_doctor(&self, case_id: Uuid, doctor_id: Uuid) -> Result<Assignment> {
        let case = self.load_case(case_id).await?;
        let doctor = self.load_doctor(doctor_id).await?;

        if !capacity::is_eligible(&doctor) {
            return Err(TriageError::Validation(format!(
                "doctor {} is off duty or at capacity ({}/{})",
                doctor.id, doctor.active_cases, doctor.max_cases
            )));
        }

        let assignment = self.assignment.assign_to(&case, &doctor, Utc::now())?;
        tracing::info!("Manually assigning case {} to doctor {}", case_id, doctor_id);
        self.commit_assignment(assignment).await
    }

    // ========== 病例生命周期 ==========

    /// 医生推进病例状态；进入 completed 时同时释放负载并回填
    pub async fn update_case_status(
        &self,
        case_id: Uuid,
        requesting_doctor: Uuid,
        new_status: CaseStatus,
    ) -> Result<PatientCase> {
        if new_status == CaseStatus::Completed {
            return self.complete_case(case_id, requesting_doctor).await;
        }

        let mut attempt = 0;
        loop {
            match self.try_update_status(case_id, requesting_doctor, new_status).await {
                Err(err) if self.retry_on_conflict(&err, &mut attempt, "Status update", case_id) => continue,
                other => return other,
            }
        }
    }

    async fn try_update_status(
        &self,
        case_id: Uuid,
        requesting_doctor: Uuid,
        new_status: CaseStatus,
    ) -> Result<PatientCase> {
        let mut case = self.load_case(case_id).await?;
        ensure_case_owner(&case, requesting_doctor)?;

        let event = self.state_machine.event_for(case.status, new_status)?;
        if event == CaseEvent::Assign {
            // 分配只能经由分配引擎完成
            return Err(TriageError::InvalidTransition {
                from: case.status.to_string(),
                to: new_status.to_string(),
            });
        }

        let previous = case.status;
        case.status = self.state_machine.transition(previous, event)?;
        case.updated_at = Utc::now();
        let case = self.store.save_case(case).await?;

        tracing::info!("Case {} status updated from {} to {}", case_id, previous, case.status);
        Ok(case)
    }

    /// 完成病例：释放医生负载，并在同一次提交中用最高优先级的候诊病例回填
    pub async fn complete_case(&self, case_id: Uuid, requesting_doctor: Uuid) -> Result<PatientCase> {
        let mut attempt = 0;
        loop {
            match self.try_complete(case_id, requesting_doctor).await {
                Err(err) if self.retry_on_conflict(&err, &mut attempt, "Completion", case_id) => continue,
                other => return other,
            }
        }
    }

    async fn try_complete(&self, case_id: Uuid, requesting_doctor: Uuid) -> Result<PatientCase> {
        let mut case = self.load_case(case_id).await?;
        ensure_case_owner(&case, requesting_doctor)?;

        let next = self.state_machine.transition(case.status, CaseEvent::Complete)?;
        let mut doctor = self.load_doctor(requesting_doctor).await?;

        let now = Utc::now();
        if capacity::decrement_load(&mut doctor) == LoadRelease::AlreadyAtZero {
            tracing::warn!("Completing case {} while doctor {} holds no load", case_id, doctor.id);
        }
        doctor.updated_at = now;

        let previous = case.status;
        case.status = next;
        case.updated_at = now;

        let backfill = self.plan_backfill(&doctor, now).await?;

        let mut changes = ChangeSet::new().with_case(case);
        let backfilled = match backfill {
            Some(assignment) => {
                let backfilled = (assignment.case.id, assignment.doctor.id);
                changes = changes.with_case(assignment.case);
                // 回填给刚释放的医生时，分配结果已包含释放后的负载
                if assignment.doctor.id != doctor.id {
                    changes = changes.with_doctor(doctor);
                }
                changes = changes.with_doctor(assignment.doctor);
                Some(backfilled)
            }
            None => {
                changes = changes.with_doctor(doctor);
                None
            }
        };

        let mut committed = self.store.commit(changes).await?;
        let case = committed
            .take_case()
            .ok_or_else(|| TriageError::Database("completion commit returned no case".to_string()))?;

        tracing::info!("Case {} completed (from {})", case_id, previous);
        match backfilled {
            Some((next_id, doctor_id)) => tracing::info!(
                "Backfilled case {} to doctor {} after completion of {}",
                next_id,
                doctor_id,
                case_id
            ),
            None => tracing::debug!("Nothing to backfill after completion of {}", case_id),
        }
        Ok(case)
    }

    /// 为释放出的容量挑选候诊队列最前的病例，每次完成至多回填一个
    async fn plan_backfill(&self, freed: &Doctor, now: DateTime<Utc>) -> Result<Option<Assignment>> {
        let waiting = self.store.find_waiting_cases_by_specialization(&freed.specialization).await?;
        let Some(next_case) = self.priority.highest(&waiting, now) else {
            return Ok(None);
        };

        tracing::debug!(
            "Backfill candidate {} with priority {:.2}",
            next_case.id,
            self.priority.score(next_case, now)
        );

        let mut doctors = self.store.find_doctors_by_specialization(&freed.specialization).await?;
        for doctor in doctors.iter_mut().filter(|d| d.id == freed.id) {
            *doctor = freed.clone();
        }
        self.assignment.assign(next_case, &doctors, now)
    }

    // ========== 护理记录 ==========

    /// 追加护理记录，并把病例的生命体征更新为这一次的测量值
    pub async fn add_nursing_note(
        &self,
        case_id: Uuid,
        nurse_id: Uuid,
        vitals: Vitals,
        notes: Option<String>,
    ) -> Result<NursingNote> {
        let mut attempt = 0;
        loop {
            match self.try_add_nursing_note(case_id, nurse_id, &vitals, notes.as_deref()).await {
                Err(err) if self.retry_on_conflict(&err, &mut attempt, "Nursing note", case_id) => continue,
                other => return other,
            }
        }
    }

    async fn try_add_nursing_note(
        &self,
        case_id: Uuid,
        nurse_id: Uuid,
        vitals: &Vitals,
        notes: Option<&str>,
    ) -> Result<NursingNote> {
        let mut case = self.load_case(case_id).await?;
        if case.status == CaseStatus::Completed {
            return Err(TriageError::InvalidState(format!(
                "cannot record vitals on completed case {}",
                case_id
            )));
        }

        let now = Utc::now();
        let mut vitals = vitals.clone();
        if vitals.recorded_by.is_none() {
            vitals.recorded_by = Some(nurse_id);
        }
        let note = NursingNote::new(case_id, nurse_id, vitals.clone(), notes.map(str::to_string), now);

        case.vitals = Some(vitals);
        case.updated_at = now;

        let mut committed = self.store.commit(ChangeSet::new().with_case(case).with_note(note)).await?;
        let note = committed
            .take_note()
            .ok_or_else(|| TriageError::Database("nursing note commit returned no note".to_string()))?;

        tracing::info!("Nurse {} recorded vitals for case {}", nurse_id, case_id);
        Ok(note)
    }

    /// 病例的护理记录，最新的在前
    pub async fn case_notes(&self, case_id: Uuid) -> Result<Vec<NursingNote>> {
        self.load_case(case_id).await?;
        self.store.find_notes_by_case(case_id).await
    }

    /// 仍需护理测量的病例（候诊或已分配），按创建时间排序
    pub async fn cases_for_vitals(&self) -> Result<Vec<PatientCase>> {
        let mut cases = self
            .store
            .find_cases_by_status(&[CaseStatus::Waiting, CaseStatus::Assigned])
            .await?;
        cases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(cases)
    }

    // ========== 查询 ==========

    /// 医生工作列表
    pub async fn doctor_worklist(&self, doctor_id: Uuid) -> Result<DoctorWorklist> {
        let doctor = self.load_doctor(doctor_id).await?;
        let cases = self.store.find_cases_by_doctor(doctor_id).await?;
        Ok(DoctorWorklist::build(&doctor, cases))
    }

    /// 按优先级排序的候诊队列
    pub async fn waiting_queue(&self, specialization: &str) -> Result<Vec<QueueEntry>> {
        let specialization = normalize_specialization(specialization);
        let cases = self.store.find_waiting_cases_by_specialization(&specialization).await?;
        Ok(build_waiting_queue(&self.priority, cases, Utc::now()))
    }

    /// 专科概况
    pub async fn overview(&self, specialization: &str) -> Result<SpecializationOverview> {
        let specialization = normalize_specialization(specialization);
        let waiting = self.store.find_waiting_cases_by_specialization(&specialization).await?;
        let doctors = self.store.find_doctors_by_specialization(&specialization).await?;

        Ok(SpecializationOverview {
            specialization,
            waiting_cases: waiting.len(),
            load: capacity::pool_load(&doctors),
        })
    }
}
