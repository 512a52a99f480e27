//! 持久化端口
//!
//! 病例与医生记录存放在外部存储中，核心只通过此 trait 访问。
//! 所有写入都带版本号校验，`commit` 保证多条记录要么全部写入，要么全部不写。
//! 护理记录只追加，没有版本号。

use crate::error::Result;
use crate::models::{CaseStatus, Doctor, NursingNote, PatientCase};
use async_trait::async_trait;
use uuid::Uuid;

/// 一次原子提交包含的记录
///
/// 每条记录的 `version` 必须与存储中的当前版本一致（新记录为 0），
/// 提交成功后返回的记录版本号加一。
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub cases: Vec<PatientCase>,
    pub doctors: Vec<Doctor>,
    pub notes: Vec<NursingNote>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case(mut self, case: PatientCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn with_doctor(mut self, doctor: Doctor) -> Self {
        self.doctors.push(doctor);
        self
    }

    pub fn with_note(mut self, note: NursingNote) -> Self {
        self.notes.push(note);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty() && self.doctors.is_empty() && self.notes.is_empty()
    }

    /// 取出第一条病例记录
    pub fn take_case(&mut self) -> Option<PatientCase> {
        if self.cases.is_empty() {
            None
        } else {
            Some(self.cases.remove(0))
        }
    }

    /// 取出第一条医生记录
    pub fn take_doctor(&mut self) -> Option<Doctor> {
        if self.doctors.is_empty() {
            None
        } else {
            Some(self.doctors.remove(0))
        }
    }

    /// 取出第一条护理记录
    pub fn take_note(&mut self) -> Option<NursingNote> {
        if self.notes.is_empty() {
            None
        } else {
            Some(self.notes.remove(0))
        }
    }
}

/// 分诊存储接口
#[async_trait]
pub trait TriageStore: Send + Sync {
    async fn find_case_by_id(&self, id: Uuid) -> Result<Option<PatientCase>>;

    /// 候诊病例，不保证顺序，由引擎排序
    async fn find_waiting_cases_by_specialization(&self, specialization: &str) -> Result<Vec<PatientCase>>;

    async fn find_cases_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<PatientCase>>;

    /// 处于任一给定状态的病例，不保证顺序
    async fn find_cases_by_status(&self, statuses: &[CaseStatus]) -> Result<Vec<PatientCase>>;

    async fn find_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>>;

    /// 返回该专科全部医生，不论是否可分配，由引擎过滤
    async fn find_doctors_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>>;

    /// 病例的护理记录，最新的在前
    async fn find_notes_by_case(&self, case_id: Uuid) -> Result<Vec<NursingNote>>;

    /// 原子提交；任一版本不匹配或护理记录 id 重复时返回 `TriageError::Conflict` 且不写入任何记录
    async fn commit(&self, changes: ChangeSet) -> Result<ChangeSet>;

    async fn save_case(&self, case: PatientCase) -> Result<PatientCase> {
        let mut committed = self.commit(ChangeSet::new().with_case(case)).await?;
        committed
            .take_case()
            .ok_or_else(|| crate::TriageError::Database("commit returned no case".to_string()))
    }

    async fn save_doctor(&self, doctor: Doctor) -> Result<Doctor> {
        let mut committed = self.commit(ChangeSet::new().with_doctor(doctor)).await?;
        committed
            .take_doctor()
            .ok_or_else(|| crate::TriageError::Database("commit returned no doctor".to_string()))
    }

    async fn append_note(&self, note: NursingNote) -> Result<NursingNote> {
        let mut committed = self.commit(ChangeSet::new().with_note(note)).await?;
        committed
            .take_note()
            .ok_or_else(|| crate::TriageError::Database("commit returned no note".to_string()))
    }
}
