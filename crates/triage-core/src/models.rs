//! 核心数据模型定义

use crate::error::{Result, TriageError};
use crate::utils::normalize_specialization;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 病例严重程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,      // 低
    Medium,   // 中
    High,     // 高
    Critical, // 危重
}

impl Severity {
    /// 各级别固定的紧急分值，仅作为辅助信号
    pub fn urgency_score(self) -> u32 {
        match self {
            Severity::Critical => 40,
            Severity::High => 25,
            Severity::Medium => 15,
            Severity::Low => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(TriageError::Validation(format!("unknown severity '{}'", other))),
        }
    }
}

/// 病例状态
///
/// 只能按 `waiting → assigned → in-treatment → completed` 顺序前进
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    Waiting,     // 候诊
    Assigned,    // 已分配
    InTreatment, // 治疗中
    Completed,   // 已完成
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Waiting => "waiting",
            CaseStatus::Assigned => "assigned",
            CaseStatus::InTreatment => "in-treatment",
            CaseStatus::Completed => "completed",
        }
    }

    /// 该状态下是否必须持有分配医生
    pub fn requires_doctor(self) -> bool {
        !matches!(self, CaseStatus::Waiting)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(CaseStatus::Waiting),
            "assigned" => Ok(CaseStatus::Assigned),
            "in-treatment" => Ok(CaseStatus::InTreatment),
            "completed" => Ok(CaseStatus::Completed),
            other => Err(TriageError::Validation(format!("unknown case status '{}'", other))),
        }
    }
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(TriageError::Validation(format!("unknown gender '{}'", other))),
        }
    }
}

/// 生命体征记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u32>,
    pub temperature: Option<f64>,
    pub oxygen_level: Option<u32>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>, // 记录护士
    pub recorded_at: DateTime<Utc>,
}

/// 护理记录，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NursingNote {
    pub id: Uuid,
    pub case_id: Uuid,
    pub nurse_id: Uuid,
    pub vitals: Vitals,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NursingNote {
    pub fn new(case_id: Uuid, nurse_id: Uuid, vitals: Vitals, notes: Option<String>, created_at: DateTime<Utc>) -> Self {
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        Self {
            id: Uuid::new_v4(),
            case_id,
            nurse_id,
            vitals,
            notes,
            created_at,
        }
    }
}

/// 新建病例时的人口学信息，对核心逻辑不透明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
}

impl CaseMetadata {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TriageError::Validation("patient name is required".to_string()));
        }
        if self.age > 150 {
            return Err(TriageError::Validation(format!("implausible patient age {}", self.age)));
        }
        Ok(())
    }
}

/// 患者病例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientCase {
    pub id: Uuid,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub symptoms: String,
    pub severity: Severity,           // 创建后不可变
    pub urgency_score: u32,
    pub specialization: String,       // 创建后不可变
    pub status: CaseStatus,
    pub assigned_doctor: Option<Uuid>,
    pub vitals: Option<Vitals>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64, // 乐观锁版本，0 表示尚未持久化
}

impl PatientCase {
    /// 以候诊状态创建病例，严重程度与专科须已由分诊得出
    pub fn new(
        metadata: CaseMetadata,
        symptoms: impl Into<String>,
        severity: Severity,
        specialization: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        metadata.validate()?;

        let specialization = normalize_specialization(specialization);
        if specialization.is_empty() {
            return Err(TriageError::Validation("specialization must not be empty".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: metadata.name.trim().to_string(),
            age: metadata.age,
            gender: metadata.gender,
            symptoms: symptoms.into(),
            severity,
            urgency_score: severity.urgency_score(),
            specialization,
            status: CaseStatus::Waiting,
            assigned_doctor: None,
            vitals: None,
            created_at,
            updated_at: created_at,
            version: 0,
        })
    }

    /// 检查状态与分配医生的一致性
    pub fn check_consistency(&self) -> Result<()> {
        if self.status.requires_doctor() != self.assigned_doctor.is_some() {
            return Err(TriageError::InvalidState(format!(
                "case {} has status {} but assigned doctor {:?}",
                self.id, self.status, self.assigned_doctor
            )));
        }
        Ok(())
    }
}

/// 新建医生请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: String,
    #[serde(default)]
    pub experience: u32, // 年
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default = "default_max_cases")]
    pub max_cases: u32,
    #[serde(default = "default_on_duty")]
    pub on_duty: bool,
}

fn default_max_cases() -> u32 {
    5
}

fn default_on_duty() -> bool {
    true
}

/// 医生（可分配的临床容量）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub experience: u32,
    pub department: Option<String>,
    pub active_cases: u32,
    pub max_cases: u32,
    pub on_duty: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Doctor {
    pub fn new(request: NewDoctor) -> Result<Self> {
        if request.name.trim().is_empty() {
            return Err(TriageError::Validation("doctor name is required".to_string()));
        }

        let specialization = normalize_specialization(&request.specialization);
        if specialization.is_empty() {
            return Err(TriageError::Validation("doctor specialization is required".to_string()));
        }

        if request.max_cases == 0 {
            return Err(TriageError::Validation("max_cases must be at least 1".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            specialization,
            experience: request.experience,
            department: request.department,
            active_cases: 0,
            max_cases: request.max_cases,
            on_duty: request.on_duty,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// 在岗且未满负荷
    pub fn is_eligible(&self) -> bool {
        self.on_duty && self.active_cases < self.max_cases
    }

    /// 剩余可接诊数量
    pub fn remaining_capacity(&self) -> u32 {
        self.max_cases.saturating_sub(self.active_cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CaseMetadata {
        CaseMetadata {
            name: "Jane Roe".to_string(),
            age: 42,
            gender: Gender::Female,
        }
    }

    #[test]
    fn test_new_case_starts_waiting() {
        let case = PatientCase::new(metadata(), "chest pain", Severity::Critical, " Cardiology", Utc::now())
            .unwrap();

        assert_eq!(case.status, CaseStatus::Waiting);
        assert_eq!(case.specialization, "cardiology");
        assert_eq!(case.urgency_score, 40);
        assert!(case.assigned_doctor.is_none());
        assert!(case.check_consistency().is_ok());
    }

    #[test]
    fn test_case_metadata_validation() {
        let mut meta = metadata();
        meta.name = "  ".to_string();
        assert!(matches!(meta.validate(), Err(TriageError::Validation(_))));

        let mut meta = metadata();
        meta.age = 200;
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_doctor_validation() {
        let request = NewDoctor {
            name: "Dr. House".to_string(),
            specialization: "Neurology".to_string(),
            experience: 12,
            department: None,
            max_cases: 0,
            on_duty: true,
        };
        assert!(Doctor::new(request.clone()).is_err());

        let doctor = Doctor::new(NewDoctor { max_cases: 3, ..request }).unwrap();
        assert_eq!(doctor.specialization, "neurology");
        assert!(doctor.is_eligible());
        assert_eq!(doctor.remaining_capacity(), 3);
    }

    #[test]
    fn test_nursing_note_drops_blank_notes() {
        let vitals = Vitals {
            blood_pressure: Some("120/80".to_string()),
            heart_rate: Some(72),
            temperature: None,
            oxygen_level: Some(98),
            notes: None,
            recorded_by: None,
            recorded_at: Utc::now(),
        };
        let case_id = Uuid::new_v4();

        let note = NursingNote::new(case_id, Uuid::new_v4(), vitals.clone(), Some("   ".to_string()), Utc::now());
        assert_eq!(note.case_id, case_id);
        assert!(note.notes.is_none());

        let note = NursingNote::new(case_id, Uuid::new_v4(), vitals, Some(" pale, sweating ".to_string()), Utc::now());
        assert_eq!(note.notes.as_deref(), Some("pale, sweating"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CaseStatus::InTreatment).unwrap();
        assert_eq!(json, "\"in-treatment\"");
        assert_eq!("in-treatment".parse::<CaseStatus>().unwrap(), CaseStatus::InTreatment);
        assert!("done".parse::<CaseStatus>().is_err());
    }
}
