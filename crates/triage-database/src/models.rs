//! 数据库模型

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use triage_core::{Doctor, NursingNote, PatientCase, Result, TriageError, Vitals};
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| TriageError::Database(format!("negative value {} in column {}", value, field)))
}

/// 数据库病例表
#[derive(Debug, FromRow)]
pub struct DbPatientCase {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub symptoms: String,
    pub severity: String,
    pub urgency_score: i32,
    pub specialization: String,
    pub status: String,
    pub assigned_doctor: Option<Uuid>,
    pub vitals: Option<String>, // JSON 文本
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<DbPatientCase> for PatientCase {
    type Error = TriageError;

    fn try_from(row: DbPatientCase) -> Result<Self> {
        let vitals = match row.vitals {
            Some(json) => Some(serde_json::from_str::<Vitals>(&json)?),
            None => None,
        };

        Ok(PatientCase {
            id: row.id,
            name: row.name,
            age: to_u32(row.age, "age")?,
            gender: row.gender.parse()?,
            symptoms: row.symptoms,
            severity: row.severity.parse()?,
            urgency_score: to_u32(row.urgency_score, "urgency_score")?,
            specialization: row.specialization,
            status: row.status.parse()?,
            assigned_doctor: row.assigned_doctor,
            vitals,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// 数据库医生表
#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub experience: i32,
    pub department: Option<String>,
    pub active_cases: i32,
    pub max_cases: i32,
    pub on_duty: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<DbDoctor> for Doctor {
    type Error = TriageError;

    fn try_from(row: DbDoctor) -> Result<Self> {
        Ok(Doctor {
            id: row.id,
            name: row.name,
            specialization: row.specialization,
            experience: to_u32(row.experience, "experience")?,
            department: row.department,
            active_cases: to_u32(row.active_cases, "active_cases")?,
            max_cases: to_u32(row.max_cases, "max_cases")?,
            on_duty: row.on_duty,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// 数据库护理记录表
#[derive(Debug, FromRow)]
pub struct DbNursingNote {
    pub id: Uuid,
    pub case_id: Uuid,
    pub nurse_id: Uuid,
    pub vitals: String, // JSON 文本
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbNursingNote> for NursingNote {
    type Error = TriageError;

    fn try_from(row: DbNursingNote) -> Result<Self> {
        Ok(NursingNote {
            id: row.id,
            case_id: row.case_id,
            nurse_id: row.nurse_id,
            vitals: serde_json::from_str(&row.vitals)?,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

/// 写入时把 u32 转为 INTEGER 列
pub(crate) fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| TriageError::Validation(format!("{} value {} out of range", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{CaseStatus, Gender, Severity};

    fn row() -> DbPatientCase {
        let now = Utc::now();
        DbPatientCase {
            id: Uuid::new_v4(),
            name: "Row Patient".to_string(),
            age: 70,
            gender: "female".to_string(),
            symptoms: "high fever".to_string(),
            severity: "high".to_string(),
            urgency_score: 25,
            specialization: "general".to_string(),
            status: "in-treatment".to_string(),
            assigned_doctor: Some(Uuid::new_v4()),
            vitals: None,
            created_at: now,
            updated_at: now,
            version: 3,
        }
    }

    #[test]
    fn test_case_row_conversion() {
        let case = PatientCase::try_from(row()).unwrap();
        assert_eq!(case.gender, Gender::Female);
        assert_eq!(case.severity, Severity::High);
        assert_eq!(case.status, CaseStatus::InTreatment);
        assert_eq!(case.version, 3);
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        let mut bad = row();
        bad.status = "archived".to_string();
        assert!(PatientCase::try_from(bad).is_err());

        let mut bad = row();
        bad.age = -1;
        assert!(matches!(PatientCase::try_from(bad), Err(TriageError::Database(_))));

        let mut bad = row();
        bad.vitals = Some("not json".to_string());
        assert!(matches!(PatientCase::try_from(bad), Err(TriageError::Serialization(_))));
    }

    #[test]
    fn test_note_row_conversion() {
        let row = DbNursingNote {
            id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            nurse_id: Uuid::new_v4(),
            vitals: r#"{"blood_pressure":"130/85","heart_rate":90,"temperature":null,"oxygen_level":96,"notes":null,"recorded_by":null,"recorded_at":"2024-03-01T08:30:00Z"}"#.to_string(),
            notes: Some("dizzy on standing".to_string()),
            created_at: Utc::now(),
        };

        let note = NursingNote::try_from(row).unwrap();
        assert_eq!(note.vitals.heart_rate, Some(90));
        assert_eq!(note.vitals.blood_pressure.as_deref(), Some("130/85"));
        assert_eq!(note.notes.as_deref(), Some("dizzy on standing"));
    }
}
