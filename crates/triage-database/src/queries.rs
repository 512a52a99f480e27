//! 数据库查询操作
//!
//! `TriageStore` 的 PostgreSQL 实现。提交在单个事务中完成，
//! 更新语句以 `version` 作为条件，任一行未命中即回滚并返回冲突。

use crate::connection::DatabasePool;
use crate::models::{to_i32, DbDoctor, DbNursingNote, DbPatientCase};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use triage_core::{CaseStatus, ChangeSet, Doctor, NursingNote, PatientCase, Result, TriageError, TriageStore};
use uuid::Uuid;

/// PostgreSQL 分诊存储
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: DatabasePool,
}

impl PostgresStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建医生表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                specialization VARCHAR(64) NOT NULL,
                experience INTEGER NOT NULL DEFAULT 0 CHECK (experience >= 0),
                department VARCHAR(128),
                active_cases INTEGER NOT NULL DEFAULT 0,
                max_cases INTEGER NOT NULL DEFAULT 5 CHECK (max_cases >= 1),
                on_duty BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                version BIGINT NOT NULL DEFAULT 1,
                CHECK (active_cases >= 0 AND active_cases <= max_cases)
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 创建病例表
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patient_cases (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                age INTEGER NOT NULL CHECK (age >= 0),
                gender VARCHAR(16) NOT NULL,
                symptoms TEXT NOT NULL,
                severity VARCHAR(16) NOT NULL,
                urgency_score INTEGER NOT NULL DEFAULT 0,
                specialization VARCHAR(64) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'waiting',
                assigned_doctor UUID REFERENCES doctors(id),
                vitals TEXT,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                version BIGINT NOT NULL DEFAULT 1,
                CHECK ((status = 'waiting') = (assigned_doctor IS NULL))
            )
        "#,
        )
        .execute(pool)
        .await?;

        // 创建护理记录表，只追加
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nursing_notes (
                id UUID PRIMARY KEY,
                case_id UUID NOT NULL REFERENCES patient_cases(id),
                nurse_id UUID NOT NULL,
                vitals TEXT NOT NULL,
                notes TEXT,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#,
        )
        .execute(pool)
        .await?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_doctors_specialization ON doctors(specialization)",
            "CREATE INDEX IF NOT EXISTS idx_cases_status_specialization ON patient_cases(status, specialization)",
            "CREATE INDEX IF NOT EXISTS idx_cases_assigned_doctor ON patient_cases(assigned_doctor)",
            "CREATE INDEX IF NOT EXISTS idx_cases_created_at ON patient_cases(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_notes_case_created ON nursing_notes(case_id, created_at)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 事务内写入 ==========

    async fn write_case(tx: &mut Transaction<'_, Postgres>, case: &PatientCase) -> Result<()> {
        case.check_consistency()?;

        let vitals = case.vitals.as_ref().map(serde_json::to_string).transpose()?;

        let rows = if case.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO patient_cases (id, name, age, gender, symptoms, severity, urgency_score,
                    specialization, status, assigned_doctor, vitals, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1)
                ON CONFLICT (id) DO NOTHING
            "#,
            )
            .bind(case.id)
            .bind(&case.name)
            .bind(to_i32(case.age, "age")?)
            .bind(case.gender.as_str())
            .bind(&case.symptoms)
            .bind(case.severity.as_str())
            .bind(to_i32(case.urgency_score, "urgency_score")?)
            .bind(&case.specialization)
            .bind(case.status.as_str())
            .bind(case.assigned_doctor)
            .bind(vitals)
            .bind(case.created_at)
            .bind(case.updated_at)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        } else {
            // 严重程度与专科不在更新列中，创建后保持不变
            sqlx::query(
                r#"
                UPDATE patient_cases
                SET status = $2, assigned_doctor = $3, vitals = $4, updated_at = $5, version = version + 1
                WHERE id = $1 AND version = $6
            "#,
            )
            .bind(case.id)
            .bind(case.status.as_str())
            .bind(case.assigned_doctor)
            .bind(vitals)
            .bind(case.updated_at)
            .bind(case.version)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        };

        if rows == 0 {
            return Err(TriageError::Conflict(format!(
                "case {} changed since version {}",
                case.id, case.version
            )));
        }
        Ok(())
    }

    async fn write_doctor(tx: &mut Transaction<'_, Postgres>, doctor: &Doctor) -> Result<()> {
        if doctor.active_cases > doctor.max_cases {
            return Err(TriageError::CapacityExceeded(format!(
                "doctor {} would hold {}/{} cases",
                doctor.id, doctor.active_cases, doctor.max_cases
            )));
        }

        let rows = if doctor.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO doctors (id, name, specialization, experience, department, active_cases,
                    max_cases, on_duty, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 1)
                ON CONFLICT (id) DO NOTHING
            "#,
            )
            .bind(doctor.id)
            .bind(&doctor.name)
            .bind(&doctor.specialization)
            .bind(to_i32(doctor.experience, "experience")?)
            .bind(&doctor.department)
            .bind(to_i32(doctor.active_cases, "active_cases")?)
            .bind(to_i32(doctor.max_cases, "max_cases")?)
            .bind(doctor.on_duty)
            .bind(doctor.created_at)
            .bind(doctor.updated_at)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE doctors
                SET name = $2, specialization = $3, experience = $4, department = $5,
                    active_cases = $6, max_cases = $7, on_duty = $8, updated_at = $9,
                    version = version + 1
                WHERE id = $1 AND version = $10
            "#,
            )
            .bind(doctor.id)
            .bind(&doctor.name)
            .bind(&doctor.specialization)
            .bind(to_i32(doctor.experience, "experience")?)
            .bind(&doctor.department)
            .bind(to_i32(doctor.active_cases, "active_cases")?)
            .bind(to_i32(doctor.max_cases, "max_cases")?)
            .bind(doctor.on_duty)
            .bind(doctor.updated_at)
            .bind(doctor.version)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        };

        if rows == 0 {
            return Err(TriageError::Conflict(format!(
                "doctor {} changed since version {}",
                doctor.id, doctor.version
            )));
        }
        Ok(())
    }

    async fn write_note(tx: &mut Transaction<'_, Postgres>, note: &NursingNote) -> Result<()> {
        let vitals = serde_json::to_string(&note.vitals)?;

        let rows = sqlx::query(
            r#"
            INSERT INTO nursing_notes (id, case_id, nurse_id, vitals, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
        "#,
        )
        .bind(note.id)
        .bind(note.case_id)
        .bind(note.nurse_id)
        .bind(vitals)
        .bind(&note.notes)
        .bind(note.created_at)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(TriageError::Conflict(format!("nursing note {} already exists", note.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TriageStore for PostgresStore {
    async fn find_case_by_id(&self, id: Uuid) -> Result<Option<PatientCase>> {
        let row = sqlx::query_as::<_, DbPatientCase>("SELECT * FROM patient_cases WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.map(PatientCase::try_from).transpose()
    }

    async fn find_waiting_cases_by_specialization(&self, specialization: &str) -> Result<Vec<PatientCase>> {
        let rows = sqlx::query_as::<_, DbPatientCase>(
            "SELECT * FROM patient_cases WHERE status = 'waiting' AND specialization = $1",
        )
        .bind(specialization)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(PatientCase::try_from).collect()
    }

    async fn find_cases_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<PatientCase>> {
        let rows = sqlx::query_as::<_, DbPatientCase>(
            "SELECT * FROM patient_cases WHERE assigned_doctor = $1 ORDER BY created_at DESC",
        )
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(PatientCase::try_from).collect()
    }

    async fn find_cases_by_status(&self, statuses: &[CaseStatus]) -> Result<Vec<PatientCase>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, DbPatientCase>("SELECT * FROM patient_cases WHERE status = ANY($1)")
            .bind(statuses)
            .fetch_all(self.pool.pool())
            .await?;

        rows.into_iter().map(PatientCase::try_from).collect()
    }

    async fn find_notes_by_case(&self, case_id: Uuid) -> Result<Vec<NursingNote>> {
        let rows = sqlx::query_as::<_, DbNursingNote>(
            "SELECT * FROM nursing_notes WHERE case_id = $1 ORDER BY created_at DESC",
        )
        .bind(case_id)
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(NursingNote::try_from).collect()
    }

    async fn find_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        row.map(Doctor::try_from).transpose()
    }

    async fn find_doctors_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>> {
        let rows = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors WHERE specialization = $1")
            .bind(specialization)
            .fetch_all(self.pool.pool())
            .await?;

        rows.into_iter().map(Doctor::try_from).collect()
    }

    async fn commit(&self, changes: ChangeSet) -> Result<ChangeSet> {
        if changes.is_empty() {
            return Ok(changes);
        }
        let mut tx = self.pool.pool().begin().await?;

        // 任一写入失败时 tx 被丢弃，事务自动回滚
        for doctor in &changes.doctors {
            Self::write_doctor(&mut tx, doctor).await?;
        }
        for case in &changes.cases {
            Self::write_case(&mut tx, case).await?;
        }
        for note in &changes.notes {
            Self::write_note(&mut tx, note).await?;
        }

        tx.commit().await?;

        let mut committed = changes;
        committed.cases.iter_mut().for_each(|c| c.version += 1);
        committed.doctors.iter_mut().for_each(|d| d.version += 1);

        tracing::debug!(
            "Committed {} case(s), {} doctor(s) and {} note(s)",
            committed.cases.len(),
            committed.doctors.len(),
            committed.notes.len()
        );
        Ok(committed)
    }
}
