//! 内存存储
//!
//! `TriageStore` 的进程内实现，用于命令行模拟和测试。
//! 提交时在同一把写锁内完成全部版本校验和写入。

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use triage_core::{CaseStatus, ChangeSet, Doctor, NursingNote, PatientCase, Result, TriageError, TriageStore};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    cases: HashMap<Uuid, PatientCase>,
    doctors: HashMap<Uuid, Doctor>,
    notes: Vec<NursingNote>,
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有医生快照
    pub async fn all_doctors(&self) -> Vec<Doctor> {
        self.state.read().await.doctors.values().cloned().collect()
    }

    /// 所有病例快照，按创建时间排序
    pub async fn all_cases(&self) -> Vec<PatientCase> {
        let mut cases: Vec<PatientCase> = self.state.read().await.cases.values().cloned().collect();
        cases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        cases
    }
}

fn check_case(state: &StoreState, case: &PatientCase) -> Result<()> {
    match state.cases.get(&case.id) {
        None if case.version == 0 => Ok(()),
        None => Err(TriageError::NotFound(format!("case {}", case.id))),
        Some(stored) if stored.version != case.version => Err(TriageError::Conflict(format!(
            "case {} is at version {}, write expected {}",
            case.id, stored.version, case.version
        ))),
        Some(stored) if stored.severity != case.severity || stored.specialization != case.specialization => {
            Err(TriageError::Validation(format!(
                "severity and specialization of case {} are immutable",
                case.id
            )))
        }
        Some(_) => Ok(()),
    }
}

fn check_doctor(state: &StoreState, doctor: &Doctor) -> Result<()> {
    if doctor.active_cases > doctor.max_cases {
        return Err(TriageError::CapacityExceeded(format!(
            "doctor {} would hold {}/{} cases",
            doctor.id, doctor.active_cases, doctor.max_cases
        )));
    }

    match state.doctors.get(&doctor.id) {
        None if doctor.version == 0 => Ok(()),
        None => Err(TriageError::NotFound(format!("doctor {}", doctor.id))),
        Some(stored) if stored.version != doctor.version => Err(TriageError::Conflict(format!(
            "doctor {} is at version {}, write expected {}",
            doctor.id, stored.version, doctor.version
        ))),
        Some(_) => Ok(()),
    }
}

fn check_note(state: &StoreState, changes: &ChangeSet, note: &NursingNote) -> Result<()> {
    if state.notes.iter().any(|n| n.id == note.id) {
        return Err(TriageError::Conflict(format!("nursing note {} already exists", note.id)));
    }
    let case_known = state.cases.contains_key(&note.case_id) || changes.cases.iter().any(|c| c.id == note.case_id);
    if !case_known {
        return Err(TriageError::NotFound(format!("case {}", note.case_id)));
    }
    Ok(())
}

#[async_trait]
impl TriageStore for MemoryStore {
    async fn find_case_by_id(&self, id: Uuid) -> Result<Option<PatientCase>> {
        Ok(self.state.read().await.cases.get(&id).cloned())
    }

    async fn find_waiting_cases_by_specialization(&self, specialization: &str) -> Result<Vec<PatientCase>> {
        let state = self.state.read().await;
        Ok(state
            .cases
            .values()
            .filter(|c| c.status == CaseStatus::Waiting && c.specialization == specialization)
            .cloned()
            .collect())
    }

    async fn find_cases_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<PatientCase>> {
        let state = self.state.read().await;
        Ok(state
            .cases
            .values()
            .filter(|c| c.assigned_doctor == Some(doctor_id))
            .cloned()
            .collect())
    }

    async fn find_cases_by_status(&self, statuses: &[CaseStatus]) -> Result<Vec<PatientCase>> {
        let state = self.state.read().await;
        Ok(state
            .cases
            .values()
            .filter(|c| statuses.contains(&c.status))
            .cloned()
            .collect())
    }

    async fn find_notes_by_case(&self, case_id: Uuid) -> Result<Vec<NursingNote>> {
        let state = self.state.read().await;
        // 追加顺序即时间顺序，倒序得到最新在前
        Ok(state
            .notes
            .iter()
            .rev()
            .filter(|n| n.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn find_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.state.read().await.doctors.get(&id).cloned())
    }

    async fn find_doctors_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>> {
        let state = self.state.read().await;
        Ok(state
            .doctors
            .values()
            .filter(|d| d.specialization == specialization)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<ChangeSet> {
        if changes.is_empty() {
            return Ok(changes);
        }
        let mut state = self.state.write().await;

        // 先全部校验，任何失败都不写入
        for case in &changes.cases {
            case.check_consistency()?;
            check_case(&state, case)?;
        }
        for doctor in &changes.doctors {
            check_doctor(&state, doctor)?;
        }
        for note in &changes.notes {
            check_note(&state, &changes, note)?;
        }

        let mut committed = ChangeSet::new();
        for mut case in changes.cases {
            case.version += 1;
            state.cases.insert(case.id, case.clone());
            committed.cases.push(case);
        }
        for mut doctor in changes.doctors {
            doctor.version += 1;
            state.doctors.insert(doctor.id, doctor.clone());
            committed.doctors.push(doctor);
        }
        for note in changes.notes {
            state.notes.push(note.clone());
            committed.notes.push(note);
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use triage_core::{CaseMetadata, Gender, NewDoctor, Severity, Vitals};

    fn new_case() -> PatientCase {
        let meta = CaseMetadata {
            name: "Store Patient".to_string(),
            age: 61,
            gender: Gender::Male,
        };
        PatientCase::new(meta, "fracture", Severity::High, "orthopedics", Utc::now()).unwrap()
    }

    fn new_doctor() -> Doctor {
        Doctor::new(NewDoctor {
            name: "Dr. Bone".to_string(),
            specialization: "orthopedics".to_string(),
            experience: 7,
            department: None,
            max_cases: 1,
            on_duty: true,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = MemoryStore::new();
        let saved = store.save_case(new_case()).await.unwrap();
        assert_eq!(saved.version, 1);

        let found = store.find_case_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);

        let waiting = store.find_waiting_cases_by_specialization("orthopedics").await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert!(store.find_waiting_cases_by_specialization("cardiology").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict() {
        let store = MemoryStore::new();
        let saved = store.save_doctor(new_doctor()).await.unwrap();

        let mut first = saved.clone();
        first.on_duty = false;
        store.save_doctor(first).await.unwrap();

        let result = store.save_doctor(saved).await;
        assert!(matches!(result, Err(TriageError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let store = MemoryStore::new();
        let case = store.save_case(new_case()).await.unwrap();
        let doctor = store.save_doctor(new_doctor()).await.unwrap();

        let mut assigned = case.clone();
        assigned.status = CaseStatus::Assigned;
        assigned.assigned_doctor = Some(doctor.id);

        let mut stale = doctor.clone();
        stale.version = 0;
        stale.active_cases = 1;

        let result = store
            .commit(ChangeSet::new().with_case(assigned).with_doctor(stale))
            .await;
        assert!(result.is_err());

        let stored_case = store.find_case_by_id(case.id).await.unwrap().unwrap();
        assert_eq!(stored_case.status, CaseStatus::Waiting);
        let stored_doctor = store.find_doctor_by_id(doctor.id).await.unwrap().unwrap();
        assert_eq!(stored_doctor.active_cases, 0);
    }

    #[tokio::test]
    async fn test_notes_are_listed_newest_first() {
        let store = MemoryStore::new();
        let case = store.save_case(new_case()).await.unwrap();
        let vitals = Vitals {
            blood_pressure: None,
            heart_rate: Some(88),
            temperature: Some(37.9),
            oxygen_level: None,
            notes: None,
            recorded_by: None,
            recorded_at: Utc::now(),
        };

        let first = NursingNote::new(case.id, Uuid::new_v4(), vitals.clone(), Some("first".to_string()), Utc::now());
        let second = NursingNote::new(case.id, Uuid::new_v4(), vitals.clone(), Some("second".to_string()), Utc::now());
        store.append_note(first.clone()).await.unwrap();
        store.append_note(second.clone()).await.unwrap();

        let notes = store.find_notes_by_case(case.id).await.unwrap();
        assert_eq!(notes, vec![second, first.clone()]);

        // 重复 id 和未知病例都不写入
        assert!(matches!(store.append_note(first).await, Err(TriageError::Conflict(_))));
        let orphan = NursingNote::new(Uuid::new_v4(), Uuid::new_v4(), vitals, None, Utc::now());
        assert!(matches!(store.append_note(orphan).await, Err(TriageError::NotFound(_))));
        assert_eq!(store.find_notes_by_case(case.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_commit_is_noop() {
        let store = MemoryStore::new();
        let committed = store.commit(ChangeSet::new()).await.unwrap();
        assert!(committed.is_empty());
        assert!(store.all_cases().await.is_empty());
    }

    #[tokio::test]
    async fn test_find_cases_by_status() {
        let store = MemoryStore::new();
        let waiting = store.save_case(new_case()).await.unwrap();
        let mut done = store.save_case(new_case()).await.unwrap();
        done.status = CaseStatus::Completed;
        done.assigned_doctor = Some(Uuid::new_v4());
        store.save_case(done).await.unwrap();

        let open = store
            .find_cases_by_status(&[CaseStatus::Waiting, CaseStatus::Assigned])
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, waiting.id);
    }

    #[tokio::test]
    async fn test_rejects_overflow_and_reclassification() {
        let store = MemoryStore::new();
        let doctor = store.save_doctor(new_doctor()).await.unwrap();

        let mut overloaded = doctor.clone();
        overloaded.active_cases = 2;
        assert!(matches!(
            store.save_doctor(overloaded).await,
            Err(TriageError::CapacityExceeded(_))
        ));

        let case = store.save_case(new_case()).await.unwrap();
        let mut reclassified = case.clone();
        reclassified.severity = Severity::Low;
        assert!(matches!(
            store.save_case(reclassified).await,
            Err(TriageError::Validation(_))
        ));
    }
}
