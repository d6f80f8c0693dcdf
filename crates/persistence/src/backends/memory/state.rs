//! Collections and uniqueness rules of the in-memory store.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{ResourceError, StorageError, StorageResult};
use crate::types::{
    Clinic, ClinicFilter, Clinician, IndexSpec, Pagination, Patient, timestamp,
};

/// Everything the in-memory store holds.
///
/// Transactions work on a clone and write it back on commit, so every
/// mutation here must leave the state unchanged when it returns an error.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub clinics: BTreeMap<String, Clinic>,
    pub clinicians: BTreeMap<String, Clinician>,
    pub patients: BTreeMap<String, Patient>,
    pub summaries: BTreeMap<String, Value>,
    pub deletions: HashMap<String, Vec<Value>>,
    pub indexes: HashMap<String, Vec<IndexSpec>>,
}

pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn clinic_codes(clinic: &Clinic) -> impl Iterator<Item = &String> {
    clinic
        .share_codes
        .iter()
        .chain(clinic.canonical_share_code.iter())
}

fn clinician_conflict(existing: &Clinician, candidate: &Clinician) -> Option<String> {
    if existing.clinic_id != candidate.clinic_id {
        return None;
    }
    let same = |a: &Option<String>, b: &Option<String>| a.is_some() && a == b;
    if same(&existing.user_id, &candidate.user_id) {
        return candidate.user_id.clone();
    }
    if same(&existing.invite_id, &candidate.invite_id) {
        return candidate.invite_id.clone();
    }
    if same(&existing.email, &candidate.email) {
        return candidate.email.clone();
    }
    None
}

impl MemoryState {
    // Clinics

    pub fn insert_clinic(&mut self, mut clinic: Clinic) -> StorageResult<Clinic> {
        for existing in self.clinics.values() {
            if let Some(code) = clinic_codes(&clinic)
                .find(|code| clinic_codes(existing).any(|taken| taken == *code))
            {
                return Err(ResourceError::DuplicateShareCode {
                    share_code: code.clone(),
                }
                .into());
            }
        }

        let id = clinic.id.clone().unwrap_or_else(generate_id);
        if self.clinics.contains_key(&id) {
            return Err(ResourceError::AlreadyExists {
                resource_type: "Clinic".to_string(),
                id,
            }
            .into());
        }

        let now = timestamp::now();
        clinic.id = Some(id.clone());
        clinic.created_time = Some(now);
        clinic.updated_time = Some(now);
        self.clinics.insert(id, clinic.clone());
        Ok(clinic)
    }

    pub fn clinic(&self, clinic_id: &str) -> StorageResult<&Clinic> {
        self.clinics
            .get(clinic_id)
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }

    fn clinic_mut(&mut self, clinic_id: &str) -> StorageResult<&mut Clinic> {
        self.clinics
            .get_mut(clinic_id)
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }

    pub fn list_clinics(&self, filter: &ClinicFilter, pagination: Pagination) -> Vec<Clinic> {
        self.clinics
            .values()
            .filter(|clinic| filter.matches(clinic))
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect()
    }

    pub fn upsert_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()> {
        let clinic = self.clinic_mut(clinic_id)?;
        clinic.add_admin(user_id);
        clinic.updated_time = Some(timestamp::now());
        Ok(())
    }

    pub fn remove_admin(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<()> {
        let clinic = self.clinic_mut(clinic_id)?;
        clinic.remove_admin(user_id);
        clinic.updated_time = Some(timestamp::now());
        Ok(())
    }

    pub fn delete_clinic(&mut self, clinic_id: &str) -> StorageResult<Clinic> {
        self.clinics
            .remove(clinic_id)
            .ok_or_else(|| StorageError::not_found("Clinic", clinic_id))
    }

    // Clinicians

    pub fn insert_clinician(&mut self, mut clinician: Clinician) -> StorageResult<Clinician> {
        if let Some(conflict) = self
            .clinicians
            .values()
            .find_map(|existing| clinician_conflict(existing, &clinician))
        {
            return Err(ResourceError::AlreadyExists {
                resource_type: "Clinician".to_string(),
                id: conflict,
            }
            .into());
        }

        let id = generate_id();
        let now = timestamp::now();
        clinician.id = Some(id.clone());
        clinician.created_time = Some(now);
        clinician.updated_time = Some(now);
        self.clinicians.insert(id, clinician.clone());
        Ok(clinician)
    }

    fn find_clinician_mut(
        &mut self,
        clinic_id: &str,
        predicate: impl Fn(&Clinician) -> bool,
        missing: &str,
    ) -> StorageResult<&mut Clinician> {
        self.clinicians
            .values_mut()
            .find(|c| c.clinic_id.as_deref() == Some(clinic_id) && predicate(c))
            .ok_or_else(|| StorageError::not_found("Clinician", missing))
    }

    pub fn clinician(&mut self, clinic_id: &str, user_id: &str) -> StorageResult<Clinician> {
        self.find_clinician_mut(
            clinic_id,
            |c| c.user_id.as_deref() == Some(user_id),
            user_id,
        )
        .map(|c| c.clone())
    }

    pub fn update_clinician(
        &mut self,
        clinic_id: &str,
        user_id: &str,
        update: Clinician,
    ) -> StorageResult<Clinician> {
        let current = self.find_clinician_mut(
            clinic_id,
            |c| c.user_id.as_deref() == Some(user_id),
            user_id,
        )?;
        let mut merged = current.clone();
        merged.merge(update.into_update());
        merged.updated_time = Some(timestamp::now());

        let id = merged.id.clone().unwrap_or_default();
        if let Some(conflict) = self
            .clinicians
            .iter()
            .filter(|(other_id, _)| **other_id != id)
            .find_map(|(_, existing)| clinician_conflict(existing, &merged))
        {
            return Err(ResourceError::AlreadyExists {
                resource_type: "Clinician".to_string(),
                id: conflict,
            }
            .into());
        }

        self.clinicians.insert(id, merged.clone());
        Ok(merged)
    }

    pub fn resolve_invite(
        &mut self,
        clinic_id: &str,
        invite_id: &str,
        user_id: &str,
    ) -> StorageResult<Clinician> {
        let taken = self.clinicians.values().any(|c| {
            c.clinic_id.as_deref() == Some(clinic_id) && c.user_id.as_deref() == Some(user_id)
        });
        if taken {
            return Err(ResourceError::AlreadyExists {
                resource_type: "Clinician".to_string(),
                id: user_id.to_string(),
            }
            .into());
        }

        let clinician = self.find_clinician_mut(
            clinic_id,
            |c| c.invite_id.as_deref() == Some(invite_id),
            invite_id,
        )?;
        clinician.user_id = Some(user_id.to_string());
        clinician.invite_id = None;
        clinician.updated_time = Some(timestamp::now());
        Ok(clinician.clone())
    }

    pub fn delete_clinicians(&mut self, clinic_id: &str) -> Vec<Clinician> {
        let ids: Vec<String> = self
            .clinicians
            .iter()
            .filter(|(_, c)| c.clinic_id.as_deref() == Some(clinic_id))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter()
            .filter_map(|id| self.clinicians.remove(id))
            .collect()
    }

    // Patients

    pub fn insert_patient(&mut self, mut patient: Patient) -> StorageResult<Patient> {
        let duplicate = self.patients.values().any(|existing| {
            existing.clinic_id == patient.clinic_id
                && existing.user_id.is_some()
                && existing.user_id == patient.user_id
        });
        if duplicate {
            return Err(ResourceError::AlreadyExists {
                resource_type: "Patient".to_string(),
                id: patient.user_id.unwrap_or_default(),
            }
            .into());
        }

        let id = generate_id();
        let now = timestamp::now();
        patient.id = Some(id.clone());
        patient.created_time = Some(now);
        patient.updated_time = Some(now);
        self.patients.insert(id, patient.clone());
        Ok(patient)
    }

    pub fn list_patients(&self, clinic_id: &str, limit: u32) -> Vec<Patient> {
        self.patients
            .values()
            .filter(|p| p.clinic_id.as_deref() == Some(clinic_id))
            .take(limit as usize)
            .cloned()
            .collect()
    }

    pub fn delete_patients(&mut self, clinic_id: &str) -> Vec<Patient> {
        let ids: Vec<String> = self
            .patients
            .iter()
            .filter(|(_, p)| p.clinic_id.as_deref() == Some(clinic_id))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| self.patients.remove(id)).collect()
    }

    // Audit and indexes

    pub fn insert_deletions(&mut self, collection: &str, documents: Vec<Value>) {
        self.deletions
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    pub fn create_indexes(&mut self, collection: &str, indexes: &[IndexSpec]) {
        let declared = self.indexes.entry(collection.to_string()).or_default();
        for index in indexes {
            declared.retain(|existing| existing.name != index.name);
            declared.push(index.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ROLE_CLINIC_MEMBER;

    fn clinic_with_code(code: &str) -> Clinic {
        let mut clinic = Clinic::new("Clinic");
        clinic.assign_share_code(code);
        clinic
    }

    #[test]
    fn test_duplicate_share_code_leaves_state_untouched() {
        let mut state = MemoryState::default();
        state.insert_clinic(clinic_with_code("AAAA-BBBB-CCCC")).unwrap();

        let err = state
            .insert_clinic(clinic_with_code("AAAA-BBBB-CCCC"))
            .unwrap_err();
        assert!(err.is_duplicate_share_code());
        assert_eq!(state.clinics.len(), 1);

        state.insert_clinic(clinic_with_code("DDDD-EEEE-FFFF")).unwrap();
        assert_eq!(state.clinics.len(), 2);
    }

    #[test]
    fn test_clinician_uniqueness_is_per_clinic() {
        let mut state = MemoryState::default();
        state.insert_clinician(Clinician::new("c1", "u1")).unwrap();

        assert!(state.insert_clinician(Clinician::new("c1", "u1")).is_err());
        assert!(state.insert_clinician(Clinician::new("c2", "u1")).is_ok());

        state.insert_clinician(Clinician::invite("c1", "inv-1")).unwrap();
        assert!(state.insert_clinician(Clinician::invite("c1", "inv-1")).is_err());
    }

    #[test]
    fn test_update_merges_populated_fields() {
        let mut state = MemoryState::default();
        let created = state
            .insert_clinician(Clinician::new("c1", "u1").with_name("Dr. Who"))
            .unwrap();

        let updated = state
            .update_clinician("c1", "u1", Clinician::default().with_roles([ROLE_CLINIC_MEMBER]))
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name.as_deref(), Some("Dr. Who"));
        assert_eq!(updated.roles, vec![ROLE_CLINIC_MEMBER]);

        assert!(
            state
                .update_clinician("c1", "missing", Clinician::default())
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_resolve_invite_binds_user() {
        let mut state = MemoryState::default();
        state.insert_clinician(Clinician::invite("c1", "inv-1")).unwrap();

        let resolved = state.resolve_invite("c1", "inv-1", "u7").unwrap();
        assert_eq!(resolved.user_id.as_deref(), Some("u7"));
        assert!(resolved.invite_id.is_none());
        assert!(state.resolve_invite("c1", "inv-1", "u8").is_err());
    }

    #[test]
    fn test_index_declarations_replace_by_name() {
        let mut state = MemoryState::default();
        let first = IndexSpec::new("A").asc("x");
        let second = IndexSpec::new("A").asc("y");
        state.create_indexes("things", &[first]);
        state.create_indexes("things", &[second.clone()]);
        assert_eq!(state.indexes["things"], vec![second]);
    }
}
