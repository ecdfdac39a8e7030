use super::{holder_from_row, HolderStore, HOLDER_COLUMNS};
use crate::{
    error::{is_constraint_violation, HolderError, HolderResult},
    holder::{HolderField, HolderPatch, InsuranceHolder, LinkedPatient, NewHolder, HOLDER_RELATIONSHIP},
    query::{QueryPlan, WhereClause},
};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};

impl HolderStore {
    // ── Reads ─────────────────────────────────────────────────────

    pub fn get_holder(&self, id: &str) -> HolderResult<Option<InsuranceHolder>> {
        let sql = format!("SELECT {HOLDER_COLUMNS} FROM insurance_holders WHERE id = ?1");
        let holder = self
            .conn
            .query_row(&sql, params![id], holder_from_row)
            .optional()?;
        Ok(holder)
    }

    pub fn ci_exists(&self, ci: &str) -> HolderResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM insurance_holders WHERE ci = ?1)",
            params![ci],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count_holders(&self, filter: &WhereClause) -> HolderResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM insurance_holders {}", filter.sql());
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;
        Ok(n)
    }

    pub fn holders_page(&self, plan: &QueryPlan) -> HolderResult<Vec<InsuranceHolder>> {
        let sql = format!(
            "SELECT {HOLDER_COLUMNS} FROM insurance_holders {} {} LIMIT ? OFFSET ?",
            plan.where_clause.sql(),
            plan.order_clause,
        );
        log::debug!("holders_page: {sql}");
        let mut bound: Vec<Value> = plan.where_clause.params().to_vec();
        bound.push(Value::Integer(plan.limit));
        bound.push(Value::Integer(plan.offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), holder_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Exact-match lookup on CI and/or policy number.
    pub fn lookup_holders(
        &self,
        ci: Option<&str>,
        policy_number: Option<&str>,
    ) -> HolderResult<Vec<InsuranceHolder>> {
        let sql = format!(
            "SELECT {HOLDER_COLUMNS} FROM insurance_holders
             WHERE (?1 IS NULL OR ci = ?1) AND (?2 IS NULL OR policyNumber = ?2)
             ORDER BY name ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![ci, policy_number], holder_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn distinct_companies(&self) -> HolderResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT insuranceCompany FROM insurance_holders
             WHERE insuranceCompany IS NOT NULL AND insuranceCompany <> ''
             ORDER BY insuranceCompany ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn patients_for_holder(&self, holder_id: &str) -> HolderResult<Vec<LinkedPatient>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.ci, p.name, p.birthDate, p.gender, r.relationshipType, r.isPrimary
             FROM patients p
             JOIN holder_patient_relationships r ON p.id = r.patientId
             WHERE r.holderId = ?1
             ORDER BY r.isPrimary DESC, p.name ASC",
        )?;
        let rows = stmt.query_map(params![holder_id], |row| {
            Ok(LinkedPatient {
                id: row.get(0)?,
                ci: row.get(1)?,
                name: row.get(2)?,
                birth_date: row.get(3)?,
                gender: row.get(4)?,
                relationship_type: row.get(5)?,
                is_primary: row.get::<_, i64>(6)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn relationship_count(&self, holder_id: &str) -> HolderResult<i64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM holder_patient_relationships WHERE holderId = ?1",
            params![holder_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    // ── Writes ────────────────────────────────────────────────────

    /// Insert a normalized holder and, when requested, its own patient
    /// record and relationship. All-or-nothing.
    pub fn insert_holder(&self, id: &str, h: &NewHolder, now: &str) -> HolderResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO insurance_holders (
                id, ci, name, phone, otherPhone, fixedPhone, email, birthDate, age, gender,
                address, city, state, clientId, insuranceCompany, policyNumber, policyType,
                policyStatus, policyStartDate, policyEndDate, coverageType, maxCoverageAmount,
                usedCoverageAmount, emergencyContact, emergencyPhone, bloodType, allergies,
                medicalHistory, isActive, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, 0, ?23, ?24, ?25, ?26, ?27, 1, ?28, ?28)",
            params![
                id,
                h.ci,
                h.name,
                h.phone,
                h.other_phone,
                h.fixed_phone,
                h.email,
                h.birth_date,
                h.age,
                h.gender,
                h.address,
                h.city,
                h.state,
                h.client_id,
                h.insurance_company,
                h.policy_number,
                h.policy_type,
                h.policy_status,
                h.policy_start_date,
                h.policy_end_date,
                h.coverage_type,
                h.max_coverage_amount,
                h.emergency_contact,
                h.emergency_phone,
                h.blood_type,
                h.allergies,
                h.medical_history,
                now,
            ],
        );
        if let Err(e) = inserted {
            return Err(translate_ci_conflict(e, h.ci.as_deref().unwrap_or_default()));
        }

        if h.create_as_patient.unwrap_or(true) {
            let patient_id = uuid::Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO patients (id, ci, name, birthDate, gender, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![patient_id, h.ci, h.name, h.birth_date, h.gender, now],
            )?;
            tx.execute(
                "INSERT INTO holder_patient_relationships (holderId, patientId, relationshipType, isPrimary)
                 VALUES (?1, ?2, ?3, 1)",
                params![id, patient_id, HOLDER_RELATIONSHIP],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Apply a validated patch. Coverage and policy date order are re-checked
    /// inside the transaction; a violation rolls the update back.
    pub fn update_holder(&self, id: &str, patch: &HolderPatch, now: &str) -> HolderResult<()> {
        let assignments = patch
            .changes()
            .iter()
            .map(|(field, _)| format!("{} = ?", field.column()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE insurance_holders SET {assignments}, updated_at = ? WHERE id = ?");

        let mut bound: Vec<Value> = patch.changes().iter().map(|(_, v)| v.clone()).collect();
        bound.push(Value::Text(now.to_string()));
        bound.push(Value::Text(id.to_string()));

        let tx = self.conn.unchecked_transaction()?;
        let affected = match tx.execute(&sql, params_from_iter(bound.iter())) {
            Ok(n) => n,
            Err(e) => {
                return Err(translate_ci_conflict(
                    e,
                    patch.text(HolderField::Ci).unwrap_or_default(),
                ))
            }
        };
        if affected == 0 {
            return Err(HolderError::not_found("Insurance holder", id));
        }

        let (max, used, start, end): (Option<f64>, f64, Option<String>, Option<String>) = tx
            .query_row(
                "SELECT maxCoverageAmount, usedCoverageAmount, policyStartDate, policyEndDate
                 FROM insurance_holders WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        if let Some(max) = max {
            if used > max {
                return Err(HolderError::invalid(
                    "usedCoverageAmount",
                    format!("Used coverage {used:.2} exceeds the maximum {max:.2}"),
                ));
            }
        }
        // ISO dates order as text.
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(HolderError::invalid(
                    "policyEndDate",
                    "Policy end date precedes its start date",
                ));
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete the relationships, then the holder. Returns false (and rolls
    /// back) when no holder matched.
    pub fn delete_holder(&self, id: &str) -> HolderResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM holder_patient_relationships WHERE holderId = ?1",
            params![id],
        )?;
        let affected = tx.execute("DELETE FROM insurance_holders WHERE id = ?1", params![id])?;
        if affected == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }
}

fn translate_ci_conflict(err: rusqlite::Error, ci: &str) -> HolderError {
    if is_constraint_violation(&err) && err.to_string().contains("insurance_holders.ci") {
        HolderError::duplicate_ci(ci)
    } else {
        HolderError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::HolderFilter;

    fn store() -> HolderStore {
        let s = HolderStore::in_memory().unwrap();
        s
    }

    fn normalized(ci: &str, name: &str) -> NewHolder {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        NewHolder::new(ci, name, "0414-0000000").normalize(today).unwrap()
    }

    #[test]
    fn insert_then_get_round_trips() {
        let s = store();
        s.insert_holder("h-1", &normalized("V-1", "Ana"), "2025-01-01 10:00:00")
            .unwrap();
        let h = s.get_holder("h-1").unwrap().unwrap();
        assert_eq!(h.ci, "V-1");
        assert_eq!(h.policy_status, "Activo");
        assert_eq!(h.used_coverage_amount, 0.0);
        assert!(h.is_active);
        assert_eq!(h.total_patients, Some(1));
        assert_eq!(h.total_cases, None);
    }

    #[test]
    fn unique_ci_is_translated_to_conflict() {
        let s = store();
        s.insert_holder("h-1", &normalized("V-1", "Ana"), "2025-01-01 10:00:00")
            .unwrap();
        let err = s
            .insert_holder("h-2", &normalized("V-1", "Otra"), "2025-01-01 10:00:00")
            .unwrap_err();
        assert!(matches!(err, HolderError::Conflict { field: "ci", .. }));
        // Neither the holder nor its patient row survived the failed insert.
        assert!(s.get_holder("h-2").unwrap().is_none());
        let patients: i64 = s
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |r| r.get(0))
            .unwrap();
        assert_eq!(patients, 1);
    }

    #[test]
    fn update_rejects_end_date_before_start_and_rolls_back() {
        let s = store();
        let mut h = NewHolder::new("V-1", "Ana", "0414-0000000");
        h.policy_start_date = Some("2025-01-01".into());
        h.policy_end_date = Some("2025-12-31".into());
        let today = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        s.insert_holder("h-1", &h.normalize(today).unwrap(), "2025-01-01 10:00:00")
            .unwrap();

        let body = serde_json::json!({ "policyEndDate": "2024-06-01", "city": "Guacara" });
        let patch = HolderPatch::from_json(body.as_object().unwrap()).unwrap();
        let err = s.update_holder("h-1", &patch, "2025-02-01 10:00:00").unwrap_err();
        assert!(err.field_messages().unwrap().contains_key("policyEndDate"));

        let h = s.get_holder("h-1").unwrap().unwrap();
        assert_eq!(h.policy_end_date.as_deref(), Some("2025-12-31"));
        assert_eq!(h.city, None, "whole update rolled back");
    }

    #[test]
    fn delete_of_missing_row_reports_false() {
        let s = store();
        assert!(!s.delete_holder("nope").unwrap());
    }

    #[test]
    fn count_respects_filter() {
        let s = store();
        s.insert_holder("h-1", &normalized("V-1", "Ana"), "2025-01-01 10:00:00")
            .unwrap();
        s.insert_holder("h-2", &normalized("V-2", "Luis"), "2025-01-01 10:00:00")
            .unwrap();
        let w = HolderFilter::default().with_search("lui").to_where();
        assert_eq!(s.count_holders(&w).unwrap(), 1);
        let w = HolderFilter::default().with_search("%").to_where();
        assert_eq!(s.count_holders(&w).unwrap(), 0);
    }
}
