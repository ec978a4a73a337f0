use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::planning::affected::{describe_absences, resolve_staffing_units};
use crate::planning::conflicts::resolve_conflicts;
use crate::planning::plan::{Plan, PlanReport};
use crate::planning::{AbsenceRecord, Assignment, PlanError, ReportInfo, StaffingUnit, SubstituteChoice};
use crate::recommender::{RecommendRequest, Recommender};
use crate::snapshot::{self, Storage};
use crate::timetable::{School, Teacher, Weekday};

#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub absences: Vec<AbsenceRecord>,
    pub units: Vec<StaffingUnit>,
}

pub struct PlanningSession {
    school: Arc<School>,
    storage: Arc<dyn Storage>,
    plan: Option<Plan>,
    preparer_name: String,
}

impl PlanningSession {
    pub fn restore(school: Arc<School>, storage: Arc<dyn Storage>) -> Self {
        let plan = snapshot::load_saved_plan(storage.as_ref());
        if let Some(plan) = &plan {
            info!(
                "restored plan for {} with {} rows",
                plan.info.date,
                plan.assignments.len()
            );
        }
        let preparer_name = snapshot::load_preparer_name(storage.as_ref());
        Self {
            school,
            storage,
            plan,
            preparer_name,
        }
    }

    pub fn school(&self) -> &Arc<School> {
        &self.school
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn preparer_name(&self) -> &str {
        &self.preparer_name
    }

    pub fn prepare(
        school: &School,
        date: NaiveDate,
        absences: Vec<AbsenceRecord>,
    ) -> Result<PreparedRun, PlanError> {
        let weekday = Weekday::from_date(date)
            .ok_or_else(|| PlanError::invalid(format!("{date} falls on a weekend")))?;
        let units = resolve_staffing_units(&absences, school, weekday)?;
        Ok(PreparedRun {
            date,
            weekday,
            absences,
            units,
        })
    }

    /// Touches no session state, so callers may run it without holding a lock.
    pub async fn propose_plan(
        school: &School,
        run: &PreparedRun,
        recommender: &dyn Recommender,
    ) -> Result<Plan, PlanError> {
        let info = ReportInfo {
            date: run.date,
            weekday: run.weekday,
            absences: describe_absences(&run.absences, school),
        };
        if run.units.is_empty() {
            info!("no classes affected on {}", run.weekday);
            return Ok(Plan::new(info, Vec::new()));
        }

        let request = RecommendRequest {
            weekday: run.weekday,
            absences: &run.absences,
            staffing_units: &run.units,
            school,
        };
        let proposals = recommender.propose(&request).await?;
        let assignments = resolve_conflicts(proposals, &run.units, school, &run.absences)?;
        let plan = Plan::new(info, assignments);
        info!(
            "{} produced {} assignments ({} left for manual entry)",
            recommender.name(),
            plan.assignments.len(),
            plan.manual_rows()
        );
        Ok(plan)
    }

    pub async fn generate(
        &mut self,
        date: NaiveDate,
        absences: Vec<AbsenceRecord>,
        preparer: Option<&str>,
        recommender: &dyn Recommender,
    ) -> Result<&Plan, PlanError> {
        let run = Self::prepare(&self.school, date, absences)?;
        let plan = Self::propose_plan(&self.school, &run, recommender).await?;
        if let Some(name) = preparer {
            self.set_preparer_name(name);
        }
        Ok(self.commit(plan))
    }

    pub fn commit(&mut self, plan: Plan) -> &Plan {
        snapshot::save_plan(self.storage.as_ref(), &plan);
        self.plan.insert(plan)
    }

    fn plan_mut(&mut self) -> Result<&mut Plan, PlanError> {
        self.plan
            .as_mut()
            .ok_or_else(|| PlanError::invalid("no plan has been generated"))
    }

    pub fn set_substitute(
        &mut self,
        index: usize,
        choice: SubstituteChoice,
    ) -> Result<Assignment, PlanError> {
        let school = Arc::clone(&self.school);
        let updated = self
            .plan_mut()?
            .set_substitute(index, choice, &school.roster)?
            .clone();
        self.persist();
        Ok(updated)
    }

    pub fn set_manual_substitute_name(
        &mut self,
        index: usize,
        name: &str,
    ) -> Result<Assignment, PlanError> {
        let updated = self
            .plan_mut()?
            .set_manual_substitute_name(index, name)?
            .clone();
        self.persist();
        Ok(updated)
    }

    pub fn available_substitutes(&self, index: usize) -> Result<Vec<Teacher>, PlanError> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| PlanError::invalid("no plan has been generated"))?;
        plan.available_for_row(&self.school, index)
    }

    pub fn set_preparer_name(&mut self, name: &str) {
        self.preparer_name = name.trim().to_string();
        snapshot::save_preparer_name(self.storage.as_ref(), &self.preparer_name);
    }

    pub fn clear(&mut self) {
        if self.plan.take().is_none() {
            warn!("clearing without a current plan");
        }
        snapshot::clear_plan(self.storage.as_ref());
    }

    pub fn report(&self) -> Option<PlanReport> {
        self.plan.as_ref().map(|plan| PlanReport {
            school_name: self.school.name.clone(),
            preparer_name: self.preparer_name.clone(),
            plan: plan.clone(),
        })
    }

    fn persist(&self) {
        if let Some(plan) = &self.plan {
            snapshot::save_plan(self.storage.as_ref(), plan);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::PlanningSession;
    use crate::planning::{
        AbsenceRecord, PlanError, SubstituteChoice, JUSTIFICATION_MANUAL_ENTRY,
        MANUAL_SUBSTITUTE_ID,
    };
    use crate::recommender::local::LocalRecommender;
    use crate::recommender::{RawProposal, RecommendRequest, Recommender, RecommenderKind};
    use crate::snapshot::{self, MemoryStorage, Storage};
    use crate::timetable::sample::sample_school;

    struct FailingRecommender;

    #[async_trait]
    impl Recommender for FailingRecommender {
        fn kind(&self) -> RecommenderKind {
            RecommenderKind::Gemini
        }

        fn name(&self) -> &str {
            "failing"
        }

        async fn propose(
            &self,
            _request: &RecommendRequest<'_>,
        ) -> Result<Vec<RawProposal>, PlanError> {
            Err(PlanError::unavailable("offline"))
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date")
    }

    fn session() -> (PlanningSession, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let school = Arc::new(sample_school().expect("sample school"));
        let session = PlanningSession::restore(school, storage.clone());
        (session, storage)
    }

    #[test]
    fn generates_and_persists_plan() {
        let (mut session, storage) = session();
        let plan = tokio_test::block_on(session.generate(
            monday(),
            vec![AbsenceRecord::new("NS", "Cuti sakit")],
            None,
            &LocalRecommender,
        ))
        .expect("plan")
        .clone();
        assert!(!plan.assignments.is_empty());
        assert_eq!(plan.info.absences[0].reason, "Cuti sakit");

        let reopened = PlanningSession::restore(session.school().clone(), storage);
        assert_eq!(reopened.plan(), Some(&plan));
    }

    #[test]
    fn failed_run_keeps_previous_plan() {
        let (mut session, _) = session();
        let first = tokio_test::block_on(session.generate(
            monday(),
            vec![AbsenceRecord::new("NS", "")],
            None,
            &LocalRecommender,
        ))
        .expect("plan")
        .clone();

        let failed = tokio_test::block_on(session.generate(
            monday(),
            vec![AbsenceRecord::new("AY", "")],
            None,
            &FailingRecommender,
        ));
        assert!(matches!(failed, Err(PlanError::RecommenderUnavailable(_))));
        assert_eq!(session.plan(), Some(&first));

        let weekend = NaiveDate::from_ymd_opt(2025, 3, 8).expect("valid date");
        let rejected = tokio_test::block_on(session.generate(
            weekend,
            vec![AbsenceRecord::new("AY", "")],
            None,
            &LocalRecommender,
        ));
        assert!(matches!(rejected, Err(PlanError::InvalidInput(_))));
        assert_eq!(session.plan(), Some(&first));
    }

    #[test]
    fn preparer_name_is_only_stored_after_a_successful_run() {
        let (mut session, storage) = session();
        session.set_preparer_name("Cikgu Aminah");

        let failed = tokio_test::block_on(session.generate(
            monday(),
            vec![AbsenceRecord::new("NS", "")],
            Some("Cikgu Baru"),
            &FailingRecommender,
        ));
        assert!(failed.is_err());
        assert_eq!(session.preparer_name(), "Cikgu Aminah");
        assert_eq!(snapshot::load_preparer_name(storage.as_ref()), "Cikgu Aminah");

        tokio_test::block_on(session.generate(
            monday(),
            vec![AbsenceRecord::new("NS", "")],
            Some(" Cikgu Baru "),
            &LocalRecommender,
        ))
        .expect("plan");
        assert_eq!(session.preparer_name(), "Cikgu Baru");
        assert_eq!(snapshot::load_preparer_name(storage.as_ref()), "Cikgu Baru");
    }

    #[test]
    fn overrides_are_persisted() {
        let (mut session, storage) = session();
        tokio_test::block_on(session.generate(
            monday(),
            vec![AbsenceRecord::new("NS", "")],
            None,
            &LocalRecommender,
        ))
        .expect("plan");

        session
            .set_substitute(0, SubstituteChoice::Manual)
            .expect("override");
        session
            .set_manual_substitute_name(0, "Cikgu Relief")
            .expect("name");
        session.set_preparer_name(" Cikgu Aminah ");

        let saved = snapshot::load_saved_plan(storage.as_ref()).expect("saved plan");
        assert_eq!(saved.assignments[0].substitute_teacher_id, MANUAL_SUBSTITUTE_ID);
        assert_eq!(saved.assignments[0].substitute_teacher_name, "Cikgu Relief");
        assert_eq!(saved.assignments[0].justification, JUSTIFICATION_MANUAL_ENTRY);
        assert_eq!(snapshot::load_preparer_name(storage.as_ref()), "Cikgu Aminah");

        session.clear();
        assert!(session.plan().is_none());
        assert!(storage.get(snapshot::PLAN_KEY).is_none());
    }

    #[test]
    fn overrides_without_plan_are_rejected() {
        let (mut session, _) = session();
        assert!(matches!(
            session.set_substitute(0, SubstituteChoice::Manual),
            Err(PlanError::InvalidInput(_))
        ));
    }
}
