//! Phase derivation for MariaDBDatabase reconciliation
//!
//! Nothing about the lifecycle is persisted beyond what the resources already
//! show. Each pass observes the deletion marker, the finalizer, the completed
//! flag, the MariaDB readiness and (once ensured) the Job, and `decide` maps
//! that snapshot to the next step. The engine feeds Job observations back in
//! until a step ends the pass.
//!
//! Deletion first removes the create Job and waits for its pods to be gone,
//! so a retrying create cannot run after the drop.

use crate::crd::{MariaDB, MariaDBDatabase};
use crate::job::{JobKind, JobProgress, JobRemoval};

/// Fields of a MariaDBDatabase that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclarationView {
    pub deletion_requested: bool,
    pub guarded: bool,
    pub completed: bool,
}

impl DeclarationView {
    pub fn observe(database: &MariaDBDatabase) -> Self {
        Self {
            deletion_requested: database.deletion_requested(),
            guarded: database.is_guarded(),
            completed: database.is_completed(),
        }
    }
}

/// Fields of a MariaDB that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentView {
    pub ready: bool,
}

impl ParentView {
    pub fn observe(parent: &MariaDB) -> Self {
        Self {
            ready: parent.is_ready(),
        }
    }
}

/// What is known about the Job of the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskObservation {
    /// Not ensured yet in this pass
    Unobserved,
    Running,
    Finished,
}

impl From<JobProgress> for TaskObservation {
    fn from(progress: JobProgress) -> Self {
        if progress.is_running() {
            Self::Running
        } else {
            Self::Finished
        }
    }
}

/// State of the create Job during deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// Not requested yet in this pass
    Unchecked,
    /// Its pods may still run
    InFlight,
    Done,
}

impl From<JobRemoval> for Retirement {
    fn from(removal: JobRemoval) -> Self {
        if removal.is_complete() {
            Self::Done
        } else {
            Self::InFlight
        }
    }
}

/// Next step of a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Deletion requested and our finalizer is already gone
    Nothing,
    /// Add the finalizer and persist, then decide again
    AddGuard,
    /// Delete the create Job, then decide again
    RetireProvision,
    /// The create Job is being deleted
    AwaitRetirement,
    /// MariaDB has no init hash yet
    AwaitParent,
    /// Create the Job if absent and observe it, then decide again
    EnsureTask(JobKind),
    /// The Job exists and is not terminal
    AwaitTask(JobKind),
    /// Mark completed (if not yet) and delete the create Job
    FinishProvision,
    /// Delete the drop Job and remove the finalizer
    FinishDeprovision,
}

impl Decision {
    /// Phase name used in logs
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Nothing => "DeleteRequestedNoGuard",
            Self::AddGuard => "CreateNoGuard",
            Self::RetireProvision => "DeleteRetireProvision",
            Self::AwaitRetirement => "DeleteAwaitRetirement",
            Self::AwaitParent => "CreateAwaitParent",
            Self::EnsureTask(JobKind::Provision) => "CreateRunning",
            Self::EnsureTask(JobKind::Deprovision) => "DeleteRequestedGuarded",
            Self::AwaitTask(JobKind::Provision) => "CreatePending",
            Self::AwaitTask(JobKind::Deprovision) => "DeletePending",
            Self::FinishProvision => "CreateDone",
            Self::FinishDeprovision => "DeleteCleanup",
        }
    }
}

pub fn decide(
    database: &DeclarationView,
    parent: &ParentView,
    retirement: Retirement,
    task: TaskObservation,
) -> Decision {
    if database.deletion_requested {
        if !database.guarded {
            return Decision::Nothing;
        }
        return match (retirement, task) {
            (Retirement::Unchecked, _) => Decision::RetireProvision,
            (Retirement::InFlight, _) => Decision::AwaitRetirement,
            (Retirement::Done, TaskObservation::Unobserved) => {
                Decision::EnsureTask(JobKind::Deprovision)
            }
            (Retirement::Done, TaskObservation::Running) => Decision::AwaitTask(JobKind::Deprovision),
            (Retirement::Done, TaskObservation::Finished) => Decision::FinishDeprovision,
        };
    }

    if !database.guarded {
        return Decision::AddGuard;
    }
    if !parent.ready {
        return Decision::AwaitParent;
    }
    if database.completed {
        return Decision::FinishProvision;
    }

    match task {
        TaskObservation::Unobserved => Decision::EnsureTask(JobKind::Provision),
        TaskObservation::Running => Decision::AwaitTask(JobKind::Provision),
        TaskObservation::Finished => Decision::FinishProvision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn view(deletion_requested: bool, guarded: bool, completed: bool) -> DeclarationView {
        DeclarationView {
            deletion_requested,
            guarded,
            completed,
        }
    }

    const RETIRED: Retirement = Retirement::Done;
    const UNCHECKED: Retirement = Retirement::Unchecked;

    #[rstest]
    #[case::delete_without_guard(view(true, false, false), true, UNCHECKED, TaskObservation::Unobserved, Decision::Nothing)]
    #[case::delete_without_guard_completed(view(true, false, true), true, RETIRED, TaskObservation::Finished, Decision::Nothing)]
    #[case::delete_retire_create_job(view(true, true, false), true, UNCHECKED, TaskObservation::Unobserved, Decision::RetireProvision)]
    #[case::delete_create_job_draining(view(true, true, false), true, Retirement::InFlight, TaskObservation::Unobserved, Decision::AwaitRetirement)]
    #[case::delete_guarded(view(true, true, true), true, RETIRED, TaskObservation::Unobserved, Decision::EnsureTask(JobKind::Deprovision))]
    #[case::delete_guarded_parent_not_ready(view(true, true, false), false, RETIRED, TaskObservation::Unobserved, Decision::EnsureTask(JobKind::Deprovision))]
    #[case::delete_pending(view(true, true, true), true, RETIRED, TaskObservation::Running, Decision::AwaitTask(JobKind::Deprovision))]
    #[case::delete_cleanup(view(true, true, true), true, RETIRED, TaskObservation::Finished, Decision::FinishDeprovision)]
    #[case::create_no_guard(view(false, false, false), false, UNCHECKED, TaskObservation::Unobserved, Decision::AddGuard)]
    #[case::create_no_guard_completed(view(false, false, true), true, UNCHECKED, TaskObservation::Unobserved, Decision::AddGuard)]
    #[case::create_await_parent(view(false, true, false), false, UNCHECKED, TaskObservation::Unobserved, Decision::AwaitParent)]
    #[case::create_running(view(false, true, false), true, UNCHECKED, TaskObservation::Unobserved, Decision::EnsureTask(JobKind::Provision))]
    #[case::create_pending(view(false, true, false), true, UNCHECKED, TaskObservation::Running, Decision::AwaitTask(JobKind::Provision))]
    #[case::create_done(view(false, true, false), true, UNCHECKED, TaskObservation::Finished, Decision::FinishProvision)]
    #[case::already_completed(view(false, true, true), true, UNCHECKED, TaskObservation::Unobserved, Decision::FinishProvision)]
    fn test_decide(
        #[case] database: DeclarationView,
        #[case] parent_ready: bool,
        #[case] retirement: Retirement,
        #[case] task: TaskObservation,
        #[case] expected: Decision,
    ) {
        let parent = ParentView {
            ready: parent_ready,
        };
        assert_eq!(decide(&database, &parent, retirement, task), expected);
    }

    #[test]
    fn test_deletion_never_adds_guard() {
        for guarded in [false, true] {
            for completed in [false, true] {
                for ready in [false, true] {
                    for retirement in [UNCHECKED, Retirement::InFlight, RETIRED] {
                        for task in [
                            TaskObservation::Unobserved,
                            TaskObservation::Running,
                            TaskObservation::Finished,
                        ] {
                            let decision = decide(
                                &view(true, guarded, completed),
                                &ParentView { ready },
                                retirement,
                                task,
                            );
                            assert_ne!(decision, Decision::AddGuard);
                            assert!(!matches!(
                                decision,
                                Decision::EnsureTask(JobKind::Provision)
                                    | Decision::FinishProvision
                            ));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_drop_job_waits_for_create_job_removal() {
        let deleting = view(true, true, false);
        let ready = ParentView { ready: true };
        for task in [
            TaskObservation::Unobserved,
            TaskObservation::Running,
            TaskObservation::Finished,
        ] {
            for retirement in [UNCHECKED, Retirement::InFlight] {
                let decision = decide(&deleting, &ready, retirement, task);
                assert!(matches!(
                    decision,
                    Decision::RetireProvision | Decision::AwaitRetirement
                ));
            }
        }
    }

    #[test]
    fn test_removal_maps_to_retirement() {
        assert_eq!(Retirement::from(JobRemoval::Absent), Retirement::Done);
        assert_eq!(Retirement::from(JobRemoval::Deleted), Retirement::Done);
        assert_eq!(Retirement::from(JobRemoval::Deleting), Retirement::InFlight);
    }

    #[test]
    fn test_job_progress_maps_to_observation() {
        assert_eq!(TaskObservation::from(JobProgress::Created), TaskObservation::Running);
        assert_eq!(TaskObservation::from(JobProgress::Running), TaskObservation::Running);
        assert_eq!(TaskObservation::from(JobProgress::Finished), TaskObservation::Finished);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Decision::AwaitParent.phase(), "CreateAwaitParent");
        assert_eq!(Decision::FinishDeprovision.phase(), "DeleteCleanup");
    }
}
