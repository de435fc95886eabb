//! Navigation state machine
//!
//! Three views (`Home`, `Operational`, `Summary`) plus the derived `Locked`
//! condition of an administrator with no tenant. Transitions are a pure
//! function of the current state, the session and the event:
//! - the lock is recomputed from the session on every attempt
//! - refused transitions leave the state untouched and emit a notice
//! - every accepted transition bumps the epoch
//!
//! The epoch is the state identity. Async work started by a transition
//! carries the epoch it was started under; its result is applied only while
//! that epoch is still current, otherwise it is dropped.

use crate::aggregate::AggregateView;
use crate::error::{Notice, PlannerError};
use crate::session::{SessionContext, TenantRef};
use crate::types::{LeafRef, OperationalRecord, PatchReceipt, RecordId, RecordPatch, TenantId};
use serde::Serialize;

/// Visible view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Landing view
    Home,
    /// Operational editor for one leaf
    Operational {
        /// Open leaf
        leaf: LeafRef,
    },
    /// General summary
    Summary,
}

/// Current view and its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    /// Visible view
    pub view: View,
    /// Bumped on every accepted transition
    pub epoch: u64,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            view: View::Home,
            epoch: 0,
        }
    }
}

impl NavigationState {
    fn advance(&self, view: View) -> Self {
        Self {
            view,
            epoch: self.epoch + 1,
        }
    }
}

/// Navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    /// Open the operational editor for a leaf
    OpenOperational(LeafRef),
    /// Open the general summary
    OpenSummary,
    /// Return home
    GoHome,
    /// The administrator switched or cleared the active tenant
    TenantChanged,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show a notice
    Notify(Notice),
    /// Fetch the leaf's operational records
    LoadRecords {
        /// Leaf to load
        leaf: LeafRef,
        /// Tenant slug for the operational endpoint
        slug: String,
        /// Epoch the result belongs to
        epoch: u64,
    },
    /// Run the summary pipeline
    BuildSummary {
        /// Tenant to summarise
        tenant: TenantId,
        /// Epoch the result belongs to
        epoch: u64,
    },
}

/// Outcome of one transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the attempt
    pub state: NavigationState,
    /// Effects to run, in order
    pub effects: Vec<Effect>,
    /// Whether the event was accepted
    pub accepted: bool,
}

impl Transition {
    fn accept(state: NavigationState, effects: Vec<Effect>) -> Self {
        Self {
            state,
            effects,
            accepted: true,
        }
    }

    fn refuse(state: &NavigationState, notice: Notice) -> Self {
        Self {
            state: state.clone(),
            effects: vec![Effect::Notify(notice)],
            accepted: false,
        }
    }
}

/// Compute the transition for `event`
#[must_use]
pub fn transition(state: &NavigationState, session: &SessionContext, event: NavEvent) -> Transition {
    let locked = session.is_locked();

    match event {
        NavEvent::GoHome | NavEvent::TenantChanged => {
            Transition::accept(state.advance(View::Home), Vec::new())
        }

        NavEvent::OpenSummary => match summary_gate(session) {
            Ok(tenant) => {
                let next = state.advance(View::Summary);
                let epoch = next.epoch;
                Transition::accept(next, vec![Effect::BuildSummary { tenant, epoch }])
            }
            Err(notice) => refuse_or_relock(state, locked, notice),
        },

        NavEvent::OpenOperational(leaf) => {
            if session.role.is_admin() {
                return refuse_or_relock(state, locked, Notice::AdminCannotEditOperational);
            }
            let Some(slug) = session.tenant_slug() else {
                return Transition::refuse(
                    state,
                    Notice::MissingTenantContext {
                        missing: "slug".into(),
                    },
                );
            };
            let slug = slug.to_string();
            let next = state.advance(View::Operational { leaf: leaf.clone() });
            let epoch = next.epoch;
            Transition::accept(next, vec![Effect::LoadRecords { leaf, slug, epoch }])
        }
    }
}

/// Check that tenant-scoped summary data may be shown
///
/// Shared by the general summary and the single-leaf detail.
///
/// # Errors
/// `SelectTenantFirst` for a locked administrator, `MissingTenantContext`
/// for an operator whose credential carries no tenant id
pub fn summary_gate(session: &SessionContext) -> Result<TenantId, Notice> {
    if session.is_locked() {
        return Err(Notice::SelectTenantFirst);
    }
    session.tenant_id().ok_or_else(|| Notice::MissingTenantContext {
        missing: "id".into(),
    })
}

/// Refusal that also pulls a locked session back to the locked home view
fn refuse_or_relock(state: &NavigationState, locked: bool, notice: Notice) -> Transition {
    if locked && state.view != View::Home {
        return Transition {
            state: state.advance(View::Home),
            effects: vec![Effect::Notify(notice)],
            accepted: false,
        };
    }
    Transition::refuse(state, notice)
}

/// Fan-out progress counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutProgress {
    /// Leaves finished, success or failure
    pub done: usize,
    /// Leaves in the walk
    pub total: usize,
}

/// Summary view contents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SummaryScreen {
    /// Pipeline running
    Loading {
        /// Progress so far
        progress: FanOutProgress,
    },
    /// The catalog has no programs
    NoPrograms,
    /// Programs exist but none has leaves
    NoLeaves,
    /// Table ready
    Ready {
        /// Aggregated table
        view: AggregateView,
    },
    /// Structural failure
    Failed {
        /// Why
        notice: Notice,
    },
}

/// Operational view contents
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordsScreen {
    /// Records requested
    Loading,
    /// Records in backend order
    Ready {
        /// Rows
        records: Vec<OperationalRecord>,
    },
    /// Load failed
    Failed {
        /// Why
        notice: Notice,
    },
}

/// Renderable snapshot of the navigator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// Home, reduced to "select a tenant" while locked
    Home {
        /// Locked rendering
        locked: bool,
        /// Active tenant display name
        tenant: Option<String>,
    },
    /// Operational editor
    Operational {
        /// Open leaf
        leaf: LeafRef,
        /// Records state
        records: RecordsScreen,
    },
    /// General summary
    Summary {
        /// Summary state
        summary: SummaryScreen,
    },
}

/// Owner of the navigation state and the session
///
/// Applies transitions and holds the data of the visible view. Results from
/// async work are applied through the `apply_*` methods, which drop any
/// result whose epoch is no longer current.
#[derive(Debug)]
pub struct Navigator {
    state: NavigationState,
    session: SessionContext,
    summary: SummaryScreen,
    records: RecordsScreen,
}

impl Navigator {
    /// Create navigator at `Home`
    #[must_use]
    pub fn new(session: SessionContext) -> Self {
        Self {
            state: NavigationState::default(),
            session,
            summary: SummaryScreen::Loading {
                progress: FanOutProgress::default(),
            },
            records: RecordsScreen::Loading,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Session context
    #[inline]
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Check whether `epoch` still identifies the visible view
    #[inline]
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.state.epoch == epoch
    }

    /// Attempt a transition and adopt its state
    ///
    /// Any epoch change drops the loaded summary and records, so the open
    /// leaf and its rows never outlive the view that loaded them.
    pub fn dispatch(&mut self, event: NavEvent) -> Transition {
        let t = transition(&self.state, &self.session, event);
        if t.state.epoch != self.state.epoch {
            self.summary = SummaryScreen::Loading {
                progress: FanOutProgress::default(),
            };
            self.records = RecordsScreen::Loading;
        }
        if t.accepted {
            tracing::debug!(view = ?t.state.view, epoch = t.state.epoch, "navigated");
        } else {
            tracing::warn!(view = ?t.state.view, "navigation refused");
        }
        self.state = t.state.clone();
        t
    }

    /// Switch or clear the active tenant and return home
    ///
    /// # Errors
    /// `PlannerError::NotPermitted` for tenant operators, whose tenant comes
    /// from the credential
    pub fn change_tenant(&mut self, tenant: Option<TenantRef>) -> Result<Transition, PlannerError> {
        if !self.session.role.is_admin() {
            return Err(PlannerError::NotPermitted(
                "only administrators switch tenants".into(),
            ));
        }
        self.session.set_tenant(tenant);
        Ok(self.dispatch(NavEvent::TenantChanged))
    }

    /// Update the loading counter; dropped if stale
    pub fn apply_progress(&mut self, epoch: u64, progress: FanOutProgress) -> bool {
        if !self.accepts_summary(epoch) {
            return false;
        }
        if let SummaryScreen::Loading { progress: current } = &mut self.summary {
            *current = progress;
        }
        true
    }

    /// Install the finished summary; dropped if stale
    pub fn apply_summary(&mut self, epoch: u64, summary: SummaryScreen) -> bool {
        if !self.accepts_summary(epoch) {
            tracing::debug!(epoch, current = self.state.epoch, "discarding stale summary");
            return false;
        }
        self.summary = summary;
        true
    }

    /// Install loaded records; dropped if stale
    pub fn apply_records(
        &mut self,
        epoch: u64,
        records: Result<Vec<OperationalRecord>, Notice>,
    ) -> bool {
        if !self.accepts_records(epoch) {
            tracing::debug!(epoch, current = self.state.epoch, "discarding stale records");
            return false;
        }
        self.records = match records {
            Ok(records) => RecordsScreen::Ready { records },
            Err(notice) => RecordsScreen::Failed { notice },
        };
        true
    }

    /// Fold a saved patch into the visible records; dropped if stale
    pub fn apply_saved(
        &mut self,
        epoch: u64,
        record_id: RecordId,
        patch: &RecordPatch,
        receipt: &PatchReceipt,
    ) -> bool {
        if !self.accepts_records(epoch) {
            return false;
        }
        if let RecordsScreen::Ready { records } = &mut self.records {
            if let Some(row) = records.iter_mut().find(|r| r.id == record_id) {
                row.apply_patch(patch, receipt);
            }
        }
        true
    }

    /// Renderable snapshot
    #[must_use]
    pub fn screen(&self) -> Screen {
        match &self.state.view {
            View::Home => Screen::Home {
                locked: self.session.is_locked(),
                tenant: self.session.display_name(),
            },
            View::Operational { leaf } => Screen::Operational {
                leaf: leaf.clone(),
                records: self.records.clone(),
            },
            View::Summary => Screen::Summary {
                summary: self.summary.clone(),
            },
        }
    }

    fn accepts_summary(&self, epoch: u64) -> bool {
        self.is_current(epoch) && self.state.view == View::Summary
    }

    fn accepts_records(&self, epoch: u64) -> bool {
        self.is_current(epoch) && matches!(self.state.view, View::Operational { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::types::LeafId;
    use pretty_assertions::assert_eq;

    fn leaf() -> LeafRef {
        LeafRef {
            id: LeafId(10),
            name: "L1".into(),
        }
    }

    fn operator() -> SessionContext {
        SessionContext::operator(TenantRef::from_id(TenantId(7)).with_slug("norte"))
    }

    fn admin_with_tenant() -> SessionContext {
        SessionContext::administrator().with_tenant(TenantRef::from_id(TenantId(7)))
    }

    fn at(view: View, epoch: u64) -> NavigationState {
        NavigationState { view, epoch }
    }

    #[test]
    fn locked_admin_cannot_leave_home() {
        let home = NavigationState::default();
        let session = SessionContext::administrator();

        for event in [NavEvent::OpenSummary, NavEvent::OpenOperational(leaf())] {
            let t = transition(&home, &session, event);
            assert!(!t.accepted);
            assert_eq!(t.state, home);
            assert!(matches!(t.effects.as_slice(), [Effect::Notify(_)]));
        }
    }

    #[test]
    fn locked_admin_summary_notice() {
        let t = transition(
            &NavigationState::default(),
            &SessionContext::administrator(),
            NavEvent::OpenSummary,
        );
        assert_eq!(t.effects, vec![Effect::Notify(Notice::SelectTenantFirst)]);
    }

    #[test]
    fn admin_never_opens_operational() {
        let t = transition(
            &NavigationState::default(),
            &admin_with_tenant(),
            NavEvent::OpenOperational(leaf()),
        );
        assert!(!t.accepted);
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::AdminCannotEditOperational)]
        );
    }

    #[test]
    fn admin_with_tenant_opens_summary() {
        let t = transition(&NavigationState::default(), &admin_with_tenant(), NavEvent::OpenSummary);
        assert!(t.accepted);
        assert_eq!(t.state, at(View::Summary, 1));
        assert_eq!(
            t.effects,
            vec![Effect::BuildSummary {
                tenant: TenantId(7),
                epoch: 1
            }]
        );
    }

    #[test]
    fn operator_opens_operational_with_slug() {
        let t = transition(&NavigationState::default(), &operator(), NavEvent::OpenOperational(leaf()));
        assert!(t.accepted);
        assert_eq!(t.state.view, View::Operational { leaf: leaf() });
        assert_eq!(
            t.effects,
            vec![Effect::LoadRecords {
                leaf: leaf(),
                slug: "norte".into(),
                epoch: 1
            }]
        );
    }

    #[test]
    fn operator_without_slug_is_refused_before_any_request() {
        let session = SessionContext::operator(TenantRef::from_id(TenantId(7)));
        let t = transition(&NavigationState::default(), &session, NavEvent::OpenOperational(leaf()));
        assert!(!t.accepted);
        assert_eq!(
            t.effects,
            vec![Effect::Notify(Notice::MissingTenantContext {
                missing: "slug".into()
            })]
        );
    }

    #[test]
    fn operator_without_id_cannot_open_summary() {
        let session = SessionContext::operator(TenantRef::default().with_slug("norte"));
        let err = summary_gate(&session).unwrap_err();
        assert_eq!(
            err,
            Notice::MissingTenantContext {
                missing: "id".into()
            }
        );
    }

    #[test]
    fn summary_reentry_is_a_fresh_build() {
        let summary = at(View::Summary, 3);
        let t = transition(&summary, &operator(), NavEvent::OpenSummary);
        assert_eq!(t.state.epoch, 4);
        assert!(matches!(t.effects[0], Effect::BuildSummary { epoch: 4, .. }));
    }

    #[test]
    fn go_home_always_accepted() {
        for view in [View::Home, View::Summary, View::Operational { leaf: leaf() }] {
            let t = transition(&at(view, 2), &SessionContext::administrator(), NavEvent::GoHome);
            assert!(t.accepted);
            assert_eq!(t.state, at(View::Home, 3));
            assert!(t.effects.is_empty());
        }
    }

    #[test]
    fn locked_session_outside_home_is_pulled_back() {
        let t = transition(&at(View::Summary, 5), &SessionContext::administrator(), NavEvent::OpenSummary);
        assert!(!t.accepted);
        assert_eq!(t.state, at(View::Home, 6));
    }

    #[test]
    fn tenant_change_forces_home_and_drops_results() {
        let mut nav = Navigator::new(admin_with_tenant());
        let t = nav.dispatch(NavEvent::OpenSummary);
        let epoch = t.state.epoch;

        let t = nav
            .change_tenant(Some(TenantRef::from_id(TenantId(8))))
            .unwrap();
        assert_eq!(t.state.view, View::Home);
        assert!(!nav.is_current(epoch));
        assert!(!nav.apply_summary(epoch, SummaryScreen::NoPrograms));
        assert_eq!(
            nav.screen(),
            Screen::Home {
                locked: false,
                tenant: Some("#8".into())
            }
        );

        nav.change_tenant(None).unwrap();
        assert_eq!(
            nav.screen(),
            Screen::Home {
                locked: true,
                tenant: None
            }
        );
    }

    #[test]
    fn going_home_drops_loaded_view_data() {
        let mut nav = Navigator::new(operator());
        let epoch = nav.dispatch(NavEvent::OpenOperational(leaf())).state.epoch;
        assert!(nav.apply_records(epoch, Ok(vec![])));

        let t = nav.dispatch(NavEvent::GoHome);
        assert!(t.effects.is_empty());
        assert_eq!(
            nav.screen(),
            Screen::Home {
                locked: false,
                tenant: Some("norte".into())
            }
        );

        nav.dispatch(NavEvent::OpenOperational(leaf()));
        assert_eq!(
            nav.screen(),
            Screen::Operational {
                leaf: leaf(),
                records: RecordsScreen::Loading
            }
        );
    }

    #[test]
    fn operator_cannot_change_tenant() {
        let mut nav = Navigator::new(operator());
        assert_eq!(nav.session().role, Role::TenantOperator);
        assert!(matches!(
            nav.change_tenant(None),
            Err(PlannerError::NotPermitted(_))
        ));
    }

    #[test]
    fn results_apply_only_to_their_view() {
        let mut nav = Navigator::new(operator());
        let summary_epoch = nav.dispatch(NavEvent::OpenSummary).state.epoch;
        assert!(nav.apply_progress(
            summary_epoch,
            FanOutProgress { done: 1, total: 2 }
        ));
        assert!(!nav.apply_records(summary_epoch, Ok(vec![])));
        assert_eq!(
            nav.screen(),
            Screen::Summary {
                summary: SummaryScreen::Loading {
                    progress: FanOutProgress { done: 1, total: 2 }
                }
            }
        );

        let records_epoch = nav.dispatch(NavEvent::OpenOperational(leaf())).state.epoch;
        assert!(!nav.apply_summary(summary_epoch, SummaryScreen::NoLeaves));
        assert!(nav.apply_records(records_epoch, Ok(vec![])));
        assert_eq!(
            nav.screen(),
            Screen::Operational {
                leaf: leaf(),
                records: RecordsScreen::Ready { records: vec![] }
            }
        );
    }
}
