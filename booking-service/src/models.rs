use booking_flow::{
    DraftId, FormData, LAST_STEP, PaymentSummary, Section, StepKind, StepResult, Transition,
    WizardSession, WizardStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartWizardRequest {
    pub form: Option<FormData>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchFormRequest {
    pub section: Section,
    pub fields: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateTimeRequest {
    pub value: String,
}

/// `?q=` filter shared by the listing endpoints.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyQuery {
    /// Restrict to properties owned by this contact.
    pub contact_id: Option<String>,
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct StepView {
    pub index: usize,
    pub kind: StepKind,
    pub title: &'static str,
    pub description: &'static str,
    /// Form section the step edits; `None` for the review step.
    pub section: Option<Section>,
}

impl From<StepKind> for StepView {
    fn from(kind: StepKind) -> Self {
        let step = kind.descriptor();
        Self {
            index: kind.index(),
            kind,
            title: step.title,
            description: step.description,
            section: kind.section(),
        }
    }
}

/// What a client needs to render the current wizard page.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub status: WizardStatus,
    pub current_step: usize,
    pub step: Option<StepView>,
    pub draft_id: Option<DraftId>,
    pub can_go_back: bool,
    pub can_finish: bool,
    pub payment_summary: PaymentSummary,
    pub form: FormData,
}

impl From<WizardSession> for SessionView {
    fn from(session: WizardSession) -> Self {
        let open = session.is_open();
        let step = session.current().map(StepView::from);
        let form = session.form.into_inner();
        Self {
            step,
            can_go_back: open && session.current_step > 0,
            can_finish: open && session.current_step == LAST_STEP,
            payment_summary: form.payment.summary(),
            session_id: session.id,
            status: session.status,
            current_step: session.current_step,
            draft_id: session.draft_id,
            form,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub transition: Transition,
    pub session: SessionView,
}

impl From<StepResult> for TransitionResponse {
    fn from(result: StepResult) -> Self {
        Self {
            transition: result.transition,
            session: result.session.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepsResponse {
    pub steps: Vec<StepView>,
    pub inspection_types: &'static [&'static str],
    pub payment_methods: &'static [&'static str],
    pub payment_splits: &'static [&'static str],
}
