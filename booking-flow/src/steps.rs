use serde::{Deserialize, Serialize};

use crate::form::Section;

/// A wizard page: title and one-line description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub title: &'static str,
    pub description: &'static str,
}

/// The fixed, ordered step sequence of the booking wizard.
pub const STEPS: [Step; 8] = [
    Step { title: "Client Info", description: "Client details" },
    Step { title: "General Info", description: "Address and inspection type" },
    Step { title: "Agent Info", description: "Agent details" },
    Step { title: "Property Info", description: "Property details" },
    Step { title: "Agreement", description: "Select or create contract" },
    Step { title: "Cover Letter", description: "Add a cover letter" },
    Step { title: "Payment", description: "Payment method and values" },
    Step { title: "Review", description: "Review all information" },
];

pub const STEP_COUNT: usize = STEPS.len();
pub const FIRST_STEP: usize = 0;
pub const LAST_STEP: usize = STEP_COUNT - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ClientInfo,
    GeneralInfo,
    AgentInfo,
    PropertyInfo,
    Agreement,
    CoverLetter,
    Payment,
    Review,
}

impl StepKind {
    pub const ALL: [StepKind; STEP_COUNT] = [
        StepKind::ClientInfo,
        StepKind::GeneralInfo,
        StepKind::AgentInfo,
        StepKind::PropertyInfo,
        StepKind::Agreement,
        StepKind::CoverLetter,
        StepKind::Payment,
        StepKind::Review,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static Step {
        &STEPS[self.index()]
    }

    /// Form section edited on this step. The review step only reads.
    pub fn section(self) -> Option<Section> {
        match self {
            StepKind::ClientInfo => Some(Section::ClientInfo),
            StepKind::GeneralInfo => Some(Section::GeneralInfo),
            StepKind::AgentInfo => Some(Section::AgentInfo),
            StepKind::PropertyInfo => Some(Section::PropertyInfo),
            StepKind::Agreement => Some(Section::Agreement),
            StepKind::CoverLetter => Some(Section::CoverLetter),
            StepKind::Payment => Some(Section::Payment),
            StepKind::Review => None,
        }
    }
}

// Reference data offered by the step views.

pub const INSPECTION_TYPES: [&str; 5] = [
    "Wind Mitigation Inspection",
    "Residential Inspection",
    "FL 4-Point Inspection",
    "Commercial Inspection",
    "TREC: Texas Inspection",
];

pub const PAYMENT_METHODS: [&str; 5] = ["credit_card", "debit_card", "bank_transfer", "cash", "check"];

pub const PAYMENT_SPLITS: [&str; 4] = ["full", "inspection", "report", "custom"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kinds_line_up_with_descriptors() {
        for (index, kind) in StepKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), index);
            assert_eq!(StepKind::from_index(index), Some(*kind));
        }
        assert_eq!(StepKind::Review.descriptor().title, "Review");
        assert_eq!(StepKind::from_index(STEP_COUNT), None);
        assert_eq!(LAST_STEP, 7);
    }
}
