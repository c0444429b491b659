//! Flow definition: the static step graph the onboarding walks.
//!
//! Steps are declared once at startup (either the built-in interview-prep
//! flow or a JSON file), validated, and then shared read-only by every
//! session.

pub mod answer;
pub mod canonical;
pub mod definition;
pub mod step;

pub use answer::Answer;
pub use canonical::{canonical, step_ids};
pub use definition::FlowDefinition;
pub use step::{
    DiagramType, Question, QuestionOption, QuestionType, Step, StepContent, StepKind, Tip, TipIcon,
};
