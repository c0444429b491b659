//! Step nodes of the onboarding flow graph.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::answer::Answer;

/// A node in the onboarding flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    /// Line the coach says on this step. Display data only.
    #[serde(default)]
    pub coach_message: String,
    /// Default successor. Absent on terminal steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    /// Answer value → successor overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditional_next: BTreeMap<String, String>,
}

/// What a step is. The presentation layer switches on this; the engine
/// only cares about loading/plan for back-navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepKind {
    Welcome,
    Question(Question),
    Content { content: StepContent },
    Loading,
    Plan,
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Question(_) => "question",
            Self::Content { .. } => "content",
            Self::Loading => "loading",
            Self::Plan => "plan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TextInput,
    MultiSelect,
    Slider,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MultipleChoice => "multiple-choice",
            Self::TextInput => "text-input",
            Self::MultiSelect => "multi-select",
            Self::Slider => "slider",
        };
        write!(f, "{s}")
    }
}

/// A selectable option of a discrete question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuestionOption {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Payload of a question step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Slider lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    /// Slider upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_select: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_select: Option<usize>,
}

impl Question {
    pub fn new(question_type: QuestionType, question: &str) -> Self {
        Self {
            question: question.to_string(),
            question_type,
            options: Vec::new(),
            placeholder: None,
            min: None,
            max: None,
            min_select: None,
            max_select: None,
        }
    }

    pub fn with_options(mut self, options: Vec<QuestionOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_select_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_select = Some(min);
        self.max_select = Some(max);
        self
    }

    /// Whether answers are picked from `options`.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self.question_type,
            QuestionType::MultipleChoice | QuestionType::MultiSelect
        )
    }

    pub fn min_select(&self) -> usize {
        self.min_select.unwrap_or(1)
    }

    pub fn max_select(&self) -> usize {
        self.max_select.unwrap_or(self.options.len())
    }

    pub fn option(&self, id: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Check that `answer` has the shape this question expects.
    ///
    /// Returns a human-readable reason on failure.
    pub fn check_answer(&self, answer: &Answer) -> Result<(), String> {
        match (self.question_type, answer) {
            (QuestionType::MultipleChoice, Answer::Single(id)) => {
                if self.option(id).is_none() {
                    return Err(format!("unknown option '{id}'"));
                }
                Ok(())
            }
            (QuestionType::MultiSelect, Answer::Multi(ids)) => {
                let mut seen = HashSet::new();
                for id in ids {
                    if self.option(id).is_none() {
                        return Err(format!("unknown option '{id}'"));
                    }
                    if !seen.insert(id.as_str()) {
                        return Err(format!("option '{id}' selected twice"));
                    }
                }
                let (min, max) = (self.min_select(), self.max_select());
                if ids.len() < min || ids.len() > max {
                    return Err(format!(
                        "expected between {min} and {max} selections, got {}",
                        ids.len()
                    ));
                }
                Ok(())
            }
            (QuestionType::TextInput, Answer::Single(text)) => {
                if text.trim().is_empty() {
                    return Err("answer is empty".to_string());
                }
                Ok(())
            }
            (QuestionType::Slider, Answer::Single(raw)) => {
                let value: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("'{raw}' is not a number"))?;
                if self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max)
                {
                    return Err(format!("{value} is out of range"));
                }
                Ok(())
            }
            (QuestionType::MultiSelect, Answer::Single(_)) => {
                Err("expected a list of option ids".to_string())
            }
            (_, Answer::Multi(_)) => Err(format!(
                "{} questions take a single value",
                self.question_type
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramType {
    Complexity,
    System,
    Flowchart,
    Comparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TipIcon {
    Lightbulb,
    Warning,
    Check,
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub icon: TipIcon,
    pub title: String,
    pub description: String,
}

/// Informational payload of a content step.
///
/// Carried through untouched for the presentation layer; nothing in the
/// engine reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StepContent {
    Video {
        url: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<String>,
    },
    Code {
        language: String,
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        highlight_lines: Vec<u32>,
    },
    Diagram {
        diagram_type: DiagramType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        data: serde_json::Value,
    },
    LongText {
        title: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reading_time: Option<String>,
    },
    Image {
        url: String,
        alt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    TipCard {
        tips: Vec<Tip>,
    },
}

impl StepContent {
    /// Short heading for text-only adapters.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Video { title, .. } | Self::LongText { title, .. } => Some(title),
            Self::Code { title, .. } | Self::Diagram { title, .. } => title.as_deref(),
            Self::Image { caption, .. } => caption.as_deref(),
            Self::TipCard { .. } => None,
        }
    }
}

impl Step {
    pub fn new(id: &str, kind: StepKind, coach_message: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            coach_message: coach_message.to_string(),
            next_step: None,
            conditional_next: BTreeMap::new(),
        }
    }

    pub fn then(mut self, next: &str) -> Self {
        self.next_step = Some(next.to_string());
        self
    }

    pub fn branch(mut self, answer: &str, next: &str) -> Self {
        self.conditional_next
            .insert(answer.to_string(), next.to_string());
        self
    }

    pub fn question(&self) -> Option<&Question> {
        match &self.kind {
            StepKind::Question(q) => Some(q),
            _ => None,
        }
    }

    pub fn is_welcome(&self) -> bool {
        matches!(self.kind, StepKind::Welcome)
    }

    pub fn is_plan(&self) -> bool {
        matches!(self.kind, StepKind::Plan)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.kind, StepKind::Loading)
    }

    /// Every step id this step can transition to.
    pub fn successors(&self) -> impl Iterator<Item = &str> {
        self.next_step
            .as_deref()
            .into_iter()
            .chain(self.conditional_next.values().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weak_areas() -> Question {
        Question::new(QuestionType::MultiSelect, "Which areas?")
            .with_options(vec![
                QuestionOption::new("algorithms", "Algorithms"),
                QuestionOption::new("system-design", "System Design"),
                QuestionOption::new("communication", "Communication"),
            ])
            .with_select_bounds(1, 2)
    }

    #[test]
    fn multi_select_bounds_are_checked() {
        let q = weak_areas();
        assert!(q.check_answer(&Answer::multi(["algorithms"])).is_ok());
        assert!(q
            .check_answer(&Answer::multi(["algorithms", "communication"]))
            .is_ok());

        let err = q.check_answer(&Answer::Multi(Vec::new())).unwrap_err();
        assert!(err.contains("between 1 and 2"), "{err}");
        assert!(q
            .check_answer(&Answer::multi(["algorithms", "system-design", "communication"]))
            .is_err());
    }

    #[test]
    fn multi_select_rejects_unknown_and_duplicate_ids() {
        let q = weak_areas();
        assert!(q.check_answer(&Answer::multi(["cooking"])).is_err());
        assert!(q
            .check_answer(&Answer::multi(["algorithms", "algorithms"]))
            .is_err());
        assert!(q.check_answer(&Answer::single("algorithms")).is_err());
    }

    #[test]
    fn default_select_bounds() {
        let q = Question::new(QuestionType::MultiSelect, "Pick")
            .with_options(vec![QuestionOption::new("a", "A"), QuestionOption::new("b", "B")]);
        assert_eq!(q.min_select(), 1);
        assert_eq!(q.max_select(), 2);
    }

    #[test]
    fn multiple_choice_and_text_input() {
        let q = Question::new(QuestionType::MultipleChoice, "When?")
            .with_options(vec![QuestionOption::new("this-week", "This week")]);
        assert!(q.check_answer(&Answer::single("this-week")).is_ok());
        assert!(q.check_answer(&Answer::single("next-year")).is_err());
        assert!(q.check_answer(&Answer::multi(["this-week"])).is_err());

        let text = Question::new(QuestionType::TextInput, "Anything else?");
        assert!(text.check_answer(&Answer::single("nervous about graphs")).is_ok());
        assert!(text.check_answer(&Answer::single("   ")).is_err());
    }

    #[test]
    fn slider_range() {
        let mut q = Question::new(QuestionType::Slider, "Hours per week?");
        q.min = Some(1);
        q.max = Some(20);
        assert!(q.check_answer(&Answer::single("10")).is_ok());
        assert!(q.check_answer(&Answer::single("0")).is_err());
        assert!(q.check_answer(&Answer::single("21")).is_err());
        assert!(q.check_answer(&Answer::single("ten")).is_err());
    }

    #[test]
    fn step_json_is_flat_and_tagged() {
        let step = Step::new(
            "timeline",
            StepKind::Question(
                Question::new(QuestionType::MultipleChoice, "When's your interview?")
                    .with_options(vec![QuestionOption::new("this-week", "This week")
                        .with_description("High-impact prep")]),
            ),
            "First, your timeline.",
        )
        .then("experience");

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "question");
        assert_eq!(json["questionType"], "multiple-choice");
        assert_eq!(json["nextStep"], "experience");
        assert_eq!(json["options"][0]["description"], "High-impact prep");
        assert!(json.get("conditionalNext").is_none());

        let parsed: Step = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, step);
    }

    #[test]
    fn content_step_parses_from_json() {
        let step: Step = serde_json::from_value(serde_json::json!({
            "id": "tips",
            "type": "content",
            "coachMessage": "Read these.",
            "content": {
                "type": "tip-card",
                "tips": [{"icon": "star", "title": "Know your complexities", "description": "Always state them."}]
            },
            "nextStep": "plan"
        }))
        .unwrap();

        match &step.kind {
            StepKind::Content {
                content: StepContent::TipCard { tips },
            } => assert_eq!(tips[0].icon, TipIcon::Star),
            other => panic!("expected tip card, got {other:?}"),
        }
        assert_eq!(step.successors().collect::<Vec<_>>(), vec!["plan"]);
    }

    #[test]
    fn successors_include_branches() {
        let step = Step::new("a", StepKind::Welcome, "")
            .then("b")
            .branch("x", "c")
            .branch("y", "d");
        let succ: Vec<&str> = step.successors().collect();
        assert_eq!(succ, vec!["b", "c", "d"]);
    }
}
