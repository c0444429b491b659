//! Personalized prep plan derived from onboarding answers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flow::Answer;
use crate::flow::step_ids::{TIMELINE, WEAK_AREAS};

const DEFAULT_TIMELINE: &str = "4 weeks";
const DEFAULT_HOURS: &str = "4-6 hrs/week";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
        }
    }
}

/// One area the plan asks the user to work on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusArea {
    pub name: String,
    pub priority: Priority,
    pub weekly_hours: String,
}

impl FocusArea {
    fn new(name: &str, priority: Priority, weekly_hours: &str) -> Self {
        Self {
            name: name.to_string(),
            priority,
            weekly_hours: weekly_hours.to_string(),
        }
    }
}

/// The recommendation shown on the plan step. Always has at least one
/// focus area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub focus_areas: Vec<FocusArea>,
    pub timeline_label: String,
    pub recommendations: Vec<String>,
}

impl Plan {
    /// Coach line announcing the plan.
    pub fn headline(&self, company_name: &str, role_name: &str) -> String {
        format!(
            "Great news! I've created a personalized {} plan for your {} interview at {}.",
            self.timeline_label, role_name, company_name
        )
    }

    /// One-line summary, e.g. "2 weeks • 3 focus areas".
    pub fn summary(&self) -> String {
        let n = self.focus_areas.len();
        format!(
            "{} • {} focus area{}",
            self.timeline_label,
            n,
            if n == 1 { "" } else { "s" }
        )
    }
}

fn focus_area(area: &str) -> FocusArea {
    match area {
        "data-structures" => FocusArea::new("Data Structures", Priority::High, "8-10 hrs/week"),
        "algorithms" => FocusArea::new("Algorithms", Priority::High, "8-10 hrs/week"),
        "system-design" => FocusArea::new("System Design", Priority::Medium, DEFAULT_HOURS),
        "communication" => {
            FocusArea::new("Communication Skills", Priority::Medium, "2-3 hrs/week")
        }
        other => FocusArea::new(other, Priority::Medium, DEFAULT_HOURS),
    }
}

fn timeline_label(timeline: Option<&str>) -> &'static str {
    match timeline {
        Some("this-week") => "5 days",
        Some("1-2-weeks") => "2 weeks",
        Some("1-month") => "4 weeks",
        Some("exploring") => "8 weeks",
        _ => DEFAULT_TIMELINE,
    }
}

/// Build the plan for a set of answers.
///
/// Total: any answers, including none at all, produce a plan.
pub fn generate_plan(answers: &BTreeMap<String, Answer>, company: &str) -> Plan {
    let mut focus_areas: Vec<FocusArea> = answers
        .get(WEAK_AREAS)
        .map(|answer| answer.values().into_iter().map(focus_area).collect())
        .unwrap_or_default();

    if focus_areas.is_empty() {
        focus_areas.push(FocusArea::new("Core Preparation", Priority::High, "6-8 hrs/week"));
    }

    let timeline = answers.get(TIMELINE).and_then(Answer::as_single);

    Plan {
        focus_areas,
        timeline_label: timeline_label(timeline).to_string(),
        recommendations: vec![
            format!("Focus on {company}-specific interview patterns"),
            "Practice with timed mock interviews".to_string(),
            "Review common behavioral questions".to_string(),
        ],
    }
}
