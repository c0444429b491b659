//! The built-in interview-prep onboarding flow.

use std::sync::{Arc, LazyLock};

use super::definition::FlowDefinition;
use super::step::{
    DiagramType, Question, QuestionOption, QuestionType, Step, StepContent, StepKind, Tip, TipIcon,
};

/// Step ids the plan generator and adapters refer to by name.
pub mod step_ids {
    pub const WELCOME: &str = "welcome";
    pub const TIMELINE: &str = "timeline";
    pub const EXPERIENCE: &str = "experience";
    pub const INTERVIEW_TYPE: &str = "interview-type";
    pub const WEAK_AREAS: &str = "weak-areas";
    pub const PAST_ATTEMPTS: &str = "past-attempts";
    pub const LOADING: &str = "loading";
    pub const PLAN: &str = "plan";
}

static CANONICAL: LazyLock<Arc<FlowDefinition>> =
    LazyLock::new(|| Arc::new(FlowDefinition::interview_prep()));

/// Shared handle to the built-in flow.
pub fn canonical() -> Arc<FlowDefinition> {
    Arc::clone(&CANONICAL)
}

const TWO_SUM: &str = "def two_sum(nums, target):
    left, right = 0, len(nums) - 1

    while left < right:
        total = nums[left] + nums[right]
        if total == target:
            return [left, right]
        elif total < target:
            left += 1
        else:
            right -= 1
    return []";

const SYSTEM_DESIGN_PRIMER: &str = "## The Core Trade-offs

Every design decision trades one property for another. Knowing the trade-offs
matters more than memorizing architectures.

### CAP Theorem
Under a network partition you keep either consistency or availability:
- **Consistency**: every read sees the latest write
- **Availability**: every request gets a response
- **Partition tolerance**: the system survives dropped messages

### Scaling
- **Vertical**: bigger machines. Simple, but capped.
- **Horizontal**: more machines. Needs stateless services.

### Building Blocks
1. **Load balancers**: round robin, least connections, IP hash
2. **Caches**: cache-aside, write-through, write-behind
3. **CDNs**: static content close to users
4. **Message queues**: async work and decoupling
5. **Databases**: SQL vs NoSQL, sharding, replication

### A Framework
1. Clarify functional and non-functional requirements
2. Estimate scale
3. Sketch the high-level design
4. Deep dive into one or two components
5. Find the bottleneck at 10x load";

fn choice(question: &str, options: Vec<QuestionOption>) -> StepKind {
    StepKind::Question(Question::new(QuestionType::MultipleChoice, question).with_options(options))
}

fn multi(question: &str, options: Vec<QuestionOption>) -> StepKind {
    let max = options.len();
    StepKind::Question(
        Question::new(QuestionType::MultiSelect, question)
            .with_options(options)
            .with_select_bounds(1, max),
    )
}

fn content(content: StepContent) -> StepKind {
    StepKind::Content { content }
}

fn opt(id: &str, label: &str) -> QuestionOption {
    QuestionOption::new(id, label)
}

impl FlowDefinition {
    /// The interview-prep flow: welcome, two profile questions, five
    /// content steps, three more questions, loading, plan.
    pub fn interview_prep() -> Self {
        use step_ids::*;

        let complexities = serde_json::json!({
            "complexities": [
                { "name": "O(1)", "label": "Constant", "example": "Array access" },
                { "name": "O(log n)", "label": "Logarithmic", "example": "Binary search" },
                { "name": "O(n)", "label": "Linear", "example": "Simple loop" },
                { "name": "O(n log n)", "label": "Linearithmic", "example": "Merge sort" },
                { "name": "O(n²)", "label": "Quadratic", "example": "Nested loops" },
                { "name": "O(2ⁿ)", "label": "Exponential", "example": "Recursive fibonacci" }
            ]
        });

        let steps = vec![
            Step::new(
                WELCOME,
                StepKind::Welcome,
                "Hi there! I'm your interview coach, and I'm here to help you prepare.",
            )
            .then(TIMELINE),
            Step::new(
                TIMELINE,
                choice(
                    "When's your interview?",
                    vec![
                        opt("this-week", "This week")
                            .with_description("We'll focus on high-impact prep"),
                        opt("1-2-weeks", "1-2 weeks")
                            .with_description("Good time for structured practice"),
                        opt("1-month", "About a month")
                            .with_description("Perfect for comprehensive prep"),
                        opt("exploring", "Just exploring")
                            .with_description("Let's build a foundation"),
                    ],
                ),
                "First, let's understand your timeline.",
            )
            .then(EXPERIENCE),
            Step::new(
                EXPERIENCE,
                choice(
                    "How many years of experience do you have?",
                    vec![
                        opt("0-2", "0-2 years").with_description("Entry level / New grad"),
                        opt("3-5", "3-5 years").with_description("Mid-level"),
                        opt("6-10", "6-10 years").with_description("Senior"),
                        opt("10+", "10+ years").with_description("Staff / Principal"),
                    ],
                ),
                "Got it! Now tell me about your experience level.",
            )
            .then("big-o-intro"),
            Step::new(
                "big-o-intro",
                content(StepContent::Video {
                    url: "https://www.youtube.com/embed/BgLTDT03QtU".to_string(),
                    title: "Big O Notation in 5 Minutes".to_string(),
                    duration: Some("5:23".to_string()),
                }),
                "Before we continue, let's make sure you're solid on Big O notation.",
            )
            .then("big-o-diagram"),
            Step::new(
                "big-o-diagram",
                content(StepContent::Diagram {
                    diagram_type: DiagramType::Complexity,
                    title: Some("Time Complexity Comparison".to_string()),
                    data: complexities,
                }),
                "Here's how the common time complexities compare.",
            )
            .then("code-example"),
            Step::new(
                "code-example",
                content(StepContent::Code {
                    language: "python".to_string(),
                    code: TWO_SUM.to_string(),
                    title: Some("Two Sum (Sorted Array)".to_string()),
                    highlight_lines: vec![2, 5, 6],
                }),
                "A classic pattern: two pointers on a sorted array. O(n) time, O(1) space.",
            )
            .then("interview-tips"),
            Step::new(
                "interview-tips",
                content(StepContent::TipCard {
                    tips: vec![
                        Tip {
                            icon: TipIcon::Lightbulb,
                            title: "Think Out Loud".to_string(),
                            description: "Narrate your reasoning, especially when you're stuck."
                                .to_string(),
                        },
                        Tip {
                            icon: TipIcon::Warning,
                            title: "Don't Jump to Code".to_string(),
                            description: "Clarify the problem and agree on an approach first."
                                .to_string(),
                        },
                        Tip {
                            icon: TipIcon::Check,
                            title: "Test Your Code".to_string(),
                            description: "Walk a small example through it and check edge cases."
                                .to_string(),
                        },
                        Tip {
                            icon: TipIcon::Star,
                            title: "Know Your Complexities".to_string(),
                            description: "State time and space complexity without being asked."
                                .to_string(),
                        },
                    ],
                }),
                "These four habits come up in every debrief. Read them carefully.",
            )
            .then("system-design-intro"),
            Step::new(
                "system-design-intro",
                content(StepContent::LongText {
                    title: "System Design Fundamentals".to_string(),
                    content: SYSTEM_DESIGN_PRIMER.to_string(),
                    reading_time: Some("3 min read".to_string()),
                }),
                "System design is about trade-offs. Here's a quick primer.",
            )
            .then(INTERVIEW_TYPE),
            Step::new(
                INTERVIEW_TYPE,
                multi(
                    "What types of interviews are you preparing for?",
                    vec![
                        opt("coding", "Coding / Algorithms"),
                        opt("system-design", "System Design"),
                        opt("behavioral", "Behavioral"),
                        opt("technical-deep-dive", "Technical Deep Dive"),
                    ],
                ),
                "Now that you've seen some examples, let's identify what you'll be facing.",
            )
            .then(WEAK_AREAS),
            Step::new(
                WEAK_AREAS,
                multi(
                    "Which areas do you feel least confident in?",
                    vec![
                        opt("data-structures", "Data Structures"),
                        opt("algorithms", "Algorithms"),
                        opt("system-design", "System Design"),
                        opt("communication", "Communicating my thought process"),
                    ],
                ),
                "Be honest with me - it helps me help you better!",
            )
            .then(PAST_ATTEMPTS),
            Step::new(
                PAST_ATTEMPTS,
                choice(
                    "Have you interviewed at this company before?",
                    vec![
                        opt("first-time", "First time"),
                        opt("interviewed-before", "Yes, didn't get an offer"),
                        opt("got-offer-before", "Yes, got an offer before"),
                    ],
                ),
                "Every attempt is a learning opportunity.",
            )
            .then(LOADING),
            Step::new(
                LOADING,
                StepKind::Loading,
                "Analyzing your profile and creating a personalized plan...",
            )
            .then(PLAN),
            Step::new(
                PLAN,
                StepKind::Plan,
                "Here's your personalized interview prep plan!",
            ),
        ];

        Self::new(steps).expect("built-in interview-prep flow is valid")
    }
}
