//! Terminal wizard: walks one session through the flow over stdin/stdout.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::SessionError;
use crate::flow::{Answer, Question, QuestionType, Step, StepContent, StepKind, TipIcon};
use crate::onboarding::manager::{OnboardingManager, PlanView, SessionView};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a line of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    Answer(Answer),
    Back,
    Reset,
    Quit,
}

/// Interpret one input line against the step being shown.
///
/// Options can be picked by number (1-based) or id; multi-select takes a
/// comma- or space-separated list.
pub fn parse_input(step: &Step, line: &str) -> Result<Command, String> {
    let input = line.trim();
    match input.to_ascii_lowercase().as_str() {
        "back" | "b" => return Ok(Command::Back),
        "reset" => return Ok(Command::Reset),
        "quit" | "q" | "exit" => return Ok(Command::Quit),
        _ => {}
    }

    match &step.kind {
        StepKind::Welcome | StepKind::Content { .. } => {
            if input.is_empty() {
                Ok(Command::Continue)
            } else {
                Err("Press Enter to continue.".to_string())
            }
        }
        StepKind::Loading => Err("Hang tight, your plan is being built.".to_string()),
        StepKind::Plan => match input.to_ascii_lowercase().as_str() {
            "" | "y" | "yes" => Ok(Command::Continue),
            _ => Err("Press Enter to start preparing.".to_string()),
        },
        StepKind::Question(question) => parse_answer(question, input).map(Command::Answer),
    }
}

fn parse_answer(question: &Question, input: &str) -> Result<Answer, String> {
    if input.is_empty() {
        return Err("Please enter an answer.".to_string());
    }
    match question.question_type {
        QuestionType::MultipleChoice => resolve_option(question, input).map(Answer::Single),
        QuestionType::MultiSelect => input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|token| resolve_option(question, token))
            .collect::<Result<Vec<_>, _>>()
            .map(Answer::Multi),
        QuestionType::TextInput | QuestionType::Slider => Ok(Answer::single(input)),
    }
}

fn resolve_option(question: &Question, token: &str) -> Result<String, String> {
    if let Ok(n) = token.parse::<usize>()
        && let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i))
    {
        return Ok(option.id.clone());
    }
    question
        .options
        .iter()
        .find(|o| o.id.eq_ignore_ascii_case(token))
        .map(|o| o.id.clone())
        .ok_or_else(|| format!("'{token}' is not one of the options."))
}

/// Text for a step, including the coach line and the input hint.
pub fn render_step(step: &Step, view: &SessionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out);

    match &step.kind {
        StepKind::Welcome => {
            if let Some(tagline) = &view.tagline {
                let _ = writeln!(out, "{tagline}");
            }
            let _ = writeln!(out, "Coach: {}", step.coach_message);
            let _ = writeln!(out, "[Enter] Let's get started");
        }
        StepKind::Question(question) => {
            let _ = writeln!(out, "Coach: {}", step.coach_message);
            let _ = writeln!(out, "{}", question.question);
            render_question(&mut out, question, view.state.answers.get(&step.id));
        }
        StepKind::Content { content } => {
            let _ = writeln!(out, "Coach: {}", step.coach_message);
            render_content(&mut out, content);
            let _ = writeln!(out, "[Enter] Continue");
        }
        StepKind::Loading => {
            let _ = writeln!(out, "Coach: {}", step.coach_message);
        }
        StepKind::Plan => {
            let _ = writeln!(out, "Coach: {}", step.coach_message);
        }
    }
    out
}

fn render_question(out: &mut String, question: &Question, previous: Option<&Answer>) {
    let chosen = previous.map(Answer::values).unwrap_or_default();
    for (i, option) in question.options.iter().enumerate() {
        let mark = if chosen.contains(&option.id.as_str()) { "*" } else { " " };
        let _ = write!(out, " {mark}{}. {}", i + 1, option.label);
        if let Some(description) = &option.description {
            let _ = write!(out, " ({description})");
        }
        let _ = writeln!(out);
    }
    match question.question_type {
        QuestionType::MultipleChoice => {
            let _ = writeln!(out, "Pick one (number or id).");
        }
        QuestionType::MultiSelect => {
            let _ = writeln!(
                out,
                "Pick {} to {}, separated by commas.",
                question.min_select(),
                question.max_select()
            );
        }
        QuestionType::TextInput => {
            let _ = writeln!(
                out,
                "{}",
                question.placeholder.as_deref().unwrap_or("Type your answer.")
            );
        }
        QuestionType::Slider => {
            let range = match (question.min, question.max) {
                (Some(min), Some(max)) => format!(" from {min} to {max}"),
                _ => String::new(),
            };
            let _ = writeln!(out, "Enter a number{range}.");
        }
    }
}

fn render_content(out: &mut String, content: &StepContent) {
    match content {
        StepContent::Video { url, title, duration } => {
            let _ = write!(out, "Video: {title}");
            if let Some(d) = duration {
                let _ = write!(out, " [{d}]");
            }
            let _ = writeln!(out, "\n  {url}");
        }
        StepContent::Code {
            language,
            code,
            title,
            highlight_lines,
        } => {
            let _ = writeln!(out, "{} ({language})", title.as_deref().unwrap_or("Code"));
            for (i, line) in code.lines().enumerate() {
                let marker = if highlight_lines.contains(&(i as u32 + 1)) { '>' } else { ' ' };
                let _ = writeln!(out, "{marker}{:>3} | {line}", i + 1);
            }
        }
        StepContent::Diagram { title, data, .. } => {
            if let Some(title) = title {
                let _ = writeln!(out, "{title}");
            }
            let rows = data
                .get("complexities")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            for row in rows {
                let field = |key: &str| row.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();
                let _ = writeln!(
                    out,
                    "  {:<10} {:<13} {}",
                    field("name"),
                    field("label"),
                    field("example")
                );
            }
        }
        StepContent::LongText {
            title,
            content,
            reading_time,
        } => {
            let _ = write!(out, "{title}");
            if let Some(t) = reading_time {
                let _ = write!(out, " ({t})");
            }
            let _ = writeln!(out, "\n\n{content}");
        }
        StepContent::Image { url, alt, caption } => {
            let _ = writeln!(out, "Image: {alt}\n  {url}");
            if let Some(caption) = caption {
                let _ = writeln!(out, "  {caption}");
            }
        }
        StepContent::TipCard { tips } => {
            for tip in tips {
                let icon = match tip.icon {
                    TipIcon::Lightbulb => "(i)",
                    TipIcon::Warning => "(!)",
                    TipIcon::Check => "(v)",
                    TipIcon::Star => "(*)",
                };
                let _ = writeln!(out, "{icon} {}: {}", tip.title, tip.description);
            }
        }
    }
}

/// Text for the plan screen.
pub fn render_plan(plan: &PlanView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", plan.headline);
    let _ = writeln!(out, "{}", plan.summary);
    let _ = writeln!(out, "\nFocus areas:");
    for area in &plan.plan.focus_areas {
        let _ = writeln!(out, "  - {} [{}] {}", area.name, area.priority, area.weekly_hours);
    }
    let _ = writeln!(out, "\nRecommendations:");
    for (i, rec) in plan.plan.recommendations.iter().enumerate() {
        let _ = writeln!(out, "  {}. {rec}", i + 1);
    }
    let _ = writeln!(out, "\n[Enter] Start preparing");
    out
}

/// Drive `manager` from `reader` until the plan is confirmed, the user
/// quits, or input ends.
pub async fn run_wizard<R, W>(
    manager: Arc<OnboardingManager>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let view = manager.view().await;
        let Some(step) = view.step.clone() else {
            anyhow::bail!("session {} is on an unknown step", view.session_id);
        };

        writer.write_all(render_step(&step, &view).as_bytes()).await?;

        if step.is_loading() {
            wait_for_loading(&manager, &step.id, &mut writer).await?;
            continue;
        }
        if step.is_plan() {
            let plan = manager.plan_view().await;
            writer.write_all(render_plan(&plan).as_bytes()).await?;
        }

        writer.write_all(b"> ").await?;
        writer.flush().await?;

        let Some(line) = lines.next_line().await? else {
            tracing::debug!("Input closed; leaving wizard");
            break;
        };

        match parse_input(&step, &line) {
            Err(hint) => {
                writer.write_all(format!("{hint}\n").as_bytes()).await?;
            }
            Ok(Command::Quit) => break,
            Ok(Command::Back) => {
                if view.can_go_back {
                    manager.go_back().await;
                } else {
                    writer.write_all(b"Nothing to go back to.\n").await?;
                }
            }
            Ok(Command::Reset) => {
                manager.reset().await;
                if let (Some(company), Some(role)) = (&view.state.company, &view.state.role) {
                    manager.set_context(company, role).await;
                }
            }
            Ok(Command::Continue) if step.is_plan() => {
                manager.complete_onboarding().await;
                writer.write_all(b"You're all set. Good luck!\n").await?;
                writer.flush().await?;
                break;
            }
            Ok(Command::Continue) => {
                manager.continue_step().await?;
            }
            Ok(Command::Answer(answer)) => match manager.submit_answer(answer).await {
                Ok(_) => {}
                Err(SessionError::InvalidAnswer { reason, .. }) => {
                    writer.write_all(format!("{reason}\n").as_bytes()).await?;
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Print loading stages as they start until the session leaves `step_id`.
async fn wait_for_loading<W>(
    manager: &Arc<OnboardingManager>,
    step_id: &str,
    writer: &mut W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let deadline = Instant::now() + manager.settings().loading_total() * 2 + Duration::from_secs(1);
    let mut shown = None;

    loop {
        let view = manager.view().await;
        if view.state.current_step_id != step_id {
            return Ok(());
        }
        if let Some(progress) = &view.loading
            && shown != Some(progress.stage)
        {
            if let Some(text) = &progress.stage_text {
                writer
                    .write_all(format!("  [{:>3}%] {text}\n", progress.percent).as_bytes())
                    .await?;
                writer.flush().await?;
            }
            shown = Some(progress.stage);
        }
        if Instant::now() > deadline {
            anyhow::bail!("loading step {step_id} did not finish");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::flow::canonical;
    use crate::flow::step_ids::*;
    use crate::store::{Database, LibSqlBackend};

    fn step(id: &str) -> Step {
        canonical().step(id).unwrap().clone()
    }

    async fn manager() -> Arc<OnboardingManager> {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let settings = SessionSettings::default().with_loading_scale(0.0).unwrap();
        let manager = OnboardingManager::open("cli", canonical(), db, settings).await;
        manager.set_context("google", "software-engineer").await;
        manager
    }

    #[test]
    fn parses_navigation_words() {
        let welcome = step(WELCOME);
        assert_eq!(parse_input(&welcome, " BACK "), Ok(Command::Back));
        assert_eq!(parse_input(&welcome, "reset"), Ok(Command::Reset));
        assert_eq!(parse_input(&welcome, "q"), Ok(Command::Quit));
        assert_eq!(parse_input(&welcome, ""), Ok(Command::Continue));
        assert!(parse_input(&welcome, "hello").is_err());
    }

    #[test]
    fn parses_choices_by_number_or_id() {
        let timeline = step(TIMELINE);
        assert_eq!(
            parse_input(&timeline, "2"),
            Ok(Command::Answer(Answer::single("1-2-weeks")))
        );
        assert_eq!(
            parse_input(&timeline, "Exploring"),
            Ok(Command::Answer(Answer::single("exploring")))
        );
        assert!(parse_input(&timeline, "9").is_err());
        assert!(parse_input(&timeline, "").is_err());
    }

    #[test]
    fn parses_multi_select_lists() {
        let weak = step(WEAK_AREAS);
        assert_eq!(
            parse_input(&weak, "1, system-design 4"),
            Ok(Command::Answer(Answer::multi([
                "data-structures",
                "system-design",
                "communication"
            ])))
        );
        assert!(parse_input(&weak, "1,juggling").is_err());
    }

    #[test]
    fn loading_and_plan_inputs() {
        assert!(parse_input(&step(LOADING), "").is_err());
        assert_eq!(parse_input(&step(PLAN), "yes"), Ok(Command::Continue));
        assert!(parse_input(&step(PLAN), "maybe").is_err());
    }

    #[tokio::test]
    async fn renders_content_and_questions() {
        let manager = manager().await;
        let view = manager.view().await;

        let welcome = render_step(&step(WELCOME), &view);
        assert!(welcome.contains("Let's help you ace your Google interview"));

        let code = render_step(&step("code-example"), &view);
        assert!(code.contains("Two Sum (Sorted Array) (python)"));
        assert!(code.contains(">  2 |"));

        let diagram = render_step(&step("big-o-diagram"), &view);
        assert!(diagram.contains("O(log n)"));

        let timeline = render_step(&step(TIMELINE), &view);
        assert!(timeline.contains("1. This week (We'll focus on high-impact prep)"));
        assert!(timeline.contains("Pick one"));

        let weak = render_step(&step(WEAK_AREAS), &view);
        assert!(weak.contains("Pick 1 to 4"));
    }

    #[tokio::test]
    async fn walks_the_whole_flow() {
        let manager = manager().await;
        let script = "\n1\n2\n\n\n\n\n\ncoding, behavioral\nnope\n2,4\nfirst-time\n\n";
        let mut output = Vec::new();

        run_wizard(Arc::clone(&manager), script.as_bytes(), &mut output)
            .await
            .unwrap();

        let state = manager.state().await;
        assert!(state.is_complete);
        assert_eq!(state.current_step_id, PLAN);
        assert_eq!(state.answers[TIMELINE], Answer::single("this-week"));
        assert_eq!(
            state.answers[WEAK_AREAS],
            Answer::multi(["algorithms", "communication"])
        );

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("'nope' is not one of the options."));
        assert!(text.contains(
            "Great news! I've created a personalized 5 days plan for your Software Engineer interview at Google."
        ));
        assert!(text.contains("You're all set."));
    }

    #[tokio::test]
    async fn back_reset_and_quit() {
        let manager = manager().await;
        let script = "back\n\n1\nback\nreset\n\nquit\n";
        let mut output = Vec::new();
        run_wizard(Arc::clone(&manager), script.as_bytes(), &mut output)
            .await
            .unwrap();

        let state = manager.state().await;
        assert_eq!(state.current_step_id, TIMELINE);
        assert!(state.answers.is_empty());
        assert_eq!(state.company.as_deref(), Some("google"));
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Nothing to go back to."));
    }
}
