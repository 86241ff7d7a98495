//! Line-oriented session front end.
//!
//! Owns the event loop of the `drill` binary: renders [`SessionEvent`]s as
//! text on stdout and turns typed lines into [`SessionHandle`] calls.

use drill_client::controller::SessionHandle;
use drill_client::events::SessionEvent;
use drill_client::session_state::{SessionError, SubmitOrigin};
use drill_core::config::SessionConfig;
use drill_core::protocol::{Action, Summary, Verdict};
use drill_core::sizing::{BET_PRESETS, BetPreset};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

const HELP: &str = "\
  <n>             pick option n from the list
  <action> [amt]  submit an action by name, e.g. `raise 2.5`
  33 | 75 | 125   bet that percentage of the pot
  resume          retry the table after a failed auto-play
  retry           fetch the summary again
  replay          deal the finished hand again
  cancel          abandon the session
  quit            leave";

/// What a typed line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    Act(Action, Option<f64>),
    Bet(BetPreset),
    Resume,
    RetrySummary,
    Replay,
    Cancel,
    Help,
    Quit,
    None,
}

/// Interpret one input line. `options` are the legal actions currently on
/// offer, addressed 1-based.
pub fn parse_intent(line: &str, options: &[Action]) -> Result<UserIntent, String> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(UserIntent::None);
    };

    match first.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" => return Ok(UserIntent::Quit),
        "help" | "?" => return Ok(UserIntent::Help),
        "cancel" => return Ok(UserIntent::Cancel),
        "resume" => return Ok(UserIntent::Resume),
        "retry" => return Ok(UserIntent::RetrySummary),
        "replay" => return Ok(UserIntent::Replay),
        _ => {}
    }

    if let Ok(pct) = first.trim_end_matches('%').parse::<u32>() {
        if let Some(preset) = BET_PRESETS.iter().find(|&&BetPreset::Pot(p)| p == pct) {
            return Ok(UserIntent::Bet(*preset));
        }
        return match pct.checked_sub(1).and_then(|i| options.get(i as usize)) {
            Some(action) => Ok(UserIntent::Act(action.clone(), None)),
            None => Err(format!("no option {pct}")),
        };
    }

    let amount = match words.next() {
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| format!("'{raw}' is not an amount"))?,
        ),
        None => None,
    };
    Ok(UserIntent::Act(Action::new(first), amount))
}

/// Start a session and run until the user quits or stdin closes.
pub async fn run(
    handle: SessionHandle,
    mut events: UnboundedReceiver<SessionEvent>,
    config: SessionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting {:?} session...", config.kind());
    handle.start(config).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut options: Vec<Action> = Vec::new();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let SessionEvent::AwaitingInput { legal_actions, .. } = &event {
                    options = legal_actions.clone();
                }
                match describe(&event) {
                    Some(text) if event.is_error() => eprintln!("{text}"),
                    Some(text) => println!("{text}"),
                    None => {}
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let intent = match parse_intent(&line, &options) {
                    Ok(intent) => intent,
                    Err(msg) => {
                        println!("  ? {msg}");
                        continue;
                    }
                };
                let outcome = match intent {
                    UserIntent::Quit => break,
                    UserIntent::None => Ok(()),
                    UserIntent::Help => {
                        println!("{HELP}");
                        Ok(())
                    }
                    UserIntent::Act(action, amount) => handle.submit(action, amount).await,
                    UserIntent::Bet(preset) => handle.bet(preset).await,
                    UserIntent::Resume => handle.resume().await,
                    UserIntent::RetrySummary => handle.retry_summary().await,
                    UserIntent::Replay => handle.replay().await.map(|_| ()),
                    UserIntent::Cancel => handle.cancel().await,
                };
                match outcome {
                    Ok(()) => {}
                    Err(SessionError::Closed) => break,
                    Err(e) => println!("  ! {e}"),
                }
            }
        }
    }

    let _ = handle.cancel().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn options_line(actions: &[Action]) -> String {
    actions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("[{}] {}", i + 1, a.label()))
        .collect::<Vec<_>>()
        .join("  ")
}

fn verdict_line(verdict: &Verdict) -> String {
    let mark = match (verdict.grade, verdict.correct) {
        (Some(grade), _) => grade.label().to_string(),
        (None, Some(true)) => "Correct".to_string(),
        (None, Some(false)) => "Wrong".to_string(),
        (None, None) => "Noted".to_string(),
    };
    let mut line = format!("  {mark}");
    if let Some(best) = &verdict.correct_action {
        line.push_str(&format!(" (best: {})", best.label()));
    }
    if verdict.score_delta > 0 {
        line.push_str(&format!(" +{}", verdict.score_delta));
    }
    if verdict.time_bonus {
        line.push_str(" fast!");
    }
    if let Some(explanation) = &verdict.explanation {
        line.push_str(&format!("\n    {explanation}"));
    }
    line
}

fn summary_lines(summary: &Summary) -> String {
    let mut out = format!("Session {} complete: {} decisions", summary.session_id, summary.total);
    if let (Some(correct), Some(wrong), Some(pct)) =
        (summary.correct, summary.incorrect(), summary.accuracy_pct())
    {
        out.push_str(&format!(", {correct} correct, {wrong} wrong ({pct:.0}%)"));
    }
    for record in summary.records.iter().filter(|r| !r.is_correct) {
        out.push_str(&format!(
            "\n  {} {} {}: you {}, best {}",
            record.hand,
            record.position,
            record.action_to_you,
            record.user_action.label(),
            record.correct_action.label()
        ));
    }
    if let Some(review) = &summary.review {
        out.push_str(&format!(
            "\n  Result: {:+.1} BB ({})",
            review.result_bb, review.ended_by
        ));
        for spot in &review.spots {
            out.push_str(&format!(
                "\n  {} {}: you {}, best {} [{}]",
                spot.street,
                spot.context_id,
                spot.user_action.label(),
                spot.best_action.label(),
                spot.grade.label()
            ));
        }
    }
    if summary.can_replay {
        out.push_str("\n  Type `replay` to play this hand again.");
    }
    out
}

/// Text for one event, or `None` for events not worth a line.
fn describe(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::Started { session_id, total, .. } => match total {
            Some(n) => format!("Session {session_id}: {n} spots. Type `help` for commands."),
            None => format!("Hand {session_id} dealt. Type `help` for commands."),
        },
        SessionEvent::AwaitingInput {
            index,
            budget_secs,
            legal_actions,
        } => {
            let clock = budget_secs.map(|s| format!(" ({s}s)")).unwrap_or_default();
            format!("#{} your move{clock}: {}", index + 1, options_line(legal_actions))
        }
        SessionEvent::Countdown { remaining, .. } if *remaining <= 3 => {
            format!("  {remaining}...")
        }
        SessionEvent::Countdown { .. } => return None,
        SessionEvent::Submitted {
            action,
            amount,
            origin,
            ..
        } => match (origin, amount) {
            (SubmitOrigin::Timeout, _) => "  Time's up.".to_string(),
            (SubmitOrigin::AutoPlay, _) => return None,
            (SubmitOrigin::Human, Some(amt)) => format!("  > {} {amt}", action.label()),
            (SubmitOrigin::Human, None) => format!("  > {}", action.label()),
        },
        SessionEvent::Resolved { verdict, .. } => verdict_line(verdict),
        SessionEvent::AutoPlayScheduled { seat, .. } => match seat {
            Some(seat) => format!("  Seat {seat} to act..."),
            None => "  Table to act...".to_string(),
        },
        SessionEvent::KeySpot { spot, .. } => {
            format!("  Key spot: {} ({})", spot.context_id, spot.street)
        }
        SessionEvent::Rejected { error, .. } => format!("  ! {error}"),
        SessionEvent::Completed { summary } => summary_lines(summary),
        SessionEvent::SummaryFailed { error } => {
            format!("  ! {error}. Type `retry` to try again.")
        }
        SessionEvent::Cancelled => "Session cancelled.".to_string(),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<Action> {
        vec![Action::new("fold"), Action::new("call"), Action::new("raise")]
    }

    #[test]
    fn numbers_pick_options() {
        assert_eq!(
            parse_intent("2", &options()),
            Ok(UserIntent::Act(Action::new("call"), None))
        );
        assert!(parse_intent("4", &options()).is_err());
        assert!(parse_intent("0", &options()).is_err());
    }

    #[test]
    fn preset_percentages_are_bets() {
        assert_eq!(
            parse_intent("75", &options()),
            Ok(UserIntent::Bet(BetPreset::Pot(75)))
        );
        assert_eq!(
            parse_intent("125%", &options()),
            Ok(UserIntent::Bet(BetPreset::Pot(125)))
        );
    }

    #[test]
    fn named_actions_take_amounts() {
        assert_eq!(
            parse_intent("raise 2.5", &options()),
            Ok(UserIntent::Act(Action::new("raise"), Some(2.5)))
        );
        assert!(parse_intent("raise lots", &options()).is_err());
    }

    #[test]
    fn commands_and_blank_lines() {
        assert_eq!(parse_intent("  ", &options()), Ok(UserIntent::None));
        assert_eq!(parse_intent("QUIT", &options()), Ok(UserIntent::Quit));
        assert_eq!(parse_intent("replay", &options()), Ok(UserIntent::Replay));
        assert_eq!(parse_intent("retry", &options()), Ok(UserIntent::RetrySummary));
    }

    #[test]
    fn timeouts_are_announced() {
        let event = SessionEvent::Submitted {
            index: 0,
            action: Action::timeout(),
            amount: None,
            origin: SubmitOrigin::Timeout,
        };
        assert_eq!(describe(&event).as_deref(), Some("  Time's up."));
    }
}
