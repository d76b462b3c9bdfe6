/// Renders a run's outcome for the caller: the classic key=value block,
/// or JSON when a machine is on the other end.
use crate::monitor::MonitorOutcome;
use crate::signals::signal_name;

/// The three-line text report.
///
/// `signal=` is followed by the signal's name, or nothing for a normal
/// exit; `time=` carries six decimal places.
pub fn render_text(outcome: &MonitorOutcome) -> String {
    format!(
        "exit_status={}\nsignal={}\ntime={:.6}\n",
        outcome.exit_status,
        signal_name(outcome.signal),
        outcome.elapsed_seconds
    )
}

/// The outcome as a pretty-printed JSON object, trailing newline included.
pub fn render_json(outcome: &MonitorOutcome) -> Result<String, serde_json::Error> {
    let mut rendered = serde_json::to_string_pretty(outcome)?;
    rendered.push('\n');
    Ok(rendered)
}
