use log::warn;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::request::queue::QueueList;
use crate::sge::scheduler::SchedulerError;

/// Rendering context for queue troubleshooting hints
#[derive(Serialize)]
struct QueueHintsContext {
    queue: String,
}

/// Explain a failed submission
///
/// A rejected job is most often a queue problem (unknown queue, disabled queue, no access), so
/// when queues were requested the hints for checking them are appended. Without queues the
/// scheduler's own message is returned as is.
pub fn diagnose(error: &SchedulerError, queues: &QueueList) -> String {
    let message = error.to_string();
    if queues.is_empty() {
        return message;
    }

    match render_queue_hints(queues) {
        Ok(hints) => format!("{message}\n{hints}"),
        Err(err) => {
            warn!("Can't render queue hints: {err}");
            format!("{message}\nQueue specified: {queues}")
        }
    }
}

/// Render the queue hints using TinyTemplate
fn render_queue_hints(queues: &QueueList) -> Result<String, tinytemplate::error::Error> {
    /// included queue hints template
    static QUEUE_HINTS: &str =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/queue_hints.txt"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("queue_hints", QUEUE_HINTS)?;

    let context = QueueHintsContext { queue: queues.to_string() };
    Ok(tt.render("queue_hints", &context)?.trim_end().to_string())
}
