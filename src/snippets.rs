use crate::config::SnippetsConfig;
use tracing::{debug, info};

/// Expand a transcript into its configured snippet, if one matches.
///
/// Triggers are compared case-insensitively with Jaro-Winkler similarity;
/// the best trigger at or above the threshold wins and its replacement text
/// goes to the clipboard instead of the transcript. Anything below the
/// threshold leaves the transcript untouched, so ordinary dictation is never
/// rewritten.
#[must_use]
pub fn expand(text: &str, config: &SnippetsConfig) -> String {
    if !config.enabled || config.entries.is_empty() {
        return text.to_owned();
    }

    let spoken = text.to_lowercase();
    let mut best: Option<(&str, f64)> = None;

    for (trigger, replacement) in &config.entries {
        let similarity = strsim::jaro_winkler(&spoken, &trigger.to_lowercase());
        debug!(
            trigger = trigger,
            similarity = %similarity,
            threshold = %config.threshold,
            "snippet trigger check"
        );

        if similarity >= config.threshold
            && best.is_none_or(|(_, best_score)| similarity > best_score)
        {
            best = Some((replacement.as_str(), similarity));
        }
    }

    best.map_or_else(
        || {
            debug!("no snippet trigger matched");
            text.to_owned()
        },
        |(replacement, score)| {
            info!(similarity = %score, "snippet expanded");
            replacement.to_owned()
        },
    )
}
