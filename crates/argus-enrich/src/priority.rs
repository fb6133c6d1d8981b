//! Priority heuristics.

use argus_core::{NotificationType, Priority};

/// Keywords that escalate a news item to high priority.
const HIGH_WORDS: &[&str] = &["hack", "exploit", "ban", "halted"];

/// Keywords that mark a news item as medium priority.
const MEDIUM_WORDS: &[&str] = &["listing", "partnership", "upgrade"];

/// Classify news text by keyword rules.
#[must_use]
pub fn classify_news(text: &str) -> Priority {
    let lowered = text.to_lowercase();
    if HIGH_WORDS.iter().any(|w| lowered.contains(w)) {
        Priority::High
    } else if MEDIUM_WORDS.iter().any(|w| lowered.contains(w)) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Default priority by notification type, used when the producing poller
/// did not set one.
#[must_use]
pub fn default_for(kind: NotificationType, title: &str, message: &str) -> Priority {
    match kind {
        NotificationType::RiskAlert => Priority::Critical,
        NotificationType::CombinedSignal | NotificationType::UserActionRequired => Priority::High,
        NotificationType::NewsEvent => {
            let mut text = String::with_capacity(title.len() + message.len() + 1);
            text.push_str(title);
            text.push(' ');
            text.push_str(message);
            classify_news(&text)
        }
        NotificationType::TechnicalBreakout
        | NotificationType::SocialSurge
        | NotificationType::TradeExecuted => Priority::Medium,
        NotificationType::SystemStatus => Priority::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_keywords() {
        assert_eq!(classify_news("Exchange HACKED overnight"), Priority::High);
        assert_eq!(classify_news("Withdrawals halted"), Priority::High);
        assert_eq!(classify_news("New listing on major venue"), Priority::Medium);
        assert_eq!(classify_news("Quarterly report published"), Priority::Low);
    }

    #[test]
    fn test_type_defaults() {
        assert_eq!(
            default_for(NotificationType::RiskAlert, "", ""),
            Priority::Critical
        );
        assert_eq!(
            default_for(NotificationType::SystemStatus, "", ""),
            Priority::Info
        );
        assert_eq!(
            default_for(NotificationType::NewsEvent, "Partnership announced", ""),
            Priority::Medium
        );
    }
}
