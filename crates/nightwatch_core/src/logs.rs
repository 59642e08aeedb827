//! Failure-log localization and truncation.
//!
//! Failure evidence concentrates by error-token density: the job log with
//! the most indicator hits is almost always the one that carries the
//! traceback. When no log scores at all, everything is concatenated so the
//! analyst still sees full context.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use nightwatch_github::JobLog;
use regex::Regex;

/// Default byte budget for a truncated log excerpt.
pub const DEFAULT_LOG_BUDGET: usize = 50_000;

/// Case-insensitive indicator tokens.
const INDICATORS_CI: [&str; 4] = ["error", "failed", "exception", "traceback"];

/// Case-sensitive indicator literals.
const INDICATORS_EXACT: [&str; 5] = [
    "FAILED",
    "AssertionError",
    "TypeError",
    "ImportError",
    "ModuleNotFoundError",
];

/// Lines context kept before and after each relevant line when truncating.
const CONTEXT_BEFORE: usize = 5;
const CONTEXT_AFTER: usize = 10;

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"File ".*", line \d+"#).expect("location regex"))
}

fn indicator_score(text: &str) -> usize {
    let lower = text.to_lowercase();
    let mut score = 0;
    for token in INDICATORS_CI {
        score += lower.matches(token).count();
    }
    for literal in INDICATORS_EXACT {
        score += text.matches(literal).count();
    }
    score
}

/// Pick the job log most likely to contain the failure.
///
/// Highest indicator score wins; ties break in input order. When every log
/// scores zero, returns the concatenation of all logs, each prefixed with a
/// header line naming its job. Returns None only for empty input.
pub fn localize_failure_log(logs: &[JobLog]) -> Option<String> {
    if logs.is_empty() {
        return None;
    }

    let mut best: Option<(usize, &JobLog)> = None;
    for log in logs {
        let score = indicator_score(&log.text);
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ if score > 0 => best = Some((score, log)),
            _ => {}
        }
    }

    if let Some((_, log)) = best {
        return Some(log.text.clone());
    }

    // No density signal anywhere; keep everything for recall.
    let combined = logs
        .iter()
        .map(|log| format!("=== job: {} ===\n{}", log.job, log.text))
        .collect::<Vec<_>>()
        .join("\n");
    Some(combined)
}

fn line_is_relevant(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["error", "exception", "traceback", "failed", "assert"]
        .iter()
        .any(|token| lower.contains(token))
        || location_pattern().is_match(line)
}

/// Reduce an oversized log to an error-relevant excerpt within `budget` bytes.
///
/// Relevant lines are kept with 5 lines of leading and 10 lines of trailing
/// context. If the excerpt still exceeds the budget, falls back to the tail
/// of the log, which is where errors and stack frames cluster.
pub fn truncate_log(log: &str, budget: usize) -> String {
    if log.len() <= budget {
        return log.to_string();
    }

    let lines: Vec<&str> = log.lines().collect();
    let mut keep: BTreeSet<usize> = BTreeSet::new();

    for (i, line) in lines.iter().enumerate() {
        if line_is_relevant(line) {
            let start = i.saturating_sub(CONTEXT_BEFORE);
            let end = (i + CONTEXT_AFTER).min(lines.len().saturating_sub(1));
            keep.extend(start..=end);
        }
    }

    if !keep.is_empty() {
        let mut excerpt = String::from("[Log truncated - error-relevant sections]\n");
        for i in &keep {
            excerpt.push_str(lines[*i]);
            excerpt.push('\n');
        }
        if excerpt.len() <= budget {
            return excerpt;
        }
    }

    // Tail fallback; respect char boundaries when slicing.
    let header = format!("[Log truncated - last {} chars]\n", budget);
    let tail_budget = budget.saturating_sub(header.len());
    let mut start = log.len() - tail_budget;
    while !log.is_char_boundary(start) {
        start += 1;
    }
    format!("{}{}", header, &log[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str, text: &str) -> JobLog {
        JobLog {
            job: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_localize_picks_densest_log() {
        let logs = vec![
            job("build", "compiling\nlinking\ndone"),
            job(
                "test",
                "Traceback (most recent call last):\nTypeError: boom\nFAILED tests/test_x.py",
            ),
            job("lint", "1 error found"),
        ];

        let chosen = localize_failure_log(&logs).unwrap();
        assert!(chosen.contains("TypeError: boom"));
    }

    #[test]
    fn test_localize_ties_break_in_input_order() {
        let logs = vec![job("a", "error here"), job("b", "error there")];
        let chosen = localize_failure_log(&logs).unwrap();
        assert_eq!(chosen, "error here");
    }

    #[test]
    fn test_localize_zero_score_concatenates_with_headers() {
        let logs = vec![job("build", "all good"), job("deploy", "shipped")];
        let chosen = localize_failure_log(&logs).unwrap();
        assert!(chosen.contains("=== job: build ==="));
        assert!(chosen.contains("=== job: deploy ==="));
        assert!(chosen.contains("all good"));
        assert!(chosen.contains("shipped"));
    }

    #[test]
    fn test_localize_empty_input() {
        assert!(localize_failure_log(&[]).is_none());
    }

    #[test]
    fn test_truncate_under_budget_is_unchanged() {
        let log = "short log\nno errors";
        assert_eq!(truncate_log(log, 1000), log);
    }

    #[test]
    fn test_truncate_keeps_relevant_sections_with_context() {
        let mut lines: Vec<String> = (0..2000).map(|i| format!("line {}", i)).collect();
        lines[1000] = "TypeError: something broke".to_string();
        let log = lines.join("\n");

        let excerpt = truncate_log(&log, 5000);
        assert!(excerpt.starts_with("[Log truncated - error-relevant sections]"));
        assert!(excerpt.contains("TypeError: something broke"));
        // Context window either side
        assert!(excerpt.contains("line 995"));
        assert!(excerpt.contains("line 1010"));
        assert!(!excerpt.contains("line 100\n"));
        assert!(excerpt.len() <= 5000);
    }

    #[test]
    fn test_truncate_matches_file_location_lines() {
        let mut lines: Vec<String> = (0..2000).map(|i| format!("step {}", i)).collect();
        lines[500] = r#"  File "src/app.py", line 42, in handler"#.to_string();
        let log = lines.join("\n");

        let excerpt = truncate_log(&log, 5000);
        assert!(excerpt.contains("line 42"));
    }

    #[test]
    fn test_truncate_tail_fallback_respects_budget() {
        // Every line is "relevant" so the excerpt blows past the budget
        let log = "error\n".repeat(20_000);
        let excerpt = truncate_log(&log, 2000);
        assert!(excerpt.starts_with("[Log truncated - last 2000 chars]"));
        assert!(excerpt.len() <= 2000);
    }
}
