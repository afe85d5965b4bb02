// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observation formatting and bounding.
//!
//! Adapters return structured data; the model sees compact human-readable
//! text. Every observation is bounded (default 8 KB) with a trailing
//! truncation marker so one noisy log query cannot blow the context window.

use causeway_core::{CodeMatch, CommitInfo, LogEntry, MetricSeries, RepoInfo};

/// Marker appended to clipped observations.
pub const TRUNCATION_MARKER: &str = "…<truncated>";

/// Bound an observation at `max_bytes`, clipping on a char boundary and
/// appending the truncation marker.
pub fn bound_observation(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let budget = max_bytes.saturating_sub(TRUNCATION_MARKER.len());
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{TRUNCATION_MARKER}", &text[..cut])
}

/// Render log entries, newest first, one line each.
pub fn format_logs(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "No log entries found in the requested window.".to_string();
    }
    let mut out = format!("Found {} log entries (newest first):\n", entries.len());
    for entry in entries {
        let level = entry.level.as_deref().unwrap_or("-");
        let service = entry.service.as_deref().unwrap_or("-");
        out.push_str(&format!(
            "[{}] {} {}: {}\n",
            entry.timestamp, level, service, entry.message
        ));
    }
    out
}

/// Render metric series with summary statistics and the last few samples.
pub fn format_series(series: &[MetricSeries]) -> String {
    if series.is_empty() || series.iter().all(|s| s.points.is_empty()) {
        return "No metric data found in the requested window.".to_string();
    }
    let mut out = String::new();
    for s in series {
        if s.points.is_empty() {
            continue;
        }
        let values: Vec<f64> = s.points.iter().map(|p| p.value).collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        let labels = if s.labels.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> =
                s.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{{{}}}", pairs.join(","))
        };
        out.push_str(&format!(
            "{}{labels}: {} samples, min={min:.3} avg={avg:.3} max={max:.3}, last={:.3}\n",
            s.name,
            s.points.len(),
            values.last().copied().unwrap_or_default(),
        ));
    }
    out
}

/// Render a repository listing.
pub fn format_repos(repos: &[RepoInfo]) -> String {
    if repos.is_empty() {
        return "No repositories available.".to_string();
    }
    let mut out = format!("{} repositories:\n", repos.len());
    for repo in repos {
        let description = repo.description.as_deref().unwrap_or("");
        out.push_str(&format!(
            "- {} (default branch {}){}{}\n",
            repo.name,
            repo.default_branch,
            if description.is_empty() { "" } else { ": " },
            description
        ));
    }
    out
}

/// Render a commit listing.
pub fn format_commits(commits: &[CommitInfo]) -> String {
    if commits.is_empty() {
        return "No commits found.".to_string();
    }
    let mut out = format!("{} commits (newest first):\n", commits.len());
    for commit in commits {
        let subject = commit.message.lines().next().unwrap_or("");
        let author = commit.author.as_deref().unwrap_or("unknown");
        out.push_str(&format!(
            "{} {} [{} at {}]\n",
            &commit.sha[..commit.sha.len().min(10)],
            subject,
            author,
            commit.committed_at
        ));
    }
    out
}

/// Render code-search hits.
pub fn format_matches(matches: &[CodeMatch]) -> String {
    if matches.is_empty() {
        return "No code matches found.".to_string();
    }
    let mut out = format!("{} matches:\n", matches.len());
    for m in matches {
        out.push_str(&format!("{}:{}\n", m.repo, m.path));
        if !m.snippet.is_empty() {
            out.push_str(&format!("  {}\n", m.snippet.trim()));
        }
    }
    out
}
