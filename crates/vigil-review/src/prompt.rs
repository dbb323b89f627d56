//! Prompt rendering for review requests.
//!
//! The instruction text is fixed; the diff is the only thing substituted
//! into it. Oversized diffs are truncated before rendering so the request
//! stays within the provider's practical limits.

/// Appended in place of the removed tail when a diff is cut down.
pub const TRUNCATION_MARKER: &str = "\n[diff truncated]";

const REVIEW_TEMPLATE: &str = "\
You are an experienced software engineer reviewing a pull request. Below is
the unified diff of the proposed changes.

Write a concise code review in markdown:
- Point out bugs, logic errors, security issues, and race conditions
- Flag missing error handling and risky patterns
- Reference file names and hunks from the diff in your comments
- If the changes look good, say so briefly instead of inventing problems

Your reply is posted to the pull request exactly as written, so respond with
the review text only.

```diff
{diff}
```
";

/// Render the review prompt for a diff.
///
/// The template is fixed and the diff is its only substitution point. An
/// empty diff still renders a valid prompt with an empty diff section.
///
/// # Examples
///
/// ```
/// use vigil_review::prompt::build_review_prompt;
///
/// let prompt = build_review_prompt("+new line");
/// assert!(prompt.contains("```diff"));
/// assert!(prompt.contains("+new line"));
/// ```
pub fn build_review_prompt(diff: &str) -> String {
    REVIEW_TEMPLATE.replace("{diff}", diff)
}

/// Cut `diff` down to at most `max_bytes` bytes of original content.
///
/// Truncation lands on a character boundary and appends
/// [`TRUNCATION_MARKER`] so the reviewer model knows the tail is missing.
/// Diffs within the limit come back unchanged.
///
/// # Examples
///
/// ```
/// use vigil_review::prompt::truncate_diff;
///
/// assert_eq!(truncate_diff("short", 100), "short");
/// assert!(truncate_diff("0123456789", 4).starts_with("0123"));
/// ```
pub fn truncate_diff(diff: &str, max_bytes: usize) -> String {
    if diff.len() <= max_bytes {
        return diff.to_string();
    }
    let mut end = max_bytes;
    while !diff.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = diff[..end].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_prompt_includes_diff() {
        let prompt = build_review_prompt("+added line");
        assert!(prompt.contains("+added line"));
        assert!(prompt.contains("```diff"));
    }

    #[test]
    fn review_prompt_has_one_diff_section() {
        let prompt = build_review_prompt("+x");
        assert_eq!(prompt.matches("```diff").count(), 1);
    }

    #[test]
    fn empty_diff_renders_empty_section() {
        let prompt = build_review_prompt("");
        assert!(prompt.contains("```diff\n\n```"));
    }

    #[test]
    fn prompt_states_reviewing_instructions() {
        let prompt = build_review_prompt("+x");
        assert!(prompt.contains("code review"));
        assert!(prompt.contains("bugs"));
    }

    #[test]
    fn short_diff_is_not_truncated() {
        let diff = "+one\n+two\n";
        assert_eq!(truncate_diff(diff, 1000), diff);
        assert_eq!(truncate_diff(diff, diff.len()), diff);
    }

    #[test]
    fn long_diff_is_cut_and_marked() {
        let diff = "x".repeat(100);
        let truncated = truncate_diff(&diff, 10);
        assert!(truncated.starts_with("xxxxxxxxxx"));
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.len(), 10 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let diff = "é".repeat(50);
        let truncated = truncate_diff(&diff, 7);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        let kept = truncated.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(kept, "é".repeat(3));
    }

    #[test]
    fn zero_budget_keeps_only_the_marker() {
        let truncated = truncate_diff("abc", 0);
        assert_eq!(truncated, TRUNCATION_MARKER);
    }
}
