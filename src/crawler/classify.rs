//! Failure classification for fetch errors
//!
//! Two buckets drive the retry decision: a soft block (the remote source is
//! throttling or demanding verification, worth retrying with backoff and a
//! fresh session) and everything else (no in-run retry; the next run's
//! remaining-work filter picks the unit up again).

/// How a fetch failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Block/verification/rate-limit signal; bounded retry with backoff
    SoftBlock,

    /// Anything else; log and move to the next unit
    Unknown,
}

/// Default soft-block markers
///
/// Covers the phrasing seen in driver error content for captcha pages,
/// verification challenges, and rate limiting, including the CJK variants
/// the remote platform emits.
pub fn default_block_markers() -> Vec<String> {
    ["captcha", "verification", "rate limit", "验证", "限制"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Classifies a failure by matching its message against block markers
///
/// Matching is case-insensitive on the message side; markers are taken
/// verbatim (configured markers are expected to be lowercase where ASCII).
pub fn classify_failure(message: &str, markers: &[String]) -> FailureKind {
    let lowered = message.to_lowercase();
    if markers.iter().any(|marker| lowered.contains(marker.as_str())) {
        FailureKind::SoftBlock
    } else {
        FailureKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captcha_is_soft_block() {
        let markers = default_block_markers();
        assert_eq!(
            classify_failure("403 Forbidden: CAPTCHA required", &markers),
            FailureKind::SoftBlock
        );
    }

    #[test]
    fn test_cjk_markers_are_soft_blocks() {
        let markers = default_block_markers();
        assert_eq!(
            classify_failure("需要验证后继续访问", &markers),
            FailureKind::SoftBlock
        );
        assert_eq!(
            classify_failure("访问受到限制", &markers),
            FailureKind::SoftBlock
        );
    }

    #[test]
    fn test_rate_limit_phrase_is_soft_block() {
        let markers = default_block_markers();
        assert_eq!(
            classify_failure("429: rate limit exceeded", &markers),
            FailureKind::SoftBlock
        );
    }

    #[test]
    fn test_other_errors_are_unknown() {
        let markers = default_block_markers();
        assert_eq!(
            classify_failure("connection reset by peer", &markers),
            FailureKind::Unknown
        );
        assert_eq!(classify_failure("", &markers), FailureKind::Unknown);
    }

    #[test]
    fn test_custom_markers() {
        let markers = vec!["slide to verify".to_string()];
        assert_eq!(
            classify_failure("Blocked: Slide To Verify", &markers),
            FailureKind::SoftBlock
        );
        assert_eq!(
            classify_failure("captcha", &markers),
            FailureKind::Unknown
        );
    }
}
