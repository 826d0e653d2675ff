//! Quote Domain Types
//!
//! The subscription identity, the quote value it produces, and the pure
//! generator that formats one quote for one subscription and sequence
//! number. The quote text shape is compatibility-critical: existing
//! consumers parse `Quote#<n> for <uic>-<asset_type>` lines.

// =============================================================================
// Subscription Identity
// =============================================================================

/// One logical request for a continuous quote stream.
///
/// Identity is by value: two requests with the same fields are the same
/// subscription *kind*, but each open stream still gets its own independent
/// sequence counter. Nothing at this layer enforces uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionRequest {
    /// Universal instrument code (e.g. `"211"`).
    pub uic: String,
    /// Asset type the instrument is quoted under (e.g. `"Stock"`).
    pub asset_type: String,
}

impl SubscriptionRequest {
    /// Create a new subscription request.
    #[must_use]
    pub fn new(uic: impl Into<String>, asset_type: impl Into<String>) -> Self {
        Self {
            uic: uic.into(),
            asset_type: asset_type.into(),
        }
    }

    /// The `<uic>-<asset_type>` pair as it appears in quote text.
    #[must_use]
    pub fn instrument_label(&self) -> String {
        format!("{}-{}", self.uic, self.asset_type)
    }
}

impl std::fmt::Display for SubscriptionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.uic, self.asset_type)
    }
}

// =============================================================================
// Quote
// =============================================================================

/// One quote item on a subscription stream.
///
/// `sequence` starts at 1 and is strictly increasing per subscription with
/// no gaps; `text` is the formatted line delivered to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Per-subscription sequence number, `>= 1`.
    pub sequence: u64,
    /// Formatted quote line.
    pub text: String,
}

// =============================================================================
// Quote Generator
// =============================================================================

/// Pure quote formatter.
///
/// `next` is a pure function of its inputs: no failure conditions, no side
/// effects, no clock. The sequence counter lives with the caller (the
/// upstream producer handle), not here.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteGenerator;

impl QuoteGenerator {
    /// Produce the quote for `request` at `sequence`.
    #[must_use]
    pub fn next(request: &SubscriptionRequest, sequence: u64) -> Quote {
        Quote {
            sequence,
            text: format!(
                "Quote#{sequence} for {}-{}",
                request.uic, request.asset_type
            ),
        }
    }
}

// =============================================================================
// Relay Messages
// =============================================================================

/// What the relay pushes into a downstream sink.
///
/// Framing (the `Info: ` / `Data: ` prefixes, protobuf envelopes) is the
/// transport adapter's business; the core only decides *what* is pushed and
/// in which order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Informational line, not a data item (e.g. "Invoking stream..").
    Info(String),
    /// One quote data item.
    Quote(Quote),
}

impl RelayMessage {
    /// Convenience constructor for informational lines.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self::Info(text.into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test]
    fn generator_matches_reference_output() {
        let request = SubscriptionRequest::new("211", "Stock");
        let quote = QuoteGenerator::next(&request, 3);

        assert_eq!(quote.sequence, 3);
        assert_eq!(quote.text, "Quote#3 for 211-Stock");
    }

    #[test_case("211", "Stock", 1, "Quote#1 for 211-Stock")]
    #[test_case("211", "Stock", 2, "Quote#2 for 211-Stock")]
    #[test_case("1337", "FxSpot", 42, "Quote#42 for 1337-FxSpot")]
    fn generator_formats_quote_lines(uic: &str, asset_type: &str, sequence: u64, expected: &str) {
        let request = SubscriptionRequest::new(uic, asset_type);
        assert_eq!(QuoteGenerator::next(&request, sequence).text, expected);
    }

    #[test]
    fn generator_is_deterministic() {
        let request = SubscriptionRequest::new("211", "Stock");
        assert_eq!(
            QuoteGenerator::next(&request, 7),
            QuoteGenerator::next(&request, 7)
        );
    }

    #[test]
    fn request_identity_is_by_value() {
        let a = SubscriptionRequest::new("211", "Stock");
        let b = SubscriptionRequest::new("211", "Stock");
        assert_eq!(a, b);
        assert_eq!(a.instrument_label(), "211-Stock");
        assert_eq!(a.to_string(), "211-Stock");
    }

    proptest! {
        #[test]
        fn generator_shape_holds_for_arbitrary_inputs(
            uic in "[A-Za-z0-9]{1,8}",
            asset_type in "[A-Za-z]{1,12}",
            sequence in 1_u64..,
        ) {
            let request = SubscriptionRequest::new(uic.clone(), asset_type.clone());
            let quote = QuoteGenerator::next(&request, sequence);

            prop_assert_eq!(quote.sequence, sequence);
            let expected_prefix = format!("Quote#{sequence} for ");
            let expected_suffix = format!("{uic}-{asset_type}");
            prop_assert!(quote.text.starts_with(&expected_prefix));
            prop_assert!(quote.text.ends_with(&expected_suffix));
        }
    }
}
