use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use sha2::{Digest, Sha256};

// Patterns are literals; a failure here is a programming error caught by the tests below.
#[allow(clippy::expect_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        pub static ref EMAIL_REGEX: Regex =
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern");
        pub static ref CARD_REGEX: Regex =
            Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b").expect("card pattern");
        pub static ref IPV4_REGEX: Regex =
            Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("ipv4 pattern");
        pub static ref IPV6_REGEX: Regex =
            Regex::new(r"\b(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}\b").expect("ipv6 pattern");
        pub static ref PAYMENT_KEY_REGEX: Regex =
            Regex::new(r"\b(?:sk|pk|rk|whsec)_(?:live|test)?_?[A-Za-z0-9]{8,}\b").expect("payment key pattern");
    }
}

use patterns::{CARD_REGEX, EMAIL_REGEX, IPV4_REGEX, IPV6_REGEX, PAYMENT_KEY_REGEX};

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_cards: bool,
    pub redact_ip_addresses: bool,
    pub redact_payment_keys: bool,
    /// Replace matches with a short stable hash so repeated values can be correlated
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_cards: true,
            redact_ip_addresses: true,
            redact_payment_keys: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// Scrubs personal and payment data out of text before it reaches a log line.
#[derive(Debug, Clone)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new(RedactionConfig::default())
    }
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// Redactor that passes text through untouched.
    pub fn disabled() -> Self {
        Self::new(RedactionConfig {
            redact_emails: false,
            redact_cards: false,
            redact_ip_addresses: false,
            redact_payment_keys: false,
            hash_for_correlation: false,
            custom_patterns: Vec::new(),
        })
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_payment_keys {
            result = self.replace(&PAYMENT_KEY_REGEX, &result, "KEY", |_| "[REDACTED_KEY]".to_string());
        }

        if self.config.redact_emails {
            result = self.replace(&EMAIL_REGEX, &result, "EMAIL", mask_email);
        }

        if self.config.redact_cards {
            result = self.replace(&CARD_REGEX, &result, "CARD", mask_card);
        }

        if self.config.redact_ip_addresses {
            result = self.replace(&IPV6_REGEX, &result, "IP", |_| "****:****".to_string());
            result = self.replace(&IPV4_REGEX, &result, "IP", mask_ipv4);
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    /// Redacted prefix of `text`, at most `max_chars` characters, for log excerpts.
    pub fn excerpt(&self, text: &str, max_chars: usize) -> String {
        let redacted = self.redact(text);
        if redacted.chars().count() <= max_chars {
            return redacted;
        }
        let mut cut: String = redacted.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }

    fn replace(&self, pattern: &Regex, text: &str, tag: &str, mask: fn(&str) -> String) -> String {
        pattern
            .replace_all(text, |caps: &regex::Captures| {
                let matched = caps.get(0).map_or("", |m| m.as_str());
                if self.config.hash_for_correlation {
                    format!("{}[{}]", tag, hash_value(matched))
                } else {
                    mask(matched)
                }
            })
            .to_string()
    }
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first_local: String = local.chars().take(1).collect();
            let first_domain: String = domain.chars().take(1).collect();
            format!("{}***@{}***", first_local, first_domain)
        }
        None => "***@***".to_string(),
    }
}

fn mask_card(card: &str) -> String {
    let digits: Vec<char> = card.chars().filter(char::is_ascii_digit).collect();
    let last_four: String = digits.iter().skip(digits.len().saturating_sub(4)).collect();
    format!("****-****-****-{}", last_four)
}

fn mask_ipv4(ip: &str) -> String {
    match (ip.split('.').next(), ip.rsplit('.').next()) {
        (Some(first), Some(last)) => format!("{}.***.***.{}", first, last),
        _ => "***.***.***.***".to_string(),
    }
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    general_purpose::STANDARD.encode(digest.get(..8).unwrap_or_default())
}
