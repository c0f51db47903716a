//! Recipient normalization
//!
//! Admins type numbers the way people write them ("0821-195-09135",
//! "+62 821 1950 9135"). The Session Client wants `<digits>@c.us`.

use crate::error::GatewayError;

/// Domain suffix of individual (non-group) chats.
pub const USER_SUFFIX: &str = "@c.us";

/// Normalized chat recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatId {
    digits: String,
}

impl ChatId {
    /// Normalize a free-form number.
    ///
    /// Strips an existing `@c.us` suffix and every non-digit character. A
    /// leading trunk `0` is replaced with `country_code` when one is given.
    pub fn parse(input: &str, country_code: Option<&str>) -> Result<Self, GatewayError> {
        let local = input.trim();
        let local = local.strip_suffix(USER_SUFFIX).unwrap_or(local);

        let mut digits: String = local.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(GatewayError::InvalidInput(
                "Recipient number must contain digits".to_string(),
            ));
        }

        if let Some(cc) = country_code.filter(|cc| !cc.is_empty()) {
            if let Some(rest) = digits.strip_prefix('0') {
                digits = format!("{}{}", cc, rest);
            }
        }

        Ok(Self { digits })
    }

    /// Digits only, as echoed back to callers.
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// Full chat id handed to the Session Client.
    pub fn to_chat_id(&self) -> String {
        format!("{}{}", self.digits, USER_SUFFIX)
    }
}
