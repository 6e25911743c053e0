//! Yocto-denominated amounts: available balance and human formatting.

use anyhow::{Context, Result};

use crate::types::AccountView;

/// Decimal places between yocto and whole units.
pub const NOMINATION_EXP: usize = 24;

fn parse_amount(field: &str, value: &str) -> Result<u128> {
    value
        .trim()
        .parse::<u128>()
        .with_context(|| format!("invalid {field} amount: {value:?}"))
}

/// Spendable balance: total minus whatever is pinned by staking or storage.
///
/// `total = amount + locked`, reserved = `max(locked, storage_usage * cost)`.
pub fn available_balance(account: &AccountView, storage_amount_per_byte: &str) -> Result<String> {
    let amount = parse_amount("account", &account.amount)?;
    let locked = parse_amount("locked", &account.locked)?;
    let cost_per_byte = parse_amount("storage cost", storage_amount_per_byte)?;

    let storage_reserved = u128::from(account.storage_usage)
        .checked_mul(cost_per_byte)
        .context("storage reservation overflows")?;
    let total = amount
        .checked_add(locked)
        .context("account total overflows")?;
    let available = total.saturating_sub(locked.max(storage_reserved));
    Ok(available.to_string())
}

/// Format a yocto amount as whole units.
///
/// `frac_digits` limits the fractional part, rounding half up at that digit;
/// `None` keeps all 24 digits. Whole units get thousands separators and
/// trailing fractional zeros are trimmed.
pub fn format_near_amount(yocto: &str, frac_digits: Option<usize>) -> Result<String> {
    let mut value = parse_amount("balance", yocto)?;
    let frac_digits = frac_digits.unwrap_or(NOMINATION_EXP).min(NOMINATION_EXP);

    if frac_digits < NOMINATION_EXP {
        let rounding_exp = NOMINATION_EXP - frac_digits - 1;
        if rounding_exp > 0 {
            value = value.saturating_add(5 * 10u128.pow(rounding_exp as u32));
        }
    }

    let digits = value.to_string();
    let (whole, fraction) = if digits.len() > NOMINATION_EXP {
        let split = digits.len() - NOMINATION_EXP;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{digits:0>width$}", width = NOMINATION_EXP))
    };

    let formatted = format!("{}.{}", group_thousands(&whole), &fraction[..frac_digits]);
    Ok(trim_trailing_zeros(&formatted).to_string())
}

fn group_thousands(whole: &str) -> String {
    let mut out = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn trim_trailing_zeros(value: &str) -> &str {
    let trimmed = value.trim_end_matches('0');
    trimmed.strip_suffix('.').unwrap_or(trimmed)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const ONE_NEAR: &str = "1000000000000000000000000";

    fn account(amount: &str, locked: &str, storage_usage: u64) -> AccountView {
        AccountView {
            amount: amount.into(),
            locked: locked.into(),
            storage_usage,
            code_hash: None,
            block_height: 0,
        }
    }

    #[test]
    fn formats_whole_and_fractional_amounts() {
        assert_eq!(format_near_amount(ONE_NEAR, None).unwrap(), "1");
        assert_eq!(format_near_amount("0", None).unwrap(), "0");
        assert_eq!(
            format_near_amount("1500000000000000000000000", None).unwrap(),
            "1.5"
        );
        assert_eq!(format_near_amount("1", None).unwrap(), "0.000000000000000000000001");
        assert_eq!(
            format_near_amount("1234567000000000000000000000000", None).unwrap(),
            "1,234,567"
        );
    }

    #[test]
    fn rounds_half_up_at_requested_precision() {
        assert_eq!(
            format_near_amount("1234500000000000000000000", Some(3)).unwrap(),
            "1.235"
        );
        assert_eq!(
            format_near_amount("1234400000000000000000000", Some(3)).unwrap(),
            "1.234"
        );
        assert_eq!(
            format_near_amount("999999000000000000000000", Some(2)).unwrap(),
            "1"
        );
        assert_eq!(format_near_amount(ONE_NEAR, Some(0)).unwrap(), "1");
    }

    #[test]
    fn rejects_non_numeric_amounts() {
        assert!(format_near_amount("12abc", None).is_err());
        assert!(format_near_amount("-1", None).is_err());
    }

    #[test]
    fn available_subtracts_larger_reservation() {
        // Storage dominates: 1000 bytes at 10^19 per byte = 0.01 NEAR.
        let view = account(ONE_NEAR, "0", 1000);
        assert_eq!(
            available_balance(&view, "10000000000000000000").unwrap(),
            "990000000000000000000000"
        );

        // Stake dominates: locked stake is reserved, amount stays spendable.
        let view = account(ONE_NEAR, "5000000000000000000000000", 1000);
        assert_eq!(
            available_balance(&view, "10000000000000000000").unwrap(),
            ONE_NEAR
        );
    }

    #[test]
    fn available_never_goes_negative() {
        let view = account("10", "0", 1000);
        assert_eq!(available_balance(&view, "10000000000000000000").unwrap(), "0");
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("123456"), "123,456");
        assert_eq!(group_thousands("1234567"), "1,234,567");
    }
}
