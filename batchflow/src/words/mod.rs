//! English spelling of non-negative integers.
//!
//! Numbers are split into base-1000 groups; each non-zero group is spelled
//! as a hundreds block followed by its magnitude word, most significant
//! group first.
//!
//! ```
//! use batchflow::words::to_words;
//!
//! assert_eq!(to_words(123).unwrap(), "One Hundred and Twenty Three");
//! assert_eq!(to_words(250_000).unwrap(), "Two Hundred and Fifty Thousand");
//! ```

use crate::errors::OutOfRangeError;

/// Exclusive upper bound of the supported domain.
pub const WORDS_LIMIT: i64 = 1_000_000_000_000;

const ONES: [&str; 10] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];

const TEENS: [&str; 10] = [
    "Ten",
    "Eleven",
    "Twelve",
    "Thirteen",
    "Fourteen",
    "Fifteen",
    "Sixteen",
    "Seventeen",
    "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

const MAGNITUDES: [&str; 4] = ["", "Thousand", "Million", "Billion"];

/// Spells `n` in English words.
///
/// # Errors
///
/// Returns [`OutOfRangeError`] when `n` is negative or not below
/// [`WORDS_LIMIT`].
pub fn to_words(n: i64) -> Result<String, OutOfRangeError> {
    if !(0..WORDS_LIMIT).contains(&n) {
        return Err(OutOfRangeError::new(n, WORDS_LIMIT));
    }
    if n == 0 {
        return Ok("Zero".to_string());
    }

    // Domain check above guarantees the value fits and is non-negative.
    #[allow(clippy::cast_sign_loss)]
    let mut rest = n as u64;
    let mut groups: Vec<String> = Vec::with_capacity(MAGNITUDES.len());

    for magnitude in MAGNITUDES {
        if rest == 0 {
            break;
        }
        #[allow(clippy::cast_possible_truncation)]
        let group = (rest % 1000) as u16;
        if group > 0 {
            let rendered = render_hundreds(group);
            groups.push(if magnitude.is_empty() {
                rendered
            } else {
                format!("{rendered} {magnitude}")
            });
        }
        rest /= 1000;
    }

    groups.reverse();
    Ok(groups.join(" "))
}

/// Spells a value in `1..=999`.
fn render_hundreds(group: u16) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(5);
    let hundreds = usize::from(group / 100);
    let remainder = usize::from(group % 100);

    if hundreds > 0 {
        parts.push(ONES[hundreds]);
        parts.push("Hundred");
        if remainder > 0 {
            parts.push("and");
        }
    }

    match remainder {
        20..=99 => {
            parts.push(TENS[remainder / 10]);
            if remainder % 10 > 0 {
                parts.push(ONES[remainder % 10]);
            }
        }
        10..=19 => parts.push(TEENS[remainder - 10]),
        1..=9 => parts.push(ONES[remainder]),
        _ => {}
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_zero() {
        assert_eq!(to_words(0).unwrap(), "Zero");
    }

    #[test]
    fn test_small_numbers() {
        assert_eq!(to_words(7).unwrap(), "Seven");
        assert_eq!(to_words(10).unwrap(), "Ten");
        assert_eq!(to_words(15).unwrap(), "Fifteen");
        assert_eq!(to_words(20).unwrap(), "Twenty");
        assert_eq!(to_words(42).unwrap(), "Forty Two");
        assert_eq!(to_words(99).unwrap(), "Ninety Nine");
    }

    #[test]
    fn test_hundreds() {
        assert_eq!(to_words(100).unwrap(), "One Hundred");
        assert_eq!(to_words(105).unwrap(), "One Hundred and Five");
        assert_eq!(to_words(123).unwrap(), "One Hundred and Twenty Three");
        assert_eq!(to_words(919).unwrap(), "Nine Hundred and Nineteen");
    }

    #[test]
    fn test_thousands() {
        assert_eq!(to_words(1000).unwrap(), "One Thousand");
        assert_eq!(to_words(1001).unwrap(), "One Thousand One");
        assert_eq!(to_words(250_000).unwrap(), "Two Hundred and Fifty Thousand");
        assert_eq!(
            to_words(7_342).unwrap(),
            "Seven Thousand Three Hundred and Forty Two"
        );
    }

    #[test]
    fn test_zero_groups_are_skipped() {
        assert_eq!(to_words(1_000_000).unwrap(), "One Million");
        assert_eq!(to_words(2_000_000_005).unwrap(), "Two Billion Five");
        assert_eq!(to_words(1_000_001_000).unwrap(), "One Billion One Thousand");
    }

    #[test]
    fn test_upper_bound() {
        assert_eq!(
            to_words(WORDS_LIMIT - 1).unwrap(),
            "Nine Hundred and Ninety Nine Billion Nine Hundred and Ninety Nine Million \
             Nine Hundred and Ninety Nine Thousand Nine Hundred and Ninety Nine"
        );
    }

    #[test]
    fn test_out_of_range() {
        let err = to_words(-1).unwrap_err();
        assert_eq!(err.value, -1);
        assert!(to_words(WORDS_LIMIT).is_err());
        assert!(to_words(i64::MAX).is_err());
        assert!(to_words(i64::MIN).is_err());
    }

    #[test]
    fn test_idempotent() {
        for n in [0, 1, 17, 340, 5_005, 1_234_567] {
            assert_eq!(to_words(n).unwrap(), to_words(n).unwrap());
        }
    }

    #[test]
    fn test_no_stray_whitespace() {
        for n in [1, 10, 100, 1_000, 10_010, 1_000_100, 999_000_000_000] {
            let words = to_words(n).unwrap();
            assert_eq!(words.trim(), words);
            assert!(!words.contains("  "), "double space in {words:?}");
        }
    }
}
