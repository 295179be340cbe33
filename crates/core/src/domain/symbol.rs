use anyhow::{bail, ensure};

const MAX_LEN: usize = 10;

/// Normalize a caller-supplied ticker symbol: trim, uppercase, and validate the
/// charset. Class-share suffixes like `BRK.B` and `BF-B` are allowed.
pub fn normalize(raw: &str) -> anyhow::Result<String> {
    let s = raw.trim().to_ascii_uppercase();
    ensure!(!s.is_empty(), "symbol must be non-empty");
    ensure!(
        s.len() <= MAX_LEN,
        "symbol too long: {} chars (max {MAX_LEN})",
        s.len()
    );
    for c in s.chars() {
        if !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-') {
            bail!("symbol contains invalid character {c:?}");
        }
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_and_trims() {
        assert_eq!(normalize(" nvda ").unwrap(), "NVDA");
        assert_eq!(normalize("brk.b").unwrap(), "BRK.B");
        assert_eq!(normalize("bf-b").unwrap(), "BF-B");
    }

    #[test]
    fn rejects_empty_and_overlong() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("ABCDEFGHIJK").is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(normalize("AAPL;DROP").is_err());
        assert!(normalize("A PL").is_err());
        assert!(normalize("nv/da").is_err());
    }
}
