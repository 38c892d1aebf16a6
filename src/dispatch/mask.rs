//! Identity masking for anything shown to an actor or written to logs.

const VISIBLE_PREFIX: usize = 3;

/// Mask a mailbox address.
///
/// Local parts longer than three characters keep their first three; shorter
/// ones are hidden entirely. The domain is always kept.
pub fn mask(address: &str) -> String {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return "***".to_string();
    };

    if local.chars().count() > VISIBLE_PREFIX {
        let prefix: String = local.chars().take(VISIBLE_PREFIX).collect();
        format!("{prefix}***@{domain}")
    } else {
        format!("***@{domain}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_local_part_keeps_prefix() {
        assert_eq!(mask("sudeep@example.com"), "sud***@example.com");
    }

    #[test]
    fn short_local_part_fully_hidden() {
        assert_eq!(mask("ab@example.com"), "***@example.com");
        assert_eq!(mask("abc@example.com"), "***@example.com");
    }

    #[test]
    fn four_characters_show_three() {
        assert_eq!(mask("abcd@example.com"), "abc***@example.com");
    }

    #[test]
    fn no_at_sign() {
        assert_eq!(mask("not-an-address"), "***");
    }

    #[test]
    fn multibyte_prefix_is_char_safe() {
        assert_eq!(mask("élodie@example.fr"), "élo***@example.fr");
    }
}
