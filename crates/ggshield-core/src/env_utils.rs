//! Small helpers for reading typed values from the environment.

use tracing::warn;

/// Read an integer from `name`, falling back to `default` when unset or
/// unparsable. A malformed value is reported once and ignored.
pub fn getenv_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Unable to parse {name}={raw:?}, using {default}");
            default
        }),
        Err(_) => default,
    }
}

/// Read a float from `name`, falling back to `default` when unset or
/// unparsable.
pub fn getenv_f64(name: &str, default: f64) -> f64 {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Unable to parse {name}={raw:?}, using {default}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_when_unset() {
        assert_eq!(getenv_usize("GGSHIELD_TEST_UNSET_VAR", 20), 20);
        assert_eq!(getenv_f64("GGSHIELD_TEST_UNSET_VAR", 4.5), 4.5);
    }

    #[test]
    fn parses_when_set() {
        std::env::set_var("GGSHIELD_TEST_SET_VAR", "7");
        assert_eq!(getenv_usize("GGSHIELD_TEST_SET_VAR", 20), 7);
        std::env::remove_var("GGSHIELD_TEST_SET_VAR");
    }

    #[test]
    fn malformed_values_fall_back() {
        std::env::set_var("GGSHIELD_TEST_BAD_VAR", "not-a-number");
        assert_eq!(getenv_usize("GGSHIELD_TEST_BAD_VAR", 3), 3);
        std::env::remove_var("GGSHIELD_TEST_BAD_VAR");
    }
}
