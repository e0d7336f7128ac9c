use std::fmt;

/// Holds a credential, such as a gateway merchant key or the admin API key, without ever printing it.
/// `Debug` and `Display` both emit a fixed mask, so a `Secret` buried in a config struct cannot leak into
/// the logs. Call [`Secret::reveal`] at the single point where the real value goes onto the wire.
#[derive(Clone, Default)]
pub struct Secret<T: Clone + Default>(T);

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn reveal(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Default> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T: Clone + Default> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl<T: Clone + Default> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting_never_exposes_the_value() {
        let key = Secret::new("live_secret_key_800".to_string());
        assert_eq!(format!("{key}"), "[redacted]");
        assert_eq!(format!("{key:?}"), "[redacted]");
        assert!(!format!("{key:?}").contains("800"));
    }

    #[test]
    fn reveal_returns_the_wrapped_value() {
        let key: Secret<String> = "live_secret_key_800".to_string().into();
        assert_eq!(key.reveal(), "live_secret_key_800");
        assert_eq!(Secret::<String>::default().reveal(), "");
    }
}
