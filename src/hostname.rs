/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Local host name used in EHLO/HELO and in generated Message-IDs.

/// Used when neither the configuration nor the provider supply a name.
pub const FALLBACK_HOSTNAME: &str = "localhost.localdomain";

/// Source of the local host name.
pub trait HostnameProvider {
    /// Returns the host name, or `None` if it cannot be determined.
    fn hostname(&self) -> Option<String>;
}

/// Reads the name of the machine through `gethostname(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostname;

/// Always reports the same name.
#[derive(Debug, Clone, Default)]
pub struct FixedHostname(pub String);

impl HostnameProvider for SystemHostname {
    fn hostname(&self) -> Option<String> {
        gethostname::gethostname()
            .into_string()
            .ok()
            .filter(|hostname| !hostname.trim().is_empty())
    }
}

impl HostnameProvider for FixedHostname {
    fn hostname(&self) -> Option<String> {
        Some(self.0.trim().to_string()).filter(|hostname| !hostname.is_empty())
    }
}

impl<T: HostnameProvider + ?Sized> HostnameProvider for &T {
    fn hostname(&self) -> Option<String> {
        (**self).hostname()
    }
}

/// Picks the configured name if any, then the provider's, then
/// [`FALLBACK_HOSTNAME`].
pub fn resolve(configured: Option<&str>, provider: &dyn HostnameProvider) -> String {
    configured
        .map(str::trim)
        .filter(|hostname| !hostname.is_empty())
        .map(str::to_string)
        .or_else(|| provider.hostname())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

#[cfg(test)]
mod test {
    use super::{resolve, FixedHostname, HostnameProvider, SystemHostname, FALLBACK_HOSTNAME};

    struct Unknown;

    impl HostnameProvider for Unknown {
        fn hostname(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn resolution_order() {
        let provider = FixedHostname("mx.example.com".to_string());
        assert_eq!(resolve(Some("app01"), &provider), "app01");
        assert_eq!(resolve(Some("  "), &provider), "mx.example.com");
        assert_eq!(resolve(None, &provider), "mx.example.com");
        assert_eq!(resolve(None, &Unknown), FALLBACK_HOSTNAME);
        assert_eq!(
            resolve(None, &FixedHostname(String::new())),
            FALLBACK_HOSTNAME
        );
        assert!(!resolve(None, &SystemHostname).is_empty());
    }
}
