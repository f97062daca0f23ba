use reqwest::ClientBuilder;

/// How the ingest client treats the endpoint's TLS certificate.
///
/// Validation is the default. Trusting everything has to be selected
/// explicitly, either with [`TlsPolicy::InsecureTrustAll`] or by passing
/// `false` to [`TlsPolicy::from_validation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TlsPolicy {
    /// Verify the certificate chain against the bundled web PKI roots and
    /// check that it was issued for the endpoint's host name.
    #[default]
    Validate,
    /// Accept any certificate for any host name. Only for endpoints with
    /// self-signed certificates on trusted networks.
    InsecureTrustAll,
}

impl TlsPolicy {
    pub fn from_validation(enabled: bool) -> Self {
        if enabled {
            TlsPolicy::Validate
        } else {
            TlsPolicy::InsecureTrustAll
        }
    }

    pub fn is_validating(&self) -> bool {
        matches!(self, TlsPolicy::Validate)
    }

    /// Apply this policy to a client under construction.
    pub(crate) fn configure(self, builder: ClientBuilder) -> ClientBuilder {
        match self {
            TlsPolicy::Validate => builder.use_rustls_tls(),
            // With rustls the no-op verifier skips the host name check as well.
            TlsPolicy::InsecureTrustAll => builder.use_rustls_tls().danger_accept_invalid_certs(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TlsPolicy;

    #[test]
    fn validation_is_the_default() {
        assert_eq!(TlsPolicy::default(), TlsPolicy::Validate);
        assert_eq!(TlsPolicy::from_validation(true), TlsPolicy::Validate);
        assert_eq!(TlsPolicy::from_validation(false), TlsPolicy::InsecureTrustAll);
        assert!(!TlsPolicy::InsecureTrustAll.is_validating());
    }
}
