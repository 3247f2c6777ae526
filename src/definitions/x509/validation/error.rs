use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct ErrorWithContext<E> {
    context: ErrorContext,
    error: E,
}

impl<E: fmt::Display> ErrorWithContext<E> {
    pub fn signer(error: E) -> String {
        Self {
            context: ErrorContext::Signer,
            error,
        }
        .to_string()
    }

    pub fn chain(error: E) -> String {
        Self {
            context: ErrorContext::Chain,
            error,
        }
        .to_string()
    }

    pub fn trust_anchor(error: E) -> String {
        Self {
            context: ErrorContext::TrustAnchor,
            error,
        }
        .to_string()
    }
}

impl<E: fmt::Display> fmt::Display for ErrorWithContext<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error: {}",
            match self.context {
                ErrorContext::Signer => "Signer certificate",
                ErrorContext::Chain => "Certificate chain",
                ErrorContext::TrustAnchor => "Trust anchor",
            },
            self.error,
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum ErrorContext {
    Signer,
    Chain,
    TrustAnchor,
}
