use std::fmt;

#[derive(Debug)]
pub enum CaptureError {
    /// No frame was ready within the acquisition timeout, or the
    /// duplication interface woke up with nothing changed. Expected
    /// during normal operation; the capture loop simply calls again.
    Timeout,

    /// The duplication interface lost access to the output (display
    /// mode change, fullscreen transition, session switch). The caller
    /// must recreate the session.
    AccessLost,

    /// The pointer shape reported by the duplication interface could
    /// not be decoded.
    InvalidCursorShape(String),

    /// One of the fixed shader programs failed to compile. Fatal at
    /// session start-up.
    ShaderCompile(String),

    /// A GPU allocation, view, buffer, or state-object creation failed.
    /// The underlying platform status code is carried in the chain.
    ResourceCreation(anyhow::Error),

    Platform(anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureErrorClass {
    InvalidInput,
    Transient,
    Fatal,
}

impl CaptureError {
    pub fn class(&self) -> CaptureErrorClass {
        match self {
            Self::InvalidCursorShape(_) => CaptureErrorClass::InvalidInput,
            Self::Timeout | Self::AccessLost => CaptureErrorClass::Transient,
            Self::ShaderCompile(_) | Self::ResourceCreation(_) | Self::Platform(_) => {
                CaptureErrorClass::Fatal
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), CaptureErrorClass::Transient)
    }

    /// Whether the capture session must be torn down and recreated
    /// before acquisition can succeed again.
    pub fn requires_session_reset(&self) -> bool {
        matches!(self, Self::AccessLost)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "failed to acquire desktop frame within timeout"),
            Self::AccessLost => write!(f, "duplication access to the output was lost"),
            Self::InvalidCursorShape(message) => {
                write!(f, "invalid pointer shape: {message}")
            }
            Self::ShaderCompile(message) => {
                write!(f, "shader compilation failed: {message}")
            }
            Self::ResourceCreation(inner) => {
                write!(f, "GPU resource creation failed: {inner:#}")
            }
            Self::Platform(inner) => write!(f, "{inner}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ResourceCreation(inner) | Self::Platform(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable_without_session_reset() {
        let error = CaptureError::Timeout;
        assert!(error.is_retryable());
        assert!(!error.requires_session_reset());
    }

    #[test]
    fn access_lost_requires_session_reset() {
        let error = CaptureError::AccessLost;
        assert!(error.is_retryable());
        assert!(error.requires_session_reset());
    }

    #[test]
    fn resource_creation_is_fatal() {
        let error = CaptureError::ResourceCreation(anyhow::anyhow!("0x887A0005"));
        assert_eq!(error.class(), CaptureErrorClass::Fatal);
        assert!(!error.is_retryable());
    }
}
