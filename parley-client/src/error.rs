//! Chat API client errors

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("missing OPENAI_API_KEY in environment")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("rate limited")]
    RateLimited,

    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("malformed response: {message}")]
    Protocol { message: String },

    #[error("stream parsing error: {message}")]
    StreamParse { message: String },
}

impl ClientError {
    /// Map an HTTP status plus response body into an error category.
    pub fn from_http_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed { message },
            429 => Self::RateLimited,
            s if s >= 500 => Self::ServerError { status: s, message },
            s if s >= 400 => Self::InvalidRequest { message },
            _ => Self::Protocol { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert!(matches!(
            ClientError::from_http_status(401, String::new()),
            ClientError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            ClientError::from_http_status(429, String::new()),
            ClientError::RateLimited
        ));
        assert!(matches!(
            ClientError::from_http_status(500, String::new()),
            ClientError::ServerError { status: 500, .. }
        ));
        assert!(matches!(
            ClientError::from_http_status(400, String::new()),
            ClientError::InvalidRequest { .. }
        ));
    }
}
