use reqwest::StatusCode;

/// Failure of one remote retrieval. Aborts the refresh it belongs to.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Failed to send request to CWA ({endpoint}): {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("CWA {endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to parse CWA {endpoint} JSON: {source}")]
    Parse {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("CWA response contained no observation for station '{0}'")]
    MissingStation(String),

    #[error("CWA response contained no forecast for area '{0}'")]
    MissingArea(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_messages_name_the_key() {
        let err = RetrievalError::MissingStation("臺北".into());
        assert!(err.to_string().contains("station '臺北'"));

        let err = RetrievalError::MissingArea("臺北市".into());
        assert!(err.to_string().contains("area '臺北市'"));
    }

    #[test]
    fn status_message_includes_code() {
        let err = RetrievalError::Status {
            endpoint: "observation",
            status: StatusCode::UNAUTHORIZED,
            body: "bad key".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("bad key"));
    }
}
