use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
};
use serde::Deserialize;

use super::error::SearchError;

/// A validated, non-blank question for the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    pub question: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JsonQuery {
    #[serde(default)]
    question: Option<String>,
}

/// The two body shapes the search endpoint accepts, picked by content type.
#[derive(Debug)]
pub enum QueryBody {
    Json(JsonQuery),
    Text(String),
}

impl QueryBody {
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self, SearchError> {
        let is_json = content_type.is_some_and(|ct| ct.contains("application/json"));

        if is_json {
            let query = serde_json::from_slice(body).map_err(|why| {
                log::debug!("rejecting undecodable json body: {why}");
                SearchError::MissingQuestion
            })?;
            return Ok(QueryBody::Json(query));
        }

        match std::str::from_utf8(body) {
            Ok(text) => Ok(QueryBody::Text(text.to_string())),
            Err(_) => Err(SearchError::MissingQuestion),
        }
    }

    pub fn into_query(self) -> Result<RetrievalQuery, SearchError> {
        let question = match self {
            QueryBody::Json(JsonQuery { question }) => question,
            QueryBody::Text(text) => Some(text),
        };

        match question {
            Some(question) if !question.trim().is_empty() => Ok(RetrievalQuery { question }),
            _ => Err(SearchError::MissingQuestion),
        }
    }
}

impl<S: Send + Sync> FromRequest<S> for RetrievalQuery {
    type Rejection = SearchError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| SearchError::MissingQuestion)?;

        QueryBody::parse(content_type.as_deref(), &body)?.into_query()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(content_type: Option<&str>, body: &[u8]) -> Result<RetrievalQuery, SearchError> {
        QueryBody::parse(content_type, body)?.into_query()
    }

    #[test]
    fn json_body_with_question() {
        let parsed = query(
            Some("application/json; charset=utf-8"),
            br#"{"question":"What license does freeCodeCamp use?"}"#,
        )
        .unwrap();
        assert_eq!(parsed.question, "What license does freeCodeCamp use?");
    }

    #[test]
    fn raw_text_is_used_verbatim() {
        let parsed = query(Some("text/plain"), b"  how do I run tests?\n").unwrap();
        assert_eq!(parsed.question, "  how do I run tests?\n");

        let parsed = query(None, b"no content type").unwrap();
        assert_eq!(parsed.question, "no content type");
    }

    #[test]
    fn blank_or_missing_questions_are_rejected() {
        for (content_type, body) in [
            ("application/json", r#"{}"#),
            ("application/json", r#"{"question":""}"#),
            ("application/json", r#"{"question":"   "}"#),
            ("application/json", r#"{"question":null}"#),
            ("text/plain", ""),
            ("text/plain", " \n\t"),
        ] {
            assert!(
                matches!(
                    query(Some(content_type), body.as_bytes()),
                    Err(SearchError::MissingQuestion)
                ),
                "{body:?} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(matches!(
            query(Some("application/json"), b"{\"question\":"),
            Err(SearchError::MissingQuestion)
        ));
        assert!(matches!(
            query(Some("application/json"), br#"{"question":42}"#),
            Err(SearchError::MissingQuestion)
        ));
        assert!(matches!(
            query(Some("text/plain"), &[0xff, 0xfe, 0x00]),
            Err(SearchError::MissingQuestion)
        ));
    }
}
