use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use crate::api::error::{api_error, ApiError};

/// `Json<T>` whose rejections use the API error body
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_error(rejection)),
        }
    }
}

fn rejection_error(rejection: JsonRejection) -> ApiError {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    let status = match rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, "VALIDATION_ERROR", rejection.body_text())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

/// Accepts `3` as well as `"3"`, as form posts send strings
pub fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("\"{}\" is not a number", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(deserialize_with = "number_or_string")]
        priority: i64,
    }

    #[test]
    fn test_number_or_string() {
        let body: Body = serde_json::from_str(r#"{"priority": 4}"#).unwrap();
        assert_eq!(body.priority, 4);

        let body: Body = serde_json::from_str(r#"{"priority": " 2 "}"#).unwrap();
        assert_eq!(body.priority, 2);

        assert!(serde_json::from_str::<Body>(r#"{"priority": "high"}"#).is_err());
        assert!(serde_json::from_str::<Body>(r#"{"priority": 2.5}"#).is_err());
        assert!(serde_json::from_str::<Body>(r#"{}"#).is_err());
    }
}
