//! Caller identity extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::MatchError;

/// Header the upstream authentication layer puts the caller's id in.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, read from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = MatchError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Err(MatchError::InvalidRequest(format!(
                "missing {USER_ID_HEADER} header"
            )));
        };
        let raw = value
            .to_str()
            .map_err(|_| MatchError::InvalidRequest(format!("{USER_ID_HEADER} is not ASCII")))?;
        let id = raw.trim().parse::<uuid::Uuid>().map_err(|e| {
            MatchError::InvalidRequest(format!("{USER_ID_HEADER} is not a UUID: {e}"))
        })?;
        Ok(Self(UserId::from_uuid(id)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<CallerId, MatchError> {
        let mut builder = Request::builder().uri("/api/v1/matches");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let Ok(request) = builder.body(()) else {
            panic!("request build failed");
        };
        let (mut parts, ()) = request.into_parts();
        CallerId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_caller_from_header() {
        let id = uuid::Uuid::new_v4();
        let CallerId(caller) = tokio_test::assert_ok!(extract(Some(&id.to_string())).await);
        assert_eq!(caller, UserId::from_uuid(id));

        tokio_test::assert_ok!(extract(Some(&format!("  {id} "))).await);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_rejected() {
        assert!(matches!(
            extract(None).await,
            Err(MatchError::InvalidRequest(_))
        ));
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(MatchError::InvalidRequest(_))
        ));
    }
}
