use crate::AppState;
use crate::auth::USER_HEADER;
use crate::db::handlers::Users;
use crate::errors::{Error, Result};
use crate::types::UserId;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

/// The authenticated caller, resolved from the proxy header on every request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
}

impl CurrentUser {
    /// Gate for admin-only operations.
    pub fn require_admin(&self, resource: &str) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::Forbidden {
                resource: resource.to_string(),
            })
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let email = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(Error::Unauthenticated { message: None })?;

        let mut conn = state.db.acquire().await.map_err(crate::db::errors::DbError::from)?;
        let user = Users::new(&mut conn).get_by_email(email).await?;

        match user {
            Some(user) => Ok(CurrentUser {
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                is_admin: user.is_admin,
            }),
            None => {
                trace!("No user on record for proxy header identity");
                Err(Error::Unauthenticated {
                    message: Some("Unknown user".to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_user};
    use axum::extract::FromRequestParts as _;
    use sqlx::PgPool;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/test");
        if let Some(value) = value {
            builder = builder.header(USER_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_header_resolves_known_user(pool: PgPool) {
        let state = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, false).await;

        let mut parts = parts_with_header(Some(&user.email));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.id, user.id);
        assert!(!current.is_admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_header_is_unauthenticated(pool: PgPool) {
        let state = create_test_app(pool).await;

        let mut parts = parts_with_header(None);
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_email_is_unauthenticated(pool: PgPool) {
        let state = create_test_app(pool).await;

        let mut parts = parts_with_header(Some("stranger@example.com"));
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }
}
