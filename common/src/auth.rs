use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};
use crate::schema::{Transaction, User};

/// Identity carried in the signed access token and handed to every exchange operation.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, actix_jwt_auth_middleware::FromRequest,
)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
}

impl AuthContext {
    pub fn for_user(user: &User) -> Self {
        AuthContext {
            user_id: user.id,
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }

    pub fn require_admin(&self) -> ExchangeResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            log::warn!("User {} attempted an admin operation", self.user_id);
            Err(ExchangeError::Forbidden("You are not an Admin".to_string()))
        }
    }

    pub fn can_read(&self, transaction: &Transaction) -> bool {
        self.is_admin || transaction.is_owned_by(self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admins_pass_the_admin_check() {
        let user = AuthContext {
            user_id: 7,
            email: "user@example.com".into(),
            is_admin: false,
        };
        assert!(matches!(
            user.require_admin(),
            Err(ExchangeError::Forbidden(_))
        ));

        let admin = AuthContext {
            is_admin: true,
            ..user
        };
        assert!(admin.require_admin().is_ok());
    }
}
