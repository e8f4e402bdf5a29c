use crate::database::repository::UserDirectory;
use crate::dto::auth_dto::{RegisterRequest, TokenResponse, UserProfile};
use crate::error::{Error, Result};
use crate::models::user::{NewUser, User, UserType};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::token::{decode_token, issue_token, Claims};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserDirectory>,
    jwt_secret: Arc<str>,
    token_ttl_hours: i64,
}

impl UserService {
    pub fn new(users: Arc<dyn UserDirectory>, jwt_secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            users,
            jwt_secret: Arc::from(jwt_secret),
            token_ttl_hours,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile> {
        if self.users.find_by_phone(&req.phone).await?.is_some() {
            return Err(Error::Conflict("Phone number is already registered".to_string()));
        }
        let user = self
            .users
            .create_user(NewUser {
                first_name: req.first_name,
                phone: req.phone,
                age: req.age,
                email: None,
                user_type: UserType::User,
                is_staff: false,
                password_hash: Some(hash_password(&req.password)?),
            })
            .await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(UserProfile::from(&user))
    }

    /// Phone and password login for regular users.
    pub async fn login(&self, phone: &str, password: &str) -> Result<TokenResponse> {
        let user = self
            .users
            .find_by_phone(phone)
            .await?
            .filter(|u| password_matches(u, password))
            .ok_or_else(|| Error::Unauthorized("Invalid phone or password".to_string()))?;
        if user.user_type != UserType::User {
            return Err(Error::Unauthorized("Not a user account".to_string()));
        }
        self.token_response(&user)
    }

    /// Email and password login for staff accounts.
    pub async fn admin_login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .filter(|u| password_matches(u, password))
            .ok_or_else(|| Error::Unauthorized("Invalid email or password".to_string()))?;
        if !user.is_staff {
            return Err(Error::Forbidden("User is not an administrator".to_string()));
        }
        self.token_response(&user)
    }

    pub async fn me(&self, user_id: Uuid) -> Result<UserProfile> {
        self.get(user_id).await.map(|u| UserProfile::from(&u))
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }

    /// Creates the staff account if no user has that email yet.
    pub async fn ensure_admin(&self, email: &str, phone: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            return Ok(existing);
        }
        let user = self
            .users
            .create_user(NewUser {
                first_name: "Administrator".to_string(),
                phone: phone.to_string(),
                age: None,
                email: Some(email.to_string()),
                user_type: UserType::Admin,
                is_staff: true,
                password_hash: Some(hash_password(password)?),
            })
            .await?;
        tracing::info!(user_id = %user.id, "bootstrap administrator created");
        Ok(user)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode_token(token, &self.jwt_secret)
    }

    fn token_response(&self, user: &User) -> Result<TokenResponse> {
        let token = issue_token(user.id, user.user_type, &self.jwt_secret, self.token_ttl_hours)?;
        Ok(TokenResponse {
            token,
            user: UserProfile::from(user),
        })
    }
}

fn password_matches(user: &User, password: &str) -> bool {
    user.password_hash
        .as_deref()
        .map_or(false, |hash| verify_password(password, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::MockUserDirectory;
    use chrono::Utc;

    fn stored_user(user_type: UserType, is_staff: bool, password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Айгуль".into(),
            phone: "+996555000111".into(),
            age: Some(30),
            email: Some("aigul@example.com".into()),
            user_type,
            is_staff,
            password_hash: Some(hash_password(password).unwrap()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn login_issues_token_for_user_account() {
        let user = stored_user(UserType::User, false, "hunter22");
        let user_id = user.id;
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_phone()
            .returning(move |_| Ok(Some(user.clone())));
        let service = UserService::new(Arc::new(users), "secret", 1);

        let resp = service.login("+996555000111", "hunter22").await.unwrap();
        let claims = service.verify_token(&resp.token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let user = stored_user(UserType::User, false, "hunter22");
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_phone()
            .returning(move |_| Ok(Some(user.clone())));
        let service = UserService::new(Arc::new(users), "secret", 1);

        let err = service.login("+996555000111", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn admin_account_cannot_use_phone_login() {
        let admin = stored_user(UserType::Admin, true, "rootpass");
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_phone()
            .returning(move |_| Ok(Some(admin.clone())));
        let service = UserService::new(Arc::new(users), "secret", 1);

        let err = service.login("+996555000111", "rootpass").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn non_staff_is_forbidden_from_admin_login() {
        let user = stored_user(UserType::User, false, "hunter22");
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        let service = UserService::new(Arc::new(users), "secret", 1);

        let err = service
            .admin_login("aigul@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn duplicate_phone_is_a_conflict() {
        let existing = stored_user(UserType::User, false, "hunter22");
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_phone()
            .returning(move |_| Ok(Some(existing.clone())));
        users.expect_create_user().never();
        let service = UserService::new(Arc::new(users), "secret", 1);

        let err = service
            .register(RegisterRequest {
                first_name: "Бакыт".into(),
                phone: "+996555000111".into(),
                age: None,
                password: "password1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
