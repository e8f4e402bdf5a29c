use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::user::{User, UserType};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 5, max = 20))]
    pub phone: String,
    #[validate(range(min = 1, max = 150))]
    pub age: Option<i32>,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserLoginRequest {
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub phone: String,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub user_type: UserType,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            phone: user.phone.clone(),
            age: user.age,
            email: user.email.clone(),
            user_type: user.user_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_staff: bool,
}

impl From<&User> for AdminUserView {
    fn from(user: &User) -> Self {
        Self {
            profile: UserProfile::from(user),
            is_staff: user.is_staff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserProfile,
}
