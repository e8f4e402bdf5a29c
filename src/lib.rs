pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::database::repository::{AttemptRepository, QuestionBank, TestConfigStore, UserDirectory};
use crate::services::{
    attempt_service::AttemptService, question_service::QuestionService,
    test_config_service::TestConfigService, user_service::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub attempt_service: AttemptService,
    pub question_service: QuestionService,
    pub test_config_service: TestConfigService,
    pub user_service: UserService,
}

impl AppState {
    /// Wires every service onto one backing store.
    pub fn new<S>(store: Arc<S>, jwt_secret: &str, token_ttl_hours: i64) -> Self
    where
        S: QuestionBank + TestConfigStore + AttemptRepository + UserDirectory + 'static,
    {
        let attempt_service = AttemptService::new(store.clone(), store.clone(), store.clone());
        let question_service = QuestionService::new(store.clone());
        let test_config_service = TestConfigService::new(store.clone());
        let user_service = UserService::new(store, jwt_secret, token_ttl_hours);

        Self {
            attempt_service,
            question_service,
            test_config_service,
            user_service,
        }
    }
}
