pub mod answer_sheet;
pub mod attempt_service;
pub mod question_service;
pub mod scoring_service;
pub mod test_config_service;
pub mod user_service;
