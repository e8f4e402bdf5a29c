pub mod question;
pub mod test_answer;
pub mod test_attempt;
pub mod test_config;
pub mod user;
