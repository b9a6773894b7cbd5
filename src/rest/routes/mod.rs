pub mod assessments;
pub mod auth;
pub mod feedback;
pub mod goals;
pub mod health;
pub mod scenarios;
pub mod stats;
pub mod users;
