//! Learner dashboard service: course catalog filtering and sorting driven by
//! URL state, learning path, and enrollment status tracking on top of the
//! enterprise LMS APIs.

pub mod catalog;
pub mod client;
pub mod config;
pub mod enrollment_context;
pub mod enrollments;
pub mod error;
pub mod models;
pub mod query;
pub mod routes;
pub mod subsidy;
