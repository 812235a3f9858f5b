//! HTTP API handlers for invest-app

pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod events;
pub mod health;
pub mod jobs;
pub mod notifications;
pub mod requests;
pub mod tasks;
pub mod templates;
pub mod users;

pub use auth::{auth_routes, CurrentUser};
pub use dashboard::dashboard_routes;
pub use documents::document_routes;
pub use events::event_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use notifications::notification_routes;
pub use requests::request_routes;
pub use tasks::task_routes;
pub use templates::template_routes;
pub use users::user_routes;
