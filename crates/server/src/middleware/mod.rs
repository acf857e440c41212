pub mod auth;
pub mod model_loaders;

pub use auth::{RequestContext, require_session};
pub use model_loaders::load_task_middleware;
