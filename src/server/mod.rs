// Web服务器模块

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ErrorResponse;
pub use routes::build_router;
pub use state::AppState;
