mod image;
mod routes;
mod server;
mod state;
mod ui;

pub use self::image::array_to_jpeg;
pub use server::{router, run_dashboard_server};
pub use state::{AppState, FrameHub, Hub, StatusHub};
