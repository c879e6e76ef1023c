mod detector;
mod dispatcher;
mod ort_detector;
mod protocol;
mod registry;
mod routing;
mod worker;

pub mod app;
pub mod config;

pub use app::start_app;
