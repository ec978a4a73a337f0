pub mod config;
pub mod output;
pub mod planning;
pub mod recommender;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod timetable;
