pub mod deps;
pub mod disk_space;
pub mod humanize;
pub mod logger;

pub use deps::DependencyStatus;
pub use disk_space::has_enough_space;
pub use humanize::{format_duration, format_file_size, progress_bar};
pub use logger::init_logging;
