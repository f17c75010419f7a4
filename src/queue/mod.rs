pub mod cancel;
pub mod job;
pub mod state;
pub mod worker;

pub use cancel::CancellationRegistry;
pub use job::{Job, OwnerId, generate_output_path, is_video_file};
pub use state::{OwnerJobQueue, OwnerQueueState};
pub use worker::{JobDispatcher, WorkerMessage};
