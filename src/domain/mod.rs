pub mod job;
pub mod stored;

pub use job::{JobDetails, JobRecord, NewJob};
pub use stored::StoredJob;
