pub mod fork;
pub mod job;
pub mod pipeline;
pub mod process;
pub mod redirect;
pub mod registry;
pub mod signal;
pub mod state;
pub mod wait;

pub use job::{Job, JobState, JobTable};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use redirect::Redirect;
pub use registry::{ProcessRecord, ProcessRegistry, RecordHandle};
pub use signal::SignalPolicy;
pub use state::ProcessState;
