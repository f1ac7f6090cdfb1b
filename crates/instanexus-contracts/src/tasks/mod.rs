mod status;
mod wire;

pub use status::{GenerationTask, TaskKind, TaskStatus};
pub use wire::{
    ImagineInput, RemoteError, SubmitData, SubmitResponse, TaskData, TaskEnvelope, TaskInput,
    TaskOutput, TaskRequest, UpscaleInput, TASK_MODEL, UPSCALE_MARKER,
};
