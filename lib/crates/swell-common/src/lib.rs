pub mod report;
pub mod types;

pub use report::{
    AuditReport, FlaggedInstance, GrowReport, GrownInstance, ResizeOutcome, RunReport, Stage,
    StageFailure,
};
pub use types::*;
