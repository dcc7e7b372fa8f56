//! Model building and constraint logic for the exam slot solver.

mod exam_schedule;
mod model_context;
mod model_daily;
mod model_exams;
mod model_sync;

pub use exam_schedule::*;
pub use model_context::{ConstraintToggles, ExamVar, ModelBuilderContext, build_model_pipeline};
