//! Data models

pub mod mappings;
pub mod question;
pub mod report;
pub mod response;

pub use mappings::MappingsData;
pub use question::{Question, QuestionMap};
pub use report::{
    MappingLoadReport, ResponseLoadReport, RunSummary, Stage, StageReport, StageStatus,
    SurveyRunReport,
};
pub use response::{PreparedResponse, RawTable, ResponseRecord};
