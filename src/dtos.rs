pub mod complaintdtos;
pub mod userdtos;

pub use complaintdtos::*;
pub use userdtos::*;
