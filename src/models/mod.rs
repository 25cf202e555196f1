pub mod complaintmodel;
pub mod usermodel;
