use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    models::complaintmodel::{Comment, Complaint, ComplaintStatus, Department, OriginActivity},
    service::complaint_service::{ComplaintDetails, ComplaintPage, ComplaintQuery, ComplaintStats},
};

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct SubmitComplaintDto {
    #[validate(length(min = 1, message = "Please select a category"))]
    pub category: String,

    #[validate(length(min = 1, max = 5000, message = "Description must be between 1 and 5000 characters"))]
    pub description: String,

    #[validate(length(max = 100, message = "Name must not exceed 100 characters"))]
    pub name: Option<String>,

    pub email: Option<String>,

    #[validate(length(max = 50, message = "Student ID must not exceed 50 characters"))]
    pub student_id: Option<String>,

    #[serde(default)]
    pub is_anonymous: bool,

    /// Base64 data URL of an optional image.
    pub attachment: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VerifyComplaintDto {
    pub department: Option<Department>,
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RemarksDto {
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ResolveComplaintDto {
    pub resolution_details: Option<String>,
    /// Base64 data URL of the proof image.
    pub resolution_image: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DisputeDto {
    pub reason: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommentDto {
    #[validate(length(min = 1, max = 2000, message = "Comment must be between 1 and 2000 characters"))]
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ComplaintQueryDto {
    pub status: Option<ComplaintStatus>,
    pub search: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

impl From<ComplaintQueryDto> for ComplaintQuery {
    fn from(dto: ComplaintQueryDto) -> Self {
        ComplaintQuery {
            status: dto.status,
            search: dto.search,
            page: dto.page,
            limit: dto.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmittedComplaintDto {
    pub status: String,
    pub reference_number: String,
    pub data: Complaint,
}

#[derive(Debug, Serialize)]
pub struct ComplaintResponseDto {
    pub status: String,
    pub data: Complaint,
}

#[derive(Debug, Serialize)]
pub struct ComplaintDetailsResponseDto {
    pub status: String,
    pub data: ComplaintDetails,
}

#[derive(Debug, Serialize)]
pub struct ComplaintListResponseDto {
    pub status: String,
    pub data: ComplaintPage,
}

#[derive(Debug, Serialize)]
pub struct ComplaintStatsResponseDto {
    pub status: String,
    pub data: ComplaintStats,
}

#[derive(Debug, Serialize)]
pub struct CommentResponseDto {
    pub status: String,
    pub data: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponseDto {
    pub status: String,
    pub data: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionReportResponseDto {
    pub status: String,
    pub origins: Vec<OriginActivity>,
    pub results: usize,
}
