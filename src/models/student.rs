//! Student document model

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudentDetails {
    #[serde(default)]
    pub student_name: String,
}

/// Student document from the `students` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub student_id: String,
    #[serde(default)]
    pub student_details: StudentDetails,
    /// Books currently held by the student
    #[serde(default)]
    pub number_of_books_issued: i64,
}

impl Student {
    pub fn name(&self) -> &str {
        &self.student_details.student_name
    }
}
