//! Students repository

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::student::Student,
    repository::store::{DocumentStore, DocumentStoreExt, Stored, STUDENTS},
};

#[derive(Clone)]
pub struct StudentsRepository {
    store: Arc<dyn DocumentStore>,
}

impl StudentsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Find a student by its `student_id` field
    pub async fn get_by_student_id(&self, student_id: &str) -> AppResult<Option<Stored<Student>>> {
        self.store
            .find_one_by_field(STUDENTS, "student_id", student_id)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    pub async fn put(&self, student: &Student) -> AppResult<()> {
        self.store
            .put(STUDENTS, &student.student_id, serde_json::to_value(student)?)
            .await?;
        Ok(())
    }
}
