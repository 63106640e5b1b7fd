use std::fmt::Debug;

use log::*;

use crate::{
    billing_api::{errors::ProjectApiError, project_objects::ProjectUpdate},
    db_types::Project,
    traits::CatalogManagement,
};

/// Project settings management.
pub struct ProjectApi<B> {
    db: B,
}

impl<B> Debug for ProjectApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProjectApi")
    }
}

impl<B> ProjectApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ProjectApi<B>
where B: CatalogManagement
{
    pub async fn fetch_project(&self, project_id: &str) -> Result<Project, ProjectApiError> {
        self.db.fetch_project(project_id).await?.ok_or(ProjectApiError::ProjectNotFound)
    }

    /// Applies a partial update to a project. Currencies the update refers to must exist in the catalog.
    pub async fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<Project, ProjectApiError> {
        let project = self.fetch_project(project_id).await?;
        if update.is_empty() {
            debug!("🪛️ Empty update for project {project_id}. Nothing to do");
            return Ok(project);
        }
        for code in update.currencies() {
            if self.db.fetch_currency(code).await?.is_none() {
                return Err(ProjectApiError::CurrencyNotFound(code.to_string()));
            }
        }
        let updated = update.apply(&project)?;
        let stored = self.db.update_project(&updated).await?;
        info!("🪛️ Project {project_id} updated");
        Ok(stored)
    }
}
