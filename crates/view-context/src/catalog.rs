use crate::model::{View, ViewSummary};

/// Read-only view catalog, stable for the duration of a session.
pub trait ViewCatalog: Send + Sync {
    /// All views in catalog order.
    fn views(&self) -> &[View];

    fn list_views(&self) -> Vec<ViewSummary> {
        self.views().iter().map(View::summary).collect()
    }

    fn get_view(&self, id: &str) -> Option<&View> {
        self.views().iter().find(|v| v.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    views: Vec<View>,
}

impl InMemoryCatalog {
    pub fn new(views: Vec<View>) -> Self {
        Self { views }
    }
}

impl ViewCatalog for InMemoryCatalog {
    fn views(&self) -> &[View] {
        &self.views
    }
}
