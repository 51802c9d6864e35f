//! Session-scoped entry point for the transport layer
//!
//! Every call looks the session up by id and forwards to its state manager.
//! Unknown sessions and rejected values come back as `false` or `None`;
//! nothing here returns an error.

use crate::session::{Session, SessionConfig, SessionMemoryUsage, SessionRegistry, SessionType};
use crate::state::{AppState, Category, FieldValue, NodeValues, SubnodeValues, ThemeUpdate};
use std::sync::Arc;

/// Thin router over a shared [`SessionRegistry`]
#[derive(Debug, Clone)]
pub struct SessionFacade {
    registry: Arc<SessionRegistry>,
}

impl SessionFacade {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Look up a session and record the access
    fn session(&self, session_id: &str) -> Option<Arc<Session>> {
        let session = self.registry.get_session(session_id)?;
        session.touch();
        Some(session)
    }

    pub async fn create_session(
        &self,
        session_id: Option<String>,
        config: Option<SessionConfig>,
    ) -> String {
        self.registry.create_session(session_id, config).await
    }

    pub async fn create_typed_session(
        &self,
        session_id: Option<String>,
        session_type: SessionType,
    ) -> String {
        self.registry
            .create_session_of_type(session_id, session_type, None)
            .await
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.session(session_id)
    }

    pub fn associate_client(&self, client_id: &str, session_id: &str) -> bool {
        self.registry.associate_client(client_id, session_id)
    }

    pub fn dissociate_client(&self, client_id: &str) -> Option<String> {
        self.registry.dissociate_client(client_id)
    }

    pub async fn remove_session(&self, session_id: &str) -> bool {
        self.registry.remove_session(session_id).await
    }

    pub async fn get_state(&self, session_id: &str) -> Option<AppState> {
        let session = self.session(session_id)?;
        Some(session.state_manager().get_state_copy().await)
    }

    pub async fn set_category(&self, session_id: &str, category: Option<Category>) -> bool {
        match self.session(session_id) {
            Some(session) => session.state_manager().set_category(category).await,
            None => false,
        }
    }

    pub async fn set_subnode(&self, session_id: &str, subnode_id: Option<String>) -> bool {
        match self.session(session_id) {
            Some(session) => session.state_manager().set_subnode(subnode_id).await,
            None => false,
        }
    }

    pub async fn update_field(
        &self,
        session_id: &str,
        subnode_id: &str,
        field_id: &str,
        value: FieldValue,
    ) -> bool {
        match self.session(session_id) {
            Some(session) => {
                session
                    .state_manager()
                    .update_field(subnode_id, field_id, value)
                    .await
            }
            None => false,
        }
    }

    pub async fn get_field_value(
        &self,
        session_id: &str,
        subnode_id: &str,
        field_id: &str,
    ) -> Option<FieldValue> {
        let session = self.session(session_id)?;
        session
            .state_manager()
            .get_field_value(subnode_id, field_id)
            .await
    }

    pub async fn get_subnode_field_values(
        &self,
        session_id: &str,
        subnode_id: &str,
    ) -> Option<SubnodeValues> {
        let session = self.session(session_id)?;
        Some(session.state_manager().get_subnode_field_values(subnode_id).await)
    }

    /// Confirm a subnode and return its orbit angle
    pub async fn confirm_subnode(
        &self,
        session_id: &str,
        category: Category,
        subnode_id: &str,
        values: NodeValues,
    ) -> Option<f64> {
        let session = self.session(session_id)?;
        session
            .state_manager()
            .confirm_subnode(category, subnode_id, values)
            .await
    }

    pub async fn clear_confirmed_nodes(&self, session_id: &str) -> bool {
        match self.session(session_id) {
            Some(session) => session.state_manager().clear_confirmed_nodes().await,
            None => false,
        }
    }

    pub async fn update_theme(&self, session_id: &str, update: &ThemeUpdate) -> bool {
        match self.session(session_id) {
            Some(session) => session.state_manager().update_theme(update).await,
            None => false,
        }
    }

    pub fn memory_usage(&self, session_id: &str) -> Option<SessionMemoryUsage> {
        self.registry
            .get_session(session_id)
            .map(|session| session.memory_usage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ColorTheme;

    fn facade() -> SessionFacade {
        SessionFacade::new(Arc::new(SessionRegistry::default()))
    }

    #[tokio::test]
    async fn test_unknown_session_yields_sentinels() {
        let facade = facade();
        assert!(facade.get_state("nope").await.is_none());
        assert!(!facade.set_category("nope", Some(Category::Voice)).await);
        assert!(!facade.update_field("nope", "input", "vad", true.into()).await);
        assert!(facade
            .confirm_subnode("nope", Category::Voice, "input", NodeValues::new())
            .await
            .is_none());
        assert!(!facade.clear_confirmed_nodes("nope").await);
        assert!(!facade.update_theme("nope", &ThemeUpdate::default().glow("#123456")).await);
        assert!(facade.memory_usage("nope").is_none());
        assert!(!facade.associate_client("c1", "nope"));
        assert!(facade.dissociate_client("c1").is_none());
    }

    #[tokio::test]
    async fn test_routes_to_session_state() {
        let facade = facade();
        let id = facade.create_session(None, None).await;

        assert!(facade.set_category(&id, Some(Category::Voice)).await);
        assert!(facade.set_subnode(&id, Some("input".into())).await);
        assert!(facade.update_field(&id, "input", "vad", true.into()).await);
        assert!(!facade.update_field(&id, "input", "vad", "yes".into()).await);
        assert_eq!(
            facade.get_field_value(&id, "input", "vad").await,
            Some(FieldValue::Bool(true))
        );

        let state = facade.get_state(&id).await.unwrap();
        assert_eq!(state.current_category, Some(Category::Voice));
        assert_eq!(state.current_subnode.as_deref(), Some("input"));
        assert_eq!(facade.get_subnode_field_values(&id, "input").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_and_theme() {
        let facade = facade();
        let id = facade.create_session(None, None).await;

        let angle = facade
            .confirm_subnode(&id, Category::Voice, "input", NodeValues::new())
            .await;
        assert_eq!(angle, Some(-90.0));
        assert!(facade.update_theme(&id, &ThemeUpdate::default().font("#101010")).await);

        let state = facade.get_state(&id).await.unwrap();
        assert_eq!(state.confirmed_nodes.len(), 1);
        assert_eq!(state.active_theme.font, "#101010");
        assert_eq!(state.active_theme.glow, ColorTheme::default().glow);

        assert!(facade.clear_confirmed_nodes(&id).await);
        assert!(facade.get_state(&id).await.unwrap().confirmed_nodes.is_empty());
        assert!(facade.memory_usage(&id).is_some());
    }

    #[tokio::test]
    async fn test_access_refreshes_last_accessed() {
        let facade = facade();
        let id = facade
            .create_session(None, Some(SessionConfig::default().with_idle_timeout(0)))
            .await;
        let before = facade.registry().get_session(&id).unwrap().config().last_accessed;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        facade.get_state(&id).await;
        let after = facade.registry().get_session(&id).unwrap().config().last_accessed;
        assert!(after > before);
    }
}
