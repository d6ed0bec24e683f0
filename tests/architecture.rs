//! Architecture Verification Suite
//!
//! Ensures the components shared across tasks stay thread-safe and the
//! public seams stay accessible.

#[cfg(test)]
mod architecture_tests {
    use vigia::analytics::InsightBundle;
    use vigia::data::{FilterSpec, TableStore};
    use vigia::figures::FigureSet;
    use vigia::orchestrator::{DashboardInstance, DashboardOrchestrator};

    // Every dashboard runs on its own tokio task; anything it holds must
    // cross thread boundaries.
    #[test]
    fn shared_components_are_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<DashboardOrchestrator>();
        assert_send_sync::<DashboardInstance>();
        assert_send_sync::<TableStore>();
        assert_send_sync::<InsightBundle>();
        assert_send_sync::<FigureSet>();
        assert_send_sync::<FilterSpec>();
    }

    // The orchestrator handle must stay cheap to hand to GUI callbacks.
    #[test]
    fn orchestrator_handle_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<DashboardOrchestrator>();
    }
}
