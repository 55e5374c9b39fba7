//! Unit tests for the reserved block reconciler

#[cfg(test)]
mod tests {
    use crate::error::ReconcileError;
    use crate::reconciler::{Action, apply, import, refresh};
    use crate::test_utils::*;
    use ipam_client::mock::{Resource, Verb};
    use ipam_declarations::{ReservedBlockSpec, ValidationError};

    fn reserved(name: Option<&str>, cidr: &str, reason: Option<&str>) -> ReservedBlockSpec {
        ReservedBlockSpec {
            name: name.map(str::to_string),
            cidr: cidr.to_string(),
            reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_reason_change_is_rejected_before_any_call() {
        let (mock, ctx) = mock_context();
        let spec = reserved(Some("dci"), "172.16.0.0/12", Some("datacenter interconnect"));
        let created = apply(&ctx, "dci", &spec, None).await.entry.unwrap();

        mock.clear_calls();
        let changed = reserved(Some("dci"), "172.16.0.0/12", Some("decommissioned"));
        let applied = apply(&ctx, "dci", &changed, Some(&created)).await;
        assert!(matches!(
            applied.result,
            Err(ReconcileError::Validation {
                source: ValidationError::Immutable { field: "reason", .. },
                ..
            })
        ));
        assert_eq!(applied.entry.unwrap(), created);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rename_is_in_place() {
        let (mock, ctx) = mock_context();
        let created = apply(&ctx, "dci", &reserved(Some("dci"), "172.16.0.0/12", None), None)
            .await
            .entry
            .unwrap();

        mock.clear_calls();
        let applied = apply(&ctx, "dci", &reserved(Some("dci-legacy"), "172.16.0.0/12", None), Some(&created)).await;
        assert_eq!(applied.action, Action::Update);
        let renamed = applied.entry.unwrap();
        assert_eq!(renamed.id(), created.id());
        assert_eq!(renamed.state.name.as_deref(), Some("dci-legacy"));
        assert_eq!(renamed.state.created_at, created.state.created_at);
        assert_eq!(mock.call_count(Resource::ReservedBlock, Verb::Update), 1);
        assert_eq!(mock.write_count(), 1);
    }

    #[tokio::test]
    async fn test_unset_name_accepts_remote_value() {
        let (mock, ctx) = mock_context();
        let created = apply(&ctx, "dci", &reserved(Some("dci"), "172.16.0.0/12", None), None)
            .await
            .entry
            .unwrap();

        mock.clear_calls();
        let applied = apply(&ctx, "dci", &reserved(None, "172.16.0.0/12", None), Some(&created)).await;
        assert_eq!(applied.action, Action::NoOp);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_and_import_go_through_list() {
        let (mock, ctx) = mock_context();
        apply(&ctx, "other", &reserved(Some("other"), "192.168.0.0/16", None), None)
            .await
            .entry
            .unwrap();
        let created = apply(&ctx, "dci", &reserved(Some("dci"), "172.16.0.0/12", Some("interconnect")), None)
            .await
            .entry
            .unwrap();

        mock.clear_calls();
        let read = refresh::<ReservedBlockSpec>(&ctx, "dci", &created).await;
        assert_eq!(read.entry.unwrap(), created);
        assert_eq!(mock.call_count(Resource::ReservedBlock, Verb::List), 1);
        assert_eq!(mock.call_count(Resource::ReservedBlock, Verb::Get), 0);

        let imported = import::<ReservedBlockSpec>(&ctx, "dci", created.id()).await.unwrap();
        assert_eq!(imported.state, created.state);

        let missing = import::<ReservedBlockSpec>(&ctx, "dci", "r-missing").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_cidr_change_replaces() {
        let (mock, ctx) = mock_context();
        let created = apply(&ctx, "dci", &reserved(Some("dci"), "172.16.0.0/12", None), None)
            .await
            .entry
            .unwrap();

        mock.clear_calls();
        let applied = apply(&ctx, "dci", &reserved(Some("dci"), "172.16.0.0/16", None), Some(&created)).await;
        assert_eq!(applied.action, Action::Replace);
        let replaced = applied.entry.unwrap();
        assert_ne!(replaced.id(), created.id());
        assert_eq!(replaced.state.cidr, "172.16.0.0/16");
        let verbs: Vec<Verb> = mock.calls().into_iter().map(|c| c.verb).collect();
        assert_eq!(verbs, vec![Verb::Delete, Verb::Create]);
    }
}
