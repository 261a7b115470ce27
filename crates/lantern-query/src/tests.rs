//! Tests for the polling query executor

use super::*;
use lantern_core::QueryState;
use lantern_test_support::{Script, ScriptedFactory, init_test_logging};

fn executor(factory: &Arc<ScriptedFactory>, timeout: Duration) -> QueryExecutor {
    QueryExecutor::with_timeout(factory.clone(), timeout, "SHOW CATALOGS")
}

mod construction_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_timeout_is_thirty_minutes() {
        let factory = Arc::new(ScriptedFactory::new(Script::empty_pages(1)));
        let executor = QueryExecutor::new(factory, "SELECT 1");
        assert_eq!(executor.timeout(), Duration::from_secs(30 * 60));
        assert_eq!(executor.query(), "SELECT 1");
    }

    #[test]
    fn test_final_results_unset_before_execution() {
        let factory = Arc::new(ScriptedFactory::new(Script::empty_pages(1)));
        let executor = executor(&factory, Duration::from_secs(1));
        assert!(executor.final_results().is_none());
    }
}

mod completion_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_returns_last_visitor_value() {
        init_test_logging();
        let factory = Arc::new(ScriptedFactory::new(Script::names(&["hive", "memory"])));
        let executor = executor(&factory, Duration::from_secs(5));

        let mut visits = 0;
        let result = executor
            .execute_with(|_| {
                visits += 1;
                visits
            })
            .await
            .unwrap();

        assert_eq!(result, Some(3));
        assert_eq!(factory.queries(), vec!["SHOW CATALOGS".to_string()]);
    }

    #[tokio::test]
    async fn test_visitor_sees_snapshots_in_order() {
        let factory = Arc::new(ScriptedFactory::new(Script::names(&["hive"])));
        let executor = executor(&factory, Duration::from_secs(5));

        let mut states = Vec::new();
        let last = executor
            .execute_with(|client| {
                states.push(client.current().state());
                client.current().row_count()
            })
            .await
            .unwrap();

        assert_eq!(
            states,
            vec![QueryState::Queued, QueryState::Running, QueryState::Finished]
        );
        assert_eq!(last, Some(0));
    }

    #[tokio::test]
    async fn test_final_results_captured_on_success() {
        let factory = Arc::new(ScriptedFactory::new(Script::names(&["hive"])));
        let executor = executor(&factory, Duration::from_secs(5));

        executor.execute_with(|_| ()).await.unwrap();

        let final_results = executor.final_results().expect("final results");
        assert_eq!(final_results.state(), QueryState::Finished);
    }

    #[tokio::test]
    async fn test_handle_released_on_success() {
        let factory = Arc::new(ScriptedFactory::new(Script::names(&["hive"])));
        let executor = executor(&factory, Duration::from_secs(5));

        executor.execute_with(|_| ()).await.unwrap();

        assert_eq!(factory.starts(), 1);
        assert_eq!(factory.closes(), 1);
        assert_eq!(factory.active(), 0);
    }

    #[tokio::test]
    async fn test_never_valid_handle_returns_none() {
        let factory = Arc::new(ScriptedFactory::new(Script::pages(vec![])));
        let executor = executor(&factory, Duration::from_secs(5));

        let result = executor.execute_with(|_| 1).await.unwrap();

        assert_eq!(result, None);
        assert!(executor.final_results().is_none());
        assert_eq!(factory.closes(), 1);
    }
}

mod timeout_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_times_out_partway_through_slow_statement() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::empty_pages(5).with_advance_delay(Duration::from_millis(30)),
        ));
        let executor = executor(&factory, Duration::from_millis(100));

        let mut visits = 0;
        let err = executor
            .execute_with(|_| visits += 1)
            .await
            .unwrap_err();

        let elapsed_ms = err.elapsed_ms().expect("timeout error");
        assert!(elapsed_ms >= 100, "elapsed {}ms below the budget", elapsed_ms);
        assert!(elapsed_ms < 150, "elapsed {}ms overshot by more than one advance", elapsed_ms);
        // Four snapshots fit in the budget, the fifth check fails
        assert_eq!(visits, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_when_delays_fit_budget() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::empty_pages(5).with_advance_delay(Duration::from_millis(10)),
        ));
        let executor = executor(&factory, Duration::from_millis(100));

        let mut visits = 0;
        let result = executor
            .execute_with(|_| {
                visits += 1;
                visits
            })
            .await
            .unwrap();

        assert_eq!(result, Some(5));
        assert!(executor.final_results().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_handle_and_leaves_final_results_unset() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::empty_pages(10).with_advance_delay(Duration::from_millis(50)),
        ));
        let executor = executor(&factory, Duration::from_millis(75));

        let err = executor.execute_with(|_| ()).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(executor.final_results().is_none());
        assert_eq!(factory.closes(), 1);
        assert_eq!(factory.active(), 0);
    }
}

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_advance_failure_propagates_unchanged() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::names(&["hive"]).failing_advance(1, "connection reset"),
        ));
        let executor = executor(&factory, Duration::from_secs(5));

        let err = executor.execute_with(|_| ()).await.unwrap_err();

        match err {
            LanternError::Protocol(message) => assert_eq!(message, "connection reset"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(executor.final_results().is_none());
        assert_eq!(factory.closes(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_propagates() {
        let factory = Arc::new(ScriptedFactory::new(
            Script::names(&["hive"]).failing_start("engine unavailable"),
        ));
        let executor = executor(&factory, Duration::from_secs(5));

        let mut visited = false;
        let err = executor
            .execute_with(|_| visited = true)
            .await
            .unwrap_err();

        assert!(matches!(err, LanternError::Protocol(_)));
        assert!(!visited);
        assert_eq!(factory.starts(), 1);
        assert_eq!(factory.active(), 0);
    }
}

mod cancellation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cancelled_before_start_skips_visitor() {
        let factory = Arc::new(ScriptedFactory::new(Script::names(&["hive"])));
        let token = CancellationToken::new();
        token.cancel();
        let executor = executor(&factory, Duration::from_secs(5)).with_cancellation(token);

        let result = executor.execute_with(|_| 1).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(factory.closes(), 1);
    }

    #[tokio::test]
    async fn test_cancel_midway_stops_polling() {
        let factory = Arc::new(ScriptedFactory::new(Script::empty_pages(10)));
        let executor = executor(&factory, Duration::from_secs(5));
        let token = executor.cancellation_token();

        let mut visits = 0;
        let result = executor
            .execute_with(|_| {
                visits += 1;
                if visits == 2 {
                    token.cancel();
                }
                visits
            })
            .await
            .unwrap();

        assert_eq!(result, Some(2));
        assert_eq!(factory.closes(), 1);
        assert_eq!(factory.active(), 0);
    }
}
