//! Dispatch Module Tests
//!
//! Scatter-gather runs against in-process peers, so no network is needed.
//!
//! ## Test Scopes
//! - **Listing**: union semantics and duplicate tolerance.
//! - **Lifecycle**: not-found vs found-on-one-node.
//! - **Full Update**: partition scoping and arrival-order concatenation.
//! - **Partial Failure**: silent peers are counted, never read as "not found".
//! - **HTTP Transport**: the real transport against a loopback axum server.

#[cfg(test)]
mod tests {
    use crate::command::handlers::handle_internal_command;
    use crate::command::protocol::{
        CommandEnvelope, ENDPOINT_INTERNAL_COMMAND, PROTOCOL_VERSION, ReplyEnvelope,
    };
    use crate::command::types::{CommandRequest, LifecycleOp, NodeReply};
    use crate::config::DispatchConfig;
    use crate::dispatch::aggregator;
    use crate::dispatch::dispatcher::Dispatcher;
    use crate::dispatch::transport::{HttpTransport, PeerTransport};
    use crate::dispatch::types::{
        ClusterAnswer, ClusterResult, FullUpdateStatus, PeerOutcome, PeerResult,
    };
    use crate::error::PeerFailure;
    use crate::membership::directory::StaticMembership;
    use crate::membership::types::{Node, NodeId};
    use crate::test_support::{
        FakeWorker, InMemoryTransport, PeerBehaviour, TEST_CLUSTER, test_endpoint, test_node,
    };
    use axum::{Extension, Router, routing::post};
    use std::collections::BTreeSet;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const PEER_TIMEOUT: Duration = Duration::from_millis(200);

    /// Builds a dispatcher over nodes "a", "b", "c"... in the given order,
    /// the first one being the local node.
    fn dispatcher(
        ids: &[&str],
        transport: InMemoryTransport,
    ) -> Arc<Dispatcher<InMemoryTransport>> {
        let local = test_node(ids[0]);
        let peers = ids[1..].iter().map(|id| test_node(id)).collect();
        let membership = Arc::new(StaticMembership::new(local, peers));

        Dispatcher::new(
            membership,
            Arc::new(transport),
            DispatchConfig {
                cluster_id: TEST_CLUSTER.to_string(),
                peer_timeout: PEER_TIMEOUT,
            },
        )
    }

    fn worker(name: &str, partitions: &[&str]) -> Arc<FakeWorker> {
        Arc::new(FakeWorker::new("jira", name, partitions))
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ============================================================
    // LIST WORKERS
    // ============================================================

    #[tokio::test]
    async fn test_listing_is_union_of_nodes() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![worker("w1", &[])])))
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![worker("w2", &[])])));

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::list_workers())
            .await;
        let listing = aggregator::list_workers(&result);

        assert_eq!(listing.workers, names(&["w1", "w2"]));
        assert!(listing.coverage.complete());
    }

    #[tokio::test]
    async fn test_listing_collapses_duplicates() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![worker("w1", &[])])))
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![worker("w1", &[])])));

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::list_workers())
            .await;

        assert_eq!(aggregator::list_workers(&result).workers, names(&["w1"]));
    }

    // ============================================================
    // LIFECYCLE
    // ============================================================

    #[tokio::test]
    async fn test_stop_ghost_is_not_found_everywhere() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![worker("w1", &[])])))
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![])))
            .with("c", PeerBehaviour::Serve(test_endpoint("c", vec![worker("w2", &[])])));

        let result = dispatcher(&["a", "b", "c"], transport)
            .dispatch(CommandRequest::lifecycle(LifecycleOp::Stop, "ghost"))
            .await;

        assert_eq!(result.answered(), 3);
        for peer in &result.per_node {
            assert_eq!(
                peer.outcome,
                PeerOutcome::Answered(NodeReply::Lifecycle {
                    target_found: false
                })
            );
        }
        let outcome = aggregator::lifecycle(&result);
        assert!(!outcome.found);
        assert!(outcome.found_on.is_empty());
    }

    #[tokio::test]
    async fn test_restart_found_on_one_node() {
        let w1 = worker("w1", &[]);
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![w1.clone()])))
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![])))
            .with("c", PeerBehaviour::Serve(test_endpoint("c", vec![])));

        let result = dispatcher(&["a", "b", "c"], transport)
            .dispatch(CommandRequest::lifecycle(LifecycleOp::Restart, "w1"))
            .await;

        for peer in &result.per_node {
            let expected = peer.node == NodeId("a".to_string());
            assert_eq!(
                peer.reply(),
                Some(&NodeReply::Lifecycle {
                    target_found: expected
                })
            );
        }
        let outcome = aggregator::lifecycle(&result);
        assert!(outcome.found);
        assert_eq!(outcome.found_on, vec![NodeId("a".to_string())]);
        assert_eq!(w1.restart_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_worker_is_tolerated() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![worker("w1", &[])])))
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![worker("w1", &[])])));

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::lifecycle(LifecycleOp::Stop, "w1"))
            .await;
        let outcome = aggregator::lifecycle(&result);

        assert!(outcome.found);
        assert_eq!(outcome.found_on.len(), 2);
    }

    // ============================================================
    // FULL UPDATE
    // ============================================================

    fn full_update_transport() -> InMemoryTransport {
        InMemoryTransport::default()
            .with(
                "a",
                PeerBehaviour::Serve(test_endpoint("a", vec![worker("w1", &["P1", "P2"])])),
            )
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![])))
    }

    #[tokio::test]
    async fn test_full_update_scoped_to_owned_partition() {
        let result = dispatcher(&["a", "b"], full_update_transport())
            .dispatch(CommandRequest::full_update("w1", Some("P1".to_string())))
            .await;
        let outcome = aggregator::full_update(&result);

        assert_eq!(outcome.status, FullUpdateStatus::Scheduled);
        assert!(outcome.found());
        assert_eq!(outcome.scheduled_partitions, vec!["P1".to_string()]);
    }

    #[tokio::test]
    async fn test_full_update_scoped_to_foreign_partition() {
        let result = dispatcher(&["a", "b"], full_update_transport())
            .dispatch(CommandRequest::full_update("w1", Some("P3".to_string())))
            .await;
        let outcome = aggregator::full_update(&result);

        assert_eq!(outcome.status, FullUpdateStatus::PartitionNotOwned);
        assert!(!outcome.found());
        assert!(outcome.scheduled_partitions.is_empty());
        assert_eq!(outcome.found_on, vec![NodeId("a".to_string())]);
    }

    #[tokio::test]
    async fn test_full_update_unscoped_lists_every_partition() {
        let result = dispatcher(&["a", "b"], full_update_transport())
            .dispatch(CommandRequest::full_update("w1", None))
            .await;
        let outcome = aggregator::full_update(&result);

        assert_eq!(outcome.status, FullUpdateStatus::Scheduled);
        assert!(outcome.scheduled_partitions.contains(&"P1".to_string()));
        assert!(outcome.scheduled_partitions.contains(&"P2".to_string()));
    }

    #[tokio::test]
    async fn test_full_update_unknown_worker() {
        let result = dispatcher(&["a", "b"], full_update_transport())
            .dispatch(CommandRequest::full_update("ghost", Some("P1".to_string())))
            .await;

        assert_eq!(
            aggregator::full_update(&result).status,
            FullUpdateStatus::WorkerUnknown
        );
    }

    #[tokio::test]
    async fn test_full_update_empty_key_schedules_everything() {
        // Built like a decoded wire command, without the constructor.
        let command = CommandRequest::FullUpdate {
            target: "w1".to_string(),
            partition_key: Some(String::new()),
        };

        let result = dispatcher(&["a", "b"], full_update_transport())
            .dispatch(command)
            .await;
        let outcome = aggregator::full_update(&result);

        assert_eq!(outcome.status, FullUpdateStatus::Scheduled);
        assert_eq!(outcome.partition_key, None);
        assert_eq!(
            outcome.scheduled_partitions,
            vec!["P1".to_string(), "P2".to_string()]
        );
    }

    #[test]
    fn test_aggregator_reads_empty_key_as_unscoped() {
        let result = ClusterResult {
            cluster_id: TEST_CLUSTER.to_string(),
            command: CommandRequest::FullUpdate {
                target: "w1".to_string(),
                partition_key: Some(String::new()),
            },
            per_node: vec![PeerResult {
                node: NodeId("a".to_string()),
                outcome: PeerOutcome::Answered(NodeReply::FullUpdate {
                    target_found: true,
                    partition_found: false,
                    scheduled_partitions: vec!["P1".to_string()],
                }),
            }],
        };

        let outcome = aggregator::full_update(&result);

        assert_eq!(outcome.status, FullUpdateStatus::Scheduled);
        assert_eq!(outcome.partition_key, None);
    }

    #[tokio::test]
    async fn test_full_update_concatenates_in_arrival_order() {
        // Same worker on two nodes; the slower node's partitions come last.
        let transport = InMemoryTransport::default()
            .with(
                "a",
                PeerBehaviour::ServeAfter(
                    Duration::from_millis(80),
                    test_endpoint("a", vec![worker("w1", &["A1"])]),
                ),
            )
            .with(
                "b",
                PeerBehaviour::Serve(test_endpoint("b", vec![worker("w1", &["B1"])])),
            );

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::full_update("w1", None))
            .await;

        assert_eq!(
            aggregator::full_update(&result).scheduled_partitions,
            vec!["B1".to_string(), "A1".to_string()]
        );
    }

    // ============================================================
    // PARTIAL FAILURE
    // ============================================================

    #[tokio::test]
    async fn test_silent_peer_is_distinguishable_from_empty_peer() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![worker("w1", &[])])))
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![])))
            .with("c", PeerBehaviour::Hang);

        let started = Instant::now();
        let result = dispatcher(&["a", "b", "c"], transport)
            .dispatch(CommandRequest::list_workers())
            .await;
        let listing = aggregator::list_workers(&result);

        assert!(started.elapsed() >= PEER_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(listing.workers, names(&["w1"]));
        assert_eq!(listing.coverage.queried, 3);
        assert_eq!(listing.coverage.answered, 2);
        assert_eq!(listing.coverage.silent.len(), 1);
        assert_eq!(listing.coverage.silent[0].node, NodeId("c".to_string()));
        assert!(matches!(
            listing.coverage.silent[0].failure,
            PeerFailure::Timeout(_)
        ));

        // "b" answered truthfully with nothing; it is not in the silent list.
        let b = result
            .per_node
            .iter()
            .find(|r| r.node == NodeId("b".to_string()))
            .unwrap();
        assert_eq!(
            b.reply(),
            Some(&NodeReply::Workers {
                names: BTreeSet::new()
            })
        );
    }

    #[tokio::test]
    async fn test_slow_peer_within_timeout_is_waited_for() {
        let w1 = worker("w1", &[]);
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![])))
            .with(
                "b",
                PeerBehaviour::ServeAfter(
                    Duration::from_millis(50),
                    test_endpoint("b", vec![w1.clone()]),
                ),
            );

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::lifecycle(LifecycleOp::Stop, "w1"))
            .await;

        assert!(aggregator::lifecycle(&result).found);
        assert_eq!(w1.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_silent_peer_never_counts_as_not_found() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![])))
            .with("b", PeerBehaviour::Unreachable);

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::lifecycle(LifecycleOp::Stop, "w1"))
            .await;
        let outcome = aggregator::lifecycle(&result);

        assert!(!outcome.found);
        assert_eq!(outcome.coverage.answered, 1);
        assert!(!outcome.coverage.complete());
        let silent = result
            .per_node
            .iter()
            .find(|r| r.node == NodeId("b".to_string()))
            .unwrap();
        assert!(silent.reply().is_none());
    }

    #[tokio::test]
    async fn test_all_peers_silent_still_aggregates() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Unreachable)
            .with("b", PeerBehaviour::Hang);

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::full_update("w1", Some("P1".to_string())))
            .await;

        let ClusterAnswer::FullUpdate(outcome) = aggregator::aggregate(&result) else {
            panic!("Wrong answer type");
        };
        assert_eq!(outcome.status, FullUpdateStatus::WorkerUnknown);
        assert!(outcome.coverage.nobody_answered());
        assert_eq!(outcome.coverage.queried, 2);
    }

    #[tokio::test]
    async fn test_failing_worker_silences_only_its_node() {
        let transport = InMemoryTransport::default()
            .with(
                "a",
                PeerBehaviour::Serve(test_endpoint(
                    "a",
                    vec![Arc::new(FakeWorker::failing("jira", "w1"))],
                )),
            )
            .with("b", PeerBehaviour::Serve(test_endpoint("b", vec![])));

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::full_update("w1", Some("P1".to_string())))
            .await;

        assert_eq!(result.answered(), 1);
        let a = result
            .per_node
            .iter()
            .find(|r| r.node == NodeId("a".to_string()))
            .unwrap();
        assert!(matches!(
            a.outcome,
            PeerOutcome::Silent(PeerFailure::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_reply_is_a_protocol_failure() {
        let wrong_shape = ReplyEnvelope {
            version: PROTOCOL_VERSION,
            node_id: NodeId("b".to_string()),
            reply: NodeReply::Workers {
                names: names(&["w1"]),
            },
        };
        let impostor = ReplyEnvelope {
            version: PROTOCOL_VERSION,
            node_id: NodeId("someone-else".to_string()),
            reply: NodeReply::Lifecycle { target_found: true },
        };
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Canned(impostor))
            .with("b", PeerBehaviour::Canned(wrong_shape));

        let result = dispatcher(&["a", "b"], transport)
            .dispatch(CommandRequest::lifecycle(LifecycleOp::Stop, "w1"))
            .await;

        assert_eq!(result.answered(), 0);
        for peer in &result.per_node {
            assert!(matches!(
                peer.outcome,
                PeerOutcome::Silent(PeerFailure::Protocol(_))
            ));
        }
        assert!(!aggregator::lifecycle(&result).found);
    }

    #[tokio::test]
    async fn test_cluster_result_carries_cluster_id_and_command() {
        let transport = InMemoryTransport::default()
            .with("a", PeerBehaviour::Serve(test_endpoint("a", vec![])));

        let command = CommandRequest::list_workers();
        let result = dispatcher(&["a"], transport).dispatch(command.clone()).await;

        assert_eq!(result.cluster_id, TEST_CLUSTER);
        assert_eq!(result.command, command);
        assert_eq!(result.queried(), 1);
    }

    // ============================================================
    // HTTP TRANSPORT
    // ============================================================

    /// Serves `router` on an ephemeral loopback port.
    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    /// A remote node "b" answering through the real internal handler.
    async fn serve_node(workers: Vec<Arc<FakeWorker>>) -> Node {
        let router = Router::new()
            .route(ENDPOINT_INTERNAL_COMMAND, post(handle_internal_command))
            .layer(Extension(test_endpoint("b", workers)));
        let addr = serve(router).await;
        Node::alive(NodeId("b".to_string()), addr, addr)
    }

    fn http_transport() -> HttpTransport {
        HttpTransport::new(test_endpoint("a", vec![worker("local", &[])]))
    }

    #[tokio::test]
    async fn test_http_exchange_with_remote_peer() {
        let peer = serve_node(vec![worker("w1", &[])]).await;
        let envelope = CommandEnvelope::new(TEST_CLUSTER, CommandRequest::list_workers());

        let reply = http_transport().exchange(&peer, &envelope).await.unwrap();

        assert_eq!(reply.version, PROTOCOL_VERSION);
        assert_eq!(reply.node_id, NodeId("b".to_string()));
        assert_eq!(
            reply.reply,
            NodeReply::Workers {
                names: names(&["w1"])
            }
        );
    }

    #[tokio::test]
    async fn test_http_foreign_cluster_is_rejected() {
        let peer = serve_node(vec![]).await;
        let envelope = CommandEnvelope::new("other-cluster", CommandRequest::list_workers());

        let result = http_transport().exchange(&peer, &envelope).await;

        let Err(PeerFailure::Rejected(reason)) = &result else {
            panic!("Expected rejection, got {:?}", result);
        };
        assert!(reason.contains("other-cluster"));
    }

    #[tokio::test]
    async fn test_http_worker_failure_is_rejected() {
        let peer = serve_node(vec![Arc::new(FakeWorker::failing("jira", "broken"))]).await;
        let envelope = CommandEnvelope::new(
            TEST_CLUSTER,
            CommandRequest::full_update("broken", Some("P1".to_string())),
        );

        let result = http_transport().exchange(&peer, &envelope).await;

        let Err(PeerFailure::Rejected(reason)) = &result else {
            panic!("Expected rejection, got {:?}", result);
        };
        assert!(reason.contains("broken"));
    }

    #[tokio::test]
    async fn test_http_undecodable_reply_is_protocol_failure() {
        let router = Router::new().route(
            ENDPOINT_INTERNAL_COMMAND,
            post(|| async { "{\"not\": \"a reply\"}" }),
        );
        let addr = serve(router).await;
        let peer = Node::alive(NodeId("b".to_string()), addr, addr);
        let envelope = CommandEnvelope::new(TEST_CLUSTER, CommandRequest::list_workers());

        let result = http_transport().exchange(&peer, &envelope).await;

        assert!(matches!(result, Err(PeerFailure::Protocol(_))));
    }

    #[tokio::test]
    async fn test_http_local_node_skips_the_network() {
        // Nothing listens on the local node's advertised address.
        let local = test_node("a");
        let envelope = CommandEnvelope::new(TEST_CLUSTER, CommandRequest::list_workers());

        let reply = http_transport().exchange(&local, &envelope).await.unwrap();

        assert_eq!(reply.node_id, NodeId("a".to_string()));
        assert_eq!(
            reply.reply,
            NodeReply::Workers {
                names: names(&["local"])
            }
        );
    }

    #[tokio::test]
    async fn test_http_closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let peer = Node::alive(NodeId("b".to_string()), addr, addr);
        let envelope = CommandEnvelope::new(TEST_CLUSTER, CommandRequest::list_workers());

        let result = http_transport().exchange(&peer, &envelope).await;

        assert!(matches!(result, Err(PeerFailure::Unreachable(_))));
    }
}
