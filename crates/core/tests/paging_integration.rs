//! Page chaining across `paging.next` links.

mod support;

use std::sync::Arc;

use futures::StreamExt;
use graphbatch_core::{ClientOptions, GraphClient};
use graphbatch_domain::{BatchEntry, BatchSlot, Credentials, GraphError, GraphSettings, Params};
use serde_json::{json, Value};
use support::{client, ok, path_of, registry, ScriptedTransport};

const NEXT_BASE: &str = "https://graph.facebook.com/v2.0/me/friends";

fn query_value<'a>(entry: &'a BatchEntry, key: &str) -> Option<&'a str> {
    entry.relative_url.split_once('?')?.1.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Three pages of friends: two full pages of two, then a short page of one
/// that still advertises a next link.
fn friends(entry: &BatchEntry, _attempt: usize) -> BatchSlot {
    let page = match query_value(entry, "after") {
        None => json!({
            "data": [1, 2],
            "paging": {"next": format!("{NEXT_BASE}?access_token=tok&limit=2&after=p2")}
        }),
        Some("p2") => json!({
            "data": [3, 4],
            "paging": {"next": format!("{NEXT_BASE}?access_token=tok&limit=2&after=p3")}
        }),
        Some(_) => json!({
            "data": [5],
            "paging": {"next": format!("{NEXT_BASE}?access_token=tok&limit=2&after=p4")}
        }),
    };
    ok(&page)
}

#[tokio::test]
async fn iterating_walks_every_page_and_stops_on_short_page() {
    let transport = ScriptedTransport::new(friends);
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");
    let items = handle.collect_items().await.expect("items");

    assert_eq!(items, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
    assert_eq!(transport.call_count(), 3);

    let calls = transport.calls();
    let second = &calls[1][0];
    assert_eq!(path_of(second), "v2.0/me/friends");
    assert_eq!(query_value(second, "after"), Some("p2"));
}

#[tokio::test]
async fn data_returns_only_the_current_page() {
    let transport = ScriptedTransport::new(friends);
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");

    assert_eq!(handle.data().await.expect("data"), Some(json!([1, 2])));
    assert_eq!(handle.total_count().await.expect("count"), 2);
    assert_eq!(transport.call_count(), 1);
    // The continuation is prefetched onto the queue, not sent.
    assert!(handle.peek_next_page().is_some_and(|next| !next.is_complete()));
}

#[tokio::test]
async fn item_past_current_page_pages_forward() {
    let transport = ScriptedTransport::new(friends);
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");

    assert_eq!(handle.item(1).await.expect("item"), Some(json!(2)));
    assert_eq!(transport.call_count(), 1);
    assert_eq!(handle.item(3).await.expect("item"), Some(json!(4)));
    assert_eq!(handle.item(9).await.expect("item"), None);
}

#[tokio::test]
async fn envelope_limit_takes_precedence() {
    let transport = ScriptedTransport::always(json!({
        "data": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        "paging": {"next": format!("{NEXT_BASE}?limit=5&after=x")},
        "limit": "25"
    }));
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");

    assert_eq!(handle.collect_items().await.expect("items").len(), 10);
    assert!(handle.next_page().await.is_none());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn zero_envelope_limit_defers_to_the_link_limit() {
    let transport = ScriptedTransport::always(json!({
        "data": [1, 2],
        "paging": {"next": format!("{NEXT_BASE}?limit=5&after=x")},
        "limit": "0"
    }));
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");

    assert_eq!(handle.collect_items().await.expect("items"), vec![json!(1), json!(2)]);
    assert!(handle.next_page().await.is_none());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn unparseable_limit_pages_optimistically() {
    let transport = ScriptedTransport::new(|entry, _| match query_value(entry, "after") {
        None => ok(&json!({"data": [1], "paging": {"next": format!("{NEXT_BASE}?limit=lots&after=2")}})),
        Some(_) => ok(&json!({"data": []})),
    });
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");

    assert_eq!(handle.collect_items().await.expect("items"), vec![json!(1)]);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn bogus_links_are_ignored() {
    let transport = ScriptedTransport::always(json!({
        "data": [1, 2],
        "paging": {"next": "https://graph.facebook.com/server.php?id=1"}
    }));
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("1/insights", Params::new()).await.expect("deferred");

    assert_eq!(handle.collect_items().await.expect("items").len(), 2);
    assert!(handle.peek_next_page().is_none());
}

#[tokio::test]
async fn mapping_results_yield_keys_without_paging() {
    let transport = ScriptedTransport::always(json!({
        "data": {"a": 1, "b": 2},
        "paging": {"next": format!("{NEXT_BASE}?after=x")}
    }));
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/things", Params::new()).await.expect("deferred");
    let keys: Vec<Value> = handle.items().map(|item| item.expect("item")).collect().await;

    assert_eq!(keys, vec![json!("a"), json!("b")]);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn unexpected_page_shape_is_a_paging_failure() {
    let transport = ScriptedTransport::new(|entry, _| match query_value(entry, "after") {
        None => ok(&json!({"data": [1], "paging": {"next": format!("{NEXT_BASE}?after=2")}})),
        Some(_) => ok(&json!("surprise")),
    });
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");
    let items: Vec<_> = handle.items().collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Ok(json!(1)));
    assert!(matches!(items[1], Err(GraphError::Paging(_))));
    assert!(matches!(handle.peek_failure(), Some(GraphError::Paging(_))));
}

#[tokio::test]
async fn continuation_inherits_credentials_for_matching_token() {
    let transport = ScriptedTransport::new(friends);
    let registry = registry(GraphSettings::default(), &transport);
    let options = ClientOptions {
        app_secret: Some("sec".into()),
        ..ClientOptions::from_settings(registry.settings())
    };
    let client = GraphClient::with_options(Arc::clone(&registry), Some("tok".into()), Some("app".into()), options)
        .expect("client");

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");
    let next = handle.next_page().await.expect("next page");

    assert_eq!(
        next.credentials(),
        &Credentials { token: Some("tok".into()), app_secret: Some("sec".into()) }
    );
    assert!(!next.flags().summary_info);
    next.resolve().await.expect("resolved");
    let calls = transport.calls();
    let entry = &calls[1][0];
    assert_eq!(query_value(entry, "appsecret_proof"), Some("proof%28sec%2Ctok%29"));
}

#[tokio::test]
async fn continuation_drops_credentials_for_foreign_token() {
    let transport = ScriptedTransport::always(json!({
        "data": [1, 2],
        "paging": {"next": format!("{NEXT_BASE}?access_token=other&after=x")}
    }));
    let registry = registry(GraphSettings::default(), &transport);
    let options = ClientOptions {
        app_secret: Some("sec".into()),
        summary_info: true,
        ..ClientOptions::from_settings(registry.settings())
    };
    let client = GraphClient::with_options(Arc::clone(&registry), Some("tok".into()), Some("app".into()), options)
        .expect("client");

    let handle = client.get("me/friends", Params::new()).await.expect("deferred");
    let next = handle.next_page().await.expect("next page");

    assert_eq!(next.credentials(), &Credentials::default());
    assert!(handle.flags().summary_info);
    assert!(!next.flags().summary_info);
}

#[tokio::test]
async fn summary_total_count_wins_over_page_length() {
    let transport = ScriptedTransport::always(json!({
        "data": [1, 2],
        "summary": {"total_count": 40}
    }));
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let handle = client.get("1/likes", Params::new()).await.expect("deferred");

    assert_eq!(handle.total_count().await.expect("count"), 40);
}

#[tokio::test]
async fn prefetched_pages_of_different_lists_share_a_batch() {
    let transport = ScriptedTransport::new(|entry, _| match query_value(entry, "after") {
        None => ok(&json!({
            "data": [path_of(entry)],
            "paging": {"next": format!("https://graph.facebook.com/{}?after=2", path_of(entry))}
        })),
        Some(_) => ok(&json!({"data": []})),
    });
    let registry = registry(GraphSettings::default(), &transport);
    let client = client(&registry);

    let a = client.get("a/feed", Params::new()).await.expect("deferred");
    let b = client.get("b/feed", Params::new()).await.expect("deferred");

    assert_eq!(a.collect_items().await.expect("items"), vec![json!("a/feed")]);
    assert_eq!(b.collect_items().await.expect("items"), vec![json!("b/feed")]);

    let sizes: Vec<usize> = transport.calls().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2]);
}
