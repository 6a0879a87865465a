use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use calindex::client::IndexerClient;
use calindex::config::Config;
use calindex::day_slots::DaySlotIndexer;
use calindex::protocol::Response;
use calindex::scene::MonthScene;
use calindex::worker;

// ── Test infrastructure ──────────────────────────────────────

fn to_json(response: &Response) -> Value {
    serde_json::to_value(response).unwrap()
}

fn reservation(key: &str, start: &str) -> Value {
    json!({
        "entryKey": key,
        "id": key,
        "startTime": start,
        "instructorId": 3,
        "userId": "s1",
    })
}

async fn recv(rx: &mut mpsc::Receiver<Response>) -> Response {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("response timed out")
        .expect("response channel closed")
}

// ── Month scene over the wire ────────────────────────────────

#[tokio::test]
async fn month_reset_patch_and_mismatch() {
    let client = IndexerClient::spawn(&Config::default());

    let reset = assert_ok!(
        client
            .reset_month(json!({
                "monthKey": "2025-03",
                "studentsById": { "s1": { "firstName": "Ana", "lastName": "Pop", "phone": "0722 000 111" } },
                "reservations": [reservation("e1", "2025-03-10T09:00"), reservation("e2", "2025-03-12T11:30")],
            }))
            .await
    );
    let reset = to_json(&reset);
    assert_eq!(reset["type"], "month-index-result");
    assert_eq!(reset["monthKey"], "2025-03");
    assert_eq!(reset["eventsCount"], 2);
    assert_eq!(reset["dayEntries"][0][1][0]["studentName"], "Ana Pop");
    assert_eq!(reset["searchCatalog"][0]["searchPhoneDigits"], "0722000111");

    let mismatch = assert_ok!(
        client
            .patch_month(json!({ "monthKey": "2025-04", "removals": ["e1"] }))
            .await
    );
    let mismatch = to_json(&mismatch);
    assert_eq!(mismatch["type"], "month-index-error");
    assert!(mismatch["error"].as_str().unwrap().contains("2025-04"));

    let patched = assert_ok!(
        client
            .patch_month(json!({ "monthKey": "2025-03", "removals": ["e1"] }))
            .await
    );
    let patched = to_json(&patched);
    assert_eq!(patched["eventsCount"], 1);
    assert_eq!(patched["eventIdToDayEntries"][0][0], "e2");
}

#[tokio::test]
async fn patch_before_reset_reports_error() {
    let client = IndexerClient::spawn(&Config::default());
    let response = assert_ok!(client.patch_month(json!({ "monthKey": "2025-03" })).await);
    assert!(response.is_error());
    assert!(response.error().unwrap().contains("not initialized"));

    // The unit keeps serving after a failed request.
    let response = assert_ok!(client.reset_month(json!({ "monthKey": "2025-03" })).await);
    assert!(!response.is_error());
}

#[tokio::test]
async fn index_month_alias_resets() {
    let client = IndexerClient::spawn(&Config::default());
    let response = assert_ok!(
        client
            .request(
                "index-month",
                json!({ "monthKey": "2025-05", "reservations": [reservation("x", "2025-05-02T08:00")] }),
            )
            .await
    );
    assert_eq!(to_json(&response)["eventsCount"], 1);
}

// ── Day slots over the wire ──────────────────────────────────

#[tokio::test]
async fn day_index_round_trip() {
    let client = IndexerClient::spawn(&Config::default());
    let response = assert_ok!(
        client
            .index_day(json!({
                "selectedYmd": "2025-03-10",
                "instructorIds": [3],
                "userNameById": { "s1": "Ana Pop" },
                "reservations": [
                    { "id": "A", "instructorId": 3, "userId": "s1", "startTime": "2025-03-10T09:00", "endTime": "2025-03-10T10:30" },
                    { "id": "B", "instructorId": 3, "startTime": "2025-03-10T09:15", "endTime": "2025-03-10T10:00" },
                    { "id": "C", "instructorId": 3, "startTime": "nonsense" },
                ],
            }))
            .await
    );
    let v = to_json(&response);
    assert_eq!(v["type"], "index-result");
    assert_eq!(v["eventsCount"], 1);
    assert_eq!(v["starts"][0]["key"], "3|18");
    assert_eq!(v["starts"][0]["title"], "Ana Pop");
    assert_eq!(v["covered"], json!(["3|19", "3|20"]));
    assert!(v["buildMs"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn mistyped_payload_fields_fall_back_to_defaults() {
    let client = IndexerClient::spawn(&Config::default());
    let response = assert_ok!(
        client
            .index_day(json!({
                "selectedYmd": "2025-03-10",
                "instructorIds": [3],
                "slotCount": "28",
                "stepMin": { "minutes": 30 },
                "userNameById": [],
                "reservations": [
                    { "id": "A", "instructorId": 3, "startTime": "2025-03-10T09:00" },
                ],
            }))
            .await
    );
    let v = to_json(&response);
    assert_eq!(v["type"], "index-result");
    assert_eq!(v["starts"][0]["key"], "3|18");
    assert_eq!(v["starts"][0]["spanSlots"], 3);
    assert_eq!(v["starts"][0]["title"], "Programare");
}

#[tokio::test]
async fn out_of_range_start_does_not_break_the_month() {
    let client = IndexerClient::spawn(&Config::default());
    let reset = assert_ok!(
        client
            .reset_month(json!({
                "monthKey": "2025-03",
                "reservations": [
                    { "entryKey": "big", "startTime": 9_223_372_036_854_775_000i64 },
                    reservation("e1", "2025-03-10T09:00"),
                ],
            }))
            .await
    );
    assert!(!reset.is_error());
    assert_eq!(to_json(&reset)["eventsCount"], 1);

    let patched = assert_ok!(
        client
            .patch_month(json!({ "monthKey": "2025-03", "upserts": [reservation("e2", "2025-03-11T09:00")] }))
            .await
    );
    assert!(!patched.is_error());
    assert_eq!(to_json(&patched)["eventsCount"], 2);
}

#[tokio::test]
async fn non_object_payload_gets_error_for_its_request() {
    let client = IndexerClient::spawn(&Config::default());
    let response = assert_ok!(client.index_day(json!("none")).await);
    let v = to_json(&response);
    assert_eq!(v["type"], "index-error");
    assert!(v["error"].as_str().unwrap().starts_with("invalid index payload"));
}

#[tokio::test]
async fn unknown_type_never_reaches_a_unit() {
    let client = IndexerClient::spawn(&Config::default());
    assert_err!(client.request("render", json!({})).await);
}

#[tokio::test]
async fn generous_deadline_is_met() {
    let client = IndexerClient::spawn(&Config::default());
    let response = client
        .request_within("index", json!({}), Duration::from_secs(5))
        .await;
    assert_ok!(response);
    assert_eq!(client.pending_count(), 0);
}

// ── Raw units ────────────────────────────────────────────────

#[tokio::test]
async fn units_ignore_foreign_and_untyped_envelopes() {
    let (tx, mut rx) = mpsc::channel(16);
    let day = worker::spawn(DaySlotIndexer::default(), 16, tx.clone());
    let month = worker::spawn(MonthScene::from_config(&Config::default()), 16, tx);

    day.send(json!({ "requestId": "no-type" })).await.unwrap();
    day.send(json!({ "type": "index-month-reset", "requestId": "wrong-unit" })).await.unwrap();
    month.send(json!({ "type": "index", "requestId": "wrong-unit" })).await.unwrap();
    month.send(json!(42)).await.unwrap();
    day.send(json!({ "type": "index", "requestId": 7 })).await.unwrap();

    let response = recv(&mut rx).await;
    assert_eq!(response.request_id(), &json!(7));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn month_requests_are_serialized_in_arrival_order() {
    let (tx, mut rx) = mpsc::channel(16);
    let month = worker::spawn(MonthScene::from_config(&Config::default()), 16, tx);

    month
        .send(json!({
            "type": "index-month-reset",
            "requestId": 1,
            "payload": { "monthKey": "2025-03", "reservations": [reservation("e1", "2025-03-10T09:00")] },
        }))
        .await
        .unwrap();
    for (id, key) in [(2, "e2"), (3, "e3")] {
        month
            .send(json!({
                "type": "index-month-patch",
                "requestId": id,
                "payload": { "monthKey": "2025-03", "upserts": [reservation(key, "2025-03-11T09:00")] },
            }))
            .await
            .unwrap();
    }

    let mut counts = Vec::new();
    for expected in 1..=3 {
        let response = recv(&mut rx).await;
        assert_eq!(response.request_id(), &json!(expected));
        counts.push(to_json(&response)["eventsCount"].as_u64().unwrap());
    }
    assert_eq!(counts, vec![1, 2, 3]);
}
