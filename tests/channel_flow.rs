//! JOIN/NAMES/PRIVMSG flows over the wire.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};

#[tokio::test]
async fn join_echo_names_and_creator_op() {
    let server = TestServer::spawn(17611, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    alice.register().await.unwrap();

    alice.send("JOIN #test").await.unwrap();
    let join = alice
        .wait_for(Duration::from_secs(5), |line| line.contains("JOIN"))
        .await
        .unwrap();
    assert!(join.starts_with(":alice!alice@"));
    assert!(join.ends_with("#test"));

    let names = alice.expect_numeric("353").await.unwrap();
    assert!(names.contains("= #test"));
    assert!(names.ends_with("@alice"));
    let end = alice.expect_numeric("366").await.unwrap();
    assert!(end.contains("End of /NAMES list"));
}

#[tokio::test]
async fn join_is_broadcast_to_existing_members() {
    let server = TestServer::spawn(17612, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    bob.register().await.unwrap();

    alice.send("JOIN #test").await.unwrap();
    alice.drain().await;
    bob.send("JOIN #test").await.unwrap();

    let seen = alice
        .wait_for(Duration::from_secs(5), |line| line.contains("JOIN"))
        .await
        .unwrap();
    assert!(seen.starts_with(":bob!bob@"));

    // bob's NAMES shows both, with alice opped as creator.
    let names = bob.expect_numeric("353").await.unwrap();
    assert!(names.contains("@alice"));
    assert!(names.contains("bob"));
}

#[tokio::test]
async fn comma_list_join_runs_each_channel_independently() {
    let server = TestServer::spawn(17613, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    alice.register().await.unwrap();

    alice.send("JOIN #a,#b,#c key1,,key3").await.unwrap();
    for expected in ["#a", "#b", "#c"] {
        let join = alice
            .wait_for(Duration::from_secs(5), |line| {
                line.contains("JOIN") && line.contains(expected)
            })
            .await
            .unwrap();
        assert!(join.starts_with(":alice!alice@"));
        alice
            .wait_for(Duration::from_secs(5), |line| {
                line.contains(" 366 ") && line.contains(expected)
            })
            .await
            .unwrap();
    }

    // Duplicate tokens are skipped: one echo, not two.
    alice.send("JOIN #dup,#DUP").await.unwrap();
    alice
        .wait_for(Duration::from_secs(5), |line| {
            line.contains("JOIN") && line.contains("#dup")
        })
        .await
        .unwrap();
    let extra = alice.recv_timeout(Duration::from_millis(300)).await;
    if let Ok(line) = extra {
        assert!(!line.contains("JOIN"), "folded duplicate must not re-join");
    }
}

#[tokio::test]
async fn privmsg_fans_out_to_members_only() {
    let server = TestServer::spawn(17614, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    let mut carol = TestClient::connect(&server.address(), "carol")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    carol.register().await.unwrap();

    alice.send("JOIN #chat").await.unwrap();
    bob.send("JOIN #chat").await.unwrap();
    alice.drain().await;
    bob.drain().await;
    carol.drain().await;

    alice.send("PRIVMSG #chat :hello everyone").await.unwrap();
    let msg = bob
        .wait_for(Duration::from_secs(5), |line| line.contains("PRIVMSG"))
        .await
        .unwrap();
    assert_eq!(msg, ":alice!alice@127.0.0.1 PRIVMSG #chat :hello everyone");

    // carol is not on #chat and hears nothing.
    let silence = carol.recv_timeout(Duration::from_millis(300)).await;
    assert!(silence.is_err());
}

#[tokio::test]
async fn away_user_answers_direct_messages_with_301() {
    let server = TestServer::spawn(17615, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    bob.register().await.unwrap();

    bob.send("AWAY :gone fishing").await.unwrap();
    bob.expect_numeric("306").await.unwrap();

    alice.send("PRIVMSG bob :you there?").await.unwrap();
    let away = alice.expect_numeric("301").await.unwrap();
    assert!(away.ends_with(":gone fishing"));
    let delivered = bob
        .wait_for(Duration::from_secs(5), |line| line.contains("PRIVMSG"))
        .await
        .unwrap();
    assert!(delivered.contains(":you there?"));
}
