//! Mode access control, bans, kicks, and topics over the wire.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};

#[tokio::test]
async fn non_op_cannot_unset_key_and_key_stays() {
    let server = TestServer::spawn(17621, "").await.expect("spawn");
    let mut op = TestClient::connect(&server.address(), "op")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    op.register().await.unwrap();
    bob.register().await.unwrap();

    op.send("JOIN #test").await.unwrap();
    bob.send("JOIN #test").await.unwrap();
    op.drain().await;
    bob.drain().await;

    op.send("MODE #test +k secret").await.unwrap();
    let change = bob
        .wait_for(Duration::from_secs(5), |line| line.contains("MODE"))
        .await
        .unwrap();
    assert!(change.contains("+k"));

    bob.send("MODE #test -k wrong").await.unwrap();
    let denied = bob.expect_numeric("482").await.unwrap();
    assert!(denied.contains("not a channel operator"));

    // The key still gates joins: a newcomer needs the original value.
    let mut carol = TestClient::connect(&server.address(), "carol")
        .await
        .expect("connect");
    carol.register().await.unwrap();
    carol.send("JOIN #test wrong").await.unwrap();
    carol.expect_numeric("475").await.unwrap();
    carol.send("JOIN #test secret").await.unwrap();
    carol
        .wait_for(Duration::from_secs(5), |line| line.contains("JOIN"))
        .await
        .unwrap();
}

#[tokio::test]
async fn ban_then_kick_then_rejoin_blocked() {
    let server = TestServer::spawn(17622, "").await.expect("spawn");
    let mut op = TestClient::connect(&server.address(), "op")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    op.register().await.unwrap();
    bob.register().await.unwrap();

    op.send("JOIN #test").await.unwrap();
    bob.send("JOIN #test").await.unwrap();
    op.drain().await;
    bob.drain().await;

    op.send("MODE #test +b *!*@127.0.0.1").await.unwrap();
    bob.wait_for(Duration::from_secs(5), |line| {
        eprintln!("DEBUG bob line: {line:?}");
        line.contains("MODE")
    })
    .await
    .unwrap();

    op.send("KICK #test bob :go").await.unwrap();
    let kick = bob
        .wait_for(Duration::from_secs(5), |line| line.contains("KICK"))
        .await
        .unwrap();
    assert!(kick.starts_with(":op!op@"));
    assert!(kick.contains("#test bob"));
    assert!(kick.ends_with(":go") || kick.ends_with("go"));

    bob.send("JOIN #test").await.unwrap();
    let denied = bob.expect_numeric("474").await.unwrap();
    assert!(denied.contains("you're banned"));
}

#[tokio::test]
async fn mode_query_reports_modes_and_creation_time() {
    let server = TestServer::spawn(17623, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    alice.send("JOIN #test").await.unwrap();
    alice.drain().await;

    alice.send("MODE #test +mn").await.unwrap();
    alice
        .wait_for(Duration::from_secs(5), |line| line.contains("MODE"))
        .await
        .unwrap();

    alice.send("MODE #test").await.unwrap();
    let modes = alice.expect_numeric("324").await.unwrap();
    assert!(modes.contains('m'));
    assert!(modes.contains('n'));
    alice.expect_numeric("329").await.unwrap();
}

#[tokio::test]
async fn banlist_query_lists_masks() {
    let server = TestServer::spawn(17624, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    alice.send("JOIN #test").await.unwrap();
    alice.drain().await;

    alice.send("MODE #test +b *!*@badhost").await.unwrap();
    alice.drain().await;
    alice.send("MODE #test b").await.unwrap();
    let entry = alice.expect_numeric("367").await.unwrap();
    assert!(entry.contains("*!*@badhost"));
    alice.expect_numeric("368").await.unwrap();
}

#[tokio::test]
async fn topic_protected_by_plus_t() {
    let server = TestServer::spawn(17625, "").await.expect("spawn");
    let mut op = TestClient::connect(&server.address(), "op")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    op.register().await.unwrap();
    bob.register().await.unwrap();

    op.send("JOIN #test").await.unwrap();
    bob.send("JOIN #test").await.unwrap();
    op.drain().await;
    bob.drain().await;

    op.send("MODE #test +t").await.unwrap();
    op.drain().await;
    bob.drain().await;

    bob.send("TOPIC #test :bob was here").await.unwrap();
    bob.expect_numeric("482").await.unwrap();

    op.send("TOPIC #test :council business only").await.unwrap();
    let topic = bob
        .wait_for(Duration::from_secs(5), |line| line.contains("TOPIC"))
        .await
        .unwrap();
    assert!(topic.ends_with(":council business only"));

    // Late joiner sees 332/333 during the join burst.
    let mut carol = TestClient::connect(&server.address(), "carol")
        .await
        .expect("connect");
    carol.register().await.unwrap();
    carol.send("JOIN #test").await.unwrap();
    let t332 = carol.expect_numeric("332").await.unwrap();
    assert!(t332.ends_with(":council business only"));
    carol.expect_numeric("333").await.unwrap();
}

#[tokio::test]
async fn moderated_channel_blocks_unvoiced_senders() {
    let server = TestServer::spawn(17626, "").await.expect("spawn");
    let mut op = TestClient::connect(&server.address(), "op")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    op.register().await.unwrap();
    bob.register().await.unwrap();

    op.send("JOIN #test").await.unwrap();
    bob.send("JOIN #test").await.unwrap();
    op.drain().await;
    bob.drain().await;

    op.send("MODE #test +m").await.unwrap();
    op.drain().await;
    bob.drain().await;

    bob.send("PRIVMSG #test :muted?").await.unwrap();
    bob.expect_numeric("404").await.unwrap();

    op.send("MODE #test +v bob").await.unwrap();
    bob.wait_for(Duration::from_secs(5), |line| line.contains("+v"))
        .await
        .unwrap();
    bob.send("PRIVMSG #test :can talk now").await.unwrap();
    let msg = op
        .wait_for(Duration::from_secs(5), |line| line.contains("PRIVMSG"))
        .await
        .unwrap();
    assert!(msg.contains("can talk now"));
}

#[tokio::test]
async fn user_limit_boundary() {
    let server = TestServer::spawn(17627, "").await.expect("spawn");
    let mut op = TestClient::connect(&server.address(), "op")
        .await
        .expect("connect");
    op.register().await.unwrap();
    op.send("JOIN #test").await.unwrap();
    op.drain().await;
    op.send("MODE #test +l 2").await.unwrap();
    op.drain().await;

    // count == 1 < 2: admitted.
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    bob.register().await.unwrap();
    bob.send("JOIN #test").await.unwrap();
    bob.wait_for(Duration::from_secs(5), |line| line.contains("JOIN"))
        .await
        .unwrap();

    // count == 2 == limit: refused.
    let mut carol = TestClient::connect(&server.address(), "carol")
        .await
        .expect("connect");
    carol.register().await.unwrap();
    carol.send("JOIN #test").await.unwrap();
    carol.expect_numeric("471").await.unwrap();
}
