//! Registration, nick collisions, and session teardown over the wire.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};

#[tokio::test]
async fn registration_burst_in_order() {
    let server = TestServer::spawn(17601, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");

    alice.send("NICK alice").await.unwrap();
    alice.send("USER a 0 * :Alice").await.unwrap();

    let welcome = alice.expect_numeric("001").await.unwrap();
    assert!(welcome.starts_with(":irc.test.example 001 alice "));
    assert!(welcome.contains("Welcome to the TestNet Network, alice"));

    // 002..005 follow, with the advertised ISUPPORT tokens.
    alice.expect_numeric("002").await.unwrap();
    alice.expect_numeric("003").await.unwrap();
    alice.expect_numeric("004").await.unwrap();
    let isupport = alice.expect_numeric("005").await.unwrap();
    assert!(isupport.contains("NETWORK=TestNet"));
    assert!(isupport.contains("CASEMAPPING=rfc1459"));
    assert!(isupport.contains("PREFIX=(qaohv)~&@%+"));

    // MOTD bracketed by 375/376.
    alice.expect_numeric("375").await.unwrap();
    let motd = alice.expect_numeric("372").await.unwrap();
    assert!(motd.contains("Welcome to the test network"));
    alice.expect_numeric("376").await.unwrap();
}

#[tokio::test]
async fn commands_rejected_before_registration() {
    let server = TestServer::spawn(17602, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");

    alice.send("JOIN #test").await.unwrap();
    let reply = alice.expect_numeric("451").await.unwrap();
    assert!(reply.contains("not registered"));
}

#[tokio::test]
async fn nick_collision_rejected_and_original_kept() {
    let server = TestServer::spawn(17603, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    bob.register().await.unwrap();

    bob.send("NICK alice").await.unwrap();
    let reply = bob.expect_numeric("433").await.unwrap();
    assert!(reply.contains("alice"));
    assert!(reply.contains("already in use"));

    // bob's nick is unchanged: a later command still addresses him as bob.
    bob.send("MODE bob").await.unwrap();
    bob.expect_numeric("221").await.unwrap();
}

#[tokio::test]
async fn quit_broadcasts_once_to_shared_channels() {
    let server = TestServer::spawn(17604, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    bob.register().await.unwrap();

    // Two shared channels; the QUIT must still arrive exactly once.
    alice.send("JOIN #one").await.unwrap();
    alice.send("JOIN #two").await.unwrap();
    bob.send("JOIN #one").await.unwrap();
    bob.send("JOIN #two").await.unwrap();
    alice.drain().await;
    bob.drain().await;

    bob.send("QUIT :off to bed").await.unwrap();
    let quit = alice
        .wait_for(Duration::from_secs(5), |line| line.contains("QUIT"))
        .await
        .unwrap();
    assert!(quit.starts_with(":bob!bob@"));
    assert!(quit.contains("off to bed"));

    // No duplicate from the second shared channel.
    let extra = alice.recv_timeout(Duration::from_millis(300)).await;
    assert!(
        extra.is_err() || !extra.unwrap().contains("QUIT"),
        "QUIT fan-out must deduplicate recipients"
    );
}

#[tokio::test]
async fn nick_change_is_seen_by_channel_neighbors() {
    let server = TestServer::spawn(17605, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    let mut bob = TestClient::connect(&server.address(), "bob")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    alice.send("JOIN #test").await.unwrap();
    bob.send("JOIN #test").await.unwrap();
    alice.drain().await;
    bob.drain().await;

    bob.send("NICK robert").await.unwrap();
    let change = alice
        .wait_for(Duration::from_secs(5), |line| line.contains("NICK"))
        .await
        .unwrap();
    assert!(change.starts_with(":bob!bob@"));
    assert!(change.ends_with("robert"));
}

#[tokio::test]
async fn unknown_command_yields_421() {
    let server = TestServer::spawn(17606, "").await.expect("spawn");
    let mut alice = TestClient::connect(&server.address(), "alice")
        .await
        .expect("connect");
    alice.register().await.unwrap();
    alice.send("FLORP a b c").await.unwrap();
    let reply = alice.expect_numeric("421").await.unwrap();
    assert!(reply.contains("FLORP"));
}
