//! Query client against scripted loopback UDP servers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use srvwarden_query::{ParseError, QueryClient, QueryError};
use tokio::net::UdpSocket;

const TOKEN: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

type Log = Arc<Mutex<Vec<Vec<u8>>>>;

/// Bind a server that records every datagram and answers with `respond`.
async fn spawn_server<F>(respond: F) -> (String, Log)
where
    F: Fn(usize, &[u8]) -> Vec<Vec<u8>> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap().to_string();
    let log: Log = Arc::default();
    let seen = Arc::clone(&log);

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let request = buf[..len].to_vec();
            let index = {
                let mut seen = seen.lock().unwrap();
                seen.push(request.clone());
                seen.len() - 1
            };
            for reply in respond(index, &request) {
                let _ = socket.send_to(&reply, peer).await;
            }
        }
    });

    (addr, log)
}

fn client() -> QueryClient {
    QueryClient {
        timeout: Duration::from_millis(200),
        attempts: 2,
    }
}

fn simple(body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xFF, 0xFF, 0xFF];
    out.extend_from_slice(body);
    out
}

fn challenge() -> Vec<u8> {
    let mut body = vec![0x41];
    body.extend_from_slice(&TOKEN);
    simple(&body)
}

fn players_body() -> Vec<u8> {
    let mut body = vec![0x44, 1, 0];
    body.extend_from_slice(b"Alice\0");
    body.extend_from_slice(&42i32.to_le_bytes());
    body.extend_from_slice(&90.0f32.to_le_bytes());
    body
}

fn rules_body(pairs: &[&str]) -> Vec<u8> {
    let mut body = vec![0x45];
    body.extend_from_slice(&((pairs.len() / 2) as u16).to_le_bytes());
    for s in pairs {
        body.extend_from_slice(s.as_bytes());
        body.push(0);
    }
    body
}

fn info_body() -> Vec<u8> {
    let mut body = vec![0x49, 17];
    for s in ["Island", "TheIsland", "ark", "ARK"] {
        body.extend_from_slice(s.as_bytes());
        body.push(0);
    }
    body.extend_from_slice(&[0, 0, 3, 70, 0, b'd', b'w', 0, 0]);
    body.extend_from_slice(b"1.0\0");
    body
}

#[tokio::test]
async fn player_challenge_sends_one_follow_up_with_token() {
    let (addr, log) = spawn_server(|_, request| {
        if request[5..] == [0xFF; 4] {
            vec![challenge()]
        } else {
            vec![simple(&players_body())]
        }
    })
    .await;

    let players = client().players(&addr).await.unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].name, "Alice");
    assert_eq!(players[0].score, 42);
    assert_eq!(players[0].duration, "00:01:30");

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], vec![0xFF, 0xFF, 0xFF, 0xFF, 0x55, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(log[1], vec![0xFF, 0xFF, 0xFF, 0xFF, 0x55, 0xDE, 0xAD, 0xBE, 0xEF]);
}

#[tokio::test]
async fn info_challenge_appends_token() {
    let (addr, log) = spawn_server(|index, _| {
        if index == 0 {
            vec![challenge()]
        } else {
            vec![simple(&info_body())]
        }
    })
    .await;

    let info = client().info(&addr).await.unwrap();
    assert_eq!(info.name, "Island");
    assert_eq!(info.players, 3);
    assert_eq!(info.environment, 'w');

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[1].ends_with(b"Source Engine Query\0\xDE\xAD\xBE\xEF"));
}

#[tokio::test]
async fn repeated_challenge_is_parse_error() {
    let (addr, log) = spawn_server(|_, _| vec![challenge()]).await;

    let err = client().rules(&addr).await.unwrap_err();
    assert!(matches!(
        err,
        QueryError::Parse {
            source: ParseError::RepeatedChallenge,
            ..
        }
    ));
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn lost_reply_is_retried_once() {
    let (addr, log) = spawn_server(|index, _| {
        if index == 0 {
            Vec::new()
        } else {
            vec![simple(&rules_body(&["k", "v"]))]
        }
    })
    .await;

    let rules = client().rules(&addr).await.unwrap();
    assert_eq!(rules["k"], "v");
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn silent_server_is_no_response_after_two_sends() {
    let (addr, log) = spawn_server(|_, _| Vec::new()).await;

    let err = client().info(&addr).await.unwrap_err();
    assert!(matches!(err, QueryError::NoResponse { .. }));
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn split_response_is_reassembled() {
    let whole = simple(&rules_body(&["first", "1", "second", "2"]));
    let (head, tail) = whole.split_at(whole.len() / 2);
    let fragments: Vec<Vec<u8>> = [(1u8, tail), (0u8, head)]
        .iter()
        .map(|(number, part)| {
            let mut f = vec![0xFE, 0xFF, 0xFF, 0xFF];
            f.extend_from_slice(&77i32.to_le_bytes());
            f.push(2);
            f.push(*number);
            f.extend_from_slice(&1248u16.to_le_bytes());
            f.extend_from_slice(part);
            f
        })
        .collect();

    let (addr, _log) = spawn_server(move |_, _| fragments.clone()).await;

    let rules = client().rules(&addr).await.unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules["second"], "2");
}

#[tokio::test]
async fn snapshot_combines_all_three() {
    let (addr, _log) = spawn_server(|_, request| match request[4] {
        0x54 => vec![simple(&info_body())],
        0x55 => vec![simple(&players_body())],
        _ => vec![simple(&rules_body(&["a", "b"]))],
    })
    .await;

    let snapshot = client().snapshot(&addr).await.unwrap();
    assert_eq!(snapshot.info.map, "TheIsland");
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.rules["a"], "b");
}
