//! Integration tests for the IMAP client.
//!
//! A scripted mock stream plays the server and checks every byte the
//! client writes.

#![allow(clippy::unwrap_used)]

use popgate_imap::{
    Client, Error, FetchAttribute, FetchItem, Flag, SearchCriteria, SeqNum, StatusAttribute,
    StatusItem, StoreAction, Uid,
};
use tokio_test::io::Builder;

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n";

fn seq(n: u32) -> SeqNum {
    SeqNum::new(n).unwrap()
}

#[tokio::test]
async fn test_login_and_logout() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN bcd123 secret\r\n")
        .read(b"A0000 OK [CAPABILITY IMAP4rev1 MOVE] Logged in\r\n")
        .write(b"A0001 LOGOUT\r\n")
        .read(b"* BYE Logging out\r\nA0001 OK Logout completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    assert_eq!(client.capabilities().len(), 2);
    let client = client.login("bcd123", "secret").await.unwrap();
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_rejected() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN bcd123 wrong\r\n")
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n")
        .write(b"A0001 LOGOUT\r\n")
        .read(b"* BYE\r\nA0001 OK\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let (client, err) = client.login("bcd123", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::No(text) if text == "Authentication failed."));
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_with_literal_password() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN bcd123 {5}\r\n")
        .read(b"+ Ready for literal data\r\n")
        .write(b"p\xc3\xa4ss\r\n")
        .read(b"A0000 OK Logged in\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    client.login("bcd123", "p\u{e4}ss").await.unwrap();
}

#[tokio::test]
async fn test_failed_select_keeps_connection() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 SELECT INBOX/gone\r\n")
        .read(b"A0001 NO [NONEXISTENT] Unknown mailbox\r\n")
        .write(b"A0002 CREATE INBOX/gone\r\n")
        .read(b"A0002 OK\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, err) = client.select("INBOX/gone").await.unwrap_err();
    assert!(matches!(err, Error::No(_)));
    client.create("INBOX/gone").await.unwrap();
}

#[tokio::test]
async fn test_bye_greeting() {
    let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
}

#[tokio::test]
async fn test_status_create_subscribe() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 STATUS INBOX/work (MESSAGES)\r\n")
        .read(b"A0001 NO [NONEXISTENT] Mailbox doesn't exist\r\n")
        .write(b"A0002 CREATE INBOX/work\r\n")
        .read(b"A0002 OK Create completed\r\n")
        .write(b"A0003 SUBSCRIBE INBOX/work\r\n")
        .read(b"A0003 OK Subscribe completed\r\n")
        .write(b"A0004 STATUS INBOX/work (MESSAGES)\r\n")
        .read(b"* STATUS INBOX/work (MESSAGES 0)\r\nA0004 OK\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("u", "p").await.unwrap();

    let missing = client
        .status("INBOX/work", &[StatusAttribute::Messages])
        .await;
    assert!(matches!(missing, Err(Error::No(_))));

    client.create("INBOX/work").await.unwrap();
    client.subscribe("INBOX/work").await.unwrap();
    let items = client
        .status("INBOX/work", &[StatusAttribute::Messages])
        .await
        .unwrap();
    assert_eq!(items, vec![StatusItem::Messages(0)]);
}

#[tokio::test]
async fn test_select_search_fetch() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
        .read(b"* 3 EXISTS\r\n* 0 RECENT\r\n")
        .read(b"* OK [UIDVALIDITY 1700000000] UIDs valid\r\n")
        .read(b"A0001 OK [READ-WRITE] Select completed\r\n")
        .write(b"A0002 SEARCH (HEADER TO \"alice@example.org\")\r\n")
        .read(b"* SEARCH 1 3\r\nA0002 OK Search completed\r\n")
        .write(b"A0003 FETCH 3 (UID RFC822.SIZE)\r\n")
        .read(b"* 3 FETCH (UID 88 RFC822.SIZE 1024)\r\n")
        .read(b"* 1 FETCH (FLAGS (\\Seen))\r\n")
        .read(b"A0003 OK Fetch completed\r\n")
        .write(b"A0004 FETCH 1 RFC822\r\n")
        .read(b"* 1 FETCH (RFC822 {7}\r\nabc\r\n\r\n)\r\nA0004 OK\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, status) = client.select("INBOX").await.unwrap();
    assert_eq!(status.exists, 3);
    assert_eq!(status.flags.len(), 5);
    assert_eq!(client.mailbox(), "INBOX");

    let hits = client
        .search(&SearchCriteria::Header(
            "TO".into(),
            "alice@example.org".into(),
        ))
        .await
        .unwrap();
    assert_eq!(hits, vec![seq(1), seq(3)]);

    let items = client
        .fetch(seq(3), &[FetchAttribute::Uid, FetchAttribute::Rfc822Size])
        .await
        .unwrap();
    assert_eq!(
        items,
        vec![
            FetchItem::Uid(Uid::new(88).unwrap()),
            FetchItem::Rfc822Size(1024)
        ]
    );

    let items = client.fetch(seq(1), &[FetchAttribute::Rfc822]).await.unwrap();
    assert_eq!(
        items,
        vec![FetchItem::Body {
            section: None,
            data: Some(b"abc\r\n\r\n".to_vec()),
        }]
    );
}

#[tokio::test]
async fn test_fetch_missing_message_is_empty() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 SELECT INBOX/work\r\n")
        .read(b"* 2 EXISTS\r\nA0001 OK\r\n")
        .write(b"A0002 FETCH 42 RFC822.SIZE\r\n")
        .read(b"A0002 OK Fetch completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, _) = client.select("INBOX/work").await.unwrap();
    let items = client
        .fetch(seq(42), &[FetchAttribute::Rfc822Size])
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_copy_flag_and_expunge() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 4 EXISTS\r\nA0001 OK\r\n")
        .write(b"A0002 FETCH 2 BODY.PEEK[HEADER.FIELDS (FROM TO CC)]\r\n")
        .read(b"* 2 FETCH (BODY[HEADER.FIELDS (FROM TO CC)] {21}\r\nTo: bob@example.com\r\n)\r\n")
        .read(b"A0002 OK\r\n")
        .write(b"A0003 COPY 2 INBOX/work\r\n")
        .read(b"A0003 OK Copy completed\r\n")
        .write(b"A0004 STORE 2 +FLAGS.SILENT (\\Deleted)\r\n")
        .read(b"A0004 OK Store completed\r\n")
        .write(b"A0005 EXPUNGE\r\n")
        .read(b"* 2 EXPUNGE\r\nA0005 OK Expunge completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();

    let items = client
        .fetch(
            seq(2),
            &[FetchAttribute::HeaderFields(vec![
                "FROM".into(),
                "TO".into(),
                "CC".into(),
            ])],
        )
        .await
        .unwrap();
    assert!(matches!(
        &items[..],
        [FetchItem::Body { data: Some(d), .. }] if d.starts_with(b"To: bob@example.com")
    ));

    client.copy(seq(2), "INBOX/work").await.unwrap();
    client
        .store_silent(seq(2), StoreAction::Add(vec![Flag::Deleted]))
        .await
        .unwrap();
    assert_eq!(client.expunge().await.unwrap(), vec![seq(2)]);
}

#[tokio::test]
async fn test_bye_during_command() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 NOOP\r\n")
        .read(b"* BYE shutting down\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("u", "p").await.unwrap();
    assert!(matches!(client.noop().await, Err(Error::Bye(_))));
}

#[tokio::test]
async fn test_search_term_with_line_break_is_sent_as_literal() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0001 OK\r\n")
        .write(b"A0002 SEARCH (HEADER TO {20}\r\n")
        .read(b"+ Ready for literal data\r\n")
        .write(b"x\")\r\nA9999 EXPUNGE\r\n)\r\n")
        .read(b"* SEARCH\r\nA0002 OK Search completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();
    let hits = client
        .search(&SearchCriteria::Header(
            "TO".into(),
            "x\")\r\nA9999 EXPUNGE\r\n".into(),
        ))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_search_literal_refused() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN u p\r\n")
        .read(b"A0000 OK\r\n")
        .write(b"A0001 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0001 OK\r\n")
        .write(b"A0002 SEARCH CHARSET UTF-8 (HEADER TO {19}\r\n")
        .read(b"A0002 NO [BADCHARSET] Unsupported charset\r\n")
        .write(b"A0003 NOOP\r\n")
        .read(b"A0003 OK\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();
    let err = client
        .search(&SearchCriteria::Header(
            "TO".into(),
            "m\u{fc}ller@example.org".into(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::No(_)));
    client.noop().await.unwrap();
}
