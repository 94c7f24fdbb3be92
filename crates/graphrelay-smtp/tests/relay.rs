//! Relay behaviour against a scripted local SMTP listener.

use base64::Engine;
use graphrelay_smtp::{SmtpConfig, SmtpError, SmtpRelay, SmtpSecurity};
use mail_parser::{MessageParser, MimeHeaders};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the listener saw during one SMTP session
#[derive(Debug, Default)]
struct Session {
    mail_from: String,
    rcpt_to: Vec<String>,
    data: Vec<u8>,
}

/// Accept `connections` sessions; RCPT TO addresses containing `reject` get a 550
async fn spawn_server(
    connections: usize,
    reject: Option<&'static str>,
) -> (u16, JoinHandle<Vec<Session>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut sessions = Vec::new();
        for _ in 0..connections {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut session = Session::default();

            write.write_all(b"220 localhost ESMTP test\r\n").await.unwrap();

            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let upper = line.to_ascii_uppercase();

                if upper.starts_with("EHLO") || upper.starts_with("HELO") {
                    write.write_all(b"250-localhost\r\n250 8BITMIME\r\n").await.unwrap();
                } else if upper.starts_with("MAIL FROM:") {
                    session.mail_from =
                        line[10..].split_whitespace().next().unwrap_or("").to_string();
                    write.write_all(b"250 2.1.0 OK\r\n").await.unwrap();
                } else if upper.starts_with("RCPT TO:") {
                    let rcpt = line[8..].trim().to_string();
                    if reject.is_some_and(|r| rcpt.contains(r)) {
                        write.write_all(b"550 5.1.1 User unknown\r\n").await.unwrap();
                    } else {
                        session.rcpt_to.push(rcpt);
                        write.write_all(b"250 2.1.5 OK\r\n").await.unwrap();
                    }
                } else if upper.starts_with("DATA") {
                    write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.unwrap();
                    loop {
                        let mut data_line = Vec::new();
                        let read = reader.read_until(b'\n', &mut data_line).await.unwrap();
                        if read == 0 || data_line == b".\r\n" {
                            break;
                        }
                        // Undo dot-stuffing
                        if data_line.starts_with(b"..") {
                            data_line.remove(0);
                        }
                        session.data.extend_from_slice(&data_line);
                    }
                    write.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                } else if upper.starts_with("QUIT") {
                    write.write_all(b"221 2.0.0 bye\r\n").await.unwrap();
                    break;
                } else {
                    write.write_all(b"250 OK\r\n").await.unwrap();
                }
            }

            sessions.push(session);
        }
        sessions
    });

    (port, handle)
}

fn plain_config(port: u16) -> SmtpConfig {
    SmtpConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: None,
        password: None,
        security: SmtpSecurity::None,
        from: "relay@example.com".to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn wrap76(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(76)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// A multipart message with a binary and a text attachment
fn fixture() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let engine = base64::engine::general_purpose::STANDARD;
    let binary: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    let text = b"col1,col2\r\n.leading dot,2\r\n".to_vec();

    let raw = format!(
        "From: Alice <alice@example.com>\r\n\
         To: shared@contoso.com\r\n\
         Subject: Quarterly numbers\r\n\
         Message-ID: <abc123@example.com>\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
         \r\n\
         --XYZ\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         See attached.\r\n\
         .a line that starts with a dot\r\n\
         --XYZ\r\n\
         Content-Type: application/octet-stream; name=\"blob.bin\"\r\n\
         Content-Disposition: attachment; filename=\"blob.bin\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {}\r\n\
         --XYZ\r\n\
         Content-Type: application/octet-stream; name=\"data.csv\"\r\n\
         Content-Disposition: attachment; filename=\"data.csv\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {}\r\n\
         --XYZ--\r\n",
        wrap76(&engine.encode(&binary)),
        wrap76(&engine.encode(&text)),
    );

    (raw.into_bytes(), binary, text)
}

#[tokio::test]
async fn test_relay_preserves_message_bytes_and_attachments() {
    let (port, server) = spawn_server(1, None).await;
    let relay = SmtpRelay::new(&plain_config(port)).unwrap();
    let (raw, binary, text) = fixture();

    relay
        .forward_raw(
            &raw,
            &["ops@example.com".to_string(), "audit@example.com".to_string()],
        )
        .await
        .unwrap();

    let sessions = server.await.unwrap();
    let session = &sessions[0];
    assert_eq!(session.mail_from, "<relay@example.com>");
    assert_eq!(
        session.rcpt_to,
        vec!["<ops@example.com>", "<audit@example.com>"]
    );

    // The only permitted difference is the line ending added before the terminator
    assert!(session.data.starts_with(&raw));
    assert!(session.data.len() - raw.len() <= 2);

    let parsed = MessageParser::default().parse(&session.data[..]).unwrap();
    let attachments: Vec<_> = parsed.attachments().collect();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0].attachment_name(), Some("blob.bin"));
    assert_eq!(attachments[0].contents(), &binary[..]);
    assert_eq!(attachments[1].attachment_name(), Some("data.csv"));
    assert_eq!(attachments[1].contents(), &text[..]);
}

#[tokio::test]
async fn test_rejected_recipient() {
    let (port, server) = spawn_server(1, Some("nobody")).await;
    let relay = SmtpRelay::new(&plain_config(port)).unwrap();

    let err = relay
        .forward_raw(b"Subject: hi\r\n\r\nbody\r\n", &["nobody@example.com".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SmtpError::RecipientRejected(_)), "got {:?}", err);

    let sessions = server.await.unwrap();
    assert!(sessions[0].data.is_empty());
}

#[tokio::test]
async fn test_each_forward_uses_its_own_session() {
    let (port, server) = spawn_server(2, None).await;
    let relay = SmtpRelay::new(&plain_config(port)).unwrap();

    relay
        .forward_raw(b"Subject: one\r\n\r\n1\r\n", &["a@example.com".to_string()])
        .await
        .unwrap();
    relay
        .forward_raw(b"Subject: two\r\n\r\n2\r\n", &["b@example.com".to_string()])
        .await
        .unwrap();

    let sessions = server.await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].data.starts_with(b"Subject: one"));
    assert!(sessions[1].data.starts_with(b"Subject: two"));
}

#[tokio::test]
async fn test_unreachable_server() {
    let relay = SmtpRelay::new(&plain_config(9)).unwrap();
    let err = relay
        .forward_raw(b"Subject: x\r\n\r\n", &["a@example.com".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SmtpError::ConnectionFailed(_)), "got {:?}", err);
}
