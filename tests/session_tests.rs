//! Integration tests for client sessions
//!
//! Drive real sessions over in-memory duplex streams against a running
//! ChatServer actor.

use std::sync::Arc;
use std::time::Duration;

use salon_chat::{
    handle_connection, serve, AppError, ChatServer, ServerCommand, ServerConfig,
};
use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const PROMPT: &str = "Enter handle: ";
const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
    handle: JoinHandle<Result<(), AppError>>,
}

impl TestServer {
    fn start(config: ServerConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let handle = tokio::spawn(ChatServer::new(config.clone(), cmd_rx).run());
        Self {
            cmd_tx,
            config: Arc::new(config),
            handle,
        }
    }

    fn connect(&self) -> TestClient {
        let (client, server) = tokio::io::duplex(16 * 1024);
        tokio::spawn(handle_connection(
            server,
            self.cmd_tx.clone(),
            Arc::clone(&self.config),
        ));
        let (reader, writer) = tokio::io::split(client);
        TestClient {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn login(&self, handle: &str) -> TestClient {
        let mut client = self.connect();
        client.expect_prompt().await;
        client.send(handle).await;
        client
            .expect(&format!("Welcome, {}! You are in lobby.", handle))
            .await;
        client
    }
}

struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl TestClient {
    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        (n > 0).then(|| line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn expect(&mut self, expected: &str) {
        assert_eq!(self.read_line().await.as_deref(), Some(expected));
    }

    async fn expect_prompt(&mut self) {
        let mut buf = vec![0u8; PROMPT.len()];
        timeout(WAIT, self.reader.read_exact(&mut buf))
            .await
            .expect("timed out waiting for the prompt")
            .unwrap();
        assert_eq!(buf, PROMPT.as_bytes());
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.read_line().await, None);
    }
}

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn join_kick_destroy_scenario() {
        let server = TestServer::start(ServerConfig::default());

        let mut alice = server.login("alice").await;
        alice.send("/join dev").await;
        alice.expect("You joined dev as admin.").await;

        let mut bob = server.login("bob").await;
        bob.send("/join dev\r").await;
        bob.expect("You joined dev as user.").await;
        alice.expect("bob joined dev.").await;

        alice.send("/kick bob").await;
        alice.expect("bob was kicked from dev by alice.").await;
        bob.expect("You were kicked from dev by alice.").await;
        bob.expect("You joined lobby as user.").await;

        alice.send("/channels").await;
        alice.expect("Rooms:").await;
        alice.expect("- lobby").await;
        alice.expect("- dev").await;

        alice.send("/destroy").await;
        alice.expect("Room dev was destroyed by alice.").await;
        alice.expect("You joined lobby as user.").await;
        bob.expect("alice joined lobby.").await;

        alice.send("/channels").await;
        alice.expect("Rooms:").await;
        alice.expect("- lobby").await;

        alice.send("/exit").await;
        alice.expect("Goodbye.").await;
        alice.expect_closed().await;
        bob.expect("alice left lobby.").await;
    }

    #[tokio::test]
    async fn chat_reaches_room_members_only() {
        let server = TestServer::start(ServerConfig::default());

        let mut alice = server.login("alice").await;
        let mut bob = server.login("bob").await;
        alice.expect("bob joined lobby.").await;
        let mut carol = server.login("carol").await;
        alice.expect("carol joined lobby.").await;
        bob.expect("carol joined lobby.").await;

        carol.send("/join quiet").await;
        carol.expect("You joined quiet as admin.").await;
        alice.expect("carol left lobby.").await;
        bob.expect("carol left lobby.").await;

        alice.send("hello lobby").await;
        bob.expect("alice: hello lobby").await;

        carol.send("/who").await;
        carol.expect("Members of quiet:").await;
        carol.expect("- &carol").await;
    }

    #[tokio::test]
    async fn permission_denied_is_reported() {
        let server = TestServer::start(ServerConfig::default());

        let mut alice = server.login("alice").await;
        alice.send("/join dev").await;
        alice.expect("You joined dev as admin.").await;
        let mut bob = server.login("bob").await;
        bob.send("/join dev").await;
        bob.expect("You joined dev as user.").await;
        alice.expect("bob joined dev.").await;

        bob.send("/destroy").await;
        bob.expect("Error: Permission denied: admin role required").await;

        bob.send("/kick alice").await;
        bob.expect("Error: Permission denied: moderator role required")
            .await;

        alice.send("/promote bob").await;
        alice.expect("bob is now moderator (promoted by alice).").await;
        bob.expect("bob is now moderator (promoted by alice).").await;
    }
}

mod negotiation_tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_handle_is_reprompted() {
        let server = TestServer::start(ServerConfig::default());
        let _alice = server.login("alice").await;

        let mut other = server.connect();
        other.expect_prompt().await;
        other.send("alice").await;
        other.expect("Error: Handle 'alice' is already taken").await;
        other.expect_prompt().await;
        other.send("   ").await;
        other
            .expect("Error: Invalid handle: handle cannot be empty")
            .await;
        other.expect_prompt().await;
        other.send("alice2").await;
        other.expect("Welcome, alice2! You are in lobby.").await;
    }

    #[tokio::test]
    async fn concurrent_registration_has_one_winner() {
        let server = TestServer::start(ServerConfig::default());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let mut client = server.connect();
            tasks.push(tokio::spawn(async move {
                client.expect_prompt().await;
                client.send("racer").await;
                let reply = client.read_line().await.unwrap();
                (reply, client)
            }));
        }

        let mut winners = 0;
        let mut clients = Vec::new();
        for task in tasks {
            let (reply, client) = task.await.unwrap();
            if reply == "Welcome, racer! You are in lobby." {
                winners += 1;
            } else {
                assert_eq!(reply, "Error: Handle 'racer' is already taken");
            }
            clients.push(client);
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn eof_during_negotiation_leaves_no_trace() {
        let server = TestServer::start(ServerConfig::default());

        let mut quitter = server.connect();
        quitter.expect_prompt().await;
        drop(quitter);

        let mut alice = server.login("alice").await;
        alice.send("/who").await;
        alice.expect("Members of lobby:").await;
        alice.expect("- alice").await;
    }
}

mod teardown_tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_frees_handle_and_room() {
        let server = TestServer::start(ServerConfig::default());

        let mut alice = server.login("alice").await;
        alice.send("/join dev").await;
        alice.expect("You joined dev as admin.").await;
        let mut bob = server.login("bob").await;
        bob.send("/join dev").await;
        bob.expect("You joined dev as user.").await;
        alice.expect("bob joined dev.").await;

        // Abrupt close, no /exit
        drop(alice);
        bob.expect("alice left dev.").await;

        let _alice_again = server.login("alice").await;

        bob.send("/join lobby").await;
        bob.expect("You joined lobby as user.").await;
        bob.send("/channels").await;
        bob.expect("Rooms:").await;
        bob.expect("- lobby").await;
    }

    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let server = TestServer::start(ServerConfig::default());
        let mut alice = server.login("alice").await;

        server.cmd_tx.send(ServerCommand::Shutdown).await.unwrap();
        alice.expect("Server is shutting down.").await;
        alice.expect_closed().await;

        assert!(server.handle.await.unwrap().is_ok());
    }
}

mod framing_tests {
    use super::*;

    #[tokio::test]
    async fn oversized_lines_are_truncated() {
        let server = TestServer::start(ServerConfig {
            max_line_length: 16,
            ..ServerConfig::default()
        });

        let mut alice = server.login("alice").await;
        let mut bob = server.login("bob").await;
        alice.expect("bob joined lobby.").await;

        alice.send(&"x".repeat(40)).await;
        bob.expect(&format!("alice: {}", "x".repeat(16))).await;

        // The tail of the long line is not treated as a new line
        alice.send("short").await;
        bob.expect("alice: short").await;
    }
}

mod listener_tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_waits_for_sessions_to_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(serve(
            listener,
            Arc::new(ServerConfig::default()),
            async {
                let _ = stop_rx.await;
            },
        ));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut prompt = vec![0u8; PROMPT.len()];
        timeout(WAIT, reader.read_exact(&mut prompt))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(prompt, PROMPT.as_bytes());
        writer.write_all(b"alice\n").await.unwrap();
        let mut welcome = String::new();
        timeout(WAIT, reader.read_line(&mut welcome))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(welcome, "Welcome, alice! You are in lobby.\n");

        stop_tx.send(()).unwrap();
        let result = timeout(WAIT, serving).await.unwrap().unwrap();
        assert!(result.is_ok());

        // The session has flushed and closed by the time serve returns
        let mut rest = String::new();
        timeout(WAIT, reader.read_to_string(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rest, "Server is shutting down.\n");
    }
}
