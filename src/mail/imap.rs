//! IMAP over STARTTLS: blocking client used by the mail fetcher.
//!
//! Speaks just enough IMAP4rev1 for the fetch pipeline: greeting, STARTTLS,
//! LOGIN, SELECT, SEARCH, FETCH RFC822, NOOP and LOGOUT. Literals (`{n}`)
//! are read byte-exact so message bodies survive intact.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::MailConfig;
use crate::error::MailError;
use crate::mail::session::{FetchReply, MailConnector, MailSession};
use crate::mail::types::{SearchQuery, quote};

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Largest literal the client will buffer.
pub const MAX_LITERAL_BYTES: usize = 50 * 1024 * 1024;

// ── Connector ───────────────────────────────────────────────────────

/// Opens STARTTLS sessions against the configured IMAP server.
pub struct ImapConnector {
    config: MailConfig,
    tls: Arc<rustls::ClientConfig>,
}

impl ImapConnector {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| MailError::Tls(e.to_string()))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            config,
            tls: Arc::new(tls),
        })
    }

    fn connect_error(&self, reason: impl ToString) -> MailError {
        MailError::Connect {
            host: self.config.host.clone(),
            port: self.config.port,
            reason: reason.to_string(),
        }
    }

    /// TCP connect, read the plaintext greeting, upgrade with STARTTLS.
    fn open(&self) -> Result<ImapSession<TlsStream>, MailError> {
        let cfg = &self.config;
        let addrs = (cfg.host.as_str(), cfg.port)
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e))?;

        let mut last_err = None;
        let mut tcp = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, cfg.timeout) {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let tcp = tcp.ok_or_else(|| {
            self.connect_error(
                last_err.map_or_else(|| "no addresses resolved".to_string(), |e| e.to_string()),
            )
        })?;
        tcp.set_read_timeout(Some(cfg.timeout))?;
        tcp.set_write_timeout(Some(cfg.timeout))?;

        let mut plain = ImapSession::new(tcp);
        plain.read_greeting()?;

        let resp = plain.command_with_tag("a0", "STARTTLS")?;
        if resp.status != Status::Ok {
            return Err(MailError::Tls(format!("STARTTLS refused: {}", resp.text)));
        }
        // Anything already buffered arrived before the handshake and must not
        // be trusted as part of the encrypted session.
        if !plain.stream.buffer().is_empty() {
            return Err(MailError::Protocol(
                "unexpected data after STARTTLS response".into(),
            ));
        }
        let tcp = plain.stream.into_inner();

        let server_name = ServerName::try_from(cfg.host.clone())
            .map_err(|e| MailError::Tls(format!("invalid server name: {e}")))?;
        let conn = rustls::ClientConnection::new(Arc::clone(&self.tls), server_name)
            .map_err(|e| MailError::Tls(e.to_string()))?;

        debug!(host = %cfg.host, "STARTTLS negotiated");
        Ok(ImapSession::new(rustls::StreamOwned::new(conn, tcp)))
    }
}

impl MailConnector for ImapConnector {
    fn connect(&self) -> Result<Box<dyn MailSession>, MailError> {
        let mut session = self.open()?;
        session.login(&self.config.username, self.config.password.expose_secret())?;
        info!(host = %self.config.host, user = %self.config.username, "IMAP login succeeded");
        Ok(Box::new(session))
    }

    fn probe(&self) -> Result<(), MailError> {
        let mut session = self.open()?;
        let result = session.noop();
        let _ = session.logout();
        result
    }
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    No,
    Bad,
}

/// One untagged response line with the literals embedded in it.
#[derive(Debug)]
struct Untagged {
    line: String,
    literals: Vec<Vec<u8>>,
}

/// A complete tagged response with its untagged lines.
#[derive(Debug)]
struct Response {
    untagged: Vec<Untagged>,
    status: Status,
    text: String,
}

/// An IMAP session over any byte stream.
///
/// A read that fails partway through a line or literal leaves the stream
/// at an unknown position, so the session refuses further commands.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
    broken: bool,
}

impl<S: Read + Write> ImapSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            next_tag: 1,
            broken: false,
        }
    }

    /// Read up to and including `\n`. `mid_response` marks a continuation
    /// read, where any failure desynchronizes the stream.
    fn read_line(&mut self, mid_response: bool) -> Result<Vec<u8>, MailError> {
        let mut buf = Vec::new();
        match self.stream.read_until(b'\n', &mut buf) {
            Ok(0) => Err(MailError::Closed),
            Ok(_) => Ok(buf),
            Err(e) => {
                if mid_response || !buf.is_empty() {
                    self.broken = true;
                }
                Err(e.into())
            }
        }
    }

    /// Read one logical response line, pulling in any literals it announces.
    fn read_logical_line(&mut self) -> Result<Untagged, MailError> {
        let mut line = self.read_line(false)?;
        let mut literals = Vec::new();
        while let Some((start, len)) = literal_len(&line) {
            if len > MAX_LITERAL_BYTES {
                self.broken = true;
                return Err(MailError::Protocol(format!(
                    "literal of {len} bytes exceeds the {MAX_LITERAL_BYTES} byte limit"
                )));
            }
            let mut literal = vec![0u8; len];
            if let Err(e) = self.stream.read_exact(&mut literal) {
                self.broken = true;
                return Err(e.into());
            }
            literals.push(literal);
            line.truncate(start);
            let rest = self.read_line(true)?;
            line.extend_from_slice(&rest);
        }
        Ok(Untagged {
            line: String::from_utf8_lossy(&line).trim_end().to_string(),
            literals,
        })
    }

    fn read_greeting(&mut self) -> Result<(), MailError> {
        let greeting = self.read_logical_line()?.line;
        if greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(MailError::Protocol(format!("unexpected greeting: {greeting}")))
        }
    }

    fn command(&mut self, cmd: &str) -> Result<Response, MailError> {
        let tag = format!("a{}", self.next_tag);
        self.next_tag += 1;
        self.command_with_tag(&tag, cmd)
    }

    fn command_with_tag(&mut self, tag: &str, cmd: &str) -> Result<Response, MailError> {
        if self.broken {
            return Err(MailError::Protocol(
                "session lost sync after a failed read".into(),
            ));
        }
        let stream = self.stream.get_mut();
        stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        stream.flush()?;

        let mut untagged = Vec::new();
        let prefix = format!("{tag} ");
        loop {
            let entry = self.read_logical_line()?;
            let line = entry.line.as_str();
            if let Some(rest) = line.strip_prefix(&prefix) {
                let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let status = match word.to_ascii_uppercase().as_str() {
                    "OK" => Status::Ok,
                    "NO" => Status::No,
                    "BAD" => Status::Bad,
                    other => {
                        return Err(MailError::Protocol(format!(
                            "unknown status {other:?} for {tag}"
                        )));
                    }
                };
                return Ok(Response {
                    untagged,
                    status,
                    text: text.trim().to_string(),
                });
            }
            if line.starts_with('+') {
                return Err(MailError::Protocol(format!(
                    "unexpected continuation request: {line}"
                )));
            }
            if !line.starts_with('*') {
                // Completion of an earlier command whose reply was abandoned.
                debug!(line, "Skipping stale tagged response");
                continue;
            }
            untagged.push(entry);
        }
    }

    fn expect_ok(&mut self, name: &str, cmd: &str) -> Result<Response, MailError> {
        let resp = self.command(cmd)?;
        if resp.status == Status::Ok {
            Ok(resp)
        } else {
            Err(MailError::Rejected {
                command: name.to_string(),
                reason: resp.text,
            })
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailError> {
        let resp = self.command(&format!("LOGIN {} {}", quote(username), quote(password)))?;
        match resp.status {
            Status::Ok => Ok(()),
            _ => Err(MailError::Login(resp.text)),
        }
    }

    pub fn noop(&mut self) -> Result<(), MailError> {
        self.expect_ok("NOOP", "NOOP").map(|_| ())
    }
}

impl<S: Read + Write + Send> MailSession for ImapSession<S> {
    fn select(&mut self, folder: &str) -> Result<(), MailError> {
        self.expect_ok("SELECT", &format!("SELECT {}", quote(folder)))
            .map(|_| ())
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<String>, MailError> {
        let criteria = query.to_imap();
        let cmd = if criteria.is_ascii() {
            format!("SEARCH {criteria}")
        } else {
            format!("SEARCH CHARSET UTF-8 {criteria}")
        };
        let resp = self.expect_ok("SEARCH", &cmd)?;

        let ids = resp
            .untagged
            .iter()
            .filter_map(|u| u.line.strip_prefix("* SEARCH"))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect();
        Ok(ids)
    }

    fn fetch_message(&mut self, id: &str) -> Result<FetchReply, MailError> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MailError::Protocol(format!("invalid message id {id:?}")));
        }
        let resp = self.command(&format!("FETCH {id} RFC822"))?;
        Ok(match resp.status {
            Status::Ok => resp
                .untagged
                .into_iter()
                .filter(|u| is_fetch_of(&u.line, id))
                .find_map(|u| u.literals.into_iter().next())
                .map_or(FetchReply::Empty, FetchReply::Message),
            Status::No | Status::Bad => FetchReply::Rejected(resp.text),
        })
    }

    fn logout(&mut self) -> Result<(), MailError> {
        match self.command("LOGOUT") {
            Ok(_) | Err(MailError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Whether `line` is the untagged `* <id> FETCH` response for `id`.
fn is_fetch_of(line: &str, id: &str) -> bool {
    let mut words = line.split_ascii_whitespace();
    words.next() == Some("*")
        && words.next() == Some(id)
        && words.next().is_some_and(|w| w.eq_ignore_ascii_case("FETCH"))
}

/// If `line` ends with a literal announcement `{n}\r\n`, return the offset
/// of `{` and `n`.
fn literal_len(line: &[u8]) -> Option<(usize, usize)> {
    let trimmed = line.strip_suffix(b"\r\n").or_else(|| line.strip_suffix(b"\n"))?;
    let inner = trimmed.strip_suffix(b"}")?;
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let len = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((open, len))
}
