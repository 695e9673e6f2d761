use std::io::{self, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use http::Uri;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use wsstream_client::{DialPlan, WsClient};
use wsstream_conn::{is_connection_closed, ServerConfig, WsStream};
use wsstream_transport::memory::MemoryDialer;

use crate::cmd::{parse_duration, LoopbackArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{payload_preview, print_record, OutputFormat};

const DEFAULT_URI: &str = "ws://memory/ws";

#[derive(Debug, Serialize)]
struct LoopbackReport {
    uri: String,
    dials: usize,
    early_bytes: usize,
    late_bytes: usize,
    echoed_bytes: usize,
    matched: bool,
    payload: String,
}

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = args.client.resolve(Some(DEFAULT_URI))?;
    let payload = args.payload.resolve()?;

    let dialer = Arc::new(MemoryDialer::new());
    let client = WsClient::with_shared_dialer(Arc::clone(&dialer), &config)
        .map_err(|err| client_error("invalid client config", err))?;
    let plan = DialPlan::for_first_write(client.options(), &payload)
        .map_err(|err| client_error("planning failed", err))?;

    let server = ServerConfig {
        path: request_path(&config.uri)?,
        max_early_data: config.max_early_data,
        early_data_header_name: config.early_data_header_name.clone(),
    };
    let echo = {
        let dialer = Arc::clone(&dialer);
        thread::spawn(move || echo_peer(&dialer, &server, timeout))
    };

    let echoed = round_trip(&client, &payload, timeout);
    let echo_result = echo
        .join()
        .map_err(|_| CliError::new(FAILURE, "echo peer panicked"))?;
    let echoed = echoed?;
    echo_result.map_err(|err| io_error("echo peer failed", err))?;

    let report = LoopbackReport {
        uri: config.uri.clone(),
        dials: dialer.dial_count(),
        early_bytes: plan.early_len,
        late_bytes: plan.late_len,
        echoed_bytes: echoed.len(),
        matched: echoed == payload,
        payload: payload_preview(&echoed),
    };
    let rows = [
        ("uri", report.uri.clone()),
        ("dials", report.dials.to_string()),
        ("early_bytes", report.early_bytes.to_string()),
        ("late_bytes", report.late_bytes.to_string()),
        ("echoed_bytes", report.echoed_bytes.to_string()),
        ("matched", report.matched.to_string()),
        ("payload", report.payload.clone()),
    ];
    print_record(&report, &rows, format);

    if !report.matched {
        return Err(CliError::new(FAILURE, "echo did not match payload"));
    }
    Ok(SUCCESS)
}

fn request_path(uri: &str) -> CliResult<String> {
    let uri: Uri = uri
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("invalid uri {uri:?}: {err}")))?;
    Ok(uri.path().to_string())
}

/// Write the payload, then read back as many bytes.
fn round_trip(
    client: &WsClient<MemoryDialer>,
    payload: &[u8],
    timeout: Duration,
) -> CliResult<Vec<u8>> {
    let stream = client
        .connect(CancellationToken::new())
        .map_err(|err| client_error("connect failed", err))?;
    stream
        .send(payload)
        .map_err(|err| io_error("write failed", err))?;

    let mut echoed = vec![0u8; payload.len()];
    if !echoed.is_empty() {
        stream
            .set_read_deadline(Some(Instant::now() + timeout))
            .map_err(|err| io_error("set read deadline", err))?;
        (&stream)
            .read_exact(&mut echoed)
            .map_err(|err| io_error("read failed", err))?;
    }
    stream.close().map_err(|err| io_error("close failed", err))?;
    Ok(echoed)
}

/// Accept one connection and echo it until the client closes.
fn echo_peer(dialer: &MemoryDialer, server: &ServerConfig, timeout: Duration) -> io::Result<()> {
    let accepted = dialer.accept_timeout(timeout)?;
    let target = accepted
        .request
        .uri
        .parse::<Uri>()
        .ok()
        .and_then(|uri| uri.path_and_query().map(|pq| pq.as_str().to_string()))
        .unwrap_or_default();
    let early = server
        .extract_early_data(&target, &accepted.request.headers)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    debug!(
        early = early.as_ref().map_or(0, |early| early.len()),
        "echo peer accepted"
    );

    let stream = match early {
        Some(early) => WsStream::server_with_early_data(accepted.conn, None, early),
        None => WsStream::server(accepted.conn, None),
    };
    stream.set_read_deadline(Some(Instant::now() + timeout))?;

    let mut buf = [0u8; 4096];
    loop {
        match stream.recv(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                stream.send(&buf[..n])?;
            }
            Err(err) if is_connection_closed(&err) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_path_drops_scheme_and_host() {
        assert_eq!(request_path("ws://memory/ws").unwrap(), "/ws");
        assert_eq!(request_path("wss://h:8443/a/b?x=1").unwrap(), "/a/b");
        assert!(request_path("not a uri").is_err());
    }
}
