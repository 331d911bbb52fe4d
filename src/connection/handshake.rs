//! Connection handshake: `HELLO` for RESP3, or `AUTH` + `SELECT` +
//! `CLIENT SETNAME` for RESP2.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::codec::{decode, encode_command, Decoded, Frame, Value};
use crate::config::{AuthConfig, ProtocolVersion};
use crate::error::{CoreError, Result};

use super::transport::Transport;

/// Drives the handshake to completion directly on `transport`, before
/// the connection's read/write tasks are spawned. Returns the
/// negotiated protocol (server may downgrade RESP3 to RESP2 on old
/// builds, though HELLO failure here is treated as fatal per the
/// handshake contract).
pub async fn perform(
    transport: &mut Transport,
    protocol: ProtocolVersion,
    auth: &Option<AuthConfig>,
    client_name: &Option<String>,
    database_id: u32,
) -> Result<()> {
    match protocol {
        ProtocolVersion::Resp3 => hello(transport, auth, client_name, database_id).await,
        ProtocolVersion::Resp2 => {
            if let Some(auth) = auth {
                send_and_expect_ok(transport, auth_command(auth)).await?;
            }
            if database_id != 0 {
                send_and_expect_ok(
                    transport,
                    encode_command(b"SELECT", [database_id.to_string().as_bytes()]),
                )
                .await?;
            }
            if let Some(name) = client_name {
                send_and_expect_ok(
                    transport,
                    encode_command(b"CLIENT", [b"SETNAME".as_slice(), name.as_bytes()]),
                )
                .await?;
            }
            Ok(())
        }
    }
}

async fn hello(
    transport: &mut Transport,
    auth: &Option<AuthConfig>,
    client_name: &Option<String>,
    database_id: u32,
) -> Result<()> {
    let mut args: Vec<Vec<u8>> = vec![b"3".to_vec()];
    if let Some(auth) = auth {
        args.push(b"AUTH".to_vec());
        args.push(auth.username.clone().unwrap_or_else(|| "default".into()).into_bytes());
        args.push(auth.password.clone().into_bytes());
    }
    if let Some(name) = client_name {
        args.push(b"SETNAME".to_vec());
        args.push(name.clone().into_bytes());
    }
    let frame = encode_command(b"HELLO", args.iter().map(|a| a.as_slice()));
    let reply = roundtrip(transport, frame).await?;
    match reply {
        Value::Map(_) => {}
        Value::Error(e) => {
            return Err(CoreError::Handshake(format!("{}: {}", e.code, e.message)))
        }
        other => {
            return Err(CoreError::Handshake(format!(
                "unexpected HELLO reply: {other:?}"
            )))
        }
    }
    if database_id != 0 {
        send_and_expect_ok(
            transport,
            encode_command(b"SELECT", [database_id.to_string().as_bytes()]),
        )
        .await?;
    }
    Ok(())
}

fn auth_command(auth: &AuthConfig) -> bytes::BytesMut {
    match &auth.username {
        Some(user) => encode_command(b"AUTH", [user.as_bytes(), auth.password.as_bytes()]),
        None => encode_command(b"AUTH", [auth.password.as_bytes()]),
    }
}

async fn send_and_expect_ok(transport: &mut Transport, frame: bytes::BytesMut) -> Result<()> {
    match roundtrip(transport, frame).await? {
        Value::SimpleString(s) if s == b"OK" => Ok(()),
        Value::Error(e) => Err(CoreError::Handshake(format!("{}: {}", e.code, e.message))),
        other => Err(CoreError::Handshake(format!(
            "unexpected reply during handshake: {other:?}"
        ))),
    }
}

async fn roundtrip(transport: &mut Transport, frame: bytes::BytesMut) -> Result<Value> {
    transport.write_all(&frame).await.map_err(CoreError::Io)?;
    transport.flush().await.map_err(CoreError::Io)?;

    let mut buf = Vec::with_capacity(512);
    loop {
        match decode(&buf)? {
            Decoded::Complete { frame: Frame::Reply(v), .. } => return Ok(v),
            Decoded::Complete { frame: Frame::Push(_), consumed } => {
                buf.drain(..consumed);
                continue;
            }
            Decoded::Incomplete => {
                let mut chunk = [0u8; 4096];
                let n = transport.read(&mut chunk).await.map_err(CoreError::Io)?;
                if n == 0 {
                    return Err(CoreError::Handshake(
                        "connection closed during handshake".into(),
                    ));
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}
