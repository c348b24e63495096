//! The `mail` builtin module: plain SMTP delivery.
//!
//! Configuration comes from `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, and
//! `SMTP_PASS`. Without a host the module reports an Error value instead of
//! attempting delivery. The conversation is plain SMTP with optional
//! AUTH LOGIN; TLS negotiation is not attempted.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    error::{RunResult, RuntimeError},
    value::{bool_value, error_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

pub(crate) fn module() -> ValueRef {
    module_of("mail", &[("send", NativeFn::MailSend)])
}

/// `mail.send(to, subject, body) -> Boolean | Error`
pub fn send(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [to, subject, body] = args else {
        return Err(RuntimeError::new(format!(
            "mail.send() takes exactly 3 arguments, got {}",
            args.len()
        )));
    };
    let (Value::Str(to), Value::Str(subject), Value::Str(body)) = (to.as_ref(), subject.as_ref(), body.as_ref())
    else {
        return Err(RuntimeError::new("mail.send() arguments must be Strings"));
    };

    let Ok(host) = std::env::var("SMTP_HOST") else {
        return Ok(error_value("mail.send: SMTP_HOST is not set"));
    };
    let port = std::env::var("SMTP_PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(25);
    let user = std::env::var("SMTP_USER").ok();
    let pass = std::env::var("SMTP_PASS").ok();
    let from = user.clone().unwrap_or_else(|| "flowa@localhost".to_owned());

    match deliver(&host, port, user.as_deref(), pass.as_deref(), &from, to, subject, body) {
        Ok(()) => Ok(bool_value(true)),
        Err(msg) => Ok(error_value(format!("mail.send: {msg}"))),
    }
}

#[allow(clippy::too_many_arguments)]
fn deliver(
    host: &str,
    port: u16,
    user: Option<&str>,
    pass: Option<&str>,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<(), String> {
    let stream = TcpStream::connect((host, port)).map_err(|e| e.to_string())?;
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .map_err(|e| e.to_string())?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| e.to_string())?);
    let mut stream = stream;

    expect_code(&mut reader, "220")?;
    command(&mut stream, &mut reader, &format!("HELO {host}\r\n"), "250")?;

    if let (Some(user), Some(pass)) = (user, pass) {
        command(&mut stream, &mut reader, "AUTH LOGIN\r\n", "334")?;
        command(&mut stream, &mut reader, &format!("{}\r\n", STANDARD.encode(user)), "334")?;
        command(&mut stream, &mut reader, &format!("{}\r\n", STANDARD.encode(pass)), "235")?;
    }

    command(&mut stream, &mut reader, &format!("MAIL FROM:<{from}>\r\n"), "250")?;
    command(&mut stream, &mut reader, &format!("RCPT TO:<{to}>\r\n"), "250")?;
    command(&mut stream, &mut reader, "DATA\r\n", "354")?;

    let message = format!(
        "From: <{from}>\r\nTo: <{to}>\r\nSubject: {subject}\r\n\r\n{body}\r\n.\r\n"
    );
    command(&mut stream, &mut reader, &message, "250")?;
    let _ = stream.write_all(b"QUIT\r\n");
    Ok(())
}

fn command(
    stream: &mut TcpStream,
    reader: &mut BufReader<TcpStream>,
    line: &str,
    expected: &str,
) -> Result<(), String> {
    stream.write_all(line.as_bytes()).map_err(|e| e.to_string())?;
    expect_code(reader, expected)
}

fn expect_code(reader: &mut BufReader<TcpStream>, expected: &str) -> Result<(), String> {
    // Multi-line replies use `250-...` continuation lines before `250 `.
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).map_err(|e| e.to_string())?;
        if line.len() < 4 {
            return Err(format!("short SMTP reply: {line:?}"));
        }
        if !line.starts_with(expected) {
            return Err(format!("unexpected SMTP reply: {}", line.trim_end()));
        }
        if line.as_bytes()[3] != b'-' {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::str_value;

    #[test]
    fn test_unconfigured_send_is_error_value() {
        std::env::remove_var("SMTP_HOST");
        let result = send(&[str_value("a@b.c"), str_value("hi"), str_value("body")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Error(_)));
    }

    #[test]
    fn test_bad_arity_is_fatal() {
        assert!(send(&[str_value("a@b.c")]).is_err());
    }
}
