//! Command execution: one parsed argument vector in, one encoded reply out.

use std::time::{Duration, Instant};

use ember_resp::encode;
use ember_store::{Keyspace, StoreError, Value};
use tracing::debug;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";

#[derive(Clone, Copy)]
enum End {
    Front,
    Back,
}

/// Executes one command against `keyspace`, appending the reply to `out`.
///
/// Empty commands (from `*0`/`*-1` frames) produce no reply. Error replies
/// never mutate the keyspace: every write path validates before touching
/// state.
pub fn execute(args: &[Option<Vec<u8>>], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>) {
    if args.is_empty() {
        return;
    }
    let Some(argv) = args.iter().map(Option::as_deref).collect::<Option<Vec<&[u8]>>>() else {
        encode::error(out, "ERR protocol error: null bulk string in request");
        return;
    };

    let verb = argv[0].to_ascii_uppercase();
    debug!(cmd = %String::from_utf8_lossy(&verb), argc = argv.len(), "execute");

    match verb.as_slice() {
        b"PING" => ping(&argv, out),
        b"ECHO" => echo(&argv, out),
        b"SET" => set(&argv, keyspace, now, out),
        b"GET" => get(&argv, keyspace, now, out),
        b"DEL" => del(&argv, keyspace, out),
        b"RPUSH" => push(&argv, keyspace, now, out, false),
        b"LPUSH" => push(&argv, keyspace, now, out, true),
        b"LPOP" => pop(&argv, keyspace, now, out, End::Front),
        b"RPOP" => pop(&argv, keyspace, now, out, End::Back),
        b"LLEN" => llen(&argv, keyspace, now, out),
        b"LRANGE" => lrange(&argv, keyspace, now, out),
        _ => {
            let verb = String::from_utf8_lossy(argv[0]);
            encode::error(out, &format!("ERR unknown command '{verb}'"));
        }
    }
}

fn ping(argv: &[&[u8]], out: &mut Vec<u8>) {
    if argv.len() != 1 {
        return wrong_arity(out, "ping");
    }
    encode::simple_string(out, "PONG");
}

fn echo(argv: &[&[u8]], out: &mut Vec<u8>) {
    if argv.len() != 2 {
        return wrong_arity(out, "echo");
    }
    encode::bulk_string(out, Some(argv[1]));
}

fn set(argv: &[&[u8]], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>) {
    let ttl = match argv.len() {
        3 => None,
        5 => {
            let Some(n) = parse_i64(argv[4]) else {
                return encode::error(out, NOT_AN_INTEGER);
            };
            if n < 0 {
                return encode::error(out, "ERR invalid expire time in 'set' command");
            }
            // EX is seconds, PX is milliseconds, both kept in their own unit.
            match argv[3].to_ascii_uppercase().as_slice() {
                b"EX" => Some(Duration::from_secs(n as u64)),
                b"PX" => Some(Duration::from_millis(n as u64)),
                _ => return encode::error(out, "ERR syntax error"),
            }
        }
        _ => return wrong_arity(out, "set"),
    };
    keyspace.set(argv[1].to_vec(), Value::Str(argv[2].to_vec()), ttl, now);
    encode::simple_string(out, "OK");
}

fn get(argv: &[&[u8]], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>) {
    if argv.len() != 2 {
        return wrong_arity(out, "get");
    }
    match keyspace.get(argv[1], now) {
        None => encode::bulk_string(out, None),
        Some(Value::Str(s)) => encode::bulk_string(out, Some(s)),
        Some(_) => encode::error(out, WRONG_TYPE),
    }
}

fn del(argv: &[&[u8]], keyspace: &mut Keyspace, out: &mut Vec<u8>) {
    if argv.len() != 2 {
        return wrong_arity(out, "del");
    }
    keyspace.delete(argv[1]);
    encode::simple_string(out, "OK");
}

fn push(argv: &[&[u8]], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>, prepend: bool) {
    if argv.len() < 3 {
        return wrong_arity(out, if prepend { "lpush" } else { "rpush" });
    }
    let items = argv[2..].iter().map(|item| item.to_vec()).collect();
    match keyspace.add_to_list(argv[1], items, prepend, now) {
        Ok(len) => encode::integer(out, len as i64),
        Err(StoreError::WrongType) => encode::error(out, WRONG_TYPE),
    }
}

fn pop(argv: &[&[u8]], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>, end: End) {
    let name = match end {
        End::Front => "lpop",
        End::Back => "rpop",
    };
    if argv.len() != 2 && argv.len() != 3 {
        return wrong_arity(out, name);
    }
    let explicit_count = argv.len() == 3;
    let count = if explicit_count {
        match parse_i64(argv[2]) {
            Some(count) if count >= 0 => count as usize,
            _ => return encode::error(out, "ERR value is out of range, must be positive"),
        }
    } else {
        1
    };

    let list = match keyspace.get_list_mut(argv[1], now) {
        Err(StoreError::WrongType) => return encode::error(out, WRONG_TYPE),
        Ok(None) => return encode::bulk_string(out, None),
        Ok(Some(list)) => list,
    };
    let popped = match end {
        End::Front => list.pop_front(count),
        End::Back => list.pop_back(count),
    };

    if popped.is_empty() {
        encode::bulk_string(out, None);
    } else if explicit_count {
        encode::array(out, popped.iter().map(Vec::as_slice));
    } else {
        encode::bulk_string(out, Some(&popped[0]));
    }
}

fn llen(argv: &[&[u8]], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>) {
    if argv.len() != 2 {
        return wrong_arity(out, "llen");
    }
    match keyspace.get(argv[1], now) {
        None => encode::integer(out, 0),
        Some(Value::List(list)) => encode::integer(out, list.len() as i64),
        Some(_) => encode::error(out, WRONG_TYPE),
    }
}

fn lrange(argv: &[&[u8]], keyspace: &mut Keyspace, now: Instant, out: &mut Vec<u8>) {
    if argv.len() != 4 {
        return wrong_arity(out, "lrange");
    }
    let (Some(mut start), Some(mut end)) = (parse_i64(argv[2]), parse_i64(argv[3])) else {
        return encode::error(out, NOT_AN_INTEGER);
    };

    let list = match keyspace.get_list_mut(argv[1], now) {
        Err(StoreError::WrongType) => return encode::error(out, WRONG_TYPE),
        Ok(None) => return encode::array_header(out, 0),
        Ok(Some(list)) => list,
    };

    let len = list.len() as i64;
    if start < 0 {
        start = (start + len).max(0);
    }
    if end < 0 {
        end += len;
    }
    end = end.min(len - 1);
    if start > end || start >= len {
        return encode::array_header(out, 0);
    }

    let items = list.range(start as usize, end as usize);
    encode::array(out, items.iter().map(Vec::as_slice));
}

fn wrong_arity(out: &mut Vec<u8>, cmd: &str) {
    encode::error(out, &format!("ERR wrong number of arguments for '{cmd}' command"));
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
