//! URL sub-mapper.
//!
//! Splits a request target into the parts a reader of the log cares about,
//! keeping the received spelling of the path and fragment whenever it is not
//! the default escaping of their decoded form.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::capture::record::{sparse, UrlRecord, UserInfoRecord};

/// Characters escaped in a path: everything outside unreserved and `$&+,/:;=@`.
const PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Fragments additionally keep `?` and `!()*` as they are.
const FRAGMENT: &AsciiSet = &PATH
    .remove(b'?')
    .remove(b'!')
    .remove(b'(')
    .remove(b')')
    .remove(b'*');

/// User-info keeps only unreserved and `$&+,;=`.
const USERINFO: &AsciiSet = &PATH.add(b'/').add(b':').add(b'@');

/// Map a raw request target. Empty input has no URL to describe.
pub fn map_url(raw: Option<&str>) -> Option<UrlRecord> {
    let raw = raw.filter(|r| !r.is_empty())?;
    let mut record = UrlRecord::default();

    let rest = match raw.split_once('#') {
        Some((rest, fragment)) => {
            let (decoded, received) = decode_keeping_raw(fragment, FRAGMENT);
            record.fragment = sparse(decoded);
            record.raw_fragment = received;
            rest
        }
        None => raw,
    };

    let rest = match split_scheme(rest) {
        Some((scheme, rest)) => {
            record.scheme = sparse(scheme.to_ascii_lowercase());
            rest
        }
        None => rest,
    };

    let rest = match rest.split_once('?') {
        Some((rest, query)) => {
            record.force_query = query.is_empty();
            record.raw_query = sparse(query.to_string());
            rest
        }
        None => rest,
    };

    if record.scheme.is_some() && !rest.starts_with('/') {
        record.opaque = sparse(rest.to_string());
        return Some(record);
    }

    let path = match rest.strip_prefix("//") {
        Some(after) => {
            let (authority, path) = match after.find('/') {
                Some(at) => after.split_at(at),
                None => (after, ""),
            };
            let host = match authority.rsplit_once('@') {
                Some((user_info, host)) => {
                    record.user = Some(map_user_info(user_info));
                    host
                }
                None => authority,
            };
            record.host = sparse(host.to_string());
            path
        }
        None => rest,
    };

    // asterisk-form, as used by `OPTIONS *`
    if path == "*" {
        record.path = Some(path.to_string());
        return Some(record);
    }

    let (decoded, received) = decode_keeping_raw(path, PATH);
    record.path = sparse(decoded);
    record.raw_path = received;

    Some(record)
}

fn map_user_info(raw: &str) -> UserInfoRecord {
    let (username, password) = match raw.split_once(':') {
        Some((user, pass)) => (decode(user), Some(decode(pass))),
        None => (decode(raw), None),
    };

    let mut encoded = utf8_percent_encode(&username, USERINFO).to_string();
    if let Some(password) = &password {
        encoded.push(':');
        encoded.push_str(&utf8_percent_encode(password, USERINFO).to_string());
    }

    UserInfoRecord {
        username,
        password,
        encoded,
    }
}

/// `scheme:rest` when the target opens with a scheme.
fn split_scheme(raw: &str) -> Option<(&str, &str)> {
    let colon = raw.find(':')?;
    let scheme = &raw[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme, &raw[colon + 1..]))
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Decode `raw`, returning the received text too when it is not what the
/// decoded value escapes back to.
fn decode_keeping_raw(raw: &str, set: &'static AsciiSet) -> (String, Option<String>) {
    let decoded = decode(raw);
    let canonical = utf8_percent_encode(&decoded, set).to_string();
    let received = (canonical != raw).then(|| raw.to_string());
    (decoded, received)
}
