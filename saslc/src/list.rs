//! Parsing of comma separated option lists.
//!
//! The grammar is the RFC 2831 `#rule`: `*LWS element *( *LWS "," *LWS element )`.
//! Commas inside double quotes don't split, a backslash protects the next
//! character, and empty elements are dropped. Elements keep their quotes so
//! that `key="a,b"` stays a single element; use [`strip_quotes`] on values.

fn is_lws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Splits `input` into trimmed, non-empty elements.
pub fn parse_list(input: &str) -> Vec<String> {
    let mut ret = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                quoted = !quoted;
            }
            ',' if !quoted => push_element(&mut ret, &mut current),
            _ => current.push(c),
        }
    }
    push_element(&mut ret, &mut current);
    ret
}

fn push_element(list: &mut Vec<String>, current: &mut String) {
    let element = current.trim_matches(is_lws);
    if !element.is_empty() {
        list.push(element.to_owned());
    }
    current.clear();
}

/// Strips one pair of surrounding double quotes, if present.
pub fn strip_quotes(value: &str) -> &str {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => value,
    }
}

/// Removes backslash escapes; `\\` yields a single backslash.
pub fn unescape(value: &[u8]) -> Vec<u8> {
    let mut ret = Vec::with_capacity(value.len());
    let mut escaped = false;
    for &b in value {
        if b == b'\\' && !escaped {
            escaped = true;
            continue;
        }
        ret.push(b);
        escaped = false;
    }
    ret
}

/// ORs together the flags of every element naming an entry of `table`.
///
/// Names are compared case-insensitively; unknown names are ignored.
pub fn list_flags<F: bitflags::Flags + Copy>(list: &[String], table: &[(&str, F)]) -> F {
    let mut flags = F::empty();
    for element in list {
        for (name, flag) in table {
            if element.eq_ignore_ascii_case(name) {
                flags.insert(*flag);
            }
        }
    }
    flags
}

/// Picks a value from a host-qualified list (`[host:]value, ...`).
///
/// The first `host:value` entry whose host matches `hostname` wins, as long
/// as its value starts with an alphanumeric character; otherwise the first
/// entry without a host qualifier is taken.
pub fn choose_from_hqlist(hqlist: &str, hostname: Option<&str>) -> Option<String> {
    let list = parse_list(hqlist);
    if let Some(hostname) = hostname {
        for element in &list {
            let Some((host, value)) = element.split_once(':') else {
                continue;
            };
            if host.eq_ignore_ascii_case(hostname)
                && value.starts_with(|c: char| c.is_ascii_alphanumeric())
            {
                return Some(value.to_owned());
            }
        }
    }
    list.into_iter().find(|element| !element.contains(':'))
}
