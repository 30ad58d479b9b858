use doorstep_common::{GeolocationResult, SessionKey};

/// Derive the session key for a resolved network identity.
///
/// A resolved public IP maps deterministically onto a sanitized key, so a
/// returning visitor from the same origin lands in the same transcript.
/// Visitors sharing one origin (NAT) collide into one session; that
/// coarseness is accepted. With no IP at all the key is a random anonymous
/// token that does not survive a reload.
pub fn derive_key(geo: &GeolocationResult) -> SessionKey {
    if geo.has_ip() {
        SessionKey::new(sanitize(&geo.ip))
    } else {
        SessionKey::new(format!("anon-{}", uuid::Uuid::new_v4()))
    }
}

/// Replace characters the storage key namespace cannot contain.
fn sanitize(ip: &str) -> String {
    ip.trim()
        .chars()
        .map(|c| if is_illegal_key_char(c) { '-' } else { c })
        .collect()
}

fn is_illegal_key_char(c: char) -> bool {
    matches!(c, '.' | ':' | '#' | '$' | '[' | ']' | '/')
}
