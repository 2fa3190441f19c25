//! Cipher suite selection.
//!
//! Callers describe ciphers with OpenSSL-style lists (`A:B:!C`). The list is
//! first normalized into one canonical string, then mapped onto the TLS 1.2
//! suites the rustls provider implements. TLS 1.3 suites are not governed by
//! the list and are always offered.

use rustls::crypto::CryptoProvider;
use rustls::SupportedCipherSuite;

use crate::config::schema::OneOrMany;

/// Hardened default: forward-secret suites first, no null, export or
/// legacy algorithms.
pub const DEFAULT_CIPHERS: &str = "ECDHE-RSA-AES256-SHA384:DHE-RSA-AES256-SHA384:\
ECDHE-RSA-AES256-SHA256:DHE-RSA-AES256-SHA256:ECDHE-RSA-AES128-SHA256:\
DHE-RSA-AES128-SHA256:HIGH:!aNULL:!eNULL:!EXPORT:!DES:!RC4:!MD5:!PSK:!SRP:!CAMELLIA";

/// OpenSSL names for the TLS 1.2 suites rustls implements.
const OPENSSL_NAMES: &[(&str, &str)] = &[
    ("ECDHE-ECDSA-AES256-GCM-SHA384", "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384"),
    ("ECDHE-ECDSA-AES128-GCM-SHA256", "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"),
    ("ECDHE-ECDSA-CHACHA20-POLY1305", "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256"),
    ("ECDHE-RSA-AES256-GCM-SHA384", "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384"),
    ("ECDHE-RSA-AES128-GCM-SHA256", "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"),
    ("ECDHE-RSA-CHACHA20-POLY1305", "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"),
];

/// `!` bans a suite for the rest of the list; `-` only drops it, so a later
/// token may add it back.
enum Op {
    Add,
    Remove,
    Ban,
}

/// Canonical colon-joined cipher list.
pub fn normalize_ciphers(value: Option<&OneOrMany<String>>) -> String {
    match value {
        None => DEFAULT_CIPHERS.to_string(),
        Some(OneOrMany::One(list)) => list.clone(),
        Some(OneOrMany::Many(names)) => names.join(":"),
    }
}

/// Pick the suites from `available` that `ciphers` allows, in list order.
pub fn select_suites(ciphers: &str, available: &[SupportedCipherSuite]) -> Vec<SupportedCipherSuite> {
    let tls13 = available
        .iter()
        .copied()
        .filter(|suite| matches!(suite, SupportedCipherSuite::Tls13(_)));
    let tls12: Vec<(SupportedCipherSuite, String)> = available
        .iter()
        .copied()
        .filter(|suite| !matches!(suite, SupportedCipherSuite::Tls13(_)))
        .map(|suite| (suite, format!("{:?}", suite.suite())))
        .collect();

    let mut selected: Vec<usize> = Vec::new();
    let mut banned: Vec<usize> = Vec::new();

    for token in ciphers.split(&[':', ',', ' '][..]).filter(|t| !t.is_empty()) {
        let (op, name) = if let Some(rest) = token.strip_prefix('!') {
            (Op::Ban, rest)
        } else if let Some(rest) = token.strip_prefix('-') {
            (Op::Remove, rest)
        } else {
            (Op::Add, token)
        };
        let matched: Vec<usize> = tls12
            .iter()
            .enumerate()
            .filter(|(_, (_, iana))| token_matches(name, iana))
            .map(|(i, _)| i)
            .collect();

        if matched.is_empty() {
            tracing::trace!(token = %token, "Cipher token has no rustls counterpart");
            continue;
        }

        match op {
            Op::Ban => {
                selected.retain(|i| !matched.contains(i));
                banned.extend(matched);
            }
            Op::Remove => selected.retain(|i| !matched.contains(i)),
            Op::Add => {
                for i in matched {
                    if !selected.contains(&i) && !banned.contains(&i) {
                        selected.push(i);
                    }
                }
            }
        }
    }

    tls13
        .chain(selected.into_iter().map(|i| tls12[i].0))
        .collect()
}

/// The ring provider restricted to the suites `ciphers` allows.
pub fn provider_for(ciphers: &str) -> CryptoProvider {
    let base = rustls::crypto::ring::default_provider();
    let cipher_suites = select_suites(ciphers, &base.cipher_suites);
    tracing::debug!(
        ciphers = %ciphers,
        suites = cipher_suites.len(),
        "Selected cipher suites"
    );
    CryptoProvider {
        cipher_suites,
        ..base
    }
}

fn token_matches(token: &str, iana: &str) -> bool {
    match token {
        "HIGH" | "ALL" | "DEFAULT" | "ECDHE" | "EECDH" | "kECDHE" | "kEECDH" | "AEAD" => true,
        "ECDSA" | "aECDSA" => iana.contains("_ECDSA_"),
        "aRSA" => iana.contains("_RSA_"),
        "AESGCM" => iana.contains("_GCM_"),
        "AES256" => iana.contains("AES_256"),
        "AES128" => iana.contains("AES_128"),
        "AES" => iana.contains("_AES_"),
        "CHACHA20" => iana.contains("CHACHA20"),
        name => {
            name.eq_ignore_ascii_case(iana)
                || OPENSSL_NAMES
                    .iter()
                    .any(|(openssl, full)| *full == iana && name.eq_ignore_ascii_case(openssl))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::CipherSuite;

    fn tls12_suites(selected: &[SupportedCipherSuite]) -> Vec<CipherSuite> {
        selected
            .iter()
            .filter(|s| !matches!(s, SupportedCipherSuite::Tls13(_)))
            .map(|s| s.suite())
            .collect()
    }

    #[test]
    fn normalization() {
        let list = OneOrMany::Many(vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(normalize_ciphers(Some(&list)), "X:Y");
        assert_eq!(normalize_ciphers(None), DEFAULT_CIPHERS);

        let single = OneOrMany::One("ECDHE-RSA-AES128-GCM-SHA256:!RC4".to_string());
        assert_eq!(normalize_ciphers(Some(&single)), "ECDHE-RSA-AES128-GCM-SHA256:!RC4");
    }

    #[test]
    fn default_list_excludes_weak_algorithms() {
        for banned in ["!aNULL", "!eNULL", "!EXPORT", "!DES", "!RC4", "!MD5"] {
            assert!(DEFAULT_CIPHERS.contains(banned), "missing {}", banned);
        }
        assert!(DEFAULT_CIPHERS.starts_with("ECDHE-"));
    }

    #[test]
    fn default_list_keeps_every_rustls_suite() {
        let available = rustls::crypto::ring::default_provider().cipher_suites;
        let selected = select_suites(DEFAULT_CIPHERS, &available);
        assert_eq!(selected.len(), available.len());
    }

    #[test]
    fn named_suite_is_selected_alone() {
        let available = rustls::crypto::ring::default_provider().cipher_suites;
        let selected = select_suites("ECDHE-RSA-AES128-GCM-SHA256", &available);
        assert_eq!(
            tls12_suites(&selected),
            vec![CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256]
        );
        assert!(selected.iter().any(|s| matches!(s, SupportedCipherSuite::Tls13(_))));
    }

    #[test]
    fn exclusions_and_order() {
        let available = rustls::crypto::ring::default_provider().cipher_suites;
        let selected = select_suites(
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256:HIGH:!ECDSA",
            &available,
        );
        let tls12 = tls12_suites(&selected);
        assert_eq!(tls12[0], CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256);
        assert_eq!(tls12.len(), 3);
        assert!(tls12.iter().all(|s| !format!("{:?}", s).contains("ECDSA")));
    }

    #[test]
    fn removed_suites_can_be_added_back() {
        let available = rustls::crypto::ring::default_provider().cipher_suites;
        let selected = select_suites("HIGH:-ECDSA:ECDHE-ECDSA-AES128-GCM-SHA256", &available);
        let tls12 = tls12_suites(&selected);
        assert_eq!(tls12.len(), 4);
        assert_eq!(
            tls12.last(),
            Some(&CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256)
        );
    }

    #[test]
    fn banned_suites_stay_banned() {
        let available = rustls::crypto::ring::default_provider().cipher_suites;
        let selected = select_suites("HIGH:!ECDSA:ECDHE-ECDSA-AES128-GCM-SHA256", &available);
        let tls12 = tls12_suites(&selected);
        assert_eq!(tls12.len(), 3);
        assert!(tls12.iter().all(|s| !format!("{:?}", s).contains("ECDSA")));
    }

    #[test]
    fn unknown_names_select_nothing() {
        let available = rustls::crypto::ring::default_provider().cipher_suites;
        let selected = select_suites("DHE-RSA-AES256-SHA256:RC4-MD5", &available);
        assert!(tls12_suites(&selected).is_empty());
    }
}
